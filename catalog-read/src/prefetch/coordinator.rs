//! Prefetch fan-out and aggregation.
//!
//! Every expanded tile becomes one [`TaskContext`] that fetches the tile's
//! data with `OnlineIfNotFound`, warming the cache. All tasks are submitted
//! to the scheduler up front; the scheduler's worker count is the only
//! concurrency bound.
//!
//! Each task's callback records its outcome in a shared accumulator. The
//! callback that records the last outcome builds the [`PrefetchTilesResult`]
//! and delivers it. Cancelling the returned token cancels every task; tasks
//! that already finished keep their results.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::client::{
    ApiError, ApiResponse, CancellationToken, ResponseCallback, TaskContext,
};
use crate::model::{DataRequest, FetchOption, PrefetchTilesRequest, TileKey};
use crate::repository::Repository;
use crate::scheduler::{execute_or_schedule, TaskScheduler};

use super::expander::{QuadTreeExpander, TileExpander};
use super::types::{PrefetchTileResult, PrefetchTilesResult};

/// Default upper bound on the number of tiles one prefetch may expand to.
pub const DEFAULT_PREFETCH_MAX_TILES: usize = 4096;

/// Outcomes collected so far.
struct Accumulator {
    outcomes: Vec<Option<PrefetchTileResult>>,
    remaining: usize,
    callback: Option<ResponseCallback<PrefetchTilesResult>>,
}

impl Accumulator {
    fn new(tiles: usize, callback: ResponseCallback<PrefetchTilesResult>) -> Self {
        Self {
            outcomes: (0..tiles).map(|_| None).collect(),
            remaining: tiles,
            callback: Some(callback),
        }
    }
}

fn record(accumulator: &Mutex<Accumulator>, index: usize, outcome: PrefetchTileResult) {
    let finished = {
        let mut acc = accumulator.lock();
        acc.outcomes[index] = Some(outcome);
        acc.remaining -= 1;
        if acc.remaining == 0 {
            let outcomes = std::mem::take(&mut acc.outcomes);
            acc.callback.take().map(|callback| (callback, outcomes))
        } else {
            None
        }
    };

    // Deliver outside the lock.
    if let Some((callback, outcomes)) = finished {
        let result = PrefetchTilesResult::from_tiles(outcomes.into_iter().flatten().collect());
        info!(
            tiles = result.tiles.len(),
            succeeded = result.succeeded(),
            failed = result.failed(),
            cancelled = result.cancelled(),
            status = %result.status,
            "Prefetch finished"
        );
        callback(Ok(result));
    }
}

/// Expands prefetch requests and fans them out to the scheduler.
pub struct PrefetchCoordinator {
    expander: Arc<dyn TileExpander>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    max_tiles: usize,
}

impl PrefetchCoordinator {
    /// Creates a coordinator using [`QuadTreeExpander`].
    pub fn new(scheduler: Option<Arc<dyn TaskScheduler>>) -> Self {
        Self {
            expander: Arc::new(QuadTreeExpander),
            scheduler,
            max_tiles: DEFAULT_PREFETCH_MAX_TILES,
        }
    }

    /// Replaces the tile expander.
    pub fn with_expander(mut self, expander: Arc<dyn TileExpander>) -> Self {
        self.expander = expander;
        self
    }

    /// Sets the expansion limit.
    pub fn with_max_tiles(mut self, max_tiles: usize) -> Self {
        self.max_tiles = max_tiles;
        self
    }

    pub fn max_tiles(&self) -> usize {
        self.max_tiles
    }

    /// Checks a request before expansion.
    pub fn validate(&self, request: &PrefetchTilesRequest) -> ApiResponse<()> {
        if request.layer_id.is_empty() {
            return Err(ApiError::invalid_request("Prefetch needs a layer id"));
        }
        if request.tile_keys.is_empty() {
            return Err(ApiError::invalid_request("Prefetch needs at least one tile"));
        }
        if request.min_level > request.max_level {
            return Err(ApiError::invalid_request(format!(
                "Prefetch min level {} is above max level {}",
                request.min_level, request.max_level
            )));
        }
        if request.max_level > TileKey::MAX_LEVEL {
            return Err(ApiError::invalid_request(format!(
                "Prefetch max level {} exceeds {}",
                request.max_level,
                TileKey::MAX_LEVEL
            )));
        }
        if self.max_tiles == 0 {
            return Err(ApiError::invalid_request("Prefetch tile limit is zero"));
        }
        Ok(())
    }

    /// Starts a prefetch.
    ///
    /// `callback` fires exactly once: with an error if the request is
    /// invalid, otherwise with one entry per expanded tile after every tile
    /// has settled.
    pub fn prefetch<R>(
        &self,
        repository: Arc<R>,
        request: PrefetchTilesRequest,
        callback: ResponseCallback<PrefetchTilesResult>,
    ) -> CancellationToken
    where
        R: Repository<Request = DataRequest, Response = Bytes>,
    {
        let tiles = match self.validate(&request).and_then(|_| {
            self.expander.expand(
                &request.tile_keys,
                request.min_level,
                request.max_level,
                self.max_tiles,
            )
        }) {
            Ok(tiles) => tiles,
            Err(e) => {
                debug!(error = %e, "Prefetch rejected");
                callback(Err(e));
                return CancellationToken::empty();
            }
        };

        if tiles.is_empty() {
            callback(Ok(PrefetchTilesResult::from_tiles(Vec::new())));
            return CancellationToken::empty();
        }

        info!(
            layer = %request.layer_id,
            roots = request.tile_keys.len(),
            tiles = tiles.len(),
            min_level = request.min_level,
            max_level = request.max_level,
            "Prefetch started"
        );

        let accumulator = Arc::new(Mutex::new(Accumulator::new(tiles.len(), callback)));
        let mut tasks = Vec::with_capacity(tiles.len());

        for (index, tile_key) in tiles.into_iter().enumerate() {
            let repository = Arc::clone(&repository);
            let accumulator = Arc::clone(&accumulator);
            let mut data_request =
                DataRequest::new(request.layer_id.clone()).with_partition_id(tile_key.to_here_tile());
            data_request.version = request.version;

            tasks.push(TaskContext::create(
                move |context| {
                    repository.fetch(&context, data_request, FetchOption::OnlineIfNotFound)
                },
                move |result| record(&accumulator, index, PrefetchTileResult { tile_key, result }),
            ));
        }

        // The aggregate token exists before any task is scheduled.
        let token = CancellationToken::all(tasks.iter().map(TaskContext::cancel_token).collect());
        for task in tasks {
            execute_or_schedule(self.scheduler.as_deref(), move || task.execute());
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CancellationContext, ErrorKind};
    use crate::prefetch::PrefetchStatus;
    use crate::scheduler::tests::ManualScheduler;
    use std::collections::HashSet;

    /// Serves tiles whose partition id is in `available`.
    struct TileRepository {
        available: HashSet<String>,
    }

    impl Repository for TileRepository {
        type Request = DataRequest;
        type Response = Bytes;

        fn fetch(
            &self,
            context: &CancellationContext,
            request: DataRequest,
            _option: FetchOption,
        ) -> ApiResponse<Bytes> {
            context.check()?;
            let id = request.partition_id.unwrap_or_default();
            if self.available.contains(&id) {
                Ok(Bytes::from(id))
            } else {
                Err(ApiError::not_found(format!("tile {}", id)))
            }
        }
    }

    fn repository_with(tiles: &[TileKey]) -> Arc<TileRepository> {
        Arc::new(TileRepository {
            available: tiles.iter().map(TileKey::to_here_tile).collect(),
        })
    }

    fn capture() -> (
        Arc<Mutex<Vec<ApiResponse<PrefetchTilesResult>>>>,
        ResponseCallback<PrefetchTilesResult>,
    ) {
        let deliveries = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&deliveries);
        (deliveries, Box::new(move |result| sink.lock().push(result)))
    }

    fn root() -> TileKey {
        TileKey::new(3, 2, 5).unwrap()
    }

    fn request() -> PrefetchTilesRequest {
        // root plus its four children
        PrefetchTilesRequest::new("topology")
            .with_tile_keys(vec![root()])
            .with_min_level(3)
            .with_max_level(4)
    }

    #[test]
    fn test_prefetch_all_tiles_inline() {
        let mut all = vec![root()];
        all.extend(root().children());
        let coordinator = PrefetchCoordinator::new(None);
        let (deliveries, callback) = capture();

        coordinator.prefetch(repository_with(&all), request(), callback);

        let deliveries = deliveries.lock();
        assert_eq!(deliveries.len(), 1);
        let result = deliveries[0].as_ref().unwrap();
        assert_eq!(result.status, PrefetchStatus::Completed);
        assert_eq!(result.tiles.len(), 5);
        assert_eq!(result.tiles[0].tile_key, root());
    }

    #[test]
    fn test_prefetch_partial_failure() {
        let coordinator = PrefetchCoordinator::new(None);
        let (deliveries, callback) = capture();

        coordinator.prefetch(repository_with(&[root()]), request(), callback);

        let deliveries = deliveries.lock();
        let result = deliveries[0].as_ref().unwrap();
        assert_eq!(result.status, PrefetchStatus::CompletedWithErrors);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 4);
    }

    #[test]
    fn test_prefetch_all_failed() {
        let coordinator = PrefetchCoordinator::new(None);
        let (deliveries, callback) = capture();

        coordinator.prefetch(repository_with(&[]), request(), callback);

        assert_eq!(
            deliveries.lock()[0].as_ref().unwrap().status,
            PrefetchStatus::Failed
        );
    }

    #[test]
    fn test_cancel_keeps_completed_tiles() {
        let mut all = vec![root()];
        all.extend(root().children());
        let scheduler = Arc::new(ManualScheduler::default());
        let shared: Arc<dyn TaskScheduler> = scheduler.clone();
        let coordinator = PrefetchCoordinator::new(Some(shared));
        let (deliveries, callback) = capture();

        let token = coordinator.prefetch(repository_with(&all), request(), callback);
        assert_eq!(scheduler.len(), 5);

        // Two tiles finish, then the prefetch is cancelled.
        scheduler.run_next();
        scheduler.run_next();
        assert!(deliveries.lock().is_empty());
        token.cancel();
        scheduler.run_all();

        let deliveries = deliveries.lock();
        assert_eq!(deliveries.len(), 1);
        let result = deliveries[0].as_ref().unwrap();
        assert_eq!(result.status, PrefetchStatus::Cancelled);
        assert_eq!(result.tiles.len(), 5);
        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.cancelled(), 3);
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let coordinator = PrefetchCoordinator::new(None);
        let cases = vec![
            PrefetchTilesRequest::new("topology"),
            request().with_min_level(5),
            request().with_max_level(TileKey::MAX_LEVEL + 1),
            PrefetchTilesRequest::new("").with_tile_keys(vec![root()]),
        ];

        for case in cases {
            let (deliveries, callback) = capture();
            coordinator.prefetch(repository_with(&[]), case, callback);
            let deliveries = deliveries.lock();
            assert_eq!(
                deliveries[0].as_ref().unwrap_err().kind(),
                ErrorKind::InvalidRequest
            );
        }
    }

    #[test]
    fn test_expansion_limit_enforced() {
        let coordinator = PrefetchCoordinator::new(None).with_max_tiles(4);
        let (deliveries, callback) = capture();

        coordinator.prefetch(repository_with(&[]), request(), callback);

        assert_eq!(
            deliveries.lock()[0].as_ref().unwrap_err().kind(),
            ErrorKind::InvalidRequest
        );
    }
}
