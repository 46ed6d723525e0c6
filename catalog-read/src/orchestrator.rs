//! Request orchestration.
//!
//! [`RequestOrchestrator`] turns a repository call into a registered,
//! scheduled, cancellable task and returns its token immediately.
//!
//! # Fetch Paths
//!
//! ```text
//! CacheOnly / OnlineOnly / OnlineIfNotFound
//!   key  = placeholder
//!   task = repo.fetch(option)  ──► remove_and_deliver(key, callback)
//!
//! CacheWithUpdate
//!   key1 = placeholder
//!   task1 = repo.fetch(CacheOnly)         ──► remove_and_deliver(key1, callback)
//!   key2 = placeholder
//!   task2 = repo.fetch(OnlineIfNotFound)  ──► remove(key2), result dropped
//!   token = all(task1, task2)
//! ```
//!
//! The background refresh only updates the cache. Its result never reaches
//! the caller, and a later request sees the refreshed value only once the
//! cache write has happened.

use std::sync::Arc;

use tracing::debug;

use crate::client::{
    ApiResponse, CancellationToken, PendingRequests, RequestKey, ResponseCallback, TaskContext,
};
use crate::model::FetchOption;
use crate::repository::Repository;
use crate::scheduler::{execute_or_schedule, TaskScheduler};

/// Schedules repository calls and guards their delivery.
pub struct RequestOrchestrator {
    pending: Arc<PendingRequests>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
}

impl RequestOrchestrator {
    /// Creates an orchestrator. Without a scheduler, tasks run inline on the
    /// calling thread.
    pub fn new(scheduler: Option<Arc<dyn TaskScheduler>>) -> Self {
        Self {
            pending: Arc::new(PendingRequests::new()),
            scheduler,
        }
    }

    /// The registry of this orchestrator's outstanding requests.
    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.pending
    }

    /// The configured scheduler, if any.
    pub fn scheduler(&self) -> Option<&Arc<dyn TaskScheduler>> {
        self.scheduler.as_ref()
    }

    /// Fetches `request` from `repository` under `option`.
    ///
    /// `callback` fires exactly once with the result or an error, unless the
    /// registry is torn down first.
    pub fn fetch<R, C>(
        &self,
        repository: Arc<R>,
        request: R::Request,
        option: FetchOption,
        callback: C,
    ) -> CancellationToken
    where
        R: Repository,
        C: FnOnce(ApiResponse<R::Response>) + Send + 'static,
    {
        match option {
            FetchOption::CacheWithUpdate => {
                let visible = self.submit(
                    Arc::clone(&repository),
                    request.clone(),
                    FetchOption::CacheOnly,
                    callback,
                );
                let refresh = self.submit_refresh(repository, request);
                CancellationToken::all(vec![visible, refresh])
            }
            option => self.submit(repository, request, option, callback),
        }
    }

    /// Tracks an operation that manages its own tasks.
    ///
    /// `start` receives the guarded callback and returns the operation's
    /// token, which is registered under a placeholder so that bulk
    /// cancellation reaches it.
    pub fn track<T, S, C>(&self, start: S, callback: C) -> CancellationToken
    where
        T: Send + 'static,
        S: FnOnce(ResponseCallback<T>) -> CancellationToken,
        C: FnOnce(ApiResponse<T>) + Send + 'static,
    {
        let key = self.pending.generate_placeholder();
        let pending = Arc::clone(&self.pending);

        let token = start(Box::new(move |response| {
            pending.remove_and_deliver(key, || callback(response));
        }));
        self.pending.insert_with_key(key, token.clone());
        token
    }

    fn submit<R, C>(
        &self,
        repository: Arc<R>,
        request: R::Request,
        option: FetchOption,
        callback: C,
    ) -> CancellationToken
    where
        R: Repository,
        C: FnOnce(ApiResponse<R::Response>) + Send + 'static,
    {
        let key = self.pending.generate_placeholder();
        let pending = Arc::clone(&self.pending);

        let task = TaskContext::create(
            move |context| repository.fetch(&context, request, option),
            move |response| {
                pending.remove_and_deliver(key, || callback(response));
            },
        );
        debug!(key = %key, option = %option, "Request submitted");
        self.launch(key, task)
    }

    fn submit_refresh<R>(&self, repository: Arc<R>, request: R::Request) -> CancellationToken
    where
        R: Repository,
    {
        let key = self.pending.generate_placeholder();
        let pending = Arc::clone(&self.pending);

        let task = TaskContext::create(
            move |context| {
                repository
                    .fetch(&context, request, FetchOption::OnlineIfNotFound)
                    .map(|_| ())
            },
            move |response: ApiResponse<()>| {
                if let Err(e) = response {
                    debug!(key = %key, error = %e, "Background cache refresh failed");
                }
                pending.remove(key);
            },
        );
        debug!(key = %key, "Background refresh submitted");
        self.launch(key, task)
    }

    fn launch<T: Send + 'static>(&self, key: RequestKey, task: TaskContext<T>) -> CancellationToken {
        let token = task.cancel_token();
        self.pending.insert_with_key(key, task.clone());
        execute_or_schedule(self.scheduler.as_deref(), move || task.execute());
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, CancellationContext, ErrorKind};
    use crate::scheduler::tests::ManualScheduler;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Repository backed by a map that acts as both cache and "network".
    #[derive(Default)]
    struct StubRepository {
        cache: Mutex<HashMap<String, u32>>,
        remote: Mutex<HashMap<String, u32>>,
        network_calls: AtomicUsize,
    }

    impl Repository for StubRepository {
        type Request = String;
        type Response = u32;

        fn fetch(
            &self,
            context: &CancellationContext,
            request: String,
            option: FetchOption,
        ) -> ApiResponse<u32> {
            context.check()?;
            let cached = self.cache.lock().get(&request).copied();
            match (option, cached) {
                (FetchOption::CacheOnly, Some(v)) | (FetchOption::OnlineIfNotFound, Some(v)) => {
                    Ok(v)
                }
                (FetchOption::CacheOnly, None) => Err(ApiError::not_found("not cached")),
                _ => {
                    self.network_calls.fetch_add(1, Ordering::SeqCst);
                    let value = self
                        .remote
                        .lock()
                        .get(&request)
                        .copied()
                        .ok_or_else(|| ApiError::not_found("not on server"))?;
                    self.cache.lock().insert(request, value);
                    Ok(value)
                }
            }
        }
    }

    fn recorder() -> (
        Arc<Mutex<Vec<ApiResponse<u32>>>>,
        impl FnOnce(ApiResponse<u32>) + Send + 'static,
    ) {
        let deliveries = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&deliveries);
        (deliveries, move |response| sink.lock().push(response))
    }

    fn setup() -> (RequestOrchestrator, Arc<ManualScheduler>, Arc<StubRepository>) {
        let scheduler = Arc::new(ManualScheduler::default());
        let shared: Arc<dyn TaskScheduler> = scheduler.clone();
        let orchestrator = RequestOrchestrator::new(Some(shared));
        (orchestrator, scheduler, Arc::new(StubRepository::default()))
    }

    #[test]
    fn test_single_fetch_delivers_once_and_clears_registry() {
        let (orchestrator, scheduler, repository) = setup();
        repository.remote.lock().insert("a".into(), 1);
        let (deliveries, callback) = recorder();

        orchestrator.fetch(repository, "a".into(), FetchOption::OnlineOnly, callback);
        assert_eq!(orchestrator.pending().len(), 1);

        scheduler.run_all();

        let expected: Vec<ApiResponse<u32>> = vec![Ok(1)];
        assert_eq!(*deliveries.lock(), expected);
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_inline_execution_without_scheduler() {
        let orchestrator = RequestOrchestrator::new(None);
        let repository = Arc::new(StubRepository::default());
        repository.cache.lock().insert("a".into(), 5);
        let (deliveries, callback) = recorder();

        orchestrator.fetch(repository, "a".into(), FetchOption::CacheOnly, callback);

        let expected: Vec<ApiResponse<u32>> = vec![Ok(5)];
        assert_eq!(*deliveries.lock(), expected);
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_cache_with_update_delivers_cache_result_only() {
        let (orchestrator, scheduler, repository) = setup();
        repository.remote.lock().insert("a".into(), 2);
        let (deliveries, callback) = recorder();

        orchestrator.fetch(
            Arc::clone(&repository),
            "a".into(),
            FetchOption::CacheWithUpdate,
            callback,
        );
        assert_eq!(scheduler.len(), 2);
        assert_eq!(orchestrator.pending().len(), 2);

        scheduler.run_all();

        let deliveries = deliveries.lock();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].as_ref().unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(repository.cache.lock().get("a"), Some(&2));
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_cache_with_update_hit_skips_network() {
        let (orchestrator, scheduler, repository) = setup();
        repository.cache.lock().insert("a".into(), 3);
        let (deliveries, callback) = recorder();

        orchestrator.fetch(
            Arc::clone(&repository),
            "a".into(),
            FetchOption::CacheWithUpdate,
            callback,
        );
        scheduler.run_all();

        let expected: Vec<ApiResponse<u32>> = vec![Ok(3)];
        assert_eq!(*deliveries.lock(), expected);
        assert_eq!(repository.network_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_cache_with_update_cancels_both_paths() {
        let (orchestrator, scheduler, repository) = setup();
        repository.remote.lock().insert("a".into(), 2);
        let (deliveries, callback) = recorder();

        let token = orchestrator.fetch(
            Arc::clone(&repository),
            "a".into(),
            FetchOption::CacheWithUpdate,
            callback,
        );
        token.cancel();
        scheduler.run_all();

        let deliveries = deliveries.lock();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].as_ref().unwrap_err().is_cancelled());
        assert_eq!(repository.network_calls.load(Ordering::SeqCst), 0);
        assert!(repository.cache.lock().is_empty());
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_cancel_all_and_wait_after_execution() {
        let (orchestrator, scheduler, repository) = setup();
        let (deliveries, callback) = recorder();
        orchestrator.fetch(repository, "a".into(), FetchOption::OnlineOnly, callback);

        let pending = Arc::clone(orchestrator.pending());
        let waiter = std::thread::spawn(move || pending.cancel_all_and_wait());
        scheduler.run_all();
        waiter.join().unwrap();

        // Either outcome is an error here: cancelled, or not found on the server.
        let deliveries = deliveries.lock();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].is_err());
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_track_registers_until_delivery() {
        let orchestrator = RequestOrchestrator::new(None);
        let (deliveries, callback) = recorder();
        let slot: Arc<Mutex<Option<ResponseCallback<u32>>>> = Arc::new(Mutex::new(None));

        let stash = Arc::clone(&slot);
        orchestrator.track(
            move |deliver| {
                *stash.lock() = Some(deliver);
                CancellationToken::empty()
            },
            callback,
        );
        assert_eq!(orchestrator.pending().len(), 1);

        let deliver = slot.lock().take().unwrap();
        deliver(Ok(4));

        let expected: Vec<ApiResponse<u32>> = vec![Ok(4)];
        assert_eq!(*deliveries.lock(), expected);
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_track_with_synchronous_completion() {
        let orchestrator = RequestOrchestrator::new(None);
        let (deliveries, callback) = recorder();

        orchestrator.track(
            |deliver: ResponseCallback<u32>| {
                deliver(Ok(1));
                CancellationToken::empty()
            },
            callback,
        );

        assert_eq!(deliveries.lock().len(), 1);
        assert!(orchestrator.pending().is_empty());
    }
}
