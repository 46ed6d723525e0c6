//! Prefetch results.

use std::fmt;

use bytes::Bytes;

use crate::client::ApiResponse;
use crate::model::TileKey;

/// Overall outcome of a prefetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrefetchStatus {
    /// Every tile was fetched.
    Completed,
    /// Some tiles failed, at least one succeeded.
    CompletedWithErrors,
    /// No tile was fetched.
    Failed,
    /// The prefetch was cancelled. Tiles fetched before the cancellation are
    /// still reported.
    Cancelled,
}

impl fmt::Display for PrefetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrefetchStatus::Completed => "completed",
            PrefetchStatus::CompletedWithErrors => "completed with errors",
            PrefetchStatus::Failed => "failed",
            PrefetchStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Outcome of one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct PrefetchTileResult {
    pub tile_key: TileKey,
    pub result: ApiResponse<Bytes>,
}

impl PrefetchTileResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(&self.result, Err(e) if e.is_cancelled())
    }
}

/// Aggregate outcome of a prefetch, one entry per expanded tile.
#[derive(Clone, Debug, PartialEq)]
pub struct PrefetchTilesResult {
    pub tiles: Vec<PrefetchTileResult>,
    pub status: PrefetchStatus,
}

impl PrefetchTilesResult {
    /// Builds the aggregate and derives its status.
    pub fn from_tiles(tiles: Vec<PrefetchTileResult>) -> Self {
        let succeeded = tiles.iter().filter(|t| t.is_success()).count();
        let status = if tiles.iter().any(PrefetchTileResult::is_cancelled) {
            PrefetchStatus::Cancelled
        } else if succeeded == tiles.len() {
            PrefetchStatus::Completed
        } else if succeeded == 0 {
            PrefetchStatus::Failed
        } else {
            PrefetchStatus::CompletedWithErrors
        };
        Self { tiles, status }
    }

    pub fn succeeded(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_success()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_cancelled()).count()
    }

    /// Failed tiles, excluding cancelled ones.
    pub fn failed(&self) -> usize {
        self.tiles.len() - self.succeeded() - self.cancelled()
    }
}
