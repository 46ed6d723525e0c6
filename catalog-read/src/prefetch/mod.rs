//! Bulk tile prefetch.
//!
//! A [`PrefetchTilesRequest`](crate::model::PrefetchTilesRequest) names a
//! set of root tiles and a level range. The [`TileExpander`] turns it into
//! the list of tiles to fetch, and the [`PrefetchCoordinator`] submits one
//! data fetch per tile to the scheduler and aggregates the outcomes.
//!
//! ```text
//! roots + [min, max]
//!        │ expand
//!        ▼
//!   t0  t1  t2 ... tn      one TaskContext each, OnlineIfNotFound
//!    │   │   │      │
//!    └───┴───┴──────┘
//!        │ accumulator (parking_lot::Mutex)
//!        ▼
//!  PrefetchTilesResult     delivered when the last tile settles
//! ```

mod coordinator;
mod expander;
mod types;

pub use coordinator::{PrefetchCoordinator, DEFAULT_PREFETCH_MAX_TILES};
pub use expander::{QuadTreeExpander, TileExpander};
pub use types::{PrefetchStatus, PrefetchTileResult, PrefetchTilesResult};
