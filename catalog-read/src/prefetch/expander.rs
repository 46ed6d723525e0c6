//! Tile hierarchy expansion.

use std::collections::HashSet;

use crate::client::{ApiError, ApiResponse};
use crate::model::TileKey;

/// Expands root tiles into the tiles a prefetch fetches.
pub trait TileExpander: Send + Sync {
    /// Returns the tiles to fetch for `roots` within `[min_level, max_level]`.
    ///
    /// Fails with `InvalidRequest` if the expansion exceeds `limit` tiles.
    fn expand(
        &self,
        roots: &[TileKey],
        min_level: u32,
        max_level: u32,
        limit: usize,
    ) -> ApiResponse<Vec<TileKey>>;
}

/// Expands every root to its ancestors and descendants.
///
/// For each root, in order: its ancestors from `min_level` down to the root
/// (the root included when in range), then its descendants level by level
/// down to `max_level`. Duplicates are dropped, keeping the first occurrence.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuadTreeExpander;

struct Collector {
    seen: HashSet<TileKey>,
    tiles: Vec<TileKey>,
    limit: usize,
}

impl Collector {
    fn push(&mut self, tile: TileKey) -> ApiResponse<()> {
        if self.seen.insert(tile) {
            if self.tiles.len() >= self.limit {
                return Err(too_many(self.limit));
            }
            self.tiles.push(tile);
        }
        Ok(())
    }
}

fn too_many(limit: usize) -> ApiError {
    ApiError::invalid_request(format!("Prefetch expands to more than {} tiles", limit))
}

impl TileExpander for QuadTreeExpander {
    fn expand(
        &self,
        roots: &[TileKey],
        min_level: u32,
        max_level: u32,
        limit: usize,
    ) -> ApiResponse<Vec<TileKey>> {
        let mut collector = Collector {
            seen: HashSet::new(),
            tiles: Vec::new(),
            limit,
        };

        for root in roots {
            for level in min_level..=max_level.min(root.level()) {
                if let Some(ancestor) = root.ancestor(level) {
                    collector.push(ancestor)?;
                }
            }

            let mut frontier = vec![*root];
            for level in root.level() + 1..=max_level {
                if frontier.len().saturating_mul(4) > limit {
                    return Err(too_many(limit));
                }
                frontier = frontier.iter().flat_map(TileKey::children).collect();
                if level >= min_level {
                    for tile in &frontier {
                        collector.push(*tile)?;
                    }
                }
            }
        }

        Ok(collector.tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ErrorKind;

    fn tile(level: u32, row: u32, column: u32) -> TileKey {
        TileKey::new(level, row, column).unwrap()
    }

    #[test]
    fn test_expand_ancestors_root_and_children() {
        let root = tile(2, 1, 3);

        let tiles = QuadTreeExpander.expand(&[root], 1, 3, 100).unwrap();

        let mut expected = vec![root.ancestor(1).unwrap(), root];
        expected.extend(root.children());
        assert_eq!(tiles, expected);
    }

    #[test]
    fn test_root_deeper_than_range_yields_only_ancestors() {
        let root = tile(5, 10, 10);

        let tiles = QuadTreeExpander.expand(&[root], 2, 3, 100).unwrap();

        assert_eq!(tiles, vec![root.ancestor(2).unwrap(), root.ancestor(3).unwrap()]);
    }

    #[test]
    fn test_shared_ancestors_deduplicated() {
        let a = tile(3, 0, 0);
        let b = tile(3, 0, 1);

        let tiles = QuadTreeExpander.expand(&[a, b], 2, 3, 100).unwrap();

        assert_eq!(tiles, vec![a.parent().unwrap(), a, b]);
    }

    #[test]
    fn test_limit_exceeded() {
        let err = QuadTreeExpander
            .expand(&[tile(0, 0, 0)], 0, 20, 4096)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_limit_is_inclusive() {
        // Root plus four children.
        let tiles = QuadTreeExpander.expand(&[tile(0, 0, 0)], 0, 1, 5).unwrap();
        assert_eq!(tiles.len(), 5);
        assert!(QuadTreeExpander.expand(&[tile(0, 0, 0)], 0, 1, 4).is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn tile_strategy() -> impl Strategy<Value = TileKey> {
            (0u32..=10).prop_flat_map(|level| {
                let size = 1u32 << level;
                (0..size, 0..size).prop_map(move |(row, column)| tile(level, row, column))
            })
        }

        proptest! {
            #[test]
            fn test_expansion_invariants(
                roots in proptest::collection::vec(tile_strategy(), 1..4),
                min_level in 0u32..5,
                span in 0u32..3,
            ) {
                let max_level = min_level + span;
                let tiles = QuadTreeExpander.expand(&roots, min_level, max_level, 100_000)?;

                let unique: HashSet<_> = tiles.iter().collect();
                prop_assert_eq!(unique.len(), tiles.len());

                for tile in &tiles {
                    prop_assert!(tile.level() >= min_level && tile.level() <= max_level);
                }

                for root in &roots {
                    for level in min_level..=max_level.min(root.level()) {
                        let ancestor = root.ancestor(level).unwrap();
                        prop_assert!(unique.contains(&ancestor));
                    }
                }

                let again = QuadTreeExpander.expand(&roots, min_level, max_level, 100_000)?;
                prop_assert_eq!(again, tiles);
            }
        }
    }
}
