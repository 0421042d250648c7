//! Point-to-shard assignment.

use crate::decoder::DecodedPoint;
use std::hash::Hasher;

/// Maps a point to a worker shard in `[0, shards)`.
///
/// Implementations must be pure: the same point and shard count always map
/// to the same shard.
pub trait PointIndexer: Send + Sync {
    fn index(&self, point: &DecodedPoint, shards: usize) -> usize;
}

impl<I: PointIndexer + ?Sized> PointIndexer for Box<I> {
    fn index(&self, point: &DecodedPoint, shards: usize) -> usize {
        (**self).index(point, shards)
    }
}

/// Sends every point to shard 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantIndexer;

impl PointIndexer for ConstantIndexer {
    fn index(&self, _point: &DecodedPoint, _shards: usize) -> usize {
        0
    }
}

/// Hashes the point's routing key across shards.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashIndexer;

impl PointIndexer for HashIndexer {
    fn index(&self, point: &DecodedPoint, shards: usize) -> usize {
        if shards <= 1 {
            return 0;
        }
        let mut hasher = fxhash::FxHasher::default();
        hasher.write(point.routing_key());
        (hasher.finish() % shards as u64) as usize
    }
}
