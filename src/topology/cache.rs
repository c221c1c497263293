//! Cache invalidation for derived topology.

/// Anything that caches derived connectivity (edges, adjacency, ...) should
/// implement this.
pub trait InvalidateCache {
    /// Drop every derived table so the next query rebuilds it.
    fn invalidate_cache(&mut self);
}
