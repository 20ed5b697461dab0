use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::Item;

/// A render callback failure. Isolated to the single item: the cache
/// substitutes a visible placeholder instead of propagating.
#[derive(Debug, thiserror::Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// The seam between the cache and the host's visual nodes.
///
/// Rendering is split from pooling mechanics: `apply` is expected to be a
/// pure "item → content" projection, while the cache decides when nodes are
/// created, recycled, and reset.
pub trait NodeLifecycle<N>: Send + Sync {
    /// Allocates a blank node. This is the expensive operation pooling
    /// exists to avoid.
    fn create(&self) -> N;

    /// Populates `node` with `item`'s content.
    fn apply(&self, node: &mut N, item: &Item) -> Result<(), RenderError>;

    /// Strips item-specific content back to a neutral baseline before the
    /// node enters the free pool.
    fn reset(&self, node: &mut N);

    /// Fills `node` with a visible error placeholder for `item`.
    fn apply_error(&self, node: &mut N, item: &Item);
}

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Content-cache capacity (fingerprint → rendered node).
    pub max_cache_size: usize,
    /// Free-pool capacity of neutral, reusable nodes.
    pub max_pool_size: usize,
    /// Quiet period before deferred cleanup runs; avoids churn while the
    /// user is actively scrolling.
    pub cleanup_delay_ms: u64,
    /// Share of oldest entries dropped when the cache overflows.
    pub evict_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 200,
            max_pool_size: 50,
            cleanup_delay_ms: 1000,
            evict_fraction: 0.2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub created: u64,
    pub recycled: u64,
    pub render_failures: u64,
    pub evicted: u64,
    pub cached_nodes: usize,
    pub pooled_nodes: usize,
    pub in_use_nodes: usize,
}

/// Handle to a node owned by the cache.
pub type NodeId = usize;

struct Slot<N> {
    node: Option<N>,
    fingerprint: u64,
    in_use: bool,
}

/// An object pool of reusable visual nodes keyed by content fingerprint, so
/// scrolling does not repeatedly allocate and destroy expensive UI nodes.
///
/// Nodes keep their rendered content while cached; a fingerprint match on
/// acquire skips the render entirely. Nodes are stripped to baseline only
/// when recycled for a different item or parked in the free pool.
pub struct ItemCache<N> {
    config: CacheConfig,
    lifecycle: Arc<dyn NodeLifecycle<N>>,

    slots: Vec<Slot<N>>,
    vacant: Vec<NodeId>,
    by_fingerprint: HashMap<u64, NodeId>,
    // Insertion order of cache entries, oldest first.
    cache_order: VecDeque<(u64, NodeId)>,
    pool: VecDeque<NodeId>,

    last_mutation_ms: u64,
    dirty: bool,

    hits: u64,
    misses: u64,
    created: u64,
    recycled: u64,
    render_failures: u64,
    evicted: u64,
}

impl<N> ItemCache<N> {
    pub fn new(config: CacheConfig, lifecycle: Arc<dyn NodeLifecycle<N>>) -> Self {
        Self {
            config,
            lifecycle,
            slots: Vec::new(),
            vacant: Vec::new(),
            by_fingerprint: HashMap::new(),
            cache_order: VecDeque::new(),
            pool: VecDeque::new(),
            last_mutation_ms: 0,
            dirty: false,
            hits: 0,
            misses: 0,
            created: 0,
            recycled: 0,
            render_failures: 0,
            evicted: 0,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns a node displaying `item`, recycling or creating one as needed.
    pub fn acquire(&mut self, item: &Item, now_ms: u64) -> NodeId {
        self.last_mutation_ms = now_ms;
        self.dirty = true;

        let fingerprint = item.fingerprint();
        if let Some(&id) = self.by_fingerprint.get(&fingerprint) {
            if !self.slots[id].in_use {
                self.slots[id].in_use = true;
                self.hits += 1;
                etrace!(fingerprint, id, "cache hit");
                return id;
            }
            // Same content rendered twice at once: fall through and build a
            // second, unmapped node.
        }

        self.misses += 1;
        let id = if let Some(id) = self.pool.pop_front() {
            self.recycled += 1;
            id
        } else {
            self.create_slot()
        };

        let slot = &mut self.slots[id];
        slot.fingerprint = fingerprint;
        slot.in_use = true;
        let node = slot.node.as_mut().expect("acquired slot holds a node");
        if let Err(err) = self.lifecycle.apply(node, item) {
            self.render_failures += 1;
            ewarn!(index = item.index, error = %err, "render failed; using placeholder");
            self.lifecycle.apply_error(node, item);
        }

        if !self.by_fingerprint.contains_key(&fingerprint) {
            self.by_fingerprint.insert(fingerprint, id);
            self.cache_order.push_back((fingerprint, id));
        }
        id
    }

    /// Releases a node back to the cache. Its content stays cached under the
    /// item's fingerprint, so re-acquiring the same item is a hit.
    pub fn release(&mut self, id: NodeId, now_ms: u64) -> bool {
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        if !slot.in_use || slot.node.is_none() {
            return false;
        }
        self.last_mutation_ms = now_ms;
        self.dirty = true;
        slot.in_use = false;

        if self.by_fingerprint.get(&slot.fingerprint) == Some(&id) {
            // Stays in the content cache for fingerprint reuse.
            return true;
        }
        // Unmapped duplicate: strip and pool (or discard when full).
        self.park(id);
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&N> {
        self.slots.get(id).and_then(|s| s.node.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut N> {
        self.slots.get_mut(id).and_then(|s| s.node.as_mut())
    }

    /// Runs deferred cleanup once the configured quiet period has elapsed.
    /// Returns whether a cleanup pass ran.
    pub fn maybe_cleanup(&mut self, now_ms: u64) -> bool {
        if !self.dirty || now_ms.saturating_sub(self.last_mutation_ms) < self.config.cleanup_delay_ms
        {
            return false;
        }
        self.cleanup();
        self.dirty = false;
        true
    }

    /// Evicts the oldest cache entries over capacity and trims the free pool.
    /// In-use nodes are never evicted.
    pub fn cleanup(&mut self) {
        if self.by_fingerprint.len() > self.config.max_cache_size {
            let over = self.by_fingerprint.len() - self.config.max_cache_size;
            let batch = ((self.config.max_cache_size as f64 * self.config.evict_fraction) as usize)
                .max(over);
            let mut dropped = 0usize;
            let mut kept = VecDeque::new();
            while dropped < batch {
                let Some((fingerprint, id)) = self.cache_order.pop_front() else {
                    break;
                };
                if self.by_fingerprint.get(&fingerprint) != Some(&id) {
                    continue; // stale entry
                }
                if self.slots[id].in_use {
                    kept.push_back((fingerprint, id));
                    continue;
                }
                self.by_fingerprint.remove(&fingerprint);
                self.park(id);
                self.evicted += 1;
                dropped += 1;
            }
            // In-use entries survive with their original ordering.
            while let Some(entry) = kept.pop_back() {
                self.cache_order.push_front(entry);
            }
            edebug!(dropped, cached = self.by_fingerprint.len(), "cache cleanup");
        }

        while self.pool.len() > self.config.max_pool_size {
            if let Some(id) = self.pool.pop_front() {
                self.slots[id].node = None;
                self.vacant.push(id);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            created: self.created,
            recycled: self.recycled,
            render_failures: self.render_failures,
            evicted: self.evicted,
            cached_nodes: self.by_fingerprint.len(),
            pooled_nodes: self.pool.len(),
            in_use_nodes: self.slots.iter().filter(|s| s.in_use).count(),
        }
    }

    // ---- internals -------------------------------------------------------

    fn create_slot(&mut self) -> NodeId {
        self.created += 1;
        let node = self.lifecycle.create();
        if let Some(id) = self.vacant.pop() {
            self.slots[id] = Slot {
                node: Some(node),
                fingerprint: 0,
                in_use: false,
            };
            id
        } else {
            self.slots.push(Slot {
                node: Some(node),
                fingerprint: 0,
                in_use: false,
            });
            self.slots.len() - 1
        }
    }

    /// Strips a slot's node to baseline and parks it in the free pool, or
    /// discards it when the pool is full.
    fn park(&mut self, id: NodeId) {
        let slot = &mut self.slots[id];
        slot.fingerprint = 0;
        if self.pool.len() < self.config.max_pool_size {
            if let Some(node) = slot.node.as_mut() {
                self.lifecycle.reset(node);
            }
            self.pool.push_back(id);
        } else {
            slot.node = None;
            self.vacant.push(id);
        }
    }
}

impl<N> core::fmt::Debug for ItemCache<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ItemCache")
            .field("cached", &self.by_fingerprint.len())
            .field("pooled", &self.pool.len())
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}
