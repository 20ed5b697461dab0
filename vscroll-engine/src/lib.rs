//! Chunked data loading, node pooling and scroll orchestration on top of the
//! `vscroll` window math.
//!
//! Four pieces compose into a pipeline driven by scroll position and search
//! queries:
//!
//! - [`DataProvider`] owns the logical dataset: fixed-size chunks with
//!   bounded residency (LRU), range queries, and an incrementally built
//!   inverted search index.
//! - [`ItemCache`] pools reusable visual nodes keyed by content fingerprint.
//! - [`ScrollManager`] wires live scroll signals to the other pieces:
//!   buffered range recomputation, infinite loading, fast-scroll preloading,
//!   and frame-rate tracking.
//! - [`SearchWorker`] moves search off the main thread for large datasets,
//!   with request/response correlation by id.
//!
//! Everything is host-agnostic: the host supplies a [`ChunkSource`], a
//! [`NodeLifecycle`] for its visual nodes, and a stream of scroll offsets
//! with explicit `now_ms` timestamps.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod index;
mod item;
mod manager;
mod pool;
mod provider;
mod source;
mod tween;
mod worker;


pub use index::{SearchHit, SearchIndex, SearchOptions, SearchResults, SortField};
pub use item::{Item, ItemSeed};
pub use manager::{
    EngineEvent, EngineStats, EventListener, ManagerConfig, Placement, ScrollManager,
};
pub use pool::{CacheConfig, CacheStats, ItemCache, NodeId, NodeLifecycle, RenderError};
pub use provider::{DataProvider, EngineError, ProviderConfig, ProviderStats};
pub use source::{ChunkSource, FetchPage, PagedSource, SliceSource, SourceError, SyntheticSource};
pub use tween::{Easing, ScrollTween};
pub use worker::SearchWorker;
