use std::sync::Arc;

use crate::ItemSeed;

/// A chunk fetch failure. Load failures never crash range or search calls:
/// the provider logs them, treats the affected range as empty for that call,
/// and retries on the next access.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("fetch failed at offset {offset}: {reason}")]
    Fetch { offset: usize, reason: String },
}

/// One page of source data.
#[derive(Clone, Debug, Default)]
pub struct FetchPage {
    pub seeds: Vec<ItemSeed>,
}

/// The seam between the provider and however the dataset is sourced: an
/// in-memory slice, a paged endpoint, or a synthetic generator.
///
/// `fetch(offset, len)` returns up to `len` seeds starting at absolute
/// `offset`; short pages are valid at the dataset tail.
pub trait ChunkSource: Send {
    fn total(&self) -> usize;
    fn fetch(&mut self, offset: usize, len: usize) -> Result<FetchPage, SourceError>;
}

/// An in-memory dataset.
pub struct SliceSource {
    seeds: Vec<ItemSeed>,
}

impl SliceSource {
    pub fn new(seeds: Vec<ItemSeed>) -> Self {
        Self { seeds }
    }
}

impl ChunkSource for SliceSource {
    fn total(&self) -> usize {
        self.seeds.len()
    }

    fn fetch(&mut self, offset: usize, len: usize) -> Result<FetchPage, SourceError> {
        let end = offset.saturating_add(len).min(self.seeds.len());
        let start = offset.min(end);
        Ok(FetchPage {
            seeds: self.seeds[start..end].to_vec(),
        })
    }
}

/// A caller-defined paged endpoint: `(offset, len) -> page`.
pub struct PagedSource {
    total: usize,
    fetch: Box<dyn FnMut(usize, usize) -> Result<FetchPage, SourceError> + Send>,
}

impl PagedSource {
    pub fn new(
        total: usize,
        fetch: impl FnMut(usize, usize) -> Result<FetchPage, SourceError> + Send + 'static,
    ) -> Self {
        Self {
            total,
            fetch: Box::new(fetch),
        }
    }
}

impl ChunkSource for PagedSource {
    fn total(&self) -> usize {
        self.total
    }

    fn fetch(&mut self, offset: usize, len: usize) -> Result<FetchPage, SourceError> {
        (self.fetch)(offset, len)
    }
}

/// A generator descriptor for synthetic expansion: `count` items produced on
/// demand by a template closure.
pub struct SyntheticSource {
    count: usize,
    template: Arc<dyn Fn(usize) -> ItemSeed + Send + Sync>,
}

impl SyntheticSource {
    pub fn new(count: usize, template: impl Fn(usize) -> ItemSeed + Send + Sync + 'static) -> Self {
        Self {
            count,
            template: Arc::new(template),
        }
    }
}

impl ChunkSource for SyntheticSource {
    fn total(&self) -> usize {
        self.count
    }

    fn fetch(&mut self, offset: usize, len: usize) -> Result<FetchPage, SourceError> {
        let end = offset.saturating_add(len).min(self.count);
        let start = offset.min(end);
        Ok(FetchPage {
            seeds: (start..end).map(|i| (self.template)(i)).collect(),
        })
    }
}
