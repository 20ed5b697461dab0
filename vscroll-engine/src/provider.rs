use std::collections::{HashMap, HashSet};

use crate::index::{fuzzy_score, score_item, sort_and_paginate, tokenize, SearchIndex};
use crate::{ChunkSource, Item, SearchHit, SearchOptions, SearchResults};

/// Hard initialization failures. Everything past construction degrades
/// gracefully instead of erroring (see `SourceError`).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("data source is empty")]
    EmptySource,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProviderConfig {
    /// Items per chunk, the unit of loading and eviction.
    pub chunk_size: usize,
    /// Maximum resident chunks before LRU eviction kicks in.
    pub max_memory_chunks: usize,
    /// Whether to feed the inverted index as chunks load.
    pub build_index: bool,
    /// Minimum character-set similarity for the fuzzy search fallback.
    pub fuzzy_threshold: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_memory_chunks: 5,
            build_index: true,
            fuzzy_threshold: 0.6,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProviderStats {
    pub total_items: usize,
    pub resident_chunks: usize,
    pub indexed_chunks: usize,
    pub fetches: u64,
    pub cache_hits: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub failed_fetches: u64,
}

#[derive(Debug)]
struct Chunk {
    items: Vec<Item>,
    last_access: u64,
}

/// Owns chunk residency and the search index; the only component that knows
/// how the dataset is sourced.
///
/// Chunks are fully present or fully absent, never partial. Residency is
/// bounded by `max_memory_chunks` with true-LRU eviction over last access.
/// Postings survive eviction: an evicted chunk keeps its place in the index
/// and is re-fetched only when its items are needed again.
pub struct DataProvider {
    config: ProviderConfig,
    source: Box<dyn ChunkSource>,
    total_items: usize,

    chunks: HashMap<usize, Chunk>,
    access_clock: u64,
    // Re-entrancy guard: a chunk already being loaded is not fetched twice.
    loading: HashSet<usize>,

    index: SearchIndex,
    indexed: HashSet<usize>,

    // Infinite-scroll cursor, advanced by `load_more`.
    cursor: usize,

    fetches: u64,
    cache_hits: u64,
    coalesced: u64,
    evictions: u64,
    failed_fetches: u64,
}

impl DataProvider {
    /// Determines `total_items` from the source and loads chunk 0 eagerly.
    /// An empty source is the one hard failure; a failed eager load is
    /// tolerated and retried on first access.
    pub fn new(
        config: ProviderConfig,
        source: impl ChunkSource + 'static,
    ) -> Result<Self, EngineError> {
        let source = Box::new(source);
        let total_items = source.total();
        if total_items == 0 {
            return Err(EngineError::EmptySource);
        }
        let mut p = Self {
            config,
            source,
            total_items,
            chunks: HashMap::new(),
            access_clock: 0,
            loading: HashSet::new(),
            index: SearchIndex::new(),
            indexed: HashSet::new(),
            cursor: 0,
            fetches: 0,
            cache_hits: 0,
            coalesced: 0,
            evictions: 0,
            failed_fetches: 0,
        };
        edebug!(
            total_items,
            chunk_size = p.config.chunk_size,
            "DataProvider::new"
        );
        p.ensure_chunk(0);
        p.cursor = 1;
        Ok(p)
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn chunk_count(&self) -> usize {
        self.total_items.div_ceil(self.config.chunk_size)
    }

    pub fn resident_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_resident(&self, chunk: usize) -> bool {
        self.chunks.contains_key(&chunk)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Loads chunk `chunk` if needed and returns its items.
    ///
    /// Resident chunks are cache hits; duplicate requests for a chunk whose
    /// load is already on the stack are coalesced (no second fetch). A fetch
    /// failure returns `None` for this call and is retried on next access.
    pub fn load_chunk(&mut self, chunk: usize) -> Option<&[Item]> {
        if !self.ensure_chunk(chunk) {
            return None;
        }
        self.chunks.get(&chunk).map(|c| c.items.as_slice())
    }

    /// Items covering the inclusive index range, in index order.
    ///
    /// Missing chunks are loaded (each exactly once); chunks that fail to
    /// load contribute nothing for this call.
    pub fn items_in_range(&mut self, start: usize, end: usize) -> Vec<Item> {
        if self.total_items == 0 || start >= self.total_items {
            return Vec::new();
        }
        let end = end.min(self.total_items - 1);
        if start > end {
            return Vec::new();
        }

        let size = self.config.chunk_size;
        let first_chunk = start / size;
        let last_chunk = end / size;
        let mut out = Vec::with_capacity(end - start + 1);

        for c in first_chunk..=last_chunk {
            // Slice immediately after the load so a later eviction pass over
            // a wide range cannot drop a chunk we still need.
            if !self.ensure_chunk(c) {
                continue;
            }
            let chunk = &self.chunks[&c];
            let base = c * size;
            let lo = start.max(base) - base;
            let hi = (end.min(base + size - 1) - base).min(chunk.items.len().saturating_sub(1));
            if lo < chunk.items.len() {
                out.extend_from_slice(&chunk.items[lo..=hi]);
            }
        }
        out
    }

    /// A single item by absolute index, loading its chunk on demand.
    pub fn item_at(&mut self, index: usize) -> Option<Item> {
        if index >= self.total_items {
            return None;
        }
        let chunk = index / self.config.chunk_size;
        if !self.ensure_chunk(chunk) {
            return None;
        }
        let base = chunk * self.config.chunk_size;
        self.chunks[&chunk].items.get(index - base).cloned()
    }

    /// Advances the infinite-scroll cursor by one chunk.
    ///
    /// Returns whether more chunks remain after this load.
    pub fn load_more(&mut self) -> bool {
        let count = self.chunk_count();
        while self.cursor < count && self.is_resident(self.cursor) {
            self.cursor += 1;
        }
        if self.cursor < count {
            self.ensure_chunk(self.cursor);
            self.cursor += 1;
        }
        self.cursor < count
    }

    pub fn has_more(&self) -> bool {
        self.cursor < self.chunk_count()
    }

    /// Eagerly loads the chunks covering `[index, index + n)`. Used by the
    /// scroll manager to hide load latency during fast flicks.
    pub fn preload_from(&mut self, index: usize, n: usize) {
        if self.total_items == 0 || n == 0 {
            return;
        }
        let last = index.saturating_add(n - 1).min(self.total_items - 1);
        let first_chunk = index.min(last) / self.config.chunk_size;
        let last_chunk = last / self.config.chunk_size;
        for c in first_chunk..=last_chunk {
            self.ensure_chunk(c);
        }
    }

    /// Searches the dataset.
    ///
    /// An empty query returns the first unfiltered page. Otherwise the
    /// inverted index over already-indexed chunks is consulted first; when
    /// the candidate set underfills the quota (`offset + limit`), further
    /// chunks are loaded and indexed progressively until the quota is met or
    /// the dataset is exhausted. Never fails: errors degrade to an empty
    /// result set.
    pub fn search(&mut self, query: &str, opts: &SearchOptions) -> SearchResults {
        let q = query.trim();
        if q.is_empty() {
            let hits: Vec<SearchHit> = self
                .items_in_range(opts.offset, opts.offset.saturating_add(opts.limit).saturating_sub(1))
                .into_iter()
                .map(|item| SearchHit { item, score: 0.0 })
                .collect();
            return SearchResults {
                hits,
                total_matched: self.total_items,
                exhaustive: true,
            };
        }

        let tokens = tokenize(q);
        let quota = opts.offset.saturating_add(opts.limit);
        let chunk_count = self.chunk_count();
        let mut scored: HashMap<usize, f64> = HashMap::new();
        let mut attempted: HashSet<usize> = HashSet::new();

        loop {
            let candidates: Vec<usize> = self
                .index
                .candidates(&tokens)
                .into_iter()
                .filter(|i| !scored.contains_key(i))
                .collect();
            for idx in candidates {
                let Some(item) = self.item_at(idx) else {
                    continue;
                };
                let score = score_item(&item, q, &tokens);
                if score > 0.0 {
                    scored.insert(idx, score);
                }
            }

            if scored.len() >= quota {
                break;
            }
            let Some(next) = (0..chunk_count)
                .find(|c| !self.indexed.contains(c) && !attempted.contains(c))
            else {
                break;
            };
            attempted.insert(next);
            self.ensure_chunk(next);
        }

        // Fuzzy fallback over resident items when exact matching underfills
        // the quota.
        if scored.len() < quota && opts.fuzzy {
            let resident: Vec<usize> = self.chunks.keys().copied().collect();
            for c in resident {
                let fuzzy: Vec<(usize, f64)> = self.chunks[&c]
                    .items
                    .iter()
                    .filter(|it| !scored.contains_key(&it.index))
                    .filter_map(|it| {
                        fuzzy_score(it, q, self.config.fuzzy_threshold).map(|s| (it.index, s))
                    })
                    .collect();
                scored.extend(fuzzy);
            }
        }

        let mut hits = Vec::with_capacity(scored.len());
        for (idx, score) in scored {
            if let Some(item) = self.item_at(idx) {
                hits.push(SearchHit { item, score });
            }
        }
        let (page, total_matched) = sort_and_paginate(hits, opts);
        etrace!(
            query = q,
            matched = total_matched,
            returned = page.len(),
            "search"
        );
        SearchResults {
            hits: page,
            total_matched,
            exhaustive: self.indexed.len() >= chunk_count,
        }
    }

    pub fn index_stats(&self) -> (usize, usize) {
        (self.index.term_count(), self.index.indexed_items())
    }

    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            total_items: self.total_items,
            resident_chunks: self.chunks.len(),
            indexed_chunks: self.indexed.len(),
            fetches: self.fetches,
            cache_hits: self.cache_hits,
            coalesced: self.coalesced,
            evictions: self.evictions,
            failed_fetches: self.failed_fetches,
        }
    }

    // ---- internals -------------------------------------------------------

    /// Makes `chunk` resident. Returns whether it is resident afterwards.
    fn ensure_chunk(&mut self, chunk: usize) -> bool {
        if chunk >= self.chunk_count() {
            return false;
        }
        if self.chunks.contains_key(&chunk) {
            self.touch(chunk);
            self.cache_hits += 1;
            return true;
        }
        if !self.loading.insert(chunk) {
            // A load for this chunk is already in flight.
            self.coalesced += 1;
            return false;
        }

        let size = self.config.chunk_size;
        let offset = chunk * size;
        let len = size.min(self.total_items - offset);
        self.fetches += 1;
        let result = self.source.fetch(offset, len);
        self.loading.remove(&chunk);

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                self.failed_fetches += 1;
                ewarn!(chunk, error = %err, "chunk load failed");
                return false;
            }
        };

        let items: Vec<Item> = page
            .seeds
            .into_iter()
            .take(len)
            .enumerate()
            .map(|(i, seed)| Item::from_seed(offset + i, seed))
            .collect();

        if self.config.build_index && self.indexed.insert(chunk) {
            for item in &items {
                self.index.index_item(item);
            }
        }

        self.access_clock += 1;
        self.chunks.insert(
            chunk,
            Chunk {
                items,
                last_access: self.access_clock,
            },
        );
        etrace!(chunk, resident = self.chunks.len(), "chunk loaded");
        self.evict_if_needed(chunk);
        true
    }

    fn touch(&mut self, chunk: usize) {
        self.access_clock += 1;
        if let Some(c) = self.chunks.get_mut(&chunk) {
            c.last_access = self.access_clock;
        }
    }

    /// True LRU over last access (not the position-based approximation of
    /// sorting by `chunk_index * chunk_size`). The just-loaded chunk is
    /// never the victim.
    fn evict_if_needed(&mut self, protect: usize) {
        while self.chunks.len() > self.config.max_memory_chunks {
            let victim = self
                .chunks
                .iter()
                .filter(|&(&c, _)| c != protect)
                .min_by_key(|(_, chunk)| chunk.last_access)
                .map(|(&c, _)| c);
            let Some(victim) = victim else {
                break;
            };
            self.chunks.remove(&victim);
            self.evictions += 1;
            edebug!(victim, resident = self.chunks.len(), "chunk evicted");
        }
    }
}
