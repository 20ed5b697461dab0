use std::collections::HashMap;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::index::{fuzzy_score, score_item, sort_and_paginate, tokenize, SearchIndex};
use crate::{Item, SearchHit, SearchOptions, SearchResults};

const REQUEST_QUEUE_DEPTH: usize = 64;

enum WorkerRequest {
    Index(Vec<Item>),
    Search {
        id: u64,
        query: String,
        opts: SearchOptions,
    },
    Shutdown,
}

struct WorkerResponse {
    id: u64,
    results: SearchResults,
}

/// Off-main-thread search for large datasets.
///
/// The engine spawns one of these when `total_items` exceeds the worker
/// threshold. Items are streamed in as their chunks load; search requests and
/// responses are correlated by id, and the caller keeps only responses
/// matching the last-issued request — results for a stale query never
/// overwrite results for a newer one. There is no hard cancellation: a
/// superseded request still completes on the worker and its response is
/// simply discarded here.
pub struct SearchWorker {
    req_tx: SyncSender<WorkerRequest>,
    resp_rx: Receiver<WorkerResponse>,
    next_id: u64,
    last_issued: u64,
    handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    pub fn spawn(total_items: usize, fuzzy_threshold: f64) -> Self {
        let (req_tx, req_rx) = mpsc::sync_channel(REQUEST_QUEUE_DEPTH);
        let (resp_tx, resp_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("vscroll-search".into())
            .spawn(move || worker_loop(req_rx, resp_tx, total_items, fuzzy_threshold))
            .expect("spawn search worker thread");

        edebug!(total_items, "search worker spawned");
        Self {
            req_tx,
            resp_rx,
            next_id: 0,
            last_issued: 0,
            handle: Some(handle),
        }
    }

    /// Streams freshly loaded items to the worker-side index.
    ///
    /// Returns `false` when the request queue is full (the caller may retry
    /// on a later frame) or the worker is gone.
    pub fn index_items(&self, items: Vec<Item>) -> bool {
        match self.req_tx.try_send(WorkerRequest::Index(items)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Dispatches a search request; returns its id, or `None` when the queue
    /// is full. Issuing a new request makes all earlier responses stale.
    pub fn submit(&mut self, query: &str, opts: SearchOptions) -> Option<u64> {
        let id = self.next_id;
        let request = WorkerRequest::Search {
            id,
            query: query.to_owned(),
            opts,
        };
        match self.req_tx.try_send(request) {
            Ok(()) => {
                self.next_id += 1;
                self.last_issued = id;
                etrace!(id, query, "search dispatched");
                Some(id)
            }
            Err(_) => None,
        }
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    /// Drains completed responses, discarding any whose id does not match the
    /// last dispatched request.
    pub fn try_recv_latest(&mut self) -> Option<SearchResults> {
        let mut latest = None;
        while let Ok(resp) = self.resp_rx.try_recv() {
            if resp.id == self.last_issued {
                latest = Some(resp.results);
            } else {
                etrace!(id = resp.id, last = self.last_issued, "stale search response dropped");
            }
        }
        latest
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        let _ = self.req_tx.try_send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    req_rx: Receiver<WorkerRequest>,
    resp_tx: mpsc::Sender<WorkerResponse>,
    total_items: usize,
    fuzzy_threshold: f64,
) {
    let mut index = SearchIndex::new();
    let mut store: HashMap<usize, Item> = HashMap::new();

    while let Ok(request) = req_rx.recv() {
        match request {
            WorkerRequest::Index(items) => {
                for item in items {
                    if !store.contains_key(&item.index) {
                        index.index_item(&item);
                        store.insert(item.index, item);
                    }
                }
            }
            WorkerRequest::Search { id, query, opts } => {
                let results = run_search(&index, &store, total_items, fuzzy_threshold, &query, &opts);
                if resp_tx.send(WorkerResponse { id, results }).is_err() {
                    break;
                }
            }
            WorkerRequest::Shutdown => break,
        }
    }
}

fn run_search(
    index: &SearchIndex,
    store: &HashMap<usize, Item>,
    total_items: usize,
    fuzzy_threshold: f64,
    query: &str,
    opts: &SearchOptions,
) -> SearchResults {
    let q = query.trim();
    let exhaustive = store.len() >= total_items;
    if q.is_empty() {
        let mut indices: Vec<usize> = store.keys().copied().collect();
        indices.sort_unstable();
        let hits = indices
            .into_iter()
            .skip(opts.offset)
            .take(opts.limit)
            .filter_map(|i| store.get(&i))
            .map(|item| SearchHit {
                item: item.clone(),
                score: 0.0,
            })
            .collect();
        return SearchResults {
            hits,
            total_matched: store.len(),
            exhaustive,
        };
    }

    let tokens = tokenize(q);
    let quota = opts.offset.saturating_add(opts.limit);
    let mut hits: Vec<SearchHit> = index
        .candidates(&tokens)
        .into_iter()
        .filter_map(|i| store.get(&i))
        .filter_map(|item| {
            let score = score_item(item, q, &tokens);
            (score > 0.0).then(|| SearchHit {
                item: item.clone(),
                score,
            })
        })
        .collect();

    if hits.len() < quota && opts.fuzzy {
        let matched: std::collections::HashSet<usize> =
            hits.iter().map(|h| h.item.index).collect();
        for item in store.values() {
            if matched.contains(&item.index) {
                continue;
            }
            if let Some(score) = fuzzy_score(item, q, fuzzy_threshold) {
                hits.push(SearchHit {
                    item: item.clone(),
                    score,
                });
            }
        }
    }

    let (page, total_matched) = sort_and_paginate(hits, opts);
    SearchResults {
        hits: page,
        total_matched,
        exhaustive,
    }
}
