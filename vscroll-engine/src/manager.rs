use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use vscroll::{Align, ScrollDirection, VirtualRow, VisibleRange, Window, WindowStats};

use crate::pool::NodeId;
use crate::tween::{Easing, ScrollTween};
use crate::{
    CacheStats, DataProvider, ItemCache, ProviderStats, SearchOptions, SearchResults, SearchWorker,
};

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerConfig {
    /// Scroll events closer together than this are coalesced (~60 Hz).
    pub scroll_debounce_ms: u64,
    /// Scrolled fraction of the list at which infinite loading triggers.
    pub load_threshold: f64,
    /// Minimum gap between infinite-load triggers.
    pub load_cooldown_ms: u64,
    /// Velocity (px/ms) past which a flick counts as a fast scroll.
    pub fast_scroll_velocity: f64,
    /// Items preloaded ahead of a fast scroll.
    pub preload_items: usize,
    /// Sliding window for the FPS counter.
    pub fps_window_ms: u64,
    /// Optional snap alignment applied when a scroll session ends.
    pub snap_align: Option<Align>,
    /// Snapping is skipped when FPS drops below this floor.
    pub snap_min_fps: f64,
    /// Dataset size past which search moves to the background worker.
    pub worker_threshold: usize,
    /// Duration of a smooth `scroll_to_item`.
    pub smooth_scroll_duration_ms: u64,
    /// Easing curve for smooth scrolling.
    pub smooth_scroll_easing: Easing,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            scroll_debounce_ms: 16,
            load_threshold: 0.8,
            load_cooldown_ms: 1000,
            fast_scroll_velocity: 3.0,
            preload_items: 100,
            fps_window_ms: 1000,
            snap_align: None,
            snap_min_fps: 30.0,
            worker_threshold: 5000,
            smooth_scroll_duration_ms: 250,
            smooth_scroll_easing: Easing::default(),
        }
    }
}

/// Notifications the host may subscribe to for UI feedback.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    ScrollChanged {
        range: Option<VisibleRange>,
        direction: Option<ScrollDirection>,
        velocity: f64,
    },
    LoadingStarted,
    LoadingEnded,
    ScrollEnded {
        offset: u64,
    },
}

pub type EventListener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// A visual node placed at a window-computed offset.
#[derive(Clone, Copy, Debug)]
pub struct Placement {
    pub row: VirtualRow,
    pub node: NodeId,
}

#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineStats {
    pub window: WindowStats,
    pub provider: ProviderStats,
    pub cache: CacheStats,
    pub fps: f64,
    pub avg_render_ms: f64,
}

/// Orchestrates the window, provider and cache from live scroll signals.
///
/// Per-session state machine: idle → (scroll event) → scrolling → (quiet for
/// the window's reset delay, observed via `tick`) → idle, with snap-to-item
/// hooks firing on the scrolling → idle transition.
pub struct ScrollManager<N> {
    window: Window,
    provider: DataProvider,
    cache: ItemCache<N>,
    config: ManagerConfig,
    listeners: Vec<EventListener>,
    worker: Option<SearchWorker>,
    tween: Option<ScrollTween>,

    // item index → node currently displaying it
    active: HashMap<usize, NodeId>,
    // chunks already streamed to the worker-side index
    fed_to_worker: HashSet<usize>,

    last_handled_ms: Option<u64>,
    last_offset: u64,
    velocity: f64,
    last_load_trigger_ms: Option<u64>,
    last_query: Option<String>,

    frame_stamps: VecDeque<u64>,
    render_durations: VecDeque<u64>,
}

impl<N> ScrollManager<N> {
    pub fn new(
        config: ManagerConfig,
        mut window: Window,
        provider: DataProvider,
        cache: ItemCache<N>,
    ) -> Self {
        window.set_count(provider.total_items());
        let worker = (provider.total_items() > config.worker_threshold).then(|| {
            SearchWorker::spawn(provider.total_items(), provider.config().fuzzy_threshold)
        });
        let last_offset = window.scroll_offset();
        Self {
            window,
            provider,
            cache,
            config,
            listeners: Vec::new(),
            worker,
            tween: None,
            active: HashMap::new(),
            fed_to_worker: HashSet::new(),
            last_handled_ms: None,
            last_offset,
            velocity: 0.0,
            last_load_trigger_ms: None,
            last_query: None,
            frame_stamps: VecDeque::new(),
            render_durations: VecDeque::new(),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    pub fn provider(&self) -> &DataProvider {
        &self.provider
    }

    pub fn cache(&self) -> &ItemCache<N> {
        &self.cache
    }

    pub fn subscribe(&mut self, listener: impl Fn(&EngineEvent) + Send + Sync + 'static) {
        self.listeners.push(Arc::new(listener));
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Handles a live scroll event.
    ///
    /// The offset is always applied to the window (range recomputation never
    /// waits on a load), but the heavier reactions — listener notification,
    /// the infinite-load threshold check, fast-scroll preloading — run at
    /// most once per debounce interval.
    pub fn on_scroll(&mut self, offset: u64, now_ms: u64) -> Option<VisibleRange> {
        // A user scroll wins over an in-flight smooth scroll.
        self.tween = None;
        self.window.apply_scroll_event(offset, now_ms);
        let offset = self.window.scroll_offset();

        let debounced = self
            .last_handled_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < self.config.scroll_debounce_ms);
        if debounced {
            return self.window.visible_range();
        }

        // Both delta and dt are measured from the last handled event, so
        // debounced events in between cannot skew the ratio.
        let dt = self
            .last_handled_ms
            .map(|t| now_ms.saturating_sub(t))
            .unwrap_or(0)
            .max(1);
        let delta = offset.abs_diff(self.last_offset);
        self.velocity = delta as f64 / dt as f64;

        let range = self.window.visible_range();
        self.emit(&EngineEvent::ScrollChanged {
            range,
            direction: self.window.scroll_direction(),
            velocity: self.velocity,
        });

        self.check_infinite_load(offset, now_ms);
        if self.velocity >= self.config.fast_scroll_velocity {
            if let Some(range) = range {
                etrace!(velocity = self.velocity, "fast scroll preload");
                match self.window.scroll_direction() {
                    Some(ScrollDirection::Backward) => {
                        let from = range.start.saturating_sub(self.config.preload_items);
                        self.provider.preload_from(from, self.config.preload_items);
                    }
                    _ => {
                        self.provider.preload_from(range.end + 1, self.config.preload_items);
                    }
                }
            }
        }

        self.last_handled_ms = Some(now_ms);
        self.last_offset = offset;
        range
    }

    /// Whether a smooth scroll is currently in flight.
    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// Advances time-based behaviors: an in-flight smooth scroll, the
    /// scrolling → idle transition (with optional snap-to-item), and the
    /// cache's deferred cleanup. Call once per frame/timer tick.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(tween) = self.tween {
            let offset = tween.sample(now_ms);
            self.window.apply_scroll_event(offset, now_ms);
            self.last_offset = self.window.scroll_offset();
            if tween.is_done(now_ms) {
                self.tween = None;
                self.window.set_is_scrolling(false);
                self.velocity = 0.0;
                let offset = self.window.scroll_offset();
                self.emit(&EngineEvent::ScrollEnded { offset });
            }
            self.cache.maybe_cleanup(now_ms);
            return;
        }
        if self.window.update_scrolling(now_ms) {
            if let Some(align) = self.config.snap_align {
                // Snapping is cosmetic; skip it when the frame budget is
                // already strained.
                if self.fps() >= self.config.snap_min_fps {
                    if let Some(index) = self.window.find_item_at_offset(self.window.scroll_offset())
                    {
                        self.window.scroll_to_item(index, align);
                    }
                }
            }
            self.velocity = 0.0;
            let offset = self.window.scroll_offset();
            self.emit(&EngineEvent::ScrollEnded { offset });
        }
        self.cache.maybe_cleanup(now_ms);
    }

    /// Resolves the current visible range into positioned, pooled nodes.
    ///
    /// Rows whose chunks fail to load are absent from the result and appear
    /// on a later call once their chunk loads. Nodes for rows that left the
    /// range are released back to the cache.
    pub fn items_to_render(&mut self, now_ms: u64) -> Vec<Placement> {
        let Some(range) = self.window.visible_range() else {
            self.release_outside(None, now_ms);
            return Vec::new();
        };

        let missing = self.range_has_missing_chunks(&range);
        if missing {
            self.emit(&EngineEvent::LoadingStarted);
        }
        let items = self.provider.items_in_range(range.start, range.end);
        if missing {
            self.emit(&EngineEvent::LoadingEnded);
        }
        self.feed_worker();

        self.release_outside(Some(range), now_ms);

        let mut placements = Vec::with_capacity(items.len());
        for item in &items {
            let node = match self.active.get(&item.index) {
                Some(&node) => node,
                None => {
                    let node = self.cache.acquire(item, now_ms);
                    self.active.insert(item.index, node);
                    node
                }
            };
            if let Some(row) = self.window.row(item.index) {
                placements.push(Placement { row, node });
            }
        }
        placements
    }

    /// Scrolls so `index` is aligned per `align` and warms the chunks around
    /// the landing range. Out-of-range indices are rejected.
    ///
    /// With `smooth`, the offset is animated over the configured duration by
    /// subsequent `tick` calls instead of jumping; a user scroll event
    /// cancels the animation.
    pub fn scroll_to_item(
        &mut self,
        index: usize,
        align: Align,
        smooth: bool,
        now_ms: u64,
    ) -> Option<u64> {
        let target = self.window.scroll_offset_for(index, align)?;
        self.provider
            .preload_from(index.saturating_sub(self.config.preload_items / 2), self.config.preload_items);
        if smooth {
            self.tween = Some(ScrollTween::new(
                self.window.scroll_offset(),
                target,
                now_ms,
                self.config.smooth_scroll_duration_ms,
                self.config.smooth_scroll_easing,
            ));
        } else {
            self.tween = None;
            self.window.apply_scroll_event(target, now_ms);
            self.last_offset = target;
        }
        Some(target)
    }

    /// Synchronous search through the provider.
    pub fn search(&mut self, query: &str, opts: &SearchOptions) -> SearchResults {
        self.last_query = Some(query.to_owned());
        self.provider.search(query, opts)
    }

    /// Dispatches a search to the background worker when one exists,
    /// otherwise answers synchronously. Returns `None` for the synchronous
    /// path (results come back immediately via `search`).
    pub fn search_async(&mut self, query: &str, opts: SearchOptions) -> Option<u64> {
        self.last_query = Some(query.to_owned());
        self.worker.as_mut()?.submit(query, opts)
    }

    /// Collects the latest worker results, if any. Responses to superseded
    /// queries have already been discarded.
    pub fn poll_search(&mut self) -> Option<SearchResults> {
        self.worker.as_mut()?.try_recv_latest()
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Records a completed frame for FPS tracking.
    pub fn record_frame(&mut self, now_ms: u64) {
        self.frame_stamps.push_back(now_ms);
        let horizon = now_ms.saturating_sub(self.config.fps_window_ms);
        while self.frame_stamps.front().is_some_and(|&t| t < horizon) {
            self.frame_stamps.pop_front();
        }
    }

    /// Records how long a render pass took.
    pub fn record_render_duration(&mut self, duration_ms: u64) {
        self.render_durations.push_back(duration_ms);
        while self.render_durations.len() > 120 {
            self.render_durations.pop_front();
        }
    }

    /// Frames observed within the sliding window, normalized to one second.
    pub fn fps(&self) -> f64 {
        if self.frame_stamps.len() < 2 {
            return 0.0;
        }
        let span = self
            .frame_stamps
            .back()
            .zip(self.frame_stamps.front())
            .map(|(&b, &f)| b.saturating_sub(f))
            .unwrap_or(0)
            .max(1);
        (self.frame_stamps.len() as f64 - 1.0) * 1000.0 / span as f64
    }

    pub fn avg_render_ms(&self) -> f64 {
        if self.render_durations.is_empty() {
            return 0.0;
        }
        self.render_durations.iter().sum::<u64>() as f64 / self.render_durations.len() as f64
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            window: self.window.stats(),
            provider: self.provider.stats(),
            cache: self.cache.stats(),
            fps: self.fps(),
            avg_render_ms: self.avg_render_ms(),
        }
    }

    // ---- internals -------------------------------------------------------

    fn emit(&self, event: &EngineEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    /// Infinite-scroll trigger: ≥ `load_threshold` of the way down, scrolling
    /// forward, more data remaining, and outside the cooldown.
    fn check_infinite_load(&mut self, offset: u64, now_ms: u64) {
        if self.window.scroll_direction() != Some(ScrollDirection::Forward) {
            return;
        }
        if !self.provider.has_more() {
            return;
        }
        let extent = self.window.max_scroll_offset().max(1);
        let ratio = offset as f64 / extent as f64;
        if ratio < self.config.load_threshold {
            return;
        }
        let cooling = self
            .last_load_trigger_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < self.config.load_cooldown_ms);
        if cooling {
            return;
        }

        self.last_load_trigger_ms = Some(now_ms);
        self.emit(&EngineEvent::LoadingStarted);
        let more = self.provider.load_more();
        self.feed_worker();
        self.emit(&EngineEvent::LoadingEnded);
        edebug!(ratio, more, "infinite load triggered");
    }

    fn range_has_missing_chunks(&self, range: &VisibleRange) -> bool {
        let size = self.provider.config().chunk_size;
        let first = range.start / size;
        let last = range.end / size;
        (first..=last).any(|c| !self.provider.is_resident(c))
    }

    /// Streams newly resident chunks to the worker-side search index.
    fn feed_worker(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };
        let size = self.provider.config().chunk_size;
        let total = self.provider.total_items();
        let pending: Vec<usize> = (0..self.provider.chunk_count())
            .filter(|c| self.provider.is_resident(*c) && !self.fed_to_worker.contains(c))
            .collect();
        for c in pending {
            let start = c * size;
            let end = (start + size).min(total) - 1;
            let items = self.provider.items_in_range(start, end);
            if worker.index_items(items) {
                self.fed_to_worker.insert(c);
            }
        }
    }

    fn release_outside(&mut self, range: Option<VisibleRange>, now_ms: u64) {
        let stale: Vec<usize> = self
            .active
            .keys()
            .copied()
            .filter(|&i| !range.is_some_and(|r| r.contains(i)))
            .collect();
        for index in stale {
            if let Some(node) = self.active.remove(&index) {
                self.cache.release(node, now_ms);
            }
        }
    }
}

impl<N> core::fmt::Debug for ScrollManager<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScrollManager")
            .field("window", &self.window)
            .field("active", &self.active.len())
            .field("velocity", &self.velocity)
            .finish_non_exhaustive()
    }
}
