use alloc::vec::Vec;
use core::cell::Cell;
use core::cmp;

use crate::fenwick::Fenwick;
use crate::{
    Align, FrameState, ScrollDirection, ScrollState, ViewportState, VirtualRow, VisibleRange,
    WindowOptions, WindowStats,
};

/// A headless virtual-scrolling window.
///
/// Converts viewport geometry plus height knowledge into a buffered visible
/// index range and per-index pixel offsets. This type is intentionally
/// UI-agnostic:
/// - It does not hold any UI objects and knows nothing about the dataset.
/// - The host drives it by feeding viewport height, scroll offsets and item
///   height measurements.
/// - Unmeasured items are estimated; once measurements arrive, a smoothed
///   running average takes over as the estimate.
///
/// For data loading, node pooling and scroll orchestration, see the
/// `vscroll-engine` crate.
#[derive(Clone, Debug)]
pub struct Window {
    options: WindowOptions,
    viewport_height: u32,
    scroll_offset: u64,
    is_scrolling: bool,
    scroll_direction: Option<ScrollDirection>,
    last_scroll_event_ms: Option<u64>,

    heights: Vec<u32>,
    measured: Vec<bool>,
    sums: Fenwick,

    avg_height: f64,
    // Value currently stored in unmeasured slots (rounded average).
    unmeasured_estimate: u32,
    measured_count: usize,
    measurements_since_prune: u32,
    pruned_total: u64,

    notify_depth: Cell<usize>,
    notify_pending: Cell<bool>,
}

impl Window {
    pub fn new(options: WindowOptions) -> Self {
        vdebug!(
            count = options.count,
            buffer = options.buffer,
            "Window::new"
        );
        let mut w = Self {
            viewport_height: options.initial_viewport,
            scroll_offset: options.initial_offset,
            is_scrolling: false,
            scroll_direction: None,
            last_scroll_event_ms: None,
            heights: Vec::new(),
            measured: Vec::new(),
            sums: Fenwick::from_heights(&[]),
            avg_height: 1.0,
            unmeasured_estimate: 1,
            measured_count: 0,
            measurements_since_prune: 0,
            pruned_total: 0,
            options,
            notify_depth: Cell::new(0),
            notify_pending: Cell::new(false),
        };
        w.rebuild_estimates();
        w
    }

    pub fn options(&self) -> &WindowOptions {
        &self.options
    }

    pub fn count(&self) -> usize {
        self.options.count
    }

    pub fn set_count(&mut self, count: usize) {
        if self.options.count == count {
            return;
        }
        self.options.count = count;
        self.rebuild_estimates();
        self.notify();
    }

    // ---- notification ----------------------------------------------------

    fn notify_now(&self) {
        if let Some(cb) = &self.options.on_change {
            cb(self, self.is_scrolling);
        }
    }

    fn notify(&self) {
        if self.notify_depth.get() > 0 {
            self.notify_pending.set(true);
            return;
        }
        self.notify_now();
    }

    /// Batches multiple updates into a single `on_change` notification.
    ///
    /// On a typical frame the host updates the viewport height, scroll offset
    /// and scrolling state together; without batching each setter would fire
    /// `on_change` separately.
    pub fn batch_update(&mut self, f: impl FnOnce(&mut Self)) {
        let depth = self.notify_depth.get();
        self.notify_depth.set(depth.saturating_add(1));

        f(self);

        let depth = self.notify_depth.get();
        debug_assert!(depth > 0, "notify_depth underflow");
        let next = depth.saturating_sub(1);
        self.notify_depth.set(next);

        if next == 0 && self.notify_pending.replace(false) {
            self.notify_now();
        }
    }

    // ---- viewport & scrolling --------------------------------------------

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        if self.viewport_height == height {
            return;
        }
        self.viewport_height = height;
        self.notify();
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: u64) {
        if self.scroll_offset == offset {
            return;
        }
        let prev = self.scroll_offset;
        self.scroll_offset = offset;
        self.scroll_direction = match offset.cmp(&prev) {
            cmp::Ordering::Greater => Some(ScrollDirection::Forward),
            cmp::Ordering::Less => Some(ScrollDirection::Backward),
            cmp::Ordering::Equal => self.scroll_direction,
        };
        self.notify();
    }

    pub fn set_scroll_offset_clamped(&mut self, offset: u64) {
        let clamped = self.clamp_scroll_offset(offset);
        self.set_scroll_offset(clamped);
    }

    /// Applies a scroll offset update from the host (wheel/drag/touch) and
    /// marks the window as scrolling.
    pub fn apply_scroll_event(&mut self, offset: u64, now_ms: u64) {
        vtrace!(offset, now_ms, "apply_scroll_event");
        self.batch_update(|w| {
            w.set_scroll_offset_clamped(offset);
            w.notify_scroll_event(now_ms);
        });
    }

    /// Applies both viewport height and scroll offset in a single coalesced
    /// update. This is the recommended per-frame entry point for hosts.
    pub fn apply_frame(&mut self, viewport_height: u32, offset: u64, now_ms: u64) {
        self.batch_update(|w| {
            w.set_viewport_height(viewport_height);
            w.set_scroll_offset_clamped(offset);
            w.notify_scroll_event(now_ms);
        });
    }

    pub fn notify_scroll_event(&mut self, now_ms: u64) {
        self.last_scroll_event_ms = Some(now_ms);
        self.set_is_scrolling(true);
    }

    pub fn is_scrolling(&self) -> bool {
        self.is_scrolling
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.scroll_direction
    }

    pub fn set_is_scrolling(&mut self, is_scrolling: bool) {
        if self.is_scrolling == is_scrolling {
            return;
        }
        self.is_scrolling = is_scrolling;
        if !is_scrolling {
            self.scroll_direction = None;
            self.last_scroll_event_ms = None;
        }
        self.notify();
    }

    /// Resets `is_scrolling` once no scroll event has arrived for the
    /// configured delay. Call this on a frame/timer tick.
    ///
    /// Returns `true` on the scrolling → idle transition.
    pub fn update_scrolling(&mut self, now_ms: u64) -> bool {
        if !self.is_scrolling {
            return false;
        }
        let Some(last) = self.last_scroll_event_ms else {
            return false;
        };
        if now_ms.saturating_sub(last) >= self.options.scrolling_reset_delay_ms {
            self.set_is_scrolling(false);
            return true;
        }
        false
    }

    // ---- heights & measurement -------------------------------------------

    /// Records a measured height for `index`.
    ///
    /// Out-of-range indices and zero heights are rejected without mutating
    /// state. The running average is updated with exponential smoothing so a
    /// single outlier cannot distort it, and is floored at 1 px to keep
    /// offset-from-scroll math free of division problems.
    pub fn update_item_height(&mut self, index: usize, height: u32) -> bool {
        if index >= self.options.count || height == 0 {
            vwarn!(index, height, "update_item_height: rejected");
            return false;
        }

        let cur = self.heights[index];
        if !self.measured[index] {
            self.measured[index] = true;
            self.measured_count += 1;
        }
        if cur != height {
            self.heights[index] = height;
            self.sums.add(index, height as i64 - cur as i64);
        }

        let w = self.options.smoothing;
        self.avg_height = ((1.0 - w) * self.avg_height + w * height as f64).max(1.0);
        self.refresh_unmeasured_estimate();

        self.measurements_since_prune += 1;
        if self.measurements_since_prune >= self.options.prune_interval {
            self.prune_measurements();
        }

        self.notify();
        true
    }

    /// Re-seeds unmeasured slots when the rounded average drifts.
    ///
    /// O(n) when it fires, but the rounded average stabilizes quickly under
    /// smoothing, so this amortizes to a handful of rebuilds per session.
    fn refresh_unmeasured_estimate(&mut self) {
        // Round half-up without `f64::round`, which needs std.
        let est = ((self.avg_height + 0.5) as u32).max(1);
        if est == self.unmeasured_estimate || self.measured_count == 0 {
            return;
        }
        self.unmeasured_estimate = est;
        for i in 0..self.options.count {
            if !self.measured[i] {
                self.heights[i] = est;
            }
        }
        self.sums = Fenwick::from_heights(&self.heights);
        vtrace!(estimate = est, "refresh_unmeasured_estimate");
    }

    /// Drops measurements far outside the visible range, bounding memory of
    /// long scroll sessions. Pruned slots fall back to the current estimate.
    fn prune_measurements(&mut self) {
        self.measurements_since_prune = 0;
        let Some(visible) = self.visible_range() else {
            return;
        };
        let retention = self.options.buffer.saturating_mul(self.options.retention_multiple);
        let keep_start = visible.start.saturating_sub(retention);
        let keep_end = visible.end.saturating_add(retention);

        let mut pruned = 0u64;
        for i in 0..self.options.count {
            if !self.measured[i] || (i >= keep_start && i <= keep_end) {
                continue;
            }
            self.measured[i] = false;
            self.heights[i] = self.unmeasured_estimate;
            self.measured_count -= 1;
            pruned += 1;
        }
        if pruned > 0 {
            self.sums = Fenwick::from_heights(&self.heights);
            self.pruned_total += pruned;
            vdebug!(pruned, keep_start, keep_end, "prune_measurements");
        }
    }

    pub fn is_measured(&self, index: usize) -> bool {
        self.measured.get(index).copied().unwrap_or(false)
    }

    pub fn item_height(&self, index: usize) -> Option<u32> {
        self.heights.get(index).copied()
    }

    /// Pixel offset of the start of `index`: the sum of heights (measured or
    /// estimated) of all items below it. `index == count` yields the total
    /// list height.
    pub fn item_offset(&self, index: usize) -> Option<u64> {
        if index > self.options.count {
            return None;
        }
        Some(self.sums.prefix_sum(index))
    }

    pub fn row(&self, index: usize) -> Option<VirtualRow> {
        if index >= self.options.count {
            return None;
        }
        Some(VirtualRow {
            index,
            start: self.sums.prefix_sum(index),
            height: self.heights[index],
        })
    }

    /// Index of the item occupying pixel `offset`, clamped to the last item.
    pub fn find_item_at_offset(&self, offset: u64) -> Option<usize> {
        if self.options.count == 0 {
            return None;
        }
        Some(self.sums.lower_bound(offset).min(self.options.count - 1))
    }

    pub fn average_height(&self) -> f64 {
        self.avg_height
    }

    pub fn measured_count(&self) -> usize {
        self.measured_count
    }

    pub fn total_height(&self) -> u64 {
        self.sums.total()
    }

    pub fn max_scroll_offset(&self) -> u64 {
        self.total_height()
            .saturating_sub(self.viewport_height as u64)
    }

    pub fn clamp_scroll_offset(&self, offset: u64) -> u64 {
        offset.min(self.max_scroll_offset())
    }

    // ---- visible range ---------------------------------------------------

    /// The buffered range of indices that should currently be rendered.
    ///
    /// Returns `None` for an empty list or zero-height viewport; otherwise
    /// `start <= end` and both are within `[0, count - 1]`.
    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.visible_range_for(self.scroll_offset, self.viewport_height)
    }

    pub fn visible_range_for(&self, scroll_offset: u64, viewport_height: u32) -> Option<VisibleRange> {
        let count = self.options.count;
        if count == 0 || viewport_height == 0 {
            return None;
        }

        let max_scroll = self
            .total_height()
            .saturating_sub(viewport_height as u64);
        let offset = scroll_offset.min(max_scroll);
        let first = self.sums.lower_bound(offset).min(count - 1);
        let bottom = offset.saturating_add(viewport_height as u64).saturating_sub(1);
        let last = self.sums.lower_bound(bottom).min(count - 1);

        let buffer = self.options.buffer;
        Some(VisibleRange {
            start: first.saturating_sub(buffer),
            end: cmp::min(last.saturating_add(buffer), count - 1),
        })
    }

    /// Iterates the rows of the current visible range without allocating.
    pub fn for_each_visible_row(&self, mut f: impl FnMut(VirtualRow)) {
        let Some(range) = self.visible_range() else {
            return;
        };
        let mut start = self.sums.prefix_sum(range.start);
        for i in range.start..=range.end {
            let height = self.heights[i];
            f(VirtualRow {
                index: i,
                start,
                height,
            });
            start = start.saturating_add(height as u64);
        }
    }

    // ---- programmatic scrolling ------------------------------------------

    /// Computes the clamped target offset that brings `index` into view with
    /// the requested alignment. Out-of-range indices yield `None`.
    pub fn scroll_offset_for(&self, index: usize, align: Align) -> Option<u64> {
        if index >= self.options.count {
            return None;
        }
        let row = self.row(index)?;
        let view = self.viewport_height as u64;

        let target = match align {
            Align::Start => row.start,
            Align::End => row.end().saturating_sub(view),
            Align::Center => {
                let center = row.start.saturating_add(row.height as u64 / 2);
                center.saturating_sub(view / 2)
            }
            Align::Auto => {
                let cur = self.scroll_offset;
                let cur_end = cur.saturating_add(view);
                if row.start >= cur && row.end() <= cur_end {
                    cur
                } else if row.start < cur {
                    row.start
                } else {
                    row.end().saturating_sub(view)
                }
            }
        };

        Some(self.clamp_scroll_offset(target))
    }

    /// Scrolls so that `index` is aligned per `align`.
    ///
    /// Returns the applied (clamped) offset, or `None` when `index` is out of
    /// range (state is left untouched).
    pub fn scroll_to_item(&mut self, index: usize, align: Align) -> Option<u64> {
        let offset = self.scroll_offset_for(index, align)?;
        self.set_scroll_offset(offset);
        Some(offset)
    }

    // ---- persistence & stats ---------------------------------------------

    /// Exports measured heights for persistence.
    pub fn export_measurements(&self) -> Vec<(usize, u32)> {
        let mut out = Vec::with_capacity(self.measured_count);
        for i in 0..self.options.count {
            if self.measured[i] {
                out.push((i, self.heights[i]));
            }
        }
        out
    }

    /// Restores previously exported measurements. Entries with out-of-range
    /// indices or zero heights are skipped. The running average becomes the
    /// mean of the imported measurements.
    pub fn import_measurements(&mut self, entries: impl IntoIterator<Item = (usize, u32)>) {
        let mut sum = 0u64;
        let mut n = 0u64;
        for (index, height) in entries {
            if index >= self.options.count || height == 0 {
                continue;
            }
            let cur = self.heights[index];
            if !self.measured[index] {
                self.measured[index] = true;
                self.measured_count += 1;
            }
            if cur != height {
                self.heights[index] = height;
                self.sums.add(index, height as i64 - cur as i64);
            }
            sum += height as u64;
            n += 1;
        }
        if n > 0 {
            self.avg_height = (sum as f64 / n as f64).max(1.0);
            self.refresh_unmeasured_estimate();
        }
        vdebug!(entries = n, "import_measurements");
        self.notify();
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats {
            total_items: self.options.count,
            measured_items: self.measured_count,
            pruned_measurements: self.pruned_total,
            average_height: self.avg_height,
            total_height: self.total_height(),
        }
    }

    pub fn viewport_state(&self) -> ViewportState {
        ViewportState {
            height: self.viewport_height,
        }
    }

    pub fn scroll_state(&self) -> ScrollState {
        ScrollState {
            offset: self.scroll_offset,
            is_scrolling: self.is_scrolling,
        }
    }

    pub fn frame_state(&self) -> FrameState {
        FrameState {
            viewport: self.viewport_state(),
            scroll: self.scroll_state(),
        }
    }

    /// Restores viewport + scroll state from a previously captured snapshot.
    ///
    /// When `frame.scroll.is_scrolling` is `true`, the internal scrolling
    /// timers are updated as if a scroll event happened at `now_ms`.
    pub fn restore_frame_state(&mut self, frame: FrameState, now_ms: u64) {
        self.batch_update(|w| {
            w.set_viewport_height(frame.viewport.height);
            w.set_scroll_offset_clamped(frame.scroll.offset);
            if frame.scroll.is_scrolling {
                w.notify_scroll_event(now_ms);
            } else {
                w.set_is_scrolling(false);
            }
        });
    }

    // ---- internals -------------------------------------------------------

    fn rebuild_estimates(&mut self) {
        let count = self.options.count;
        self.heights.clear();
        self.measured.clear();
        self.heights.reserve_exact(count);
        self.measured.reserve_exact(count);

        let mut sum = 0u64;
        for i in 0..count {
            let est = ((self.options.estimate_height)(i)).max(1);
            sum += est as u64;
            self.heights.push(est);
            self.measured.push(false);
        }
        self.measured_count = 0;
        self.measurements_since_prune = 0;
        self.avg_height = if count > 0 {
            (sum as f64 / count as f64).max(1.0)
        } else {
            1.0
        };
        self.unmeasured_estimate = ((self.avg_height + 0.5) as u32).max(1);
        self.sums = Fenwick::from_heights(&self.heights);
        vdebug!(count, avg = self.avg_height, "rebuild_estimates");
    }
}
