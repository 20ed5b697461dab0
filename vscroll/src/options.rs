use alloc::sync::Arc;

use crate::window::Window;

/// A callback fired when the window's internal state changes.
///
/// The second argument is `is_scrolling`.
pub type OnChangeCallback = Arc<dyn Fn(&Window, bool) + Send + Sync>;

/// Configuration for [`crate::Window`].
///
/// Cheap to clone: the estimate hook is stored in an `Arc` so callers can
/// tweak a few fields and rebuild without reallocating closures.
pub struct WindowOptions {
    pub count: usize,

    /// Initial per-item height estimate, used until an item is measured.
    /// Once measurements arrive, the smoothed average height takes over for
    /// unmeasured items.
    pub estimate_height: Arc<dyn Fn(usize) -> u32 + Send + Sync>,

    /// Extra items rendered on each side of the strictly visible span.
    pub buffer: usize,

    /// Measurements farther than `buffer * retention_multiple` items outside
    /// the visible range are pruned back to estimates.
    pub retention_multiple: usize,

    /// How many measurements between pruning passes.
    pub prune_interval: u32,

    /// Weight of a new measurement in the running average
    /// (`avg = (1 - w) * avg + w * height`).
    pub smoothing: f64,

    /// Initial viewport height in pixels.
    pub initial_viewport: u32,

    /// Initial scroll offset in pixels.
    pub initial_offset: u64,

    /// Debounced delay for resetting `is_scrolling` after the last scroll
    /// event (see `Window::update_scrolling`).
    pub scrolling_reset_delay_ms: u64,

    /// Optional callback fired when the window's state changes.
    pub on_change: Option<OnChangeCallback>,
}

impl WindowOptions {
    /// Creates options for a list of `count` items with a uniform estimate.
    pub fn new(count: usize, estimated_height: u32) -> Self {
        Self::new_with_estimate(count, move |_| estimated_height)
    }

    /// Creates options with a per-index estimate hook.
    pub fn new_with_estimate(
        count: usize,
        estimate_height: impl Fn(usize) -> u32 + Send + Sync + 'static,
    ) -> Self {
        Self {
            count,
            estimate_height: Arc::new(estimate_height),
            buffer: 10,
            retention_multiple: 5,
            prune_interval: 200,
            smoothing: 0.2,
            initial_viewport: 0,
            initial_offset: 0,
            scrolling_reset_delay_ms: 150,
            on_change: None,
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_retention_multiple(mut self, retention_multiple: usize) -> Self {
        self.retention_multiple = retention_multiple;
        self
    }

    pub fn with_prune_interval(mut self, prune_interval: u32) -> Self {
        self.prune_interval = prune_interval;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    pub fn with_initial_viewport(mut self, initial_viewport: u32) -> Self {
        self.initial_viewport = initial_viewport;
        self
    }

    pub fn with_initial_offset(mut self, initial_offset: u64) -> Self {
        self.initial_offset = initial_offset;
        self
    }

    pub fn with_scrolling_reset_delay_ms(mut self, delay_ms: u64) -> Self {
        self.scrolling_reset_delay_ms = delay_ms;
        self
    }

    pub fn with_on_change(
        mut self,
        on_change: Option<impl Fn(&Window, bool) + Send + Sync + 'static>,
    ) -> Self {
        self.on_change = on_change.map(|f| Arc::new(f) as _);
        self
    }
}

impl Clone for WindowOptions {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            estimate_height: Arc::clone(&self.estimate_height),
            buffer: self.buffer,
            retention_multiple: self.retention_multiple,
            prune_interval: self.prune_interval,
            smoothing: self.smoothing,
            initial_viewport: self.initial_viewport,
            initial_offset: self.initial_offset,
            scrolling_reset_delay_ms: self.scrolling_reset_delay_ms,
            on_change: self.on_change.clone(),
        }
    }
}

impl core::fmt::Debug for WindowOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WindowOptions")
            .field("count", &self.count)
            .field("buffer", &self.buffer)
            .field("retention_multiple", &self.retention_multiple)
            .field("prune_interval", &self.prune_interval)
            .field("smoothing", &self.smoothing)
            .field("initial_viewport", &self.initial_viewport)
            .field("initial_offset", &self.initial_offset)
            .field("scrolling_reset_delay_ms", &self.scrolling_reset_delay_ms)
            .finish_non_exhaustive()
    }
}
