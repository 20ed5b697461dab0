/// Easing curve for smooth programmatic scrolling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Easing {
    Linear,
    SmoothStep,
    #[default]
    EaseInOutCubic,
}

impl Easing {
    pub fn sample(self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
            Self::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - (u * u * u) / 2.0
                }
            }
        }
    }
}

/// An in-flight smooth scroll: interpolates the scroll offset from `from` to
/// `to` over `duration_ms`, driven by the manager's `tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollTween {
    from: u64,
    to: u64,
    start_ms: u64,
    duration_ms: u64,
    easing: Easing,
}

impl ScrollTween {
    pub fn new(from: u64, to: u64, start_ms: u64, duration_ms: u64, easing: Easing) -> Self {
        Self {
            from,
            to,
            start_ms,
            duration_ms: duration_ms.max(1),
            easing,
        }
    }

    pub fn target(&self) -> u64 {
        self.to
    }

    pub fn is_done(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.start_ms) >= self.duration_ms
    }

    /// The interpolated offset at `now_ms`, clamped to the tween's endpoints
    /// in time.
    pub fn sample(&self, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.start_ms);
        let t = (elapsed as f64 / self.duration_ms as f64).clamp(0.0, 1.0);
        if t >= 1.0 {
            return self.to;
        }
        let eased = self.easing.sample(t);
        let from = self.from as f64;
        let to = self.to as f64;
        let v = from + (to - from) * eased;
        if v <= 0.0 { 0 } else { v as u64 }
    }
}
