//! Headless virtual-scrolling window math.
//!
//! This crate focuses on the core algorithms needed to present massive lists
//! at interactive frame rates: prefix sums over item heights, fast
//! offset → index lookup, buffered visible ranges, dynamic height measurement
//! with a smoothed running average, and bounded measurement retention.
//!
//! It is UI-agnostic. A hosting layer is expected to provide:
//! - viewport height
//! - scroll offset
//! - item height measurements as rows are actually rendered
//!
//! For chunked data loading, node pooling and scroll orchestration, see the
//! `vscroll-engine` crate.
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod fenwick;
mod options;
mod state;
mod types;
mod window;

#[cfg(test)]
mod tests;

pub use options::{OnChangeCallback, WindowOptions};
pub use state::{FrameState, ScrollState, ViewportState};
pub use types::{Align, ScrollDirection, VirtualRow, VisibleRange, WindowStats};
pub use window::Window;
