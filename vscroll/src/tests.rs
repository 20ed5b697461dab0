use crate::*;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        start + (self.next_u64() % (end_exclusive - start))
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        self.gen_range_u64(start as u64, end_exclusive as u64) as usize
    }

    fn gen_range_u32(&mut self, start: u32, end_exclusive: u32) -> u32 {
        self.gen_range_u64(start as u64, end_exclusive as u64) as u32
    }
}

fn expected_offset(heights: &[u32], index: usize) -> u64 {
    heights[..index].iter().map(|&h| h as u64).sum()
}

fn expected_index_at_offset(heights: &[u32], offset: u64) -> Option<usize> {
    let count = heights.len();
    if count == 0 {
        return None;
    }
    // Match Fenwick::lower_bound semantics: the largest `consumed` with
    // prefix_sum(consumed) <= offset, clamped to a valid index.
    let mut consumed = 0usize;
    let mut prefix = 0u64;
    for &h in heights {
        if prefix + h as u64 <= offset {
            prefix += h as u64;
            consumed += 1;
        } else {
            break;
        }
    }
    Some(consumed.min(count - 1))
}

fn window(count: usize, estimate: u32, viewport: u32) -> Window {
    Window::new(
        WindowOptions::new(count, estimate)
            .with_initial_viewport(viewport)
            // Keep pruning out of the way unless a test asks for it.
            .with_prune_interval(u32::MAX),
    )
}

#[test]
fn offsets_are_cumulative_heights() {
    let mut rng = Lcg::new(7);
    let mut w = window(500, 30, 200);

    let mut heights = alloc::vec![30u32; 500];
    for _ in 0..300 {
        let i = rng.gen_range_usize(0, 500);
        let h = rng.gen_range_u32(1, 120);
        assert!(w.update_item_height(i, h));
        heights[i] = h;
    }
    // The rounded average may have drifted; unmeasured slots must follow it.
    let est = (w.average_height().round() as u32).max(1);
    for (i, h) in heights.iter_mut().enumerate() {
        if !w.is_measured(i) {
            *h = est;
        }
    }

    for i in 0..500 {
        assert_eq!(w.item_offset(i), Some(expected_offset(&heights, i)));
        assert_eq!(
            w.item_offset(i + 1).unwrap(),
            w.item_offset(i).unwrap() + w.item_height(i).unwrap() as u64
        );
    }
    assert_eq!(w.item_offset(500), Some(w.total_height()));
    assert_eq!(w.item_offset(501), None);
}

#[test]
fn find_item_at_offset_matches_reference() {
    let mut rng = Lcg::new(21);
    let mut w = window(200, 25, 100);
    for _ in 0..150 {
        let i = rng.gen_range_usize(0, 200);
        let h = rng.gen_range_u32(1, 80);
        w.update_item_height(i, h);
    }
    let heights: Vec<u32> = (0..200).map(|i| w.item_height(i).unwrap()).collect();

    for _ in 0..500 {
        let off = rng.gen_range_u64(0, w.total_height() + 50);
        assert_eq!(
            w.find_item_at_offset(off),
            expected_index_at_offset(&heights, off),
            "offset {off}"
        );
    }
    assert_eq!(window(0, 25, 100).find_item_at_offset(0), None);
}

#[test]
fn visible_range_is_ordered_and_in_bounds() {
    let mut rng = Lcg::new(3);
    let mut w = Window::new(
        WindowOptions::new(1000, 24)
            .with_initial_viewport(240)
            .with_buffer(10)
            .with_prune_interval(u32::MAX),
    );
    for _ in 0..400 {
        let i = rng.gen_range_usize(0, 1000);
        w.update_item_height(i, rng.gen_range_u32(1, 90));
    }

    for _ in 0..300 {
        let off = rng.gen_range_u64(0, w.total_height() + 1000);
        let range = w.visible_range_for(off, 240).unwrap();
        assert!(range.start <= range.end);
        assert!(range.end < 1000);
    }

    // Buffer expands the strictly visible span on both sides.
    w.set_scroll_offset(w.item_offset(500).unwrap());
    let range = w.visible_range().unwrap();
    assert!(range.start <= 490);
    assert!(range.contains(500));

    assert_eq!(w.visible_range_for(0, 0), None);
    assert_eq!(window(0, 24, 100).visible_range(), None);
}

#[test]
fn invalid_measurements_are_rejected_without_state_change() {
    let mut w = window(10, 40, 100);
    let total = w.total_height();
    let avg = w.average_height();

    assert!(!w.update_item_height(10, 50));
    assert!(!w.update_item_height(usize::MAX, 50));
    assert!(!w.update_item_height(3, 0));

    assert_eq!(w.total_height(), total);
    assert_eq!(w.average_height(), avg);
    assert_eq!(w.measured_count(), 0);
}

#[test]
fn average_is_smoothed_not_instantaneous() {
    let mut w = window(100, 40, 100);
    assert_eq!(w.average_height(), 40.0);

    w.update_item_height(42, 80);
    let avg = w.average_height();
    assert!(avg > 40.0 && avg < 80.0, "avg = {avg}");
    // 0.8 * 40 + 0.2 * 80
    assert!((avg - 48.0).abs() < 1e-9);

    // Repeated measurements converge toward the measured value.
    for _ in 0..200 {
        w.update_item_height(42, 80);
    }
    assert!(w.average_height() > 79.0);
}

#[test]
fn average_never_reaches_zero() {
    let mut w = window(50, 1, 100);
    for i in 0..50 {
        w.update_item_height(i, 1);
    }
    assert!(w.average_height() >= 1.0);
    assert!(w.item_height(0).unwrap() >= 1);
}

#[test]
fn unmeasured_slots_follow_the_running_average() {
    let mut w = window(100, 20, 100);
    // Push the average up firmly.
    for i in 0..20 {
        w.update_item_height(i, 100);
    }
    let est = w.item_height(99).unwrap();
    assert!(est > 20, "estimate {est} should have drifted upward");
    assert_eq!(
        w.item_offset(100).unwrap(),
        (0..100).map(|i| w.item_height(i).unwrap() as u64).sum::<u64>()
    );
}

#[test]
fn unmeasured_estimate_tracks_the_rounded_average() {
    let mut w = window(100, 10, 100);
    // avg: 10 -> 28.0 -> 42.4 -> 53.92 under 0.8/0.2 smoothing; unmeasured
    // slots carry the nearest integer.
    w.update_item_height(0, 100);
    assert_eq!(w.item_height(99), Some(28));
    w.update_item_height(0, 100);
    assert_eq!(w.item_height(99), Some(42));
    w.update_item_height(0, 100);
    assert_eq!(w.item_height(99), Some(54));
}

#[test]
fn measurements_outside_retention_are_pruned() {
    let mut w = Window::new(
        WindowOptions::new(10_000, 30)
            .with_initial_viewport(300)
            .with_buffer(10)
            .with_retention_multiple(5)
            .with_prune_interval(50),
    );

    // Measure rows near the top, then scroll far away and keep measuring.
    for i in 0..50 {
        w.update_item_height(i, 45);
    }
    let far = w.item_offset(9000).unwrap();
    w.set_scroll_offset(far);
    for i in 9000..9100 {
        w.update_item_height(i, 45);
    }

    let stats = w.stats();
    assert!(stats.pruned_measurements > 0, "expected pruning to run");
    assert!(!w.is_measured(0), "top measurements should have been pruned");
    assert!(w.is_measured(9050), "in-retention measurements must survive");
    // Retention bound: nothing measured outside visible ± 5×buffer once a
    // prune pass has run.
    let visible = w.visible_range().unwrap();
    let retention = 50;
    for i in 0..10_000 {
        if w.is_measured(i) {
            assert!(
                i + retention >= visible.start && i <= visible.end + retention,
                "measurement {i} outside retention window"
            );
        }
    }
}

#[test]
fn scroll_to_item_alignments() {
    let mut w = window(100, 50, 200);
    // total height 5000, max scroll 4800

    assert_eq!(w.scroll_to_item(40, Align::Start), Some(2000));
    assert_eq!(w.scroll_to_item(40, Align::End), Some(2050 - 200));
    assert_eq!(w.scroll_to_item(40, Align::Center), Some(2025 - 100));

    // Clamped to the valid scroll extent.
    assert_eq!(w.scroll_to_item(99, Align::Start), Some(4800));
    assert_eq!(w.scroll_to_item(0, Align::End), Some(0));

    // Auto: no movement when fully visible, minimal movement otherwise.
    w.set_scroll_offset(2000);
    assert_eq!(w.scroll_to_item(41, Align::Auto), Some(2000));
    assert_eq!(w.scroll_to_item(10, Align::Auto), Some(500));

    // Out of range: rejected, no mutation.
    let before = w.scroll_offset();
    assert_eq!(w.scroll_to_item(100, Align::Start), None);
    assert_eq!(w.scroll_offset(), before);
}

#[test]
fn scroll_direction_and_idle_reset() {
    let mut w = window(100, 30, 120);

    w.apply_scroll_event(500, 1000);
    assert!(w.is_scrolling());
    assert_eq!(w.scroll_direction(), Some(ScrollDirection::Forward));

    w.apply_scroll_event(200, 1050);
    assert_eq!(w.scroll_direction(), Some(ScrollDirection::Backward));

    assert!(!w.update_scrolling(1100)); // only 50ms quiet
    assert!(w.is_scrolling());
    assert!(w.update_scrolling(1300)); // past the 150ms delay
    assert!(!w.is_scrolling());
    assert_eq!(w.scroll_direction(), None);
}

#[test]
fn batch_update_coalesces_notifications() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = Arc::clone(&calls);
    let mut w = Window::new(
        WindowOptions::new(100, 30)
            .with_initial_viewport(120)
            .with_on_change(Some(move |_: &Window, _| {
                calls2.fetch_add(1, Ordering::SeqCst);
            })),
    );

    calls.store(0, Ordering::SeqCst);
    w.apply_frame(200, 700, 16);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    calls.store(0, Ordering::SeqCst);
    w.set_viewport_height(200); // unchanged, no notification
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn measurement_export_import_roundtrip() {
    let mut w = window(100, 30, 120);
    for i in 20..40 {
        w.update_item_height(i, 60 + i as u32);
    }
    let exported = w.export_measurements();
    assert_eq!(exported.len(), 20);

    let mut fresh = window(100, 30, 120);
    fresh.import_measurements(exported.clone());
    for (i, h) in exported {
        assert_eq!(fresh.item_height(i), Some(h));
        assert!(fresh.is_measured(i));
    }
    assert!(fresh.average_height() > 30.0);

    // Bad entries are skipped.
    let mut other = window(10, 30, 120);
    other.import_measurements([(99, 50), (2, 0), (3, 44)]);
    assert_eq!(other.measured_count(), 1);
    assert_eq!(other.item_height(3), Some(44));
}

#[test]
fn frame_state_snapshot_roundtrip() {
    let mut w = window(100, 30, 120);
    w.apply_frame(150, 800, 10);
    let snap = w.frame_state();
    assert!(snap.scroll.is_scrolling);
    assert_eq!(snap.scroll.offset, 800);
    assert_eq!(snap.viewport.height, 150);

    let mut fresh = window(100, 30, 0);
    fresh.restore_frame_state(snap, 20);
    assert_eq!(fresh.scroll_offset(), 800);
    assert_eq!(fresh.viewport_height(), 150);
    assert!(fresh.is_scrolling());
}

#[test]
fn set_count_rebuilds_estimates() {
    let mut w = window(10, 30, 120);
    w.update_item_height(5, 90);
    w.set_count(1000);
    assert_eq!(w.measured_count(), 0);
    assert_eq!(w.total_height(), 1000 * 30);
    w.set_count(0);
    assert_eq!(w.visible_range(), None);
    assert_eq!(w.total_height(), 0);
}

#[test]
fn randomized_cross_check_against_reference_model() {
    let mut rng = Lcg::new(99);
    for _ in 0..20 {
        let count = rng.gen_range_usize(1, 300);
        let est = rng.gen_range_u32(5, 60);
        let mut w = window(count, est, 100);

        for _ in 0..count / 2 {
            let i = rng.gen_range_usize(0, count);
            w.update_item_height(i, rng.gen_range_u32(1, 100));
        }
        let heights: Vec<u32> = (0..count).map(|i| w.item_height(i).unwrap()).collect();

        assert_eq!(w.total_height(), expected_offset(&heights, count));
        for _ in 0..50 {
            let off = rng.gen_range_u64(0, w.total_height() + 10);
            assert_eq!(w.find_item_at_offset(off), expected_index_at_offset(&heights, off));
        }
    }
}
