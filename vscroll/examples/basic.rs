//! Minimal driving loop: feed scroll offsets, print the rows that would be
//! rendered.
//!
//! Run with `cargo run --example basic`.

use vscroll::{Align, Window, WindowOptions};

fn main() {
    let mut window = Window::new(
        WindowOptions::new(50_000, 28)
            .with_initial_viewport(280)
            .with_buffer(5),
    );

    // Simulate a few scroll events 16ms apart.
    let mut now_ms = 0u64;
    for offset in [0u64, 300, 900, 20_000] {
        window.apply_scroll_event(offset, now_ms);
        now_ms += 16;

        let range = window.visible_range().expect("non-empty list");
        println!("offset {offset:>6}: rows {}..={}", range.start, range.end);
        window.for_each_visible_row(|row| {
            // A real host would position a widget at row.start here and then
            // report the actual rendered height back via update_item_height.
            let _ = row;
        });

        // Rows turn out taller than estimated.
        for i in range.start..=range.end {
            window.update_item_height(i, 32);
        }
    }

    let target = window.scroll_to_item(49_999, Align::End).unwrap();
    println!("scrolled to end: offset {target}, total {}", window.total_height());
    println!("stats: {:?}", window.stats());
}
