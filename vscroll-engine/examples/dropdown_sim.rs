//! Simulated dropdown session: a 50,000-row synthetic dataset scrolled,
//! flicked, and searched through the full engine pipeline, with no real UI.
//!
//! Run with `cargo run --example dropdown_sim`.

use std::sync::Arc;

use vscroll::{Align, Window, WindowOptions};
use vscroll_engine::{
    CacheConfig, DataProvider, EngineEvent, Item, ItemCache, ItemSeed, ManagerConfig, NodeLifecycle,
    ProviderConfig, RenderError, ScrollManager, SearchOptions, SyntheticSource,
};

const TOTAL: usize = 50_000;
const ROW_HEIGHT: u32 = 28;
const VIEWPORT: u32 = 336; // 12 rows

/// Stand-in for a real widget.
#[derive(Default)]
struct LabelNode {
    label: String,
}

struct LabelLifecycle;

impl NodeLifecycle<LabelNode> for LabelLifecycle {
    fn create(&self) -> LabelNode {
        LabelNode::default()
    }

    fn apply(&self, node: &mut LabelNode, item: &Item) -> Result<(), RenderError> {
        node.label = format!("{} ({})", item.text, item.value);
        Ok(())
    }

    fn reset(&self, node: &mut LabelNode) {
        node.label.clear();
    }

    fn apply_error(&self, node: &mut LabelNode, item: &Item) {
        node.label = format!("⚠ row {}", item.index);
    }
}

fn seed(i: usize) -> ItemSeed {
    let kinds = ["alpha", "beta", "gamma", "delta", "epsilon"];
    ItemSeed::new(format!("opt-{i}"), format!("Option {i:05}"))
        .with_description(format!("{} entry number {i}", kinds[i % kinds.len()]))
        .with_tags([kinds[i % kinds.len()].to_string()])
        .with_weight((i % 1000) as f64)
}

fn main() {
    let window = Window::new(
        WindowOptions::new(TOTAL, ROW_HEIGHT).with_initial_viewport(VIEWPORT),
    );
    let provider = DataProvider::new(
        ProviderConfig {
            chunk_size: 1000,
            ..ProviderConfig::default()
        },
        SyntheticSource::new(TOTAL, seed),
    )
    .expect("non-empty dataset");
    let cache = ItemCache::new(CacheConfig::default(), Arc::new(LabelLifecycle));

    let mut engine = ScrollManager::new(ManagerConfig::default(), window, provider, cache);
    engine.subscribe(|event| {
        if let EngineEvent::LoadingStarted = event {
            println!("  [loading…]");
        }
    });

    // Slow scroll through the top of the list, one frame every 16 ms.
    let mut now: u64 = 0;
    for frame in 0..20u64 {
        now = frame * 16;
        engine.on_scroll(frame * 40, now);
        engine.record_frame(now);
        let placements = engine.items_to_render(now);
        engine.tick(now);
        if frame % 5 == 0 {
            let first = placements.first().map(|p| p.row.index).unwrap_or(0);
            let last = placements.last().map(|p| p.row.index).unwrap_or(0);
            println!("frame {frame:2}: rows {first}..={last}");
        }
    }

    // Fast flick deep into the list.
    now += 16;
    engine.on_scroll(900_000, now);
    let placements = engine.items_to_render(now);
    println!(
        "after flick: {} rows starting at {}",
        placements.len(),
        placements.first().map(|p| p.row.index).unwrap_or(0)
    );

    // Smooth-scroll to the last row, ticking frames until the animation lands.
    now += 200;
    engine.tick(now);
    engine.scroll_to_item(TOTAL - 1, Align::End, true, now);
    while engine.is_animating() {
        now += 16;
        engine.tick(now);
        engine.record_frame(now);
    }
    let placements = engine.items_to_render(now);
    for p in placements.iter().rev().take(3).rev() {
        if let Some(node) = engine.cache().node(p.node) {
            println!("  y={:>8} {}", p.row.start, node.label);
        }
    }

    // Search: this dataset is large enough that queries run on the worker.
    let id = engine.search_async("gamma entry number 4207", SearchOptions::default());
    println!("dispatched background search (id {id:?})");
    let results = loop {
        if let Some(r) = engine.poll_search() {
            break r;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    };
    println!("search matched {} items:", results.total_matched);
    for hit in results.hits.iter().take(5) {
        println!("  {:>6.1}  {}", hit.score, hit.item.text);
    }

    let stats = engine.stats();
    println!(
        "\nstats: {} fetches, {} resident chunks, {:.0} fps, {} nodes created / {} recycled",
        stats.provider.fetches,
        stats.provider.resident_chunks,
        stats.fps,
        stats.cache.created,
        stats.cache.recycled,
    );
}
