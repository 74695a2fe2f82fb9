// Example: a 200,000-row table measured on background workers, plus an inverted
// (chat-style) list.
//
// Run with `RUST_LOG=recycler=debug` to see the engine's lifecycle logs.
use std::collections::BTreeMap;
use std::time::Duration;

use recycler::{
    CellKind, CellRegistry, Constraint, Coordinator, HostView, Measured, RecyclerOptions, Row,
    Size, VecSource, VisualUnit,
};
use recycler_adapter::{Controller, WorkerPool};
use tracing_subscriber::EnvFilter;

const CELL: CellKind = CellKind::new("text-cell");

const VERTICAL_INSET: u32 = 8;
const LINE_HEIGHT: u32 = 22;
// Rough advance of an 18 pt system font.
const CHAR_WIDTH: u32 = 10;

#[derive(Debug, Default)]
struct Label {
    text: String,
}

/// Stand-in for a platform table: tracks which labels are on screen.
#[derive(Default)]
struct TableHost {
    on_screen: BTreeMap<u64, (u64, Size)>,
    attaches: usize,
    detaches: usize,
}

impl HostView<Label, String> for TableHost {
    fn attach(&mut self, unit: &mut VisualUnit<Label>, at: u64) {
        self.attaches += 1;
        self.on_screen.insert(unit.id().get(), (at, Size::ZERO));
    }

    fn detach(&mut self, unit: &mut VisualUnit<Label>) {
        self.detaches += 1;
        self.on_screen.remove(&unit.id().get());
    }

    fn set_bounds(&mut self, unit: &mut VisualUnit<Label>, size: Size) {
        let entry = self.on_screen.entry(unit.id().get()).or_default();
        entry.1 = size;
    }

    fn reposition(&mut self, unit: &mut VisualUnit<Label>, at: u64) {
        if let Some(entry) = self.on_screen.get_mut(&unit.id().get()) {
            entry.0 = at;
        }
    }

    fn bind(&mut self, unit: &mut VisualUnit<Label>, row: &Row<String>) {
        unit.view_mut().text.clone_from(&row.content);
    }

    fn unbind(&mut self, unit: &mut VisualUnit<Label>) {
        unit.view_mut().text.clear();
    }
}

/// Wraps the label into the available width and adds the vertical insets.
fn measure_label(text: &String, constraint: Constraint) -> Measured {
    let width = constraint.max.width.max(CHAR_WIDTH);
    let per_line = (width / CHAR_WIDTH).max(1) as usize;
    let lines = text.chars().count().div_ceil(per_line).max(1) as u32;
    let size = Size::new(width, lines * LINE_HEIGHT + 2 * VERTICAL_INSET);
    Ok(constraint.clamp(size))
}

fn registry() -> CellRegistry<Label> {
    CellRegistry::new().with(CELL, Label::default)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let workers = WorkerPool::with_default_threads()?;
    println!("measuring on {} worker thread(s)", workers.threads());

    let rows: Vec<String> = (0..200_000).map(|i| format!("Row {i}")).collect();
    let options = RecyclerOptions::default()
        .with_fallback_size(Size::new(0, LINE_HEIGHT + 2 * VERTICAL_INSET));
    let coordinator = Coordinator::new(
        VecSource::new(CELL, rows),
        registry(),
        measure_label,
        workers,
        options,
    );
    let mut table = Controller::new(coordinator);
    let mut host = TableHost::default();

    table.on_viewport_size(Size::new(375, 812));
    table.tick(&mut host)?;

    // A fling: 120 frames, 600 pt each.
    for frame in 0..120u64 {
        table.on_scroll(frame * 600);
        table.tick_timeout(&mut host, Duration::from_millis(2))?;
    }
    // Let outstanding measurements land.
    for _ in 0..10 {
        table.tick_timeout(&mut host, Duration::from_millis(20))?;
    }

    let c = table.coordinator();
    let range = c.visible_range();
    println!(
        "range {}..{} attached={} on_screen={} offset={}",
        range.start_index,
        range.end_index,
        c.attached_len(),
        host.on_screen.len(),
        c.scroll_offset()
    );
    println!(
        "units created={} attaches={} detaches={} pool={:?}",
        c.registry().created(),
        host.attaches,
        host.detaches,
        c.pool_stats()
    );
    println!("measure={:?}", c.measure_stats());

    // Tap in the middle of the viewport; the row is selected, then deselected.
    let tap = c.scroll_offset() + 400;
    if let Some(index) = c.index_at_offset(tap) {
        let text = c.attached_unit(index).map(|u| u.view().text.as_str());
        println!("tap at y={tap}: row {index} {text:?} selected, deselected");
    }

    // Chat-style list: row 0 sits at the bottom edge.
    let messages: Vec<String> = (0..100).map(|i| format!("Row {i}")).collect();
    let mut chat = Coordinator::new(
        VecSource::new(CELL, messages),
        registry(),
        measure_label,
        WorkerPool::with_default_threads()?,
        options.with_inverted(true),
    );
    let mut chat_host = TableHost::default();
    chat.update(0, Size::new(375, 600), &mut chat_host)?;
    chat.pump_timeout(&mut chat_host, Duration::from_millis(50))?;
    println!(
        "inverted: row 0 at y={:?}, row 1 at y={:?}",
        chat.attached_offset(0),
        chat.attached_offset(1)
    );
    Ok(())
}
