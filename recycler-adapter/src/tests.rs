use crate::*;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use recycler::{
    Align, CellKind, CellRegistry, Constraint, Coordinator, DataSource, Executor, HostView,
    Measured, RecyclerError, RecyclerOptions, RowKey, RowPhase, Size, VecSource, VisualUnit,
};

const ROW: CellKind = CellKind::new("row");
const VIEW: Size = Size::new(375, 880);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Attach,
    Detach,
    SetBounds(Size),
    Reposition,
}

#[derive(Default)]
struct Host {
    log: Vec<(usize, Op)>,
}

impl Host {
    fn ops_for(&self, index: usize) -> Vec<Op> {
        self.log
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, op)| *op)
            .collect()
    }
}

fn bound(unit: &VisualUnit<()>) -> usize {
    unit.bound_index().expect("host calls only see bound units")
}

impl<C> HostView<(), C> for Host {
    fn attach(&mut self, unit: &mut VisualUnit<()>, _at: u64) {
        self.log.push((bound(unit), Op::Attach));
    }

    fn detach(&mut self, unit: &mut VisualUnit<()>) {
        self.log.push((bound(unit), Op::Detach));
    }

    fn set_bounds(&mut self, unit: &mut VisualUnit<()>, size: Size) {
        self.log.push((bound(unit), Op::SetBounds(size)));
    }

    fn reposition(&mut self, unit: &mut VisualUnit<()>, _at: u64) {
        self.log.push((bound(unit), Op::Reposition));
    }
}

/// Chat-style rows with stable keys, so measurements survive a prepend.
struct Messages {
    items: Vec<(RowKey, String)>,
}

impl Messages {
    fn new(n: u64) -> Self {
        Self {
            items: (0..n).map(|i| (1000 + i, format!("Message {i}"))).collect(),
        }
    }

    fn index_of(&self, key: RowKey) -> Option<usize> {
        self.items.iter().position(|(k, _)| *k == key)
    }
}

impl DataSource for Messages {
    type Content = String;

    fn count(&self) -> usize {
        self.items.len()
    }

    fn content(&self, index: usize) -> String {
        self.items[index].1.clone()
    }

    fn kind(&self, _index: usize) -> CellKind {
        ROW
    }

    fn key(&self, index: usize) -> RowKey {
        self.items[index].0
    }
}

fn prepend_older(messages: &mut Messages) {
    let older = (0..10).map(|i| (2000 + i, format!("Older {i}")));
    messages.items.splice(0..0, older);
}

fn rows(n: usize) -> VecSource<String> {
    VecSource::new(ROW, (0..n).map(|i| format!("Row {i}")).collect())
}

fn registry() -> CellRegistry<()> {
    CellRegistry::new().with(ROW, || ())
}

fn fixed(height: u32) -> impl Fn(&String, Constraint) -> Measured + Send + Sync + 'static {
    move |_: &String, constraint: Constraint| -> Measured {
        Ok(Size::new(constraint.min.width, height))
    }
}

fn two_workers() -> WorkerPool {
    WorkerPool::new(NonZeroUsize::new(2).unwrap()).unwrap()
}

#[test]
fn worker_pool_runs_jobs_on_named_threads() {
    let pool = two_workers();
    assert_eq!(pool.threads(), 2);

    let (tx, rx) = crossbeam_channel::unbounded();
    pool.execute(Box::new(move || {
        let name = thread::current().name().map(str::to_owned);
        tx.send(name).unwrap();
    }));
    let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert!(name.starts_with("recycler-measure-"), "{name}");
}

#[test]
fn dropping_worker_pool_finishes_queued_jobs() {
    let done = Arc::new(AtomicUsize::new(0));
    let pool = WorkerPool::new(NonZeroUsize::MIN).unwrap();
    for _ in 0..16 {
        let done = Arc::clone(&done);
        pool.execute(Box::new(move || {
            thread::sleep(Duration::from_millis(1));
            done.fetch_add(1, Ordering::SeqCst);
        }));
    }
    drop(pool);
    assert_eq!(done.load(Ordering::SeqCst), 16);
}

#[test]
fn slow_measurement_on_workers_resizes_without_reattach() {
    let measurer = |text: &String, constraint: Constraint| -> Measured {
        if text == "Row 3" {
            thread::sleep(Duration::from_millis(50));
            return Ok(Size::new(constraint.min.width, 88));
        }
        Ok(Size::new(constraint.min.width, 44))
    };
    let mut c = Coordinator::new(
        rows(100),
        registry(),
        measurer,
        two_workers(),
        RecyclerOptions::default().with_overscan(0),
    );
    let mut host = Host::default();

    let report = c.update(0, VIEW, &mut host).unwrap();
    assert!(report.attached.contains(&3));
    assert_eq!(c.row_phase(3).unwrap(), RowPhase::PlacedFallback);
    assert_eq!(c.attached_size(3), Some(Size::new(375, 44)));

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut resized = Vec::new();
    while c.row_phase(3).unwrap() != RowPhase::PlacedFinal {
        assert!(Instant::now() < deadline, "row 3 never resolved");
        let report = c.pump_timeout(&mut host, Duration::from_millis(100)).unwrap();
        resized.extend(report.resized);
    }

    assert_eq!(resized, vec![3]);
    assert_eq!(c.attached_size(3), Some(Size::new(375, 88)));
    assert_eq!(
        host.ops_for(3),
        vec![
            Op::SetBounds(Size::new(375, 44)),
            Op::Attach,
            Op::SetBounds(Size::new(375, 88)),
        ]
    );
}

#[test]
fn anchor_preserves_scroll_across_prepend() {
    let mut c = Coordinator::new(
        Messages::new(100),
        registry(),
        fixed(10),
        recycler::InlineExecutor,
        RecyclerOptions::default()
            .with_overscan(0)
            .with_fallback_size(Size::new(0, 10)),
    );
    let mut host = Host::default();
    c.update(505, Size::new(100, 100), &mut host).unwrap();
    c.pump(&mut host).unwrap();

    let anchor = capture_first_visible_anchor(&c).unwrap();
    assert_eq!(anchor.key, 1050);
    assert_eq!(anchor.offset_in_viewport, 5);

    // Prepend 10 rows: old rows shift by +10 indexes.
    prepend_older(c.source_mut());
    c.reload(&mut host).unwrap();

    let map: HashMap<RowKey, usize> = (0..c.source().count())
        .map(|i| (c.source().key(i), i))
        .collect();
    let report = apply_anchor(&mut c, &anchor, |k| map.get(&k).copied(), &mut host).unwrap();
    assert!(report.is_some());
    assert_eq!(c.scroll_offset(), 605);
    assert_eq!(c.visible_range().start_index, 60);

    let gone = ScrollAnchor {
        key: 9999,
        offset_in_viewport: 0,
    };
    assert_eq!(
        apply_anchor(&mut c, &gone, |k| map.get(&k).copied(), &mut host).unwrap(),
        None
    );
}

#[test]
fn controller_keeps_first_visible_row_while_rows_above_grow() {
    let c = Coordinator::new(
        Messages::new(100),
        registry(),
        fixed(20),
        two_workers(),
        RecyclerOptions::default()
            .with_overscan(2)
            .with_fallback_size(Size::new(0, 10)),
    );
    let mut ctrl = Controller::new(c);
    let mut host = Host::default();

    ctrl.on_viewport_size(Size::new(100, 100));
    ctrl.on_scroll(500);
    ctrl.tick(&mut host).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        assert!(Instant::now() < deadline, "measurements never settled");
        ctrl.tick_timeout(&mut host, Duration::from_millis(50)).unwrap();
        if ctrl.coordinator().engine().in_flight_len() == 0 {
            break;
        }
    }

    let c = ctrl.coordinator();
    assert_eq!(c.visible_range().start_index, 50);
    assert_eq!(c.tracker().row_start_in_list(50), Some(c.scroll_offset()));
    assert_eq!(c.scroll_offset(), 520);
}

#[test]
fn controller_applies_only_latest_scroll_event() {
    let c = Coordinator::new(
        rows(1_000),
        registry(),
        fixed(44),
        recycler::InlineExecutor,
        RecyclerOptions::default().with_overscan(0),
    );
    let mut ctrl = Controller::new(c);
    let mut host = Host::default();

    ctrl.on_viewport_size(VIEW);
    ctrl.on_scroll(100);
    ctrl.on_scroll(500 * 44);
    assert_eq!(ctrl.tick(&mut host).unwrap(), None);

    assert!(host.log.iter().all(|(index, _)| *index >= 500));
    assert_eq!(ctrl.last_report().attached, (500..520).collect::<Vec<_>>());
}

#[test]
fn controller_scroll_to_index() {
    let c = Coordinator::new(
        rows(1_000),
        registry(),
        fixed(44),
        recycler::InlineExecutor,
        RecyclerOptions::default().with_overscan(0),
    );
    let mut ctrl = Controller::new(c);
    let mut host = Host::default();
    ctrl.on_viewport_size(VIEW);
    ctrl.tick(&mut host).unwrap();

    let offset = ctrl.scroll_to_index(500, Align::Start, &mut host).unwrap();
    assert_eq!(offset, 500 * 44);
    assert_eq!(ctrl.coordinator().visible_range().start_index, 500);
    assert!(ctrl.coordinator().attached_unit(500).is_some());

    let offset = ctrl.scroll_to_index(999, Align::Start, &mut host).unwrap();
    assert_eq!(offset, 1_000 * 44 - VIEW.height as u64);

    assert_eq!(
        ctrl.scroll_to_index(5_000, Align::Start, &mut host),
        Err(RecyclerError::InvalidRowIndex {
            index: 5_000,
            count: 1_000,
        })
    );
}

#[test]
fn controller_reload_anchored_keeps_row_in_place() {
    let c = Coordinator::new(
        Messages::new(100),
        registry(),
        fixed(10),
        recycler::InlineExecutor,
        RecyclerOptions::default()
            .with_overscan(0)
            .with_fallback_size(Size::new(0, 10)),
    );
    let mut ctrl = Controller::new(c);
    let mut host = Host::default();
    ctrl.on_viewport_size(Size::new(100, 100));
    ctrl.on_scroll(500);
    ctrl.tick(&mut host).unwrap();

    let ok = ctrl
        .reload_anchored(
            prepend_older,
            |k| {
                if k >= 2000 {
                    Some((k - 2000) as usize)
                } else {
                    Some((k - 1000) as usize + 10)
                }
            },
            &mut host,
        )
        .unwrap();
    assert!(ok);
    let c = ctrl.coordinator();
    assert_eq!(c.scroll_offset(), 600);
    assert_eq!(c.source().key(c.visible_range().start_index), 1050);
    assert_eq!(c.source().index_of(1050), Some(60));
}
