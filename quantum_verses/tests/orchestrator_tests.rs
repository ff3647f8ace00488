//! Orchestrator Tests
//!
//! Tests for:
//! - Cleanup of the outgoing verse before init of the incoming one
//! - Placeholder fallback (unknown verse, failing init, detached stage)
//! - Next/previous wrapping, back/forward history, deep links
//! - Host event and control event routing
//! - Instance-local frame time

use std::cell::RefCell;
use std::rc::Rc;

use common::Camera3D;

use quantum_verses::config::{OptionValue, Options};
use quantum_verses::controls::{ControlEvent, ControlPanel, ControlValue};
use quantum_verses::lifecycle::{Animation, FrameTime, Mount, SceneResources};
use quantum_verses::orchestrator::{Orchestrator, Selection, VerseEntry, VerseRegistry};
use quantum_verses::route::VerseId;
use quantum_verses::stage::{Geometry, HostEvent, HostEventKind, Mesh, Stage};
use quantum_verses::{Result, VerseError};

const EPSILON: f32 = 1e-5;

type Log = Rc<RefCell<Vec<String>>>;

struct Probe {
    id: u32,
    camera: Camera3D,
    resources: SceneResources<()>,
    log: Log,
}

impl Animation for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, frame: FrameTime, _mount: &mut Mount) {
        self.log
            .borrow_mut()
            .push(format!("frame {} {:.2}", self.id, frame.time));
    }

    fn on_control(&mut self, _event: ControlEvent, _time: f32, _mount: &mut Mount) {
        self.log.borrow_mut().push(format!("control {}", self.id));
    }

    fn on_host_event(&mut self, event: HostEvent, _mount: &mut Mount) {
        self.log
            .borrow_mut()
            .push(format!("host {} {:?}", self.id, event.kind()));
    }

    fn cleanup(self: Box<Self>, mount: &mut Mount) {
        let Probe {
            id, resources, log, ..
        } = *self;
        log.borrow_mut().push(format!("cleanup {id}"));
        resources.release(mount);
    }
}

fn probe_entry(id: u32, log: &Log) -> VerseEntry {
    let log = Rc::clone(log);
    VerseEntry::new(
        VerseId(id),
        "Probe",
        move |mount: &mut Mount, options: &Options| -> Result<Box<dyn Animation>> {
            mount.ensure_attached()?;
            log.borrow_mut().push(format!("init {id}"));
            if let Some(OptionValue::Text(tag)) = options.get("tag") {
                log.borrow_mut().push(format!("tag {tag}"));
            }

            let mut resources = SceneResources::new();
            resources.mesh(
                &mut mount.stage,
                Mesh::new(Geometry::Sphere { radius: 1.0 }, [1.0; 4]),
            );
            resources.listen(&mut mount.stage, HostEventKind::Wheel);
            mount.panel.add_button("Poke");

            let animation: Box<dyn Animation> = Box::new(Probe {
                id,
                camera: Camera3D::new(mount.stage.aspect_ratio()),
                resources,
                log: Rc::clone(&log),
            });
            Ok(animation)
        },
    )
}

fn broken_entry(id: u32) -> VerseEntry {
    VerseEntry::new(
        VerseId(id),
        "Broken",
        |mount: &mut Mount, _options: &Options| -> Result<Box<dyn Animation>> {
            // Leaks a mesh before failing
            mount
                .stage
                .add_mesh(Mesh::new(Geometry::Sphere { radius: 1.0 }, [1.0; 4]));
            Err(VerseError::invalid_option("speed", "must be positive"))
        },
    )
}

fn setup(ids: &[u32]) -> (Orchestrator, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut registry = VerseRegistry::new();
    for &id in ids {
        registry.register(probe_entry(id, &log));
    }
    (Orchestrator::new(registry), log)
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

// ============================================================================
// Switch Ordering
// ============================================================================

#[test]
fn cleanup_runs_before_next_init() {
    let (mut orchestrator, log) = setup(&[1, 2]);
    let mut mount = Mount::new(800, 600);

    orchestrator.select_verse(VerseId(1), &mut mount);
    orchestrator.select_verse(VerseId(2), &mut mount);
    orchestrator.shutdown(&mut mount);

    assert_eq!(
        entries(&log),
        vec!["init 1", "cleanup 1", "init 2", "cleanup 2"]
    );
    assert!(mount.live_resources().is_empty());
}

#[test]
fn reselecting_remounts_with_fresh_resources() {
    let (mut orchestrator, log) = setup(&[1]);
    let mut mount = Mount::new(800, 600);

    orchestrator.select_verse(VerseId(1), &mut mount);
    let first = mount.live_resources();
    orchestrator.select_verse(VerseId(1), &mut mount);

    assert_eq!(mount.live_resources(), first);
    assert_eq!(entries(&log), vec!["init 1", "cleanup 1", "init 1"]);
}

#[test]
fn reload_picks_up_changed_options() {
    let (mut orchestrator, log) = setup(&[1]);
    let mut mount = Mount::new(800, 600);

    orchestrator.select_verse(VerseId(1), &mut mount);
    orchestrator
        .options_mut(VerseId(1))
        .set("tag", OptionValue::Text("blue".to_string()));
    let selection = orchestrator.reload(&mut mount);

    assert_eq!(selection, Some(Selection::Loaded(VerseId(1))));
    assert_eq!(
        entries(&log),
        vec!["init 1", "cleanup 1", "init 1", "tag blue"]
    );
}

#[test]
fn reload_without_active_verse_does_nothing() {
    let (mut orchestrator, log) = setup(&[1]);
    let mut mount = Mount::new(800, 600);
    assert_eq!(orchestrator.reload(&mut mount), None);
    assert!(entries(&log).is_empty());
}

// ============================================================================
// Placeholder Fallback
// ============================================================================

#[test]
fn unknown_verse_mounts_placeholder() {
    let (mut orchestrator, _log) = setup(&[1]);
    let mut mount = Mount::new(800, 600);

    let selection = orchestrator.select_verse(VerseId(9), &mut mount);
    match selection {
        Selection::Placeholder { id, reason } => {
            assert_eq!(id, VerseId(9));
            assert!(reason.contains("not registered"), "reason: {reason}");
        }
        other => panic!("expected placeholder, got {other:?}"),
    }
    assert!(orchestrator.is_placeholder());
    assert_eq!(orchestrator.current(), Some(VerseId(9)));
    assert_eq!(mount.live_resources().overlays, 1);
}

#[test]
fn failing_init_is_cleared_and_replaced() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut registry = VerseRegistry::new();
    registry.register(probe_entry(1, &log));
    registry.register(broken_entry(2));
    let mut orchestrator = Orchestrator::new(registry);
    let mut mount = Mount::new(800, 600);

    orchestrator.select_verse(VerseId(1), &mut mount);
    let selection = orchestrator.select_verse(VerseId(2), &mut mount);

    assert!(matches!(selection, Selection::Placeholder { id: VerseId(2), .. }));
    assert_eq!(entries(&log), vec!["init 1", "cleanup 1"]);
    assert_eq!(mount.live_resources().meshes, 0);
    assert_eq!(mount.live_resources().overlays, 1);

    // A later successful switch still works
    let selection = orchestrator.select_verse(VerseId(1), &mut mount);
    assert_eq!(selection, Selection::Loaded(VerseId(1)));
    assert!(!orchestrator.is_placeholder());
    assert!(mount.panel.message().is_none());
}

#[test]
fn detached_stage_falls_back_without_touching_it() {
    let (mut orchestrator, log) = setup(&[1]);
    let mut mount = Mount {
        stage: Stage::detached(),
        panel: ControlPanel::new(),
    };

    let selection = orchestrator.select_verse(VerseId(1), &mut mount);
    assert!(matches!(selection, Selection::Placeholder { id: VerseId(1), .. }));
    assert!(entries(&log).is_empty());
    assert_eq!(mount.live_resources().overlays, 0);
    assert!(mount.panel.message().is_some());

    orchestrator.shutdown(&mut mount);
    assert!(mount.live_resources().is_empty());
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn next_and_previous_wrap() {
    let (mut orchestrator, _log) = setup(&[1, 2, 3]);
    let mut mount = Mount::new(800, 600);

    assert_eq!(
        orchestrator.next(&mut mount).map(|s| s.id()),
        Some(VerseId(1))
    );
    orchestrator.select_verse(VerseId(3), &mut mount);
    assert_eq!(
        orchestrator.next(&mut mount).map(|s| s.id()),
        Some(VerseId(1))
    );
    assert_eq!(
        orchestrator.previous(&mut mount).map(|s| s.id()),
        Some(VerseId(3))
    );
    assert_eq!(
        orchestrator.previous(&mut mount).map(|s| s.id()),
        Some(VerseId(2))
    );
}

#[test]
fn next_from_placeholder_moves_to_following_verse() {
    let (mut orchestrator, _log) = setup(&[1, 4]);
    let mut mount = Mount::new(800, 600);

    orchestrator.select_verse(VerseId(2), &mut mount);
    assert!(orchestrator.is_placeholder());
    assert_eq!(
        orchestrator.next(&mut mount).map(|s| s.id()),
        Some(VerseId(4))
    );
}

#[test]
fn next_on_empty_registry_is_none() {
    let (mut orchestrator, _log) = setup(&[]);
    let mut mount = Mount::new(800, 600);
    assert_eq!(orchestrator.next(&mut mount), None);
    assert_eq!(orchestrator.previous(&mut mount), None);
}

#[test]
fn back_and_forward_walk_history() {
    let (mut orchestrator, log) = setup(&[1, 2, 3]);
    let mut mount = Mount::new(800, 600);

    orchestrator.select_verse(VerseId(1), &mut mount);
    orchestrator.select_verse(VerseId(3), &mut mount);
    orchestrator.select_verse(VerseId(2), &mut mount);

    assert_eq!(orchestrator.back(&mut mount), Some(Selection::Loaded(VerseId(3))));
    assert_eq!(orchestrator.back(&mut mount), Some(Selection::Loaded(VerseId(1))));
    assert_eq!(orchestrator.back(&mut mount), None);
    assert_eq!(orchestrator.current(), Some(VerseId(1)));

    assert_eq!(
        orchestrator.forward(&mut mount),
        Some(Selection::Loaded(VerseId(3)))
    );

    // A fresh selection drops the forward entries
    orchestrator.select_verse(VerseId(1), &mut mount);
    assert_eq!(orchestrator.forward(&mut mount), None);
    assert_eq!(orchestrator.current(), Some(VerseId(1)));

    let inits = entries(&log)
        .iter()
        .filter(|e| e.starts_with("init"))
        .count();
    let cleanups = entries(&log)
        .iter()
        .filter(|e| e.starts_with("cleanup"))
        .count();
    assert_eq!(inits, cleanups + 1);
}

#[test]
fn deep_links_select_verses() {
    let (mut orchestrator, _log) = setup(&[1, 2]);
    let mut mount = Mount::new(800, 600);

    let selection = orchestrator.navigate_link("?verse=2", &mut mount).unwrap();
    assert_eq!(selection, Selection::Loaded(VerseId(2)));
    assert_eq!(
        orchestrator.route().map(|r| r.to_query()),
        Some("?verse=2".to_string())
    );

    let err = orchestrator.navigate_link("?chapter=2", &mut mount).unwrap_err();
    assert!(matches!(err, VerseError::Route(_)));
    assert_eq!(orchestrator.current(), Some(VerseId(2)));
}

// ============================================================================
// Event Routing
// ============================================================================

#[test]
fn host_events_reach_listeners_only() {
    let (mut orchestrator, log) = setup(&[1]);
    let mut mount = Mount::new(800, 600);
    orchestrator.select_verse(VerseId(1), &mut mount);

    orchestrator.dispatch_host_event(HostEvent::PointerDrag { dx: 4.0, dy: 1.0 }, &mut mount);
    orchestrator.dispatch_host_event(HostEvent::Wheel { delta: 1.0 }, &mut mount);
    orchestrator.dispatch_host_event(
        HostEvent::Resized {
            width: 1024,
            height: 512,
        },
        &mut mount,
    );

    assert_eq!(entries(&log), vec!["init 1", "host 1 Wheel"]);
    // Resizes always reach the stage
    assert_eq!(mount.stage.size(), (1024, 512));
}

#[test]
fn host_events_stop_after_cleanup() {
    let (mut orchestrator, log) = setup(&[1]);
    let mut mount = Mount::new(800, 600);
    orchestrator.select_verse(VerseId(1), &mut mount);
    orchestrator.shutdown(&mut mount);

    orchestrator.dispatch_host_event(HostEvent::Wheel { delta: 1.0 }, &mut mount);
    assert_eq!(entries(&log), vec!["init 1", "cleanup 1"]);
}

#[test]
fn control_edits_are_delivered_on_next_frame() {
    let (mut orchestrator, log) = setup(&[1]);
    let mut mount = Mount::new(800, 600);
    orchestrator.select_verse(VerseId(1), &mut mount);

    let poke = mount.panel.widgets()[0].id;
    assert!(mount.panel.set_value(poke, ControlValue::Pressed));
    orchestrator.frame(FrameTime { time: 0.0, delta: 0.0 }, &mut mount);

    assert_eq!(
        entries(&log),
        vec!["init 1", "control 1", "frame 1 0.00"]
    );
}

// ============================================================================
// Frame Time
// ============================================================================

#[test]
fn instance_time_starts_at_zero_for_each_mount() {
    let (mut orchestrator, log) = setup(&[1, 2]);
    let mut mount = Mount::new(800, 600);

    orchestrator.select_verse(VerseId(1), &mut mount);
    orchestrator.frame(FrameTime { time: 10.0, delta: 0.1 }, &mut mount);
    orchestrator.frame(FrameTime { time: 10.5, delta: 0.5 }, &mut mount);
    orchestrator.select_verse(VerseId(2), &mut mount);
    orchestrator.frame(FrameTime { time: 11.0, delta: 0.5 }, &mut mount);

    let frames: Vec<String> = entries(&log)
        .into_iter()
        .filter(|e| e.starts_with("frame"))
        .collect();
    assert_eq!(frames, vec!["frame 1 0.00", "frame 1 0.50", "frame 2 0.00"]);

    let local = orchestrator.active().map(|a| a.local_time()).unwrap();
    assert!(local.abs() < EPSILON);
}
