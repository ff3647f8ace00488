//! Scene lifecycle: mount points, the [`Animation`] contract and the
//! bookkeeping that lets every scene release exactly what it allocated.
//!
//! An instance moves `Uninitialized -> Running -> Disposed` and never
//! skips `Running`. Cleanup consumes the boxed animation, so a scene cannot
//! be torn down twice.

use crate::controls::{ControlEvent, ControlPanel};
use crate::error::{Result, VerseError};
use crate::route::VerseId;
use crate::stage::{
    HostEvent, HostEventKind, ListenerId, Mesh, MeshId, Overlay, OverlayId, Stage,
};
use crate::timers::TimerQueue;
use common::Camera3D;

/// The two mount points handed to a scene: where it draws and where its
/// controls live
pub struct Mount {
    pub stage: Stage,
    pub panel: ControlPanel,
}

/// Live handles of every kind a scene can hold on a [`Mount`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    pub meshes: usize,
    pub overlays: usize,
    pub listeners: usize,
    pub widgets: usize,
}

impl ResourceCounts {
    pub fn is_empty(&self) -> bool {
        *self == ResourceCounts::default()
    }
}

impl Mount {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            stage: Stage::new(width, height),
            panel: ControlPanel::new(),
        }
    }

    /// Scenes call this first; a missing mount point is an init failure
    pub fn ensure_attached(&self) -> Result<()> {
        if !self.stage.is_attached() {
            return Err(VerseError::MissingMount("stage"));
        }
        if !self.panel.is_attached() {
            return Err(VerseError::MissingMount("control panel"));
        }
        Ok(())
    }

    pub fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            meshes: self.stage.live_meshes(),
            overlays: self.stage.live_overlays(),
            listeners: self.stage.live_listeners(),
            widgets: self.panel.live_widgets(),
        }
    }

    /// Drop whatever a misbehaving scene left behind
    pub fn force_clear(&mut self) {
        self.stage.clear();
        self.panel.clear();
    }
}

/// Timing handed to a scene each frame. `time` is seconds since the scene's
/// first frame; `delta` is the frame step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    pub time: f32,
    pub delta: f32,
}

/// A running verse visualization
pub trait Animation {
    fn name(&self) -> &'static str;

    fn camera(&self) -> &Camera3D;

    /// Advance state to `frame.time` and push it to the stage
    fn update(&mut self, frame: FrameTime, mount: &mut Mount);

    fn on_control(&mut self, _event: ControlEvent, _time: f32, _mount: &mut Mount) {}

    /// Only called for event kinds the scene is listening for
    fn on_host_event(&mut self, _event: HostEvent, _mount: &mut Mount) {}

    /// Release every mesh, overlay, listener, widget and pending timer
    fn cleanup(self: Box<Self>, mount: &mut Mount);

    /// Deferred events still waiting to fire
    fn pending_timers(&self) -> usize {
        0
    }
}

/// Orbit/zoom/aspect handling shared by the scenes that listen for it
pub fn steer_camera(camera: &mut Camera3D, event: HostEvent) {
    match event {
        HostEvent::Resized { width, height } if height > 0 => {
            camera.update_aspect_ratio(width as f32 / height as f32)
        }
        HostEvent::Resized { .. } => {}
        HostEvent::PointerDrag { dx, dy } => camera.orbit(-dx * 0.005, dy * 0.005),
        HostEvent::Wheel { delta } => camera.zoom(delta),
    }
}

/// What a cleanup released, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleaseReport {
    pub meshes: usize,
    pub overlays: usize,
    pub listeners: usize,
    pub timers: usize,
}

/// Handles owned by one scene instance, released together in cleanup
pub struct SceneResources<E> {
    meshes: Vec<MeshId>,
    overlays: Vec<OverlayId>,
    listeners: Vec<ListenerId>,
    pub timers: TimerQueue<E>,
}

impl<E> Default for SceneResources<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SceneResources<E> {
    pub fn new() -> Self {
        Self {
            meshes: Vec::new(),
            overlays: Vec::new(),
            listeners: Vec::new(),
            timers: TimerQueue::new(),
        }
    }

    pub fn mesh(&mut self, stage: &mut Stage, mesh: Mesh) -> MeshId {
        let id = stage.add_mesh(mesh);
        self.meshes.push(id);
        id
    }

    pub fn release_mesh(&mut self, stage: &mut Stage, id: MeshId) -> bool {
        self.meshes.retain(|m| *m != id);
        stage.release_mesh(id)
    }

    pub fn overlay(&mut self, stage: &mut Stage, overlay: Overlay) -> OverlayId {
        let id = stage.add_overlay(overlay);
        self.overlays.push(id);
        id
    }

    pub fn listen(&mut self, stage: &mut Stage, kind: HostEventKind) -> ListenerId {
        let id = stage.listen(kind);
        self.listeners.push(id);
        id
    }

    /// Resize, drag and wheel listeners for [`steer_camera`]
    pub fn listen_camera(&mut self, stage: &mut Stage) {
        for kind in [
            HostEventKind::Resize,
            HostEventKind::PointerDrag,
            HostEventKind::Wheel,
        ] {
            self.listen(stage, kind);
        }
    }

    /// Tear everything down and clear the control panel
    pub fn release(mut self, mount: &mut Mount) -> ReleaseReport {
        let report = ReleaseReport {
            timers: self.timers.cancel_all(),
            listeners: self
                .listeners
                .drain(..)
                .filter(|id| mount.stage.unlisten(*id))
                .count(),
            meshes: self
                .meshes
                .drain(..)
                .filter(|id| mount.stage.release_mesh(*id))
                .count(),
            overlays: self
                .overlays
                .drain(..)
                .filter(|id| mount.stage.remove_overlay(*id))
                .count(),
        };
        mount.panel.clear();
        mount.stage.background = crate::stage::DEFAULT_BACKGROUND;
        log::debug!("Released {report:?}");
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Running,
    Disposed,
}

/// One mounted animation plus its lifecycle state and clock
pub struct Instance {
    id: VerseId,
    state: Lifecycle,
    animation: Option<Box<dyn Animation>>,
    epoch: Option<f32>,
    local_time: f32,
}

impl Instance {
    /// Run `init` against the mount; only a successful init reaches `Running`
    pub fn launch<F>(id: VerseId, mount: &mut Mount, init: F) -> Result<Instance>
    where
        F: FnOnce(&mut Mount) -> Result<Box<dyn Animation>>,
    {
        let mut instance = Instance {
            id,
            state: Lifecycle::Uninitialized,
            animation: None,
            epoch: None,
            local_time: 0.0,
        };
        let animation = init(mount)?;
        log::info!("Verse {} running: {}", id.0, animation.name());
        instance.animation = Some(animation);
        instance.state = Lifecycle::Running;
        Ok(instance)
    }

    /// Wrap an animation whose construction cannot fail
    pub fn running(id: VerseId, animation: Box<dyn Animation>) -> Instance {
        log::info!("Verse {} running: {}", id.0, animation.name());
        Instance {
            id,
            state: Lifecycle::Running,
            animation: Some(animation),
            epoch: None,
            local_time: 0.0,
        }
    }

    pub fn id(&self) -> VerseId {
        self.id
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn name(&self) -> &'static str {
        self.animation.as_ref().map_or("disposed", |a| a.name())
    }

    pub fn camera(&self) -> Option<&Camera3D> {
        self.animation.as_ref().map(|a| a.camera())
    }

    /// Instance-local time of the most recent frame
    pub fn local_time(&self) -> f32 {
        self.local_time
    }

    pub fn pending_timers(&self) -> usize {
        self.animation.as_ref().map_or(0, |a| a.pending_timers())
    }

    /// Drive one frame given wall-clock time; the first frame is `t = 0`
    pub fn frame(&mut self, wall: FrameTime, mount: &mut Mount) {
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        let epoch = *self.epoch.get_or_insert(wall.time);
        self.local_time = (wall.time - epoch).max(0.0);
        log::trace!("Verse {} frame t={:.3}", self.id.0, self.local_time);
        animation.update(
            FrameTime {
                time: self.local_time,
                delta: wall.delta,
            },
            mount,
        );
    }

    pub fn control(&mut self, event: ControlEvent, mount: &mut Mount) {
        if let Some(animation) = self.animation.as_mut() {
            animation.on_control(event, self.local_time, mount);
        }
    }

    pub fn host_event(&mut self, event: HostEvent, mount: &mut Mount) {
        if let Some(animation) = self.animation.as_mut() {
            animation.on_host_event(event, mount);
        }
    }

    pub fn dispose(&mut self, mount: &mut Mount) {
        if let Some(animation) = self.animation.take() {
            let name = animation.name();
            animation.cleanup(mount);
            log::info!("Verse {} disposed: {}", self.id.0, name);
        }
        self.state = Lifecycle::Disposed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Geometry;

    struct Probe {
        camera: Camera3D,
        resources: SceneResources<u8>,
        frames: Vec<FrameTime>,
    }

    impl Animation for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn camera(&self) -> &Camera3D {
            &self.camera
        }

        fn update(&mut self, frame: FrameTime, _mount: &mut Mount) {
            self.frames.push(frame);
        }

        fn cleanup(self: Box<Self>, mount: &mut Mount) {
            self.resources.release(mount);
        }
    }

    fn probe(mount: &mut Mount) -> Result<Box<dyn Animation>> {
        mount.ensure_attached()?;
        let mut resources = SceneResources::new();
        resources.mesh(&mut mount.stage, Mesh::new(Geometry::Sphere { radius: 1.0 }, [1.0; 4]));
        resources.listen_camera(&mut mount.stage);
        resources.timers.schedule(0.0, 5.0, 1);
        mount.panel.add_button("Poke");
        Ok(Box::new(Probe {
            camera: Camera3D::new(1.0),
            resources,
            frames: Vec::new(),
        }))
    }

    #[test]
    fn launch_then_dispose_releases_everything() {
        let mut mount = Mount::new(640, 480);
        let mut instance = Instance::launch(VerseId(1), &mut mount, probe).unwrap();
        assert_eq!(instance.state(), Lifecycle::Running);
        assert!(!mount.live_resources().is_empty());

        instance.dispose(&mut mount);
        assert_eq!(instance.state(), Lifecycle::Disposed);
        assert!(mount.live_resources().is_empty());
    }

    #[test]
    fn local_time_starts_at_first_frame() {
        let mut mount = Mount::new(640, 480);
        let mut instance = Instance::launch(VerseId(1), &mut mount, probe).unwrap();
        instance.frame(FrameTime { time: 12.0, delta: 0.016 }, &mut mount);
        instance.frame(FrameTime { time: 12.5, delta: 0.5 }, &mut mount);
        assert!((instance.local_time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn detached_stage_fails_launch() {
        let mut mount = Mount {
            stage: Stage::detached(),
            panel: ControlPanel::new(),
        };
        let err = Instance::launch(VerseId(1), &mut mount, probe).err().unwrap();
        assert!(matches!(err, VerseError::MissingMount("stage")));
    }

    #[test]
    fn frames_after_dispose_are_ignored() {
        let mut mount = Mount::new(640, 480);
        let mut instance = Instance::launch(VerseId(1), &mut mount, probe).unwrap();
        instance.dispose(&mut mount);
        instance.frame(FrameTime { time: 1.0, delta: 0.1 }, &mut mount);
        assert_eq!(instance.camera().map(|_| ()), None);
    }
}
