//! Verse 5: the sealed box
//!
//! A radioactive atom sits in a closed box with a cat. The atom decays with a
//! fixed probability per second of instance time. While the box is closed
//! the cat is shown in both states; opening it fixes the history and the lid
//! swings up to reveal which one happened.

use crate::config::{OptionReader, Options};
use crate::controls::{ControlBindings, ControlEvent, ControlValue};
use crate::error::Result;
use crate::lifecycle::{steer_camera, Animation, FrameTime, Mount, SceneResources};
use crate::physics::{chance_within, ease_in_out_cubic, Timeline};
use crate::stage::{
    Anchor, CloudPoint, Geometry, HostEvent, Mesh, MeshId, Overlay, OverlayId, Stage,
};
use common::Camera3D;
use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BOX_HALF: Vec3 = Vec3::new(3.0, 1.5, 1.5);
const ALIVE_COLOR: [f32; 4] = [1.0, 0.65, 0.25, 1.0];
const DEAD_COLOR: [f32; 4] = [0.45, 0.45, 0.5, 1.0];
const ATOM_COLOR: [f32; 4] = [0.4, 1.0, 0.5, 1.0];
const SPENT_COLOR: [f32; 4] = [0.3, 0.35, 0.3, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct DecayConfig {
    /// Chance of decaying within one second
    pub decay_probability: f32,
    pub open_duration: f32,
    pub seed: Option<u64>,
}

impl DecayConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut reader = OptionReader::new("decay", options);
        let config = Self {
            decay_probability: reader.number_in("decayProbability", 0.15, 0.0..=1.0)?,
            open_duration: reader.number_in("openDuration", 2.0, 0.1..=10.0)?,
            seed: reader.seed()?,
        };
        reader.finish();
        Ok(config)
    }

    /// `None` when the atom never decays
    pub fn half_life(&self) -> Option<f32> {
        let p = self.decay_probability;
        if p <= 0.0 {
            None
        } else if p >= 1.0 {
            Some(0.0)
        } else {
            Some(std::f32::consts::LN_2 / -(1.0 - p).ln())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AtomState {
    Intact,
    Decayed { at: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxState {
    Closed,
    Opening,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Control {
    Open,
    Reset,
    Probability,
}

pub struct Decay {
    config: DecayConfig,
    camera: Camera3D,
    rng: StdRng,
    resources: SceneResources<()>,
    bindings: ControlBindings<Control>,
    atom: AtomState,
    sealed_at: f32,
    last_checked: f32,
    lid: Timeline,
    atom_mesh: MeshId,
    lid_mesh: MeshId,
    alive_cat: MeshId,
    dead_cat: MeshId,
    label: OverlayId,
}

pub fn init(mount: &mut Mount, options: &Options) -> Result<Box<dyn Animation>> {
    let config = DecayConfig::from_options(options)?;
    Ok(Box::new(Decay::new(mount, config)?))
}

/// Body and head of a sitting cat
fn cat(color: [f32; 4]) -> Mesh {
    let part = |offset: Vec3, size: f32| CloudPoint {
        offset,
        size,
        color: [1.0; 4],
    };
    Mesh::new(
        Geometry::Cloud {
            points: vec![
                part(Vec3::new(0.0, 0.0, 0.0), 0.55),
                part(Vec3::new(0.55, 0.5, 0.0), 0.35),
                part(Vec3::new(0.45, 0.85, 0.0), 0.1),
                part(Vec3::new(0.7, 0.85, 0.0), 0.1),
                part(Vec3::new(-0.6, -0.3, 0.0), 0.12),
            ],
        },
        color,
    )
    .at(Vec3::new(1.4, -0.8, 0.0))
}

impl Decay {
    pub fn new(mount: &mut Mount, config: DecayConfig) -> Result<Self> {
        mount.ensure_attached()?;
        let stage = &mut mount.stage;
        let mut resources = SceneResources::new();

        resources.mesh(
            stage,
            Mesh::new(
                Geometry::Cuboid {
                    half_extents: BOX_HALF,
                },
                [0.6, 0.5, 0.35, 1.0],
            ),
        );
        let lid_mesh = resources.mesh(
            stage,
            Mesh::new(
                Geometry::Cuboid {
                    half_extents: Vec3::new(BOX_HALF.x, 0.05, BOX_HALF.z),
                },
                [0.75, 0.6, 0.4, 1.0],
            )
            .at(Vec3::Y * (BOX_HALF.y + 0.05)),
        );
        let atom_mesh = resources.mesh(
            stage,
            Mesh::new(Geometry::Sphere { radius: 0.3 }, ATOM_COLOR).at(Vec3::new(-1.9, -0.6, 0.0)),
        );
        // Detector and vial
        resources.mesh(
            stage,
            Mesh::new(
                Geometry::Cuboid {
                    half_extents: Vec3::new(0.3, 0.2, 0.2),
                },
                [0.8, 0.8, 0.9, 1.0],
            )
            .at(Vec3::new(-1.0, -1.3, 0.0)),
        );
        resources.mesh(
            stage,
            Mesh::new(
                Geometry::Cuboid {
                    half_extents: Vec3::new(0.1, 0.3, 0.1),
                },
                [0.5, 0.9, 0.9, 1.0],
            )
            .at(Vec3::new(0.0, -1.2, 0.0)),
        );
        let alive_cat = resources.mesh(stage, cat(ALIVE_COLOR));
        let dead_cat = resources.mesh(stage, cat(DEAD_COLOR));

        let label = resources.overlay(
            stage,
            Overlay {
                text: String::new(),
                anchor: Anchor::Screen(Vec2::new(0.03, 0.08)),
                color: [0.9, 0.9, 1.0, 1.0],
            },
        );
        resources.listen_camera(stage);

        let mut bindings = ControlBindings::new();
        let panel = &mut mount.panel;
        bindings.button(panel, "Open the box", Control::Open);
        bindings.button(panel, "Seal a new box", Control::Reset);
        bindings.slider(
            panel,
            "Decay probability / s",
            config.decay_probability,
            0.0..=1.0,
            0.01,
            Control::Probability,
        );

        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            camera: Camera3D::framing(mount.stage.aspect_ratio(), 10.0, 0.5, 0.3),
            lid: Timeline::new(config.open_duration),
            config,
            rng,
            resources,
            bindings,
            atom: AtomState::Intact,
            sealed_at: 0.0,
            last_checked: 0.0,
            atom_mesh,
            lid_mesh,
            alive_cat,
            dead_cat,
            label,
        })
    }

    pub fn atom(&self) -> AtomState {
        self.atom
    }

    pub fn box_state_at(&self, time: f32) -> BoxState {
        if !self.lid.is_started() {
            BoxState::Closed
        } else if self.lid.is_finished_at(time) {
            BoxState::Open
        } else {
            BoxState::Opening
        }
    }

    /// Start lifting the lid; the atom's history is fixed from here on
    pub fn open_box(&mut self, time: f32) {
        if self.lid.is_started() {
            return;
        }
        self.advance_atom(time);
        self.lid.begin(time);
        log::info!("Box opened at {time:.2}s: {:?}", self.atom);
    }

    /// Seal a fresh atom in a closed box at `time`
    pub fn reset(&mut self, time: f32) {
        self.atom = AtomState::Intact;
        self.sealed_at = time;
        self.last_checked = time;
        self.lid.clear();
    }

    /// Apply the decay hazard for the time since the last check
    fn advance_atom(&mut self, time: f32) {
        let dt = time - self.last_checked;
        if dt <= 0.0 {
            return;
        }
        self.last_checked = time;
        if self.atom == AtomState::Intact
            && self.rng.gen::<f32>() < chance_within(self.config.decay_probability, dt)
        {
            self.atom = AtomState::Decayed { at: time };
            log::debug!("Atom decayed at {time:.2}s");
        }
    }

    fn pose(&self, time: f32, stage: &mut Stage) {
        let state = self.box_state_at(time);
        let lift = ease_in_out_cubic(self.lid.progress_at(time));

        if let Some(mesh) = stage.mesh_mut(self.lid_mesh) {
            mesh.transform.position =
                Vec3::new(0.0, BOX_HALF.y + 0.05 + 1.2 * lift, -BOX_HALF.z * lift);
            mesh.transform.rotation = Quat::from_rotation_x(-1.1 * lift);
        }

        let decayed = matches!(self.atom, AtomState::Decayed { .. });
        if let Some(mesh) = stage.mesh_mut(self.atom_mesh) {
            // Only an opened box shows what the atom did
            mesh.material.color = match state {
                BoxState::Closed => ATOM_COLOR,
                _ if decayed => SPENT_COLOR,
                _ => ATOM_COLOR,
            };
            mesh.transform.scale = if state == BoxState::Closed {
                1.0 + 0.1 * (time * 3.0).sin()
            } else {
                1.0
            };
        }

        let (alive, dead) = match state {
            BoxState::Closed => (0.5, 0.5),
            _ if decayed => (1.0 - lift, 1.0),
            _ => (1.0, 1.0 - lift),
        };
        for (id, opacity) in [(self.alive_cat, alive), (self.dead_cat, dead)] {
            if let Some(mesh) = stage.mesh_mut(id) {
                mesh.material.opacity = opacity;
                mesh.visible = opacity > 0.0;
            }
        }

        let half_life = self
            .config
            .half_life()
            .map_or_else(|| "never".to_string(), |h| format!("{h:.1}s"));
        let text = match (state, self.atom) {
            (BoxState::Closed, _) => format!(
                "sealed {:.1}s   |intact⟩|alive⟩ + |decayed⟩|dead⟩   half-life {half_life}",
                time - self.sealed_at
            ),
            (_, AtomState::Intact) => "box open: the atom held together, the cat is alive".to_string(),
            (_, AtomState::Decayed { at }) => format!(
                "box open: the atom decayed {:.1}s after sealing, the cat is dead",
                at - self.sealed_at
            ),
        };
        if let Some(overlay) = stage.overlay_mut(self.label) {
            overlay.text = text;
        }
    }
}

impl Animation for Decay {
    fn name(&self) -> &'static str {
        "decay"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, frame: FrameTime, mount: &mut Mount) {
        if !self.lid.is_started() {
            self.advance_atom(frame.time);
        }
        self.pose(frame.time, &mut mount.stage);
    }

    fn on_control(&mut self, event: ControlEvent, time: f32, _mount: &mut Mount) {
        match self.bindings.resolve(&event) {
            Some((Control::Open, _)) => self.open_box(time),
            Some((Control::Reset, _)) => self.reset(time),
            Some((Control::Probability, ControlValue::Number(p))) => {
                self.config.decay_probability = p.clamp(0.0, 1.0);
            }
            _ => {}
        }
    }

    fn on_host_event(&mut self, event: HostEvent, _mount: &mut Mount) {
        steer_camera(&mut self.camera, event);
    }

    fn cleanup(self: Box<Self>, mount: &mut Mount) {
        self.resources.release(mount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionValue;

    fn scene(p: f64) -> (Mount, Decay) {
        let mut mount = Mount::new(800, 600);
        let options = Options::new()
            .with("decayProbability", OptionValue::Number(p))
            .with("seed", OptionValue::Number(17.0));
        let config = DecayConfig::from_options(&options).unwrap();
        let scene = Decay::new(&mut mount, config).unwrap();
        (mount, scene)
    }

    fn frame(i: u32) -> FrameTime {
        FrameTime {
            time: i as f32 / 60.0,
            delta: 1.0 / 60.0,
        }
    }

    #[test]
    fn zero_probability_never_decays() {
        let (mut mount, mut scene) = scene(0.0);
        for i in 0..10_000 {
            scene.update(frame(i), &mut mount);
        }
        assert_eq!(scene.atom(), AtomState::Intact);
        assert_eq!(scene.config.half_life(), None);
    }

    #[test]
    fn certain_probability_decays_on_first_step() {
        let (mut mount, mut scene) = scene(1.0);
        scene.update(frame(0), &mut mount);
        assert_eq!(scene.atom(), AtomState::Intact);
        scene.update(frame(1), &mut mount);
        assert!(matches!(scene.atom(), AtomState::Decayed { .. }));
    }

    #[test]
    fn repeated_time_draws_nothing() {
        let (mut mount, mut scene) = scene(1.0);
        for _ in 0..100 {
            scene.update(frame(0), &mut mount);
        }
        assert_eq!(scene.atom(), AtomState::Intact);
    }

    #[test]
    fn opening_freezes_the_history() {
        let (mut mount, mut scene) = scene(1.0);
        scene.open_box(0.0);
        for i in 0..600 {
            scene.update(frame(i), &mut mount);
        }
        assert_eq!(scene.atom(), AtomState::Intact);
    }

    #[test]
    fn lid_goes_closed_opening_open() {
        let (_, mut scene) = scene(0.15);
        assert_eq!(scene.box_state_at(1.0), BoxState::Closed);
        scene.open_box(1.0);
        assert_eq!(scene.box_state_at(2.0), BoxState::Opening);
        assert_eq!(scene.box_state_at(3.5), BoxState::Open);

        scene.reset(4.0);
        assert_eq!(scene.box_state_at(4.0), BoxState::Closed);
        assert_eq!(scene.atom(), AtomState::Intact);
    }

    #[test]
    fn half_life_matches_probability() {
        let (_, scene) = scene(0.5);
        assert!((scene.config.half_life().unwrap() - 1.0).abs() < 1e-5);
    }
}
