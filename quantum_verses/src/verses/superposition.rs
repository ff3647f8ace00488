//! Verse 2: superposition and collapse
//!
//! A spin holds both outcomes at once, drawn as two families of ghost images
//! orbiting the particle with opacity given by their amplitudes. Observing
//! it draws one outcome, and the ghosts of that branch snap onto it while
//! the other branch fades away.

use crate::config::{OptionReader, Options};
use crate::controls::{ControlBindings, ControlEvent, ControlValue};
use crate::error::Result;
use crate::lifecycle::{steer_camera, Animation, FrameTime, Mount, SceneResources};
use crate::physics::{ease_out_elastic, BinaryCollapse, Outcome, Timeline};
use crate::stage::{Anchor, Geometry, HostEvent, Mesh, MeshId, Overlay, OverlayId, Stage};
use common::Camera3D;
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f32::consts::{PI, TAU};

const ORBIT_RADIUS: f32 = 2.2;
const BRANCH_HEIGHT: f32 = 1.0;
const SETTLED_HEIGHT: f32 = 1.6;

const UP_COLOR: [f32; 4] = [0.4, 0.7, 1.0, 1.0];
const DOWN_COLOR: [f32; 4] = [1.0, 0.45, 0.6, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct SuperpositionConfig {
    pub up_probability: f32,
    pub ghost_count: usize,
    pub collapse_duration: f32,
    pub orbit_speed: f32,
    pub seed: Option<u64>,
}

impl SuperpositionConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut reader = OptionReader::new("superposition", options);
        let config = Self {
            up_probability: reader.number_in("upProbability", 0.5, 0.0..=1.0)?,
            ghost_count: reader.count("ghostCount", 6, 32)?,
            collapse_duration: reader.number_in("collapseDuration", 1.2, 0.05..=10.0)?,
            orbit_speed: reader.number_in("orbitSpeed", 1.0, 0.0..=10.0)?,
            seed: reader.seed()?,
        };
        reader.finish();
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinPhase {
    Superposed,
    Collapsing,
    Collapsed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Control {
    Observe,
    Reset,
    Probability,
}

struct Ghost {
    mesh: MeshId,
    branch: Outcome,
    slot: f32,
}

pub struct Superposition {
    config: SuperpositionConfig,
    camera: Camera3D,
    rng: StdRng,
    resources: SceneResources<()>,
    bindings: ControlBindings<Control>,
    spin: BinaryCollapse,
    collapse: Timeline,
    ghosts: Vec<Ghost>,
    up_arrow: MeshId,
    down_arrow: MeshId,
    label: OverlayId,
}

pub fn init(mount: &mut Mount, options: &Options) -> Result<Box<dyn Animation>> {
    let config = SuperpositionConfig::from_options(options)?;
    Ok(Box::new(Superposition::new(mount, config)?))
}

fn branch_color(branch: Outcome) -> [f32; 4] {
    match branch {
        Outcome::Primary => UP_COLOR,
        Outcome::Secondary => DOWN_COLOR,
    }
}

fn branch_sign(branch: Outcome) -> f32 {
    match branch {
        Outcome::Primary => 1.0,
        Outcome::Secondary => -1.0,
    }
}

impl Superposition {
    pub fn new(mount: &mut Mount, config: SuperpositionConfig) -> Result<Self> {
        mount.ensure_attached()?;
        let stage = &mut mount.stage;
        let mut resources = SceneResources::new();

        resources.mesh(
            stage,
            Mesh::new(Geometry::Sphere { radius: 0.45 }, [0.95, 0.95, 1.0, 1.0]),
        );
        resources.mesh(
            stage,
            Mesh::new(
                Geometry::Ring {
                    radius: ORBIT_RADIUS,
                    segments: 64,
                },
                [0.3, 0.3, 0.45, 0.5],
            ),
        );
        let up_arrow = resources.mesh(
            stage,
            Mesh::new(Geometry::Arrow { length: 1.2 }, UP_COLOR).at(Vec3::Y * 0.9),
        );
        let mut down = Mesh::new(Geometry::Arrow { length: 1.2 }, DOWN_COLOR).at(Vec3::Y * -0.9);
        down.transform.rotation = Quat::from_rotation_z(PI);
        let down_arrow = resources.mesh(stage, down);

        let n = config.ghost_count;
        let ghosts = (0..n)
            .map(|i| {
                let branch = if i % 2 == 0 {
                    Outcome::Primary
                } else {
                    Outcome::Secondary
                };
                let mesh = resources.mesh(
                    stage,
                    Mesh::new(Geometry::Sphere { radius: 0.22 }, branch_color(branch)),
                );
                Ghost {
                    mesh,
                    branch,
                    slot: TAU * i as f32 / n.max(1) as f32,
                }
            })
            .collect();

        let label = resources.overlay(
            stage,
            Overlay {
                text: String::new(),
                anchor: Anchor::Screen(glam::Vec2::new(0.03, 0.08)),
                color: [0.9, 0.9, 1.0, 1.0],
            },
        );
        resources.listen_camera(stage);

        let mut bindings = ControlBindings::new();
        let panel = &mut mount.panel;
        bindings.button(panel, "Observe", Control::Observe);
        bindings.button(panel, "Reset", Control::Reset);
        bindings.slider(
            panel,
            "P(up)",
            config.up_probability,
            0.0..=1.0,
            0.01,
            Control::Probability,
        );

        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            camera: Camera3D::framing(mount.stage.aspect_ratio(), 9.0, 0.4, 0.35),
            collapse: Timeline::new(config.collapse_duration),
            config,
            rng,
            resources,
            bindings,
            spin: BinaryCollapse::Pending,
            ghosts,
            up_arrow,
            down_arrow,
            label,
        })
    }

    pub fn phase_at(&self, time: f32) -> SpinPhase {
        match self.spin {
            BinaryCollapse::Pending => SpinPhase::Superposed,
            BinaryCollapse::Resolved(_) if self.collapse.is_finished_at(time) => {
                SpinPhase::Collapsed
            }
            BinaryCollapse::Resolved(_) => SpinPhase::Collapsing,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.spin.outcome()
    }

    /// Draw the outcome and start the collapse; repeated observations keep it
    pub fn observe(&mut self, time: f32) -> Outcome {
        if let Some(outcome) = self.spin.outcome() {
            return outcome;
        }
        let outcome = self.spin.resolve(&mut self.rng, self.config.up_probability);
        self.collapse.begin(time);
        log::info!(
            "Superposition observed: {}",
            if outcome == Outcome::Primary { "up" } else { "down" }
        );
        outcome
    }

    pub fn reset(&mut self) {
        self.spin.reset();
        self.collapse.clear();
    }

    fn amplitude(&self, branch: Outcome) -> f32 {
        match branch {
            Outcome::Primary => self.config.up_probability.sqrt(),
            Outcome::Secondary => (1.0 - self.config.up_probability).sqrt(),
        }
    }

    fn pose(&self, time: f32, stage: &mut Stage) {
        // Orbits freeze at the moment of observation
        let orbit_time = self.collapse.start.unwrap_or(time);
        let progress = self.collapse.progress_at(time);
        let snap = ease_out_elastic(progress);
        let outcome = self.spin.outcome();

        for ghost in &self.ghosts {
            let angle = ghost.slot + self.config.orbit_speed * orbit_time;
            let sign = branch_sign(ghost.branch);
            let orbiting = Vec3::new(
                ORBIT_RADIUS * angle.cos(),
                sign * BRANCH_HEIGHT,
                ORBIT_RADIUS * angle.sin(),
            );
            let amplitude = self.amplitude(ghost.branch);

            let (position, opacity) = match outcome {
                None => (orbiting, amplitude),
                Some(chosen) if chosen == ghost.branch => {
                    let settled = Vec3::Y * sign * SETTLED_HEIGHT;
                    (orbiting + (settled - orbiting) * snap, amplitude + (1.0 - amplitude) * progress)
                }
                Some(_) => (orbiting, amplitude * (1.0 - progress)),
            };
            if let Some(mesh) = stage.mesh_mut(ghost.mesh) {
                mesh.transform.position = position;
                mesh.material.opacity = opacity;
                mesh.visible = opacity > 0.0;
            }
        }

        let arrow_opacity = |branch: Outcome| match outcome {
            None => self.amplitude(branch),
            Some(chosen) if chosen == branch => 1.0,
            Some(_) => 1.0 - progress,
        };
        for (id, branch) in [
            (self.up_arrow, Outcome::Primary),
            (self.down_arrow, Outcome::Secondary),
        ] {
            let opacity = arrow_opacity(branch);
            if let Some(mesh) = stage.mesh_mut(id) {
                mesh.material.opacity = opacity;
                mesh.visible = opacity > 0.0;
            }
        }

        let p = self.config.up_probability;
        let text = match (self.phase_at(time), outcome) {
            (SpinPhase::Superposed, _) | (_, None) => format!(
                "|ψ⟩ = {:.2}|↑⟩ + {:.2}|↓⟩    P(↑) = {p:.2}",
                p.sqrt(),
                (1.0 - p).sqrt()
            ),
            (SpinPhase::Collapsing, Some(_)) => "observing...".to_string(),
            (SpinPhase::Collapsed, Some(Outcome::Primary)) => "collapsed: |↑⟩".to_string(),
            (SpinPhase::Collapsed, Some(Outcome::Secondary)) => "collapsed: |↓⟩".to_string(),
        };
        if let Some(overlay) = stage.overlay_mut(self.label) {
            overlay.text = text;
        }
    }
}

impl Animation for Superposition {
    fn name(&self) -> &'static str {
        "superposition"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, frame: FrameTime, mount: &mut Mount) {
        self.pose(frame.time, &mut mount.stage);
    }

    fn on_control(&mut self, event: ControlEvent, time: f32, _mount: &mut Mount) {
        match self.bindings.resolve(&event) {
            Some((Control::Observe, _)) => {
                self.observe(time);
            }
            Some((Control::Reset, _)) => self.reset(),
            Some((Control::Probability, ControlValue::Number(p))) => {
                self.config.up_probability = p.clamp(0.0, 1.0);
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

    fn scene(options: Options) -> (Mount, Superposition) {
        let mut mount = Mount::new(800, 600);
        let config = SuperpositionConfig::from_options(&options).unwrap();
        let scene = Superposition::new(&mut mount, config).unwrap();
        (mount, scene)
    }

    fn ghost_positions(scene: &Superposition, mount: &Mount) -> Vec<Vec3> {
        scene
            .ghosts
            .iter()
            .map(|g| mount.stage.mesh(g.mesh).unwrap().transform.position)
            .collect()
    }

    #[test]
    fn certain_probabilities_decide_the_outcome() {
        let (_, mut up) = scene(Options::new().with("upProbability", OptionValue::Number(1.0)));
        assert_eq!(up.observe(0.0), Outcome::Primary);

        let (_, mut down) = scene(Options::new().with("upProbability", OptionValue::Number(0.0)));
        assert_eq!(down.observe(0.0), Outcome::Secondary);
    }

    #[test]
    fn collapse_runs_through_its_phases() {
        let (_, mut scene) = scene(Options::new().with("seed", OptionValue::Number(1.0)));
        assert_eq!(scene.phase_at(0.0), SpinPhase::Superposed);
        scene.observe(2.0);
        assert_eq!(scene.phase_at(2.5), SpinPhase::Collapsing);
        assert_eq!(scene.phase_at(3.5), SpinPhase::Collapsed);

        scene.reset();
        assert_eq!(scene.phase_at(4.0), SpinPhase::Superposed);
        assert_eq!(scene.outcome(), None);
    }

    #[test]
    fn second_observation_keeps_the_outcome() {
        let (_, mut scene) = scene(Options::new().with("seed", OptionValue::Number(8.0)));
        let first = scene.observe(0.0);
        for t in 1..20 {
            assert_eq!(scene.observe(t as f32), first);
        }
        // The collapse clock was not restarted
        assert_eq!(scene.collapse.start, Some(0.0));
    }

    #[test]
    fn pose_depends_only_on_time() {
        let (mut mount, mut scene) = scene(Options::new().with("seed", OptionValue::Number(2.0)));
        scene.update(FrameTime { time: 3.0, delta: 0.1 }, &mut mount);
        let first = ghost_positions(&scene, &mount);
        scene.update(FrameTime { time: 5.0, delta: 2.0 }, &mut mount);
        scene.update(FrameTime { time: 3.0, delta: 0.1 }, &mut mount);
        assert_eq!(ghost_positions(&scene, &mount), first);
    }

    #[test]
    fn losing_branch_fades_out() {
        let (mut mount, mut scene) =
            scene(Options::new().with("upProbability", OptionValue::Number(1.0)));
        scene.observe(0.0);
        scene.update(FrameTime { time: 5.0, delta: 0.1 }, &mut mount);
        for ghost in &scene.ghosts {
            let mesh = mount.stage.mesh(ghost.mesh).unwrap();
            if ghost.branch == Outcome::Secondary {
                assert!(!mesh.visible);
            } else {
                assert!((mesh.transform.position - Vec3::Y * SETTLED_HEIGHT).length() < 1e-4);
            }
        }
    }
}
