//! Verse 4: an entangled singlet pair
//!
//! Two particles sit apart, linked while they share a state. Measuring the
//! left one draws its spin at random and fixes the right one at once,
//! correlated by the angle between the two detectors. A flash travels to
//! the partner after a short delay so the correlation is visible.

use crate::config::{OptionReader, Options};
use crate::controls::{ControlBindings, ControlEvent, ControlValue};
use crate::error::Result;
use crate::lifecycle::{steer_camera, Animation, FrameTime, Mount, SceneResources};
use crate::physics::{BinaryCollapse, Outcome, Timeline};
use crate::stage::{Anchor, Geometry, HostEvent, Mesh, MeshId, Overlay, OverlayId, Stage};
use common::Camera3D;
use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

const PARTICLE_COLOR: [f32; 4] = [0.7, 0.8, 1.0, 1.0];
const UP_COLOR: [f32; 4] = [0.4, 0.7, 1.0, 1.0];
const DOWN_COLOR: [f32; 4] = [1.0, 0.45, 0.6, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct EntanglementConfig {
    /// Angle between the two detector axes, in degrees
    pub measurement_angle: f32,
    pub signal_delay: f32,
    pub flash_duration: f32,
    pub separation: f32,
    pub seed: Option<u64>,
}

impl EntanglementConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut reader = OptionReader::new("entanglement", options);
        let config = Self {
            measurement_angle: reader.number_in("measurementAngle", 0.0, 0.0..=180.0)?,
            signal_delay: reader.number_in("signalDelay", 0.35, 0.0..=10.0)?,
            flash_duration: reader.number_in("flashDuration", 0.6, 0.05..=10.0)?,
            separation: reader.number_in("separation", 5.0, 1.0..=20.0)?,
            seed: reader.seed()?,
        };
        reader.finish();
        Ok(config)
    }

    /// Probability both detectors read the same spin: `sin²(θ/2)`
    pub fn agreement_probability(&self) -> f32 {
        (self.measurement_angle.to_radians() / 2.0).sin().powi(2)
    }
}

/// Deferred effects of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    PartnerFlash,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Control {
    Measure,
    Batch,
    Reset,
    Angle,
}

/// Running tally of measured pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub pairs: u32,
    pub agreements: u32,
}

pub struct Entanglement {
    config: EntanglementConfig,
    camera: Camera3D,
    rng: StdRng,
    resources: SceneResources<Signal>,
    bindings: ControlBindings<Control>,
    left: BinaryCollapse,
    right: BinaryCollapse,
    partner_revealed: bool,
    flash: Timeline,
    tally: Tally,
    left_arrow: MeshId,
    right_arrow: MeshId,
    link: MeshId,
    flash_ring: MeshId,
    label: OverlayId,
}

pub fn init(mount: &mut Mount, options: &Options) -> Result<Box<dyn Animation>> {
    let config = EntanglementConfig::from_options(options)?;
    Ok(Box::new(Entanglement::new(mount, config)?))
}

fn spin_turn(outcome: Outcome) -> f32 {
    match outcome {
        Outcome::Primary => 0.0,
        Outcome::Secondary => PI,
    }
}

fn spin_color(outcome: Outcome) -> [f32; 4] {
    match outcome {
        Outcome::Primary => UP_COLOR,
        Outcome::Secondary => DOWN_COLOR,
    }
}

impl Entanglement {
    pub fn new(mount: &mut Mount, config: EntanglementConfig) -> Result<Self> {
        mount.ensure_attached()?;
        let stage = &mut mount.stage;
        let mut resources = SceneResources::new();
        let half = config.separation / 2.0;

        for x in [-half, half] {
            resources.mesh(
                stage,
                Mesh::new(Geometry::Sphere { radius: 0.4 }, PARTICLE_COLOR).at(Vec3::new(x, 0.0, 0.0)),
            );
            resources.mesh(
                stage,
                Mesh::new(
                    Geometry::Ring {
                        radius: 1.1,
                        segments: 48,
                    },
                    [0.35, 0.35, 0.5, 0.5],
                )
                .at(Vec3::new(x, 0.0, 0.0)),
            );
        }
        let left_arrow = resources.mesh(
            stage,
            Mesh::new(Geometry::Arrow { length: 1.6 }, PARTICLE_COLOR).at(Vec3::new(-half, 0.0, 0.0)),
        );
        let right_arrow = resources.mesh(
            stage,
            Mesh::new(Geometry::Arrow { length: 1.6 }, PARTICLE_COLOR).at(Vec3::new(half, 0.0, 0.0)),
        );
        let link = resources.mesh(
            stage,
            Mesh::new(
                Geometry::Polyline {
                    points: Vec::new(),
                    closed: false,
                },
                [0.8, 0.6, 1.0, 0.7],
            ),
        );
        let mut ring = Mesh::new(
            Geometry::Ring {
                radius: 0.6,
                segments: 40,
            },
            [1.0, 1.0, 0.7, 1.0],
        )
        .at(Vec3::new(half, 0.0, 0.0));
        ring.visible = false;
        let flash_ring = resources.mesh(stage, ring);

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
        bindings.button(panel, "Measure left", Control::Measure);
        bindings.button(panel, "Measure 100 pairs", Control::Batch);
        bindings.button(panel, "Re-entangle", Control::Reset);
        bindings.slider(
            panel,
            "Detector angle (deg)",
            config.measurement_angle,
            0.0..=180.0,
            5.0,
            Control::Angle,
        );

        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            camera: Camera3D::framing(mount.stage.aspect_ratio(), 11.0, 0.0, 0.2),
            flash: Timeline::new(config.flash_duration),
            config,
            rng,
            resources,
            bindings,
            left: BinaryCollapse::Pending,
            right: BinaryCollapse::Pending,
            partner_revealed: false,
            tally: Tally::default(),
            left_arrow,
            right_arrow,
            link,
            flash_ring,
            label,
        })
    }

    pub fn outcomes(&self) -> (Option<Outcome>, Option<Outcome>) {
        (self.left.outcome(), self.right.outcome())
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn partner_revealed(&self) -> bool {
        self.partner_revealed
    }

    fn draw_pair(&mut self) -> (Outcome, Outcome) {
        let left = if self.rng.gen::<f32>() < 0.5 {
            Outcome::Primary
        } else {
            Outcome::Secondary
        };
        let right = if self.rng.gen::<f32>() < self.config.agreement_probability() {
            left
        } else {
            left.opposite()
        };
        self.tally.pairs += 1;
        if left == right {
            self.tally.agreements += 1;
        }
        (left, right)
    }

    /// Measure the left particle at `time`; no-op while already measured
    pub fn measure(&mut self, time: f32) -> Option<(Outcome, Outcome)> {
        if self.left.is_resolved() {
            return None;
        }
        let (left, right) = self.draw_pair();
        self.left.fix(left);
        self.right.fix(right);
        self.resources
            .timers
            .schedule(time, self.config.signal_delay, Signal::PartnerFlash);
        log::debug!("Entangled pair measured: {left:?}/{right:?}");
        Some((left, right))
    }

    /// Tally `n` fresh pairs without animating them
    pub fn measure_batch(&mut self, n: u32) {
        for _ in 0..n {
            self.draw_pair();
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.partner_revealed = false;
        self.flash.clear();
        let cancelled = self.resources.timers.cancel_all();
        if cancelled > 0 {
            log::debug!("Re-entangled with {cancelled} signal(s) in flight");
        }
    }

    fn pose(&self, time: f32, stage: &mut Stage) {
        let angle = self.config.measurement_angle.to_radians();
        let half = self.config.separation / 2.0;
        let entangled = !self.left.is_resolved();

        let idle_spin = time * 2.0;
        let (left_turn, left_color) = match self.left.outcome() {
            Some(o) => (spin_turn(o), spin_color(o)),
            None => (idle_spin, PARTICLE_COLOR),
        };
        let (right_turn, right_color) = match self.right.outcome() {
            Some(o) if self.partner_revealed => (angle + spin_turn(o), spin_color(o)),
            _ => (-idle_spin, PARTICLE_COLOR),
        };
        for (id, turn, color) in [
            (self.left_arrow, left_turn, left_color),
            (self.right_arrow, right_turn, right_color),
        ] {
            if let Some(mesh) = stage.mesh_mut(id) {
                mesh.transform.rotation = Quat::from_rotation_z(turn);
                mesh.material.color = color;
            }
        }

        if let Some(mesh) = stage.mesh_mut(self.link) {
            mesh.visible = entangled;
            if entangled {
                let points = (0..=48)
                    .map(|i| {
                        let u = i as f32 / 48.0;
                        let x = -half + u * 2.0 * half;
                        let y = 0.25 * (u * PI).sin() * (u * 6.0 * PI + time * 3.0).sin();
                        Vec3::new(x, y, 0.0)
                    })
                    .collect();
                mesh.geometry = Geometry::Polyline {
                    points,
                    closed: false,
                };
            }
        }

        if let Some(mesh) = stage.mesh_mut(self.flash_ring) {
            let progress = self.flash.progress_at(time);
            mesh.visible = self.flash.is_started() && progress < 1.0;
            mesh.transform.scale = 1.0 + 2.0 * progress;
            mesh.material.opacity = 1.0 - progress;
        }

        if let Some(overlay) = stage.overlay_mut(self.label) {
            let observed = if self.tally.pairs == 0 {
                0.0
            } else {
                self.tally.agreements as f32 / self.tally.pairs as f32
            };
            overlay.text = format!(
                "{}   θ = {:.0}°   pairs {}   same {:.2} (expected {:.2})",
                if entangled { "entangled" } else { "measured" },
                self.config.measurement_angle,
                self.tally.pairs,
                observed,
                self.config.agreement_probability()
            );
        }
    }
}

impl Animation for Entanglement {
    fn name(&self) -> &'static str {
        "entanglement"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, frame: FrameTime, mount: &mut Mount) {
        for (due, signal) in self.resources.timers.poll_due(frame.time) {
            match signal {
                Signal::PartnerFlash => {
                    self.partner_revealed = true;
                    self.flash.begin(due);
                }
            }
        }
        self.pose(frame.time, &mut mount.stage);
    }

    fn on_control(&mut self, event: ControlEvent, time: f32, _mount: &mut Mount) {
        match self.bindings.resolve(&event) {
            Some((Control::Measure, _)) => {
                self.measure(time);
            }
            Some((Control::Batch, _)) => self.measure_batch(100),
            Some((Control::Reset, _)) => self.reset(),
            Some((Control::Angle, ControlValue::Number(degrees))) => {
                self.config.measurement_angle = degrees.clamp(0.0, 180.0);
                self.tally = Tally::default();
            }
            _ => {}
        }
    }

    fn on_host_event(&mut self, event: HostEvent, _mount: &mut Mount) {
        steer_camera(&mut self.camera, event);
    }

    fn pending_timers(&self) -> usize {
        self.resources.timers.pending()
    }

    fn cleanup(self: Box<Self>, mount: &mut Mount) {
        self.resources.release(mount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionValue;
    use crate::physics::progress;

    fn scene(angle: f64, seed: f64) -> (Mount, Entanglement) {
        let mut mount = Mount::new(800, 600);
        let options = Options::new()
            .with("measurementAngle", OptionValue::Number(angle))
            .with("seed", OptionValue::Number(seed));
        let config = EntanglementConfig::from_options(&options).unwrap();
        let scene = Entanglement::new(&mut mount, config).unwrap();
        (mount, scene)
    }

    #[test]
    fn aligned_detectors_always_disagree() {
        let (_, mut scene) = scene(0.0, 4.0);
        for i in 0..200 {
            let (left, right) = scene.measure(i as f32).unwrap();
            assert_eq!(right, left.opposite());
            scene.reset();
        }
        assert_eq!(scene.tally().agreements, 0);
    }

    #[test]
    fn opposed_detectors_always_agree() {
        let (_, mut scene) = scene(180.0, 4.0);
        scene.measure_batch(200);
        assert_eq!(scene.tally().agreements, 200);
    }

    #[test]
    fn right_angle_agrees_about_half_the_time() {
        let (_, mut scene) = scene(90.0, 21.0);
        scene.measure_batch(4000);
        let rate = scene.tally().agreements as f32 / 4000.0;
        assert!((rate - 0.5).abs() < 0.05, "{rate}");
    }

    #[test]
    fn partner_flash_waits_for_the_signal() {
        let (mut mount, mut scene) = scene(0.0, 1.0);
        scene.measure(1.0);
        assert_eq!(scene.pending_timers(), 1);

        scene.update(FrameTime { time: 1.2, delta: 0.2 }, &mut mount);
        assert!(!scene.partner_revealed());
        scene.update(FrameTime { time: 1.4, delta: 0.2 }, &mut mount);
        assert!(scene.partner_revealed());
        assert_eq!(scene.pending_timers(), 0);
        assert!(mount.stage.mesh(scene.flash_ring).unwrap().visible);
    }

    #[test]
    fn flash_timing_ignores_frame_spacing() {
        let signal_delay = EntanglementConfig::from_options(&Options::new())
            .unwrap()
            .signal_delay;
        let (mut mount, mut scene) = scene(0.0, 5.0);
        scene.measure(1.0);

        // One long frame well past the arrival
        let late = 1.0 + signal_delay + 0.3;
        scene.update(FrameTime { time: late, delta: late - 1.0 }, &mut mount);
        assert!(scene.partner_revealed());
        assert_eq!(scene.flash.start, Some(1.0 + signal_delay));
        let expected = progress(late, 1.0 + signal_delay, scene.config.flash_duration);
        assert!((scene.flash.progress_at(late) - expected).abs() < 1e-6);
    }

    #[test]
    fn second_measurement_is_ignored() {
        let (_, mut scene) = scene(45.0, 2.0);
        let first = scene.measure(0.0);
        assert!(first.is_some());
        assert!(scene.measure(0.1).is_none());
        assert_eq!(scene.tally().pairs, 1);
    }

    #[test]
    fn reset_cancels_signal_in_flight() {
        let (mut mount, mut scene) = scene(0.0, 3.0);
        scene.measure(0.0);
        scene.reset();
        assert_eq!(scene.pending_timers(), 0);
        scene.update(FrameTime { time: 2.0, delta: 2.0 }, &mut mount);
        assert!(!scene.partner_revealed());
        assert_eq!(scene.outcomes(), (None, None));
    }
}
