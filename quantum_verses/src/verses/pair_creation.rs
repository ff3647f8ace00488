//! Verse 6: vacuum fluctuations
//!
//! Bursts of virtual particle/antiparticle pairs appear out of an empty
//! field, drift apart, live briefly and annihilate back into nothing. Bursts
//! and the staggered spawns inside them are deferred events owned by the
//! scene, so tearing it down mid-burst leaves nothing scheduled.

use crate::config::{OptionReader, Options};
use crate::controls::{ControlBindings, ControlEvent, ControlValue};
use crate::error::Result;
use crate::lifecycle::{steer_camera, Animation, FrameTime, Mount, SceneResources};
use crate::physics::{ease_in_out_cubic, ease_out_cubic, progress};
use crate::stage::{Anchor, Geometry, HostEvent, Mesh, MeshId, Overlay, OverlayId, Stage};
use common::Camera3D;
use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

const MAX_PAIRS: usize = 256;
const SPAWN_STAGGER: f32 = 0.12;
const REACH: f32 = 0.8;
const FIELD: Vec3 = Vec3::new(6.0, 3.5, 2.0);

const PARTICLE_COLOR: [f32; 4] = [0.35, 0.65, 1.0, 1.0];
const ANTIPARTICLE_COLOR: [f32; 4] = [1.0, 0.4, 0.35, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct PairCreationConfig {
    pub pairs_per_burst: usize,
    pub burst_interval: f32,
    pub creation_time: f32,
    pub lifetime: f32,
    pub annihilation_time: f32,
    pub seed: Option<u64>,
}

impl PairCreationConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut reader = OptionReader::new("pair creation", options);
        let config = Self {
            pairs_per_burst: reader.count("pairsPerBurst", 4, 64)?,
            burst_interval: reader.number_in("burstInterval", 1.5, 0.1..=20.0)?,
            creation_time: reader.number_in("creationTime", 0.5, 0.05..=5.0)?,
            lifetime: reader.number_in("lifetime", 2.0, 0.1..=20.0)?,
            annihilation_time: reader.number_in("annihilationTime", 0.5, 0.05..=5.0)?,
            seed: reader.seed()?,
        };
        reader.finish();
        Ok(config)
    }

    /// Seconds from appearance to annihilation
    pub fn total_span(&self) -> f32 {
        self.creation_time + self.lifetime + self.annihilation_time
    }

    pub fn phase_at(&self, age: f32) -> Option<PairPhase> {
        if age < 0.0 {
            None
        } else if age < self.creation_time {
            Some(PairPhase::Creation)
        } else if age < self.creation_time + self.lifetime {
            Some(PairPhase::Existing)
        } else if age < self.total_span() {
            Some(PairPhase::Annihilation)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairPhase {
    Creation,
    Existing,
    Annihilation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseCounts {
    pub creation: usize,
    pub existing: usize,
    pub annihilation: usize,
}

/// Deferred vacuum events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fluctuation {
    Burst,
    SpawnPair,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Control {
    Fluctuate,
    Interval,
    PairsPerBurst,
}

struct Pair {
    particle: MeshId,
    antiparticle: MeshId,
    center: Vec3,
    direction: Vec3,
    born: f32,
}

pub struct PairCreation {
    config: PairCreationConfig,
    camera: Camera3D,
    rng: StdRng,
    resources: SceneResources<Fluctuation>,
    bindings: ControlBindings<Control>,
    pairs: Vec<Pair>,
    created: u64,
    fluctuating: bool,
    label: OverlayId,
}

pub fn init(mount: &mut Mount, options: &Options) -> Result<Box<dyn Animation>> {
    let config = PairCreationConfig::from_options(options)?;
    Ok(Box::new(PairCreation::new(mount, config)?))
}

impl PairCreation {
    pub fn new(mount: &mut Mount, config: PairCreationConfig) -> Result<Self> {
        mount.ensure_attached()?;
        let stage = &mut mount.stage;
        let mut resources = SceneResources::new();

        // Faint grid standing in for the empty field
        let mut grid = Vec::new();
        for i in -6..=6 {
            let x = i as f32;
            grid.push((Vec3::new(x, -FIELD.y, -FIELD.z), Vec3::new(x, FIELD.y, -FIELD.z)));
        }
        for j in -3..=3 {
            let y = j as f32;
            grid.push((Vec3::new(-FIELD.x, y, -FIELD.z), Vec3::new(FIELD.x, y, -FIELD.z)));
        }
        resources.mesh(
            stage,
            Mesh::new(Geometry::Segments { segments: grid }, [0.25, 0.25, 0.4, 0.35]),
        );

        let label = resources.overlay(
            stage,
            Overlay {
                text: String::new(),
                anchor: Anchor::Screen(Vec2::new(0.03, 0.08)),
                color: [0.9, 0.9, 1.0, 1.0],
            },
        );
        resources.listen_camera(stage);
        resources.timers.schedule(0.0, 0.0, Fluctuation::Burst);

        let mut bindings = ControlBindings::new();
        let panel = &mut mount.panel;
        bindings.checkbox(panel, "Fluctuate", true, Control::Fluctuate);
        bindings.slider(
            panel,
            "Burst interval (s)",
            config.burst_interval,
            0.2..=5.0,
            0.1,
            Control::Interval,
        );
        bindings.slider(
            panel,
            "Pairs per burst",
            config.pairs_per_burst as f32,
            1.0..=16.0,
            1.0,
            Control::PairsPerBurst,
        );

        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            camera: Camera3D::framing(mount.stage.aspect_ratio(), 13.0, 0.3, 0.2),
            config,
            rng,
            resources,
            bindings,
            pairs: Vec::new(),
            created: 0,
            fluctuating: true,
            label,
        })
    }

    pub fn live_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn phase_counts(&self, time: f32) -> PhaseCounts {
        let mut counts = PhaseCounts::default();
        for pair in &self.pairs {
            match self.config.phase_at(time - pair.born) {
                Some(PairPhase::Creation) => counts.creation += 1,
                Some(PairPhase::Existing) => counts.existing += 1,
                Some(PairPhase::Annihilation) => counts.annihilation += 1,
                None => {}
            }
        }
        counts
    }

    /// Stop or restart the bursts; stopping drops everything scheduled
    pub fn set_fluctuating(&mut self, on: bool, time: f32) {
        if on == self.fluctuating {
            return;
        }
        self.fluctuating = on;
        if on {
            self.resources.timers.schedule(time, 0.0, Fluctuation::Burst);
        } else {
            self.resources.timers.cancel_all();
        }
    }

    fn fire(&mut self, event: Fluctuation, time: f32, stage: &mut Stage) {
        match event {
            Fluctuation::Burst => {
                let timers = &mut self.resources.timers;
                timers.schedule(time, self.config.burst_interval, Fluctuation::Burst);
                for i in 0..self.config.pairs_per_burst {
                    timers.schedule(time, i as f32 * SPAWN_STAGGER, Fluctuation::SpawnPair);
                }
            }
            Fluctuation::SpawnPair => self.spawn(time, stage),
        }
    }

    fn spawn(&mut self, time: f32, stage: &mut Stage) {
        if self.pairs.len() >= MAX_PAIRS {
            log::trace!("Pair creation: field saturated, skipping spawn");
            return;
        }
        let center = Vec3::new(
            self.rng.gen_range(-FIELD.x..=FIELD.x),
            self.rng.gen_range(-FIELD.y..=FIELD.y),
            self.rng.gen_range(-FIELD.z..=FIELD.z),
        );
        let angle = self.rng.gen_range(0.0..TAU);
        let direction = Vec3::new(angle.cos(), angle.sin(), 0.0);
        let sphere = |color| Mesh::new(Geometry::Sphere { radius: 0.12 }, color).at(center);
        let particle = self.resources.mesh(stage, sphere(PARTICLE_COLOR));
        let antiparticle = self.resources.mesh(stage, sphere(ANTIPARTICLE_COLOR));
        self.pairs.push(Pair {
            particle,
            antiparticle,
            center,
            direction,
            born: time,
        });
        self.created += 1;
    }

    /// Separation factor and opacity of a pair of the given age
    fn envelope(&self, age: f32) -> (f32, f32) {
        let c = &self.config;
        match c.phase_at(age) {
            Some(PairPhase::Creation) => {
                let u = ease_out_cubic(progress(age, 0.0, c.creation_time));
                (u, u)
            }
            Some(PairPhase::Existing) => (1.0, 1.0),
            Some(PairPhase::Annihilation) => {
                let u = ease_in_out_cubic(progress(
                    age,
                    c.creation_time + c.lifetime,
                    c.annihilation_time,
                ));
                (1.0 - u, 1.0 - u * u)
            }
            None => (0.0, 0.0),
        }
    }

    fn pose(&self, time: f32, stage: &mut Stage) {
        for pair in &self.pairs {
            let age = time - pair.born;
            let (spread, opacity) = self.envelope(age);
            // Pairs slowly turn about their midpoint while they exist
            let turn = Quat::from_rotation_z(age * 1.5);
            let offset = turn * pair.direction * REACH * spread;
            for (id, position) in [
                (pair.particle, pair.center + offset),
                (pair.antiparticle, pair.center - offset),
            ] {
                if let Some(mesh) = stage.mesh_mut(id) {
                    mesh.transform.position = position;
                    mesh.transform.scale = 0.4 + 0.6 * spread;
                    mesh.material.opacity = opacity;
                }
            }
        }

        if let Some(overlay) = stage.overlay_mut(self.label) {
            let counts = self.phase_counts(time);
            overlay.text = format!(
                "virtual pairs {}   arising {}   existing {}   passing {}   total {}",
                self.pairs.len(),
                counts.creation,
                counts.existing,
                counts.annihilation,
                self.created
            );
        }
    }
}

impl Animation for PairCreation {
    fn name(&self) -> &'static str {
        "pair creation"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, frame: FrameTime, mount: &mut Mount) {
        let stage = &mut mount.stage;
        // Zero-delay events scheduled by a firing event run in the same frame
        loop {
            let due = self.resources.timers.poll_due(frame.time);
            if due.is_empty() {
                break;
            }
            for (at, event) in due {
                self.fire(event, at, stage);
            }
        }

        let span = self.config.total_span();
        let (expired, live): (Vec<Pair>, Vec<Pair>) = std::mem::take(&mut self.pairs)
            .into_iter()
            .partition(|pair| frame.time - pair.born >= span);
        self.pairs = live;
        for pair in expired {
            self.resources.release_mesh(stage, pair.particle);
            self.resources.release_mesh(stage, pair.antiparticle);
        }

        self.pose(frame.time, stage);
    }

    fn on_control(&mut self, event: ControlEvent, time: f32, _mount: &mut Mount) {
        match self.bindings.resolve(&event) {
            Some((Control::Fluctuate, ControlValue::Toggle(on))) => self.set_fluctuating(on, time),
            Some((Control::Interval, ControlValue::Number(seconds))) => {
                self.config.burst_interval = seconds.max(0.1);
            }
            Some((Control::PairsPerBurst, ControlValue::Number(n))) => {
                self.config.pairs_per_burst = n.round().max(1.0) as usize;
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
        let report = self.resources.release(mount);
        if report.timers > 0 {
            log::debug!("Pair creation: cancelled {} pending fluctuation(s)", report.timers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionValue;

    fn scene(options: Options) -> (Mount, PairCreation) {
        let mut mount = Mount::new(800, 600);
        let config =
            PairCreationConfig::from_options(&options.with("seed", OptionValue::Number(6.0)))
                .unwrap();
        let scene = PairCreation::new(&mut mount, config).unwrap();
        (mount, scene)
    }

    fn run_until(scene: &mut PairCreation, mount: &mut Mount, until: f32) {
        let steps = (until * 60.0).round() as u32;
        for i in 0..=steps {
            scene.update(
                FrameTime {
                    time: i as f32 / 60.0,
                    delta: 1.0 / 60.0,
                },
                mount,
            );
        }
    }

    #[test]
    fn first_burst_spawns_staggered_pairs() {
        let (mut mount, mut scene) = scene(Options::new());
        scene.update(FrameTime { time: 0.0, delta: 0.0 }, &mut mount);
        assert_eq!(scene.live_pairs(), 1);
        run_until(&mut scene, &mut mount, 0.5);
        assert_eq!(scene.live_pairs(), 4);
        // Grid plus two spheres per pair
        assert_eq!(mount.live_resources().meshes, 1 + 8);
    }

    #[test]
    fn phases_follow_age() {
        let (_, scene) = scene(Options::new());
        let config = &scene.config;
        assert_eq!(config.phase_at(0.1), Some(PairPhase::Creation));
        assert_eq!(config.phase_at(1.0), Some(PairPhase::Existing));
        assert_eq!(config.phase_at(2.7), Some(PairPhase::Annihilation));
        assert_eq!(config.phase_at(3.1), None);
    }

    #[test]
    fn pairs_are_released_after_annihilation() {
        let options = Options::new().with("burstInterval", OptionValue::Number(20.0));
        let (mut mount, mut scene) = scene(options);
        run_until(&mut scene, &mut mount, 4.0);
        assert_eq!(scene.created(), 4);
        assert_eq!(scene.live_pairs(), 0);
        assert_eq!(mount.live_resources().meshes, 1);
    }

    #[test]
    fn live_pairs_are_capped() {
        let options = Options::new()
            .with("pairsPerBurst", OptionValue::Number(64.0))
            .with("burstInterval", OptionValue::Number(0.1))
            .with("lifetime", OptionValue::Number(20.0));
        let (mut mount, mut scene) = scene(options);
        run_until(&mut scene, &mut mount, 10.0);
        assert_eq!(scene.live_pairs(), MAX_PAIRS);
    }

    #[test]
    fn pausing_cancels_scheduled_events() {
        let (mut mount, mut scene) = scene(Options::new());
        scene.update(FrameTime { time: 0.0, delta: 0.0 }, &mut mount);
        assert!(scene.pending_timers() > 0);
        scene.set_fluctuating(false, 0.1);
        assert_eq!(scene.pending_timers(), 0);

        run_until(&mut scene, &mut mount, 2.0);
        assert_eq!(scene.created(), 1);

        scene.set_fluctuating(true, 2.0);
        assert_eq!(scene.pending_timers(), 1);
    }

    #[test]
    fn phase_counts_cover_every_live_pair() {
        let (mut mount, mut scene) = scene(Options::new());
        run_until(&mut scene, &mut mount, 5.0);
        let counts = scene.phase_counts(5.0);
        assert_eq!(
            counts.creation + counts.existing + counts.annihilation,
            scene.live_pairs()
        );
    }
}
