//! Verse 1: the double slit
//!
//! Electrons leave a point source and fly at a barrier with two slits.
//! Electrons that meet solid barrier are removed and never scored. Those that
//! pass continue to the screen, landing according to the interference
//! pattern, or behind their slit when the which-path detector is on.

use crate::config::{OptionReader, Options};
use crate::controls::{ControlBindings, ControlEvent, ControlValue};
use crate::error::{Result, VerseError};
use crate::lifecycle::{steer_camera, Animation, FrameTime, Mount, SceneResources};
use crate::physics::sinc;
use crate::stage::{
    Anchor, CloudPoint, Geometry, HostEvent, Mesh, MeshId, Overlay, OverlayId, Stage,
};
use common::Camera3D;
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f32::consts::PI;

const SOURCE_X: f32 = -6.0;
const BARRIER_X: f32 = 0.0;
const SCREEN_X: f32 = 6.0;
const HALF_HEIGHT: f32 = 3.0;
const BINS: usize = 40;
const MAX_MARKS: usize = 1500;
const MAX_ELECTRONS: usize = 2000;

const UPPER_COLOR: [f32; 4] = [1.0, 0.6, 0.2, 1.0];
const LOWER_COLOR: [f32; 4] = [0.3, 1.0, 0.5, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slit {
    Upper,
    Lower,
}

impl Slit {
    fn center(self, separation: f32) -> f32 {
        match self {
            Slit::Upper => separation / 2.0,
            Slit::Lower => -separation / 2.0,
        }
    }

    fn color(self) -> [f32; 4] {
        match self {
            Slit::Upper => UPPER_COLOR,
            Slit::Lower => LOWER_COLOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoubleSlitConfig {
    /// Maximum electrons in flight
    pub electron_count: usize,
    /// Electrons emitted per second
    pub emission_rate: f32,
    pub slit_separation: f32,
    pub slit_width: f32,
    pub measurement_enabled: bool,
    pub particle_speed: f32,
    pub wavelength: f32,
    pub particle_color: [f32; 4],
    pub seed: Option<u64>,
}

impl DoubleSlitConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut reader = OptionReader::new("double slit", options);
        let config = Self {
            electron_count: reader.count("electronCount", 100, MAX_ELECTRONS)?,
            emission_rate: reader.number_in("emissionRate", 40.0, 0.0..=500.0)?,
            slit_separation: reader.number_in("slitSeparation", 1.2, 0.2..=4.0)?,
            slit_width: reader.number_in("slitWidth", 0.3, 0.05..=1.0)?,
            measurement_enabled: reader.flag("measurementEnabled", false)?,
            particle_speed: reader.number_in("particleSpeed", 4.0, 0.5..=20.0)?,
            wavelength: reader.number_in("wavelength", 0.15, 0.02..=2.0)?,
            particle_color: reader.color("particleColor", [0.4, 0.8, 1.0, 1.0])?,
            seed: reader.seed()?,
        };
        reader.finish();

        if config.slit_width >= config.slit_separation {
            return Err(VerseError::invalid_option("slitWidth", "slits would overlap"));
        }
        Ok(config)
    }

    /// Which slit, if any, an electron crossing the barrier at `y` goes through
    pub fn slit_at(&self, y: f32) -> Option<Slit> {
        let half = self.slit_width / 2.0;
        [Slit::Upper, Slit::Lower]
            .into_iter()
            .find(|slit| (y - slit.center(self.slit_separation)).abs() <= half)
    }

    /// Far-field intensity at screen height `y`, 1 at the center
    pub fn intensity(&self, y: f32) -> f32 {
        let distance = SCREEN_X - BARRIER_X;
        let scale = PI * y / (self.wavelength * distance);
        let fringe = (scale * self.slit_separation).cos();
        let envelope = sinc(scale * self.slit_width);
        fringe * fringe * envelope * envelope
    }
}

#[derive(Debug, Clone)]
pub struct Electron {
    pub mesh: MeshId,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Recorded only while the which-path detector is on
    pub slit_used: Option<Slit>,
    pub crossing_y: Option<f32>,
    target_y: Option<f32>,
}

/// An electron scored on the screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub y: f32,
    pub crossing_y: f32,
    pub slit_used: Option<Slit>,
}

enum Fate {
    Flying(Electron),
    Blocked(MeshId),
    Landed(MeshId, Hit),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Control {
    Measure,
    ElectronCount,
    Reset,
}

pub struct DoubleSlit {
    config: DoubleSlitConfig,
    camera: Camera3D,
    rng: StdRng,
    resources: SceneResources<()>,
    bindings: ControlBindings<Control>,
    electrons: Vec<Electron>,
    /// Most recent landings, newest last
    hits: VecDeque<Hit>,
    scored: usize,
    histogram: [u32; BINS],
    blocked: usize,
    emit_accumulator: f32,
    detector: MeshId,
    marks: MeshId,
    bars: MeshId,
    stats: OverlayId,
}

pub fn init(mount: &mut Mount, options: &Options) -> Result<Box<dyn Animation>> {
    let config = DoubleSlitConfig::from_options(options)?;
    Ok(Box::new(DoubleSlit::new(mount, config)?))
}

impl DoubleSlit {
    pub fn new(mount: &mut Mount, config: DoubleSlitConfig) -> Result<Self> {
        mount.ensure_attached()?;
        let stage = &mut mount.stage;
        let mut resources = SceneResources::new();

        let half = config.slit_width / 2.0;
        let c = config.slit_separation / 2.0;
        let wall = |y0: f32, y1: f32| (Vec3::new(BARRIER_X, y0, 0.0), Vec3::new(BARRIER_X, y1, 0.0));
        resources.mesh(
            stage,
            Mesh::new(
                Geometry::Segments {
                    segments: vec![
                        wall(-HALF_HEIGHT, -c - half),
                        wall(-c + half, c - half),
                        wall(c + half, HALF_HEIGHT),
                    ],
                },
                [0.7, 0.7, 0.75, 1.0],
            ),
        );
        resources.mesh(
            stage,
            Mesh::new(
                Geometry::Polyline {
                    points: vec![
                        Vec3::new(SCREEN_X, -HALF_HEIGHT, 0.0),
                        Vec3::new(SCREEN_X, HALF_HEIGHT, 0.0),
                    ],
                    closed: false,
                },
                [0.5, 0.5, 0.6, 1.0],
            ),
        );
        resources.mesh(
            stage,
            Mesh::new(Geometry::Sphere { radius: 0.25 }, [1.0, 1.0, 0.6, 1.0])
                .at(Vec3::new(SOURCE_X, 0.0, 0.0)),
        );

        let mut detector_mesh = Mesh::new(
            Geometry::Ring {
                radius: c + half + 0.25,
                segments: 48,
            },
            [1.0, 0.75, 0.2, 0.8],
        )
        .at(Vec3::new(BARRIER_X, 0.0, 0.0));
        detector_mesh.visible = config.measurement_enabled;
        let detector = resources.mesh(stage, detector_mesh);

        let marks = resources.mesh(stage, Mesh::new(Geometry::Cloud { points: Vec::new() }, [1.0; 4]));
        let bars = resources.mesh(
            stage,
            Mesh::new(Geometry::Segments { segments: Vec::new() }, [0.9, 0.9, 1.0, 0.8]),
        );
        let stats = resources.overlay(
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
        bindings.checkbox(
            panel,
            "Which-path detector",
            config.measurement_enabled,
            Control::Measure,
        );
        bindings.slider(
            panel,
            "Electrons in flight",
            config.electron_count as f32,
            10.0..=MAX_ELECTRONS as f32,
            10.0,
            Control::ElectronCount,
        );
        bindings.button(panel, "Reset screen", Control::Reset);

        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            camera: Camera3D::framing(mount.stage.aspect_ratio(), 16.0, 0.0, 0.12),
            config,
            rng,
            resources,
            bindings,
            electrons: Vec::new(),
            hits: VecDeque::with_capacity(MAX_MARKS),
            scored: 0,
            histogram: [0; BINS],
            blocked: 0,
            emit_accumulator: 0.0,
            detector,
            marks,
            bars,
            stats,
        })
    }

    pub fn config(&self) -> &DoubleSlitConfig {
        &self.config
    }

    pub fn electrons(&self) -> &[Electron] {
        &self.electrons
    }

    /// The last landings still marked on the screen
    pub fn hits(&self) -> &VecDeque<Hit> {
        &self.hits
    }

    /// Every landing since the last reset
    pub fn scored(&self) -> usize {
        self.scored
    }

    /// Electrons removed at the barrier
    pub fn blocked(&self) -> usize {
        self.blocked
    }

    fn spawn(&mut self, stage: &mut Stage) {
        let reach = (self.config.slit_separation / 2.0 + self.config.slit_width) * 1.3;
        let aim = Vec3::new(BARRIER_X, self.rng.gen_range(-reach..=reach), 0.0);
        let origin = Vec3::new(SOURCE_X, 0.0, 0.0);
        let velocity = (aim - origin).normalize() * self.config.particle_speed;
        let mesh = self.resources.mesh(
            stage,
            Mesh::new(Geometry::Sphere { radius: 0.08 }, self.config.particle_color).at(origin),
        );
        self.electrons.push(Electron {
            mesh,
            position: origin,
            velocity,
            slit_used: None,
            crossing_y: None,
            target_y: None,
        });
    }

    /// Sample where an electron that went through `slit` lands
    fn landing(&mut self, slit: Slit) -> f32 {
        if self.config.measurement_enabled {
            // Straight-line shadow of the slit plus diffraction blur
            let lever = (SCREEN_X - SOURCE_X) / (BARRIER_X - SOURCE_X);
            let u1 = self.rng.gen::<f32>().max(1e-6);
            let u2 = self.rng.gen::<f32>();
            let normal = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
            return (slit.center(self.config.slit_separation) * lever + normal * 0.35)
                .clamp(-HALF_HEIGHT, HALF_HEIGHT);
        }
        for _ in 0..256 {
            let y = self.rng.gen_range(-HALF_HEIGHT..=HALF_HEIGHT);
            if self.rng.gen::<f32>() < self.config.intensity(y) {
                return y;
            }
        }
        0.0
    }

    fn advance(&mut self, mut electron: Electron, dt: f32) -> Fate {
        let previous = electron.position;
        electron.position += electron.velocity * dt;

        match electron.target_y {
            None if electron.position.x >= BARRIER_X => {
                let frac = (BARRIER_X - previous.x) / (electron.position.x - previous.x);
                let y = previous.y + (electron.position.y - previous.y) * frac;
                let Some(slit) = self.config.slit_at(y) else {
                    return Fate::Blocked(electron.mesh);
                };
                let target = self.landing(slit);
                let crossing = Vec3::new(BARRIER_X, y, 0.0);
                electron.velocity = (Vec3::new(SCREEN_X, target, 0.0) - crossing).normalize()
                    * self.config.particle_speed;
                electron.position = crossing + electron.velocity * (1.0 - frac) * dt;
                electron.crossing_y = Some(y);
                electron.slit_used = self.config.measurement_enabled.then_some(slit);
                electron.target_y = Some(target);
                Fate::Flying(electron)
            }
            Some(target) if electron.position.x >= SCREEN_X => Fate::Landed(
                electron.mesh,
                Hit {
                    y: target,
                    crossing_y: electron.crossing_y.unwrap_or(target),
                    slit_used: electron.slit_used,
                },
            ),
            _ => Fate::Flying(electron),
        }
    }

    fn record(&mut self, hit: Hit) {
        let bin = ((hit.y + HALF_HEIGHT) / (2.0 * HALF_HEIGHT) * BINS as f32) as usize;
        self.histogram[bin.min(BINS - 1)] += 1;
        if self.hits.len() == MAX_MARKS {
            self.hits.pop_front();
        }
        self.hits.push_back(hit);
        self.scored += 1;
    }

    fn refresh_screen(&self, stage: &mut Stage) {
        let marks: Vec<CloudPoint> = self
            .hits
            .iter()
            .map(|hit| CloudPoint {
                offset: Vec3::new(SCREEN_X, hit.y, 0.0),
                size: 0.04,
                color: hit.slit_used.map_or([0.8, 0.9, 1.0, 0.7], Slit::color),
            })
            .collect();
        if let Some(mesh) = stage.mesh_mut(self.marks) {
            mesh.geometry = Geometry::Cloud { points: marks };
        }

        let tallest = self.histogram.iter().copied().max().unwrap_or(0).max(1) as f32;
        let bin_height = 2.0 * HALF_HEIGHT / BINS as f32;
        let segments = self
            .histogram
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(i, count)| {
                let y = -HALF_HEIGHT + (i as f32 + 0.5) * bin_height;
                let length = *count as f32 / tallest * 2.5;
                (
                    Vec3::new(SCREEN_X + 0.15, y, 0.0),
                    Vec3::new(SCREEN_X + 0.15 + length, y, 0.0),
                )
            })
            .collect();
        if let Some(mesh) = stage.mesh_mut(self.bars) {
            mesh.geometry = Geometry::Segments { segments };
        }
    }

    fn reset(&mut self, stage: &mut Stage) {
        for electron in self.electrons.drain(..) {
            self.resources.release_mesh(stage, electron.mesh);
        }
        self.hits.clear();
        self.scored = 0;
        self.histogram = [0; BINS];
        self.blocked = 0;
        self.emit_accumulator = 0.0;
        self.refresh_screen(stage);
    }
}

impl Animation for DoubleSlit {
    fn name(&self) -> &'static str {
        "double slit"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, frame: FrameTime, mount: &mut Mount) {
        let stage = &mut mount.stage;

        self.emit_accumulator += self.config.emission_rate * frame.delta;
        while self.emit_accumulator >= 1.0 {
            self.emit_accumulator -= 1.0;
            if self.electrons.len() < self.config.electron_count {
                self.spawn(stage);
            }
        }

        let mut landed_any = false;
        for electron in std::mem::take(&mut self.electrons) {
            match self.advance(electron, frame.delta) {
                Fate::Flying(electron) => {
                    if let Some(mesh) = stage.mesh_mut(electron.mesh) {
                        mesh.transform.position = electron.position;
                        mesh.material.color = electron
                            .slit_used
                            .map_or(self.config.particle_color, Slit::color);
                    }
                    self.electrons.push(electron);
                }
                Fate::Blocked(mesh) => {
                    self.resources.release_mesh(stage, mesh);
                    self.blocked += 1;
                }
                Fate::Landed(mesh, hit) => {
                    self.resources.release_mesh(stage, mesh);
                    self.record(hit);
                    landed_any = true;
                }
            }
        }
        if landed_any {
            self.refresh_screen(stage);
        }

        if let Some(overlay) = stage.overlay_mut(self.stats) {
            overlay.text = format!(
                "detector {}   scored {}   blocked {}   in flight {}",
                if self.config.measurement_enabled { "ON" } else { "off" },
                self.scored,
                self.blocked,
                self.electrons.len()
            );
        }
    }

    fn on_control(&mut self, event: ControlEvent, _time: f32, mount: &mut Mount) {
        match self.bindings.resolve(&event) {
            Some((Control::Measure, ControlValue::Toggle(on))) => {
                self.config.measurement_enabled = on;
                if let Some(mesh) = mount.stage.mesh_mut(self.detector) {
                    mesh.visible = on;
                }
                log::info!("Which-path detector {}", if on { "on" } else { "off" });
            }
            Some((Control::ElectronCount, ControlValue::Number(n))) => {
                self.config.electron_count = n.round().max(0.0) as usize;
            }
            Some((Control::Reset, _)) => self.reset(&mut mount.stage),
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
    use crate::controls::WidgetKind;

    fn run(options: &Options, frames: usize) -> (Mount, DoubleSlit) {
        let mut mount = Mount::new(1280, 720);
        let config = DoubleSlitConfig::from_options(options).unwrap();
        let mut scene = DoubleSlit::new(&mut mount, config).unwrap();
        for i in 0..frames {
            scene.update(
                FrameTime {
                    time: i as f32 / 60.0,
                    delta: 1.0 / 60.0,
                },
                &mut mount,
            );
        }
        (mount, scene)
    }

    #[test]
    fn unmeasured_hits_only_come_through_slits() {
        let options = Options::new()
            .with("measurementEnabled", OptionValue::Bool(false))
            .with("seed", OptionValue::Number(11.0));
        let (_, scene) = run(&options, 900);

        assert!(!scene.hits().is_empty());
        assert!(scene.blocked() > 0);
        for hit in scene.hits() {
            assert_eq!(hit.slit_used, None);
            assert!(scene.config().slit_at(hit.crossing_y).is_some(), "{hit:?}");
        }
    }

    #[test]
    fn measured_hits_record_their_slit() {
        let options = Options::new()
            .with("measurementEnabled", OptionValue::Bool(true))
            .with("seed", OptionValue::Number(3.0));
        let (_, scene) = run(&options, 900);

        assert!(!scene.hits().is_empty());
        for hit in scene.hits() {
            assert_eq!(hit.slit_used, scene.config().slit_at(hit.crossing_y));
        }
    }

    #[test]
    fn flight_is_capped_by_electron_count() {
        let options = Options::new()
            .with("electronCount", OptionValue::Number(15.0))
            .with("emissionRate", OptionValue::Number(400.0))
            .with("seed", OptionValue::Number(5.0));
        let (_, scene) = run(&options, 120);
        assert!(scene.electrons().len() <= 15);
    }

    #[test]
    fn screen_keeps_only_recent_marks() {
        let options = Options::new()
            .with("electronCount", OptionValue::Number(2000.0))
            .with("emissionRate", OptionValue::Number(500.0))
            .with("seed", OptionValue::Number(21.0));
        let (mount, scene) = run(&options, 1800);

        assert!(scene.scored() > MAX_MARKS, "scored {}", scene.scored());
        assert_eq!(scene.hits().len(), MAX_MARKS);
        let binned: u32 = scene.histogram.iter().sum();
        assert_eq!(binned as usize, scene.scored());
        match &mount.stage.mesh(scene.marks).unwrap().geometry {
            Geometry::Cloud { points } => assert_eq!(points.len(), MAX_MARKS),
            other => panic!("marks are not a cloud: {other:?}"),
        }
    }

    #[test]
    fn slider_covers_every_accepted_electron_count() {
        let options = Options::new().with("electronCount", OptionValue::Number(1500.0));
        let (mount, scene) = run(&options, 0);
        assert_eq!(scene.config().electron_count, 1500);

        let slider = scene.bindings.widget_for(Control::ElectronCount).unwrap();
        match mount.panel.widget(slider).unwrap().kind {
            WidgetKind::Slider { value, max, .. } => {
                assert_eq!(max, MAX_ELECTRONS as f32);
                assert_eq!(value, 1500.0);
            }
            ref other => panic!("not a slider: {other:?}"),
        }
    }

    #[test]
    fn overlapping_slits_are_rejected() {
        let options = Options::new()
            .with("slitSeparation", OptionValue::Number(0.3))
            .with("slitWidth", OptionValue::Number(0.5));
        assert!(DoubleSlitConfig::from_options(&options).is_err());
    }

    #[test]
    fn intensity_has_bright_center_and_dark_fringe() {
        let config = DoubleSlitConfig::from_options(&Options::new()).unwrap();
        assert!((config.intensity(0.0) - 1.0).abs() < 1e-6);
        let first_dark = config.wavelength * (SCREEN_X - BARRIER_X) / (2.0 * config.slit_separation);
        assert!(config.intensity(first_dark) < 1e-4);
    }

    #[test]
    fn reset_clears_the_screen() {
        let options = Options::new().with("seed", OptionValue::Number(9.0));
        let (mut mount, mut scene) = run(&options, 600);
        let reset = scene.bindings.widget_for(Control::Reset).unwrap();
        scene.on_control(
            ControlEvent {
                widget: reset,
                value: ControlValue::Pressed,
            },
            10.0,
            &mut mount,
        );
        assert!(scene.hits().is_empty());
        assert_eq!(scene.scored(), 0);
        assert!(scene.electrons().is_empty());
        assert_eq!(scene.blocked(), 0);
    }
}
