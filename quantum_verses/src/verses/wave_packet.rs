//! Verse 3: a spreading Gaussian wave packet
//!
//! The complex amplitude is drawn as a helix of phase-colored samples around
//! the x axis, with the probability density traced underneath. The width
//! grows linearly from the moment of the last reset and the peak drops so
//! the total probability stays fixed.

use crate::amplitude::{phase_color, Complex};
use crate::config::{OptionReader, Options};
use crate::controls::{ControlBindings, ControlEvent, ControlValue};
use crate::error::{Result, VerseError};
use crate::lifecycle::{steer_camera, Animation, FrameTime, Mount, SceneResources};
use crate::physics::{gaussian, spread_width};
use crate::stage::{
    Anchor, CloudPoint, Geometry, HostEvent, Mesh, MeshId, Overlay, OverlayId, Stage,
};
use common::Camera3D;
use glam::{Vec2, Vec3};

/// Dispersion `ω = DISPERSION * k²`
const DISPERSION: f32 = 0.125;
const HELIX_SCALE: f32 = 1.5;
const DENSITY_BASELINE: f32 = -2.2;
const DENSITY_SCALE: f32 = 2.5;

#[derive(Debug, Clone, PartialEq)]
pub struct WavePacketConfig {
    pub initial_width: f32,
    pub spread_rate: f32,
    pub wave_number: f32,
    pub samples: usize,
    /// Half-length of the sampled interval
    pub extent: f32,
}

impl WavePacketConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut reader = OptionReader::new("wave packet", options);
        let config = Self {
            initial_width: reader.number_in("initialWidth", 0.4, 0.05..=5.0)?,
            spread_rate: reader.number_in("spreadRate", 0.25, 0.0..=5.0)?,
            wave_number: reader.number_in("waveNumber", 6.0, 0.0..=40.0)?,
            samples: reader.count("samples", 160, 2048)?,
            extent: reader.number_in("extent", 8.0, 1.0..=50.0)?,
        };
        reader.finish();
        if config.samples < 2 {
            return Err(VerseError::invalid_option("samples", "need at least 2"));
        }
        Ok(config)
    }

    pub fn width_at(&self, elapsed: f32) -> f32 {
        spread_width(self.initial_width, self.spread_rate, elapsed)
    }

    /// Sample positions and amplitudes `elapsed` seconds after release
    pub fn sample(&self, elapsed: f32) -> Vec<(f32, Complex)> {
        let width = self.width_at(elapsed);
        let peak = (self.initial_width / width).sqrt();
        let omega = DISPERSION * self.wave_number * self.wave_number;
        let step = 2.0 * self.extent / (self.samples - 1) as f32;
        (0..self.samples)
            .map(|i| {
                let x = -self.extent + i as f32 * step;
                let envelope = peak * gaussian(x, 0.0, width);
                let phase = self.wave_number * x - omega * elapsed;
                (x, Complex::from_polar(envelope, phase))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Control {
    SpreadRate,
    WaveNumber,
    Reset,
}

pub struct WavePacket {
    config: WavePacketConfig,
    camera: Camera3D,
    resources: SceneResources<()>,
    bindings: ControlBindings<Control>,
    released_at: f32,
    helix: MeshId,
    density: MeshId,
    bracket: MeshId,
    label: OverlayId,
}

pub fn init(mount: &mut Mount, options: &Options) -> Result<Box<dyn Animation>> {
    let config = WavePacketConfig::from_options(options)?;
    Ok(Box::new(WavePacket::new(mount, config)?))
}

impl WavePacket {
    pub fn new(mount: &mut Mount, config: WavePacketConfig) -> Result<Self> {
        mount.ensure_attached()?;
        let stage = &mut mount.stage;
        let mut resources = SceneResources::new();

        resources.mesh(
            stage,
            Mesh::new(
                Geometry::Segments {
                    segments: vec![
                        (Vec3::new(-config.extent, 0.0, 0.0), Vec3::new(config.extent, 0.0, 0.0)),
                        (
                            Vec3::new(-config.extent, DENSITY_BASELINE, 0.0),
                            Vec3::new(config.extent, DENSITY_BASELINE, 0.0),
                        ),
                    ],
                },
                [0.35, 0.35, 0.5, 0.6],
            ),
        );
        let helix = resources.mesh(stage, Mesh::new(Geometry::Cloud { points: Vec::new() }, [1.0; 4]));
        let density = resources.mesh(
            stage,
            Mesh::new(
                Geometry::Polyline {
                    points: Vec::new(),
                    closed: false,
                },
                [1.0, 0.9, 0.4, 1.0],
            ),
        );
        let bracket = resources.mesh(
            stage,
            Mesh::new(Geometry::Segments { segments: Vec::new() }, [0.6, 1.0, 0.7, 0.8]),
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

        let mut bindings = ControlBindings::new();
        let panel = &mut mount.panel;
        bindings.slider(
            panel,
            "Spread rate",
            config.spread_rate,
            0.0..=2.0,
            0.05,
            Control::SpreadRate,
        );
        bindings.slider(
            panel,
            "Wave number k",
            config.wave_number,
            0.0..=20.0,
            0.5,
            Control::WaveNumber,
        );
        bindings.button(panel, "Release again", Control::Reset);

        Ok(Self {
            camera: Camera3D::framing(mount.stage.aspect_ratio(), 14.0, 0.5, 0.25),
            config,
            resources,
            bindings,
            released_at: 0.0,
            helix,
            density,
            bracket,
            label,
        })
    }

    pub fn config(&self) -> &WavePacketConfig {
        &self.config
    }

    pub fn width_at(&self, time: f32) -> f32 {
        self.config.width_at(time - self.released_at)
    }

    /// Restart the spreading from the initial width at `time`
    pub fn release(&mut self, time: f32) {
        self.released_at = time;
    }

    fn draw(&self, time: f32, stage: &mut Stage) {
        let elapsed = (time - self.released_at).max(0.0);
        let samples = self.config.sample(elapsed);
        let width = self.config.width_at(elapsed);

        let points = samples
            .iter()
            .map(|(x, psi)| CloudPoint {
                offset: Vec3::new(*x, psi.re * HELIX_SCALE, psi.im * HELIX_SCALE),
                size: 0.06,
                color: phase_color(*psi, psi.norm().clamp(0.15, 1.0)),
            })
            .collect();
        if let Some(mesh) = stage.mesh_mut(self.helix) {
            mesh.geometry = Geometry::Cloud { points };
        }

        let curve = samples
            .iter()
            .map(|(x, psi)| Vec3::new(*x, DENSITY_BASELINE + psi.norm_sq() * DENSITY_SCALE, 0.0))
            .collect();
        if let Some(mesh) = stage.mesh_mut(self.density) {
            mesh.geometry = Geometry::Polyline {
                points: curve,
                closed: false,
            };
        }

        let tick = |x: f32| {
            (
                Vec3::new(x, DENSITY_BASELINE - 0.25, 0.0),
                Vec3::new(x, DENSITY_BASELINE + 0.25, 0.0),
            )
        };
        if let Some(mesh) = stage.mesh_mut(self.bracket) {
            mesh.geometry = Geometry::Segments {
                segments: vec![
                    tick(-width),
                    tick(width),
                    (
                        Vec3::new(-width, DENSITY_BASELINE, 0.0),
                        Vec3::new(width, DENSITY_BASELINE, 0.0),
                    ),
                ],
            };
        }

        if let Some(overlay) = stage.overlay_mut(self.label) {
            overlay.text = format!(
                "σ(t) = {width:.2}   peak |ψ|² = {:.2}   t = {elapsed:.1}s",
                self.config.initial_width / width
            );
        }
    }
}

impl Animation for WavePacket {
    fn name(&self) -> &'static str {
        "wave packet"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, frame: FrameTime, mount: &mut Mount) {
        self.draw(frame.time, &mut mount.stage);
    }

    fn on_control(&mut self, event: ControlEvent, time: f32, _mount: &mut Mount) {
        match self.bindings.resolve(&event) {
            Some((Control::SpreadRate, ControlValue::Number(rate))) => {
                self.config.spread_rate = rate.max(0.0);
            }
            Some((Control::WaveNumber, ControlValue::Number(k))) => self.config.wave_number = k,
            Some((Control::Reset, _)) => self.release(time),
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
