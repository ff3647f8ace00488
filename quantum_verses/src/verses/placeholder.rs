//! Stand-in scene for verses without an animation (or whose animation
//! failed to start). Shows a message and nothing else.

use crate::lifecycle::{Animation, FrameTime, Mount, SceneResources};
use crate::route::VerseId;
use crate::stage::{Anchor, Overlay};
use common::Camera3D;
use glam::Vec2;

pub struct Placeholder {
    camera: Camera3D,
    resources: SceneResources<()>,
}

/// Infallible: only touches the mount if it is attached
pub fn mount(mount: &mut Mount, id: VerseId) -> Box<dyn Animation> {
    let message = format!("Animation for {id} coming soon");
    let mut resources = SceneResources::new();
    if mount.stage.is_attached() {
        resources.overlay(
            &mut mount.stage,
            Overlay {
                text: message.clone(),
                anchor: Anchor::Screen(Vec2::new(0.5, 0.5)),
                color: [0.8, 0.85, 1.0, 0.9],
            },
        );
    }
    if mount.panel.is_attached() {
        mount.panel.set_message(message);
    }
    Box::new(Placeholder {
        camera: Camera3D::new(mount.stage.aspect_ratio()),
        resources,
    })
}

impl Animation for Placeholder {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn update(&mut self, _frame: FrameTime, _mount: &mut Mount) {}

    fn cleanup(self: Box<Self>, mount: &mut Mount) {
        self.resources.release(mount);
    }
}
