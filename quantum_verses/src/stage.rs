//! The visual mount point
//!
//! A [`Stage`] owns every mesh, label overlay and host-event listener a
//! scene registers. Scenes only hold the returned handles, so the stage can
//! account for exactly what is still alive after a scene is torn down.

use glam::{Quat, Vec2, Vec3};
use std::collections::BTreeMap;

macro_rules! handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);
    };
}

handle!(MeshId);
handle!(OverlayId);
handle!(ListenerId);

/// Shape of a mesh in its local space
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Camera-facing disc
    Sphere { radius: f32 },
    /// Wireframe box
    Cuboid { half_extents: Vec3 },
    Polyline { points: Vec<Vec3>, closed: bool },
    /// Disconnected line segments
    Segments { segments: Vec<(Vec3, Vec3)> },
    Ring { radius: f32, segments: u32 },
    /// Arrow along local +Y, centered on the origin
    Arrow { length: f32 },
    /// Individually sized and colored sprites
    Cloud { points: Vec<CloudPoint> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudPoint {
    pub offset: Vec3,
    pub size: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: [f32; 4],
    pub opacity: f32,
}

impl Material {
    pub fn color(color: [f32; 4]) -> Self {
        Self {
            color,
            opacity: 1.0,
        }
    }

    fn tint(&self, color: [f32; 4]) -> [f32; 4] {
        [
            color[0] * self.color[0],
            color[1] * self.color[1],
            color[2] * self.color[2],
            color[3] * self.color[3] * self.opacity.clamp(0.0, 1.0),
        ]
    }

    fn effective(&self) -> [f32; 4] {
        self.tint([1.0; 4])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn apply(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * (local * self.scale)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
    pub transform: Transform,
    pub visible: bool,
}

impl Mesh {
    pub fn new(geometry: Geometry, color: [f32; 4]) -> Self {
        Self {
            geometry,
            material: Material::color(color),
            transform: Transform::default(),
            visible: true,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }
}

/// Where a text label is pinned
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    World(Vec3),
    /// Fraction of the viewport, origin top-left
    Screen(Vec2),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub text: String,
    pub anchor: Anchor,
    pub color: [f32; 4],
}

/// Events the host forwards to scenes that listen for them
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Resized { width: u32, height: u32 },
    PointerDrag { dx: f32, dy: f32 },
    Wheel { delta: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    Resize,
    PointerDrag,
    Wheel,
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::Resized { .. } => HostEventKind::Resize,
            HostEvent::PointerDrag { .. } => HostEventKind::PointerDrag,
            HostEvent::Wheel { .. } => HostEventKind::Wheel,
        }
    }
}

/// Camera-facing sprite ready for the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub position: Vec3,
    pub size: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: [f32; 4],
}

/// Flattened, world-space draw data for one frame
#[derive(Debug, Default)]
pub struct DrawLists {
    pub sprites: Vec<Sprite>,
    pub segments: Vec<Segment>,
}

pub struct Stage {
    meshes: BTreeMap<MeshId, Mesh>,
    overlays: BTreeMap<OverlayId, Overlay>,
    listeners: BTreeMap<ListenerId, HostEventKind>,
    next_id: u64,
    width: u32,
    height: u32,
    attached: bool,
    pub background: [f32; 4],
}

pub const DEFAULT_BACKGROUND: [f32; 4] = [0.02, 0.02, 0.08, 1.0];

impl Stage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            meshes: BTreeMap::new(),
            overlays: BTreeMap::new(),
            listeners: BTreeMap::new(),
            next_id: 0,
            width,
            height,
            attached: true,
            background: DEFAULT_BACKGROUND,
        }
    }

    /// A stage with no surface behind it; scenes refuse to mount on it
    pub fn detached() -> Self {
        Self {
            attached: false,
            ..Self::new(0, 0)
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        let id = MeshId(self.next());
        self.meshes.insert(id, mesh);
        id
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(&id)
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(&id)
    }

    /// Returns false if the handle was already released
    pub fn release_mesh(&mut self, id: MeshId) -> bool {
        self.meshes.remove(&id).is_some()
    }

    pub fn add_overlay(&mut self, overlay: Overlay) -> OverlayId {
        let id = OverlayId(self.next());
        self.overlays.insert(id, overlay);
        id
    }

    pub fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.overlays.get_mut(&id)
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        self.overlays.remove(&id).is_some()
    }

    pub fn overlays(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.values()
    }

    pub fn listen(&mut self, kind: HostEventKind) -> ListenerId {
        let id = ListenerId(self.next());
        self.listeners.insert(id, kind);
        id
    }

    pub fn unlisten(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn is_listening(&self, kind: HostEventKind) -> bool {
        self.listeners.values().any(|k| *k == kind)
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_overlays(&self) -> usize {
        self.overlays.len()
    }

    pub fn live_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Drop everything; used only to recover from a scene that leaked
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.overlays.clear();
        self.listeners.clear();
        self.background = DEFAULT_BACKGROUND;
    }

    /// Flatten visible meshes into world-space sprites and segments
    pub fn draw_lists(&self) -> DrawLists {
        let mut lists = DrawLists::default();
        for mesh in self.meshes.values().filter(|m| m.visible) {
            let color = mesh.material.effective();
            if color[3] <= 0.0 {
                continue;
            }
            let t = &mesh.transform;
            let mut line = |a: Vec3, b: Vec3| {
                lists.segments.push(Segment {
                    start: t.apply(a),
                    end: t.apply(b),
                    color,
                })
            };

            match &mesh.geometry {
                Geometry::Sphere { radius } => lists.sprites.push(Sprite {
                    position: t.position,
                    size: radius * t.scale,
                    color,
                }),
                Geometry::Cuboid { half_extents: h } => {
                    let corner = |i: usize| {
                        Vec3::new(
                            if i & 1 == 0 { -h.x } else { h.x },
                            if i & 2 == 0 { -h.y } else { h.y },
                            if i & 4 == 0 { -h.z } else { h.z },
                        )
                    };
                    for i in 0..8 {
                        for bit in [1, 2, 4] {
                            if i & bit == 0 {
                                line(corner(i), corner(i | bit));
                            }
                        }
                    }
                }
                Geometry::Polyline { points, closed } => {
                    for pair in points.windows(2) {
                        line(pair[0], pair[1]);
                    }
                    if *closed && points.len() > 2 {
                        line(points[points.len() - 1], points[0]);
                    }
                }
                Geometry::Segments { segments } => {
                    for (a, b) in segments {
                        line(*a, *b);
                    }
                }
                Geometry::Ring { radius, segments } => {
                    let n = (*segments).max(3);
                    let point = |i: u32| {
                        let a = i as f32 / n as f32 * std::f32::consts::TAU;
                        Vec3::new(a.cos() * radius, a.sin() * radius, 0.0)
                    };
                    for i in 0..n {
                        line(point(i), point(i + 1));
                    }
                }
                Geometry::Arrow { length } => {
                    let tip = Vec3::Y * (length / 2.0);
                    let head = length * 0.2;
                    line(-tip, tip);
                    line(tip, tip + Vec3::new(-head, -head, 0.0));
                    line(tip, tip + Vec3::new(head, -head, 0.0));
                }
                Geometry::Cloud { points } => {
                    for p in points {
                        let tinted = mesh.material.tint(p.color);
                        if tinted[3] > 0.0 {
                            lists.sprites.push(Sprite {
                                position: t.apply(p.offset),
                                size: p.size * t.scale,
                                color: tinted,
                            });
                        }
                    }
                }
            }
        }
        lists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handles_stop_counting() {
        let mut stage = Stage::new(800, 600);
        let a = stage.add_mesh(Mesh::new(Geometry::Sphere { radius: 1.0 }, [1.0; 4]));
        let b = stage.add_mesh(Mesh::new(Geometry::Ring { radius: 1.0, segments: 8 }, [1.0; 4]));
        assert_eq!(stage.live_meshes(), 2);
        assert!(stage.release_mesh(a));
        assert!(!stage.release_mesh(a));
        assert!(stage.release_mesh(b));
        assert_eq!(stage.live_meshes(), 0);
    }

    #[test]
    fn cuboid_has_twelve_edges() {
        let mut stage = Stage::new(1, 1);
        stage.add_mesh(Mesh::new(
            Geometry::Cuboid { half_extents: Vec3::ONE },
            [1.0; 4],
        ));
        let lists = stage.draw_lists();
        assert_eq!(lists.segments.len(), 12);
        assert!(lists.sprites.is_empty());
    }

    #[test]
    fn invisible_and_transparent_meshes_are_skipped() {
        let mut stage = Stage::new(1, 1);
        let hidden = stage.add_mesh(Mesh::new(Geometry::Sphere { radius: 1.0 }, [1.0; 4]));
        stage.mesh_mut(hidden).unwrap().visible = false;
        let faded = stage.add_mesh(Mesh::new(Geometry::Sphere { radius: 1.0 }, [1.0; 4]));
        stage.mesh_mut(faded).unwrap().material.opacity = 0.0;
        assert!(stage.draw_lists().sprites.is_empty());
    }

    #[test]
    fn transforms_place_sprites_in_world_space() {
        let mut stage = Stage::new(1, 1);
        let mut mesh = Mesh::new(
            Geometry::Cloud {
                points: vec![CloudPoint {
                    offset: Vec3::X,
                    size: 0.5,
                    color: [1.0, 1.0, 1.0, 0.5],
                }],
            },
            [1.0; 4],
        )
        .at(Vec3::new(0.0, 2.0, 0.0));
        mesh.transform.scale = 2.0;
        stage.add_mesh(mesh);

        let sprite = stage.draw_lists().sprites[0];
        assert!((sprite.position - Vec3::new(2.0, 2.0, 0.0)).length() < 1e-6);
        assert!((sprite.size - 1.0).abs() < 1e-6);
        assert!((sprite.color[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn listeners_are_tracked_by_kind() {
        let mut stage = Stage::new(1, 1);
        let id = stage.listen(HostEventKind::Resize);
        assert!(stage.is_listening(HostEventKind::Resize));
        assert!(!stage.is_listening(HostEventKind::Wheel));
        assert!(stage.unlisten(id));
        assert_eq!(stage.live_listeners(), 0);
    }
}
