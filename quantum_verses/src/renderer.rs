//! Stage rendering
//!
//! Draws the flattened [`DrawLists`] of the mounted verse: camera-facing
//! sprites through an instanced billboard pipeline and colored segments
//! through a line-list pipeline, both in one pass.

use crate::stage::{DrawLists, Segment, Sprite};
use common::{Camera3D, CameraUniform, GraphicsContext};
use wgpu::util::DeviceExt;

/// Instance data for one billboard sprite
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

impl PointInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        2 => Float32x3,  // position
        3 => Float32,    // size
        4 => Float32x4,  // color
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

impl From<&Sprite> for PointInstance {
    fn from(sprite: &Sprite) -> Self {
        Self {
            position: sprite.position.to_array(),
            size: sprite.size,
            color: sprite.color,
        }
    }
}

/// Quad corner for billboards
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

const QUAD_VERTICES: &[QuadVertex] = &[
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [1.0, 1.0] },
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0] },
];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl LineVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// GPU-ready data for one frame, capped to the buffer capacities
#[derive(Debug, Default)]
pub struct FrameGeometry {
    pub points: Vec<PointInstance>,
    pub lines: Vec<LineVertex>,
    pub dropped_points: usize,
    pub dropped_lines: usize,
}

impl FrameGeometry {
    pub fn build(lists: &DrawLists, max_points: usize, max_lines: usize) -> Self {
        let points = lists
            .sprites
            .iter()
            .take(max_points)
            .map(PointInstance::from)
            .collect();
        let lines = lists
            .segments
            .iter()
            .take(max_lines)
            .flat_map(|Segment { start, end, color }| {
                [
                    LineVertex {
                        position: start.to_array(),
                        color: *color,
                    },
                    LineVertex {
                        position: end.to_array(),
                        color: *color,
                    },
                ]
            })
            .collect();
        Self {
            points,
            lines,
            dropped_points: lists.sprites.len().saturating_sub(max_points),
            dropped_lines: lists.segments.len().saturating_sub(max_lines),
        }
    }
}

/// Tracks how many sprites and segments the last frames had to drop, so an
/// ongoing overflow is reported once instead of every frame
#[derive(Debug, Default)]
pub struct OverflowWatch {
    dropped: (usize, usize),
}

impl OverflowWatch {
    /// True when the dropped counts differ from the previous frame and are
    /// not both zero
    pub fn changed(&mut self, geometry: &FrameGeometry) -> bool {
        let dropped = (geometry.dropped_points, geometry.dropped_lines);
        let previous = std::mem::replace(&mut self.dropped, dropped);
        dropped != previous && dropped != (0, 0)
    }
}

/// Alpha-blended pipeline over one shader entry pair
fn stage_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    entry: (&str, &str),
    buffers: &[wgpu::VertexBufferLayout<'_>],
    topology: wgpu::PrimitiveTopology,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let (vs, fs) = entry;
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(vs),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: vs,
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: fs,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// Renders whatever the mounted verse has placed on the stage
pub struct StageRenderer {
    point_pipeline: wgpu::RenderPipeline,
    quad_buffer: wgpu::Buffer,
    point_buffer: wgpu::Buffer,
    max_points: usize,

    line_pipeline: wgpu::RenderPipeline,
    line_buffer: wgpu::Buffer,
    max_lines: usize,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    num_points: u32,
    num_line_vertices: u32,
    overflow: OverflowWatch,
}

impl StageRenderer {
    pub fn new(ctx: &GraphicsContext, max_points: usize, max_lines: usize) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Verse Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/verses.wgsl").into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Camera Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Verse Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        let format = ctx.config.format;
        let point_pipeline = stage_pipeline(
            device,
            &pipeline_layout,
            &shader,
            ("vs_point", "fs_point"),
            &[QuadVertex::layout(), PointInstance::layout()],
            wgpu::PrimitiveTopology::TriangleList,
            format,
        );
        let line_pipeline = stage_pipeline(
            device,
            &pipeline_layout,
            &shader,
            ("vs_line", "fs_line"),
            &[LineVertex::layout()],
            wgpu::PrimitiveTopology::LineList,
            format,
        );

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let point_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Point Instance Buffer"),
            size: (std::mem::size_of::<PointInstance>() * max_points) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let line_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Line Buffer"),
            size: (std::mem::size_of::<LineVertex>() * max_lines * 2) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            point_pipeline,
            quad_buffer,
            point_buffer,
            max_points,
            line_pipeline,
            line_buffer,
            max_lines,
            camera_buffer,
            camera_bind_group,
            num_points: 0,
            num_line_vertices: 0,
            overflow: OverflowWatch::default(),
        }
    }

    pub fn update_camera(&self, queue: &wgpu::Queue, camera: &Camera3D) {
        let uniform = CameraUniform::from_camera_3d(camera);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// Upload this frame's sprites and segments
    pub fn prepare(&mut self, queue: &wgpu::Queue, lists: &DrawLists) {
        let geometry = FrameGeometry::build(lists, self.max_points, self.max_lines);
        if self.overflow.changed(&geometry) {
            log::warn!(
                "Stage over capacity: dropped {} sprites, {} segments",
                geometry.dropped_points,
                geometry.dropped_lines
            );
        }
        if !geometry.points.is_empty() {
            queue.write_buffer(&self.point_buffer, 0, bytemuck::cast_slice(&geometry.points));
        }
        if !geometry.lines.is_empty() {
            queue.write_buffer(&self.line_buffer, 0, bytemuck::cast_slice(&geometry.lines));
        }
        self.num_points = geometry.points.len() as u32;
        self.num_line_vertices = geometry.lines.len() as u32;
    }

    /// Clear to `background`, then draw lines under sprites
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        background: [f32; 4],
    ) {
        let [r, g, b, a] = background.map(f64::from);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Stage Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

        if self.num_line_vertices > 0 {
            render_pass.set_pipeline(&self.line_pipeline);
            render_pass.set_vertex_buffer(0, self.line_buffer.slice(..));
            render_pass.draw(0..self.num_line_vertices, 0..1);
        }

        if self.num_points > 0 {
            render_pass.set_pipeline(&self.point_pipeline);
            render_pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
            render_pass.set_vertex_buffer(1, self.point_buffer.slice(..));
            render_pass.draw(0..6, 0..self.num_points);
        }
    }
}
