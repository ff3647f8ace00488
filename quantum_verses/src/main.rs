//! Quantum Verses
//!
//! Controls:
//! - `[` / `]`: Previous / next verse
//! - Backspace or Alt+Left: Back through visited verses
//! - Alt+Right: Forward
//! - R: Remount the current verse
//! - Left drag: Orbit camera
//! - Scroll: Zoom
//!
//! `--headless --frames N` runs the selected verse without a window at a
//! fixed step and reports what it left behind after shutdown.

use clap::Parser;
use common::{Camera3D, GraphicsContext};
use quantum_verses::config::AppConfig;
use quantum_verses::lifecycle::Mount;
use quantum_verses::orchestrator::{Orchestrator, Selection};
use quantum_verses::renderer::StageRenderer;
use quantum_verses::route::{Route, VerseId};
use quantum_verses::scheduler::{run_fixed, FrameLoop, TickMode};
use quantum_verses::stage::HostEvent;
use quantum_verses::ui::{self, NavAction};
use quantum_verses::verses::default_registry;
use quantum_verses::Result;
use std::path::PathBuf;
use std::time::Instant;
use winit::{
    event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ControlFlow,
    keyboard::{KeyCode, ModifiersState, PhysicalKey},
};

const MAX_POINTS: usize = 20_000;
const MAX_LINES: usize = 20_000;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verse to open first
    #[arg(long)]
    verse: Option<u32>,

    /// Deep link such as "?verse=3"; takes precedence over --verse
    #[arg(long)]
    link: Option<String>,

    /// Option for the first verse, e.g. --set electronCount=300
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Run without opening a window
    #[arg(long)]
    headless: bool,

    /// Frames to simulate in headless mode
    #[arg(long, default_value_t = 600)]
    frames: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let start = match &args.link {
        Some(link) => Route::parse(link)?.verse,
        None => VerseId(args.verse.unwrap_or(config.start_verse)),
    };

    let mut orchestrator =
        Orchestrator::new(default_registry()).with_options(config.verse_options()?);
    let options = orchestrator.options_mut(start);
    for assignment in &args.overrides {
        options.apply_override(assignment)?;
    }

    if args.headless {
        run_headless(orchestrator, start, &config, args.frames)
    } else {
        run_windowed(orchestrator, start, &config)
    }
}

fn report(selection: &Selection) {
    match selection {
        Selection::Loaded(id) => log::info!("Showing {id}"),
        Selection::Placeholder { id, reason } => {
            log::warn!("Showing placeholder for {id}: {reason}")
        }
    }
}

fn run_headless(
    mut orchestrator: Orchestrator,
    start: VerseId,
    config: &AppConfig,
    frames: u64,
) -> Result<()> {
    let mut mount = Mount::new(config.window.width, config.window.height);
    report(&orchestrator.select_verse(start, &mut mount));

    let step = match config.frame.tick_mode() {
        TickMode::Fixed { step } => step,
        TickMode::Variable { .. } => 1.0 / 60.0,
    };
    let clock = run_fixed(frames, step, |frame| orchestrator.frame(frame, &mut mount));

    let name = orchestrator.active().map_or("nothing", |a| a.name());
    log::info!(
        "Ran {} for {} frames ({:.1}s): {:?}",
        name,
        clock.frames(),
        clock.elapsed(),
        mount.live_resources()
    );

    orchestrator.shutdown(&mut mount);
    let leftover = mount.live_resources();
    if leftover.is_empty() {
        log::info!("Shutdown left the mount empty");
    } else {
        log::warn!("Shutdown left {leftover:?} on the mount");
    }
    Ok(())
}

struct EguiState {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

struct App {
    ctx: GraphicsContext,
    renderer: StageRenderer,
    orchestrator: Orchestrator,
    mount: Mount,
    clock: FrameLoop,
    started: Instant,
    title: String,
    modifiers: ModifiersState,
    dragging: bool,
    cursor: Option<(f64, f64)>,
    egui: EguiState,
}

impl App {
    fn new(ctx: GraphicsContext, orchestrator: Orchestrator, config: &AppConfig) -> Self {
        let renderer = StageRenderer::new(&ctx, MAX_POINTS, MAX_LINES);
        let mount = Mount::new(ctx.size.width, ctx.size.height);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &ctx.window,
            Some(ctx.window.scale_factor() as f32),
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&ctx.device, ctx.config.format, None, 1);

        Self {
            ctx,
            renderer,
            orchestrator,
            mount,
            clock: FrameLoop::new(config.frame.tick_mode()),
            started: Instant::now(),
            title: config.window.title.clone(),
            modifiers: ModifiersState::empty(),
            dragging: false,
            cursor: None,
            egui: EguiState {
                ctx: egui_ctx,
                state: egui_state,
                renderer: egui_renderer,
            },
        }
    }

    fn refresh_title(&self) {
        let title = match (self.orchestrator.route(), self.orchestrator.current_entry()) {
            (Some(route), Some(entry)) => {
                format!("{} {} - {}", self.title, route.to_query(), entry.title)
            }
            (Some(route), None) => format!("{} {}", self.title, route.to_query()),
            _ => self.title.clone(),
        };
        self.ctx.set_title(&title);
    }

    fn navigate(&mut self, action: NavAction) {
        let mount = &mut self.mount;
        let selection = match action {
            NavAction::Select(id) => Some(self.orchestrator.select_verse(id, mount)),
            NavAction::Previous => self.orchestrator.previous(mount),
            NavAction::Next => self.orchestrator.next(mount),
            NavAction::Back => self.orchestrator.back(mount),
            NavAction::Forward => self.orchestrator.forward(mount),
        };
        if let Some(selection) = selection {
            report(&selection);
            self.refresh_title();
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.ctx.resize(new_size);
        self.orchestrator.dispatch_host_event(
            HostEvent::Resized {
                width: self.ctx.size.width,
                height: self.ctx.size.height,
            },
            &mut self.mount,
        );
    }

    fn update(&mut self) {
        let frame = self.clock.tick(self.started.elapsed().as_secs_f32());
        self.orchestrator.frame(frame, &mut self.mount);
    }

    fn render(&mut self) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let camera = self
            .orchestrator
            .active()
            .and_then(|a| a.camera())
            .cloned()
            .unwrap_or_else(|| Camera3D::new(self.ctx.aspect_ratio()));
        self.renderer.update_camera(&self.ctx.queue, &camera);
        self.renderer
            .prepare(&self.ctx.queue, &self.mount.stage.draw_lists());

        // Build egui UI
        let route = self
            .orchestrator
            .route()
            .map(|r| r.to_query())
            .unwrap_or_default();
        let mut nav = None;
        let raw_input = self.egui.state.take_egui_input(&self.ctx.window);
        let full_output = self.egui.ctx.run(raw_input, |ctx| {
            nav = ui::draw_navigation(
                ctx,
                self.orchestrator.registry(),
                self.orchestrator.current(),
                &route,
            );
            let entry = self.orchestrator.current_entry();
            let title = entry.map_or("Quantum Verses", |e| e.title);
            ui::draw_control_panel(ctx, &mut self.mount.panel, title);
            if let Some(entry) = entry {
                ui::draw_equations_sidebar(ctx, entry.title, entry.equations, entry.variables);
            }
            ui::draw_overlays(ctx, &self.mount.stage, &camera);
        });

        self.egui
            .state
            .handle_platform_output(&self.ctx.window, full_output.platform_output);
        let tris = self
            .egui
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui
                .renderer
                .update_texture(&self.ctx.device, &self.ctx.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.ctx.size.width, self.ctx.size.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.renderer
            .render(&mut encoder, &view, self.mount.stage.background);

        self.egui.renderer.update_buffers(
            &self.ctx.device,
            &self.ctx.queue,
            &mut encoder,
            &tris,
            &screen_descriptor,
        );
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui
                .renderer
                .render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui.renderer.free_texture(id);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if let Some(action) = nav {
            self.navigate(action);
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode, state: ElementState) {
        if state != ElementState::Pressed {
            return;
        }
        let alt = self.modifiers.alt_key();

        match key {
            KeyCode::BracketLeft => self.navigate(NavAction::Previous),
            KeyCode::BracketRight => self.navigate(NavAction::Next),
            KeyCode::Backspace => self.navigate(NavAction::Back),
            KeyCode::ArrowLeft if alt => self.navigate(NavAction::Back),
            KeyCode::ArrowRight if alt => self.navigate(NavAction::Forward),
            KeyCode::KeyR => {
                if let Some(selection) = self.orchestrator.reload(&mut self.mount) {
                    report(&selection);
                }
            }
            _ => {}
        }
    }

    fn handle_cursor(&mut self, x: f64, y: f64) {
        if let (true, Some((px, py))) = (self.dragging, self.cursor) {
            self.orchestrator.dispatch_host_event(
                HostEvent::PointerDrag {
                    dx: (x - px) as f32,
                    dy: (y - py) as f32,
                },
                &mut self.mount,
            );
        }
        self.cursor = Some((x, y));
    }

    fn handle_scroll(&mut self, delta: f32) {
        self.orchestrator
            .dispatch_host_event(HostEvent::Wheel { delta }, &mut self.mount);
    }

    fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.egui.state.on_window_event(&self.ctx.window, event).consumed
    }
}

fn run_windowed(orchestrator: Orchestrator, start: VerseId, config: &AppConfig) -> Result<()> {
    let (ctx, event_loop) = pollster::block_on(GraphicsContext::new(
        &config.window.title,
        config.window.width,
        config.window.height,
    ))?;

    let mut app = App::new(ctx, orchestrator, config);
    app.navigate(NavAction::Select(start));

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { ref event, .. } => {
                let consumed = app.handle_window_event(event);

                // Releases and size changes must land even over egui
                match event {
                    WindowEvent::CloseRequested => {
                        app.orchestrator.shutdown(&mut app.mount);
                        elwt.exit();
                    }
                    WindowEvent::Resized(size) => app.resize(*size),
                    WindowEvent::ModifiersChanged(modifiers) => app.modifiers = modifiers.state(),
                    WindowEvent::MouseInput {
                        button: MouseButton::Left,
                        state,
                        ..
                    } => app.dragging = *state == ElementState::Pressed && !consumed,
                    WindowEvent::CursorMoved { position, .. } => {
                        app.handle_cursor(position.x, position.y)
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(key),
                                state,
                                ..
                            },
                        ..
                    } if !consumed => app.handle_key(*key, *state),
                    WindowEvent::MouseWheel { delta, .. } if !consumed => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => *y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                        };
                        app.handle_scroll(scroll);
                    }
                    WindowEvent::RedrawRequested => {
                        app.update();
                        match app.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => app.resize(app.ctx.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                            Err(e) => log::warn!("Render error: {e:?}"),
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                app.ctx.window.request_redraw();
            }
            _ => {}
        }
    })?;
    Ok(())
}
