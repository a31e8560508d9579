//! Viewer application: window lifecycle and the frame loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use lumen_assets::{load_spirv, MeshData};
use lumen_entity::{Simulation, System, Transform, World};
use lumen_gpu::{
    GpuContext, GpuContextBuilder, ShaderKind, ShaderStage, Swapchain, VertexLayout,
};
use lumen_render::{FrameOutcome, FrameRenderer};

/// Slow CPU-side spin applied to the demo entity each frame.
const SPIN_RATE: f32 = 0.5;

/// Near-black clear so the white wireframe reads clearly.
const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.03, 1.0];

/// Viewer configuration from CLI arguments and defaults.
#[derive(Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub mesh_path: PathBuf,
    pub vert_path: PathBuf,
    pub frag_path: PathBuf,
    pub validation: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Lumen Engine".to_string(),
            width: 1280,
            height: 720,
            mesh_path: PathBuf::from("assets/teapot.obj"),
            vert_path: PathBuf::from("assets/wireframe.vert.spv"),
            frag_path: PathBuf::from("assets/wireframe.frag.spv"),
            validation: cfg!(debug_assertions),
        }
    }
}

impl ViewerConfig {
    /// Parse viewer configuration from command line arguments.
    pub fn from_args() -> Self {
        let mut config = Self::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--mesh" => {
                    if i + 1 < args.len() {
                        config.mesh_path = PathBuf::from(&args[i + 1]);
                        i += 1;
                    }
                }
                "--vert" => {
                    if i + 1 < args.len() {
                        config.vert_path = PathBuf::from(&args[i + 1]);
                        i += 1;
                    }
                }
                "--frag" => {
                    if i + 1 < args.len() {
                        config.frag_path = PathBuf::from(&args[i + 1]);
                        i += 1;
                    }
                }
                "--no-validation" => config.validation = false,
                other => info!("Ignoring unknown argument: {other}"),
            }
            i += 1;
        }

        config
    }

    /// Set the window title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Spins every transform around the Y axis.
struct Spin {
    rate: f32,
}

impl System for Spin {
    fn tick(&mut self, world: &mut World, dt: f32) {
        for (_, transform) in world.query_mut::<&mut Transform>() {
            transform.rotation *= glam::Quat::from_rotation_y(self.rate * dt);
        }
    }
}

/// Top-level winit handler; state is absent until `resumed` fires.
pub struct Viewer {
    config: ViewerConfig,
    state: Option<ViewerState>,
    fatal: Option<anyhow::Error>,
}

/// Everything alive between bring-up and teardown.
struct ViewerState {
    window: Arc<Window>,
    gpu: GpuContext,
    swapchain: Swapchain,
    renderer: FrameRenderer,
    sim: Simulation,
    last_frame: Instant,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            state: None,
            fatal: None,
        }
    }

    /// Take the fatal error, if the loop stopped on one.
    pub fn take_fatal(&mut self) -> Option<anyhow::Error> {
        self.fatal.take()
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .context("Failed to create window")?,
        );

        let gpu = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build(window.as_ref())
            .context("Failed to create GPU context")?;

        let mut swapchain = unsafe {
            Swapchain::new(
                gpu.instance(),
                gpu.device(),
                gpu.physical_device(),
                gpu.surface(),
                gpu.families(),
            )
        }
        .context("Failed to create swapchain")?;

        // From here on every failure must unwind the swapchain before the
        // GPU context drops and destroys the device
        let renderer = match self.create_renderer(&gpu, &swapchain) {
            Ok(renderer) => renderer,
            Err(e) => {
                unsafe { swapchain.destroy(gpu.device()) };
                return Err(e);
            }
        };

        let mut sim = Simulation::new();
        sim.world_mut().spawn((Transform::default(),));
        sim.add_system(Spin { rate: SPIN_RATE });

        Ok(ViewerState {
            window,
            gpu,
            swapchain,
            renderer,
            sim,
            last_frame: Instant::now(),
        })
    }

    /// Shader loading, renderer construction, and the demo mesh upload.
    ///
    /// Any failure destroys what this function already built; the caller
    /// still owns the swapchain and GPU context.
    fn create_renderer(
        &self,
        gpu: &GpuContext,
        swapchain: &Swapchain,
    ) -> anyhow::Result<FrameRenderer> {
        let stages = vec![
            ShaderStage::new(
                ShaderKind::Vertex,
                load_spirv(&self.config.vert_path).context("Failed to load vertex shader")?,
            ),
            ShaderStage::new(
                ShaderKind::Fragment,
                load_spirv(&self.config.frag_path).context("Failed to load fragment shader")?,
            ),
        ];

        let mut renderer =
            unsafe { FrameRenderer::new(gpu, swapchain, stages, VertexLayout::position_only()) }
                .context("Failed to create renderer")?;
        renderer.set_clear_color(CLEAR_COLOR);

        let mesh = match MeshData::from_obj_file(&self.config.mesh_path) {
            Ok(mut mesh) => {
                mesh.scale(0.2, 0.3, 0.3);
                mesh.translate(0.0, -0.5, 0.2);
                mesh
            }
            Err(e) => {
                unsafe { renderer.destroy(gpu) };
                return Err(anyhow::Error::new(e).context("Failed to load mesh"));
            }
        };

        if let Err(e) = unsafe { renderer.load_mesh(gpu, &mesh.vertices, &mesh.indices) } {
            unsafe { renderer.destroy(gpu) };
            return Err(anyhow::Error::new(e).context("Failed to upload mesh"));
        }

        Ok(renderer)
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Starting {}", self.config.title);

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Viewer ready");
            }
            Err(e) => {
                error!("Startup failed: {e:#}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let result = match &mut self.state {
                    Some(state) => state.render_frame(),
                    None => return,
                };
                match result {
                    Ok(_) => {
                        if let Some(state) = &self.state {
                            state.window.request_redraw();
                        }
                    }
                    Err(e) => {
                        error!("Render error: {e:#}");
                        self.fatal = Some(e);
                        if let Some(mut state) = self.state.take() {
                            state.cleanup();
                        }
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    info!("Window resized to {}x{}", size.width, size.height);
                    state.renderer.mark_swapchain_stale();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

impl ViewerState {
    /// Tick the simulation and draw one frame.
    fn render_frame(&mut self) -> anyhow::Result<FrameOutcome> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.sim.tick(dt);

        let outcome = unsafe { self.renderer.draw_frame(&self.gpu, &mut self.swapchain) }?;
        Ok(outcome)
    }

    /// Tear down in reverse creation order; the GPU context drops last.
    fn cleanup(&mut self) {
        self.sim.stop();
        unsafe {
            self.renderer.destroy(&self.gpu);
            self.swapchain.destroy(self.gpu.device());
        }
    }
}
