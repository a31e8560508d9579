//! Lumen Engine Demo Viewer
//!
//! Renders a wireframe teapot through the full engine bring-up: instance,
//! device selection, surface, swapchain, pipeline, staged mesh upload, and
//! the single-frame-in-flight render loop.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p lumen-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--mesh <PATH>`: OBJ mesh to render (default: assets/teapot.obj)
//! - `--vert <PATH>`: vertex shader SPIR-V (default: assets/wireframe.vert.spv)
//! - `--frag <PATH>`: fragment shader SPIR-V (default: assets/wireframe.frag.spv)
//! - `--no-validation`: disable Vulkan validation layers
//! - `-h, --help`: print help
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: set log level (e.g., info, debug, trace)

mod app;

use tracing::error;
use tracing_subscriber::EnvFilter;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::{Viewer, ViewerConfig};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ViewerConfig::from_args()
        .with_title("Lumen Engine - Wireframe Demo")
        .with_size(WIDTH, HEIGHT);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config);
    event_loop.run_app(&mut viewer)?;

    if let Some(e) = viewer.take_fatal() {
        error!("Exiting after fatal error: {e:#}");
        return Err(e);
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        "Lumen Engine Demo Viewer

USAGE:
    cargo run -p lumen-viewer -- [OPTIONS]

OPTIONS:
    --mesh <PATH>       OBJ mesh to render (default: assets/teapot.obj)
    --vert <PATH>       Vertex shader SPIR-V (default: assets/wireframe.vert.spv)
    --frag <PATH>       Fragment shader SPIR-V (default: assets/wireframe.frag.spv)
    --no-validation     Disable Vulkan validation layers
    -h, --help          Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Set log level (e.g., info, debug, trace)"
    );
}
