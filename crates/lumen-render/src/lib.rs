//! Frame rendering for the Lumen engine.
//!
//! This crate provides:
//! - Render pass and frame buffer management
//! - Device-resident mesh buffers
//! - The per-frame acquire/record/submit/present loop with swapchain
//!   rebuild on surface staleness

pub mod mesh;
pub mod policy;
pub mod render_pass;
pub mod renderer;

pub use mesh::MeshBuffers;
pub use policy::{FrameOutcome, RebuildPolicy};
pub use render_pass::{create_framebuffers, create_render_pass};
pub use renderer::FrameRenderer;
