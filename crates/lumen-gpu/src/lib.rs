//! Vulkan abstraction layer for the Lumen engine.
//!
//! This crate provides:
//! - Instance, surface, and device negotiation
//! - Swapchain lifecycle with wholesale rebuild
//! - Graphics pipeline construction
//! - Staging-buffer uploads to device-local memory
//! - Frame synchronization primitives and command buffer plumbing

pub mod command;
pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod transfer;

pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use device::{create_device, DeviceSelector, QueueFamilies, Queues};
pub use error::{GpuError, Result};
pub use pipeline::{GraphicsPipeline, ShaderKind, ShaderStage, VertexLayout};
pub use surface::{SurfaceContext, SurfaceSupport};
pub use swapchain::{AcquireResult, Swapchain};
pub use sync::{create_fence, create_semaphore, FrameSync};
pub use transfer::{BufferTransferor, DeviceBuffer};
