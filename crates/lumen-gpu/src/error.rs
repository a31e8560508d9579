//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Every creation step names its failing stage; there is no shared
/// "last error" slot anywhere in the crate.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No physical device carries the required extensions.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A suitable device lacks a graphics or presentation queue family.
    #[error("No queue support: {0}")]
    NoQueueSupport(&'static str),

    /// Logical device creation was rejected by the driver.
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// A requested queue handle came back null.
    #[error("Queue retrieval failed: {0}")]
    QueueRetrieval(&'static str),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Swapchain image retrieval failed.
    #[error("Swapchain image retrieval failed: {0}")]
    ImageRetrieval(String),

    /// Swapchain image view creation failed.
    #[error("Image view creation failed: {0}")]
    ImageViewCreation(String),

    /// Shader bytecode was rejected at module creation.
    #[error("Shader module creation failed: {0}")]
    ShaderCompilation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// No memory type satisfies the requirement mask and property flags.
    #[error("No suitable memory type (type bits {type_bits:#x}, flags {flags:?})")]
    NoSuitableMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    /// Buffer or memory allocation failed.
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    /// Swapchain image acquisition hard-failed.
    #[error("Frame acquisition failed: {0}")]
    FrameAcquisition(vk::Result),

    /// Presentation hard-failed.
    #[error("Presentation failed: {0}")]
    Presentation(vk::Result),

    /// A bounded device wait timed out; the device is presumed lost.
    #[error("Device lost: {0}")]
    DeviceLost(&'static str),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
