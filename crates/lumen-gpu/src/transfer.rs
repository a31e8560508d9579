//! Host-to-device data transfer via the staging pattern.
//!
//! Uploads go through a temporary host-visible buffer and a one-shot
//! transfer command on the graphics queue. The blocking queue-idle wait is
//! load-time policy: uploads happen during load, not steady state.

use crate::command::{execute_single_time_commands, CommandPool};
use crate::error::{GpuError, Result};
use ash::vk;

/// A GPU buffer with its backing memory block.
///
/// Exclusively owned by the component that created it; staging buffers are
/// destroyed immediately after the copy, final buffers at engine teardown.
pub struct DeviceBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl DeviceBuffer {
    /// An inert zero-sized buffer with no device objects behind it.
    ///
    /// Vulkan forbids zero-sized buffers, so empty payloads are represented
    /// by null handles; destroying one is a no-op.
    pub fn empty() -> Self {
        Self {
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            size: 0,
        }
    }

    /// Whether this is the inert empty buffer.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Destroy the buffer and free its memory.
    ///
    /// # Safety
    /// The device must be valid and the buffer must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        // Null handles (the empty buffer) are valid no-ops
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
        self.buffer = vk::Buffer::null();
        self.memory = vk::DeviceMemory::null();
        self.size = 0;
    }
}

/// Find the first memory type whose bit is set in `type_bits` and whose
/// property flags are a superset of `flags`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Result<u32> {
    for i in 0..properties.memory_type_count {
        let type_matches = type_bits & (1 << i) != 0;
        let flags_match = properties.memory_types[i as usize]
            .property_flags
            .contains(flags);
        if type_matches && flags_match {
            return Ok(i);
        }
    }
    Err(GpuError::NoSuitableMemoryType { type_bits, flags })
}

/// Create a buffer and bind freshly allocated memory of the requested kind.
///
/// # Safety
/// The device and physical device must be valid.
pub unsafe fn create_buffer(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    flags: vk::MemoryPropertyFlags,
) -> Result<DeviceBuffer> {
    let buffer_info = vk::BufferCreateInfo::default()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = device
        .create_buffer(&buffer_info, None)
        .map_err(|e| GpuError::AllocationFailed(format!("buffer creation: {e}")))?;

    let requirements = device.get_buffer_memory_requirements(buffer);
    let memory_type =
        match find_memory_type(memory_properties, requirements.memory_type_bits, flags) {
            Ok(index) => index,
            Err(e) => {
                device.destroy_buffer(buffer, None);
                return Err(e);
            }
        };

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);

    let memory = match device.allocate_memory(&alloc_info, None) {
        Ok(memory) => memory,
        Err(e) => {
            device.destroy_buffer(buffer, None);
            return Err(GpuError::AllocationFailed(format!("memory allocation: {e}")));
        }
    };

    if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
        device.destroy_buffer(buffer, None);
        device.free_memory(memory, None);
        return Err(GpuError::AllocationFailed(format!("memory binding: {e}")));
    }

    Ok(DeviceBuffer {
        buffer,
        memory,
        size,
    })
}

/// Buffer transferor: stages host payloads into device-local buffers.
pub struct BufferTransferor<'a> {
    device: &'a ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    pool: &'a CommandPool,
    queue: vk::Queue,
}

impl<'a> BufferTransferor<'a> {
    /// Create a transferor over the given device and transfer queue.
    ///
    /// # Safety
    /// The instance, devices, pool, and queue must be valid.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: &'a ash::Device,
        physical_device: vk::PhysicalDevice,
        pool: &'a CommandPool,
        queue: vk::Queue,
    ) -> Self {
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);
        Self {
            device,
            memory_properties,
            pool,
            queue,
        }
    }

    /// Upload a vertex payload to a device-local buffer.
    ///
    /// # Safety
    /// See [`Self::upload`].
    pub unsafe fn upload_vertex_data(&self, bytes: &[u8]) -> Result<DeviceBuffer> {
        self.upload(bytes, vk::BufferUsageFlags::VERTEX_BUFFER)
    }

    /// Upload an index payload to a device-local buffer.
    ///
    /// # Safety
    /// See [`Self::upload`].
    pub unsafe fn upload_index_data(&self, bytes: &[u8]) -> Result<DeviceBuffer> {
        self.upload(bytes, vk::BufferUsageFlags::INDEX_BUFFER)
    }

    /// Stage `bytes` into a device-local buffer with the given usage.
    ///
    /// Allocates a host-visible, host-coherent staging buffer, maps and
    /// fills it, records a one-time full-range copy into a device-local
    /// destination, submits, blocks until the queue drains, then frees the
    /// staging buffer. An empty payload yields [`DeviceBuffer::empty`]
    /// without touching the device.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn upload(
        &self,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<DeviceBuffer> {
        let size = bytes.len() as vk::DeviceSize;
        if size == 0 {
            return Ok(DeviceBuffer::empty());
        }

        let mut staging = create_buffer(
            self.device,
            &self.memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let result = self.fill_and_copy(&staging, bytes, usage);
        staging.destroy(self.device);
        result
    }

    unsafe fn fill_and_copy(
        &self,
        staging: &DeviceBuffer,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<DeviceBuffer> {
        let size = staging.size;

        let dst = self
            .device
            .map_memory(staging.memory, 0, size, vk::MemoryMapFlags::empty())
            .map_err(|e| GpuError::AllocationFailed(format!("staging map: {e}")))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), bytes.len());
        self.device.unmap_memory(staging.memory);

        let mut local = create_buffer(
            self.device,
            &self.memory_properties,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let copy = execute_single_time_commands(self.device, self.pool, self.queue, |cmd| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            unsafe {
                self.device
                    .cmd_copy_buffer(cmd, staging.buffer, local.buffer, &[region]);
            }
        });
        if let Err(e) = copy {
            local.destroy(self.device);
            return Err(e);
        }

        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &property_flags) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = property_flags;
        }
        props
    }

    #[test]
    fn empty_buffer_is_inert() {
        let buffer = DeviceBuffer::empty();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size, 0);
        assert_eq!(buffer.buffer, vk::Buffer::null());
        assert_eq!(buffer.memory, vk::DeviceMemory::null());
    }

    #[test]
    fn picks_first_matching_type() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let index = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn respects_requirement_mask() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        // Type 0 has the right flags but its bit is not set in the mask
        let index =
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn requires_flag_superset() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        let err = find_memory_type(
            &props,
            0b1,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap_err();
        assert!(matches!(err, GpuError::NoSuitableMemoryType { .. }));
    }

    #[test]
    fn no_match_is_fatal() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        let err =
            find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap_err();
        assert!(matches!(
            err,
            GpuError::NoSuitableMemoryType { type_bits: 0b1, .. }
        ));
    }
}
