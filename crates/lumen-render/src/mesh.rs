//! Device-resident mesh buffers.

use ash::vk;
use lumen_gpu::{BufferTransferor, DeviceBuffer, Result};

/// A mesh resident in device-local memory.
///
/// Built once from the collaborator's flat vertex/index arrays; immutable
/// thereafter; destroyed at teardown or explicit unload.
pub struct MeshBuffers {
    pub vertex: DeviceBuffer,
    pub index: DeviceBuffer,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl MeshBuffers {
    /// Upload the flat arrays through the staging transferor.
    ///
    /// # Safety
    /// The transferor's handles must be valid.
    pub unsafe fn upload(
        device: &ash::Device,
        transferor: &BufferTransferor<'_>,
        vertices: &[f32],
        indices: &[u32],
    ) -> Result<Self> {
        let mut vertex = transferor.upload_vertex_data(bytemuck::cast_slice(vertices))?;
        let index = match transferor.upload_index_data(bytemuck::cast_slice(indices)) {
            Ok(index) => index,
            Err(e) => {
                vertex.destroy(device);
                return Err(e);
            }
        };

        Ok(Self {
            vertex,
            index,
            vertex_count: (vertices.len() / 3) as u32,
            index_count: indices.len() as u32,
        })
    }

    /// Record the bind-and-draw commands for this mesh.
    ///
    /// An empty mesh records nothing; there are no buffers to bind.
    ///
    /// # Safety
    /// The device and command buffer must be valid and inside a render pass.
    pub unsafe fn record_draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        if self.index_count == 0 {
            return;
        }
        let offsets = [0_u64];
        device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex.buffer], &offsets);
        device.cmd_bind_index_buffer(cmd, self.index.buffer, 0, vk::IndexType::UINT32);
        device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
    }

    /// Destroy both buffers.
    ///
    /// # Safety
    /// The device must be valid and the buffers must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.index.destroy(device);
        self.vertex.destroy(device);
    }
}
