//! Buffer management for vertex, index and uniform data
//!
//! A [`Buffer`] pairs a buffer handle with its backing memory; the two are
//! released together, buffer first. [`BufferManager`] owns the allocation
//! policy and the staging path into device-local memory.

use ash::{vk, Device};
use bytemuck::Pod;
use std::marker::PhantomData;
use std::mem;

use crate::render::vulkan::{CommandPool, DeviceContext, VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Map the whole allocation, copy bytes in, unmap
    ///
    /// Only valid for host-visible memory. Host-coherent memory needs no flush.
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes into a {} byte buffer", bytes.len(), self.size),
            });
        }

        unsafe {
            let data_ptr = self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data_ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Write a slice of plain-old-data values
    pub fn write_data<T: Pod>(&self, data: &[T]) -> VulkanResult<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Vertex buffer in device-local memory
pub struct VertexBuffer {
    buffer: Buffer,
    vertex_count: u32,
}

impl VertexBuffer {
    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of vertices uploaded
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// 32-bit index buffer in device-local memory
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Get index count
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Host-visible, host-coherent uniform buffer holding one `T`
pub struct UniformBuffer<T> {
    buffer: Buffer,
    _phantom: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Overwrite the uniform contents
    pub fn update(&self, data: &T) -> VulkanResult<()> {
        self.buffer.write_bytes(bytemuck::bytes_of(data))
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size of `T` in bytes, the descriptor range
    pub fn range(&self) -> vk::DeviceSize {
        mem::size_of::<T>() as vk::DeviceSize
    }
}

/// Allocates buffers and device memory and uploads host data
pub struct BufferManager {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl BufferManager {
    /// Create a manager bound to the context's device
    pub fn new(context: &DeviceContext) -> Self {
        Self {
            device: context.raw_device(),
            memory_properties: context.physical_device().memory_properties,
        }
    }

    /// Create a buffer and bind freshly allocated memory to it
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Buffer> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create a zero-sized buffer".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.device.create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory = match self.allocate(requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Buffer {
            device: self.device.clone(),
            buffer,
            memory,
            size,
        })
    }

    /// Allocate memory satisfying a resource's requirements
    pub fn allocate(
        &self,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<vk::DeviceMemory> {
        let memory_type_index = find_memory_type(
            &self.memory_properties,
            requirements.memory_type_bits,
            properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        unsafe {
            self.device.allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Host-visible staging buffer pre-filled with `bytes`
    pub fn create_staging_buffer(&self, bytes: &[u8]) -> VulkanResult<Buffer> {
        let staging = self.create_buffer(
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Upload data into a new device-local buffer through a staging copy
    pub fn create_device_local_buffer<T: Pod>(
        &self,
        command_pool: &CommandPool,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Buffer> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let staging = self.create_staging_buffer(bytes)?;

        let buffer = self.create_buffer(
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        command_pool.execute_single_time(|recorder| {
            recorder.cmd_copy_buffer(staging.handle(), buffer.handle(), staging.size())
        })?;

        Ok(buffer)
    }

    /// Create the vertex buffer for static geometry
    pub fn create_vertex_buffer<V: Pod>(&self, command_pool: &CommandPool, vertices: &[V]) -> VulkanResult<VertexBuffer> {
        let buffer = self.create_device_local_buffer(command_pool, vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        log::debug!("Vertex buffer created ({} vertices)", vertices.len());
        Ok(VertexBuffer {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    /// Create the index buffer for static geometry
    pub fn create_index_buffer(&self, command_pool: &CommandPool, indices: &[u32]) -> VulkanResult<IndexBuffer> {
        let buffer = self.create_device_local_buffer(command_pool, indices, vk::BufferUsageFlags::INDEX_BUFFER)?;
        log::debug!("Index buffer created ({} indices)", indices.len());
        Ok(IndexBuffer {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Create a host-coherent uniform buffer sized for one `T`
    pub fn create_uniform_buffer<T: Pod>(&self) -> VulkanResult<UniformBuffer<T>> {
        let buffer = self.create_buffer(
            mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        Ok(UniformBuffer {
            buffer,
            _phantom: PhantomData,
        })
    }
}

/// Find memory type with required properties
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize].property_flags.contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, flags) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn picks_first_type_with_all_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&props, 0b111, wanted).unwrap(), 2);
        assert_eq!(find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(), 0);
    }

    #[test]
    fn respects_type_filter() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        assert_eq!(find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(), 1);
    }

    #[test]
    fn reports_missing_type() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }
}
