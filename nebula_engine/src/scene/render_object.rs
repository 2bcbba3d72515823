/// Render objects - flat draw records collected from the scene each frame

use glam::Mat4;

use crate::graphics_device::{AllocatedBuffer, BufferHandle};
use crate::scene::{MaterialInstance, MaterialPass};

/// Index and vertex buffers of one uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuMeshBuffers {
    pub index_buffer: AllocatedBuffer,
    pub vertex_buffer: AllocatedBuffer,
    /// Address shaders read vertices from
    pub vertex_buffer_address: u64,
}

/// Index range of a mesh drawn with one material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoSurface {
    pub start_index: u32,
    pub count: u32,
    /// Surfaces without a material are not drawn
    pub material: Option<MaterialInstance>,
}

/// A mesh resident on the GPU
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAsset {
    pub name: String,
    pub surfaces: Vec<GeoSurface>,
    pub mesh_buffers: GpuMeshBuffers,
}

/// Everything needed to issue one indexed draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderObject {
    pub index_count: u32,
    pub first_index: u32,
    pub index_buffer: BufferHandle,
    pub material: MaterialInstance,
    pub transform: Mat4,
    pub vertex_buffer_address: u64,
}

/// Draws collected for one frame, split by pass
#[derive(Debug, Clone, Default)]
pub struct DrawContext {
    pub opaque_surfaces: Vec<RenderObject>,
    pub transparent_surfaces: Vec<RenderObject>,
}

impl DrawContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `object` under the list of its material pass
    pub fn push(&mut self, object: RenderObject) {
        match object.material.pass {
            MaterialPass::Transparent => self.transparent_surfaces.push(object),
            MaterialPass::MainColor | MaterialPass::Other => self.opaque_surfaces.push(object),
        }
    }

    pub fn clear(&mut self) {
        self.opaque_surfaces.clear();
        self.transparent_surfaces.clear();
    }

    pub fn len(&self) -> usize {
        self.opaque_surfaces.len() + self.transparent_surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
