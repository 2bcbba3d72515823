//! Asset collaborators: shader bytecode and mesh data sources
//!
//! The engine does not parse shader or mesh files. It asks a `ShaderSource`
//! for SPIR-V bytes and a `MeshSource` for flat vertex/index arrays.

use std::path::PathBuf;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, ShaderModuleHandle};
use crate::{engine_debug, engine_warn};

// ============================================================================
// Meshes
// ============================================================================

/// GPU vertex layout, read by shaders through the buffer device address
///
/// UVs are split across the padding slots so the struct packs into 48 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub uv_x: f32,
    pub normal: Vec3,
    pub uv_y: f32,
    pub color: Vec4,
}

/// Index range of one surface inside a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRange {
    pub start_index: u32,
    pub count: u32,
}

/// One mesh as produced by a MeshSource
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub surfaces: Vec<SurfaceRange>,
}

impl MeshData {
    /// Check every surface and index stays inside the mesh
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len() as u64;
        if let Some(bad) = self.indices.iter().find(|&&i| i as u64 >= vertex_count) {
            return Err(Error::AssetLoadFailed(format!(
                "mesh '{}' index {} out of range ({} vertices)", self.name, bad, vertex_count
            )));
        }
        for surface in &self.surfaces {
            let end = surface.start_index as u64 + surface.count as u64;
            if end > self.indices.len() as u64 {
                return Err(Error::AssetLoadFailed(format!(
                    "mesh '{}' surface [{}, {}) exceeds {} indices",
                    self.name, surface.start_index, end, self.indices.len()
                )));
            }
        }
        Ok(())
    }
}

/// Mesh import collaborator
pub trait MeshSource {
    /// Load every mesh of the file at `path`
    fn load_meshes(&self, path: &str) -> Result<Vec<MeshData>>;
}

// ============================================================================
// Shaders
// ============================================================================

/// Shader bytecode collaborator
pub trait ShaderSource {
    /// Compiled bytecode for the logical `path`; `Error::AssetLoadFailed` when missing
    fn load(&self, path: &str) -> Result<Vec<u8>>;
}

/// In-memory path -> bytecode table
#[derive(Debug, Clone, Default)]
pub struct BundledShaderSource {
    shaders: FxHashMap<String, Vec<u8>>,
}

impl BundledShaderSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, code: Vec<u8>) -> &mut Self {
        self.shaders.insert(path.into(), code);
        self
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

impl ShaderSource for BundledShaderSource {
    fn load(&self, path: &str) -> Result<Vec<u8>> {
        self.shaders
            .get(path)
            .cloned()
            .ok_or_else(|| Error::AssetLoadFailed(format!("shader '{}' not bundled", path)))
    }
}

/// Reads shader files below a root directory
#[derive(Debug, Clone)]
pub struct DirectoryShaderSource {
    root: PathBuf,
}

impl DirectoryShaderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderSource for DirectoryShaderSource {
    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        std::fs::read(&full).map_err(|e| {
            Error::AssetLoadFailed(format!("shader '{}': {}", full.display(), e))
        })
    }
}

/// Load `path` from `source` and create a shader module from it
///
/// Failures are logged and returned; the caller decides whether to go on
/// without the shader.
pub fn load_shader(
    device: &dyn GraphicsDevice,
    source: &dyn ShaderSource,
    path: &str,
) -> Result<ShaderModuleHandle> {
    let result = source.load(path).and_then(|code| device.create_shader_module(&code));
    match &result {
        Ok(module) => engine_debug!("nebula::assets", "Loaded shader '{}' as {:?}", path, module),
        Err(e) => engine_warn!("nebula::assets", "Failed to load shader '{}': {}", path, e),
    }
    result
}

#[cfg(test)]
#[path = "assets_tests.rs"]
mod tests;
