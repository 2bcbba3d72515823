/// Scene module - materials, meshes and the node hierarchy that draws them

pub mod material;
pub mod render_object;
pub mod scene_graph;

pub use material::*;
pub use render_object::*;
pub use scene_graph::*;
