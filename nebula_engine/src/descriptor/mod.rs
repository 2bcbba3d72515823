/// Descriptor module - layout building, set allocation and batched writes

pub mod layout_builder;
pub mod allocator;
pub mod allocator_growable;
pub mod writer;

pub use layout_builder::*;
pub use allocator::*;
pub use allocator_growable::*;
pub use writer::*;
