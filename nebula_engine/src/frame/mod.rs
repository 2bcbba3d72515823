/// Frame module - per-frame resources, deferred teardown and command recording

pub mod deletion_queue;
pub mod frame_data;
pub mod recorder;

pub use deletion_queue::*;
pub use frame_data::*;
pub use recorder::*;
