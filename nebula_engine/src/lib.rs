/*!
# Nebula Engine

Backend-agnostic core of the Nebula real-time renderer.

The crate owns the parts of a Vulkan-style renderer that are hard to get right
independently of any API binding:

- **Frame ring**: `FRAME_OVERLAP` frame slots, each with its own command
  buffer, semaphores, render fence, deletion queue and descriptor pools
- **Submission loop**: `Engine::draw` / `Engine::run`, bounded CPU run-ahead
  and swapchain recreation on out-of-date surfaces
- **Descriptors**: layout builder, fixed and growable set allocators, batched writer
- **Deletion queues**: deferred LIFO teardown of GPU objects

Native calls go through the `GraphicsDevice` and `Swapchain` traits, which a
backend crate (e.g. `nebula_engine_vulkan`) implements.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod descriptor;
pub mod frame;
pub mod window;
pub mod assets;
pub mod scene;

// Main nebula namespace module
pub mod nebula {
    // Error types
    pub use crate::error::{Error, ErrorKind, Result};

    pub use crate::engine::{Engine, FrameOutcome};
    pub use crate::config::Config;

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        pub use crate::log::{set_logger, reset_logger, set_min_severity, min_severity, emit, emit_detailed};
    }

    // Device traits, handles and descriptions
    pub mod graphics {
        pub use crate::graphics_device::*;
    }

    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod window {
        pub use crate::window::*;
    }

    pub mod assets {
        pub use crate::assets::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
