//! Error types for the Nebula engine
//!
//! Every failure the engine can report is one `Error` variant. Callers that need
//! to decide what to do with a failure ask for its [`ErrorKind`] instead of
//! matching variants one by one.

use std::fmt;

/// Result type for Nebula engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nebula engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan result codes, driver failures)
    BackendError(String),

    /// Out of host or device memory
    OutOfMemory,

    /// Invalid resource (unknown handle, bad argument, wrong state)
    InvalidResource(String),

    /// Initialization failed (engine, device, subsystems)
    InitializationFailed(String),

    /// A CPU wait on a GPU fence exceeded its timeout
    Timeout(String),

    /// The swapchain no longer matches the surface and must be recreated
    SwapchainOutOfDate,

    /// No swapchain image became available within the acquire timeout
    AcquireTimeout,

    /// The descriptor pool has no room left for the requested set
    OutOfPoolMemory,

    /// The descriptor pool is too fragmented to satisfy the request
    FragmentedPool,

    /// A shader binary or mesh could not be loaded
    AssetLoadFailed(String),
}

/// How the engine reacts to an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Device, queue or sync failure: the process cannot continue
    Fatal,
    /// Swapchain out of date / suboptimal: recreate and keep going
    Recoverable,
    /// Descriptor pool exhausted: the growable allocator retries once
    ResourceExhausted,
    /// Shader or mesh load failure: reported, the caller decides
    AssetLoad,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SwapchainOutOfDate | Error::AcquireTimeout => ErrorKind::Recoverable,
            Error::OutOfPoolMemory | Error::FragmentedPool => ErrorKind::ResourceExhausted,
            Error::AssetLoadFailed(_) => ErrorKind::AssetLoad,
            Error::BackendError(_)
            | Error::OutOfMemory
            | Error::InvalidResource(_)
            | Error::InitializationFailed(_)
            | Error::Timeout(_) => ErrorKind::Fatal,
        }
    }

    /// True for swapchain conditions handled by a resize
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Recoverable
    }

    /// True when a descriptor pool ran out of space
    pub fn is_pool_exhaustion(&self) -> bool {
        self.kind() == ErrorKind::ResourceExhausted
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::AcquireTimeout => write!(f, "Timed out acquiring swapchain image"),
            Error::OutOfPoolMemory => write!(f, "Descriptor pool out of memory"),
            Error::FragmentedPool => write!(f, "Descriptor pool fragmented"),
            Error::AssetLoadFailed(msg) => write!(f, "Asset load failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
