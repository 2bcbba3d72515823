/// Window collaborator - discrete events consumed by the run loop

/// Window event relevant to frame submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The user asked to close the window
    Close,
    /// No presentable surface until `Restored`
    Minimized,
    Restored,
    /// New framebuffer size in pixels; zero-sized means minimized
    Resized { width: u32, height: u32 },
}

/// Source of window events, polled once per loop iteration
pub trait EventSource {
    /// Events received since the previous poll; never blocks
    fn poll_events(&mut self) -> Vec<WindowEvent>;
}
