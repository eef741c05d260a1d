//! Error types for the streaming pipeline.

/// Errors raised at the streamer's runtime boundaries.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The operating system refused to start the worker thread.
    #[error("failed to spawn chunk worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
    /// A surface's buffer does not hold one chunk's worth of cells.
    #[error("surface holds {actual} heights, expected {expected}")]
    SurfaceSize { expected: usize, actual: usize },
}
