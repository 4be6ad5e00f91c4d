//! The analyzer-facing half of the bridge: connecting to (or spawning) the
//! daemon, subscribing to its type-error stream, and supervising that work
//! as a single background task.

pub mod daemon;
pub mod subscription;
pub mod task;
pub mod translate;

pub use task::BackgroundTaskManager;
