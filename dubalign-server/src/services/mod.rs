//! Service layer: engine orchestration and external tooling

pub mod alignment;
pub mod artifact_cache;
pub mod media_toolkit;

pub use alignment::{AlignmentService, SegmentWindow};
pub use artifact_cache::ArtifactCache;
pub use media_toolkit::MediaToolkit;
