mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from glovecheck for tests
pub use glovecheck::{BatchProcessor, BoundingBox, HandLabel, LabelRule};
