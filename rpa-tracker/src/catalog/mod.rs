//! Platform catalog.
//!
//! This module provides:
//! - Per-platform retry policies
//! - Platform definitions with their ordered stages
//! - The catalog that the tracker resolves platform references against

mod platform;
mod registry;
mod retry;

pub use platform::{PlatformDefinition, DEFAULT_STAGE};
pub use registry::{PipelinePosition, PlatformCatalog};
pub use retry::RetryPolicy;
