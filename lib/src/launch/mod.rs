//! Serving side of the loader: the launch context, secondary rewrites,
//! and the at-most-once class materializer
//!
//! The patch rules in [`crate::patch`] decide *what* the game should run;
//! this module decides what bytes each name resolves to at definition
//! time. [`ClassMaterializer::load`] is the single entry point the
//! embedder calls per class.

mod context;
mod loader;
mod transformer;
mod widener;

pub use context::{
    ClassSource, Environment, GameVersion, LaunchContext, MapClassSource, VersionPredicate,
};
pub use loader::{ClassMaterializer, LiveClass};
pub use widener::WidenTargets;

use crate::jvm::ClassName;
use crate::patch::PatchError;

/// Errors of the serving side
#[derive(Debug)]
pub enum LaunchError {
    /// Entry point location or patched-byte production failed
    Patch(PatchError),
    /// Neither the pipeline nor the class source knows the name
    ClassNotFound(ClassName),
    /// The class source failed, or bytes would not decode or re-encode
    Source(std::io::Error),
}

impl From<PatchError> for LaunchError {
    fn from(error: PatchError) -> LaunchError {
        LaunchError::Patch(error)
    }
}
