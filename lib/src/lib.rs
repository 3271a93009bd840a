//! Patching shim for running modded JVM games
//!
//! Given a source of encoded class bodies, an entry class name and a game
//! version, this crate locates the real startup path with a set of
//! heuristic patch rules, splices loader hooks into it, and then serves
//! every class (patched, widened, or untouched) exactly once per process.
//!
//! The three layers mirror that flow:
//!
//!  * [`jvm`] models class bodies, descriptors, and cursor-mutable
//!    instruction streams
//!  * [`patch`] holds the patch rules and the once-per-process pipeline
//!  * [`launch`] owns the launch context and materializes final bytes

pub mod jvm;
pub mod launch;
pub mod patch;
