use super::context::LaunchContext;
use super::{transformer, LaunchError};
use crate::jvm::{ClassName, Name};
use crate::patch::PatchPipeline;
use elsa::sync::FrozenMap;
use log::trace;
use parking_lot::Mutex;

/// A class as definitively served to the embedder
#[derive(Debug)]
pub struct LiveClass {
    pub name: ClassName,
    pub bytes: Vec<u8>,
}

/// Materializes each class at most once, from any number of threads
///
/// The first load of a name runs entry point location (memoized), picks
/// patched bytes over raw ones, applies the secondary rewrites and freezes
/// the outcome; every later load of the same name gets a reference to the
/// same [`LiveClass`].
pub struct ClassMaterializer<'cx> {
    cx: &'cx LaunchContext,
    pipeline: &'cx PatchPipeline,
    defined: FrozenMap<String, Box<LiveClass>>,
    define_lock: Mutex<usize>,
}

impl<'cx> ClassMaterializer<'cx> {
    pub fn new(cx: &'cx LaunchContext, pipeline: &'cx PatchPipeline) -> ClassMaterializer<'cx> {
        ClassMaterializer {
            cx,
            pipeline,
            defined: FrozenMap::new(),
            define_lock: Mutex::new(0),
        }
    }

    pub fn load(&self, name: &ClassName) -> Result<&LiveClass, LaunchError> {
        self.pipeline
            .locate_entrypoints(self.cx)
            .map_err(LaunchError::Patch)?;

        if let Some(live) = self.defined.get(name.as_str()) {
            return Ok(live);
        }

        let mut definitions = self.define_lock.lock();
        // A racing thread may have defined it while we waited
        if let Some(live) = self.defined.get(name.as_str()) {
            return Ok(live);
        }

        let bytes = match self.pipeline.transform(name).map_err(LaunchError::Patch)? {
            Some(patched) => patched.to_vec(),
            None => self
                .cx
                .source
                .class_bytes(name)
                .map_err(LaunchError::Source)?
                .ok_or_else(|| LaunchError::ClassNotFound(name.clone()))?,
        };
        let bytes = transformer::transform(self.cx, name, bytes)?;

        *definitions += 1;
        trace!("defined {:?} ({} bytes)", name, bytes.len());
        let live = self.defined.insert(
            name.as_str().to_owned(),
            Box::new(LiveClass {
                name: name.clone(),
                bytes,
            }),
        );
        Ok(live)
    }

    /// How many names have actually been defined so far
    pub fn definition_count(&self) -> usize {
        *self.define_lock.lock()
    }
}
