use super::{default_patches, GamePatch, PatchError, PatchView};
use crate::jvm::{ClassBody, ClassName};
use crate::launch::LaunchContext;
use indexmap::IndexMap;
use log::{debug, info};
use once_cell::sync::OnceCell;

/// Runs the patch rules once per process and hands out the located result
///
/// Location is memoized: the first successful [`PatchPipeline::locate_entrypoints`]
/// call runs every rule in registration order over one [`PatchView`] and
/// freezes the outcome; later calls return the same result without
/// re-running anything. A failed run memoizes nothing, so the next call
/// retries from scratch.
pub struct PatchPipeline {
    rules: Vec<GamePatch>,
    located: OnceCell<PatchResult>,
}

impl PatchPipeline {
    pub fn new(rules: Vec<GamePatch>) -> PatchPipeline {
        PatchPipeline {
            rules,
            located: OnceCell::new(),
        }
    }

    pub fn with_default_rules() -> PatchPipeline {
        PatchPipeline::new(default_patches())
    }

    pub fn locate_entrypoints(&self, cx: &LaunchContext) -> Result<&PatchResult, PatchError> {
        self.located.get_or_try_init(|| {
            let mut view = PatchView::new(cx);
            for rule in &self.rules {
                debug!("applying {} patch", rule.name());
                rule.apply(cx, &mut view)?;
            }
            let result = PatchResult::from_view(view);
            info!(
                "entry point location finished, {} patched class(es)",
                result.classes.len()
            );
            Ok(result)
        })
    }

    /// Patched bytes for a class, or `None` when the pipeline has nothing
    /// to say about it
    ///
    /// Before location has run everything passes through untouched.
    pub fn transform(&self, name: &ClassName) -> Result<Option<&[u8]>, PatchError> {
        match self.located.get() {
            Some(result) => result.bytes_of(name),
            None => Ok(None),
        }
    }
}

/// Immutable outcome of one pipeline run
///
/// Bodies are kept decoded; encoded bytes are produced on first demand per
/// class and cached.
#[derive(Debug)]
pub struct PatchResult {
    classes: IndexMap<ClassName, PatchedClass>,
    duplicate_emissions: Vec<ClassName>,
    applet_entry: Option<ClassName>,
}

#[derive(Debug)]
struct PatchedClass {
    body: ClassBody,
    bytes: OnceCell<Vec<u8>>,
}

impl PatchResult {
    fn from_view(view: PatchView) -> PatchResult {
        let PatchView {
            mut loaded,
            emitted,
            duplicates,
            applet_entry,
            ..
        } = view;

        let mut classes = IndexMap::new();
        for name in emitted {
            if let Some(body) = loaded.remove(&name) {
                classes.insert(
                    name,
                    PatchedClass {
                        body,
                        bytes: OnceCell::new(),
                    },
                );
            }
        }
        PatchResult {
            classes,
            duplicate_emissions: duplicates,
            applet_entry,
        }
    }

    /// Emission order of the run
    pub fn class_names(&self) -> impl Iterator<Item = &ClassName> {
        self.classes.keys()
    }

    pub fn contains(&self, name: &ClassName) -> bool {
        self.classes.contains_key(name)
    }

    pub fn body_of(&self, name: &ClassName) -> Option<&ClassBody> {
        self.classes.get(name).map(|patched| &patched.body)
    }

    /// Names that were emitted more than once during the run
    pub fn duplicates(&self) -> &[ClassName] {
        &self.duplicate_emissions
    }

    pub fn applet_entry(&self) -> Option<&ClassName> {
        self.applet_entry.as_ref()
    }

    fn bytes_of(&self, name: &ClassName) -> Result<Option<&[u8]>, PatchError> {
        match self.classes.get(name) {
            None => Ok(None),
            Some(patched) => {
                let bytes = patched
                    .bytes
                    .get_or_try_init(|| patched.body.encode().map_err(PatchError::SerializationFailure))?;
                Ok(Some(bytes.as_slice()))
            }
        }
    }
}
