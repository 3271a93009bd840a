//! Patch rules and the pipeline that runs them
//!
//! Rules form a closed set, applied in declaration order over a shared
//! [`PatchView`]: the entry-point heuristics first, then branding, the
//! legacy classloader substitution, and the native dialog re-route. Each
//! rule edits lazily parsed class bodies in place and marks what it wants
//! published; the pipeline collects the marked bodies into an immutable
//! [`PatchResult`].

mod branding;
mod entrypoint;
mod errors;
mod legacy_loader;
mod native_dialog;
mod pipeline;

pub use branding::BrandingPatch;
pub use entrypoint::EntrypointPatch;
pub use errors::{MissingAnchor, PatchError};
pub use legacy_loader::LegacyLoaderRemapPatch;
pub use native_dialog::NativeDialogPatch;
pub use pipeline::{PatchPipeline, PatchResult};

use crate::jvm::ClassBody;
use crate::jvm::ClassName;
use crate::launch::LaunchContext;
use log::warn;
use std::collections::HashMap;

/// One registered patch rule
///
/// The set is closed on purpose: dispatch is a `match`, registration order
/// is the variant declaration order, and nothing outside this crate can
/// extend the pass.
pub enum GamePatch {
    Entrypoint(EntrypointPatch),
    Branding(BrandingPatch),
    LegacyLoaderRemap(LegacyLoaderRemapPatch),
    NativeDialog(NativeDialogPatch),
}

impl GamePatch {
    pub fn name(&self) -> &'static str {
        match self {
            GamePatch::Entrypoint(_) => "entrypoint",
            GamePatch::Branding(_) => "branding",
            GamePatch::LegacyLoaderRemap(_) => "legacy loader remap",
            GamePatch::NativeDialog(_) => "native dialog",
        }
    }

    pub fn apply(&self, cx: &LaunchContext, view: &mut PatchView) -> Result<(), PatchError> {
        match self {
            GamePatch::Entrypoint(patch) => patch.apply(cx, view),
            GamePatch::Branding(patch) => patch.apply(cx, view),
            GamePatch::LegacyLoaderRemap(patch) => patch.apply(cx, view),
            GamePatch::NativeDialog(patch) => patch.apply(cx, view),
        }
    }
}

/// The standard rule set, in its fixed order
pub fn default_patches() -> Vec<GamePatch> {
    vec![
        GamePatch::Entrypoint(EntrypointPatch::new()),
        GamePatch::Branding(BrandingPatch::new()),
        GamePatch::LegacyLoaderRemap(LegacyLoaderRemapPatch::new()),
        GamePatch::NativeDialog(NativeDialogPatch::new()),
    ]
}

/// What rules see while the pass runs
///
/// Class bodies decode out of the context's source on first access and stay
/// cached, so consecutive rules observe one another's edits. `emit` marks a
/// body for publication; emitting a name twice is tolerated (the shared
/// body means the second caller publishes the latest state anyway) but
/// logged and recorded.
pub struct PatchView<'cx> {
    source: &'cx dyn crate::launch::ClassSource,
    pub(crate) loaded: HashMap<ClassName, ClassBody>,
    pub(crate) emitted: Vec<ClassName>,
    pub(crate) duplicates: Vec<ClassName>,
    pub(crate) applet_entry: Option<ClassName>,
}

impl<'cx> PatchView<'cx> {
    pub fn new(cx: &'cx LaunchContext) -> PatchView<'cx> {
        PatchView {
            source: cx.source.as_ref(),
            loaded: HashMap::new(),
            emitted: vec![],
            duplicates: vec![],
            applet_entry: None,
        }
    }

    /// Body of a class, decoding it on first access
    pub fn class(&mut self, name: &ClassName) -> Result<Option<&mut ClassBody>, PatchError> {
        if !self.loaded.contains_key(name) {
            let bytes = match self.source.class_bytes(name)? {
                Some(bytes) => bytes,
                None => return Ok(None),
            };
            let body = ClassBody::decode(&bytes)?;
            self.loaded.insert(name.clone(), body);
        }
        Ok(self.loaded.get_mut(name))
    }

    /// Does the source (or an earlier emission) know this class at all?
    pub fn contains(&mut self, name: &ClassName) -> Result<bool, PatchError> {
        if self.loaded.contains_key(name) {
            return Ok(true);
        }
        Ok(self.source.class_bytes(name)?.is_some())
    }

    /// Mark an already loaded body for publication
    pub fn emit(&mut self, name: &ClassName) {
        debug_assert!(
            self.loaded.contains_key(name),
            "emit of a class the view never loaded"
        );
        if self.emitted.contains(name) {
            warn!("duplicate emission of {:?}, last write wins", name);
            self.duplicates.push(name.clone());
        } else {
            self.emitted.push(name.clone());
        }
    }

    /// Publish a body built (or rebuilt) by the rule itself
    pub fn emit_class(&mut self, body: ClassBody) {
        let name = body.name.clone();
        self.loaded.insert(name.clone(), body);
        self.emit(&name);
    }

    /// Note that the applet bootstrap path was wired for this entry class
    pub fn record_applet_entry(&mut self, name: ClassName) {
        self.applet_entry = Some(name);
    }
}
