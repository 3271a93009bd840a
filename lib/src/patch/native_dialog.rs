use super::{PatchError, PatchView};
use crate::jvm::{Insn, InsnId, InvokeKind, MethodRef};
use crate::launch::{Environment, LaunchContext};
use log::debug;

/// Re-homes native message-box calls in the entry class onto a safe
/// in-process replacement
///
/// Headless and misconfigured client setups crash inside the native dialog
/// library before the game ever reports the real error. Every static call
/// to the configured dialog method keeps its name and descriptor but gets
/// the replacement owner.
pub struct NativeDialogPatch;

impl NativeDialogPatch {
    pub fn new() -> NativeDialogPatch {
        NativeDialogPatch
    }

    pub fn apply(&self, cx: &LaunchContext, view: &mut PatchView) -> Result<(), PatchError> {
        if !matches!(cx.environment, Environment::Client) {
            return Ok(());
        }
        let entry = cx.entry_class.clone();
        if !cx.is_game_entry(&entry) {
            return Ok(());
        }
        let body = match view.class(&entry)? {
            Some(body) => body,
            None => return Ok(()),
        };

        let mut swapped = 0;
        for method in body.methods.iter_mut() {
            let calls: Vec<(InsnId, MethodRef)> = method
                .code
                .iter()
                .filter_map(|(id, insn)| match insn {
                    Insn::Invoke(InvokeKind::Static, target)
                        if target.owner == cx.dialog_target_owner
                            && target.name == cx.dialog_target_method =>
                    {
                        Some((id, target.clone()))
                    }
                    _ => None,
                })
                .collect();

            for (id, target) in calls {
                let replacement = MethodRef::new(
                    cx.dialog_replacement_owner.clone(),
                    target.name,
                    target.descriptor,
                );
                method
                    .code
                    .replace(id, Insn::Invoke(InvokeKind::Static, replacement));
                swapped += 1;
            }
        }

        if swapped > 0 {
            debug!("re-homed {} native dialog calls in {:?}", swapped, entry);
            view.emit(&entry);
        }
        Ok(())
    }
}
