use super::{PatchError, PatchView};
use crate::jvm::{FieldType, Insn, InvokeKind};
use crate::launch::LaunchContext;
use log::debug;

/// Re-routes the game's brand-reporting methods through the loader so that
/// crash reports and server pings carry the loader's branding
///
/// Each configured target method that returns a string gets a call to the
/// branding hook spliced in front of every value-returning return, wrapping
/// whatever brand the vanilla code produced.
pub struct BrandingPatch;

impl BrandingPatch {
    pub fn new() -> BrandingPatch {
        BrandingPatch
    }

    pub fn apply(&self, cx: &LaunchContext, view: &mut PatchView) -> Result<(), PatchError> {
        for (owner, method_name) in &cx.branding_targets {
            let body = match view.class(owner)? {
                Some(body) => body,
                None => continue,
            };

            let position = match body.method_position(|m| {
                &m.name == method_name && m.descriptor.returns(&FieldType::STRING)
            }) {
                Some(position) => position,
                None => {
                    debug!("{:?} has no brand-reporting {:?}", owner, method_name);
                    continue;
                }
            };

            let mut cursor = body.methods[position].code.cursor();
            let mut wrapped = 0;
            while cursor
                .move_before(|insn| matches!(insn, Insn::Return { has_value: true }))
                .is_ok()
            {
                cursor.insert(Insn::Invoke(InvokeKind::Static, cx.branding_hook.clone()));
                cursor.advance();
                wrapped += 1;
            }
            if wrapped == 0 {
                continue;
            }

            debug!("re-routed {} brand returns in {:?}", wrapped, owner);
            view.emit(owner);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{
        ClassAccessFlags, ClassBody, ClassName, ConstOperand, InstructionStream, MemberName,
        Method, MethodAccessFlags, MethodDescriptor,
    };
    use crate::launch::{GameVersion, LaunchContext, MapClassSource};

    fn brand_class(with_method: bool) -> ClassBody {
        let name = ClassName::from_static("net/minecraft/client/ClientBrandRetriever");
        let mut body = ClassBody::new(ClassAccessFlags::PUBLIC, name, ClassName::OBJECT);
        if with_method {
            body.methods.push(Method {
                access: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                name: MemberName::from_static("getClientModName"),
                descriptor: MethodDescriptor::new(vec![], Some(FieldType::STRING)),
                code: InstructionStream::from_insns(vec![
                    Insn::Const(ConstOperand::Str(String::from("vanilla"))),
                    Insn::Return { has_value: true },
                    Insn::Const(ConstOperand::Str(String::from("vanilla"))),
                    Insn::Return { has_value: true },
                ]),
            });
        }
        body
    }

    fn context_over(bodies: &[&ClassBody]) -> LaunchContext {
        let mut source = MapClassSource::new();
        for body in bodies {
            source.insert_body(body).expect("test body encodes");
        }
        LaunchContext::new(
            Box::new(source),
            ClassName::from_static("net/minecraft/client/main/Main"),
            GameVersion::new("1.16.5"),
        )
    }

    #[test]
    fn every_string_return_is_wrapped() {
        let body = brand_class(true);
        let cx = context_over(&[&body]);
        let mut view = PatchView::new(&cx);
        BrandingPatch::new().apply(&cx, &mut view).expect("patches");

        assert_eq!(view.emitted.len(), 1, "one branding class emitted");
        let patched = &view.loaded[&ClassName::from_static("net/minecraft/client/ClientBrandRetriever")];
        let insns = patched.methods[0].code.to_vec();
        let hook = Insn::Invoke(InvokeKind::Static, cx.branding_hook.clone());
        assert_eq!(
            insns.iter().filter(|i| **i == hook).count(),
            2,
            "both returns are wrapped: {:?}",
            insns
        );
        for (index, insn) in insns.iter().enumerate() {
            if matches!(insn, Insn::Return { has_value: true }) {
                assert_eq!(insns[index - 1], hook, "hook sits before the return");
            }
        }
    }

    #[test]
    fn absent_targets_are_skipped() {
        let body = brand_class(false);
        let cx = context_over(&[&body]);
        let mut view = PatchView::new(&cx);
        BrandingPatch::new().apply(&cx, &mut view).expect("no-op");
        assert!(view.emitted.is_empty(), "nothing to emit");
    }
}
