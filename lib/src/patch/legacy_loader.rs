use super::{PatchError, PatchView};
use crate::jvm::{
    ClassAccessFlags, ClassBody, ClassName, ClassRename, ConstOperand, FieldRef, FieldType, Insn,
    InstructionStream, InvokeKind, MemberName, Method, MethodAccessFlags, MethodDescriptor,
    MethodRef,
};
use crate::launch::LaunchContext;
use log::debug;

/// Legacy classloader symbol old compatibility layers instantiate directly
const LEGACY_LOADER: ClassName = ClassName::from_static("cpw/mods/fml/common/ModClassLoader");

/// Present only in newer layouts that relocated the loader; those need no
/// bridging
const RELAUNCHER: ClassName = ClassName::from_static("cpw/mods/fml/relauncher/FMLRelauncher");

const BUNDLED_LOADER: ClassName = ClassName::from_static("hookjar/compat/LegacyModClassLoader");

/// Serves a bundled classloader body under the legacy symbol so that old
/// compatibility-layer builds which instantiate it by name keep working
///
/// The bundled body is built programmatically and renamed wholesale; only
/// class references and descriptors change, string constants are left
/// alone.
pub struct LegacyLoaderRemapPatch;

impl LegacyLoaderRemapPatch {
    pub fn new() -> LegacyLoaderRemapPatch {
        LegacyLoaderRemapPatch
    }

    pub fn apply(&self, _cx: &LaunchContext, view: &mut PatchView) -> Result<(), PatchError> {
        if !view.contains(&LEGACY_LOADER)? {
            return Ok(());
        }
        if view.contains(&RELAUNCHER)? {
            debug!("relocated loader detected, leaving {:?} alone", LEGACY_LOADER);
            return Ok(());
        }

        let mut shim = build_loader_shim();
        let hits = ClassRename::new(BUNDLED_LOADER, LEGACY_LOADER).apply(&mut shim);
        debug!(
            "bridging legacy loader as {:?} ({} symbols renamed)",
            LEGACY_LOADER, hits
        );
        view.emit_class(shim);
        Ok(())
    }
}

/// The shim under its bundled name: a `URLClassLoader` that can grow its
/// search path one file at a time and answer parent-source queries from
/// the runtime's recorded game source
fn build_loader_shim() -> ClassBody {
    let hooks = ClassName::from_static("hookjar/runtime/Hooks");
    let url = ClassName::from_static("java/net/URL");
    let uri = ClassName::from_static("java/net/URI");

    let mut body = ClassBody::new(
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        BUNDLED_LOADER,
        ClassName::URL_CLASS_LOADER,
    );

    body.methods.push(Method {
        access: MethodAccessFlags::STATIC,
        name: MemberName::CLINIT,
        descriptor: MethodDescriptor::new(vec![], None),
        code: InstructionStream::from_insns(vec![
            Insn::Invoke(
                InvokeKind::Static,
                MethodRef::new(
                    ClassName::from_static("java/lang/ClassLoader"),
                    MemberName::from_static("registerAsParallelCapable"),
                    MethodDescriptor::new(vec![], Some(FieldType::Base(crate::jvm::BaseType::Boolean))),
                ),
            ),
            // pop
            Insn::Other(0x57),
            Insn::Return { has_value: false },
        ]),
    });

    body.methods.push(Method {
        access: MethodAccessFlags::PUBLIC,
        name: MemberName::INIT,
        descriptor: MethodDescriptor::new(vec![], None),
        code: InstructionStream::from_insns(vec![
            Insn::LoadLocal(0),
            Insn::Const(ConstOperand::Null),
            Insn::Const(ConstOperand::Null),
            Insn::Invoke(
                InvokeKind::Special,
                MethodRef::new(
                    ClassName::URL_CLASS_LOADER,
                    MemberName::INIT,
                    MethodDescriptor::new(
                        vec![
                            FieldType::array(FieldType::object(url.clone())),
                            FieldType::object(ClassName::from_static("java/lang/ClassLoader")),
                        ],
                        None,
                    ),
                ),
            ),
            Insn::Return { has_value: false },
        ]),
    });

    body.methods.push(Method {
        access: MethodAccessFlags::PUBLIC,
        name: MemberName::from_static("addFile"),
        descriptor: MethodDescriptor::new(vec![FieldType::FILE], None),
        code: InstructionStream::from_insns(vec![
            Insn::LoadLocal(0),
            Insn::LoadLocal(1),
            Insn::Invoke(
                InvokeKind::Virtual,
                MethodRef::new(
                    ClassName::FILE,
                    MemberName::from_static("toURI"),
                    MethodDescriptor::new(vec![], Some(FieldType::object(uri.clone()))),
                ),
            ),
            Insn::Invoke(
                InvokeKind::Virtual,
                MethodRef::new(
                    uri,
                    MemberName::from_static("toURL"),
                    MethodDescriptor::new(vec![], Some(FieldType::object(url.clone()))),
                ),
            ),
            Insn::Invoke(
                InvokeKind::Virtual,
                MethodRef::new(
                    BUNDLED_LOADER,
                    MemberName::from_static("addURL"),
                    MethodDescriptor::new(vec![FieldType::object(url)], None),
                ),
            ),
            Insn::Return { has_value: false },
        ]),
    });

    body.methods.push(Method {
        access: MethodAccessFlags::PUBLIC,
        name: MemberName::from_static("getParentSource"),
        descriptor: MethodDescriptor::new(vec![], Some(FieldType::FILE)),
        code: InstructionStream::from_insns(vec![
            Insn::GetStatic(FieldRef::new(
                hooks.clone(),
                MemberName::from_static("gameSource"),
                FieldType::FILE,
            )),
            Insn::Return { has_value: true },
        ]),
    });

    body.methods.push(Method {
        access: MethodAccessFlags::PUBLIC,
        name: MemberName::from_static("getParentSources"),
        descriptor: MethodDescriptor::new(vec![], Some(FieldType::array(FieldType::FILE))),
        code: InstructionStream::from_insns(vec![
            Insn::GetStatic(FieldRef::new(
                hooks,
                MemberName::from_static("gameSources"),
                FieldType::array(FieldType::FILE),
            )),
            Insn::Return { has_value: true },
        ]),
    });

    body
}
