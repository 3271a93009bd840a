use super::context::LaunchContext;
use super::LaunchError;
use crate::jvm::{ClassAccessFlags, ClassBody, ClassName, FieldAccessFlags, MethodAccessFlags};
use log::debug;

/// Secondary rewrites over the bytes chosen for definition (patched or
/// raw): access widening, then the package-access fix
///
/// Only game-namespace classes are eligible. Bytes with neither rewrite
/// applicable pass through without a decode/encode cycle.
pub fn transform(
    cx: &LaunchContext,
    name: &ClassName,
    bytes: Vec<u8>,
) -> Result<Vec<u8>, LaunchError> {
    if !cx.is_game_class(name) {
        return Ok(bytes);
    }
    let widen = cx.widen_targets.targets_class(name);
    if !widen && !cx.package_access_fix {
        return Ok(bytes);
    }

    let mut body = ClassBody::decode(&bytes).map_err(LaunchError::Source)?;
    if widen {
        let widened = cx.widen_targets.apply_to(&mut body);
        debug!("widened {} member(s) of {:?}", widened, name);
    }
    if cx.package_access_fix {
        fix_package_access(&mut body);
    }
    body.encode().map_err(LaunchError::Source)
}

/// Opens package-private game internals up to the compatibility layer:
/// whatever is not private becomes public
fn fix_package_access(body: &mut ClassBody) {
    let mut changed = false;

    if !body.access.contains(ClassAccessFlags::PUBLIC) {
        body.access.insert(ClassAccessFlags::PUBLIC);
        changed = true;
    }
    for method in &mut body.methods {
        if !method.access.contains(MethodAccessFlags::PRIVATE) {
            let before = method.access;
            method.access.remove(MethodAccessFlags::PROTECTED);
            method.access.insert(MethodAccessFlags::PUBLIC);
            changed |= method.access != before;
        }
    }
    for field in &mut body.fields {
        if !field.access.contains(FieldAccessFlags::PRIVATE) {
            let before = field.access;
            field.access.remove(FieldAccessFlags::PROTECTED);
            field.access.insert(FieldAccessFlags::PUBLIC);
            changed |= field.access != before;
        }
    }

    if changed {
        body.mark_modified();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{
        Field, InstructionStream, MemberName, Method, MethodDescriptor, FieldType,
    };
    use crate::launch::{GameVersion, MapClassSource, WidenTargets};

    fn sealed_class(name: &'static str) -> ClassBody {
        let mut body = ClassBody::new(
            ClassAccessFlags::SUPER,
            ClassName::from_static(name),
            ClassName::OBJECT,
        );
        body.fields.push(Field {
            access: FieldAccessFlags::empty(),
            name: MemberName::from_static("state"),
            descriptor: FieldType::STRING,
        });
        body.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("secret"),
            descriptor: FieldType::STRING,
        });
        body.methods.push(Method {
            access: MethodAccessFlags::PROTECTED,
            name: MemberName::from_static("tick"),
            descriptor: MethodDescriptor::new(vec![], None),
            code: InstructionStream::new(),
        });
        body
    }

    fn context() -> LaunchContext {
        LaunchContext::new(
            Box::new(MapClassSource::new()),
            ClassName::from_static("net/minecraft/client/main/Main"),
            GameVersion::new("1.16.5"),
        )
    }

    #[test]
    fn foreign_classes_pass_through() {
        let body = sealed_class("org/example/Helper");
        let bytes = body.encode().expect("encodes");
        let mut cx = context();
        cx.package_access_fix = true;
        let out = transform(&cx, &body.name, bytes.clone()).expect("passes");
        assert_eq!(out, bytes, "foreign namespaces are never rewritten");
    }

    #[test]
    fn inapplicable_rewrites_skip_the_codec() {
        let body = sealed_class("net/minecraft/world/Level");
        let bytes = body.encode().expect("encodes");
        let cx = context();
        let out = transform(&cx, &body.name, bytes.clone()).expect("passes");
        assert_eq!(out, bytes, "no rewrite applies, bytes pass through");
    }

    #[test]
    fn package_access_fix_opens_non_private_members() {
        let body = sealed_class("net/minecraft/world/Level");
        let bytes = body.encode().expect("encodes");
        let mut cx = context();
        cx.package_access_fix = true;

        let out = transform(&cx, &body.name, bytes).expect("rewrites");
        let fixed = ClassBody::decode(&out).expect("decodes");
        assert!(fixed.access.contains(ClassAccessFlags::PUBLIC));
        assert!(fixed.fields[0].access.contains(FieldAccessFlags::PUBLIC));
        assert!(
            fixed.fields[1].access.contains(FieldAccessFlags::PRIVATE)
                && !fixed.fields[1].access.contains(FieldAccessFlags::PUBLIC),
            "private members stay private"
        );
        assert!(
            fixed.methods[0].access.contains(MethodAccessFlags::PUBLIC)
                && !fixed.methods[0].access.contains(MethodAccessFlags::PROTECTED)
        );
    }

    #[test]
    fn widening_applies_before_the_access_fix() {
        let body = sealed_class("a");
        let bytes = body.encode().expect("encodes");
        let mut cx = context();
        cx.widen_targets = WidenTargets::parse(&b"widener v1\naccessible class a\n"[..])
            .expect("parses");

        let out = transform(&cx, &body.name, bytes).expect("rewrites");
        let widened = ClassBody::decode(&out).expect("decodes");
        assert!(widened.access.contains(ClassAccessFlags::PUBLIC));
    }

    #[test]
    fn malformed_bytes_surface_as_source_errors() {
        let mut cx = context();
        cx.package_access_fix = true;
        let err = transform(
            &cx,
            &ClassName::from_static("net/minecraft/world/Level"),
            vec![0, 1, 2, 3],
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::Source(_)), "got {:?}", err);
    }
}
