use super::{ClassBody, ClassName, FieldType, Insn, MethodDescriptor};

/// A 1:1 class rename applied across a whole body
///
/// Substitutes the class name everywhere it can appear as a symbol: the
/// body's own name, its superclass, field and method descriptors, and the
/// owner/descriptor positions of instruction-level references. String
/// constants are left alone.
pub struct ClassRename {
    from: ClassName,
    to: ClassName,
}

impl ClassRename {
    pub fn new(from: ClassName, to: ClassName) -> ClassRename {
        ClassRename { from, to }
    }

    /// Rename in place, returning how many symbol positions changed
    pub fn apply(&self, body: &mut ClassBody) -> usize {
        let mut hits = 0;

        hits += self.map_class(&mut body.name);
        hits += self.map_class(&mut body.superclass);
        for field in &mut body.fields {
            hits += self.map_type(&mut field.descriptor);
        }

        for method in &mut body.methods {
            hits += self.map_descriptor(&mut method.descriptor);

            let ids: Vec<_> = method.code.iter().map(|(id, _)| id).collect();
            for id in ids {
                let mut insn = method.code.get(id).clone();
                let changed = self.map_insn(&mut insn);
                if changed > 0 {
                    method.code.replace(id, insn);
                    hits += changed;
                }
            }
        }

        if hits > 0 {
            body.mark_modified();
        }
        hits
    }

    fn map_class(&self, name: &mut ClassName) -> usize {
        if *name == self.from {
            *name = self.to.clone();
            1
        } else {
            0
        }
    }

    fn map_type(&self, typ: &mut FieldType) -> usize {
        match typ {
            FieldType::Object(class) => self.map_class(class),
            FieldType::Array(element) => self.map_type(element),
            FieldType::Base(_) => 0,
        }
    }

    fn map_descriptor(&self, descriptor: &mut MethodDescriptor) -> usize {
        let mut hits = 0;
        for parameter in &mut descriptor.parameters {
            hits += self.map_type(parameter);
        }
        if let Some(ret) = &mut descriptor.return_type {
            hits += self.map_type(ret);
        }
        hits
    }

    fn map_insn(&self, insn: &mut Insn) -> usize {
        match insn {
            Insn::GetField(field)
            | Insn::PutField(field)
            | Insn::GetStatic(field)
            | Insn::PutStatic(field) => {
                self.map_class(&mut field.owner) + self.map_type(&mut field.descriptor)
            }
            Insn::Invoke(_, method) => {
                self.map_class(&mut method.owner) + self.map_descriptor(&mut method.descriptor)
            }
            Insn::New(class) => self.map_class(class),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{
        ClassAccessFlags, ConstOperand, Field, FieldAccessFlags, FieldRef, InstructionStream,
        InvokeKind, MemberName, Method, MethodAccessFlags, MethodRef,
    };

    #[test]
    fn rename_touches_symbols_but_not_strings() {
        let from = ClassName::from_static("hookjar/compat/LegacyModClassLoader");
        let to = ClassName::from_static("cpw/mods/fml/common/ModClassLoader");

        let mut body = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            from.clone(),
            ClassName::URL_CLASS_LOADER,
        );
        body.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("self"),
            descriptor: FieldType::object(from.clone()),
        });
        body.methods.push(Method {
            access: MethodAccessFlags::PUBLIC,
            name: MemberName::from_static("dup"),
            descriptor: MethodDescriptor::new(vec![], Some(FieldType::object(from.clone()))),
            code: InstructionStream::from_insns(vec![
                Insn::New(from.clone()),
                Insn::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(from.clone(), MemberName::INIT, MethodDescriptor::new(vec![], None)),
                ),
                Insn::GetStatic(FieldRef::new(
                    from.clone(),
                    MemberName::from_static("self"),
                    FieldType::object(from.clone()),
                )),
                Insn::Const(ConstOperand::Str(String::from(
                    "hookjar/compat/LegacyModClassLoader",
                ))),
                Insn::Return { has_value: true },
            ]),
        });

        let hits = ClassRename::new(from.clone(), to.clone()).apply(&mut body);
        assert!(hits >= 7, "expected many substitutions, got {}", hits);
        assert!(body.is_dirty());

        assert_eq!(body.name, to);
        assert_eq!(body.superclass, ClassName::URL_CLASS_LOADER);
        assert_eq!(body.fields[0].descriptor, FieldType::object(to.clone()));
        assert_eq!(
            body.methods[0].descriptor.return_type,
            Some(FieldType::object(to.clone()))
        );

        let insns = body.methods[0].code.to_vec();
        assert_eq!(insns[0], Insn::New(to.clone()));
        match &insns[1] {
            Insn::Invoke(_, method) => assert_eq!(method.owner, to),
            other => panic!("expected invoke, got {:?}", other),
        }
        match &insns[2] {
            Insn::GetStatic(field) => {
                assert_eq!(field.owner, to);
                assert_eq!(field.descriptor, FieldType::object(to.clone()));
            }
            other => panic!("expected getstatic, got {:?}", other),
        }
        assert_eq!(
            insns[3].const_str(),
            Some("hookjar/compat/LegacyModClassLoader"),
            "string constants are not remapped"
        );
    }
}
