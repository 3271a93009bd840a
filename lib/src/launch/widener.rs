use crate::jvm::{
    ClassAccessFlags, ClassBody, ClassName, FieldAccessFlags, MemberName, MethodAccessFlags, Name,
    ParseDescriptor, RenderDescriptor,
};
use crate::jvm::{FieldType, MethodDescriptor};
use std::collections::HashSet;
use std::io::{BufRead, Error, ErrorKind, Result};

/// Declared symbol-widening requests
///
/// Parsed from the line oriented descriptor format:
///
/// ```text
/// widener v1
/// # runtime reflection needs these
/// accessible class net/minecraft/client/Minecraft
/// accessible method net/minecraft/client/Minecraft getInstance ()Lnet/minecraft/client/Minecraft;
/// accessible field net/minecraft/client/Minecraft runDir Ljava/io/File;
/// ```
///
/// Widening makes the target public; private members keep their visibility
/// only if they were never named here.
#[derive(Debug, Default)]
pub struct WidenTargets {
    classes: HashSet<ClassName>,
    methods: HashSet<(ClassName, MemberName, String)>,
    fields: HashSet<(ClassName, MemberName, String)>,
    /// Every class any entry mentions, owner positions included
    touched: HashSet<ClassName>,
}

impl WidenTargets {
    pub fn empty() -> WidenTargets {
        WidenTargets::default()
    }

    pub fn parse(reader: impl BufRead) -> Result<WidenTargets> {
        let mut targets = WidenTargets::empty();
        let mut saw_header = false;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = match line.find('#') {
                Some(at) => &line[..at],
                None => &line[..],
            };
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }

            if !saw_header {
                if words != ["widener", "v1"] {
                    return Err(bad_line(index, "expected header 'widener v1'"));
                }
                saw_header = true;
                continue;
            }

            match words.as_slice() {
                ["accessible", "class", name] => {
                    let class = parse_class(index, name)?;
                    targets.touched.insert(class.clone());
                    targets.classes.insert(class);
                }
                ["accessible", "method", owner, name, descriptor] => {
                    let owner = parse_class(index, owner)?;
                    let name = parse_member(index, name)?;
                    let descriptor = MethodDescriptor::parse(descriptor)
                        .map_err(|err| bad_line(index, &format!("bad descriptor: {}", err)))?;
                    targets.touched.insert(owner.clone());
                    targets.methods.insert((owner, name, descriptor.render()));
                }
                ["accessible", "field", owner, name, descriptor] => {
                    let owner = parse_class(index, owner)?;
                    let name = parse_member(index, name)?;
                    let descriptor = FieldType::parse(descriptor)
                        .map_err(|err| bad_line(index, &format!("bad descriptor: {}", err)))?;
                    targets.touched.insert(owner.clone());
                    targets.fields.insert((owner, name, descriptor.render()));
                }
                _ => return Err(bad_line(index, "unrecognized entry")),
            }
        }

        Ok(targets)
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    /// Is this class named anywhere in the request set?
    pub fn targets_class(&self, name: &ClassName) -> bool {
        self.touched.contains(name)
    }

    /// Widen everything the set declares on this body, returning the number
    /// of members (or the class itself) whose flags changed
    pub fn apply_to(&self, body: &mut ClassBody) -> usize {
        let mut hits = 0;

        if self.classes.contains(&body.name) && !body.access.contains(ClassAccessFlags::PUBLIC) {
            body.access.insert(ClassAccessFlags::PUBLIC);
            hits += 1;
        }

        for method in &mut body.methods {
            let key = (
                body.name.clone(),
                method.name.clone(),
                method.descriptor.render(),
            );
            if self.methods.contains(&key) {
                let widened = widen_method(method.access);
                if widened != method.access {
                    method.access = widened;
                    hits += 1;
                }
            }
        }

        for field in &mut body.fields {
            let key = (
                body.name.clone(),
                field.name.clone(),
                field.descriptor.render(),
            );
            if self.fields.contains(&key) {
                let widened = widen_field(field.access);
                if widened != field.access {
                    field.access = widened;
                    hits += 1;
                }
            }
        }

        if hits > 0 {
            body.mark_modified();
        }
        hits
    }
}

fn widen_method(mut access: MethodAccessFlags) -> MethodAccessFlags {
    access.remove(MethodAccessFlags::PRIVATE | MethodAccessFlags::PROTECTED);
    access.insert(MethodAccessFlags::PUBLIC);
    access
}

fn widen_field(mut access: FieldAccessFlags) -> FieldAccessFlags {
    access.remove(FieldAccessFlags::PRIVATE | FieldAccessFlags::PROTECTED);
    access.insert(FieldAccessFlags::PUBLIC);
    access
}

fn bad_line(index: usize, message: &str) -> Error {
    Error::new(
        ErrorKind::InvalidInput,
        format!("widener line {}: {}", index + 1, message),
    )
}

fn parse_class(index: usize, raw: &str) -> Result<ClassName> {
    ClassName::from_string(String::from(raw)).map_err(|msg| bad_line(index, &msg))
}

fn parse_member(index: usize, raw: &str) -> Result<MemberName> {
    MemberName::from_string(String::from(raw)).map_err(|msg| bad_line(index, &msg))
}
