use super::{
    ClassAccessFlags, ClassName, Deserialize, FieldAccessFlags, FieldType, InstructionStream,
    MemberName, MethodAccessFlags, MethodDescriptor, Serialize,
};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Error, ErrorKind, Result};

/// First four bytes of every encoded class body
pub const MAGIC: u32 = 0x484F_4F4B;

/// Bumped on every incompatible layout change
pub const FORMAT_VERSION: u16 = 1;

/// Field of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub access: FieldAccessFlags,
    pub name: MemberName,
    pub descriptor: FieldType,
}

/// Method of a class, with its body
#[derive(Debug, PartialEq, Eq)]
pub struct Method {
    pub access: MethodAccessFlags,
    pub name: MemberName,
    pub descriptor: MethodDescriptor,
    pub code: InstructionStream,
}

/// One class, in mutable semantic form
///
/// This is what patch rules edit. A body is dirty once any of its method
/// streams has been mutated or its structure (names, members, flags) has
/// been edited; dirty bodies must be re-encoded before they reach class
/// definition.
#[derive(Debug)]
pub struct ClassBody {
    pub access: ClassAccessFlags,
    pub name: ClassName,
    pub superclass: ClassName,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    structurally_modified: bool,
}

impl Method {
    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_public_static(&self) -> bool {
        self.access
            .contains(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == MemberName::INIT
    }
}

impl Field {
    pub fn is_static(&self) -> bool {
        self.access.contains(FieldAccessFlags::STATIC)
    }
}

impl ClassBody {
    pub fn new(access: ClassAccessFlags, name: ClassName, superclass: ClassName) -> ClassBody {
        ClassBody {
            access,
            name,
            superclass,
            fields: vec![],
            methods: vec![],
            structurally_modified: false,
        }
    }

    pub fn find_method(&self, name: &MemberName, descriptor: &MethodDescriptor) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| &m.name == name && &m.descriptor == descriptor)
    }

    pub fn find_method_mut(
        &mut self,
        name: &MemberName,
        descriptor: &MethodDescriptor,
    ) -> Option<&mut Method> {
        self.methods
            .iter_mut()
            .find(|m| &m.name == name && &m.descriptor == descriptor)
    }

    /// Index of the first method satisfying the predicate
    pub fn method_position<P>(&self, pred: P) -> Option<usize>
    where
        P: Fn(&Method) -> bool,
    {
        self.methods.iter().position(pred)
    }

    pub fn find_field<P>(&self, pred: P) -> Option<&Field>
    where
        P: Fn(&Field) -> bool,
    {
        self.fields.iter().find(|f| pred(f))
    }

    /// Record an edit that does not go through a method's stream (renames,
    /// flag changes, member surgery)
    pub fn mark_modified(&mut self) {
        self.structurally_modified = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.structurally_modified || self.methods.iter().any(|m| m.code.is_modified())
    }

    /// Encode into the compact binary form
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Decode from the compact binary form, rejecting trailing garbage
    pub fn decode(bytes: &[u8]) -> Result<ClassBody> {
        let mut reader = bytes;
        let body = ClassBody::deserialize(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("{} trailing bytes after class body", reader.len()),
            ));
        }
        Ok(body)
    }
}

impl Serialize for Field {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.access.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)
    }
}

impl Deserialize for Field {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(Field {
            access: FieldAccessFlags::deserialize(reader)?,
            name: MemberName::deserialize(reader)?,
            descriptor: FieldType::deserialize(reader)?,
        })
    }
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.access.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)?;
        self.code.serialize(writer)
    }
}

impl Deserialize for Method {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(Method {
            access: MethodAccessFlags::deserialize(reader)?,
            name: MemberName::deserialize(reader)?,
            descriptor: MethodDescriptor::deserialize(reader)?,
            code: InstructionStream::deserialize(reader)?,
        })
    }
}

impl Serialize for ClassBody {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        MAGIC.serialize(writer)?;
        FORMAT_VERSION.serialize(writer)?;
        self.access.serialize(writer)?;
        self.name.serialize(writer)?;
        self.superclass.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)
    }
}

impl Deserialize for ClassBody {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let magic = u32::deserialize(reader)?;
        if magic != MAGIC {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("bad magic {:#010x}", magic),
            ));
        }
        let version = u16::deserialize(reader)?;
        if version != FORMAT_VERSION {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("unsupported format version {}", version),
            ));
        }
        Ok(ClassBody {
            access: ClassAccessFlags::deserialize(reader)?,
            name: ClassName::deserialize(reader)?,
            superclass: ClassName::deserialize(reader)?,
            fields: Vec::<Field>::deserialize(reader)?,
            methods: Vec::<Method>::deserialize(reader)?,
            structurally_modified: false,
        })
    }
}

/// Equality ignores the dirty flag
impl PartialEq for ClassBody {
    fn eq(&self, other: &ClassBody) -> bool {
        self.access == other.access
            && self.name == other.name
            && self.superclass == other.superclass
            && self.fields == other.fields
            && self.methods == other.methods
    }
}

impl Eq for ClassBody {}

#[test]
fn sample_class() {
    use super::{ConstOperand, Insn, InvokeKind, MethodRef, ParseDescriptor};

    let mut body = ClassBody::new(
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        ClassName::from_static("pkg/Game"),
        ClassName::OBJECT,
    );
    body.fields.push(Field {
        access: FieldAccessFlags::PRIVATE,
        name: MemberName::from_static("runDir"),
        descriptor: FieldType::FILE,
    });
    body.methods.push(Method {
        access: MethodAccessFlags::PUBLIC,
        name: MemberName::INIT,
        descriptor: MethodDescriptor::parse("(Ljava/io/File;)V").unwrap(),
        code: InstructionStream::from_insns(vec![
            Insn::LoadLocal(0),
            Insn::Invoke(
                InvokeKind::Special,
                MethodRef::new(
                    ClassName::OBJECT,
                    MemberName::INIT,
                    MethodDescriptor::new(vec![], None),
                ),
            ),
            Insn::Const(ConstOperand::Str(String::from("booting"))),
            Insn::Return { has_value: false },
        ]),
    });

    assert!(!body.is_dirty(), "fresh body starts clean");
    let bytes = body.encode().expect("encodes");
    let back = ClassBody::decode(&bytes).expect("decodes");
    assert_eq!(body, back, "class body changed across the codec");
    assert!(!back.is_dirty());

    let mut truncated = bytes.clone();
    truncated.pop();
    assert!(ClassBody::decode(&truncated).is_err());
    let mut padded = bytes;
    padded.push(0);
    assert!(ClassBody::decode(&padded).is_err(), "trailing bytes are rejected");
}

#[test]
fn dirty_tracking_follows_streams() {
    let mut body = ClassBody::new(
        ClassAccessFlags::PUBLIC,
        ClassName::from_static("pkg/Main"),
        ClassName::OBJECT,
    );
    body.methods.push(Method {
        access: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        name: MemberName::MAIN,
        descriptor: MethodDescriptor::main(),
        code: InstructionStream::from_insns(vec![super::Insn::Return { has_value: false }]),
    });

    assert!(!body.is_dirty());
    body.methods[0].code.cursor().insert(super::Insn::LoadLocal(0));
    assert!(body.is_dirty(), "stream mutation dirties the body");

    let mut renamed = ClassBody::new(
        ClassAccessFlags::PUBLIC,
        ClassName::from_static("pkg/Other"),
        ClassName::OBJECT,
    );
    renamed.mark_modified();
    assert!(renamed.is_dirty());
}
