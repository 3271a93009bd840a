use super::{ClassName, Deserialize, FieldType, MemberName, MethodDescriptor, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Error, ErrorKind, Result};

/// Reference to a field on some class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: ClassName,
    pub name: MemberName,
    pub descriptor: FieldType,
}

/// Reference to a method on some class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: ClassName,
    pub name: MemberName,
    pub descriptor: MethodDescriptor,
}

/// Dispatch flavor of a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Virtual,
    Special,
}

/// Operand of a constant load
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstOperand {
    Str(String),
    Num(i64),
    Null,
}

/// One instruction, at the granularity the patching heuristics care about
///
/// Operand-stack bookkeeping, wide locals, and the long tail of arithmetic
/// and stack-shuffling opcodes all collapse into `Other`; the heuristics
/// only ever pattern match on the shapes below.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Insn {
    LoadLocal(u16),
    StoreLocal(u16),
    GetField(FieldRef),
    PutField(FieldRef),
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    Invoke(InvokeKind, MethodRef),
    Const(ConstOperand),
    New(ClassName),
    Label(LabelId),
    Branch { conditional: bool, target: LabelId },
    Return { has_value: bool },
    Other(u8),
}

/// Variant of an [`Insn`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsnKind {
    LoadLocal,
    StoreLocal,
    GetField,
    PutField,
    GetStatic,
    PutStatic,
    Invoke,
    Const,
    New,
    Label,
    Branch,
    Return,
    Other,
}

/// Branch target marker, carried by `Label` pseudo-instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u16);

impl FieldRef {
    pub fn new(owner: ClassName, name: MemberName, descriptor: FieldType) -> FieldRef {
        FieldRef {
            owner,
            name,
            descriptor,
        }
    }
}

impl MethodRef {
    pub fn new(owner: ClassName, name: MemberName, descriptor: MethodDescriptor) -> MethodRef {
        MethodRef {
            owner,
            name,
            descriptor,
        }
    }
}

impl Insn {
    pub fn kind(&self) -> InsnKind {
        match self {
            Insn::LoadLocal(_) => InsnKind::LoadLocal,
            Insn::StoreLocal(_) => InsnKind::StoreLocal,
            Insn::GetField(_) => InsnKind::GetField,
            Insn::PutField(_) => InsnKind::PutField,
            Insn::GetStatic(_) => InsnKind::GetStatic,
            Insn::PutStatic(_) => InsnKind::PutStatic,
            Insn::Invoke(_, _) => InsnKind::Invoke,
            Insn::Const(_) => InsnKind::Const,
            Insn::New(_) => InsnKind::New,
            Insn::Label(_) => InsnKind::Label,
            Insn::Branch { .. } => InsnKind::Branch,
            Insn::Return { .. } => InsnKind::Return,
            Insn::Other(_) => InsnKind::Other,
        }
    }

    /// The string behind a constant load, if this is one
    pub fn const_str(&self) -> Option<&str> {
        match self {
            Insn::Const(ConstOperand::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Serialize for FieldRef {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.owner.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)
    }
}

impl Deserialize for FieldRef {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(FieldRef {
            owner: ClassName::deserialize(reader)?,
            name: MemberName::deserialize(reader)?,
            descriptor: FieldType::deserialize(reader)?,
        })
    }
}

impl Serialize for MethodRef {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.owner.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)
    }
}

impl Deserialize for MethodRef {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(MethodRef {
            owner: ClassName::deserialize(reader)?,
            name: MemberName::deserialize(reader)?,
            descriptor: MethodDescriptor::deserialize(reader)?,
        })
    }
}

impl Serialize for InvokeKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        let tag: u8 = match self {
            InvokeKind::Static => 0,
            InvokeKind::Virtual => 1,
            InvokeKind::Special => 2,
        };
        tag.serialize(writer)
    }
}

impl Deserialize for InvokeKind {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        match u8::deserialize(reader)? {
            0 => Ok(InvokeKind::Static),
            1 => Ok(InvokeKind::Virtual),
            2 => Ok(InvokeKind::Special),
            tag => Err(Error::new(
                ErrorKind::InvalidData,
                format!("unknown invoke kind tag {}", tag),
            )),
        }
    }
}

impl Serialize for LabelId {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LabelId {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(LabelId(u16::deserialize(reader)?))
    }
}

fn serialize_bool<W: WriteBytesExt>(b: bool, writer: &mut W) -> Result<()> {
    (b as u8).serialize(writer)
}

fn deserialize_bool<R: ReadBytesExt>(reader: &mut R) -> Result<bool> {
    match u8::deserialize(reader)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::new(
            ErrorKind::InvalidData,
            format!("bad boolean byte {}", other),
        )),
    }
}

impl Serialize for Insn {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            Insn::LoadLocal(slot) => {
                0u8.serialize(writer)?;
                slot.serialize(writer)
            }
            Insn::StoreLocal(slot) => {
                1u8.serialize(writer)?;
                slot.serialize(writer)
            }
            Insn::GetField(field) => {
                2u8.serialize(writer)?;
                field.serialize(writer)
            }
            Insn::PutField(field) => {
                3u8.serialize(writer)?;
                field.serialize(writer)
            }
            Insn::GetStatic(field) => {
                4u8.serialize(writer)?;
                field.serialize(writer)
            }
            Insn::PutStatic(field) => {
                5u8.serialize(writer)?;
                field.serialize(writer)
            }
            Insn::Invoke(kind, method) => {
                6u8.serialize(writer)?;
                kind.serialize(writer)?;
                method.serialize(writer)
            }
            Insn::Const(ConstOperand::Str(s)) => {
                7u8.serialize(writer)?;
                0u8.serialize(writer)?;
                s.serialize(writer)
            }
            Insn::Const(ConstOperand::Num(n)) => {
                7u8.serialize(writer)?;
                1u8.serialize(writer)?;
                n.serialize(writer)
            }
            Insn::Const(ConstOperand::Null) => {
                7u8.serialize(writer)?;
                2u8.serialize(writer)
            }
            Insn::New(class) => {
                8u8.serialize(writer)?;
                class.serialize(writer)
            }
            Insn::Label(label) => {
                9u8.serialize(writer)?;
                label.serialize(writer)
            }
            Insn::Branch {
                conditional,
                target,
            } => {
                10u8.serialize(writer)?;
                serialize_bool(*conditional, writer)?;
                target.serialize(writer)
            }
            Insn::Return { has_value } => {
                11u8.serialize(writer)?;
                serialize_bool(*has_value, writer)
            }
            Insn::Other(opcode) => {
                12u8.serialize(writer)?;
                opcode.serialize(writer)
            }
        }
    }
}

impl Deserialize for Insn {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let insn = match u8::deserialize(reader)? {
            0 => Insn::LoadLocal(u16::deserialize(reader)?),
            1 => Insn::StoreLocal(u16::deserialize(reader)?),
            2 => Insn::GetField(FieldRef::deserialize(reader)?),
            3 => Insn::PutField(FieldRef::deserialize(reader)?),
            4 => Insn::GetStatic(FieldRef::deserialize(reader)?),
            5 => Insn::PutStatic(FieldRef::deserialize(reader)?),
            6 => Insn::Invoke(
                InvokeKind::deserialize(reader)?,
                MethodRef::deserialize(reader)?,
            ),
            7 => match u8::deserialize(reader)? {
                0 => Insn::Const(ConstOperand::Str(String::deserialize(reader)?)),
                1 => Insn::Const(ConstOperand::Num(i64::deserialize(reader)?)),
                2 => Insn::Const(ConstOperand::Null),
                tag => {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("unknown constant tag {}", tag),
                    ))
                }
            },
            8 => Insn::New(ClassName::deserialize(reader)?),
            9 => Insn::Label(LabelId::deserialize(reader)?),
            10 => Insn::Branch {
                conditional: deserialize_bool(reader)?,
                target: LabelId::deserialize(reader)?,
            },
            11 => Insn::Return {
                has_value: deserialize_bool(reader)?,
            },
            12 => Insn::Other(u8::deserialize(reader)?),
            tag => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("unknown instruction tag {}", tag),
                ))
            }
        };
        Ok(insn)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ParseDescriptor;

    #[test]
    fn sample_instructions_survive_the_codec() {
        let start = MethodRef::new(
            ClassName::from_static("hookjar/runtime/Hooks"),
            MemberName::from_static("startGame"),
            MethodDescriptor::parse("(Ljava/io/File;Ljava/lang/Object;)V").unwrap(),
        );
        let run_dir = FieldRef::new(
            ClassName::from_static("pkg/Game"),
            MemberName::from_static("runDir"),
            FieldType::FILE,
        );
        let insns = vec![
            Insn::LoadLocal(0),
            Insn::GetField(run_dir.clone()),
            Insn::Const(ConstOperand::Str(String::from("LWJGL Version: "))),
            Insn::Const(ConstOperand::Num(-7)),
            Insn::Const(ConstOperand::Null),
            Insn::New(ClassName::from_static("pkg/Game")),
            Insn::PutStatic(run_dir),
            Insn::Label(LabelId(3)),
            Insn::Branch {
                conditional: true,
                target: LabelId(3),
            },
            Insn::Invoke(InvokeKind::Static, start),
            Insn::Return { has_value: false },
            Insn::Other(0x57),
        ];

        let mut bytes = vec![];
        insns.serialize(&mut bytes).unwrap();
        let back = Vec::<Insn>::deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(insns, back, "instructions changed across the codec");
    }

    #[test]
    fn kinds_match_variants() {
        assert_eq!(Insn::LoadLocal(1).kind(), InsnKind::LoadLocal);
        assert_eq!(Insn::Return { has_value: true }.kind(), InsnKind::Return);
        assert_eq!(
            Insn::Const(ConstOperand::Null).kind(),
            InsnKind::Const,
            "constant loads share one kind"
        );
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(Insn::deserialize(&mut &[200u8][..]).is_err());
        assert!(Insn::deserialize(&mut &[7u8, 9u8][..]).is_err());
    }
}
