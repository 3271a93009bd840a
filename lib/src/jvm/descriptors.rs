use super::{ClassName, Deserialize, Name, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Error, ErrorKind};
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors into their string form
pub trait RenderDescriptor {
    fn render_to(&self, write_to: &mut String);

    fn render(&self) -> String {
        let mut buf = String::new();
        self.render_to(&mut buf);
        buf
    }
}

/// Utility trait for parsing descriptors from their string form
pub trait ParseDescriptor: Sized {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error>;

    fn parse(source: &str) -> Result<Self, Error> {
        let mut iter = source.chars().peekable();
        let parsed = Self::parse_from(&mut iter)?;
        match iter.next() {
            None => Ok(parsed),
            Some(c) => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Expected end of descriptor but got '{}'", c),
            )),
        }
    }
}

/// Primitive types
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.3.2-200>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

/// Type of a field, in descriptor terms
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.3.2>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Base(BaseType),
    Object(ClassName),
    Array(Box<FieldType>),
}

/// Signature of a method, in descriptor terms
///
/// A return type of `None` means `void`.
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.3.3>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>,
}

impl FieldType {
    pub const STRING: FieldType = FieldType::Object(ClassName::STRING);
    pub const FILE: FieldType = FieldType::Object(ClassName::FILE);

    pub fn object(class: ClassName) -> FieldType {
        FieldType::Object(class)
    }

    pub fn array(element: FieldType) -> FieldType {
        FieldType::Array(Box::new(element))
    }

    /// The class behind an object type (not an array or primitive)
    pub fn object_class(&self) -> Option<&ClassName> {
        match self {
            FieldType::Object(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_object_of(&self, class: &ClassName) -> bool {
        self.object_class() == Some(class)
    }
}

impl MethodDescriptor {
    pub fn new(parameters: Vec<FieldType>, return_type: Option<FieldType>) -> MethodDescriptor {
        MethodDescriptor {
            parameters,
            return_type,
        }
    }

    /// `([Ljava/lang/String;)V`, the shape every launcher looks for
    pub fn main() -> MethodDescriptor {
        MethodDescriptor {
            parameters: vec![FieldType::array(FieldType::STRING)],
            return_type: None,
        }
    }

    pub fn first_parameter_is(&self, expected: &FieldType) -> bool {
        self.parameters.first() == Some(expected)
    }

    pub fn returns(&self, expected: &FieldType) -> bool {
        self.return_type.as_ref() == Some(expected)
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base) => base.render_to(write_to),
            FieldType::Object(class) => {
                write_to.push('L');
                write_to.push_str(class.as_str());
                write_to.push(';');
            }
            FieldType::Array(element) => {
                write_to.push('[');
                element.render_to(write_to);
            }
        }
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        }
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        let typ = match source.peek() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("Expected primitive type but got {:?}", other),
                ))
            }
        };
        let _ = source.next();
        Ok(typ)
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        match source.peek() {
            Some('L') => {
                let _ = source.next();
                let mut class = String::new();
                loop {
                    match source.next() {
                        Some(';') => break,
                        Some(c) => class.push(c),
                        None => {
                            return Err(Error::new(
                                ErrorKind::InvalidInput,
                                "Unterminated object type in descriptor",
                            ))
                        }
                    }
                }
                let class = ClassName::from_string(class)
                    .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg))?;
                Ok(FieldType::Object(class))
            }
            Some('[') => {
                let _ = source.next();
                let element = FieldType::parse_from(source)?;
                Ok(FieldType::Array(Box::new(element)))
            }
            _ => Ok(FieldType::Base(BaseType::parse_from(source)?)),
        }
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        match source.next() {
            Some('(') => (),
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("Expected '(' but got {:?}", other),
                ))
            }
        }
        let mut parameters = vec![];
        while source.peek() != Some(&')') {
            if source.peek().is_none() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Unterminated parameter list in descriptor",
                ));
            }
            parameters.push(FieldType::parse_from(source)?);
        }
        let _ = source.next();
        let return_type = if source.peek() == Some(&'V') {
            let _ = source.next();
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

impl Serialize for FieldType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.render().serialize(writer)
    }
}

impl Deserialize for FieldType {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        let raw = String::deserialize(reader)?;
        FieldType::parse(&raw).map_err(|err| Error::new(ErrorKind::InvalidData, err))
    }
}

impl Serialize for MethodDescriptor {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.render().serialize(writer)
    }
}

impl Deserialize for MethodDescriptor {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        let raw = String::deserialize(reader)?;
        MethodDescriptor::parse(&raw).map_err(|err| Error::new(ErrorKind::InvalidData, err))
    }
}
