use super::{Deserialize, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::Cow;
use std::fmt::{Debug, Error as FmtError, Formatter};
use std::io;

/// Names of classes and interfaces, in internal (slash separated) form
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ClassName(Cow<'static, str>);

/// Names of methods and fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct MemberName(Cow<'static, str>);

pub trait Name: Sized {
    /// Check if a string would be a valid name of this kind
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extract the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extract the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for MemberName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(String::from("Member name is empty"))
        } else if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!("Member name '{}' contains an illegal character", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(MemberName(Cow::Owned(name)))
    }
}

impl Name for ClassName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(String::from("Class name is empty"))
        } else {
            name.split('/').map(MemberName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(ClassName(Cow::Owned(name)))
    }
}

impl ClassName {
    pub const OBJECT: ClassName = ClassName::from_static("java/lang/Object");
    pub const STRING: ClassName = ClassName::from_static("java/lang/String");
    pub const THREAD: ClassName = ClassName::from_static("java/lang/Thread");
    pub const FILE: ClassName = ClassName::from_static("java/io/File");
    pub const URL_CLASS_LOADER: ClassName = ClassName::from_static("java/net/URLClassLoader");

    /// Make a name from a static string, which must already be in valid
    /// internal form
    pub const fn from_static(name: &'static str) -> ClassName {
        ClassName(Cow::Borrowed(name))
    }

    /// Parse a dotted (source style) name, eg. `net.minecraft.client.Minecraft`
    pub fn from_dotted(name: &str) -> Result<ClassName, String> {
        Self::from_string(name.replace('.', "/"))
    }

    /// Render back into dotted form
    pub fn as_dotted(&self) -> String {
        self.as_str().replace('/', ".")
    }

    /// Does this class belong to the Java platform?
    pub fn is_platform(&self) -> bool {
        self.as_str().starts_with("java/")
    }

    /// Does the name carry any package at all?
    pub fn has_package(&self) -> bool {
        self.as_str().contains('/')
    }

    /// Final segment of the name
    pub fn unqualified(&self) -> &str {
        match self.as_str().rsplit_once('/') {
            Some((_, tail)) => tail,
            None => self.as_str(),
        }
    }
}

impl MemberName {
    pub const INIT: MemberName = MemberName::from_static("<init>");
    pub const CLINIT: MemberName = MemberName::from_static("<clinit>");
    pub const MAIN: MemberName = MemberName::from_static("main");
    pub const CURRENT_THREAD: MemberName = MemberName::from_static("currentThread");

    /// Make a name from a static string, which must already be valid
    pub const fn from_static(name: &'static str) -> MemberName {
        MemberName(Cow::Borrowed(name))
    }
}

impl Debug for ClassName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for MemberName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Serialize for ClassName {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = self.as_str().as_bytes();
        (bytes.len() as u16).serialize(writer)?;
        writer.write_all(bytes)
    }
}

impl Deserialize for ClassName {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> io::Result<Self> {
        let raw = String::deserialize(reader)?;
        ClassName::from_string(raw)
            .map_err(|msg| io::Error::new(io::ErrorKind::InvalidData, msg))
    }
}

impl Serialize for MemberName {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = self.as_str().as_bytes();
        (bytes.len() as u16).serialize(writer)?;
        writer.write_all(bytes)
    }
}

impl Deserialize for MemberName {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> io::Result<Self> {
        let raw = String::deserialize(reader)?;
        MemberName::from_string(raw)
            .map_err(|msg| io::Error::new(io::ErrorKind::InvalidData, msg))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(ClassName::from_dotted("net.minecraft.client.Minecraft").is_ok());
        assert!(ClassName::from_string(String::from("pkg/Main")).is_ok());
        assert!(MemberName::from_string(String::from("<init>")).is_ok());
        assert!(MemberName::from_string(String::from("run")).is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(ClassName::from_string(String::from("")).is_err());
        assert!(ClassName::from_string(String::from("a//b")).is_err());
        assert!(MemberName::from_string(String::from("a/b")).is_err());
        assert!(MemberName::from_string(String::from("a;b")).is_err());
    }

    #[test]
    fn dotted_round_trip() {
        let name = ClassName::from_dotted("com.mojang.blaze3d.Window").unwrap();
        assert_eq!(name.as_str(), "com/mojang/blaze3d/Window");
        assert_eq!(name.as_dotted(), "com.mojang.blaze3d.Window");
    }

    #[test]
    fn platform_and_package_queries() {
        assert!(ClassName::OBJECT.is_platform());
        assert!(!ClassName::from_static("net/minecraft/client/Minecraft").is_platform());
        assert!(!ClassName::from_static("ave").has_package());
        assert_eq!(
            ClassName::from_static("net/minecraft/client/Minecraft").unqualified(),
            "Minecraft"
        );
    }
}
