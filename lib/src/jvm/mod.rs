//! Class bodies, descriptors, and mutable instruction streams
//!
//! ### Simple example
//!
//! Consider the following simple Java class:
//!
//! ```java,ignore,no_run
//! public class Game {
//!     private final File runDir;
//!
//!     public Game(File runDir) {
//!         this.runDir = runDir;
//!     }
//! }
//! ```
//!
//! Building its body, splicing a call in front of the constructor's return,
//! and encoding the result can be done as follows:
//!
//! ```
//! use hookjar::jvm::*;
//!
//! let game = ClassName::from_static("pkg/Game");
//! let run_dir = FieldRef::new(
//!     game.clone(),
//!     MemberName::from_static("runDir"),
//!     FieldType::FILE,
//! );
//!
//! let mut body = ClassBody::new(
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//!     game.clone(),
//!     ClassName::OBJECT,
//! );
//! body.fields.push(Field {
//!     access: FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL,
//!     name: MemberName::from_static("runDir"),
//!     descriptor: FieldType::FILE,
//! });
//! body.methods.push(Method {
//!     access: MethodAccessFlags::PUBLIC,
//!     name: MemberName::INIT,
//!     descriptor: MethodDescriptor::new(vec![FieldType::FILE], None),
//!     code: InstructionStream::from_insns(vec![
//!         Insn::LoadLocal(0),
//!         Insn::Invoke(
//!             InvokeKind::Special,
//!             MethodRef::new(ClassName::OBJECT, MemberName::INIT, MethodDescriptor::new(vec![], None)),
//!         ),
//!         Insn::LoadLocal(0),
//!         Insn::LoadLocal(1),
//!         Insn::PutField(run_dir.clone()),
//!         Insn::Return { has_value: false },
//!     ]),
//! });
//!
//! // Splice a hook call in front of the return
//! let mut cursor = body.methods[0].code.cursor();
//! cursor.move_before_kind(InsnKind::Return).unwrap();
//! cursor.insert(Insn::LoadLocal(0));
//! cursor.insert(Insn::GetField(run_dir));
//! cursor.insert(Insn::Invoke(
//!     InvokeKind::Static,
//!     MethodRef::new(
//!         ClassName::from_static("pkg/Hooks"),
//!         MemberName::from_static("onBoot"),
//!         MethodDescriptor::new(vec![FieldType::FILE], None),
//!     ),
//! ));
//!
//! // Dirty bodies re-encode into fresh bytes
//! assert!(body.is_dirty());
//! let bytes: Vec<u8> = body.encode().unwrap();
//! assert_eq!(ClassBody::decode(&bytes).unwrap(), body);
//! ```

mod access_flags;
mod binary_format;
mod class;
mod descriptors;
mod insn;
mod names;
mod remap;
mod stream;

pub use access_flags::*;
pub use binary_format::*;
pub use class::*;
pub use descriptors::*;
pub use insn::*;
pub use names::*;
pub use remap::*;
pub use stream::*;
