use crate::jvm::ClassName;

/// What a heuristic stage needed and could not find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingAnchor {
    /// Declared entry class absent from the class source
    EntryClass(ClassName),
    /// No `public static main([Ljava/lang/String;)V` on the entry class
    MainMethod(ClassName),
    /// No construction-style call naming a game type
    GameType(ClassName),
    /// Resolved game class absent from the class source
    GameClass(ClassName),
    /// No constructor on the game class
    GameConstructor(ClassName),
    /// No run-directory store in a constructor that takes the directory
    DirectoryField(ClassName),
    /// A committed placement scan ran off the end of a method body
    InsnPosition {
        class: ClassName,
        looking_for: &'static str,
    },
}

/// Fatal failures of the patching pass
#[derive(Debug)]
pub enum PatchError {
    /// A required structural anchor does not exist
    AnchorNotFound(MissingAnchor),
    /// The binary matches none of the known heuristic branches
    UnsupportedShape { class: ClassName, detail: String },
    /// A patched body failed to re-encode
    SerializationFailure(std::io::Error),
    /// The class source itself failed (I/O or undecodable bytes)
    Source(std::io::Error),
}

impl From<MissingAnchor> for PatchError {
    fn from(anchor: MissingAnchor) -> PatchError {
        PatchError::AnchorNotFound(anchor)
    }
}

impl From<std::io::Error> for PatchError {
    fn from(err: std::io::Error) -> PatchError {
        PatchError::Source(err)
    }
}
