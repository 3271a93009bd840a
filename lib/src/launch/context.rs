use super::WidenTargets;
use crate::jvm::{ClassBody, ClassName, FieldType, MemberName, MethodDescriptor, MethodRef, Name};
use std::collections::HashMap;
use std::io::Result as IoResult;

/// Where encoded class bodies come from
///
/// Implementations are shared across the patching pass and concurrent class
/// materialization, hence the bounds.
pub trait ClassSource: Send + Sync {
    /// Raw encoded bytes for a class, `None` when the source has no such
    /// class
    fn class_bytes(&self, name: &ClassName) -> IoResult<Option<Vec<u8>>>;
}

/// In-memory class source
#[derive(Debug, Default)]
pub struct MapClassSource {
    classes: HashMap<ClassName, Vec<u8>>,
}

impl MapClassSource {
    pub fn new() -> MapClassSource {
        MapClassSource::default()
    }

    pub fn insert_bytes(&mut self, name: ClassName, bytes: Vec<u8>) {
        self.classes.insert(name, bytes);
    }

    /// Encode and add a body under its own name
    pub fn insert_body(&mut self, body: &ClassBody) -> IoResult<()> {
        let bytes = body.encode()?;
        self.classes.insert(body.name.clone(), bytes);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &ClassName> {
        self.classes.keys()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassSource for MapClassSource {
    fn class_bytes(&self, name: &ClassName) -> IoResult<Option<Vec<u8>>> {
        Ok(self.classes.get(name).cloned())
    }
}

/// Which half of the game this process hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Client,
    Server,
}

/// A game version string with its parsed numeric prefix
///
/// Everything after the leading dotted run of numbers (`-pre2`, `-rc1`,
/// snapshot suffixes) is kept in `raw` but ignored for comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameVersion {
    raw: String,
    segments: Vec<u32>,
}

impl GameVersion {
    pub fn new(raw: impl Into<String>) -> GameVersion {
        let raw = raw.into();
        let segments = parse_segments(&raw);
        GameVersion { raw, segments }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u32] {
        &self.segments
    }
}

fn parse_segments(raw: &str) -> Vec<u32> {
    let mut segments = vec![];
    for part in raw.split('.') {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(n) => segments.push(n),
            Err(_) => break,
        }
        if digits.len() != part.len() {
            break;
        }
    }
    segments
}

/// Opaque boolean gate over a [`GameVersion`]
///
/// The supplied closure is all there is; the engine never looks inside.
pub struct VersionPredicate(Box<dyn Fn(&GameVersion) -> bool + Send + Sync>);

impl VersionPredicate {
    pub fn custom(pred: impl Fn(&GameVersion) -> bool + Send + Sync + 'static) -> VersionPredicate {
        VersionPredicate(Box::new(pred))
    }

    /// Segment-wise "at least" comparison, missing segments count as zero
    pub fn at_least(threshold: &str) -> VersionPredicate {
        let min = parse_segments(threshold);
        VersionPredicate::custom(move |version| {
            let len = min.len().max(version.segments().len());
            for i in 0..len {
                let have = version.segments().get(i).copied().unwrap_or(0);
                let want = min.get(i).copied().unwrap_or(0);
                if have != want {
                    return have > want;
                }
            }
            true
        })
    }

    pub fn test(&self, version: &GameVersion) -> bool {
        (self.0)(version)
    }
}

impl std::fmt::Debug for VersionPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VersionPredicate(..)")
    }
}

/// Everything the patch rules and the materializer are allowed to consult
///
/// One value of this type replaces what the original launcher kept in
/// scattered global state. Fields are plain and public; construct with
/// [`LaunchContext::new`] and adjust what the deployment needs.
pub struct LaunchContext {
    pub source: Box<dyn ClassSource>,
    pub environment: Environment,
    /// Declared entry class, internal form
    pub entry_class: ClassName,
    pub version: GameVersion,
    /// Placement gate: hook before the render-thread marker on versions
    /// where the startup sequence moved (1.19.4 and later)
    pub thread_marker_gate: VersionPredicate,
    /// Internal-form prefixes that count as game code
    pub game_namespaces: Vec<String>,
    /// What a "run directory" field looks like
    pub directory_type: FieldType,
    /// Startup log literals that mark the boot method (prefix match)
    pub marker_prefixes: Vec<String>,
    /// Exact startup log literals worth the highest anchor quality
    pub marker_exact: Vec<String>,
    pub start_hook: MethodRef,
    pub applet_dir_hook: MethodRef,
    pub branding_hook: MethodRef,
    /// Brand-reporting methods to re-route, `(owner, method name)`
    pub branding_targets: Vec<(ClassName, MemberName)>,
    /// Static call to re-home away from the native dialog library
    pub dialog_target_owner: ClassName,
    pub dialog_target_method: MemberName,
    /// Replacement owner; method name and descriptor stay as found
    pub dialog_replacement_owner: ClassName,
    pub widen_targets: WidenTargets,
    /// Active compatibility layer needs package-private game internals
    /// opened up
    pub package_access_fix: bool,
}

impl LaunchContext {
    pub fn new(
        source: Box<dyn ClassSource>,
        entry_class: ClassName,
        version: GameVersion,
    ) -> LaunchContext {
        let hooks = ClassName::from_static("hookjar/runtime/Hooks");
        let object = FieldType::object(ClassName::OBJECT);

        LaunchContext {
            source,
            environment: Environment::Client,
            entry_class,
            version,
            thread_marker_gate: VersionPredicate::at_least("1.19.4"),
            game_namespaces: vec![String::from("net/minecraft/"), String::from("com/mojang/")],
            directory_type: FieldType::FILE,
            marker_prefixes: vec![
                String::from("LWJGL Version: "),
                String::from("Backend library: "),
            ],
            marker_exact: vec![
                String::from("LWJGL Version: "),
                String::from("LWJGL Version: {}"),
                String::from("Backend library: {}"),
            ],
            start_hook: MethodRef::new(
                hooks.clone(),
                MemberName::from_static("startGame"),
                MethodDescriptor::new(vec![FieldType::FILE, object], None),
            ),
            applet_dir_hook: MethodRef::new(
                ClassName::from_static("hookjar/applet/AppletLauncher"),
                MemberName::from_static("hookGameDir"),
                MethodDescriptor::new(vec![FieldType::FILE], Some(FieldType::FILE)),
            ),
            branding_hook: MethodRef::new(
                hooks,
                MemberName::from_static("insertBranding"),
                MethodDescriptor::new(vec![FieldType::STRING], Some(FieldType::STRING)),
            ),
            branding_targets: vec![
                (
                    ClassName::from_static("net/minecraft/client/ClientBrandRetriever"),
                    MemberName::from_static("getClientModName"),
                ),
                (
                    ClassName::from_static("net/minecraft/server/MinecraftServer"),
                    MemberName::from_static("getServerModName"),
                ),
            ],
            dialog_target_owner: ClassName::from_static("org/lwjgl/util/tinyfd/TinyFileDialogs"),
            dialog_target_method: MemberName::from_static("tinyfd_messageBox"),
            dialog_replacement_owner: ClassName::from_static("hookjar/runtime/SafeDialogs"),
            widen_targets: WidenTargets::empty(),
            package_access_fix: false,
        }
    }

    /// Game-namespace test for patch gating (prefix list only)
    pub fn is_game_entry(&self, name: &ClassName) -> bool {
        self.game_namespaces
            .iter()
            .any(|prefix| name.as_str().starts_with(prefix.as_str()))
    }

    /// Game-namespace test for secondary rewrites: the prefix list, plus
    /// package-less names (obfuscated flat classes)
    pub fn is_game_class(&self, name: &ClassName) -> bool {
        self.is_game_entry(name) || !name.has_package()
    }

    /// Applet-era entry classes announce themselves by name
    pub fn applet_entry(&self) -> bool {
        self.entry_class.unqualified().contains("Applet")
    }
}
