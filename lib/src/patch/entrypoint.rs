use super::{MissingAnchor, PatchError, PatchView};
use crate::jvm::{
    ClassBody, ClassName, ConstOperand, FieldRef, FieldType, Insn, InsnId, InsnKind,
    InvokeKind, MemberName, Method, MethodDescriptor, MethodRef,
};
use crate::launch::LaunchContext;
use log::{debug, warn};

/// A `main` this short that does nothing but call a sibling is treated as a
/// forwarder
const FORWARDER_INSN_LIMIT: usize = 10;

/// Calls to step over after the startup log marker before hooking; stable
/// across every known layout that logs the marker
const MARKER_CALL_SKIP: usize = 4;

/// Locates the real startup path inside the game binary and injects the
/// loader start hook at a version-appropriate position
///
/// The engine runs three resolution heuristics in priority order (single
/// heuristic field, forwarded `main`, first construction-style call), picks
/// the best anchor method by quality, and then splices the hook sequence at
/// a placement chosen by the rules in [`choose_placement`].
pub struct EntrypointPatch;

/// Anchor method candidate that won the quality contest
struct AnchorChoice {
    index: usize,
    quality: u8,
    /// `Thread.currentThread()` call inside the winning method
    thread_marker: Option<InsnId>,
    /// Exact-match startup log constant inside the winning method
    string_marker: Option<InsnId>,
}

/// Where the hook lands relative to the anchor method's instructions
enum Placement {
    BeforeThreadMarker(InsnId),
    AfterMarkerCalls(InsnId),
    AtScanPosition,
}

/// Placement rules, first match wins:
///
///   1. version gate passes and the thread marker exists: right before the
///      `Thread.currentThread()` call
///   2. an exact startup log marker exists: after the marker, stepping over
///      [`MARKER_CALL_SKIP`] calls
///   3. otherwise: wherever the constructor scan left the cursor
fn choose_placement(cx: &LaunchContext, anchor: &AnchorChoice) -> Placement {
    if cx.thread_marker_gate.test(&cx.version) {
        if let Some(id) = anchor.thread_marker {
            return Placement::BeforeThreadMarker(id);
        }
    }
    if let Some(id) = anchor.string_marker {
        return Placement::AfterMarkerCalls(id);
    }
    Placement::AtScanPosition
}

impl EntrypointPatch {
    pub fn new() -> EntrypointPatch {
        EntrypointPatch
    }

    pub fn apply(&self, cx: &LaunchContext, view: &mut PatchView) -> Result<(), PatchError> {
        let entry = cx.entry_class.clone();
        if !cx.is_game_entry(&entry) {
            return Ok(());
        }
        let is_applet = cx.applet_entry();

        let (game_type, ctor_takes_dir) = resolve_game_type(cx, view, &entry)?;
        debug!("found game constructor: {:?} -> {:?}", entry, game_type);

        {
            let game_body = view
                .class(&game_type)?
                .ok_or_else(|| MissingAnchor::GameClass(game_type.clone()))?;

            let (ctor_index, anchor) = select_anchor(cx, game_body, is_applet)?;
            if is_applet {
                patch_applet_route(cx, game_body, ctor_index, &anchor)?;
            } else {
                patch_standard_route(cx, game_body, ctor_index, &anchor, ctor_takes_dir)?;
            }
        }

        debug!("patched start hook into {:?}", game_type);
        view.emit(&game_type);
        if is_applet {
            view.record_applet_entry(entry);
        }
        Ok(())
    }
}

/// Steps 1 through 3: name the game type, and remember whether the
/// construction call takes a run directory
fn resolve_game_type(
    cx: &LaunchContext,
    view: &mut PatchView,
    entry: &ClassName,
) -> Result<(ClassName, bool), PatchError> {
    let entry_body = view
        .class(entry)?
        .ok_or_else(|| MissingAnchor::EntryClass(entry.clone()))?;

    // Single heuristic field: exactly one non-static field of a
    // non-platform object type names the game directly
    let mut field_count = 0;
    let mut field_type = None;
    for field in &entry_body.fields {
        if field.is_static() {
            continue;
        }
        if let Some(class) = field.descriptor.object_class() {
            if !class.is_platform() {
                field_count += 1;
                field_type = Some(class.clone());
            }
        }
    }
    if field_count == 1 {
        if let Some(game) = field_type {
            return Ok((game, true));
        }
    }

    debug!("{:?} has no heuristic field, scanning main", entry);
    let main_index = entry_body
        .method_position(|m| {
            m.name == MemberName::MAIN && m.descriptor == MethodDescriptor::main() && m.is_public_static()
        })
        .ok_or_else(|| MissingAnchor::MainMethod(entry.clone()))?;

    // A tiny main that only forwards to a sibling is followed into the
    // sibling
    let scan_index = forwarded_target(entry_body, main_index).unwrap_or(main_index);
    if scan_index != main_index {
        debug!("main of {:?} is a forwarder", entry);
    }

    // First construction-style call whose owner is not platform code
    let scan_method = &entry_body.methods[scan_index];
    for (_, insn) in scan_method.code.iter() {
        if let Insn::Invoke(kind, target) = insn {
            if matches!(kind, InvokeKind::Special | InvokeKind::Virtual)
                && !target.owner.is_platform()
            {
                let takes_dir = target.descriptor.first_parameter_is(&cx.directory_type);
                return Ok((target.owner.clone(), takes_dir));
            }
        }
    }
    Err(MissingAnchor::GameType(entry.clone()).into())
}

/// Index of the method a forwarding `main` calls, when `main` qualifies as
/// a forwarder
fn forwarded_target(body: &ClassBody, main_index: usize) -> Option<usize> {
    let main = &body.methods[main_index];
    if main.code.len() >= FORWARDER_INSN_LIMIT {
        return None;
    }

    let mut forward: Option<&MethodRef> = None;
    for (_, insn) in main.code.iter() {
        match insn {
            Insn::Invoke(_, target) if forward.is_none() && target.owner == body.name => {
                forward = Some(target);
            }
            // Argument setup around the forward call is fine
            Insn::LoadLocal(_) | Insn::Const(_) | Insn::Label(_) | Insn::Return { .. } => {}
            Insn::Other(opcode) if *opcode <= 0x19 => {}
            // A second call, or any instruction doing real work, means main
            // is not a plain forwarder
            _ => return None,
        }
    }

    let target = forward?;
    body.method_position(|m| m.name == target.name && m.descriptor == target.descriptor)
}

/// Step 4: pick the anchor method by quality
///
/// The constructor scores 1. Away from the applet route, any method whose
/// body logs a known startup marker scores 2 (prefix match) or 3 (exact
/// match); exact matches also pin the marker instruction, and a
/// `Thread.currentThread()` call seen in the same method is kept as the
/// secondary marker. Highest quality wins, earliest wins ties.
fn select_anchor(
    cx: &LaunchContext,
    body: &ClassBody,
    is_applet: bool,
) -> Result<(Option<usize>, AnchorChoice), PatchError> {
    let current_thread = MethodRef::new(
        ClassName::THREAD,
        MemberName::CURRENT_THREAD,
        MethodDescriptor::new(vec![], Some(FieldType::object(ClassName::THREAD))),
    );

    let mut ctor_index = None;
    let mut best: Option<AnchorChoice> = None;
    for (index, method) in body.methods.iter().enumerate() {
        if method.is_constructor() && ctor_index.is_none() {
            ctor_index = Some(index);
        }

        let base = if method.is_constructor() { 1 } else { 0 };
        let (marker_quality, thread_marker, string_marker) = if is_applet {
            (0, None, None)
        } else {
            scan_markers(cx, method, &current_thread)
        };
        let quality = base.max(marker_quality);

        if quality > 0 && best.as_ref().map_or(true, |b| quality > b.quality) {
            best = Some(AnchorChoice {
                index,
                quality,
                thread_marker,
                string_marker,
            });
        }
    }

    match best {
        Some(anchor) => {
            debug!(
                "anchor method {:?} of {:?} won with quality {}",
                body.methods[anchor.index].name, body.name, anchor.quality
            );
            Ok((ctor_index, anchor))
        }
        None => Err(MissingAnchor::GameConstructor(body.name.clone()).into()),
    }
}

/// Quality contribution of one method body, with any markers it pins
fn scan_markers(
    cx: &LaunchContext,
    method: &Method,
    current_thread: &MethodRef,
) -> (u8, Option<InsnId>, Option<InsnId>) {
    let mut thread_marker = None;
    for (id, insn) in method.code.iter() {
        match insn {
            Insn::Invoke(InvokeKind::Static, target) if target == current_thread => {
                thread_marker = Some(id);
            }
            Insn::Const(ConstOperand::Str(text)) => {
                if cx.marker_exact.iter().any(|exact| exact == text) {
                    return (3, thread_marker, Some(id));
                }
                if cx
                    .marker_prefixes
                    .iter()
                    .any(|prefix| text.starts_with(prefix.as_str()))
                {
                    return (2, thread_marker, None);
                }
            }
            _ => {}
        }
    }
    (0, None, None)
}

/// The four-instruction hook call: self and the freshly stored run
/// directory go to the loader
fn start_hook_sequence(cx: &LaunchContext, dir_field: FieldRef) -> [Insn; 4] {
    [
        Insn::LoadLocal(0),
        Insn::GetField(dir_field),
        Insn::LoadLocal(0),
        Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
    ]
}

/// Step 5, standard route
fn patch_standard_route(
    cx: &LaunchContext,
    body: &mut ClassBody,
    ctor_index: Option<usize>,
    anchor: &AnchorChoice,
    ctor_takes_dir: bool,
) -> Result<(), PatchError> {
    let class_name = body.name.clone();
    let ctor_index =
        ctor_index.ok_or_else(|| MissingAnchor::GameConstructor(class_name.clone()))?;

    // First store of the run directory inside the constructor
    let store = body.methods[ctor_index]
        .code
        .iter()
        .find_map(|(id, insn)| match insn {
            Insn::PutField(field) if field.descriptor == cx.directory_type => {
                Some((id, field.clone()))
            }
            _ => None,
        });

    match store {
        Some((store_id, dir_field)) => {
            let anchor_is_ctor = anchor.index == ctor_index;
            let method = &mut body.methods[anchor.index];
            let mut cursor = method.code.cursor();
            if anchor_is_ctor {
                // Continue scanning from just past the store
                cursor
                    .move_before_id(store_id)
                    .map_err(|_| MissingAnchor::InsnPosition {
                        class: class_name.clone(),
                        looking_for: "run directory store",
                    })?;
                cursor.advance();
            }

            match choose_placement(cx, anchor) {
                Placement::BeforeThreadMarker(id) => {
                    cursor
                        .move_before_id(id)
                        .map_err(|_| MissingAnchor::InsnPosition {
                            class: class_name.clone(),
                            looking_for: "render thread marker",
                        })?;
                }
                Placement::AfterMarkerCalls(id) => {
                    cursor
                        .move_before_id(id)
                        .map_err(|_| MissingAnchor::InsnPosition {
                            class: class_name.clone(),
                            looking_for: "startup log marker",
                        })?;
                    for _ in 0..MARKER_CALL_SKIP {
                        cursor.move_after_kind(InsnKind::Invoke).map_err(|_| {
                            MissingAnchor::InsnPosition {
                                class: class_name.clone(),
                                looking_for: "calls after the startup log marker",
                            }
                        })?;
                    }
                }
                Placement::AtScanPosition => {}
            }

            cursor.insert_all(start_hook_sequence(cx, dir_field));
            Ok(())
        }
        None if !ctor_takes_dir => {
            // Very old layouts never store the directory; hook at the tail
            // with no directory handle
            warn!(
                "game constructor of {:?} takes no run directory, tail patching",
                class_name
            );
            let method = &mut body.methods[anchor.index];
            let mut cursor = method.code.cursor();
            cursor
                .move_before_final_return()
                .map_err(|_| MissingAnchor::InsnPosition {
                    class: class_name.clone(),
                    looking_for: "return",
                })?;
            cursor.insert_all([
                Insn::Const(ConstOperand::Null),
                Insn::LoadLocal(0),
                Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
            ]);
            Ok(())
        }
        None => Err(MissingAnchor::DirectoryField(class_name).into()),
    }
}

/// Step 5, applet route
fn patch_applet_route(
    cx: &LaunchContext,
    body: &mut ClassBody,
    ctor_index: Option<usize>,
    anchor: &AnchorChoice,
) -> Result<(), PatchError> {
    let class_name = body.name.clone();
    let dir_field = body
        .find_field(|f| f.is_static() && f.descriptor == cx.directory_type)
        .map(|f| f.name.clone());

    match dir_field {
        None => {
            warn!(
                "applet game class {:?} has no static run directory, tail patching",
                class_name
            );
            let anchor_is_ctor = Some(anchor.index) == ctor_index;
            let method = &mut body.methods[anchor.index];
            let mut cursor = method.code.cursor();
            if anchor_is_ctor {
                cursor
                    .move_before_final_return()
                    .map_err(|_| MissingAnchor::InsnPosition {
                        class: class_name.clone(),
                        looking_for: "return",
                    })?;
            }
            cursor.insert_all([
                Insn::Const(ConstOperand::Null),
                Insn::Invoke(InvokeKind::Static, cx.applet_dir_hook.clone()),
                Insn::LoadLocal(0),
                Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
            ]);
            Ok(())
        }
        Some(field_name) => {
            let ctor_index =
                ctor_index.ok_or_else(|| MissingAnchor::GameConstructor(class_name.clone()))?;
            let dir_ref = FieldRef::new(
                class_name.clone(),
                field_name,
                cx.directory_type.clone(),
            );

            // Re-route the static directory through the applet hook, right
            // after the base initializer call
            {
                let ctor = &mut body.methods[ctor_index];
                let mut cursor = ctor.code.cursor();
                cursor
                    .move_after(|insn| {
                        matches!(
                            insn,
                            Insn::Invoke(InvokeKind::Special, target) if target.name == MemberName::INIT
                        )
                    })
                    .map_err(|_| MissingAnchor::InsnPosition {
                        class: class_name.clone(),
                        looking_for: "base initializer call",
                    })?;
                cursor.insert_all([
                    Insn::GetStatic(dir_ref.clone()),
                    Insn::Invoke(InvokeKind::Static, cx.applet_dir_hook.clone()),
                    Insn::PutStatic(dir_ref.clone()),
                ]);
            }

            let anchor_is_ctor = anchor.index == ctor_index;
            let method = &mut body.methods[anchor.index];
            let mut cursor = method.code.cursor();
            if anchor_is_ctor {
                cursor
                    .move_before_final_return()
                    .map_err(|_| MissingAnchor::InsnPosition {
                        class: class_name.clone(),
                        looking_for: "return",
                    })?;
            }
            cursor.insert_all([
                Insn::GetStatic(dir_ref),
                Insn::LoadLocal(0),
                Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
            ]);
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{
        ClassAccessFlags, Field, FieldAccessFlags, InstructionStream, MethodAccessFlags,
    };
    use crate::launch::{GameVersion, LaunchContext, MapClassSource};

    fn object_init() -> Insn {
        Insn::Invoke(
            InvokeKind::Special,
            MethodRef::new(
                ClassName::OBJECT,
                MemberName::INIT,
                MethodDescriptor::new(vec![], None),
            ),
        )
    }

    fn noise_call(name: &'static str) -> Insn {
        Insn::Invoke(
            InvokeKind::Static,
            MethodRef::new(
                ClassName::from_static("net/minecraft/client/Util"),
                MemberName::from_static(name),
                MethodDescriptor::new(vec![], None),
            ),
        )
    }

    fn method(
        access: MethodAccessFlags,
        name: MemberName,
        descriptor: MethodDescriptor,
        insns: Vec<Insn>,
    ) -> Method {
        Method {
            access,
            name,
            descriptor,
            code: InstructionStream::from_insns(insns),
        }
    }

    /// Game class whose constructor takes and stores a run directory
    fn game_class(name: &'static str) -> ClassBody {
        let class = ClassName::from_static(name);
        let mut body = ClassBody::new(
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            class.clone(),
            ClassName::OBJECT,
        );
        body.fields.push(Field {
            access: FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL,
            name: MemberName::from_static("runDir"),
            descriptor: FieldType::FILE,
        });
        body.methods.push(method(
            MethodAccessFlags::PUBLIC,
            MemberName::INIT,
            MethodDescriptor::new(vec![FieldType::FILE], None),
            vec![
                Insn::LoadLocal(0),
                object_init(),
                Insn::LoadLocal(0),
                Insn::LoadLocal(1),
                Insn::PutField(FieldRef::new(
                    class,
                    MemberName::from_static("runDir"),
                    FieldType::FILE,
                )),
                Insn::Return { has_value: false },
            ],
        ));
        body
    }

    fn context_over(bodies: &[&ClassBody], entry: &str, version: &str) -> LaunchContext {
        let mut source = MapClassSource::new();
        for body in bodies {
            source.insert_body(body).expect("test body encodes");
        }
        let mut cx = LaunchContext::new(
            Box::new(source),
            ClassName::from_dotted(entry).expect("valid entry"),
            GameVersion::new(version),
        );
        cx.game_namespaces.push(String::from("pkg/"));
        cx
    }

    fn patched(view: &PatchView, name: &'static str) -> Vec<Vec<Insn>> {
        view.loaded[&ClassName::from_static(name)]
            .methods
            .iter()
            .map(|m| m.code.to_vec())
            .collect()
    }

    fn contains_sequence(insns: &[Insn], needle: &[Insn]) -> bool {
        insns.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn single_heuristic_field_names_the_game() {
        let game = game_class("net/minecraft/client/Minecraft");
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            ClassName::from_static("net/minecraft/client/main/Main"),
            ClassName::OBJECT,
        );
        entry.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("game"),
            descriptor: FieldType::object(ClassName::from_static("net/minecraft/client/Minecraft")),
        });

        let cx = context_over(&[&entry, &game], "net.minecraft.client.main.Main", "1.16.5");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("patches");

        assert_eq!(
            view.emitted,
            vec![ClassName::from_static("net/minecraft/client/Minecraft")]
        );
        let methods = patched(&view, "net/minecraft/client/Minecraft");
        let hook = start_hook_sequence(
            &cx,
            FieldRef::new(
                ClassName::from_static("net/minecraft/client/Minecraft"),
                MemberName::from_static("runDir"),
                FieldType::FILE,
            ),
        );
        assert!(
            contains_sequence(&methods[0], &hook),
            "constructor carries the hook: {:?}",
            methods[0]
        );
        assert_eq!(
            view.loaded[&ClassName::from_static("net/minecraft/client/Minecraft")]
                .fields
                .len(),
            1,
            "field count is preserved"
        );
    }

    #[test]
    fn forwarding_main_is_followed() {
        let game = game_class("net/minecraft/client/Minecraft");
        let entry_name = ClassName::from_static("net/minecraft/client/main/Main");
        let mut entry = ClassBody::new(ClassAccessFlags::PUBLIC, entry_name.clone(), ClassName::OBJECT);
        entry.methods.push(method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            MemberName::MAIN,
            MethodDescriptor::main(),
            vec![
                Insn::Label(crate::jvm::LabelId(0)),
                Insn::LoadLocal(0),
                Insn::Invoke(
                    InvokeKind::Static,
                    MethodRef::new(
                        entry_name.clone(),
                        MemberName::from_static("boot"),
                        MethodDescriptor::main(),
                    ),
                ),
                Insn::Return { has_value: false },
            ],
        ));
        entry.methods.push(method(
            MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
            MemberName::from_static("boot"),
            MethodDescriptor::main(),
            vec![
                Insn::New(ClassName::from_static("net/minecraft/client/Minecraft")),
                Insn::Const(ConstOperand::Null),
                Insn::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(
                        ClassName::from_static("net/minecraft/client/Minecraft"),
                        MemberName::INIT,
                        MethodDescriptor::new(vec![FieldType::FILE], None),
                    ),
                ),
                Insn::Return { has_value: false },
            ],
        ));

        let cx = context_over(&[&entry, &game], "net.minecraft.client.main.Main", "1.16.5");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("patches");
        assert_eq!(
            view.emitted,
            vec![ClassName::from_static("net/minecraft/client/Minecraft")],
            "the game type is found inside the forward target"
        );
    }

    #[test]
    fn main_with_trailing_work_is_not_a_forwarder() {
        let game = game_class("net/minecraft/client/Minecraft");
        let entry_name = ClassName::from_static("net/minecraft/client/main/Main");
        let mut entry = ClassBody::new(ClassAccessFlags::PUBLIC, entry_name.clone(), ClassName::OBJECT);
        entry.methods.push(method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            MemberName::MAIN,
            MethodDescriptor::main(),
            vec![
                Insn::LoadLocal(0),
                Insn::Invoke(
                    InvokeKind::Static,
                    MethodRef::new(
                        entry_name.clone(),
                        MemberName::from_static("boot"),
                        MethodDescriptor::main(),
                    ),
                ),
                noise_call("log"),
                Insn::Return { has_value: false },
            ],
        ));
        entry.methods.push(method(
            MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
            MemberName::from_static("boot"),
            MethodDescriptor::main(),
            vec![
                Insn::New(ClassName::from_static("net/minecraft/client/Minecraft")),
                Insn::Const(ConstOperand::Null),
                Insn::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(
                        ClassName::from_static("net/minecraft/client/Minecraft"),
                        MemberName::INIT,
                        MethodDescriptor::new(vec![FieldType::FILE], None),
                    ),
                ),
                Insn::Return { has_value: false },
            ],
        ));

        let cx = context_over(&[&entry, &game], "net.minecraft.client.main.Main", "1.16.5");
        let mut view = PatchView::new(&cx);
        let err = EntrypointPatch::new().apply(&cx, &mut view).unwrap_err();
        assert!(
            matches!(err, PatchError::AnchorNotFound(MissingAnchor::GameType(_))),
            "a main doing its own work stays the scan target: {:?}",
            err
        );
    }

    #[test]
    fn quality_three_marker_beats_the_constructor() {
        let game_name = ClassName::from_static("net/minecraft/client/Minecraft");
        let mut game = game_class("net/minecraft/client/Minecraft");
        game.methods.push(method(
            MethodAccessFlags::PRIVATE,
            MemberName::from_static("init"),
            MethodDescriptor::new(vec![], None),
            vec![
                Insn::Const(ConstOperand::Str(String::from("LWJGL Version: "))),
                noise_call("a"),
                noise_call("b"),
                noise_call("c"),
                noise_call("d"),
                noise_call("e"),
                Insn::Return { has_value: false },
            ],
        ));
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            ClassName::from_static("net/minecraft/client/main/Main"),
            ClassName::OBJECT,
        );
        entry.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("game"),
            descriptor: FieldType::object(game_name.clone()),
        });

        let cx = context_over(&[&entry, &game], "net.minecraft.client.main.Main", "1.16.5");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("patches");

        let methods = patched(&view, "net/minecraft/client/Minecraft");
        let hook_call = Insn::Invoke(InvokeKind::Static, cx.start_hook.clone());
        assert!(
            !methods[0].contains(&hook_call),
            "constructor (quality 1) does not receive the hook"
        );
        let init = &methods[1];
        assert!(init.contains(&hook_call), "marker method wins: {:?}", init);
        let hook_at = init.iter().position(|i| *i == hook_call).unwrap();
        let marker_at = init
            .iter()
            .position(|i| i.const_str() == Some("LWJGL Version: "))
            .unwrap();
        assert!(
            hook_at > marker_at,
            "hook goes after the marker, past {} calls",
            MARKER_CALL_SKIP
        );
        assert_eq!(
            init[marker_at + 1..hook_at - 3]
                .iter()
                .filter(|i| i.kind() == InsnKind::Invoke)
                .count(),
            MARKER_CALL_SKIP,
            "exactly four calls are stepped over"
        );
    }

    #[test]
    fn thread_marker_wins_on_new_versions() {
        let game_name = ClassName::from_static("net/minecraft/client/Minecraft");
        let mut game = game_class("net/minecraft/client/Minecraft");
        let current_thread = Insn::Invoke(
            InvokeKind::Static,
            MethodRef::new(
                ClassName::THREAD,
                MemberName::CURRENT_THREAD,
                MethodDescriptor::new(vec![], Some(FieldType::object(ClassName::THREAD))),
            ),
        );
        game.methods.push(method(
            MethodAccessFlags::PRIVATE,
            MemberName::from_static("run"),
            MethodDescriptor::new(vec![], None),
            vec![
                noise_call("pre"),
                current_thread.clone(),
                Insn::Const(ConstOperand::Str(String::from("Backend library: {}"))),
                noise_call("a"),
                noise_call("b"),
                noise_call("c"),
                noise_call("d"),
                Insn::Return { has_value: false },
            ],
        ));
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            ClassName::from_static("net/minecraft/client/main/Main"),
            ClassName::OBJECT,
        );
        entry.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("game"),
            descriptor: FieldType::object(game_name),
        });

        let cx = context_over(&[&entry, &game], "net.minecraft.client.main.Main", "1.19.4");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("patches");

        let run = &patched(&view, "net/minecraft/client/Minecraft")[1];
        let hook_call = Insn::Invoke(InvokeKind::Static, cx.start_hook.clone());
        let hook_at = run.iter().position(|i| *i == hook_call).unwrap();
        let thread_at = run.iter().position(|i| *i == current_thread).unwrap();
        assert_eq!(
            hook_at + 1,
            thread_at,
            "hook sits immediately before the thread marker: {:?}",
            run
        );
    }

    #[test]
    fn missing_entry_class_fails_before_scanning() {
        let cx = context_over(&[], "net.minecraft.client.main.Main", "1.16.5");
        let mut view = PatchView::new(&cx);
        let err = EntrypointPatch::new().apply(&cx, &mut view).unwrap_err();
        assert!(
            matches!(
                err,
                PatchError::AnchorNotFound(MissingAnchor::EntryClass(ref name))
                    if name == &ClassName::from_static("net/minecraft/client/main/Main")
            ),
            "got {:?}",
            err
        );
    }

    #[test]
    fn foreign_entry_is_a_no_op() {
        let cx = context_over(&[], "org.example.Main", "1.16.5");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("no-op");
        assert!(view.emitted.is_empty());
    }

    #[test]
    fn end_to_end_main_to_game() {
        let game = game_class("pkg/Game");
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            ClassName::from_static("pkg/Main"),
            ClassName::OBJECT,
        );
        entry.methods.push(method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            MemberName::MAIN,
            MethodDescriptor::main(),
            vec![
                Insn::New(ClassName::from_static("pkg/Game")),
                Insn::Const(ConstOperand::Null),
                Insn::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(
                        ClassName::from_static("pkg/Game"),
                        MemberName::INIT,
                        MethodDescriptor::new(vec![FieldType::FILE], None),
                    ),
                ),
                Insn::Return { has_value: false },
            ],
        ));

        let cx = context_over(&[&entry, &game], "pkg.Main", "1.16.5");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("patches");

        let run_dir = FieldRef::new(
            ClassName::from_static("pkg/Game"),
            MemberName::from_static("runDir"),
            FieldType::FILE,
        );
        let ctor = &patched(&view, "pkg/Game")[0];
        assert_eq!(
            ctor.as_slice(),
            &[
                Insn::LoadLocal(0),
                object_init(),
                Insn::LoadLocal(0),
                Insn::LoadLocal(1),
                Insn::PutField(run_dir.clone()),
                Insn::LoadLocal(0),
                Insn::GetField(run_dir),
                Insn::LoadLocal(0),
                Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
                Insn::Return { has_value: false },
            ],
            "hook lands right after the store"
        );
    }

    #[test]
    fn applet_route_re_routes_the_static_directory() {
        let applet_entry = ClassName::from_static("net/minecraft/client/MinecraftApplet");
        let game_name = ClassName::from_static("net/minecraft/client/Minecraft");
        let mut game = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            game_name.clone(),
            ClassName::OBJECT,
        );
        let dir_ref = FieldRef::new(
            game_name.clone(),
            MemberName::from_static("runDir"),
            FieldType::FILE,
        );
        game.fields.push(Field {
            access: FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC,
            name: MemberName::from_static("runDir"),
            descriptor: FieldType::FILE,
        });
        game.methods.push(method(
            MethodAccessFlags::PUBLIC,
            MemberName::INIT,
            MethodDescriptor::new(vec![], None),
            vec![
                Insn::LoadLocal(0),
                object_init(),
                noise_call("setup"),
                Insn::Return { has_value: false },
            ],
        ));
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            applet_entry.clone(),
            ClassName::OBJECT,
        );
        entry.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("game"),
            descriptor: FieldType::object(game_name.clone()),
        });

        let cx = context_over(&[&entry, &game], "net.minecraft.client.MinecraftApplet", "1.2.5");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("patches");

        let ctor = &patched(&view, "net/minecraft/client/Minecraft")[0];
        assert!(
            contains_sequence(
                ctor,
                &[
                    Insn::GetStatic(dir_ref.clone()),
                    Insn::Invoke(InvokeKind::Static, cx.applet_dir_hook.clone()),
                    Insn::PutStatic(dir_ref.clone()),
                ]
            ),
            "directory is re-routed after the base initializer: {:?}",
            ctor
        );
        assert!(
            contains_sequence(
                ctor,
                &[
                    Insn::GetStatic(dir_ref),
                    Insn::LoadLocal(0),
                    Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
                ]
            ),
            "start hook runs before the final return: {:?}",
            ctor
        );
        assert_eq!(
            ctor.last(),
            Some(&Insn::Return { has_value: false }),
            "return stays terminal"
        );
        assert_eq!(view.applet_entry, Some(applet_entry));
    }

    #[test]
    fn applet_without_directory_degrades_to_tail_insertion() {
        let game_name = ClassName::from_static("net/minecraft/client/Minecraft");
        let mut game = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            game_name.clone(),
            ClassName::OBJECT,
        );
        game.methods.push(method(
            MethodAccessFlags::PUBLIC,
            MemberName::INIT,
            MethodDescriptor::new(vec![], None),
            vec![
                Insn::LoadLocal(0),
                object_init(),
                Insn::Return { has_value: false },
            ],
        ));
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            ClassName::from_static("net/minecraft/client/MinecraftApplet"),
            ClassName::OBJECT,
        );
        entry.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("game"),
            descriptor: FieldType::object(game_name),
        });

        let cx = context_over(&[&entry, &game], "net.minecraft.client.MinecraftApplet", "1.0");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("degrades, not fails");

        let ctor = &patched(&view, "net/minecraft/client/Minecraft")[0];
        assert_eq!(
            &ctor[ctor.len() - 5..],
            &[
                Insn::Const(ConstOperand::Null),
                Insn::Invoke(InvokeKind::Static, cx.applet_dir_hook.clone()),
                Insn::LoadLocal(0),
                Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
                Insn::Return { has_value: false },
            ]
        );
    }

    #[test]
    fn old_dirless_constructor_degrades_to_tail_insertion() {
        let game_name = ClassName::from_static("net/minecraft/client/Minecraft");
        let mut game = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            game_name.clone(),
            ClassName::OBJECT,
        );
        game.methods.push(method(
            MethodAccessFlags::PUBLIC,
            MemberName::INIT,
            MethodDescriptor::new(vec![], None),
            vec![
                Insn::LoadLocal(0),
                object_init(),
                Insn::Return { has_value: false },
            ],
        ));
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            ClassName::from_static("net/minecraft/client/main/Main"),
            ClassName::OBJECT,
        );
        entry.methods.push(method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            MemberName::MAIN,
            MethodDescriptor::main(),
            vec![
                Insn::New(game_name.clone()),
                Insn::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(game_name, MemberName::INIT, MethodDescriptor::new(vec![], None)),
                ),
                Insn::Return { has_value: false },
            ],
        ));

        let cx = context_over(&[&entry, &game], "net.minecraft.client.main.Main", "1.0");
        let mut view = PatchView::new(&cx);
        EntrypointPatch::new().apply(&cx, &mut view).expect("degrades, not fails");

        let ctor = &patched(&view, "net/minecraft/client/Minecraft")[0];
        assert_eq!(
            &ctor[ctor.len() - 4..],
            &[
                Insn::Const(ConstOperand::Null),
                Insn::LoadLocal(0),
                Insn::Invoke(InvokeKind::Static, cx.start_hook.clone()),
                Insn::Return { has_value: false },
            ]
        );
    }

    #[test]
    fn directory_taking_constructor_without_store_is_a_missing_anchor() {
        let game_name = ClassName::from_static("net/minecraft/client/Minecraft");
        let mut game = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            game_name.clone(),
            ClassName::OBJECT,
        );
        game.methods.push(method(
            MethodAccessFlags::PUBLIC,
            MemberName::INIT,
            MethodDescriptor::new(vec![FieldType::FILE], None),
            vec![
                Insn::LoadLocal(0),
                object_init(),
                Insn::Return { has_value: false },
            ],
        ));
        let mut entry = ClassBody::new(
            ClassAccessFlags::PUBLIC,
            ClassName::from_static("net/minecraft/client/main/Main"),
            ClassName::OBJECT,
        );
        entry.fields.push(Field {
            access: FieldAccessFlags::PRIVATE,
            name: MemberName::from_static("game"),
            descriptor: FieldType::object(game_name),
        });

        let cx = context_over(&[&entry, &game], "net.minecraft.client.main.Main", "1.0");
        let mut view = PatchView::new(&cx);
        let err = EntrypointPatch::new().apply(&cx, &mut view).unwrap_err();
        assert!(
            matches!(
                err,
                PatchError::AnchorNotFound(MissingAnchor::DirectoryField(_))
            ),
            "got {:?}",
            err
        );
    }
}
