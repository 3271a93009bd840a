use super::{Deserialize, Insn, InsnKind, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Error, ErrorKind, Result as IoResult};

/// Handle to one instruction inside an [`InstructionStream`]
///
/// Handles stay valid for the lifetime of the stream that produced them, no
/// matter how many instructions are inserted around them. They are only
/// meaningful for that stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InsnId(u32);

/// A positioning operation reached the end of the stream without a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfStream;

struct Node {
    insn: Insn,
    prev: Option<InsnId>,
    next: Option<InsnId>,
}

/// Method body as a mutable instruction list
///
/// Nodes live in a grow-only arena and are threaded as a doubly linked
/// list, so insertion is cheap anywhere and never moves existing nodes.
/// Mutation goes through a [`Cursor`], which sits *between* instructions
/// the way a `ListIterator` does.
pub struct InstructionStream {
    nodes: Vec<Node>,
    head: Option<InsnId>,
    tail: Option<InsnId>,
    len: usize,
    modified: bool,
}

impl InstructionStream {
    pub fn new() -> InstructionStream {
        InstructionStream {
            nodes: vec![],
            head: None,
            tail: None,
            len: 0,
            modified: false,
        }
    }

    pub fn from_insns(insns: impl IntoIterator<Item = Insn>) -> InstructionStream {
        let mut stream = InstructionStream::new();
        for insn in insns {
            stream.link_at_tail(insn);
        }
        stream.modified = false;
        stream
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Has any instruction been inserted or replaced since construction?
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn get(&self, id: InsnId) -> &Insn {
        &self.node(id).insn
    }

    /// Restartable in-order traversal
    pub fn iter(&self) -> Iter {
        Iter {
            stream: self,
            next: self.head,
        }
    }

    /// Instructions in order, cloned out of the arena
    pub fn to_vec(&self) -> Vec<Insn> {
        self.iter().map(|(_, insn)| insn.clone()).collect()
    }

    /// Cursor positioned before the first instruction
    pub fn cursor(&mut self) -> Cursor {
        let next = self.head;
        Cursor { stream: self, next }
    }

    /// Swap out the instruction behind a handle, returning the old one
    pub fn replace(&mut self, id: InsnId, insn: Insn) -> Insn {
        self.modified = true;
        std::mem::replace(&mut self.node_mut(id).insn, insn)
    }

    /// Insert a sequence just before the first instruction matching the
    /// predicate
    pub fn insert_before<P>(
        &mut self,
        pred: P,
        insns: impl IntoIterator<Item = Insn>,
    ) -> std::result::Result<(), EndOfStream>
    where
        P: Fn(&Insn) -> bool,
    {
        let mut cursor = self.cursor();
        cursor.move_before(pred)?;
        cursor.insert_all(insns);
        Ok(())
    }

    /// Insert a sequence just after the first instruction matching the
    /// predicate
    pub fn insert_after<P>(
        &mut self,
        pred: P,
        insns: impl IntoIterator<Item = Insn>,
    ) -> std::result::Result<(), EndOfStream>
    where
        P: Fn(&Insn) -> bool,
    {
        let mut cursor = self.cursor();
        cursor.move_after(pred)?;
        cursor.insert_all(insns);
        Ok(())
    }

    fn node(&self, id: InsnId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: InsnId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, insn: Insn) -> InsnId {
        let id = InsnId(self.nodes.len() as u32);
        self.nodes.push(Node {
            insn,
            prev: None,
            next: None,
        });
        self.len += 1;
        id
    }

    fn link_at_tail(&mut self, insn: Insn) -> InsnId {
        let id = self.alloc(insn);
        self.modified = true;
        match self.tail {
            None => {
                self.head = Some(id);
                self.tail = Some(id);
            }
            Some(tail) => {
                self.node_mut(tail).next = Some(id);
                self.node_mut(id).prev = Some(tail);
                self.tail = Some(id);
            }
        }
        id
    }

    /// Link a fresh instruction immediately before `before`
    fn link_before(&mut self, before: InsnId, insn: Insn) -> InsnId {
        let id = self.alloc(insn);
        self.modified = true;
        let prev = self.node(before).prev;
        self.node_mut(id).next = Some(before);
        self.node_mut(id).prev = prev;
        self.node_mut(before).prev = Some(id);
        match prev {
            None => self.head = Some(id),
            Some(prev) => self.node_mut(prev).next = Some(id),
        }
        id
    }
}

impl Default for InstructionStream {
    fn default() -> InstructionStream {
        InstructionStream::new()
    }
}

impl std::fmt::Debug for InstructionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter().map(|(_, i)| i)).finish()
    }
}

/// Equality is over instruction sequences; arena layout and handles don't
/// participate
impl PartialEq for InstructionStream {
    fn eq(&self, other: &InstructionStream) -> bool {
        self.len == other.len
            && self
                .iter()
                .zip(other.iter())
                .all(|((_, lhs), (_, rhs))| lhs == rhs)
    }
}

impl Eq for InstructionStream {}

pub struct Iter<'s> {
    stream: &'s InstructionStream,
    next: Option<InsnId>,
}

impl<'s> Iterator for Iter<'s> {
    type Item = (InsnId, &'s Insn);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.stream.node(id);
        self.next = node.next;
        Some((id, &node.insn))
    }
}

/// Mutable position between two instructions of a stream
///
/// Scanning operations always move forward from the current position and
/// fail with [`EndOfStream`] when nothing matches; positions established
/// earlier (as [`InsnId`] handles) survive any amount of insertion.
pub struct Cursor<'s> {
    stream: &'s mut InstructionStream,
    next: Option<InsnId>,
}

impl<'s> Cursor<'s> {
    /// Instruction the next call to [`Cursor::advance`] would step over
    pub fn peek(&self) -> Option<(InsnId, &Insn)> {
        let id = self.next?;
        Some((id, self.stream.get(id)))
    }

    /// Step over one instruction
    pub fn advance(&mut self) -> Option<(InsnId, &Insn)> {
        let id = self.next?;
        let node = self.stream.node(id);
        self.next = node.next;
        Some((id, &node.insn))
    }

    pub fn at_end(&self) -> bool {
        self.next.is_none()
    }

    /// Advance until the cursor sits just before the first instruction
    /// matching the predicate
    pub fn move_before<P>(&mut self, pred: P) -> std::result::Result<InsnId, EndOfStream>
    where
        P: Fn(&Insn) -> bool,
    {
        let mut probe = self.next;
        while let Some(id) = probe {
            if pred(self.stream.get(id)) {
                self.next = Some(id);
                return Ok(id);
            }
            probe = self.stream.node(id).next;
        }
        Err(EndOfStream)
    }

    /// Advance until the cursor sits just after the first instruction
    /// matching the predicate
    pub fn move_after<P>(&mut self, pred: P) -> std::result::Result<InsnId, EndOfStream>
    where
        P: Fn(&Insn) -> bool,
    {
        let found = self.move_before(pred)?;
        self.next = self.stream.node(found).next;
        Ok(found)
    }

    pub fn move_before_kind(&mut self, kind: InsnKind) -> std::result::Result<InsnId, EndOfStream> {
        self.move_before(|insn| insn.kind() == kind)
    }

    pub fn move_after_kind(&mut self, kind: InsnKind) -> std::result::Result<InsnId, EndOfStream> {
        self.move_after(|insn| insn.kind() == kind)
    }

    /// Advance until the cursor sits just before the given node
    pub fn move_before_id(&mut self, target: InsnId) -> std::result::Result<(), EndOfStream> {
        let mut probe = self.next;
        while let Some(id) = probe {
            if id == target {
                self.next = Some(id);
                return Ok(());
            }
            probe = self.stream.node(id).next;
        }
        Err(EndOfStream)
    }

    /// Advance until the cursor sits just before the last return in the
    /// remainder of the stream
    pub fn move_before_final_return(&mut self) -> std::result::Result<InsnId, EndOfStream> {
        let mut last = None;
        let mut probe = self.next;
        while let Some(id) = probe {
            if self.stream.get(id).kind() == InsnKind::Return {
                last = Some(id);
            }
            probe = self.stream.node(id).next;
        }
        match last {
            Some(id) => {
                self.next = Some(id);
                Ok(id)
            }
            None => Err(EndOfStream),
        }
    }

    /// Insert one instruction at the cursor
    ///
    /// The cursor does not move over what it inserted, so consecutive
    /// inserts land in call order.
    pub fn insert(&mut self, insn: Insn) -> InsnId {
        match self.next {
            Some(before) => self.stream.link_before(before, insn),
            None => self.stream.link_at_tail(insn),
        }
    }

    pub fn insert_all(&mut self, insns: impl IntoIterator<Item = Insn>) {
        for insn in insns {
            self.insert(insn);
        }
    }

    /// Replace the instruction just ahead of the cursor
    pub fn replace_next(&mut self, insn: Insn) -> std::result::Result<Insn, EndOfStream> {
        match self.next {
            Some(id) => Ok(self.stream.replace(id, insn)),
            None => Err(EndOfStream),
        }
    }
}

impl Serialize for InstructionStream {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        if self.len > u16::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidInput, "stream too long"));
        }
        (self.len as u16).serialize(writer)?;
        for (_, insn) in self.iter() {
            insn.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for InstructionStream {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> IoResult<Self> {
        let insns = Vec::<Insn>::deserialize(reader)?;
        Ok(InstructionStream::from_insns(insns))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{ClassName, ConstOperand, InvokeKind, MemberName, MethodDescriptor, MethodRef};

    fn call(name: &'static str) -> Insn {
        Insn::Invoke(
            InvokeKind::Static,
            MethodRef::new(
                ClassName::from_static("pkg/Util"),
                MemberName::from_static(name),
                MethodDescriptor::new(vec![], None),
            ),
        )
    }

    fn sample() -> InstructionStream {
        InstructionStream::from_insns(vec![
            Insn::LoadLocal(0),
            call("first"),
            Insn::Const(ConstOperand::Num(3)),
            call("second"),
            Insn::Return { has_value: false },
        ])
    }

    #[test]
    fn construction_is_not_a_modification() {
        let stream = sample();
        assert_eq!(stream.len(), 5);
        assert!(!stream.is_modified());
    }

    #[test]
    fn iteration_is_in_order_and_restartable() {
        let stream = sample();
        let kinds: Vec<InsnKind> = stream.iter().map(|(_, i)| i.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                InsnKind::LoadLocal,
                InsnKind::Invoke,
                InsnKind::Const,
                InsnKind::Invoke,
                InsnKind::Return,
            ]
        );
        assert_eq!(stream.iter().count(), 5, "iter starts over every time");
    }

    #[test]
    fn cursor_insert_preserves_call_order() {
        let mut stream = sample();
        let mut cursor = stream.cursor();
        cursor
            .move_before_kind(InsnKind::Const)
            .expect("const is present");
        cursor.insert_all(vec![Insn::LoadLocal(1), Insn::LoadLocal(2)]);
        let insns = stream.to_vec();
        assert_eq!(insns[2], Insn::LoadLocal(1));
        assert_eq!(insns[3], Insn::LoadLocal(2));
        assert_eq!(insns[4], Insn::Const(ConstOperand::Num(3)));
        assert!(stream.is_modified());
    }

    #[test]
    fn handles_survive_insertion() {
        let mut stream = sample();
        let const_id = stream
            .iter()
            .find(|(_, i)| i.kind() == InsnKind::Const)
            .map(|(id, _)| id)
            .unwrap();

        let mut cursor = stream.cursor();
        for _ in 0..3 {
            cursor.insert(Insn::Other(0));
        }
        assert_eq!(
            stream.get(const_id),
            &Insn::Const(ConstOperand::Num(3)),
            "handle still points at the same instruction"
        );

        let mut cursor = stream.cursor();
        cursor.move_before_id(const_id).expect("reachable");
        cursor.insert(Insn::LoadLocal(9));
        let insns = stream.to_vec();
        let pos = insns
            .iter()
            .position(|i| *i == Insn::Const(ConstOperand::Num(3)))
            .unwrap();
        assert_eq!(insns[pos - 1], Insn::LoadLocal(9));
    }

    #[test]
    fn fresh_cursor_inserts_at_the_head() {
        let mut stream = sample();
        let mut cursor = stream.cursor();
        cursor.insert(Insn::Other(1));
        assert_eq!(stream.to_vec()[0], Insn::Other(1));
    }

    #[test]
    fn scans_past_the_end_fail() {
        let mut stream = sample();
        let mut cursor = stream.cursor();
        assert_eq!(cursor.move_before_kind(InsnKind::New), Err(EndOfStream));
        assert_eq!(
            stream.insert_after(|i| i.kind() == InsnKind::Branch, vec![Insn::Other(0)]),
            Err(EndOfStream)
        );
    }

    #[test]
    fn move_after_steps_past_distinct_matches() {
        let mut stream = sample();
        let mut cursor = stream.cursor();
        let first = cursor.move_after_kind(InsnKind::Invoke).unwrap();
        let second = cursor.move_after_kind(InsnKind::Invoke).unwrap();
        assert_ne!(first, second, "each move_after consumes its match");
        assert_eq!(cursor.move_after_kind(InsnKind::Invoke), Err(EndOfStream));
    }

    #[test]
    fn final_return_is_the_last_one() {
        let mut stream = InstructionStream::from_insns(vec![
            Insn::Return { has_value: true },
            Insn::LoadLocal(0),
            Insn::Return { has_value: true },
        ]);
        let mut cursor = stream.cursor();
        let id = cursor.move_before_final_return().unwrap();
        cursor.insert(Insn::Other(5));
        let insns = stream.to_vec();
        assert_eq!(insns[2], Insn::Other(5));
        assert_eq!(stream.get(id).kind(), InsnKind::Return);
    }

    #[test]
    fn replace_keeps_position_and_returns_old() {
        let mut stream = sample();
        let mut cursor = stream.cursor();
        cursor.move_before_kind(InsnKind::Const).unwrap();
        let old = cursor.replace_next(Insn::Const(ConstOperand::Null)).unwrap();
        assert_eq!(old, Insn::Const(ConstOperand::Num(3)));
        assert_eq!(stream.to_vec()[2], Insn::Const(ConstOperand::Null));
    }
}
