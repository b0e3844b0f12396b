// Pattern algebra
//
//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This file is part of srngc.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Hash-consed pattern algebra.
//!
//! Patterns form a DAG of immutable nodes allocated in a
//!   [`PatternArena`] and addressed by [`PatternId`].
//! The constructors are _smart_:
//!   they apply a small set of algebraic identities eagerly and intern
//!   every node,
//!     so two structurally equal patterns always share one id and
//!     pattern equality is a single integer comparison.
//!
//! The identities are a cheap syntactic normal form,
//!   not full semantic canonicalization:
//!
//!   - `Choice`, `Group`, `Interleave`, and `And` right-associate;
//!   - `NotAllowed` is eliminated where it is an identity
//!       (`Choice`)
//!     and collapses the node where it is absorbing
//!       (`Group`, `Interleave`, `And`, `Define`);
//!   - `Empty` is a unit of `Group` and `Interleave`;
//!   - `Choice` eliminates duplicate operands by scanning its
//!     right-associated spine.
//!
//! Operands must _not_ be reordered beyond this
//!   (e.g. by sorting `Choice` operands):
//!     the duplicate scan relies on right-association only,
//!     and the simulator relies on construction order for
//!     deterministic state numbering.
//!
//! Nullability is computed at construction and stored on the node;
//!   it is a function of the node's structure,
//!     so it does not participate in interning.
//! Recursion never appears in the DAG itself:
//!   [`PatternKind::Ref`] is a leaf,
//!     matched by name only when a derivative is taken against it.

use crate::sym::SymbolId;
use fxhash::{FxBuildHasher, FxHashSet};
use static_assertions::assert_eq_size;
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU32;

/// Unique identifier of an interned pattern.
///
/// Two patterns are equal iff their ids are equal.
/// The id `0` is never valid,
///   so `Option<PatternId>` costs no more space than [`PatternId`]
///   itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(NonZeroU32);
assert_eq_size!(Option<PatternId>, PatternId);

impl PatternId {
    fn from_index(index: usize) -> Self {
        Self(
            u32::try_from(index)
                .ok()
                .and_then(NonZeroU32::new)
                .expect("internal error: PatternId range exhausted"),
        )
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Pattern node variants.
///
/// Child patterns are ids into the owning [`PatternArena`];
///   [`SymbolId`]s are interned names and namespace URIs.
/// This type doubles as the hash-consing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// The empty language.
    NotAllowed,
    /// The language containing only the empty sequence.
    Empty,
    /// Character data; always acceptable.
    Text,
    /// Reference to a define, matched by name and never expanded here.
    Ref(SymbolId),
    /// Attribute leaf carrying `(namespace, local name)`.
    Attribute(SymbolId, SymbolId),
    /// One or more repetitions.
    OneOrMore(PatternId),
    Choice(PatternId, PatternId),
    Group(PatternId, PatternId),
    Interleave(PatternId, PatternId),
    /// Element carrying `(name class, content)`.
    Element(PatternId, PatternId),
    /// Named wrapper around a define's pattern.
    Define(SymbolId, PatternId),
    And(PatternId, PatternId),
    Not(PatternId),
    /// Name-class leaf accepting any name token.
    AnyName,
    /// Name-class leaf accepting one namespace token.
    NsName(SymbolId),
    /// Name-class leaf accepting one local-name token.
    LnName(SymbolId),
}

impl PatternKind {
    /// Child patterns, if any, in left-to-right order.
    fn children(self) -> (Option<PatternId>, Option<PatternId>) {
        use PatternKind::*;

        match self {
            NotAllowed | Empty | Text | AnyName | Ref(_)
            | Attribute(..) | NsName(_) | LnName(_) => (None, None),

            OneOrMore(x) | Not(x) | Define(_, x) => (Some(x), None),

            Choice(a, b) | Group(a, b) | Interleave(a, b) | And(a, b)
            | Element(a, b) => (Some(a), Some(b)),
        }
    }
}

struct PatternNode {
    kind: PatternKind,
    nullable: bool,
}

/// Arena of interned patterns.
///
/// The arena employs interior mutability so that constructors compose
///   without threading `&mut` through recursive builds.
/// All maps and nodes are scoped to one compile.
pub struct PatternArena {
    /// Pattern nodes by [`PatternId`] index.
    ///
    /// The first slot is reserved during initialization so that no
    ///   pattern is ever assigned the invalid id `0`.
    nodes: RefCell<Vec<PatternNode>>,

    /// Structural memo ensuring each kind is allocated at most once.
    memo: RefCell<HashMap<PatternKind, PatternId, FxBuildHasher>>,
}

impl PatternArena {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![PatternNode {
                kind: PatternKind::NotAllowed,
                nullable: false,
            }]),
            memo: RefCell::new(HashMap::default()),
        }
    }

    fn intern(&self, kind: PatternKind, nullable: bool) -> PatternId {
        if let Some(&id) = self.memo.borrow().get(&kind) {
            return id;
        }

        let mut nodes = self.nodes.borrow_mut();
        let id = PatternId::from_index(nodes.len());
        nodes.push(PatternNode { kind, nullable });

        self.memo.borrow_mut().insert(kind, id);

        id
    }

    /// Kind of the given pattern.
    pub fn kind(&self, id: PatternId) -> PatternKind {
        self.nodes.borrow()[id.as_index()].kind
    }

    /// Whether the empty sequence is in the pattern's language.
    pub fn is_nullable(&self, id: PatternId) -> bool {
        self.nodes.borrow()[id.as_index()].nullable
    }

    /// Number of distinct interned patterns.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len() - 1
    }

    /// Visit each distinct subpattern of `root` once,
    ///   in preorder with left children first.
    ///
    /// The traversal order is deterministic,
    ///   which downstream consumers rely on for stable state numbering.
    pub fn for_each_subpattern(
        &self,
        root: PatternId,
        mut visit: impl FnMut(PatternId),
    ) {
        let mut visited = FxHashSet::default();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }

            visit(id);

            let (left, right) = self.kind(id).children();

            // Right below left so that left pops first.
            if let Some(child) = right {
                stack.push(child);
            }
            if let Some(child) = left {
                stack.push(child);
            }
        }
    }

    pub fn not_allowed(&self) -> PatternId {
        self.intern(PatternKind::NotAllowed, false)
    }

    pub fn empty(&self) -> PatternId {
        self.intern(PatternKind::Empty, true)
    }

    pub fn text(&self) -> PatternId {
        self.intern(PatternKind::Text, true)
    }

    pub fn any_name(&self) -> PatternId {
        self.intern(PatternKind::AnyName, true)
    }

    pub fn ref_to(&self, name: SymbolId) -> PatternId {
        self.intern(PatternKind::Ref(name), false)
    }

    pub fn attribute(&self, ns: SymbolId, name: SymbolId) -> PatternId {
        self.intern(PatternKind::Attribute(ns, name), false)
    }

    pub fn ns_name(&self, ns: SymbolId) -> PatternId {
        self.intern(PatternKind::NsName(ns), false)
    }

    pub fn ln_name(&self, name: SymbolId) -> PatternId {
        self.intern(PatternKind::LnName(name), false)
    }

    pub fn one_or_more(&self, p: PatternId) -> PatternId {
        self.intern(PatternKind::OneOrMore(p), self.is_nullable(p))
    }

    pub fn not(&self, p: PatternId) -> PatternId {
        self.intern(PatternKind::Not(p), !self.is_nullable(p))
    }

    /// `Optional(x) = Choice(Empty, x)`.
    pub fn optional(&self, p: PatternId) -> PatternId {
        let empty = self.empty();
        self.choice(empty, p)
    }

    pub fn element(&self, name_class: PatternId, body: PatternId) -> PatternId {
        self.intern(
            PatternKind::Element(name_class, body),
            self.is_nullable(body),
        )
    }

    /// Named define wrapper.
    ///
    /// A define over the empty language is itself the empty language,
    ///   so `NotAllowed` bodies collapse rather than surviving as dead
    ///   wrapper nodes in derivative closures.
    pub fn define(&self, name: SymbolId, p: PatternId) -> PatternId {
        match self.kind(p) {
            PatternKind::NotAllowed => p,
            _ => self.intern(PatternKind::Define(name, p), self.is_nullable(p)),
        }
    }

    pub fn choice(&self, a: PatternId, b: PatternId) -> PatternId {
        match (self.kind(a), self.kind(b)) {
            (PatternKind::NotAllowed, _) => b,
            (_, PatternKind::NotAllowed) => a,

            (PatternKind::Choice(a1, a2), _) => {
                let rest = self.choice(a2, b);
                self.choice(a1, rest)
            }

            _ if self.in_choice_spine(b, a) => b,

            _ => self.intern(
                PatternKind::Choice(a, b),
                self.is_nullable(a) || self.is_nullable(b),
            ),
        }
    }

    /// Whether `needle` occurs as an operand on the right-associated
    ///   spine of `spine`.
    fn in_choice_spine(&self, spine: PatternId, needle: PatternId) -> bool {
        if spine == needle {
            return true;
        }

        match self.kind(spine) {
            PatternKind::Choice(head, rest) => {
                head == needle || self.in_choice_spine(rest, needle)
            }
            _ => false,
        }
    }

    pub fn group(&self, a: PatternId, b: PatternId) -> PatternId {
        match (self.kind(a), self.kind(b)) {
            (PatternKind::NotAllowed, _) | (_, PatternKind::NotAllowed) => {
                self.not_allowed()
            }

            (PatternKind::Empty, _) => b,
            (_, PatternKind::Empty) => a,

            (PatternKind::Group(a1, a2), _) => {
                let rest = self.group(a2, b);
                self.group(a1, rest)
            }

            _ => self.intern(
                PatternKind::Group(a, b),
                self.is_nullable(a) && self.is_nullable(b),
            ),
        }
    }

    pub fn interleave(&self, a: PatternId, b: PatternId) -> PatternId {
        match (self.kind(a), self.kind(b)) {
            (PatternKind::NotAllowed, _) | (_, PatternKind::NotAllowed) => {
                self.not_allowed()
            }

            (PatternKind::Empty, _) => b,
            (_, PatternKind::Empty) => a,

            (PatternKind::Interleave(a1, a2), _) => {
                let rest = self.interleave(a2, b);
                self.interleave(a1, rest)
            }

            _ => self.intern(
                PatternKind::Interleave(a, b),
                self.is_nullable(a) && self.is_nullable(b),
            ),
        }
    }

    pub fn and(&self, a: PatternId, b: PatternId) -> PatternId {
        match (self.kind(a), self.kind(b)) {
            (PatternKind::NotAllowed, _) | (_, PatternKind::NotAllowed) => {
                self.not_allowed()
            }

            (PatternKind::And(a1, a2), _) => {
                let rest = self.and(a2, b);
                self.and(a1, rest)
            }

            _ => self.intern(
                PatternKind::And(a, b),
                self.is_nullable(a) && self.is_nullable(b),
            ),
        }
    }
}

impl Default for PatternArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sym::SymbolInterner;

    type Sut = PatternArena;

    #[test]
    fn interns_structurally_equal_leaves() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = syms.intern("a");
        let b = syms.intern("b");

        assert_eq!(sut.ref_to(a), sut.ref_to(a));
        assert_ne!(sut.ref_to(a), sut.ref_to(b));
        assert_eq!(sut.empty(), sut.empty());
        assert_ne!(sut.empty(), sut.text());
    }

    #[test]
    fn interns_structurally_equal_composites() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let b = sut.ref_to(syms.intern("b"));

        assert_eq!(sut.group(a, b), sut.group(a, b));
        assert_ne!(sut.group(a, b), sut.group(b, a));
    }

    #[test]
    fn choice_eliminates_not_allowed() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let na = sut.not_allowed();

        assert_eq!(a, sut.choice(na, a));
        assert_eq!(a, sut.choice(a, na));
    }

    #[test]
    fn choice_right_associates() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let b = sut.ref_to(syms.intern("b"));
        let c = sut.ref_to(syms.intern("c"));

        let left_heavy = {
            let ab = sut.choice(a, b);
            sut.choice(ab, c)
        };
        let right_heavy = {
            let bc = sut.choice(b, c);
            sut.choice(a, bc)
        };

        assert_eq!(left_heavy, right_heavy);
    }

    #[test]
    fn choice_eliminates_duplicates_on_spine() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let b = sut.ref_to(syms.intern("b"));

        assert_eq!(a, sut.choice(a, a));

        let ab = sut.choice(a, b);
        assert_eq!(ab, sut.choice(a, ab));
        assert_eq!(ab, sut.choice(ab, b));
    }

    #[test]
    fn optional_is_idempotent() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let opt = sut.optional(a);

        assert_eq!(opt, sut.optional(opt));
    }

    #[test]
    fn group_collapses_not_allowed_and_drops_empty() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let na = sut.not_allowed();
        let empty = sut.empty();

        assert_eq!(na, sut.group(na, a));
        assert_eq!(na, sut.group(a, na));
        assert_eq!(a, sut.group(empty, a));
        assert_eq!(a, sut.group(a, empty));
    }

    #[test]
    fn group_right_associates() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let b = sut.ref_to(syms.intern("b"));
        let c = sut.ref_to(syms.intern("c"));

        let left_heavy = {
            let ab = sut.group(a, b);
            sut.group(ab, c)
        };
        let right_heavy = {
            let bc = sut.group(b, c);
            sut.group(a, bc)
        };

        assert_eq!(left_heavy, right_heavy);
    }

    #[test]
    fn interleave_collapses_not_allowed_and_drops_empty() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let na = sut.not_allowed();
        let empty = sut.empty();

        assert_eq!(na, sut.interleave(na, a));
        assert_eq!(a, sut.interleave(empty, a));
        assert_eq!(a, sut.interleave(a, empty));
    }

    #[test]
    fn and_short_circuits_not_allowed() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let na = sut.not_allowed();

        assert_eq!(na, sut.and(na, a));
        assert_eq!(na, sut.and(a, na));
    }

    #[test]
    fn define_collapses_not_allowed() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let name = syms.intern("d");
        let na = sut.not_allowed();

        assert_eq!(na, sut.define(name, na));
    }

    #[test]
    fn nullability_follows_structure() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let empty = sut.empty();

        assert!(sut.is_nullable(empty));
        assert!(sut.is_nullable(sut.text()));
        assert!(sut.is_nullable(sut.any_name()));
        assert!(!sut.is_nullable(a));
        assert!(!sut.is_nullable(sut.not_allowed()));

        // choice: either operand
        assert!(sut.is_nullable(sut.optional(a)));

        // group: both operands
        let opt = sut.optional(a);
        assert!(!sut.is_nullable(sut.group(opt, a)));
        assert!(sut.is_nullable(sut.group(opt, opt)));

        // one-or-more passes through
        assert!(!sut.is_nullable(sut.one_or_more(a)));
        assert!(sut.is_nullable(sut.one_or_more(opt)));

        // negation inverts
        assert!(sut.is_nullable(sut.not(a)));
        assert!(!sut.is_nullable(sut.not(empty)));

        // define and element follow their bodies
        let d = syms.intern("d");
        assert!(sut.is_nullable(sut.define(d, empty)));
        assert!(!sut.is_nullable(sut.define(d, a)));

        let nc = sut.ln_name(syms.intern("e"));
        assert!(sut.is_nullable(sut.element(nc, empty)));
        assert!(!sut.is_nullable(sut.element(nc, a)));
    }

    #[test]
    fn arena_len_counts_distinct_patterns() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        assert_eq!(0, sut.len());

        sut.empty();
        sut.empty();
        assert_eq!(1, sut.len());

        sut.ref_to(syms.intern("a"));
        assert_eq!(2, sut.len());
    }

    #[test]
    fn subpattern_walk_visits_each_node_once() {
        let syms = SymbolInterner::new();
        let sut = Sut::new();

        let a = sut.ref_to(syms.intern("a"));
        let b = sut.ref_to(syms.intern("b"));
        let ab = sut.group(a, b);

        // `a` is shared between both operands of the choice.
        let shared = sut.choice(a, ab);

        let mut seen = vec![];
        sut.for_each_subpattern(shared, |id| seen.push(id));

        assert_eq!(vec![shared, a, ab, b], seen);
    }
}
