// Element automaton simulation
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

//! Per-element DFA construction.
//!
//! Given one pattern representing an element's permitted content,
//!   the simulator explores every pattern reachable by derivation
//!   against the element's _leaf set_:
//!     the distinct `Attribute` and `Ref` subpatterns of the original
//!     pattern.
//! Each distinct derivative becomes one [`StateData`];
//!   states are shared across all elements of a compile through the
//!   pattern-to-state map.
//!
//! The leaf set is fixed at the root pattern rather than recomputed
//!   per derivative.
//! It over-approximates what each derivative can actually consume;
//!   a leaf that a derivative can no longer consume simply derives to
//!   `NotAllowed` and is dropped.
//! Consequently exploration order must not be relied upon,
//!   only the resulting transition maps.
//!
//! Hash-consing bounds the closure:
//!   the set of derivatives of a pattern over a finite token alphabet
//!   is finite once derivatives are canonical,
//!     so the work queue always drains.

use crate::deriv::deriv;
use crate::pattern::{PatternArena, PatternId, PatternKind};
use crate::sym::SymbolId;
use fxhash::{FxHashMap, FxHashSet};
use static_assertions::assert_eq_size;
use std::collections::VecDeque;
use std::num::NonZeroU32;

/// Dense identifier of a simulation state.
///
/// Ids begin at `1` in creation order and are emitted unchanged,
///   so slot `0` of the final state table is always the null
///   placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(NonZeroU32);
assert_eq_size!(Option<StateId>, StateId);

impl StateId {
    fn from_index(index: usize) -> Self {
        Self(
            u32::try_from(index + 1)
                .ok()
                .and_then(NonZeroU32::new)
                .expect("internal error: StateId range exhausted"),
        )
    }

    /// Numeric id as referenced by the output tables.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn as_index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// One state of a per-element DFA.
#[derive(Debug)]
pub struct StateData {
    /// Attribute transitions keyed by the attribute's
    ///   `(namespace, local name)`.
    pub attrs: FxHashMap<(SymbolId, SymbolId), StateId>,

    /// Child transitions keyed by define name.
    ///
    /// The table builder later rewrites these keys into the start-state
    ///   ids of the child elements fulfilling each define.
    pub children: FxHashMap<SymbolId, StateId>,

    /// Defines occurring in this state's pattern whose residual is
    ///   nullable here,
    ///     i.e. defines the content consumed so far already satisfies.
    pub nullable_defines: FxHashSet<SymbolId>,

    /// Whether this state's pattern is nullable.
    pub nullable: bool,
}

/// Explores derivative closures into shared states.
///
/// One simulator spans an entire compile:
///   the pattern-to-state map and the processed set are deliberately
///   global so that elements with overlapping content models share
///   states.
pub struct Simulator<'p> {
    pats: &'p PatternArena,

    /// States by id order.
    states: Vec<StateData>,

    /// Each distinct derived pattern owns exactly one state.
    pattern2state: FxHashMap<PatternId, StateId>,

    /// Patterns whose outgoing transitions have been computed.
    seen: FxHashSet<PatternId>,
}

impl<'p> Simulator<'p> {
    pub fn new(pats: &'p PatternArena) -> Self {
        Self {
            pats,
            states: Vec::new(),
            pattern2state: FxHashMap::default(),
            seen: FxHashSet::default(),
        }
    }

    /// States created so far, in id order.
    pub fn states(&self) -> &[StateData] {
        &self.states
    }

    /// Build the state machine rooted at `root` and return its start
    ///   state.
    ///
    /// If `root` was already reached by an earlier simulation its
    ///   existing state is returned unchanged.
    pub fn simulate(&mut self, root: PatternId) -> StateId {
        if let Some(&id) = self.pattern2state.get(&root) {
            return id;
        }

        let leaves = self.leaf_set(root);
        let root_id = self.create_state(root);

        let mut queue = VecDeque::new();
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            if !self.seen.insert(current) {
                continue;
            }

            let current_id = *self
                .pattern2state
                .get(&current)
                .expect("internal error: queued pattern has no state");

            for name in self.nullable_defines_of(current) {
                self.states[current_id.as_index()]
                    .nullable_defines
                    .insert(name);
            }

            for &leaf in &leaves {
                let derived = deriv(self.pats, current, leaf);

                if matches!(self.pats.kind(derived), PatternKind::NotAllowed) {
                    continue;
                }

                let next = match self.pattern2state.get(&derived) {
                    Some(&id) => id,
                    None => {
                        let id = self.create_state(derived);
                        queue.push_back(derived);
                        id
                    }
                };

                let state = &mut self.states[current_id.as_index()];

                match self.pats.kind(leaf) {
                    PatternKind::Attribute(ns, name) => {
                        state.attrs.insert((ns, name), next);
                    }
                    PatternKind::Ref(name) => {
                        state.children.insert(name, next);
                    }
                    _ => unreachable!(
                        "internal error: non-token pattern in leaf set"
                    ),
                }
            }
        }

        root_id
    }

    fn create_state(&mut self, pattern: PatternId) -> StateId {
        let id = StateId::from_index(self.states.len());

        self.states.push(StateData {
            attrs: FxHashMap::default(),
            children: FxHashMap::default(),
            nullable_defines: FxHashSet::default(),
            nullable: self.pats.is_nullable(pattern),
        });

        self.pattern2state.insert(pattern, id);

        id
    }

    /// Distinct `Attribute` and `Ref` subpatterns of `root`,
    ///   in discovery order.
    fn leaf_set(&self, root: PatternId) -> Vec<PatternId> {
        let mut leaves = Vec::new();

        self.pats.for_each_subpattern(root, |id| {
            if matches!(
                self.pats.kind(id),
                PatternKind::Attribute(..) | PatternKind::Ref(_)
            ) {
                leaves.push(id);
            }
        });

        leaves
    }

    /// Names of the nullable `Define` subpatterns of `root`.
    fn nullable_defines_of(&self, root: PatternId) -> Vec<SymbolId> {
        let mut names = Vec::new();

        self.pats.for_each_subpattern(root, |id| {
            if let PatternKind::Define(name, _) = self.pats.kind(id) {
                if self.pats.is_nullable(id) {
                    names.push(name);
                }
            }
        });

        names
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sym::SymbolInterner;

    type Sut<'p> = Simulator<'p>;

    #[test]
    fn empty_body_yields_single_accepting_state() {
        let syms = SymbolInterner::new();
        let pats = PatternArena::new();
        let mut sut = Sut::new(&pats);

        let name = syms.intern("A");
        let body = pats.define(name, pats.empty());

        let start = sut.simulate(body);

        assert_eq!(1, sut.states().len());

        let state = &sut.states()[0];
        assert!(state.nullable);
        assert!(state.attrs.is_empty());
        assert!(state.children.is_empty());
        assert!(state.nullable_defines.contains(&name));

        assert_eq!(1, start.get());
    }

    #[test]
    fn required_attribute_produces_two_states() {
        let syms = SymbolInterner::new();
        let pats = PatternArena::new();
        let mut sut = Sut::new(&pats);

        let name = syms.intern("A");
        let ns = syms.intern("");
        let local = syms.intern("a");

        let attr = pats.attribute(ns, local);
        let body = pats.define(name, attr);

        let start = sut.simulate(body);

        assert_eq!(2, sut.states().len());

        let first = &sut.states()[start.as_index()];
        assert!(!first.nullable);
        assert!(!first.nullable_defines.contains(&name));

        let next = *first.attrs.get(&(ns, local)).expect("missing transition");
        let second = &sut.states()[next.as_index()];

        assert!(second.nullable);
        assert!(second.attrs.is_empty());
        assert!(second.nullable_defines.contains(&name));
    }

    #[test]
    fn sequence_of_children_chains_states() {
        let syms = SymbolInterner::new();
        let pats = PatternArena::new();
        let mut sut = Sut::new(&pats);

        let name = syms.intern("R");
        let a = syms.intern("A");
        let b = syms.intern("B");

        let seq = pats.group(pats.ref_to(a), pats.ref_to(b));
        let body = pats.define(name, seq);

        let start = sut.simulate(body);
        let first = &sut.states()[start.as_index()];

        // Only `A` may come first.
        assert_eq!(1, first.children.len());
        let mid = *first.children.get(&a).expect("missing A transition");

        let second = &sut.states()[mid.as_index()];
        assert!(!second.nullable);
        let last = *second.children.get(&b).expect("missing B transition");

        let third = &sut.states()[last.as_index()];
        assert!(third.nullable);
        assert!(third.children.is_empty());
        assert!(third.nullable_defines.contains(&name));
    }

    #[test]
    fn recursive_define_terminates_and_reuses_states() {
        let syms = SymbolInterner::new();
        let pats = PatternArena::new();
        let mut sut = Sut::new(&pats);

        let name = syms.intern("T");

        // T = empty | ref T
        let body = pats.choice(pats.empty(), pats.ref_to(name));
        let root = pats.define(name, body);

        let start = sut.simulate(root);

        assert_eq!(2, sut.states().len());

        let first = &sut.states()[start.as_index()];
        assert!(first.nullable);
        assert!(first.nullable_defines.contains(&name));

        let next = *first.children.get(&name).expect("missing transition");
        let second = &sut.states()[next.as_index()];
        assert!(second.nullable);
        assert!(second.children.is_empty());
    }

    #[test]
    fn states_are_shared_across_simulations() {
        let syms = SymbolInterner::new();
        let pats = PatternArena::new();
        let mut sut = Sut::new(&pats);

        let name = syms.intern("A");
        let body = pats.define(name, pats.empty());

        let first = sut.simulate(body);
        let second = sut.simulate(body);

        assert_eq!(first, second);
        assert_eq!(1, sut.states().len());
    }

    #[test]
    fn optional_attribute_accepts_before_and_after() {
        let syms = SymbolInterner::new();
        let pats = PatternArena::new();
        let mut sut = Sut::new(&pats);

        let name = syms.intern("A");
        let ns = syms.intern("");
        let local = syms.intern("a");

        let attr = pats.attribute(ns, local);
        let body = pats.define(name, pats.optional(attr));

        let start = sut.simulate(body);

        assert_eq!(2, sut.states().len());

        let first = &sut.states()[start.as_index()];
        assert!(first.nullable);

        let next = *first.attrs.get(&(ns, local)).expect("missing transition");
        let second = &sut.states()[next.as_index()];
        assert!(second.nullable);
        assert!(second.attrs.is_empty());
    }
}
