// Validation table construction
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

//! Global table builder.
//!
//! For every qualified name that any element name class in the schema
//!   could accept,
//!     the builder simulates the union of the matching defines and
//!     records the resulting start state in the name map.
//!
//! Child transitions are then rewritten from define names to the
//!   start-state ids of the child elements themselves.
//! A validator matching an element against all defines admitting its
//!   tag cannot know up front which define a child fulfills,
//!     but after recursing it knows the child's start state,
//!     and that state's satisfied defines identify the transition to
//!     take;
//!       the parent's transition table is therefore keyed by child
//!       state id rather than by tag.
//!
//! Output maps are `BTreeMap`s so that keys serialize in lexicographic
//!   order and repeated compiles of one schema are byte-identical.

use crate::deriv::deriv;
use crate::load::Define;
use crate::pattern::{PatternArena, PatternId, PatternKind};
use crate::state::{Simulator, StateId};
use crate::sym::{SymbolId, SymbolInterner};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// Compiled output document.
#[derive(Debug, PartialEq, Serialize)]
pub struct Tables {
    /// Start-state ids by namespace and local name.
    #[serde(rename = "NameMap")]
    pub name_map: BTreeMap<String, BTreeMap<String, u32>>,

    /// States by id; slot `0` is the null placeholder.
    #[serde(rename = "States")]
    pub states: Vec<Option<StateEntry>>,
}

/// One emitted state.
#[derive(Debug, PartialEq, Serialize)]
pub struct StateEntry {
    /// Successors by attribute key:
    ///   `local` for the empty namespace,
    ///   `{ns}local` otherwise.
    #[serde(rename = "Attributes")]
    pub attributes: BTreeMap<String, u32>,

    #[serde(rename = "IsNullable")]
    pub is_nullable: bool,

    /// Successors keyed by the _child element's_ start-state id,
    ///   stringified.
    #[serde(rename = "ChildElems")]
    pub child_elems: BTreeMap<String, u32>,
}

/// Table construction failure.
#[derive(Debug, PartialEq, Eq)]
pub enum BuildError {
    /// Two defines of one content model are witnessed by the same
    ///   child start state but disagree on the successor.
    ///
    /// The schema is ambiguous:
    ///   a child beginning in that state could fulfill either define,
    ///   and the parent would not know how to continue.
    AmbiguousChildTransition {
        /// State holding the conflicting transition.
        state: u32,
        /// Child start-state id serving as the transition key.
        child: u32,
        /// The two conflicting successor ids.
        a: u32,
        b: u32,
    },
}

impl Display for BuildError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::AmbiguousChildTransition { state, child, a, b } => write!(
                fmt,
                "ambiguous schema: in state {state}, a child starting \
                 in state {child} may continue to either state {a} or \
                 state {b}"
            ),
        }
    }
}

impl std::error::Error for BuildError {}

/// Build the full output document for the loaded schema.
pub fn build(
    pats: &PatternArena,
    syms: &SymbolInterner,
    defines: &[Define],
) -> Result<Tables, BuildError> {
    let (namespaces, localnames) = name_alphabet(pats, defines);

    let mut sim = Simulator::new(pats);
    let mut name_map: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();

    for &ns in &namespaces {
        let ns_tok = pats.ns_name(ns);

        for &local in &localnames {
            let local_tok = pats.ln_name(local);

            let union = match matching_union(pats, defines, ns_tok, local_tok)
            {
                Some(union) => union,
                None => continue,
            };

            let start = sim.simulate(union);

            name_map
                .entry(syms.lookup(ns).to_string())
                .or_default()
                .insert(syms.lookup(local).to_string(), start.get());
        }
    }

    emit(syms, &sim, name_map)
}

/// Namespaces and local names occurring in any define's element name
///   class, in document order.
///
/// The cross product of these is the set of qualified names the
///   builder probes;
///     collection order fixes state numbering,
///     so it must stay deterministic.
fn name_alphabet(
    pats: &PatternArena,
    defines: &[Define],
) -> (Vec<SymbolId>, Vec<SymbolId>) {
    let mut namespaces = Vec::new();
    let mut localnames = Vec::new();

    for def in defines {
        if let PatternKind::Element(name_class, _) = pats.kind(def.pattern) {
            pats.for_each_subpattern(name_class, |id| match pats.kind(id) {
                PatternKind::NsName(ns) if !namespaces.contains(&ns) => {
                    namespaces.push(ns)
                }
                PatternKind::LnName(name) if !localnames.contains(&name) => {
                    localnames.push(name)
                }
                _ => (),
            });
        }
    }

    (namespaces, localnames)
}

/// Union of all defines whose element name class accepts the probed
///   qualified name,
///     or [`None`] when no name class accepts it.
///
/// A name class accepts a qname iff deriving it by the namespace token
///   and then the local-name token leaves a nullable residual.
fn matching_union(
    pats: &PatternArena,
    defines: &[Define],
    ns_tok: PatternId,
    local_tok: PatternId,
) -> Option<PatternId> {
    let mut matched = Vec::new();

    for def in defines {
        if let PatternKind::Element(name_class, body) = pats.kind(def.pattern)
        {
            let probe =
                deriv(pats, deriv(pats, name_class, ns_tok), local_tok);

            if pats.is_nullable(probe) {
                matched.push((def.name, body));
            }
        }
    }

    if matched.is_empty() {
        return None;
    }

    let mut union = pats.not_allowed();
    for &(name, body) in matched.iter().rev() {
        let member = pats.define(name, body);
        union = pats.choice(member, union);
    }

    Some(union)
}

/// Assemble the final document from the simulated states.
fn emit(
    syms: &SymbolInterner,
    sim: &Simulator,
    name_map: BTreeMap<String, BTreeMap<String, u32>>,
) -> Result<Tables, BuildError> {
    let states = sim.states();

    // Which state ids witness each define as satisfied.
    let mut def_null: BTreeMap<SymbolId, BTreeSet<u32>> = BTreeMap::new();

    for (index, state) in states.iter().enumerate() {
        let id = (index + 1) as u32;

        for &name in &state.nullable_defines {
            def_null.entry(name).or_default().insert(id);
        }
    }

    let mut entries = Vec::with_capacity(states.len() + 1);
    entries.push(None);

    for (index, state) in states.iter().enumerate() {
        let id = (index + 1) as u32;

        let mut attributes = BTreeMap::new();
        for (&(ns, local), &succ) in &state.attrs {
            attributes.insert(attr_key(syms, ns, local), succ.get());
        }

        // Deterministic order so that a collision always reports the
        // same pair.
        let children: BTreeMap<SymbolId, StateId> =
            state.children.iter().map(|(&k, &v)| (k, v)).collect();

        let mut child_elems: BTreeMap<String, u32> = BTreeMap::new();

        for (name, succ) in children {
            let witnesses = match def_null.get(&name) {
                Some(witnesses) => witnesses,
                // No element can ever satisfy this define; the
                // transition is unreachable and dropped.
                None => continue,
            };

            for &child in witnesses {
                match child_elems.get(&child.to_string()) {
                    Some(&existing) if existing != succ.get() => {
                        return Err(BuildError::AmbiguousChildTransition {
                            state: id,
                            child,
                            a: existing,
                            b: succ.get(),
                        });
                    }
                    Some(_) => (),
                    None => {
                        child_elems.insert(child.to_string(), succ.get());
                    }
                }
            }
        }

        entries.push(Some(StateEntry {
            attributes,
            is_nullable: state.nullable,
            child_elems,
        }));
    }

    Ok(Tables {
        name_map,
        states: entries,
    })
}

/// Attribute key: `local` for the empty namespace, `{ns}local`
///   otherwise, braces literal.
fn attr_key(syms: &SymbolInterner, ns: SymbolId, local: SymbolId) -> String {
    let ns = syms.lookup(ns);
    let local = syms.lookup(local);

    if ns.is_empty() {
        local.to_string()
    } else {
        format!("{{{ns}}}{local}")
    }
}
