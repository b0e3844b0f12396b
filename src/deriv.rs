// Pattern derivatives
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

//! Brzozowski-style derivative engine.
//!
//! [`deriv`] answers:
//!   after consuming one input token matching the leaf pattern `tok`,
//!   what pattern recognizes the remaining language of `p`?
//! Tokens are themselves patterns,
//!   restricted to the leaf kinds
//!     [`Ref`](PatternKind::Ref),
//!     [`Attribute`](PatternKind::Attribute),
//!     [`NsName`](PatternKind::NsName), and
//!     [`LnName`](PatternKind::LnName).
//!
//! Every rule builds its result through the smart constructors,
//!   so derivatives are canonical and the closure of a pattern under
//!   derivation stays finite.
//! No memoization is performed here;
//!   intermediate results already deduplicate through the arena.
//!
//! [`Element`](PatternKind::Element) has no derivative:
//!   elements appear only as a define's immediate pattern and are
//!   discharged by the simulator,
//!     which derives their bodies instead.

use crate::pattern::{PatternArena, PatternId, PatternKind};

/// Derivative of `p` with respect to one token matching `tok`.
pub fn deriv(pats: &PatternArena, p: PatternId, tok: PatternId) -> PatternId {
    use PatternKind::*;

    match pats.kind(p) {
        NotAllowed | Empty | Text => pats.not_allowed(),

        Ref(name) => match pats.kind(tok) {
            Ref(tok_name) if tok_name == name => pats.empty(),
            _ => pats.not_allowed(),
        },

        // Attribute tokens match on the local name alone; the
        // namespace does not participate.
        Attribute(_, name) => match pats.kind(tok) {
            Attribute(_, tok_name) if tok_name == name => pats.empty(),
            _ => pats.not_allowed(),
        },

        NsName(ns) => match pats.kind(tok) {
            NsName(tok_ns) if tok_ns == ns => pats.empty(),
            _ => pats.not_allowed(),
        },

        LnName(name) => match pats.kind(tok) {
            LnName(tok_name) if tok_name == name => pats.empty(),
            _ => pats.not_allowed(),
        },

        AnyName => pats.any_name(),

        OneOrMore(x) => {
            let dx = deriv(pats, x, tok);
            let rest = pats.optional(p);
            pats.group(dx, rest)
        }

        Choice(a, b) => {
            let da = deriv(pats, a, tok);
            let db = deriv(pats, b, tok);
            pats.choice(da, db)
        }

        And(a, b) => {
            let da = deriv(pats, a, tok);
            let db = deriv(pats, b, tok);
            pats.and(da, db)
        }

        Not(x) => {
            let dx = deriv(pats, x, tok);
            pats.not(dx)
        }

        Interleave(a, b) => {
            let da = deriv(pats, a, tok);
            let db = deriv(pats, b, tok);
            let left = pats.interleave(da, b);
            let right = pats.interleave(a, db);
            pats.choice(left, right)
        }

        Define(name, x) => {
            let dx = deriv(pats, x, tok);
            pats.define(name, dx)
        }

        Group(a, b) => {
            let da = deriv(pats, a, tok);

            if matches!(pats.kind(tok), Attribute(..)) {
                // Attributes are unordered within a group; either side
                // may consume them.
                let db = deriv(pats, b, tok);
                let left = pats.group(da, b);
                let right = pats.group(a, db);
                pats.choice(left, right)
            } else if pats.is_nullable(a) {
                let db = deriv(pats, b, tok);
                let cont = pats.group(da, b);
                pats.choice(db, cont)
            } else {
                pats.group(da, b)
            }
        }

        Element(..) => unreachable!(
            "internal error: element pattern in derivative position"
        ),
    }
}
