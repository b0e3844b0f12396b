// String interner
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

//! Compile-scoped string internment.
//!
//! Schema names and namespace URIs are hashed and compared constantly
//!   while interning patterns and exploring derivatives,
//!     so they are interned once and handled as [`SymbolId`]s
//!     thereafter.
//! The pool lives only as long as one compile;
//!   compiling multiple schemas concurrently means independent pools,
//!     and symbols from different pools must not be mixed.

use fxhash::FxBuildHasher;
use static_assertions::assert_eq_size;
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::rc::Rc;

/// Unique identifier for an interned string.
///
/// The id `0` is never valid,
///   so `Option<SymbolId>` costs no more space than [`SymbolId`]
///   itself.
/// Ids are allocated densely beginning at `1` in interning order,
///   which also makes them a deterministic sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(NonZeroU32);
assert_eq_size!(Option<SymbolId>, SymbolId);

impl SymbolId {
    fn from_index(index: usize) -> Self {
        Self(
            u32::try_from(index)
                .ok()
                .and_then(NonZeroU32::new)
                .expect("internal error: SymbolId range exhausted"),
        )
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Create, store, compare, and retrieve interned strings.
///
/// The same [`SymbolId`] is always returned for a given string,
///   allowing symbols to be compared for equality cheaply by comparing
///   integers.
/// The interner employs interior mutability and so does not need to be
///   declared `mut`.
pub struct SymbolInterner {
    /// Interned strings by [`SymbolId`] index.
    ///
    /// The first slot is populated during initialization so that no
    ///   symbol is ever assigned the invalid id `0`.
    strings: RefCell<Vec<Rc<str>>>,

    /// Map of interned strings to their respective [`SymbolId`].
    map: RefCell<HashMap<Rc<str>, SymbolId, FxBuildHasher>>,
}

impl SymbolInterner {
    pub fn new() -> Self {
        Self {
            strings: RefCell::new(vec![Rc::from("")]),
            map: RefCell::new(HashMap::default()),
        }
    }

    /// Intern a string slice or return an existing [`SymbolId`].
    pub fn intern(&self, value: &str) -> SymbolId {
        if let Some(&sym) = self.map.borrow().get(value) {
            return sym;
        }

        let mut strings = self.strings.borrow_mut();
        let sym = SymbolId::from_index(strings.len());
        let stored: Rc<str> = Rc::from(value);

        self.map.borrow_mut().insert(Rc::clone(&stored), sym);
        strings.push(stored);

        sym
    }

    /// Look up a symbol's string value.
    ///
    /// Panics
    /// ======
    /// Panics if `sym` did not come from this interner.
    pub fn lookup(&self, sym: SymbolId) -> Rc<str> {
        Rc::clone(&self.strings.borrow()[sym.as_index()])
    }

    /// Number of interned strings in this pool.
    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }
}

impl Default for SymbolInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type Sut = SymbolInterner;

    #[test]
    fn recognizes_equal_strings() {
        let a = "foo";
        let b = a.to_string();
        let c = "bar";

        let sut = Sut::new();

        let (ia, ib, ic) = (sut.intern(a), sut.intern(&b), sut.intern(c));

        assert_eq!(ia, ib);
        assert_ne!(ia, ic);
    }

    #[test]
    fn length_increases_with_each_new_intern() {
        let sut = Sut::new();

        assert_eq!(0, sut.len(), "invalid empty len");

        sut.intern("foo");
        assert_eq!(1, sut.len(), "increment len");

        // duplicate
        sut.intern("foo");
        assert_eq!(1, sut.len(), "do not increment len on duplicates");

        sut.intern("bar");
        assert_eq!(2, sut.len(), "increment len (2)");
    }

    #[test]
    fn lookup_returns_interned_value() {
        let sut = Sut::new();

        let sym = sut.intern("foo");
        assert_eq!("foo", &*sut.lookup(sym));
    }

    #[test]
    fn empty_string_is_an_ordinary_symbol() {
        let sut = Sut::new();

        let sym = sut.intern("");
        assert_eq!("", &*sut.lookup(sym));
        assert_eq!(sym, sut.intern(""));
    }

    #[test]
    fn ids_order_by_interning_order() {
        let sut = Sut::new();

        let first = sut.intern("a");
        let second = sut.intern("b");

        assert!(first < second);
    }
}
