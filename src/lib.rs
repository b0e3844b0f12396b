// srngc: RELAX NG simple-syntax table compiler
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

//! Compiler from RELAX NG "simple syntax" schemas to the lookup tables
//!   of a fast approximate validator.
//!
//! The pipeline, leaves first:
//!
//!   1. [`pattern`] is the hash-consed pattern algebra;
//!   2. [`load`] walks the schema document and builds one pattern per
//!      top-level define through that algebra;
//!   3. [`deriv`] computes Brzozowski-style derivatives over patterns;
//!   4. [`state`] explores per-element derivative closures into shared
//!      automaton states;
//!   5. [`table`] unions the defines matching each qualified element
//!      name and assembles the final `NameMap`/`States` document.
//!
//! Everything is single-threaded and compile-scoped:
//!   the interner, the pattern arena, and the simulator are context
//!   values created per compile,
//!     so compiling schemas in parallel simply means independent
//!     contexts.
//!
//! See the `srngc` binary for the command-line interface.

pub mod deriv;
pub mod load;
pub mod pattern;
pub mod state;
pub mod sym;
pub mod table;
