// Table compiler binary
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

//! Command-line interface of the table compiler.
//!
//! `srngc` reads a RELAX NG simple-syntax schema and writes the
//!   compiled validation tables as a JSON document.

extern crate srngc;

use getopts::{Fail, Options};
use srngc::load::{self, LoadError};
use srngc::pattern::PatternArena;
use srngc::sym::SymbolInterner;
use srngc::table::{self, BuildError};
use std::env;
use std::error::Error;
use std::fmt::{self, Display};
use std::fs::{self, File};
use std::io::{self, BufReader};

/// Types of commands.
enum Command {
    /// Compile the schema at the first path into tables at the second.
    Compile(String, String),
    Usage,
}

pub fn main() {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = get_opts();
    let usage =
        opts.usage(&format!("Usage: {} --srng=SCHEMA --out=TABLES", program));

    match parse_options(opts, args) {
        Ok(Command::Compile(src_path, dest_path)) => {
            if let Err(e) = compile(&src_path, &dest_path) {
                eprintln!("error: {e}");
                eprintln!("fatal: failed to compile `{src_path}`");

                std::process::exit(1);
            }
        }

        Ok(Command::Usage) => {
            println!("{}", usage);
            std::process::exit(exitcode::OK);
        }

        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", usage);
            std::process::exit(exitcode::USAGE);
        }
    }
}

/// Compile the schema at `src_path` into tables at `dest_path`.
///
/// The document is serialized in memory first so that the output file
///   is not touched unless the compile has fully succeeded.
fn compile(src_path: &str, dest_path: &str) -> Result<(), UnrecoverableError> {
    let src = BufReader::new(File::open(src_path)?);

    let syms = SymbolInterner::new();
    let pats = PatternArena::new();

    let defines = load::load_schema(src, &pats, &syms)?;
    let tables = table::build(&pats, &syms, &defines)?;

    let mut out = serde_json::to_vec(&tables)?;
    out.push(b'\n');

    fs::write(dest_path, out)?;

    Ok(())
}

fn get_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("", "srng", "path of the schema to compile", "SCHEMA");
    opts.optopt("", "out", "path of the emitted table document", "TABLES");
    opts.optflag("h", "help", "print this help menu");

    opts
}

/// Option parser.
fn parse_options(opts: Options, args: Vec<String>) -> Result<Command, Fail> {
    let matches = opts.parse(&args[1..])?;

    if matches.opt_present("h") {
        return Ok(Command::Usage);
    }

    if let Some(stray) = matches.free.first() {
        return Err(Fail::UnrecognizedOption(stray.clone()));
    }

    let srng = matches
        .opt_str("srng")
        .ok_or_else(|| Fail::OptionMissing("--srng".into()))?;

    let out = matches
        .opt_str("out")
        .ok_or_else(|| Fail::OptionMissing("--out".into()))?;

    Ok(Command::Compile(srng, out))
}

/// Toplevel error representing a failure to complete the requested
///   compilation.
///
/// Every error is fatal:
///   execution aborts with a non-zero status and no output is written.
#[derive(Debug)]
pub enum UnrecoverableError {
    Io(io::Error),
    Load(LoadError),
    Build(BuildError),
    Emit(serde_json::Error),
}

impl From<io::Error> for UnrecoverableError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<LoadError> for UnrecoverableError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<BuildError> for UnrecoverableError {
    fn from(e: BuildError) -> Self {
        Self::Build(e)
    }
}

impl From<serde_json::Error> for UnrecoverableError {
    fn from(e: serde_json::Error) -> Self {
        Self::Emit(e)
    }
}

impl Display for UnrecoverableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => Display::fmt(e, f),
            Self::Load(e) => Display::fmt(e, f),
            Self::Build(e) => Display::fmt(e, f),
            Self::Emit(e) => Display::fmt(e, f),
        }
    }
}

impl Error for UnrecoverableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Load(e) => Some(e),
            Self::Build(e) => Some(e),
            Self::Emit(e) => Some(e),
        }
    }
}
