// Schema document loader
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

//! RELAX NG simple-syntax loader.
//!
//! Reads a schema document and produces one [`Define`] per top-level
//!   `define`,
//!     with patterns built through the algebra's constructors.
//!
//! The reader builds a small intermediate tree before compiling.
//! The simple syntax nests shallowly,
//!   and the compile step wants random access to children
//!     (an element's leading name class,
//!       an attribute's `name` child),
//!   which a streaming parse would have to buffer anyway.
//!
//! All errors are fatal;
//!   there is no recovery and no partial result.

use crate::pattern::{PatternArena, PatternId, PatternKind};
use crate::sym::{SymbolId, SymbolInterner};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Display;
use std::io::BufRead;
use std::str::{from_utf8, Utf8Error};

/// The RELAX NG structure namespace.
pub const RELAXNG_NS: &str = "http://relaxng.org/ns/structure/1.0";

/// Local names of the simple syntax.
const KNOWN_ELEMENTS: &[&str] = &[
    "define",
    "element",
    "attribute",
    "ref",
    "empty",
    "notAllowed",
    "text",
    "value",
    "data",
    "list",
    "group",
    "choice",
    "interleave",
    "optional",
    "zeroOrMore",
    "oneOrMore",
    "name",
    "anyName",
    "nsName",
    "except",
];

/// One top-level define: an interned name and its compiled pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Define {
    pub name: SymbolId,
    pub pattern: PatternId,
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Wrapped XML error type.
pub type InnerXmlError = quick_xml::Error;

/// Thin wrapper around [`quick_xml::Error`] to implement
///   [`PartialEq`].
///
/// Comparison always yields `false`,
///   which is enough to let error types containing it derive the
///   trait.
#[derive(Debug)]
pub struct XmlError(pub InnerXmlError);

impl PartialEq for XmlError {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl From<InnerXmlError> for XmlError {
    fn from(e: InnerXmlError) -> Self {
        Self(e)
    }
}

impl Display for XmlError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(fmt)
    }
}

impl std::error::Error for XmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Error during schema loading.
#[derive(Debug, PartialEq)]
pub enum LoadError {
    /// XML parsing error.
    XmlError(XmlError),
    /// A name in the document is not valid UTF-8.
    InvalidUtf8(Utf8Error),
    /// An element is not in the RELAX NG structure namespace.
    WrongNamespace(String),
    /// An element has a local name the loader does not recognize.
    UnknownElement(String),
    /// A recognized element appeared somewhere it cannot.
    UnexpectedElement(String),
    /// An `element` appeared somewhere other than as a define's
    ///   immediate pattern.
    ///
    /// The derivative engine discharges elements at define boundaries
    ///   only;
    ///     content models must reach nested elements through `ref`.
    MisplacedElement,
    /// An `attribute` uses a name class other than a single `name`.
    ///
    /// Carries the offending name class's local name,
    ///   or [`None`] if the `attribute` had no children at all.
    UnsupportedAttrNameClass(Option<String>),
    /// A `define` is missing `@name`.
    UnnamedDefine,
    /// A `ref` is missing `@name`.
    UnnamedRef,
    /// An `element` has no name-class child.
    ElementMissingNameClass,
    /// The document contains no root element.
    EmptyDocument,
}

impl From<InnerXmlError> for LoadError {
    fn from(e: InnerXmlError) -> Self {
        Self::XmlError(e.into())
    }
}

impl From<Utf8Error> for LoadError {
    fn from(e: Utf8Error) -> Self {
        Self::InvalidUtf8(e)
    }
}

impl Display for LoadError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::XmlError(e) => e.fmt(fmt),
            Self::InvalidUtf8(e) => {
                write!(fmt, "schema is not valid UTF-8: {e}")
            }
            Self::WrongNamespace(ns) => write!(
                fmt,
                "element is not in the RELAX NG namespace \
                 (found `{ns}`, expected `{RELAXNG_NS}`)"
            ),
            Self::UnknownElement(name) => {
                write!(fmt, "unknown schema element `{name}`")
            }
            Self::UnexpectedElement(name) => {
                write!(fmt, "schema element `{name}` is not permitted here")
            }
            Self::MisplacedElement => write!(
                fmt,
                "element patterns may appear only as a define's \
                 immediate pattern (nest elements through ref)"
            ),
            Self::UnsupportedAttrNameClass(Some(found)) => write!(
                fmt,
                "attribute name classes must be a single `name` \
                 (found `{found}`)"
            ),
            Self::UnsupportedAttrNameClass(None) => {
                write!(fmt, "attribute is missing its name class")
            }
            Self::UnnamedDefine => write!(fmt, "define is missing @name"),
            Self::UnnamedRef => write!(fmt, "ref is missing @name"),
            Self::ElementMissingNameClass => {
                write!(fmt, "element is missing its name class")
            }
            Self::EmptyDocument => {
                write!(fmt, "schema document has no root element")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::XmlError(e) => Some(e),
            Self::InvalidUtf8(e) => Some(e),
            _ => None,
        }
    }
}

/// Parsed schema node.
///
/// Only the attributes the simple syntax actually uses are retained
///   (`@name` on `define`/`ref`, `@ns` on `name`/`nsName`);
///     everything else is dropped during tree building.
struct Node {
    local: String,
    attr_name: Option<String>,
    attr_ns: Option<String>,
    text: String,
    children: Vec<Node>,
}

/// Load all top-level defines from a schema document.
pub fn load_schema<B: BufRead>(
    src: B,
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<Vec<Define>> {
    let root = read_tree(src)?;
    let mut defines = Vec::new();

    // The root's local name is conventionally `grammar` but is not
    // inspected; only its namespace was checked during tree building.
    for child in &root.children {
        match child.local.as_str() {
            "define" => defines.push(compile_define(child, pats, syms)?),

            // The tables are keyed by element qname, so the start
            // pattern cannot contribute to them.
            "start" => (),

            other => return Err(unrecognized(other)),
        }
    }

    Ok(defines)
}

/// Error for an element name that cannot appear in this position.
fn unrecognized(name: &str) -> LoadError {
    if KNOWN_ELEMENTS.contains(&name) {
        LoadError::UnexpectedElement(name.into())
    } else {
        LoadError::UnknownElement(name.into())
    }
}

fn read_tree<B: BufRead>(src: B) -> LoadResult<Node> {
    let mut reader = Reader::from_reader(src);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut nsbuf = Vec::new();
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_namespaced_event(&mut buf, &mut nsbuf)? {
            (ns, Event::Start(ele)) => {
                stack.push(node_from(ns, &ele)?);
            }

            (ns, Event::Empty(ele)) => {
                let node = node_from(ns, &ele)?;
                attach(&mut stack, &mut root, node);
            }

            (_, Event::End(_)) => {
                let node = stack
                    .pop()
                    .expect("internal error: unbalanced element nesting");
                attach(&mut stack, &mut root, node);
            }

            (_, Event::Text(text)) => {
                if let Some(parent) = stack.last_mut() {
                    let unescaped = text.unescaped()?;
                    parent.text.push_str(from_utf8(&unescaped)?);
                }
            }

            (_, Event::Eof) => break,

            // Declarations, comments, and processing instructions
            // carry nothing of interest.
            _ => (),
        }

        buf.clear();
    }

    root.ok_or(LoadError::EmptyDocument)
}

fn attach(stack: &mut Vec<Node>, root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            root.get_or_insert(node);
        }
    }
}

fn node_from(ns: Option<&[u8]>, ele: &BytesStart) -> LoadResult<Node> {
    match ns {
        Some(ns) if ns == RELAXNG_NS.as_bytes() => (),
        _ => {
            return Err(LoadError::WrongNamespace(
                String::from_utf8_lossy(ns.unwrap_or_default()).into_owned(),
            ))
        }
    }

    let local = from_utf8(ele.local_name())?.to_string();

    let mut attr_name = None;
    let mut attr_ns = None;

    for attr in ele.attributes().with_checks(false).filter_map(Result::ok) {
        match attr.key {
            b"name" => attr_name = Some(attr_value(&attr)?),
            b"ns" => attr_ns = Some(attr_value(&attr)?),
            _ => (),
        }
    }

    Ok(Node {
        local,
        attr_name,
        attr_ns,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attr_value(attr: &Attribute) -> LoadResult<String> {
    let value = attr.unescaped_value()?;
    Ok(from_utf8(&value)?.to_string())
}

fn compile_define(
    node: &Node,
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<Define> {
    let name = node.attr_name.as_deref().ok_or(LoadError::UnnamedDefine)?;

    // An element is permitted only here, as the define's immediate
    // pattern; see `MisplacedElement`.
    let pattern = match node.children.as_slice() {
        [only] if only.local == "element" => {
            compile_element(only, pats, syms)?
        }
        children => compile_group(children, pats, syms)?,
    };

    Ok(Define {
        name: syms.intern(name),
        pattern,
    })
}

fn compile_element(
    node: &Node,
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<PatternId> {
    let (head, rest) = node
        .children
        .split_first()
        .ok_or(LoadError::ElementMissingNameClass)?;

    let name_class = compile_name_class(head, pats, syms)?;
    let body = compile_group(rest, pats, syms)?;

    Ok(pats.element(name_class, body))
}

/// Right-fold pattern children through `Group`.
///
/// The `Empty` terminator vanishes as a unit,
///   so a single child folds to itself and no children fold to
///   `Empty`.
fn compile_group(
    children: &[Node],
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<PatternId> {
    let mut folded = pats.empty();

    for child in children.iter().rev() {
        let p = compile_pattern(child, pats, syms)?;
        folded = pats.group(p, folded);
    }

    Ok(folded)
}

fn compile_pattern(
    node: &Node,
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<PatternId> {
    match node.local.as_str() {
        "empty" => Ok(pats.empty()),
        "notAllowed" => Ok(pats.not_allowed()),

        // Character data is universally acceptable; datatype, value,
        // and list constraints are not enforced, and their content is
        // not inspected.
        "text" | "value" | "data" | "list" => Ok(pats.text()),

        "ref" => {
            let name =
                node.attr_name.as_deref().ok_or(LoadError::UnnamedRef)?;
            Ok(pats.ref_to(syms.intern(name)))
        }

        "group" => compile_group(&node.children, pats, syms),

        "choice" => {
            let mut folded = pats.not_allowed();

            for child in node.children.iter().rev() {
                let p = compile_pattern(child, pats, syms)?;
                folded = pats.choice(p, folded);
            }

            Ok(folded)
        }

        "interleave" => {
            let mut folded = pats.empty();

            for child in node.children.iter().rev() {
                let p = compile_pattern(child, pats, syms)?;
                folded = pats.interleave(p, folded);
            }

            Ok(folded)
        }

        "optional" => {
            let body = compile_group(&node.children, pats, syms)?;
            Ok(pats.optional(body))
        }

        "zeroOrMore" => {
            let body = compile_group(&node.children, pats, syms)?;
            let repeated = pats.one_or_more(body);
            Ok(pats.optional(repeated))
        }

        "oneOrMore" => {
            let body = compile_group(&node.children, pats, syms)?;
            Ok(pats.one_or_more(body))
        }

        // Deriving an element has no meaning, so one may not appear
        // inside a content model; only a define's immediate pattern
        // may be an element, and `ref` reaches it from elsewhere.
        "element" => Err(LoadError::MisplacedElement),

        "attribute" => compile_attribute(node, pats, syms),

        other => Err(unrecognized(other)),
    }
}

/// Compile an `attribute` construct to its leaf pattern.
///
/// Only the exact-name class is supported for attributes,
///   and the value pattern is discarded:
///     any attribute value is acceptable.
fn compile_attribute(
    node: &Node,
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<PatternId> {
    match node.children.first() {
        Some(name) if name.local == "name" => {
            let ns = name.attr_ns.as_deref().unwrap_or("");
            Ok(pats
                .attribute(syms.intern(ns), syms.intern(name.text.trim())))
        }

        Some(other) => Err(LoadError::UnsupportedAttrNameClass(Some(
            other.local.clone(),
        ))),

        None => Err(LoadError::UnsupportedAttrNameClass(None)),
    }
}

fn compile_name_class(
    node: &Node,
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<PatternId> {
    match node.local.as_str() {
        "name" => {
            let ns = syms.intern(node.attr_ns.as_deref().unwrap_or(""));
            let local = syms.intern(node.text.trim());

            let ns_leaf = pats.ns_name(ns);
            let local_leaf = pats.ln_name(local);
            Ok(pats.group(ns_leaf, local_leaf))
        }

        "anyName" => with_except(node, pats.any_name(), pats, syms),

        // A bare namespace leaf would consume only the namespace token
        // of a qname probe; pairing it with `AnyName` accepts every
        // local name within the namespace.
        "nsName" => {
            let ns = syms.intern(node.attr_ns.as_deref().unwrap_or(""));

            let ns_leaf = pats.ns_name(ns);
            let any = pats.any_name();
            let base = pats.group(ns_leaf, any);

            with_except(node, base, pats, syms)
        }

        "choice" => {
            let mut folded = pats.not_allowed();

            for child in node.children.iter().rev() {
                let nc = compile_name_class(child, pats, syms)?;
                folded = pats.choice(nc, folded);
            }

            Ok(folded)
        }

        other => Err(unrecognized(other)),
    }
}

/// Wrap `base` with any `except` children: `And(base, Not(excluded))`.
fn with_except(
    node: &Node,
    base: PatternId,
    pats: &PatternArena,
    syms: &SymbolInterner,
) -> LoadResult<PatternId> {
    let mut excluded = pats.not_allowed();

    for child in node.children.iter().rev() {
        if child.local != "except" {
            return Err(unrecognized(&child.local));
        }

        for nc in child.children.iter().rev() {
            let p = compile_name_class(nc, pats, syms)?;
            excluded = pats.choice(p, excluded);
        }
    }

    if matches!(pats.kind(excluded), PatternKind::NotAllowed) {
        return Ok(base);
    }

    let negated = pats.not(excluded);
    Ok(pats.and(base, negated))
}
