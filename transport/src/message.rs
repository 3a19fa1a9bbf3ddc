//! Inbound messages decoded from `<xsbug>` documents.

use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions};

/// One message carried by an `<xsbug>` document.
///
/// A single document can carry several messages; they are yielded in the
/// order the engine wrote them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugMessage {
    Login(Login),
    Break(Break),
    /// Instrument samples, one value per registered instrument.
    Samples(Vec<i64>),
    /// The current call stack, innermost frame first.
    Frames(Vec<Frame>),
    Local(Local),
    Global(Vec<Property>),
    /// Module table (`<grammar>` on the wire).
    Module(Vec<Property>),
    Log(String),
    Instruments(Vec<Instrument>),
    /// A well-formed element the client does not understand.
    Unknown { tag: String },
}

impl DebugMessage {
    /// The element name this message was decoded from.
    pub fn tag(&self) -> &str {
        match self {
            Self::Login(_) => "login",
            Self::Break(_) => "break",
            Self::Samples(_) => "samples",
            Self::Frames(_) => "frames",
            Self::Local(_) => "local",
            Self::Global(_) => "global",
            Self::Module(_) => "grammar",
            Self::Log(_) => "log",
            Self::Instruments(_) => "instruments",
            Self::Unknown { tag } => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub name: String,
    pub value: String,
}

/// The engine stopped at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Break {
    pub path: String,
    pub line: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub line: u32,
}

/// A stack frame, or the frame header of a `<local>` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub name: String,
    /// Frame id, used by the `select` command.
    pub value: String,
    /// Present only when the frame has both a path and a line.
    pub location: Option<Location>,
}

/// Variables of the selected frame. Properties keep engine order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub frame: Frame,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub name: String,
    pub value: String,
}

/// A named value in a variable tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: Option<String>,
    pub flags: Flags,
    /// Sorted child properties, present only if the engine expanded this node.
    pub children: Option<Vec<Property>>,
}

/// Property permissions derived from the flags attribute.
///
/// A letter present in the raw string revokes the matching permission:
/// `C` revokes delete, `E` revokes enumerate and `W` revokes set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Flags {
    pub raw: String,
    pub deletable: bool,
    pub enumerable: bool,
    pub writable: bool,
}

impl Flags {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_owned(),
            deletable: !raw.contains('C'),
            enumerable: !raw.contains('E'),
            writable: !raw.contains('W'),
        }
    }
}

thread_local! {
    static COLLATOR: Option<Collator> =
        Collator::try_new(&Default::default(), CollatorOptions::new()).ok();
}

/// Order names the way a user-facing variable list expects: Unicode
/// collation at the root locale, so `éclair` sorts next to `eclair` and
/// punctuation such as `_` comes before symbols such as `$`.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    })
}

/// Stable sort of a property list by [`locale_cmp`] on names.
pub fn sort_properties(properties: &mut [Property]) {
    properties.sort_by(|a, b| locale_cmp(&a.name, &b.name));
}
