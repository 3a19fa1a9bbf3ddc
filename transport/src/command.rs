//! Outbound debugger commands.
//!
//! Every command is a single XML element. On the wire the element is wrapped
//! in a CRLF pair on both sides; the peer parser relies on both delimiters.

use std::fmt;

use crate::decode::{attribute, integer_attribute};
use crate::error::DecodeError;

/// Delimiter written immediately before and after every command body.
pub const CRLF: &str = "\r\n";

/// Reserved breakpoint path that toggles break-on-exception.
pub const EXCEPTIONS_PATH: &str = "exceptions";

/// Reserved breakpoint path that toggles break-on-start.
pub const START_PATH: &str = "start";

/// A source location the engine should stop at.
///
/// Two reserved paths, [`EXCEPTIONS_PATH`] and [`START_PATH`], do not name a
/// source line but switch on the matching break trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    pub path: String,
    pub line: u32,
}

impl Breakpoint {
    pub fn new(path: impl Into<String>, line: u32) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }

    /// Sentinel enabling break-on-exception.
    pub fn exceptions() -> Self {
        Self::new(EXCEPTIONS_PATH, 0)
    }

    /// Sentinel enabling break-on-start.
    pub fn start() -> Self {
        Self::new(START_PATH, 0)
    }

    pub fn is_sentinel(&self) -> bool {
        self.path == EXCEPTIONS_PATH || self.path == START_PATH
    }
}

/// A command sent from the debugger client to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ClearBreakpoint(Breakpoint),
    SetBreakpoint(Breakpoint),
    Go,
    /// Select the stack frame with the given id.
    Select(String),
    /// Replace every breakpoint on the engine, sentinels included.
    SetAllBreakpoints(Vec<Breakpoint>),
    Step,
    StepInside,
    StepOutside,
    /// Expand or collapse the property with the given id.
    Toggle(String),
}

impl Command {
    /// Build a `set-all-breakpoints` command.
    ///
    /// The start sentinel comes first when requested, then the exceptions
    /// sentinel, then `breakpoints` in the order given.
    pub fn set_all_breakpoints(
        breakpoints: impl IntoIterator<Item = Breakpoint>,
        exceptions: bool,
        start: bool,
    ) -> Self {
        let mut all = Vec::new();
        if start {
            all.push(Breakpoint::start());
        }
        if exceptions {
            all.push(Breakpoint::exceptions());
        }
        all.extend(breakpoints);
        Self::SetAllBreakpoints(all)
    }

    /// Element name of the command on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ClearBreakpoint(_) => "clear-breakpoint",
            Self::SetBreakpoint(_) => "set-breakpoint",
            Self::Go => "go",
            Self::Select(_) => "select",
            Self::SetAllBreakpoints(_) => "set-all-breakpoints",
            Self::Step => "step",
            Self::StepInside => "step-inside",
            Self::StepOutside => "step-outside",
            Self::Toggle(_) => "toggle",
        }
    }

    /// The framed command text: CRLF, body, CRLF.
    pub fn encode(&self) -> String {
        format!("{CRLF}{self}{CRLF}")
    }

    /// Parse a command body, with or without its surrounding CRLF pair.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let document = roxmltree::Document::parse(text.trim())?;
        let root = document.root_element();

        let command = match root.tag_name().name() {
            "clear-breakpoint" => Self::ClearBreakpoint(parse_breakpoint(root)?),
            "set-breakpoint" => Self::SetBreakpoint(parse_breakpoint(root)?),
            "go" => Self::Go,
            "select" => Self::Select(attribute(root, "id")?.to_owned()),
            "set-all-breakpoints" => Self::SetAllBreakpoints(
                root.children()
                    .filter(|node| node.has_tag_name("breakpoint"))
                    .map(parse_breakpoint)
                    .collect::<Result<_, _>>()?,
            ),
            "step" => Self::Step,
            "step-inside" => Self::StepInside,
            "step-outside" => Self::StepOutside,
            "toggle" => Self::Toggle(attribute(root, "id")?.to_owned()),
            other => {
                return Err(DecodeError::UnknownCommand {
                    tag: other.to_owned(),
                })
            }
        };
        Ok(command)
    }
}

fn parse_breakpoint(node: roxmltree::Node<'_, '_>) -> Result<Breakpoint, DecodeError> {
    Ok(Breakpoint {
        path: attribute(node, "path")?.to_owned(),
        line: integer_attribute(node, "line")?,
    })
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClearBreakpoint(breakpoint) | Self::SetBreakpoint(breakpoint) => {
                write!(f, "<{}", self.tag())?;
                write_location(f, breakpoint)?;
                f.write_str("/>")
            }
            Self::Select(id) | Self::Toggle(id) => {
                write!(f, "<{} id=\"", self.tag())?;
                write_escaped(f, id)?;
                f.write_str("\"/>")
            }
            Self::SetAllBreakpoints(breakpoints) => {
                f.write_str("<set-all-breakpoints>")?;
                for breakpoint in breakpoints {
                    f.write_str("<breakpoint")?;
                    write_location(f, breakpoint)?;
                    f.write_str("/>")?;
                }
                f.write_str("</set-all-breakpoints>")
            }
            Self::Go | Self::Step | Self::StepInside | Self::StepOutside => {
                write!(f, "<{}/>", self.tag())
            }
        }
    }
}

fn write_location(f: &mut fmt::Formatter<'_>, breakpoint: &Breakpoint) -> fmt::Result {
    f.write_str(" path=\"")?;
    write_escaped(f, &breakpoint.path)?;
    write!(f, "\" line=\"{}\"", breakpoint.line)
}

/// Displays its text escaped for use inside an XML attribute.
#[derive(Debug, Clone, Copy)]
pub struct Escaped<'a>(pub &'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, self.0)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        match c {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' => f.write_str("&quot;")?,
            // raw line breaks would end the CRLF frame early
            '\r' => f.write_str("&#13;")?,
            '\n' => f.write_str("&#10;")?,
            '\t' => f.write_str("&#9;")?,
            c => fmt::Write::write_char(f, c)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EngineCodec;
    use bytes::BytesMut;
    use tokio_util::codec::Decoder;

    #[test]
    fn encode_wraps_body_in_crlf() {
        assert_eq!(Command::Go.encode(), "\r\n<go/>\r\n");
        assert_eq!(Command::StepOutside.encode(), "\r\n<step-outside/>\r\n");
    }

    #[test]
    fn encode_breakpoint_attributes() {
        let cmd = Command::SetBreakpoint(Breakpoint::new("/app/main.js", 51));
        assert_eq!(
            cmd.to_string(),
            r#"<set-breakpoint path="/app/main.js" line="51"/>"#
        );

        let cmd = Command::ClearBreakpoint(Breakpoint::new("main.js", 7));
        assert_eq!(
            cmd.to_string(),
            r#"<clear-breakpoint path="main.js" line="7"/>"#
        );
    }

    #[test]
    fn encode_select_and_toggle() {
        assert_eq!(Command::Select("3".into()).to_string(), r#"<select id="3"/>"#);
        assert_eq!(
            Command::Toggle("@0x1234".into()).to_string(),
            r#"<toggle id="@0x1234"/>"#
        );
    }

    #[test]
    fn set_all_breakpoints_orders_sentinels_first() {
        let cmd = Command::set_all_breakpoints([Breakpoint::new("a.js", 5)], true, true);
        let Command::SetAllBreakpoints(list) = &cmd else {
            panic!("wrong variant: {cmd:?}");
        };
        assert_eq!(
            list,
            &[
                Breakpoint::start(),
                Breakpoint::exceptions(),
                Breakpoint::new("a.js", 5)
            ]
        );
        assert_eq!(
            cmd.to_string(),
            concat!(
                "<set-all-breakpoints>",
                r#"<breakpoint path="start" line="0"/>"#,
                r#"<breakpoint path="exceptions" line="0"/>"#,
                r#"<breakpoint path="a.js" line="5"/>"#,
                "</set-all-breakpoints>"
            )
        );
    }

    #[test]
    fn set_all_breakpoints_without_sentinels() {
        let cmd = Command::set_all_breakpoints(
            [Breakpoint::new("b.js", 2), Breakpoint::new("a.js", 1)],
            false,
            false,
        );
        assert_eq!(
            cmd,
            Command::SetAllBreakpoints(vec![Breakpoint::new("b.js", 2), Breakpoint::new("a.js", 1)])
        );
    }

    #[test]
    fn attribute_values_are_escaped() {
        let cmd = Command::SetBreakpoint(Breakpoint::new(r#"dir "x"/a&b.js"#, 1));
        assert_eq!(
            cmd.to_string(),
            r#"<set-breakpoint path="dir &quot;x&quot;/a&amp;b.js" line="1"/>"#
        );
        assert_eq!(Command::parse(&cmd.encode()).unwrap(), cmd);
    }

    #[test]
    fn line_breaks_in_attributes_stay_inside_the_frame() {
        let cmd = Command::SetBreakpoint(Breakpoint::new("dir\r\nname\t.js", 4));
        let encoded = cmd.encode();
        let body = encoded.trim_start_matches(CRLF).trim_end_matches(CRLF);
        assert!(!body.contains(['\r', '\n']), "{body:?}");
        assert_eq!(Command::parse(&encoded).unwrap(), cmd);

        let mut buf = BytesMut::from(encoded.as_str());
        assert_eq!(EngineCodec::new().decode(&mut buf).unwrap(), Some(cmd));
        assert!(buf.is_empty());
    }

    #[test]
    fn parse_rejects_unknown_command() {
        let err = Command::parse("<launch/>").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownCommand { tag } if tag == "launch"));
    }

    #[test]
    fn parse_requires_line() {
        let err = Command::parse(r#"<set-breakpoint path="a.js"/>"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingAttribute {
                attribute: "line",
                ..
            }
        ));
    }

    #[test]
    fn escaped_display() {
        assert_eq!(Escaped("a<b & \"c\"").to_string(), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn sentinels() {
        assert!(Breakpoint::exceptions().is_sentinel());
        assert!(Breakpoint::start().is_sentinel());
        assert!(!Breakpoint::new("start.js", 0).is_sentinel());
    }
}
