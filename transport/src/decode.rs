//! Decoding of inbound `<xsbug>` documents.

use std::str::FromStr;

use roxmltree::Node;

use crate::error::DecodeError;
use crate::message::{
    sort_properties, Break, DebugMessage, Flags, Frame, Instrument, Local, Location, Login,
    Property,
};

/// Name of the root element wrapping every inbound document.
pub const CONTAINER: &str = "xsbug";

/// Decode one `<xsbug>` document into its messages.
///
/// Each element child of the root yields exactly one message, in document
/// order. Unrecognised children become [`DebugMessage::Unknown`]; a root
/// with any other name fails the whole document.
pub fn decode_document(text: &str) -> Result<Vec<DebugMessage>, DecodeError> {
    let document = roxmltree::Document::parse(text.trim())?;
    let root = document.root_element();
    if root.tag_name().name() != CONTAINER {
        return Err(DecodeError::NotXsbug {
            root: root.tag_name().name().to_owned(),
        });
    }

    root.children()
        .filter(Node::is_element)
        .map(decode_message)
        .collect()
}

fn decode_message(node: Node<'_, '_>) -> Result<DebugMessage, DecodeError> {
    let message = match node.tag_name().name() {
        "login" => DebugMessage::Login(Login {
            name: attribute(node, "name")?.to_owned(),
            value: attribute(node, "value")?.to_owned(),
        }),
        "break" => DebugMessage::Break(Break {
            path: attribute(node, "path")?.to_owned(),
            line: integer_attribute(node, "line")?,
            message: text(node),
        }),
        "samples" => DebugMessage::Samples(samples(node)?),
        "frames" => DebugMessage::Frames(
            elements(node, "frame")
                .map(frame)
                .collect::<Result<_, _>>()?,
        ),
        "local" => DebugMessage::Local(Local {
            frame: frame(node)?,
            properties: properties(node)?,
        }),
        "global" => DebugMessage::Global(sorted_properties(node)?),
        "grammar" => DebugMessage::Module(sorted_properties(node)?),
        "log" => DebugMessage::Log(text(node)),
        "instruments" => DebugMessage::Instruments(
            elements(node, "instrument")
                .map(|instrument| {
                    Ok(Instrument {
                        name: attribute(instrument, "name")?.to_owned(),
                        value: attribute(instrument, "value")?.to_owned(),
                    })
                })
                .collect::<Result<_, DecodeError>>()?,
        ),
        other => DebugMessage::Unknown {
            tag: other.to_owned(),
        },
    };
    Ok(message)
}

fn frame(node: Node<'_, '_>) -> Result<Frame, DecodeError> {
    let location = match (node.attribute("path"), node.attribute("line")) {
        (Some(path), Some(_)) => Some(Location {
            path: path.to_owned(),
            line: integer_attribute(node, "line")?,
        }),
        _ => None,
    };
    Ok(Frame {
        name: attribute(node, "name")?.to_owned(),
        value: attribute(node, "value")?.to_owned(),
        location,
    })
}

fn property(node: Node<'_, '_>) -> Result<Property, DecodeError> {
    let children = if elements(node, "property").next().is_some() {
        Some(sorted_properties(node)?)
    } else {
        None
    };
    Ok(Property {
        name: attribute(node, "name")?.to_owned(),
        value: node.attribute("value").map(str::to_owned),
        flags: Flags::parse(node.attribute("flags").unwrap_or_default()),
        children,
    })
}

fn properties(node: Node<'_, '_>) -> Result<Vec<Property>, DecodeError> {
    elements(node, "property").map(property).collect()
}

fn sorted_properties(node: Node<'_, '_>) -> Result<Vec<Property>, DecodeError> {
    let mut properties = properties(node)?;
    sort_properties(&mut properties);
    Ok(properties)
}

fn samples(node: Node<'_, '_>) -> Result<Vec<i64>, DecodeError> {
    let body = text(node);
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    body.split(',')
        .map(|sample| {
            sample
                .trim()
                .parse()
                .map_err(|_| DecodeError::InvalidInteger {
                    element: "samples".to_owned(),
                    attribute: "#text",
                    value: sample.to_owned(),
                })
        })
        .collect()
}

fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |child| child.has_tag_name(name))
}

/// Concatenated text of every descendant text node.
fn text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

pub(crate) fn attribute<'a>(
    node: Node<'a, '_>,
    name: &'static str,
) -> Result<&'a str, DecodeError> {
    node.attribute(name)
        .ok_or_else(|| DecodeError::MissingAttribute {
            element: node.tag_name().name().to_owned(),
            attribute: name,
        })
}

pub(crate) fn integer_attribute<T: FromStr>(
    node: Node<'_, '_>,
    name: &'static str,
) -> Result<T, DecodeError> {
    let value = attribute(node, name)?;
    value
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidInteger {
            element: node.tag_name().name().to_owned(),
            attribute: name,
            value: value.to_owned(),
        })
}
