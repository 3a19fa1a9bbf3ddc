//! Error types for the xsbug transport layer.

use std::io;

/// Errors raised while turning protocol text into typed values.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The document root is not the `<xsbug>` container.
    #[error("not an xsbug document (root element `{root}`)")]
    NotXsbug {
        /// Name of the root element that was found instead.
        root: String,
    },

    /// The text is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A required attribute is absent.
    #[error("`{element}` is missing attribute `{attribute}`")]
    MissingAttribute {
        /// Element the attribute belongs to.
        element: String,
        /// Name of the missing attribute.
        attribute: &'static str,
    },

    /// An attribute or body that should hold an integer does not.
    #[error("`{element}` has non-integer `{attribute}`: {value:?}")]
    InvalidInteger {
        /// Element carrying the value.
        element: String,
        /// Attribute name, or `#text` for element content.
        attribute: &'static str,
        /// The offending text.
        value: String,
    },

    /// A command body names no known command.
    #[error("unknown command `{tag}`")]
    UnknownCommand {
        /// Tag of the unrecognised command element.
        tag: String,
    },

    /// The framed bytes are not valid UTF-8.
    #[error("invalid UTF-8 in frame")]
    InvalidUtf8,
}

/// Errors that can occur while framing xsbug traffic on a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A complete frame was found but its contents did not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// No frame terminator was seen within the configured limit.
    #[error("frame size {size} exceeds maximum allowed {max}")]
    MessageTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// The maximum allowed size.
        max: usize,
    },
}
