//! Testing utilities for the transport layer.
//!
//! Helpers for building inbound documents as an engine would send them, and
//! an in-memory transport for wiring a debugger to a fake engine.

mod memory;

pub use memory::MemoryTransport;

/// Wrap message elements in an `<xsbug>` document.
///
/// ```
/// use transport::testing::document;
///
/// let doc = document(&[r#"<login name="mod" value="1"/>"#]);
/// assert_eq!(doc, r#"<xsbug><login name="mod" value="1"/></xsbug>"#);
/// ```
pub fn document(children: &[&str]) -> String {
    let mut doc = String::from("<xsbug>");
    for child in children {
        doc.push_str(child);
    }
    doc.push_str("</xsbug>");
    doc
}

/// A document framed with CRLF on both sides, ready to feed a reader.
pub fn frame_document(children: &[&str]) -> Vec<u8> {
    format!("\r\n{}\r\n", document(children)).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_document;
    use crate::message::DebugMessage;

    #[test]
    fn test_document() {
        let messages = decode_document(&document(&["<log>a</log>", "<log>b</log>"])).unwrap();
        assert_eq!(
            messages,
            vec![DebugMessage::Log("a".into()), DebugMessage::Log("b".into())]
        );
    }

    #[test]
    fn test_frame_document() {
        let bytes = frame_document(&[]);
        assert_eq!(bytes, b"\r\n<xsbug></xsbug>\r\n");
    }
}
