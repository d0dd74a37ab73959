//! Minimal element tree for query-protocol XML responses

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::CodecError;

/// An XML element with its concatenated text and child elements.
///
/// Namespaces are dropped: elements are keyed by local name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    /// First descendant named `name`, depth first
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                child.find(name)
            }
        })
    }

    /// Every descendant named `name`, in document order
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect(name, found);
        }
    }

    /// Text of the first descendant named `name`
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.find(name).map(|e| e.text.as_str())
    }
}

/// Parse a document into a synthetic root whose children are the top-level elements
pub fn parse(xml: &str) -> Result<Element, CodecError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Element::default()];

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CodecError::Xml(e.to_string()))?;

        match event {
            Event::Start(start) => stack.push(Element::from_start(&start)),
            Event::Empty(start) => {
                let element = Element::from_start(&start);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| CodecError::Xml(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(CodecError::Xml("unbalanced end tag".to_string()));
                }
                if let (Some(element), Some(parent)) = (stack.pop(), stack.last_mut()) {
                    parent.children.push(element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(CodecError::Xml("unclosed element".to_string()));
    }
    stack
        .pop()
        .ok_or_else(|| CodecError::Xml("empty document".to_string()))
}
