//! A minimal element tree over `quick-xml`, enough for the vintf schemas.
//!
//! Leaf text is kept as written. Whitespace between child elements is
//! dropped, as are comments and declarations. Attribute order is preserved.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlError {
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: String, message: String },
    #[error("XML document has no root element")]
    NoRoot,
    #[error("XML document has more than one root element")]
    MultipleRoots,
    #[error("failed to write XML: {0}")]
    Write(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// `<name>text</name>`.
    pub fn text_node(name: &str, text: impl Into<String>) -> Self {
        Self {
            name: name.to_owned(),
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.push((key.to_owned(), value.into()));
        self
    }

    pub fn push(&mut self, child: Self) {
        self.children.push(child);
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child called `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

fn malformed(position: u64, message: impl ToString) -> XmlError {
    XmlError::Malformed {
        position: position.to_string(),
        message: message.to_string(),
    }
}

fn start_to_element(start: &BytesStart<'_>, position: u64) -> Result<Element, XmlError> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(position, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(position, e))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_some() => Err(XmlError::MultipleRoots),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

pub fn parse_document(text: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        let position = u64::try_from(reader.buffer_position()).unwrap_or(u64::MAX);
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(start_to_element(&start, position)?),
            Ok(Event::Empty(start)) => {
                let element = start_to_element(&start, position)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| malformed(position, "unexpected closing tag"))?;
                if !element.children.is_empty() {
                    element.text = element.text.trim().to_owned();
                }
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| malformed(position, e))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(position, e)),
        }
    }
    if !stack.is_empty() {
        return Err(malformed(text.len() as u64, "unclosed element at end of input"));
    }
    root.ok_or(XmlError::NoRoot)
}

fn write_err(e: impl std::fmt::Display) -> XmlError {
    XmlError::Write(e.to_string())
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && element.text.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_err);
    }
    writer.write_event(Event::Start(start)).map_err(write_err)?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(write_err)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_err)
}

/// Serialize with four-space indentation and a trailing newline.
pub fn write_document(root: &Element) -> Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    write_element(&mut writer, root)?;
    let mut out = String::from_utf8(writer.into_inner()).map_err(write_err)?;
    out.push('\n');
    Ok(out)
}
