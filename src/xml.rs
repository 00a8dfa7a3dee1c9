//! XML node sink
//!
//! Export writes onto an [`XmlNode`] supplied by the caller; the core never
//! decides where the node lives. [`XmlElement`] is a small owned tree that
//! implements the trait and can be rendered to, or parsed from, XML text.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Attribute naming the plugin family that produced a node
pub const FAMILY_ATTRIBUTE: &str = "xblock-family";

/// XML errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("XML write error: {0}")]
    Write(String),
}

/// Element that export can write onto
pub trait XmlNode {
    fn tag(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<&str>;

    /// Set an attribute, replacing any previous value
    fn set_attribute(&mut self, name: &str, value: &str);

    /// Attribute names in document order
    fn attribute_names(&self) -> Vec<String>;

    fn text(&self) -> Option<&str>;

    fn set_text(&mut self, text: &str);

    fn append_child(&mut self, child: XmlElement);
}

/// Owned XML element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Render as XML text
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.tag.as_str());
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        if self.text.is_none() && self.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        if let Some(text) = &self.text {
            write_event(writer, Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        write_event(writer, Event::End(BytesEnd::new(self.tag.as_str())))
    }

    /// Parse XML text into an element tree
    ///
    /// Whitespace-only text is dropped and any other text is kept exactly as
    /// written. Comments and declarations are skipped.
    pub fn parse(source: &str) -> Result<XmlElement, XmlError> {
        let mut reader = Reader::from_str(source);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| XmlError::Parse(e.to_string()))?;
            match event {
                Event::Start(ref start) => stack.push(Self::from_start(start)?),
                Event::Empty(ref start) => {
                    let element = Self::from_start(start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Parse("unbalanced end tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref text) => {
                    let text = text.unescape().map_err(|e| XmlError::Parse(e.to_string()))?;
                    if text.trim().is_empty() {
                        continue;
                    }
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&text);
                    }
                }
                Event::CData(ref data) => {
                    let text = String::from_utf8_lossy(&data[..]).into_owned();
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Parse("unclosed element".into()));
        }
        root.ok_or_else(|| XmlError::Parse("no root element found".into()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
        let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
            let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::Parse(e.to_string()))?;
            element.attributes.push((name, value.into_owned()));
        }
        Ok(element)
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match &mut self.text {
            Some(existing) => existing.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Write(e.to_string()))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::Parse("multiple root elements".into())),
    }
    Ok(())
}

impl XmlNode for XmlElement {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|(k, _)| k.clone()).collect()
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn set_text(&mut self, text: &str) {
        self.text = Some(text.to_string());
    }

    fn append_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let mut node = XmlElement::new("problem")
            .with_attribute("a", "1")
            .with_attribute("b", "2");
        node.set_attribute("a", "3");

        assert_eq!(node.attribute_names(), vec!["a", "b"]);
        assert_eq!(node.attribute("a"), Some("3"));
        assert_eq!(node.remove_attribute("b"), Some("2".to_string()));
        assert_eq!(node.attribute("b"), None);
    }

    #[test]
    fn test_render_empty_and_nested() {
        let leaf = XmlElement::new("html").with_attribute("url_name", "intro");
        assert_eq!(leaf.to_xml_string().unwrap(), r#"<html url_name="intro"/>"#);

        let mut parent = XmlElement::new("vertical");
        parent.append_child(leaf);
        assert_eq!(
            parent.to_xml_string().unwrap(),
            r#"<vertical><html url_name="intro"/></vertical>"#
        );
    }

    #[test]
    fn test_render_escapes() {
        let mut node = XmlElement::new("p").with_attribute("title", "a \"b\" & c");
        node.set_text("1 < 2");
        let xml = node.to_xml_string().unwrap();
        assert!(xml.contains("&amp;"));
        assert!(xml.contains("1 &lt; 2"));

        let parsed = XmlElement::parse(&xml).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_parse_tree() {
        let parsed = XmlElement::parse(
            r#"<?xml version="1.0"?>
            <vertical display_name="Unit 1">
                <!-- comment -->
                <html url_name="a">Hello</html>
                <problem url_name="b"/>
            </vertical>"#,
        )
        .unwrap();

        assert_eq!(parsed.tag(), "vertical");
        assert_eq!(parsed.attribute("display_name"), Some("Unit 1"));
        assert_eq!(parsed.text(), None);
        assert_eq!(parsed.children().len(), 2);
        assert_eq!(parsed.children()[0].text(), Some("Hello"));
        assert_eq!(parsed.children()[1].attribute("url_name"), Some("b"));
    }

    #[test]
    fn test_text_kept_verbatim() {
        let mut node = XmlElement::new("html");
        node.set_text("  indented\n");
        let parsed = XmlElement::parse(&node.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed.text(), Some("  indented\n"));

        let split = XmlElement::parse("<p> a <!-- note -->b </p>").unwrap();
        assert_eq!(split.text(), Some(" a b "));
    }

    #[test]
    fn test_parse_errors() {
        assert!(XmlElement::parse("").is_err());
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("<a/><b/>").is_err());
    }
}
