use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::document::{Element, NamespaceMap, QName, NS_XML};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("XML parsing error: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("XML writing error: {0}")]
    Write(String),
}

/// Parse document text into an owned, mutable element tree.
///
/// Comments, processing instructions and whitespace-only text are dropped;
/// text of mixed-content elements is concatenated.
pub fn parse(text: &str) -> Result<Element, DocumentError> {
    let doc = roxmltree::Document::parse(text)?;
    Ok(convert(doc.root_element()))
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let name = match tag.namespace() {
        Some(ns) => QName::new(ns, tag.name()),
        None => QName::local(tag.name()),
    };

    let mut element = Element::new(name);
    element.prefix = tag.namespace().and_then(|ns| node.lookup_prefix(ns)).map(str::to_string);
    element.namespaces = declared_namespaces(node);

    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(ns) => QName::new(ns, attr.name()),
            None => QName::local(attr.name()),
        };
        element.attributes.insert(name, attr.value().to_string());
    }

    let text: String = node
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect();
    if !text.trim().is_empty() {
        element.text = Some(text);
    }

    element.children = node
        .children()
        .filter(|child| child.is_element())
        .map(convert)
        .collect();
    element
}

/// roxmltree reports every namespace in scope; keep only those this node introduces
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> NamespaceMap {
    let inherited: Vec<(Option<&str>, &str)> = match node.parent_element() {
        Some(parent) => parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect(),
        None => Vec::new(),
    };

    node.namespaces()
        .filter(|ns| ns.uri() != NS_XML)
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| (ns.name().unwrap_or_default().to_string(), ns.uri().to_string()))
        .collect()
}

/// Serialize an element tree as an indented document with an XML declaration
pub fn to_string(root: &Element) -> Result<String, DocumentError> {
    let mut serializer = Serializer::new();
    serializer.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    serializer.element(root)?;
    serializer.finish()
}

/// Serialize a detached element, declaring the namespaces it inherited
pub fn fragment_to_string(element: &Element, scope: &NamespaceMap) -> Result<String, DocumentError> {
    let mut detached = element.clone();
    for (prefix, uri) in scope {
        detached.namespaces.entry(prefix.clone()).or_insert_with(|| uri.clone());
    }
    let mut serializer = Serializer::new();
    serializer.element(&detached)?;
    serializer.finish()
}

/// Writes elements through quick-xml, choosing a prefix for every namespaced name
struct Serializer {
    xml: Writer<Vec<u8>>,
    frames: Vec<NamespaceMap>,
    generated: usize,
}

impl Serializer {
    fn new() -> Self {
        Self {
            xml: Writer::new_with_indent(Vec::new(), b' ', 2),
            frames: Vec::new(),
            generated: 0,
        }
    }

    fn finish(self) -> Result<String, DocumentError> {
        String::from_utf8(self.xml.into_inner()).map_err(|e| DocumentError::Write(e.to_string()))
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), DocumentError> {
        self.xml
            .write_event(event)
            .map_err(|e| DocumentError::Write(e.to_string()))
    }

    fn lookup(&self, frame: &NamespaceMap, prefix: &str) -> Option<String> {
        frame
            .get(prefix)
            .or_else(|| self.frames.iter().rev().find_map(|f| f.get(prefix)))
            .cloned()
    }

    /// A prefix bound to `uri` that is not shadowed at this point
    fn find_prefix(&self, frame: &NamespaceMap, uri: &str, allow_default: bool) -> Option<String> {
        std::iter::once(frame)
            .chain(self.frames.iter().rev())
            .flat_map(|f| f.iter())
            .filter(|(prefix, bound)| bound.as_str() == uri && (allow_default || !prefix.is_empty()))
            .map(|(prefix, _)| prefix.clone())
            .find(|prefix| self.lookup(frame, prefix).as_deref() == Some(uri))
    }

    fn fresh_prefix(&mut self, frame: &NamespaceMap) -> String {
        loop {
            let candidate = format!("ns{}", self.generated);
            self.generated += 1;
            if self.lookup(frame, &candidate).is_none() {
                return candidate;
            }
        }
    }

    fn element_name(&mut self, frame: &mut NamespaceMap, element: &Element) -> String {
        let Some(uri) = element.name.namespace.as_deref() else {
            if self.lookup(frame, "").is_some_and(|default| !default.is_empty()) {
                frame.insert(String::new(), String::new());
            }
            return element.name.local.clone();
        };

        // an unbound hint is declared rather than replaced
        let hinted = element.prefix.clone().filter(|p| match self.lookup(frame, p) {
            Some(bound) => bound == uri,
            None => {
                frame.insert(p.clone(), uri.to_string());
                true
            }
        });
        let prefix = match hinted.or_else(|| self.find_prefix(frame, uri, true)) {
            Some(prefix) => prefix,
            None => {
                let prefix = self.fresh_prefix(frame);
                frame.insert(prefix.clone(), uri.to_string());
                prefix
            }
        };
        qualify(&prefix, &element.name.local)
    }

    fn attribute_name(&mut self, frame: &mut NamespaceMap, name: &QName) -> String {
        match name.namespace.as_deref() {
            None => name.local.clone(),
            Some(NS_XML) => qualify("xml", &name.local),
            Some(uri) => {
                let prefix = match self.find_prefix(frame, uri, false) {
                    Some(prefix) => prefix,
                    None => {
                        let prefix = self.fresh_prefix(frame);
                        frame.insert(prefix.clone(), uri.to_string());
                        prefix
                    }
                };
                qualify(&prefix, &name.local)
            }
        }
    }

    fn element(&mut self, element: &Element) -> Result<(), DocumentError> {
        let mut frame = element.namespaces.clone();
        let name = self.element_name(&mut frame, element);
        let attributes: Vec<(String, &str)> = element
            .attributes
            .iter()
            .map(|(attr, value)| (self.attribute_name(&mut frame, attr), value.as_str()))
            .collect();

        let mut start = BytesStart::new(name.as_str());
        for (prefix, uri) in &frame {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                qualify("xmlns", prefix)
            };
            start.push_attribute((key.as_bytes(), escape_attribute(uri).as_bytes()));
        }
        for (attr, value) in &attributes {
            start.push_attribute((attr.as_bytes(), escape_attribute(value).as_bytes()));
        }

        if element.children.is_empty() && element.text.is_none() {
            return self.write(Event::Empty(start));
        }

        self.write(Event::Start(start))?;
        if let Some(text) = &element.text {
            self.write(Event::Text(BytesText::new(text)))?;
        }
        self.frames.push(frame);
        for child in &element.children {
            self.element(child)?;
        }
        self.frames.pop();
        self.write(Event::End(BytesEnd::new(name)))
    }
}

fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

/// Attribute values also escape whitespace that parsers would normalize to spaces
fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}
