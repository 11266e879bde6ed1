use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace declarations on a single element: prefix ("" for the default namespace) to URI
pub type NamespaceMap = IndexMap<String, String>;

/// Namespace-qualified name of an element or attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    /// A name in no namespace, as used by most attributes
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    pub fn xsi(local: impl Into<String>) -> Self {
        Self::new(NS_XSI, local)
    }

    pub fn in_namespace(&self, uri: &str) -> bool {
        self.namespace.as_deref() == Some(uri)
    }
}

/// Clark notation: `{uri}local`
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Position of an element as child indices from the root it was computed against
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_indices(indices: &[usize]) -> Self {
        Self(indices.to_vec())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn parent(&self) -> Option<NodePath> {
        self.0.split_last().map(|(_, parent)| NodePath::from_indices(parent))
    }

    /// Path of `other` (relative to the node at `self`) expressed from `self`'s root
    pub fn join(&self, other: &NodePath) -> Self {
        let mut indices = self.0.clone();
        indices.extend_from_slice(&other.0);
        Self(indices)
    }

    /// True when `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

/// A mutable element tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    /// Prefix the element was written with; only a serialization hint
    pub prefix: Option<String>,
    pub namespaces: NamespaceMap,
    pub attributes: IndexMap<QName, String>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            prefix: None,
            namespaces: NamespaceMap::new(),
            attributes: IndexMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.insert(name, value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Value of an attribute in no namespace
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name.namespace.is_none() && name.local == local)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, local: &str, value: impl Into<String>) {
        self.attributes.insert(QName::local(local), value.into());
    }

    pub fn xsi_type(&self) -> Option<&str> {
        self.attributes.get(&QName::xsi("type")).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.children.is_empty()
            && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }

    pub fn get(&self, path: &NodePath) -> Option<&Element> {
        let mut current = self;
        for &index in path.indices() {
            current = current.children.get(index)?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        let mut current = self;
        for &index in path.indices() {
            current = current.children.get_mut(index)?;
        }
        Some(current)
    }

    /// Detach the element at `path`; later siblings shift down by one.
    /// The root itself cannot be removed.
    pub fn remove(&mut self, path: &NodePath) -> Option<Element> {
        let (last, parent) = path.indices().split_last()?;
        let parent = self.get_mut(&NodePath::from_indices(parent))?;
        if *last < parent.children.len() {
            Some(parent.children.remove(*last))
        } else {
            None
        }
    }

    /// Namespaces in scope at `path`, innermost declaration winning
    pub fn in_scope_namespaces(&self, path: &NodePath) -> NamespaceMap {
        let mut scope = NamespaceMap::new();
        let mut current = self;
        scope.extend(current.namespaces.clone());
        for &index in path.indices() {
            match current.children.get(index) {
                Some(child) => {
                    current = child;
                    scope.extend(current.namespaces.clone());
                }
                None => break,
            }
        }
        scope
    }

    /// Namespaces an element at `path` inherits: `inherited` overlaid with
    /// everything declared on its ancestors, but not its own declarations
    pub fn scope_above(&self, path: &NodePath, inherited: &NamespaceMap) -> NamespaceMap {
        let mut scope = inherited.clone();
        if let Some(parent) = path.parent() {
            scope.extend(self.in_scope_namespaces(&parent));
        }
        scope
    }

    /// Pre-order traversal with namespace scope and resolved `xsi:type`s
    pub fn walk<'a>(&'a self, f: impl FnMut(&Visit<'_, 'a>)) {
        self.walk_in_scope(&NamespaceMap::new(), f)
    }

    /// Like [`Element::walk`], for a sub-tree whose ancestors declared `inherited`
    pub fn walk_in_scope<'a>(&'a self, inherited: &NamespaceMap, mut f: impl FnMut(&Visit<'_, 'a>)) {
        let mut frames = vec![inherited];
        let mut path = Vec::new();
        walk_inner(self, None, None, &mut path, &mut frames, &mut f);
    }

    /// Pre-order mutable traversal; `descend` returning false skips the node's children
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&NodePath, &mut Element) -> bool) {
        fn inner(el: &mut Element, path: &mut Vec<usize>, f: &mut impl FnMut(&NodePath, &mut Element) -> bool) {
            let descend = f(&NodePath::from_indices(path), el);
            if !descend {
                return;
            }
            for (i, child) in el.children.iter_mut().enumerate() {
                path.push(i);
                inner(child, path, f);
                path.pop();
            }
        }
        let mut path = Vec::new();
        inner(self, &mut path, f);
    }
}

/// One node seen during [`Element::walk`]
pub struct Visit<'v, 'a> {
    pub path: &'v [usize],
    pub element: &'a Element,
    pub parent: Option<&'a Element>,
    /// Resolved `xsi:type` of the parent
    pub parent_type: Option<&'v QName>,
    /// Resolved `xsi:type` of this element
    pub element_type: Option<&'v QName>,
    pub scope: NamespaceScope<'v>,
}

impl Visit<'_, '_> {
    pub fn node_path(&self) -> NodePath {
        NodePath::from_indices(self.path)
    }
}

fn walk_inner<'a: 's, 's>(
    element: &'a Element,
    parent: Option<&'a Element>,
    parent_type: Option<&QName>,
    path: &mut Vec<usize>,
    frames: &mut Vec<&'s NamespaceMap>,
    f: &mut dyn FnMut(&Visit<'_, 'a>),
) {
    frames.push(&element.namespaces);
    let element_type = NamespaceScope { frames: &frames[..] }
        .resolve_xsi_type(element);
    f(&Visit {
        path: &path[..],
        element,
        parent,
        parent_type,
        element_type: element_type.as_ref(),
        scope: NamespaceScope { frames: &frames[..] },
    });
    for (i, child) in element.children.iter().enumerate() {
        path.push(i);
        walk_inner(child, Some(element), element_type.as_ref(), path, frames, f);
        path.pop();
    }
    frames.pop();
}

/// Stack of namespace declarations visible at a node
#[derive(Clone, Copy)]
pub struct NamespaceScope<'v> {
    frames: &'v [&'v NamespaceMap],
}

impl<'v> NamespaceScope<'v> {
    pub fn resolve(&self, prefix: &str) -> Option<&'v str> {
        if prefix == "xml" {
            return Some(NS_XML);
        }
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(prefix))
            .map(String::as_str)
    }

    /// Resolve a `prefix:local` value (unprefixed values use the default namespace)
    pub fn resolve_qname(&self, value: &str) -> Option<QName> {
        match value.split_once(':') {
            Some((prefix, local)) => self.resolve(prefix).map(|ns| QName::new(ns, local)),
            None => Some(match self.resolve("") {
                Some(ns) => QName::new(ns, value),
                None => QName::local(value),
            }),
        }
    }

    fn resolve_xsi_type(&self, element: &Element) -> Option<QName> {
        element.xsi_type().and_then(|value| self.resolve_qname(value))
    }

    /// Every namespace URI visible at this node
    pub fn uris(&self) -> impl Iterator<Item = &'v str> + 'v {
        self.frames.iter().flat_map(|frame| frame.values().map(String::as_str))
    }
}
