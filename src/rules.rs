use indexmap::IndexMap;
use thiserror::Error;

use crate::document::{Element, NodePath, QName, Visit};
use crate::schema_version::SchemaVersionError;

/// Prefix to namespace URI table used to resolve the prefixed names rules are written with
pub type PrefixMap = IndexMap<&'static str, &'static str>;

#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("Unknown namespace prefix '{prefix}' in '{name}'")]
    UnknownPrefix { prefix: String, name: String },

    #[error("Expected a prefixed name, found '{0}'")]
    Unprefixed(String),

    #[error(transparent)]
    InvalidVersion(#[from] SchemaVersionError),
}

/// Resolve `prefix:local` against `nsmap`
pub fn resolve(nsmap: &PrefixMap, name: &str) -> Result<QName, RuleError> {
    let (prefix, local) = name
        .split_once(':')
        .ok_or_else(|| RuleError::Unprefixed(name.to_string()))?;
    let uri = nsmap.get(prefix).ok_or_else(|| RuleError::UnknownPrefix {
        prefix: prefix.to_string(),
        name: name.to_string(),
    })?;
    Ok(QName::new(*uri, local))
}

/// Where a selected element must sit for the selector to match
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorContext {
    Anywhere,
    /// Direct child of an element with this name
    ChildOf(QName),
    /// Direct child of a container whose `xsi:type` resolves to this type
    ChildOfTyped(QName),
    /// The element itself declares this `xsi:type`
    OfType(QName),
}

/// Locates elements by qualified name and context
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSelector {
    pub name: QName,
    pub context: SelectorContext,
}

impl NodeSelector {
    pub fn new(nsmap: &PrefixMap, name: &str) -> Result<Self, RuleError> {
        Ok(Self {
            name: resolve(nsmap, name)?,
            context: SelectorContext::Anywhere,
        })
    }

    pub fn child_of(mut self, nsmap: &PrefixMap, parent: &str) -> Result<Self, RuleError> {
        self.context = SelectorContext::ChildOf(resolve(nsmap, parent)?);
        Ok(self)
    }

    pub fn child_of_typed(mut self, nsmap: &PrefixMap, xsi_type: &str) -> Result<Self, RuleError> {
        self.context = SelectorContext::ChildOfTyped(resolve(nsmap, xsi_type)?);
        Ok(self)
    }

    pub fn of_type(mut self, nsmap: &PrefixMap, xsi_type: &str) -> Result<Self, RuleError> {
        self.context = SelectorContext::OfType(resolve(nsmap, xsi_type)?);
        Ok(self)
    }

    pub fn matches(&self, visit: &Visit<'_, '_>) -> bool {
        if visit.element.name != self.name {
            return false;
        }
        match &self.context {
            SelectorContext::Anywhere => true,
            SelectorContext::ChildOf(parent) => visit.parent.is_some_and(|p| &p.name == parent),
            SelectorContext::ChildOfTyped(ty) => visit.parent_type == Some(ty),
            SelectorContext::OfType(ty) => visit.element_type == Some(ty),
        }
    }
}

/// Paths of every element matched by any of `selectors`, in document order, each once
pub fn find_all<'s>(
    root: &Element,
    inherited: &crate::document::NamespaceMap,
    selectors: impl IntoIterator<Item = &'s NodeSelector> + Clone,
) -> Vec<NodePath> {
    let mut found = Vec::new();
    root.walk_in_scope(inherited, |visit| {
        if selectors.clone().into_iter().any(|s| s.matches(visit)) {
            found.push(visit.node_path());
        }
    });
    found
}

/// A construct with no representation in the target version
#[derive(Debug, Clone, PartialEq)]
pub struct DisallowedConstructSpec {
    pub rule_id: String,
    pub selector: NodeSelector,
}

impl DisallowedConstructSpec {
    pub fn new(rule_id: impl Into<String>, selector: NodeSelector) -> Self {
        Self {
            rule_id: rule_id.into(),
            selector,
        }
    }
}

/// An element required in the source version but optional in the target;
/// dropped when it carries nothing
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalElementSpec {
    pub selector: NodeSelector,
}

impl OptionalElementSpec {
    pub fn new(selector: NodeSelector) -> Self {
        Self { selector }
    }
}

/// A field whose qualified name changes in the target version
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatableFieldSpec {
    pub selector: NodeSelector,
    pub new_name: QName,
}

impl TranslatableFieldSpec {
    pub fn new(nsmap: &PrefixMap, selector: NodeSelector, new_name: &str) -> Result<Self, RuleError> {
        Ok(Self {
            selector,
            new_name: resolve(nsmap, new_name)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NamespaceMap;
    use crate::xml;

    fn nsmap() -> PrefixMap {
        let mut map = PrefixMap::new();
        map.insert("cybox", "http://cybox.mitre.org/cybox-2");
        map.insert("FileObj", "http://cybox.mitre.org/objects#FileObject-2");
        map
    }

    const DOC: &str = r#"<cybox:Observables
        xmlns:cybox="http://cybox.mitre.org/cybox-2"
        xmlns:FileObj="http://cybox.mitre.org/objects#FileObject-2"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
      <cybox:Observable>
        <cybox:Object>
          <cybox:Properties xsi:type="FileObj:FileObjectType">
            <FileObj:File_Name>a.exe</FileObj:File_Name>
          </cybox:Properties>
        </cybox:Object>
      </cybox:Observable>
      <FileObj:File_Name>loose</FileObj:File_Name>
    </cybox:Observables>"#;

    #[test]
    fn test_resolve_prefixed_names() {
        let map = nsmap();
        assert_eq!(
            resolve(&map, "cybox:Object").unwrap(),
            QName::new("http://cybox.mitre.org/cybox-2", "Object")
        );
        assert!(matches!(resolve(&map, "nope:Object"), Err(RuleError::UnknownPrefix { .. })));
        assert_eq!(resolve(&map, "Object"), Err(RuleError::Unprefixed("Object".to_string())));
    }

    #[test]
    fn test_selector_contexts() {
        let map = nsmap();
        let root = xml::parse(DOC).unwrap();
        let scope = NamespaceMap::new();

        let anywhere = NodeSelector::new(&map, "FileObj:File_Name").unwrap();
        assert_eq!(find_all(&root, &scope, [&anywhere]).len(), 2);

        let typed = NodeSelector::new(&map, "FileObj:File_Name")
            .unwrap()
            .child_of_typed(&map, "FileObj:FileObjectType")
            .unwrap();
        let found = find_all(&root, &scope, [&typed]);
        assert_eq!(found, vec![NodePath::from_indices(&[0, 0, 0, 0])]);

        let of_type = NodeSelector::new(&map, "cybox:Properties")
            .unwrap()
            .of_type(&map, "FileObj:FileObjectType")
            .unwrap();
        assert_eq!(find_all(&root, &scope, [&of_type]).len(), 1);

        let parent = NodeSelector::new(&map, "cybox:Object")
            .unwrap()
            .child_of(&map, "cybox:Observables")
            .unwrap();
        assert!(find_all(&root, &scope, [&parent]).is_empty());
    }

    #[test]
    fn test_overlapping_selectors_report_once() {
        let map = nsmap();
        let root = xml::parse(DOC).unwrap();
        let a = NodeSelector::new(&map, "FileObj:File_Name").unwrap();
        let b = a.clone().child_of_typed(&map, "FileObj:FileObjectType").unwrap();
        assert_eq!(find_all(&root, &NamespaceMap::new(), [&a, &b]).len(), 2);
    }
}
