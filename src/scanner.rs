use tracing::debug;

use crate::document::{Element, NamespaceMap, NodePath};
use crate::error::OffendingNode;
use crate::report::RemovedFragment;
use crate::rules::{find_all, DisallowedConstructSpec, OptionalElementSpec, TranslatableFieldSpec};

/// Every element matched by at least one spec, in document order. A node
/// matched by several specs is reported once, under the first spec.
pub fn find_disallowed(
    root: &Element,
    inherited: &NamespaceMap,
    specs: &[DisallowedConstructSpec],
) -> Vec<OffendingNode> {
    let mut found = Vec::new();
    if specs.is_empty() {
        return found;
    }

    root.walk_in_scope(inherited, |visit| {
        if let Some(spec) = specs.iter().find(|spec| spec.selector.matches(visit)) {
            found.push(OffendingNode {
                path: visit.node_path(),
                rule_id: spec.rule_id.clone(),
                element: visit.element.clone(),
            });
        }
    });
    found
}

/// Copy then detach offending nodes. Nodes nested inside another offending
/// node leave with their ancestor and are not reported separately.
pub fn excise(root: &mut Element, inherited: &NamespaceMap, offending: &[OffendingNode]) -> Vec<RemovedFragment> {
    let outermost: Vec<&OffendingNode> = offending
        .iter()
        .filter(|node| !node.path.is_root())
        .filter(|node| !offending.iter().any(|other| other.path.is_ancestor_of(&node.path)))
        .collect();

    let mut fragments: Vec<RemovedFragment> = outermost
        .iter()
        .filter_map(|node| {
            root.get(&node.path).map(|element| RemovedFragment {
                path: node.path.clone(),
                rule_id: node.rule_id.clone(),
                element: element.clone(),
                scope: root.scope_above(&node.path, inherited),
            })
        })
        .collect();
    fragments.sort_by(|a, b| a.path.cmp(&b.path));

    remove_paths(root, fragments.iter().map(|f| f.path.clone()).collect());
    debug!(removed = fragments.len(), "excised disallowed constructs");
    fragments
}

/// Drop elements that became optional when they carry nothing
pub fn prune_optionals(root: &mut Element, inherited: &NamespaceMap, specs: &[OptionalElementSpec]) -> usize {
    if specs.is_empty() {
        return 0;
    }
    let empty: Vec<NodePath> = find_all(root, inherited, specs.iter().map(|s| &s.selector))
        .into_iter()
        .filter(|path| !path.is_root() && root.get(path).is_some_and(Element::is_empty))
        .collect();
    let pruned = empty.len();
    remove_paths(root, empty);
    debug!(pruned, "pruned empty optional elements");
    pruned
}

/// Rename fields whose qualified name changed in the target version
pub fn translate_fields(root: &mut Element, inherited: &NamespaceMap, specs: &[TranslatableFieldSpec]) -> usize {
    let mut translated = 0;
    for spec in specs {
        for path in find_all(root, inherited, [&spec.selector]) {
            if let Some(element) = root.get_mut(&path) {
                element.name = spec.new_name.clone();
                translated += 1;
            }
        }
    }
    debug!(translated, "translated renamed fields");
    translated
}

/// Remove in reverse document order so earlier paths stay valid
fn remove_paths(root: &mut Element, mut paths: Vec<NodePath>) {
    paths.sort();
    paths.dedup();
    for path in paths.iter().rev() {
        root.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::QName;
    use crate::rules::{NodeSelector, PrefixMap};
    use crate::xml;

    fn nsmap() -> PrefixMap {
        let mut map = PrefixMap::new();
        map.insert("t", "urn:t");
        map
    }

    const DOC: &str = r#"<t:Root xmlns:t="urn:t">
      <t:Keep>1</t:Keep>
      <t:Bad><t:Bad>nested</t:Bad></t:Bad>
      <t:Keep>2</t:Keep>
      <t:Old>value</t:Old>
      <t:Optional/>
      <t:Optional>data</t:Optional>
      <t:Bad/>
    </t:Root>"#;

    fn bad_spec() -> DisallowedConstructSpec {
        DisallowedConstructSpec::new("no-bad", NodeSelector::new(&nsmap(), "t:Bad").unwrap())
    }

    #[test]
    fn test_find_disallowed_reports_every_match() {
        let root = xml::parse(DOC).unwrap();
        let found = find_disallowed(&root, &NamespaceMap::new(), &[bad_spec(), bad_spec()]);

        let paths: Vec<String> = found.iter().map(|n| n.path.to_string()).collect();
        assert_eq!(paths, vec!["/1", "/1/0", "/6"]);
        assert!(found.iter().all(|n| n.rule_id == "no-bad"));
    }

    #[test]
    fn test_excise_keeps_sibling_order_and_copies() {
        let mut root = xml::parse(DOC).unwrap();
        let found = find_disallowed(&root, &NamespaceMap::new(), &[bad_spec()]);
        let fragments = excise(&mut root, &NamespaceMap::new(), &found);

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].element.children.len(), 1);
        assert_eq!(fragments[0].element.children[0].text.as_deref(), Some("nested"));
        assert_eq!(fragments[0].scope.get("t").map(String::as_str), Some("urn:t"));

        let locals: Vec<&str> = root.children.iter().map(|c| c.name.local.as_str()).collect();
        assert_eq!(locals, vec!["Keep", "Keep", "Old", "Optional", "Optional"]);
        assert_eq!(root.children[1].text.as_deref(), Some("2"));
    }

    #[test]
    fn test_prune_and_translate() {
        let map = nsmap();
        let mut root = xml::parse(DOC).unwrap();
        let optional = OptionalElementSpec::new(NodeSelector::new(&map, "t:Optional").unwrap());
        assert_eq!(prune_optionals(&mut root, &NamespaceMap::new(), &[optional]), 1);

        let rename = TranslatableFieldSpec::new(&map, NodeSelector::new(&map, "t:Old").unwrap(), "t:New").unwrap();
        assert_eq!(translate_fields(&mut root, &NamespaceMap::new(), &[rename]), 1);

        let renamed = &root.children[3];
        assert_eq!(renamed.name, QName::new("urn:t", "New"));
        assert_eq!(renamed.text.as_deref(), Some("value"));
        assert_eq!(root.children[4].text.as_deref(), Some("data"));
        assert_eq!(root.children.len(), 6);
    }
}
