use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::document::{Element, NodePath};

pub const ID_ATTRIBUTE: &str = "id";

/// Groups of elements sharing an `id`, keyed by id in order of first
/// appearance. Only ids used more than once are returned.
pub fn find_duplicates(root: &Element) -> IndexMap<String, Vec<NodePath>> {
    let mut groups: IndexMap<String, Vec<NodePath>> = IndexMap::new();
    root.walk(|visit| {
        if let Some(id) = visit.element.attr(ID_ATTRIBUTE) {
            groups.entry(id.to_string()).or_default().push(visit.node_path());
        }
    });
    groups.retain(|_, paths| paths.len() > 1);
    groups
}

/// Give every duplicate but the first a fresh id.
///
/// References to the renamed elements (`idref` and friends) are not
/// rewritten; they keep pointing at the first occurrence.
pub fn resolve_duplicates(
    root: &mut Element,
    duplicates: &IndexMap<String, Vec<NodePath>>,
) -> IndexMap<String, Vec<String>> {
    let mut used = all_ids(root);
    let mut remap: IndexMap<String, Vec<String>> = IndexMap::new();

    for (original, paths) in duplicates {
        for path in paths.iter().skip(1) {
            let Some(element) = root.get_mut(path) else {
                continue;
            };
            let new_id = fresh_id(original, &used);
            element.set_attr(ID_ATTRIBUTE, new_id.as_str());
            used.insert(new_id.clone());
            remap.entry(original.clone()).or_default().push(new_id);
        }
    }

    debug!(remapped = remap.values().map(Vec::len).sum::<usize>(), "resolved duplicate ids");
    remap
}

/// A new id shaped like `original` (`ns:Type-<uuid>`) that is not in `used`
pub fn fresh_id(original: &str, used: &HashSet<String>) -> String {
    let (prefix, local) = match original.split_once(':') {
        Some((prefix, local)) => (format!("{}:", prefix), local),
        None => (String::new(), original),
    };
    let base = local.split('-').next().filter(|b| !b.is_empty()).unwrap_or("id");

    loop {
        let candidate = format!("{}{}-{}", prefix, base, Uuid::new_v4());
        if !used.contains(&candidate) {
            return candidate;
        }
    }
}

fn all_ids(root: &Element) -> HashSet<String> {
    let mut ids = HashSet::new();
    root.walk(|visit| {
        if let Some(id) = visit.element.attr(ID_ATTRIBUTE) {
            ids.insert(id.to_string());
        }
    });
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::QName;

    fn node(id: &str) -> Element {
        Element::new(QName::new("urn:t", "Indicator")).with_attribute(QName::local(ID_ATTRIBUTE), id)
    }

    fn doc() -> Element {
        Element::new(QName::new("urn:t", "Root"))
            .with_child(node("indicator-123"))
            .with_child(node("other"))
            .with_child(node("indicator-123").with_child(node("indicator-123")))
    }

    #[test]
    fn test_find_duplicates_groups_in_document_order() {
        let duplicates = find_duplicates(&doc());
        assert_eq!(duplicates.len(), 1);
        let paths: Vec<String> = duplicates["indicator-123"].iter().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["/0", "/2", "/2/0"]);
    }

    #[test]
    fn test_resolve_keeps_first_and_renames_rest() {
        let mut root = doc();
        let duplicates = find_duplicates(&root);
        let remap = resolve_duplicates(&mut root, &duplicates);

        assert_eq!(root.children[0].attr(ID_ATTRIBUTE), Some("indicator-123"));
        let renamed = &remap["indicator-123"];
        assert_eq!(renamed.len(), 2);
        assert_eq!(root.children[2].attr(ID_ATTRIBUTE), Some(renamed[0].as_str()));
        assert_eq!(root.children[2].children[0].attr(ID_ATTRIBUTE), Some(renamed[1].as_str()));
        assert_ne!(renamed[0], renamed[1]);
        assert!(find_duplicates(&root).is_empty());
    }

    #[test]
    fn test_single_duplicate_pair() {
        let mut root = Element::new(QName::local("Root"))
            .with_child(node("indicator-123"))
            .with_child(node("indicator-123"));
        let duplicates = find_duplicates(&root);
        let remap = resolve_duplicates(&mut root, &duplicates);
        assert_eq!(remap["indicator-123"].len(), 1);
    }

    #[test]
    fn test_fresh_id_shape() {
        let used = HashSet::new();
        let id = fresh_id("example:Observable-8e2c", &used);
        assert!(id.starts_with("example:Observable-"));
        assert_ne!(id, "example:Observable-8e2c");

        assert!(fresh_id("indicator-123", &used).starts_with("indicator-"));
        assert!(fresh_id("plain", &used).starts_with("plain-"));
        assert!(fresh_id("ns:-x", &used).starts_with("ns:id-"));
    }
}
