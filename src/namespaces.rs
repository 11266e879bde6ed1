use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::document::{Element, NamespaceMap, QName};
use crate::report::{UpdateWarning, UpdateWarningType};

/// Replace every occurrence of a mapped namespace URI: declarations, element
/// names and attribute names. Prefixes are left as they are.
///
/// Returns the number of declarations rewritten.
pub fn rewrite_namespaces(root: &mut Element, namespace_map: &IndexMap<String, String>) -> usize {
    if namespace_map.is_empty() {
        return 0;
    }

    let remap = |name: &mut QName| {
        if let Some(new) = name.namespace.as_ref().and_then(|ns| namespace_map.get(ns)) {
            name.namespace = Some(new.clone());
        }
    };

    let mut declarations = 0;
    root.walk_mut(&mut |_, element| {
        for uri in element.namespaces.values_mut() {
            if let Some(new) = namespace_map.get(uri.as_str()) {
                *uri = new.clone();
                declarations += 1;
            }
        }
        remap(&mut element.name);
        if element
            .attributes
            .keys()
            .any(|name| name.namespace.as_ref().is_some_and(|ns| namespace_map.contains_key(ns)))
        {
            element.attributes = std::mem::take(&mut element.attributes)
                .into_iter()
                .map(|(mut name, value)| {
                    remap(&mut name);
                    (name, value)
                })
                .collect();
        }
        true
    });

    debug!(declarations, "rewrote namespace declarations");
    declarations
}

/// Rebuild every `xsi:schemaLocation` hint for the target version.
///
/// Each pair's namespace is first passed through `namespace_map`. Pairs for
/// namespaces the document no longer declares are dropped; declared
/// namespaces with no known location keep their old location and produce a
/// warning. Pairs keep the order in which their namespace was first seen.
pub fn rewrite_schema_locations<'m>(
    root: &mut Element,
    inherited: &NamespaceMap,
    namespace_map: &IndexMap<String, String>,
    location_for: impl Fn(&str) -> Option<&'m str>,
) -> Vec<UpdateWarning> {
    let declared = declared_uris(root, inherited);
    let hint = QName::xsi("schemaLocation");
    let mut warnings = Vec::new();

    root.walk_mut(&mut |path, element| {
        let Some(value) = element.attributes.get(&hint) else {
            return true;
        };

        let tokens: Vec<&str> = value.split_whitespace().collect();
        if tokens.len() % 2 != 0 {
            warnings.push(UpdateWarning::new(
                format!("schemaLocation at {} has an odd number of entries; last entry ignored", path),
                UpdateWarningType::MalformedSchemaLocation,
            ));
        }

        let mut pairs: IndexMap<String, String> = IndexMap::new();
        for pair in tokens.chunks_exact(2) {
            let (ns, location) = (pair[0], pair[1]);
            let ns = namespace_map.get(ns).map(String::as_str).unwrap_or(ns);
            if pairs.contains_key(ns) {
                continue;
            }
            if !declared.contains(ns) {
                debug!(namespace = ns, "dropping schemaLocation for undeclared namespace");
                continue;
            }
            match location_for(ns) {
                Some(target) => {
                    pairs.insert(ns.to_string(), target.to_string());
                }
                None => {
                    warn!(namespace = ns, "no target schema location; keeping {}", location);
                    warnings.push(
                        UpdateWarning::new(
                            format!("no target schema location for {}; kept {}", ns, location),
                            UpdateWarningType::UnknownSchemaLocation,
                        )
                        .with_namespace(ns.to_string()),
                    );
                    pairs.insert(ns.to_string(), location.to_string());
                }
            }
        }

        let rebuilt = pairs
            .iter()
            .map(|(ns, location)| format!("{} {}", ns, location))
            .collect::<Vec<_>>()
            .join(" ");
        element.attributes.insert(hint.clone(), rebuilt);
        true
    });

    warnings
}

fn declared_uris(root: &Element, inherited: &NamespaceMap) -> IndexSet<String> {
    let mut uris: IndexSet<String> = IndexSet::new();
    root.walk_in_scope(inherited, |visit| uris.extend(visit.scope.uris().map(str::to_string)));
    uris
}
