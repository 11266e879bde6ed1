use indexmap::IndexMap;
use tracing::debug;

use crate::document::{Element, NamespaceMap, NodePath, QName};

/// A controlled-vocabulary descriptor. `type_id` is the identifier documents
/// should use after the update.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    pub type_id: String,
    pub display_name: String,
    pub reference_uri: String,
    pub term_corrections: IndexMap<String, String>,
}

impl Vocabulary {
    pub fn new(
        type_id: impl Into<String>,
        display_name: impl Into<String>,
        reference_uri: impl Into<String>,
    ) -> Self {
        Self {
            type_id: type_id.into(),
            display_name: display_name.into(),
            reference_uri: reference_uri.into(),
            term_corrections: IndexMap::new(),
        }
    }

    pub fn with_correction(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.term_corrections.insert(old.into(), new.into());
        self
    }

    /// Corrected term for `term`, if it is a known misspelling
    pub fn correct(&self, term: &str) -> Option<&str> {
        self.term_corrections.get(term).map(String::as_str)
    }
}

/// Vocabularies keyed by the resolved (possibly deprecated) `xsi:type` found in source documents
pub type VocabularyMap = IndexMap<QName, Vocabulary>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VocabularyStats {
    pub retyped: usize,
    pub corrected: usize,
}

/// Rewrite vocabulary type discriminators and misspelled terms in place.
///
/// Discriminators are resolved against the namespaces in scope, so only
/// types from the vocabulary's own namespace match. A retyped discriminator
/// keeps its prefix.
pub fn translate(root: &mut Element, inherited: &NamespaceMap, vocabularies: &VocabularyMap) -> VocabularyStats {
    let mut stats = VocabularyStats::default();
    if vocabularies.is_empty() {
        return stats;
    }

    let mut matched: Vec<(NodePath, &Vocabulary)> = Vec::new();
    root.walk_in_scope(inherited, |visit| {
        if let Some(vocab) = visit.element_type.and_then(|ty| vocabularies.get(ty)) {
            matched.push((visit.node_path(), vocab));
        }
    });

    for (path, vocab) in matched {
        let Some(element) = root.get_mut(&path) else {
            continue;
        };
        let Some(discriminator) = element.xsi_type() else {
            continue;
        };
        let (prefix, type_id) = match discriminator.split_once(':') {
            Some((prefix, type_id)) => (Some(prefix), type_id),
            None => (None, discriminator),
        };

        if vocab.type_id != type_id {
            let retyped = match prefix {
                Some(prefix) => format!("{}:{}", prefix, vocab.type_id),
                None => vocab.type_id.clone(),
            };
            element.attributes.insert(QName::xsi("type"), retyped);
            stats.retyped += 1;
        }
        if element.attr("vocab_name").is_some() {
            element.set_attr("vocab_name", vocab.display_name.as_str());
        }
        if element.attr("vocab_reference").is_some() {
            element.set_attr("vocab_reference", vocab.reference_uri.as_str());
        }
        if let Some(corrected) = element.text.as_deref().and_then(|t| vocab.correct(t)) {
            element.text = Some(corrected.to_string());
            stats.corrected += 1;
        }
    }

    debug!(retyped = stats.retyped, corrected = stats.corrected, "translated vocabulary terms");
    stats
}
