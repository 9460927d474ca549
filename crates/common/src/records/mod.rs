//! Citation database record model
//!
//! Typed view of the JSON the citation database returns for one paper.
//! Optional fields stay optional: a missing title or a missing
//! `citation_groups` list means "not present" and is never an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used for papers without a title
pub const NO_TITLE: &str = "no title";

/// Number of title characters kept on a paper label
pub const TITLE_LABEL_CHARS: usize = 10;

/// Kind of identifier handed to the citation database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    /// External persistent identifier
    Doi,
    /// The database's own identifier
    Uri,
}

impl IdKind {
    /// Query parameter name used for lookups
    pub fn param(&self) -> &'static str {
        match self {
            IdKind::Doi => "doi",
            IdKind::Uri => "uri",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param())
    }
}

/// Bibliographic metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bibliographic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Text surrounding one citation location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationContext {
    pub text_before: String,
    pub text_after: String,
}

/// One place in the paper where it cites one or more references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationGroup {
    pub id: String,
    pub context: CitationContext,
}

/// One entry of a paper's reference list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibliographic: Option<Bibliographic>,

    /// Ids of the citation groups this reference is cited from
    #[serde(default)]
    pub citation_groups: Vec<String>,
}

impl Reference {
    /// Display label: the first ten characters of the title
    pub fn title_label(&self) -> String {
        title_label(self.bibliographic.as_ref())
    }

    /// Cited from at least two distinct citation contexts
    pub fn is_multiply_cited(&self) -> bool {
        self.citation_groups.len() >= 2
    }
}

/// A paper as returned by the citation database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibliographic: Option<Bibliographic>,

    /// `None` when the database has no citation information for the paper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_groups: Option<Vec<CitationGroup>>,

    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Record {
    /// Display label: the first ten characters of the title
    pub fn title_label(&self) -> String {
        title_label(self.bibliographic.as_ref())
    }

    /// References cited from at least two citation contexts, in list order
    pub fn multiply_cited(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.is_multiply_cited())
    }
}

/// Fixed-width title prefix, no ellipsis, `"no title"` when absent
pub fn title_label(bibliographic: Option<&Bibliographic>) -> String {
    match bibliographic.and_then(|b| b.title.as_deref()) {
        Some(title) => title.chars().take(TITLE_LABEL_CHARS).collect(),
        None => NO_TITLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_title_label_truncates_to_ten_chars() {
        let bib = Bibliographic {
            title: Some("Citation networks in practice".into()),
        };
        assert_eq!(title_label(Some(&bib)), "Citation n");
    }

    #[test]
    fn test_title_label_counts_characters_not_bytes() {
        let bib = Bibliographic {
            title: Some("Über größere Netzwerke".into()),
        };
        assert_eq!(title_label(Some(&bib)), "Über größe");
    }

    #[test]
    fn test_title_label_short_and_missing() {
        let short = Bibliographic {
            title: Some("Short".into()),
        };
        assert_eq!(title_label(Some(&short)), "Short");
        assert_eq!(title_label(Some(&Bibliographic::default())), NO_TITLE);
        assert_eq!(title_label(None), NO_TITLE);
    }

    #[test]
    fn test_record_optional_fields() {
        let record: Record = serde_json::from_value(json!({
            "uri": "http://example.org/paper/1"
        }))
        .unwrap();

        assert!(record.bibliographic.is_none());
        assert!(record.citation_groups.is_none());
        assert!(record.references.is_empty());
        assert_eq!(record.title_label(), NO_TITLE);
    }

    #[test]
    fn test_record_full_shape() {
        let record: Record = serde_json::from_value(json!({
            "uri": "p1",
            "bibliographic": {"title": "A study of things", "journal": "ignored"},
            "citation_groups": [
                {"id": "g1", "context": {"text_before": "as shown", "text_after": "and"}}
            ],
            "references": [
                {"uri": "r1", "citation_groups": ["g1", "g2"]},
                {"uri": "r2", "bibliographic": {}, "citation_groups": ["g1"]}
            ]
        }))
        .unwrap();

        let groups = record.citation_groups.as_ref().unwrap();
        assert_eq!(groups[0].context.text_before, "as shown");
        assert_eq!(record.references[1].title_label(), NO_TITLE);

        let multiply: Vec<_> = record.multiply_cited().map(|r| r.uri.as_str()).collect();
        assert_eq!(multiply, vec!["r1"]);
    }

    #[test]
    fn test_id_kind_param() {
        assert_eq!(IdKind::Doi.param(), "doi");
        assert_eq!(IdKind::Uri.to_string(), "uri");
    }
}
