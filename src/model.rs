use std::fmt::Write;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Seconds/nanos since the Unix epoch, as found in dump `<timestamp>` tags.
///
/// Kept as a plain pair instead of a `chrono` type so that it serialises the
/// same way on both sides of the framing boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

/// One revision of a page, as read from the dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    pub revision_id: u64,
    pub parent_id: Option<u64>,
    pub user: Option<CompactString>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UrlType {
    Default,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationUrl {
    pub url_type: UrlType,
    pub url: String,
}

/// The recognised identifier fields of a citation template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifiers {
    /// DOI in short form (no `https://doi.org/` prefix).
    pub doi: Option<String>,
    pub isbn: Option<String>,
    pub issn: Option<String>,
    pub pmid: Option<i32>,
    pub pmcid: Option<i32>,
}

/// The structured projection of a single citation template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedCitation {
    pub title: Option<String>,
    pub identifiers: Option<Identifiers>,
    /// URLs in template parameter order.
    pub urls: Vec<CitationUrl>,
}

impl ExtractedCitation {
    /// Deduplication key: a canonical serialisation of the structured fields
    /// in fixed order. Values are length-prefixed so no two distinct
    /// citations can render to the same string.
    pub fn fingerprint(&self) -> String {
        fn push_str_field(out: &mut String, tag: char, value: Option<&str>) {
            match value {
                // writing to a String cannot fail
                Some(v) => { let _ = write!(out, "{tag}{}:{v};", v.len()); }
                None => { let _ = write!(out, "{tag}-;"); }
            }
        }

        let mut out = String::new();
        push_str_field(&mut out, 't', self.title.as_deref());
        if let Some(ids) = &self.identifiers {
            out.push('[');
            push_str_field(&mut out, 'd', ids.doi.as_deref());
            push_str_field(&mut out, 'b', ids.isbn.as_deref());
            push_str_field(&mut out, 's', ids.issn.as_deref());
            match ids.pmid {
                Some(pmid) => { let _ = write!(out, "m{pmid};"); }
                None => out.push_str("m-;"),
            }
            match ids.pmcid {
                Some(pmcid) => { let _ = write!(out, "c{pmcid};"); }
                None => out.push_str("c-;"),
            }
            out.push(']');
        }
        for citation_url in &self.urls {
            let tag = match citation_url.url_type {
                UrlType::Default => 'u',
                UrlType::Archive => 'a',
            };
            push_str_field(&mut out, tag, Some(&citation_url.url));
        }
        out
    }
}

/// Citations of one revision, keyed by fingerprint.
///
/// Produced by the template parser with `revision` unset; the dump driver
/// attaches the revision before handing the value to the diff engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionCitations {
    pub revision: Option<Revision>,
    pub citations: BTreeMap<String, ExtractedCitation>,
}

/// A citation annotated with the revision that introduced it and, if it
/// disappeared again, the revision that removed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedCitation {
    pub citation: ExtractedCitation,
    pub revision_added: u64,
    pub revision_removed: Option<u64>,
}

/// An article page with its deduplicated citation history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub title: CompactString,
    pub page_id: u64,
    pub citations: Vec<AnnotatedCitation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    English,
    German,
    French,
    Spanish,
    Japanese,
}

/// Leading message of a framed output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub page_count: u64,
    pub language: Language,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation_with(title: Option<&str>, doi: Option<&str>, urls: Vec<CitationUrl>) -> ExtractedCitation {
        ExtractedCitation {
            title: title.map(str::to_string),
            identifiers: doi.map(|d| Identifiers {
                doi: Some(d.to_string()),
                ..Identifiers::default()
            }),
            urls,
        }
    }

    #[test]
    fn equal_citations_share_a_fingerprint() {
        let a = citation_with(Some("Parsing in Practice"), Some("10.1007/b62130"), vec![]);
        let b = citation_with(Some("Parsing in Practice"), Some("10.1007/b62130"), vec![]);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn absent_and_empty_title_differ() {
        let absent = citation_with(None, None, vec![]);
        let empty = citation_with(Some(""), None, vec![]);
        assert_ne!(absent.fingerprint(), empty.fingerprint());
    }

    #[test]
    fn missing_identifiers_differ_from_empty_identifiers() {
        let none = ExtractedCitation::default();
        let empty = ExtractedCitation {
            identifiers: Some(Identifiers::default()),
            ..ExtractedCitation::default()
        };
        assert_ne!(none.fingerprint(), empty.fingerprint());
    }

    #[test]
    fn url_type_is_part_of_the_fingerprint() {
        let plain = citation_with(
            None,
            None,
            vec![CitationUrl {
                url_type: UrlType::Default,
                url: "https://abc.com".to_string(),
            }],
        );
        let archived = citation_with(
            None,
            None,
            vec![CitationUrl {
                url_type: UrlType::Archive,
                url: "https://abc.com".to_string(),
            }],
        );
        assert_ne!(plain.fingerprint(), archived.fingerprint());
    }

    #[test]
    fn field_values_cannot_bleed_into_each_other() {
        // the length prefix keeps a ';'-carrying title from mimicking a doi
        let sneaky = citation_with(Some("a3:b;[d-;"), None, vec![]);
        let honest = citation_with(Some("a3:b"), Some("-"), vec![]);
        assert_ne!(sneaky.fingerprint(), honest.fingerprint());
    }

    #[test]
    fn page_roundtrips_through_bincode() {
        let page = Page {
            title: "My Page".into(),
            page_id: 1,
            citations: vec![AnnotatedCitation {
                citation: citation_with(Some("T"), Some("10.1/x"), vec![]),
                revision_added: 5,
                revision_removed: Some(7),
            }],
        };
        let bytes = bincode::serialize(&page).unwrap();
        let back: Page = bincode::deserialize(&bytes).unwrap();
        assert_eq!(page, back);
    }
}
