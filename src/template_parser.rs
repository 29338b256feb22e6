use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::model::{CitationUrl, ExtractedCitation, Identifiers, RevisionCitations, UrlType};

/// Raised when citation extraction from wikitext fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateParseError {
    #[error("citation parse failure: {0}")]
    Message(String),
    #[error("citation parse failure: {message} (input: \"{input}\")")]
    WithInput { message: String, input: String },
}

const MAX_INPUT_CONTEXT: usize = 100;

impl TemplateParseError {
    pub fn new(message: impl Into<String>) -> Self {
        TemplateParseError::Message(message.into())
    }

    /// Attach the offending text, truncated so error messages stay readable.
    pub fn with_input(message: impl Into<String>, input: &str) -> Self {
        let input = if input.chars().count() <= MAX_INPUT_CONTEXT {
            input.to_string()
        } else {
            let mut truncated: String = input.chars().take(MAX_INPUT_CONTEXT - 3).collect();
            truncated.push_str("...");
            truncated
        };
        TemplateParseError::WithInput {
            message: message.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// Should invalid identifiers be ignored?
    ///
    /// If set, the parser will not fail when it cannot process an identifier.
    /// E.g. if it encounters `abc123` for `pmid` (which needs to be numeric),
    /// this identifier is left out of the resulting citation.
    pub ignore_invalid_ident: bool,
}

type NameFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// A wikitext parser that extracts citation templates, optionally filtering
/// by template name.
///
/// The name passed to the filter is normalised: trimmed and lower-cased.
///
/// ```
/// use wikicite_rs::template_parser::Parser;
///
/// let parser = Parser::new().with_filter(|name| name == "cite book");
/// let result = parser
///     .parse("{{cite book | title=Parsing in Practice | author=Jones | year=2022}}")
///     .unwrap();
/// assert_eq!(result.citations.len(), 1);
/// ```
pub struct Parser {
    filter: Option<NameFilter>,
    options: ParserOptions,
}

impl Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("filter", &self.filter.as_ref().map(|_| "..."))
            .field("options", &self.options)
            .finish()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// the parse result before projection into an `ExtractedCitation`
struct RawTemplate<'t> {
    name: &'t str,
    params: Vec<RawParam<'t>>,
}

struct RawParam<'t> {
    key: &'t str,
    value: Option<&'t str>,
}

impl Parser {
    /// A parser with no filter and default options: every template in the
    /// input becomes a citation.
    pub fn new() -> Self {
        Self {
            filter: None,
            options: ParserOptions::default(),
        }
    }

    pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    /// Extract citations from a block of wikitext.
    ///
    /// Runs in prefix mode: text around and after templates is skipped, and
    /// scanning stops at the first `{{` that does not open a well-formed
    /// template. Not finding any template is not an error.
    pub fn parse(&self, text: &str) -> Result<RevisionCitations, TemplateParseError> {
        let mut citations = BTreeMap::new();

        let mut pos = 0;
        while let Some(offset) = text[pos..].find("{{") {
            let Some((template, end)) = scan_template(text, pos + offset) else {
                break;
            };
            pos = end;

            let name = template.name.trim().to_lowercase();
            if let Some(filter) = &self.filter {
                if !filter(&name) {
                    continue;
                }
            }

            let citation = self.build_citation(&template)?;
            // equal citations share a fingerprint, so the last one wins
            citations.insert(citation.fingerprint(), citation);
        }

        Ok(RevisionCitations {
            revision: None,
            citations,
        })
    }

    /// Project the recognised parameters of a template onto the structured
    /// citation. Unrecognised keys and parameters without a value are
    /// skipped.
    fn build_citation(
        &self,
        template: &RawTemplate<'_>,
    ) -> Result<ExtractedCitation, TemplateParseError> {
        let mut citation = ExtractedCitation::default();

        for param in &template.params {
            let key = param.key.trim().to_lowercase();
            let Some(value) = param.value else {
                continue;
            };
            let value = value.trim();

            match key.as_str() {
                "title" => citation.title = Some(value.to_string()),
                "doi" => {
                    // DOIs are stored in short form
                    let doi = value.strip_prefix("https://doi.org/").unwrap_or(value);
                    identifiers(&mut citation).doi = Some(doi.to_string());
                }
                "isbn" => identifiers(&mut citation).isbn = Some(value.to_string()),
                "issn" => identifiers(&mut citation).issn = Some(value.to_string()),
                "pmid" => {
                    if let Some(pmid) = self.parse_int_ident(value)? {
                        identifiers(&mut citation).pmid = Some(pmid);
                    }
                }
                "pmc" => {
                    let digits = value.strip_prefix("PMC").unwrap_or(value);
                    if let Some(pmcid) = self.parse_int_ident(digits)? {
                        identifiers(&mut citation).pmcid = Some(pmcid);
                    }
                }
                "url" => citation.urls.push(CitationUrl {
                    url_type: UrlType::Default,
                    url: value.to_string(),
                }),
                "archive-url" => citation.urls.push(CitationUrl {
                    url_type: UrlType::Archive,
                    url: value.to_string(),
                }),
                _ => {}
            }
        }

        Ok(citation)
    }

    /// Numeric identifiers are 32-bit; anything unparseable (including
    /// out-of-range values) is invalid and handled according to
    /// [`ParserOptions::ignore_invalid_ident`].
    fn parse_int_ident(&self, ident: &str) -> Result<Option<i32>, TemplateParseError> {
        match ident.parse::<i32>() {
            Ok(value) => Ok(Some(value)),
            Err(_) if self.options.ignore_invalid_ident => Ok(None),
            Err(_) => Err(TemplateParseError::with_input(
                "cannot convert identifier to a number",
                ident,
            )),
        }
    }
}

fn identifiers(citation: &mut ExtractedCitation) -> &mut Identifiers {
    citation.identifiers.get_or_insert_with(Identifiers::default)
}

/// Scan one template starting at `open` (which must point at `{{`).
///
/// Returns the raw template and the position just past the closing `}}`, or
/// `None` if the text at `open` is not a complete template. Only `|`, `=`,
/// `{` and `}` are structural, so byte positions are always char boundaries.
fn scan_template(text: &str, open: usize) -> Option<(RawTemplate<'_>, usize)> {
    let bytes = text.as_bytes();
    debug_assert!(bytes[open..].starts_with(b"{{"));

    let name_start = open + 2;
    let name_end = name_start + bytes[name_start..].iter().position(|&b| b == b'|')?;
    let name = &text[name_start..name_end];
    // a name needs at least one character, but whitespace counts
    if name.is_empty() {
        return None;
    }

    let mut params = Vec::new();
    let mut seg_start = name_end + 1;
    let mut eq_pos: Option<usize> = None;

    let mut cursor = seg_start;
    loop {
        match bytes.get(cursor) {
            Some(b'|') => {
                params.push(raw_param(text, seg_start, cursor, eq_pos));
                seg_start = cursor + 1;
                eq_pos = None;
                cursor += 1;
            }
            Some(b'}') => {
                // values cannot contain a lone '}'; this must close the template
                if bytes.get(cursor + 1) != Some(&b'}') {
                    return None;
                }
                params.push(raw_param(text, seg_start, cursor, eq_pos));
                return Some((RawTemplate { name, params }, cursor + 2));
            }
            Some(b'=') => {
                if eq_pos.is_none() {
                    eq_pos = Some(cursor);
                }
                cursor += 1;
            }
            Some(_) => cursor += 1,
            None => return None, /* ran off the end of the text */
        }
    }
}

/// Cut one `key` or `key=value` segment out of the parameter region.
fn raw_param(text: &str, seg_start: usize, seg_end: usize, eq_pos: Option<usize>) -> RawParam<'_> {
    match eq_pos {
        Some(eq) => RawParam {
            key: &text[seg_start..eq],
            value: Some(&text[eq + 1..seg_end]),
        },
        None => RawParam {
            key: &text[seg_start..seg_end],
            value: None,
        },
    }
}
