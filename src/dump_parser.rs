use std::collections::BTreeMap;
use std::io::BufRead;
use std::mem;

use compact_str::CompactString;
use quick_xml::events::Event;

use crate::diff::diff_revisions;
use crate::model::{Page, Revision, RevisionCitations, Timestamp};
use crate::template_parser::{Parser, TemplateParseError};

/// Raised when a Wikimedia export stream cannot be processed.
///
/// Everything the underlying XML reader reports is fatal here, as are
/// malformed field values; there is no local recovery.
#[derive(Debug, thiserror::Error)]
pub enum DumpParseError {
    #[error("dump parse failure: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("dump parse failure: invalid {field} value {value:?}")]
    InvalidField {
        field: &'static str,
        value: String,
    },
    #[error("dump parse failure: unexpected end of file")]
    UnexpectedEof,
    #[error("dump parse failure: revision id {0} appears more than once")]
    DuplicateRevision(u64),
    #[error(transparent)]
    Template(#[from] TemplateParseError),
    #[error("dump parse failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives each page as its closing element is seen, together with the
/// revisions referenced by the page's citation annotations.
pub(crate) trait Sink {
    fn store(&mut self, page: Page, revisions: BTreeMap<u64, Revision>)
        -> Result<(), DumpParseError>;
}

/// Streaming driver over a MediaWiki export document.
///
/// Keeps only the state of the page currently being read: nesting flags, the
/// field accumulator, and the per-revision citation list. Revision text is
/// handed to the template parser as soon as its element closes and is not
/// kept around.
pub(crate) struct DumpParser<'p> {
    parser: &'p Parser,

    // where we are in the document
    in_page: bool,
    in_revision: bool,
    in_contributor: bool,
    should_store: bool,

    text_buf: String,
    current_title: CompactString,
    current_page_id: u64,
    current_revision: Revision,
    current_citations: RevisionCitations,
    citations_by_revision: Vec<RevisionCitations>,
}

impl<'p> DumpParser<'p> {
    pub(crate) fn new(parser: &'p Parser) -> Self {
        Self {
            parser,
            in_page: false,
            in_revision: false,
            in_contributor: false,
            should_store: false,
            text_buf: String::new(),
            current_title: CompactString::default(),
            current_page_id: 0,
            current_revision: Revision::default(),
            current_citations: RevisionCitations::default(),
            citations_by_revision: Vec::new(),
        }
    }

    /// Drive the XML reader to the end of the document, handing each
    /// finished page to `sink`.
    pub(crate) fn run<R: BufRead, S: Sink>(
        mut self,
        reader: R,
        sink: &mut S,
    ) -> Result<(), DumpParseError> {
        let mut xml_reader = quick_xml::Reader::from_reader(reader);
        // a mismatched closing tag must surface as an error, not be skipped
        xml_reader.config_mut().check_end_names = true;

        let mut buf = Vec::with_capacity(64 * 1024);
        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => self.on_start_element(e.name().as_ref()),
                Event::Empty(ref e) => {
                    let name = e.name();
                    self.on_start_element(name.as_ref());
                    self.on_end_element(name.as_ref(), sink)?;
                }
                Event::Text(ref e) => {
                    if self.should_store {
                        // unescaping here keeps entity substitution transparent
                        self.text_buf.push_str(&e.unescape()?);
                    }
                }
                Event::End(ref e) => self.on_end_element(e.name().as_ref(), sink)?,
                Event::Eof => {
                    if self.in_page || self.in_revision {
                        return Err(DumpParseError::UnexpectedEof);
                    }
                    return Ok(());
                }
                _ => {}
            }
            buf.clear();
        }
    }

    fn on_start_element(&mut self, name: &[u8]) {
        self.text_buf.clear();
        match name {
            b"page" => self.in_page = true,
            b"revision" => {
                self.in_revision = true;
                self.current_revision = Revision::default();
                self.current_citations = RevisionCitations::default();
            }
            b"contributor" => self.in_contributor = true,
            _ => {}
        }
        // accumulate character data only for elements whose end we act on
        self.should_store = match name {
            b"title" => self.in_page,
            b"id" => self.in_page || self.in_revision,
            b"parentid" | b"username" | b"timestamp" | b"text" => self.in_revision,
            _ => false,
        };
    }

    fn on_end_element<S: Sink>(
        &mut self,
        name: &[u8],
        sink: &mut S,
    ) -> Result<(), DumpParseError> {
        match name {
            b"page" => self.on_end_page(sink)?,
            b"revision" => self.on_end_revision(),
            b"contributor" => self.in_contributor = false,
            _ => self.on_end_field(name)?,
        }
        self.should_store = false;
        Ok(())
    }

    fn on_end_field(&mut self, name: &[u8]) -> Result<(), DumpParseError> {
        match name {
            b"title" if self.in_page => {
                self.current_title = CompactString::from(self.text_buf.as_str());
            }
            b"id" if self.in_page && !self.in_revision && !self.in_contributor => {
                self.current_page_id = parse_u64("page id", &self.text_buf)?;
            }
            b"id" if self.in_revision && !self.in_contributor => {
                self.current_revision.revision_id = parse_u64("revision id", &self.text_buf)?;
            }
            b"parentid" if self.in_revision => {
                self.current_revision.parent_id = Some(parse_u64("parent id", &self.text_buf)?);
            }
            b"username" if self.in_revision => {
                self.current_revision.user = Some(CompactString::from(self.text_buf.as_str()));
            }
            b"timestamp" if self.in_revision => {
                self.current_revision.timestamp = parse_timestamp(&self.text_buf)?;
            }
            b"text" if self.in_revision => {
                self.current_citations = self.parser.parse(&self.text_buf)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn on_end_revision(&mut self) {
        self.in_revision = false;
        let mut citations = mem::take(&mut self.current_citations);
        citations.revision = Some(mem::take(&mut self.current_revision));
        self.citations_by_revision.push(citations);
    }

    fn on_end_page<S: Sink>(&mut self, sink: &mut S) -> Result<(), DumpParseError> {
        self.in_page = false;
        let diff = diff_revisions(mem::take(&mut self.citations_by_revision));
        let page = Page {
            title: mem::take(&mut self.current_title),
            page_id: mem::take(&mut self.current_page_id),
            citations: diff.citations,
        };
        tracing::trace!(
            title = %page.title,
            citations = page.citations.len(),
            referenced_revisions = diff.revisions.len(),
            "finished page"
        );
        sink.store(page, diff.revisions)
    }
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, DumpParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| DumpParseError::InvalidField {
            field,
            value: value.to_string(),
        })
}

fn parse_timestamp(value: &str) -> Result<Timestamp, DumpParseError> {
    // the dump format; RFC 3339 as a fallback covers fractional seconds
    const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    let value = value.trim();
    let parsed = chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
        .or_else(|_| {
            chrono::DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&chrono::Utc))
        })
        .map_err(|_| DumpParseError::InvalidField {
            field: "timestamp",
            value: value.to_string(),
        })?;

    Ok(Timestamp {
        seconds: parsed.timestamp(),
        nanos: parsed.timestamp_subsec_nanos() as i32,
    })
}
