//! The extractor surface: feed it a Wikimedia export stream, get back every
//! page's citation history.
//!
//! Two input front-ends ([`TextExtractor`] for plain XML, [`Bz2Extractor`]
//! for bzip2-compressed dumps) and two output modes: materialise everything
//! in memory, or stream framed messages to a pair of writers.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};

use bzip2::read::BzDecoder;

use crate::dump_parser::{DumpParseError, DumpParser, Sink};
use crate::framing::MessageWriter;
use crate::model::{Page, Revision};
use crate::template_parser::Parser;

/// Parses Wikimedia XML dumps into per-page citation sets and the revisions
/// those citations reference.
pub trait Extractor {
    /// Extract every page, returning the page list and the union of all
    /// referenced revisions keyed by revision id.
    fn extract<R: BufRead>(
        &self,
        input: R,
    ) -> Result<(Vec<Page>, BTreeMap<u64, Revision>), DumpParseError>;

    /// Extract and write each page and each referenced revision through the
    /// framing layer as soon as it is complete. Returns the number of pages
    /// and revisions written.
    ///
    /// On error nothing further is written and no counts are reported;
    /// messages already on the sinks stay there.
    fn extract_streaming<R, P, V>(
        &self,
        input: R,
        pages_output: P,
        revisions_output: V,
    ) -> Result<(u64, u64), DumpParseError>
    where
        R: BufRead,
        P: Write,
        V: Write;
}

/// Extractor for plain-text XML dumps.
pub struct TextExtractor {
    parser: Parser,
}

impl TextExtractor {
    pub fn new(parser: Parser) -> Self {
        Self { parser }
    }
}

impl Extractor for TextExtractor {
    fn extract<R: BufRead>(
        &self,
        input: R,
    ) -> Result<(Vec<Page>, BTreeMap<u64, Revision>), DumpParseError> {
        run_materialise(&self.parser, input)
    }

    fn extract_streaming<R, P, V>(
        &self,
        input: R,
        pages_output: P,
        revisions_output: V,
    ) -> Result<(u64, u64), DumpParseError>
    where
        R: BufRead,
        P: Write,
        V: Write,
    {
        run_streaming(&self.parser, input, pages_output, revisions_output)
    }
}

/// Extractor for bzip2-compressed dumps, as published by Wikimedia.
pub struct Bz2Extractor {
    parser: Parser,
}

impl Bz2Extractor {
    pub fn new(parser: Parser) -> Self {
        Self { parser }
    }
}

impl Extractor for Bz2Extractor {
    fn extract<R: BufRead>(
        &self,
        input: R,
    ) -> Result<(Vec<Page>, BTreeMap<u64, Revision>), DumpParseError> {
        run_materialise(&self.parser, BufReader::new(BzDecoder::new(input)))
    }

    fn extract_streaming<R, P, V>(
        &self,
        input: R,
        pages_output: P,
        revisions_output: V,
    ) -> Result<(u64, u64), DumpParseError>
    where
        R: BufRead,
        P: Write,
        V: Write,
    {
        run_streaming(
            &self.parser,
            BufReader::new(BzDecoder::new(input)),
            pages_output,
            revisions_output,
        )
    }
}

fn run_materialise<R: BufRead>(
    parser: &Parser,
    input: R,
) -> Result<(Vec<Page>, BTreeMap<u64, Revision>), DumpParseError> {
    let mut sink = MaterialiseSink::default();
    DumpParser::new(parser).run(input, &mut sink)?;
    Ok((sink.pages, sink.revisions))
}

fn run_streaming<R, P, V>(
    parser: &Parser,
    input: R,
    pages_output: P,
    revisions_output: V,
) -> Result<(u64, u64), DumpParseError>
where
    R: BufRead,
    P: Write,
    V: Write,
{
    let mut sink = StreamingSink {
        pages: MessageWriter::new(pages_output),
        revisions: MessageWriter::new(revisions_output),
        pages_written: 0,
        revisions_written: 0,
    };
    DumpParser::new(parser).run(input, &mut sink)?;
    sink.pages.flush()?;
    sink.revisions.flush()?;
    Ok((sink.pages_written, sink.revisions_written))
}

#[derive(Default)]
struct MaterialiseSink {
    pages: Vec<Page>,
    revisions: BTreeMap<u64, Revision>,
}

impl Sink for MaterialiseSink {
    fn store(
        &mut self,
        page: Page,
        revisions: BTreeMap<u64, Revision>,
    ) -> Result<(), DumpParseError> {
        self.pages.push(page);
        for (id, revision) in revisions {
            // revision ids are globally unique in a well-formed dump
            if self.revisions.insert(id, revision).is_some() {
                return Err(DumpParseError::DuplicateRevision(id));
            }
        }
        Ok(())
    }
}

struct StreamingSink<P: Write, V: Write> {
    pages: MessageWriter<P>,
    revisions: MessageWriter<V>,
    pages_written: u64,
    revisions_written: u64,
}

impl<P: Write, V: Write> Sink for StreamingSink<P, V> {
    fn store(
        &mut self,
        page: Page,
        revisions: BTreeMap<u64, Revision>,
    ) -> Result<(), DumpParseError> {
        self.pages.write_message(&page)?;
        self.pages_written += 1;

        for revision in revisions.values() {
            self.revisions.write_message(revision)?;
            self.revisions_written += 1;
        }
        Ok(())
    }
}
