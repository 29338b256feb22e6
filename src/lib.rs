// SPDX-License-Identifier: MPL-2.0
//! # wikicite_rs
//!
//! Extract citation history from Wikimedia XML dumps.
//!
//! ## Overview
//!
//! `wikicite_rs` streams through a MediaWiki export document (optionally
//! bzip2-compressed) and produces, for every article page, the set of
//! distinct citations that ever appeared in it. Each citation is annotated
//! with the revision that introduced it and, if it later disappeared, the
//! revision that removed it. Alongside the pages it emits exactly the
//! revisions named by those annotations, so downstream tooling can show who
//! added or removed a source and when without carrying the whole revision
//! history around.
//!
//! The pipeline is single-threaded and pull-driven. Memory is bounded by the
//! largest single page, not by the dump: per-page state is released on every
//! closing `</page>`, and revision text is discarded as soon as its citation
//! templates have been extracted.
//!
//! ## Basic usage
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use wikicite_rs::extract::{Bz2Extractor, Extractor};
//! use wikicite_rs::template_parser::Parser;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dump = File::open("enwiki-20240901-pages-meta-history.xml.bz2")?;
//!
//!     let extractor = Bz2Extractor::new(Parser::new());
//!     let (pages, revisions) = extractor.extract(BufReader::new(dump))?;
//!
//!     for page in &pages {
//!         for annotated in &page.citations {
//!             let added = &revisions[&annotated.revision_added];
//!             println!(
//!                 "{:?} added in revision {} by {:?}",
//!                 annotated.citation.title, added.revision_id, added.user
//!             );
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming mode
//!
//! For dump-scale runs the extracted pages and revisions can be written out
//! as they complete instead of being materialised. Messages go through a
//! simple framing layer (4-byte big-endian length prefix, then the
//! serialised message) that [`framing::MessageReader`] reverses:
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::{BufReader, BufWriter};
//!
//! use wikicite_rs::extract::{Extractor, TextExtractor};
//! use wikicite_rs::template_parser::Parser;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dump = BufReader::new(File::open("dump.xml")?);
//!     let pages_out = BufWriter::new(File::create("pages.bin")?);
//!     let revisions_out = BufWriter::new(File::create("revisions.bin")?);
//!
//!     let extractor = TextExtractor::new(Parser::new());
//!     let (pages, revisions) = extractor.extract_streaming(dump, pages_out, revisions_out)?;
//!     eprintln!("wrote {pages} pages and {revisions} revisions");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Filtering and options
//!
//! The template parser accepts a name filter (applied to the trimmed,
//! lower-cased template name) and an options record; see
//! [`template_parser::Parser`]. By default every template is treated as a
//! citation and unparseable numeric identifiers fail the extraction; set
//! [`template_parser::ParserOptions::ignore_invalid_ident`] to drop them
//! instead.
//!
//! ## Errors
//!
//! Two error families cover the crate:
//! [`template_parser::TemplateParseError`] for wikitext-level failures and
//! [`dump_parser::DumpParseError`] for everything the XML reader or the
//! decompressor reports. Errors abort the extraction; there is no partial
//! recovery.

mod diff;
pub mod dump_parser;
pub mod extract;
pub mod framing;
pub mod model;
pub mod template_parser;
