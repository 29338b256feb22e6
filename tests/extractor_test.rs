//! End-to-end tests of the extraction pipeline: XML (plain and
//! bzip2-compressed) in, annotated citation pages and framed message streams
//! out.

use std::fs::File;
use std::io::{BufReader, Cursor, Write};

use bzip2::write::BzEncoder;
use bzip2::Compression;
use tempfile::NamedTempFile;

use wikicite_rs::extract::{Bz2Extractor, Extractor, TextExtractor};
use wikicite_rs::framing::MessageReader;
use wikicite_rs::model::{Page, Revision};
use wikicite_rs::template_parser::{Parser, ParserOptions};

/// Helper: compress an XML snippet into a temp `.bz2` file, the way dump
/// fixtures ship.
fn create_bz2_xml(xml: &str) -> NamedTempFile {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(xml.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&compressed).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn single_revision_single_citation() -> &'static str {
    r#"<mediawiki>
        <page>
            <title>My Page</title>
            <id>1</id>
            <revision>
                <id>5</id>
                <parentid>4</parentid>
                <timestamp>2020-01-01T00:00:00Z</timestamp>
                <contributor><username>alice</username><id>42</id></contributor>
                <text>Intro prose.{{cite journal|title=Parsing in Practice|doi=10.1007/b62130|pmid=17322060}} Outro.</text>
            </revision>
        </page>
    </mediawiki>"#
}

#[test]
fn bz2_extract_single_citation_from_single_revision() {
    let tmp = create_bz2_xml(single_revision_single_citation());
    let file = BufReader::new(File::open(tmp.path()).unwrap());

    let extractor = Bz2Extractor::new(Parser::new());
    let (pages, revisions) = extractor.extract(file).unwrap();

    assert_eq!(pages.len(), 1);
    let page = &pages[0];
    assert_eq!(page.title, "My Page");
    assert_eq!(page.page_id, 1);
    assert_eq!(page.citations.len(), 1);

    let citation = &page.citations[0];
    assert_eq!(citation.revision_added, 5);
    assert_eq!(citation.revision_removed, None);
    assert_eq!(
        citation.citation.title.as_deref(),
        Some("Parsing in Practice")
    );
    let identifiers = citation.citation.identifiers.as_ref().unwrap();
    assert_eq!(identifiers.doi.as_deref(), Some("10.1007/b62130"));
    assert_eq!(identifiers.pmid, Some(17322060));

    let revision = &revisions[&5];
    assert_eq!(revision.revision_id, 5);
    assert_eq!(revision.parent_id, Some(4));
    assert_eq!(revision.user.as_deref(), Some("alice"));
}

#[test]
fn bz2_streaming_roundtrips_through_the_framing_layer() {
    let tmp = create_bz2_xml(single_revision_single_citation());
    let file = BufReader::new(File::open(tmp.path()).unwrap());

    let mut pages_buf = Vec::new();
    let mut revisions_buf = Vec::new();

    let extractor = Bz2Extractor::new(Parser::new());
    let (pages_written, revisions_written) = extractor
        .extract_streaming(file, &mut pages_buf, &mut revisions_buf)
        .unwrap();

    assert_eq!(pages_written, 1);
    assert_eq!(revisions_written, 1);

    let page: Page = MessageReader::new(Cursor::new(pages_buf))
        .read_message()
        .unwrap();
    assert_eq!(page.title, "My Page");
    assert_eq!(page.page_id, 1);
    assert_eq!(page.citations.len(), 1);
    assert_eq!(page.citations[0].revision_added, 5);
    assert_eq!(page.citations[0].revision_removed, None);

    let revision: Revision = MessageReader::new(Cursor::new(revisions_buf))
        .read_message()
        .unwrap();
    assert_eq!(revision.revision_id, 5);
}

#[test]
fn citation_lifecycle_spans_revisions() {
    let xml = r#"<mediawiki>
        <page>
            <title>Lifecycle</title>
            <id>1</id>
            <revision>
                <id>5</id>
                <timestamp>2020-01-01T00:00:00Z</timestamp>
                <text>{{cite web|title=Kept|url=https://kept.example}}{{cite web|title=Dropped}}</text>
            </revision>
            <revision>
                <id>7</id>
                <timestamp>2020-02-01T00:00:00Z</timestamp>
                <text>{{cite web|title=Kept|url=https://kept.example}}</text>
            </revision>
        </page>
    </mediawiki>"#;

    let (pages, revisions) = TextExtractor::new(Parser::new())
        .extract(Cursor::new(xml))
        .unwrap();

    let page = &pages[0];
    assert_eq!(page.citations.len(), 2);

    let kept = page
        .citations
        .iter()
        .find(|c| c.citation.title.as_deref() == Some("Kept"))
        .unwrap();
    let dropped = page
        .citations
        .iter()
        .find(|c| c.citation.title.as_deref() == Some("Dropped"))
        .unwrap();

    assert_eq!(kept.revision_added, 5);
    assert_eq!(kept.revision_removed, None);
    assert_eq!(dropped.revision_added, 5);
    assert_eq!(dropped.revision_removed, Some(7));

    assert_eq!(revisions.keys().copied().collect::<Vec<_>>(), vec![5, 7]);
}

#[test]
fn multiple_pages_produce_independent_citation_sets() {
    let xml = r#"<mediawiki>
        <page>
            <title>My Page</title>
            <id>1</id>
            <revision>
                <id>5</id>
                <timestamp>2020-01-01T00:00:00Z</timestamp>
                <text>{{cite journal|title=Shared Title}}</text>
            </revision>
            <revision>
                <id>6</id>
                <timestamp>2020-02-01T00:00:00Z</timestamp>
                <text>no more citations</text>
            </revision>
        </page>
        <page>
            <title>My Second Page</title>
            <id>2</id>
            <revision>
                <id>8</id>
                <timestamp>2020-01-15T00:00:00Z</timestamp>
                <text>{{cite journal|title=Shared Title}}</text>
            </revision>
        </page>
    </mediawiki>"#;

    let (pages, revisions) = TextExtractor::new(Parser::new())
        .extract(Cursor::new(xml))
        .unwrap();

    assert_eq!(pages.len(), 2);

    // first page: added in 5, removed in 6
    assert_eq!(pages[0].citations.len(), 1);
    assert_eq!(pages[0].citations[0].revision_added, 5);
    assert_eq!(pages[0].citations[0].revision_removed, Some(6));

    // second page: the same citation content, tracked independently
    assert_eq!(pages[1].citations.len(), 1);
    assert_eq!(pages[1].citations[0].revision_added, 8);
    assert_eq!(pages[1].citations[0].revision_removed, None);

    assert_eq!(revisions.keys().copied().collect::<Vec<_>>(), vec![5, 6, 8]);
}

#[test]
fn malformed_xml_reports_a_dump_error() {
    let xml = r#"<mediawiki>
        <page>
            <title>Broken</title>
            <id>1</id>
            <revision>
                <id>5</id>
        </page>
    </mediawiki>"#;

    let result = TextExtractor::new(Parser::new()).extract(Cursor::new(xml));
    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(message.starts_with("dump parse failure"), "{message}");
}

#[test]
fn invalid_identifier_policy_applies_end_to_end() {
    let xml = r#"<mediawiki>
        <page>
            <title>Idents</title>
            <id>1</id>
            <revision>
                <id>5</id>
                <timestamp>2020-01-01T00:00:00Z</timestamp>
                <text>{{cite journal|title=T|pmc=abc123}}</text>
            </revision>
        </page>
    </mediawiki>"#;

    let strict = TextExtractor::new(Parser::new()).extract(Cursor::new(xml));
    assert!(strict.is_err());

    let lenient_parser = Parser::new().with_options(ParserOptions {
        ignore_invalid_ident: true,
    });
    let (pages, _) = TextExtractor::new(lenient_parser)
        .extract(Cursor::new(xml))
        .unwrap();

    let citation = &pages[0].citations[0].citation;
    assert_eq!(citation.title.as_deref(), Some("T"));
    assert!(citation.identifiers.is_none());
}

#[test]
fn name_filter_limits_extraction() {
    let xml = r#"<mediawiki>
        <page>
            <title>Filtered</title>
            <id>1</id>
            <revision>
                <id>5</id>
                <timestamp>2020-01-01T00:00:00Z</timestamp>
                <text>{{cite journal|title=J}}{{cite book|title=B}}</text>
            </revision>
        </page>
    </mediawiki>"#;

    let parser = Parser::new().with_filter(|name| name == "cite book");
    let (pages, _) = TextExtractor::new(parser).extract(Cursor::new(xml)).unwrap();

    assert_eq!(pages[0].citations.len(), 1);
    assert_eq!(pages[0].citations[0].citation.title.as_deref(), Some("B"));
}

#[test]
fn empty_dump_yields_nothing() {
    let (pages, revisions) = TextExtractor::new(Parser::new())
        .extract(Cursor::new("<mediawiki></mediawiki>"))
        .unwrap();
    assert!(pages.is_empty());
    assert!(revisions.is_empty());
}
