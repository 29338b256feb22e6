use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser as _;
use tracing_subscriber::EnvFilter;

use wikicite_rs::extract::{Bz2Extractor, Extractor, TextExtractor};
use wikicite_rs::template_parser::{Parser, ParserOptions};

#[derive(Debug, clap::Parser)]
#[command(name = "wikicite", version, about = "Extract citation history from Wikimedia XML dumps")]
struct CommandLine {
    /// Dump to process; `.bz2` inputs are decompressed transparently
    input_file: PathBuf,

    /// Force bzip2 decompression regardless of file extension
    #[arg(long)]
    bz2: bool,

    /// Only extract templates with this name (repeatable, e.g. "cite journal")
    #[arg(long = "template")]
    templates: Vec<String>,

    /// Drop numeric identifiers that cannot be parsed instead of failing
    #[arg(long)]
    ignore_invalid_idents: bool,

    /// Stream framed pages to this file instead of printing a summary
    #[arg(long, requires = "revisions_out")]
    pages_out: Option<PathBuf>,

    /// Stream framed referenced revisions to this file
    #[arg(long, requires = "pages_out")]
    revisions_out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CommandLine::parse();

    let mut parser = Parser::new().with_options(ParserOptions {
        ignore_invalid_ident: args.ignore_invalid_idents,
    });
    if !args.templates.is_empty() {
        let accepted: Vec<String> = args
            .templates
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();
        parser = parser.with_filter(move |name| accepted.iter().any(|accept| accept == name));
    }

    let file = File::open(&args.input_file)
        .with_context(|| format!("cannot open {}", args.input_file.display()))?;
    let reader = BufReader::new(file);

    let use_bz2 = args.bz2
        || args
            .input_file
            .extension()
            .is_some_and(|extension| extension == "bz2");

    match (&args.pages_out, &args.revisions_out) {
        (Some(pages_path), Some(revisions_path)) => {
            let pages_out = BufWriter::new(
                File::create(pages_path)
                    .with_context(|| format!("cannot create {}", pages_path.display()))?,
            );
            let revisions_out = BufWriter::new(
                File::create(revisions_path)
                    .with_context(|| format!("cannot create {}", revisions_path.display()))?,
            );

            let (pages, revisions) = if use_bz2 {
                Bz2Extractor::new(parser).extract_streaming(reader, pages_out, revisions_out)?
            } else {
                TextExtractor::new(parser).extract_streaming(reader, pages_out, revisions_out)?
            };

            tracing::info!(pages, revisions, "streaming extraction finished");
            println!("{pages} pages, {revisions} revisions written");
        }
        _ => {
            let (pages, revisions) = if use_bz2 {
                Bz2Extractor::new(parser).extract(reader)?
            } else {
                TextExtractor::new(parser).extract(reader)?
            };

            for page in &pages {
                println!(
                    "{}\t{}\t{} citations",
                    page.page_id,
                    page.title,
                    page.citations.len()
                );
            }
            println!(
                "{} pages, {} referenced revisions",
                pages.len(),
                revisions.len()
            );
        }
    }

    Ok(())
}
