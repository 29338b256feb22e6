use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use wikicite_rs::template_parser::{Parser, ParserOptions};

fn generate_wikitext(length: u64) -> String {
    // generate inputs from fixed seeds
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(length); /* define specific algorithm to ensure reproducibility */
    let mut input = String::new();
    for _ in 0..length {
        input.push(rng.gen_range(b'a'..=b'z') as char);
        if rng.gen_bool(0.15) {
            input.push(' ');
        }
    }

    // sprinkle citation templates at random word boundaries
    const TEMPLATES: &[&str] = &[
        "{{cite journal|title=Parsing in Practice|doi=10.1007/b62130}}",
        "{{cite web|title=City bees|url=https://example.com|archive-url=https://archive.example}}",
        "{{cite book|title=A Book|isbn=0-786918-50-0|pmid=17322060}}",
        "{{Citation|title=An Analysis|issn=2049-3630|pmc=PMC345678}}",
    ];
    for _ in 0..(length / 50).max(1) {
        let mut pos = rng.gen_range(0..input.len());
        while !input.is_char_boundary(pos) {
            pos = rng.gen_range(0..input.len());
        }
        input.insert_str(pos, TEMPLATES[rng.gen_range(0..TEMPLATES.len())]);
    }

    input
}

fn bench_parse(c: &mut Criterion) {
    // random insertion can split an identifier mid-template
    let parser = Parser::new().with_options(ParserOptions {
        ignore_invalid_ident: true,
    });

    let mut group = c.benchmark_group("template_parser");
    for length in [500u64, 1000, 5000, 10000] {
        let input = generate_wikitext(length);
        group.bench_with_input(BenchmarkId::new("parse", length), &input, |b, i| {
            b.iter(|| parser.parse(i).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
