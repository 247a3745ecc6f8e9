use blockc::{lexer, token::Pos};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/programs.blk");

fn lexer(input: &str) {
    let mut i = 0;
    let (mut rest, mut pos) = (input, Pos::START);
    loop {
        let out = lexer::lex(rest, pos);
        if out.tokens.is_empty() {
            break;
        }
        i += out.tokens.iter().filter(|t| !t.is_error()).count();
        (rest, pos) = (out.remaining, out.next);
    }
    black_box(i);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lexer", |b| {
        b.iter(|| {
            black_box(lexer(black_box(INPUT)));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
