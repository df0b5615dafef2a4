use indoc::indoc;
use sourcer_core::Colors;
use sourcer_grammar::builder::*;
use sourcer_grammar::Grammar;

use super::{Parser, PrintTracer, Verbosity};

fn sum_grammar() -> Grammar {
    let mut g = Grammar::builder();
    g.register("Sum", seq([rule("Number"), bind("op", lit("+")), rule("Number")]))
        .unwrap();
    g.register("Number", regex("[0-9]+")).unwrap();
    g.build().unwrap()
}

fn trace(grammar: &Grammar, start: &str, input: &str, verbosity: Verbosity) -> String {
    let mut tracer = PrintTracer::new(input, verbosity, Colors::OFF);
    let _ = Parser::new(grammar).parse_with(start, input, &mut tracer);
    tracer.dump()
}

#[test]
fn default_shows_rule_calls() {
    let g = sum_grammar();
    insta::assert_snapshot!(trace(&g, "Sum", "12+7", Verbosity::Default), @r"
    0 ▶ Sum
    0   ▶ Number
    0   ◀ Number 0..2
    3   ▶ Number
    3   ◀ Number 3..4
    0 ◀ Sum 0..4
    ");
}

#[test]
fn verbose_adds_terminals_and_text() {
    let g = sum_grammar();
    assert_eq!(
        trace(&g, "Sum", "12+7", Verbosity::Verbose),
        indoc! {r#"
            0 ▶ Sum
            0   ▶ Number
            0     ● `[0-9]+`
            0   ◀ Number 0..2 12
            2   ● "+"
            3   ▶ Number
            3     ● `[0-9]+`
            3   ◀ Number 3..4 7
            0 ◀ Sum 0..4 12+7"#}
    );
}

#[test]
fn failures_and_cache_hits() {
    let mut g = Grammar::builder();
    g.register(
        "S",
        choice([seq([rule("A"), lit("x")]), seq([rule("A"), lit("y")])]),
    )
    .unwrap();
    g.register("A", lit("a")).unwrap();
    g.register("B", lit("b")).unwrap();
    g.register("T", choice([rule("B"), rule("A")])).unwrap();
    let g = g.build().unwrap();

    assert_eq!(
        trace(&g, "S", "ay", Verbosity::Default),
        indoc! {"
            0 ▶ S
            0   ▶ A
            0   ◀ A 0..1
            0   ◇ A (cached hit)
            0 ◀ S 0..2"}
    );
    assert_eq!(
        trace(&g, "T", "a", Verbosity::Default),
        indoc! {"
            0 ▶ T
            0   ▶ B
            0   ○ B
            0   ▶ A
            0   ◀ A 0..1
            0 ◀ T 0..1"}
    );
}

#[test]
fn very_verbose_shows_backtracking() {
    let mut g = Grammar::builder();
    g.register("S", choice([lit("ab"), lit("a")])).unwrap();
    let g = g.build().unwrap();

    assert_eq!(
        trace(&g, "S", "a", Verbosity::VeryVerbose),
        indoc! {r#"
            0 ▶ S
            0   ○ "ab"
            0   ❮❮❮
            0   ● "a" a
            0 ◀ S 0..1 a"#}
    );
}

#[test]
fn left_recursion_is_traced() {
    let mut g = Grammar::builder();
    g.register("Expr", choice([seq([rule("Expr"), lit("+")]), lit("1")]))
        .unwrap();
    let g = g.build().unwrap();

    assert_eq!(
        trace(&g, "Expr", "1+", Verbosity::Default),
        indoc! {"
            0 ▶ Expr
            0   ✖ Expr left recursion"}
    );
}

#[test]
fn long_text_is_truncated() {
    let mut g = Grammar::builder();
    g.register("Word", regex("[a-z]+")).unwrap();
    let g = g.build().unwrap();
    let input = "abcdefghijklmnopqrstuvwxyz";

    let out = trace(&g, "Word", input, Verbosity::Verbose);
    assert_eq!(out.lines().last(), Some(" 0 ◀ Word 0..26 abcdefghijklmnopqrstuvw…"));
}
