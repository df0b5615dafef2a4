use std::collections::HashMap;

use sourcer_core::{Node, Position, Value};
use sourcer_grammar::builder::*;
use sourcer_grammar::{ActionError, Grammar, GrammarBuilder, GrammarError, Matcher};

use super::{AbortReason, Expectation, FuelLimits, ParseError, ParseResult, Parser, Tracer};

fn grammar(define: impl FnOnce(&mut GrammarBuilder)) -> Grammar {
    let mut builder = Grammar::builder();
    define(&mut builder);
    builder.build().unwrap()
}

fn sum_grammar() -> Grammar {
    grammar(|g| {
        g.register("Sum", seq([rule("Number"), bind("op", lit("+")), rule("Number")]))
            .unwrap();
        g.register("Number", regex("[0-9]+")).unwrap();
    })
}

fn syntax_message(err: ParseError) -> String {
    match err {
        ParseError::Syntax(_) => err.to_string(),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

fn text<'s>(node: &Node, input: &'s str) -> &'s str {
    node.text(input).unwrap()
}

#[test]
fn sequence_with_binding_produces_object() {
    let g = sum_grammar();
    let input = "12+7";
    let root = Parser::new(&g).parse_complete("Sum", input).unwrap();

    assert_eq!(&*root.rule, "Sum");
    assert_eq!(root.span.range(), 0..4);
    assert_eq!(root.get("op"), Some(&Value::from("+")));

    let Value::Object(fields) = &root.value else {
        panic!("expected object, got {:?}", root.value);
    };
    let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["0", "op", "2"]);

    let numbers: Vec<&str> = root.children().iter().map(|n| text(n, input)).collect();
    assert_eq!(numbers, ["12", "7"]);
}

#[test]
fn ordered_choice_commits_to_first_success() {
    let g = grammar(|g| {
        g.register("S", choice([lit("a"), lit("ab")])).unwrap();
    });
    let parser = Parser::new(&g);

    let root = parser.parse("S", "ab").unwrap();
    assert_eq!(root.span.range(), 0..1);
    assert_eq!(root.value, Value::from("a"));

    let err = parser.parse_complete("S", "ab").unwrap_err();
    assert_eq!(syntax_message(err), "syntax error at 1:2: expected end of input");
}

#[test]
fn failed_alternatives_merge_expectations() {
    let g = grammar(|g| {
        g.register("S", choice([lit("a"), lit("b")])).unwrap();
    });
    let err = Parser::new(&g).parse("S", "c").unwrap_err();
    assert_eq!(syntax_message(err), r#"syntax error at 1:1: expected "a" or "b""#);
}

#[test]
fn syntax_error_reports_furthest_failure() {
    let g = sum_grammar();
    let err = Parser::new(&g).parse_complete("Sum", "1+").unwrap_err();
    assert_eq!(syntax_message(err), "syntax error at 1:3: expected `[0-9]+`");

    let err = Parser::new(&g).parse_complete("Sum", "1\n+x").unwrap_err();
    assert_eq!(syntax_message(err), r#"syntax error at 1:2: expected "+""#);
}

#[test]
fn left_recursion_is_fatal() {
    let g = grammar(|g| {
        g.register(
            "Expr",
            choice([seq([rule("Expr"), lit("+"), rule("Num")]), rule("Num")]),
        )
        .unwrap();
        g.register("Num", regex("[0-9]+")).unwrap();
    });

    let err = Parser::new(&g).parse("Expr", "1+2").unwrap_err();
    assert_eq!(
        err,
        ParseError::LeftRecursionDetected {
            rule: "Expr".into(),
            position: Position::START,
        }
    );

    let err = Parser::builder(&g).memoize(false).build().parse("Expr", "1+2").unwrap_err();
    assert!(matches!(err, ParseError::LeftRecursionDetected { .. }));
}

#[test]
fn repetition_respects_bounds() {
    let g = grammar(|g| {
        g.register("S", repeat(lit("a"), 2, Some(4))).unwrap();
    });
    let parser = Parser::new(&g);

    let err = parser.parse("S", "a").unwrap_err();
    assert_eq!(syntax_message(err), r#"syntax error at 1:2: expected "a""#);

    let three = parser.parse("S", "aaa").unwrap();
    assert_eq!(three.value.as_array().map(<[Value]>::len), Some(3));

    let capped = parser.parse("S", "aaaaa").unwrap();
    assert_eq!(capped.span.range(), 0..4);
    assert_eq!(capped.value.as_array().map(<[Value]>::len), Some(4));

    let err = parser.parse_complete("S", "aaaaa").unwrap_err();
    assert_eq!(syntax_message(err), "syntax error at 1:5: expected end of input");
}

#[test]
fn zero_width_iteration_fails() {
    let g = grammar(|g| {
        g.register("S", many(opt(lit("x")))).unwrap();
    });
    let err = Parser::new(&g).parse("S", "y").unwrap_err();
    let ParseError::Syntax(err) = err else {
        panic!("expected a syntax error");
    };
    assert!(
        err.expected
            .iter()
            .any(|e| matches!(e, Expectation::AmbiguousZeroWidthRepetition(_)))
    );
}

#[test]
fn lookahead_consumes_nothing() {
    let g = grammar(|g| {
        g.register("Ident", seq([not_followed_by(lit("if")), regex("[a-z]+")]))
            .unwrap();
        g.register("Call", seq([regex("[a-z]+"), followed_by(lit("("))]))
            .unwrap();
    });
    let parser = Parser::new(&g);

    let ident = parser.parse("Ident", "abc").unwrap();
    assert_eq!(ident.value, Value::Array(vec![Value::from("abc")]));

    let err = parser.parse("Ident", "iffy").unwrap_err();
    assert_eq!(syntax_message(err), r#"syntax error at 1:1: expected not "if""#);

    let call = parser.parse("Call", "f(x)").unwrap();
    assert_eq!(call.span.range(), 0..1);
    assert!(parser.parse("Call", "f x").is_err());
}

#[test]
fn ignored_rules_are_skipped_and_dropped() {
    let g = grammar(|g| {
        g.register_ignored("Ws", regex(r"\s+")).unwrap();
        g.register("Sum", seq([rule("Num"), lit("+"), rule("Num")]))
            .unwrap();
        g.register("Num", regex("[0-9]+")).unwrap();
    });
    let input = "  1 +  2 ";
    let root = Parser::new(&g).parse_complete("Sum", input).unwrap();

    assert_eq!(root.span.range(), 2..9);
    let items = root.value.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[1], Value::from("+"));

    let nums: Vec<&Value> = root.children().iter().map(|n| &n.value).collect();
    assert_eq!(nums, [&Value::from("1"), &Value::from("2")]);
}

#[test]
fn ignored_rule_cannot_start_a_parse() {
    let g = grammar(|g| {
        g.register_ignored("Ws", regex(r"\s+")).unwrap();
        g.register("A", lit("a")).unwrap();
    });
    let err = Parser::new(&g).parse("Ws", " ").unwrap_err();
    assert_eq!(err, ParseError::Grammar(GrammarError::IgnoredStartRule("Ws".into())));
}

#[test]
fn unknown_start_rule() {
    let g = sum_grammar();
    let err = Parser::new(&g).parse("Product", "1").unwrap_err();
    assert_eq!(err.to_string(), "rule `Product` is not defined");
}

#[test]
fn template_instances_are_specialized_per_argument() {
    let g = grammar(|g| {
        g.register_template(
            "List",
            ["Item"],
            seq([rule("Item"), many(right(lit(","), rule("Item")))]),
        )
        .unwrap();
        g.register("Digits", call("List", [regex("[0-9]")])).unwrap();
        g.register("Words", call("List", [regex("[a-z]+")])).unwrap();
    });
    let parser = Parser::new(&g);

    let digits = parser.parse_complete("Digits", "1,2,3").unwrap();
    let list = digits.children()[0];
    assert_eq!(&*list.rule, "List");
    assert_eq!(list.value.index(0), Some(&Value::from("1")));
    assert_eq!(
        list.value.index(1),
        Some(&Value::Array(vec![Value::from("2"), Value::from("3")]))
    );

    let words = parser.parse_complete("Words", "ab,cd").unwrap();
    assert_eq!(words.children()[0].value.index(0), Some(&Value::from("ab")));
    assert!(parser.parse_complete("Digits", "ab,cd").is_err());
}

#[test]
fn template_instances_tell_escaped_patterns_apart() {
    let g = grammar(|g| {
        g.register_template("T", ["x"], rule("x")).unwrap();
        g.register(
            "S",
            choice([
                seq([call("T", [choice([regex("a"), regex("b")])]), lit("!")]),
                call("T", [regex("a` | `b")]),
            ]),
        )
        .unwrap();
    });

    let err = Parser::new(&g).parse("S", "a").unwrap_err();
    assert_eq!(syntax_message(err), r#"syntax error at 1:2: expected "!""#);
    assert!(Parser::new(&g).parse("S", "a!").is_ok());
}

#[test]
fn class_yields_alternative_node() {
    let g = grammar(|g| {
        g.register_class(
            "Literal",
            [("Int", regex("[0-9]+")), ("Word", regex("[a-z]+"))],
        )
        .unwrap();
    });
    let root = Parser::new(&g).parse_complete("Literal", "abc").unwrap();

    assert_eq!(&*root.rule, "Word");
    assert_eq!(root.class.as_deref(), Some("Literal"));
    assert!(root.is("Literal"));
    assert!(root.is("Word"));
    assert!(!root.is("Int"));
}

fn number() -> sourcer_grammar::Expr {
    map(regex("[0-9]+"), "int", |v| {
        Value::Int(v.as_str().and_then(|s| s.parse().ok()).unwrap_or_default())
    })
}

#[test]
fn predicate_sees_sequence_bindings() {
    let g = grammar(|g| {
        g.register(
            "Even",
            seq([
                bind("n", number()),
                predicate("even", |scope| {
                    scope
                        .get("n")
                        .and_then(Value::as_int)
                        .is_some_and(|n| n % 2 == 0)
                }),
            ]),
        )
        .unwrap();
    });
    let parser = Parser::new(&g);

    let even = parser.parse("Even", "42").unwrap();
    assert_eq!(even.get("n"), Some(&Value::Int(42)));

    let err = parser.parse("Even", "7").unwrap_err();
    assert_eq!(syntax_message(err), "syntax error at 1:2: expected predicate `even`");
}

#[test]
fn action_error_is_a_local_failure() {
    let g = grammar(|g| {
        g.register(
            "Byte",
            apply(number(), "byte", |v, _| match v.as_int() {
                Some(n) if n < 256 => Ok(v),
                _ => Err(ActionError::new("byte out of range")),
            }),
        )
        .unwrap();
        g.register("Value", choice([rule("Byte"), lit("none")])).unwrap();
    });
    let parser = Parser::new(&g);

    assert_eq!(parser.parse("Value", "200").unwrap().children()[0].value, Value::Int(200));

    let err = parser.parse("Value", "300").unwrap_err();
    assert_eq!(
        syntax_message(err),
        r#"syntax error at 1:1: byte out of range; expected "none""#
    );
}

#[test]
fn aborting_action_stops_the_parse() {
    let g = grammar(|g| {
        g.register(
            "S",
            choice([
                apply(lit("a"), "stop", |_, _| Err(ActionError::abort("quota reached"))),
                lit("a"),
            ]),
        )
        .unwrap();
    });
    let err = Parser::new(&g).parse("S", "a").unwrap_err();
    assert_eq!(err, ParseError::Aborted(AbortReason::Action("quota reached".into())));
    assert_eq!(err.to_string(), "parse aborted: quota reached");
}

#[test]
fn projection_selects_item() {
    let g = grammar(|g| {
        g.register("Paren", project(seq([lit("("), regex("[a-z]+"), lit(")")]), 1))
            .unwrap();
        g.register("Bad", project(seq([lit("a")]), 3)).unwrap();
        g.register("Key", field(record([("k", regex("[a-z]+")), ("v", regex("[0-9]+"))]), "v"))
            .unwrap();
    });
    let parser = Parser::new(&g);

    assert_eq!(parser.parse("Paren", "(abc)").unwrap().value, Value::from("abc"));
    assert_eq!(parser.parse("Key", "x1").unwrap().value, Value::from("1"));

    let err = parser.parse("Bad", "a").unwrap_err();
    assert_eq!(syntax_message(err), "syntax error at 1:1: no item `3` to project");
}

#[test]
fn fail_reports_its_message() {
    let g = grammar(|g| {
        g.register("S", choice([lit("a"), fail("unsupported token")])).unwrap();
    });
    let err = Parser::new(&g).parse("S", "b").unwrap_err();
    assert_eq!(
        syntax_message(err),
        r#"syntax error at 1:1: unsupported token; expected "a""#
    );
}

#[test]
fn constant_consumes_nothing() {
    let g = grammar(|g| {
        g.register("S", seq([lit("a"), constant(true)])).unwrap();
    });
    let root = Parser::new(&g).parse("S", "ab").unwrap();
    assert_eq!(root.span.range(), 0..1);
    assert_eq!(root.value, Value::Array(vec![Value::from("a"), Value::Bool(true)]));
}

#[test]
fn separated_list_leaves_trailing_separator() {
    let g = grammar(|g| {
        g.register("Plain", separated(regex("[0-9]"), lit(","))).unwrap();
        g.register("Trailer", separated_with(regex("[0-9]"), lit(","), true, false))
            .unwrap();
    });
    let parser = Parser::new(&g);

    let plain = parser.parse("Plain", "1,2,").unwrap();
    assert_eq!(plain.span.range(), 0..3);
    assert_eq!(
        plain.value,
        Value::Array(vec![Value::from("1"), Value::from("2")])
    );

    assert_eq!(parser.parse("Trailer", "1,2,").unwrap().span.range(), 0..4);
    assert_eq!(parser.parse("Plain", "x").unwrap().value, Value::Array(vec![]));
    assert!(parser.parse("Trailer", "x").is_err());
}

#[test]
fn parse_at_returns_raw_result() {
    let g = sum_grammar();
    let parser = Parser::new(&g);

    let ParseResult::Success(success) = parser.parse_at("Number", "ab12", 2).unwrap() else {
        panic!("expected success");
    };
    assert_eq!(success.range(), 2..4);
    assert_eq!(success.consumed(), 2);

    let failure = parser.parse_at("Number", "ab12", 0).unwrap().failure().unwrap();
    assert_eq!(failure.offset, 0);
    assert_eq!(
        failure.expected.iter().collect::<Vec<_>>(),
        [&Expectation::Pattern("[0-9]+".into())]
    );
}

#[test]
fn exec_fuel_aborts() {
    let g = grammar(|g| {
        g.register("S", many(lit("a"))).unwrap();
    });
    let err = Parser::builder(&g)
        .exec_fuel(10)
        .build()
        .parse("S", &"a".repeat(100))
        .unwrap_err();
    assert_eq!(err, ParseError::Aborted(AbortReason::ExecFuelExhausted(10)));
}

#[test]
fn recursion_limit_aborts() {
    let g = grammar(|g| {
        g.register(
            "Nest",
            choice([seq([lit("("), rule("Nest"), lit(")")]), lit("x")]),
        )
        .unwrap();
    });
    let parser = Parser::builder(&g).recursion_limit(3).build();

    assert!(parser.parse_complete("Nest", "((x))").is_ok());
    let err = parser.parse_complete("Nest", "((((x))))").unwrap_err();
    assert_eq!(err, ParseError::Aborted(AbortReason::RecursionLimitExceeded(3)));
}

/// Counts how often each rule is evaluated at each offset.
#[derive(Default)]
struct CallCounter {
    entered: HashMap<(String, usize), usize>,
    cache_hits: usize,
}

impl Tracer for CallCounter {
    fn trace_enter_rule(&mut self, rule: &str, offset: usize) {
        *self.entered.entry((rule.to_owned(), offset)).or_default() += 1;
    }

    fn trace_rule_success(&mut self, _rule: &str, _start: usize, _end: usize) {}

    fn trace_rule_failure(&mut self, _rule: &str, _offset: usize) {}

    fn trace_cache_hit(&mut self, _rule: &str, _offset: usize, _success: bool) {
        self.cache_hits += 1;
    }

    fn trace_terminal(&mut self, _matcher: &Matcher, _offset: usize, _matched: Option<usize>) {}

    fn trace_backtrack(&mut self, _offset: usize) {}

    fn trace_left_recursion(&mut self, _rule: &str, _offset: usize) {}
}

fn backtracking_grammar() -> Grammar {
    grammar(|g| {
        g.register(
            "S",
            choice([
                seq([rule("A"), lit("x")]),
                seq([rule("A"), lit("y")]),
                seq([rule("A"), lit("z")]),
            ]),
        )
        .unwrap();
        g.register("A", regex("[a-z]+[0-9]")).unwrap();
    })
}

#[test]
fn memoized_rule_runs_once_per_offset() {
    let g = backtracking_grammar();
    let mut counter = CallCounter::default();
    Parser::new(&g).parse_with("S", "ab1z", &mut counter).unwrap();

    assert_eq!(counter.entered[&("A".to_owned(), 0)], 1);
    assert_eq!(counter.cache_hits, 2);
}

#[test]
fn memoization_does_not_change_results() {
    let g = backtracking_grammar();
    let mut counter = CallCounter::default();
    let plain = Parser::builder(&g).memoize(false).build();
    let unmemoized = plain.parse_with("S", "ab1z", &mut counter).unwrap();

    assert_eq!(counter.entered[&("A".to_owned(), 0)], 3);
    assert_eq!(counter.cache_hits, 0);
    assert_eq!(unmemoized, Parser::new(&g).parse("S", "ab1z").unwrap());
    assert_eq!(
        plain.parse("S", "ab1w").unwrap_err(),
        Parser::new(&g).parse("S", "ab1w").unwrap_err()
    );
}

#[test]
fn failure_seen_first_under_negative_lookahead_is_still_reported() {
    let g = grammar(|g| {
        g.register("A", seq([lit("a"), lit("b")])).unwrap();
        g.register(
            "S",
            seq([not_followed_by(rule("A")), opt(rule("A")), lit("z")]),
        )
        .unwrap();
    });

    for memoize in [true, false] {
        let parser = Parser::builder(&g).memoize(memoize).build();
        let err = parser.parse("S", "ac").unwrap_err();
        assert_eq!(
            syntax_message(err),
            r#"syntax error at 1:2: expected "b""#,
            "memoize: {memoize}"
        );
    }
}

#[test]
fn failed_sequence_consumes_nothing() {
    let g = grammar(|g| {
        g.register("S", choice([seq([lit("a"), lit("b")]), lit("a")]))
            .unwrap();
    });

    for memoize in [true, false] {
        let parser = Parser::builder(&g).memoize(memoize).build();
        let root = parser.parse("S", "ac").unwrap();
        assert_eq!(root.span.range(), 0..1);

        let err = parser.parse_complete("S", "ac").unwrap_err();
        assert_eq!(
            syntax_message(err),
            r#"syntax error at 1:2: expected "b" or end of input"#
        );
    }
}

#[test]
fn failing_parses_are_deterministic() {
    let g = backtracking_grammar();
    let memoized = Parser::new(&g);
    let plain = Parser::builder(&g).memoize(false).build();

    let first = memoized.parse_complete("S", "ab1w").unwrap_err();
    for _ in 0..3 {
        assert_eq!(memoized.parse_complete("S", "ab1w").unwrap_err(), first);
        assert_eq!(plain.parse_complete("S", "ab1w").unwrap_err(), first);
    }
    assert_eq!(
        syntax_message(first),
        r#"syntax error at 1:4: expected "x", "y" or "z""#
    );
}

#[test]
fn default_limits() {
    let limits = FuelLimits::default();
    assert_eq!(limits.get_exec_fuel(), 10_000_000);
    assert_eq!(limits.get_recursion_limit(), 1024);
}

#[test]
fn grammar_is_shared_across_threads() {
    let g = sum_grammar();
    let inputs = ["1+2", "30+4", "5+60", "x+1"];

    let results: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let g = &g;
                s.spawn(move || Parser::new(g).parse_complete("Sum", input).is_ok())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results, [true, true, true, false]);
}
