//! End-to-end parses: grammar, parse, then visit or transform the tree.

use std::convert::Infallible;

use serde_json::json;

use crate::prelude::*;
use crate::{
    DiagnosticKind, Error, GrammarError, Operation, ParseError, TransformTable, VisitTable, Walk,
    transform, visit,
};

fn json_grammar() -> Grammar {
    let mut g = Grammar::builder();
    g.register_ignored("Ws", regex(r"\s+")).unwrap();
    g.register_class(
        "Json",
        [
            ("Object", seq([lit("{"), separated(rule("Member"), lit(",")), lit("}")])),
            ("Array", project(seq([lit("["), separated(rule("Json"), lit(",")), lit("]")]), 1)),
            ("String", regex(r#""[^"]*""#)),
            ("Number", regex(r"-?[0-9]+(\.[0-9]+)?")),
            ("Bool", choice([lit("true"), lit("false")])),
            ("Null", lit("null")),
        ],
    )
    .unwrap();
    g.register("Member", seq([bind("key", rule("String")), lit(":"), bind("value", rule("Json"))]))
        .unwrap();
    g.build().unwrap()
}

fn json_values<'f>() -> TransformTable<'f, Infallible> {
    TransformTable::new()
        .on("String", |node: Node| {
            let text = node.value.as_str().unwrap_or_default();
            Ok(Value::from(text.trim_matches('"')))
        })
        .on("Number", |node: Node| {
            let text = node.value.as_str().unwrap_or_default();
            Ok(match text.parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => Value::Float(text.parse().unwrap_or_default()),
            })
        })
        .on("Bool", |node: Node| Ok(Value::Bool(node.value.as_str() == Some("true"))))
        .on("Null", |_| Ok(Value::Null))
        .on("Array", |node: Node| Ok(node.value))
        .on("Member", |node: Node| {
            let key = node.get("key").cloned().unwrap_or_default();
            let value = node.get("value").cloned().unwrap_or_default();
            Ok(Value::Array(vec![key, value]))
        })
        .on("Object", |node: Node| {
            let members = node.value.index(1).and_then(Value::as_array).unwrap_or_default();
            let fields = members
                .iter()
                .filter_map(|member| {
                    let key = member.index(0)?.as_str()?.to_owned();
                    Some((key, member.index(1)?.clone()))
                })
                .collect();
            Ok(Value::Object(fields))
        })
}

#[test]
fn json_document_to_values() {
    let g = json_grammar();
    let input = r#"{"name": "sourcer", "tags": ["peg", "packrat"], "stars": 42, "beta": true, "parent": null}"#;
    let root = crate::parse_complete(&g, "Json", input).unwrap();
    assert_eq!(&*root.rule, "Object");
    assert!(root.is("Json"));

    let value = transform(&root, &mut json_values()).unwrap();
    assert_eq!(
        value,
        Value::Object(vec![
            ("name".into(), Value::from("sourcer")),
            ("tags".into(), Value::Array(vec![Value::from("peg"), Value::from("packrat")])),
            ("stars".into(), Value::Int(42)),
            ("beta".into(), Value::Bool(true)),
            ("parent".into(), Value::Null),
        ])
    );
}

#[test]
fn json_error_lists_every_alternative() {
    let g = json_grammar();
    let err = crate::parse_complete(&g, "Json", r#"{"a": }"#).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"syntax error at 1:7: expected "{", "[", `"[^"]*"`, `-?[0-9]+(\.[0-9]+)?`, "true", "false" or "null""#
    );
}

fn calculator() -> Grammar {
    let operand = choice([rule("Num"), right(lit("("), left(rule("Expr"), lit(")")))]);
    let table = OperatorTable::new(operand)
        .left(1, lit("+"))
        .left(1, lit("-"))
        .left(2, lit("*"))
        .prefix(3, lit("-"));

    let mut g = Grammar::builder();
    g.register_ignored("Ws", regex(" +")).unwrap();
    g.register("Expr", precedence(table)).unwrap();
    g.register("Num", regex("[0-9]+")).unwrap();
    g.build().unwrap()
}

fn fold(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        Value::Operation(op) => match &**op {
            Operation::Infix {
                left,
                operator,
                right,
            } => {
                let (l, r) = (fold(left), fold(right));
                match operator.as_str() {
                    Some("+") => l + r,
                    Some("-") => l - r,
                    Some("*") => l * r,
                    other => panic!("unknown operator {other:?}"),
                }
            }
            Operation::Prefix { operand, .. } => -fold(operand),
            Operation::Postfix { .. } => panic!("no postfix operators"),
        },
        other => panic!("unexpected value {other:?}"),
    }
}

#[test]
fn calculator_evaluates_bottom_up() {
    let g = calculator();
    let mut eval = TransformTable::new()
        .on("Num", |node: Node| {
            Ok::<_, Infallible>(Value::Int(
                node.value.as_str().and_then(|s| s.parse().ok()).unwrap_or_default(),
            ))
        })
        .on("Expr", |node: Node| Ok(Value::Int(fold(&node.value))));

    let cases = [("1 + 2 * 3", 7), ("2 * (3 + 4) - 5", 9), ("-2 * -3", 6), ("10 - 4 - 3", 3)];
    for (input, expected) in cases {
        let root = crate::parse_complete(&g, "Expr", input).unwrap();
        assert_eq!(transform(&root, &mut eval), Ok(Value::Int(expected)), "{input}");
    }
}

fn statements() -> Grammar {
    let mut g = Grammar::builder();
    g.register_ignored("Ws", regex(r"\s+")).unwrap();
    g.register("Program", many(rule("Stmt"))).unwrap();
    g.register_class(
        "Stmt",
        [
            ("Print", seq([lit("print"), rule("Ident"), lit(";")])),
            ("Assign", seq([rule("Ident"), lit("="), rule("Ident"), lit(";")])),
        ],
    )
    .unwrap();
    g.register("Ident", regex("[a-z]+")).unwrap();
    g.build().unwrap()
}

#[test]
fn visit_dispatches_by_rule_then_class() {
    let g = statements();
    let root = crate::parse_complete(&g, "Program", "print a;\nb = c;\nprint b;").unwrap();

    let mut prints = 0;
    let mut others = 0;
    let mut table = VisitTable::new()
        .on("Print", |_| {
            prints += 1;
            Walk::SkipChildren
        })
        .on("Stmt", |_| {
            others += 1;
            Walk::SkipChildren
        });
    visit(&root, &mut table);
    drop(table);

    assert_eq!((prints, others), (2, 1));
}

#[test]
fn visit_is_pre_order() {
    let g = statements();
    let root = crate::parse_complete(&g, "Program", "print a;\nb = c;\nprint b;").unwrap();

    let mut names = Vec::new();
    let mut table = VisitTable::new().on("Ident", |node: &Node| {
        names.push(node.value.as_str().unwrap_or_default().to_owned());
        Walk::Continue
    });
    visit(&root, &mut table);
    drop(table);

    assert_eq!(names, ["a", "b", "c", "b"]);
}

#[test]
fn spans_nest_inside_parents() {
    let g = statements();
    let root = crate::parse_complete(&g, "Program", "print a;\nb = c;").unwrap();
    for node in root.descendants() {
        for child in node.children() {
            assert!(node.span.contains(&child.span), "{} in {}", child.rule, node.rule);
        }
    }
    let assign = root.children()[1];
    assert_eq!(&*assign.rule, "Assign");
    assert_eq!(assign.span.start().line, 2);
}

#[test]
fn tree_serializes_to_json() {
    let mut g = Grammar::builder();
    g.register("Sum", seq([rule("Num"), bind("op", lit("+")), rule("Num")]))
        .unwrap();
    g.register("Num", regex("[0-9]+")).unwrap();
    let g = g.build().unwrap();

    let root = crate::parse(&g, "Sum", "1+2").unwrap();
    let out = serde_json::to_value(&root).unwrap();
    assert_eq!(out["rule"], json!("Sum"));
    assert_eq!(out["value"]["op"], json!("+"));
    assert_eq!(out["value"]["0"]["value"], json!("1"));
    assert_eq!(
        out["span"]["end"],
        json!({"offset": 3, "line": 1, "column": 4})
    );
}

#[test]
fn errors_convert_into_crate_error() {
    let mut g = Grammar::builder();
    g.register("A", lit("a")).unwrap();
    let err = g.register("A", lit("b")).map(|_| ()).map_err(Error::from).unwrap_err();
    assert_eq!(err, Error::Grammar(GrammarError::DuplicateRule("A".into())));

    let g = g.build().unwrap();
    let err = crate::parse(&g, "B", "a").unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::Grammar(GrammarError::UnknownRule { .. }))));
}

#[test]
fn build_reports_warnings_without_failing() {
    let mut g = Grammar::builder();
    g.register("Loop", many(opt(lit("a")))).unwrap();
    let g = g.build().unwrap();

    assert_eq!(g.diagnostics().of_kind(DiagnosticKind::NullableRepetition).count(), 1);
    assert!(!g.diagnostics().has_errors());
}
