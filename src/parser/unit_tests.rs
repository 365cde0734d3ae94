use super::api::HelixParser;
use super::api::Rule;

use pest::consumes_to;
use pest::parses_to;
use pest::Parser;

fn accepts(rule: Rule, input: &str) -> bool {
    match HelixParser::parse(rule, input) {
        Ok(mut pairs) => pairs.next().map_or(false, |p| p.as_str() == input),
        Err(_) => false,
    }
}

// ── literals ──────────────────────────────────────────────────────────

#[test]
fn test_integer_literal() {
    parses_to! {
        parser: HelixParser,
        input: "42",
        rule: Rule::int_lit,
        tokens: [
            int_lit(0, 2)
        ]
    };
}

#[test]
fn test_float_literal_with_exponent() {
    parses_to! {
        parser: HelixParser,
        input: "1.5e3",
        rule: Rule::float_lit,
        tokens: [
            float_lit(0, 5)
        ]
    };
    assert!(accepts(Rule::float_lit, "1e9"));
    assert!(!accepts(Rule::float_lit, "10"));
}

#[test]
fn test_compound_duration_literal() {
    parses_to! {
        parser: HelixParser,
        input: "1m30s",
        rule: Rule::duration_lit,
        tokens: [
            duration_lit(0, 5)
        ]
    };
    assert!(accepts(Rule::duration_lit, "250ms"));
    assert!(accepts(Rule::duration_lit, "2d"));
    assert!(!accepts(Rule::duration_lit, "5min"));
}

#[test]
fn test_string_literal_with_escapes() {
    parses_to! {
        parser: HelixParser,
        input: r#""a\n""#,
        rule: Rule::string_lit,
        tokens: [
            string_lit(0, 5)
        ]
    };
    assert!(accepts(Rule::string_lit, r#""\u{1F600} \"q\"""#));
    assert!(!accepts(Rule::string_lit, r#""\q""#));
}

#[test]
fn test_char_literal_holds_one_character() {
    assert!(accepts(Rule::char_lit, "'a'"));
    assert!(accepts(Rule::char_lit, r"'\''"));
    assert!(!accepts(Rule::char_lit, "'ab'"));
}

// ── names ─────────────────────────────────────────────────────────────

#[test]
fn test_module_qualified_path() {
    parses_to! {
        parser: HelixParser,
        input: "game:world.time",
        rule: Rule::path,
        tokens: [
            path(0, 15, [
                module_id(0, 4),
                identifier(5, 10),
                identifier(11, 15)
            ])
        ]
    };
}

#[test]
fn test_identifier_excludes_keywords_but_not_prefixes() {
    assert!(!accepts(Rule::identifier, "while"));
    assert!(!accepts(Rule::identifier, "on"));
    assert!(accepts(Rule::identifier, "while_x"));
    assert!(accepts(Rule::identifier, "index"));
    assert!(accepts(Rule::identifier, "$été_2"));
    assert!(!accepts(Rule::identifier, "2x"));
}

// ── operators ─────────────────────────────────────────────────────────

#[test]
fn test_assignment_operator_is_not_equality() {
    parses_to! {
        parser: HelixParser,
        input: "+=",
        rule: Rule::assign_op,
        tokens: [
            assign_op(0, 2)
        ]
    };
    assert!(!accepts(Rule::assign_op, "=="));
}

#[test]
fn test_additive_expression() {
    parses_to! {
        parser: HelixParser,
        input: "1 + 2",
        rule: Rule::expression,
        tokens: [
            expression(0, 5, [
                or_expr(0, 5, [
                    and_expr(0, 5, [
                        eq_expr(0, 5, [
                            cmp_expr(0, 5, [
                                add_expr(0, 5, [
                                    mul_expr(0, 1, [
                                        unary_expr(0, 1, [
                                            postfix(0, 1, [
                                                int_lit(0, 1)
                                            ])
                                        ])
                                    ]),
                                    add_op(2, 3),
                                    mul_expr(4, 5, [
                                        unary_expr(4, 5, [
                                            postfix(4, 5, [
                                                int_lit(4, 5)
                                            ])
                                        ])
                                    ])
                                ])
                            ])
                        ])
                    ])
                ])
            ])
        ]
    };
}

// ── statements ────────────────────────────────────────────────────────

#[test]
fn test_listener_without_arguments() {
    parses_to! {
        parser: HelixParser,
        input: "on save {\n}",
        rule: Rule::listener,
        tokens: [
            listener(0, 11, [
                kw_on(0, 2),
                path(3, 7, [
                    identifier(3, 7)
                ]),
                block(8, 11)
            ])
        ]
    };
}

#[test]
fn test_else_may_follow_on_the_next_line() {
    assert!(accepts(Rule::if_stmt, "if a {\n} else {\n}"));
    assert!(accepts(Rule::if_stmt, "if a {\n}\nelse if b {\n}"));
}

#[test]
fn test_program_skips_comments_and_blank_lines() {
    assert!(accepts(Rule::program, "# header\n\nx = 1 # trailing\n\n"));
    assert!(accepts(Rule::program, ""));
    assert!(!accepts(Rule::program, "x = 1 y = 2"));
}
