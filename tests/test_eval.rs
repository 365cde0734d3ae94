//! Tests for script evaluation.
//!
//! These tests run parsed scripts end to end: operators, control flow,
//! script functions, cancellation, and the built-in module.

extern crate helix;

mod common;

use std::thread;
use std::time::Duration;

use helix::error::{CancelReason, RunError};
use helix::parser::Parser;
use helix::runner::threading::CancelToken;
use helix::{RunOptions, Value};

use common::{engine, engine_without_std, run, run_error};

fn int(dict: &helix::Dictionary, key: &str) -> i64 {
    dict.get(key)
        .and_then(Value::as_int)
        .unwrap_or_else(|| panic!("{} is not an int: {:?}", key, dict.get(key)))
}

// ============================================================================
// Operators
// ============================================================================

mod operators {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        let helix = engine();
        let dict = run(&helix, "a = 7 + 3 * 2\nb = (7 + 3) * 2\nc = 7 / 2\nd = 7 % 3\ne = -a").unwrap();
        assert_eq!(int(&dict, "a"), 13);
        assert_eq!(int(&dict, "b"), 20);
        assert_eq!(int(&dict, "c"), 3);
        assert_eq!(int(&dict, "d"), 1);
        assert_eq!(int(&dict, "e"), -13);
    }

    #[test]
    fn test_float_widening() {
        let helix = engine();
        let dict = run(&helix, "a = 1 / 4.0\nb = 2 * 1.5").unwrap();
        assert_eq!(dict.get("a"), Some(&Value::Float(0.25)));
        assert_eq!(dict.get("b"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_division_by_zero() {
        let helix = engine();
        assert_eq!(run_error(&helix, "x = 1 / 0"), "division by zero");
        assert_eq!(run_error(&helix, "x = 1 % 0"), "division by zero");
    }

    #[test]
    fn test_integer_overflow() {
        let helix = engine();
        assert_eq!(
            run_error(&helix, "x = 9223372036854775807 + 1"),
            "integer overflow"
        );
    }

    #[test]
    fn test_string_concatenation() {
        let helix = engine();
        let dict = run(&helix, "s = \"n=\" + 3 + \", \" + true\nt = [1] + [2, 3]").unwrap();
        assert_eq!(dict.get("s"), Some(&Value::str("n=3, true")));
        assert_eq!(
            dict.get("t"),
            Some(&Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn test_comparisons() {
        let helix = engine();
        let dict = run(
            &helix,
            "a = 1 < 2\nb = \"b\" <= \"a\"\nc = 1 == 1.0\nd = null == null\ne = [1, 2] != [1, 2]\nf = 90s == 1m30s",
        )
        .unwrap();
        assert_eq!(dict.get("a"), Some(&Value::Bool(true)));
        assert_eq!(dict.get("b"), Some(&Value::Bool(false)));
        assert_eq!(dict.get("c"), Some(&Value::Bool(true)));
        assert_eq!(dict.get("d"), Some(&Value::Bool(true)));
        assert_eq!(dict.get("e"), Some(&Value::Bool(false)));
        assert_eq!(dict.get("f"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_unrelated_kinds_do_not_compare() {
        let helix = engine();
        assert_eq!(run_error(&helix, "x = \"a\" < 1"), "cannot compare string and int");
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let helix = engine();
        // `missing` is never read
        let dict = run(&helix, "a = false && missing\nb = true || missing\nc = !false").unwrap();
        assert_eq!(dict.get("a"), Some(&Value::Bool(false)));
        assert_eq!(dict.get("b"), Some(&Value::Bool(true)));
        assert_eq!(dict.get("c"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_conditions_must_be_booleans() {
        let helix = engine();
        assert_eq!(
            run_error(&helix, "if 1 {\n    x = 1\n}"),
            "expected a bool, found int"
        );
    }

    #[test]
    fn test_duration_arithmetic() {
        let helix = engine();
        let dict = run(&helix, "a = 1m + 30s\nb = 10s * 3\nc = 1m - 15s").unwrap();
        assert_eq!(dict.get("a"), Some(&Value::Duration(Duration::from_secs(90))));
        assert_eq!(dict.get("b"), Some(&Value::Duration(Duration::from_secs(30))));
        assert_eq!(dict.get("c"), Some(&Value::Duration(Duration::from_secs(45))));
        assert_eq!(run_error(&helix, "d = 1s - 2s"), "duration would be negative");
    }

    #[test]
    fn test_indexing() {
        let helix = engine();
        let dict = run(
            &helix,
            "l = [10, 20, 30]\nm = {\"k\": \"v\"}\na = l[1]\nb = m[\"k\"]\nc = m.k\nd = m[\"nope\"]\ne = \"abc\"[2]",
        )
        .unwrap();
        assert_eq!(int(&dict, "a"), 20);
        assert_eq!(dict.get("b"), Some(&Value::str("v")));
        assert_eq!(dict.get("c"), Some(&Value::str("v")));
        assert_eq!(dict.get("d"), Some(&Value::Null));
        assert_eq!(dict.get("e"), Some(&Value::Char('c')));
        assert_eq!(
            run_error(&helix, "l = [1]\nx = l[3]"),
            "index 3 out of range for length 1"
        );
    }

    #[test]
    fn test_null_member_access() {
        let helix = engine();
        assert_eq!(run_error(&helix, "n = null\nx = n.size"), "cannot read 'size' of null");
    }
}

// ============================================================================
// Assignment
// ============================================================================

mod assignment {
    use super::*;

    #[test]
    fn test_compound_assignment() {
        let helix = engine();
        let dict = run(
            &helix,
            "a = 10\na += 5\na -= 3\na *= 2\na /= 4\na %= 4\ns = \"x\"\ns += \"y\"",
        )
        .unwrap();
        assert_eq!(int(&dict, "a"), 2);
        assert_eq!(dict.get("s"), Some(&Value::str("xy")));
    }

    #[test]
    fn test_element_assignment_through_variable() {
        let helix = engine();
        let dict = run(
            &helix,
            "l = [1, 2, 3]\nl[0] = 9\nl[2] += 1\nm = {}\nm[\"a\"] = 1\nm.b = 2",
        )
        .unwrap();
        assert_eq!(
            dict.get("l"),
            Some(&Value::list(vec![Value::Int(9), Value::Int(2), Value::Int(4)]))
        );
        assert_eq!(dict.get("m").unwrap().to_string(), "{\"a\": 1, \"b\": 2}");
    }

    #[test]
    fn test_lists_are_values() {
        let helix = engine();
        let dict = run(&helix, "a = [1, 2]\nb = a\nb[0] = 5").unwrap();
        assert_eq!(dict.get("a"), Some(&Value::list(vec![Value::Int(1), Value::Int(2)])));
        assert_eq!(dict.get("b"), Some(&Value::list(vec![Value::Int(5), Value::Int(2)])));
    }

    #[test]
    fn test_undefined_variable() {
        let helix = engine();
        assert_eq!(run_error(&helix, "x = y + 1"), "variable 'y' is not defined");
    }
}

// ============================================================================
// Control flow
// ============================================================================

mod control_flow {
    use super::*;

    #[test]
    fn test_if_else_chain() {
        let helix = engine();
        let source = "if x < 0 {\n    s = \"neg\"\n} else if x == 0 {\n    s = \"zero\"\n} else {\n    s = \"pos\"\n}";
        let script = helix.parser().parse_str(source).unwrap();
        for (x, expected) in [(-4, "neg"), (0, "zero"), (3, "pos")] {
            let mut dict = helix.dict();
            dict.put("x", x).unwrap();
            script.run_with(&mut dict).unwrap();
            assert_eq!(dict.get("s"), Some(&Value::str(expected)));
        }
    }

    #[test]
    fn test_while_with_break_and_continue() {
        let helix = engine();
        let dict = run(
            &helix,
            "i = 0\nsum = 0\nwhile true {\n    i += 1\n    if i > 10 {\n        break\n    }\n    if i % 2 == 0 {\n        continue\n    }\n    sum += i\n}",
        )
        .unwrap();
        assert_eq!(int(&dict, "sum"), 25);
    }

    #[test]
    fn test_for_over_lists_maps_and_strings() {
        let helix = engine();
        let dict = run(
            &helix,
            "total = 0\nfor n in [1, 2, 3] {\n    total += n\n}\nkeys = \"\"\nfor k in {\"a\": 1, \"b\": 2} {\n    keys += k\n}\nchars = 0\nfor c in \"héllo\" {\n    chars += 1\n}",
        )
        .unwrap();
        assert_eq!(int(&dict, "total"), 6);
        assert_eq!(dict.get("keys"), Some(&Value::str("ab")));
        assert_eq!(int(&dict, "chars"), 5);
    }

    #[test]
    fn test_for_rejects_scalars() {
        let helix = engine();
        assert_eq!(
            run_error(&helix, "for i in 3 {\n    x = i\n}"),
            "cannot iterate over int"
        );
    }

    #[test]
    fn test_break_outside_loop() {
        let helix = engine();
        assert_eq!(run_error(&helix, "x = 1\nbreak"), "'break' outside of a loop");
    }

    #[test]
    fn test_stop_ends_the_run() {
        let helix = engine();
        let dict = run(
            &helix,
            "a = 1\nfor i in [1, 2, 3] {\n    if i == 2 {\n        stop\n    }\n    a += i\n}\nb = 1",
        )
        .unwrap();
        assert_eq!(int(&dict, "a"), 2);
        assert!(!dict.contains("b"));
    }

    #[test]
    fn test_stop_inside_function_ends_the_run() {
        let helix = engine();
        let dict = run(&helix, "func halt() {\n    stop\n}\na = 1\nhalt()\nb = 2").unwrap();
        assert_eq!(int(&dict, "a"), 1);
        assert!(!dict.contains("b"));
    }

    #[test]
    fn test_top_level_return_ends_normally() {
        let helix = engine();
        let dict = run(&helix, "a = 1\nreturn\nb = 2").unwrap();
        assert_eq!(int(&dict, "a"), 1);
        assert!(!dict.contains("b"));
    }
}

// ============================================================================
// Script functions
// ============================================================================

mod functions {
    use super::*;

    #[test]
    fn test_recursion() {
        let helix = engine();
        let dict = run(
            &helix,
            "func fib(n) {\n    if n < 2 {\n        return n\n    }\n    return fib(n - 1) + fib(n - 2)\n}\nr = fib(15)",
        )
        .unwrap();
        assert_eq!(int(&dict, "r"), 610);
    }

    #[test]
    fn test_functions_see_only_their_parameters() {
        let helix = engine();
        let message = run_error(&helix, "func peek() {\n    return outer\n}\nouter = 1\nx = peek()");
        assert_eq!(message, "variable 'outer' is not defined");
    }

    #[test]
    fn test_function_locals_do_not_leak() {
        let helix = engine();
        let dict = run(&helix, "func f(a) {\n    tmp = a * 2\n    return tmp\n}\nx = f(4)").unwrap();
        assert_eq!(int(&dict, "x"), 8);
        assert!(!dict.contains("tmp"));
        assert!(!dict.contains("a"));
    }

    #[test]
    fn test_function_without_return_yields_null() {
        let helix = engine();
        let dict = run(&helix, "func nothing() {\n    x = 1\n}\nr = nothing()").unwrap();
        assert_eq!(dict.get("r"), Some(&Value::Null));
    }

    #[test]
    fn test_call_depth_is_limited() {
        let helix = engine();
        let parser = Parser::new(helix.registry().clone()).with_max_call_depth(8);
        let script = parser
            .parse_str("func down(n) {\n    return down(n + 1)\n}\nx = down(0)")
            .unwrap();
        let err = script.run().unwrap_err();
        assert_eq!(
            err.as_script_error().unwrap().message(),
            "maximum call depth of 8 exceeded"
        );
    }

    #[test]
    fn test_configured_depth_reaches_the_parser() {
        let mut config = helix::EngineConfig::default();
        config.engine.max_call_depth = 3;
        let helix = helix::Helix::new(config).unwrap();
        let source = "func d(n) {\n    if n == 0 {\n        return 0\n    }\n    return d(n - 1)\n}\nx = d(N)";
        let script = helix.parser().parse_str(source).unwrap();

        let mut dict = helix.dict();
        dict.put("N", 2).unwrap();
        assert!(script.run_with(&mut dict).is_ok());

        let mut dict = helix.dict();
        dict.put("N", 5).unwrap();
        assert!(script.run_with(&mut dict).is_err());
    }
}

// ============================================================================
// Dictionary and cancellation
// ============================================================================

mod runs {
    use super::*;

    #[test]
    fn test_dictionary_in_and_out() {
        let helix = engine();
        let script = helix.parser().parse_str("greeting = \"hi \" + name\ncount += 1").unwrap();
        let mut dict = helix.dict();
        dict.put("name", "ann").unwrap();
        dict.put("count", 41).unwrap();
        script.run_with(&mut dict).unwrap();
        assert_eq!(dict.get("greeting"), Some(&Value::str("hi ann")));
        assert_eq!(int(&dict, "count"), 42);
    }

    #[test]
    fn test_script_runs_concurrently_with_separate_dictionaries() {
        let helix = engine();
        let script = helix
            .parser()
            .parse_str("out = 0\nfor i in range(0, n) {\n    out += i\n}")
            .unwrap();
        let handles: Vec<_> = (1..5)
            .map(|n| {
                let script = script.clone();
                thread::spawn(move || {
                    let mut dict = helix::Dictionary::new();
                    dict.put("n", n * 100).unwrap();
                    script.run_with(&mut dict).unwrap();
                    dict.get("out").and_then(Value::as_int).unwrap()
                })
            })
            .collect();
        let results: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![4950, 19900, 44850, 79800]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let helix = engine();
        let script = helix.parser().parse_str("x = 1").unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = script
            .run_with_options(&mut helix.dict(), &RunOptions::new().with_cancel(token))
            .unwrap_err();
        assert_eq!(err, RunError::Cancelled(CancelReason::Cancelled));
    }

    #[test]
    fn test_timeout_stops_endless_loop() {
        let helix = engine();
        let script = helix.parser().parse_str("while true {\n}").unwrap();
        let err = script
            .run_with_options(
                &mut helix.dict(),
                &RunOptions::new().with_timeout(Duration::from_millis(20)),
            )
            .unwrap_err();
        assert_eq!(err, RunError::Cancelled(CancelReason::TimedOut));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let helix = engine();
        let script = helix.parser().parse_str("i = 0\nwhile true {\n    i += 1\n}").unwrap();
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });
        let mut dict = helix.dict();
        let err = script
            .run_with_options(&mut dict, &RunOptions::new().with_cancel(token))
            .unwrap_err();
        handle.join().unwrap();
        assert_eq!(err, RunError::Cancelled(CancelReason::Cancelled));
        assert!(int(&dict, "i") > 0);
    }
}

// ============================================================================
// Built-in module
// ============================================================================

mod std_lib {
    use super::*;

    #[test]
    fn test_core_functions() {
        let helix = engine();
        let dict = run(
            &helix,
            "a = len([1, 2, 3])\nb = len(\"héllo\")\nc = str(1.5)\nd = int(\"42\")\ne = float(2)\nf = range(2, 5)\ng = type_of(1m)\nh = type_of(null)\nlog(\"from a test\")",
        )
        .unwrap();
        assert_eq!(int(&dict, "a"), 3);
        assert_eq!(int(&dict, "b"), 5);
        assert_eq!(dict.get("c"), Some(&Value::str("1.5")));
        assert_eq!(int(&dict, "d"), 42);
        assert_eq!(dict.get("e"), Some(&Value::Float(2.0)));
        assert_eq!(dict.get("f").unwrap().to_string(), "[2, 3, 4]");
        assert_eq!(dict.get("g"), Some(&Value::str("duration")));
        assert_eq!(dict.get("h"), Some(&Value::str("null")));
    }

    #[test]
    fn test_core_errors() {
        let helix = engine();
        assert_eq!(run_error(&helix, "x = len(3)"), "int has no length");
        assert_eq!(run_error(&helix, "x = int(\"4x\")"), "\"4x\" is not an int");
        assert_eq!(run_error(&helix, "x = len(null)"), "argument 'value' must not be null");
    }

    #[test]
    fn test_math() {
        let helix = engine();
        let dict = run(
            &helix,
            "a = math.abs(-3)\nb = math.min(2, 5)\nc = math.max(2, 5.5)\nd = math.floor(2.7)\ne = math.ceil(2.1)\nf = math.round(2.5)\ng = math.sqrt(16)\nh = math.pow(2, 10)\npi = math.PI > 3.14",
        )
        .unwrap();
        assert_eq!(int(&dict, "a"), 3);
        assert_eq!(int(&dict, "b"), 2);
        assert_eq!(dict.get("c"), Some(&Value::Float(5.5)));
        assert_eq!(int(&dict, "d"), 2);
        assert_eq!(int(&dict, "e"), 3);
        assert_eq!(int(&dict, "f"), 3);
        assert_eq!(dict.get("g"), Some(&Value::Float(4.0)));
        assert_eq!(dict.get("h"), Some(&Value::Float(1024.0)));
        assert_eq!(dict.get("pi"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_text() {
        let helix = engine();
        let dict = run(
            &helix,
            "a = text.upper(\"abc\")\nb = text.trim(\"  x \")\nc = text.contains(\"haystack\", \"st\")\nd = text.split(\"a,b,c\", \",\")\ne = text.join(d, separator = \"-\")\nf = text.join([1, 2])\ng = text.replace(\"aXbX\", \"X\", \"_\")\nh = text.starts_with(\"helix\", \"he\")",
        )
        .unwrap();
        assert_eq!(dict.get("a"), Some(&Value::str("ABC")));
        assert_eq!(dict.get("b"), Some(&Value::str("x")));
        assert_eq!(dict.get("c"), Some(&Value::Bool(true)));
        assert_eq!(dict.get("d").unwrap().to_string(), "[\"a\", \"b\", \"c\"]");
        assert_eq!(dict.get("e"), Some(&Value::str("a-b-c")));
        assert_eq!(dict.get("f"), Some(&Value::str("12")));
        assert_eq!(dict.get("g"), Some(&Value::str("a_b_")));
        assert_eq!(dict.get("h"), Some(&Value::Bool(true)));
        assert_eq!(
            run_error(&helix, "x = text.split(\"abc\", \"\")"),
            "separator must not be empty"
        );
    }

    #[test]
    fn test_text_group_uses_a_pattern() {
        let helix = engine();
        let dict = run(
            &helix,
            "v = text.group(\"color = blue\")\nk = text.group(\" size=3 \", \"key\")",
        )
        .unwrap();
        assert_eq!(dict.get("v"), Some(&Value::str("blue")));
        assert_eq!(dict.get("k"), Some(&Value::str("size")));

        let message = run_error(&helix, "v = text.group(\"no equals sign\")");
        assert!(message.starts_with("value does not match"), "{}", message);
    }

    #[test]
    fn test_list() {
        let helix = engine();
        let dict = run(
            &helix,
            "l = [3, 1, 2]\na = list.contains(l, 2)\nb = list.append(l, 4)\nc = list.reverse(l)\nd = list.sort(l)",
        )
        .unwrap();
        assert_eq!(dict.get("a"), Some(&Value::Bool(true)));
        assert_eq!(dict.get("b").unwrap().to_string(), "[3, 1, 2, 4]");
        assert_eq!(dict.get("c").unwrap().to_string(), "[2, 1, 3]");
        assert_eq!(dict.get("d").unwrap().to_string(), "[1, 2, 3]");
        // the original is untouched
        assert_eq!(dict.get("l").unwrap().to_string(), "[3, 1, 2]");
        assert_eq!(
            run_error(&helix, "x = list.sort([1, \"a\"])"),
            "cannot order int and string"
        );
    }

    #[test]
    fn test_time() {
        let helix = engine();
        let dict = run(
            &helix,
            "a = time.millis(1m30s)\nb = time.seconds(1500ms)\nc = time.of_millis(2000)\nd = time.millis(\"2s\")",
        )
        .unwrap();
        assert_eq!(int(&dict, "a"), 90_000);
        assert_eq!(dict.get("b"), Some(&Value::Float(1.5)));
        assert_eq!(dict.get("c"), Some(&Value::Duration(Duration::from_secs(2))));
        assert_eq!(int(&dict, "d"), 2000);
        assert_eq!(run_error(&helix, "x = time.of_millis(-1)"), "-1 is not a valid duration");
    }

    #[test]
    fn test_std_lib_can_be_disabled() {
        let helix = engine_without_std();
        assert!(helix.registry().root("helix").is_none());
        let error = helix.parser().parse_str("x = len(\"a\")").unwrap_err();
        assert_eq!(error.reason(), "unknown function 'len'");
    }

    #[test]
    fn test_std_names_are_reachable_by_module_prefix() {
        let helix = engine();
        let dict = run(&helix, "x = helix:len(\"ab\")\ny = helix:math.abs(-1)").unwrap();
        assert_eq!(int(&dict, "x"), 2);
        assert_eq!(int(&dict, "y"), 1);
    }
}
