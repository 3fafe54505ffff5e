use std::cell::RefCell;
use std::rc::Rc;

use pika::{
    binary, frame_fn, nullary, unary, Error, Frame, MapVariables, NotCallable, Root, Value,
    VarsHandle,
};

fn eval(src: &str) -> Value {
    Root::standard().unwrap().evaluate(src).unwrap()
}

fn eval_err(src: &str) -> Error {
    Root::standard().unwrap().evaluate(src).unwrap_err()
}

// ═══════════════════════════════════════════════════════════════════════
// Standard library: numbers and formatting
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_math_natives() {
    assert_eq!(eval("abs(-3)"), "3");
    assert_eq!(eval("floor(2.7)"), "2");
    assert_eq!(eval("ceil(2.1)"), "3");
    assert_eq!(eval("sqrt(16)"), "4");
    assert_eq!(eval("pow(2, 10)"), "1024");
    assert_eq!(eval("cos(0)"), "1");
    assert_eq!(eval("atan2(0, 1)"), "0");
    assert_eq!(eval("exp(0)"), "1");
    assert_eq!(eval("log(1)"), "0");
    assert_eq!(eval("log10(1000)"), "3");
}

#[test]
fn test_radix() {
    assert_eq!(eval("radix(255, 16)"), "ff");
    assert_eq!(eval("radix(255, 16, 4)"), "00ff");
    assert_eq!(eval("radix(5, 2)"), "101");
    assert_eq!(eval("radix(-17, 10)"), "-17");
    assert!(matches!(eval_err("radix(1, 99)"), Error::Thrown(_)));
    assert!(matches!(eval_err("radix(1, 16, 200)"), Error::Thrown(_)));
}

#[test]
fn test_random_is_bounded() {
    let root = Root::standard().unwrap();
    root.seed_random(12345);
    assert_eq!(
        root.evaluate("r = random(1); r >= 0 && r < 1").unwrap(),
        "true"
    );
    assert_eq!(root.evaluate("random(0)").unwrap(), "0");
}

#[test]
fn test_time_is_positive() {
    assert_eq!(eval("time() > 0"), "true");
}

// ═══════════════════════════════════════════════════════════════════════
// Standard library: characters and strings
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_char_and_ordinal() {
    assert_eq!(eval("char(65)"), "A");
    assert_eq!(eval("ordinal('A')"), "65");
    assert_eq!(eval("char(ordinal('q'))"), "q");
    assert!(matches!(
        eval_err("char(1.5)"),
        Error::IllegalCharacterCode(_)
    ));
    assert!(matches!(eval_err("ordinal('ab')"), Error::Thrown(_)));
}

#[test]
fn test_string_search_natives() {
    assert_eq!(eval("length('hello')"), "5");
    assert_eq!(eval("length('')"), "0");
    assert_eq!(eval("find('abcd', 'dc')"), "2");
    assert_eq!(eval("find('abcd', 'xy')"), "4");
    assert_eq!(eval("search('abcdabcd', 'cd')"), "2");
    assert_eq!(eval("span('  x', ' ')"), "2");
    assert_eq!(eval("mismatch('abcx', 'abcy')"), "3");
    assert_eq!(eval("rfind('abcdcba', 'dc')"), "4");
    assert_eq!(eval("rfind('nomatch', 'xyz')"), "-1");
    assert_eq!(eval("rsearch('abcdabcd', 'cd')"), "6");
    assert_eq!(eval("rspan('abcd', 'abc')"), "3");
}

#[test]
fn test_string_transform_natives() {
    assert_eq!(eval("lower('AbC')"), "abc");
    assert_eq!(eval("upper('AbC')"), "ABC");
    assert_eq!(eval("reverse('abc')"), "cba");
    assert_eq!(eval("escape('hi')"), "'hi'");
    assert_eq!(eval(r#"escape("a\nb")"#), "\"a\\nb\"");
    assert_eq!(eval("repeat('-#-', 2)"), "-#--#-");
    assert_eq!(eval("repeat(' ', 5)"), "     ");
    assert_eq!(eval("chop('abcdefgh', 3)"), "abcde");
    assert_eq!(eval("right('abcdefgh', 3)"), "fgh");
    assert_eq!(eval("trim('  x  ')"), "x");
    assert_eq!(eval("trim('--- keep me ---', '-', '-')"), " keep me ");
    assert_eq!(eval(r#"trim("\n  a  \n", , void)"#), "a  \n");
}

#[test]
fn test_unicode_positions_are_character_based() {
    assert_eq!(eval("length('åäö')"), "3");
    assert_eq!(eval("'åäö'{1}"), "ä");
    assert_eq!(eval("reverse('åäö')"), "öäå");
    assert_eq!(eval("search('xåy', 'y')"), "2");
}

// ═══════════════════════════════════════════════════════════════════════
// Standard library: variables and containers
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_exists_and_delete() {
    assert_eq!(eval("a.b = 1; exists(@a.b)"), "true");
    assert_eq!(eval("exists(@a.b)"), "false");
    assert_eq!(eval("a.b = 1; delete(@a.b)"), "true");
    assert_eq!(eval("a.b = 1; delete(@a.b); exists(@a.b)"), "false");
    assert_eq!(eval("delete(@a.b)"), "false");
}

#[test]
fn test_foreach_iterates_container() {
    assert_eq!(
        eval("c.a = 1; c.b = 2; total = 0; foreach(@c, >::total += $2); total"),
        "3"
    );
    // The callback receives the element reference and the symbol tail.
    assert_eq!(
        eval("c.x = 7; names = ''; foreach(@c, >::names #= $1); names"),
        "x"
    );
    assert_eq!(eval("c.x = 7; foreach(@c, >[$0] = 9); c.x"), "9");
    // Exactly the prefixed symbols are visited.
    assert_eq!(
        eval("c.a = 1; cc = 5; d.a = 9; n = 0; foreach(@c, >++::n); n"),
        "1"
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Standard library: evaluation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_evaluate_native() {
    assert_eq!(eval("x = 5; evaluate('x + 1')"), "6");
    assert_eq!(eval("evaluate('1 + 1') + 1"), "3");
    assert_eq!(eval("g = function { q = 9; evaluate('q', @$) }; g()"), "9");
}

#[test]
fn test_parse_native() {
    assert_eq!(eval("parse('1+2; x')"), "3");
    assert_eq!(eval("parse('  42  ')"), "6");
    assert_eq!(eval("parse('42 + 1', true)"), "2");
    assert_eq!(eval("parse('''ab'' # 1', true)"), "4");
}

#[test]
fn test_invoke_native() {
    assert_eq!(
        eval("args.n = 2; args.0 = 30; args.1 = 12; invoke(, >$0 + $1, @args)"),
        "42"
    );
    assert_eq!(
        eval("f = function { $n }; a.n = 3; a.0 = 1; a.1 = 2; a.2 = 3; invoke('f', , @a)"),
        "3"
    );
    // Offset and count select a slice of the argument container.
    assert_eq!(
        eval("a.n = 3; a.0 = 1; a.1 = 2; a.2 = 3; invoke(, >$0, @a, 1, 1)"),
        "2"
    );
}

#[test]
fn test_elevate_method_dispatch() {
    assert_eq!(
        eval("obj = function { $0 * 2 }; obj.meth = '<elevate>'; ::obj.meth(21)"),
        "42"
    );
    assert!(matches!(eval_err("elevate()"), Error::Undefined(_)));
}

// ═══════════════════════════════════════════════════════════════════════
// The native bridge
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_bridge_arities() {
    let root = Root::standard().unwrap();
    root.register_native("seven", nullary(|| 7i64)).unwrap();
    root.register_native("greet", unary(|name: String| format!("hi {}", name)))
        .unwrap();
    root.register_native("plus", binary(|a: f64, b: f64| a + b))
        .unwrap();
    root.register_native("argc", frame_fn(|f: &Frame| f.get("$n", false)))
        .unwrap();

    assert_eq!(root.evaluate("seven()").unwrap(), "7");
    assert_eq!(root.evaluate("greet('bob')").unwrap(), "hi bob");
    assert_eq!(root.evaluate("plus(2, 3)").unwrap(), "5");
    assert_eq!(root.evaluate("argc(9, 9, 9)").unwrap(), "3");
}

#[test]
fn test_bridge_conversion_errors() {
    let root = Root::standard().unwrap();
    root.register_native("plus", binary(|a: f64, b: f64| a + b))
        .unwrap();
    assert!(matches!(
        root.evaluate("plus('x', 1)"),
        Err(Error::InvalidNumber(_))
    ));
    // Missing arguments surface as Undefined from the callee frame.
    assert!(matches!(root.evaluate("plus(1)"), Err(Error::Undefined(_))));
}

#[test]
fn test_not_callable_native() {
    let root = Root::standard().unwrap();
    root.register_native("stone", NotCallable).unwrap();
    assert!(matches!(root.evaluate("stone()"), Err(Error::NotCallable)));
}

#[test]
fn test_unregistered_native_fails_but_marker_stays() {
    let root = Root::standard().unwrap();
    root.register_native("gone", nullary(|| 1i64)).unwrap();
    root.unregister_native("gone").unwrap();
    assert_eq!(root.evaluate("gone").unwrap(), "<gone>");
    assert!(matches!(
        root.evaluate("gone()"),
        Err(Error::UnknownNative(_))
    ));
}

#[test]
fn test_host_call_interface() {
    let root = Root::standard().unwrap();
    let args = [Value::from(2i64), Value::from(40i64)];
    let sum = root
        .call("", &Value::from(">::$0 + $1"), &args)
        .unwrap();
    assert_eq!(sum, "42");
}

#[test]
fn test_exit_code_style_globals() {
    let root = Root::standard().unwrap();
    root.set("exitCode", Value::from(0i64)).unwrap();
    root.evaluate("exitCode = 3").unwrap();
    assert_eq!(
        root.frame()
            .get_optional("exitCode", Value::from(0i64))
            .unwrap()
            .as_long()
            .unwrap(),
        3
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Shared variable spaces
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_shared_globals_between_roots() {
    let shared: VarsHandle = Rc::new(RefCell::new(MapVariables::new()));
    let first = Root::with_shared(Rc::clone(&shared));
    let second = Root::with_shared(shared);
    first.set("g", Value::from(11i64)).unwrap();
    assert_eq!(second.get("g").unwrap(), "11");
    second.evaluate("g = g + 1").unwrap();
    assert_eq!(first.get("g").unwrap(), "12");
}
