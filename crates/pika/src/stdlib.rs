//! The standard native library.
//!
//! [`add_standard_natives`] registers the math, string, container,
//! evaluation and control primitives on a frame (normally the root). All
//! string positions are character indices.

use tracing::debug;

use crate::conv;
use crate::error::{Error, Result};
use crate::frame::{Frame, Precedence};
use crate::native::{binary, frame_fn, nullary, unary};
use crate::value::{substring, Value};
use crate::variables::Variables as _;

const WHITESPACE: &str = " \t\r\n";

/// Registers the standard natives on `frame` and sets the `VERSION`
/// variable. Call this once on a fresh root (or use
/// [`crate::Root::standard`]).
pub fn add_standard_natives(frame: &Frame) -> Result<()> {
    frame.set("VERSION", Value::from(crate::VERSION))?;
    frame.register_native("abs", unary(f64::abs))?;
    frame.register_native("acos", unary(f64::acos))?;
    frame.register_native("asin", unary(f64::asin))?;
    frame.register_native("atan", unary(f64::atan))?;
    frame.register_native("atan2", binary(f64::atan2))?;
    frame.register_native("ceil", unary(f64::ceil))?;
    frame.register_native("char", unary(character))?;
    frame.register_native("chop", binary(chop))?;
    frame.register_native("cos", unary(f64::cos))?;
    frame.register_native("cosh", unary(f64::cosh))?;
    frame.register_native("delete", frame_fn(deleter))?;
    frame.register_native("escape", unary(|s: String| conv::escape(&s)))?;
    frame.register_native("exists", frame_fn(exists))?;
    frame.register_native("elevate", frame_fn(elevate))?;
    frame.register_native("evaluate", frame_fn(evaluate))?;
    frame.register_native("exp", unary(f64::exp))?;
    frame.register_native("find", binary(find))?;
    frame.register_native("floor", unary(f64::floor))?;
    frame.register_native("foreach", frame_fn(foreach))?;
    frame.register_native("invoke", frame_fn(invoke))?;
    frame.register_native("length", unary(|s: String| s.chars().count()))?;
    frame.register_native("log", unary(f64::ln))?;
    frame.register_native("log10", unary(f64::log10))?;
    frame.register_native("lower", unary(|s: String| s.to_lowercase()))?;
    frame.register_native("mismatch", binary(mismatch))?;
    frame.register_native("ordinal", unary(ordinal))?;
    frame.register_native("pow", binary(f64::powf))?;
    frame.register_native("parse", frame_fn(parse))?;
    frame.register_native("precision", frame_fn(precision))?;
    frame.register_native("radix", frame_fn(radix))?;
    frame.register_native("random", frame_fn(random))?;
    frame.register_native("repeat", frame_fn(repeat))?;
    frame.register_native("reverse", unary(|s: String| s.chars().rev().collect::<String>()))?;
    frame.register_native("rfind", binary(rfind))?;
    frame.register_native("right", binary(right))?;
    frame.register_native("rsearch", binary(rsearch))?;
    frame.register_native("rspan", binary(rspan))?;
    frame.register_native("search", binary(search))?;
    frame.register_native("sin", unary(f64::sin))?;
    frame.register_native("sinh", unary(f64::sinh))?;
    frame.register_native("span", binary(span))?;
    frame.register_native("sqrt", unary(f64::sqrt))?;
    frame.register_native("tan", unary(f64::tan))?;
    frame.register_native("tanh", unary(f64::tanh))?;
    frame.register_native("time", nullary(time))?;
    frame.register_native("throw", unary(thrower))?;
    frame.register_native("trace", frame_fn(trace))?;
    frame.register_native("trim", frame_fn(trim))?;
    frame.register_native("try", frame_fn(tryer))?;
    frame.register_native("upper", unary(|s: String| s.to_uppercase()))?;
    debug!("standard natives registered");
    Ok(())
}

fn caller(frame: &Frame) -> Result<Frame> {
    frame
        .previous()
        .ok_or_else(|| Error::FrameDoesNotExist(conv::escape("^")))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ── Character ───────────────────────────────────────────────────────────

fn character(d: f64) -> Result<String> {
    let code = d as i64;
    let c = if code as f64 == d && (0..=0x10ffff).contains(&code) {
        char::from_u32(code as u32)
    } else {
        None
    };
    match c {
        Some(c) => Ok(c.to_string()),
        None => Err(Error::IllegalCharacterCode(conv::f64_to_string(d, 14))),
    }
}

fn ordinal(s: String) -> Result<u32> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c as u32),
        _ => Err(Error::Thrown(format!(
            "Value is not single character: {}",
            conv::escape(&s)
        ))),
    }
}

// ── String search ───────────────────────────────────────────────────────

/// Index of the first character of `a` present in `b`; length of `a` on a
/// miss.
fn find(a: String, b: String) -> usize {
    a.chars()
        .position(|c| b.contains(c))
        .unwrap_or_else(|| char_len(&a))
}

/// Index of the last character of `a` present in `b`; -1 on a miss.
fn rfind(a: String, b: String) -> i64 {
    let chars: Vec<char> = a.chars().collect();
    for i in (0..chars.len()).rev() {
        if b.contains(chars[i]) {
            return i as i64;
        }
    }
    -1
}

/// Length of the longest common prefix of `a` and `b`.
fn mismatch(a: String, b: String) -> usize {
    let shorter = char_len(&a).min(char_len(&b));
    a.chars()
        .zip(b.chars())
        .position(|(x, y)| x != y)
        .unwrap_or(shorter)
}

/// Index of the first occurrence of `b` in `a`; length of `a` on a miss.
fn search(a: String, b: String) -> usize {
    match a.find(&b) {
        Some(k) => a[..k].chars().count(),
        None => char_len(&a),
    }
}

/// Index of the last occurrence of `b` in `a`; -length(`b`) on a miss.
fn rsearch(a: String, b: String) -> i64 {
    match a.rfind(&b) {
        Some(k) => a[..k].chars().count() as i64,
        None => -(char_len(&b) as i64),
    }
}

/// Index of the first character of `a` not present in `b`; length of `a` if
/// all are.
fn span(a: String, b: String) -> usize {
    a.chars()
        .position(|c| !b.contains(c))
        .unwrap_or_else(|| char_len(&a))
}

/// Index of the last character of `a` not present in `b`; -1 if all are.
fn rspan(a: String, b: String) -> i64 {
    let chars: Vec<char> = a.chars().collect();
    for i in (0..chars.len()).rev() {
        if !b.contains(chars[i]) {
            return i as i64;
        }
    }
    -1
}

// ── String transform ────────────────────────────────────────────────────

/// Removes the last `count` characters; the whole string when `count` is
/// zero or negative, empty when it exceeds the length.
fn chop(s: String, count: f64) -> Result<Value> {
    let n = Value::from(char_len(&s) as f64 - count).as_long()?;
    Ok(substring(&s, None, Some(n)))
}

/// The last `count` characters; the whole string when `count` exceeds the
/// length, empty when it is zero or negative.
fn right(s: String, count: f64) -> Result<Value> {
    let i = Value::from(char_len(&s) as f64 - count).as_long()?;
    Ok(substring(&s, Some(i), None))
}

fn repeat(frame: &Frame) -> Result<Value> {
    let s = frame.get("$0", false)?;
    let count = frame.get("$1", false)?.as_double()?;
    let total = Value::from(count * char_len(s.as_str()) as f64).as_long()?;
    let mut out = s.into_string();
    if !out.is_empty() {
        while (out.chars().count() as i64) < total {
            let doubled = out.clone();
            out.push_str(&doubled);
        }
    }
    Ok(substring(&out, None, Some(total)))
}

fn trim(frame: &Frame) -> Result<Value> {
    let src = frame.get("$0", false)?;
    let leading = frame.get_optional("$1", Value::from(WHITESPACE))?;
    let trailing = frame.get_optional("$2", Value::from(WHITESPACE))?;
    let s = src.as_str();
    let begin = span(s.to_string(), leading.into_string()) as i64;
    let end = rspan(s.to_string(), trailing.into_string());
    Ok(substring(s, Some(begin), Some(end + 1 - begin)))
}

// ── Evaluation ──────────────────────────────────────────────────────────

fn evaluate(frame: &Frame) -> Result<Value> {
    let target = frame.get_optional("$1", Value::void())?;
    let (eval_frame, _) = frame.resolve(target.as_str())?;
    eval_frame.evaluate(frame.get("$0", false)?.as_str())
}

fn parse(frame: &Frame) -> Result<Value> {
    let source = frame.get("$0", false)?;
    let literal = frame.get_optional("$1", Value::from(false))?.as_bool()?;
    let bytes = frame.parse(source.as_str(), literal)?;
    Ok(Value::from(source.as_str()[..bytes].chars().count()))
}

fn invoke(frame: &Frame) -> Result<Value> {
    let source = frame.get("$2", false)?;
    let offset = frame.get_optional("$3", Value::from(0i64))?.as_long()?;
    let explicit_count = frame.get_optional("$4", Value::void())?;
    let count = if explicit_count.is_void() {
        frame
            .get(source.subscript(&Value::from("n")).as_str(), false)?
            .as_long()?
            - offset
    } else {
        explicit_count.as_long()?
    };
    let mut argv = Vec::new();
    for i in 0..count {
        argv.push(frame.get(source.subscript(&Value::from(i + offset)).as_str(), false)?);
    }
    let callee = frame.get_optional("$0", Value::void())?;
    let body = frame.get_optional("$1", Value::void())?;
    frame.call(callee.as_str(), &body, &argv)
}

fn tryer(frame: &Frame) -> Result<Value> {
    let body = frame.get("$0", false)?;
    match frame.call("", &body, &[]) {
        Ok(_) => Ok(Value::void()),
        Err(error) => Ok(Value::from(error.to_string())),
    }
}

// ── Variables ───────────────────────────────────────────────────────────

fn exists(frame: &Frame) -> Result<Value> {
    let target = frame.get("$0", false)?;
    let (space_frame, symbol) = caller(frame)?.resolve(target.as_str())?;
    let found = space_frame.variables().borrow().lookup(&symbol).is_some();
    Ok(Value::from(found))
}

fn deleter(frame: &Frame) -> Result<Value> {
    let target = frame.get("$0", false)?;
    let (space_frame, symbol) = caller(frame)?.resolve(target.as_str())?;
    let erased = space_frame.variables().borrow_mut().erase(&symbol);
    Ok(Value::from(erased))
}

/// Calls `$1` once per symbol under the container reference `$0`, passing a
/// reference to the element, the symbol tail and the value.
fn foreach(frame: &Frame) -> Result<Value> {
    let function = frame.get("$1", false)?;
    let container = frame.get("$0", false)?;
    let (space_frame, prefix) =
        caller(frame)?.resolve(container.subscript(&Value::void()).as_str())?;
    let mut entries = Vec::new();
    space_frame.variables().borrow().list(&prefix, &mut entries);
    for (symbol, value) in entries {
        let argv = [
            space_frame.reference(&symbol)?,
            Value::from(&symbol[prefix.len()..]),
            value,
        ];
        frame.call("", &function, &argv)?;
    }
    Ok(Value::void())
}

// ── Method dispatch ─────────────────────────────────────────────────────

/// Splits `$callee` into object ("this") and method on the last `.`,
/// resolving the object against the caller's frame.
fn get_this_and_method(frame: &Frame) -> Result<(Value, String)> {
    let callee = frame.get("$callee", false)?;
    let s = callee.as_str();
    let dot = s.rfind('.').ok_or(Error::NonMethodCall)?;
    let this_ref = caller(frame)?.reference(&s[..dot])?;
    Ok((this_ref, s[dot + 1..].to_string()))
}

/// Aggregates method calls into a single function: re-executes the body
/// stored under the "this" reference of `$callee` on the current frame.
fn elevate(frame: &Frame) -> Result<Value> {
    let (this_ref, _method) = get_this_and_method(frame)?;
    let body = frame.get(this_ref.as_str(), true)?;
    frame.execute(&body)
}

// ── Format / misc ───────────────────────────────────────────────────────

fn precision(frame: &Frame) -> Result<Value> {
    let value = frame.get("$0", false)?.as_double()?;
    let digits = frame.get("$1", false)?.as_long()?.clamp(1, 24);
    Ok(Value::from(conv::f64_to_string(value, digits as usize)))
}

fn radix(frame: &Frame) -> Result<Value> {
    let value = frame.get("$0", false)?.as_long()?;
    let radix = frame.get("$1", false)?.as_long()?;
    if !(2..=16).contains(&radix) {
        return Err(Error::Thrown(format!("Radix out of range: {}", radix)));
    }
    let min_length = frame.get_optional("$2", Value::from(1i64))?.as_long()?;
    if !(0..=64).contains(&min_length) {
        return Err(Error::Thrown(format!(
            "Minimum length out of range: {}",
            min_length
        )));
    }
    Ok(Value::from(conv::int_to_string(
        value,
        radix as u32,
        min_length as usize,
    )))
}

/// Uniform in [0, m), from the per-root generator.
fn random(frame: &Frame) -> Result<Value> {
    let m = frame.get("$0", false)?.as_double()?;
    let word = frame.runtime().next_random();
    Ok(Value::from(m * (word >> 11) as f64 / (1u64 << 53) as f64))
}

fn time() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as f64)
        .unwrap_or(0.0)
}

fn thrower(message: String) -> Result<Value> {
    Err(Error::Thrown(message))
}

fn trace(frame: &Frame) -> Result<Value> {
    let function = frame.get_optional("$0", Value::void())?;
    let level = frame
        .get_optional("$1", Value::from(Precedence::TraceCall as i64))?
        .as_long()?;
    frame.set_tracer(Precedence::from_i64(level), function);
    Ok(Value::void())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_span_search() {
        assert_eq!(find("abcd".into(), "dc".into()), 2);
        assert_eq!(find("abcd".into(), "xy".into()), 4);
        assert_eq!(span("  x".into(), " ".into()), 2);
        assert_eq!(span("xx".into(), "x".into()), 2);
        assert_eq!(search("abcdabcd".into(), "cd".into()), 2);
        assert_eq!(search("abcd".into(), "xy".into()), 4);
        assert_eq!(mismatch("abcx".into(), "abcy".into()), 3);
        assert_eq!(mismatch("ab".into(), "abcd".into()), 2);
    }

    #[test]
    fn test_reverse_direction_forms() {
        assert_eq!(rfind("abcd".into(), "d".into()), 3);
        assert_eq!(rfind("abcdcba".into(), "dc".into()), 4);
        assert_eq!(rfind("nomatch".into(), "xyz".into()), -1);
        assert_eq!(rspan("abcd".into(), "abc".into()), 3);
        assert_eq!(rspan("abcdcba".into(), "ab".into()), 4);
        assert_eq!(rspan("george bush".into(), "he bugs gore".into()), -1);
        assert_eq!(rsearch("abcdabcd".into(), "cd".into()), 6);
        assert_eq!(rsearch("nomatch".into(), "xyz".into()), -3);
    }

    #[test]
    fn test_chop_and_right() {
        assert_eq!(chop("abcdefgh".into(), 3.0).unwrap(), "abcde");
        assert_eq!(chop("abcdefgh".into(), 42.0).unwrap(), "");
        assert_eq!(chop("abcdefgh".into(), 0.0).unwrap(), "abcdefgh");
        assert_eq!(right("abcdefgh".into(), 3.0).unwrap(), "fgh");
        assert_eq!(right("abcdefgh".into(), 42.0).unwrap(), "abcdefgh");
        assert_eq!(right("abcdefgh".into(), 0.0).unwrap(), "");
    }

    #[test]
    fn test_character_and_ordinal() {
        assert_eq!(character(65.0).unwrap(), "A");
        assert_eq!(ordinal("A".into()).unwrap(), 65);
        assert!(matches!(
            character(1.5),
            Err(Error::IllegalCharacterCode(_))
        ));
        assert!(matches!(character(-1.0), Err(Error::IllegalCharacterCode(_))));
        assert!(ordinal("ab".into()).is_err());
        assert!(ordinal(String::new()).is_err());
    }
}
