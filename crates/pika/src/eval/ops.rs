//! Binary operator implementations.
//!
//! Each operator converts its operands at the call boundary: arithmetic
//! through doubles, `\` through integers, bitwise ops through unsigned
//! 64-bit words, `#` and the literal equality forms through the raw
//! character sequences, and the ordered comparisons through the
//! numeric-first value ordering.

use crate::error::{Error, Result};
use crate::value::Value;

pub(super) type BinOp = fn(&Value, &Value) -> Result<Value>;

fn bits(v: &Value) -> Result<u64> {
    Ok(v.as_long()? as u64)
}

pub(super) fn add(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a.as_double()? + b.as_double()?))
}

pub(super) fn sub(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a.as_double()? - b.as_double()?))
}

pub(super) fn mul(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a.as_double()? * b.as_double()?))
}

pub(super) fn div(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a.as_double()? / b.as_double()?))
}

pub(super) fn int_div(a: &Value, b: &Value) -> Result<Value> {
    let x = a.as_long()?;
    let y = b.as_long()?;
    if y == 0 {
        return Err(Error::DivisionByZero);
    }
    Ok(Value::from(x.wrapping_div(y)))
}

pub(super) fn rem(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a.as_double()? % b.as_double()?))
}

pub(super) fn concat(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(format!("{}{}", a, b)))
}

pub(super) fn bit_and(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(bits(a)? & bits(b)?))
}

pub(super) fn bit_or(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(bits(a)? | bits(b)?))
}

pub(super) fn bit_xor(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(bits(a)? ^ bits(b)?))
}

pub(super) fn shift_left(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(bits(a)?.wrapping_shl(b.as_long()? as u32)))
}

pub(super) fn shift_right(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(bits(a)?.wrapping_shr(b.as_long()? as u32)))
}

pub(super) fn eq(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a == b))
}

pub(super) fn ne(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a != b))
}

pub(super) fn lt(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a < b))
}

pub(super) fn le(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a <= b))
}

pub(super) fn gt(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a > b))
}

pub(super) fn ge(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a >= b))
}

pub(super) fn eq_literal(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a.as_str() == b.as_str()))
}

pub(super) fn ne_literal(a: &Value, b: &Value) -> Result<Value> {
    Ok(Value::from(a.as_str() != b.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let v = |s: &str| Value::from(s);
        assert_eq!(add(&v("3"), &v("4")).unwrap(), "7");
        assert_eq!(sub(&v("3"), &v("4")).unwrap(), "-1");
        assert_eq!(mul(&v("2.5"), &v("4")).unwrap(), "10");
        assert_eq!(div(&v("1"), &v("4")).unwrap(), "0.25");
        assert_eq!(int_div(&v("7"), &v("2")).unwrap(), "3");
        assert_eq!(rem(&v("7"), &v("4")).unwrap(), "3");
        assert!(matches!(
            int_div(&v("1"), &v("0")),
            Err(Error::DivisionByZero)
        ));
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        assert_eq!(div(&Value::from("1"), &Value::from("0")).unwrap(), "+infinity");
        assert_eq!(
            div(&Value::from("-1"), &Value::from("0")).unwrap(),
            "-infinity"
        );
    }

    #[test]
    fn test_bitwise() {
        let v = |s: &str| Value::from(s);
        assert_eq!(bit_and(&v("12"), &v("10")).unwrap(), "8");
        assert_eq!(bit_or(&v("12"), &v("10")).unwrap(), "14");
        assert_eq!(bit_xor(&v("12"), &v("10")).unwrap(), "6");
        assert_eq!(shift_left(&v("1"), &v("4")).unwrap(), "16");
        assert_eq!(shift_right(&v("16"), &v("4")).unwrap(), "1");
    }

    #[test]
    fn test_equality_forms() {
        let v = |s: &str| Value::from(s);
        assert_eq!(eq(&v("1"), &v("1.0")).unwrap(), "true");
        assert_eq!(eq_literal(&v("1"), &v("1.0")).unwrap(), "false");
        assert_eq!(ne(&v("1"), &v("2")).unwrap(), "true");
        assert_eq!(ne_literal(&v("a"), &v("a")).unwrap(), "false");
    }
}
