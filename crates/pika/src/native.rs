//! The native bridge: host callables registered in a variable space and
//! invocable from script.
//!
//! A native is anything implementing [`Native`]. The adapter constructors
//! ([`frame_fn`], [`nullary`], [`unary`], [`binary`]) wrap plain host
//! functions: arguments are fetched from the callee frame as `$0`, `$1` and
//! converted through [`FromValue`], and the return type goes back through
//! [`NativeResult`] (`()` produces void).

use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::value::Value;

/// A host callable invocable from script.
pub trait Native {
    /// Processes the call. Arguments are available as `$0`, `$1`, ... in
    /// `frame` (the callee frame); `$n` holds the argument count.
    fn invoke(&self, frame: &Frame) -> Result<Value>;
}

/// A registered-but-null native: the callable-but-fails placeholder.
pub struct NotCallable;

impl Native for NotCallable {
    fn invoke(&self, _frame: &Frame) -> Result<Value> {
        Err(Error::NotCallable)
    }
}

/// Conversion from a script value into a host argument type.
pub trait FromValue: Sized {
    /// Converts, failing with the value's conversion error on mismatch.
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Value> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<String> {
        Ok(value.into_string())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<bool> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<i64> {
        value.as_long()
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<f64> {
        value.as_double()
    }
}

/// Conversion from a host return type into the script result.
pub trait NativeResult {
    /// Produces the resulting value (or error).
    fn into_result(self) -> Result<Value>;
}

impl NativeResult for Value {
    fn into_result(self) -> Result<Value> {
        Ok(self)
    }
}

impl NativeResult for () {
    fn into_result(self) -> Result<Value> {
        Ok(Value::void())
    }
}

impl NativeResult for bool {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl NativeResult for i64 {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl NativeResult for u32 {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl NativeResult for u64 {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl NativeResult for usize {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl NativeResult for f64 {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl NativeResult for String {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl NativeResult for &str {
    fn into_result(self) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl<T: NativeResult> NativeResult for Result<T> {
    fn into_result(self) -> Result<Value> {
        self.and_then(NativeResult::into_result)
    }
}

/// Adapter for a host function that wants the whole callee frame.
pub struct FrameFn<F, R>(F, PhantomData<fn() -> R>);

/// Wraps a frame-taking host function as a native.
pub fn frame_fn<F, R>(f: F) -> FrameFn<F, R>
where
    F: Fn(&Frame) -> R,
    R: NativeResult,
{
    FrameFn(f, PhantomData)
}

impl<F, R> Native for FrameFn<F, R>
where
    F: Fn(&Frame) -> R,
    R: NativeResult,
{
    fn invoke(&self, frame: &Frame) -> Result<Value> {
        (self.0)(frame).into_result()
    }
}

/// Adapter for a 0-ary host function.
pub struct NullaryFn<F, R>(F, PhantomData<fn() -> R>);

/// Wraps a 0-ary host function as a native.
pub fn nullary<F, R>(f: F) -> NullaryFn<F, R>
where
    F: Fn() -> R,
    R: NativeResult,
{
    NullaryFn(f, PhantomData)
}

impl<F, R> Native for NullaryFn<F, R>
where
    F: Fn() -> R,
    R: NativeResult,
{
    fn invoke(&self, _frame: &Frame) -> Result<Value> {
        (self.0)().into_result()
    }
}

/// Adapter for a 1-ary host function over a value-convertible argument.
pub struct UnaryFn<F, A, R>(F, PhantomData<fn(A) -> R>);

/// Wraps a 1-ary host function as a native; the argument comes from `$0`.
pub fn unary<F, A, R>(f: F) -> UnaryFn<F, A, R>
where
    F: Fn(A) -> R,
    A: FromValue,
    R: NativeResult,
{
    UnaryFn(f, PhantomData)
}

impl<F, A, R> Native for UnaryFn<F, A, R>
where
    F: Fn(A) -> R,
    A: FromValue,
    R: NativeResult,
{
    fn invoke(&self, frame: &Frame) -> Result<Value> {
        let a0 = A::from_value(frame.get("$0", false)?)?;
        (self.0)(a0).into_result()
    }
}

/// Adapter for a 2-ary host function over value-convertible arguments.
pub struct BinaryFn<F, A0, A1, R>(F, PhantomData<fn(A0, A1) -> R>);

/// Wraps a 2-ary host function as a native; arguments come from `$0`, `$1`.
pub fn binary<F, A0, A1, R>(f: F) -> BinaryFn<F, A0, A1, R>
where
    F: Fn(A0, A1) -> R,
    A0: FromValue,
    A1: FromValue,
    R: NativeResult,
{
    BinaryFn(f, PhantomData)
}

impl<F, A0, A1, R> Native for BinaryFn<F, A0, A1, R>
where
    F: Fn(A0, A1) -> R,
    A0: FromValue,
    A1: FromValue,
    R: NativeResult,
{
    fn invoke(&self, frame: &Frame) -> Result<Value> {
        let a0 = A0::from_value(frame.get("$0", false)?)?;
        let a1 = A1::from_value(frame.get("$1", false)?)?;
        (self.0)(a0, a1).into_result()
    }
}
