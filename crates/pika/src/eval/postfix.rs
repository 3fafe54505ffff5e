//! Postfix dispatch: binary operators, member access, subscripting,
//! substring extraction and calls.

use std::cell::RefCell;
use std::rc::Rc;

use crate::conv;
use crate::error::{Error, Result};
use crate::frame::{Frame, Precedence, VarsHandle};
use crate::value::{substring, Value};
use crate::variables::{MapVariables, Variables};

use super::ops;
use super::{lvalue, skip_white, Cursor, XVal};

impl Frame {
    /// Applies one postfix construct to `v` if the cursor points at one
    /// binding tighter than `thres`. Returns false when none applies.
    pub(crate) fn post(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        dry: bool,
        thres: Precedence,
    ) -> Result<bool> {
        let Some(c) = cursor.peek() else {
            return Ok(false);
        };
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                if thres < Precedence::Definition {
                    while cursor.peek() == Some(c) {
                        cursor.advance(1);
                    }
                    return Ok(true);
                }
                Ok(false)
            }
            b'/' => {
                if thres < Precedence::Definition
                    && matches!(cursor.peek_at(1), Some(b'/' | b'*'))
                {
                    skip_white(cursor)?;
                    return Ok(true);
                }
                self.assignable_op(cursor, v, dry, thres, 1, Precedence::MulDiv, ops::div)
            }
            b'+' => self.add_sub_op(cursor, v, dry, thres, 1.0),
            b'-' => self.add_sub_op(cursor, v, dry, thres, -1.0),
            b'#' => self.assignable_op(cursor, v, dry, thres, 1, Precedence::Concat, ops::concat),
            b'*' => self.assignable_op(cursor, v, dry, thres, 1, Precedence::MulDiv, ops::mul),
            b'\\' => {
                self.assignable_op(cursor, v, dry, thres, 1, Precedence::MulDiv, ops::int_div)
            }
            b'%' => self.assignable_op(cursor, v, dry, thres, 1, Precedence::MulDiv, ops::rem),
            b'^' => self.assignable_op(cursor, v, dry, thres, 1, Precedence::BitXor, ops::bit_xor),
            b'<' => self.lgt_op(cursor, v, dry, thres, ops::lt, ops::le, ops::shift_left),
            b'>' => self.lgt_op(cursor, v, dry, thres, ops::gt, ops::ge, ops::shift_right),
            b'!' => {
                if cursor.peek_at(1) == Some(b'=') && cursor.peek_at(2) == Some(b'=') {
                    self.binary_op(cursor, v, dry, thres, 3, Precedence::Equality, ops::ne_literal)
                } else if cursor.peek_at(1) == Some(b'=') {
                    self.binary_op(cursor, v, dry, thres, 2, Precedence::Equality, ops::ne)
                } else {
                    Ok(false)
                }
            }
            b'=' => {
                if cursor.peek_at(1) == Some(b'=') && cursor.peek_at(2) == Some(b'=') {
                    self.binary_op(cursor, v, dry, thres, 3, Precedence::Equality, ops::eq_literal)
                } else if cursor.peek_at(1) == Some(b'=') {
                    self.binary_op(cursor, v, dry, thres, 2, Precedence::Equality, ops::eq)
                } else if thres <= Precedence::Assign {
                    cursor.advance(1);
                    let mut r = XVal::default();
                    self.expr(cursor, &mut r, false, dry, Precedence::Assign)?;
                    if !dry {
                        let rhs = self.rvalue(&r, true)?;
                        let symbol = lvalue(v)?.clone();
                        *v = XVal::Rvalue(self.set(symbol.as_str(), rhs)?);
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            b'&' => {
                if cursor.peek_at(1).is_some_and(|n| n != b'&') {
                    self.assignable_op(cursor, v, dry, thres, 1, Precedence::BitAnd, ops::bit_and)
                } else if thres < Precedence::LogicalAnd {
                    let left = !dry && self.rvalue(v, true)?.as_bool()?;
                    cursor.advance(2);
                    self.expr(cursor, v, false, !left, Precedence::LogicalAnd)?;
                    if !dry {
                        let result = left && self.rvalue(v, true)?.as_bool()?;
                        *v = XVal::Rvalue(Value::from(result));
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            b'|' => {
                if cursor.peek_at(1).is_some_and(|n| n != b'|') {
                    self.assignable_op(cursor, v, dry, thres, 1, Precedence::BitOr, ops::bit_or)
                } else if thres < Precedence::LogicalOr {
                    let left = dry || self.rvalue(v, true)?.as_bool()?;
                    cursor.advance(2);
                    self.expr(cursor, v, false, left, Precedence::LogicalOr)?;
                    if !dry {
                        let result = left || self.rvalue(v, true)?.as_bool()?;
                        *v = XVal::Rvalue(Value::from(result));
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            b'.' => {
                cursor.advance(1);
                if cursor.peek().is_some_and(conv::maybe_white) {
                    skip_white(cursor)?;
                }
                let name_start = cursor.pos();
                while cursor.peek().is_some_and(conv::is_symbol_char) {
                    cursor.advance(1);
                }
                if !dry {
                    let member = Value::from(cursor.slice_from(name_start));
                    *v = XVal::Lvalue(lvalue(v)?.subscript(&member));
                }
                Ok(true)
            }
            b'[' => {
                if thres >= Precedence::Postfix {
                    return Ok(false);
                }
                cursor.advance(1);
                let mut element = XVal::default();
                self.term_expr(cursor, &mut element, false, dry, Precedence::Brackets, b']')?;
                if !dry {
                    let index = self.rvalue(&element, true)?;
                    *v = XVal::Lvalue(lvalue(v)?.subscript(&index));
                }
                Ok(true)
            }
            b'{' => {
                if thres >= Precedence::Postfix {
                    return Ok(false);
                }
                self.substring_op(cursor, v, dry)
            }
            b'(' => {
                if thres >= Precedence::Postfix {
                    return Ok(false);
                }
                self.call_op(cursor, v, dry)
            }
            _ => Ok(false),
        }
    }

    fn binary_op(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        dry: bool,
        thres: Precedence,
        hop: usize,
        prec: Precedence,
        op: impl Fn(&Value, &Value) -> Result<Value>,
    ) -> Result<bool> {
        if thres >= prec {
            return Ok(false);
        }
        cursor.advance(hop);
        let mut r = XVal::default();
        self.expr(cursor, &mut r, false, dry, prec)?;
        if !dry {
            let left = self.rvalue(v, true)?;
            let right = self.rvalue(&r, true)?;
            *v = XVal::Rvalue(op(&left, &right)?);
        }
        Ok(true)
    }

    /// A binary operator that also exists in `op=` compound form. The
    /// compound form reads the current value (without root fallback),
    /// applies `op` with the right-hand side and writes back.
    fn assignable_op(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        dry: bool,
        thres: Precedence,
        hop: usize,
        prec: Precedence,
        op: impl Fn(&Value, &Value) -> Result<Value>,
    ) -> Result<bool> {
        if cursor.peek_at(hop) != Some(b'=') {
            return self.binary_op(cursor, v, dry, thres, hop, prec, op);
        }
        if thres > Precedence::Assign {
            return Ok(false);
        }
        cursor.advance(hop + 1);
        let mut r = XVal::default();
        self.expr(cursor, &mut r, false, dry, Precedence::Assign)?;
        if !dry {
            let current = self.rvalue(v, false)?;
            let rhs = self.rvalue(&r, true)?;
            let computed = op(&current, &rhs)?;
            let symbol = lvalue(v)?.clone();
            *v = XVal::Rvalue(self.set(symbol.as_str(), computed)?);
        }
        Ok(true)
    }

    /// `+`/`-` family: doubled characters are postfix increment/decrement
    /// (integer read, numeric write, old value produced), anything else is
    /// the binary/compound form through doubles.
    fn add_sub_op(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        dry: bool,
        thres: Precedence,
        delta: f64,
    ) -> Result<bool> {
        if cursor.peek_at(1) != cursor.peek() {
            return self.assignable_op(
                cursor,
                v,
                dry,
                thres,
                1,
                Precedence::AddSub,
                move |a, b| {
                    let x = a.as_double()?;
                    let y = b.as_double()?;
                    Ok(Value::from(if delta > 0.0 { x + y } else { x - y }))
                },
            );
        }
        if thres >= Precedence::Postfix {
            return Ok(false);
        }
        if !dry {
            let old = self.rvalue(v, false)?;
            let new = Value::from(old.as_long()? as f64 + delta);
            let symbol = lvalue(v)?.clone();
            self.set(symbol.as_str(), new)?;
            *v = XVal::Rvalue(old);
        }
        cursor.advance(2);
        Ok(true)
    }

    /// `<`/`>` family: doubled is a shift (with compound form), `=`-suffixed
    /// the inclusive comparison, bare the exclusive one.
    fn lgt_op(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        dry: bool,
        thres: Precedence,
        exclusive: ops::BinOp,
        inclusive: ops::BinOp,
        shift: ops::BinOp,
    ) -> Result<bool> {
        if cursor.peek_at(1) == cursor.peek() {
            self.assignable_op(cursor, v, dry, thres, 2, Precedence::Shift, shift)
        } else if cursor.peek_at(1) == Some(b'=') {
            self.binary_op(cursor, v, dry, thres, 2, Precedence::Compare, inclusive)
        } else {
            self.binary_op(cursor, v, dry, thres, 1, Precedence::Compare, exclusive)
        }
    }

    /// `a{start:count}` and `a{index}` substring forms.
    fn substring_op(&self, cursor: &mut Cursor, v: &mut XVal, dry: bool) -> Result<bool> {
        cursor.advance(1);
        let mut index = XVal::default();
        let got_index = self.expr(cursor, &mut index, true, dry, Precedence::Brackets)?;
        let separator = match cursor.peek() {
            Some(t @ (b':' | b'}')) => t,
            _ => return Err(Error::syntax("Expected '}' or ':'")),
        };
        cursor.advance(1);
        if separator == b':' {
            let mut count = XVal::default();
            let got_count =
                self.term_expr(cursor, &mut count, true, dry, Precedence::Brackets, b'}')?;
            if !dry {
                let s = self.rvalue(v, true)?;
                let i = if got_index {
                    Some(self.rvalue(&index, true)?.as_long()?)
                } else {
                    None
                };
                let n = if got_count {
                    Some(self.rvalue(&count, true)?.as_long()?)
                } else {
                    None
                };
                *v = XVal::Rvalue(substring(s.as_str(), i, n));
            }
        } else if got_index {
            if !dry {
                let s = self.rvalue(v, true)?;
                let i = self.rvalue(&index, true)?.as_long()?;
                *v = XVal::Rvalue(substring(s.as_str(), Some(i), Some(1)));
            }
        } else if !dry {
            return Err(Error::syntax("Syntax error"));
        }
        Ok(true)
    }

    /// `a(args...)`: constructs the callee frame, evaluates each argument in
    /// this (the caller's) frame and binds it into the callee's locals, then
    /// executes the callee body.
    fn call_op(&self, cursor: &mut Cursor, v: &mut XVal, dry: bool) -> Result<bool> {
        let locals: VarsHandle = Rc::new(RefCell::new(MapVariables::new()));
        let handle: VarsHandle = Rc::clone(&locals);
        let callee_frame = Frame::child(self, handle)?;
        let mut n: i64 = 0;
        loop {
            cursor.advance(1);
            if cursor.peek().is_some_and(conv::maybe_white) {
                skip_white(cursor)?;
            }
            if cursor.peek() == Some(b')') && n == 0 {
                break;
            }
            let mut argument = XVal::default();
            if self.expr(cursor, &mut argument, true, dry, Precedence::Argument)? && !dry {
                let value = self.rvalue(&argument, true)?;
                locals.borrow_mut().assign(&format!("${}", n), value);
            }
            n += 1;
            if cursor.peek() != Some(b',') {
                break;
            }
        }
        if cursor.peek() != Some(b')') {
            return Err(Error::syntax("Expected ',' or ')'"));
        }
        cursor.advance(1);
        if !dry {
            {
                let mut vars = locals.borrow_mut();
                vars.assign("$n", Value::from(n));
                if let XVal::Lvalue(symbol) = v {
                    vars.assign("$callee", symbol.clone());
                }
            }
            let body = self.rvalue(v, true)?;
            *v = XVal::Rvalue(callee_frame.execute(&body)?);
        }
        Ok(true)
    }
}
