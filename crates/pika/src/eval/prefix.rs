//! Prefix dispatch: literals, unary operators, grouping, control flow and
//! definitions.

use crate::conv;
use crate::error::{Error, Result};
use crate::frame::{Frame, Precedence};
use crate::value::Value;

use super::{lvalue, skip_white, token, Cursor, XVal};

impl Frame {
    /// Parses one primary expression (with any prefix operators) into `v`.
    /// Returns false only when nothing could be consumed.
    pub(crate) fn pre(&self, cursor: &mut Cursor, v: &mut XVal, dry: bool) -> Result<bool> {
        let start = cursor.pos();
        let Some(c) = cursor.peek() else {
            return Ok(false);
        };
        match c {
            b'!' => {
                cursor.advance(1);
                self.expr(cursor, v, false, dry, Precedence::Prefix)?;
                if !dry {
                    let b = self.rvalue(v, true)?.as_bool()?;
                    *v = XVal::Rvalue(Value::from(!b));
                }
                return Ok(true);
            }
            b'~' => {
                cursor.advance(1);
                self.expr(cursor, v, false, dry, Precedence::Prefix)?;
                if !dry {
                    let word = self.rvalue(v, true)?.as_long()? as u64;
                    *v = XVal::Rvalue(Value::from(!word));
                }
                return Ok(true);
            }
            b'(' => {
                cursor.advance(1);
                self.term_expr(cursor, v, false, dry, Precedence::Brackets, b')')?;
                return Ok(true);
            }
            b'@' => {
                cursor.advance(1);
                self.expr(cursor, v, false, dry, Precedence::Prefix)?;
                if !dry {
                    let symbol = lvalue(v)?.clone();
                    *v = XVal::Rvalue(self.reference(symbol.as_str())?);
                }
                return Ok(true);
            }
            b'[' => {
                cursor.advance(1);
                self.term_expr(cursor, v, false, dry, Precedence::Brackets, b']')?;
                if !dry {
                    let symbol = self.rvalue(v, true)?;
                    *v = XVal::Lvalue(symbol);
                }
                return Ok(true);
            }
            b'<' => {
                // A native literal <identifier> is kept verbatim; without a
                // closing '>' it extends to the end of input.
                match cursor.rest().find('>') {
                    Some(k) => cursor.advance(k + 1),
                    None => cursor.set_end(),
                }
                if !dry {
                    *v = XVal::Rvalue(Value::from(cursor.slice_from(start)));
                }
                return Ok(true);
            }
            b'\'' | b'"' => {
                let (decoded, used) = conv::unescape(cursor.rest())?;
                cursor.advance(used);
                if !dry {
                    *v = XVal::Rvalue(Value::from(decoded));
                }
                return Ok(true);
            }
            b'>' => {
                // Lambda: the body is parsed once to find its extent; the
                // resulting value carries the current closure's label.
                cursor.advance(1);
                if cursor.peek().is_some_and(conv::maybe_white) {
                    skip_white(cursor)?;
                }
                let body_start = cursor.pos();
                self.expr(cursor, v, false, true, Precedence::Statement)?;
                if !dry {
                    let text = format!(
                        ">{}{}",
                        self.closure_frame().label(),
                        cursor.slice_from(body_start)
                    );
                    *v = XVal::Rvalue(Value::from(text));
                }
                return Ok(true);
            }
            b'{' => {
                loop {
                    cursor.advance(1);
                    self.expr(cursor, v, true, dry, Precedence::Statement)?;
                    if cursor.peek() != Some(b';') {
                        break;
                    }
                }
                if cursor.at_end() {
                    return Err(Error::syntax("Missing '}'"));
                }
                if cursor.peek() != Some(b'}') {
                    return Err(Error::syntax("Syntax error (missing ';')?"));
                }
                cursor.advance(1);
                return Ok(true);
            }
            b'e' => {
                if token(cursor, "lse")? {
                    return Err(Error::UnexpectedElse);
                }
            }
            b't' => {
                if token(cursor, "rue")? {
                    if !dry {
                        *v = XVal::Rvalue(Value::from(true));
                    }
                    return Ok(true);
                }
            }
            b'v' => {
                if token(cursor, "oid")? {
                    if !dry {
                        *v = XVal::Rvalue(Value::void());
                    }
                    return Ok(true);
                }
            }
            b'+' | b'-' => {
                let negative = c == b'-';
                if token(cursor, "infinity")? {
                    cursor.set_pos(start + 1);
                    self.number_literal(cursor, v, dry, negative)?;
                    return Ok(true);
                }
                cursor.advance(1);
                let Some(next) = cursor.peek() else {
                    return Ok(false);
                };
                if next == c {
                    // Prefix increment / decrement.
                    cursor.advance(1);
                    self.expr(cursor, v, false, dry, Precedence::Prefix)?;
                    if !dry {
                        let old = self.rvalue(v, false)?.as_long()?;
                        let symbol = lvalue(v)?.clone();
                        let new = Value::from(old + if negative { -1 } else { 1 });
                        *v = XVal::Rvalue(self.set(symbol.as_str(), new)?);
                    }
                    return Ok(true);
                }
                if !next.is_ascii_digit() {
                    // Unary plus / minus.
                    self.expr(cursor, v, false, dry, Precedence::Prefix)?;
                    if !dry {
                        let d = self.rvalue(v, true)?.as_double()?;
                        *v = XVal::Rvalue(Value::from(if negative { -d } else { d }));
                    }
                    return Ok(true);
                }
                self.number_literal(cursor, v, dry, negative)?;
                return Ok(true);
            }
            b'0'..=b'9' => {
                self.number_literal(cursor, v, dry, false)?;
                return Ok(true);
            }
            b':' => {
                if cursor.peek_at(1) == Some(b':') {
                    cursor.advance(2);
                }
            }
            b'^' => {
                while cursor.peek() == Some(b'^') {
                    cursor.advance(1);
                }
            }
            b'f' => {
                if token(cursor, "alse")? {
                    if !dry {
                        *v = XVal::Rvalue(Value::from(false));
                    }
                    return Ok(true);
                }
                if token(cursor, "or")? {
                    self.for_loop(cursor, v, dry)?;
                    return Ok(true);
                }
                if token(cursor, "unction")? {
                    if cursor.peek() != Some(b'{') {
                        return Err(Error::syntax("Expected '{'"));
                    }
                    let body_start = cursor.pos();
                    self.expr(cursor, v, false, true, Precedence::Definition)?;
                    if !dry {
                        *v = XVal::Rvalue(Value::from(cursor.slice_from(body_start)));
                    }
                    return Ok(true);
                }
            }
            b'i' => {
                if cursor.peek_at(1).is_some() && token(cursor, "f")? {
                    if cursor.peek() != Some(b'(') {
                        return Err(Error::syntax("Expected '('"));
                    }
                    cursor.advance(1);
                    let mut condition = XVal::default();
                    self.term_expr(cursor, &mut condition, false, dry, Precedence::Argument, b')')?;
                    let taken = dry || self.rvalue(&condition, true)?.as_bool()?;
                    self.expr(cursor, v, false, dry || !taken, Precedence::Body)?;
                    if cursor.peek() == Some(b'e') && token(cursor, "lse")? {
                        self.expr(cursor, v, false, dry || taken, Precedence::Body)?;
                    }
                    return Ok(true);
                }
            }
            _ => {}
        }
        while cursor.peek().is_some_and(conv::is_symbol_char) {
            cursor.advance(1);
        }
        if cursor.pos() != start && !dry {
            *v = XVal::Lvalue(Value::from(cursor.slice_from(start)));
        }
        Ok(cursor.pos() != start)
    }

    /// Parses a numeric literal at the cursor: hexadecimal with `0x`,
    /// otherwise decimal/scientific (including `infinity` reached through a
    /// sign).
    fn number_literal(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        dry: bool,
        negative: bool,
    ) -> Result<()> {
        if cursor.peek() == Some(b'0') && cursor.peek_at(1) == Some(b'x') {
            cursor.advance(2);
            let (word, used) = conv::hex_to_u64(cursor.rest());
            if used == 0 {
                return Err(Error::syntax("Invalid hexadecimal number"));
            }
            cursor.advance(used);
            if !dry {
                *v = XVal::Rvalue(if negative {
                    Value::from((word as i64).wrapping_neg())
                } else {
                    Value::from(word)
                });
            }
            return Ok(());
        }
        let (d, used) = conv::str_to_f64(cursor.rest());
        cursor.advance(used);
        if !dry {
            *v = XVal::Rvalue(Value::from(if negative { -d } else { d }));
        }
        Ok(())
    }

    /// `for (init; cond; step) body` with C semantics: the condition and
    /// step are re-parsed from their source positions on every iteration.
    fn for_loop(&self, cursor: &mut Cursor, v: &mut XVal, dry: bool) -> Result<()> {
        if cursor.peek() != Some(b'(') {
            return Err(Error::syntax("Expected '('"));
        }
        cursor.advance(1);
        let mut xv = XVal::default();
        self.term_expr(cursor, &mut xv, true, dry, Precedence::Argument, b';')?;
        let cond_pos = cursor.pos();
        self.term_expr(cursor, &mut xv, true, dry, Precedence::Argument, b';')?;
        let step_pos = cursor.pos();
        self.term_expr(cursor, &mut xv, true, true, Precedence::Argument, b')')?;
        let body_pos = cursor.pos();
        let mut live = !dry && self.rvalue(&xv, true)?.as_bool()?;
        loop {
            cursor.set_pos(body_pos);
            self.expr(cursor, v, true, !live, Precedence::Body)?;
            if !live {
                break;
            }
            if self.do_trace(Precedence::TraceLoop) {
                self.tick(cursor.pos(), v, Precedence::TraceLoop, true)?;
            }
            let end_pos = cursor.pos();
            cursor.set_pos(step_pos);
            self.expr(cursor, &mut xv, true, false, Precedence::Argument)?;
            cursor.set_pos(cond_pos);
            self.expr(cursor, &mut xv, true, false, Precedence::Argument)?;
            cursor.set_pos(end_pos);
            live = self.rvalue(&xv, true)?.as_bool()?;
            if !live {
                break;
            }
        }
        if !dry && self.do_trace(Precedence::TraceLoop) {
            self.tick(cursor.pos(), v, Precedence::TraceLoop, false)?;
        }
        Ok(())
    }
}
