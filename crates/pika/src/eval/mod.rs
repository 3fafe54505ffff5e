//! The expression evaluator.
//!
//! A precedence-climbing recursive-descent parser that evaluates as it
//! parses: one pass over the source, no AST. The same recursion runs in
//! "dry" mode to skip untaken branches and to measure the extent of code
//! without side effects.
//!
//! Parsing is byte-driven (all syntax characters are ASCII; non-ASCII text
//! only occurs inside string literals, which are decoded whole), while
//! user-visible offsets are reported in characters.

mod ops;
mod postfix;
mod prefix;

use std::rc::Rc;

use crate::conv;
use crate::error::{Error, Result};
use crate::frame::{Frame, Precedence};
use crate::value::Value;

/// A position within a borrowed source string.
pub(crate) struct Cursor<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(src: &'s str) -> Cursor<'s> {
        Cursor { src, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    pub(crate) fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + ahead).copied()
    }

    /// The unparsed remainder.
    pub(crate) fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    /// The text between `from` and the current position.
    pub(crate) fn slice_from(&self, from: usize) -> &'s str {
        &self.src[from..self.pos]
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.src.len());
    }

    pub(crate) fn set_end(&mut self) {
        self.pos = self.src.len();
    }
}

/// The differentiation between lvalues and rvalues threaded through the
/// parser: an lvalue carries the symbol it names, an rvalue the computed
/// value.
#[derive(Clone, Debug)]
pub(crate) enum XVal {
    Lvalue(Value),
    Rvalue(Value),
}

impl Default for XVal {
    fn default() -> XVal {
        XVal::Rvalue(Value::void())
    }
}

/// Extracts the symbol of an lvalue; anything else is [`Error::InvalidLValue`].
pub(crate) fn lvalue(v: &XVal) -> Result<&Value> {
    match v {
        XVal::Lvalue(symbol) => Ok(symbol),
        XVal::Rvalue(_) => Err(Error::InvalidLValue),
    }
}

/// Skips whitespace, `//` line comments and `/* */` block comments.
pub(crate) fn skip_white(cursor: &mut Cursor) -> Result<()> {
    loop {
        match cursor.peek() {
            Some(b' ' | b'\t' | b'\r' | b'\n') => cursor.advance(1),
            Some(b'/') if cursor.peek_at(1) == Some(b'/') => {
                cursor.advance(2);
                match cursor.rest().find(['\r', '\n']) {
                    Some(k) => cursor.advance(k),
                    None => cursor.set_end(),
                }
            }
            Some(b'/') if cursor.peek_at(1) == Some(b'*') => {
                cursor.advance(2);
                match cursor.rest().find("*/") {
                    Some(k) => cursor.advance(k + 2),
                    None => return Err(Error::syntax("Missing '*/'")),
                }
            }
            _ => return Ok(()),
        }
    }
}

/// Matches a reserved word whose first character the cursor already points
/// at; `word` is the remainder. Only matches when followed by a
/// non-identifier character, and then also skips trailing whitespace.
pub(crate) fn token(cursor: &mut Cursor, word: &str) -> Result<bool> {
    let rest = cursor.rest();
    if rest.len() < 1 + word.len() || !rest[1..].starts_with(word) {
        return Ok(false);
    }
    let after = rest.as_bytes().get(1 + word.len());
    if after.copied().is_some_and(conv::is_symbol_char) {
        return Ok(false);
    }
    cursor.advance(1 + word.len());
    if cursor.peek().is_some_and(conv::maybe_white) {
        skip_white(cursor)?;
    }
    Ok(true)
}

impl Frame {
    /// Resolves `v` to a value: rvalues directly, lvalues through a lookup
    /// (optionally falling back to the root space).
    pub(crate) fn rvalue(&self, v: &XVal, fallback: bool) -> Result<Value> {
        match v {
            XVal::Rvalue(value) => Ok(value.clone()),
            XVal::Lvalue(symbol) => self.get(symbol.as_str(), fallback),
        }
    }

    /// Reports a trace event at the current parse position, if a source is
    /// installed on this frame.
    pub(crate) fn tick(
        &self,
        pos: usize,
        v: &XVal,
        level: Precedence,
        exit: bool,
    ) -> Result<()> {
        let source = self.0.source.borrow().clone();
        let Some(source) = source else {
            return Ok(());
        };
        let (is_lvalue, value) = match v {
            XVal::Lvalue(symbol) => (true, symbol),
            XVal::Rvalue(value) => (false, value),
        };
        self.trace(&source, pos, is_lvalue, value, level, exit)
    }

    /// Parses and evaluates one expression at `thres`, leaving the result in
    /// `v`. Returns false when the expression was empty (allowed only with
    /// `empty_ok`). When `dry` is set, the same text is consumed with no
    /// side effects and no lookups.
    pub(crate) fn expr(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        empty_ok: bool,
        dry: bool,
        thres: Precedence,
    ) -> Result<bool> {
        if cursor.peek().is_some_and(conv::maybe_white) {
            skip_white(cursor)?;
        }
        if !dry && self.do_trace(thres) {
            self.tick(cursor.pos(), v, thres, false)?;
        }
        if self.pre(cursor, v, dry)? {
            while self.post(cursor, v, dry, thres)? {}
            if !dry && self.do_trace(thres) {
                self.tick(cursor.pos(), v, thres, true)?;
            }
            Ok(true)
        } else if empty_ok {
            Ok(false)
        } else {
            Err(Error::syntax("Syntax error"))
        }
    }

    /// Like [`Frame::expr`] but requires the terminator `term` afterwards
    /// and consumes it.
    pub(crate) fn term_expr(
        &self,
        cursor: &mut Cursor,
        v: &mut XVal,
        empty_ok: bool,
        dry: bool,
        thres: Precedence,
        term: u8,
    ) -> Result<bool> {
        let non_empty = self.expr(cursor, v, empty_ok, dry, thres)?;
        if cursor.peek() != Some(term) {
            return Err(Error::Syntax(format!("Missing '{}'", term as char)));
        }
        cursor.advance(1);
        Ok(non_empty)
    }

    /// Evaluates a source expression on this frame.
    ///
    /// The frame's source pointer is installed around the evaluation and
    /// restored on every exit path so that tracer offsets stay valid.
    pub fn evaluate(&self, source: &str) -> Result<Value> {
        let shared: Rc<str> = Rc::from(source);
        let previous = self.0.source.borrow_mut().replace(Rc::clone(&shared));
        let result = self.evaluate_installed(&shared);
        *self.0.source.borrow_mut() = previous;
        result
    }

    fn evaluate_installed(&self, source: &str) -> Result<Value> {
        let mut cursor = Cursor::new(source);
        let mut v = XVal::default();
        if self.do_trace(Precedence::TraceCall) {
            self.tick(cursor.pos(), &v, Precedence::TraceCall, false)?;
        }
        let mut outcome = self.statements(&mut cursor, &mut v);
        if let Err(ref error) = outcome {
            if self.do_trace(Precedence::TraceError) {
                let report = XVal::Rvalue(Value::from(error.to_string()));
                let at_root = self.0.previous.is_none();
                if let Err(tracer_error) =
                    self.tick(cursor.pos(), &report, Precedence::TraceError, at_root)
                {
                    outcome = Err(tracer_error);
                }
            }
        }
        if self.do_trace(Precedence::TraceCall) {
            let report = match &outcome {
                Ok(value) => XVal::Rvalue(value.clone()),
                Err(_) => v.clone(),
            };
            if let Err(tracer_error) =
                self.tick(cursor.pos(), &report, Precedence::TraceCall, true)
            {
                outcome = Err(tracer_error);
            }
        }
        outcome
    }

    fn statements(&self, cursor: &mut Cursor, v: &mut XVal) -> Result<Value> {
        while !cursor.at_end() {
            self.expr(cursor, v, true, false, Precedence::Statement)?;
            if !cursor.at_end() {
                if cursor.peek() != Some(b';') {
                    return Err(Error::syntax("Syntax error"));
                }
                cursor.advance(1);
            }
        }
        self.rvalue(v, true)
    }

    /// Parses a Pika expression (or, with `literal`, a single literal)
    /// without evaluating it, returning the byte offset at which parsing
    /// stopped.
    pub fn parse(&self, source: &str, literal: bool) -> Result<usize> {
        let mut cursor = Cursor::new(source);
        let mut dummy = XVal::default();
        if !literal {
            self.expr(&mut cursor, &mut dummy, true, true, Precedence::Statement)?;
            return Ok(cursor.pos());
        }
        match cursor.peek() {
            Some(b'f') => {
                if !token(&mut cursor, "alse")? && token(&mut cursor, "unction")? {
                    cursor.set_pos(0);
                    self.pre(&mut cursor, &mut dummy, true)?;
                }
            }
            Some(b't') => {
                token(&mut cursor, "rue")?;
            }
            Some(b'v') => {
                token(&mut cursor, "oid")?;
            }
            Some(b'+' | b'-') => {
                let digit = cursor.peek_at(1).is_some_and(|c| c.is_ascii_digit());
                if !token(&mut cursor, "infinity")? && digit {
                    self.pre(&mut cursor, &mut dummy, true)?;
                }
            }
            Some(b'<' | b'>' | b'\'' | b'"' | b'0'..=b'9') => {
                self.pre(&mut cursor, &mut dummy, true)?;
            }
            _ => {}
        }
        Ok(cursor.pos())
    }
}
