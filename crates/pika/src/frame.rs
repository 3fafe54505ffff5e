//! Frames and the interpreter root.
//!
//! A [`Frame`] is a single activation of interpreted code: it owns (or
//! shares) a variable space, links to its caller and to the [`Root`], and
//! carries the closure pointer through which unqualified identifiers
//! resolve. Frames are cheap `Rc` handles; a call frame and its locals die
//! when the call returns, on success and on unwind alike.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::conv;
use crate::error::{Error, Result};
use crate::native::Native;
use crate::value::Value;
use crate::variables::{MapVariables, Variables};

/// Shared handle to a variable space.
pub type VarsHandle = Rc<RefCell<dyn Variables>>;

/// Precedence levels, used both by the parser and for trace granularity.
///
/// Any trace level enables all lower levels: setting the tracer at
/// [`Precedence::Statement`] also reports calls, loops and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Tracing disabled.
    NoTrace,
    /// Error unwind events.
    TraceError,
    /// Function body entry/exit events.
    TraceCall,
    /// Loop iteration events.
    TraceLoop,
    /// `x; y;` sequencing.
    Statement,
    /// Body of `if` and `for`.
    Body,
    /// `,` separation in calls and lists.
    Argument,
    /// `()`, `[]`, `{}` grouping.
    Brackets,
    /// `=` and the compound assignments.
    Assign,
    /// `||`
    LogicalOr,
    /// `&&`
    LogicalAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `==` `!=` `===` `!==`
    Equality,
    /// `<` `<=` `>` `>=`
    Compare,
    /// `#`
    Concat,
    /// `<<` `>>`
    Shift,
    /// Binary `+` `-`
    AddSub,
    /// `*` `/` `\` `%`
    MulDiv,
    /// Unary `@` `!` `~` `+` `-` `++` `--`
    Prefix,
    /// `x()` `x.y` `x[y]` `x{y}` `x++` `x--`
    Postfix,
    /// `function { }`
    Definition,
}

impl Precedence {
    const LEVELS: [Precedence; 23] = [
        Precedence::NoTrace,
        Precedence::TraceError,
        Precedence::TraceCall,
        Precedence::TraceLoop,
        Precedence::Statement,
        Precedence::Body,
        Precedence::Argument,
        Precedence::Brackets,
        Precedence::Assign,
        Precedence::LogicalOr,
        Precedence::LogicalAnd,
        Precedence::BitOr,
        Precedence::BitXor,
        Precedence::BitAnd,
        Precedence::Equality,
        Precedence::Compare,
        Precedence::Concat,
        Precedence::Shift,
        Precedence::AddSub,
        Precedence::MulDiv,
        Precedence::Prefix,
        Precedence::Postfix,
        Precedence::Definition,
    ];

    /// Converts a script-level integer to a level, clamping out-of-range
    /// values to the nearest end of the ladder.
    pub fn from_i64(level: i64) -> Precedence {
        Precedence::LEVELS[level.clamp(0, 22) as usize]
    }
}

/// One evaluation event reported to a host tracer.
#[derive(Debug)]
pub struct TraceEvent<'a> {
    /// The source text being evaluated.
    pub source: &'a str,
    /// Character offset of the event within `source`.
    pub offset: usize,
    /// Whether the current result is an lvalue (a symbol) or an rvalue.
    pub lvalue: bool,
    /// The current result: the symbol text for lvalues, the value otherwise.
    pub value: &'a Value,
    /// The precedence level that triggered the event.
    pub level: Precedence,
    /// False on expression entry, true on exit.
    pub exit: bool,
}

/// A host tracer callback. Returning an error unwinds the evaluation stack,
/// which is also the supported cancellation mechanism.
pub type HostTracer = Rc<dyn Fn(&TraceEvent<'_>) -> Result<()>>;

#[derive(Clone)]
enum Tracer {
    Off,
    Script(Value),
    Host(HostTracer),
}

const LABEL_DIGITS: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Per-root interpreter state: tracer policy, label generation, the call
/// depth guard and the random generator. No process-wide state.
pub(crate) struct Runtime {
    root: RefCell<Weak<FrameData>>,
    trace_level: Cell<Precedence>,
    tracer: RefCell<Tracer>,
    in_tracer: Cell<bool>,
    next_label: Cell<u64>,
    depth: Cell<usize>,
    max_depth: Cell<usize>,
    rng_state: Cell<u64>,
}

impl Runtime {
    fn new() -> Runtime {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
            | 1;
        Runtime {
            root: RefCell::new(Weak::new()),
            trace_level: Cell::new(Precedence::NoTrace),
            tracer: RefCell::new(Tracer::Off),
            in_tracer: Cell::new(false),
            next_label: Cell::new(1),
            depth: Cell::new(0),
            max_depth: Cell::new(1000),
            rng_state: Cell::new(seed),
        }
    }

    /// Produces the next unique frame label: `:<base-62 counter>:`.
    fn generate_label(&self) -> Box<str> {
        let n = self.next_label.get();
        self.next_label.set(n + 1);
        let mut digits = Vec::new();
        let mut x = n;
        loop {
            digits.push(LABEL_DIGITS[(x % 62) as usize]);
            x /= 62;
            if x == 0 {
                break;
            }
        }
        let mut label = String::with_capacity(digits.len() + 2);
        label.push(':');
        label.extend(digits.iter().rev().map(|&b| b as char));
        label.push(':');
        label.into_boxed_str()
    }

    /// xorshift64* step.
    pub(crate) fn next_random(&self) -> u64 {
        let mut x = self.rng_state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng_state.set(x);
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }
}

pub(crate) struct FrameData {
    pub(crate) vars: VarsHandle,
    pub(crate) runtime: Rc<Runtime>,
    pub(crate) previous: Option<Frame>,
    pub(crate) closure: RefCell<Option<Frame>>,
    pub(crate) source: RefCell<Option<Rc<str>>>,
    pub(crate) label: Box<str>,
}

impl Drop for FrameData {
    fn drop(&mut self) {
        if self.previous.is_some() {
            let depth = self.runtime.depth.get();
            self.runtime.depth.set(depth.saturating_sub(1));
        }
    }
}

/// The execution context and interpreter for a single activation.
///
/// `Frame` is a shared handle; cloning it is cheap and refers to the same
/// activation. The evaluator and all natives work through `&Frame`.
#[derive(Clone)]
pub struct Frame(pub(crate) Rc<FrameData>);

impl Frame {
    /// Constructs a child frame for a call, with its own variable space.
    /// Fails with [`Error::StackOverflow`] past the configured depth.
    pub(crate) fn child(parent: &Frame, vars: VarsHandle) -> Result<Frame> {
        let runtime = Rc::clone(&parent.0.runtime);
        let depth = runtime.depth.get();
        if depth >= runtime.max_depth.get() {
            return Err(Error::StackOverflow {
                max: runtime.max_depth.get(),
            });
        }
        runtime.depth.set(depth + 1);
        let label = runtime.generate_label();
        Ok(Frame(Rc::new(FrameData {
            vars,
            runtime,
            previous: Some(parent.clone()),
            closure: RefCell::new(None),
            source: RefCell::new(None),
            label,
        })))
    }

    /// This frame's unique label (`::` for the root).
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// The caller frame, absent only for the root.
    pub fn previous(&self) -> Option<Frame> {
        self.0.previous.clone()
    }

    /// The root frame of this interpreter instance.
    pub fn root(&self) -> Frame {
        if let Some(data) = self.0.runtime.root.borrow().upgrade() {
            return Frame(data);
        }
        let mut frame = self.clone();
        while let Some(previous) = frame.previous() {
            frame = previous;
        }
        frame
    }

    /// A handle to this frame's variable space.
    pub fn variables(&self) -> VarsHandle {
        Rc::clone(&self.0.vars)
    }

    /// True if both handles refer to the same activation.
    pub fn same_frame(&self, other: &Frame) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn closure_frame(&self) -> Frame {
        self.0.closure.borrow().clone().unwrap_or_else(|| self.clone())
    }

    pub(crate) fn set_closure(&self, target: Frame) {
        *self.0.closure.borrow_mut() = if Rc::ptr_eq(&self.0, &target.0) {
            None
        } else {
            Some(target)
        };
    }

    // ── Reference resolution ────────────────────────────────────────────

    /// Resolves a leading frame prefix (`::`, `:label:`, `^`s) and applies
    /// the closure redirect, returning the target frame and the number of
    /// bytes consumed.
    pub(crate) fn resolve_prefix(&self, s: &str) -> Result<(Frame, usize)> {
        let bytes = s.as_bytes();
        let mut frame = self.clone();
        let mut i = 0;
        if bytes.first() == Some(&b':') {
            let close = match s[1..].find(':') {
                Some(k) => k + 1,
                None => return Err(Error::InvalidIdentifier(conv::escape(s))),
            };
            if close > 1 {
                let wanted = &s[..=close];
                loop {
                    if frame.label() == wanted {
                        break;
                    }
                    frame = match frame.previous() {
                        Some(previous) => previous,
                        None => {
                            return Err(Error::FrameDoesNotExist(conv::escape(wanted)));
                        }
                    };
                }
            } else {
                frame = self.root();
            }
            i = close + 1;
        }
        while bytes.get(i) == Some(&b'^') {
            frame = match frame.previous() {
                Some(previous) => previous,
                None => return Err(Error::FrameDoesNotExist(conv::escape("^"))),
            };
            i += 1;
        }
        if bytes.get(i) != Some(&b'$') {
            frame = frame.closure_frame();
        }
        Ok((frame, i))
    }

    /// Resolves `identifier` into its target frame and bare symbol.
    ///
    /// `$`-prefixed symbols address this frame's own space; a frame prefix
    /// walks the caller chain; anything else goes through the closure.
    pub fn resolve(&self, identifier: &str) -> Result<(Frame, String)> {
        match identifier.as_bytes().first() {
            Some(b'$') => Ok((self.clone(), identifier.to_string())),
            Some(b':' | b'^') => {
                let (frame, used) = self.resolve_prefix(identifier)?;
                Ok((frame, identifier[used..].to_string()))
            }
            _ => Ok((self.closure_frame(), identifier.to_string())),
        }
    }

    // ── Variables ───────────────────────────────────────────────────────

    /// Gets a variable value. On a miss with `fallback` set (and a plain
    /// identifier), the root space is consulted before failing
    /// [`Error::Undefined`].
    pub fn get(&self, identifier: &str, fallback: bool) -> Result<Value> {
        let (frame, symbol) = self.resolve(identifier)?;
        if let Some(value) = frame.0.vars.borrow().lookup(&symbol) {
            return Ok(value);
        }
        if fallback && identifier.bytes().next().is_some_and(conv::is_symbol_char) {
            if let Some(value) = self.root().0.vars.borrow().lookup(&symbol) {
                return Ok(value);
            }
        }
        Err(Error::Undefined(conv::escape(identifier)))
    }

    /// Like [`Frame::get`] but never falls back and never fails on a miss;
    /// `default` is returned instead.
    pub fn get_optional(&self, identifier: &str, default: Value) -> Result<Value> {
        let (frame, symbol) = self.resolve(identifier)?;
        let found = frame.0.vars.borrow().lookup(&symbol);
        Ok(found.unwrap_or(default))
    }

    /// Sets a variable value, returning it. Fails [`Error::CannotModify`] if
    /// the target space refuses.
    pub fn set(&self, identifier: &str, value: Value) -> Result<Value> {
        let (frame, symbol) = self.resolve(identifier)?;
        if !frame.0.vars.borrow_mut().assign(&symbol, value.clone()) {
            return Err(Error::CannotModify(conv::escape(identifier)));
        }
        Ok(value)
    }

    /// Creates a reference to `identifier` by prefixing the bare symbol with
    /// the resolved frame's label.
    pub fn reference(&self, identifier: &str) -> Result<Value> {
        let (frame, symbol) = self.resolve(identifier)?;
        Ok(Value::from(format!("{}{}", frame.label(), symbol)))
    }

    // ── Calling ─────────────────────────────────────────────────────────

    /// Calls a function: sets up a child frame, binds `$n`, `$0..`, and
    /// `$callee` (when `callee` is non-empty), then executes `body` — or,
    /// when `body` is void, the body fetched by looking up `callee`.
    pub fn call(&self, callee: &str, body: &Value, args: &[Value]) -> Result<Value> {
        let locals: VarsHandle = Rc::new(RefCell::new(MapVariables::new()));
        {
            let mut vars = locals.borrow_mut();
            vars.assign("$n", Value::from(args.len() as i64));
            for (i, arg) in args.iter().enumerate() {
                vars.assign(&format!("${}", i), arg.clone());
            }
            if !callee.is_empty() {
                vars.assign("$callee", Value::from(callee));
            }
        }
        let child = Frame::child(self, locals)?;
        let body = if body.is_void() {
            self.get(callee, true)?
        } else {
            body.clone()
        };
        child.execute(&body)
    }

    /// Executes a function body directly on this frame, dispatching on its
    /// first character: `{` compound, `>` lambda (rebinds the closure), `<`
    /// native. Anything else fails [`Error::IllegalCall`].
    pub fn execute(&self, body: &Value) -> Result<Value> {
        let s = body.as_str();
        match s.as_bytes().first() {
            Some(b'{') => self.evaluate(s),
            Some(b'>') => {
                let rest = &s[1..];
                let (closure, used) = self.resolve_prefix(rest)?;
                self.set_closure(closure);
                self.evaluate(&rest[used..])
            }
            Some(b'<') => {
                let inner = &s[1..];
                let inner = match inner.char_indices().last() {
                    Some((i, _)) => &inner[..i],
                    None => "",
                };
                if !inner.is_empty() {
                    let (native_frame, identifier) = if inner.starts_with(':') {
                        let (frame, used) = self.resolve_prefix(inner)?;
                        (frame, &inner[used..])
                    } else {
                        (self.root(), inner)
                    };
                    let native = native_frame.0.vars.borrow().lookup_native(identifier);
                    if let Some(native) = native {
                        return native.invoke(self);
                    }
                }
                Err(Error::UnknownNative(conv::escape(s)))
            }
            _ => Err(Error::IllegalCall(conv::escape(s))),
        }
    }

    // ── Natives ─────────────────────────────────────────────────────────

    /// Registers `native` under `identifier` in the appropriate variable
    /// space and sets the `<identifier>` marker variable.
    pub fn register_native(&self, identifier: &str, native: impl Native + 'static) -> Result<()> {
        self.bind_native(identifier, Some(Rc::new(native)))
    }

    /// Unregisters the native for `identifier`. The marker variable
    /// remains; calling it afterwards fails [`Error::UnknownNative`].
    pub fn unregister_native(&self, identifier: &str) -> Result<()> {
        self.bind_native(identifier, None)
    }

    fn bind_native(&self, identifier: &str, native: Option<Rc<dyn Native>>) -> Result<()> {
        let registered = native.is_some();
        let (frame, symbol) = self.resolve(identifier)?;
        if !frame.0.vars.borrow_mut().assign_native(&symbol, native) {
            return Err(Error::CannotModify(conv::escape(identifier)));
        }
        debug!(identifier, registered, "native binding updated");
        if registered {
            let root = self.root();
            let marker = if Rc::ptr_eq(&frame.0, &root.0) {
                format!("<{}>", symbol)
            } else {
                format!("<{}{}>", frame.label(), symbol)
            };
            frame.set(&symbol, Value::from(marker))?;
        }
        Ok(())
    }

    // ── Tracing ─────────────────────────────────────────────────────────

    /// True when events at `level` should be reported. Checked on the hot
    /// path before building any event data.
    pub(crate) fn do_trace(&self, level: Precedence) -> bool {
        level <= self.0.runtime.trace_level.get()
    }

    /// The single tracer upcall point. Re-entrant invocations are
    /// suppressed, and a tracer that fails turns tracing off before its
    /// error unwinds the evaluation stack.
    pub(crate) fn trace(
        &self,
        source: &str,
        offset_bytes: usize,
        lvalue: bool,
        value: &Value,
        level: Precedence,
        exit: bool,
    ) -> Result<()> {
        let runtime = &self.0.runtime;
        if runtime.in_tracer.get() {
            return Ok(());
        }
        let tracer = runtime.tracer.borrow().clone();
        let offset = source[..offset_bytes].chars().count();
        let outcome = match tracer {
            Tracer::Off => return Ok(()),
            Tracer::Script(function) => {
                runtime.in_tracer.set(true);
                let argv = [
                    Value::from(source),
                    Value::from(offset),
                    Value::from(lvalue),
                    value.clone(),
                    Value::from(level as i64),
                    Value::from(exit),
                ];
                let outcome = self.call("", &function, &argv).map(|_| ());
                runtime.in_tracer.set(false);
                outcome
            }
            Tracer::Host(function) => {
                runtime.in_tracer.set(true);
                let event = TraceEvent {
                    source,
                    offset,
                    lvalue,
                    value,
                    level,
                    exit,
                };
                let outcome = function(&event);
                runtime.in_tracer.set(false);
                outcome
            }
        };
        if outcome.is_err() {
            // Tracing is turned off before an uncaught tracer error unwinds.
            self.set_tracer(Precedence::NoTrace, Value::void());
        }
        outcome
    }

    pub(crate) fn set_tracer(&self, level: Precedence, function: Value) {
        let runtime = &self.0.runtime;
        runtime.trace_level.set(level);
        *runtime.tracer.borrow_mut() = if function.is_void() {
            Tracer::Off
        } else {
            Tracer::Script(function)
        };
        debug!(?level, "tracer updated");
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }
}

/// The distinguished top-level frame: the host's entry point.
///
/// The root's variable space holds the globals (and typically the standard
/// natives); its label is `::`. One `Root` per execution thread; a variable
/// space may be shared between roots via [`Root::with_shared`] provided the
/// host serializes access.
pub struct Root {
    frame: Frame,
}

impl Root {
    /// Constructs a root over `vars`.
    pub fn new(vars: impl Variables + 'static) -> Root {
        Root::with_shared(Rc::new(RefCell::new(vars)))
    }

    /// Constructs a root over an explicitly shared variable space.
    pub fn with_shared(vars: VarsHandle) -> Root {
        let runtime = Rc::new(Runtime::new());
        let data = Rc::new(FrameData {
            vars,
            runtime: Rc::clone(&runtime),
            previous: None,
            closure: RefCell::new(None),
            source: RefCell::new(None),
            label: "::".into(),
        });
        *runtime.root.borrow_mut() = Rc::downgrade(&data);
        Root { frame: Frame(data) }
    }

    /// A fresh root with its own [`MapVariables`] and the standard natives
    /// registered: a full execution environment ready to go.
    pub fn standard() -> Result<Root> {
        let root = Root::new(MapVariables::new());
        crate::stdlib::add_standard_natives(root.frame())?;
        Ok(root)
    }

    /// The root frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Evaluates a source expression on the root frame.
    pub fn evaluate(&self, source: &str) -> Result<Value> {
        self.frame.evaluate(source)
    }

    /// Calls a function on the root frame; see [`Frame::call`].
    pub fn call(&self, callee: &str, body: &Value, args: &[Value]) -> Result<Value> {
        self.frame.call(callee, body, args)
    }

    /// Gets a global, falling back to nothing; see [`Frame::get`].
    pub fn get(&self, identifier: &str) -> Result<Value> {
        self.frame.get(identifier, false)
    }

    /// Sets a global; see [`Frame::set`].
    pub fn set(&self, identifier: &str, value: Value) -> Result<Value> {
        self.frame.set(identifier, value)
    }

    /// Registers a native on the root frame; see [`Frame::register_native`].
    pub fn register_native(&self, identifier: &str, native: impl Native + 'static) -> Result<()> {
        self.frame.register_native(identifier, native)
    }

    /// Unregisters a native; see [`Frame::unregister_native`].
    pub fn unregister_native(&self, identifier: &str) -> Result<()> {
        self.frame.unregister_native(identifier)
    }

    /// Installs a script tracer function at the given level. A void
    /// function turns tracing off.
    pub fn set_tracer(&self, level: Precedence, function: Value) {
        self.frame.set_tracer(level, function);
    }

    /// Installs a host tracer closure at the given level. The closure may
    /// return an error to cancel evaluation.
    pub fn set_host_tracer<F>(&self, level: Precedence, function: F)
    where
        F: Fn(&TraceEvent<'_>) -> Result<()> + 'static,
    {
        let runtime = self.frame.runtime();
        runtime.trace_level.set(level);
        *runtime.tracer.borrow_mut() = Tracer::Host(Rc::new(function));
        debug!(?level, "host tracer installed");
    }

    /// Reconfigures the call depth guard (default 1000).
    pub fn set_max_call_depth(&self, max: usize) {
        self.frame.runtime().max_depth.set(max);
    }

    /// Reseeds the per-root random generator, for reproducible runs.
    pub fn seed_random(&self, seed: u64) {
        self.frame.runtime().rng_state.set(seed | 1);
    }
}
