//! # Pika
//!
//! An embeddable, string-first scripting language interpreted directly from
//! source text — no bytecode stage, no virtual machine. The interpreter
//! shares the native call stack with the host application and exposes host
//! functions as first-class callables.
//!
//! ## Architecture
//!
//! - **Value**: a single string-typed scalar with numeric / boolean /
//!   reference interpretations on demand
//! - **Variable space**: symbol and native bindings behind the
//!   [`Variables`] trait
//! - **Frame**: one activation, with a closure link and a unique label;
//!   [`Root`] is the distinguished top-level frame
//! - **Evaluator**: a precedence-climbing recursive-descent parser that
//!   evaluates as it parses
//! - **Native bridge**: adapters from host functions to the universal
//!   callable contract
//!
//! ## Example
//!
//! ```
//! use pika::Root;
//!
//! let root = Root::standard().unwrap();
//! assert_eq!(root.evaluate("3 + 4 * 2").unwrap(), "11");
//! assert_eq!(root.evaluate("'abc' # 'def'").unwrap(), "abcdef");
//! assert_eq!(root.evaluate("(function { $0 + $1 })(10, 32)").unwrap(), "42");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conv;
mod error;
mod eval;
mod frame;
mod native;
pub mod stdlib;
mod value;
mod variables;

pub use error::{Error, Result};
pub use frame::{Frame, HostTracer, Precedence, Root, TraceEvent, VarsHandle};
pub use native::{binary, frame_fn, nullary, unary, FromValue, Native, NativeResult, NotCallable};
pub use value::Value;
pub use variables::{MapVariables, Variables};

/// Crate version, also published to scripts as the global `VERSION`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
