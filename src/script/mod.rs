//! Embedded evaluator for textual test bodies.
//!
//! Bodies are written in a small JavaScript-like language: declarations,
//! functions and arrows, control flow, try/catch, template literals, arrays
//! and plain objects. Every body gets its own [`Interpreter`], so nothing a
//! body defines is visible to the next one.

mod ast;
mod builtins;
mod fault;
mod interp;
mod lexer;
mod parser;
mod value;

pub use fault::{ErrorKind, Fault};
pub use interp::{Env, Interpreter, Scope};
pub use value::{Callable, NativeFn, Value, format_number};
