//! santa-core
//!
//! Shared foundation for the santa-lang compiler and runtime: source spans,
//! the diagnostic taxonomy, the runtime value model with its persistent
//! collections and lazy sequences, the polymorphic operators, and the
//! executable artifact the emitter targets.

pub mod builtins;
pub mod code;
pub mod error;
pub mod lazy;
pub mod ops;
pub mod span;
pub mod value;

pub use builtins::BuiltinId;
pub use code::{Artifact, CaptureSource, FunctionProto, Instr, Pat, Target};
pub use error::{Diagnostic, ErrorKind, RuntimeError};
pub use lazy::LazySequence;
pub use ops::{BinaryOp, UnaryOp};
pub use span::{Position, Span};
pub use value::{FunctionValue, RangeValue, Value};
