pub mod ast;
mod builder;
mod compiler;
mod parser;
pub mod types;
pub mod validation;

pub use builder::{SchemaError, compile_schema};
pub use compiler::{CompileError, CompileErrorKind, CompiledSchema, compile};
pub use parser::{ParseError, ParseErrorKind, ParseErrors, parse_schema};
pub use validation::{SchemaLimits, ValidationError, validate_schema_limits};
