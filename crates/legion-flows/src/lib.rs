//! Declarative task flow loading: parses `flow "<name>" { ... }` documents
//! (HCL or TOML), merges `inherits` chains depth-first, and validates the
//! result into a `Flow` the task DAG engine can execute against.

pub mod loader;
pub mod parser;
pub mod stage;
pub mod validate;

pub use loader::{FlowRegistry, LoadError};
pub use parser::{parse_flows, Format, ParseError, RawFlow, RawStage};
pub use stage::{Flow, Requirement, Stage};
pub use validate::{validate_flow, ValidationError};
