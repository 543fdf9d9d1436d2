//! QGen integration for Simulink models.
//!
//! This crate shows `.mdl` models as interactive block diagrams, drives the
//! QGen code generator (`qgenc`) to produce Ada/C code, and maps generated
//! source lines back to model blocks while debugging.
//!
//! The binary `qgenlink` exposes the same operations on the command line.

pub mod action;
pub mod console;
pub mod correlator;
pub mod mapping;
pub mod model;
pub mod project;
pub mod studio;
pub mod toolchain;
pub mod viewer;
pub mod workflow;

pub use console::{Console, MemoryConsole, MessageMode, TracingConsole};
pub use correlator::{DebugSession, DebuggerChannel};
pub use mapping::{MappingIndex, SourceLocation};
pub use model::{BlockId, DiagramCollection, ItemRef};
pub use project::Project;
pub use studio::Studio;
pub use toolchain::{Orchestrator, ProcessRunner, Toolchain, TokioRunner};
pub use viewer::{DiagramViewer, ViewerRegistry, ViewerState};
pub use workflow::{Status, WorkflowRun, Workflows};
