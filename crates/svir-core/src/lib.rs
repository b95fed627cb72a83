//! # svir-core
//!
//! The hardware graph IR for elaborated SystemVerilog - THE LOGIC.
//!
//! This crate implements everything between the front-end elaborator and
//! the textual emitters: the typed, side-effect-aware graph IR (values,
//! operations, graphs, netlist), its mutation API with strict bookkeeping
//! invariants, deterministic JSON and binary codecs, and the transformation
//! pipeline (constant folding, dead-code elimination, redundant
//! elimination, XMR resolution).
//!
//! ## Architectural Constraints
//!
//! - Single-threaded by contract: the netlist, diagnostics, and logger are
//!   mutable singletons for the duration of a pipeline run
//! - Deterministic: BTreeMap-based containers, insertion-order iteration,
//!   byte-stable serialization
//! - No process-wide state: logging sinks and diagnostics travel through
//!   the pass context
//! - No async, no network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod logging;
pub mod netlist;
pub mod pass;
pub mod plan;
pub mod svint;
pub mod symbols;
pub mod types;
pub mod view;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AttributeValue, GraphId, IrError, OperationId, OperationKind, SrcLoc, SymbolId, ValueId,
    ValueType, ValueUser,
};

// =============================================================================
// RE-EXPORTS: Graph IR
// =============================================================================

pub use graph::{Graph, InoutPort, Operation, Value};
pub use netlist::Netlist;
pub use svint::{Bit, SvInt};
pub use symbols::SymbolTable;
pub use view::GraphView;

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::json::{JsonPrintMode, emit_netlist, parse_netlist};
pub use formats::persistence::{netlist_from_bytes, netlist_to_bytes};

// =============================================================================
// RE-EXPORTS: Pass Framework and Passes
// =============================================================================

pub use pass::const_fold::{ConstantFoldOptions, ConstantFoldPass};
pub use pass::dead_code::DeadCodeElimPass;
pub use pass::memory_init_check::MemoryInitCheckPass;
pub use pass::redundant_elim::RedundantElimPass;
pub use pass::xmr_resolve::XmrResolvePass;
pub use pass::{
    Pass, PassContext, PassDiagnostic, PassDiagnosticKind, PassDiagnostics, PassManager,
    PassPipelineOptions, PassResult, TransformResult,
};

// =============================================================================
// RE-EXPORTS: Logging and Front-End Contract
// =============================================================================

pub use logging::{LogEvent, LogLevel, LogSink, Logger};
pub use plan::{
    InstanceRecord, MemoryPortSite, ModulePlan, PortDirection, PortInfo, ProcessDomain,
    ReadWriteSite, SignalInfo, SignalKind,
};
