//! # Pass Framework
//!
//! The rewrite pipeline: a [`Pass`] mutates the netlist through its context
//! and reports a [`PassResult`]; the [`PassManager`] runs an ordered pipeline
//! sequentially, aggregates `changed`, and stops on the first failure when
//! `stop_on_error` is set.
//!
//! Execution is strictly single-threaded and non-cooperative: a pass runs to
//! completion or reports failure, and there is no mid-pass cancellation.
//! Diagnostics accumulate in a shared sink; no error escapes the pass
//! boundary as a panic.

pub mod const_fold;
pub mod dead_code;
pub mod memory_init_check;
pub mod redundant_elim;
pub mod xmr_resolve;

use crate::logging::Logger;
use crate::netlist::Netlist;

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassDiagnosticKind {
    Error,
    Warning,
    Info,
}

/// One diagnostic record, tagged with the reporting pass.
#[derive(Debug, Clone)]
pub struct PassDiagnostic {
    pub kind: PassDiagnosticKind,
    pub message: String,
    pub context: String,
    pub pass_name: String,
}

/// Shared accumulator for pass diagnostics.
#[derive(Debug, Clone, Default)]
pub struct PassDiagnostics {
    messages: Vec<PassDiagnostic>,
}

impl PassDiagnostics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn error(&mut self, pass_name: &str, message: String, context: String) {
        self.messages.push(PassDiagnostic {
            kind: PassDiagnosticKind::Error,
            message,
            context,
            pass_name: pass_name.to_string(),
        });
    }

    /// Record a warning.
    pub fn warning(&mut self, pass_name: &str, message: String, context: String) {
        self.messages.push(PassDiagnostic {
            kind: PassDiagnosticKind::Warning,
            message,
            context,
            pass_name: pass_name.to_string(),
        });
    }

    /// Record an informational note.
    pub fn info(&mut self, pass_name: &str, message: String, context: String) {
        self.messages.push(PassDiagnostic {
            kind: PassDiagnosticKind::Info,
            message,
            context,
            pass_name: pass_name.to_string(),
        });
    }

    /// All records in emission order.
    #[must_use]
    pub fn messages(&self) -> &[PassDiagnostic] {
        &self.messages
    }

    /// True iff at least one `Error` was recorded.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.kind == PassDiagnosticKind::Error)
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all records.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

// =============================================================================
// CONTEXT AND RESULTS
// =============================================================================

/// Mutable state handed to a running pass.
pub struct PassContext<'a> {
    /// The netlist under transformation.
    pub netlist: &'a mut Netlist,
    /// Shared diagnostics sink.
    pub diags: &'a mut PassDiagnostics,
    /// Level/tag-filtered logger.
    pub logger: &'a Logger,
    /// Verbosity hint for passes that emit extra info diagnostics.
    pub verbose: bool,
    /// Entry graph name, when the driver knows one.
    pub entry_name: Option<String>,
}

/// Outcome of one pass execution.
#[derive(Debug, Clone, Default)]
pub struct PassResult {
    /// True if the pass mutated the netlist.
    pub changed: bool,
    /// True if the pass could not complete.
    pub failed: bool,
    /// Paths or names of artifacts the pass produced, if any.
    pub artifacts: Vec<String>,
}

/// Outcome of a whole pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformResult {
    /// True iff no pass failed and no diagnostic error was produced.
    pub success: bool,
    /// True if any executed pass changed the netlist.
    pub changed: bool,
}

// =============================================================================
// PASS TRAIT
// =============================================================================

/// One transformation over the netlist.
pub trait Pass {
    /// Stable identifier (`const-fold`, `dead-code-elim`, ...).
    fn id(&self) -> &str;

    /// Display name; defaults to the identifier.
    fn name(&self) -> &str {
        self.id()
    }

    /// One-line description for pipeline listings.
    fn description(&self) -> &str {
        ""
    }

    /// Run over the whole netlist. Must not panic; failures are reported
    /// through the result and the diagnostics sink.
    fn run(&mut self, ctx: &mut PassContext<'_>) -> PassResult;
}

// =============================================================================
// PASS MANAGER
// =============================================================================

/// Pipeline options.
#[derive(Debug, Clone, Copy)]
pub struct PassPipelineOptions {
    /// Terminate the pipeline when a pass fails or records an error.
    pub stop_on_error: bool,
    /// Verbosity hint forwarded into the context.
    pub verbose: bool,
}

impl Default for PassPipelineOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            verbose: false,
        }
    }
}

/// Ordered pipeline of boxed passes.
#[derive(Default)]
pub struct PassManager {
    pipeline: Vec<Box<dyn Pass>>,
    options: PassPipelineOptions,
}

impl PassManager {
    /// Empty manager with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty manager with explicit options.
    #[must_use]
    pub fn with_options(options: PassPipelineOptions) -> Self {
        Self {
            pipeline: Vec::new(),
            options,
        }
    }

    /// Append a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.pipeline.push(pass);
    }

    /// Drop every queued pass.
    pub fn clear(&mut self) {
        self.pipeline.clear();
    }

    /// Pipeline options.
    #[must_use]
    pub fn options(&self) -> &PassPipelineOptions {
        &self.options
    }

    /// Run the pipeline over a netlist.
    ///
    /// After each pass: if the pass failed or the sink holds an error and
    /// `stop_on_error` is set, the pipeline terminates. `changed` aggregates
    /// over every pass that actually ran. The overall result fails whenever
    /// any pass failed or any diagnostic error was recorded, regardless of
    /// whether later passes still executed.
    pub fn run(
        &mut self,
        netlist: &mut Netlist,
        diags: &mut PassDiagnostics,
        logger: &Logger,
    ) -> TransformResult {
        let mut changed = false;
        let mut failed = false;

        for pass in &mut self.pipeline {
            let mut ctx = PassContext {
                netlist: &mut *netlist,
                diags: &mut *diags,
                logger,
                verbose: self.options.verbose,
                entry_name: None,
            };
            let result = pass.run(&mut ctx);
            changed = changed || result.changed;
            if result.failed || diags.has_error() {
                failed = true;
                if self.options.stop_on_error {
                    break;
                }
            }
        }

        TransformResult {
            success: !failed,
            changed,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
