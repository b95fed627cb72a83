//! # CLI Command Implementations

use std::path::{Path, PathBuf};
use svir_core::{
    ConstantFoldPass, DeadCodeElimPass, IrError, JsonPrintMode, LogLevel, Logger,
    MemoryInitCheckPass, Netlist, Pass, PassDiagnosticKind, PassDiagnostics, PassManager,
    PassPipelineOptions, RedundantElimPass, XmrResolvePass, emit_netlist, netlist_from_bytes,
    netlist_to_bytes, parse_netlist,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum input file size (512 MB). Checked before reading to prevent
/// memory exhaustion from accidental or malicious inputs.
const MAX_INPUT_FILE_SIZE: u64 = 512 * 1024 * 1024;

fn validate_input_path(path: &Path) -> Result<PathBuf, IrError> {
    let canonical = path.canonicalize().map_err(|e| {
        IrError::Persistence(format!("invalid input path '{}': {e}", path.display()))
    })?;
    if !canonical.is_file() {
        return Err(IrError::Persistence(format!(
            "path '{}' is not a regular file",
            path.display()
        )));
    }
    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| IrError::Persistence(format!("cannot stat input: {e}")))?;
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(IrError::Persistence(format!(
            "input of {} bytes exceeds the {} byte limit",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }
    Ok(canonical)
}

// =============================================================================
// LOADING AND SAVING
// =============================================================================

fn is_binary_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "svir")
}

fn load_netlist(path: &Path) -> Result<Netlist, IrError> {
    let canonical = validate_input_path(path)?;
    if is_binary_path(&canonical) {
        let bytes = std::fs::read(&canonical)
            .map_err(|e| IrError::Persistence(format!("cannot read input: {e}")))?;
        netlist_from_bytes(&bytes)
    } else {
        let text = std::fs::read_to_string(&canonical)
            .map_err(|e| IrError::Persistence(format!("cannot read input: {e}")))?;
        parse_netlist(&text)
    }
}

fn save_netlist(netlist: &Netlist, path: &Path, mode: JsonPrintMode) -> Result<(), IrError> {
    if is_binary_path(path) {
        let bytes = netlist_to_bytes(netlist)?;
        std::fs::write(path, bytes)
            .map_err(|e| IrError::Persistence(format!("cannot write output: {e}")))
    } else {
        let text = emit_netlist(netlist, mode);
        std::fs::write(path, text)
            .map_err(|e| IrError::Persistence(format!("cannot write output: {e}")))
    }
}

fn parse_json_mode(text: &str) -> Result<JsonPrintMode, IrError> {
    match text {
        "compact" => Ok(JsonPrintMode::Compact),
        "pretty-compact" => Ok(JsonPrintMode::PrettyCompact),
        "pretty" => Ok(JsonPrintMode::Pretty),
        other => Err(IrError::Persistence(format!("unknown json mode '{other}'"))),
    }
}

fn build_pass(name: &str) -> Result<Box<dyn Pass>, IrError> {
    match name {
        "const-fold" => Ok(Box::new(ConstantFoldPass::new())),
        "dead-code-elim" => Ok(Box::new(DeadCodeElimPass::new())),
        "memory-init-check" => Ok(Box::new(MemoryInitCheckPass::new())),
        "redundant-elim" => Ok(Box::new(RedundantElimPass::new())),
        "xmr-resolve" => Ok(Box::new(XmrResolvePass::new())),
        other => Err(IrError::Persistence(format!("unknown pass '{other}'"))),
    }
}

/// Bridge core log events into the tracing subscriber.
fn tracing_logger(verbose: bool) -> Logger {
    let threshold = if verbose { LogLevel::Trace } else { LogLevel::Debug };
    Logger::with_sink(
        threshold,
        Box::new(|event| match event.level {
            LogLevel::Trace => tracing::trace!(tag = %event.tag, "{}", event.message),
            LogLevel::Debug => tracing::debug!(tag = %event.tag, "{}", event.message),
            LogLevel::Info => tracing::info!(tag = %event.tag, "{}", event.message),
            LogLevel::Warn => tracing::warn!(tag = %event.tag, "{}", event.message),
            LogLevel::Error | LogLevel::Off => {
                tracing::error!(tag = %event.tag, "{}", event.message);
            }
        }),
    )
}

fn report_diagnostics(diags: &PassDiagnostics) {
    for diag in diags.messages() {
        match diag.kind {
            PassDiagnosticKind::Error => {
                tracing::error!(pass = %diag.pass_name, context = %diag.context, "{}", diag.message);
            }
            PassDiagnosticKind::Warning => {
                tracing::warn!(pass = %diag.pass_name, context = %diag.context, "{}", diag.message);
            }
            PassDiagnosticKind::Info => {
                tracing::info!(pass = %diag.pass_name, context = %diag.context, "{}", diag.message);
            }
        }
    }
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Load, transform, save.
pub fn cmd_run(
    input: &Path,
    output: &Path,
    passes: &str,
    json_mode: &str,
    keep_going: bool,
    verbose: bool,
) -> Result<(), IrError> {
    let mode = parse_json_mode(json_mode)?;
    let mut netlist = load_netlist(input)?;

    let mut manager = PassManager::with_options(PassPipelineOptions {
        stop_on_error: !keep_going,
        verbose,
    });
    for name in passes.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        manager.add_pass(build_pass(name)?);
    }

    let mut diags = PassDiagnostics::new();
    let logger = tracing_logger(verbose);
    let result = manager.run(&mut netlist, &mut diags, &logger);
    report_diagnostics(&diags);

    if !result.success {
        return Err(IrError::Persistence("pass pipeline failed".to_string()));
    }
    save_netlist(&netlist, output, mode)?;
    tracing::info!(
        changed = result.changed,
        graphs = netlist.graph_count(),
        "pipeline complete, wrote {}",
        output.display()
    );
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Parse the input and re-run the invariant check on every graph.
pub fn cmd_check(input: &Path) -> Result<(), IrError> {
    let netlist = load_netlist(input)?;
    for graph in netlist.graphs() {
        graph.validate()?;
    }
    println!(
        "ok: {} graphs, {} tops",
        netlist.graph_count(),
        netlist.top_graphs().len()
    );
    Ok(())
}

// =============================================================================
// STATS COMMAND
// =============================================================================

/// Print per-graph and total counts.
pub fn cmd_stats(input: &Path, json: bool) -> Result<(), IrError> {
    let netlist = load_netlist(input)?;

    let mut total_values = 0usize;
    let mut total_ops = 0usize;
    let mut rows = Vec::new();
    for graph in netlist.graphs() {
        let values = graph.values().count();
        let ops = graph.operations().count();
        total_values += values;
        total_ops += ops;
        rows.push((graph.symbol().to_string(), values, ops));
    }

    if json {
        let output = serde_json::json!({
            "graphs": netlist.graph_count(),
            "tops": netlist.top_graphs(),
            "values": total_values,
            "operations": total_ops,
            "perGraph": rows
                .iter()
                .map(|(name, values, ops)| serde_json::json!({
                    "name": name,
                    "values": values,
                    "operations": ops,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{output}");
    } else {
        println!("graphs: {}", netlist.graph_count());
        println!("tops:   {}", netlist.top_graphs().join(", "));
        for (name, values, ops) in &rows {
            println!("  {name}: {values} values, {ops} operations");
        }
        println!("total:  {total_values} values, {total_ops} operations");
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
