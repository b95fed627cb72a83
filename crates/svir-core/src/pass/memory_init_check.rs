//! # Memory Init Check
//!
//! Validation-only pass over `Memory` operations carrying initialization
//! attributes (`initKind`, `initFile`, `initHasStart`, `initHasFinish`,
//! `initStart`, `initFinish`). The arrays describe one `$readmem`-style
//! load each and must agree in length; memories that share a symbol after
//! front-end merging must agree on the whole record.
//!
//! The pass never mutates the netlist: inconsistencies become error
//! diagnostics (incomplete records only warn), so it can run anywhere in a
//! pipeline without invalidating worklists.

use crate::graph::Graph;
use crate::pass::{Pass, PassContext, PassDiagnostics, PassResult};
use crate::types::{OperationId, OperationKind};
use std::collections::BTreeMap;

/// The memory init check pass.
#[derive(Debug, Default)]
pub struct MemoryInitCheckPass;

impl MemoryInitCheckPass {
    /// Create the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

const PASS_ID: &str = "memory-init-check";

/// The per-memory initialization record, one array entry per load.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InitInfo {
    kinds: Vec<String>,
    files: Vec<String>,
    has_start: Vec<bool>,
    has_finish: Vec<bool>,
    starts: Vec<i64>,
    finishes: Vec<i64>,
}

const INIT_ATTR_KEYS: [&str; 6] = [
    "initKind",
    "initFile",
    "initHasStart",
    "initHasFinish",
    "initStart",
    "initFinish",
];

fn has_any_init_attrs(graph: &Graph, op: OperationId) -> bool {
    graph
        .operation(op)
        .is_some_and(|o| INIT_ATTR_KEYS.iter().any(|key| o.attr(key).is_some()))
}

fn op_context(graph: &Graph, op: OperationId) -> String {
    let sym = graph
        .operation(op)
        .map(|o| graph.text(o.symbol()).to_string())
        .unwrap_or_default();
    format!("graph '{}' op '{}'", graph.symbol(), sym)
}

impl Pass for MemoryInitCheckPass {
    fn id(&self) -> &str {
        PASS_ID
    }

    fn description(&self) -> &str {
        "Validate memory init attribute consistency"
    }

    fn run(&mut self, ctx: &mut PassContext<'_>) -> PassResult {
        let mut result = PassResult::default();
        let graph_count = ctx.netlist.graph_count();
        ctx.logger.debug(PASS_ID, &format!("begin graphs={graph_count}"));
        let mut checked = 0usize;

        let names: Vec<String> = ctx.netlist.graph_order().to_vec();
        for name in names {
            let Some(graph) = ctx.netlist.find_graph(&name) else { continue };
            let mut init_by_symbol: BTreeMap<String, InitInfo> = BTreeMap::new();

            let ops: Vec<OperationId> = graph.operations().collect();
            for op_id in ops {
                let Some(op) = graph.operation(op_id) else { continue };
                if op.kind() != OperationKind::Memory {
                    continue;
                }
                if !has_any_init_attrs(graph, op_id) {
                    continue;
                }
                checked += 1;

                let error = |diags: &mut PassDiagnostics, message: &str| {
                    diags.error(PASS_ID, message.to_string(), op_context(graph, op_id));
                };

                let kinds: Vec<String> = op
                    .attr_string_array("initKind")
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                let files: Vec<String> = op
                    .attr_string_array("initFile")
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                let count = kinds.len().max(files.len());
                if count == 0 {
                    ctx.diags.warning(
                        PASS_ID,
                        "memory init attributes are incomplete (missing initKind/initFile)"
                            .to_string(),
                        op_context(graph, op_id),
                    );
                    continue;
                }
                if kinds.len() != files.len() {
                    error(ctx.diags, "memory initKind/initFile size mismatch");
                    result.failed = true;
                    continue;
                }

                let has_start = op
                    .attr_bool_array("initHasStart")
                    .map_or_else(|| vec![false; count], <[bool]>::to_vec);
                let has_finish = op
                    .attr_bool_array("initHasFinish")
                    .map_or_else(|| vec![false; count], <[bool]>::to_vec);
                let starts = op
                    .attr_int_array("initStart")
                    .map_or_else(|| vec![0; count], <[i64]>::to_vec);
                let finishes = op
                    .attr_int_array("initFinish")
                    .map_or_else(|| vec![0; count], <[i64]>::to_vec);

                if has_start.len() != count {
                    error(ctx.diags, "memory initHasStart size mismatch");
                    result.failed = true;
                    continue;
                }
                if has_finish.len() != count {
                    error(ctx.diags, "memory initHasFinish size mismatch");
                    result.failed = true;
                    continue;
                }
                if starts.len() != count {
                    error(ctx.diags, "memory initStart size mismatch");
                    result.failed = true;
                    continue;
                }
                if finishes.len() != count {
                    error(ctx.diags, "memory initFinish size mismatch");
                    result.failed = true;
                    continue;
                }

                let info = InitInfo {
                    kinds,
                    files,
                    has_start,
                    has_finish,
                    starts,
                    finishes,
                };
                let symbol = graph.text(op.symbol()).to_string();
                let mismatch = init_by_symbol.get(&symbol).map(|existing| *existing != info);
                match mismatch {
                    None => {
                        init_by_symbol.insert(symbol, info);
                    }
                    Some(true) => {
                        error(
                            ctx.diags,
                            &format!("memory init attributes differ for merged memory '{symbol}'"),
                        );
                        result.failed = true;
                    }
                    Some(false) => {}
                }
            }
        }

        ctx.logger.debug(
            PASS_ID,
            &format!("graphs={graph_count}, memsChecked={checked}, failed={}", result.failed),
        );
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use crate::netlist::Netlist;
    use crate::pass::PassManager;
    use crate::types::AttributeValue;

    fn run_check(netlist: &mut Netlist) -> (crate::pass::TransformResult, PassDiagnostics) {
        let mut manager = PassManager::new();
        manager.add_pass(Box::new(MemoryInitCheckPass::new()));
        let mut diags = PassDiagnostics::new();
        let result = manager.run(netlist, &mut diags, &Logger::new());
        (result, diags)
    }

    fn add_memory(graph: &mut Graph, name: &str) -> OperationId {
        let sym = graph.intern(name);
        graph
            .create_operation(OperationKind::Memory, sym)
            .expect("memory")
    }

    #[test]
    fn consistent_init_record_passes_clean() {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("g").expect("graph");
            let mem = add_memory(graph, "rom");
            graph
                .set_attr(
                    mem,
                    "initKind",
                    AttributeValue::StringArray(vec!["hex".to_string()]),
                )
                .expect("attr");
            graph
                .set_attr(
                    mem,
                    "initFile",
                    AttributeValue::StringArray(vec!["boot.hex".to_string()]),
                )
                .expect("attr");
            graph
                .set_attr(mem, "initHasStart", AttributeValue::BoolArray(vec![true]))
                .expect("attr");
            graph
                .set_attr(mem, "initStart", AttributeValue::IntArray(vec![64]))
                .expect("attr");
        }

        let (result, diags) = run_check(&mut netlist);
        assert!(result.success, "{:?}", diags.messages());
        assert!(!result.changed);
        assert!(diags.is_empty());
    }

    #[test]
    fn kind_file_size_mismatch_fails() {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("g").expect("graph");
            let mem = add_memory(graph, "rom");
            graph
                .set_attr(
                    mem,
                    "initKind",
                    AttributeValue::StringArray(vec!["hex".to_string(), "bin".to_string()]),
                )
                .expect("attr");
            graph
                .set_attr(
                    mem,
                    "initFile",
                    AttributeValue::StringArray(vec!["boot.hex".to_string()]),
                )
                .expect("attr");
        }

        let (result, diags) = run_check(&mut netlist);
        assert!(!result.success);
        assert!(diags.has_error());
    }

    #[test]
    fn companion_array_size_mismatch_fails() {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("g").expect("graph");
            let mem = add_memory(graph, "rom");
            graph
                .set_attr(
                    mem,
                    "initKind",
                    AttributeValue::StringArray(vec!["hex".to_string()]),
                )
                .expect("attr");
            graph
                .set_attr(
                    mem,
                    "initFile",
                    AttributeValue::StringArray(vec!["boot.hex".to_string()]),
                )
                .expect("attr");
            graph
                .set_attr(
                    mem,
                    "initStart",
                    AttributeValue::IntArray(vec![0, 128]),
                )
                .expect("attr");
        }

        let (result, diags) = run_check(&mut netlist);
        assert!(!result.success);
        assert!(diags.has_error());
    }

    #[test]
    fn incomplete_record_only_warns() {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("g").expect("graph");
            let mem = add_memory(graph, "rom");
            graph
                .set_attr(mem, "initHasStart", AttributeValue::BoolArray(vec![true]))
                .expect("attr");
        }

        let (result, diags) = run_check(&mut netlist);
        assert!(result.success);
        assert!(!diags.has_error());
        assert!(!diags.is_empty());
    }

    #[test]
    fn memories_without_init_attrs_are_ignored() {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("g").expect("graph");
            let mem = add_memory(graph, "scratch");
            graph
                .set_attr(mem, "width", AttributeValue::Int(32))
                .expect("attr");
        }

        let (result, diags) = run_check(&mut netlist);
        assert!(result.success);
        assert!(diags.is_empty());
    }
}
