//! # Dead-Code Elimination
//!
//! Reverse-use worklist over compact per-graph snapshots. An operation dies
//! when it is side-effect-free, has at least one result, and every result is
//! unused, unbound, and undeclared. Killing an operation decrements its
//! operands' use counts and requeues their defining operations, so whole
//! dead chains collapse in one run. A final sweep removes orphan values.
//!
//! Port-bound and declared-symbol values are never collected.

use crate::pass::{Pass, PassContext, PassResult};
use crate::types::{OperationId, ValueId};
use std::collections::VecDeque;

/// The dead-code elimination pass.
#[derive(Debug)]
pub struct DeadCodeElimPass {
    keep_declared: bool,
}

impl Default for DeadCodeElimPass {
    fn default() -> Self {
        Self { keep_declared: true }
    }
}

impl DeadCodeElimPass {
    /// Pass honouring the declared-symbol keep list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

const PASS_ID: &str = "dead-code-elim";

/// Snapshot of one operation's edges, cached before any erasure.
struct OpInfo {
    id: OperationId,
    side_effect: bool,
    operands: Vec<ValueId>,
    results: Vec<ValueId>,
}

impl Pass for DeadCodeElimPass {
    fn id(&self) -> &str {
        PASS_ID
    }

    fn description(&self) -> &str {
        "Remove unused operations and values"
    }

    fn run(&mut self, ctx: &mut PassContext<'_>) -> PassResult {
        let mut result = PassResult::default();
        let graph_count = ctx.netlist.graph_count();
        ctx.logger.debug(PASS_ID, &format!("begin graphs={graph_count}"));
        let mut changed_graphs = 0usize;

        let names: Vec<String> = ctx.netlist.graph_order().to_vec();
        for name in names {
            let Some(graph) = ctx.netlist.find_graph_mut(&name) else { continue };
            let mut graph_changed = false;

            let value_ids: Vec<ValueId> = graph.values().collect();
            let op_ids: Vec<OperationId> = graph.operations().collect();
            if value_ids.is_empty() && op_ids.is_empty() {
                continue;
            }

            let value_slots = value_ids.iter().map(|v| v.index() + 1).max().unwrap_or(0);
            let op_slots = op_ids.iter().map(|o| o.index() + 1).max().unwrap_or(0);

            // Compact per-value state indexed by dense id.
            let mut is_port = vec![false; value_slots];
            let mut is_declared = vec![false; value_slots];
            let mut use_count = vec![0usize; value_slots];
            let mut def_op = vec![OperationId::invalid(); value_slots];

            for value in graph.input_ports().values().copied() {
                if value.index() < value_slots {
                    is_port[value.index()] = true;
                }
            }
            for value in graph.output_ports().values().copied() {
                if value.index() < value_slots {
                    is_port[value.index()] = true;
                }
            }
            for port in graph.inout_ports().values() {
                for value in [port.input, port.output, port.enable] {
                    if value.index() < value_slots {
                        is_port[value.index()] = true;
                    }
                }
            }
            if self.keep_declared {
                let declared: Vec<_> = graph.symbols().declared_symbols().collect();
                for sym in declared {
                    let value = graph.find_value(sym);
                    if value.is_valid() && value.index() < value_slots {
                        is_declared[value.index()] = true;
                    }
                }
            }

            let mut ops: Vec<OpInfo> = Vec::with_capacity(op_ids.len());
            let mut op_index_by_id = vec![usize::MAX; op_slots];
            for op_id in op_ids {
                let Some(op) = graph.operation(op_id) else { continue };
                let info = OpInfo {
                    id: op_id,
                    side_effect: op.kind().has_side_effect(),
                    operands: op.operands().to_vec(),
                    results: op.results().to_vec(),
                };
                for operand in &info.operands {
                    if operand.index() < value_slots {
                        use_count[operand.index()] += 1;
                    }
                }
                for result in &info.results {
                    if result.index() < value_slots {
                        def_op[result.index()] = op_id;
                    }
                }
                op_index_by_id[op_id.index()] = ops.len();
                ops.push(info);
            }

            let is_dead = |info: &OpInfo, use_count: &[usize]| -> bool {
                if info.side_effect || info.results.is_empty() {
                    return false;
                }
                info.results.iter().all(|r| {
                    r.index() < value_slots
                        && !is_port[r.index()]
                        && !is_declared[r.index()]
                        && use_count[r.index()] == 0
                })
            };

            let mut worklist: VecDeque<usize> = VecDeque::new();
            for (i, info) in ops.iter().enumerate() {
                if is_dead(info, &use_count) {
                    worklist.push_back(i);
                }
            }
            let mut removed = vec![false; ops.len()];

            while let Some(idx) = worklist.pop_front() {
                if removed[idx] {
                    continue;
                }
                // Re-check against current counts; they only decrease, but an
                // op queued twice must not be erased twice.
                if !is_dead(&ops[idx], &use_count) {
                    continue;
                }
                if graph.erase_op_unchecked(ops[idx].id).is_err() {
                    continue;
                }
                removed[idx] = true;
                graph_changed = true;

                for result in &ops[idx].results {
                    if result.index() < value_slots {
                        def_op[result.index()] = OperationId::invalid();
                    }
                }
                for operand in &ops[idx].operands {
                    if operand.index() >= value_slots {
                        continue;
                    }
                    if use_count[operand.index()] > 0 {
                        use_count[operand.index()] -= 1;
                    }
                    if use_count[operand.index()] != 0 {
                        continue;
                    }
                    let def = def_op[operand.index()];
                    if !def.is_valid() || def.index() >= op_slots {
                        continue;
                    }
                    let def_idx = op_index_by_id[def.index()];
                    if def_idx != usize::MAX {
                        worklist.push_back(def_idx);
                    }
                }
            }

            // Orphan sweep: values with no users, no driver, no port binding,
            // and no declared-symbol protection.
            let orphans: Vec<ValueId> = value_ids
                .iter()
                .copied()
                .filter(|v| {
                    v.index() < value_slots
                        && !is_port[v.index()]
                        && !is_declared[v.index()]
                        && use_count[v.index()] == 0
                        && !def_op[v.index()].is_valid()
                })
                .collect();
            for value in orphans {
                if graph.erase_value_unchecked(value).is_ok() {
                    graph_changed = true;
                }
            }

            result.changed = result.changed || graph_changed;
            if graph_changed {
                changed_graphs += 1;
            }
        }

        ctx.logger.debug(
            PASS_ID,
            &format!(
                "graphs={graph_count}, changedGraphs={changed_graphs}, changed={}",
                result.changed
            ),
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
    use crate::pass::{PassDiagnostics, PassManager};
    use crate::types::{AttributeValue, OperationKind, ValueType};

    fn run_dce(netlist: &mut Netlist) -> crate::pass::TransformResult {
        let mut manager = PassManager::new();
        manager.add_pass(Box::new(DeadCodeElimPass::new()));
        let mut diags = PassDiagnostics::new();
        manager.run(netlist, &mut diags, &Logger::new())
    }

    #[test]
    fn dead_chain_collapses_transitively() {
        let mut netlist = Netlist::new();
        let graph = netlist.create_graph("g").expect("graph");
        let a_sym = graph.intern("a");
        let b_sym = graph.intern("b");
        let c_sym = graph.intern("c");
        let a = graph.create_value(a_sym, 4, false, ValueType::Logic).expect("a");
        let b = graph.create_value(b_sym, 4, false, ValueType::Logic).expect("b");
        let c = graph.create_value(c_sym, 4, false, ValueType::Logic).expect("c");
        graph.bind_input_port("a", a).expect("port");

        let n0_sym = graph.intern("n0");
        let n0 = graph.create_operation(OperationKind::Not, n0_sym).expect("n0");
        graph.add_operand(n0, a).expect("operand");
        graph.add_result(n0, b).expect("result");

        let n1_sym = graph.intern("n1");
        let n1 = graph.create_operation(OperationKind::Not, n1_sym).expect("n1");
        graph.add_operand(n1, b).expect("operand");
        graph.add_result(n1, c).expect("result");

        let result = run_dce(&mut netlist);
        assert!(result.success);
        assert!(result.changed);

        let graph = netlist.find_graph("g").expect("graph");
        // n1 died first (c unused), which freed b and killed n0 as well.
        assert!(!graph.find_operation_named("n0").is_valid());
        assert!(!graph.find_operation_named("n1").is_valid());
        assert!(!graph.find_value_named("b").is_valid());
        assert!(!graph.find_value_named("c").is_valid());
        // The input port value stays.
        assert!(graph.find_value_named("a").is_valid());
        graph.validate().expect("invariants");
    }

    #[test]
    fn side_effecting_ops_survive_without_users() {
        let mut netlist = Netlist::new();
        let graph = netlist.create_graph("g").expect("graph");
        let r_sym = graph.intern("dpi_ret");
        let r = graph.create_value(r_sym, 32, false, ValueType::Logic).expect("r");
        let call_sym = graph.intern("dpi0");
        let call = graph
            .create_operation(OperationKind::DpicCall, call_sym)
            .expect("call");
        graph.add_result(call, r).expect("result");

        let result = run_dce(&mut netlist);
        assert!(!result.changed);
        let graph = netlist.find_graph("g").expect("graph");
        assert!(graph.find_operation_named("dpi0").is_valid());
    }

    #[test]
    fn declared_values_survive() {
        let mut netlist = Netlist::new();
        let graph = netlist.create_graph("g").expect("graph");
        let keep_sym = graph.intern("c_keep");
        let keep = graph
            .create_value(keep_sym, 1, false, ValueType::Logic)
            .expect("keep");
        graph.mark_declared(keep_sym);
        let op_sym = graph.intern("c_keep_op");
        let op = graph
            .create_operation(OperationKind::Constant, op_sym)
            .expect("op");
        graph.add_result(op, keep).expect("result");
        graph
            .set_attr(op, "constValue", AttributeValue::String("1'b0".to_string()))
            .expect("attr");

        let result = run_dce(&mut netlist);
        assert!(!result.changed);
        let graph = netlist.find_graph("g").expect("graph");
        assert!(graph.find_value_named("c_keep").is_valid());
        assert!(graph.find_operation_named("c_keep_op").is_valid());
    }

    #[test]
    fn orphan_values_are_swept() {
        let mut netlist = Netlist::new();
        let graph = netlist.create_graph("g").expect("graph");
        let orphan_sym = graph.intern("floating");
        graph
            .create_value(orphan_sym, 8, false, ValueType::Logic)
            .expect("orphan");

        let result = run_dce(&mut netlist);
        assert!(result.changed);
        let graph = netlist.find_graph("g").expect("graph");
        assert!(!graph.find_value_named("floating").is_valid());
    }
}
