//! # Redundant Elimination
//!
//! Residual cleanups that constant folding leaves behind. Runs after
//! `const-fold` in the default pipeline and repeats until a fixpoint:
//!
//! - `Assign` of a pooled constant into an output-port value is inlined
//!   (the constant drives the port value directly, cloning the constant op
//!   when it has other users),
//! - single-operand `Concat` over a temporary collapses to its operand,
//! - `Not` over a single-use temporary `Xor` retags the `Xor` as `Xnor`
//!   and gives it the `Not`'s result.
//!
//! Temporaries are values under internal (`_`-prefixed) symbols; named nets
//! are left in place for the emitters.

use crate::graph::Graph;
use crate::pass::{Pass, PassContext, PassDiagnostics, PassResult};
use crate::types::{AttributeValue, OperationId, OperationKind, SrcLoc, ValueId};

/// The redundant elimination pass.
#[derive(Debug, Default)]
pub struct RedundantElimPass;

impl RedundantElimPass {
    /// Create the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

const PASS_ID: &str = "redundant-elim";

fn is_temporary(graph: &Graph, value: ValueId) -> bool {
    graph
        .value(value)
        .map(|v| graph.text(v.symbol()))
        .is_some_and(|text| text.starts_with('_'))
}

fn single_user_is(graph: &Graph, value: ValueId, op: OperationId) -> bool {
    graph
        .value(value)
        .map(|v| v.users())
        .is_some_and(|users| users.len() == 1 && users[0].operation == op)
}

#[derive(Default)]
struct GraphStats {
    ops_removed: usize,
    values_removed: usize,
    changed: bool,
}

/// Inline `Assign(const) -> output value` so the constant drives the port
/// value directly.
fn inline_const_assign(
    graph: &mut Graph,
    stats: &mut GraphStats,
    diags: &mut PassDiagnostics,
    op_id: OperationId,
) -> bool {
    let (src, dst) = {
        let Some(op) = graph.operation(op_id) else { return false };
        if op.kind() != OperationKind::Assign
            || op.operands().len() != 1
            || op.results().len() != 1
        {
            return false;
        }
        (op.operands()[0], op.results()[0])
    };
    let Some(dst_value) = graph.value(dst) else { return false };
    if !dst_value.is_output() || !dst_value.users().is_empty() {
        return false;
    }
    let Some(src_value) = graph.value(src) else { return false };
    let const_op = src_value.defining_op();
    if !const_op.is_valid() {
        return false;
    }
    let literal = {
        let Some(def) = graph.operation(const_op) else { return false };
        if def.kind() != OperationKind::Constant || def.results().len() != 1 {
            return false;
        }
        let Some(text) = def.attr_string("constValue") else { return false };
        text.to_string()
    };

    if graph.erase_op_unchecked(op_id).is_err() {
        return false;
    }
    stats.ops_removed += 1;

    let src_is_output = graph.value(src).is_some_and(|v| v.is_output());
    if !src_is_output && graph.value(src).is_some_and(|v| v.users().is_empty()) {
        // Sole consumer was the assign: move the constant onto the port value.
        if graph.replace_result(const_op, 0, dst).is_ok() {
            if graph.erase_value(src).is_ok() {
                stats.values_removed += 1;
            }
            stats.changed = true;
            return true;
        }
    }

    // Shared constant: clone a fresh constant op for the port value.
    let op_sym = graph.make_internal_op_sym();
    let cloned = match graph.create_operation(OperationKind::Constant, op_sym) {
        Ok(op) => op,
        Err(e) => {
            diags.error(PASS_ID, e.to_string(), format!("graph '{}'", graph.symbol()));
            return false;
        }
    };
    let _ = graph.set_op_src_loc(cloned, SrcLoc::synthetic(PASS_ID, "clone_const"));
    if let Err(e) = graph.add_result(cloned, dst) {
        diags.error(PASS_ID, e.to_string(), format!("graph '{}'", graph.symbol()));
        return false;
    }
    let _ = graph.set_attr(cloned, "constValue", AttributeValue::String(literal));
    stats.changed = true;
    true
}

/// Collapse a single-operand `Concat` over a temporary result.
fn collapse_trivial_concat(graph: &mut Graph, stats: &mut GraphStats, op_id: OperationId) -> bool {
    let (operand, result) = {
        let Some(op) = graph.operation(op_id) else { return false };
        if op.kind() != OperationKind::Concat
            || op.operands().len() != 1
            || op.results().len() != 1
        {
            return false;
        }
        (op.operands()[0], op.results()[0])
    };
    if !is_temporary(graph, result) {
        return false;
    }
    let shapes_match = match (graph.value(operand), graph.value(result)) {
        (Some(o), Some(r)) => o.width() == r.width() && o.is_signed() == r.is_signed(),
        _ => false,
    };
    if !shapes_match {
        return false;
    }
    if graph.replace_all_uses(result, operand).is_err() {
        return false;
    }
    if graph.erase_op(op_id).is_err() {
        return false;
    }
    stats.ops_removed += 1;
    if graph.erase_value(result).is_ok() {
        stats.values_removed += 1;
    }
    stats.changed = true;
    true
}

/// Retag `Not(Xor(..))` over a single-use temporary as `Xnor`.
fn fold_not_of_xor(
    graph: &mut Graph,
    stats: &mut GraphStats,
    diags: &mut PassDiagnostics,
    op_id: OperationId,
) -> bool {
    let (operand, result) = {
        let Some(op) = graph.operation(op_id) else { return false };
        if op.kind() != OperationKind::Not || op.operands().len() != 1 || op.results().len() != 1 {
            return false;
        }
        (op.operands()[0], op.results()[0])
    };
    if !is_temporary(graph, operand) || !single_user_is(graph, operand, op_id) {
        return false;
    }
    let def_op = match graph.value(operand) {
        Some(v) => v.defining_op(),
        None => return false,
    };
    if !def_op.is_valid() {
        return false;
    }
    let def_index = {
        let Some(def) = graph.operation(def_op) else { return false };
        if def.kind() != OperationKind::Xor {
            return false;
        }
        let Some(index) = def.results().iter().position(|r| *r == operand) else {
            return false;
        };
        index
    };

    // Detach the NOT first so its result is free to take the XOR's slot.
    if graph.erase_op_unchecked(op_id).is_err() {
        return false;
    }
    stats.ops_removed += 1;
    if graph.set_operation_kind(def_op, OperationKind::Xnor).is_err() {
        return false;
    }
    if let Err(e) = graph.replace_result(def_op, def_index, result) {
        diags.error(
            PASS_ID,
            format!("failed to fold NOT/XOR: {e}"),
            format!("graph '{}'", graph.symbol()),
        );
        return false;
    }
    if graph.erase_value(operand).is_ok() {
        stats.values_removed += 1;
    }
    stats.changed = true;
    true
}

impl Pass for RedundantElimPass {
    fn id(&self) -> &str {
        PASS_ID
    }

    fn description(&self) -> &str {
        "Inline trivial assigns and eliminate redundant temps"
    }

    fn run(&mut self, ctx: &mut PassContext<'_>) -> PassResult {
        let mut result = PassResult::default();
        let graph_count = ctx.netlist.graph_count();
        ctx.logger.debug(PASS_ID, &format!("begin graphs={graph_count}"));
        let mut changed_graphs = 0usize;
        let mut ops_removed = 0usize;
        let mut values_removed = 0usize;

        let names: Vec<String> = ctx.netlist.graph_order().to_vec();
        for name in names {
            let Some(graph) = ctx.netlist.find_graph_mut(&name) else { continue };
            let mut stats = GraphStats::default();
            let mut progress = true;
            while progress {
                progress = false;
                let ops: Vec<OperationId> = graph.operations().collect();
                for op_id in ops {
                    if inline_const_assign(graph, &mut stats, ctx.diags, op_id)
                        || collapse_trivial_concat(graph, &mut stats, op_id)
                        || fold_not_of_xor(graph, &mut stats, ctx.diags, op_id)
                    {
                        progress = true;
                    }
                }
            }
            result.changed = result.changed || stats.changed;
            if stats.changed {
                changed_graphs += 1;
            }
            ops_removed += stats.ops_removed;
            values_removed += stats.values_removed;
        }

        ctx.logger.debug(
            PASS_ID,
            &format!(
                "graphs={graph_count}, changedGraphs={changed_graphs}, changed={}, opsRemoved={ops_removed}, valuesRemoved={values_removed}",
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
    use crate::pass::PassManager;
    use crate::types::ValueType;

    fn run_pass(netlist: &mut Netlist) -> crate::pass::TransformResult {
        let mut manager = PassManager::new();
        manager.add_pass(Box::new(RedundantElimPass::new()));
        let mut diags = PassDiagnostics::new();
        manager.run(netlist, &mut diags, &Logger::new())
    }

    #[test]
    fn const_assign_to_output_is_inlined() {
        let mut netlist = Netlist::new();
        let graph = netlist.create_graph("g").expect("graph");
        let c_sym = graph.intern("_val_0");
        let c = graph.create_value(c_sym, 4, false, ValueType::Logic).expect("c");
        let const_sym = graph.intern("_op_0");
        let const_op = graph
            .create_operation(OperationKind::Constant, const_sym)
            .expect("const");
        graph.add_result(const_op, c).expect("result");
        graph
            .set_attr(const_op, "constValue", AttributeValue::String("4'h7".to_string()))
            .expect("attr");

        let out_sym = graph.intern("out");
        let out = graph.create_value(out_sym, 4, false, ValueType::Logic).expect("out");
        graph.bind_output_port("out", out).expect("port");
        let assign_sym = graph.intern("assign0");
        let assign = graph
            .create_operation(OperationKind::Assign, assign_sym)
            .expect("assign");
        graph.add_operand(assign, c).expect("operand");
        graph.add_result(assign, out).expect("result");

        let result = run_pass(&mut netlist);
        assert!(result.success);
        assert!(result.changed);

        let graph = netlist.find_graph("g").expect("graph");
        assert!(!graph.find_operation_named("assign0").is_valid());
        let out = graph.output_port_value("out");
        let def = graph.value(out).expect("out").defining_op();
        assert_eq!(
            graph.operation(def).expect("def").kind(),
            OperationKind::Constant
        );
        graph.validate().expect("invariants");
    }

    #[test]
    fn trivial_concat_collapses() {
        let mut netlist = Netlist::new();
        let graph = netlist.create_graph("g").expect("graph");
        let a_sym = graph.intern("a");
        let a = graph.create_value(a_sym, 8, false, ValueType::Logic).expect("a");
        graph.bind_input_port("a", a).expect("port");
        let tmp_sym = graph.intern("_val_9");
        let tmp = graph.create_value(tmp_sym, 8, false, ValueType::Logic).expect("tmp");
        let cat_sym = graph.intern("cat0");
        let cat = graph
            .create_operation(OperationKind::Concat, cat_sym)
            .expect("cat");
        graph.add_operand(cat, a).expect("operand");
        graph.add_result(cat, tmp).expect("result");

        let sink_sym = graph.intern("sink");
        let sink = graph.create_value(sink_sym, 8, false, ValueType::Logic).expect("sink");
        graph.bind_output_port("sink", sink).expect("port");
        let assign_sym = graph.intern("assign0");
        let assign = graph
            .create_operation(OperationKind::Assign, assign_sym)
            .expect("assign");
        graph.add_operand(assign, tmp).expect("operand");
        graph.add_result(assign, sink).expect("result");

        let result = run_pass(&mut netlist);
        assert!(result.changed);

        let graph = netlist.find_graph("g").expect("graph");
        assert!(!graph.find_operation_named("cat0").is_valid());
        let assign = graph.find_operation_named("assign0");
        assert_eq!(graph.operation(assign).expect("assign").operands(), &[a]);
        graph.validate().expect("invariants");
    }

    #[test]
    fn not_of_xor_becomes_xnor() {
        let mut netlist = Netlist::new();
        let graph = netlist.create_graph("g").expect("graph");
        let a_sym = graph.intern("a");
        let b_sym = graph.intern("b");
        let a = graph.create_value(a_sym, 4, false, ValueType::Logic).expect("a");
        let b = graph.create_value(b_sym, 4, false, ValueType::Logic).expect("b");
        graph.bind_input_port("a", a).expect("port");
        graph.bind_input_port("b", b).expect("port");

        let tmp_sym = graph.intern("_val_3");
        let tmp = graph.create_value(tmp_sym, 4, false, ValueType::Logic).expect("tmp");
        let xor_sym = graph.intern("xor0");
        let xor = graph.create_operation(OperationKind::Xor, xor_sym).expect("xor");
        graph.add_operand(xor, a).expect("operand");
        graph.add_operand(xor, b).expect("operand");
        graph.add_result(xor, tmp).expect("result");

        let named_sym = graph.intern("match_n");
        let named = graph.create_value(named_sym, 4, false, ValueType::Logic).expect("named");
        graph.bind_output_port("match_n", named).expect("port");
        let not_sym = graph.intern("not0");
        let not = graph.create_operation(OperationKind::Not, not_sym).expect("not");
        graph.add_operand(not, tmp).expect("operand");
        graph.add_result(not, named).expect("result");

        let result = run_pass(&mut netlist);
        assert!(result.changed);

        let graph = netlist.find_graph("g").expect("graph");
        assert!(!graph.find_operation_named("not0").is_valid());
        assert!(!graph.find_value_named("_val_3").is_valid());
        let xor = graph.find_operation_named("xor0");
        let op = graph.operation(xor).expect("op");
        assert_eq!(op.kind(), OperationKind::Xnor);
        assert_eq!(op.results(), &[named]);
        assert_eq!(
            graph.value(named).expect("named").defining_op(),
            xor
        );
        graph.validate().expect("invariants");
    }
}
