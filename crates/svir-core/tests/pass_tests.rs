//! End-to-end pass pipeline scenarios.
//!
//! Each test builds a netlist through the public graph API, runs a pipeline,
//! and checks both the rewritten structure and the graph invariants.

use std::cell::RefCell;
use std::rc::Rc;
use svir_core::{
    AttributeValue, ConstantFoldPass, DeadCodeElimPass, Graph, LogLevel, Logger, Netlist,
    OperationId, OperationKind, PassDiagnostics, PassManager, ValueId, ValueType, XmrResolvePass,
};

// =============================================================================
// HELPERS
// =============================================================================

fn make_value(graph: &mut Graph, name: &str, width: i64) -> ValueId {
    let sym = graph.intern(name);
    graph
        .create_value(sym, width, false, ValueType::Logic)
        .expect("create value")
}

fn make_const(graph: &mut Graph, value_name: &str, op_name: &str, width: i64, literal: &str) -> ValueId {
    let value = make_value(graph, value_name, width);
    let sym = graph.intern(op_name);
    let op = graph
        .create_operation(OperationKind::Constant, sym)
        .expect("create op");
    graph.add_result(op, value).expect("result");
    graph
        .set_attr(op, "constValue", AttributeValue::String(literal.to_string()))
        .expect("attr");
    value
}

fn make_op(
    graph: &mut Graph,
    kind: OperationKind,
    name: &str,
    operands: &[ValueId],
    results: &[ValueId],
) -> OperationId {
    let sym = graph.intern(name);
    let op = graph.create_operation(kind, sym).expect("create op");
    for operand in operands {
        graph.add_operand(op, *operand).expect("operand");
    }
    for result in results {
        graph.add_result(op, *result).expect("result");
    }
    op
}

fn run_pipeline(
    netlist: &mut Netlist,
    passes: Vec<Box<dyn svir_core::Pass>>,
) -> (svir_core::TransformResult, PassDiagnostics) {
    let mut manager = PassManager::new();
    for pass in passes {
        manager.add_pass(pass);
    }
    let mut diags = PassDiagnostics::new();
    let result = manager.run(netlist, &mut diags, &Logger::new());
    (result, diags)
}

fn const_literal(graph: &Graph, value: ValueId) -> Option<String> {
    let def = graph.value(value)?.defining_op();
    let op = graph.operation(def)?;
    if op.kind() != OperationKind::Constant {
        return None;
    }
    op.attr_string("constValue").map(str::to_string)
}

// =============================================================================
// CONSTANT FOLDING SCENARIOS
// =============================================================================

#[test]
fn fold_chain_collapses_to_one_constant() {
    let mut netlist = Netlist::new();
    {
        let graph = netlist.create_graph("g").expect("graph");
        let c0 = make_const(graph, "c0", "c0_op", 4, "4'h3");
        let c1 = make_const(graph, "c1", "c1_op", 4, "4'h1");

        let sum = make_value(graph, "sum", 4);
        make_op(graph, OperationKind::Add, "add0", &[c0, c1], &[sum]);

        let pass = make_value(graph, "pass", 4);
        make_op(graph, OperationKind::Assign, "assign0", &[sum], &[pass]);

        let neg = make_value(graph, "neg", 4);
        make_op(graph, OperationKind::Not, "not0", &[pass], &[neg]);

        let final_sum = make_value(graph, "finalSum", 4);
        make_op(graph, OperationKind::Add, "add1", &[neg, c1], &[final_sum]);

        let out = make_value(graph, "out", 4);
        graph.bind_output_port("out", out).expect("port");
        make_op(graph, OperationKind::Assign, "assign1", &[final_sum], &[out]);
    }

    let (result, diags) = run_pipeline(&mut netlist, vec![Box::new(ConstantFoldPass::new())]);
    assert!(result.success, "{:?}", diags.messages());
    assert!(result.changed);

    let graph = netlist.find_graph("g").expect("graph");
    for erased in ["add0", "assign0", "not0", "add1", "assign1"] {
        assert!(
            !graph.find_operation_named(erased).is_valid(),
            "{erased} should be erased"
        );
    }
    let out_val = graph.output_port_value("out");
    assert!(out_val.is_valid());
    assert_eq!(const_literal(graph, out_val).as_deref(), Some("4'hc"));
    // Every intermediate value lost its users.
    let neg = graph.find_value_named("neg");
    if neg.is_valid() {
        assert!(graph.value(neg).expect("neg").users().is_empty());
    }
    graph.validate().expect("invariants");
}

#[test]
fn x_operand_blocks_folding_by_default() {
    let mut netlist = Netlist::new();
    let (and_op, cx, c1) = {
        let graph = netlist.create_graph("g2").expect("graph");
        let cx = make_const(graph, "cx", "cx_op", 1, "1'bx");
        let c1 = make_const(graph, "c1", "c1_op", 1, "1'b1");
        let and_out = make_value(graph, "andOut", 1);
        let op = make_op(graph, OperationKind::And, "and0", &[cx, c1], &[and_out]);
        (op, cx, c1)
    };

    let (result, diags) = run_pipeline(&mut netlist, vec![Box::new(ConstantFoldPass::new())]);
    assert!(result.success, "{:?}", diags.messages());
    assert!(!result.changed, "X operand must block the fold");

    let graph = netlist.find_graph("g2").expect("graph");
    let op = graph.operation(and_op).expect("and op survives");
    assert_eq!(op.operands(), &[cx, c1]);
    graph.validate().expect("invariants");
}

#[test]
fn port_bound_duplicate_constants_deduplicate_through_pool() {
    // Two identical constants, neither port-bound, each with one consumer.
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink_log = Rc::clone(&log);
    let logger = Logger::with_sink(
        LogLevel::Debug,
        Box::new(move |event| sink_log.borrow_mut().push(event.message.clone())),
    );

    let mut netlist = Netlist::new();
    {
        let graph = netlist.create_graph("g").expect("graph");
        let first = make_const(graph, "five_a", "five_a_op", 4, "4'h5");
        let second = make_const(graph, "five_b", "five_b_op", 4, "4'h5");
        let out_a = make_value(graph, "out_a", 4);
        let out_b = make_value(graph, "out_b", 4);
        graph.bind_output_port("out_a", out_a).expect("port");
        graph.bind_output_port("out_b", out_b).expect("port");
        make_op(graph, OperationKind::Assign, "assign_a", &[first], &[out_a]);
        make_op(graph, OperationKind::Assign, "assign_b", &[second], &[out_b]);
    }

    let mut manager = PassManager::new();
    manager.add_pass(Box::new(ConstantFoldPass::new()));
    let mut diags = PassDiagnostics::new();
    let result = manager.run(&mut netlist, &mut diags, &logger);
    assert!(result.success, "{:?}", diags.messages());
    assert!(result.changed);

    let graph = netlist.find_graph("g").expect("graph");
    let survivors: Vec<_> = graph
        .operations()
        .filter(|id| {
            graph
                .operation(*id)
                .is_some_and(|op| op.kind() == OperationKind::Constant)
        })
        .collect();
    assert_eq!(survivors.len(), 1, "exactly one pooled constant remains");
    // Both output ports resolve to the same constant literal.
    let out_a = graph.output_port_value("out_a");
    let out_b = graph.output_port_value("out_b");
    assert_eq!(const_literal(graph, out_a).as_deref(), Some("4'h5"));
    assert_eq!(const_literal(graph, out_b).as_deref(), Some("4'h5"));
    // The statistics line records the dedupe.
    let stats = log.borrow();
    assert!(
        stats.iter().any(|line| line.contains("dedupedConsts=1")),
        "stats: {stats:?}"
    );
    graph.validate().expect("invariants");
}

// =============================================================================
// DEAD-CODE ELIMINATION SCENARIO
// =============================================================================

#[test]
fn dce_respects_declared_symbols_and_ports() {
    let mut netlist = Netlist::new();
    {
        let graph = netlist.create_graph("g").expect("graph");
        let c_live = make_const(graph, "c_live", "c_live_op", 1, "1'b1");
        let c_dead = make_const(graph, "c_dead", "c_dead_op", 1, "1'b0");
        make_const(graph, "c_keep", "c_keep_op", 1, "1'b0");
        let keep_sym = graph.symbols().lookup("c_keep");
        graph.mark_declared(keep_sym);

        let dead_tmp = make_value(graph, "dead_tmp", 1);
        make_op(graph, OperationKind::Not, "not_dead", &[c_dead], &[dead_tmp]);

        let out = make_value(graph, "out", 1);
        graph.bind_output_port("out", out).expect("port");
        make_op(graph, OperationKind::Assign, "assign_out", &[c_live], &[out]);
    }

    let (result, diags) = run_pipeline(&mut netlist, vec![Box::new(DeadCodeElimPass::new())]);
    assert!(result.success, "{:?}", diags.messages());
    assert!(result.changed);

    let graph = netlist.find_graph("g").expect("graph");
    assert!(!graph.find_operation_named("not_dead").is_valid());
    assert!(!graph.find_operation_named("c_dead_op").is_valid());
    assert!(!graph.find_value_named("dead_tmp").is_valid());
    assert!(!graph.find_value_named("c_dead").is_valid());

    assert!(graph.find_operation_named("c_keep_op").is_valid());
    assert!(graph.find_value_named("c_keep").is_valid());
    assert!(graph.find_operation_named("assign_out").is_valid());
    assert!(graph.find_value_named("c_live").is_valid());
    assert!(graph.output_port_value("out").is_valid());
    graph.validate().expect("invariants");
}

// =============================================================================
// XMR RESOLUTION SCENARIO
// =============================================================================

#[test]
fn xmr_read_through_one_hop_manufactures_ports() {
    let mut netlist = Netlist::new();
    {
        let child = netlist.create_graph("child").expect("child");
        make_value(child, "leaf_r", 8);
    }
    {
        let top = netlist.create_graph("top").expect("top");
        let inst_sym = top.intern("u_child_inst");
        let inst = top
            .create_operation(OperationKind::Instance, inst_sym)
            .expect("inst");
        top.set_attr(inst, "moduleName", AttributeValue::String("child".to_string()))
            .expect("attr");
        top.set_attr(inst, "instanceName", AttributeValue::String("u_child".to_string()))
            .expect("attr");
        top.set_attr(inst, "inputPortName", AttributeValue::StringArray(Vec::new()))
            .expect("attr");
        top.set_attr(inst, "outputPortName", AttributeValue::StringArray(Vec::new()))
            .expect("attr");
        top.set_attr(inst, "inoutPortName", AttributeValue::StringArray(Vec::new()))
            .expect("attr");

        let read_out = make_value(top, "read_out", 8);
        let xmr_sym = top.intern("xmr_read0");
        let xmr = top
            .create_operation(OperationKind::XmrRead, xmr_sym)
            .expect("xmr");
        top.add_result(xmr, read_out).expect("result");
        top.set_attr(xmr, "xmrPath", AttributeValue::String("u_child.leaf_r".to_string()))
            .expect("attr");

        let sink = make_value(top, "sink", 8);
        top.bind_output_port("sink", sink).expect("port");
        make_op(top, OperationKind::Assign, "assign_sink", &[read_out], &[sink]);
    }
    netlist.mark_as_top("top").expect("top");

    let (result, diags) = run_pipeline(&mut netlist, vec![Box::new(XmrResolvePass::new())]);
    assert!(result.success, "{:?}", diags.messages());
    assert!(result.changed);

    // The child gained the derived output port bound to leaf_r.
    let child = netlist.find_graph("child").expect("child");
    let port_value = child.output_port_value("__xmr_r_u_child_leaf_r");
    assert!(port_value.is_valid(), "manufactured port missing");
    assert_eq!(port_value, child.find_value_named("leaf_r"));

    // The top's instance op gained a matching result, the XMR op is gone,
    // and its former user now consumes the instance result.
    let top = netlist.find_graph("top").expect("top");
    assert!(!top.find_operation_named("xmr_read0").is_valid());
    let inst = top.find_operation_named("u_child_inst");
    let inst_op = top.operation(inst).expect("inst");
    assert_eq!(
        inst_op.attr_string_array("outputPortName"),
        Some(&["__xmr_r_u_child_leaf_r".to_string()][..])
    );
    assert_eq!(inst_op.results().len(), 1);
    let assign = top.find_operation_named("assign_sink");
    assert_eq!(
        top.operation(assign).expect("assign").operands(),
        inst_op.results()
    );
    top.validate().expect("top invariants");
    child.validate().expect("child invariants");
}

// =============================================================================
// FULL PIPELINE
// =============================================================================

#[test]
fn default_pipeline_runs_clean_on_folded_netlist() {
    let mut netlist = Netlist::new();
    {
        let graph = netlist.create_graph("g").expect("graph");
        let c0 = make_const(graph, "c0", "c0_op", 8, "8'h10");
        let c1 = make_const(graph, "c1", "c1_op", 8, "8'h0c");
        let diff = make_value(graph, "diff", 8);
        make_op(graph, OperationKind::Sub, "sub0", &[c0, c1], &[diff]);
        let out = make_value(graph, "out", 8);
        graph.bind_output_port("out", out).expect("port");
        make_op(graph, OperationKind::Assign, "assign0", &[diff], &[out]);
        // A dangling net for DCE to sweep.
        make_value(graph, "floating", 8);
    }

    let (result, diags) = run_pipeline(
        &mut netlist,
        vec![
            Box::new(ConstantFoldPass::new()),
            Box::new(svir_core::RedundantElimPass::new()),
            Box::new(DeadCodeElimPass::new()),
        ],
    );
    assert!(result.success, "{:?}", diags.messages());
    assert!(result.changed);

    let graph = netlist.find_graph("g").expect("graph");
    let out_val = graph.output_port_value("out");
    assert_eq!(const_literal(graph, out_val).as_deref(), Some("8'h4"));
    assert!(!graph.find_value_named("floating").is_valid());
    graph.validate().expect("invariants");
}
