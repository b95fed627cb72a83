//! # Serialization Formats
//!
//! Persistence for netlists: a deterministic JSON codec ([`json`]) and a
//! binary whole-file image ([`persistence`]). Both go through the same
//! plain-data mirror ([`NetlistDoc`]) so the two formats cannot drift, and
//! both re-establish every graph invariant on the way back in.

pub mod json;
pub mod persistence;

use crate::graph::Graph;
use crate::netlist::Netlist;
use crate::types::{AttributeValue, IrError, OperationId, OperationKind, SrcLoc, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// DOCUMENT MIRROR
// =============================================================================

/// One recorded use site: consuming op symbol and operand index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDoc {
    pub op: String,
    pub index: usize,
}

/// Serializable mirror of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDoc {
    pub sym: String,
    pub width: i64,
    pub signed: bool,
    pub ty: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_inout: bool,
    pub def: Option<String>,
    pub users: Vec<UserDoc>,
    pub src_loc: Option<SrcLoc>,
}

/// Serializable mirror of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDoc {
    pub sym: String,
    pub kind: String,
    pub operands: Vec<String>,
    pub results: Vec<String>,
    pub attrs: Vec<(String, AttributeValue)>,
    pub src_loc: Option<SrcLoc>,
}

/// Serializable mirror of a graph's port maps (names are lexicographic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PortsDoc {
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
    pub inouts: Vec<(String, [String; 3])>,
}

/// Serializable mirror of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDoc {
    pub name: String,
    pub vals: Vec<ValueDoc>,
    pub ports: PortsDoc,
    pub ops: Vec<OpDoc>,
    pub declared: Vec<String>,
}

/// Serializable mirror of a netlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetlistDoc {
    pub tops: Vec<String>,
    pub graphs: Vec<GraphDoc>,
}

// =============================================================================
// NETLIST -> DOCUMENT
// =============================================================================

fn graph_to_doc(graph: &Graph) -> GraphDoc {
    let op_position: BTreeMap<OperationId, usize> = graph
        .operations()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();

    let mut vals = Vec::new();
    for value_id in graph.values() {
        let Some(value) = graph.value(value_id) else { continue };
        let def = if value.defining_op().is_valid() {
            graph
                .operation(value.defining_op())
                .map(|op| graph.text(op.symbol()).to_string())
        } else {
            None
        };
        // Users in (op insertion position, operand index) order so a
        // rebuilt netlist emits identical bytes.
        let mut users: Vec<(usize, usize, String)> = value
            .users()
            .iter()
            .filter_map(|user| {
                let position = op_position.get(&user.operation)?;
                let sym = graph
                    .operation(user.operation)
                    .map(|op| graph.text(op.symbol()).to_string())?;
                Some((*position, user.operand_index, sym))
            })
            .collect();
        users.sort();
        vals.push(ValueDoc {
            sym: graph.text(value.symbol()).to_string(),
            width: value.width(),
            signed: value.is_signed(),
            ty: value.value_type().as_str().to_string(),
            is_input: value.is_input(),
            is_output: value.is_output(),
            is_inout: value.is_inout(),
            def,
            users: users
                .into_iter()
                .map(|(_, index, op)| UserDoc { op, index })
                .collect(),
            src_loc: value.src_loc().cloned(),
        });
    }

    let value_sym = |id| {
        graph
            .value(id)
            .map(|v| graph.text(v.symbol()).to_string())
            .unwrap_or_default()
    };

    let mut ops = Vec::new();
    for op_id in graph.operations() {
        let Some(op) = graph.operation(op_id) else { continue };
        ops.push(OpDoc {
            sym: graph.text(op.symbol()).to_string(),
            kind: op.kind().as_str().to_string(),
            operands: op.operands().iter().map(|v| value_sym(*v)).collect(),
            results: op.results().iter().map(|v| value_sym(*v)).collect(),
            attrs: op
                .attrs()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            src_loc: op.src_loc().cloned(),
        });
    }

    let ports = PortsDoc {
        inputs: graph
            .input_ports()
            .iter()
            .map(|(name, value)| (name.clone(), value_sym(*value)))
            .collect(),
        outputs: graph
            .output_ports()
            .iter()
            .map(|(name, value)| (name.clone(), value_sym(*value)))
            .collect(),
        inouts: graph
            .inout_ports()
            .iter()
            .map(|(name, port)| {
                (
                    name.clone(),
                    [
                        value_sym(port.input),
                        value_sym(port.output),
                        value_sym(port.enable),
                    ],
                )
            })
            .collect(),
    };

    let declared = graph
        .symbols()
        .declared_symbols()
        .map(|sym| graph.text(sym).to_string())
        .collect();

    GraphDoc {
        name: graph.symbol().to_string(),
        vals,
        ports,
        ops,
        declared,
    }
}

/// Mirror a netlist into its serializable document form.
#[must_use]
pub fn netlist_to_doc(netlist: &Netlist) -> NetlistDoc {
    NetlistDoc {
        tops: netlist.top_graphs().to_vec(),
        graphs: netlist.graphs().map(graph_to_doc).collect(),
    }
}

// =============================================================================
// DOCUMENT -> NETLIST
// =============================================================================

fn bad(message: String) -> IrError {
    IrError::Json(message)
}

fn assemble_graph(netlist: &mut Netlist, doc: &GraphDoc) -> Result<(), IrError> {
    netlist.create_graph(&doc.name)?;
    let graph = netlist
        .find_graph_mut(&doc.name)
        .ok_or_else(|| bad(format!("graph '{}' vanished during assembly", doc.name)))?;

    for val in &doc.vals {
        let ty = ValueType::parse(&val.ty)
            .ok_or_else(|| bad(format!("unknown value type '{}'", val.ty)))?;
        let sym = graph.intern(&val.sym);
        graph.create_value(sym, val.width, val.signed, ty)?;
        if let Some(loc) = &val.src_loc {
            let id = graph.find_value(sym);
            graph.set_value_src_loc(id, loc.clone())?;
        }
    }

    for op_doc in &doc.ops {
        let kind = OperationKind::parse(&op_doc.kind)
            .ok_or_else(|| bad(format!("unknown operation kind '{}'", op_doc.kind)))?;
        let sym = graph.intern(&op_doc.sym);
        let op = graph.create_operation(kind, sym)?;
        for operand in &op_doc.operands {
            let value = graph.find_value_named(operand);
            if !value.is_valid() {
                return Err(bad(format!(
                    "operation '{}' references unknown value '{operand}'",
                    op_doc.sym
                )));
            }
            graph.add_operand(op, value)?;
        }
        for result in &op_doc.results {
            let value = graph.find_value_named(result);
            if !value.is_valid() {
                return Err(bad(format!(
                    "operation '{}' references unknown value '{result}'",
                    op_doc.sym
                )));
            }
            graph.add_result(op, value)?;
        }
        for (key, value) in &op_doc.attrs {
            graph.set_attr(op, key, value.clone())?;
        }
        if let Some(loc) = &op_doc.src_loc {
            graph.set_op_src_loc(op, loc.clone())?;
        }
    }

    for (name, sym) in &doc.ports.inputs {
        let value = graph.find_value_named(sym);
        if !value.is_valid() {
            return Err(bad(format!("input port '{name}' references unknown value")));
        }
        graph.bind_input_port(name, value)?;
    }
    for (name, sym) in &doc.ports.outputs {
        let value = graph.find_value_named(sym);
        if !value.is_valid() {
            return Err(bad(format!("output port '{name}' references unknown value")));
        }
        graph.bind_output_port(name, value)?;
    }
    for (name, syms) in &doc.ports.inouts {
        let triple: Vec<_> = syms.iter().map(|s| graph.find_value_named(s)).collect();
        if triple.iter().any(|v| !v.is_valid()) {
            return Err(bad(format!("inout port '{name}' references unknown value")));
        }
        graph.bind_inout_port(name, triple[0], triple[1], triple[2])?;
    }

    for name in &doc.declared {
        let sym = graph.intern(name);
        graph.mark_declared(sym);
    }

    // Role flags and def/use edges in the document must agree with what the
    // rebuild derived; a document claiming an unbound input is malformed.
    for val in &doc.vals {
        let id = graph.find_value_named(&val.sym);
        let value = graph
            .value(id)
            .ok_or_else(|| bad(format!("value '{}' vanished during assembly", val.sym)))?;
        if value.is_input() != val.is_input
            || value.is_output() != val.is_output
            || value.is_inout() != val.is_inout
        {
            return Err(bad(format!(
                "value '{}' declares port roles that do not match its bindings",
                val.sym
            )));
        }
        let rebuilt_def = if value.defining_op().is_valid() {
            graph
                .operation(value.defining_op())
                .map(|op| graph.text(op.symbol()).to_string())
        } else {
            None
        };
        if rebuilt_def != val.def {
            return Err(bad(format!(
                "value '{}' declares a def that does not match its driver",
                val.sym
            )));
        }
        let mut declared_users: Vec<(String, usize)> = val
            .users
            .iter()
            .map(|u| (u.op.clone(), u.index))
            .collect();
        declared_users.sort();
        let mut rebuilt_users: Vec<(String, usize)> = value
            .users()
            .iter()
            .filter_map(|u| {
                graph
                    .operation(u.operation)
                    .map(|op| (graph.text(op.symbol()).to_string(), u.operand_index))
            })
            .collect();
        rebuilt_users.sort();
        if declared_users != rebuilt_users {
            return Err(bad(format!(
                "value '{}' declares users that do not match its edges",
                val.sym
            )));
        }
    }

    graph.validate()
}

/// Rebuild a netlist from its document form, re-establishing and checking
/// every invariant.
pub fn doc_to_netlist(doc: &NetlistDoc) -> Result<Netlist, IrError> {
    let mut netlist = Netlist::new();
    for graph in &doc.graphs {
        assemble_graph(&mut netlist, graph)?;
    }
    for top in &doc.tops {
        netlist.mark_as_top(top)?;
    }
    Ok(netlist)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_round_trip_preserves_structure() {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("demo").expect("graph");
            let a_sym = graph.intern("a");
            let out_sym = graph.intern("out");
            let a = graph.create_value(a_sym, 8, false, ValueType::Logic).expect("a");
            let out = graph.create_value(out_sym, 8, false, ValueType::Logic).expect("out");
            graph.bind_input_port("a", a).expect("port");
            graph.bind_output_port("out", out).expect("port");
            let op_sym = graph.intern("assign0");
            let op = graph
                .create_operation(OperationKind::Assign, op_sym)
                .expect("op");
            graph.add_operand(op, a).expect("operand");
            graph.add_result(op, out).expect("result");
            graph.mark_declared(a_sym);
        }
        netlist.mark_as_top("demo").expect("top");

        let doc = netlist_to_doc(&netlist);
        let rebuilt = doc_to_netlist(&doc).expect("rebuild");
        assert_eq!(netlist_to_doc(&rebuilt), doc);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut doc = netlist_to_doc(&Netlist::new());
        doc.graphs.push(GraphDoc {
            name: "g".to_string(),
            vals: Vec::new(),
            ports: PortsDoc::default(),
            ops: vec![OpDoc {
                sym: "op0".to_string(),
                kind: "teleport".to_string(),
                operands: Vec::new(),
                results: Vec::new(),
                attrs: Vec::new(),
                src_loc: None,
            }],
            declared: Vec::new(),
        });
        assert!(doc_to_netlist(&doc).is_err());
    }

    #[test]
    fn unbound_input_flag_is_rejected() {
        let mut doc = netlist_to_doc(&Netlist::new());
        doc.graphs.push(GraphDoc {
            name: "g".to_string(),
            vals: vec![ValueDoc {
                sym: "a".to_string(),
                width: 1,
                signed: false,
                ty: "logic".to_string(),
                is_input: true,
                is_output: false,
                is_inout: false,
                def: None,
                users: Vec::new(),
                src_loc: None,
            }],
            ports: PortsDoc::default(),
            ops: Vec::new(),
            declared: Vec::new(),
        });
        assert!(doc_to_netlist(&doc).is_err());
    }
}
