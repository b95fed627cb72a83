//! # JSON Codec
//!
//! Deterministic writer and strict parser for the netlist wire format.
//!
//! A graph serializes with compact keys (`name`, `vals`, `ports`, `ops`,
//! `declared`); attributes render as `{"k": <tag>, "v"|"vs": ...}` with the
//! kind tags `bool|int|double|string|bool[]|int[]|double[]|string[]`.
//! Values and operations appear in insertion order, port and attribute maps
//! in lexicographic key order, so two emits of the same netlist compare
//! equal byte for byte.
//!
//! The parser accepts exactly this schema and re-establishes every invariant
//! after construction: nested containers inside attributes, unknown kind
//! tags, dangling operand/result references, unbound role flags, and
//! non-finite doubles are all rejected.

use crate::formats::{
    GraphDoc, NetlistDoc, OpDoc, PortsDoc, UserDoc, ValueDoc, doc_to_netlist, netlist_to_doc,
};
use crate::netlist::Netlist;
use crate::types::{AttributeValue, IrError, SrcLoc};
use serde_json::Value as JsonValue;

/// Output layout of [`emit_netlist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonPrintMode {
    /// No whitespace at all.
    Compact,
    /// Indented top-level structure, inline leaf objects.
    #[default]
    PrettyCompact,
    /// Fully indented.
    Pretty,
}

// =============================================================================
// WRITER
// =============================================================================

/// Ordered JSON tree; objects keep the order their keys were pushed.
enum Node {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Arr(Vec<Node>),
    Obj(Vec<(String, Node)>),
}

fn key(text: &str, node: Node) -> (String, Node) {
    (text.to_string(), node)
}

fn escape_into(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Nodes at this depth and deeper render on one line in `PrettyCompact`.
const INLINE_DEPTH: usize = 4;

fn render(node: &Node, mode: JsonPrintMode, depth: usize, out: &mut String) {
    let inline = match mode {
        JsonPrintMode::Compact => true,
        JsonPrintMode::Pretty => false,
        JsonPrintMode::PrettyCompact => depth >= INLINE_DEPTH,
    };
    let spaced = mode != JsonPrintMode::Compact;
    match node {
        Node::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Node::Int(v) => out.push_str(&v.to_string()),
        Node::Double(v) => out.push_str(&v.to_string()),
        Node::Str(s) => escape_into(out, s),
        Node::Arr(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                    if inline && spaced {
                        out.push(' ');
                    }
                }
                if !inline {
                    out.push('\n');
                    out.push_str(&"  ".repeat(depth + 1));
                }
                render(item, mode, depth + 1, out);
            }
            if !inline {
                out.push('\n');
                out.push_str(&"  ".repeat(depth));
            }
            out.push(']');
        }
        Node::Obj(fields) => {
            if fields.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push('{');
            for (i, (name, value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                    if inline && spaced {
                        out.push(' ');
                    }
                }
                if !inline {
                    out.push('\n');
                    out.push_str(&"  ".repeat(depth + 1));
                }
                escape_into(out, name);
                out.push(':');
                if spaced {
                    out.push(' ');
                }
                render(value, mode, depth + 1, out);
            }
            if !inline {
                out.push('\n');
                out.push_str(&"  ".repeat(depth));
            }
            out.push('}');
        }
    }
}

fn attr_node(value: &AttributeValue) -> Node {
    let mut fields = vec![key("k", Node::Str(value.kind_tag().to_string()))];
    match value {
        AttributeValue::Bool(v) => fields.push(key("v", Node::Bool(*v))),
        AttributeValue::Int(v) => fields.push(key("v", Node::Int(*v))),
        AttributeValue::Double(v) => fields.push(key("v", Node::Double(*v))),
        AttributeValue::String(v) => fields.push(key("v", Node::Str(v.clone()))),
        AttributeValue::BoolArray(vs) => {
            fields.push(key("vs", Node::Arr(vs.iter().map(|v| Node::Bool(*v)).collect())));
        }
        AttributeValue::IntArray(vs) => {
            fields.push(key("vs", Node::Arr(vs.iter().map(|v| Node::Int(*v)).collect())));
        }
        AttributeValue::DoubleArray(vs) => {
            fields.push(key("vs", Node::Arr(vs.iter().map(|v| Node::Double(*v)).collect())));
        }
        AttributeValue::StringArray(vs) => {
            fields.push(key(
                "vs",
                Node::Arr(vs.iter().map(|v| Node::Str(v.clone())).collect()),
            ));
        }
    }
    Node::Obj(fields)
}

fn src_loc_node(loc: &SrcLoc) -> Node {
    Node::Obj(vec![
        key("file", Node::Str(loc.file.clone())),
        key("line", Node::Int(i64::from(loc.line))),
        key("col", Node::Int(i64::from(loc.column))),
        key("endLine", Node::Int(i64::from(loc.end_line))),
        key("endCol", Node::Int(i64::from(loc.end_column))),
    ])
}

fn value_node(val: &ValueDoc) -> Node {
    let mut fields = vec![
        key("sym", Node::Str(val.sym.clone())),
        key("width", Node::Int(val.width)),
        key("signed", Node::Bool(val.signed)),
        key("ty", Node::Str(val.ty.clone())),
        key("isInput", Node::Bool(val.is_input)),
        key("isOutput", Node::Bool(val.is_output)),
        key("isInout", Node::Bool(val.is_inout)),
    ];
    if let Some(def) = &val.def {
        fields.push(key("def", Node::Str(def.clone())));
    }
    fields.push(key(
        "users",
        Node::Arr(
            val.users
                .iter()
                .map(|u| {
                    Node::Obj(vec![
                        key("op", Node::Str(u.op.clone())),
                        key("i", Node::Int(u.index as i64)),
                    ])
                })
                .collect(),
        ),
    ));
    if let Some(loc) = &val.src_loc {
        fields.push(key("srcLoc", src_loc_node(loc)));
    }
    Node::Obj(fields)
}

fn op_node(op: &OpDoc) -> Node {
    let mut fields = vec![
        key("sym", Node::Str(op.sym.clone())),
        key("kind", Node::Str(op.kind.clone())),
        key(
            "in",
            Node::Arr(op.operands.iter().map(|s| Node::Str(s.clone())).collect()),
        ),
        key(
            "out",
            Node::Arr(op.results.iter().map(|s| Node::Str(s.clone())).collect()),
        ),
        key(
            "attrs",
            Node::Obj(
                op.attrs
                    .iter()
                    .map(|(name, value)| (name.clone(), attr_node(value)))
                    .collect(),
            ),
        ),
    ];
    if let Some(loc) = &op.src_loc {
        fields.push(key("srcLoc", src_loc_node(loc)));
    }
    Node::Obj(fields)
}

fn graph_node(graph: &GraphDoc) -> Node {
    Node::Obj(vec![
        key("name", Node::Str(graph.name.clone())),
        key("vals", Node::Arr(graph.vals.iter().map(value_node).collect())),
        key(
            "ports",
            Node::Obj(vec![
                key(
                    "in",
                    Node::Obj(
                        graph
                            .ports
                            .inputs
                            .iter()
                            .map(|(name, sym)| (name.clone(), Node::Str(sym.clone())))
                            .collect(),
                    ),
                ),
                key(
                    "out",
                    Node::Obj(
                        graph
                            .ports
                            .outputs
                            .iter()
                            .map(|(name, sym)| (name.clone(), Node::Str(sym.clone())))
                            .collect(),
                    ),
                ),
                key(
                    "inout",
                    Node::Obj(
                        graph
                            .ports
                            .inouts
                            .iter()
                            .map(|(name, syms)| {
                                (
                                    name.clone(),
                                    Node::Obj(vec![
                                        key("in", Node::Str(syms[0].clone())),
                                        key("out", Node::Str(syms[1].clone())),
                                        key("oe", Node::Str(syms[2].clone())),
                                    ]),
                                )
                            })
                            .collect(),
                    ),
                ),
            ]),
        ),
        key("ops", Node::Arr(graph.ops.iter().map(op_node).collect())),
        key(
            "declared",
            Node::Arr(graph.declared.iter().map(|d| Node::Str(d.clone())).collect()),
        ),
    ])
}

/// Serialize a netlist to JSON text in the given print mode. Two calls on
/// the same netlist produce identical bytes.
#[must_use]
pub fn emit_netlist(netlist: &Netlist, mode: JsonPrintMode) -> String {
    let doc = netlist_to_doc(netlist);
    let root = Node::Obj(vec![
        key(
            "tops",
            Node::Arr(doc.tops.iter().map(|t| Node::Str(t.clone())).collect()),
        ),
        key(
            "graphs",
            Node::Arr(doc.graphs.iter().map(graph_node).collect()),
        ),
    ]);
    let mut out = String::new();
    render(&root, mode, 0, &mut out);
    if mode != JsonPrintMode::Compact {
        out.push('\n');
    }
    out
}

// =============================================================================
// PARSER
// =============================================================================

fn bad(message: impl Into<String>) -> IrError {
    IrError::Json(message.into())
}

fn get_str(obj: &serde_json::Map<String, JsonValue>, name: &str) -> Result<String, IrError> {
    obj.get(name)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| bad(format!("missing or non-string field '{name}'")))
}

fn get_bool(obj: &serde_json::Map<String, JsonValue>, name: &str) -> Result<bool, IrError> {
    obj.get(name)
        .and_then(JsonValue::as_bool)
        .ok_or_else(|| bad(format!("missing or non-boolean field '{name}'")))
}

fn get_int(obj: &serde_json::Map<String, JsonValue>, name: &str) -> Result<i64, IrError> {
    obj.get(name)
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| bad(format!("missing or non-integer field '{name}'")))
}

fn get_arr<'a>(
    obj: &'a serde_json::Map<String, JsonValue>,
    name: &str,
) -> Result<&'a Vec<JsonValue>, IrError> {
    obj.get(name)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| bad(format!("missing or non-array field '{name}'")))
}

fn get_obj<'a>(
    obj: &'a serde_json::Map<String, JsonValue>,
    name: &str,
) -> Result<&'a serde_json::Map<String, JsonValue>, IrError> {
    obj.get(name)
        .and_then(JsonValue::as_object)
        .ok_or_else(|| bad(format!("missing or non-object field '{name}'")))
}

fn parse_src_loc(value: &JsonValue) -> Result<SrcLoc, IrError> {
    let obj = value.as_object().ok_or_else(|| bad("srcLoc must be an object"))?;
    Ok(SrcLoc {
        file: get_str(obj, "file")?,
        line: get_int(obj, "line")? as u32,
        column: get_int(obj, "col")? as u32,
        end_line: get_int(obj, "endLine")? as u32,
        end_column: get_int(obj, "endCol")? as u32,
    })
}

fn scalar_bool(value: &JsonValue) -> Result<bool, IrError> {
    value.as_bool().ok_or_else(|| bad("expected boolean attribute element"))
}

fn scalar_int(value: &JsonValue) -> Result<i64, IrError> {
    value.as_i64().ok_or_else(|| bad("expected integer attribute element"))
}

fn scalar_double(value: &JsonValue) -> Result<f64, IrError> {
    value.as_f64().ok_or_else(|| bad("expected double attribute element"))
}

fn scalar_string(value: &JsonValue) -> Result<String, IrError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| bad("expected string attribute element"))
}

fn parse_attr(name: &str, value: &JsonValue) -> Result<AttributeValue, IrError> {
    let obj = value
        .as_object()
        .ok_or_else(|| bad(format!("attribute '{name}' must be an object")))?;
    let tag = get_str(obj, "k")?;
    let scalar = obj.get("v");
    let array = obj.get("vs").and_then(JsonValue::as_array);
    let missing_scalar = || bad(format!("attribute '{name}' missing scalar payload 'v'"));
    let missing_array = || bad(format!("attribute '{name}' missing array payload 'vs'"));
    let parsed = match tag.as_str() {
        "bool" => AttributeValue::Bool(scalar_bool(scalar.ok_or_else(missing_scalar)?)?),
        "int" => AttributeValue::Int(scalar_int(scalar.ok_or_else(missing_scalar)?)?),
        "double" => AttributeValue::Double(scalar_double(scalar.ok_or_else(missing_scalar)?)?),
        "string" => AttributeValue::String(scalar_string(scalar.ok_or_else(missing_scalar)?)?),
        "bool[]" => AttributeValue::BoolArray(
            array
                .ok_or_else(missing_array)?
                .iter()
                .map(scalar_bool)
                .collect::<Result<_, _>>()?,
        ),
        "int[]" => AttributeValue::IntArray(
            array
                .ok_or_else(missing_array)?
                .iter()
                .map(scalar_int)
                .collect::<Result<_, _>>()?,
        ),
        "double[]" => AttributeValue::DoubleArray(
            array
                .ok_or_else(missing_array)?
                .iter()
                .map(scalar_double)
                .collect::<Result<_, _>>()?,
        ),
        "string[]" => AttributeValue::StringArray(
            array
                .ok_or_else(missing_array)?
                .iter()
                .map(scalar_string)
                .collect::<Result<_, _>>()?,
        ),
        other => {
            return Err(bad(format!(
                "attribute '{name}' has unknown kind tag '{other}'"
            )));
        }
    };
    if !parsed.is_json_serializable() {
        return Err(bad(format!("attribute '{name}' is not JSON-serializable")));
    }
    Ok(parsed)
}

fn parse_value_doc(value: &JsonValue) -> Result<ValueDoc, IrError> {
    let obj = value.as_object().ok_or_else(|| bad("value entry must be an object"))?;
    let users = get_arr(obj, "users")?
        .iter()
        .map(|user| {
            let user_obj = user
                .as_object()
                .ok_or_else(|| bad("user entry must be an object"))?;
            Ok(UserDoc {
                op: get_str(user_obj, "op")?,
                index: get_int(user_obj, "i")? as usize,
            })
        })
        .collect::<Result<Vec<_>, IrError>>()?;
    Ok(ValueDoc {
        sym: get_str(obj, "sym")?,
        width: get_int(obj, "width")?,
        signed: get_bool(obj, "signed")?,
        ty: get_str(obj, "ty")?,
        is_input: get_bool(obj, "isInput")?,
        is_output: get_bool(obj, "isOutput")?,
        is_inout: get_bool(obj, "isInout")?,
        def: obj
            .get("def")
            .map(|d| {
                d.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| bad("def must be a string"))
            })
            .transpose()?,
        users,
        src_loc: obj.get("srcLoc").map(parse_src_loc).transpose()?,
    })
}

fn parse_op_doc(value: &JsonValue) -> Result<OpDoc, IrError> {
    let obj = value.as_object().ok_or_else(|| bad("op entry must be an object"))?;
    let string_list = |name: &str| -> Result<Vec<String>, IrError> {
        get_arr(obj, name)?
            .iter()
            .map(|s| {
                s.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| bad(format!("'{name}' entries must be strings")))
            })
            .collect()
    };
    let attrs_obj = get_obj(obj, "attrs")?;
    let mut attrs = Vec::with_capacity(attrs_obj.len());
    for (name, attr_value) in attrs_obj {
        attrs.push((name.clone(), parse_attr(name, attr_value)?));
    }
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(OpDoc {
        sym: get_str(obj, "sym")?,
        kind: get_str(obj, "kind")?,
        operands: string_list("in")?,
        results: string_list("out")?,
        attrs,
        src_loc: obj.get("srcLoc").map(parse_src_loc).transpose()?,
    })
}

fn parse_graph_doc(value: &JsonValue) -> Result<GraphDoc, IrError> {
    let obj = value.as_object().ok_or_else(|| bad("graph entry must be an object"))?;
    let ports_obj = get_obj(obj, "ports")?;
    let name_map = |name: &str| -> Result<Vec<(String, String)>, IrError> {
        let map = get_obj(ports_obj, name)?;
        map.iter()
            .map(|(port, sym)| {
                sym.as_str()
                    .map(|s| (port.clone(), s.to_string()))
                    .ok_or_else(|| bad(format!("port '{port}' must name a value")))
            })
            .collect()
    };
    let mut inputs = name_map("in")?;
    let mut outputs = name_map("out")?;
    inputs.sort();
    outputs.sort();
    let inout_map = get_obj(ports_obj, "inout")?;
    let mut inouts = Vec::with_capacity(inout_map.len());
    for (name, triple) in inout_map {
        let triple_obj = triple
            .as_object()
            .ok_or_else(|| bad(format!("inout port '{name}' must be an object")))?;
        inouts.push((
            name.clone(),
            [
                get_str(triple_obj, "in")?,
                get_str(triple_obj, "out")?,
                get_str(triple_obj, "oe")?,
            ],
        ));
    }
    inouts.sort();

    let declared = get_arr(obj, "declared")?
        .iter()
        .map(|s| {
            s.as_str()
                .map(str::to_string)
                .ok_or_else(|| bad("'declared' entries must be strings"))
        })
        .collect::<Result<Vec<_>, IrError>>()?;

    Ok(GraphDoc {
        name: get_str(obj, "name")?,
        vals: get_arr(obj, "vals")?
            .iter()
            .map(parse_value_doc)
            .collect::<Result<_, _>>()?,
        ports: PortsDoc {
            inputs,
            outputs,
            inouts,
        },
        ops: get_arr(obj, "ops")?
            .iter()
            .map(parse_op_doc)
            .collect::<Result<_, _>>()?,
        declared,
    })
}

/// Parse JSON text into a netlist, running the full invariant check.
pub fn parse_netlist(text: &str) -> Result<Netlist, IrError> {
    let root: JsonValue =
        serde_json::from_str(text).map_err(|e| bad(format!("malformed JSON: {e}")))?;
    let obj = root.as_object().ok_or_else(|| bad("document must be an object"))?;
    let tops = get_arr(obj, "tops")?
        .iter()
        .map(|t| {
            t.as_str()
                .map(str::to_string)
                .ok_or_else(|| bad("'tops' entries must be strings"))
        })
        .collect::<Result<Vec<_>, IrError>>()?;
    let graphs = get_arr(obj, "graphs")?
        .iter()
        .map(parse_graph_doc)
        .collect::<Result<Vec<_>, IrError>>()?;
    doc_to_netlist(&NetlistDoc { tops, graphs })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OperationKind, ValueType};

    fn demo_netlist() -> Netlist {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("demo").expect("graph");
            let in_sym = graph.intern("in");
            let out_sym = graph.intern("out");
            let sum_sym = graph.intern("sum");
            let in_v = graph.create_value(in_sym, 8, false, ValueType::Logic).expect("in");
            let out_v = graph.create_value(out_sym, 8, false, ValueType::Logic).expect("out");
            let sum_v = graph.create_value(sum_sym, 8, false, ValueType::Logic).expect("sum");
            graph.bind_input_port("in", in_v).expect("port");
            graph.bind_output_port("out", out_v).expect("port");

            let add_sym = graph.intern("add0");
            let add = graph.create_operation(OperationKind::Add, add_sym).expect("add");
            graph.add_operand(add, in_v).expect("operand");
            graph.add_operand(add, in_v).expect("operand");
            graph.add_result(add, sum_v).expect("result");
            graph
                .set_attr(add, "weights", AttributeValue::IntArray(vec![1, 2]))
                .expect("attr");

            let assign_sym = graph.intern("assign0");
            let assign = graph
                .create_operation(OperationKind::Assign, assign_sym)
                .expect("assign");
            graph.add_operand(assign, sum_v).expect("operand");
            graph.add_result(assign, out_v).expect("result");
        }
        netlist.mark_as_top("demo").expect("top");
        netlist
    }

    #[test]
    fn pretty_compact_has_inline_entries_and_compact_keys() {
        let text = emit_netlist(&demo_netlist(), JsonPrintMode::PrettyCompact);
        assert!(text.contains("\"vals\""));
        assert!(text.contains("\"ops\""));
        assert!(text.contains("\"tops\""));
        assert!(text.contains("\"attrs\""));
        assert!(text.contains("\"int[]\""));

        // Value entries stay on one line.
        let pos = text.find("{\"sym\": \"in\"").expect("inline value entry");
        let line_end = text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len());
        assert!(text[pos..line_end].contains('}'));
    }

    #[test]
    fn compact_mode_has_no_whitespace_and_differs() {
        let netlist = demo_netlist();
        let compact = emit_netlist(&netlist, JsonPrintMode::Compact);
        let pretty_compact = emit_netlist(&netlist, JsonPrintMode::PrettyCompact);
        assert_ne!(compact, pretty_compact);
        assert!(!compact.contains('\n'));
        assert!(!compact.contains(": "));
    }

    #[test]
    fn emits_are_byte_identical() {
        let netlist = demo_netlist();
        for mode in [
            JsonPrintMode::Compact,
            JsonPrintMode::PrettyCompact,
            JsonPrintMode::Pretty,
        ] {
            assert_eq!(emit_netlist(&netlist, mode), emit_netlist(&netlist, mode));
        }
    }

    #[test]
    fn parse_round_trip_restores_graphs() {
        let netlist = demo_netlist();
        let text = emit_netlist(&netlist, JsonPrintMode::PrettyCompact);
        let parsed = parse_netlist(&text).expect("parse");
        assert!(parsed.find_graph("demo").is_some());
        assert_eq!(parsed.top_graphs(), &["demo"]);
        assert_eq!(emit_netlist(&parsed, JsonPrintMode::PrettyCompact), text);
    }

    #[test]
    fn nested_attribute_arrays_are_rejected() {
        let text = emit_netlist(&demo_netlist(), JsonPrintMode::Compact);
        let broken = text.replace("\"vs\":[1,2]", "\"vs\":[[1],2]");
        assert_ne!(text, broken);
        assert!(parse_netlist(&broken).is_err());
    }

    #[test]
    fn unknown_attribute_kind_is_rejected() {
        let text = emit_netlist(&demo_netlist(), JsonPrintMode::Compact);
        let broken = text.replace("\"k\":\"int[]\"", "\"k\":\"quaternion\"");
        assert_ne!(text, broken);
        assert!(parse_netlist(&broken).is_err());
    }

    #[test]
    fn dangling_operand_reference_is_rejected() {
        let text = emit_netlist(&demo_netlist(), JsonPrintMode::Compact);
        let broken = text.replace("\"in\":[\"in\",\"in\"]", "\"in\":[\"in\",\"ghost\"]");
        assert_ne!(text, broken);
        assert!(parse_netlist(&broken).is_err());
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(parse_netlist("{").is_err());
        assert!(parse_netlist("{\"graphs\":[]}").is_err());
        assert!(parse_netlist("{\"tops\":[],\"graphs\":[{}]}").is_err());
    }
}
