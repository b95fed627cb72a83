//! # XMR Resolution
//!
//! Rewrites cross-module references (`XmrRead`/`XmrWrite` ops naming a
//! hierarchical `a.b.c` path) into explicit port-and-wire plumbing so later
//! passes see only in-module signals.
//!
//! Reads manufacture `__xmr_r_*` output ports hop by hop from the leaf graph
//! toward the originator; writes manufacture `__xmr_w_*` input ports in the
//! opposite direction. Paths terminating at register/latch/memory storage
//! synthesize the matching read/write port operation in the leaf graph
//! instead of wiring the raw net. After all references are rewritten,
//! instances that sit off the XMR path are reconciled with the ports their
//! child modules gained: manufactured outputs are mirrored onto every
//! instance, manufactured inputs receive zero-constant pad drivers.
//!
//! Port names derive from the sanitized path (hash fallback past 64 chars)
//! and are cached per (graph, path, direction) so repeated references
//! resolve to the same port regardless of visitation order.

use crate::graph::Graph;
use crate::netlist::Netlist;
use crate::pass::{Pass, PassContext, PassDiagnostics, PassResult};
use crate::symbols::sanitize_identifier;
use crate::types::{AttributeValue, OperationId, OperationKind, SrcLoc, ValueId, ValueType};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// The XMR resolution pass.
#[derive(Debug, Default)]
pub struct XmrResolvePass;

impl XmrResolvePass {
    /// Create the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

const PASS_ID: &str = "xmr-resolve";

fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn hash_path(path: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    path.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

fn op_context(graph: &Graph, op: OperationId) -> String {
    let sym = graph
        .operation(op)
        .map(|o| graph.text(o.symbol()).to_string())
        .unwrap_or_default();
    format!("graph '{}' op '{}'", graph.symbol(), sym)
}

fn normalize_width(width: i64) -> i64 {
    if width > 0 { width } else { 1 }
}

/// What an XMR leaf symbol resolves to.
enum StorageLookup {
    /// Not a storage operation; treat the leaf as a plain value.
    NotStorage,
    /// Storage found but missing its width/isSigned attributes.
    Malformed,
    /// Usable storage description.
    Found(StorageInfo),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StorageKind {
    Register,
    Latch,
    Memory,
}

#[derive(Clone, Copy)]
struct StorageInfo {
    kind: StorageKind,
    width: i64,
    signed: bool,
}

fn classify_storage(graph: &Graph, leaf: &str) -> StorageLookup {
    let op_id = graph.find_operation_named(leaf);
    if !op_id.is_valid() {
        return StorageLookup::NotStorage;
    }
    let Some(op) = graph.operation(op_id) else {
        return StorageLookup::NotStorage;
    };
    let kind = match op.kind() {
        OperationKind::Register => StorageKind::Register,
        OperationKind::Latch => StorageKind::Latch,
        OperationKind::Memory => StorageKind::Memory,
        _ => return StorageLookup::NotStorage,
    };
    match (op.attr_int("width"), op.attr_bool("isSigned")) {
        (Some(width), Some(signed)) => StorageLookup::Found(StorageInfo {
            kind,
            width: normalize_width(width),
            signed,
        }),
        _ => StorageLookup::Malformed,
    }
}

fn find_instance_op(graph: &Graph, instance_name: &str) -> OperationId {
    for op_id in graph.operations() {
        let Some(op) = graph.operation(op_id) else { continue };
        if !matches!(op.kind(), OperationKind::Instance | OperationKind::Blackbox) {
            continue;
        }
        if op.attr_string("instanceName") == Some(instance_name) {
            return op_id;
        }
    }
    OperationId::invalid()
}

/// One hop along a resolved path: the instance op in `parent` pointing at
/// `child`.
struct Hop {
    parent: String,
    inst_op: OperationId,
    child: String,
}

/// Input port a child module gained; off-path instances still need a driver.
struct PendingPort {
    module: String,
    port: String,
    width: i64,
    signed: bool,
}

#[derive(Default)]
struct Resolver {
    read_port_names: BTreeMap<(String, String), String>,
    write_port_names: BTreeMap<(String, String), String>,
    pending_outputs: Vec<PendingPort>,
    pending_inputs: Vec<PendingPort>,
    pad_cache: BTreeMap<(String, String), ValueId>,
    changed: bool,
}

impl Resolver {
    /// Cached, collision-free port name for a path within one graph.
    fn port_name(
        &mut self,
        graph: &Graph,
        cache_is_read: bool,
        path_key: &str,
        prefix: &str,
    ) -> String {
        let cache = if cache_is_read {
            &mut self.read_port_names
        } else {
            &mut self.write_port_names
        };
        let key = (graph.symbol().to_string(), path_key.to_string());
        if let Some(existing) = cache.get(&key) {
            return existing.clone();
        }
        let mut sanitized = sanitize_identifier(path_key);
        if sanitized.len() > 64 {
            sanitized = hash_path(path_key);
        }
        let base = format!("__{prefix}_{sanitized}");
        let mut candidate = base.clone();
        let mut suffix = 0u32;
        while graph.symbols().contains(&candidate)
            || graph.input_ports().contains_key(&candidate)
            || graph.output_ports().contains_key(&candidate)
        {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        cache.insert(key, candidate.clone());
        candidate
    }

    /// Walk the instance segments of a path, collecting one hop per level.
    /// Emits a warning and returns `None` when any link is missing.
    fn collect_hops(
        &mut self,
        netlist: &Netlist,
        diags: &mut PassDiagnostics,
        root: &str,
        context: &str,
        direction: &str,
        segments: &[String],
    ) -> Option<Vec<Hop>> {
        let mut hops = Vec::new();
        let mut current = root.to_string();
        for instance_name in &segments[..segments.len() - 1] {
            let graph = netlist.find_graph(&current)?;
            let inst_op = find_instance_op(graph, instance_name);
            if !inst_op.is_valid() {
                diags.warning(
                    PASS_ID,
                    format!("XMR {direction} instance not found: {instance_name}"),
                    context.to_string(),
                );
                return None;
            }
            let module_name = graph
                .operation(inst_op)
                .and_then(|op| op.attr_string("moduleName"))
                .unwrap_or("")
                .to_string();
            if module_name.is_empty() {
                diags.warning(
                    PASS_ID,
                    format!("XMR {direction} instance missing moduleName"),
                    context.to_string(),
                );
                return None;
            }
            if netlist.find_graph(&module_name).is_none() {
                diags.warning(
                    PASS_ID,
                    format!("XMR {direction} module not found: {module_name}"),
                    context.to_string(),
                );
                return None;
            }
            hops.push(Hop {
                parent: current.clone(),
                inst_op,
                child: module_name.clone(),
            });
            current = module_name;
        }
        Some(hops)
    }

    /// Synthesize a register/latch read port in `graph` and return its result.
    fn create_storage_read_port(
        &mut self,
        graph: &mut Graph,
        storage: StorageInfo,
        storage_name: &str,
    ) -> Result<ValueId, String> {
        let kind = if storage.kind == StorageKind::Register {
            OperationKind::RegisterReadPort
        } else {
            OperationKind::LatchReadPort
        };
        let value_sym = graph.make_internal_val_sym();
        let value = graph
            .create_value(value_sym, storage.width, storage.signed, ValueType::Logic)
            .map_err(|e| e.to_string())?;
        graph
            .set_value_src_loc(value, SrcLoc::synthetic(PASS_ID, "storage_read"))
            .map_err(|e| e.to_string())?;
        let op_sym = graph.make_internal_op_sym();
        let op = graph.create_operation(kind, op_sym).map_err(|e| e.to_string())?;
        graph
            .set_op_src_loc(op, SrcLoc::synthetic(PASS_ID, "storage_read"))
            .map_err(|e| e.to_string())?;
        graph.add_result(op, value).map_err(|e| e.to_string())?;
        let attr_key = if storage.kind == StorageKind::Register {
            "regSymbol"
        } else {
            "latchSymbol"
        };
        graph
            .set_attr(op, attr_key, AttributeValue::String(storage_name.to_string()))
            .map_err(|e| e.to_string())?;
        self.changed = true;
        Ok(value)
    }

    /// Bind `value` to a (possibly existing) output port. Returns the bound
    /// value and whether a fresh binding was created.
    fn ensure_output_port(
        &mut self,
        graph: &mut Graph,
        diags: &mut PassDiagnostics,
        port_name: &str,
        value: ValueId,
    ) -> (ValueId, bool) {
        let existing = graph.output_port_value(port_name);
        if existing.is_valid() && existing != value {
            diags.warning(
                PASS_ID,
                "XMR output port already bound; keeping existing binding".to_string(),
                format!("graph '{}' port '{port_name}'", graph.symbol()),
            );
            return (existing, false);
        }
        if !existing.is_valid() {
            if let Err(e) = graph.bind_output_port(port_name, value) {
                diags.warning(
                    PASS_ID,
                    format!("XMR output port binding failed: {e}"),
                    format!("graph '{}'", graph.symbol()),
                );
                return (value, false);
            }
            self.changed = true;
            return (value, true);
        }
        (value, false)
    }

    /// Find or create an input port (and backing value) on a child graph.
    fn ensure_input_port(
        &mut self,
        graph: &mut Graph,
        diags: &mut PassDiagnostics,
        port_name: &str,
        width: i64,
        signed: bool,
    ) -> (ValueId, bool) {
        let existing = graph.input_port_value(port_name);
        if existing.is_valid() {
            return (existing, false);
        }
        let mut value = graph.find_value_named(port_name);
        if !value.is_valid() {
            let sym = graph.intern(port_name);
            match graph.create_value(sym, normalize_width(width), signed, ValueType::Logic) {
                Ok(created) => {
                    let _ = graph.set_value_src_loc(created, SrcLoc::synthetic(PASS_ID, "input_port"));
                    value = created;
                }
                Err(e) => {
                    diags.warning(
                        PASS_ID,
                        format!("XMR input port value creation failed: {e}"),
                        format!("graph '{}'", graph.symbol()),
                    );
                    return (ValueId::invalid(), false);
                }
            }
        }
        if let Err(e) = graph.bind_input_port(port_name, value) {
            diags.warning(
                PASS_ID,
                format!("XMR input port binding failed: {e}"),
                format!("graph '{}' port '{port_name}'", graph.symbol()),
            );
            return (ValueId::invalid(), false);
        }
        self.changed = true;
        (value, true)
    }

    /// Find or mint the instance-op result for a child output port,
    /// respecting the port ordering convention (outputs precede inouts).
    fn ensure_instance_output(
        &mut self,
        graph: &mut Graph,
        op_id: OperationId,
        port_name: &str,
        width: i64,
        signed: bool,
    ) -> Result<ValueId, String> {
        let (mut names, inout_count, results) = {
            let op = graph.operation(op_id).ok_or("instance op vanished")?;
            let names: Vec<String> = op
                .attr_string_array("outputPortName")
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            let inout_count = op
                .attr_string_array("inoutPortName")
                .map_or(0, <[String]>::len);
            (names, inout_count, op.results().to_vec())
        };
        for (i, name) in names.iter().enumerate() {
            if name == port_name && i < results.len() {
                return Ok(results[i]);
            }
        }
        let value_sym = graph.make_internal_val_sym();
        let value = graph
            .create_value(value_sym, normalize_width(width), signed, ValueType::Logic)
            .map_err(|e| e.to_string())?;
        let _ = graph.set_value_src_loc(value, SrcLoc::synthetic(PASS_ID, "instance_out"));
        let output_limit = results.len().saturating_sub(inout_count);
        let insert_index = names.len().min(output_limit);
        graph
            .insert_result(op_id, insert_index, value)
            .map_err(|e| e.to_string())?;
        names.push(port_name.to_string());
        graph
            .set_attr(op_id, "outputPortName", AttributeValue::StringArray(names))
            .map_err(|e| e.to_string())?;
        self.changed = true;
        Ok(value)
    }

    /// Find or insert the instance-op operand for a child input port
    /// (inputs precede the paired inout operand triples).
    fn ensure_instance_input(
        &mut self,
        graph: &mut Graph,
        diags: &mut PassDiagnostics,
        op_id: OperationId,
        port_name: &str,
        value: ValueId,
    ) -> Result<ValueId, String> {
        let (mut names, inout_count, operands) = {
            let op = graph.operation(op_id).ok_or("instance op vanished")?;
            let names: Vec<String> = op
                .attr_string_array("inputPortName")
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            let inout_count = op
                .attr_string_array("inoutPortName")
                .map_or(0, <[String]>::len);
            (names, inout_count, op.operands().to_vec())
        };
        for (i, name) in names.iter().enumerate() {
            if name == port_name && i < operands.len() {
                if operands[i] != value {
                    diags.warning(
                        PASS_ID,
                        "XMR input port already connected; keeping existing operand".to_string(),
                        op_context(graph, op_id),
                    );
                }
                return Ok(operands[i]);
            }
        }
        let input_limit = operands.len().saturating_sub(inout_count * 2);
        let insert_index = names.len().min(input_limit);
        graph
            .insert_operand(op_id, insert_index, value)
            .map_err(|e| e.to_string())?;
        names.push(port_name.to_string());
        graph
            .set_attr(op_id, "inputPortName", AttributeValue::StringArray(names))
            .map_err(|e| e.to_string())?;
        self.changed = true;
        Ok(value)
    }

    /// Per-graph zero-constant shared across all pads of one width/sign.
    fn pad_input(&mut self, graph: &mut Graph, width: i64, signed: bool) -> Result<ValueId, String> {
        let normalized = normalize_width(width);
        let shape = format!("{normalized}{}", if signed { "s" } else { "u" });
        let key = (graph.symbol().to_string(), shape.clone());
        if let Some(existing) = self.pad_cache.get(&key) {
            return Ok(*existing);
        }
        let pad_name = format!("__xmr_pad_in_{shape}");
        let value_sym = if graph.symbols().contains(&pad_name) {
            graph.make_internal_val_sym()
        } else {
            graph.intern(&pad_name)
        };
        let value = graph
            .create_value(value_sym, normalized, signed, ValueType::Logic)
            .map_err(|e| e.to_string())?;
        let _ = graph.set_value_src_loc(value, SrcLoc::synthetic(PASS_ID, "pad_in"));
        let op_sym = graph.make_internal_op_sym();
        let op = graph
            .create_operation(OperationKind::Constant, op_sym)
            .map_err(|e| e.to_string())?;
        let _ = graph.set_op_src_loc(op, SrcLoc::synthetic(PASS_ID, "pad_in_const"));
        graph.add_result(op, value).map_err(|e| e.to_string())?;
        graph
            .set_attr(op, "constValue", AttributeValue::String(format!("{normalized}'b0")))
            .map_err(|e| e.to_string())?;
        self.pad_cache.insert(key, value);
        self.changed = true;
        Ok(value)
    }

    /// Give `target` a unique driver slot, per the single-driver policy:
    /// inout targets abort, input targets are detached from their port,
    /// output targets are renamed aside and rebound to a fresh value.
    fn force_single_driver(
        &mut self,
        graph: &mut Graph,
        diags: &mut PassDiagnostics,
        target: ValueId,
        context: &str,
        path: &str,
    ) -> Option<ValueId> {
        let (symbol, sym_id, width, signed, ty, is_input, is_output, is_inout, has_driver) = {
            let value = graph.value(target)?;
            (
                graph.text(value.symbol()).to_string(),
                value.symbol(),
                value.width(),
                value.is_signed(),
                value.value_type(),
                value.is_input(),
                value.is_output(),
                value.is_inout(),
                value.defining_op().is_valid(),
            )
        };
        if is_inout {
            diags.warning(
                PASS_ID,
                format!("XMR write to inout is not supported: {path}"),
                context.to_string(),
            );
            return None;
        }
        if symbol.is_empty() {
            diags.warning(
                PASS_ID,
                format!("XMR write target missing symbol: {path}"),
                context.to_string(),
            );
            return None;
        }
        if has_driver {
            diags.warning(
                PASS_ID,
                format!("XMR write replaces existing driver for {symbol}"),
                context.to_string(),
            );
        }
        if is_input {
            diags.warning(
                PASS_ID,
                format!("XMR write overrides input; leaving input port unconnected for {symbol}"),
                context.to_string(),
            );
            let fresh_sym = graph.make_internal_val_sym();
            let replacement = graph
                .create_value(fresh_sym, normalize_width(width), signed, ty)
                .ok()?;
            let _ = graph.set_value_src_loc(replacement, SrcLoc::synthetic(PASS_ID, "override_input"));
            graph.replace_all_uses(target, replacement).ok()?;
            self.changed = true;
            return Some(replacement);
        }

        // Output (or plain driven) value: move the old net aside under an
        // internal name and recreate the original symbol as the write target.
        let captured_outputs: Vec<String> = if is_output {
            graph
                .output_ports()
                .iter()
                .filter(|(_, v)| **v == target)
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            Vec::new()
        };
        let temp_sym = graph.make_internal_val_sym();
        graph.set_value_symbol(target, temp_sym).ok()?;
        let replacement = graph
            .create_value(sym_id, normalize_width(width), signed, ty)
            .ok()?;
        let _ = graph.set_value_src_loc(replacement, SrcLoc::synthetic(PASS_ID, "rebind_output"));
        graph.replace_all_uses(target, replacement).ok()?;
        for name in captured_outputs {
            let _ = graph.bind_output_port(&name, replacement);
        }
        self.changed = true;
        Some(replacement)
    }

    // =========================================================================
    // READ RESOLUTION
    // =========================================================================

    fn resolve_read(
        &mut self,
        netlist: &mut Netlist,
        diags: &mut PassDiagnostics,
        root: &str,
        context: &str,
        path: &str,
    ) -> Option<ValueId> {
        let mut segments = split_path(path);
        if segments.first().map(String::as_str) == Some(root) {
            segments.remove(0);
        }
        if segments.is_empty() {
            diags.warning(
                PASS_ID,
                "XMR read has empty path".to_string(),
                context.to_string(),
            );
            return None;
        }

        let hops = self.collect_hops(netlist, diags, root, context, "read", &segments)?;
        let leaf_name = segments.last()?.clone();
        let leaf_graph_name = hops.last().map_or(root.to_string(), |h| h.child.clone());

        // Resolve within the leaf graph first.
        let mut propagated = {
            let leaf_port_name = {
                let graph = netlist.find_graph(&leaf_graph_name)?;
                match classify_storage(graph, &leaf_name) {
                    StorageLookup::Found(storage) if storage.kind == StorageKind::Memory => {
                        diags.error(
                            PASS_ID,
                            "XMR read to memory requires explicit address".to_string(),
                            context.to_string(),
                        );
                        return None;
                    }
                    StorageLookup::Found(storage) => {
                        Some((self.port_name(graph, true, path, "xmr_r"), storage))
                    }
                    StorageLookup::Malformed => {
                        diags.error(
                            PASS_ID,
                            "XMR target storage missing width/isSigned".to_string(),
                            context.to_string(),
                        );
                        return None;
                    }
                    StorageLookup::NotStorage => None,
                }
            };
            let graph = netlist.find_graph_mut(&leaf_graph_name)?;
            match leaf_port_name {
                Some((port_name, storage)) => {
                    let existing = graph.output_port_value(&port_name);
                    if existing.is_valid() {
                        existing
                    } else {
                        match self.create_storage_read_port(graph, storage, &leaf_name) {
                            Ok(value) => value,
                            Err(message) => {
                                diags.error(PASS_ID, message, context.to_string());
                                return None;
                            }
                        }
                    }
                }
                None => {
                    let local = graph.find_value_named(&leaf_name);
                    if !local.is_valid() {
                        diags.warning(
                            PASS_ID,
                            format!("XMR read target not found: {leaf_name}"),
                            context.to_string(),
                        );
                        return None;
                    }
                    local
                }
            }
        };

        // Walk leaf-to-root, exporting the value through each boundary.
        for hop in hops.iter().rev() {
            let port_name = {
                let child = netlist.find_graph(&hop.child)?;
                self.port_name(child, true, path, "xmr_r")
            };
            let (width, signed, new_port) = {
                let child = netlist.find_graph_mut(&hop.child)?;
                let (bound, added) = self.ensure_output_port(child, diags, &port_name, propagated);
                propagated = bound;
                let value = child.value(propagated)?;
                (value.width(), value.is_signed(), added)
            };
            if new_port {
                self.pending_outputs.push(PendingPort {
                    module: hop.child.clone(),
                    port: port_name.clone(),
                    width,
                    signed,
                });
            }
            let parent = netlist.find_graph_mut(&hop.parent)?;
            match self.ensure_instance_output(parent, hop.inst_op, &port_name, width, signed) {
                Ok(parent_value) => propagated = parent_value,
                Err(message) => {
                    diags.error(PASS_ID, message, context.to_string());
                    return None;
                }
            }
        }

        Some(propagated)
    }

    // =========================================================================
    // WRITE RESOLUTION
    // =========================================================================

    fn resolve_write(
        &mut self,
        netlist: &mut Netlist,
        diags: &mut PassDiagnostics,
        root: &str,
        context: &str,
        path: &str,
        operands: &[ValueId],
        event_edges: Option<&[String]>,
    ) -> bool {
        if operands.is_empty() {
            diags.error(
                PASS_ID,
                "XMR write missing operands".to_string(),
                context.to_string(),
            );
            return false;
        }

        let mut segments = split_path(path);
        if segments.first().map(String::as_str) == Some(root) {
            segments.remove(0);
        }
        if segments.is_empty() {
            diags.warning(
                PASS_ID,
                "XMR write has empty path".to_string(),
                context.to_string(),
            );
            return false;
        }

        let Some(hops) = self.collect_hops(netlist, diags, root, context, "write", &segments)
        else {
            return false;
        };
        let Some(leaf_name) = segments.last().cloned() else {
            return false;
        };
        let leaf_graph_name = hops.last().map_or(root.to_string(), |h| h.child.clone());

        let storage = {
            let Some(graph) = netlist.find_graph(&leaf_graph_name) else {
                return false;
            };
            match classify_storage(graph, &leaf_name) {
                StorageLookup::Found(storage) => Some(storage),
                StorageLookup::Malformed => {
                    diags.error(
                        PASS_ID,
                        "XMR target storage missing width/isSigned".to_string(),
                        context.to_string(),
                    );
                    return false;
                }
                StorageLookup::NotStorage => None,
            }
        };

        // Label each driver operand; storage ports carry fixed signatures.
        let mut labels: Vec<String> = Vec::new();
        let mut drivers: Vec<ValueId> = Vec::new();
        if let Some(storage) = storage {
            match storage.kind {
                StorageKind::Register => {
                    if operands.len() < 3 {
                        diags.error(
                            PASS_ID,
                            "XMR write to register missing operands".to_string(),
                            context.to_string(),
                        );
                        return false;
                    }
                    let event_count = operands.len() - 3;
                    if event_count == 0
                        || event_edges.is_none_or(|edges| edges.len() != event_count)
                    {
                        diags.error(
                            PASS_ID,
                            "XMR write to register missing eventEdge operands".to_string(),
                            context.to_string(),
                        );
                        return false;
                    }
                    labels.extend(["cond", "data", "mask"].map(String::from));
                    for i in 0..event_count {
                        labels.push(format!("evt{i}"));
                    }
                }
                StorageKind::Memory => {
                    if operands.len() < 4 {
                        diags.error(
                            PASS_ID,
                            "XMR write to memory missing operands".to_string(),
                            context.to_string(),
                        );
                        return false;
                    }
                    let event_count = operands.len() - 4;
                    if event_count == 0
                        || event_edges.is_none_or(|edges| edges.len() != event_count)
                    {
                        diags.error(
                            PASS_ID,
                            "XMR write to memory missing eventEdge operands".to_string(),
                            context.to_string(),
                        );
                        return false;
                    }
                    labels.extend(["cond", "addr", "data", "mask"].map(String::from));
                    for i in 0..event_count {
                        labels.push(format!("evt{i}"));
                    }
                }
                StorageKind::Latch => {
                    if operands.len() != 3 {
                        diags.error(
                            PASS_ID,
                            "XMR write to latch expects 3 operands".to_string(),
                            context.to_string(),
                        );
                        return false;
                    }
                    if event_edges.is_some_and(|edges| !edges.is_empty()) {
                        diags.error(
                            PASS_ID,
                            "XMR write to latch must not include eventEdge".to_string(),
                            context.to_string(),
                        );
                        return false;
                    }
                    labels.extend(["cond", "data", "mask"].map(String::from));
                }
            }
            drivers.extend_from_slice(operands);
        } else {
            if operands.len() > 1 {
                diags.warning(
                    PASS_ID,
                    "XMR write has extra operands; using first".to_string(),
                    context.to_string(),
                );
            }
            labels.push(String::new());
            drivers.push(operands[0]);
        }

        // Push each driver down through the hierarchy, one hop at a time.
        let mut current = root.to_string();
        for hop in &hops {
            for (driver, label) in drivers.iter_mut().zip(labels.iter()) {
                if !driver.is_valid() {
                    diags.error(
                        PASS_ID,
                        "XMR write operand is invalid".to_string(),
                        context.to_string(),
                    );
                    return false;
                }
                let (width, signed) = {
                    let Some(graph) = netlist.find_graph(&current) else { return false };
                    let Some(value) = graph.value(*driver) else {
                        diags.error(
                            PASS_ID,
                            "XMR write operand is invalid".to_string(),
                            context.to_string(),
                        );
                        return false;
                    };
                    (value.width(), value.is_signed())
                };
                let path_key = if label.is_empty() {
                    path.to_string()
                } else {
                    format!("{path}:{label}")
                };
                let port_name = {
                    let Some(child) = netlist.find_graph(&hop.child) else { return false };
                    self.port_name(child, false, &path_key, "xmr_w")
                };
                let (child_port, new_port) = {
                    let Some(child) = netlist.find_graph_mut(&hop.child) else { return false };
                    self.ensure_input_port(child, diags, &port_name, width, signed)
                };
                if !child_port.is_valid() {
                    return false;
                }
                if new_port {
                    self.pending_inputs.push(PendingPort {
                        module: hop.child.clone(),
                        port: port_name.clone(),
                        width,
                        signed,
                    });
                }
                {
                    let Some(parent) = netlist.find_graph_mut(&hop.parent) else { return false };
                    if let Err(message) =
                        self.ensure_instance_input(parent, diags, hop.inst_op, &port_name, *driver)
                    {
                        diags.error(PASS_ID, message, context.to_string());
                        return false;
                    }
                }
                *driver = child_port;
            }
            current = hop.child.clone();
        }

        let Some(leaf_graph) = netlist.find_graph_mut(&leaf_graph_name) else {
            return false;
        };

        if let Some(storage) = storage {
            let (kind, sym_key, needs_edges) = match storage.kind {
                StorageKind::Register => (OperationKind::RegisterWritePort, "regSymbol", true),
                StorageKind::Latch => (OperationKind::LatchWritePort, "latchSymbol", false),
                StorageKind::Memory => (OperationKind::MemoryWritePort, "memSymbol", true),
            };
            let op_sym = leaf_graph.make_internal_op_sym();
            let write_op = match leaf_graph.create_operation(kind, op_sym) {
                Ok(op) => op,
                Err(e) => {
                    diags.error(PASS_ID, e.to_string(), context.to_string());
                    return false;
                }
            };
            let _ = leaf_graph.set_op_src_loc(write_op, SrcLoc::synthetic(PASS_ID, "write_port"));
            for driver in &drivers {
                if let Err(e) = leaf_graph.add_operand(write_op, *driver) {
                    diags.error(PASS_ID, e.to_string(), context.to_string());
                    return false;
                }
            }
            let _ = leaf_graph.set_attr(write_op, sym_key, AttributeValue::String(leaf_name));
            if needs_edges {
                if let Some(edges) = event_edges {
                    let _ = leaf_graph.set_attr(
                        write_op,
                        "eventEdge",
                        AttributeValue::StringArray(edges.to_vec()),
                    );
                }
            }
            self.changed = true;
            return true;
        }

        let target = leaf_graph.find_value_named(&leaf_name);
        if !target.is_valid() {
            diags.warning(
                PASS_ID,
                format!("XMR write target not found: {leaf_name}"),
                context.to_string(),
            );
            return false;
        }
        let Some(replacement) = self.force_single_driver(leaf_graph, diags, target, context, path)
        else {
            return false;
        };
        let op_sym = leaf_graph.make_internal_op_sym();
        let assign = match leaf_graph.create_operation(OperationKind::Assign, op_sym) {
            Ok(op) => op,
            Err(e) => {
                diags.error(PASS_ID, e.to_string(), context.to_string());
                return false;
            }
        };
        let _ = leaf_graph.set_op_src_loc(assign, SrcLoc::synthetic(PASS_ID, "assign_write"));
        if let Err(e) = leaf_graph.add_operand(assign, drivers[0]) {
            diags.error(PASS_ID, e.to_string(), context.to_string());
            return false;
        }
        if let Err(e) = leaf_graph.add_result(assign, replacement) {
            diags.error(PASS_ID, e.to_string(), context.to_string());
            return false;
        }
        self.changed = true;
        true
    }

    // =========================================================================
    // PAD-INPUT PHASE
    // =========================================================================

    /// Reconcile instances the resolution did not visit with the ports their
    /// child modules gained: manufactured output ports get a matching result
    /// on every instance, manufactured input ports get a zero-constant pad
    /// driver (one shared constant per width/sign per graph).
    fn reconcile_remaining_instances(&mut self, netlist: &mut Netlist, diags: &mut PassDiagnostics) {
        if self.pending_inputs.is_empty() && self.pending_outputs.is_empty() {
            return;
        }

        let mut instances_by_module: BTreeMap<String, Vec<(String, OperationId)>> = BTreeMap::new();
        for name in netlist.graph_order().to_vec() {
            let Some(graph) = netlist.find_graph(&name) else { continue };
            for op_id in graph.operations() {
                let Some(op) = graph.operation(op_id) else { continue };
                if !matches!(op.kind(), OperationKind::Instance | OperationKind::Blackbox) {
                    continue;
                }
                let Some(module) = op.attr_string("moduleName") else { continue };
                if module.is_empty() {
                    continue;
                }
                instances_by_module
                    .entry(module.to_string())
                    .or_default()
                    .push((name.clone(), op_id));
            }
        }

        let mut outputs_by_module: BTreeMap<String, Vec<(String, i64, bool)>> = BTreeMap::new();
        for pending in &self.pending_outputs {
            outputs_by_module
                .entry(pending.module.clone())
                .or_default()
                .push((pending.port.clone(), pending.width, pending.signed));
        }
        for (module, ports) in outputs_by_module {
            let Some(instances) = instances_by_module.get(&module) else { continue };
            for (graph_name, op_id) in instances.clone() {
                for (port, width, signed) in &ports {
                    let Some(graph) = netlist.find_graph_mut(&graph_name) else { continue };
                    if let Err(message) =
                        self.ensure_instance_output(graph, op_id, port, *width, *signed)
                    {
                        diags.error(PASS_ID, message, format!("graph '{graph_name}'"));
                    }
                }
            }
        }

        let mut pending_by_module: BTreeMap<String, Vec<(String, i64, bool)>> = BTreeMap::new();
        for pending in &self.pending_inputs {
            pending_by_module
                .entry(pending.module.clone())
                .or_default()
                .push((pending.port.clone(), pending.width, pending.signed));
        }

        for (module, ports) in pending_by_module {
            let Some(instances) = instances_by_module.get(&module) else { continue };
            for (graph_name, op_id) in instances {
                for (port, width, signed) in &ports {
                    let already = {
                        let Some(graph) = netlist.find_graph(graph_name) else { continue };
                        let Some(op) = graph.operation(*op_id) else { continue };
                        op.attr_string_array("inputPortName")
                            .is_some_and(|names| names.iter().any(|n| n == port))
                    };
                    if already {
                        continue;
                    }
                    let Some(graph) = netlist.find_graph_mut(graph_name) else { continue };
                    let pad = match self.pad_input(graph, *width, *signed) {
                        Ok(value) => value,
                        Err(message) => {
                            diags.error(PASS_ID, message, format!("graph '{graph_name}'"));
                            continue;
                        }
                    };
                    if let Err(message) =
                        self.ensure_instance_input(graph, diags, *op_id, port, pad)
                    {
                        diags.error(PASS_ID, message, format!("graph '{graph_name}'"));
                    }
                }
            }
        }
    }
}

impl Pass for XmrResolvePass {
    fn id(&self) -> &str {
        PASS_ID
    }

    fn description(&self) -> &str {
        "Resolve hierarchical references by adding ports and instance connections"
    }

    fn run(&mut self, ctx: &mut PassContext<'_>) -> PassResult {
        let mut result = PassResult::default();
        let graph_count = ctx.netlist.graph_count();
        ctx.logger.debug(PASS_ID, &format!("begin graphs={graph_count}"));

        let mut resolver = Resolver::default();
        let mut xmr_ops = 0usize;
        let mut xmr_reads = 0usize;
        let mut xmr_writes = 0usize;

        struct XmrSite {
            graph: String,
            op_id: OperationId,
            is_read: bool,
            path: Option<String>,
            context: String,
            operands: Vec<ValueId>,
            results: Vec<ValueId>,
            event_edges: Option<Vec<String>>,
        }

        let mut sites: Vec<XmrSite> = Vec::new();
        for name in ctx.netlist.graph_order().to_vec() {
            let Some(graph) = ctx.netlist.find_graph(&name) else { continue };
            for op_id in graph.operations() {
                let Some(op) = graph.operation(op_id) else { continue };
                let is_read = match op.kind() {
                    OperationKind::XmrRead => true,
                    OperationKind::XmrWrite => false,
                    _ => continue,
                };
                xmr_ops += 1;
                if is_read {
                    xmr_reads += 1;
                } else {
                    xmr_writes += 1;
                }
                sites.push(XmrSite {
                    graph: name.clone(),
                    op_id,
                    is_read,
                    path: op.attr_string("xmrPath").map(str::to_string),
                    context: op_context(graph, op_id),
                    operands: op.operands().to_vec(),
                    results: op.results().to_vec(),
                    event_edges: op
                        .attr_string_array("eventEdge")
                        .map(<[String]>::to_vec),
                });
            }
        }

        for site in sites {
            ctx.logger.trace(
                PASS_ID,
                &format!(
                    "xmr {} graph={} path={}",
                    if site.is_read { "read" } else { "write" },
                    site.graph,
                    site.path.as_deref().unwrap_or("<missing>")
                ),
            );
            let Some(path) = site.path else {
                ctx.diags.warning(
                    PASS_ID,
                    "XMR op missing xmrPath attribute".to_string(),
                    site.context,
                );
                continue;
            };

            if site.is_read {
                if site.results.is_empty() {
                    ctx.diags.warning(
                        PASS_ID,
                        "XMR read missing result".to_string(),
                        site.context,
                    );
                    if let Some(graph) = ctx.netlist.find_graph_mut(&site.graph) {
                        if graph.erase_op(site.op_id).is_ok() {
                            resolver.changed = true;
                        }
                    }
                    continue;
                }
                let replacement = resolver.resolve_read(
                    ctx.netlist,
                    ctx.diags,
                    &site.graph,
                    &site.context,
                    &path,
                );
                let Some(replacement) = replacement else { continue };
                if let Some(graph) = ctx.netlist.find_graph_mut(&site.graph) {
                    if let Err(e) = graph.replace_all_uses(site.results[0], replacement) {
                        ctx.diags.error(PASS_ID, e.to_string(), site.context);
                        result.failed = true;
                        continue;
                    }
                    if let Err(e) = graph.erase_op(site.op_id) {
                        ctx.diags.error(PASS_ID, e.to_string(), site.context);
                        result.failed = true;
                        continue;
                    }
                    resolver.changed = true;
                }
            } else {
                let resolved = resolver.resolve_write(
                    ctx.netlist,
                    ctx.diags,
                    &site.graph,
                    &site.context,
                    &path,
                    &site.operands,
                    site.event_edges.as_deref(),
                );
                if resolved {
                    if let Some(graph) = ctx.netlist.find_graph_mut(&site.graph) {
                        if let Err(e) = graph.erase_op(site.op_id) {
                            ctx.diags.error(PASS_ID, e.to_string(), site.context);
                            result.failed = true;
                            continue;
                        }
                        resolver.changed = true;
                    }
                }
            }
        }

        resolver.reconcile_remaining_instances(ctx.netlist, ctx.diags);

        result.changed = resolver.changed;
        ctx.logger.debug(
            PASS_ID,
            &format!(
                "xmr ops={xmr_ops}, reads={xmr_reads}, writes={xmr_writes}, newInputPorts={}, newOutputPorts={}, changed={}",
                resolver.pending_inputs.len(),
                resolver.pending_outputs.len(),
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
    use crate::pass::{PassDiagnostics, PassManager};

    fn run_xmr(netlist: &mut Netlist) -> (crate::pass::TransformResult, PassDiagnostics) {
        let mut manager = PassManager::new();
        manager.add_pass(Box::new(XmrResolvePass::new()));
        let mut diags = PassDiagnostics::new();
        let result = manager.run(netlist, &mut diags, &Logger::new());
        (result, diags)
    }

    fn add_instance(graph: &mut Graph, name: &str, module: &str) -> OperationId {
        let sym = graph.intern(name);
        let op = graph
            .create_operation(OperationKind::Instance, sym)
            .expect("instance");
        graph
            .set_attr(op, "moduleName", AttributeValue::String(module.to_string()))
            .expect("attr");
        graph
            .set_attr(op, "instanceName", AttributeValue::String(name.to_string()))
            .expect("attr");
        graph
            .set_attr(op, "inputPortName", AttributeValue::StringArray(Vec::new()))
            .expect("attr");
        graph
            .set_attr(op, "outputPortName", AttributeValue::StringArray(Vec::new()))
            .expect("attr");
        graph
            .set_attr(op, "inoutPortName", AttributeValue::StringArray(Vec::new()))
            .expect("attr");
        op
    }

    fn has_xmr_ops(graph: &Graph) -> bool {
        graph.operations().any(|id| {
            graph
                .operation(id)
                .is_some_and(|op| matches!(op.kind(), OperationKind::XmrRead | OperationKind::XmrWrite))
        })
    }

    #[test]
    fn missing_instance_warns_and_keeps_op() {
        let mut netlist = Netlist::new();
        let top = netlist.create_graph("top").expect("top");
        let r_sym = top.intern("r");
        let r = top.create_value(r_sym, 8, false, ValueType::Logic).expect("r");
        let op_sym = top.intern("xmr0");
        let op = top
            .create_operation(OperationKind::XmrRead, op_sym)
            .expect("op");
        top.add_result(op, r).expect("result");
        top.set_attr(op, "xmrPath", AttributeValue::String("u_ghost.sig".to_string()))
            .expect("attr");

        let (result, diags) = run_xmr(&mut netlist);
        assert!(result.success);
        assert!(!diags.is_empty());
        let top = netlist.find_graph("top").expect("top");
        assert!(has_xmr_ops(top));
    }

    #[test]
    fn register_storage_write_creates_write_port() {
        let mut netlist = Netlist::new();
        {
            let leaf = netlist.create_graph("leaf").expect("leaf");
            let reg_sym = leaf.intern("reg_a");
            let reg = leaf
                .create_operation(OperationKind::Register, reg_sym)
                .expect("reg");
            leaf.set_attr(reg, "width", AttributeValue::Int(8)).expect("attr");
            leaf.set_attr(reg, "isSigned", AttributeValue::Bool(false)).expect("attr");
        }
        {
            let top = netlist.create_graph("top").expect("top");
            add_instance(top, "u_leaf", "leaf");
            let mut mk = |name: &str, width: i64| {
                let sym = top.intern(name);
                top.create_value(sym, width, false, ValueType::Logic).expect("value")
            };
            let cond = mk("cond", 1);
            let data = mk("data", 8);
            let mask = mk("mask", 8);
            let clk = mk("clk", 1);
            let w_sym = top.intern("xmr_w0");
            let w = top
                .create_operation(OperationKind::XmrWrite, w_sym)
                .expect("w");
            for value in [cond, data, mask, clk] {
                top.add_operand(w, value).expect("operand");
            }
            top.set_attr(w, "xmrPath", AttributeValue::String("u_leaf.reg_a".to_string()))
                .expect("attr");
            top.set_attr(
                w,
                "eventEdge",
                AttributeValue::StringArray(vec!["posedge".to_string()]),
            )
            .expect("attr");
        }
        netlist.mark_as_top("top").expect("top");

        let (result, diags) = run_xmr(&mut netlist);
        assert!(result.success, "{:?}", diags.messages());

        let top = netlist.find_graph("top").expect("top");
        assert!(!has_xmr_ops(top));

        let leaf = netlist.find_graph("leaf").expect("leaf");
        let write_port = leaf.operations().find(|id| {
            leaf.operation(*id)
                .is_some_and(|op| op.kind() == OperationKind::RegisterWritePort)
        });
        let write_port = write_port.expect("write port exists");
        let op = leaf.operation(write_port).expect("op");
        assert_eq!(op.attr_string("regSymbol"), Some("reg_a"));
        assert_eq!(
            op.attr_string_array("eventEdge"),
            Some(&["posedge".to_string()][..])
        );
        assert_eq!(op.operands().len(), 4);

        // The instance gained one __xmr_w_ input per operand.
        let inst = top.operations().find(|id| {
            top.operation(*id)
                .is_some_and(|op| op.kind() == OperationKind::Instance)
        });
        let inst_op = top.operation(inst.expect("instance")).expect("inst");
        let names = inst_op.attr_string_array("inputPortName").expect("names");
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|n| n.starts_with("__xmr_w_")));
        top.validate().expect("top invariants");
        leaf.validate().expect("leaf invariants");
    }

    #[test]
    fn write_to_plain_value_replaces_driver() {
        let mut netlist = Netlist::new();
        {
            let leaf = netlist.create_graph("leaf").expect("leaf");
            let t_sym = leaf.intern("t");
            let t = leaf.create_value(t_sym, 4, false, ValueType::Logic).expect("t");
            let c_sym = leaf.intern("c0");
            let c = leaf
                .create_operation(OperationKind::Constant, c_sym)
                .expect("c");
            leaf.add_result(c, t).expect("result");
            leaf.set_attr(c, "constValue", AttributeValue::String("4'h0".to_string()))
                .expect("attr");
        }
        {
            let top = netlist.create_graph("top").expect("top");
            add_instance(top, "u_leaf", "leaf");
            let d_sym = top.intern("drv");
            let d = top.create_value(d_sym, 4, false, ValueType::Logic).expect("d");
            let w_sym = top.intern("xmr_w0");
            let w = top
                .create_operation(OperationKind::XmrWrite, w_sym)
                .expect("w");
            top.add_operand(w, d).expect("operand");
            top.set_attr(w, "xmrPath", AttributeValue::String("u_leaf.t".to_string()))
                .expect("attr");
        }

        let (result, diags) = run_xmr(&mut netlist);
        assert!(result.success, "{:?}", diags.messages());
        // Replacing an existing driver draws a warning.
        assert!(diags
            .messages()
            .iter()
            .any(|m| m.message.contains("replaces existing driver")));

        let leaf = netlist.find_graph("leaf").expect("leaf");
        let t = leaf.find_value_named("t");
        assert!(t.is_valid());
        let def = leaf.value(t).expect("t").defining_op();
        assert_eq!(
            leaf.operation(def).expect("def").kind(),
            OperationKind::Assign
        );
        leaf.validate().expect("leaf invariants");
    }

    #[test]
    fn pad_inputs_share_one_constant_per_width() {
        let mut netlist = Netlist::new();
        {
            let leaf = netlist.create_graph("leaf").expect("leaf");
            let t_sym = leaf.intern("t");
            leaf.create_value(t_sym, 4, false, ValueType::Logic).expect("t");
        }
        {
            let top = netlist.create_graph("top").expect("top");
            add_instance(top, "u_leaf", "leaf");
            let d_sym = top.intern("drv");
            let d = top.create_value(d_sym, 4, false, ValueType::Logic).expect("d");
            let w_sym = top.intern("xmr_w0");
            let w = top
                .create_operation(OperationKind::XmrWrite, w_sym)
                .expect("w");
            top.add_operand(w, d).expect("operand");
            top.set_attr(w, "xmrPath", AttributeValue::String("u_leaf.t".to_string()))
                .expect("attr");
        }
        {
            // A second, unrelated parent also instantiating `leaf`.
            let other = netlist.create_graph("other").expect("other");
            add_instance(other, "u_leaf2", "leaf");
        }

        let (result, diags) = run_xmr(&mut netlist);
        assert!(result.success, "{:?}", diags.messages());

        let other = netlist.find_graph("other").expect("other");
        let inst = other
            .operations()
            .find(|id| {
                other
                    .operation(*id)
                    .is_some_and(|op| op.kind() == OperationKind::Instance)
            })
            .expect("instance");
        let op = other.operation(inst).expect("inst");
        let names = op.attr_string_array("inputPortName").expect("names");
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("__xmr_w_"));
        // The pad driver is a zero constant in the off-path parent.
        let pad = op.operands()[0];
        let pad_def = other.value(pad).expect("pad").defining_op();
        let pad_op = other.operation(pad_def).expect("pad op");
        assert_eq!(pad_op.kind(), OperationKind::Constant);
        assert_eq!(pad_op.attr_string("constValue"), Some("4'b0"));
        other.validate().expect("other invariants");
    }
}
