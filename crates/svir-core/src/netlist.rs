//! # Netlist
//!
//! A named collection of graphs sharing one namespace: insertion-ordered
//! graph map, alias registry (alternate lookup keys that do not own the
//! graph), and the ordered top-graph list.

use crate::graph::Graph;
use crate::types::{GraphId, IrError};
use std::collections::BTreeMap;

/// Collection of graphs keyed by symbol.
///
/// The netlist hands each member graph a distinct identity tag; IDs minted
/// by one member are rejected by every other member's mutators.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    graphs: BTreeMap<String, Graph>,
    graph_order: Vec<String>,
    aliases: BTreeMap<String, String>,
    tops: Vec<String>,
    next_graph_tag: u32,
}

impl Netlist {
    /// Create an empty netlist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph under a fresh symbol and a fresh identity tag. Fails
    /// if the symbol is already a graph name or an alias.
    pub fn create_graph(&mut self, name: &str) -> Result<&mut Graph, IrError> {
        if self.graphs.contains_key(name) || self.aliases.contains_key(name) {
            return Err(IrError::DuplicateSymbol(name.to_string()));
        }
        let tag = GraphId(self.next_graph_tag);
        self.next_graph_tag = self.next_graph_tag.saturating_add(1);
        self.graph_order.push(name.to_string());
        Ok(self
            .graphs
            .entry(name.to_string())
            .or_insert_with(|| Graph::with_tag(name, tag)))
    }

    /// Look up a graph by primary name, then by alias.
    #[must_use]
    pub fn find_graph(&self, name: &str) -> Option<&Graph> {
        if let Some(graph) = self.graphs.get(name) {
            return Some(graph);
        }
        self.aliases.get(name).and_then(|target| self.graphs.get(target))
    }

    /// Mutable variant of [`Self::find_graph`].
    pub fn find_graph_mut(&mut self, name: &str) -> Option<&mut Graph> {
        let target = if self.graphs.contains_key(name) {
            name.to_string()
        } else {
            self.aliases.get(name)?.clone()
        };
        self.graphs.get_mut(&target)
    }

    /// Register an alternate lookup key. Fails when the alias collides with
    /// an existing graph or alias, or the target graph is unknown.
    pub fn register_alias(&mut self, alias: &str, target: &str) -> Result<(), IrError> {
        if !self.graphs.contains_key(target) {
            return Err(IrError::UnknownGraph(target.to_string()));
        }
        if self.graphs.contains_key(alias) || self.aliases.contains_key(alias) {
            return Err(IrError::DuplicateSymbol(alias.to_string()));
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    /// Mark a graph as a compilation top. Idempotent; fails on unknown name.
    pub fn mark_as_top(&mut self, name: &str) -> Result<(), IrError> {
        if self.find_graph(name).is_none() {
            return Err(IrError::UnknownGraph(name.to_string()));
        }
        if !self.tops.iter().any(|t| t == name) {
            self.tops.push(name.to_string());
        }
        Ok(())
    }

    /// Top graphs in marking order.
    #[must_use]
    pub fn top_graphs(&self) -> &[String] {
        &self.tops
    }

    /// Graph names in insertion order.
    #[must_use]
    pub fn graph_order(&self) -> &[String] {
        &self.graph_order
    }

    /// Graphs in insertion order.
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graph_order.iter().filter_map(|name| self.graphs.get(name))
    }

    /// Number of graphs.
    #[must_use]
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Deep-copy a graph under a new name: values, operations, ports,
    /// attributes, source locations, and the declared-symbol set all come
    /// along, re-stamped with a fresh identity so the clone's IDs do not
    /// alias the source's. Top marking and aliases do not propagate.
    pub fn clone_graph(&mut self, src: &str, dst: &str) -> Result<(), IrError> {
        if self.graphs.contains_key(dst) || self.aliases.contains_key(dst) {
            return Err(IrError::DuplicateSymbol(dst.to_string()));
        }
        let mut copy = self
            .find_graph(src)
            .ok_or_else(|| IrError::UnknownGraph(src.to_string()))?
            .clone();
        copy.set_symbol(dst);
        let tag = GraphId(self.next_graph_tag);
        self.next_graph_tag = self.next_graph_tag.saturating_add(1);
        copy.retag(tag);
        self.graphs.insert(dst.to_string(), copy);
        self.graph_order.push(dst.to_string());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OperationKind, ValueType};

    #[test]
    fn create_and_find_graphs() {
        let mut netlist = Netlist::new();
        netlist.create_graph("alu").expect("create");
        netlist.create_graph("core").expect("create");
        assert!(netlist.create_graph("alu").is_err());
        assert!(netlist.find_graph("alu").is_some());
        assert!(netlist.find_graph("dsp").is_none());
        assert_eq!(netlist.graph_order(), &["alu", "core"]);
    }

    #[test]
    fn aliases_resolve_but_do_not_own() {
        let mut netlist = Netlist::new();
        netlist.create_graph("alu").expect("create");
        netlist.register_alias("alu_rev2", "alu").expect("alias");
        assert!(netlist.register_alias("alu_rev2", "alu").is_err());
        assert!(netlist.register_alias("x", "missing").is_err());
        assert_eq!(
            netlist.find_graph("alu_rev2").map(Graph::symbol),
            Some("alu")
        );
        assert_eq!(netlist.graph_count(), 1);
    }

    #[test]
    fn mark_as_top_is_idempotent() {
        let mut netlist = Netlist::new();
        netlist.create_graph("top").expect("create");
        assert!(netlist.mark_as_top("missing").is_err());
        netlist.mark_as_top("top").expect("mark");
        netlist.mark_as_top("top").expect("mark again");
        assert_eq!(netlist.top_graphs(), &["top"]);
    }

    #[test]
    fn clone_graph_deep_copies_contents() {
        let mut netlist = Netlist::new();
        {
            let graph = netlist.create_graph("src").expect("create");
            let v_sym = graph.intern("v");
            let v = graph.create_value(v_sym, 4, false, ValueType::Logic).expect("v");
            graph.mark_declared(v_sym);
            let op_sym = graph.intern("c0");
            let op = graph
                .create_operation(OperationKind::Constant, op_sym)
                .expect("op");
            graph.add_result(op, v).expect("result");
            graph
                .set_attr(op, "constValue", crate::types::AttributeValue::String("4'h3".into()))
                .expect("attr");
            graph.bind_output_port("v", v).expect("port");
        }
        netlist.mark_as_top("src").expect("top");
        netlist.clone_graph("src", "dst").expect("clone");

        let dst = netlist.find_graph("dst").expect("dst");
        assert_eq!(dst.symbol(), "dst");
        // The clone carries its own identity; IDs are re-stamped with it.
        let src_graph = netlist.find_graph("src").expect("src");
        assert_ne!(dst.id(), src_graph.id());
        let v = dst.find_value_named("v");
        assert!(v.is_valid());
        assert_eq!(v.owner(), dst.id());
        assert!(src_graph.value(v).is_none());
        assert!(dst.symbols().is_declared(dst.symbols().lookup("v")));
        assert_eq!(dst.output_port_value("v"), v);
        dst.validate().expect("invariants");

        // Top marking does not propagate to the clone.
        assert_eq!(netlist.top_graphs(), &["src"]);

        // Mutating the clone leaves the source untouched.
        let dst = netlist.find_graph_mut("dst").expect("dst");
        let extra = dst.intern("extra");
        dst.create_value(extra, 1, false, ValueType::Logic).expect("extra");
        assert!(!netlist.find_graph("src").expect("src").find_value_named("extra").is_valid());
    }
}
