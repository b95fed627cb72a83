//! # Graph View
//!
//! Immutable accessor bundle handed to emitters. A view is a borrow of a
//! [`Graph`], not a copy; it freezes nothing but offers only read access,
//! which is the contract the text and JSON emitters rely on.

use crate::graph::{Graph, InoutPort};
use crate::types::{AttributeValue, OperationId, OperationKind, SrcLoc, SymbolId, ValueId, ValueUser, ValueType};
use std::collections::BTreeMap;

/// Read-only window over one graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphView<'g> {
    graph: &'g Graph,
}

impl<'g> GraphView<'g> {
    /// Borrow a graph as a view.
    #[must_use]
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    /// The graph's symbol.
    #[must_use]
    pub fn symbol(&self) -> &'g str {
        self.graph.symbol()
    }

    /// Ordered live value ids.
    #[must_use]
    pub fn values(&self) -> Vec<ValueId> {
        self.graph.values().collect()
    }

    /// Ordered live operation ids.
    #[must_use]
    pub fn operations(&self) -> Vec<OperationId> {
        self.graph.operations().collect()
    }

    /// Resolve a symbol to text.
    #[must_use]
    pub fn text(&self, sym: SymbolId) -> &'g str {
        self.graph.text(sym)
    }

    // =========================================================================
    // VALUE ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn value_symbol(&self, id: ValueId) -> Option<SymbolId> {
        self.graph.value(id).map(|v| v.symbol())
    }

    #[must_use]
    pub fn value_width(&self, id: ValueId) -> Option<i64> {
        self.graph.value(id).map(|v| v.width())
    }

    #[must_use]
    pub fn value_signed(&self, id: ValueId) -> Option<bool> {
        self.graph.value(id).map(|v| v.is_signed())
    }

    #[must_use]
    pub fn value_type(&self, id: ValueId) -> Option<ValueType> {
        self.graph.value(id).map(|v| v.value_type())
    }

    #[must_use]
    pub fn value_is_input(&self, id: ValueId) -> Option<bool> {
        self.graph.value(id).map(|v| v.is_input())
    }

    #[must_use]
    pub fn value_is_output(&self, id: ValueId) -> Option<bool> {
        self.graph.value(id).map(|v| v.is_output())
    }

    #[must_use]
    pub fn value_def(&self, id: ValueId) -> Option<OperationId> {
        self.graph
            .value(id)
            .map(|v| v.defining_op())
            .filter(|op| op.is_valid())
    }

    #[must_use]
    pub fn value_users(&self, id: ValueId) -> &'g [ValueUser] {
        self.graph.value(id).map_or(&[], |v| v.users())
    }

    #[must_use]
    pub fn value_src_loc(&self, id: ValueId) -> Option<&'g SrcLoc> {
        self.graph.value(id).and_then(|v| v.src_loc())
    }

    // =========================================================================
    // OPERATION ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn op_kind(&self, id: OperationId) -> Option<OperationKind> {
        self.graph.operation(id).map(|op| op.kind())
    }

    #[must_use]
    pub fn op_symbol(&self, id: OperationId) -> Option<SymbolId> {
        self.graph.operation(id).map(|op| op.symbol())
    }

    #[must_use]
    pub fn op_operands(&self, id: OperationId) -> &'g [ValueId] {
        self.graph.operation(id).map_or(&[], |op| op.operands())
    }

    #[must_use]
    pub fn op_results(&self, id: OperationId) -> &'g [ValueId] {
        self.graph.operation(id).map_or(&[], |op| op.results())
    }

    #[must_use]
    pub fn op_attrs(&self, id: OperationId) -> Option<&'g BTreeMap<String, AttributeValue>> {
        self.graph.operation(id).map(|op| op.attrs())
    }

    #[must_use]
    pub fn op_src_loc(&self, id: OperationId) -> Option<&'g SrcLoc> {
        self.graph.operation(id).and_then(|op| op.src_loc())
    }

    // =========================================================================
    // PORTS
    // =========================================================================

    #[must_use]
    pub fn input_ports(&self) -> &'g BTreeMap<String, ValueId> {
        self.graph.input_ports()
    }

    #[must_use]
    pub fn output_ports(&self) -> &'g BTreeMap<String, ValueId> {
        self.graph.output_ports()
    }

    #[must_use]
    pub fn inout_ports(&self) -> &'g BTreeMap<String, InoutPort> {
        self.graph.inout_ports()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn view_exposes_order_and_fields() {
        let mut graph = Graph::new("demo");
        let a_sym = graph.intern("a");
        let out_sym = graph.intern("out");
        let a = graph.create_value(a_sym, 8, false, ValueType::Logic).expect("a");
        let out = graph.create_value(out_sym, 8, false, ValueType::Logic).expect("out");
        let op_sym = graph.intern("assign0");
        let op = graph
            .create_operation(OperationKind::Assign, op_sym)
            .expect("op");
        graph.add_operand(op, a).expect("operand");
        graph.add_result(op, out).expect("result");

        let view = GraphView::new(&graph);
        assert_eq!(view.values(), vec![a, out]);
        assert_eq!(view.operations(), vec![op]);
        assert_eq!(view.value_width(a), Some(8));
        assert_eq!(view.value_def(out), Some(op));
        assert_eq!(view.value_def(a), None);
        assert_eq!(view.op_kind(op), Some(OperationKind::Assign));
        assert_eq!(view.op_operands(op), &[a]);
        assert_eq!(view.text(view.op_symbol(op).expect("sym")), "assign0");
    }
}
