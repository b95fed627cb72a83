//! # Graph Store
//!
//! One SystemVerilog module's lowered IR: values, operations, and ports in
//! dense-ID arenas, with def-use edges maintained on every mutation.
//!
//! The store is the invariant boundary of the whole crate. Every public
//! mutation either applies completely and leaves the invariants holding
//! (symbol uniqueness, positive widths, single driver, use-list consistency,
//! port/flag coherence, attribute serializability) or fails with an
//! [`IrError`] and changes nothing.
//!
//! Erased slots are tombstoned; IDs are never reused within a graph's
//! lifetime so worklists held by passes stay sound across erasures.

use crate::symbols::SymbolTable;
use crate::types::{
    AttributeValue, GraphId, IrError, OperationId, OperationKind, SrcLoc, SymbolId, ValueId,
    ValueType, ValueUser,
};
use std::collections::BTreeMap;

// =============================================================================
// VALUE
// =============================================================================

/// A named SSA-like operand/result: typed, width-carrying, with a use-list
/// and an optional defining operation.
#[derive(Debug, Clone)]
pub struct Value {
    symbol: SymbolId,
    width: i64,
    signed: bool,
    ty: ValueType,
    is_input: bool,
    is_output: bool,
    is_inout: bool,
    defining_op: OperationId,
    users: Vec<ValueUser>,
    src_loc: Option<SrcLoc>,
}

impl Value {
    #[must_use]
    pub fn symbol(&self) -> SymbolId {
        self.symbol
    }

    #[must_use]
    pub fn width(&self) -> i64 {
        self.width
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        self.is_input
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        self.is_output
    }

    #[must_use]
    pub fn is_inout(&self) -> bool {
        self.is_inout
    }

    /// The operation producing this value, or the sentinel for inputs and
    /// undriven nets.
    #[must_use]
    pub fn defining_op(&self) -> OperationId {
        self.defining_op
    }

    /// Consumption sites, in the order the edges were created.
    #[must_use]
    pub fn users(&self) -> &[ValueUser] {
        &self.users
    }

    #[must_use]
    pub fn src_loc(&self) -> Option<&SrcLoc> {
        self.src_loc.as_ref()
    }
}

// =============================================================================
// OPERATION
// =============================================================================

/// A node of known kind with ordered operand and result lists and an
/// ordered attribute map.
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OperationKind,
    symbol: SymbolId,
    operands: Vec<ValueId>,
    results: Vec<ValueId>,
    attrs: BTreeMap<String, AttributeValue>,
    src_loc: Option<SrcLoc>,
}

impl Operation {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub fn symbol(&self) -> SymbolId {
        self.symbol
    }

    #[must_use]
    pub fn operands(&self) -> &[ValueId] {
        &self.operands
    }

    #[must_use]
    pub fn results(&self) -> &[ValueId] {
        &self.results
    }

    /// Attribute map in lexicographic key order.
    #[must_use]
    pub fn attrs(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attrs
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&AttributeValue> {
        self.attrs.get(key)
    }

    #[must_use]
    pub fn attr_string(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key) {
            Some(AttributeValue::String(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn attr_int(&self, key: &str) -> Option<i64> {
        match self.attrs.get(key) {
            Some(AttributeValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        match self.attrs.get(key) {
            Some(AttributeValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn attr_string_array(&self, key: &str) -> Option<&[String]> {
        match self.attrs.get(key) {
            Some(AttributeValue::StringArray(vs)) => Some(vs),
            _ => None,
        }
    }

    #[must_use]
    pub fn attr_bool_array(&self, key: &str) -> Option<&[bool]> {
        match self.attrs.get(key) {
            Some(AttributeValue::BoolArray(vs)) => Some(vs),
            _ => None,
        }
    }

    #[must_use]
    pub fn attr_int_array(&self, key: &str) -> Option<&[i64]> {
        match self.attrs.get(key) {
            Some(AttributeValue::IntArray(vs)) => Some(vs),
            _ => None,
        }
    }

    #[must_use]
    pub fn src_loc(&self) -> Option<&SrcLoc> {
        self.src_loc.as_ref()
    }
}

// =============================================================================
// PORTS
// =============================================================================

/// The value triple behind one inout port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InoutPort {
    /// Module-side view of the pad value.
    pub input: ValueId,
    /// Value driven out when the enable is active.
    pub output: ValueId,
    /// Output-enable control.
    pub enable: ValueId,
}

// =============================================================================
// GRAPH
// =============================================================================

/// One module's IR. Values and operations live in arenas indexed by dense
/// IDs; insertion order is tracked separately and drives all iteration.
///
/// Every graph carries an identity tag that is embedded in the IDs it hands
/// out; mutators reject IDs minted by a differently-tagged graph, which is
/// how the cross-graph ownership invariant is enforced.
#[derive(Debug, Clone)]
pub struct Graph {
    tag: GraphId,
    symbol: String,
    symbols: SymbolTable,
    values: Vec<Option<Value>>,
    operations: Vec<Option<Operation>>,
    value_order: Vec<ValueId>,
    op_order: Vec<OperationId>,
    value_by_sym: BTreeMap<SymbolId, ValueId>,
    op_by_sym: BTreeMap<SymbolId, OperationId>,
    input_ports: BTreeMap<String, ValueId>,
    output_ports: BTreeMap<String, ValueId>,
    inout_ports: BTreeMap<String, InoutPort>,
}

impl Graph {
    /// Create an empty graph with the default identity. Netlists call
    /// [`Self::with_tag`] through [`crate::netlist::Netlist::create_graph`]
    /// so that every member graph gets a distinct tag; graphs created
    /// directly share `GraphId(0)`.
    #[must_use]
    pub fn new(symbol: &str) -> Self {
        Self::with_tag(symbol, GraphId(0))
    }

    /// Create an empty graph under an explicit identity tag.
    #[must_use]
    pub(crate) fn with_tag(symbol: &str, tag: GraphId) -> Self {
        Self {
            tag,
            symbol: symbol.to_string(),
            symbols: SymbolTable::new(),
            values: Vec::new(),
            operations: Vec::new(),
            value_order: Vec::new(),
            op_order: Vec::new(),
            value_by_sym: BTreeMap::new(),
            op_by_sym: BTreeMap::new(),
            input_ports: BTreeMap::new(),
            output_ports: BTreeMap::new(),
            inout_ports: BTreeMap::new(),
        }
    }

    /// The graph's identity tag, embedded in every ID it mints.
    #[must_use]
    pub fn id(&self) -> GraphId {
        self.tag
    }

    /// The graph's own symbol (module name) within the netlist.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub(crate) fn set_symbol(&mut self, symbol: &str) {
        self.symbol = symbol.to_string();
    }

    /// Re-stamp the graph and every embedded ID with a fresh identity.
    /// Used by deep clones so a clone's IDs do not alias its source's.
    pub(crate) fn retag(&mut self, tag: GraphId) {
        self.tag = tag;
        for slot in self.values.iter_mut().flatten() {
            if slot.defining_op.is_valid() {
                slot.defining_op = OperationId::new(tag, slot.defining_op.index() as u32);
            }
            for user in &mut slot.users {
                user.operation = OperationId::new(tag, user.operation.index() as u32);
            }
        }
        for slot in self.operations.iter_mut().flatten() {
            for value in &mut slot.operands {
                *value = ValueId::new(tag, value.index() as u32);
            }
            for value in &mut slot.results {
                *value = ValueId::new(tag, value.index() as u32);
            }
        }
        for id in &mut self.value_order {
            *id = ValueId::new(tag, id.index() as u32);
        }
        for id in &mut self.op_order {
            *id = OperationId::new(tag, id.index() as u32);
        }
        for id in self.value_by_sym.values_mut() {
            *id = ValueId::new(tag, id.index() as u32);
        }
        for id in self.op_by_sym.values_mut() {
            *id = OperationId::new(tag, id.index() as u32);
        }
        for id in self.input_ports.values_mut() {
            *id = ValueId::new(tag, id.index() as u32);
        }
        for id in self.output_ports.values_mut() {
            *id = ValueId::new(tag, id.index() as u32);
        }
        for port in self.inout_ports.values_mut() {
            port.input = ValueId::new(tag, port.input.index() as u32);
            port.output = ValueId::new(tag, port.output.index() as u32);
            port.enable = ValueId::new(tag, port.enable.index() as u32);
        }
    }

    // =========================================================================
    // SYMBOLS
    // =========================================================================

    /// The graph's interner.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Intern a string in this graph's table.
    pub fn intern(&mut self, text: &str) -> SymbolId {
        self.symbols.intern(text)
    }

    /// Text for a symbol; the sentinel maps to the empty string.
    #[must_use]
    pub fn text(&self, sym: SymbolId) -> &str {
        self.symbols.text(sym)
    }

    /// Mark an identifier as declared (kept alive by dead-code elimination).
    pub fn mark_declared(&mut self, sym: SymbolId) {
        self.symbols.mark_declared(sym);
    }

    /// Mint a fresh internal value symbol.
    pub fn make_internal_val_sym(&mut self) -> SymbolId {
        self.symbols.make_internal_val_sym()
    }

    /// Mint a fresh internal operation symbol.
    pub fn make_internal_op_sym(&mut self) -> SymbolId {
        self.symbols.make_internal_op_sym()
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Create a value. Fails on non-positive width or a symbol already used
    /// by another value.
    pub fn create_value(
        &mut self,
        sym: SymbolId,
        width: i64,
        signed: bool,
        ty: ValueType,
    ) -> Result<ValueId, IrError> {
        if width <= 0 {
            return Err(IrError::InvalidWidth {
                symbol: self.text(sym).to_string(),
                width,
            });
        }
        if self.value_by_sym.contains_key(&sym) {
            return Err(IrError::DuplicateSymbol(self.text(sym).to_string()));
        }
        let id = ValueId::new(self.tag, self.values.len() as u32);
        self.values.push(Some(Value {
            symbol: sym,
            width,
            signed,
            ty,
            is_input: false,
            is_output: false,
            is_inout: false,
            defining_op: OperationId::invalid(),
            users: Vec::new(),
            src_loc: None,
        }));
        self.value_order.push(id);
        self.value_by_sym.insert(sym, id);
        Ok(id)
    }

    /// Create an operation with empty operand and result lists.
    pub fn create_operation(
        &mut self,
        kind: OperationKind,
        sym: SymbolId,
    ) -> Result<OperationId, IrError> {
        if self.op_by_sym.contains_key(&sym) {
            return Err(IrError::DuplicateSymbol(self.text(sym).to_string()));
        }
        let id = OperationId::new(self.tag, self.operations.len() as u32);
        self.operations.push(Some(Operation {
            kind,
            symbol: sym,
            operands: Vec::new(),
            results: Vec::new(),
            attrs: BTreeMap::new(),
            src_loc: None,
        }));
        self.op_order.push(id);
        self.op_by_sym.insert(sym, id);
        Ok(id)
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Live value behind an id, if any. IDs minted by another graph are
    /// never resolved, even when their index happens to be in range.
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        if id.owner() != self.tag {
            return None;
        }
        self.values.get(id.index()).and_then(Option::as_ref)
    }

    /// Live operation behind an id, if any. Foreign IDs never resolve.
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        if id.owner() != self.tag {
            return None;
        }
        self.operations.get(id.index()).and_then(Option::as_ref)
    }

    fn value_checked(&self, id: ValueId) -> Result<&Value, IrError> {
        self.value(id)
            .ok_or_else(|| IrError::UnknownSymbol(format!("value #{}", id.index())))
    }

    fn value_mut(&mut self, id: ValueId) -> Result<&mut Value, IrError> {
        if id.owner() != self.tag {
            return Err(IrError::UnknownSymbol(format!("value #{}", id.index())));
        }
        self.values
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| IrError::UnknownSymbol(format!("value #{}", id.index())))
    }

    fn op_checked(&self, id: OperationId) -> Result<&Operation, IrError> {
        self.operation(id)
            .ok_or_else(|| IrError::UnknownSymbol(format!("operation #{}", id.index())))
    }

    fn op_mut(&mut self, id: OperationId) -> Result<&mut Operation, IrError> {
        if id.owner() != self.tag {
            return Err(IrError::UnknownSymbol(format!("operation #{}", id.index())));
        }
        self.operations
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| IrError::UnknownSymbol(format!("operation #{}", id.index())))
    }

    /// Cross-graph ownership guard for edge mutators: both the operation
    /// and the value must have been minted by this graph.
    fn check_owned(&self, op: OperationId, value: ValueId) -> Result<(), IrError> {
        if op.owner() == self.tag && value.owner() == self.tag {
            return Ok(());
        }
        let operation = self
            .operation(op)
            .map(|o| self.text(o.symbol()).to_string())
            .unwrap_or_else(|| format!("#{}", op.index()));
        let value = self
            .value(value)
            .map(|v| self.text(v.symbol()).to_string())
            .unwrap_or_else(|| format!("#{}", value.index()));
        Err(IrError::CrossGraph { operation, value })
    }

    /// Value id for a symbol, or the sentinel.
    #[must_use]
    pub fn find_value(&self, sym: SymbolId) -> ValueId {
        self.value_by_sym.get(&sym).copied().unwrap_or_default()
    }

    /// Value id for a name, or the sentinel.
    #[must_use]
    pub fn find_value_named(&self, name: &str) -> ValueId {
        let sym = self.symbols.lookup(name);
        if sym.is_valid() { self.find_value(sym) } else { ValueId::invalid() }
    }

    /// Operation id for a symbol, or the sentinel.
    #[must_use]
    pub fn find_operation(&self, sym: SymbolId) -> OperationId {
        self.op_by_sym.get(&sym).copied().unwrap_or_default()
    }

    /// Operation id for a name, or the sentinel.
    #[must_use]
    pub fn find_operation_named(&self, name: &str) -> OperationId {
        let sym = self.symbols.lookup(name);
        if sym.is_valid() { self.find_operation(sym) } else { OperationId::invalid() }
    }

    /// Live values in creation order.
    pub fn values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.value_order.iter().copied().filter(|id| self.value(*id).is_some())
    }

    /// Live operations in creation order.
    pub fn operations(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.op_order.iter().copied().filter(|id| self.operation(*id).is_some())
    }

    /// Input port map in lexicographic name order.
    #[must_use]
    pub fn input_ports(&self) -> &BTreeMap<String, ValueId> {
        &self.input_ports
    }

    /// Output port map in lexicographic name order.
    #[must_use]
    pub fn output_ports(&self) -> &BTreeMap<String, ValueId> {
        &self.output_ports
    }

    /// Inout port map in lexicographic name order.
    #[must_use]
    pub fn inout_ports(&self) -> &BTreeMap<String, InoutPort> {
        &self.inout_ports
    }

    /// Value bound to the named input port, or the sentinel.
    #[must_use]
    pub fn input_port_value(&self, name: &str) -> ValueId {
        self.input_ports.get(name).copied().unwrap_or_default()
    }

    /// Value bound to the named output port, or the sentinel.
    #[must_use]
    pub fn output_port_value(&self, name: &str) -> ValueId {
        self.output_ports.get(name).copied().unwrap_or_default()
    }

    /// True if the value is bound to any port of any class.
    #[must_use]
    pub fn is_port_bound(&self, id: ValueId) -> bool {
        self.input_ports.values().any(|v| *v == id)
            || self.output_ports.values().any(|v| *v == id)
            || self
                .inout_ports
                .values()
                .any(|p| p.input == id || p.output == id || p.enable == id)
    }

    // =========================================================================
    // EDGE MAINTENANCE
    // =========================================================================

    fn remove_user_entries(&mut self, op: OperationId, value: ValueId) -> Result<(), IrError> {
        let v = self.value_mut(value)?;
        v.users.retain(|u| u.operation != op);
        Ok(())
    }

    fn rehook_operands(&mut self, op: OperationId) -> Result<(), IrError> {
        let operands = self.op_checked(op)?.operands.clone();
        // Clear every edge from this op, then re-add one entry per slot.
        let mut unique = operands.clone();
        unique.sort_unstable();
        unique.dedup();
        for value in unique {
            self.remove_user_entries(op, value)?;
        }
        for (i, value) in operands.iter().enumerate() {
            self.value_mut(*value)?.users.push(ValueUser {
                operation: op,
                operand_index: i,
            });
        }
        Ok(())
    }

    fn check_result_drivable(&self, op: OperationId, value: ValueId) -> Result<(), IrError> {
        let v = self.value_checked(value)?;
        if v.defining_op.is_valid() {
            return Err(IrError::DoubleDriver {
                value: self.text(v.symbol).to_string(),
            });
        }
        if v.is_input {
            return Err(IrError::Structural {
                operation: self.text(self.op_checked(op)?.symbol).to_string(),
                message: format!("cannot drive input value '{}'", self.text(v.symbol)),
            });
        }
        Ok(())
    }

    fn check_assign_width(&self, op: OperationId, value: ValueId, as_result: bool) -> Result<(), IrError> {
        let operation = self.op_checked(op)?;
        if operation.kind != OperationKind::Assign {
            return Ok(());
        }
        let peer = if as_result {
            operation.operands.first().copied()
        } else {
            operation.results.first().copied()
        };
        if let Some(peer) = peer {
            let expected = self.value_checked(peer)?.width;
            let actual = self.value_checked(value)?.width;
            if expected != actual {
                return Err(IrError::Structural {
                    operation: self.text(operation.symbol).to_string(),
                    message: format!("assign width mismatch: {expected} vs {actual}"),
                });
            }
        }
        Ok(())
    }

    /// Append an operand; the value's use-list gains `(op, index)`. Fails
    /// when the value was minted by another graph.
    pub fn add_operand(&mut self, op: OperationId, value: ValueId) -> Result<(), IrError> {
        self.check_owned(op, value)?;
        self.value_checked(value)?;
        self.check_assign_width(op, value, false)?;
        let index = self.op_checked(op)?.operands.len();
        self.op_mut(op)?.operands.push(value);
        self.value_mut(value)?.users.push(ValueUser {
            operation: op,
            operand_index: index,
        });
        Ok(())
    }

    /// Append a result; the value's defining op is set. Fails on a second
    /// driver, on driving an input value, or on a cross-graph value.
    pub fn add_result(&mut self, op: OperationId, value: ValueId) -> Result<(), IrError> {
        self.check_owned(op, value)?;
        self.check_result_drivable(op, value)?;
        self.check_assign_width(op, value, true)?;
        self.op_mut(op)?.results.push(value);
        self.value_mut(value)?.defining_op = op;
        Ok(())
    }

    /// Insert an operand at `index`, shifting subsequent operands; use-list
    /// indices for the shifted entries are updated.
    pub fn insert_operand(
        &mut self,
        op: OperationId,
        index: usize,
        value: ValueId,
    ) -> Result<(), IrError> {
        self.check_owned(op, value)?;
        self.value_checked(value)?;
        let operation = self.op_checked(op)?;
        if index > operation.operands.len() {
            return Err(IrError::IndexOutOfRange {
                operation: self.text(operation.symbol).to_string(),
                index,
            });
        }
        self.op_mut(op)?.operands.insert(index, value);
        self.rehook_operands(op)
    }

    /// Insert a result at `index`, shifting subsequent results.
    pub fn insert_result(
        &mut self,
        op: OperationId,
        index: usize,
        value: ValueId,
    ) -> Result<(), IrError> {
        self.check_owned(op, value)?;
        self.check_result_drivable(op, value)?;
        let operation = self.op_checked(op)?;
        if index > operation.results.len() {
            return Err(IrError::IndexOutOfRange {
                operation: self.text(operation.symbol).to_string(),
                index,
            });
        }
        self.op_mut(op)?.results.insert(index, value);
        self.value_mut(value)?.defining_op = op;
        Ok(())
    }

    /// Replace the operand at `index`, removing the old edge.
    pub fn replace_operand(
        &mut self,
        op: OperationId,
        index: usize,
        value: ValueId,
    ) -> Result<(), IrError> {
        self.check_owned(op, value)?;
        self.value_checked(value)?;
        let operation = self.op_checked(op)?;
        if index >= operation.operands.len() {
            return Err(IrError::IndexOutOfRange {
                operation: self.text(operation.symbol).to_string(),
                index,
            });
        }
        self.op_mut(op)?.operands[index] = value;
        self.rehook_operands(op)
    }

    /// Replace the result at `index`; the old value loses its driver, the
    /// new one is checked against the single-driver invariant.
    pub fn replace_result(
        &mut self,
        op: OperationId,
        index: usize,
        value: ValueId,
    ) -> Result<(), IrError> {
        self.check_owned(op, value)?;
        let operation = self.op_checked(op)?;
        if index >= operation.results.len() {
            return Err(IrError::IndexOutOfRange {
                operation: self.text(operation.symbol).to_string(),
                index,
            });
        }
        let old = operation.results[index];
        if old != value {
            self.check_result_drivable(op, value)?;
            self.value_mut(old)?.defining_op = OperationId::invalid();
            self.op_mut(op)?.results[index] = value;
            self.value_mut(value)?.defining_op = op;
        }
        Ok(())
    }

    /// Rewrite every operand pointing at `old` to point at `new`, moving the
    /// use-list entries atomically, and rebind any output ports currently
    /// bound to `old`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) -> Result<(), IrError> {
        if old == new {
            return Ok(());
        }
        self.value_checked(new)?;
        let moved: Vec<ValueUser> = std::mem::take(&mut self.value_mut(old)?.users);
        for user in &moved {
            let operation = self.op_mut(user.operation)?;
            if let Some(slot) = operation.operands.get_mut(user.operand_index) {
                *slot = new;
            }
        }
        self.value_mut(new)?.users.extend(moved);

        let rebind: Vec<String> = self
            .output_ports
            .iter()
            .filter(|(_, v)| **v == old)
            .map(|(name, _)| name.clone())
            .collect();
        for name in rebind {
            self.bind_output_port(&name, new)?;
        }
        Ok(())
    }

    // =========================================================================
    // ERASE
    // =========================================================================

    fn unhook_op(&mut self, op: OperationId) -> Result<(), IrError> {
        let operation = self.op_checked(op)?;
        let mut operands = operation.operands.clone();
        let results = operation.results.clone();
        operands.sort_unstable();
        operands.dedup();
        for value in operands {
            // Value may already be gone during cascading erase.
            if self.value(value).is_some() {
                self.remove_user_entries(op, value)?;
            }
        }
        for value in results {
            if let Ok(v) = self.value_mut(value) {
                if v.defining_op == op {
                    v.defining_op = OperationId::invalid();
                }
            }
        }
        Ok(())
    }

    fn drop_op_slot(&mut self, op: OperationId) -> Result<(), IrError> {
        let symbol = self.op_checked(op)?.symbol;
        self.op_by_sym.remove(&symbol);
        self.op_order.retain(|id| *id != op);
        self.operations[op.index()] = None;
        Ok(())
    }

    /// Erase an operation. Fails while any result still has users or is
    /// bound to a port; otherwise detaches operand edges, clears the
    /// results' defining op, and drops the node.
    pub fn erase_op(&mut self, op: OperationId) -> Result<(), IrError> {
        let operation = self.op_checked(op)?;
        let symbol_text = self.text(operation.symbol).to_string();
        for result in operation.results.clone() {
            let v = self.value_checked(result)?;
            if !v.users.is_empty() || self.is_port_bound(result) {
                return Err(IrError::OperationInUse {
                    operation: symbol_text.clone(),
                });
            }
        }
        self.unhook_op(op)?;
        self.drop_op_slot(op)
    }

    /// Erase without the liveness checks. For worklist callers that have
    /// already proved no users remain. Edges are still detached.
    pub fn erase_op_unchecked(&mut self, op: OperationId) -> Result<(), IrError> {
        self.unhook_op(op)?;
        self.drop_op_slot(op)
    }

    /// Erase a value. Fails while it has users, a defining op, or a port
    /// binding.
    pub fn erase_value(&mut self, id: ValueId) -> Result<(), IrError> {
        let v = self.value_checked(id)?;
        let symbol_text = self.text(v.symbol).to_string();
        if !v.users.is_empty() || v.defining_op.is_valid() {
            return Err(IrError::ValueInUse { value: symbol_text.clone() });
        }
        if self.is_port_bound(id) {
            return Err(IrError::ValueIsPort { value: symbol_text });
        }
        self.erase_value_unchecked(id)
    }

    /// Erase without the checks, for sweeps that have proved orphanhood.
    pub fn erase_value_unchecked(&mut self, id: ValueId) -> Result<(), IrError> {
        let symbol = self.value_checked(id)?.symbol;
        self.value_by_sym.remove(&symbol);
        self.value_order.retain(|v| *v != id);
        self.values[id.index()] = None;
        Ok(())
    }

    // =========================================================================
    // PORTS
    // =========================================================================

    /// Bind a value as a named input port and set its input flag.
    pub fn bind_input_port(&mut self, name: &str, value: ValueId) -> Result<(), IrError> {
        if self.input_ports.contains_key(name) {
            return Err(IrError::PortConflict { port: name.to_string() });
        }
        let v = self.value_checked(value)?;
        if v.is_output || v.is_inout || v.defining_op.is_valid() {
            return Err(IrError::PortConflict { port: name.to_string() });
        }
        self.value_mut(value)?.is_input = true;
        self.input_ports.insert(name.to_string(), value);
        Ok(())
    }

    /// Bind a value as a named output port. Rebinding an existing name moves
    /// the binding (the old value loses its output flag unless another port
    /// still references it).
    pub fn bind_output_port(&mut self, name: &str, value: ValueId) -> Result<(), IrError> {
        let v = self.value_checked(value)?;
        if v.is_input || v.is_inout {
            return Err(IrError::PortConflict { port: name.to_string() });
        }
        let previous = self.output_ports.insert(name.to_string(), value);
        self.value_mut(value)?.is_output = true;
        if let Some(old) = previous {
            if old != value && !self.output_ports.values().any(|v| *v == old) {
                self.value_mut(old)?.is_output = false;
            }
        }
        Ok(())
    }

    /// Bind an inout port's value triple; all three gain the inout role.
    pub fn bind_inout_port(
        &mut self,
        name: &str,
        input: ValueId,
        output: ValueId,
        enable: ValueId,
    ) -> Result<(), IrError> {
        if self.inout_ports.contains_key(name) {
            return Err(IrError::PortConflict { port: name.to_string() });
        }
        for id in [input, output, enable] {
            let v = self.value_checked(id)?;
            if v.is_input || v.is_output || v.is_inout {
                return Err(IrError::PortConflict { port: name.to_string() });
            }
        }
        for id in [input, output, enable] {
            self.value_mut(id)?.is_inout = true;
        }
        self.inout_ports
            .insert(name.to_string(), InoutPort { input, output, enable });
        Ok(())
    }

    // =========================================================================
    // ATTRIBUTES, LOCATIONS, RENAME
    // =========================================================================

    /// Set an attribute. Fails when the payload is not JSON-serializable.
    pub fn set_attr(
        &mut self,
        op: OperationId,
        key: &str,
        value: AttributeValue,
    ) -> Result<(), IrError> {
        if !value.is_json_serializable() {
            return Err(IrError::AttributeNotSerializable { key: key.to_string() });
        }
        self.op_mut(op)?.attrs.insert(key.to_string(), value);
        Ok(())
    }

    /// Attach or replace a value's source location.
    pub fn set_value_src_loc(&mut self, id: ValueId, loc: SrcLoc) -> Result<(), IrError> {
        self.value_mut(id)?.src_loc = Some(loc);
        Ok(())
    }

    /// Attach or replace an operation's source location.
    pub fn set_op_src_loc(&mut self, id: OperationId, loc: SrcLoc) -> Result<(), IrError> {
        self.op_mut(id)?.src_loc = Some(loc);
        Ok(())
    }

    /// Retag an operation's kind in place. Edges and attributes are kept;
    /// callers are responsible for kind-specific attribute fixups.
    pub fn set_operation_kind(&mut self, op: OperationId, kind: OperationKind) -> Result<(), IrError> {
        self.op_mut(op)?.kind = kind;
        Ok(())
    }

    /// Rename a value to a symbol not currently used by any value.
    pub fn set_value_symbol(&mut self, id: ValueId, sym: SymbolId) -> Result<(), IrError> {
        if self.value_by_sym.contains_key(&sym) {
            return Err(IrError::DuplicateSymbol(self.text(sym).to_string()));
        }
        let old = self.value_checked(id)?.symbol;
        self.value_by_sym.remove(&old);
        self.value_by_sym.insert(sym, id);
        self.value_mut(id)?.symbol = sym;
        Ok(())
    }

    // =========================================================================
    // INVARIANT CHECK
    // =========================================================================

    /// Full invariant check (§3.6). Used by the JSON parser after document
    /// construction and by tests after mutation sequences.
    pub fn validate(&self) -> Result<(), IrError> {
        let fail = |message: String| Err(IrError::Json(format!("graph '{}': {message}", self.symbol)));

        for id in self.values() {
            let v = self.value_checked(id)?;
            if v.width <= 0 {
                return fail(format!("value '{}' has non-positive width", self.text(v.symbol)));
            }
            if v.is_input && v.is_output {
                return fail(format!(
                    "value '{}' is both input and output",
                    self.text(v.symbol)
                ));
            }
            if v.is_input && v.defining_op.is_valid() {
                return fail(format!("input value '{}' has a driver", self.text(v.symbol)));
            }
            if v.defining_op.is_valid() {
                let def = self.op_checked(v.defining_op)?;
                if !def.results.contains(&id) {
                    return fail(format!(
                        "value '{}' names a driver that does not list it",
                        self.text(v.symbol)
                    ));
                }
            }
            // Use-list entries must point back at real operand slots, with
            // no duplicate (op, index) pairs.
            let mut seen = std::collections::BTreeSet::new();
            for user in &v.users {
                if !seen.insert((user.operation, user.operand_index)) {
                    return fail(format!(
                        "value '{}' has duplicate use entries",
                        self.text(v.symbol)
                    ));
                }
                let operation = self.op_checked(user.operation)?;
                if operation.operands.get(user.operand_index) != Some(&id) {
                    return fail(format!(
                        "value '{}' has a stale use entry",
                        self.text(v.symbol)
                    ));
                }
            }
        }

        let mut driven = std::collections::BTreeMap::new();
        for id in self.operations() {
            let operation = self.op_checked(id)?;
            for result in &operation.results {
                if driven.insert(*result, id).is_some() {
                    return fail(format!(
                        "value '{}' has two drivers",
                        self.text(self.value_checked(*result)?.symbol)
                    ));
                }
                if self.value_checked(*result)?.defining_op != id {
                    return fail(format!(
                        "operation '{}' result does not point back",
                        self.text(operation.symbol)
                    ));
                }
            }
            for (i, operand) in operation.operands.iter().enumerate() {
                let v = self.value_checked(*operand)?;
                let entry = ValueUser { operation: id, operand_index: i };
                if !v.users.contains(&entry) {
                    return fail(format!(
                        "operation '{}' operand {i} missing from use-list",
                        self.text(operation.symbol)
                    ));
                }
            }
            for value in operation.attrs.values() {
                if !value.is_json_serializable() {
                    return fail(format!(
                        "operation '{}' carries a non-serializable attribute",
                        self.text(operation.symbol)
                    ));
                }
            }
            self.validate_kind(id)?;
        }

        for (name, value) in &self.input_ports {
            let v = self.value_checked(*value)?;
            if !v.is_input || v.is_output {
                return fail(format!("input port '{name}' binding lost its role"));
            }
        }
        for (name, value) in &self.output_ports {
            if !self.value_checked(*value)?.is_output {
                return fail(format!("output port '{name}' binding lost its role"));
            }
        }
        for (name, port) in &self.inout_ports {
            for id in [port.input, port.output, port.enable] {
                let v = self.value_checked(id)?;
                if !v.is_inout || v.is_input || v.is_output {
                    return fail(format!("inout port '{name}' triple has mixed roles"));
                }
            }
        }
        Ok(())
    }

    /// Kind-specific structural rules (§3.6 item 9).
    fn validate_kind(&self, id: OperationId) -> Result<(), IrError> {
        let operation = self.op_checked(id)?;
        let structural = |message: &str| {
            Err(IrError::Structural {
                operation: self.text(operation.symbol).to_string(),
                message: message.to_string(),
            })
        };
        match operation.kind {
            OperationKind::Constant => {
                if operation.results.len() != 1 {
                    return structural("constant must have exactly one result");
                }
                if operation.attr_string("constValue").is_none() {
                    return structural("constant missing constValue attribute");
                }
            }
            OperationKind::Replicate => match operation.attr_int("rep") {
                Some(rep) if rep > 0 => {}
                Some(_) => return structural("replicate rep attribute must be positive"),
                None => return structural("replicate missing rep attribute"),
            },
            OperationKind::MemoryWritePort | OperationKind::MemoryMaskWritePort => {
                if operation.attr_string("memSymbol").is_none() {
                    return structural("memory write port missing memSymbol attribute");
                }
                match operation.attr_string_array("eventEdge") {
                    Some(edges) if !edges.is_empty() => {}
                    _ => return structural("memory write port missing eventEdge attribute"),
                }
            }
            OperationKind::RegisterWritePort => {
                if operation.attr_string("regSymbol").is_none() {
                    return structural("register write port missing regSymbol attribute");
                }
                match operation.attr_string_array("eventEdge") {
                    Some(edges) if !edges.is_empty() => {}
                    _ => return structural("register write port missing eventEdge attribute"),
                }
            }
            OperationKind::LatchWritePort => {
                if operation.attr_string("latchSymbol").is_none() {
                    return structural("latch write port missing latchSymbol attribute");
                }
            }
            OperationKind::XmrRead | OperationKind::XmrWrite => {
                if operation.attr_string("xmrPath").is_none() {
                    return structural("xmr operation missing xmrPath attribute");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_value(width: i64) -> (Graph, ValueId) {
        let mut graph = Graph::new("g");
        let sym = graph.intern("a");
        let value = graph
            .create_value(sym, width, false, ValueType::Logic)
            .expect("create value");
        (graph, value)
    }

    #[test]
    fn create_value_rejects_bad_width() {
        let mut graph = Graph::new("g");
        let sym = graph.intern("a");
        assert!(graph.create_value(sym, 0, false, ValueType::Logic).is_err());
        assert!(graph.create_value(sym, -3, false, ValueType::Logic).is_err());
    }

    #[test]
    fn create_value_rejects_duplicate_symbol() {
        let (mut graph, _) = graph_with_value(8);
        let sym = graph.intern("a");
        assert!(matches!(
            graph.create_value(sym, 8, false, ValueType::Logic),
            Err(IrError::DuplicateSymbol(_))
        ));
    }

    #[test]
    fn operand_edges_track_use_list() {
        let (mut graph, a) = graph_with_value(8);
        let op_sym = graph.intern("add0");
        let op = graph
            .create_operation(OperationKind::Add, op_sym)
            .expect("op");
        graph.add_operand(op, a).expect("operand");
        graph.add_operand(op, a).expect("operand");

        let users = graph.value(a).expect("value").users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].operand_index, 0);
        assert_eq!(users[1].operand_index, 1);
        graph.validate().expect("invariants");
    }

    #[test]
    fn double_driver_rejected() {
        let (mut graph, a) = graph_with_value(8);
        let sym1 = graph.intern("op1");
        let op1 = graph.create_operation(OperationKind::Add, sym1).expect("op1");
        let sym2 = graph.intern("op2");
        let op2 = graph.create_operation(OperationKind::Add, sym2).expect("op2");
        graph.add_result(op1, a).expect("first driver");
        assert!(matches!(
            graph.add_result(op2, a),
            Err(IrError::DoubleDriver { .. })
        ));
    }

    #[test]
    fn insert_operand_updates_indices() {
        let mut graph = Graph::new("g");
        let a_sym = graph.intern("a");
        let b_sym = graph.intern("b");
        let c_sym = graph.intern("c");
        let a = graph.create_value(a_sym, 8, false, ValueType::Logic).expect("a");
        let b = graph.create_value(b_sym, 8, false, ValueType::Logic).expect("b");
        let c = graph.create_value(c_sym, 8, false, ValueType::Logic).expect("c");
        let op_sym = graph.intern("cat0");
        let op = graph.create_operation(OperationKind::Concat, op_sym).expect("op");
        graph.add_operand(op, a).expect("operand a");
        graph.add_operand(op, b).expect("operand b");

        graph.insert_operand(op, 0, c).expect("insert");
        assert_eq!(graph.operation(op).expect("op").operands(), &[c, a, b]);
        assert_eq!(graph.value(a).expect("a").users()[0].operand_index, 1);
        assert_eq!(graph.value(b).expect("b").users()[0].operand_index, 2);
        graph.validate().expect("invariants");
    }

    #[test]
    fn replace_all_uses_moves_edges_and_ports() {
        let mut graph = Graph::new("g");
        let old_sym = graph.intern("old");
        let new_sym = graph.intern("new");
        let old = graph.create_value(old_sym, 4, false, ValueType::Logic).expect("old");
        let new = graph.create_value(new_sym, 4, false, ValueType::Logic).expect("new");
        let user_sym = graph.intern("not0");
        let user = graph.create_operation(OperationKind::Not, user_sym).expect("user");
        graph.add_operand(user, old).expect("operand");
        graph.bind_output_port("out", old).expect("port");

        graph.replace_all_uses(old, new).expect("replace");

        assert!(graph.value(old).expect("old").users().is_empty());
        assert_eq!(graph.value(new).expect("new").users().len(), 1);
        assert_eq!(graph.output_port_value("out"), new);
        assert!(!graph.value(old).expect("old").is_output());
        graph.validate().expect("invariants");
    }

    #[test]
    fn erase_op_refuses_live_results() {
        let mut graph = Graph::new("g");
        let a_sym = graph.intern("a");
        let r_sym = graph.intern("r");
        let a = graph.create_value(a_sym, 4, false, ValueType::Logic).expect("a");
        let r = graph.create_value(r_sym, 4, false, ValueType::Logic).expect("r");
        let def_sym = graph.intern("not0");
        let def = graph.create_operation(OperationKind::Not, def_sym).expect("def");
        graph.add_operand(def, a).expect("operand");
        graph.add_result(def, r).expect("result");
        let use_sym = graph.intern("not1");
        let consumer = graph.create_operation(OperationKind::Not, use_sym).expect("use");
        graph.add_operand(consumer, r).expect("operand");

        assert!(graph.erase_op(def).is_err());
        graph.erase_op(consumer).expect("erase consumer");
        graph.erase_op(def).expect("erase def");
        assert!(graph.value(r).expect("r").defining_op() == OperationId::invalid());
        assert!(graph.value(a).expect("a").users().is_empty());
        graph.validate().expect("invariants");
    }

    #[test]
    fn input_values_cannot_be_driven() {
        let (mut graph, a) = graph_with_value(4);
        graph.bind_input_port("a", a).expect("bind");
        let sym = graph.intern("c0");
        let op = graph.create_operation(OperationKind::Constant, sym).expect("op");
        assert!(graph.add_result(op, a).is_err());
    }

    #[test]
    fn port_roles_are_exclusive() {
        let (mut graph, a) = graph_with_value(4);
        graph.bind_input_port("a", a).expect("bind");
        assert!(graph.bind_output_port("out", a).is_err());
        assert!(graph.bind_input_port("a2", a).is_ok());
    }

    #[test]
    fn inout_triple_gets_inout_role() {
        let mut graph = Graph::new("g");
        let mut mk = |name: &str| {
            let sym = graph.intern(name);
            graph.create_value(sym, 1, false, ValueType::Logic).expect("value")
        };
        let i = mk("pad_i");
        let o = mk("pad_o");
        let e = mk("pad_oe");
        graph.bind_inout_port("pad", i, o, e).expect("bind");
        assert!(graph.value(i).expect("i").is_inout());
        assert!(graph.is_port_bound(e));
        graph.validate().expect("invariants");
    }

    #[test]
    fn assign_width_mismatch_rejected() {
        let mut graph = Graph::new("g");
        let a_sym = graph.intern("a");
        let b_sym = graph.intern("b");
        let a = graph.create_value(a_sym, 8, false, ValueType::Logic).expect("a");
        let b = graph.create_value(b_sym, 4, false, ValueType::Logic).expect("b");
        let sym = graph.intern("assign0");
        let op = graph.create_operation(OperationKind::Assign, sym).expect("op");
        graph.add_operand(op, a).expect("operand");
        assert!(graph.add_result(op, b).is_err());
    }

    #[test]
    fn non_serializable_attribute_rejected() {
        let mut graph = Graph::new("g");
        let sym = graph.intern("op0");
        let op = graph.create_operation(OperationKind::Add, sym).expect("op");
        assert!(graph.set_attr(op, "bad", AttributeValue::Double(f64::NAN)).is_err());
        assert!(graph.set_attr(op, "good", AttributeValue::Int(1)).is_ok());
    }

    #[test]
    fn rename_value_updates_lookup() {
        let (mut graph, a) = graph_with_value(4);
        let fresh = graph.intern("renamed");
        graph.set_value_symbol(a, fresh).expect("rename");
        assert_eq!(graph.find_value_named("renamed"), a);
        assert!(!graph.find_value_named("a").is_valid());
    }

    #[test]
    fn cross_graph_edges_are_rejected() {
        let mut netlist = crate::netlist::Netlist::new();
        let foreign = {
            let a = netlist.create_graph("a").expect("a");
            let sym = a.intern("v");
            a.create_value(sym, 4, false, ValueType::Logic).expect("v")
        };
        let b = netlist.create_graph("b").expect("b");
        let local_sym = b.intern("w");
        let local = b.create_value(local_sym, 4, false, ValueType::Logic).expect("w");
        let op_sym = b.intern("add0");
        let op = b.create_operation(OperationKind::Add, op_sym).expect("op");

        // Same arena index as a live value of `b`, but minted by `a`.
        assert_eq!(foreign.index(), local.index());
        assert!(matches!(
            b.add_operand(op, foreign),
            Err(IrError::CrossGraph { .. })
        ));
        assert!(matches!(
            b.add_result(op, foreign),
            Err(IrError::CrossGraph { .. })
        ));
        assert!(matches!(
            b.insert_operand(op, 0, foreign),
            Err(IrError::CrossGraph { .. })
        ));
        assert!(matches!(
            b.insert_result(op, 0, foreign),
            Err(IrError::CrossGraph { .. })
        ));

        b.add_operand(op, local).expect("local operand");
        assert!(matches!(
            b.replace_operand(op, 0, foreign),
            Err(IrError::CrossGraph { .. })
        ));
        let r_sym = b.intern("r");
        let r = b.create_value(r_sym, 4, false, ValueType::Logic).expect("r");
        b.add_result(op, r).expect("local result");
        assert!(matches!(
            b.replace_result(op, 0, foreign),
            Err(IrError::CrossGraph { .. })
        ));

        // Foreign ids never resolve through lookups either.
        assert!(b.value(foreign).is_none());
        b.validate().expect("invariants untouched");
    }

    #[test]
    fn structural_rules_checked_by_validate() {
        let mut graph = Graph::new("g");
        let v_sym = graph.intern("c");
        let v = graph.create_value(v_sym, 4, false, ValueType::Logic).expect("v");
        let sym = graph.intern("c0");
        let op = graph.create_operation(OperationKind::Constant, sym).expect("op");
        graph.add_result(op, v).expect("result");
        // Missing constValue attribute.
        assert!(graph.validate().is_err());
        graph
            .set_attr(op, "constValue", AttributeValue::String("4'h3".to_string()))
            .expect("attr");
        graph.validate().expect("invariants");
    }
}
