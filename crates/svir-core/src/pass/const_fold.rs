//! # Constant Folding
//!
//! Reduces operations whose operands are all known constants into pooled
//! `Constant` operations. Five phases per graph, in order:
//!
//! 1. seed the constant store from existing `Constant` ops and dedupe them
//!    through the per-graph pool,
//! 2. iterative folding to a fixpoint (bounded by `max_iterations`),
//! 3. slice-of-concat simplification,
//! 4. dead-constant elimination,
//! 5. unsigned comparison simplification (`u >= 0`, `u <= MAX`).
//!
//! Port-bound values are never rewired by deduplication, and values of
//! non-`Logic` type are never folded. X/Z operands block folding unless
//! `allow_x_propagation` is set, in which case an X result draws a warning.

use crate::graph::Graph;
use crate::pass::{Pass, PassContext, PassDiagnostics, PassResult};
use crate::svint::SvInt;
use crate::types::{AttributeValue, OperationId, OperationKind, SrcLoc, ValueId, ValueType};
use std::collections::{BTreeMap, BTreeSet};

/// Options for [`ConstantFoldPass`].
#[derive(Debug, Clone, Copy)]
pub struct ConstantFoldOptions {
    /// Fixpoint bound for the iterative phase.
    pub max_iterations: u32,
    /// Fold through X/Z operands instead of skipping them.
    pub allow_x_propagation: bool,
}

impl Default for ConstantFoldOptions {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            allow_x_propagation: false,
        }
    }
}

/// The constant folding pass.
#[derive(Debug, Default)]
pub struct ConstantFoldPass {
    options: ConstantFoldOptions,
}

impl ConstantFoldPass {
    /// Pass with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass with explicit options.
    #[must_use]
    pub fn with_options(options: ConstantFoldOptions) -> Self {
        Self { options }
    }
}

const PASS_ID: &str = "const-fold";

/// Known constant bound to a value.
#[derive(Debug, Clone)]
struct ConstEntry {
    value: SvInt,
    has_unknown: bool,
}

/// Pool key: `(width, signedness, canonical literal)`.
type PoolKey = (i64, bool, String);

/// Per-graph folding state and statistics.
#[derive(Default)]
struct GraphFold {
    constants: BTreeMap<ValueId, ConstEntry>,
    pool: BTreeMap<PoolKey, ValueId>,
    folded_ops: BTreeSet<OperationId>,
    failed: bool,
    deduped_constants: usize,
    folded_count: usize,
    simplified_slices: usize,
    dead_constants: usize,
    unsigned_cmp: usize,
    ops_erased: usize,
}

fn op_context(graph: &Graph, op: OperationId) -> String {
    let sym = graph
        .operation(op)
        .map(|o| graph.text(o.symbol()).to_string())
        .unwrap_or_default();
    format!("graph '{}' op '{}'", graph.symbol(), sym)
}

impl GraphFold {
    fn error(&mut self, diags: &mut PassDiagnostics, graph: &Graph, op: OperationId, message: &str) {
        diags.error(PASS_ID, message.to_string(), op_context(graph, op));
        self.failed = true;
    }

    fn warning(&self, diags: &mut PassDiagnostics, graph: &Graph, op: OperationId, message: &str) {
        diags.warning(PASS_ID, message.to_string(), op_context(graph, op));
    }

    /// Parse a `constValue` literal against the result value's width and
    /// signedness. String and system-call literals are not constants.
    fn parse_literal(graph: &Graph, result: ValueId, literal: &str) -> Result<Option<ConstEntry>, String> {
        if literal.starts_with('"') || literal.starts_with('$') {
            return Ok(None);
        }
        let Some(value) = graph.value(result) else {
            return Err("constant result vanished".to_string());
        };
        let parsed = SvInt::from_literal(literal).map_err(|e| e.to_string())?;
        let sized = parsed
            .as_signed(value.is_signed())
            .resize(value.width().max(1) as u32);
        let has_unknown = sized.has_unknown();
        Ok(Some(ConstEntry { value: sized, has_unknown }))
    }

    fn pool_key(graph: &Graph, result: ValueId, value: &SvInt) -> Option<PoolKey> {
        let v = graph.value(result)?;
        Some((v.width(), v.is_signed(), value.to_literal()))
    }

    /// Create (or fetch from the pool) a `Constant` op producing `value`
    /// shaped like `like`, and return its result value.
    fn create_constant(
        &mut self,
        graph: &mut Graph,
        source_kind: OperationKind,
        like: ValueId,
        value: &SvInt,
    ) -> Result<ValueId, String> {
        let (width, signed, ty) = {
            let v = graph.value(like).ok_or("fold target vanished")?;
            (v.width(), v.is_signed(), v.value_type())
        };
        let normalized = value.as_signed(signed).resize(width.max(1) as u32);
        let literal = normalized.to_literal();
        let key = (width, signed, literal.clone());
        if let Some(existing) = self.pool.get(&key) {
            return Ok(*existing);
        }

        let value_sym = graph.make_internal_val_sym();
        let op_sym = graph.make_internal_op_sym();
        let new_value = graph
            .create_value(value_sym, width, signed, ty)
            .map_err(|e| e.to_string())?;
        let const_op = graph
            .create_operation(OperationKind::Constant, op_sym)
            .map_err(|e| e.to_string())?;
        graph.add_result(const_op, new_value).map_err(|e| e.to_string())?;
        graph
            .set_attr(const_op, "constValue", AttributeValue::String(literal))
            .map_err(|e| e.to_string())?;
        let loc = SrcLoc::synthetic(PASS_ID, &format!("from_{}", source_kind.as_str()));
        graph.set_value_src_loc(new_value, loc.clone()).map_err(|e| e.to_string())?;
        graph.set_op_src_loc(const_op, loc).map_err(|e| e.to_string())?;
        self.constants.insert(
            new_value,
            ConstEntry {
                has_unknown: normalized.has_unknown(),
                value: normalized,
            },
        );
        self.pool.insert(key, new_value);
        Ok(new_value)
    }

    // =========================================================================
    // PHASE 1: SEED AND DEDUPE
    // =========================================================================

    fn collect_constants(&mut self, graph: &mut Graph, diags: &mut PassDiagnostics) -> bool {
        let mut deduped = false;
        let ops: Vec<OperationId> = graph.operations().collect();
        for op_id in ops {
            let Some(op) = graph.operation(op_id) else { continue };
            if op.kind() != OperationKind::Constant {
                continue;
            }
            let results = op.results().to_vec();
            let literal = op.attr_string("constValue").map(str::to_string);
            for result in results {
                if self.constants.contains_key(&result) {
                    continue;
                }
                let Some(value) = graph.value(result) else {
                    self.error(diags, graph, op_id, "constant missing result");
                    continue;
                };
                if value.value_type() != ValueType::Logic {
                    continue;
                }
                let Some(literal) = literal.as_deref() else {
                    self.error(diags, graph, op_id, "constant missing constValue attribute");
                    continue;
                };
                let entry = match Self::parse_literal(graph, result, literal) {
                    Ok(Some(entry)) => entry,
                    Ok(None) => continue,
                    Err(message) => {
                        self.error(diags, graph, op_id, &message);
                        continue;
                    }
                };
                let Some(key) = Self::pool_key(graph, result, &entry.value) else { continue };
                self.constants.insert(result, entry);
                if let Some(&canonical) = self.pool.get(&key) {
                    let port_bound = graph.is_port_bound(result);
                    let flagged = graph
                        .value(result)
                        .is_some_and(|v| v.is_input() || v.is_inout());
                    if canonical != result && !port_bound && !flagged {
                        if let Err(e) = graph.replace_all_uses(result, canonical) {
                            self.error(diags, graph, op_id, &e.to_string());
                            continue;
                        }
                        deduped = true;
                        self.deduped_constants += 1;
                    }
                } else {
                    self.pool.insert(key, result);
                }
            }
        }
        deduped
    }

    // =========================================================================
    // PHASE 2: ITERATIVE FOLDING
    // =========================================================================

    fn operands_constant(&self, graph: &Graph, op: OperationId) -> bool {
        graph.operation(op).is_some_and(|o| {
            !o.operands().is_empty()
                && o.operands().iter().all(|v| self.constants.contains_key(v))
        })
    }

    /// Evaluate one foldable operation. `None` means "skip, not an error".
    fn fold_operation(
        &mut self,
        graph: &Graph,
        op_id: OperationId,
        allow_x: bool,
        diags: &mut PassDiagnostics,
    ) -> Option<Vec<SvInt>> {
        let op = graph.operation(op_id)?;
        if op.results().is_empty() {
            return None;
        }

        let mut operands = Vec::with_capacity(op.operands().len());
        let mut has_unknown = false;
        for operand in op.operands() {
            let entry = self.constants.get(operand)?;
            has_unknown = has_unknown || entry.has_unknown;
            operands.push(entry.value.clone());
        }
        if !allow_x && has_unknown {
            return None;
        }

        let kind = op.kind();
        let min_arity = match kind {
            OperationKind::Mux => 3,
            OperationKind::Add
            | OperationKind::Sub
            | OperationKind::Mul
            | OperationKind::Div
            | OperationKind::Mod
            | OperationKind::Eq
            | OperationKind::Ne
            | OperationKind::CaseEq
            | OperationKind::CaseNe
            | OperationKind::WildcardEq
            | OperationKind::WildcardNe
            | OperationKind::Lt
            | OperationKind::Le
            | OperationKind::Gt
            | OperationKind::Ge
            | OperationKind::And
            | OperationKind::Or
            | OperationKind::Xor
            | OperationKind::Xnor
            | OperationKind::LogicAnd
            | OperationKind::LogicOr
            | OperationKind::Shl
            | OperationKind::LShr
            | OperationKind::AShr
            | OperationKind::SliceDynamic
            | OperationKind::SliceArray => 2,
            _ => 1,
        };
        if operands.len() < min_arity {
            self.error(diags, graph, op_id, "operand missing during constant propagation");
            return None;
        }
        let folded = match kind {
            OperationKind::SystemFunction => {
                let name = op.attr_string("name")?.to_string();
                if op.attr_bool("hasSideEffects") == Some(true) {
                    return None;
                }
                if name == "clog2" {
                    if operands.len() != 1 {
                        self.error(diags, graph, op_id, "$clog2 expects exactly one operand");
                        return None;
                    }
                    let bits = operands[0].clog2()?;
                    SvInt::from_u64(32, false, u64::from(bits))
                } else {
                    return None;
                }
            }
            OperationKind::Add => operands[0].add(&operands[1]),
            OperationKind::Sub => operands[0].sub(&operands[1]),
            OperationKind::Mul => operands[0].mul(&operands[1]),
            OperationKind::Div => operands[0].div(&operands[1]),
            OperationKind::Mod => operands[0].rem(&operands[1]),
            OperationKind::Eq => operands[0].eq_logic(&operands[1]),
            OperationKind::Ne => operands[0].ne_logic(&operands[1]),
            OperationKind::CaseEq => SvInt::from_bool(operands[0].case_eq(&operands[1])),
            OperationKind::CaseNe => SvInt::from_bool(!operands[0].case_eq(&operands[1])),
            OperationKind::WildcardEq => SvInt::from_bool(operands[0].wildcard_eq(&operands[1])),
            OperationKind::WildcardNe => SvInt::from_bool(!operands[0].wildcard_eq(&operands[1])),
            OperationKind::Lt => operands[0].lt(&operands[1]),
            OperationKind::Le => operands[0].le(&operands[1]),
            OperationKind::Gt => operands[0].gt(&operands[1]),
            OperationKind::Ge => operands[0].ge(&operands[1]),
            OperationKind::And => operands[0].and(&operands[1]),
            OperationKind::Or => operands[0].or(&operands[1]),
            OperationKind::Xor => operands[0].xor(&operands[1]),
            OperationKind::Xnor => operands[0].xnor(&operands[1]),
            OperationKind::Not => operands[0].not(),
            OperationKind::LogicAnd => operands[0].logic_and(&operands[1]),
            OperationKind::LogicOr => operands[0].logic_or(&operands[1]),
            OperationKind::LogicNot => operands[0].logic_not(),
            OperationKind::ReduceAnd => operands[0].reduce_and(),
            OperationKind::ReduceOr => operands[0].reduce_or(),
            OperationKind::ReduceXor => operands[0].reduce_xor(),
            OperationKind::ReduceNor => operands[0].reduce_or().logic_not(),
            OperationKind::ReduceNand => operands[0].reduce_and().logic_not(),
            OperationKind::ReduceXnor => operands[0].reduce_xor().logic_not(),
            OperationKind::Shl => operands[0].shl(&operands[1]),
            OperationKind::LShr => operands[0].lshr(&operands[1]),
            OperationKind::AShr => operands[0].ashr(&operands[1]),
            OperationKind::Mux => {
                if operands.len() != 3 {
                    self.error(diags, graph, op_id, "mux expects three operands");
                    return None;
                }
                SvInt::conditional(&operands[0], &operands[1], &operands[2])
            }
            OperationKind::Assign => operands[0].clone(),
            OperationKind::Concat => match SvInt::concat(&operands) {
                Ok(v) => v,
                Err(e) => {
                    self.error(diags, graph, op_id, &e.to_string());
                    return None;
                }
            },
            OperationKind::Replicate => {
                let Some(rep) = op.attr_int("rep") else {
                    self.error(diags, graph, op_id, "replicate missing required 'rep' attribute");
                    return None;
                };
                if rep <= 0 {
                    self.error(diags, graph, op_id, "replicate requires positive rep attribute");
                    return None;
                }
                match operands[0].replicate(rep as u32) {
                    Ok(v) => v,
                    Err(e) => {
                        self.error(diags, graph, op_id, &e.to_string());
                        return None;
                    }
                }
            }
            OperationKind::SliceStatic => {
                let (Some(start), Some(end)) = (op.attr_int("sliceStart"), op.attr_int("sliceEnd"))
                else {
                    self.error(diags, graph, op_id, "sliceStatic missing sliceStart/sliceEnd attributes");
                    return None;
                };
                if start < 0 || end < start {
                    self.error(diags, graph, op_id, "sliceStatic has invalid slice range");
                    return None;
                }
                let width = (end - start + 1) as u32;
                operands[0].lshr_by(start as u32).trunc(width)
            }
            OperationKind::SliceDynamic | OperationKind::SliceArray => {
                let Some(width) = op.attr_int("sliceWidth") else {
                    self.error(diags, graph, op_id, "slice operation missing sliceWidth attribute");
                    return None;
                };
                if width <= 0 {
                    self.error(diags, graph, op_id, "sliceWidth must be positive");
                    return None;
                }
                operands[0].lshr(&operands[1]).trunc(width as u32)
            }
            _ => return None,
        };

        if allow_x && folded.has_unknown() {
            self.warning(
                diags,
                graph,
                op_id,
                "folding produced X/Z result while allow_x_propagation=true",
            );
        }

        let results = op.results();
        let mut out = Vec::with_capacity(results.len());
        for result in results {
            let Some(value) = graph.value(*result) else {
                return None;
            };
            out.push(
                folded
                    .as_signed(value.is_signed())
                    .resize(value.width().max(1) as u32),
            );
        }
        Some(out)
    }

    fn iterative_fold(
        &mut self,
        graph: &mut Graph,
        diags: &mut PassDiagnostics,
        options: ConstantFoldOptions,
    ) -> bool {
        let mut any_changed = false;

        for _ in 0..options.max_iterations {
            let mut iteration_changed = false;
            let order: Vec<OperationId> = graph.operations().collect();
            let mut to_erase = Vec::new();

            for op_id in order {
                let Some(op) = graph.operation(op_id) else { continue };
                let kind = op.kind();
                if kind == OperationKind::Constant || !kind.is_foldable() {
                    continue;
                }
                if self.folded_ops.contains(&op_id) {
                    continue;
                }
                let non_logic = op
                    .results()
                    .iter()
                    .any(|r| graph.value(*r).is_some_and(|v| v.value_type() != ValueType::Logic));
                if non_logic {
                    continue;
                }
                if !self.operands_constant(graph, op_id) {
                    continue;
                }

                let Some(folded) =
                    self.fold_operation(graph, op_id, options.allow_x_propagation, diags)
                else {
                    continue;
                };

                let results = graph
                    .operation(op_id)
                    .map(|o| o.results().to_vec())
                    .unwrap_or_default();
                let mut created_all = true;
                for (result, sv) in results.iter().zip(folded.iter()) {
                    match self.create_constant(graph, kind, *result, sv) {
                        Ok(new_value) => {
                            if let Err(e) = graph.replace_all_uses(*result, new_value) {
                                self.error(diags, graph, op_id, &e.to_string());
                                created_all = false;
                                continue;
                            }
                            iteration_changed = true;
                        }
                        Err(message) => {
                            self.error(diags, graph, op_id, &message);
                            created_all = false;
                        }
                    }
                }

                if created_all {
                    self.folded_ops.insert(op_id);
                    to_erase.push(op_id);
                    self.folded_count += 1;
                }
            }

            for op_id in to_erase {
                match graph.erase_op(op_id) {
                    Ok(()) => self.ops_erased += 1,
                    Err(e) => self.error(diags, graph, op_id, &e.to_string()),
                }
            }

            any_changed = any_changed || iteration_changed;
            if !iteration_changed {
                break;
            }
        }

        any_changed
    }

    // =========================================================================
    // PHASE 3: SLICE-OF-CONCAT
    // =========================================================================

    fn simplify_slices(&mut self, graph: &mut Graph, diags: &mut PassDiagnostics) -> bool {
        let mut simplified = false;
        let order: Vec<OperationId> = graph.operations().collect();
        let mut to_erase = Vec::new();

        for op_id in order {
            let Some(op) = graph.operation(op_id) else { continue };
            if op.kind() != OperationKind::SliceStatic {
                continue;
            }
            if op.operands().len() != 1 || op.results().len() != 1 {
                continue;
            }
            let (Some(low), Some(high)) = (op.attr_int("sliceStart"), op.attr_int("sliceEnd"))
            else {
                continue;
            };
            if low < 0 || high < low {
                continue;
            }
            let base = op.operands()[0];
            let result = op.results()[0];
            let Some(base_def) = graph.value(base).map(|v| v.defining_op()) else { continue };
            if !base_def.is_valid() {
                continue;
            }
            let Some(def) = graph.operation(base_def) else { continue };
            if def.kind() != OperationKind::Concat || def.operands().is_empty() {
                continue;
            }

            let concat_operands = def.operands().to_vec();
            let mut widths = Vec::with_capacity(concat_operands.len());
            let mut total = 0i64;
            let mut widths_ok = true;
            for operand in &concat_operands {
                match graph.value(*operand).map(|v| v.width()) {
                    Some(w) if w > 0 => {
                        widths.push(w);
                        total += w;
                    }
                    _ => {
                        widths_ok = false;
                        break;
                    }
                }
            }
            if !widths_ok || total <= 0 || high >= total {
                continue;
            }
            let Some((result_width, result_signed)) =
                graph.value(result).map(|v| (v.width(), v.is_signed()))
            else {
                continue;
            };

            // Concat operand 0 holds the most significant bits.
            let mut cursor = total;
            for (operand, width) in concat_operands.iter().zip(widths.iter()) {
                let hi = cursor - 1;
                let lo = cursor - width;
                cursor = lo;
                if lo != low || hi != high {
                    continue;
                }
                let matches = graph
                    .value(*operand)
                    .is_some_and(|v| v.width() == result_width && v.is_signed() == result_signed);
                if !matches {
                    break;
                }
                if let Err(e) = graph.replace_all_uses(result, *operand) {
                    self.error(diags, graph, op_id, &e.to_string());
                    break;
                }
                to_erase.push(op_id);
                simplified = true;
                self.simplified_slices += 1;
                break;
            }
        }

        for op_id in to_erase {
            match graph.erase_op(op_id) {
                Ok(()) => self.ops_erased += 1,
                Err(e) => self.error(diags, graph, op_id, &e.to_string()),
            }
        }

        simplified
    }

    // =========================================================================
    // PHASE 4: DEAD CONSTANTS
    // =========================================================================

    fn eliminate_dead_constants(&mut self, graph: &mut Graph, diags: &mut PassDiagnostics) -> bool {
        let mut removed = false;
        let mut dead = Vec::new();

        let ops: Vec<OperationId> = graph.operations().collect();
        for op_id in ops {
            let Some(op) = graph.operation(op_id) else { continue };
            if op.kind() != OperationKind::Constant {
                continue;
            }
            if op.results().is_empty() {
                self.error(diags, graph, op_id, "constant missing result");
                continue;
            }
            let live = op.results().iter().any(|r| {
                graph.is_port_bound(*r)
                    || graph.value(*r).is_some_and(|v| !v.users().is_empty())
            });
            if !live {
                dead.push(op_id);
            }
        }

        for op_id in dead {
            match graph.erase_op(op_id) {
                Ok(()) => {
                    removed = true;
                    self.dead_constants += 1;
                    self.ops_erased += 1;
                }
                Err(e) => self.error(diags, graph, op_id, &e.to_string()),
            }
        }

        removed
    }

    // =========================================================================
    // PHASE 5: UNSIGNED COMPARISONS
    // =========================================================================

    fn simplify_unsigned_comparisons(
        &mut self,
        graph: &mut Graph,
        diags: &mut PassDiagnostics,
    ) -> bool {
        let mut simplified = false;
        let order: Vec<OperationId> = graph.operations().collect();
        let mut to_erase = Vec::new();

        for op_id in order {
            let Some(op) = graph.operation(op_id) else { continue };
            let kind = op.kind();
            let is_ge = kind == OperationKind::Ge;
            let is_le = kind == OperationKind::Le;
            if !is_ge && !is_le {
                continue;
            }
            if op.operands().len() < 2 || op.results().is_empty() {
                continue;
            }
            let lhs = op.operands()[0];
            let rhs = op.operands()[1];
            let result = op.results()[0];
            let Some(lhs_value) = graph.value(lhs) else { continue };
            if lhs_value.is_signed() {
                continue;
            }
            let lhs_width = lhs_value.width();
            let Some(rhs_entry) = self.constants.get(&rhs) else { continue };

            let always_true = if is_ge {
                rhs_entry.value.is_zero()
            } else {
                lhs_width > 0 && rhs_entry.value.resize(lhs_width as u32).is_all_ones()
            };
            if !always_true {
                continue;
            }

            let one = SvInt::from_bool(true);
            match self.create_constant(graph, kind, result, &one) {
                Ok(new_value) => {
                    if let Err(e) = graph.replace_all_uses(result, new_value) {
                        self.error(diags, graph, op_id, &e.to_string());
                        continue;
                    }
                    to_erase.push(op_id);
                    simplified = true;
                    self.unsigned_cmp += 1;
                }
                Err(message) => self.error(diags, graph, op_id, &message),
            }
        }

        for op_id in to_erase {
            match graph.erase_op(op_id) {
                Ok(()) => self.ops_erased += 1,
                Err(e) => self.error(diags, graph, op_id, &e.to_string()),
            }
        }

        simplified
    }

    fn process(
        &mut self,
        graph: &mut Graph,
        diags: &mut PassDiagnostics,
        options: ConstantFoldOptions,
    ) -> bool {
        let mut changed = self.collect_constants(graph, diags);
        changed = self.iterative_fold(graph, diags, options) || changed;
        changed = self.simplify_slices(graph, diags) || changed;
        changed = self.eliminate_dead_constants(graph, diags) || changed;
        changed = self.simplify_unsigned_comparisons(graph, diags) || changed;
        changed
    }
}

impl Pass for ConstantFoldPass {
    fn id(&self) -> &str {
        PASS_ID
    }

    fn description(&self) -> &str {
        "Fold constant operations through a per-graph constant pool"
    }

    fn run(&mut self, ctx: &mut PassContext<'_>) -> PassResult {
        let mut result = PassResult::default();
        let graph_count = ctx.netlist.graph_count();
        ctx.logger.debug(PASS_ID, &format!("begin graphs={graph_count}"));

        let mut changed_graphs = 0usize;
        let mut totals = GraphFold::default();

        let names: Vec<String> = ctx.netlist.graph_order().to_vec();
        for name in names {
            let Some(graph) = ctx.netlist.find_graph_mut(&name) else { continue };
            let mut fold = GraphFold::default();
            let graph_changed = fold.process(graph, ctx.diags, self.options);
            result.changed = result.changed || graph_changed;
            if graph_changed {
                changed_graphs += 1;
            }
            totals.deduped_constants += fold.deduped_constants;
            totals.folded_count += fold.folded_count;
            totals.simplified_slices += fold.simplified_slices;
            totals.dead_constants += fold.dead_constants;
            totals.unsigned_cmp += fold.unsigned_cmp;
            totals.ops_erased += fold.ops_erased;
            totals.failed = totals.failed || fold.failed;
        }

        result.failed = totals.failed;
        ctx.logger.debug(
            PASS_ID,
            &format!(
                "graphs={graph_count}, changedGraphs={changed_graphs}, foldedOps={}, dedupedConsts={}, sliceSimplified={}, deadConsts={}, unsignedCmp={}, opsErased={}, failed={}",
                totals.folded_count,
                totals.deduped_constants,
                totals.simplified_slices,
                totals.dead_constants,
                totals.unsigned_cmp,
                totals.ops_erased,
                totals.failed
            ),
        );
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================
