//! # Module Plan
//!
//! The data contract the elaboration front-end hands to graph assembly.
//! A [`ModulePlan`] is plain data: ports, signals, read/write sites, memory
//! port sites, and child instances, in source order. Statement lowering
//! (which turns a plan plus expression trees into builder calls) lives
//! outside this crate; the records here only fix the interchange shape.

use serde::{Deserialize, Serialize};

/// Port direction as declared in the module header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

/// Declared signal storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Net,
    Variable,
    Memory,
    Port,
}

/// Process domain a read/write site was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessDomain {
    Comb,
    Seq,
    Latch,
    Unknown,
}

/// One module port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub symbol: String,
    pub direction: PortDirection,
    /// Bit width; always positive.
    pub width: i64,
    pub signed: bool,
    /// For inout ports: the lowered `(in, out, oe)` sub-symbols.
    pub inout_symbols: Option<[String; 3]>,
}

/// One declared signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalInfo {
    pub symbol: String,
    pub kind: SignalKind,
    pub width: i64,
    pub signed: bool,
    /// Row count for memories; zero otherwise.
    pub memory_rows: u64,
    pub packed_dims: Vec<i64>,
    pub unpacked_dims: Vec<i64>,
}

/// One observed read or write of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWriteSite {
    pub target_signal: String,
    pub domain: ProcessDomain,
    pub is_write: bool,
}

/// One memory port usage site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPortSite {
    pub memory: String,
    pub is_read: bool,
    pub is_write: bool,
    pub is_masked: bool,
    pub is_sync: bool,
    pub has_reset: bool,
}

/// One child module instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_name: String,
    pub module_name: String,
    pub is_blackbox: bool,
}

/// Everything the front-end knows about one elaborated module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModulePlan {
    pub symbol: String,
    pub ports: Vec<PortInfo>,
    pub signals: Vec<SignalInfo>,
    pub read_write_sites: Vec<ReadWriteSite>,
    pub memory_ports: Vec<MemoryPortSite>,
    pub instances: Vec<InstanceRecord>,
}

impl ModulePlan {
    /// Empty plan for a module symbol.
    #[must_use]
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    /// True when the plan declares a memory signal with the given symbol.
    #[must_use]
    pub fn has_memory(&self, symbol: &str) -> bool {
        self.signals
            .iter()
            .any(|s| s.kind == SignalKind::Memory && s.symbol == symbol)
    }
}

// =============================================================================
// TESTS
// =============================================================================
