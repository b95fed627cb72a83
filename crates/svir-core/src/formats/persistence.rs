//! # Binary Persistence
//!
//! Whole-file netlist image: a 5-byte header (magic + format version)
//! followed by a postcard payload of the serializable document mirror.
//!
//! Pre-deserialization validation happens before any payload parsing:
//! minimum length, maximum payload size, magic bytes, version. The payload
//! then goes through the same assembly path as the JSON codec, so every
//! graph invariant is re-established on load.

use crate::formats::{NetlistDoc, doc_to_netlist, netlist_to_doc};
use crate::netlist::Netlist;
use crate::types::IrError;

/// Magic bytes for the binary netlist format.
pub const MAGIC_BYTES: &[u8; 4] = b"SVIR";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum allowed payload size (512 MB). Validated before deserialization
/// so corrupt length fields cannot trigger huge allocations.
pub const MAX_PAYLOAD_SIZE: usize = 512 * 1024 * 1024;

/// Header length: magic + version.
const HEADER_SIZE: usize = 5;

/// Serialize a netlist to header + postcard payload.
pub fn netlist_to_bytes(netlist: &Netlist) -> Result<Vec<u8>, IrError> {
    let doc = netlist_to_doc(netlist);
    let payload =
        postcard::to_stdvec(&doc).map_err(|e| IrError::Persistence(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC_BYTES);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Deserialize a netlist from header + postcard payload, re-running the
/// full invariant check.
pub fn netlist_from_bytes(bytes: &[u8]) -> Result<Netlist, IrError> {
    if bytes.len() < HEADER_SIZE {
        return Err(IrError::Persistence(
            "data too short: header missing".to_string(),
        ));
    }
    if bytes.len() - HEADER_SIZE > MAX_PAYLOAD_SIZE {
        return Err(IrError::Persistence(format!(
            "payload of {} bytes exceeds the {} byte limit",
            bytes.len() - HEADER_SIZE,
            MAX_PAYLOAD_SIZE
        )));
    }
    if &bytes[..4] != MAGIC_BYTES {
        return Err(IrError::Persistence("invalid magic bytes".to_string()));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(IrError::Persistence(format!(
            "unsupported format version {} (expected {})",
            bytes[4], FORMAT_VERSION
        )));
    }
    let doc: NetlistDoc = postcard::from_bytes(&bytes[HEADER_SIZE..])
        .map_err(|e| IrError::Persistence(format!("payload rejected: {e}")))?;
    doc_to_netlist(&doc)
}

// =============================================================================
// TESTS
// =============================================================================
