//! Round-Trip Conformance Checking
//!
//! Support types for validating the codec against captured traffic: decode
//! each packet, re-encode it, and require byte identity with the original.
//! The capture-replay harness that feeds packets in lives outside this
//! crate; what belongs here are the policy objects it passes into the
//! codec and the per-packet check itself.
//!
//! Real captures contain frames from non-conformant stacks. Rather than
//! loosening the codec, the caller supplies:
//!
//! - a [`DecodePolicy`] controlling the strictness of frame-level checks
//!   (currently the BVLC declared-length comparison), and
//! - an [`ExemptionTable`] with a per-packet [`ExemptionLevel`]:
//!   `SkipComplete` (do not parse), `SkipSerialize` (parse only), or
//!   `SkipCompare` (parse and serialize, skip the byte comparison).
//!
//! Exemptions apply only here; production decode paths never consult them.
//!
//! # Example
//!
//! ```
//! use bacnet_codec::conformance::{check_packet, CheckOutcome, DecodePolicy, ExemptionTable};
//!
//! let frame = [0x81, 0x05, 0x00, 0x06, 0xEA, 0x60];
//! let report = check_packet(1, &frame, &ExemptionTable::new(), &DecodePolicy::default());
//! assert_eq!(report.outcome, CheckOutcome::Matched);
//! ```

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, vec::Vec};

#[cfg(feature = "std")]
use std::collections::BTreeMap;

use log::warn;

use crate::datalink::{Bvlc, DataLinkError};

/// Leniency switches passed into frame decoding. The default is fully
/// strict; every relaxation is an explicit caller decision for a specific
/// known-broken capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePolicy {
    /// Require the declared BVLC length to equal the buffer length exactly.
    /// When false, trailing bytes beyond the declared length are tolerated.
    pub strict_bvlc_length: bool,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self {
            strict_bvlc_length: true,
        }
    }
}

impl DecodePolicy {
    /// The policy for captures with known framing defects
    pub fn lenient() -> Self {
        Self {
            strict_bvlc_length: false,
        }
    }
}

/// How much of the check to skip for one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExemptionLevel {
    /// Do not parse the packet at all
    SkipComplete,
    /// Parse, but do not re-encode
    SkipSerialize,
    /// Parse and re-encode, but do not compare bytes
    SkipCompare,
}

/// Per-packet exemptions, keyed by the capture's sequence index
#[derive(Debug, Clone, Default)]
pub struct ExemptionTable {
    entries: BTreeMap<u32, ExemptionLevel>,
}

impl ExemptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exemption for a packet index
    pub fn exempt(mut self, index: u32, level: ExemptionLevel) -> Self {
        self.entries.insert(index, level);
        self
    }

    pub fn level(&self, index: u32) -> Option<ExemptionLevel> {
        self.entries.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of checking one packet
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Decoded, re-encoded, and byte-identical
    Matched,
    /// Not parsed: exempted with `SkipComplete`
    Skipped,
    /// Parsed only: exempted with `SkipSerialize`
    DecodedOnly,
    /// Parsed and re-encoded: exempted with `SkipCompare`
    NotCompared,
    /// Re-encoded bytes differ from the capture
    Mismatch {
        /// Offset of the first differing byte, or the shorter length when
        /// one output is a prefix of the other
        offset: usize,
        reencoded_len: usize,
    },
    /// The packet did not decode
    DecodeFailed(DataLinkError),
}

/// Report for one checked packet
#[derive(Debug, Clone, PartialEq)]
pub struct PacketReport {
    pub index: u32,
    pub outcome: CheckOutcome,
}

impl PacketReport {
    pub fn passed(&self) -> bool {
        !matches!(
            self.outcome,
            CheckOutcome::Mismatch { .. } | CheckOutcome::DecodeFailed(_)
        )
    }
}

/// Offset of the first differing byte between two buffers
fn first_difference(left: &[u8], right: &[u8]) -> Option<usize> {
    if left == right {
        return None;
    }
    Some(
        left.iter()
            .zip(right.iter())
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| left.len().min(right.len())),
    )
}

/// Decode one captured packet, optionally re-encode it, and compare output
/// bytes to input bytes, honoring the packet's exemption level.
pub fn check_packet(
    index: u32,
    bytes: &[u8],
    exemptions: &ExemptionTable,
    policy: &DecodePolicy,
) -> PacketReport {
    let level = exemptions.level(index);

    if level == Some(ExemptionLevel::SkipComplete) {
        warn!("packet {} exempt from parsing", index);
        return PacketReport {
            index,
            outcome: CheckOutcome::Skipped,
        };
    }

    let decoded = match Bvlc::decode_with_policy(bytes, policy) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(
                "packet {} failed to decode at {} bytes: {} ({})",
                index,
                bytes.len(),
                err,
                hex::encode(&bytes[..bytes.len().min(16)])
            );
            return PacketReport {
                index,
                outcome: CheckOutcome::DecodeFailed(err),
            };
        }
    };

    if level == Some(ExemptionLevel::SkipSerialize) {
        return PacketReport {
            index,
            outcome: CheckOutcome::DecodedOnly,
        };
    }

    let reencoded = decoded.encode();

    if level == Some(ExemptionLevel::SkipCompare) {
        return PacketReport {
            index,
            outcome: CheckOutcome::NotCompared,
        };
    }

    match first_difference(bytes, &reencoded) {
        None => PacketReport {
            index,
            outcome: CheckOutcome::Matched,
        },
        Some(offset) => {
            let window = offset.saturating_sub(4);
            warn!(
                "packet {} differs at offset {}: capture [{}] reencoded [{}]",
                index,
                offset,
                hex::encode(&bytes[window..bytes.len().min(offset + 4)]),
                hex::encode(&reencoded[window.min(reencoded.len())..reencoded.len().min(offset + 4)]),
            );
            PacketReport {
                index,
                outcome: CheckOutcome::Mismatch {
                    offset,
                    reencoded_len: reencoded.len(),
                },
            }
        }
    }
}

/// Check a batch of `(index, bytes)` pairs under one policy
pub fn check_capture<'a, I>(
    packets: I,
    exemptions: &ExemptionTable,
    policy: &DecodePolicy,
) -> Vec<PacketReport>
where
    I: IntoIterator<Item = (u32, &'a [u8])>,
{
    packets
        .into_iter()
        .map(|(index, bytes)| check_packet(index, bytes, exemptions, policy))
        .collect()
}
