//! BACnet/IP Virtual Link Layer Module
//!
//! This module implements the BVLC codec of ASHRAE 135 Annex J: the
//! outermost framing of every BACnet/IP UDP payload. Each frame starts with
//! the `0x81` type octet, a one-byte function code, and a two-byte length
//! covering the whole frame; the body depends on the function.
//!
//! # BVLC Functions
//!
//! - Original-Unicast-NPDU / Original-Broadcast-NPDU
//! - Forwarded-NPDU (with the originating address)
//! - Register-Foreign-Device (with its TTL) and BVLC-Result
//! - Broadcast-distribution-table write/read/read-ack
//! - Foreign-device-table read/read-ack/delete-entry
//! - Distribute-Broadcast-To-Network
//!
//! Every variant is one arm of the [`Bvlc`] union, so a match over a
//! decoded frame is exhaustive. The declared length is validated against
//! the actual buffer; disagreement is a [`DataLinkError::LengthMismatch`]
//! unless the caller passes a [`DecodePolicy`](crate::conformance::DecodePolicy)
//! that tolerates trailing bytes from a known-broken capture.
//!
//! # Example
//!
//! ```
//! use bacnet_codec::datalink::Bvlc;
//!
//! // Register-Foreign-Device with a TTL of 60000 seconds
//! let frame = [0x81, 0x05, 0x00, 0x06, 0xEA, 0x60];
//! match Bvlc::decode(&frame).unwrap() {
//!     Bvlc::RegisterForeignDevice { ttl } => assert_eq!(ttl, 60000),
//!     other => panic!("unexpected frame: {:?}", other),
//! }
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};

use log::warn;

use crate::conformance::DecodePolicy;
use crate::network::{NetworkError, Npdu};

/// BACnet/IP well-known port number (0xBAC0)
pub const BACNET_IP_PORT: u16 = 47808;

/// BVLC type octet for BACnet/IP (Annex J)
pub const BVLC_TYPE_BACNET_IP: u8 = 0x81;

/// Result type for virtual link layer operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, DataLinkError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, DataLinkError>;

/// Errors that can occur during virtual link layer operations
#[derive(Debug, Clone, PartialEq)]
pub enum DataLinkError {
    /// Frame too short or type octet is not BACnet/IP
    InvalidFrame(String),
    /// Function code outside the defined set
    UnknownFunction(u8),
    /// Declared frame length disagrees with the buffer length
    LengthMismatch { declared: u16, actual: usize },
    /// Error in the enclosed NPDU
    Network(NetworkError),
}

impl fmt::Display for DataLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLinkError::InvalidFrame(msg) => write!(f, "Invalid BVLC frame: {}", msg),
            DataLinkError::UnknownFunction(function) => {
                write!(f, "Unknown BVLC function: 0x{:02X}", function)
            }
            DataLinkError::LengthMismatch { declared, actual } => write!(
                f,
                "BVLC length mismatch: declared {}, buffer has {}",
                declared, actual
            ),
            DataLinkError::Network(err) => write!(f, "NPDU error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl Error for DataLinkError {}

impl From<NetworkError> for DataLinkError {
    fn from(err: NetworkError) -> Self {
        DataLinkError::Network(err)
    }
}

/// BVLC function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BvlcFunction {
    Result = 0x00,
    WriteBroadcastDistributionTable = 0x01,
    ReadBroadcastDistributionTable = 0x02,
    ReadBroadcastDistributionTableAck = 0x03,
    ForwardedNpdu = 0x04,
    RegisterForeignDevice = 0x05,
    ReadForeignDeviceTable = 0x06,
    ReadForeignDeviceTableAck = 0x07,
    DeleteForeignDeviceTableEntry = 0x08,
    DistributeBroadcastToNetwork = 0x09,
    OriginalUnicastNpdu = 0x0A,
    OriginalBroadcastNpdu = 0x0B,
}

impl TryFrom<u8> for BvlcFunction {
    type Error = DataLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Result),
            0x01 => Ok(Self::WriteBroadcastDistributionTable),
            0x02 => Ok(Self::ReadBroadcastDistributionTable),
            0x03 => Ok(Self::ReadBroadcastDistributionTableAck),
            0x04 => Ok(Self::ForwardedNpdu),
            0x05 => Ok(Self::RegisterForeignDevice),
            0x06 => Ok(Self::ReadForeignDeviceTable),
            0x07 => Ok(Self::ReadForeignDeviceTableAck),
            0x08 => Ok(Self::DeleteForeignDeviceTableEntry),
            0x09 => Ok(Self::DistributeBroadcastToNetwork),
            0x0A => Ok(Self::OriginalUnicastNpdu),
            0x0B => Ok(Self::OriginalBroadcastNpdu),
            other => Err(DataLinkError::UnknownFunction(other)),
        }
    }
}

/// Result codes carried in a BVLC-Result frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum BvlcResultCode {
    Success = 0x0000,
    WriteBroadcastDistributionTableNak = 0x0010,
    ReadBroadcastDistributionTableNak = 0x0020,
    RegisterForeignDeviceNak = 0x0030,
    ReadForeignDeviceTableNak = 0x0040,
    DeleteForeignDeviceTableEntryNak = 0x0050,
    DistributeBroadcastToNetworkNak = 0x0060,
}

impl TryFrom<u16> for BvlcResultCode {
    type Error = DataLinkError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x0000 => Ok(Self::Success),
            0x0010 => Ok(Self::WriteBroadcastDistributionTableNak),
            0x0020 => Ok(Self::ReadBroadcastDistributionTableNak),
            0x0030 => Ok(Self::RegisterForeignDeviceNak),
            0x0040 => Ok(Self::ReadForeignDeviceTableNak),
            0x0050 => Ok(Self::DeleteForeignDeviceTableEntryNak),
            0x0060 => Ok(Self::DistributeBroadcastToNetworkNak),
            other => Err(DataLinkError::InvalidFrame(format!(
                "unknown BVLC result code 0x{:04X}",
                other
            ))),
        }
    }
}

/// An IPv4 address and UDP port as carried in BVLC bodies (six octets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BipAddress {
    pub ip: [u8; 4],
    pub port: u16,
}

impl BipAddress {
    pub fn new(ip: [u8; 4], port: u16) -> Self {
        Self { ip, port }
    }

    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.ip);
        buffer.extend_from_slice(&self.port.to_be_bytes());
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(DataLinkError::InvalidFrame(
                "truncated address".to_string(),
            ));
        }
        Ok(Self {
            ip: [data[0], data[1], data[2], data[3]],
            port: u16::from_be_bytes([data[4], data[5]]),
        })
    }
}

impl fmt::Display for BipAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}:{}",
            self.ip[0], self.ip[1], self.ip[2], self.ip[3], self.port
        )
    }
}

#[cfg(feature = "std")]
impl From<std::net::SocketAddrV4> for BipAddress {
    fn from(value: std::net::SocketAddrV4) -> Self {
        Self::new(value.ip().octets(), value.port())
    }
}

/// Broadcast Distribution Table entry: address plus distribution mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BdtEntry {
    pub address: BipAddress,
    pub mask: [u8; 4],
}

impl BdtEntry {
    const WIRE_LEN: usize = 10;

    fn encode(&self, buffer: &mut Vec<u8>) {
        self.address.encode(buffer);
        buffer.extend_from_slice(&self.mask);
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::WIRE_LEN {
            return Err(DataLinkError::InvalidFrame("truncated BDT entry".to_string()));
        }
        Ok(Self {
            address: BipAddress::decode(data)?,
            mask: [data[6], data[7], data[8], data[9]],
        })
    }
}

/// Foreign Device Table entry: address, registered TTL, seconds remaining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FdtEntry {
    pub address: BipAddress,
    pub ttl: u16,
    pub seconds_remaining: u16,
}

impl FdtEntry {
    const WIRE_LEN: usize = 10;

    fn encode(&self, buffer: &mut Vec<u8>) {
        self.address.encode(buffer);
        buffer.extend_from_slice(&self.ttl.to_be_bytes());
        buffer.extend_from_slice(&self.seconds_remaining.to_be_bytes());
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::WIRE_LEN {
            return Err(DataLinkError::InvalidFrame("truncated FDT entry".to_string()));
        }
        Ok(Self {
            address: BipAddress::decode(data)?,
            ttl: u16::from_be_bytes([data[6], data[7]]),
            seconds_remaining: u16::from_be_bytes([data[8], data[9]]),
        })
    }
}

/// A BACnet/IP virtual link frame
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bvlc {
    /// Outcome of a previous BVLC request
    Result { code: BvlcResultCode },
    WriteBroadcastDistributionTable { entries: Vec<BdtEntry> },
    ReadBroadcastDistributionTable,
    ReadBroadcastDistributionTableAck { entries: Vec<BdtEntry> },
    /// An NPDU relayed by a BBMD, with the original sender's address
    ForwardedNpdu { origin: BipAddress, npdu: Npdu },
    RegisterForeignDevice { ttl: u16 },
    ReadForeignDeviceTable,
    ReadForeignDeviceTableAck { entries: Vec<FdtEntry> },
    DeleteForeignDeviceTableEntry { address: BipAddress },
    DistributeBroadcastToNetwork { npdu: Npdu },
    OriginalUnicastNpdu { npdu: Npdu },
    OriginalBroadcastNpdu { npdu: Npdu },
}

impl Bvlc {
    /// The function code this frame encodes under
    pub fn function(&self) -> BvlcFunction {
        match self {
            Bvlc::Result { .. } => BvlcFunction::Result,
            Bvlc::WriteBroadcastDistributionTable { .. } => {
                BvlcFunction::WriteBroadcastDistributionTable
            }
            Bvlc::ReadBroadcastDistributionTable => BvlcFunction::ReadBroadcastDistributionTable,
            Bvlc::ReadBroadcastDistributionTableAck { .. } => {
                BvlcFunction::ReadBroadcastDistributionTableAck
            }
            Bvlc::ForwardedNpdu { .. } => BvlcFunction::ForwardedNpdu,
            Bvlc::RegisterForeignDevice { .. } => BvlcFunction::RegisterForeignDevice,
            Bvlc::ReadForeignDeviceTable => BvlcFunction::ReadForeignDeviceTable,
            Bvlc::ReadForeignDeviceTableAck { .. } => BvlcFunction::ReadForeignDeviceTableAck,
            Bvlc::DeleteForeignDeviceTableEntry { .. } => {
                BvlcFunction::DeleteForeignDeviceTableEntry
            }
            Bvlc::DistributeBroadcastToNetwork { .. } => {
                BvlcFunction::DistributeBroadcastToNetwork
            }
            Bvlc::OriginalUnicastNpdu { .. } => BvlcFunction::OriginalUnicastNpdu,
            Bvlc::OriginalBroadcastNpdu { .. } => BvlcFunction::OriginalBroadcastNpdu,
        }
    }

    /// The NPDU carried by this frame, when the function wraps one
    pub fn npdu(&self) -> Option<&Npdu> {
        match self {
            Bvlc::ForwardedNpdu { npdu, .. }
            | Bvlc::DistributeBroadcastToNetwork { npdu }
            | Bvlc::OriginalUnicastNpdu { npdu }
            | Bvlc::OriginalBroadcastNpdu { npdu } => Some(npdu),
            _ => None,
        }
    }

    /// Encode this frame: type octet, function, computed length, body
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = vec![BVLC_TYPE_BACNET_IP, self.function() as u8, 0, 0];

        match self {
            Bvlc::Result { code } => {
                buffer.extend_from_slice(&(*code as u16).to_be_bytes());
            }
            Bvlc::WriteBroadcastDistributionTable { entries }
            | Bvlc::ReadBroadcastDistributionTableAck { entries } => {
                for entry in entries {
                    entry.encode(&mut buffer);
                }
            }
            Bvlc::ReadBroadcastDistributionTable | Bvlc::ReadForeignDeviceTable => {}
            Bvlc::ForwardedNpdu { origin, npdu } => {
                origin.encode(&mut buffer);
                buffer.extend_from_slice(&npdu.encode());
            }
            Bvlc::RegisterForeignDevice { ttl } => {
                buffer.extend_from_slice(&ttl.to_be_bytes());
            }
            Bvlc::ReadForeignDeviceTableAck { entries } => {
                for entry in entries {
                    entry.encode(&mut buffer);
                }
            }
            Bvlc::DeleteForeignDeviceTableEntry { address } => {
                address.encode(&mut buffer);
            }
            Bvlc::DistributeBroadcastToNetwork { npdu }
            | Bvlc::OriginalUnicastNpdu { npdu }
            | Bvlc::OriginalBroadcastNpdu { npdu } => {
                buffer.extend_from_slice(&npdu.encode());
            }
        }

        let length = buffer.len() as u16;
        buffer[2..4].copy_from_slice(&length.to_be_bytes());
        buffer
    }

    /// Decode a frame with strict length validation
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_with_policy(data, &DecodePolicy::default())
    }

    /// Decode a frame under a caller-supplied leniency policy. A lenient
    /// policy tolerates trailing bytes beyond the declared length, which
    /// some captured frames from non-conformant stacks carry; a declared
    /// length the buffer cannot satisfy is always an error.
    pub fn decode_with_policy(data: &[u8], policy: &DecodePolicy) -> Result<Self> {
        if data.len() < 4 {
            return Err(DataLinkError::InvalidFrame("frame too short".to_string()));
        }
        if data[0] != BVLC_TYPE_BACNET_IP {
            return Err(DataLinkError::InvalidFrame(format!(
                "unexpected BVLC type octet 0x{:02X}",
                data[0]
            )));
        }

        let function = BvlcFunction::try_from(data[1])?;
        let declared = u16::from_be_bytes([data[2], data[3]]);

        let actual = data.len();
        if (declared as usize) > actual {
            return Err(DataLinkError::LengthMismatch { declared, actual });
        }
        if (declared as usize) < actual {
            if policy.strict_bvlc_length {
                return Err(DataLinkError::LengthMismatch { declared, actual });
            }
            warn!(
                "tolerating {} trailing bytes after declared BVLC length {}",
                actual - declared as usize,
                declared
            );
        }
        let body = &data[4..declared as usize];

        match function {
            BvlcFunction::Result => {
                if body.len() != 2 {
                    return Err(DataLinkError::InvalidFrame(
                        "result body must be two octets".to_string(),
                    ));
                }
                Ok(Bvlc::Result {
                    code: u16::from_be_bytes([body[0], body[1]]).try_into()?,
                })
            }
            BvlcFunction::WriteBroadcastDistributionTable => Ok(
                Bvlc::WriteBroadcastDistributionTable {
                    entries: Self::decode_bdt(body)?,
                },
            ),
            BvlcFunction::ReadBroadcastDistributionTable => {
                Ok(Bvlc::ReadBroadcastDistributionTable)
            }
            BvlcFunction::ReadBroadcastDistributionTableAck => Ok(
                Bvlc::ReadBroadcastDistributionTableAck {
                    entries: Self::decode_bdt(body)?,
                },
            ),
            BvlcFunction::ForwardedNpdu => {
                let origin = BipAddress::decode(body)?;
                Ok(Bvlc::ForwardedNpdu {
                    origin,
                    npdu: Npdu::decode(&body[6..])?,
                })
            }
            BvlcFunction::RegisterForeignDevice => {
                if body.len() != 2 {
                    return Err(DataLinkError::InvalidFrame(
                        "registration body must be two octets".to_string(),
                    ));
                }
                Ok(Bvlc::RegisterForeignDevice {
                    ttl: u16::from_be_bytes([body[0], body[1]]),
                })
            }
            BvlcFunction::ReadForeignDeviceTable => Ok(Bvlc::ReadForeignDeviceTable),
            BvlcFunction::ReadForeignDeviceTableAck => {
                if body.len() % FdtEntry::WIRE_LEN != 0 {
                    return Err(DataLinkError::InvalidFrame(
                        "FDT body is not a whole number of entries".to_string(),
                    ));
                }
                let entries = body
                    .chunks_exact(FdtEntry::WIRE_LEN)
                    .map(FdtEntry::decode)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Bvlc::ReadForeignDeviceTableAck { entries })
            }
            BvlcFunction::DeleteForeignDeviceTableEntry => {
                if body.len() != 6 {
                    return Err(DataLinkError::InvalidFrame(
                        "delete body must be one address".to_string(),
                    ));
                }
                Ok(Bvlc::DeleteForeignDeviceTableEntry {
                    address: BipAddress::decode(body)?,
                })
            }
            BvlcFunction::DistributeBroadcastToNetwork => {
                Ok(Bvlc::DistributeBroadcastToNetwork {
                    npdu: Npdu::decode(body)?,
                })
            }
            BvlcFunction::OriginalUnicastNpdu => Ok(Bvlc::OriginalUnicastNpdu {
                npdu: Npdu::decode(body)?,
            }),
            BvlcFunction::OriginalBroadcastNpdu => Ok(Bvlc::OriginalBroadcastNpdu {
                npdu: Npdu::decode(body)?,
            }),
        }
    }

    fn decode_bdt(body: &[u8]) -> Result<Vec<BdtEntry>> {
        if body.len() % BdtEntry::WIRE_LEN != 0 {
            return Err(DataLinkError::InvalidFrame(
                "BDT body is not a whole number of entries".to_string(),
            ));
        }
        body.chunks_exact(BdtEntry::WIRE_LEN)
            .map(BdtEntry::decode)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Apdu;
    use crate::network::Npdu;
    use crate::service::UnconfirmedServiceChoice;

    fn whois_npdu() -> Npdu {
        Npdu::global_broadcast(Apdu::UnconfirmedRequest {
            service_choice: UnconfirmedServiceChoice::WhoIs,
            service_data: Vec::new(),
        })
    }

    #[test]
    fn test_register_foreign_device_ttl() {
        let frame = [0x81, 0x05, 0x00, 0x06, 0xEA, 0x60];
        let decoded = Bvlc::decode(&frame).unwrap();
        assert_eq!(decoded, Bvlc::RegisterForeignDevice { ttl: 60000 });
        assert_eq!(decoded.encode(), frame);
    }

    #[test]
    fn test_original_broadcast_roundtrip() {
        let bvlc = Bvlc::OriginalBroadcastNpdu { npdu: whois_npdu() };
        let frame = bvlc.encode();
        assert_eq!(&frame[..4], &[0x81, 0x0B, 0x00, 0x0C]);
        let decoded = Bvlc::decode(&frame).unwrap();
        assert_eq!(decoded, bvlc);
        assert_eq!(decoded.encode(), frame);
    }

    #[test]
    fn test_forwarded_npdu_carries_origin() {
        let bvlc = Bvlc::ForwardedNpdu {
            origin: BipAddress::new([192, 168, 1, 20], BACNET_IP_PORT),
            npdu: whois_npdu(),
        };
        let frame = bvlc.encode();
        let decoded = Bvlc::decode(&frame).unwrap();
        match &decoded {
            Bvlc::ForwardedNpdu { origin, npdu } => {
                assert_eq!(origin.to_string(), "192.168.1.20:47808");
                assert!(npdu.destination.as_ref().unwrap().is_broadcast());
            }
            other => panic!("expected forwarded NPDU, got {:?}", other),
        }
        assert_eq!(decoded.encode(), frame);
    }

    #[test]
    fn test_result_and_tables() {
        let result = Bvlc::Result {
            code: BvlcResultCode::RegisterForeignDeviceNak,
        };
        let frame = result.encode();
        assert_eq!(frame, vec![0x81, 0x00, 0x00, 0x06, 0x00, 0x30]);
        assert_eq!(Bvlc::decode(&frame).unwrap(), result);

        let bdt = Bvlc::ReadBroadcastDistributionTableAck {
            entries: vec![BdtEntry {
                address: BipAddress::new([10, 0, 0, 1], BACNET_IP_PORT),
                mask: [255, 255, 255, 0],
            }],
        };
        let frame = bdt.encode();
        assert_eq!(Bvlc::decode(&frame).unwrap(), bdt);

        let fdt = Bvlc::ReadForeignDeviceTableAck {
            entries: vec![FdtEntry {
                address: BipAddress::new([10, 0, 0, 2], BACNET_IP_PORT),
                ttl: 300,
                seconds_remaining: 120,
            }],
        };
        let frame = fdt.encode();
        assert_eq!(Bvlc::decode(&frame).unwrap(), fdt);

        let empty_read = Bvlc::ReadForeignDeviceTable;
        let frame = empty_read.encode();
        assert_eq!(frame.len(), 4);
        assert_eq!(Bvlc::decode(&frame).unwrap(), empty_read);
    }

    #[test]
    fn test_length_mismatch_policies() {
        let mut frame = Bvlc::OriginalBroadcastNpdu { npdu: whois_npdu() }.encode();
        frame.push(0x00); // trailing byte beyond the declared length

        let declared = u16::from_be_bytes([frame[2], frame[3]]);
        assert_eq!(
            Bvlc::decode(&frame),
            Err(DataLinkError::LengthMismatch {
                declared,
                actual: frame.len(),
            })
        );

        // The lenient policy tolerates known-broken captures
        let lenient = DecodePolicy::lenient();
        assert!(Bvlc::decode_with_policy(&frame, &lenient).is_ok());

        // A declared length the buffer cannot satisfy is always an error
        let short = &frame[..6];
        assert!(matches!(
            Bvlc::decode_with_policy(short, &lenient),
            Err(DataLinkError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_function_is_fatal() {
        let frame = [0x81, 0x7F, 0x00, 0x04];
        assert_eq!(
            Bvlc::decode(&frame),
            Err(DataLinkError::UnknownFunction(0x7F))
        );
    }

    #[test]
    fn test_wrong_type_octet_rejected() {
        let frame = [0x82, 0x0A, 0x00, 0x04];
        assert!(matches!(
            Bvlc::decode(&frame),
            Err(DataLinkError::InvalidFrame(_))
        ));
    }
}
