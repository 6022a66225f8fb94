//! BACnet Network Layer Module
//!
//! This module implements the NPDU codec of ASHRAE 135 clause 6: the
//! routing envelope between the virtual link layer and the application
//! layer. An NPDU carries optional destination/source network addresses
//! (DNET/DADR, SNET/SADR), a hop count when routed, and either an APDU or a
//! network-layer message.
//!
//! The control octet is computed from which optional fields are present
//! when encoding (it is never stored), so an encoded NPDU cannot claim an
//! address it does not carry. On decode the control bits determine which
//! fields follow, and the network-layer-message bit selects between a
//! [`NetworkMessage`] body and an [`Apdu`] body.
//!
//! # Example
//!
//! ```
//! use bacnet_codec::network::Npdu;
//! use bacnet_codec::app::Apdu;
//! use bacnet_codec::service::UnconfirmedServiceChoice;
//!
//! let npdu = Npdu::global_broadcast(Apdu::UnconfirmedRequest {
//!     service_choice: UnconfirmedServiceChoice::WhoIs,
//!     service_data: vec![],
//! });
//! let bytes = npdu.encode();
//! assert_eq!(&bytes[..2], &[0x01, 0x20]);
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
    vec::Vec,
};

use crate::app::{Apdu, ApplicationError};
use crate::generate_custom_enum;

/// Result type for network operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, NetworkError>;

/// Errors that can occur in network layer operations
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Invalid NPDU format
    InvalidNpdu(String),
    /// Error in the enclosed APDU
    Application(ApplicationError),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::InvalidNpdu(msg) => write!(f, "Invalid NPDU: {}", msg),
            NetworkError::Application(err) => write!(f, "APDU error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl Error for NetworkError {}

impl From<ApplicationError> for NetworkError {
    fn from(err: ApplicationError) -> Self {
        NetworkError::Application(err)
    }
}

generate_custom_enum! {
    /// Network layer message types (clause 6.4); 0x80-0xFF are
    /// vendor-proprietary
    NetworkMessageType {
        WhoIsRouterToNetwork = 0x00,
        IAmRouterToNetwork = 0x01,
        ICouldBeRouterToNetwork = 0x02,
        RejectMessageToNetwork = 0x03,
        RouterBusyToNetwork = 0x04,
        RouterAvailableToNetwork = 0x05,
        InitializeRoutingTable = 0x06,
        InitializeRoutingTableAck = 0x07,
        EstablishConnectionToNetwork = 0x08,
        DisconnectConnectionToNetwork = 0x09,
        WhatIsNetworkNumber = 0x12,
        NetworkNumberIs = 0x13,
    },
    u8,
    0x80..=0xFF
}

/// Network priority carried in the low control bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum NetworkPriority {
    #[default]
    Normal = 0,
    Urgent = 1,
    CriticalEquipment = 2,
    LifeSafety = 3,
}

impl NetworkPriority {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => NetworkPriority::Urgent,
            2 => NetworkPriority::CriticalEquipment,
            3 => NetworkPriority::LifeSafety,
            _ => NetworkPriority::Normal,
        }
    }
}

/// Network address (network number + MAC address)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkAddress {
    /// Network number (0 = local network, 65535 = broadcast)
    pub network: u16,
    /// MAC address on that network; empty on a broadcast
    pub address: Vec<u8>,
}

impl NetworkAddress {
    pub fn new(network: u16, address: Vec<u8>) -> Self {
        Self { network, address }
    }

    /// The global broadcast address
    pub fn broadcast() -> Self {
        Self::new(0xFFFF, Vec::new())
    }

    pub fn is_broadcast(&self) -> bool {
        self.network == 0xFFFF
    }

    pub fn is_local(&self) -> bool {
        self.network == 0
    }
}

/// A network-layer message: type octet plus its parameter bytes
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkMessage {
    pub message_type: NetworkMessageType,
    pub data: Vec<u8>,
}

impl NetworkMessage {
    pub fn new(message_type: NetworkMessageType, data: Vec<u8>) -> Self {
        Self { message_type, data }
    }

    /// The network numbers listed in router messages
    /// (Who-Is/I-Am-Router-To-Network and friends)
    pub fn network_numbers(&self) -> Vec<u16> {
        self.data
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect()
    }

    /// The network number of a Network-Number-Is message, with its
    /// configured flag
    pub fn network_number_is(&self) -> Option<(u16, bool)> {
        if self.message_type != NetworkMessageType::NetworkNumberIs || self.data.len() < 3 {
            return None;
        }
        Some((
            u16::from_be_bytes([self.data[0], self.data[1]]),
            self.data[2] != 0,
        ))
    }

    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.message_type.into());
        buffer.extend_from_slice(&self.data);
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(NetworkError::InvalidNpdu(
                "Empty network message".to_string(),
            ));
        }
        Ok(Self::new(data[0].into(), data[1..].to_vec()))
    }
}

/// Body of an NPDU, selected by the network-layer-message control bit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NpduBody {
    Application(Apdu),
    Network(NetworkMessage),
}

/// Network Protocol Data Unit.
///
/// The control octet is derived on encode: bit 7 from the body variant,
/// bits 5 and 3 from the presence of `destination`/`source`, bit 2 from
/// `expecting_reply`, bits 0-1 from `priority`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Npdu {
    /// Protocol version (always 1)
    pub version: u8,
    /// Data expecting reply
    pub expecting_reply: bool,
    /// Network priority
    pub priority: NetworkPriority,
    /// Destination network address, present when routed
    pub destination: Option<NetworkAddress>,
    /// Source network address, filled in by routers
    pub source: Option<NetworkAddress>,
    /// Hop count; on the wire only when a destination is present
    pub hop_count: Option<u8>,
    pub body: NpduBody,
}

impl Npdu {
    pub const VERSION: u8 = 1;
    pub const DEFAULT_HOP_COUNT: u8 = 255;

    /// A local, unrouted NPDU around an APDU
    pub fn local(apdu: Apdu) -> Self {
        Self {
            version: Self::VERSION,
            expecting_reply: false,
            priority: NetworkPriority::Normal,
            destination: None,
            source: None,
            hop_count: None,
            body: NpduBody::Application(apdu),
        }
    }

    /// An NPDU addressed to every network, as used by broadcast discovery
    pub fn global_broadcast(apdu: Apdu) -> Self {
        Self {
            version: Self::VERSION,
            expecting_reply: false,
            priority: NetworkPriority::Normal,
            destination: Some(NetworkAddress::broadcast()),
            source: None,
            hop_count: Some(Self::DEFAULT_HOP_COUNT),
            body: NpduBody::Application(apdu),
        }
    }

    pub fn is_network_message(&self) -> bool {
        matches!(self.body, NpduBody::Network(_))
    }

    /// The control octet derived from this NPDU's fields
    pub fn control_octet(&self) -> u8 {
        let mut octet = 0u8;
        if self.is_network_message() {
            octet |= 0x80;
        }
        if self.destination.is_some() {
            octet |= 0x20;
        }
        if self.source.is_some() {
            octet |= 0x08;
        }
        if self.expecting_reply {
            octet |= 0x04;
        }
        octet | self.priority as u8
    }

    /// Encode NPDU to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        buffer.push(self.version);
        buffer.push(self.control_octet());

        if let Some(destination) = &self.destination {
            buffer.extend_from_slice(&destination.network.to_be_bytes());
            buffer.push(destination.address.len() as u8);
            buffer.extend_from_slice(&destination.address);
        }
        if let Some(source) = &self.source {
            buffer.extend_from_slice(&source.network.to_be_bytes());
            buffer.push(source.address.len() as u8);
            buffer.extend_from_slice(&source.address);
        }
        if self.destination.is_some() {
            buffer.push(self.hop_count.unwrap_or(Self::DEFAULT_HOP_COUNT));
        }

        match &self.body {
            NpduBody::Network(message) => message.encode(&mut buffer),
            NpduBody::Application(apdu) => buffer.extend_from_slice(&apdu.encode()),
        }

        buffer
    }

    /// Decode an NPDU; the body consumes the remainder of the buffer
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(NetworkError::InvalidNpdu("NPDU too short".to_string()));
        }

        let version = data[0];
        if version != Self::VERSION {
            return Err(NetworkError::InvalidNpdu(format!(
                "Invalid NPDU version: {}",
                version
            )));
        }

        let control = data[1];
        let mut pos = 2;

        let destination = if control & 0x20 != 0 {
            let (address, consumed) = Self::decode_address(&data[pos..])?;
            pos += consumed;
            Some(address)
        } else {
            None
        };

        let source = if control & 0x08 != 0 {
            let (address, consumed) = Self::decode_address(&data[pos..])?;
            pos += consumed;
            Some(address)
        } else {
            None
        };

        let hop_count = if destination.is_some() {
            let hop = *data
                .get(pos)
                .ok_or_else(|| NetworkError::InvalidNpdu("Missing hop count".to_string()))?;
            pos += 1;
            Some(hop)
        } else {
            None
        };

        let body = if control & 0x80 != 0 {
            NpduBody::Network(NetworkMessage::decode(&data[pos..])?)
        } else {
            NpduBody::Application(Apdu::decode(&data[pos..])?)
        };

        Ok(Self {
            version,
            expecting_reply: control & 0x04 != 0,
            priority: NetworkPriority::from_bits(control),
            destination,
            source,
            hop_count,
            body,
        })
    }

    fn decode_address(data: &[u8]) -> Result<(NetworkAddress, usize)> {
        if data.len() < 3 {
            return Err(NetworkError::InvalidNpdu(
                "Truncated network address".to_string(),
            ));
        }
        let network = u16::from_be_bytes([data[0], data[1]]);
        let length = data[2] as usize;
        let address = data
            .get(3..3 + length)
            .ok_or_else(|| NetworkError::InvalidNpdu("Truncated MAC address".to_string()))?
            .to_vec();
        Ok((NetworkAddress::new(network, address), 3 + length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::UnconfirmedServiceChoice;

    fn whois_apdu() -> Apdu {
        Apdu::UnconfirmedRequest {
            service_choice: UnconfirmedServiceChoice::WhoIs,
            service_data: Vec::new(),
        }
    }

    #[test]
    fn test_control_octet_derived_from_fields() {
        let npdu = Npdu::local(whois_apdu());
        assert_eq!(npdu.control_octet(), 0x00);

        let npdu = Npdu::global_broadcast(whois_apdu());
        assert_eq!(npdu.control_octet(), 0x20);

        let npdu = Npdu {
            expecting_reply: true,
            priority: NetworkPriority::LifeSafety,
            source: Some(NetworkAddress::new(100, vec![0x01])),
            ..Npdu::global_broadcast(whois_apdu())
        };
        assert_eq!(npdu.control_octet(), 0x2F);
    }

    #[test]
    fn test_global_broadcast_wire_format() {
        let bytes = Npdu::global_broadcast(whois_apdu()).encode();
        // version, control, DNET 0xFFFF, zero-length DADR, hop count, APDU
        assert_eq!(bytes, vec![0x01, 0x20, 0xFF, 0xFF, 0x00, 0xFF, 0x10, 0x08]);
    }

    #[test]
    fn test_routed_roundtrip() {
        let npdu = Npdu {
            version: 1,
            expecting_reply: true,
            priority: NetworkPriority::Normal,
            destination: Some(NetworkAddress::new(2000, vec![0x0D])),
            source: Some(NetworkAddress::new(1, vec![0xC0, 0xA8, 0x01, 0x14, 0xBA, 0xC0])),
            hop_count: Some(254),
            body: NpduBody::Application(whois_apdu()),
        };

        let bytes = npdu.encode();
        let decoded = Npdu::decode(&bytes).unwrap();
        assert_eq!(decoded, npdu);
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn test_network_message_body() {
        let npdu = Npdu {
            version: 1,
            expecting_reply: false,
            priority: NetworkPriority::Normal,
            destination: None,
            source: None,
            hop_count: None,
            body: NpduBody::Network(NetworkMessage::new(
                NetworkMessageType::WhoIsRouterToNetwork,
                vec![0x07, 0xD0],
            )),
        };

        let bytes = npdu.encode();
        assert_eq!(bytes[1] & 0x80, 0x80);
        let decoded = Npdu::decode(&bytes).unwrap();
        assert!(decoded.is_network_message());
        match &decoded.body {
            NpduBody::Network(message) => {
                assert_eq!(message.message_type, NetworkMessageType::WhoIsRouterToNetwork);
                assert_eq!(message.network_numbers(), vec![2000]);
            }
            other => panic!("expected network message, got {:?}", other),
        }
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn test_network_number_is_accessor() {
        let message = NetworkMessage::new(NetworkMessageType::NetworkNumberIs, vec![0x00, 0x64, 0x01]);
        assert_eq!(message.network_number_is(), Some((100, true)));

        let other = NetworkMessage::new(NetworkMessageType::WhatIsNetworkNumber, Vec::new());
        assert_eq!(other.network_number_is(), None);
    }

    #[test]
    fn test_vendor_network_message_type() {
        let npdu = Npdu {
            version: 1,
            expecting_reply: false,
            priority: NetworkPriority::Normal,
            destination: None,
            source: None,
            hop_count: None,
            body: NpduBody::Network(NetworkMessage::new(0x90u8.into(), vec![0xAA])),
        };
        let bytes = npdu.encode();
        let decoded = Npdu::decode(&bytes).unwrap();
        assert_eq!(decoded.encode(), bytes);
        match &decoded.body {
            NpduBody::Network(message) => {
                assert!(matches!(message.message_type, NetworkMessageType::Custom(_)));
            }
            other => panic!("expected network message, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_version_rejected() {
        assert!(matches!(
            Npdu::decode(&[0x02, 0x00, 0x10, 0x08]),
            Err(NetworkError::InvalidNpdu(_))
        ));
    }

    #[test]
    fn test_missing_hop_count_rejected() {
        // Control claims a destination but the buffer ends before hop count
        let bytes = [0x01, 0x20, 0xFF, 0xFF, 0x00];
        assert!(matches!(
            Npdu::decode(&bytes),
            Err(NetworkError::InvalidNpdu(_))
        ));
    }
}
