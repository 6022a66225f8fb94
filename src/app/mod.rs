//! BACnet Application Layer Module
//!
//! This module implements the Application Protocol Data Unit codec of
//! ASHRAE 135 clause 20.1: the eight PDU kinds as one tagged union, the
//! header flag and field encodings, and the dispatch into typed service
//! payloads. Segmented transfers are reassembled by the
//! [`segmentation`] submodule before their payload can be decoded.
//!
//! # APDU Types
//!
//! - Confirmed Request PDU
//! - Unconfirmed Request PDU
//! - SimpleACK PDU
//! - ComplexACK PDU
//! - SegmentACK PDU
//! - Error PDU
//! - Reject PDU
//! - Abort PDU
//!
//! The PDU-type bits, header flags, and service-choice octet are derived
//! from the variant on encode, never stored alongside it, so an encoded
//! APDU cannot disagree with its decoded form. A ConfirmedRequest or
//! ComplexAck is segmented exactly when it carries a sequence number.
//!
//! # Example
//!
//! ```
//! use bacnet_codec::app::Apdu;
//! use bacnet_codec::service::UnconfirmedServiceChoice;
//!
//! let apdu = Apdu::UnconfirmedRequest {
//!     service_choice: UnconfirmedServiceChoice::WhoIs,
//!     service_data: vec![],
//! };
//! let encoded = apdu.encode();
//! assert_eq!(encoded, vec![0x10, 0x08]);
//! ```

#[cfg(feature = "std")]
pub mod segmentation;

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

use crate::encoding;
use crate::object::{ErrorClass, ErrorCode};
use crate::service::{
    AbortReason, ConfirmedServiceChoice, ConfirmedServiceRequest, RejectReason, ServiceAck,
    ServiceError, UnconfirmedServiceChoice, UnconfirmedServiceRequest,
};

/// Result type for application layer operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, ApplicationError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, ApplicationError>;

/// Errors that can occur in application layer operations
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationError {
    /// Invalid APDU format
    InvalidApdu(String),
    /// PDU type bits outside the defined set
    UnsupportedApduType(u8),
    /// Service payload error
    Service(ServiceError),
    /// Segment arrived out of order or duplicated
    ReassemblyError { expected: u8, received: u8 },
    /// Reassembly buffer expired before the final segment
    ReassemblyTimeout,
    /// First segment of a transfer must carry sequence number zero
    UnexpectedFirstSegment(u8),
    /// Reassembled message exceeds the advertised maximum APDU length
    MaxApduLengthExceeded,
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::InvalidApdu(msg) => write!(f, "Invalid APDU: {}", msg),
            ApplicationError::UnsupportedApduType(value) => {
                write!(f, "Unsupported APDU type: {}", value)
            }
            ApplicationError::Service(err) => write!(f, "Service error: {}", err),
            ApplicationError::ReassemblyError { expected, received } => write!(
                f,
                "Out-of-order segment: expected {}, received {}",
                expected, received
            ),
            ApplicationError::ReassemblyTimeout => write!(f, "Reassembly timed out"),
            ApplicationError::UnexpectedFirstSegment(seq) => {
                write!(f, "First segment has sequence number {}", seq)
            }
            ApplicationError::MaxApduLengthExceeded => {
                write!(f, "Maximum APDU length exceeded")
            }
        }
    }
}

#[cfg(feature = "std")]
impl Error for ApplicationError {}

impl From<ServiceError> for ApplicationError {
    fn from(err: ServiceError) -> Self {
        ApplicationError::Service(err)
    }
}

/// APDU types (top four bits of the first octet)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ApduType {
    ConfirmedRequest = 0,
    UnconfirmedRequest = 1,
    SimpleAck = 2,
    ComplexAck = 3,
    SegmentAck = 4,
    Error = 5,
    Reject = 6,
    Abort = 7,
}

/// Maximum segments the sender accepts in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MaxSegments {
    Unspecified = 0,
    Two = 1,
    Four = 2,
    Eight = 3,
    Sixteen = 4,
    ThirtyTwo = 5,
    SixtyFour = 6,
    GreaterThan64 = 7,
}

impl MaxSegments {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            1 => MaxSegments::Two,
            2 => MaxSegments::Four,
            3 => MaxSegments::Eight,
            4 => MaxSegments::Sixteen,
            5 => MaxSegments::ThirtyTwo,
            6 => MaxSegments::SixtyFour,
            7 => MaxSegments::GreaterThan64,
            _ => MaxSegments::Unspecified,
        }
    }

    /// Segment count, `None` when unspecified or more than 64
    pub fn count(&self) -> Option<u8> {
        match self {
            MaxSegments::Unspecified | MaxSegments::GreaterThan64 => None,
            MaxSegments::Two => Some(2),
            MaxSegments::Four => Some(4),
            MaxSegments::Eight => Some(8),
            MaxSegments::Sixteen => Some(16),
            MaxSegments::ThirtyTwo => Some(32),
            MaxSegments::SixtyFour => Some(64),
        }
    }
}

/// Maximum APDU size the sender accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MaxApduSize {
    Up50 = 0,
    Up128 = 1,
    Up206 = 2,
    Up480 = 3,
    Up1024 = 4,
    Up1476 = 5,
}

impl MaxApduSize {
    fn from_bits(bits: u8) -> Result<Self> {
        match bits & 0x0F {
            0 => Ok(MaxApduSize::Up50),
            1 => Ok(MaxApduSize::Up128),
            2 => Ok(MaxApduSize::Up206),
            3 => Ok(MaxApduSize::Up480),
            4 => Ok(MaxApduSize::Up1024),
            5 => Ok(MaxApduSize::Up1476),
            other => Err(ApplicationError::InvalidApdu(format!(
                "reserved max-APDU encoding {}",
                other
            ))),
        }
    }

    /// The actual size in bytes
    pub fn size(&self) -> usize {
        match self {
            MaxApduSize::Up50 => 50,
            MaxApduSize::Up128 => 128,
            MaxApduSize::Up206 => 206,
            MaxApduSize::Up480 => 480,
            MaxApduSize::Up1024 => 1024,
            MaxApduSize::Up1476 => 1476,
        }
    }

    /// The smallest encoding that fits `length` bytes
    pub fn fitting(length: usize) -> Option<Self> {
        [
            MaxApduSize::Up50,
            MaxApduSize::Up128,
            MaxApduSize::Up206,
            MaxApduSize::Up480,
            MaxApduSize::Up1024,
            MaxApduSize::Up1476,
        ]
        .into_iter()
        .find(|size| size.size() >= length)
    }
}

/// Application Protocol Data Unit.
///
/// Segmented ConfirmedRequest/ComplexAck PDUs carry `sequence_number` and
/// `proposed_window_size`, and their `service_data` is one raw segment, not
/// yet a decodable payload; [`segmentation::SegmentationManager`] produces
/// the equivalent unsegmented APDU once every segment has arrived.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Apdu {
    /// Confirmed service request
    ConfirmedRequest {
        more_follows: bool,
        segmented_response_accepted: bool,
        max_segments: MaxSegments,
        max_response_size: MaxApduSize,
        invoke_id: u8,
        sequence_number: Option<u8>,
        proposed_window_size: Option<u8>,
        service_choice: ConfirmedServiceChoice,
        service_data: Vec<u8>,
    },

    /// Unconfirmed service request (fire-and-forget)
    UnconfirmedRequest {
        service_choice: UnconfirmedServiceChoice,
        service_data: Vec<u8>,
    },

    /// Simple acknowledgment
    SimpleAck {
        invoke_id: u8,
        service_choice: ConfirmedServiceChoice,
    },

    /// Complex acknowledgment
    ComplexAck {
        more_follows: bool,
        invoke_id: u8,
        sequence_number: Option<u8>,
        proposed_window_size: Option<u8>,
        service_choice: ConfirmedServiceChoice,
        service_data: Vec<u8>,
    },

    /// Segment acknowledgment
    SegmentAck {
        negative: bool,
        server: bool,
        invoke_id: u8,
        sequence_number: u8,
        actual_window_size: u8,
    },

    /// Error PDU
    Error {
        invoke_id: u8,
        service_choice: ConfirmedServiceChoice,
        error_class: ErrorClass,
        error_code: ErrorCode,
    },

    /// Reject PDU
    Reject {
        invoke_id: u8,
        reject_reason: RejectReason,
    },

    /// Abort PDU
    Abort {
        server: bool,
        invoke_id: u8,
        abort_reason: AbortReason,
    },
}

impl Apdu {
    /// The PDU type encoded in the top four bits of the first octet
    pub fn pdu_type(&self) -> ApduType {
        match self {
            Apdu::ConfirmedRequest { .. } => ApduType::ConfirmedRequest,
            Apdu::UnconfirmedRequest { .. } => ApduType::UnconfirmedRequest,
            Apdu::SimpleAck { .. } => ApduType::SimpleAck,
            Apdu::ComplexAck { .. } => ApduType::ComplexAck,
            Apdu::SegmentAck { .. } => ApduType::SegmentAck,
            Apdu::Error { .. } => ApduType::Error,
            Apdu::Reject { .. } => ApduType::Reject,
            Apdu::Abort { .. } => ApduType::Abort,
        }
    }

    /// The invoke id correlating this PDU with its transaction, when present
    pub fn invoke_id(&self) -> Option<u8> {
        match self {
            Apdu::ConfirmedRequest { invoke_id, .. }
            | Apdu::SimpleAck { invoke_id, .. }
            | Apdu::ComplexAck { invoke_id, .. }
            | Apdu::SegmentAck { invoke_id, .. }
            | Apdu::Error { invoke_id, .. }
            | Apdu::Reject { invoke_id, .. }
            | Apdu::Abort { invoke_id, .. } => Some(*invoke_id),
            Apdu::UnconfirmedRequest { .. } => None,
        }
    }

    /// Whether this PDU is one segment of a larger transfer
    pub fn is_segmented(&self) -> bool {
        matches!(
            self,
            Apdu::ConfirmedRequest {
                sequence_number: Some(_),
                ..
            } | Apdu::ComplexAck {
                sequence_number: Some(_),
                ..
            }
        )
    }

    /// Encode APDU to bytes. Flag bits and the service choice are derived
    /// from the variant.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();

        match self {
            Apdu::ConfirmedRequest {
                more_follows,
                segmented_response_accepted,
                max_segments,
                max_response_size,
                invoke_id,
                sequence_number,
                proposed_window_size,
                service_choice,
                service_data,
            } => {
                let mut pdu_byte = (ApduType::ConfirmedRequest as u8) << 4;
                if sequence_number.is_some() {
                    pdu_byte |= 0x08;
                }
                if *more_follows {
                    pdu_byte |= 0x04;
                }
                if *segmented_response_accepted {
                    pdu_byte |= 0x02;
                }
                buffer.push(pdu_byte);
                buffer.push(((*max_segments as u8) << 4) | (*max_response_size as u8));
                buffer.push(*invoke_id);
                if let Some(sequence) = sequence_number {
                    buffer.push(*sequence);
                    buffer.push(proposed_window_size.unwrap_or(1));
                }
                buffer.push(*service_choice as u8);
                buffer.extend_from_slice(service_data);
            }

            Apdu::UnconfirmedRequest {
                service_choice,
                service_data,
            } => {
                buffer.push((ApduType::UnconfirmedRequest as u8) << 4);
                buffer.push(*service_choice as u8);
                buffer.extend_from_slice(service_data);
            }

            Apdu::SimpleAck {
                invoke_id,
                service_choice,
            } => {
                buffer.push((ApduType::SimpleAck as u8) << 4);
                buffer.push(*invoke_id);
                buffer.push(*service_choice as u8);
            }

            Apdu::ComplexAck {
                more_follows,
                invoke_id,
                sequence_number,
                proposed_window_size,
                service_choice,
                service_data,
            } => {
                let mut pdu_byte = (ApduType::ComplexAck as u8) << 4;
                if sequence_number.is_some() {
                    pdu_byte |= 0x08;
                }
                if *more_follows {
                    pdu_byte |= 0x04;
                }
                buffer.push(pdu_byte);
                buffer.push(*invoke_id);
                if let Some(sequence) = sequence_number {
                    buffer.push(*sequence);
                    buffer.push(proposed_window_size.unwrap_or(1));
                }
                buffer.push(*service_choice as u8);
                buffer.extend_from_slice(service_data);
            }

            Apdu::SegmentAck {
                negative,
                server,
                invoke_id,
                sequence_number,
                actual_window_size,
            } => {
                let mut pdu_byte = (ApduType::SegmentAck as u8) << 4;
                if *negative {
                    pdu_byte |= 0x02;
                }
                if *server {
                    pdu_byte |= 0x01;
                }
                buffer.push(pdu_byte);
                buffer.push(*invoke_id);
                buffer.push(*sequence_number);
                buffer.push(*actual_window_size);
            }

            Apdu::Error {
                invoke_id,
                service_choice,
                error_class,
                error_code,
            } => {
                buffer.push((ApduType::Error as u8) << 4);
                buffer.push(*invoke_id);
                buffer.push(*service_choice as u8);
                // The error payload is two enumerated application tags
                let _ = encoding::encode_enumerated(&mut buffer, u16::from(*error_class) as u32);
                let _ = encoding::encode_enumerated(&mut buffer, u16::from(*error_code) as u32);
            }

            Apdu::Reject {
                invoke_id,
                reject_reason,
            } => {
                buffer.push((ApduType::Reject as u8) << 4);
                buffer.push(*invoke_id);
                buffer.push(u8::from(*reject_reason));
            }

            Apdu::Abort {
                server,
                invoke_id,
                abort_reason,
            } => {
                let mut pdu_byte = (ApduType::Abort as u8) << 4;
                if *server {
                    pdu_byte |= 0x01;
                }
                buffer.push(pdu_byte);
                buffer.push(*invoke_id);
                buffer.push(u8::from(*abort_reason));
            }
        }

        buffer
    }

    /// Decode APDU from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(ApplicationError::InvalidApdu("Empty APDU".to_string()));
        }

        let pdu_byte = data[0];
        match pdu_byte >> 4 {
            0 => Self::decode_confirmed_request(pdu_byte, data),
            1 => Self::decode_unconfirmed_request(data),
            2 => Self::decode_simple_ack(data),
            3 => Self::decode_complex_ack(pdu_byte, data),
            4 => Self::decode_segment_ack(pdu_byte, data),
            5 => Self::decode_error(data),
            6 => Self::decode_reject(data),
            7 => Self::decode_abort(pdu_byte, data),
            other => Err(ApplicationError::UnsupportedApduType(other)),
        }
    }

    fn decode_confirmed_request(pdu_byte: u8, data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(ApplicationError::InvalidApdu(
                "Confirmed request too short".to_string(),
            ));
        }

        let segmented = pdu_byte & 0x08 != 0;
        let more_follows = pdu_byte & 0x04 != 0;
        let segmented_response_accepted = pdu_byte & 0x02 != 0;

        let max_segments = MaxSegments::from_bits(data[1] >> 4);
        let max_response_size = MaxApduSize::from_bits(data[1])?;
        let invoke_id = data[2];
        let mut pos = 3;

        let (sequence_number, proposed_window_size) = if segmented {
            if data.len() < pos + 2 {
                return Err(ApplicationError::InvalidApdu(
                    "Truncated segmentation header".to_string(),
                ));
            }
            let header = (Some(data[pos]), Some(data[pos + 1]));
            pos += 2;
            header
        } else {
            (None, None)
        };

        let service_choice = *data.get(pos).ok_or_else(|| {
            ApplicationError::InvalidApdu("Missing service choice".to_string())
        })?;
        pos += 1;

        Ok(Apdu::ConfirmedRequest {
            more_follows,
            segmented_response_accepted,
            max_segments,
            max_response_size,
            invoke_id,
            sequence_number,
            proposed_window_size,
            service_choice: ConfirmedServiceChoice::try_from(service_choice)?,
            service_data: data[pos..].to_vec(),
        })
    }

    fn decode_unconfirmed_request(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(ApplicationError::InvalidApdu(
                "Unconfirmed request too short".to_string(),
            ));
        }

        Ok(Apdu::UnconfirmedRequest {
            service_choice: UnconfirmedServiceChoice::try_from(data[1])?,
            service_data: data[2..].to_vec(),
        })
    }

    fn decode_simple_ack(data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(ApplicationError::InvalidApdu(
                "SimpleAck too short".to_string(),
            ));
        }

        Ok(Apdu::SimpleAck {
            invoke_id: data[1],
            service_choice: ConfirmedServiceChoice::try_from(data[2])?,
        })
    }

    fn decode_complex_ack(pdu_byte: u8, data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(ApplicationError::InvalidApdu(
                "ComplexAck too short".to_string(),
            ));
        }

        let segmented = pdu_byte & 0x08 != 0;
        let more_follows = pdu_byte & 0x04 != 0;
        let invoke_id = data[1];
        let mut pos = 2;

        let (sequence_number, proposed_window_size) = if segmented {
            if data.len() < pos + 2 {
                return Err(ApplicationError::InvalidApdu(
                    "Truncated segmentation header".to_string(),
                ));
            }
            let header = (Some(data[pos]), Some(data[pos + 1]));
            pos += 2;
            header
        } else {
            (None, None)
        };

        let service_choice = *data.get(pos).ok_or_else(|| {
            ApplicationError::InvalidApdu("Missing service choice".to_string())
        })?;
        pos += 1;

        Ok(Apdu::ComplexAck {
            more_follows,
            invoke_id,
            sequence_number,
            proposed_window_size,
            service_choice: ConfirmedServiceChoice::try_from(service_choice)?,
            service_data: data[pos..].to_vec(),
        })
    }

    fn decode_segment_ack(pdu_byte: u8, data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(ApplicationError::InvalidApdu(
                "SegmentAck too short".to_string(),
            ));
        }

        Ok(Apdu::SegmentAck {
            negative: pdu_byte & 0x02 != 0,
            server: pdu_byte & 0x01 != 0,
            invoke_id: data[1],
            sequence_number: data[2],
            actual_window_size: data[3],
        })
    }

    fn decode_error(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(ApplicationError::InvalidApdu(
                "Error PDU too short".to_string(),
            ));
        }

        let invoke_id = data[1];
        let service_choice = ConfirmedServiceChoice::try_from(data[2])?;

        let (class_raw, consumed) = encoding::decode_enumerated(&data[3..])
            .map_err(|err| ApplicationError::InvalidApdu(err.to_string()))?;
        let (code_raw, _) = encoding::decode_enumerated(&data[3 + consumed..])
            .map_err(|err| ApplicationError::InvalidApdu(err.to_string()))?;

        Ok(Apdu::Error {
            invoke_id,
            service_choice,
            error_class: (class_raw as u16).into(),
            error_code: (code_raw as u16).into(),
        })
    }

    fn decode_reject(data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(ApplicationError::InvalidApdu(
                "Reject PDU too short".to_string(),
            ));
        }

        Ok(Apdu::Reject {
            invoke_id: data[1],
            reject_reason: data[2].into(),
        })
    }

    fn decode_abort(pdu_byte: u8, data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(ApplicationError::InvalidApdu(
                "Abort PDU too short".to_string(),
            ));
        }

        Ok(Apdu::Abort {
            server: pdu_byte & 0x01 != 0,
            invoke_id: data[1],
            abort_reason: data[2].into(),
        })
    }

    /// Decode the service payload of an unsegmented ConfirmedRequest
    pub fn decode_confirmed_service(&self) -> Result<ConfirmedServiceRequest> {
        match self {
            Apdu::ConfirmedRequest {
                sequence_number: None,
                service_choice,
                service_data,
                ..
            } => Ok(ConfirmedServiceRequest::decode(*service_choice, service_data)?),
            Apdu::ConfirmedRequest { .. } => Err(ApplicationError::InvalidApdu(
                "Segmented request payload requires reassembly".to_string(),
            )),
            _ => Err(ApplicationError::InvalidApdu(
                "Not a confirmed request".to_string(),
            )),
        }
    }

    /// Decode the service payload of an UnconfirmedRequest
    pub fn decode_unconfirmed_service(&self) -> Result<UnconfirmedServiceRequest> {
        match self {
            Apdu::UnconfirmedRequest {
                service_choice,
                service_data,
            } => Ok(UnconfirmedServiceRequest::decode(*service_choice, service_data)?),
            _ => Err(ApplicationError::InvalidApdu(
                "Not an unconfirmed request".to_string(),
            )),
        }
    }

    /// Decode the service payload of an unsegmented ComplexAck
    pub fn decode_service_ack(&self) -> Result<ServiceAck> {
        match self {
            Apdu::ComplexAck {
                sequence_number: None,
                service_choice,
                service_data,
                ..
            } => Ok(ServiceAck::decode(*service_choice, service_data)?),
            Apdu::ComplexAck { .. } => Err(ApplicationError::InvalidApdu(
                "Segmented ack payload requires reassembly".to_string(),
            )),
            _ => Err(ApplicationError::InvalidApdu(
                "Not a complex ack".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectIdentifier, ObjectType, PropertyIdentifier};
    use crate::service::{ReadPropertyRequest, WhoIsRequest};

    #[test]
    fn test_unconfirmed_request_roundtrip() {
        let apdu = Apdu::UnconfirmedRequest {
            service_choice: UnconfirmedServiceChoice::WhoIs,
            service_data: vec![0x09, 0x7B, 0x19, 0x7B],
        };

        let encoded = apdu.encode();
        assert_eq!(encoded[0], 0x10);
        let decoded = Apdu::decode(&encoded).unwrap();
        assert_eq!(decoded, apdu);

        match decoded.decode_unconfirmed_service().unwrap() {
            UnconfirmedServiceRequest::WhoIs(request) => {
                assert_eq!(request, WhoIsRequest::for_device(123));
            }
            other => panic!("expected Who-Is, got {:?}", other),
        }
    }

    #[test]
    fn test_confirmed_request_roundtrip() {
        let mut service_data = Vec::new();
        ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::Device, 8),
            PropertyIdentifier::PresentValue,
        )
        .encode(&mut service_data)
        .unwrap();

        let apdu = Apdu::ConfirmedRequest {
            more_follows: false,
            segmented_response_accepted: true,
            max_segments: MaxSegments::Unspecified,
            max_response_size: MaxApduSize::Up1476,
            invoke_id: 1,
            sequence_number: None,
            proposed_window_size: None,
            service_choice: ConfirmedServiceChoice::ReadProperty,
            service_data,
        };

        let encoded = apdu.encode();
        assert_eq!(&encoded[..4], &[0x02, 0x05, 0x01, 0x0C]);
        let decoded = Apdu::decode(&encoded).unwrap();
        assert_eq!(decoded, apdu);
        assert!(!decoded.is_segmented());
        assert_eq!(decoded.invoke_id(), Some(1));

        match decoded.decode_confirmed_service().unwrap() {
            ConfirmedServiceRequest::ReadProperty(request) => {
                assert_eq!(request.object_identifier.instance, 8);
            }
            other => panic!("expected ReadProperty, got {:?}", other),
        }
    }

    #[test]
    fn test_segmented_flag_follows_sequence_number() {
        let apdu = Apdu::ComplexAck {
            more_follows: true,
            invoke_id: 42,
            sequence_number: Some(0),
            proposed_window_size: Some(4),
            service_choice: ConfirmedServiceChoice::AtomicReadFile,
            service_data: vec![0xDE, 0xAD],
        };

        let encoded = apdu.encode();
        // Segmented + more-follows flags set
        assert_eq!(encoded[0], 0x3C);
        assert_eq!(&encoded[1..5], &[42, 0, 4, 6]);

        let decoded = Apdu::decode(&encoded).unwrap();
        assert_eq!(decoded, apdu);
        assert!(decoded.is_segmented());
        assert!(decoded.decode_service_ack().is_err());
    }

    #[test]
    fn test_simple_ack_write_property() {
        // Simple-Ack for a WriteProperty request: service choice 15
        let bytes = [0x20, 0x2A, 0x0F];
        let decoded = Apdu::decode(&bytes).unwrap();
        assert_eq!(
            decoded,
            Apdu::SimpleAck {
                invoke_id: 42,
                service_choice: ConfirmedServiceChoice::WriteProperty,
            }
        );
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn test_error_pdu_unknown_property() {
        // ReadProperty error: class=property (2), code=unknown-property (32)
        let bytes = [0x50, 0x01, 0x0C, 0x91, 0x02, 0x91, 0x20];
        let decoded = Apdu::decode(&bytes).unwrap();
        assert_eq!(
            decoded,
            Apdu::Error {
                invoke_id: 1,
                service_choice: ConfirmedServiceChoice::ReadProperty,
                error_class: ErrorClass::Property,
                error_code: ErrorCode::UnknownProperty,
            }
        );
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn test_segment_ack_roundtrip() {
        let apdu = Apdu::SegmentAck {
            negative: false,
            server: false,
            invoke_id: 7,
            sequence_number: 3,
            actual_window_size: 4,
        };
        let encoded = apdu.encode();
        assert_eq!(encoded, vec![0x40, 7, 3, 4]);
        assert_eq!(Apdu::decode(&encoded).unwrap(), apdu);

        let negative = Apdu::SegmentAck {
            negative: true,
            server: true,
            invoke_id: 7,
            sequence_number: 2,
            actual_window_size: 4,
        };
        assert_eq!(negative.encode()[0], 0x43);
    }

    #[test]
    fn test_reject_abort_roundtrip() {
        let reject = Apdu::Reject {
            invoke_id: 9,
            reject_reason: RejectReason::UnrecognizedService,
        };
        assert_eq!(Apdu::decode(&reject.encode()).unwrap(), reject);

        let abort = Apdu::Abort {
            server: true,
            invoke_id: 9,
            abort_reason: AbortReason::SegmentationNotSupported,
        };
        let encoded = abort.encode();
        assert_eq!(encoded[0], 0x71);
        assert_eq!(Apdu::decode(&encoded).unwrap(), abort);
    }

    #[test]
    fn test_unknown_service_choice_is_fatal() {
        // Unconfirmed request with service choice 99
        let bytes = [0x10, 0x63];
        assert_eq!(
            Apdu::decode(&bytes),
            Err(ApplicationError::Service(
                ServiceError::UnsupportedServiceChoice(99)
            ))
        );
    }

    #[test]
    fn test_max_apdu_size_helpers() {
        assert_eq!(MaxApduSize::Up1476.size(), 1476);
        assert_eq!(MaxApduSize::fitting(100), Some(MaxApduSize::Up128));
        assert_eq!(MaxApduSize::fitting(1476), Some(MaxApduSize::Up1476));
        assert_eq!(MaxApduSize::fitting(2000), None);
        assert_eq!(MaxSegments::Sixteen.count(), Some(16));
        assert_eq!(MaxSegments::Unspecified.count(), None);
    }
}
