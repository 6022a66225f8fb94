//! BACnet Application Layer Services
//!
//! This module implements the service request and acknowledgement encodings
//! of ASHRAE Standard 135 clause 21. Each service owns a struct with an
//! `encode`/`decode` pair over its clause-21 parameter layout, and the
//! [`ConfirmedServiceRequest`], [`UnconfirmedServiceRequest`], and
//! [`ServiceAck`] unions dispatch on the service-choice octet carried in the
//! APDU header.
//!
//! # Service Categories
//!
//! - **Object access**: ReadProperty, ReadPropertyMultiple, WriteProperty
//! - **File access**: AtomicReadFile, AtomicWriteFile (stream and record
//!   access methods)
//! - **Change of value**: SubscribeCOV, COVNotification
//! - **Alarm and event**: ConfirmedEventNotification
//! - **Discovery**: WhoIs/IAm, WhoHas/IHave
//! - **Time**: TimeSynchronization (local and UTC)
//!
//! Property values inside requests and acknowledgements are carried as raw
//! bytes between their opening/closing tags; callers resolve them to typed
//! shapes with [`crate::property::resolve`], which falls back to an ordered
//! tag list for unmodeled or vendor-proprietary combinations instead of
//! failing.
//!
//! # Examples
//!
//! ```
//! use bacnet_codec::service::{ConfirmedServiceChoice, ReadPropertyRequest};
//! use bacnet_codec::object::{ObjectIdentifier, ObjectType, PropertyIdentifier};
//!
//! let request = ReadPropertyRequest::new(
//!     ObjectIdentifier::new(ObjectType::AnalogInput, 1),
//!     PropertyIdentifier::PresentValue,
//! );
//! let mut buffer = Vec::new();
//! request.encode(&mut buffer).unwrap();
//! let decoded = ReadPropertyRequest::decode(&buffer).unwrap();
//! assert_eq!(decoded, request);
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use crate::encoding::{
    self, constructed_content_length, is_closing_tag, is_opening_tag, CharacterString,
    EncodingError, Result as EncodingResult,
};
use crate::generate_custom_enum;
use crate::object::{
    ErrorClass, ErrorCode, ObjectIdentifier, PropertyIdentifier, Segmentation,
};
use crate::property::{ConstructedData, DateTime, TaggedValue};

/// Result type for service operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, ServiceError>;

/// Errors that can occur during service operations
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Service choice value outside the defined set
    UnsupportedServiceChoice(u8),
    /// Service is defined but this codec has no payload model for it
    UnsupportedService,
    /// Invalid service parameters
    InvalidParameters(String),
    /// Encoding/decoding error in the service payload
    EncodingError(EncodingError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::UnsupportedServiceChoice(choice) => {
                write!(f, "Unsupported service choice: {}", choice)
            }
            ServiceError::UnsupportedService => write!(f, "Service not supported"),
            ServiceError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
            ServiceError::EncodingError(err) => write!(f, "Encoding error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl Error for ServiceError {}

impl From<EncodingError> for ServiceError {
    fn from(err: EncodingError) -> Self {
        ServiceError::EncodingError(err)
    }
}

/// Confirmed service choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ConfirmedServiceChoice {
    // Alarm and Event Services
    AcknowledgeAlarm = 0,
    ConfirmedCOVNotification = 1,
    ConfirmedEventNotification = 2,
    GetAlarmSummary = 3,
    GetEnrollmentSummary = 4,
    GetEventInformation = 29,

    // File Access Services
    AtomicReadFile = 6,
    AtomicWriteFile = 7,

    // Object Access Services
    AddListElement = 8,
    RemoveListElement = 9,
    CreateObject = 10,
    DeleteObject = 11,
    ReadProperty = 12,
    ReadPropertyMultiple = 14,
    WriteProperty = 15,
    WritePropertyMultiple = 16,

    // Remote Device Management Services
    DeviceCommunicationControl = 17,
    ConfirmedPrivateTransfer = 18,
    ConfirmedTextMessage = 19,
    ReinitializeDevice = 20,

    // Virtual Terminal Services
    VtOpen = 21,
    VtClose = 22,
    VtData = 23,

    // Other Services
    ReadRange = 26,
    LifeSafetyOperation = 27,
    SubscribeCOV = 5,
    SubscribeCOVProperty = 28,
}

impl TryFrom<u8> for ConfirmedServiceChoice {
    type Error = ServiceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::AcknowledgeAlarm),
            1 => Ok(Self::ConfirmedCOVNotification),
            2 => Ok(Self::ConfirmedEventNotification),
            3 => Ok(Self::GetAlarmSummary),
            4 => Ok(Self::GetEnrollmentSummary),
            5 => Ok(Self::SubscribeCOV),
            6 => Ok(Self::AtomicReadFile),
            7 => Ok(Self::AtomicWriteFile),
            8 => Ok(Self::AddListElement),
            9 => Ok(Self::RemoveListElement),
            10 => Ok(Self::CreateObject),
            11 => Ok(Self::DeleteObject),
            12 => Ok(Self::ReadProperty),
            14 => Ok(Self::ReadPropertyMultiple),
            15 => Ok(Self::WriteProperty),
            16 => Ok(Self::WritePropertyMultiple),
            17 => Ok(Self::DeviceCommunicationControl),
            18 => Ok(Self::ConfirmedPrivateTransfer),
            19 => Ok(Self::ConfirmedTextMessage),
            20 => Ok(Self::ReinitializeDevice),
            21 => Ok(Self::VtOpen),
            22 => Ok(Self::VtClose),
            23 => Ok(Self::VtData),
            26 => Ok(Self::ReadRange),
            27 => Ok(Self::LifeSafetyOperation),
            28 => Ok(Self::SubscribeCOVProperty),
            29 => Ok(Self::GetEventInformation),
            _ => Err(ServiceError::UnsupportedServiceChoice(value)),
        }
    }
}

/// Unconfirmed service choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum UnconfirmedServiceChoice {
    IAm = 0,
    IHave = 1,
    UnconfirmedCOVNotification = 2,
    UnconfirmedEventNotification = 3,
    UnconfirmedPrivateTransfer = 4,
    UnconfirmedTextMessage = 5,
    TimeSynchronization = 6,
    WhoHas = 7,
    WhoIs = 8,
    UtcTimeSynchronization = 9,
    WriteGroup = 10,
}

impl TryFrom<u8> for UnconfirmedServiceChoice {
    type Error = ServiceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::IAm),
            1 => Ok(Self::IHave),
            2 => Ok(Self::UnconfirmedCOVNotification),
            3 => Ok(Self::UnconfirmedEventNotification),
            4 => Ok(Self::UnconfirmedPrivateTransfer),
            5 => Ok(Self::UnconfirmedTextMessage),
            6 => Ok(Self::TimeSynchronization),
            7 => Ok(Self::WhoHas),
            8 => Ok(Self::WhoIs),
            9 => Ok(Self::UtcTimeSynchronization),
            10 => Ok(Self::WriteGroup),
            _ => Err(ServiceError::UnsupportedServiceChoice(value)),
        }
    }
}

generate_custom_enum! {
    /// Reject reason codes; values 64-255 are vendor-proprietary
    RejectReason {
        Other = 0,
        BufferOverflow = 1,
        InconsistentParameters = 2,
        InvalidParameterDataType = 3,
        InvalidTag = 4,
        MissingRequiredParameter = 5,
        ParameterOutOfRange = 6,
        TooManyArguments = 7,
        UndefinedEnumeration = 8,
        UnrecognizedService = 9,
    },
    u8,
    64..=255
}

generate_custom_enum! {
    /// Abort reason codes; values 64-255 are vendor-proprietary
    AbortReason {
        Other = 0,
        BufferOverflow = 1,
        InvalidApduInThisState = 2,
        PreemptedByHigherPriorityTask = 3,
        SegmentationNotSupported = 4,
        SecurityError = 5,
        InsufficientSecurity = 6,
        WindowSizeOutOfRange = 7,
        ApplicationExceededReplyTime = 8,
        OutOfResources = 9,
        TsmTimeout = 10,
        ApduTooLong = 11,
    },
    u8,
    64..=255
}

/// Special array index value indicating all elements
pub const BACNET_ARRAY_ALL: u32 = 0xFFFF_FFFF;

/// Who-Is request (unconfirmed service)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhoIsRequest {
    /// Low limit of device instance range (optional)
    pub device_instance_range_low_limit: Option<u32>,
    /// High limit of device instance range (optional)
    pub device_instance_range_high_limit: Option<u32>,
}

impl WhoIsRequest {
    /// Create a new Who-Is request for all devices
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Who-Is request for a specific device
    pub fn for_device(device_instance: u32) -> Self {
        Self::for_range(device_instance, device_instance)
    }

    /// Create a new Who-Is request for a range of devices
    pub fn for_range(low: u32, high: u32) -> Self {
        Self {
            device_instance_range_low_limit: Some(low),
            device_instance_range_high_limit: Some(high),
        }
    }

    /// Encode the Who-Is request. The limits are encoded only as a pair;
    /// no parameters means every device must answer.
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        if let (Some(low), Some(high)) = (
            self.device_instance_range_low_limit,
            self.device_instance_range_high_limit,
        ) {
            encoding::encode_context_unsigned(buffer, 0, low)?;
            encoding::encode_context_unsigned(buffer, 1, high)?;
        }
        Ok(())
    }

    /// Decode a Who-Is request
    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        if data.is_empty() {
            return Ok(Self::new());
        }
        let (low, consumed) = encoding::decode_context_unsigned(data, 0)?;
        let (high, _) = encoding::decode_context_unsigned(&data[consumed..], 1)?;
        Ok(Self::for_range(low, high))
    }

    /// Check if this request matches a device instance
    pub fn matches(&self, device_instance: u32) -> bool {
        match (
            self.device_instance_range_low_limit,
            self.device_instance_range_high_limit,
        ) {
            (None, None) => true,
            (Some(low), Some(high)) => (low..=high).contains(&device_instance),
            (Some(low), None) => device_instance >= low,
            (None, Some(high)) => device_instance <= high,
        }
    }
}

/// I-Am announcement (unconfirmed service)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IAmRequest {
    /// Device object identifier
    pub device_identifier: ObjectIdentifier,
    /// Maximum APDU length accepted
    pub max_apdu_length_accepted: u32,
    /// Segmentation supported
    pub segmentation_supported: Segmentation,
    /// Vendor identifier
    pub vendor_identifier: u16,
}

impl IAmRequest {
    pub fn new(
        device_identifier: ObjectIdentifier,
        max_apdu_length_accepted: u32,
        segmentation_supported: Segmentation,
        vendor_identifier: u16,
    ) -> Self {
        Self {
            device_identifier,
            max_apdu_length_accepted,
            segmentation_supported,
            vendor_identifier,
        }
    }

    /// Encode the I-Am request (four application-tagged parameters)
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.device_identifier.encode(buffer)?;
        encoding::encode_unsigned(buffer, self.max_apdu_length_accepted)?;
        encoding::encode_enumerated(buffer, self.segmentation_supported as u32)?;
        encoding::encode_unsigned(buffer, self.vendor_identifier as u32)?;
        Ok(())
    }

    /// Decode an I-Am request
    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (device_identifier, mut pos) = ObjectIdentifier::decode(data)?;

        let (max_apdu_length_accepted, consumed) = encoding::decode_unsigned(&data[pos..])?;
        pos += consumed;

        let (segmentation_raw, consumed) = encoding::decode_enumerated(&data[pos..])?;
        pos += consumed;
        let segmentation_supported = Segmentation::try_from(segmentation_raw)?;

        let (vendor_identifier, _) = encoding::decode_unsigned(&data[pos..])?;

        Ok(Self::new(
            device_identifier,
            max_apdu_length_accepted,
            segmentation_supported,
            vendor_identifier as u16,
        ))
    }
}

/// The object being sought by a Who-Has request
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WhoHasObject {
    Identifier(ObjectIdentifier),
    Name(CharacterString),
}

/// Who-Has request (unconfirmed service)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhoHasRequest {
    pub device_instance_range_low_limit: Option<u32>,
    pub device_instance_range_high_limit: Option<u32>,
    pub object: WhoHasObject,
}

impl WhoHasRequest {
    /// Search for an object by identifier on any device
    pub fn by_identifier(object_identifier: ObjectIdentifier) -> Self {
        Self {
            device_instance_range_low_limit: None,
            device_instance_range_high_limit: None,
            object: WhoHasObject::Identifier(object_identifier),
        }
    }

    /// Search for an object by name on any device
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            device_instance_range_low_limit: None,
            device_instance_range_high_limit: None,
            object: WhoHasObject::Name(CharacterString::utf8(name)),
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        if let (Some(low), Some(high)) = (
            self.device_instance_range_low_limit,
            self.device_instance_range_high_limit,
        ) {
            encoding::encode_context_unsigned(buffer, 0, low)?;
            encoding::encode_context_unsigned(buffer, 1, high)?;
        }
        match &self.object {
            WhoHasObject::Identifier(id) => id.encode_context(buffer, 2)?,
            WhoHasObject::Name(name) => {
                encoding::encode_context_character_string(buffer, 3, name)?
            }
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let mut pos = 0;
        let mut low_limit = None;
        let mut high_limit = None;

        if let Ok((low, consumed)) = encoding::decode_context_unsigned(&data[pos..], 0) {
            low_limit = Some(low);
            pos += consumed;
            let (high, consumed) = encoding::decode_context_unsigned(&data[pos..], 1)?;
            high_limit = Some(high);
            pos += consumed;
        }

        let object = match ObjectIdentifier::decode_context(&data[pos..], 2) {
            Ok((id, _)) => WhoHasObject::Identifier(id),
            Err(_) => {
                let (name, _) = encoding::decode_context_character_string(&data[pos..], 3)?;
                WhoHasObject::Name(name)
            }
        };

        Ok(Self {
            device_instance_range_low_limit: low_limit,
            device_instance_range_high_limit: high_limit,
            object,
        })
    }
}

/// I-Have announcement (unconfirmed service)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IHaveRequest {
    pub device_identifier: ObjectIdentifier,
    pub object_identifier: ObjectIdentifier,
    pub object_name: CharacterString,
}

impl IHaveRequest {
    pub fn new(
        device_identifier: ObjectIdentifier,
        object_identifier: ObjectIdentifier,
        object_name: CharacterString,
    ) -> Self {
        Self {
            device_identifier,
            object_identifier,
            object_name,
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.device_identifier.encode(buffer)?;
        self.object_identifier.encode(buffer)?;
        encoding::encode_character_string(buffer, &self.object_name)
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (device_identifier, mut pos) = ObjectIdentifier::decode(data)?;
        let (object_identifier, consumed) = ObjectIdentifier::decode(&data[pos..])?;
        pos += consumed;
        let (object_name, _) = encoding::decode_character_string(&data[pos..])?;
        Ok(Self::new(device_identifier, object_identifier, object_name))
    }
}

/// Time Synchronization request (unconfirmed service); the UTC variant
/// shares the encoding and differs only in service choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSynchronizationRequest {
    pub date_time: DateTime,
}

impl TimeSynchronizationRequest {
    pub fn new(date_time: DateTime) -> Self {
        Self { date_time }
    }

    /// Create a request carrying the current local time
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        Self::new(DateTime::now())
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.date_time.encode(buffer)
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (date_time, _) = DateTime::decode(data)?;
        Ok(Self::new(date_time))
    }
}

/// Read Property request (confirmed service)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadPropertyRequest {
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub property_array_index: Option<u32>,
}

impl ReadPropertyRequest {
    pub fn new(object_identifier: ObjectIdentifier, property_identifier: PropertyIdentifier) -> Self {
        Self {
            object_identifier,
            property_identifier,
            property_array_index: None,
        }
    }

    pub fn with_array_index(
        object_identifier: ObjectIdentifier,
        property_identifier: PropertyIdentifier,
        array_index: u32,
    ) -> Self {
        Self {
            object_identifier,
            property_identifier,
            property_array_index: Some(array_index),
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.object_identifier.encode_context(buffer, 0)?;
        encoding::encode_context_enumerated(buffer, 1, self.property_identifier.into())?;
        if let Some(array_index) = self.property_array_index {
            encoding::encode_context_unsigned(buffer, 2, array_index)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (object_identifier, mut pos) = ObjectIdentifier::decode_context(data, 0)?;
        let (property_raw, consumed) = encoding::decode_context_enumerated(&data[pos..], 1)?;
        pos += consumed;

        let property_array_index = match encoding::decode_context_unsigned(&data[pos..], 2) {
            Ok((index, _)) if index != BACNET_ARRAY_ALL => Some(index),
            _ => None,
        };

        Ok(Self {
            object_identifier,
            property_identifier: property_raw.into(),
            property_array_index,
        })
    }
}

/// Read Property acknowledgement (carried in a ComplexAck)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadPropertyAck {
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub property_array_index: Option<u32>,
    /// Raw value bytes between the opening and closing tag 3
    pub property_value: Vec<u8>,
}

impl ReadPropertyAck {
    pub fn new(
        object_identifier: ObjectIdentifier,
        property_identifier: PropertyIdentifier,
        property_value: Vec<u8>,
    ) -> Self {
        Self {
            object_identifier,
            property_identifier,
            property_array_index: None,
            property_value,
        }
    }

    /// Resolve the raw value through the constructed-data dispatch table
    pub fn resolve_value(&self) -> EncodingResult<ConstructedData> {
        crate::property::resolve(
            self.object_identifier.object_type,
            self.property_identifier,
            self.property_array_index,
            &self.property_value,
        )
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.object_identifier.encode_context(buffer, 0)?;
        encoding::encode_context_enumerated(buffer, 1, self.property_identifier.into())?;
        if let Some(array_index) = self.property_array_index {
            encoding::encode_context_unsigned(buffer, 2, array_index)?;
        }
        encoding::encode_opening_tag(buffer, 3)?;
        buffer.extend_from_slice(&self.property_value);
        encoding::encode_closing_tag(buffer, 3)
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (object_identifier, mut pos) = ObjectIdentifier::decode_context(data, 0)?;
        let (property_raw, consumed) = encoding::decode_context_enumerated(&data[pos..], 1)?;
        pos += consumed;

        let property_array_index = match encoding::decode_context_unsigned(&data[pos..], 2) {
            Ok((index, consumed)) => {
                pos += consumed;
                if index == BACNET_ARRAY_ALL {
                    None
                } else {
                    Some(index)
                }
            }
            Err(_) => None,
        };

        if !is_opening_tag(&data[pos..], 3) {
            return Err(EncodingError::UnexpectedTag);
        }
        pos += 1;
        let value_len = constructed_content_length(&data[pos..], 3)?;
        let property_value = data[pos..pos + value_len].to_vec();

        Ok(Self {
            object_identifier,
            property_identifier: property_raw.into(),
            property_array_index,
            property_value,
        })
    }
}

/// Write Property request (confirmed service)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WritePropertyRequest {
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub property_array_index: Option<u32>,
    /// Raw value bytes between the opening and closing tag 3
    pub property_value: Vec<u8>,
    /// Command priority (1-16)
    pub priority: Option<u8>,
}

impl WritePropertyRequest {
    pub fn new(
        object_identifier: ObjectIdentifier,
        property_identifier: PropertyIdentifier,
        property_value: Vec<u8>,
    ) -> Self {
        Self {
            object_identifier,
            property_identifier,
            property_array_index: None,
            property_value,
            priority: None,
        }
    }

    pub fn with_priority(
        object_identifier: ObjectIdentifier,
        property_identifier: PropertyIdentifier,
        property_value: Vec<u8>,
        priority: u8,
    ) -> Self {
        Self {
            object_identifier,
            property_identifier,
            property_array_index: None,
            property_value,
            priority: Some(priority),
        }
    }

    /// Resolve the raw value through the constructed-data dispatch table
    pub fn resolve_value(&self) -> EncodingResult<ConstructedData> {
        crate::property::resolve(
            self.object_identifier.object_type,
            self.property_identifier,
            self.property_array_index,
            &self.property_value,
        )
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.object_identifier.encode_context(buffer, 0)?;
        encoding::encode_context_enumerated(buffer, 1, self.property_identifier.into())?;
        if let Some(array_index) = self.property_array_index {
            encoding::encode_context_unsigned(buffer, 2, array_index)?;
        }
        encoding::encode_opening_tag(buffer, 3)?;
        buffer.extend_from_slice(&self.property_value);
        encoding::encode_closing_tag(buffer, 3)?;
        if let Some(priority) = self.priority {
            encoding::encode_context_unsigned(buffer, 4, priority as u32)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (object_identifier, mut pos) = ObjectIdentifier::decode_context(data, 0)?;
        let (property_raw, consumed) = encoding::decode_context_enumerated(&data[pos..], 1)?;
        pos += consumed;

        let property_array_index = match encoding::decode_context_unsigned(&data[pos..], 2) {
            Ok((index, consumed)) => {
                pos += consumed;
                Some(index)
            }
            Err(_) => None,
        };

        if !is_opening_tag(&data[pos..], 3) {
            return Err(EncodingError::UnexpectedTag);
        }
        pos += 1;
        let value_len = constructed_content_length(&data[pos..], 3)?;
        let property_value = data[pos..pos + value_len].to_vec();
        pos += value_len + 1;

        let priority = match encoding::decode_context_unsigned(&data[pos..], 4) {
            Ok((priority, _)) => Some(priority as u8),
            Err(_) => None,
        };

        Ok(Self {
            object_identifier,
            property_identifier: property_raw.into(),
            property_array_index,
            property_value,
            priority,
        })
    }
}

/// One property reference inside a read-access specification
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyReference {
    pub property_identifier: PropertyIdentifier,
    pub property_array_index: Option<u32>,
}

impl PropertyReference {
    pub fn new(property_identifier: PropertyIdentifier) -> Self {
        Self {
            property_identifier,
            property_array_index: None,
        }
    }

    pub fn with_array_index(property_identifier: PropertyIdentifier, array_index: u32) -> Self {
        Self {
            property_identifier,
            property_array_index: Some(array_index),
        }
    }

    fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_context_enumerated(buffer, 0, self.property_identifier.into())?;
        if let Some(index) = self.property_array_index {
            encoding::encode_context_unsigned(buffer, 1, index)?;
        }
        Ok(())
    }

    fn decode(data: &[u8]) -> EncodingResult<(Self, usize)> {
        let (property_raw, mut pos) = encoding::decode_context_enumerated(data, 0)?;
        let property_array_index = match encoding::decode_context_unsigned(&data[pos..], 1) {
            Ok((index, consumed)) => {
                pos += consumed;
                Some(index)
            }
            Err(_) => None,
        };
        Ok((
            Self {
                property_identifier: property_raw.into(),
                property_array_index,
            },
            pos,
        ))
    }
}

/// Object identifier plus the properties to read from it
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadAccessSpecification {
    pub object_identifier: ObjectIdentifier,
    pub property_references: Vec<PropertyReference>,
}

impl ReadAccessSpecification {
    pub fn new(
        object_identifier: ObjectIdentifier,
        property_references: Vec<PropertyReference>,
    ) -> Self {
        Self {
            object_identifier,
            property_references,
        }
    }

    fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.object_identifier.encode_context(buffer, 0)?;
        encoding::encode_opening_tag(buffer, 1)?;
        for reference in &self.property_references {
            reference.encode(buffer)?;
        }
        encoding::encode_closing_tag(buffer, 1)
    }

    fn decode(data: &[u8]) -> EncodingResult<(Self, usize)> {
        let (object_identifier, mut pos) = ObjectIdentifier::decode_context(data, 0)?;
        if !is_opening_tag(&data[pos..], 1) {
            return Err(EncodingError::UnexpectedTag);
        }
        pos += 1;

        let mut property_references = Vec::new();
        while !is_closing_tag(&data[pos..], 1) {
            let (reference, consumed) = PropertyReference::decode(&data[pos..])?;
            property_references.push(reference);
            pos += consumed;
            if pos >= data.len() {
                return Err(EncodingError::MalformedTag);
            }
        }
        pos += 1;

        Ok((
            Self {
                object_identifier,
                property_references,
            },
            pos,
        ))
    }
}

/// Read Property Multiple request (confirmed service)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadPropertyMultipleRequest {
    pub read_access_specifications: Vec<ReadAccessSpecification>,
}

impl ReadPropertyMultipleRequest {
    pub fn new(read_access_specifications: Vec<ReadAccessSpecification>) -> Self {
        Self {
            read_access_specifications,
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        for specification in &self.read_access_specifications {
            specification.encode(buffer)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let mut specifications = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (specification, consumed) = ReadAccessSpecification::decode(&data[pos..])?;
            specifications.push(specification);
            pos += consumed;
        }
        Ok(Self::new(specifications))
    }
}

/// Value or error returned for one property in a read-access result
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyAccessOutcome {
    /// Raw value bytes between the opening and closing tag 4
    Value(Vec<u8>),
    /// Property-level error from the responding device
    Error {
        error_class: ErrorClass,
        error_code: ErrorCode,
    },
}

/// One property result inside a read-access result
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyResult {
    pub property_identifier: PropertyIdentifier,
    pub property_array_index: Option<u32>,
    pub outcome: PropertyAccessOutcome,
}

/// Results for all requested properties of one object
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadAccessResult {
    pub object_identifier: ObjectIdentifier,
    pub results: Vec<PropertyResult>,
}

impl ReadAccessResult {
    fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.object_identifier.encode_context(buffer, 0)?;
        encoding::encode_opening_tag(buffer, 1)?;
        for result in &self.results {
            encoding::encode_context_enumerated(buffer, 2, result.property_identifier.into())?;
            if let Some(index) = result.property_array_index {
                encoding::encode_context_unsigned(buffer, 3, index)?;
            }
            match &result.outcome {
                PropertyAccessOutcome::Value(value) => {
                    encoding::encode_opening_tag(buffer, 4)?;
                    buffer.extend_from_slice(value);
                    encoding::encode_closing_tag(buffer, 4)?;
                }
                PropertyAccessOutcome::Error {
                    error_class,
                    error_code,
                } => {
                    encoding::encode_opening_tag(buffer, 5)?;
                    encoding::encode_enumerated(buffer, u16::from(*error_class) as u32)?;
                    encoding::encode_enumerated(buffer, u16::from(*error_code) as u32)?;
                    encoding::encode_closing_tag(buffer, 5)?;
                }
            }
        }
        encoding::encode_closing_tag(buffer, 1)
    }

    fn decode(data: &[u8]) -> EncodingResult<(Self, usize)> {
        let (object_identifier, mut pos) = ObjectIdentifier::decode_context(data, 0)?;
        if !is_opening_tag(&data[pos..], 1) {
            return Err(EncodingError::UnexpectedTag);
        }
        pos += 1;

        let mut results = Vec::new();
        while !is_closing_tag(&data[pos..], 1) {
            let (property_raw, consumed) = encoding::decode_context_enumerated(&data[pos..], 2)?;
            pos += consumed;

            let property_array_index = match encoding::decode_context_unsigned(&data[pos..], 3) {
                Ok((index, consumed)) => {
                    pos += consumed;
                    Some(index)
                }
                Err(_) => None,
            };

            let outcome = if is_opening_tag(&data[pos..], 4) {
                pos += 1;
                let value_len = constructed_content_length(&data[pos..], 4)?;
                let value = data[pos..pos + value_len].to_vec();
                pos += value_len + 1;
                PropertyAccessOutcome::Value(value)
            } else if is_opening_tag(&data[pos..], 5) {
                pos += 1;
                let (class_raw, consumed) = encoding::decode_enumerated(&data[pos..])?;
                pos += consumed;
                let (code_raw, consumed) = encoding::decode_enumerated(&data[pos..])?;
                pos += consumed;
                if !is_closing_tag(&data[pos..], 5) {
                    return Err(EncodingError::MalformedTag);
                }
                pos += 1;
                PropertyAccessOutcome::Error {
                    error_class: (class_raw as u16).into(),
                    error_code: (code_raw as u16).into(),
                }
            } else {
                return Err(EncodingError::UnexpectedTag);
            };

            results.push(PropertyResult {
                property_identifier: property_raw.into(),
                property_array_index,
                outcome,
            });

            if pos >= data.len() {
                return Err(EncodingError::MalformedTag);
            }
        }
        pos += 1;

        Ok((
            Self {
                object_identifier,
                results,
            },
            pos,
        ))
    }
}

/// Read Property Multiple acknowledgement (carried in a ComplexAck)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadPropertyMultipleAck {
    pub read_access_results: Vec<ReadAccessResult>,
}

impl ReadPropertyMultipleAck {
    pub fn new(read_access_results: Vec<ReadAccessResult>) -> Self {
        Self {
            read_access_results,
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        for result in &self.read_access_results {
            result.encode(buffer)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let mut results = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (result, consumed) = ReadAccessResult::decode(&data[pos..])?;
            results.push(result);
            pos += consumed;
        }
        Ok(Self::new(results))
    }
}

/// Subscribe COV request (confirmed service)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscribeCovRequest {
    pub subscriber_process_identifier: u32,
    pub monitored_object_identifier: ObjectIdentifier,
    /// Absent together with `lifetime` on a cancellation
    pub issue_confirmed_notifications: Option<bool>,
    /// Seconds; zero or absent means indefinite
    pub lifetime: Option<u32>,
}

impl SubscribeCovRequest {
    pub fn new(
        subscriber_process_identifier: u32,
        monitored_object_identifier: ObjectIdentifier,
    ) -> Self {
        Self {
            subscriber_process_identifier,
            monitored_object_identifier,
            issue_confirmed_notifications: None,
            lifetime: None,
        }
    }

    pub fn with_lifetime(
        subscriber_process_identifier: u32,
        monitored_object_identifier: ObjectIdentifier,
        confirmed: bool,
        lifetime: u32,
    ) -> Self {
        Self {
            subscriber_process_identifier,
            monitored_object_identifier,
            issue_confirmed_notifications: Some(confirmed),
            lifetime: Some(lifetime),
        }
    }

    /// A request with neither notification kind nor lifetime cancels the
    /// subscription
    pub fn is_cancellation(&self) -> bool {
        self.issue_confirmed_notifications.is_none() && self.lifetime.is_none()
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_context_unsigned(buffer, 0, self.subscriber_process_identifier)?;
        self.monitored_object_identifier.encode_context(buffer, 1)?;
        if let Some(confirmed) = self.issue_confirmed_notifications {
            encoding::encode_context_boolean(buffer, 2, confirmed)?;
        }
        if let Some(lifetime) = self.lifetime {
            encoding::encode_context_unsigned(buffer, 3, lifetime)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (subscriber_process_identifier, mut pos) =
            encoding::decode_context_unsigned(data, 0)?;
        let (monitored_object_identifier, consumed) =
            ObjectIdentifier::decode_context(&data[pos..], 1)?;
        pos += consumed;

        let issue_confirmed_notifications =
            match encoding::decode_context_boolean(&data[pos..], 2) {
                Ok((confirmed, consumed)) => {
                    pos += consumed;
                    Some(confirmed)
                }
                Err(_) => None,
            };

        let lifetime = match encoding::decode_context_unsigned(&data[pos..], 3) {
            Ok((lifetime, _)) => Some(lifetime),
            Err(_) => None,
        };

        Ok(Self {
            subscriber_process_identifier,
            monitored_object_identifier,
            issue_confirmed_notifications,
            lifetime,
        })
    }
}

/// One changed property in a COV notification
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CovPropertyValue {
    pub property_identifier: PropertyIdentifier,
    pub property_array_index: Option<u32>,
    /// Raw value bytes between the opening and closing tag 2
    pub value: Vec<u8>,
    pub priority: Option<u8>,
}

/// COV notification (confirmed service choice 1, unconfirmed choice 2)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CovNotificationRequest {
    pub subscriber_process_identifier: u32,
    pub initiating_device_identifier: ObjectIdentifier,
    pub monitored_object_identifier: ObjectIdentifier,
    /// Seconds until the subscription lapses
    pub time_remaining: u32,
    pub list_of_values: Vec<CovPropertyValue>,
}

impl CovNotificationRequest {
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_context_unsigned(buffer, 0, self.subscriber_process_identifier)?;
        self.initiating_device_identifier.encode_context(buffer, 1)?;
        self.monitored_object_identifier.encode_context(buffer, 2)?;
        encoding::encode_context_unsigned(buffer, 3, self.time_remaining)?;
        encoding::encode_opening_tag(buffer, 4)?;
        for value in &self.list_of_values {
            encoding::encode_context_enumerated(buffer, 0, value.property_identifier.into())?;
            if let Some(index) = value.property_array_index {
                encoding::encode_context_unsigned(buffer, 1, index)?;
            }
            encoding::encode_opening_tag(buffer, 2)?;
            buffer.extend_from_slice(&value.value);
            encoding::encode_closing_tag(buffer, 2)?;
            if let Some(priority) = value.priority {
                encoding::encode_context_unsigned(buffer, 3, priority as u32)?;
            }
        }
        encoding::encode_closing_tag(buffer, 4)
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (subscriber_process_identifier, mut pos) =
            encoding::decode_context_unsigned(data, 0)?;
        let (initiating_device_identifier, consumed) =
            ObjectIdentifier::decode_context(&data[pos..], 1)?;
        pos += consumed;
        let (monitored_object_identifier, consumed) =
            ObjectIdentifier::decode_context(&data[pos..], 2)?;
        pos += consumed;
        let (time_remaining, consumed) = encoding::decode_context_unsigned(&data[pos..], 3)?;
        pos += consumed;

        if !is_opening_tag(&data[pos..], 4) {
            return Err(EncodingError::UnexpectedTag);
        }
        pos += 1;

        let mut list_of_values = Vec::new();
        while !is_closing_tag(&data[pos..], 4) {
            let (property_raw, consumed) = encoding::decode_context_enumerated(&data[pos..], 0)?;
            pos += consumed;

            let property_array_index = match encoding::decode_context_unsigned(&data[pos..], 1) {
                Ok((index, consumed)) => {
                    pos += consumed;
                    Some(index)
                }
                Err(_) => None,
            };

            if !is_opening_tag(&data[pos..], 2) {
                return Err(EncodingError::UnexpectedTag);
            }
            pos += 1;
            let value_len = constructed_content_length(&data[pos..], 2)?;
            let value = data[pos..pos + value_len].to_vec();
            pos += value_len + 1;

            let priority = match encoding::decode_context_unsigned(&data[pos..], 3) {
                Ok((priority, consumed)) => {
                    pos += consumed;
                    Some(priority as u8)
                }
                Err(_) => None,
            };

            list_of_values.push(CovPropertyValue {
                property_identifier: property_raw.into(),
                property_array_index,
                value,
                priority,
            });

            if pos >= data.len() {
                return Err(EncodingError::MalformedTag);
            }
        }

        Ok(Self {
            subscriber_process_identifier,
            initiating_device_identifier,
            monitored_object_identifier,
            time_remaining,
            list_of_values,
        })
    }
}

/// Event timestamp choice (clause 21 BACnetTimeStamp)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeStamp {
    Time(crate::object::Time),
    SequenceNumber(u32),
    DateTime(DateTime),
}

impl TimeStamp {
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        match self {
            TimeStamp::Time(time) => encoding::encode_context_time(
                buffer,
                0,
                time.hour,
                time.minute,
                time.second,
                time.hundredths,
            ),
            TimeStamp::SequenceNumber(sequence) => {
                encoding::encode_context_unsigned(buffer, 1, *sequence)
            }
            TimeStamp::DateTime(datetime) => {
                encoding::encode_opening_tag(buffer, 2)?;
                datetime.encode(buffer)?;
                encoding::encode_closing_tag(buffer, 2)
            }
        }
    }

    pub fn decode(data: &[u8]) -> EncodingResult<(Self, usize)> {
        if let Ok(((hour, minute, second, hundredths), consumed)) =
            encoding::decode_context_time(data, 0)
        {
            return Ok((
                TimeStamp::Time(crate::object::Time {
                    hour,
                    minute,
                    second,
                    hundredths,
                }),
                consumed,
            ));
        }
        if let Ok((sequence, consumed)) = encoding::decode_context_unsigned(data, 1) {
            return Ok((TimeStamp::SequenceNumber(sequence), consumed));
        }
        if is_opening_tag(data, 2) {
            let (datetime, consumed) = DateTime::decode(&data[1..])?;
            if !is_closing_tag(&data[1 + consumed..], 2) {
                return Err(EncodingError::MalformedTag);
            }
            return Ok((TimeStamp::DateTime(datetime), consumed + 2));
        }
        Err(EncodingError::UnexpectedTag)
    }
}

/// Event notification (confirmed service choice 2, unconfirmed choice 3)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventNotificationRequest {
    pub process_identifier: u32,
    pub initiating_device_identifier: ObjectIdentifier,
    pub event_object_identifier: ObjectIdentifier,
    pub timestamp: TimeStamp,
    pub notification_class: u32,
    pub priority: u8,
    pub event_type: u32,
    pub message_text: Option<CharacterString>,
    pub notify_type: u32,
    pub ack_required: Option<bool>,
    pub from_state: Option<u32>,
    pub to_state: u32,
    /// Event-type-specific values, kept as an ordered tag list
    pub event_values: Option<Vec<TaggedValue>>,
}

impl EventNotificationRequest {
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_context_unsigned(buffer, 0, self.process_identifier)?;
        self.initiating_device_identifier.encode_context(buffer, 1)?;
        self.event_object_identifier.encode_context(buffer, 2)?;
        encoding::encode_opening_tag(buffer, 3)?;
        self.timestamp.encode(buffer)?;
        encoding::encode_closing_tag(buffer, 3)?;
        encoding::encode_context_unsigned(buffer, 4, self.notification_class)?;
        encoding::encode_context_unsigned(buffer, 5, self.priority as u32)?;
        encoding::encode_context_enumerated(buffer, 6, self.event_type)?;
        if let Some(text) = &self.message_text {
            encoding::encode_context_character_string(buffer, 7, text)?;
        }
        encoding::encode_context_enumerated(buffer, 8, self.notify_type)?;
        if let Some(ack_required) = self.ack_required {
            encoding::encode_context_boolean(buffer, 9, ack_required)?;
        }
        if let Some(from_state) = self.from_state {
            encoding::encode_context_enumerated(buffer, 10, from_state)?;
        }
        encoding::encode_context_enumerated(buffer, 11, self.to_state)?;
        if let Some(values) = &self.event_values {
            encoding::encode_opening_tag(buffer, 12)?;
            TaggedValue::encode_list(values, buffer)?;
            encoding::encode_closing_tag(buffer, 12)?;
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (process_identifier, mut pos) = encoding::decode_context_unsigned(data, 0)?;
        let (initiating_device_identifier, consumed) =
            ObjectIdentifier::decode_context(&data[pos..], 1)?;
        pos += consumed;
        let (event_object_identifier, consumed) =
            ObjectIdentifier::decode_context(&data[pos..], 2)?;
        pos += consumed;

        if !is_opening_tag(&data[pos..], 3) {
            return Err(EncodingError::UnexpectedTag);
        }
        pos += 1;
        let (timestamp, consumed) = TimeStamp::decode(&data[pos..])?;
        pos += consumed;
        if !is_closing_tag(&data[pos..], 3) {
            return Err(EncodingError::MalformedTag);
        }
        pos += 1;

        let (notification_class, consumed) = encoding::decode_context_unsigned(&data[pos..], 4)?;
        pos += consumed;
        let (priority, consumed) = encoding::decode_context_unsigned(&data[pos..], 5)?;
        pos += consumed;
        let (event_type, consumed) = encoding::decode_context_enumerated(&data[pos..], 6)?;
        pos += consumed;

        let message_text = match encoding::decode_context_character_string(&data[pos..], 7) {
            Ok((text, consumed)) => {
                pos += consumed;
                Some(text)
            }
            Err(_) => None,
        };

        let (notify_type, consumed) = encoding::decode_context_enumerated(&data[pos..], 8)?;
        pos += consumed;

        let ack_required = match encoding::decode_context_boolean(&data[pos..], 9) {
            Ok((ack, consumed)) => {
                pos += consumed;
                Some(ack)
            }
            Err(_) => None,
        };

        let from_state = match encoding::decode_context_enumerated(&data[pos..], 10) {
            Ok((state, consumed)) => {
                pos += consumed;
                Some(state)
            }
            Err(_) => None,
        };

        let (to_state, consumed) = encoding::decode_context_enumerated(&data[pos..], 11)?;
        pos += consumed;

        let event_values = if pos < data.len() && is_opening_tag(&data[pos..], 12) {
            pos += 1;
            let content_len = constructed_content_length(&data[pos..], 12)?;
            let values = TaggedValue::decode_list(&data[pos..pos + content_len])?;
            Some(values)
        } else {
            None
        };

        Ok(Self {
            process_identifier,
            initiating_device_identifier,
            event_object_identifier,
            timestamp,
            notification_class,
            priority: priority as u8,
            event_type,
            message_text,
            notify_type,
            ack_required,
            from_state,
            to_state,
            event_values,
        })
    }
}

/// File access method for an atomic read request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadFileAccess {
    Stream {
        file_start_position: i32,
        requested_octet_count: u32,
    },
    Record {
        file_start_record: i32,
        requested_record_count: u32,
    },
}

/// Atomic Read File request (confirmed service)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomicReadFileRequest {
    pub file_identifier: ObjectIdentifier,
    pub access: ReadFileAccess,
}

impl AtomicReadFileRequest {
    pub fn stream(file_identifier: ObjectIdentifier, start: i32, octet_count: u32) -> Self {
        Self {
            file_identifier,
            access: ReadFileAccess::Stream {
                file_start_position: start,
                requested_octet_count: octet_count,
            },
        }
    }

    pub fn record(file_identifier: ObjectIdentifier, start: i32, record_count: u32) -> Self {
        Self {
            file_identifier,
            access: ReadFileAccess::Record {
                file_start_record: start,
                requested_record_count: record_count,
            },
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.file_identifier.encode(buffer)?;
        match self.access {
            ReadFileAccess::Stream {
                file_start_position,
                requested_octet_count,
            } => {
                encoding::encode_opening_tag(buffer, 0)?;
                encoding::encode_signed(buffer, file_start_position)?;
                encoding::encode_unsigned(buffer, requested_octet_count)?;
                encoding::encode_closing_tag(buffer, 0)
            }
            ReadFileAccess::Record {
                file_start_record,
                requested_record_count,
            } => {
                encoding::encode_opening_tag(buffer, 1)?;
                encoding::encode_signed(buffer, file_start_record)?;
                encoding::encode_unsigned(buffer, requested_record_count)?;
                encoding::encode_closing_tag(buffer, 1)
            }
        }
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (file_identifier, mut pos) = ObjectIdentifier::decode(data)?;

        let access = if is_opening_tag(&data[pos..], 0) {
            pos += 1;
            let (start, consumed) = encoding::decode_signed(&data[pos..])?;
            pos += consumed;
            let (count, consumed) = encoding::decode_unsigned(&data[pos..])?;
            pos += consumed;
            if !is_closing_tag(&data[pos..], 0) {
                return Err(EncodingError::MalformedTag);
            }
            ReadFileAccess::Stream {
                file_start_position: start,
                requested_octet_count: count,
            }
        } else if is_opening_tag(&data[pos..], 1) {
            pos += 1;
            let (start, consumed) = encoding::decode_signed(&data[pos..])?;
            pos += consumed;
            let (count, consumed) = encoding::decode_unsigned(&data[pos..])?;
            pos += consumed;
            if !is_closing_tag(&data[pos..], 1) {
                return Err(EncodingError::MalformedTag);
            }
            ReadFileAccess::Record {
                file_start_record: start,
                requested_record_count: count,
            }
        } else {
            return Err(EncodingError::UnexpectedTag);
        };

        Ok(Self {
            file_identifier,
            access,
        })
    }
}

/// File data returned by an atomic read
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadFileAckAccess {
    Stream {
        file_start_position: i32,
        file_data: Vec<u8>,
    },
    Record {
        file_start_record: i32,
        returned_record_count: u32,
        file_record_data: Vec<Vec<u8>>,
    },
}

/// Atomic Read File acknowledgement (carried in a ComplexAck)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomicReadFileAck {
    pub end_of_file: bool,
    pub access: ReadFileAckAccess,
}

impl AtomicReadFileAck {
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_boolean(buffer, self.end_of_file)?;
        match &self.access {
            ReadFileAckAccess::Stream {
                file_start_position,
                file_data,
            } => {
                encoding::encode_opening_tag(buffer, 0)?;
                encoding::encode_signed(buffer, *file_start_position)?;
                encoding::encode_octet_string(buffer, file_data)?;
                encoding::encode_closing_tag(buffer, 0)
            }
            ReadFileAckAccess::Record {
                file_start_record,
                returned_record_count,
                file_record_data,
            } => {
                encoding::encode_opening_tag(buffer, 1)?;
                encoding::encode_signed(buffer, *file_start_record)?;
                encoding::encode_unsigned(buffer, *returned_record_count)?;
                for record in file_record_data {
                    encoding::encode_octet_string(buffer, record)?;
                }
                encoding::encode_closing_tag(buffer, 1)
            }
        }
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (end_of_file, mut pos) = encoding::decode_boolean(data)?;

        let access = if is_opening_tag(&data[pos..], 0) {
            pos += 1;
            let (start, consumed) = encoding::decode_signed(&data[pos..])?;
            pos += consumed;
            let (file_data, consumed) = encoding::decode_octet_string(&data[pos..])?;
            pos += consumed;
            if !is_closing_tag(&data[pos..], 0) {
                return Err(EncodingError::MalformedTag);
            }
            ReadFileAckAccess::Stream {
                file_start_position: start,
                file_data,
            }
        } else if is_opening_tag(&data[pos..], 1) {
            pos += 1;
            let (start, consumed) = encoding::decode_signed(&data[pos..])?;
            pos += consumed;
            let (count, consumed) = encoding::decode_unsigned(&data[pos..])?;
            pos += consumed;
            let mut records = Vec::new();
            while !is_closing_tag(&data[pos..], 1) {
                let (record, consumed) = encoding::decode_octet_string(&data[pos..])?;
                records.push(record);
                pos += consumed;
                if pos >= data.len() {
                    return Err(EncodingError::MalformedTag);
                }
            }
            ReadFileAckAccess::Record {
                file_start_record: start,
                returned_record_count: count,
                file_record_data: records,
            }
        } else {
            return Err(EncodingError::UnexpectedTag);
        };

        Ok(Self {
            end_of_file,
            access,
        })
    }
}

/// File data carried by an atomic write
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteFileAccess {
    Stream {
        file_start_position: i32,
        file_data: Vec<u8>,
    },
    Record {
        file_start_record: i32,
        record_count: u32,
        file_record_data: Vec<Vec<u8>>,
    },
}

/// Atomic Write File request (confirmed service)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomicWriteFileRequest {
    pub file_identifier: ObjectIdentifier,
    pub access: WriteFileAccess,
}

impl AtomicWriteFileRequest {
    pub fn stream(file_identifier: ObjectIdentifier, start: i32, file_data: Vec<u8>) -> Self {
        Self {
            file_identifier,
            access: WriteFileAccess::Stream {
                file_start_position: start,
                file_data,
            },
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        self.file_identifier.encode(buffer)?;
        match &self.access {
            WriteFileAccess::Stream {
                file_start_position,
                file_data,
            } => {
                encoding::encode_opening_tag(buffer, 0)?;
                encoding::encode_signed(buffer, *file_start_position)?;
                encoding::encode_octet_string(buffer, file_data)?;
                encoding::encode_closing_tag(buffer, 0)
            }
            WriteFileAccess::Record {
                file_start_record,
                record_count,
                file_record_data,
            } => {
                encoding::encode_opening_tag(buffer, 1)?;
                encoding::encode_signed(buffer, *file_start_record)?;
                encoding::encode_unsigned(buffer, *record_count)?;
                for record in file_record_data {
                    encoding::encode_octet_string(buffer, record)?;
                }
                encoding::encode_closing_tag(buffer, 1)
            }
        }
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        let (file_identifier, mut pos) = ObjectIdentifier::decode(data)?;

        let access = if is_opening_tag(&data[pos..], 0) {
            pos += 1;
            let (start, consumed) = encoding::decode_signed(&data[pos..])?;
            pos += consumed;
            let (file_data, consumed) = encoding::decode_octet_string(&data[pos..])?;
            pos += consumed;
            if !is_closing_tag(&data[pos..], 0) {
                return Err(EncodingError::MalformedTag);
            }
            WriteFileAccess::Stream {
                file_start_position: start,
                file_data,
            }
        } else if is_opening_tag(&data[pos..], 1) {
            pos += 1;
            let (start, consumed) = encoding::decode_signed(&data[pos..])?;
            pos += consumed;
            let (count, consumed) = encoding::decode_unsigned(&data[pos..])?;
            pos += consumed;
            let mut records = Vec::new();
            while !is_closing_tag(&data[pos..], 1) {
                let (record, consumed) = encoding::decode_octet_string(&data[pos..])?;
                records.push(record);
                pos += consumed;
                if pos >= data.len() {
                    return Err(EncodingError::MalformedTag);
                }
            }
            WriteFileAccess::Record {
                file_start_record: start,
                record_count: count,
                file_record_data: records,
            }
        } else {
            return Err(EncodingError::UnexpectedTag);
        };

        Ok(Self {
            file_identifier,
            access,
        })
    }
}

/// Atomic Write File acknowledgement: the start position or record the
/// device actually wrote at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AtomicWriteFileAck {
    Stream { file_start_position: i32 },
    Record { file_start_record: i32 },
}

impl AtomicWriteFileAck {
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        match self {
            AtomicWriteFileAck::Stream {
                file_start_position,
            } => encoding::encode_context_signed(buffer, 0, *file_start_position),
            AtomicWriteFileAck::Record { file_start_record } => {
                encoding::encode_context_signed(buffer, 1, *file_start_record)
            }
        }
    }

    pub fn decode(data: &[u8]) -> EncodingResult<Self> {
        if let Ok((start, _)) = encoding::decode_context_signed(data, 0) {
            return Ok(AtomicWriteFileAck::Stream {
                file_start_position: start,
            });
        }
        let (start, _) = encoding::decode_context_signed(data, 1)?;
        Ok(AtomicWriteFileAck::Record {
            file_start_record: start,
        })
    }
}

/// Typed payload of a confirmed request, dispatched on service choice
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfirmedServiceRequest {
    ConfirmedCOVNotification(CovNotificationRequest),
    ConfirmedEventNotification(EventNotificationRequest),
    SubscribeCOV(SubscribeCovRequest),
    AtomicReadFile(AtomicReadFileRequest),
    AtomicWriteFile(AtomicWriteFileRequest),
    ReadProperty(ReadPropertyRequest),
    ReadPropertyMultiple(ReadPropertyMultipleRequest),
    WriteProperty(WritePropertyRequest),
}

impl ConfirmedServiceRequest {
    /// The service choice this payload encodes under
    pub fn choice(&self) -> ConfirmedServiceChoice {
        match self {
            Self::ConfirmedCOVNotification(_) => ConfirmedServiceChoice::ConfirmedCOVNotification,
            Self::ConfirmedEventNotification(_) => {
                ConfirmedServiceChoice::ConfirmedEventNotification
            }
            Self::SubscribeCOV(_) => ConfirmedServiceChoice::SubscribeCOV,
            Self::AtomicReadFile(_) => ConfirmedServiceChoice::AtomicReadFile,
            Self::AtomicWriteFile(_) => ConfirmedServiceChoice::AtomicWriteFile,
            Self::ReadProperty(_) => ConfirmedServiceChoice::ReadProperty,
            Self::ReadPropertyMultiple(_) => ConfirmedServiceChoice::ReadPropertyMultiple,
            Self::WriteProperty(_) => ConfirmedServiceChoice::WriteProperty,
        }
    }

    /// Decode a confirmed-request payload for a known service choice
    pub fn decode(choice: ConfirmedServiceChoice, data: &[u8]) -> Result<Self> {
        match choice {
            ConfirmedServiceChoice::ConfirmedCOVNotification => Ok(
                Self::ConfirmedCOVNotification(CovNotificationRequest::decode(data)?),
            ),
            ConfirmedServiceChoice::ConfirmedEventNotification => Ok(
                Self::ConfirmedEventNotification(EventNotificationRequest::decode(data)?),
            ),
            ConfirmedServiceChoice::SubscribeCOV => {
                Ok(Self::SubscribeCOV(SubscribeCovRequest::decode(data)?))
            }
            ConfirmedServiceChoice::AtomicReadFile => {
                Ok(Self::AtomicReadFile(AtomicReadFileRequest::decode(data)?))
            }
            ConfirmedServiceChoice::AtomicWriteFile => {
                Ok(Self::AtomicWriteFile(AtomicWriteFileRequest::decode(data)?))
            }
            ConfirmedServiceChoice::ReadProperty => {
                Ok(Self::ReadProperty(ReadPropertyRequest::decode(data)?))
            }
            ConfirmedServiceChoice::ReadPropertyMultiple => Ok(Self::ReadPropertyMultiple(
                ReadPropertyMultipleRequest::decode(data)?,
            )),
            ConfirmedServiceChoice::WriteProperty => {
                Ok(Self::WriteProperty(WritePropertyRequest::decode(data)?))
            }
            _ => Err(ServiceError::UnsupportedService),
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        match self {
            Self::ConfirmedCOVNotification(request) => request.encode(buffer),
            Self::ConfirmedEventNotification(request) => request.encode(buffer),
            Self::SubscribeCOV(request) => request.encode(buffer),
            Self::AtomicReadFile(request) => request.encode(buffer),
            Self::AtomicWriteFile(request) => request.encode(buffer),
            Self::ReadProperty(request) => request.encode(buffer),
            Self::ReadPropertyMultiple(request) => request.encode(buffer),
            Self::WriteProperty(request) => request.encode(buffer),
        }
    }
}

/// Typed payload of an unconfirmed request, dispatched on service choice
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnconfirmedServiceRequest {
    IAm(IAmRequest),
    IHave(IHaveRequest),
    UnconfirmedCOVNotification(CovNotificationRequest),
    UnconfirmedEventNotification(EventNotificationRequest),
    TimeSynchronization(TimeSynchronizationRequest),
    WhoHas(WhoHasRequest),
    WhoIs(WhoIsRequest),
    UtcTimeSynchronization(TimeSynchronizationRequest),
}

impl UnconfirmedServiceRequest {
    /// The service choice this payload encodes under
    pub fn choice(&self) -> UnconfirmedServiceChoice {
        match self {
            Self::IAm(_) => UnconfirmedServiceChoice::IAm,
            Self::IHave(_) => UnconfirmedServiceChoice::IHave,
            Self::UnconfirmedCOVNotification(_) => {
                UnconfirmedServiceChoice::UnconfirmedCOVNotification
            }
            Self::UnconfirmedEventNotification(_) => {
                UnconfirmedServiceChoice::UnconfirmedEventNotification
            }
            Self::TimeSynchronization(_) => UnconfirmedServiceChoice::TimeSynchronization,
            Self::WhoHas(_) => UnconfirmedServiceChoice::WhoHas,
            Self::WhoIs(_) => UnconfirmedServiceChoice::WhoIs,
            Self::UtcTimeSynchronization(_) => UnconfirmedServiceChoice::UtcTimeSynchronization,
        }
    }

    /// Decode an unconfirmed-request payload for a known service choice
    pub fn decode(choice: UnconfirmedServiceChoice, data: &[u8]) -> Result<Self> {
        match choice {
            UnconfirmedServiceChoice::IAm => Ok(Self::IAm(IAmRequest::decode(data)?)),
            UnconfirmedServiceChoice::IHave => Ok(Self::IHave(IHaveRequest::decode(data)?)),
            UnconfirmedServiceChoice::UnconfirmedCOVNotification => Ok(
                Self::UnconfirmedCOVNotification(CovNotificationRequest::decode(data)?),
            ),
            UnconfirmedServiceChoice::UnconfirmedEventNotification => Ok(
                Self::UnconfirmedEventNotification(EventNotificationRequest::decode(data)?),
            ),
            UnconfirmedServiceChoice::TimeSynchronization => Ok(Self::TimeSynchronization(
                TimeSynchronizationRequest::decode(data)?,
            )),
            UnconfirmedServiceChoice::WhoHas => Ok(Self::WhoHas(WhoHasRequest::decode(data)?)),
            UnconfirmedServiceChoice::WhoIs => Ok(Self::WhoIs(WhoIsRequest::decode(data)?)),
            UnconfirmedServiceChoice::UtcTimeSynchronization => Ok(Self::UtcTimeSynchronization(
                TimeSynchronizationRequest::decode(data)?,
            )),
            _ => Err(ServiceError::UnsupportedService),
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        match self {
            Self::IAm(request) => request.encode(buffer),
            Self::IHave(request) => request.encode(buffer),
            Self::UnconfirmedCOVNotification(request) => request.encode(buffer),
            Self::UnconfirmedEventNotification(request) => request.encode(buffer),
            Self::TimeSynchronization(request) => request.encode(buffer),
            Self::WhoHas(request) => request.encode(buffer),
            Self::WhoIs(request) => request.encode(buffer),
            Self::UtcTimeSynchronization(request) => request.encode(buffer),
        }
    }
}

/// Typed payload of a complex acknowledgement, dispatched on service choice
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServiceAck {
    AtomicReadFile(AtomicReadFileAck),
    AtomicWriteFile(AtomicWriteFileAck),
    ReadProperty(ReadPropertyAck),
    ReadPropertyMultiple(ReadPropertyMultipleAck),
}

impl ServiceAck {
    /// The service choice this payload encodes under
    pub fn choice(&self) -> ConfirmedServiceChoice {
        match self {
            Self::AtomicReadFile(_) => ConfirmedServiceChoice::AtomicReadFile,
            Self::AtomicWriteFile(_) => ConfirmedServiceChoice::AtomicWriteFile,
            Self::ReadProperty(_) => ConfirmedServiceChoice::ReadProperty,
            Self::ReadPropertyMultiple(_) => ConfirmedServiceChoice::ReadPropertyMultiple,
        }
    }

    /// Decode a service-ack payload for a known service choice
    pub fn decode(choice: ConfirmedServiceChoice, data: &[u8]) -> Result<Self> {
        match choice {
            ConfirmedServiceChoice::AtomicReadFile => {
                Ok(Self::AtomicReadFile(AtomicReadFileAck::decode(data)?))
            }
            ConfirmedServiceChoice::AtomicWriteFile => {
                Ok(Self::AtomicWriteFile(AtomicWriteFileAck::decode(data)?))
            }
            ConfirmedServiceChoice::ReadProperty => {
                Ok(Self::ReadProperty(ReadPropertyAck::decode(data)?))
            }
            ConfirmedServiceChoice::ReadPropertyMultiple => Ok(Self::ReadPropertyMultiple(
                ReadPropertyMultipleAck::decode(data)?,
            )),
            _ => Err(ServiceError::UnsupportedService),
        }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        match self {
            Self::AtomicReadFile(ack) => ack.encode(buffer),
            Self::AtomicWriteFile(ack) => ack.encode(buffer),
            Self::ReadProperty(ack) => ack.encode(buffer),
            Self::ReadPropertyMultiple(ack) => ack.encode(buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectType, Time};

    #[test]
    fn test_whois_matching_and_roundtrip() {
        let whois_all = WhoIsRequest::new();
        assert!(whois_all.matches(123));
        assert!(whois_all.matches(456));

        let whois_range = WhoIsRequest::for_range(100, 200);
        assert!(whois_range.matches(150));
        assert!(!whois_range.matches(50));

        let mut buffer = Vec::new();
        whois_all.encode(&mut buffer).unwrap();
        assert!(buffer.is_empty());

        let whois_specific = WhoIsRequest::for_device(123);
        whois_specific.encode(&mut buffer).unwrap();
        assert_eq!(buffer, vec![0x09, 0x7B, 0x19, 0x7B]);
        assert_eq!(WhoIsRequest::decode(&buffer).unwrap(), whois_specific);
    }

    #[test]
    fn test_iam_known_capture_bytes() {
        // Device 123, max APDU 1476, no segmentation, vendor 260
        // (BACnet Stack at SourceForge)
        let bytes = [
            0xC4, 0x02, 0x00, 0x00, 0x7B, // device object id
            0x22, 0x05, 0xC4, // max APDU 1476
            0x91, 0x03, // segmentation: none
            0x22, 0x01, 0x04, // vendor id 260
        ];
        let iam = IAmRequest::decode(&bytes).unwrap();
        assert_eq!(iam.device_identifier.instance, 123);
        assert_eq!(iam.device_identifier.object_type, ObjectType::Device);
        assert_eq!(iam.max_apdu_length_accepted, 1476);
        assert_eq!(iam.segmentation_supported, Segmentation::None);
        assert_eq!(iam.vendor_identifier, 260);

        let mut reencoded = Vec::new();
        iam.encode(&mut reencoded).unwrap();
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn test_whohas_ihave() {
        let whohas = WhoHasRequest::by_name("Supply Fan");
        let mut buffer = Vec::new();
        whohas.encode(&mut buffer).unwrap();
        assert_eq!(WhoHasRequest::decode(&buffer).unwrap(), whohas);

        let whohas = WhoHasRequest::by_identifier(ObjectIdentifier::new(ObjectType::File, 7));
        buffer.clear();
        whohas.encode(&mut buffer).unwrap();
        assert_eq!(WhoHasRequest::decode(&buffer).unwrap(), whohas);

        let ihave = IHaveRequest::new(
            ObjectIdentifier::new(ObjectType::Device, 5),
            ObjectIdentifier::new(ObjectType::File, 7),
            CharacterString::utf8("config.bin"),
        );
        buffer.clear();
        ihave.encode(&mut buffer).unwrap();
        assert_eq!(IHaveRequest::decode(&buffer).unwrap(), ihave);
    }

    #[test]
    fn test_read_property_roundtrip() {
        let request = ReadPropertyRequest::with_array_index(
            ObjectIdentifier::new(ObjectType::AnalogOutput, 3),
            PropertyIdentifier::PriorityArray,
            7,
        );
        let mut buffer = Vec::new();
        request.encode(&mut buffer).unwrap();
        assert_eq!(ReadPropertyRequest::decode(&buffer).unwrap(), request);
    }

    #[test]
    fn test_read_property_ack_resolves_value() {
        let mut value = Vec::new();
        encoding::encode_real(&mut value, 21.5).unwrap();

        let ack = ReadPropertyAck::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 1),
            PropertyIdentifier::PresentValue,
            value,
        );
        let mut buffer = Vec::new();
        ack.encode(&mut buffer).unwrap();

        let decoded = ReadPropertyAck::decode(&buffer).unwrap();
        assert_eq!(decoded, ack);
        assert_eq!(
            decoded.resolve_value().unwrap(),
            ConstructedData::Value(crate::property::PrimitiveValue::Real(21.5))
        );
    }

    #[test]
    fn test_write_property_relinquish_at_priority_one() {
        // Null value at priority 1: a relinquish command
        let mut value = Vec::new();
        encoding::encode_null(&mut value).unwrap();

        let request = WritePropertyRequest::with_priority(
            ObjectIdentifier::new(ObjectType::AnalogOutput, 2),
            PropertyIdentifier::PresentValue,
            value,
            1,
        );
        let mut buffer = Vec::new();
        request.encode(&mut buffer).unwrap();

        // Priority context tag 4, length 1, value 1
        assert_eq!(&buffer[buffer.len() - 2..], &[0x49, 0x01]);

        let decoded = WritePropertyRequest::decode(&buffer).unwrap();
        assert_eq!(decoded.priority, Some(1));
        assert_eq!(decoded.property_value, vec![0x00]);
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_read_property_multiple_roundtrip() {
        let request = ReadPropertyMultipleRequest::new(vec![
            ReadAccessSpecification::new(
                ObjectIdentifier::new(ObjectType::AnalogInput, 1),
                vec![
                    PropertyReference::new(PropertyIdentifier::PresentValue),
                    PropertyReference::new(PropertyIdentifier::ObjectName),
                ],
            ),
            ReadAccessSpecification::new(
                ObjectIdentifier::new(ObjectType::BinaryInput, 2),
                vec![PropertyReference::with_array_index(
                    PropertyIdentifier::PriorityArray,
                    8,
                )],
            ),
        ]);

        let mut buffer = Vec::new();
        request.encode(&mut buffer).unwrap();
        assert_eq!(ReadPropertyMultipleRequest::decode(&buffer).unwrap(), request);
    }

    #[test]
    fn test_read_property_multiple_ack_with_error() {
        let mut value = Vec::new();
        encoding::encode_real(&mut value, 72.0).unwrap();

        let ack = ReadPropertyMultipleAck::new(vec![ReadAccessResult {
            object_identifier: ObjectIdentifier::new(ObjectType::AnalogInput, 1),
            results: vec![
                PropertyResult {
                    property_identifier: PropertyIdentifier::PresentValue,
                    property_array_index: None,
                    outcome: PropertyAccessOutcome::Value(value),
                },
                PropertyResult {
                    property_identifier: PropertyIdentifier::from(600u32),
                    property_array_index: None,
                    outcome: PropertyAccessOutcome::Error {
                        error_class: ErrorClass::Property,
                        error_code: ErrorCode::UnknownProperty,
                    },
                },
            ],
        }]);

        let mut buffer = Vec::new();
        ack.encode(&mut buffer).unwrap();
        assert_eq!(ReadPropertyMultipleAck::decode(&buffer).unwrap(), ack);
    }

    #[test]
    fn test_subscribe_cov_roundtrip() {
        let request = SubscribeCovRequest::with_lifetime(
            18,
            ObjectIdentifier::new(ObjectType::AnalogInput, 10),
            false,
            180,
        );
        let mut buffer = Vec::new();
        request.encode(&mut buffer).unwrap();
        let decoded = SubscribeCovRequest::decode(&buffer).unwrap();
        assert_eq!(decoded, request);
        assert!(!decoded.is_cancellation());

        let cancel = SubscribeCovRequest::new(18, ObjectIdentifier::new(ObjectType::AnalogInput, 10));
        buffer.clear();
        cancel.encode(&mut buffer).unwrap();
        assert!(SubscribeCovRequest::decode(&buffer).unwrap().is_cancellation());
    }

    #[test]
    fn test_cov_notification_roundtrip() {
        let mut present_value = Vec::new();
        encoding::encode_real(&mut present_value, 65.0).unwrap();
        let mut status_flags = Vec::new();
        encoding::encode_bit_string(
            &mut status_flags,
            &crate::encoding::BitString::new(vec![false, false, false, false]),
        )
        .unwrap();

        let notification = CovNotificationRequest {
            subscriber_process_identifier: 18,
            initiating_device_identifier: ObjectIdentifier::new(ObjectType::Device, 1234),
            monitored_object_identifier: ObjectIdentifier::new(ObjectType::AnalogInput, 10),
            time_remaining: 120,
            list_of_values: vec![
                CovPropertyValue {
                    property_identifier: PropertyIdentifier::PresentValue,
                    property_array_index: None,
                    value: present_value,
                    priority: None,
                },
                CovPropertyValue {
                    property_identifier: PropertyIdentifier::StatusFlags,
                    property_array_index: None,
                    value: status_flags,
                    priority: None,
                },
            ],
        };

        let mut buffer = Vec::new();
        notification.encode(&mut buffer).unwrap();
        assert_eq!(CovNotificationRequest::decode(&buffer).unwrap(), notification);
    }

    #[test]
    fn test_event_notification_roundtrip() {
        let notification = EventNotificationRequest {
            process_identifier: 1,
            initiating_device_identifier: ObjectIdentifier::new(ObjectType::Device, 9),
            event_object_identifier: ObjectIdentifier::new(ObjectType::AnalogInput, 2),
            timestamp: TimeStamp::Time(Time {
                hour: 13,
                minute: 3,
                second: 41,
                hundredths: 9,
            }),
            notification_class: 4,
            priority: 100,
            event_type: 4, // out-of-range
            message_text: Some(CharacterString::utf8("High limit exceeded")),
            notify_type: 0,
            ack_required: Some(true),
            from_state: Some(0),
            to_state: 3,
            event_values: None,
        };

        let mut buffer = Vec::new();
        notification.encode(&mut buffer).unwrap();
        assert_eq!(EventNotificationRequest::decode(&buffer).unwrap(), notification);
    }

    #[test]
    fn test_timestamp_forms() {
        for timestamp in [
            TimeStamp::Time(Time {
                hour: 1,
                minute: 2,
                second: 3,
                hundredths: 4,
            }),
            TimeStamp::SequenceNumber(77),
            TimeStamp::DateTime(DateTime::unspecified()),
        ] {
            let mut buffer = Vec::new();
            timestamp.encode(&mut buffer).unwrap();
            let (decoded, consumed) = TimeStamp::decode(&buffer).unwrap();
            assert_eq!(decoded, timestamp);
            assert_eq!(consumed, buffer.len());
        }
    }

    #[test]
    fn test_atomic_read_file_roundtrip() {
        let request =
            AtomicReadFileRequest::stream(ObjectIdentifier::new(ObjectType::File, 7), 0, 512);
        let mut buffer = Vec::new();
        request.encode(&mut buffer).unwrap();
        assert_eq!(AtomicReadFileRequest::decode(&buffer).unwrap(), request);

        let ack = AtomicReadFileAck {
            end_of_file: false,
            access: ReadFileAckAccess::Stream {
                file_start_position: 0,
                file_data: vec![1, 2, 3, 4],
            },
        };
        buffer.clear();
        ack.encode(&mut buffer).unwrap();
        assert_eq!(AtomicReadFileAck::decode(&buffer).unwrap(), ack);

        let ack = AtomicReadFileAck {
            end_of_file: true,
            access: ReadFileAckAccess::Record {
                file_start_record: 14,
                returned_record_count: 2,
                file_record_data: vec![vec![0x12, 0x34], vec![0x56]],
            },
        };
        buffer.clear();
        ack.encode(&mut buffer).unwrap();
        assert_eq!(AtomicReadFileAck::decode(&buffer).unwrap(), ack);
    }

    #[test]
    fn test_atomic_write_file_roundtrip() {
        let request = AtomicWriteFileRequest::stream(
            ObjectIdentifier::new(ObjectType::File, 2),
            30,
            vec![0xAA; 16],
        );
        let mut buffer = Vec::new();
        request.encode(&mut buffer).unwrap();
        assert_eq!(AtomicWriteFileRequest::decode(&buffer).unwrap(), request);

        let ack = AtomicWriteFileAck::Stream {
            file_start_position: 30,
        };
        buffer.clear();
        ack.encode(&mut buffer).unwrap();
        assert_eq!(AtomicWriteFileAck::decode(&buffer).unwrap(), ack);
    }

    #[test]
    fn test_service_dispatch_unions() {
        let request = ConfirmedServiceRequest::ReadProperty(ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::Device, 1),
            PropertyIdentifier::ObjectList,
        ));
        assert_eq!(request.choice(), ConfirmedServiceChoice::ReadProperty);

        let mut buffer = Vec::new();
        request.encode(&mut buffer).unwrap();
        assert_eq!(
            ConfirmedServiceRequest::decode(ConfirmedServiceChoice::ReadProperty, &buffer).unwrap(),
            request
        );

        // A defined service with no payload model is an explicit error
        assert_eq!(
            ConfirmedServiceRequest::decode(ConfirmedServiceChoice::VtOpen, &buffer),
            Err(ServiceError::UnsupportedService)
        );

        // A service choice outside the defined set is fatal
        assert_eq!(
            ConfirmedServiceChoice::try_from(200),
            Err(ServiceError::UnsupportedServiceChoice(200))
        );
    }

    #[test]
    fn test_reject_abort_reason_ranges() {
        assert_eq!(RejectReason::from(9u8), RejectReason::UnrecognizedService);
        assert_eq!(u8::from(AbortReason::SegmentationNotSupported), 4);
        // Vendor-range reasons decode to Custom
        assert!(matches!(RejectReason::from(100u8), RejectReason::Custom(_)));
        assert!(matches!(AbortReason::from(200u8), AbortReason::Custom(_)));
    }
}
