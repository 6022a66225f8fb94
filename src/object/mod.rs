//! BACnet Object and Property Vocabulary
//!
//! This module defines the identifier vocabulary of ASHRAE Standard 135 used
//! throughout the codec: object types, property identifiers, object
//! identifiers (10-bit type, 22-bit instance), status flags, segmentation
//! support, error classes/codes, and the wildcard-capable date/time types.
//!
//! Object types 128 and above, and property identifiers 512 and above, are
//! reserved for vendor extension. Both enumerations are generated with
//! [`generate_custom_enum!`](crate::generate_custom_enum) so that every
//! numeric value decodes: named standard values map to their variant,
//! vendor-range values map to `Custom`, and unnamed standard values map to
//! `Reserved`. Nothing in the decode path fails on an unknown number.
//!
//! # Examples
//!
//! ```
//! use bacnet_codec::object::{ObjectIdentifier, ObjectType, PropertyIdentifier};
//!
//! let sensor = ObjectIdentifier::new(ObjectType::AnalogInput, 1);
//! assert!(sensor.is_valid());
//!
//! // Vendor-proprietary identifiers decode instead of failing
//! let vendor = ObjectType::from(300u16);
//! assert!(vendor.is_proprietary());
//! let prop = PropertyIdentifier::from(9000u32);
//! assert!(prop.is_proprietary());
//! ```

use bitflags::bitflags;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::encoding::{self, BitString, Result as EncodingResult};
use crate::generate_custom_enum;

generate_custom_enum! {
    /// BACnet object types (clause 21). Values 128-1023 are
    /// vendor-proprietary and map to `Custom`.
    ObjectType {
        AnalogInput = 0,
        AnalogOutput = 1,
        AnalogValue = 2,
        BinaryInput = 3,
        BinaryOutput = 4,
        BinaryValue = 5,
        Calendar = 6,
        Command = 7,
        Device = 8,
        EventEnrollment = 9,
        File = 10,
        Group = 11,
        Loop = 12,
        MultiStateInput = 13,
        MultiStateOutput = 14,
        NotificationClass = 15,
        Program = 16,
        Schedule = 17,
        Averaging = 18,
        MultiStateValue = 19,
        TrendLog = 20,
        LifeSafetyPoint = 21,
        LifeSafetyZone = 22,
        Accumulator = 23,
        PulseConverter = 24,
        EventLog = 25,
        GlobalGroup = 26,
        TrendLogMultiple = 27,
        LoadControl = 28,
        StructuredView = 29,
        AccessDoor = 30,
    },
    u16,
    128..=1023
}

impl ObjectType {
    /// Vendor-proprietary object types occupy values 128 and above
    pub fn is_proprietary(&self) -> bool {
        matches!(self, ObjectType::Custom(_))
    }
}

generate_custom_enum! {
    /// BACnet property identifiers (clause 21). Values 512-4194303 are
    /// vendor-proprietary and map to `Custom`.
    PropertyIdentifier {
        AckedTransitions = 0,
        AckRequired = 1,
        Action = 2,
        ActionText = 3,
        ActiveText = 4,
        ActiveVtSessions = 5,
        AlarmValue = 6,
        AlarmValues = 7,
        All = 8,
        AllWritesSuccessful = 9,
        ApduSegmentTimeout = 10,
        ApduTimeout = 11,
        ApplicationSoftwareVersion = 12,
        Archive = 13,
        Bias = 14,
        ChangeOfStateCount = 15,
        ChangeOfStateTime = 16,
        NotificationClass = 17,
        ControlledVariableReference = 19,
        ControlledVariableUnits = 20,
        ControlledVariableValue = 21,
        CovIncrement = 22,
        DateList = 23,
        DaylightSavingsStatus = 24,
        Deadband = 25,
        DerivativeConstant = 26,
        DerivativeConstantUnits = 27,
        Description = 28,
        DescriptionOfHalt = 29,
        DeviceAddressBinding = 30,
        DeviceType = 31,
        EffectivePeriod = 32,
        ElapsedActiveTime = 33,
        ErrorLimit = 34,
        EventEnable = 35,
        EventState = 36,
        EventType = 37,
        ExceptionSchedule = 38,
        FaultValues = 39,
        FeedbackValue = 40,
        FileAccessMethod = 41,
        FileSize = 42,
        FileType = 43,
        FirmwareRevision = 44,
        HighLimit = 45,
        InactiveText = 46,
        InProcess = 47,
        InstanceOf = 48,
        IntegralConstant = 49,
        IntegralConstantUnits = 50,
        IssueConfirmedNotifications = 51,
        LimitEnable = 52,
        ListOfGroupMembers = 53,
        ListOfObjectPropertyReferences = 54,
        LocalDate = 56,
        LocalTime = 57,
        Location = 58,
        LowLimit = 59,
        ManipulatedVariableReference = 60,
        MaximumOutput = 61,
        MaxApduLengthAccepted = 62,
        MaxInfoFrames = 63,
        MaxMaster = 64,
        MaxPresValue = 65,
        MinimumOffTime = 66,
        MinimumOnTime = 67,
        MinimumOutput = 68,
        MinPresValue = 69,
        ModelName = 70,
        ModificationDate = 71,
        NotifyType = 72,
        NumberOfApduRetries = 73,
        NumberOfStates = 74,
        ObjectIdentifier = 75,
        ObjectList = 76,
        ObjectName = 77,
        ObjectPropertyReference = 78,
        ObjectType = 79,
        Optional = 80,
        OutOfService = 81,
        OutputUnits = 82,
        EventParameters = 83,
        Polarity = 84,
        PresentValue = 85,
        Priority = 86,
        PriorityArray = 87,
        PriorityForWriting = 88,
        ProcessIdentifier = 89,
        ProgramChange = 90,
        ProgramLocation = 91,
        ProgramState = 92,
        ProportionalConstant = 93,
        ProportionalConstantUnits = 94,
        ProtocolObjectTypesSupported = 96,
        ProtocolServicesSupported = 97,
        ProtocolVersion = 98,
        ReadOnly = 99,
        ReasonForHalt = 100,
        RecipientList = 102,
        Reliability = 103,
        RelinquishDefault = 104,
        Required = 105,
        Resolution = 106,
        SegmentationSupported = 107,
        Setpoint = 108,
        SetpointReference = 109,
        StateText = 110,
        StatusFlags = 111,
        SystemStatus = 112,
        TimeDelay = 113,
        TimeOfActiveTimeReset = 114,
        TimeOfStateCountReset = 115,
        TimeSynchronizationRecipients = 116,
        Units = 117,
        UpdateInterval = 118,
        UtcOffset = 119,
        VendorIdentifier = 120,
        VendorName = 121,
        VtClassesSupported = 122,
        WeeklySchedule = 123,
        LogBuffer = 131,
        LogDeviceObjectProperty = 132,
        LogInterval = 134,
        ProtocolRevision = 139,
        RecordCount = 141,
        StartTime = 142,
        StopTime = 143,
        TotalRecordCount = 145,
        DatabaseRevision = 155,
        LastRestoreTime = 157,
    },
    u32,
    512..=4194303
}

impl PropertyIdentifier {
    /// Vendor-proprietary property identifiers occupy values 512 and above
    pub fn is_proprietary(&self) -> bool {
        matches!(self, PropertyIdentifier::Custom(_))
    }
}

generate_custom_enum! {
    /// Error classes carried in Error PDUs
    ErrorClass {
        Device = 0,
        Object = 1,
        Property = 2,
        Resources = 3,
        Security = 4,
        Services = 5,
        Vt = 6,
        Communication = 7,
    },
    u16,
    64..=65535
}

generate_custom_enum! {
    /// Error codes carried in Error PDUs. Values 256 and above are
    /// vendor-proprietary.
    ErrorCode {
        Other = 0,
        ConfigurationInProgress = 2,
        DeviceBusy = 3,
        DynamicCreationNotSupported = 4,
        FileAccessDenied = 5,
        InconsistentParameters = 7,
        InconsistentSelectionCriterion = 8,
        InvalidDataType = 9,
        InvalidFileAccessMethod = 10,
        InvalidFileStartPosition = 11,
        InvalidParameterDataType = 13,
        InvalidTimestamp = 14,
        MissingRequiredParameter = 16,
        NoObjectsOfSpecifiedType = 17,
        NoSpaceForObject = 18,
        NoSpaceToAddListElement = 19,
        NoSpaceToWriteProperty = 20,
        NoVtSessionsAvailable = 21,
        PropertyIsNotAList = 22,
        ObjectDeletionNotPermitted = 23,
        ObjectIdentifierAlreadyExists = 24,
        OperationalProblem = 25,
        PasswordFailure = 26,
        ReadAccessDenied = 27,
        SecurityNotSupported = 28,
        ServiceRequestDenied = 29,
        Timeout = 30,
        UnknownObject = 31,
        UnknownProperty = 32,
        UnknownVtClass = 34,
        UnknownVtSession = 35,
        UnsupportedObjectType = 36,
        ValueOutOfRange = 37,
        VtSessionAlreadyClosed = 38,
        VtSessionTerminationFailure = 39,
        WriteAccessDenied = 40,
        CharacterSetNotSupported = 41,
        InvalidArrayIndex = 42,
        CovSubscriptionFailed = 43,
        NotCovProperty = 44,
        OptionalFunctionalityNotSupported = 45,
        InvalidConfigurationData = 46,
        DatatypeNotSupported = 47,
        DuplicateName = 48,
        DuplicateObjectId = 49,
        PropertyIsNotAnArray = 50,
    },
    u16,
    256..=65535
}

/// Segmentation support advertised by a device (clause 20.1.2.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Segmentation {
    Both = 0,
    Transmit = 1,
    Receive = 2,
    None = 3,
}

impl TryFrom<u32> for Segmentation {
    type Error = crate::encoding::EncodingError;

    fn try_from(value: u32) -> EncodingResult<Self> {
        match value {
            0 => Ok(Segmentation::Both),
            1 => Ok(Segmentation::Transmit),
            2 => Ok(Segmentation::Receive),
            3 => Ok(Segmentation::None),
            _ => Err(crate::encoding::EncodingError::InvalidFormat(
                "invalid segmentation value".into(),
            )),
        }
    }
}

/// Object identifier (type + instance number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectIdentifier {
    pub object_type: ObjectType,
    pub instance: u32,
}

impl ObjectIdentifier {
    /// Create a new object identifier
    pub fn new(object_type: ObjectType, instance: u32) -> Self {
        Self {
            object_type,
            instance,
        }
    }

    /// Check if instance number is valid (0-4194302; 4194303 is the wildcard)
    pub fn is_valid(&self) -> bool {
        self.instance < 0x3F_FFFF
    }

    /// Encode as an application-tagged object identifier
    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_object_identifier(buffer, self.object_type.into(), self.instance)
    }

    /// Decode from an application-tagged object identifier
    pub fn decode(data: &[u8]) -> EncodingResult<(Self, usize)> {
        let ((object_type, instance), consumed) = encoding::decode_object_identifier(data)?;
        Ok((Self::new(object_type.into(), instance), consumed))
    }

    /// Encode as a context-tagged object identifier
    pub fn encode_context(&self, buffer: &mut Vec<u8>, number: u8) -> EncodingResult<()> {
        encoding::encode_context_object_id(buffer, number, self.object_type.into(), self.instance)
    }

    /// Decode from a context-tagged object identifier
    pub fn decode_context(data: &[u8], number: u8) -> EncodingResult<(Self, usize)> {
        let ((object_type, instance), consumed) = encoding::decode_context_object_id(data, number)?;
        Ok((Self::new(object_type.into(), instance), consumed))
    }
}

impl From<u32> for ObjectIdentifier {
    /// Convert from 32-bit object identifier.
    /// See clause 20.2.14 of the BACnet specification.
    fn from(value: u32) -> Self {
        let object_type = ((value >> 22) & 0x3FF) as u16;
        Self::new(object_type.into(), value & 0x3F_FFFF)
    }
}

impl From<ObjectIdentifier> for u32 {
    /// Convert to 32-bit object identifier.
    /// See clause 20.2.14 of the BACnet specification.
    fn from(value: ObjectIdentifier) -> Self {
        let object_type: u16 = value.object_type.into();
        ((object_type as u32) << 22) | (value.instance & 0x3F_FFFF)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

bitflags! {
    /// The four standard status flags of clause 12, first bit first
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StatusFlags: u8 {
        const IN_ALARM = 0b0001;
        const FAULT = 0b0010;
        const OVERRIDDEN = 0b0100;
        const OUT_OF_SERVICE = 0b1000;
    }
}

impl StatusFlags {
    pub fn in_alarm(&self) -> bool {
        self.contains(StatusFlags::IN_ALARM)
    }

    pub fn fault(&self) -> bool {
        self.contains(StatusFlags::FAULT)
    }

    pub fn overridden(&self) -> bool {
        self.contains(StatusFlags::OVERRIDDEN)
    }

    pub fn out_of_service(&self) -> bool {
        self.contains(StatusFlags::OUT_OF_SERVICE)
    }

    /// Interpret a decoded bit string: bit 0 is in-alarm, bit 3 out-of-service
    pub fn from_bit_string(bits: &BitString) -> Self {
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::IN_ALARM, bits.bit(0));
        flags.set(StatusFlags::FAULT, bits.bit(1));
        flags.set(StatusFlags::OVERRIDDEN, bits.bit(2));
        flags.set(StatusFlags::OUT_OF_SERVICE, bits.bit(3));
        flags
    }

    /// The wire representation: a four-bit string
    pub fn to_bit_string(self) -> BitString {
        BitString::new(vec![
            self.in_alarm(),
            self.fault(),
            self.overridden(),
            self.out_of_service(),
        ])
    }
}

/// BACnet date; every field accepts 255 as the wildcard, `month` also
/// accepts 13 (odd months) and 14 (even months), `day` 32 (last day)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
}

impl Date {
    pub const UNSPECIFIED: u8 = 255;

    /// A date with every field wildcarded
    pub fn unspecified() -> Self {
        Self {
            year: 255,
            month: 255,
            day: 255,
            weekday: 255,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.year == 255 && self.month == 255 && self.day == 255 && self.weekday == 255
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_date(buffer, self.year, self.month, self.day, self.weekday)
    }

    pub fn decode(data: &[u8]) -> EncodingResult<(Self, usize)> {
        let ((year, month, day, weekday), consumed) = encoding::decode_date(data)?;
        Ok((
            Self {
                year,
                month,
                day,
                weekday,
            },
            consumed,
        ))
    }
}

#[cfg(feature = "std")]
impl From<chrono::NaiveDate> for Date {
    fn from(value: chrono::NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            year: value.year() as u16,
            month: value.month() as u8,
            day: value.day() as u8,
            // BACnet weekday is 1 = Monday
            weekday: value.weekday().number_from_monday() as u8,
        }
    }
}

/// BACnet time; every field accepts 255 as the wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub hundredths: u8,
}

impl Time {
    /// A time with every field wildcarded
    pub fn unspecified() -> Self {
        Self {
            hour: 255,
            minute: 255,
            second: 255,
            hundredths: 255,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.hour == 255 && self.minute == 255 && self.second == 255 && self.hundredths == 255
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> EncodingResult<()> {
        encoding::encode_time(buffer, self.hour, self.minute, self.second, self.hundredths)
    }

    pub fn decode(data: &[u8]) -> EncodingResult<(Self, usize)> {
        let ((hour, minute, second, hundredths), consumed) = encoding::decode_time(data)?;
        Ok((
            Self {
                hour,
                minute,
                second,
                hundredths,
            },
            consumed,
        ))
    }
}

#[cfg(feature = "std")]
impl From<chrono::NaiveTime> for Time {
    fn from(value: chrono::NaiveTime) -> Self {
        use chrono::Timelike;
        Self {
            hour: value.hour() as u8,
            minute: value.minute() as u8,
            second: value.second() as u8,
            hundredths: (value.nanosecond() / 10_000_000) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_ranges() {
        assert_eq!(ObjectType::from(8u16), ObjectType::Device);
        assert_eq!(u16::from(ObjectType::AnalogInput), 0);

        let vendor = ObjectType::from(300u16);
        assert!(vendor.is_proprietary());
        assert_eq!(u16::from(vendor), 300);

        // Unnamed standard value: reserved, not proprietary
        let reserved = ObjectType::from(100u16);
        assert!(!reserved.is_proprietary());
        assert_eq!(u16::from(reserved), 100);
    }

    #[test]
    fn test_property_identifier_ranges() {
        assert_eq!(PropertyIdentifier::from(85u32), PropertyIdentifier::PresentValue);
        assert_eq!(u32::from(PropertyIdentifier::PriorityArray), 87);

        let vendor = PropertyIdentifier::from(512u32);
        assert!(vendor.is_proprietary());
        let vendor = PropertyIdentifier::from(4_194_303u32);
        assert!(vendor.is_proprietary());
        assert!(!PropertyIdentifier::from(400u32).is_proprietary());
    }

    #[test]
    fn test_error_enums() {
        assert_eq!(ErrorClass::from(2u16), ErrorClass::Property);
        assert_eq!(ErrorCode::from(32u16), ErrorCode::UnknownProperty);
        assert_eq!(u16::from(ErrorCode::WriteAccessDenied), 40);

        // Vendor error codes decode to Custom rather than failing
        let vendor = ErrorCode::from(1000u16);
        assert_eq!(u16::from(vendor), 1000);
    }

    #[test]
    fn test_object_identifier_packing() {
        let id = ObjectIdentifier::new(ObjectType::Device, 123);
        let packed: u32 = id.into();
        assert_eq!(packed, (8 << 22) | 123);
        assert_eq!(ObjectIdentifier::from(packed), id);
        assert!(id.is_valid());
    }

    #[test]
    fn test_object_identifier_codec() {
        let id = ObjectIdentifier::new(ObjectType::AnalogValue, 42);
        let mut buffer = Vec::new();
        id.encode(&mut buffer).unwrap();
        let (decoded, consumed) = ObjectIdentifier::decode(&buffer).unwrap();
        assert_eq!(decoded, id);
        assert_eq!(consumed, buffer.len());

        buffer.clear();
        id.encode_context(&mut buffer, 1).unwrap();
        let (decoded, _) = ObjectIdentifier::decode_context(&buffer, 1).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_status_flags_bit_order() {
        let bits = BitString::new(vec![true, false, false, true]);
        let flags = StatusFlags::from_bit_string(&bits);
        assert!(flags.in_alarm());
        assert!(!flags.fault());
        assert!(!flags.overridden());
        assert!(flags.out_of_service());
        assert_eq!(flags.to_bit_string(), bits);
    }

    #[test]
    fn test_date_time_wildcards() {
        assert!(Date::unspecified().is_unspecified());
        assert!(Time::unspecified().is_unspecified());

        let date = Date {
            year: 2024,
            month: 3,
            day: 15,
            weekday: 5,
        };
        let mut buffer = Vec::new();
        date.encode(&mut buffer).unwrap();
        let (decoded, _) = Date::decode(&buffer).unwrap();
        assert_eq!(decoded, date);

        let time = Time {
            hour: 14,
            minute: 30,
            second: 45,
            hundredths: 0,
        };
        buffer.clear();
        time.encode(&mut buffer).unwrap();
        let (decoded, _) = Time::decode(&buffer).unwrap();
        assert_eq!(decoded, time);
    }
}
