//! BACnet Property Value Decoders
//!
//! This module turns the raw bytes of a property value into typed data. The
//! shape of a property value depends on both the object type and the
//! property identifier, so decoding goes through a dispatch table keyed by
//! `(ObjectType, PropertyIdentifier)` with a second table for properties
//! whose shape does not depend on the object type.
//!
//! Combinations absent from both tables, including every vendor-proprietary
//! object type (value >= 128) and property identifier (value >= 512), fall
//! back to [`ConstructedData::Unspecified`]: an ordered list of tagged
//! values that preserves enough structure to re-encode byte-identically.
//! Service decoding therefore never fails merely because a property is
//! unmodeled.
//!
//! # Example
//!
//! ```
//! use bacnet_codec::object::{ObjectType, PropertyIdentifier};
//! use bacnet_codec::property::{resolve, ConstructedData};
//!
//! // 0x91 0x00: an enumerated zero, under a vendor-proprietary property
//! let data = [0x91, 0x00];
//! let resolved = resolve(
//!     ObjectType::from(300u16),
//!     PropertyIdentifier::from(600u32),
//!     None,
//!     &data,
//! ).unwrap();
//! assert!(matches!(resolved, ConstructedData::Unspecified(_)));
//! ```

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::encoding::{
    self, ApplicationTag, BitString, CharacterString, EncodingError, Result, Tag, TagClass,
    TagForm,
};
use crate::object::{Date, ObjectIdentifier, ObjectType, PropertyIdentifier, StatusFlags, Time};

/// A decoded application-tagged primitive value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Signed(i32),
    Real(f32),
    Double(f64),
    OctetString(Vec<u8>),
    CharacterString(CharacterString),
    BitString(BitString),
    Enumerated(u32),
    Date(Date),
    Time(Time),
    ObjectIdentifier(ObjectIdentifier),
}

impl PrimitiveValue {
    /// The application tag this value encodes under
    pub fn application_tag(&self) -> ApplicationTag {
        match self {
            PrimitiveValue::Null => ApplicationTag::Null,
            PrimitiveValue::Boolean(_) => ApplicationTag::Boolean,
            PrimitiveValue::Unsigned(_) => ApplicationTag::UnsignedInt,
            PrimitiveValue::Signed(_) => ApplicationTag::SignedInt,
            PrimitiveValue::Real(_) => ApplicationTag::Real,
            PrimitiveValue::Double(_) => ApplicationTag::Double,
            PrimitiveValue::OctetString(_) => ApplicationTag::OctetString,
            PrimitiveValue::CharacterString(_) => ApplicationTag::CharacterString,
            PrimitiveValue::BitString(_) => ApplicationTag::BitString,
            PrimitiveValue::Enumerated(_) => ApplicationTag::Enumerated,
            PrimitiveValue::Date(_) => ApplicationTag::Date,
            PrimitiveValue::Time(_) => ApplicationTag::Time,
            PrimitiveValue::ObjectIdentifier(_) => ApplicationTag::ObjectIdentifier,
        }
    }

    /// Decode one application-tagged value
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (tag, _) = Tag::decode(data)?;
        if tag.class != TagClass::Application || tag.is_constructed() {
            return Err(EncodingError::UnexpectedTag);
        }

        match ApplicationTag::try_from(tag.number)? {
            ApplicationTag::Null => {
                let consumed = encoding::decode_null(data)?;
                Ok((PrimitiveValue::Null, consumed))
            }
            ApplicationTag::Boolean => {
                let (value, consumed) = encoding::decode_boolean(data)?;
                Ok((PrimitiveValue::Boolean(value), consumed))
            }
            ApplicationTag::UnsignedInt => {
                let (value, consumed) = encoding::decode_unsigned(data)?;
                Ok((PrimitiveValue::Unsigned(value), consumed))
            }
            ApplicationTag::SignedInt => {
                let (value, consumed) = encoding::decode_signed(data)?;
                Ok((PrimitiveValue::Signed(value), consumed))
            }
            ApplicationTag::Real => {
                let (value, consumed) = encoding::decode_real(data)?;
                Ok((PrimitiveValue::Real(value), consumed))
            }
            ApplicationTag::Double => {
                let (value, consumed) = encoding::decode_double(data)?;
                Ok((PrimitiveValue::Double(value), consumed))
            }
            ApplicationTag::OctetString => {
                let (value, consumed) = encoding::decode_octet_string(data)?;
                Ok((PrimitiveValue::OctetString(value), consumed))
            }
            ApplicationTag::CharacterString => {
                let (value, consumed) = encoding::decode_character_string(data)?;
                Ok((PrimitiveValue::CharacterString(value), consumed))
            }
            ApplicationTag::BitString => {
                let (value, consumed) = encoding::decode_bit_string(data)?;
                Ok((PrimitiveValue::BitString(value), consumed))
            }
            ApplicationTag::Enumerated => {
                let (value, consumed) = encoding::decode_enumerated(data)?;
                Ok((PrimitiveValue::Enumerated(value), consumed))
            }
            ApplicationTag::Date => {
                let (value, consumed) = Date::decode(data)?;
                Ok((PrimitiveValue::Date(value), consumed))
            }
            ApplicationTag::Time => {
                let (value, consumed) = Time::decode(data)?;
                Ok((PrimitiveValue::Time(value), consumed))
            }
            ApplicationTag::ObjectIdentifier => {
                let (value, consumed) = ObjectIdentifier::decode(data)?;
                Ok((PrimitiveValue::ObjectIdentifier(value), consumed))
            }
        }
    }

    /// Encode as an application-tagged value in canonical form
    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<()> {
        match self {
            PrimitiveValue::Null => encoding::encode_null(buffer),
            PrimitiveValue::Boolean(value) => encoding::encode_boolean(buffer, *value),
            PrimitiveValue::Unsigned(value) => encoding::encode_unsigned(buffer, *value),
            PrimitiveValue::Signed(value) => encoding::encode_signed(buffer, *value),
            PrimitiveValue::Real(value) => encoding::encode_real(buffer, *value),
            PrimitiveValue::Double(value) => encoding::encode_double(buffer, *value),
            PrimitiveValue::OctetString(value) => encoding::encode_octet_string(buffer, value),
            PrimitiveValue::CharacterString(value) => {
                encoding::encode_character_string(buffer, value)
            }
            PrimitiveValue::BitString(value) => encoding::encode_bit_string(buffer, value),
            PrimitiveValue::Enumerated(value) => encoding::encode_enumerated(buffer, *value),
            PrimitiveValue::Date(value) => value.encode(buffer),
            PrimitiveValue::Time(value) => value.encode(buffer),
            PrimitiveValue::ObjectIdentifier(value) => value.encode(buffer),
        }
    }

    /// Check if this is a numeric value
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PrimitiveValue::Real(_)
                | PrimitiveValue::Double(_)
                | PrimitiveValue::Unsigned(_)
                | PrimitiveValue::Signed(_)
        )
    }

    /// Get numeric value as f64 if possible
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            PrimitiveValue::Real(value) => Some(*value as f64),
            PrimitiveValue::Double(value) => Some(*value),
            PrimitiveValue::Unsigned(value) => Some(*value as f64),
            PrimitiveValue::Signed(value) => Some(*value as f64),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Null => write!(f, "Null"),
            PrimitiveValue::Boolean(value) => write!(f, "{}", value),
            PrimitiveValue::Unsigned(value) => write!(f, "{}", value),
            PrimitiveValue::Signed(value) => write!(f, "{}", value),
            PrimitiveValue::Real(value) => write!(f, "{:.2}", value),
            PrimitiveValue::Double(value) => write!(f, "{:.2}", value),
            PrimitiveValue::OctetString(bytes) => write!(f, "Octets[{}]", bytes.len()),
            PrimitiveValue::CharacterString(value) => write!(f, "{}", value.text),
            PrimitiveValue::BitString(bits) => {
                write!(f, "Bits(")?;
                for bit in bits.bits() {
                    write!(f, "{}", if *bit { '1' } else { '0' })?;
                }
                write!(f, ")")
            }
            PrimitiveValue::Enumerated(value) => write!(f, "Enum({})", value),
            PrimitiveValue::Date(date) => write!(
                f,
                "{:04}-{:02}-{:02} (DoW:{})",
                date.year, date.month, date.day, date.weekday
            ),
            PrimitiveValue::Time(time) => write!(
                f,
                "{:02}:{:02}:{:02}.{:02}",
                time.hour, time.minute, time.second, time.hundredths
            ),
            PrimitiveValue::ObjectIdentifier(id) => write!(f, "{}", id),
        }
    }
}

/// One decoded tag with its payload, preserving enough structure to
/// re-encode byte-identically. Context-tagged primitives keep their raw
/// payload because their type is unknowable without the enclosing schema.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaggedValue {
    /// Application-tagged primitive
    Application(PrimitiveValue),
    /// Context-tagged primitive with uninterpreted payload bytes
    Context { number: u8, bytes: Vec<u8> },
    /// Constructed data between an opening and closing tag
    Constructed {
        number: u8,
        items: Vec<TaggedValue>,
    },
}

impl TaggedValue {
    /// Decode one tagged value, recursing into constructed data
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (tag, header) = Tag::decode(data)?;
        match (tag.class, tag.form) {
            (TagClass::Application, TagForm::Primitive { .. }) => {
                let (value, consumed) = PrimitiveValue::decode(data)?;
                Ok((TaggedValue::Application(value), consumed))
            }
            (TagClass::Context, TagForm::Primitive { length }) => {
                let bytes = data
                    .get(header..header + length as usize)
                    .ok_or(EncodingError::BufferUnderflow)?;
                Ok((
                    TaggedValue::Context {
                        number: tag.number,
                        bytes: bytes.to_vec(),
                    },
                    header + length as usize,
                ))
            }
            (TagClass::Context, TagForm::Opening) => {
                let mut items = Vec::new();
                let mut pos = header;
                loop {
                    let (inner, inner_header) = Tag::decode(&data[pos..])?;
                    if inner.is_closing() && inner.number == tag.number {
                        pos += inner_header;
                        break;
                    }
                    let (item, consumed) = TaggedValue::decode(&data[pos..])?;
                    items.push(item);
                    pos += consumed;
                }
                Ok((
                    TaggedValue::Constructed {
                        number: tag.number,
                        items,
                    },
                    pos,
                ))
            }
            // A closing tag with no matching opening, or a constructed
            // application tag, cannot start a value
            _ => Err(EncodingError::MalformedTag),
        }
    }

    /// Decode an entire buffer as an ordered list of tagged values
    pub fn decode_list(data: &[u8]) -> Result<Vec<Self>> {
        let mut items = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (item, consumed) = TaggedValue::decode(&data[pos..])?;
            items.push(item);
            pos += consumed;
        }
        Ok(items)
    }

    /// Re-encode this value (canonical tag forms)
    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<()> {
        match self {
            TaggedValue::Application(value) => value.encode(buffer),
            TaggedValue::Context { number, bytes } => {
                Tag::context(*number, bytes.len() as u32).encode(buffer)?;
                buffer.extend_from_slice(bytes);
                Ok(())
            }
            TaggedValue::Constructed { number, items } => {
                encoding::encode_opening_tag(buffer, *number)?;
                for item in items {
                    item.encode(buffer)?;
                }
                encoding::encode_closing_tag(buffer, *number)
            }
        }
    }

    /// Re-encode a list of tagged values
    pub fn encode_list(items: &[Self], buffer: &mut Vec<u8>) -> Result<()> {
        for item in items {
            item.encode(buffer)?;
        }
        Ok(())
    }
}

/// A BACnet date+time pair (two consecutive application tags)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateTime {
    pub date: Date,
    pub time: Time,
}

impl DateTime {
    pub fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    /// Create from current local time
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        let now = chrono::Local::now();
        Self::new(Date::from(now.date_naive()), Time::from(now.time()))
    }

    /// Create with every field wildcarded
    pub fn unspecified() -> Self {
        Self::new(Date::unspecified(), Time::unspecified())
    }

    pub fn is_unspecified(&self) -> bool {
        self.date.is_unspecified() && self.time.is_unspecified()
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<()> {
        self.date.encode(buffer)?;
        self.time.encode(buffer)
    }

    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (date, date_len) = Date::decode(data)?;
        let (time, time_len) = Time::decode(&data[date_len..])?;
        Ok((Self::new(date, time), date_len + time_len))
    }
}

/// One slot of a priority array: relinquished (Null) or a commanded value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PriorityValue {
    Relinquished,
    Value(PrimitiveValue),
}

impl PriorityValue {
    fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (value, consumed) = PrimitiveValue::decode(data)?;
        let slot = match value {
            PrimitiveValue::Null => PriorityValue::Relinquished,
            other => PriorityValue::Value(other),
        };
        Ok((slot, consumed))
    }

    fn encode(&self, buffer: &mut Vec<u8>) -> Result<()> {
        match self {
            PriorityValue::Relinquished => encoding::encode_null(buffer),
            PriorityValue::Value(value) => value.encode(buffer),
        }
    }
}

/// The sixteen command priority slots of a commandable object
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriorityArray {
    slots: Vec<PriorityValue>,
}

impl PriorityArray {
    pub const SLOTS: usize = 16;

    pub fn new(slots: Vec<PriorityValue>) -> Self {
        Self { slots }
    }

    /// Slot by command priority (1-16)
    pub fn slot(&self, priority: u8) -> Option<&PriorityValue> {
        if priority == 0 {
            return None;
        }
        self.slots.get(priority as usize - 1)
    }

    /// The highest-priority (lowest-numbered) active command
    pub fn active(&self) -> Option<(u8, &PrimitiveValue)> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            if let PriorityValue::Value(value) = slot {
                Some((index as u8 + 1, value))
            } else {
                None
            }
        })
    }

    pub fn slots(&self) -> &[PriorityValue] {
        &self.slots
    }
}

/// Reference to a property of an object, optionally on another device
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceObjectPropertyReference {
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub property_array_index: Option<u32>,
    pub device_identifier: Option<ObjectIdentifier>,
}

impl DeviceObjectPropertyReference {
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
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

        let device_identifier = match ObjectIdentifier::decode_context(&data[pos..], 3) {
            Ok((id, consumed)) => {
                pos += consumed;
                Some(id)
            }
            Err(_) => None,
        };

        Ok((
            Self {
                object_identifier,
                property_identifier: property_raw.into(),
                property_array_index,
                device_identifier,
            },
            pos,
        ))
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<()> {
        self.object_identifier.encode_context(buffer, 0)?;
        encoding::encode_context_enumerated(buffer, 1, self.property_identifier.into())?;
        if let Some(index) = self.property_array_index {
            encoding::encode_context_unsigned(buffer, 2, index)?;
        }
        if let Some(device) = self.device_identifier {
            device.encode_context(buffer, 3)?;
        }
        Ok(())
    }
}

/// A property value resolved to its concrete shape
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstructedData {
    /// A single application-tagged value
    Value(PrimitiveValue),
    /// A list of application-tagged values
    ValueList(Vec<PrimitiveValue>),
    /// The sixteen command priority slots
    PriorityArray(PriorityArray),
    /// One slot selected by array index
    PriorityValue(PriorityValue),
    /// The four standard status flags
    StatusFlags(StatusFlags),
    /// A list of object identifiers (e.g. the device object-list)
    ObjectList(Vec<ObjectIdentifier>),
    /// A date+time pair
    DateTime(DateTime),
    /// A single device-object-property reference
    ObjectPropertyReference(DeviceObjectPropertyReference),
    /// A list of device-object-property references
    ObjectPropertyReferenceList(Vec<DeviceObjectPropertyReference>),
    /// Unmodeled or vendor-proprietary data as an ordered tag list
    Unspecified(Vec<TaggedValue>),
}

impl ConstructedData {
    /// Re-encode to the wire form the decoder consumed
    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<()> {
        match self {
            ConstructedData::Value(value) => value.encode(buffer),
            ConstructedData::ValueList(values) => {
                for value in values {
                    value.encode(buffer)?;
                }
                Ok(())
            }
            ConstructedData::PriorityArray(array) => {
                for slot in array.slots() {
                    slot.encode(buffer)?;
                }
                Ok(())
            }
            ConstructedData::PriorityValue(slot) => slot.encode(buffer),
            ConstructedData::StatusFlags(flags) => {
                encoding::encode_bit_string(buffer, &flags.to_bit_string())
            }
            ConstructedData::ObjectList(objects) => {
                for object in objects {
                    object.encode(buffer)?;
                }
                Ok(())
            }
            ConstructedData::DateTime(datetime) => datetime.encode(buffer),
            ConstructedData::ObjectPropertyReference(reference) => reference.encode(buffer),
            ConstructedData::ObjectPropertyReferenceList(references) => {
                for reference in references {
                    reference.encode(buffer)?;
                }
                Ok(())
            }
            ConstructedData::Unspecified(items) => TaggedValue::encode_list(items, buffer),
        }
    }
}

/// Decoder signature used by the dispatch tables
pub type ConstructedDecoder = fn(&[u8], Option<u32>) -> Result<ConstructedData>;

/// Shapes keyed by both object type and property identifier
static TYPE_PROPERTY_TABLE: &[((ObjectType, PropertyIdentifier), ConstructedDecoder)] = &[
    (
        (ObjectType::AnalogOutput, PropertyIdentifier::PriorityArray),
        decode_priority_array,
    ),
    (
        (ObjectType::AnalogValue, PropertyIdentifier::PriorityArray),
        decode_priority_array,
    ),
    (
        (ObjectType::BinaryOutput, PropertyIdentifier::PriorityArray),
        decode_priority_array,
    ),
    (
        (ObjectType::BinaryValue, PropertyIdentifier::PriorityArray),
        decode_priority_array,
    ),
    (
        (
            ObjectType::MultiStateOutput,
            PropertyIdentifier::PriorityArray,
        ),
        decode_priority_array,
    ),
    (
        (
            ObjectType::MultiStateValue,
            PropertyIdentifier::PriorityArray,
        ),
        decode_priority_array,
    ),
    (
        (ObjectType::Device, PropertyIdentifier::ObjectList),
        decode_object_list,
    ),
    (
        (ObjectType::StructuredView, PropertyIdentifier::ObjectList),
        decode_object_list,
    ),
    (
        (
            ObjectType::TrendLog,
            PropertyIdentifier::LogDeviceObjectProperty,
        ),
        decode_object_property_reference,
    ),
    (
        (
            ObjectType::Schedule,
            PropertyIdentifier::ListOfObjectPropertyReferences,
        ),
        decode_object_property_reference_list,
    ),
    (
        (ObjectType::TrendLog, PropertyIdentifier::StartTime),
        decode_date_time,
    ),
    (
        (ObjectType::TrendLog, PropertyIdentifier::StopTime),
        decode_date_time,
    ),
];

/// Shapes independent of the object type
static PROPERTY_TABLE: &[(PropertyIdentifier, ConstructedDecoder)] = &[
    (PropertyIdentifier::StatusFlags, decode_status_flags),
    (PropertyIdentifier::PresentValue, decode_single_value),
    (PropertyIdentifier::ObjectName, decode_single_value),
    (PropertyIdentifier::Description, decode_single_value),
    (PropertyIdentifier::VendorName, decode_single_value),
    (PropertyIdentifier::VendorIdentifier, decode_single_value),
    (PropertyIdentifier::ModelName, decode_single_value),
    (PropertyIdentifier::Units, decode_single_value),
    (PropertyIdentifier::OutputUnits, decode_single_value),
    (PropertyIdentifier::Reliability, decode_single_value),
    (PropertyIdentifier::OutOfService, decode_single_value),
    (PropertyIdentifier::EventState, decode_single_value),
    (PropertyIdentifier::LocalDate, decode_single_value),
    (PropertyIdentifier::LocalTime, decode_single_value),
];

/// Resolve a property value to its concrete shape.
///
/// Looks up `(object_type, property)` in the dispatch table, then the
/// object-independent property table. On a hit the specific decoder runs and
/// may use `array_index` to select a single element. On a miss, which is
/// always the case for vendor-proprietary identifiers, the bytes decode as an
/// ordered
/// tag list, never as an error.
pub fn resolve(
    object_type: ObjectType,
    property: PropertyIdentifier,
    array_index: Option<u32>,
    data: &[u8],
) -> Result<ConstructedData> {
    if !object_type.is_proprietary() && !property.is_proprietary() {
        if let Some(decoder) = lookup(object_type, property) {
            return decoder(data, array_index);
        }
    }
    decode_unspecified(data)
}

/// Dispatch-table lookup without the fallback
pub fn lookup(object_type: ObjectType, property: PropertyIdentifier) -> Option<ConstructedDecoder> {
    TYPE_PROPERTY_TABLE
        .iter()
        .find(|((entry_type, entry_property), _)| {
            *entry_type == object_type && *entry_property == property
        })
        .map(|(_, decoder)| *decoder)
        .or_else(|| {
            PROPERTY_TABLE
                .iter()
                .find(|(entry_property, _)| *entry_property == property)
                .map(|(_, decoder)| *decoder)
        })
}

fn decode_unspecified(data: &[u8]) -> Result<ConstructedData> {
    Ok(ConstructedData::Unspecified(TaggedValue::decode_list(
        data,
    )?))
}

fn decode_single_value(data: &[u8], _array_index: Option<u32>) -> Result<ConstructedData> {
    let (value, consumed) = PrimitiveValue::decode(data)?;
    if consumed != data.len() {
        // Trailing data means the shape is richer than a single value
        return decode_unspecified(data);
    }
    Ok(ConstructedData::Value(value))
}

fn decode_status_flags(data: &[u8], _array_index: Option<u32>) -> Result<ConstructedData> {
    let (bits, _) = encoding::decode_bit_string(data)?;
    Ok(ConstructedData::StatusFlags(StatusFlags::from_bit_string(
        &bits,
    )))
}

fn decode_priority_array(data: &[u8], array_index: Option<u32>) -> Result<ConstructedData> {
    match array_index {
        // Reading element zero yields the array size as a plain unsigned
        Some(0) => {
            let (value, _) = encoding::decode_unsigned(data)?;
            Ok(ConstructedData::Value(PrimitiveValue::Unsigned(value)))
        }
        Some(_) => {
            let (slot, _) = PriorityValue::decode(data)?;
            Ok(ConstructedData::PriorityValue(slot))
        }
        None => {
            let mut slots = Vec::with_capacity(PriorityArray::SLOTS);
            let mut pos = 0;
            while pos < data.len() {
                let (slot, consumed) = PriorityValue::decode(&data[pos..])?;
                slots.push(slot);
                pos += consumed;
            }
            if slots.len() != PriorityArray::SLOTS {
                return Err(EncodingError::InvalidFormat(
                    "priority array must have 16 slots".into(),
                ));
            }
            Ok(ConstructedData::PriorityArray(PriorityArray::new(slots)))
        }
    }
}

fn decode_object_list(data: &[u8], array_index: Option<u32>) -> Result<ConstructedData> {
    match array_index {
        Some(0) => {
            let (value, _) = encoding::decode_unsigned(data)?;
            Ok(ConstructedData::Value(PrimitiveValue::Unsigned(value)))
        }
        Some(_) => {
            let (id, _) = ObjectIdentifier::decode(data)?;
            Ok(ConstructedData::Value(PrimitiveValue::ObjectIdentifier(id)))
        }
        None => {
            let mut objects = Vec::new();
            let mut pos = 0;
            while pos < data.len() {
                let (id, consumed) = ObjectIdentifier::decode(&data[pos..])?;
                objects.push(id);
                pos += consumed;
            }
            Ok(ConstructedData::ObjectList(objects))
        }
    }
}

fn decode_object_property_reference(
    data: &[u8],
    _array_index: Option<u32>,
) -> Result<ConstructedData> {
    let (reference, _) = DeviceObjectPropertyReference::decode(data)?;
    Ok(ConstructedData::ObjectPropertyReference(reference))
}

fn decode_object_property_reference_list(
    data: &[u8],
    _array_index: Option<u32>,
) -> Result<ConstructedData> {
    let mut references = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (reference, consumed) = DeviceObjectPropertyReference::decode(&data[pos..])?;
        references.push(reference);
        pos += consumed;
    }
    Ok(ConstructedData::ObjectPropertyReferenceList(references))
}

fn decode_date_time(data: &[u8], _array_index: Option<u32>) -> Result<ConstructedData> {
    let (datetime, _) = DateTime::decode(data)?;
    Ok(ConstructedData::DateTime(datetime))
}
