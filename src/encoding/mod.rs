//! BACnet Tag Encoding/Decoding Module
//!
//! This module implements the BACnet tag grammar of ASHRAE 135 clause 20.2:
//! application and context tag headers with their length/value/type (LVT)
//! extension forms, and the primitive value encodings carried inside them.
//!
//! # Overview
//!
//! The encoding module is responsible for:
//! - Scanning tag headers (class, number, LVT) from a byte buffer
//! - Encoding/decoding the application-tagged primitive types
//! - Context-specific tag helpers used by the service codecs
//! - Opening/closing tags delimiting constructed data
//!
//! Decoding is lenient about LVT representation: any extension form whose
//! bytes are present is accepted, including non-minimal forms produced by
//! some vendor stacks. Encoding always emits the minimal (canonical) form,
//! so a non-minimal capture only reproduces byte-identically when the caller
//! exempts it from comparison.
//!
//! # Example
//!
//! ```
//! use bacnet_codec::encoding::{encode_unsigned, decode_unsigned};
//!
//! let mut buffer = Vec::new();
//! encode_unsigned(&mut buffer, 42).unwrap();
//! let (value, consumed) = decode_unsigned(&buffer).unwrap();
//! assert_eq!(value, 42);
//! assert_eq!(consumed, buffer.len());
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use alloc::{
    string::{String, ToString},
    vec,
    vec::Vec,
};

/// Result type for encoding operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, EncodingError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, EncodingError>;

/// Errors that can occur during encoding/decoding operations
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingError {
    /// Tag header or its LVT extension bytes are truncated or invalid
    MalformedTag,
    /// A tag was read but is not the class/number the caller required
    UnexpectedTag,
    /// Buffer ended before the declared payload length
    BufferUnderflow,
    /// Value does not fit the tag form it must be encoded in
    EncodeOverflow,
    /// Declared payload length is invalid for the primitive type
    InvalidLength,
    /// Payload bytes are not a valid encoding of the primitive type
    InvalidFormat(String),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::MalformedTag => write!(f, "Malformed tag header"),
            EncodingError::UnexpectedTag => write!(f, "Unexpected tag class or number"),
            EncodingError::BufferUnderflow => write!(f, "Buffer underflow during decoding"),
            EncodingError::EncodeOverflow => write!(f, "Value too large for its tag form"),
            EncodingError::InvalidLength => write!(f, "Invalid length value"),
            EncodingError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl Error for EncodingError {}

/// BACnet application tag numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ApplicationTag {
    Null = 0,
    Boolean = 1,
    UnsignedInt = 2,
    SignedInt = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
    Date = 10,
    Time = 11,
    ObjectIdentifier = 12,
}

impl TryFrom<u8> for ApplicationTag {
    type Error = EncodingError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ApplicationTag::Null),
            1 => Ok(ApplicationTag::Boolean),
            2 => Ok(ApplicationTag::UnsignedInt),
            3 => Ok(ApplicationTag::SignedInt),
            4 => Ok(ApplicationTag::Real),
            5 => Ok(ApplicationTag::Double),
            6 => Ok(ApplicationTag::OctetString),
            7 => Ok(ApplicationTag::CharacterString),
            8 => Ok(ApplicationTag::BitString),
            9 => Ok(ApplicationTag::Enumerated),
            10 => Ok(ApplicationTag::Date),
            11 => Ok(ApplicationTag::Time),
            12 => Ok(ApplicationTag::ObjectIdentifier),
            _ => Err(EncodingError::MalformedTag),
        }
    }
}

/// Tag class: globally-typed application tags or structure-scoped context tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagClass {
    Application,
    Context,
}

/// Length/value form of a decoded tag header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagForm {
    /// Primitive data with a payload length (for application Boolean the
    /// "length" field holds the value itself and no payload follows)
    Primitive { length: u32 },
    /// Opening tag of constructed data
    Opening,
    /// Closing tag of constructed data
    Closing,
}

/// A decoded BACnet tag header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    pub number: u8,
    pub class: TagClass,
    pub form: TagForm,
}

impl Tag {
    /// Create an application tag with a payload length
    pub fn application(tag: ApplicationTag, length: u32) -> Self {
        Self {
            number: tag as u8,
            class: TagClass::Application,
            form: TagForm::Primitive { length },
        }
    }

    /// Create a context tag with a payload length
    pub fn context(number: u8, length: u32) -> Self {
        Self {
            number,
            class: TagClass::Context,
            form: TagForm::Primitive { length },
        }
    }

    /// Create an opening tag for constructed data
    pub fn opening(number: u8) -> Self {
        Self {
            number,
            class: TagClass::Context,
            form: TagForm::Opening,
        }
    }

    /// Create a closing tag for constructed data
    pub fn closing(number: u8) -> Self {
        Self {
            number,
            class: TagClass::Context,
            form: TagForm::Closing,
        }
    }

    /// Payload length for primitive tags, 0 for opening/closing tags
    pub fn length(&self) -> u32 {
        match self.form {
            TagForm::Primitive { length } => length,
            TagForm::Opening | TagForm::Closing => 0,
        }
    }

    pub fn is_opening(&self) -> bool {
        self.form == TagForm::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.form == TagForm::Closing
    }

    pub fn is_constructed(&self) -> bool {
        self.is_opening() || self.is_closing()
    }

    pub fn is_context(&self) -> bool {
        self.class == TagClass::Context
    }

    /// Decode a tag header, returning the tag and the bytes consumed.
    ///
    /// Tag numbers 15 and above use the extended tag-number byte; lengths
    /// 5 and above use the LVT extension forms (one byte, or 254/255
    /// followed by a 2/4-byte length). Non-minimal extension forms decode
    /// normally; only truncation is rejected.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.is_empty() {
            return Err(EncodingError::MalformedTag);
        }

        let initial = data[0];
        let class = if initial & 0x08 != 0 {
            TagClass::Context
        } else {
            TagClass::Application
        };

        let mut consumed = 1;
        let number = if initial >> 4 == 0x0F {
            // Extended tag number in the following byte
            let number = *data.get(consumed).ok_or(EncodingError::MalformedTag)?;
            consumed += 1;
            number
        } else {
            initial >> 4
        };

        let lvt = initial & 0x07;
        let form = match lvt {
            6 => TagForm::Opening,
            7 => TagForm::Closing,
            5 => {
                let ext = *data.get(consumed).ok_or(EncodingError::MalformedTag)?;
                consumed += 1;
                let length = match ext {
                    254 => {
                        if data.len() < consumed + 2 {
                            return Err(EncodingError::MalformedTag);
                        }
                        let length =
                            u16::from_be_bytes([data[consumed], data[consumed + 1]]) as u32;
                        consumed += 2;
                        length
                    }
                    255 => {
                        if data.len() < consumed + 4 {
                            return Err(EncodingError::MalformedTag);
                        }
                        let length = u32::from_be_bytes([
                            data[consumed],
                            data[consumed + 1],
                            data[consumed + 2],
                            data[consumed + 3],
                        ]);
                        consumed += 4;
                        length
                    }
                    other => other as u32,
                };
                TagForm::Primitive { length }
            }
            inline => TagForm::Primitive {
                length: inline as u32,
            },
        };

        // Opening/closing forms only exist in the context class
        if class == TagClass::Application && matches!(form, TagForm::Opening | TagForm::Closing) {
            return Err(EncodingError::MalformedTag);
        }

        Ok((Tag { number, class, form }, consumed))
    }

    /// Encode this tag header in canonical (minimal) form
    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<()> {
        if self.number == 255 {
            return Err(EncodingError::EncodeOverflow);
        }

        let class_bit = match self.class {
            TagClass::Application => 0x00,
            TagClass::Context => 0x08,
        };
        let number_nibble = if self.number >= 15 {
            0xF0
        } else {
            self.number << 4
        };

        let lvt = match self.form {
            TagForm::Opening => 6,
            TagForm::Closing => 7,
            TagForm::Primitive { length } if length < 5 => length as u8,
            TagForm::Primitive { .. } => 5,
        };

        buffer.push(number_nibble | class_bit | lvt);
        if self.number >= 15 {
            buffer.push(self.number);
        }

        if let TagForm::Primitive { length } = self.form {
            if length >= 5 {
                if length < 254 {
                    buffer.push(length as u8);
                } else if length <= u16::MAX as u32 {
                    buffer.push(254);
                    buffer.extend_from_slice(&(length as u16).to_be_bytes());
                } else {
                    buffer.push(255);
                    buffer.extend_from_slice(&length.to_be_bytes());
                }
            }
        }

        Ok(())
    }

    /// Decode a tag header and require a specific application tag number
    pub fn expect_application(data: &[u8], tag: ApplicationTag) -> Result<(Self, usize)> {
        let (decoded, consumed) = Self::decode(data)?;
        if decoded.class != TagClass::Application || decoded.number != tag as u8 {
            return Err(EncodingError::UnexpectedTag);
        }
        Ok((decoded, consumed))
    }

    /// Decode a tag header and require a specific primitive context tag number
    pub fn expect_context(data: &[u8], number: u8) -> Result<(Self, usize)> {
        let (decoded, consumed) = Self::decode(data)?;
        if decoded.class != TagClass::Context || decoded.number != number || decoded.is_constructed()
        {
            return Err(EncodingError::UnexpectedTag);
        }
        Ok((decoded, consumed))
    }
}

/// Check whether `data` starts with the opening tag for `number`
pub fn is_opening_tag(data: &[u8], number: u8) -> bool {
    matches!(Tag::decode(data), Ok((tag, _)) if tag.number == number && tag.is_opening())
}

/// Check whether `data` starts with the closing tag for `number`
pub fn is_closing_tag(data: &[u8], number: u8) -> bool {
    matches!(Tag::decode(data), Ok((tag, _)) if tag.number == number && tag.is_closing())
}

/// Encode an opening tag for constructed data
pub fn encode_opening_tag(buffer: &mut Vec<u8>, number: u8) -> Result<()> {
    Tag::opening(number).encode(buffer)
}

/// Encode a closing tag for constructed data
pub fn encode_closing_tag(buffer: &mut Vec<u8>, number: u8) -> Result<()> {
    Tag::closing(number).encode(buffer)
}

fn payload(data: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    data.get(offset..offset + length)
        .ok_or(EncodingError::BufferUnderflow)
}

// Payload codecs shared by the application and context tag forms. The
// unsigned/signed/enumerated payloads are 1-4 bytes big-endian, signed
// values sign-extended from their top byte.

pub(crate) fn decode_unsigned_payload(bytes: &[u8]) -> Result<u32> {
    match bytes.len() {
        1 => Ok(bytes[0] as u32),
        2 => Ok(u16::from_be_bytes([bytes[0], bytes[1]]) as u32),
        3 => Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])),
        4 => Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => Err(EncodingError::InvalidLength),
    }
}

pub(crate) fn unsigned_payload_bytes(value: u32) -> Vec<u8> {
    if value <= 0xFF {
        vec![value as u8]
    } else if value <= 0xFFFF {
        (value as u16).to_be_bytes().to_vec()
    } else if value <= 0xFF_FFFF {
        value.to_be_bytes()[1..].to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

pub(crate) fn decode_signed_payload(bytes: &[u8]) -> Result<i32> {
    match bytes.len() {
        1 => Ok(bytes[0] as i8 as i32),
        2 => Ok(i16::from_be_bytes([bytes[0], bytes[1]]) as i32),
        3 => {
            let extend = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
            Ok(i32::from_be_bytes([extend, bytes[0], bytes[1], bytes[2]]))
        }
        4 => Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => Err(EncodingError::InvalidLength),
    }
}

pub(crate) fn signed_payload_bytes(value: i32) -> Vec<u8> {
    if (-128..=127).contains(&value) {
        vec![value as u8]
    } else if (-32768..=32767).contains(&value) {
        (value as i16).to_be_bytes().to_vec()
    } else if (-8_388_608..=8_388_607).contains(&value) {
        value.to_be_bytes()[1..].to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

/// Encode a BACnet null value
pub fn encode_null(buffer: &mut Vec<u8>) -> Result<()> {
    Tag::application(ApplicationTag::Null, 0).encode(buffer)
}

/// Decode a BACnet null value, returning the bytes consumed
pub fn decode_null(data: &[u8]) -> Result<usize> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::Null)?;
    if tag.length() != 0 {
        return Err(EncodingError::InvalidLength);
    }
    Ok(consumed)
}

/// Encode a BACnet boolean value (the value lives in the LVT field)
pub fn encode_boolean(buffer: &mut Vec<u8>, value: bool) -> Result<()> {
    Tag::application(ApplicationTag::Boolean, value as u32).encode(buffer)
}

/// Decode a BACnet boolean value
pub fn decode_boolean(data: &[u8]) -> Result<(bool, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::Boolean)?;
    match tag.length() {
        0 => Ok((false, consumed)),
        1 => Ok((true, consumed)),
        _ => Err(EncodingError::InvalidLength),
    }
}

/// Encode a BACnet unsigned integer
pub fn encode_unsigned(buffer: &mut Vec<u8>, value: u32) -> Result<()> {
    let bytes = unsigned_payload_bytes(value);
    Tag::application(ApplicationTag::UnsignedInt, bytes.len() as u32).encode(buffer)?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Decode a BACnet unsigned integer
pub fn decode_unsigned(data: &[u8]) -> Result<(u32, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::UnsignedInt)?;
    let bytes = payload(data, consumed, tag.length() as usize)?;
    Ok((decode_unsigned_payload(bytes)?, consumed + bytes.len()))
}

/// Encode a BACnet signed integer
pub fn encode_signed(buffer: &mut Vec<u8>, value: i32) -> Result<()> {
    let bytes = signed_payload_bytes(value);
    Tag::application(ApplicationTag::SignedInt, bytes.len() as u32).encode(buffer)?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Decode a BACnet signed integer
pub fn decode_signed(data: &[u8]) -> Result<(i32, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::SignedInt)?;
    let bytes = payload(data, consumed, tag.length() as usize)?;
    Ok((decode_signed_payload(bytes)?, consumed + bytes.len()))
}

/// Encode a BACnet real (32-bit float)
pub fn encode_real(buffer: &mut Vec<u8>, value: f32) -> Result<()> {
    Tag::application(ApplicationTag::Real, 4).encode(buffer)?;
    buffer.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Decode a BACnet real (32-bit float)
pub fn decode_real(data: &[u8]) -> Result<(f32, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::Real)?;
    if tag.length() != 4 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 4)?;
    let value = f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Ok((value, consumed + 4))
}

/// Encode a BACnet double (64-bit float)
pub fn encode_double(buffer: &mut Vec<u8>, value: f64) -> Result<()> {
    Tag::application(ApplicationTag::Double, 8).encode(buffer)?;
    buffer.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Decode a BACnet double (64-bit float)
pub fn decode_double(data: &[u8]) -> Result<(f64, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::Double)?;
    if tag.length() != 8 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 8)?;
    let value = f64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]);
    Ok((value, consumed + 8))
}

/// Encode a BACnet octet string
pub fn encode_octet_string(buffer: &mut Vec<u8>, value: &[u8]) -> Result<()> {
    Tag::application(ApplicationTag::OctetString, value.len() as u32).encode(buffer)?;
    buffer.extend_from_slice(value);
    Ok(())
}

/// Decode a BACnet octet string
pub fn decode_octet_string(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::OctetString)?;
    let bytes = payload(data, consumed, tag.length() as usize)?;
    Ok((bytes.to_vec(), consumed + bytes.len()))
}

/// Character set marker carried in the first octet of a character string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CharacterSet {
    Utf8 = 0,
    MicrosoftDbcs = 1,
    Jis = 2,
    Ucs4 = 3,
    Ucs2 = 4,
    Latin1 = 5,
}

impl TryFrom<u8> for CharacterSet {
    type Error = EncodingError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CharacterSet::Utf8),
            1 => Ok(CharacterSet::MicrosoftDbcs),
            2 => Ok(CharacterSet::Jis),
            3 => Ok(CharacterSet::Ucs4),
            4 => Ok(CharacterSet::Ucs2),
            5 => Ok(CharacterSet::Latin1),
            _ => Err(EncodingError::InvalidFormat(
                "unknown character set marker".to_string(),
            )),
        }
    }
}

/// A character string with its declared character set
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacterString {
    pub encoding: CharacterSet,
    pub text: String,
}

impl CharacterString {
    pub fn utf8(text: impl Into<String>) -> Self {
        Self {
            encoding: CharacterSet::Utf8,
            text: text.into(),
        }
    }

    fn payload_bytes(&self) -> Result<Vec<u8>> {
        match self.encoding {
            CharacterSet::Utf8 => Ok(self.text.as_bytes().to_vec()),
            CharacterSet::Latin1 => {
                Ok(encoding_rs::mem::encode_latin1_lossy(&self.text).into_owned())
            }
            CharacterSet::Ucs2 => Ok(self
                .text
                .encode_utf16()
                .flat_map(|unit| unit.to_be_bytes())
                .collect()),
            CharacterSet::Ucs4 => Ok(self
                .text
                .chars()
                .flat_map(|c| (c as u32).to_be_bytes())
                .collect()),
            CharacterSet::MicrosoftDbcs | CharacterSet::Jis => Err(EncodingError::InvalidFormat(
                "unsupported character set for encoding".to_string(),
            )),
        }
    }

    fn from_payload(encoding: CharacterSet, bytes: &[u8]) -> Result<Self> {
        let text = match encoding {
            CharacterSet::Utf8 => core::str::from_utf8(bytes)
                .map_err(|_| EncodingError::InvalidFormat("invalid UTF-8 payload".to_string()))?
                .to_string(),
            CharacterSet::Latin1 => encoding_rs::mem::decode_latin1(bytes).into_owned(),
            CharacterSet::Ucs2 => {
                let (text, had_errors) = encoding_rs::UTF_16BE.decode_without_bom_handling(bytes);
                if had_errors {
                    return Err(EncodingError::InvalidFormat(
                        "invalid UCS-2 payload".to_string(),
                    ));
                }
                text.into_owned()
            }
            CharacterSet::Ucs4 => {
                if bytes.len() % 4 != 0 {
                    return Err(EncodingError::InvalidLength);
                }
                bytes
                    .chunks_exact(4)
                    .map(|chunk| {
                        let code = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                        char::from_u32(code).ok_or_else(|| {
                            EncodingError::InvalidFormat("invalid UCS-4 payload".to_string())
                        })
                    })
                    .collect::<Result<String>>()?
            }
            CharacterSet::MicrosoftDbcs | CharacterSet::Jis => {
                return Err(EncodingError::InvalidFormat(
                    "unsupported character set".to_string(),
                ))
            }
        };
        Ok(Self { encoding, text })
    }
}

/// Encode a BACnet character string with its character set marker
pub fn encode_character_string(buffer: &mut Vec<u8>, value: &CharacterString) -> Result<()> {
    let bytes = value.payload_bytes()?;
    Tag::application(ApplicationTag::CharacterString, bytes.len() as u32 + 1).encode(buffer)?;
    buffer.push(value.encoding as u8);
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Decode a BACnet character string
pub fn decode_character_string(data: &[u8]) -> Result<(CharacterString, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::CharacterString)?;
    let length = tag.length() as usize;
    if length == 0 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, length)?;
    let encoding = CharacterSet::try_from(bytes[0])?;
    let value = CharacterString::from_payload(encoding, &bytes[1..])?;
    Ok((value, consumed + length))
}

/// An ordered sequence of bits
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitString {
    bits: Vec<bool>,
}

impl BitString {
    pub fn new(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Value of bit `index`, false when out of range
    pub fn bit(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }
}

/// Encode a BACnet bit string (leading unused-bit count, then packed bits)
pub fn encode_bit_string(buffer: &mut Vec<u8>, value: &BitString) -> Result<()> {
    let bits = value.bits();
    let byte_count = bits.len().div_ceil(8);
    let unused = (byte_count * 8 - bits.len()) as u8;

    Tag::application(ApplicationTag::BitString, byte_count as u32 + 1).encode(buffer)?;
    buffer.push(unused);

    let mut current = 0u8;
    for (index, &bit) in bits.iter().enumerate() {
        if bit {
            current |= 1 << (7 - index % 8);
        }
        if index % 8 == 7 {
            buffer.push(current);
            current = 0;
        }
    }
    if bits.len() % 8 != 0 {
        buffer.push(current);
    }
    Ok(())
}

/// Decode a BACnet bit string
pub fn decode_bit_string(data: &[u8]) -> Result<(BitString, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::BitString)?;
    let length = tag.length() as usize;
    if length == 0 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, length)?;

    let unused = bytes[0] as usize;
    if unused > 7 || (length == 1 && unused != 0) {
        return Err(EncodingError::InvalidFormat(
            "invalid unused-bit count".to_string(),
        ));
    }

    let mut bits = Vec::with_capacity((length - 1) * 8);
    for (index, byte) in bytes[1..].iter().enumerate() {
        let in_byte = if index == length - 2 { 8 - unused } else { 8 };
        for position in 0..in_byte {
            bits.push(byte & (1 << (7 - position)) != 0);
        }
    }
    Ok((BitString::new(bits), consumed + length))
}

/// Encode a BACnet enumerated value
pub fn encode_enumerated(buffer: &mut Vec<u8>, value: u32) -> Result<()> {
    let bytes = unsigned_payload_bytes(value);
    Tag::application(ApplicationTag::Enumerated, bytes.len() as u32).encode(buffer)?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Decode a BACnet enumerated value
pub fn decode_enumerated(data: &[u8]) -> Result<(u32, usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::Enumerated)?;
    let bytes = payload(data, consumed, tag.length() as usize)?;
    Ok((decode_unsigned_payload(bytes)?, consumed + bytes.len()))
}

/// Encode a BACnet date. `year` 255 means unspecified, otherwise the wire
/// carries the offset from 1900; month/day/weekday use 255 as the wildcard.
pub fn encode_date(buffer: &mut Vec<u8>, year: u16, month: u8, day: u8, weekday: u8) -> Result<()> {
    if year != 255 && !(1900..2156).contains(&year) {
        return Err(EncodingError::EncodeOverflow);
    }
    Tag::application(ApplicationTag::Date, 4).encode(buffer)?;
    buffer.push(if year == 255 { 255 } else { (year - 1900) as u8 });
    buffer.push(month);
    buffer.push(day);
    buffer.push(weekday);
    Ok(())
}

/// Decode a BACnet date
pub fn decode_date(data: &[u8]) -> Result<((u16, u8, u8, u8), usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::Date)?;
    if tag.length() != 4 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 4)?;
    let year = if bytes[0] == 255 {
        255
    } else {
        1900 + bytes[0] as u16
    };
    Ok(((year, bytes[1], bytes[2], bytes[3]), consumed + 4))
}

/// Encode a BACnet time; each field uses 255 as the wildcard
pub fn encode_time(
    buffer: &mut Vec<u8>,
    hour: u8,
    minute: u8,
    second: u8,
    hundredths: u8,
) -> Result<()> {
    Tag::application(ApplicationTag::Time, 4).encode(buffer)?;
    buffer.extend_from_slice(&[hour, minute, second, hundredths]);
    Ok(())
}

/// Decode a BACnet time
pub fn decode_time(data: &[u8]) -> Result<((u8, u8, u8, u8), usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::Time)?;
    if tag.length() != 4 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 4)?;
    Ok(((bytes[0], bytes[1], bytes[2], bytes[3]), consumed + 4))
}

/// Encode a BACnet object identifier (10-bit type, 22-bit instance)
pub fn encode_object_identifier(
    buffer: &mut Vec<u8>,
    object_type: u16,
    instance: u32,
) -> Result<()> {
    if object_type > 0x3FF || instance > 0x3F_FFFF {
        return Err(EncodingError::EncodeOverflow);
    }
    Tag::application(ApplicationTag::ObjectIdentifier, 4).encode(buffer)?;
    let packed = ((object_type as u32) << 22) | instance;
    buffer.extend_from_slice(&packed.to_be_bytes());
    Ok(())
}

/// Decode a BACnet object identifier
pub fn decode_object_identifier(data: &[u8]) -> Result<((u16, u32), usize)> {
    let (tag, consumed) = Tag::expect_application(data, ApplicationTag::ObjectIdentifier)?;
    if tag.length() != 4 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 4)?;
    let packed = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Ok((((packed >> 22) as u16, packed & 0x3F_FFFF), consumed + 4))
}

// Context-specific forms. The payload encodings are the application ones;
// only the tag header differs, and booleans move their value into a one-byte
// payload because the context LVT field is a length.

/// Encode a context-tagged unsigned integer
pub fn encode_context_unsigned(buffer: &mut Vec<u8>, number: u8, value: u32) -> Result<()> {
    let bytes = unsigned_payload_bytes(value);
    Tag::context(number, bytes.len() as u32).encode(buffer)?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Decode a context-tagged unsigned integer
pub fn decode_context_unsigned(data: &[u8], number: u8) -> Result<(u32, usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    let bytes = payload(data, consumed, tag.length() as usize)?;
    Ok((decode_unsigned_payload(bytes)?, consumed + bytes.len()))
}

/// Encode a context-tagged signed integer
pub fn encode_context_signed(buffer: &mut Vec<u8>, number: u8, value: i32) -> Result<()> {
    let bytes = signed_payload_bytes(value);
    Tag::context(number, bytes.len() as u32).encode(buffer)?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Decode a context-tagged signed integer
pub fn decode_context_signed(data: &[u8], number: u8) -> Result<(i32, usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    let bytes = payload(data, consumed, tag.length() as usize)?;
    Ok((decode_signed_payload(bytes)?, consumed + bytes.len()))
}

/// Encode a context-tagged enumerated value
pub fn encode_context_enumerated(buffer: &mut Vec<u8>, number: u8, value: u32) -> Result<()> {
    encode_context_unsigned(buffer, number, value)
}

/// Decode a context-tagged enumerated value
pub fn decode_context_enumerated(data: &[u8], number: u8) -> Result<(u32, usize)> {
    decode_context_unsigned(data, number)
}

/// Encode a context-tagged boolean (one payload byte, unlike the application form)
pub fn encode_context_boolean(buffer: &mut Vec<u8>, number: u8, value: bool) -> Result<()> {
    Tag::context(number, 1).encode(buffer)?;
    buffer.push(value as u8);
    Ok(())
}

/// Decode a context-tagged boolean
pub fn decode_context_boolean(data: &[u8], number: u8) -> Result<(bool, usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    if tag.length() != 1 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 1)?;
    Ok((bytes[0] != 0, consumed + 1))
}

/// Encode a context-tagged object identifier
pub fn encode_context_object_id(
    buffer: &mut Vec<u8>,
    number: u8,
    object_type: u16,
    instance: u32,
) -> Result<()> {
    if object_type > 0x3FF || instance > 0x3F_FFFF {
        return Err(EncodingError::EncodeOverflow);
    }
    Tag::context(number, 4).encode(buffer)?;
    let packed = ((object_type as u32) << 22) | instance;
    buffer.extend_from_slice(&packed.to_be_bytes());
    Ok(())
}

/// Decode a context-tagged object identifier
pub fn decode_context_object_id(data: &[u8], number: u8) -> Result<((u16, u32), usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    if tag.length() != 4 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 4)?;
    let packed = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Ok((((packed >> 22) as u16, packed & 0x3F_FFFF), consumed + 4))
}

/// Encode a context-tagged date
pub fn encode_context_date(
    buffer: &mut Vec<u8>,
    number: u8,
    year: u16,
    month: u8,
    day: u8,
    weekday: u8,
) -> Result<()> {
    if year != 255 && !(1900..2156).contains(&year) {
        return Err(EncodingError::EncodeOverflow);
    }
    Tag::context(number, 4).encode(buffer)?;
    buffer.push(if year == 255 { 255 } else { (year - 1900) as u8 });
    buffer.push(month);
    buffer.push(day);
    buffer.push(weekday);
    Ok(())
}

/// Decode a context-tagged date
pub fn decode_context_date(data: &[u8], number: u8) -> Result<((u16, u8, u8, u8), usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    if tag.length() != 4 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 4)?;
    let year = if bytes[0] == 255 {
        255
    } else {
        1900 + bytes[0] as u16
    };
    Ok(((year, bytes[1], bytes[2], bytes[3]), consumed + 4))
}

/// Encode a context-tagged time
pub fn encode_context_time(
    buffer: &mut Vec<u8>,
    number: u8,
    hour: u8,
    minute: u8,
    second: u8,
    hundredths: u8,
) -> Result<()> {
    Tag::context(number, 4).encode(buffer)?;
    buffer.extend_from_slice(&[hour, minute, second, hundredths]);
    Ok(())
}

/// Decode a context-tagged time
pub fn decode_context_time(data: &[u8], number: u8) -> Result<((u8, u8, u8, u8), usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    if tag.length() != 4 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, 4)?;
    Ok(((bytes[0], bytes[1], bytes[2], bytes[3]), consumed + 4))
}

/// Encode a context-tagged octet string
pub fn encode_context_octet_string(buffer: &mut Vec<u8>, number: u8, value: &[u8]) -> Result<()> {
    Tag::context(number, value.len() as u32).encode(buffer)?;
    buffer.extend_from_slice(value);
    Ok(())
}

/// Decode a context-tagged octet string
pub fn decode_context_octet_string(data: &[u8], number: u8) -> Result<(Vec<u8>, usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    let bytes = payload(data, consumed, tag.length() as usize)?;
    Ok((bytes.to_vec(), consumed + bytes.len()))
}

/// Encode a context-tagged character string
pub fn encode_context_character_string(
    buffer: &mut Vec<u8>,
    number: u8,
    value: &CharacterString,
) -> Result<()> {
    let bytes = value.payload_bytes()?;
    Tag::context(number, bytes.len() as u32 + 1).encode(buffer)?;
    buffer.push(value.encoding as u8);
    buffer.extend_from_slice(&bytes);
    Ok(())
}

/// Decode a context-tagged character string
pub fn decode_context_character_string(
    data: &[u8],
    number: u8,
) -> Result<(CharacterString, usize)> {
    let (tag, consumed) = Tag::expect_context(data, number)?;
    let length = tag.length() as usize;
    if length == 0 {
        return Err(EncodingError::InvalidLength);
    }
    let bytes = payload(data, consumed, length)?;
    let encoding = CharacterSet::try_from(bytes[0])?;
    let value = CharacterString::from_payload(encoding, &bytes[1..])?;
    Ok((value, consumed + length))
}

/// Byte length of the content between an opening tag and its matching
/// closing tag, honoring nesting. `data` starts just past the opening tag.
/// Fails with `MalformedTag` when the closing tag is missing.
pub fn constructed_content_length(data: &[u8], number: u8) -> Result<usize> {
    let mut depth = 0usize;
    let mut pos = 0usize;
    while pos < data.len() {
        let (tag, consumed) = Tag::decode(&data[pos..])?;
        if tag.is_closing() && tag.number == number && depth == 0 {
            return Ok(pos);
        }
        if tag.is_opening() {
            depth += 1;
        } else if tag.is_closing() {
            depth = depth.checked_sub(1).ok_or(EncodingError::MalformedTag)?;
        }
        pos += consumed;
        if let TagForm::Primitive { length } = tag.form {
            pos += length as usize;
        }
        if pos > data.len() {
            return Err(EncodingError::BufferUnderflow);
        }
    }
    Err(EncodingError::MalformedTag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tag_roundtrip_inline_length() {
        let tag = Tag::context(2, 3);
        let mut buffer = Vec::new();
        tag.encode(&mut buffer).unwrap();
        assert_eq!(buffer, vec![0x2B]);
        let (decoded, consumed) = Tag::decode(&buffer).unwrap();
        assert_eq!(decoded, tag);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_tag_extended_length_forms() {
        for length in [5u32, 200, 253, 254, 1024, 65535, 65536, 1_000_000] {
            let tag = Tag::application(ApplicationTag::OctetString, length);
            let mut buffer = Vec::new();
            tag.encode(&mut buffer).unwrap();
            let (decoded, consumed) = Tag::decode(&buffer).unwrap();
            assert_eq!(decoded.length(), length);
            assert_eq!(consumed, buffer.len());
        }
    }

    #[test]
    fn test_tag_extended_tag_number() {
        let tag = Tag::context(33, 1);
        let mut buffer = Vec::new();
        tag.encode(&mut buffer).unwrap();
        assert_eq!(buffer, vec![0xF9, 33]);
        let (decoded, _) = Tag::decode(&buffer).unwrap();
        assert_eq!(decoded.number, 33);
        assert_eq!(decoded.class, TagClass::Context);
    }

    #[test]
    fn test_non_minimal_length_accepted() {
        // LVT extension byte used for a length that would fit inline
        let bytes = [0x65, 0x03, 0xAA, 0xBB, 0xCC];
        let (tag, consumed) = Tag::decode(&bytes).unwrap();
        assert_eq!(tag.length(), 3);
        assert_eq!(consumed, 2);

        // Two-byte extended length used for a small value
        let bytes = [0x65, 0xFE, 0x00, 0x03, 0xAA, 0xBB, 0xCC];
        let (tag, consumed) = Tag::decode(&bytes).unwrap();
        assert_eq!(tag.length(), 3);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_truncated_extension_is_malformed() {
        assert_eq!(Tag::decode(&[0x65]), Err(EncodingError::MalformedTag));
        assert_eq!(
            Tag::decode(&[0x65, 0xFE, 0x00]),
            Err(EncodingError::MalformedTag)
        );
        assert_eq!(
            Tag::decode(&[0x65, 0xFF, 0x00, 0x00, 0x01]),
            Err(EncodingError::MalformedTag)
        );
    }

    #[test]
    fn test_encode_decode_boolean() {
        let mut buffer = Vec::new();
        encode_boolean(&mut buffer, true).unwrap();
        assert_eq!(buffer, vec![0x11]);
        let (value, consumed) = decode_boolean(&buffer).unwrap();
        assert!(value);
        assert_eq!(consumed, 1);

        buffer.clear();
        encode_boolean(&mut buffer, false).unwrap();
        assert_eq!(buffer, vec![0x10]);
    }

    #[test]
    fn test_encode_decode_unsigned() {
        for value in [0u32, 1, 255, 256, 65535, 65536, 16_777_215, u32::MAX] {
            let mut buffer = Vec::new();
            encode_unsigned(&mut buffer, value).unwrap();
            let (decoded, consumed) = decode_unsigned(&buffer).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buffer.len());
        }
    }

    #[test]
    fn test_encode_decode_signed() {
        for value in [-8_388_608, -32768, -128, -1, 0, 1, 127, 32767, i32::MAX] {
            let mut buffer = Vec::new();
            encode_signed(&mut buffer, value).unwrap();
            let (decoded, _) = decode_signed(&buffer).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_encode_decode_real() {
        let mut buffer = Vec::new();
        encode_real(&mut buffer, 72.5).unwrap();
        assert_eq!(buffer[0], 0x44);
        let (value, _) = decode_real(&buffer).unwrap();
        assert_eq!(value, 72.5);
    }

    #[test]
    fn test_encode_decode_character_string() {
        for text in ["", "BACnet", "Zone 4 Supply Temp"] {
            let mut buffer = Vec::new();
            encode_character_string(&mut buffer, &CharacterString::utf8(text)).unwrap();
            let (decoded, consumed) = decode_character_string(&buffer).unwrap();
            assert_eq!(decoded.text, text);
            assert_eq!(decoded.encoding, CharacterSet::Utf8);
            assert_eq!(consumed, buffer.len());
        }
    }

    #[test]
    fn test_character_string_latin1() {
        // "Büro" in ISO 8859-1
        let bytes = [0x75, 0x05, 0x05, b'B', 0xFC, b'r', b'o'];
        let (decoded, consumed) = decode_character_string(&bytes).unwrap();
        assert_eq!(decoded.text, "Büro");
        assert_eq!(decoded.encoding, CharacterSet::Latin1);
        assert_eq!(consumed, bytes.len());

        let mut buffer = Vec::new();
        encode_character_string(&mut buffer, &decoded).unwrap();
        assert_eq!(buffer, bytes);
    }

    #[test]
    fn test_character_string_ucs2() {
        let bytes = [0x75, 0x05, 0x04, 0x00, b'H', 0x00, b'i'];
        let (decoded, _) = decode_character_string(&bytes).unwrap();
        assert_eq!(decoded.text, "Hi");

        let mut buffer = Vec::new();
        encode_character_string(&mut buffer, &decoded).unwrap();
        assert_eq!(buffer, bytes);
    }

    #[test]
    fn test_encode_decode_bit_string() {
        let bits = BitString::new(vec![
            true, false, true, true, false, false, true, false, true,
        ]);
        let mut buffer = Vec::new();
        encode_bit_string(&mut buffer, &bits).unwrap();
        let (decoded, consumed) = decode_bit_string(&buffer).unwrap();
        assert_eq!(decoded, bits);
        assert_eq!(consumed, buffer.len());
        assert!(decoded.bit(0));
        assert!(!decoded.bit(1));
        assert!(!decoded.bit(200));
    }

    #[test]
    fn test_encode_decode_date_time() {
        let mut buffer = Vec::new();
        encode_date(&mut buffer, 2024, 3, 15, 5).unwrap();
        let ((year, month, day, weekday), _) = decode_date(&buffer).unwrap();
        assert_eq!((year, month, day, weekday), (2024, 3, 15, 5));

        buffer.clear();
        encode_date(&mut buffer, 255, 255, 255, 255).unwrap();
        let ((year, ..), _) = decode_date(&buffer).unwrap();
        assert_eq!(year, 255);

        buffer.clear();
        encode_time(&mut buffer, 14, 30, 45, 50).unwrap();
        let ((hour, minute, second, hundredths), _) = decode_time(&buffer).unwrap();
        assert_eq!((hour, minute, second, hundredths), (14, 30, 45, 50));
    }

    #[test]
    fn test_encode_decode_object_identifier() {
        let mut buffer = Vec::new();
        encode_object_identifier(&mut buffer, 8, 123).unwrap();
        assert_eq!(buffer, vec![0xC4, 0x02, 0x00, 0x00, 0x7B]);
        let ((object_type, instance), _) = decode_object_identifier(&buffer).unwrap();
        assert_eq!(object_type, 8);
        assert_eq!(instance, 123);

        buffer.clear();
        assert_eq!(
            encode_object_identifier(&mut buffer, 0x400, 0),
            Err(EncodingError::EncodeOverflow)
        );
        assert_eq!(
            encode_object_identifier(&mut buffer, 0, 0x40_0000),
            Err(EncodingError::EncodeOverflow)
        );
    }

    #[test]
    fn test_context_tag_helpers() {
        let mut buffer = Vec::new();
        encode_context_unsigned(&mut buffer, 1, 60000).unwrap();
        let (value, consumed) = decode_context_unsigned(&buffer, 1).unwrap();
        assert_eq!(value, 60000);
        assert_eq!(consumed, buffer.len());

        assert_eq!(
            decode_context_unsigned(&buffer, 2),
            Err(EncodingError::UnexpectedTag)
        );

        buffer.clear();
        encode_context_object_id(&mut buffer, 0, 2, 12345).unwrap();
        let ((object_type, instance), _) = decode_context_object_id(&buffer, 0).unwrap();
        assert_eq!((object_type, instance), (2, 12345));
    }

    #[test]
    fn test_opening_closing_tags() {
        let mut buffer = Vec::new();
        encode_opening_tag(&mut buffer, 3).unwrap();
        encode_closing_tag(&mut buffer, 3).unwrap();
        assert_eq!(buffer, vec![0x3E, 0x3F]);
        assert!(is_opening_tag(&buffer, 3));
        assert!(is_closing_tag(&buffer[1..], 3));
    }

    #[test]
    fn test_constructed_content_length() {
        let mut buffer = Vec::new();
        encode_opening_tag(&mut buffer, 3).unwrap();
        encode_real(&mut buffer, 72.0).unwrap();
        encode_closing_tag(&mut buffer, 3).unwrap();
        assert_eq!(constructed_content_length(&buffer[1..], 3).unwrap(), 5);

        // Nested constructed data with the same tag number
        let mut nested = Vec::new();
        encode_opening_tag(&mut nested, 3).unwrap();
        encode_opening_tag(&mut nested, 3).unwrap();
        encode_closing_tag(&mut nested, 3).unwrap();
        encode_closing_tag(&mut nested, 3).unwrap();
        assert_eq!(constructed_content_length(&nested[1..], 3).unwrap(), 2);

        // Missing closing tag
        let open_only = [0x3E, 0x44, 0x42, 0x90, 0x00, 0x00];
        assert_eq!(
            constructed_content_length(&open_only[1..], 3),
            Err(EncodingError::MalformedTag)
        );
    }

    proptest! {
        #[test]
        fn prop_unsigned_roundtrip(value in any::<u32>()) {
            let mut buffer = Vec::new();
            encode_unsigned(&mut buffer, value).unwrap();
            let (decoded, consumed) = decode_unsigned(&buffer).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(consumed, buffer.len());
        }

        #[test]
        fn prop_signed_roundtrip(value in any::<i32>()) {
            let mut buffer = Vec::new();
            encode_signed(&mut buffer, value).unwrap();
            let (decoded, _) = decode_signed(&buffer).unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn prop_tag_header_roundtrip(number in 0u8..254, length in 0u32..2_000_000) {
            let tag = Tag::context(number, length);
            let mut buffer = Vec::new();
            tag.encode(&mut buffer).unwrap();
            let (decoded, consumed) = Tag::decode(&buffer).unwrap();
            prop_assert_eq!(decoded, tag);
            prop_assert_eq!(consumed, buffer.len());
        }

        #[test]
        fn prop_octet_string_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..600)) {
            let mut buffer = Vec::new();
            encode_octet_string(&mut buffer, &bytes).unwrap();
            let (decoded, consumed) = decode_octet_string(&buffer).unwrap();
            prop_assert_eq!(decoded, bytes);
            prop_assert_eq!(consumed, buffer.len());
        }
    }
}
