//! Tag and length octets.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{BerError, Result};

/// Tag class, bits 8-7 of the identifier octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Universal,
    Application,
    Context,
    Private,
}

impl Class {
    fn bits(self) -> u8 {
        match self {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::Context => 0x80,
            Class::Private => 0xC0,
        }
    }

    fn from_bits(octet: u8) -> Self {
        match octet & 0xC0 {
            0x00 => Class::Universal,
            0x40 => Class::Application,
            0x80 => Class::Context,
            _ => Class::Private,
        }
    }
}

/// A BER identifier: class, constructed bit and tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub class: Class,
    pub constructed: bool,
    pub number: u32,
}

/// Universal tag numbers used by EmBER.
pub mod universal {
    pub const END_OF_CONTENTS: u32 = 0;
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const REAL: u32 = 9;
    pub const UTF8_STRING: u32 = 12;
    pub const RELATIVE_OID: u32 = 13;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
}

impl Tag {
    pub const BOOLEAN: Tag = Tag::universal(universal::BOOLEAN);
    pub const INTEGER: Tag = Tag::universal(universal::INTEGER);
    pub const OCTET_STRING: Tag = Tag::universal(universal::OCTET_STRING);
    pub const NULL: Tag = Tag::universal(universal::NULL);
    pub const REAL: Tag = Tag::universal(universal::REAL);
    pub const UTF8_STRING: Tag = Tag::universal(universal::UTF8_STRING);
    pub const RELATIVE_OID: Tag = Tag::universal(universal::RELATIVE_OID);
    pub const SEQUENCE: Tag = Tag::universal(universal::SEQUENCE).into_constructed();
    pub const SET: Tag = Tag::universal(universal::SET).into_constructed();

    /// A primitive universal tag.
    pub const fn universal(number: u32) -> Self {
        Self {
            class: Class::Universal,
            constructed: false,
            number,
        }
    }

    /// A constructed application tag.
    pub const fn application(number: u32) -> Self {
        Self {
            class: Class::Application,
            constructed: true,
            number,
        }
    }

    /// A constructed context-specific tag, as used for explicit fields.
    pub const fn context(number: u32) -> Self {
        Self {
            class: Class::Context,
            constructed: true,
            number,
        }
    }

    pub const fn into_constructed(self) -> Self {
        Self {
            constructed: true,
            ..self
        }
    }

    /// Returns true for a universal tag with the given number, ignoring the constructed bit.
    pub fn is_universal(&self, number: u32) -> bool {
        self.class == Class::Universal && self.number == number
    }

    /// Returns true for an application tag with the given number.
    pub fn is_application(&self, number: u32) -> bool {
        self.class == Class::Application && self.number == number
    }

    /// Returns the tag number if this is a context-specific tag.
    pub fn context_number(&self) -> Option<u32> {
        (self.class == Class::Context).then_some(self.number)
    }

    /// Append the identifier octets.
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut first = self.class.bits();
        if self.constructed {
            first |= 0x20;
        }

        if self.number < 0x1F {
            dst.put_u8(first | self.number as u8);
            return;
        }

        dst.put_u8(first | 0x1F);
        let mut groups = [0u8; 5];
        let mut count = 0;
        let mut number = self.number;
        loop {
            groups[count] = (number & 0x7F) as u8;
            count += 1;
            number >>= 7;
            if number == 0 {
                break;
            }
        }
        for index in (0..count).rev() {
            let more = if index == 0 { 0x00 } else { 0x80 };
            dst.put_u8(groups[index] | more);
        }
    }

    /// Decode identifier octets at `offset`, returning the tag and the bytes consumed.
    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize)> {
        let first = *src.get(offset).ok_or(BerError::Truncated { offset })?;
        let class = Class::from_bits(first);
        let constructed = first & 0x20 != 0;

        if first & 0x1F != 0x1F {
            let tag = Self {
                class,
                constructed,
                number: u32::from(first & 0x1F),
            };
            return Ok((tag, 1));
        }

        let mut number: u32 = 0;
        let mut used = 1;
        loop {
            let at = offset + used;
            let octet = *src.get(at).ok_or(BerError::Truncated { offset: at })?;
            used += 1;
            if number > (u32::MAX >> 7) {
                return Err(BerError::TagTooLarge { offset });
            }
            number = (number << 7) | u32::from(octet & 0x7F);
            if octet & 0x80 == 0 {
                break;
            }
        }

        Ok((
            Self {
                class,
                constructed,
                number,
            },
            used,
        ))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.class {
            Class::Universal => "UNIVERSAL",
            Class::Application => "APPLICATION",
            Class::Context => "CONTEXT",
            Class::Private => "PRIVATE",
        };
        let form = if self.constructed { "C" } else { "P" };
        write!(f, "[{class} {}]/{form}", self.number)
    }
}

/// A decoded length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    Indefinite,
}

/// Marker octet announcing an indefinite length.
pub const INDEFINITE: u8 = 0x80;

/// Append a definite length in the shortest form.
pub fn encode_length(len: usize, dst: &mut BytesMut) {
    if len < 0x80 {
        dst.put_u8(len as u8);
        return;
    }

    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    dst.put_u8(0x80 | significant.len() as u8);
    dst.put_slice(significant);
}

/// Decode a length field at `offset`, returning the length and the bytes consumed.
pub fn decode_length(src: &[u8], offset: usize) -> Result<(Length, usize)> {
    let first = *src.get(offset).ok_or(BerError::Truncated { offset })?;
    if first < 0x80 {
        return Ok((Length::Definite(usize::from(first)), 1));
    }
    if first == INDEFINITE {
        return Ok((Length::Indefinite, 1));
    }

    let count = usize::from(first & 0x7F);
    if first == 0xFF || count > std::mem::size_of::<usize>() {
        return Err(BerError::InvalidLength { offset });
    }

    let end = offset + 1 + count;
    let octets = src.get(offset + 1..end).ok_or(BerError::Truncated { offset })?;
    let len = octets
        .iter()
        .fold(0usize, |acc, octet| (acc << 8) | usize::from(*octet));
    Ok((Length::Definite(len), 1 + count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(tag: Tag) -> Vec<u8> {
        let mut buf = BytesMut::new();
        tag.encode(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn low_tag_numbers_use_one_octet() {
        assert_eq!(encoded(Tag::context(0)), vec![0xA0]);
        assert_eq!(encoded(Tag::application(3)), vec![0x63]);
        assert_eq!(encoded(Tag::INTEGER), vec![0x02]);
        assert_eq!(encoded(Tag::SEQUENCE), vec![0x30]);
        assert_eq!(encoded(Tag::SET), vec![0x31]);
    }

    #[test]
    fn high_tag_numbers_roundtrip() {
        for number in [31u32, 127, 128, 16_383, 16_384, u32::MAX] {
            let tag = Tag::application(number);
            let bytes = encoded(tag);
            assert_eq!(bytes[0], 0x7F);
            let (decoded, used) = Tag::decode(&bytes, 0).unwrap();
            assert_eq!(decoded, tag);
            assert_eq!(used, bytes.len());
        }
    }

    #[test]
    fn truncated_high_tag_is_rejected() {
        let err = Tag::decode(&[0x7F, 0x81], 0).unwrap_err();
        assert!(matches!(err, BerError::Truncated { .. }));
    }

    #[test]
    fn lengths_use_short_and_long_forms() {
        let mut buf = BytesMut::new();
        encode_length(0x7F, &mut buf);
        encode_length(0x80, &mut buf);
        encode_length(0x1234, &mut buf);
        assert_eq!(buf.as_ref(), &[0x7F, 0x81, 0x80, 0x82, 0x12, 0x34]);

        assert_eq!(decode_length(&buf, 0).unwrap(), (Length::Definite(0x7F), 1));
        assert_eq!(decode_length(&buf, 1).unwrap(), (Length::Definite(0x80), 2));
        assert_eq!(
            decode_length(&buf, 3).unwrap(),
            (Length::Definite(0x1234), 3)
        );
    }

    #[test]
    fn indefinite_and_reserved_lengths() {
        assert_eq!(decode_length(&[0x80], 0).unwrap(), (Length::Indefinite, 1));
        assert!(matches!(
            decode_length(&[0xFF], 0),
            Err(BerError::InvalidLength { .. })
        ));
        assert!(matches!(
            decode_length(&[0x82, 0x01], 0),
            Err(BerError::Truncated { .. })
        ));
    }
}
