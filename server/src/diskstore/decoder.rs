/*
 * Created on Sun Feb 25 2024
 *
 * This file is a part of Crimson
 * Crimson is a free and open-source in-memory data structure server written
 * by Sayan Nandan ("the Author") with the vision to provide a compact,
 * protocol-compatible store for strings, lists and streams.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Byte-level decoding primitives for the snapshot format: the cursor, the
//! length encoding and the string encoding

use core::fmt;

#[derive(Debug, PartialEq)]
pub enum DecodeError {
    /// The blob ended in the middle of a structure
    UnexpectedEof,
    /// A byte sequence the grammar does not permit
    BadEncoding(&'static str),
    /// A documented-but-unsupported encoding (LZF, exotic value kinds)
    Unsupported(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEof => write!(f, "unexpected end of snapshot data"),
            DecodeError::BadEncoding(what) => write!(f, "bad encoding: {what}"),
            DecodeError::Unsupported(what) => write!(f, "unsupported encoding: {what}"),
        }
    }
}

/// What a length byte turned out to be
#[derive(Debug, PartialEq)]
pub enum Length {
    /// An actual length
    Plain(usize),
    /// `11`-tagged specials: the string is really an integer, or compressed
    Int8,
    Int16,
    Int32,
    Lzf,
}

/// A cursor over the raw snapshot bytes
pub struct RawReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> RawReader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        RawReader { buf, cursor: 0 }
    }
    pub fn next_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.buf.get(self.cursor).ok_or(DecodeError::UnexpectedEof)?;
        self.cursor += 1;
        Ok(byte)
    }
    pub fn next_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let bytes = self
            .buf
            .get(self.cursor..self.cursor + n)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.cursor += n;
        Ok(bytes)
    }
    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.next_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.next_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Decode one length. The top two bits of the first byte select the form:
    /// `00` six bits, `01` fourteen bits, `10` a four-byte big-endian word,
    /// `11` a "special" string encoding tag
    pub fn read_length(&mut self) -> Result<Length, DecodeError> {
        let first = self.next_byte()?;
        match first >> 6 {
            0b00 => Ok(Length::Plain((first & 0x3F) as usize)),
            0b01 => {
                let next = self.next_byte()?;
                Ok(Length::Plain((((first & 0x3F) as usize) << 8) | next as usize))
            }
            0b10 => {
                let bytes = self.next_bytes(4)?;
                Ok(Length::Plain(
                    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize,
                ))
            }
            _ => match first & 0x3F {
                0 => Ok(Length::Int8),
                1 => Ok(Length::Int16),
                2 => Ok(Length::Int32),
                3 => Ok(Length::Lzf),
                _ => Err(DecodeError::BadEncoding("unknown special length tag")),
            },
        }
    }

    /// A length that must not be one of the special forms
    pub fn read_plain_length(&mut self) -> Result<usize, DecodeError> {
        match self.read_length()? {
            Length::Plain(len) => Ok(len),
            _ => Err(DecodeError::BadEncoding("expected a plain length")),
        }
    }

    /// Decode one string: either raw bytes of a plain length, or an integer
    /// stringified to signed decimal. LZF blobs are refused
    pub fn read_string(&mut self) -> Result<Vec<u8>, DecodeError> {
        match self.read_length()? {
            Length::Plain(len) => Ok(self.next_bytes(len)?.to_vec()),
            Length::Int8 => Ok((self.next_byte()? as i8).to_string().into_bytes()),
            Length::Int16 => {
                let bytes = self.next_bytes(2)?;
                Ok(i16::from_le_bytes([bytes[0], bytes[1]])
                    .to_string()
                    .into_bytes())
            }
            Length::Int32 => {
                let bytes = self.next_bytes(4)?;
                Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                    .to_string()
                    .into_bytes())
            }
            Length::Lzf => Err(DecodeError::Unsupported("LZF-compressed string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, Length, RawReader};

    #[test]
    fn length_forms() {
        assert_eq!(RawReader::new(&[0x0A]).read_length(), Ok(Length::Plain(10)));
        // 01 form: (0x01 << 8) | 0x2C = 300
        assert_eq!(
            RawReader::new(&[0x41, 0x2C]).read_length(),
            Ok(Length::Plain(300))
        );
        // 10 form: 4-byte big-endian
        assert_eq!(
            RawReader::new(&[0x80, 0x00, 0x01, 0x00, 0x00]).read_length(),
            Ok(Length::Plain(65536))
        );
        assert_eq!(RawReader::new(&[0xC0]).read_length(), Ok(Length::Int8));
        assert_eq!(RawReader::new(&[0xC1]).read_length(), Ok(Length::Int16));
        assert_eq!(RawReader::new(&[0xC2]).read_length(), Ok(Length::Int32));
        assert_eq!(RawReader::new(&[0xC3]).read_length(), Ok(Length::Lzf));
        assert!(RawReader::new(&[0xC4]).read_length().is_err());
    }

    #[test]
    fn string_forms() {
        assert_eq!(
            RawReader::new(b"\x05hello").read_string(),
            Ok(b"hello".to_vec())
        );
        // int8 -7
        assert_eq!(RawReader::new(&[0xC0, 0xF9]).read_string(), Ok(b"-7".to_vec()));
        // int16 LE 1000
        assert_eq!(
            RawReader::new(&[0xC1, 0xE8, 0x03]).read_string(),
            Ok(b"1000".to_vec())
        );
        // int32 LE 100000
        assert_eq!(
            RawReader::new(&[0xC2, 0xA0, 0x86, 0x01, 0x00]).read_string(),
            Ok(b"100000".to_vec())
        );
        assert_eq!(
            RawReader::new(&[0xC3, 0x00]).read_string(),
            Err(DecodeError::Unsupported("LZF-compressed string"))
        );
    }

    #[test]
    fn eof_is_detected() {
        assert_eq!(
            RawReader::new(b"\x05he").read_string(),
            Err(DecodeError::UnexpectedEof)
        );
        assert_eq!(
            RawReader::new(&[]).read_length(),
            Err(DecodeError::UnexpectedEof)
        );
    }
}
