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

//! The embedded entry containers a quicklist node can be: the ziplist and
//! the listpack. Both are parsed off a fully materialized node blob.

use super::decoder::DecodeError;
use crate::corestore::Data;

/// Parse a ziplist node: ten header bytes (element count at bytes 8-9,
/// little-endian), then entries of `<prevlen> <encoding> <payload>`
pub fn parse_ziplist(blob: &[u8]) -> Result<Vec<Data>, DecodeError> {
    if blob.len() < 11 {
        return Err(DecodeError::UnexpectedEof);
    }
    let count = u16::from_le_bytes([blob[8], blob[9]]) as usize;
    let mut elements = Vec::with_capacity(count.min(1024));
    let mut cursor = 10usize;
    loop {
        let first = *blob.get(cursor).ok_or(DecodeError::UnexpectedEof)?;
        if first == 0xFF {
            break;
        }
        // a count of 0xFFFF means "too many to record"; the end marker is
        // authoritative either way
        if count != 0xFFFF && elements.len() == count {
            break;
        }
        // previous-entry length: one byte, or 0xFE plus a four-byte value
        cursor += if first == 0xFE { 5 } else { 1 };
        let encoding = *blob.get(cursor).ok_or(DecodeError::UnexpectedEof)?;
        cursor += 1;
        let element = match encoding >> 6 {
            0b00 => take_str(blob, &mut cursor, (encoding & 0x3F) as usize)?,
            0b01 => {
                let next = *blob.get(cursor).ok_or(DecodeError::UnexpectedEof)?;
                cursor += 1;
                take_str(
                    blob,
                    &mut cursor,
                    (((encoding & 0x3F) as usize) << 8) | next as usize,
                )?
            }
            0b10 => {
                let raw = get(blob, cursor, 4)?;
                cursor += 4;
                let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
                take_str(blob, &mut cursor, len)?
            }
            _ => match encoding {
                0xC0 => {
                    let raw = get(blob, cursor, 2)?;
                    cursor += 2;
                    int_data(i16::from_le_bytes([raw[0], raw[1]]) as i64)
                }
                0xD0 => {
                    let raw = get(blob, cursor, 4)?;
                    cursor += 4;
                    int_data(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
                }
                0xE0 => {
                    let raw = get(blob, cursor, 8)?;
                    cursor += 8;
                    let mut wide = [0u8; 8];
                    wide.copy_from_slice(raw);
                    int_data(i64::from_le_bytes(wide))
                }
                0xF0 => {
                    // 24-bit little-endian, sign-extended
                    let raw = get(blob, cursor, 3)?;
                    cursor += 3;
                    let wide =
                        i32::from_le_bytes([raw[0], raw[1], raw[2], 0]) << 8 >> 8;
                    int_data(wide as i64)
                }
                0xFE => {
                    let raw = *blob.get(cursor).ok_or(DecodeError::UnexpectedEof)?;
                    cursor += 1;
                    int_data(raw as i8 as i64)
                }
                0xF1..=0xFD => int_data(((encoding & 0x0F) as i64) - 1),
                _ => return Err(DecodeError::BadEncoding("ziplist entry encoding")),
            },
        };
        elements.push(element);
    }
    Ok(elements)
}

/// Parse a listpack node: four bytes total size, two bytes element count
/// (both little-endian), then entries each followed by a back-length
pub fn parse_listpack(blob: &[u8]) -> Result<Vec<Data>, DecodeError> {
    if blob.len() < 7 {
        return Err(DecodeError::UnexpectedEof);
    }
    let count = u16::from_le_bytes([blob[4], blob[5]]) as usize;
    let mut elements = Vec::with_capacity(count.min(1024));
    let mut cursor = 6usize;
    loop {
        let start = cursor;
        let encoding = *blob.get(cursor).ok_or(DecodeError::UnexpectedEof)?;
        if encoding == 0xFF {
            break;
        }
        cursor += 1;
        let element = if encoding & 0x80 == 0 {
            // 7-bit unsigned immediate
            int_data(encoding as i64)
        } else if encoding & 0xC0 == 0x80 {
            // 6-bit length small string
            take_str(blob, &mut cursor, (encoding & 0x3F) as usize)?
        } else if encoding & 0xE0 == 0xC0 {
            // 13-bit signed immediate
            let next = *blob.get(cursor).ok_or(DecodeError::UnexpectedEof)?;
            cursor += 1;
            let mut val = (((encoding & 0x1F) as i64) << 8) | next as i64;
            if val >= 4096 {
                val -= 8192;
            }
            int_data(val)
        } else if encoding & 0xF0 == 0xE0 {
            // 12-bit length string
            let next = *blob.get(cursor).ok_or(DecodeError::UnexpectedEof)?;
            cursor += 1;
            take_str(
                blob,
                &mut cursor,
                (((encoding & 0x0F) as usize) << 8) | next as usize,
            )?
        } else {
            match encoding {
                0xF0 => {
                    let raw = get(blob, cursor, 4)?;
                    cursor += 4;
                    let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
                    take_str(blob, &mut cursor, len)?
                }
                0xF1 => {
                    let raw = get(blob, cursor, 2)?;
                    cursor += 2;
                    int_data(i16::from_le_bytes([raw[0], raw[1]]) as i64)
                }
                0xF2 => {
                    let raw = get(blob, cursor, 3)?;
                    cursor += 3;
                    let wide = i32::from_le_bytes([raw[0], raw[1], raw[2], 0]) << 8 >> 8;
                    int_data(wide as i64)
                }
                0xF3 => {
                    let raw = get(blob, cursor, 4)?;
                    cursor += 4;
                    int_data(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
                }
                0xF4 => {
                    let raw = get(blob, cursor, 8)?;
                    cursor += 8;
                    let mut wide = [0u8; 8];
                    wide.copy_from_slice(raw);
                    int_data(i64::from_le_bytes(wide))
                }
                _ => return Err(DecodeError::BadEncoding("listpack entry encoding")),
            }
        };
        // the back-length makes entries traversable from the tail; its size
        // is a function of the entry size
        cursor += backlen_size(cursor - start);
        if cursor > blob.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        elements.push(element);
    }
    if count != 0xFFFF && elements.len() != count {
        return Err(DecodeError::BadEncoding("listpack count mismatch"));
    }
    Ok(elements)
}

fn backlen_size(entry_len: usize) -> usize {
    match entry_len {
        0..=127 => 1,
        128..=16383 => 2,
        16384..=2097151 => 3,
        2097152..=268435455 => 4,
        _ => 5,
    }
}

fn get(blob: &[u8], at: usize, n: usize) -> Result<&[u8], DecodeError> {
    blob.get(at..at + n).ok_or(DecodeError::UnexpectedEof)
}

fn take_str(blob: &[u8], cursor: &mut usize, len: usize) -> Result<Data, DecodeError> {
    let raw = get(blob, *cursor, len)?;
    *cursor += len;
    Ok(Data::copy_from_slice(raw))
}

fn int_data(val: i64) -> Data {
    Data::from_string(val.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse_listpack, parse_ziplist};
    use crate::corestore::Data;

    /// Hand-assemble a ziplist holding `entries`
    fn build_ziplist(entries: &[&[u8]]) -> Vec<u8> {
        let mut out = vec![0u8; 8];
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        let mut prevlen = 0u8;
        for entry in entries {
            out.push(prevlen);
            assert!(entry.len() < 64, "test entries stay in the 6-bit form");
            out.push(entry.len() as u8);
            out.extend_from_slice(entry);
            prevlen = (2 + entry.len()) as u8;
        }
        out.push(0xFF);
        // fix up total-bytes in the header
        let total = (out.len() as u32).to_le_bytes();
        out[..4].copy_from_slice(&total);
        out
    }

    #[test]
    fn ziplist_strings() {
        let blob = build_ziplist(&[b"alpha", b"beta", b"gamma"]);
        assert_eq!(
            parse_ziplist(&blob).unwrap(),
            vec![Data::from("alpha"), Data::from("beta"), Data::from("gamma")]
        );
    }

    #[test]
    fn ziplist_integers() {
        // one entry: prevlen 0, encoding 0xC0 (int16), 1000 LE
        let mut blob = vec![0u8; 8];
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&[0x00, 0xC0, 0xE8, 0x03, 0xFF]);
        assert_eq!(parse_ziplist(&blob).unwrap(), vec![Data::from("1000")]);
        // small immediate: 0xF1 encodes 0
        let mut blob = vec![0u8; 8];
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&[0x00, 0xF1, 0xFF]);
        assert_eq!(parse_ziplist(&blob).unwrap(), vec![Data::from("0")]);
    }

    #[test]
    fn ziplist_truncation_is_an_error() {
        let mut blob = build_ziplist(&[b"alpha"]);
        blob.truncate(blob.len() - 3);
        assert!(parse_ziplist(&blob).is_err());
    }

    /// Hand-assemble a listpack of small strings
    fn build_listpack(entries: &[&[u8]]) -> Vec<u8> {
        let mut out = vec![0u8; 4];
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for entry in entries {
            assert!(entry.len() < 64);
            out.push(0x80 | entry.len() as u8);
            out.extend_from_slice(entry);
            out.push((1 + entry.len()) as u8); // back-length
        }
        out.push(0xFF);
        let total = (out.len() as u32).to_le_bytes();
        out[..4].copy_from_slice(&total);
        out
    }

    #[test]
    fn listpack_strings() {
        let blob = build_listpack(&[b"one", b"two"]);
        assert_eq!(
            parse_listpack(&blob).unwrap(),
            vec![Data::from("one"), Data::from("two")]
        );
    }

    #[test]
    fn listpack_integers() {
        // 7-bit immediate 5, then int16 -2 (0xF1), each with a back-length
        let mut out = vec![0u8; 4];
        out.extend_from_slice(&2u16.to_le_bytes());
        out.push(0x05);
        out.push(1);
        out.extend_from_slice(&[0xF1, 0xFE, 0xFF]);
        out.push(3);
        out.push(0xFF);
        let total = (out.len() as u32).to_le_bytes();
        out[..4].copy_from_slice(&total);
        assert_eq!(
            parse_listpack(&out).unwrap(),
            vec![Data::from("5"), Data::from("-2")]
        );
    }

    #[test]
    fn listpack_count_mismatch_is_an_error() {
        let mut blob = build_listpack(&[b"one"]);
        // claim two elements while holding one
        blob[4..6].copy_from_slice(&2u16.to_le_bytes());
        assert!(parse_listpack(&blob).is_err());
    }
}
