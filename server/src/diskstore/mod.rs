/*
 * Created on Mon Feb 26 2024
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

//! # The snapshot loader
//!
//! A straight-line parser for the binary dump format of the canonical
//! data-structure server. The parser knows nothing about the runtime store:
//! it feeds a [`SnapshotSink`], which keeps it testable against byte
//! fixtures. Structural corruption aborts the load; value kinds this server
//! does not model are skipped when their bytes can be traversed.

mod containers;
mod decoder;

use self::containers::{parse_listpack, parse_ziplist};
use self::decoder::{DecodeError, RawReader};
use crate::corestore::{Corestore, Data};
use chrono::{DateTime, TimeZone, Utc};
use core::fmt;
use std::fs;
use std::io::Error as IoError;
use std::path::Path;

// record opcodes
const OP_AUX: u8 = 0xFA;
const OP_RESIZEDB: u8 = 0xFB;
const OP_EXPIRETIME_MS: u8 = 0xFC;
const OP_EXPIRETIME_S: u8 = 0xFD;
const OP_SELECTDB: u8 = 0xFE;
const OP_EOF: u8 = 0xFF;

// value-type tags this server stores
const TYPE_STRING: u8 = 0x00;
const TYPE_LIST: u8 = 0x01;
const TYPE_LIST_QUICKLIST: u8 = 0x0E;
const TYPE_LIST_QUICKLIST_2: u8 = 0x12;

// value-type tags that are traversed and dropped
const TYPE_SET: u8 = 0x02;
const TYPE_ZSET: u8 = 0x03;
const TYPE_HASH: u8 = 0x04;
const TYPE_ZIPMAP: u8 = 0x09;
const TYPE_ZIPLIST: u8 = 0x0A;
const TYPE_INTSET: u8 = 0x0B;
const TYPE_ZSET_ZIPLIST: u8 = 0x0C;
const TYPE_HASH_ZIPLIST: u8 = 0x0D;
const TYPE_HASH_LISTPACK: u8 = 0x10;
const TYPE_ZSET_2: u8 = 0x11;
const TYPE_SET_LISTPACK: u8 = 0x14;

/// The smallest legal snapshot: magic, version, end-of-file, and an
/// unverified checksum. This is what a primary ships to a follower that has
/// nothing to sync
pub const EMPTY_SNAPSHOT: &[u8] = b"REDIS0011\xff\x00\x00\x00\x00\x00\x00\x00\x00";

/// Why a load failed outright
#[derive(Debug)]
pub enum LoadError {
    Io(IoError),
    /// The magic or version did not check out
    BadHeader,
    /// Structural corruption or an untraversable value kind
    Decode(DecodeError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "i/o error: {e}"),
            LoadError::BadHeader => write!(f, "not a snapshot file (bad magic or version)"),
            LoadError::Decode(e) => write!(f, "corrupt snapshot: {e}"),
        }
    }
}

impl From<IoError> for LoadError {
    fn from(e: IoError) -> Self {
        LoadError::Io(e)
    }
}

impl From<DecodeError> for LoadError {
    fn from(e: DecodeError) -> Self {
        LoadError::Decode(e)
    }
}

/// The narrow adapter between the parser and whatever stores the result
pub trait SnapshotSink {
    fn put_string(&mut self, key: Data, value: Data, expiry: Option<DateTime<Utc>>);
    fn put_list(&mut self, key: Data, elements: Vec<Data>, expiry: Option<DateTime<Utc>>);
}

impl SnapshotSink for Corestore {
    fn put_string(&mut self, key: Data, value: Data, expiry: Option<DateTime<Utc>>) {
        self.load_string(key, value, expiry);
    }
    fn put_list(&mut self, key: Data, elements: Vec<Data>, expiry: Option<DateTime<Utc>>) {
        if elements.is_empty() {
            self.load_empty_list(key, expiry);
        } else {
            self.load_list(key, elements, expiry);
        }
    }
}

/// What a completed load did
#[derive(Debug, Default, PartialEq)]
pub struct LoadStats {
    pub keys: usize,
    pub expired: usize,
    pub skipped: usize,
}

/// Load the snapshot at `<dir>/<file>` into the store, if it exists. A
/// missing file is a clean empty start; a corrupt one is reported to the
/// caller, who warns and also starts empty
pub fn load_from_file(db: &Corestore, dir: &str, file: &str) -> Result<Option<LoadStats>, LoadError> {
    let path = Path::new(dir).join(file);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    let mut db = db.clone();
    let stats = load(&bytes, &mut db)?;
    Ok(Some(stats))
}

/// Parse a snapshot blob, feeding every supported record into the sink
pub fn load(bytes: &[u8], sink: &mut impl SnapshotSink) -> Result<LoadStats, LoadError> {
    let mut reader = RawReader::new(bytes);
    read_header(&mut reader)?;
    let mut stats = LoadStats::default();
    let mut pending_expiry: Option<DateTime<Utc>> = None;
    loop {
        let opcode = reader.next_byte().map_err(LoadError::from)?;
        match opcode {
            OP_EOF => {
                // the trailing 8 bytes are a checksum this loader does not
                // verify
                break;
            }
            OP_AUX => {
                let key = reader.read_string()?;
                let value = reader.read_string()?;
                log::debug!(
                    "snapshot aux {} = {}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
            OP_RESIZEDB => {
                let _keyspace = reader.read_plain_length()?;
                let _expires = reader.read_plain_length()?;
            }
            OP_SELECTDB => {
                let db_number = reader.read_plain_length()?;
                if db_number != 0 {
                    log::warn!(
                        "snapshot selects database {db_number}; loading it into the only keyspace"
                    );
                }
            }
            OP_EXPIRETIME_MS => {
                let unix_ms = reader.read_u64_le()?;
                pending_expiry = Utc.timestamp_millis_opt(unix_ms as i64).single();
            }
            OP_EXPIRETIME_S => {
                let unix_s = reader.read_u32_le()?;
                pending_expiry = Utc.timestamp_opt(unix_s as i64, 0).single();
            }
            value_type => {
                let expiry = pending_expiry.take();
                read_key_value(&mut reader, value_type, expiry, sink, &mut stats)?;
            }
        }
    }
    Ok(stats)
}

/// `REDIS` plus four ASCII digits
fn read_header(reader: &mut RawReader<'_>) -> Result<(), LoadError> {
    let magic = reader.next_bytes(5).map_err(|_| LoadError::BadHeader)?;
    if magic != b"REDIS" {
        return Err(LoadError::BadHeader);
    }
    let version = reader.next_bytes(4).map_err(|_| LoadError::BadHeader)?;
    if !version.iter().all(u8::is_ascii_digit) {
        return Err(LoadError::BadHeader);
    }
    log::debug!(
        "snapshot version {}",
        String::from_utf8_lossy(version)
    );
    Ok(())
}

fn read_key_value(
    reader: &mut RawReader<'_>,
    value_type: u8,
    expiry: Option<DateTime<Utc>>,
    sink: &mut impl SnapshotSink,
    stats: &mut LoadStats,
) -> Result<(), LoadError> {
    let key = Data::from(reader.read_string()?);
    // an expiry in the past drops the record on the floor, but its bytes
    // still have to be walked
    let dead = expiry.map_or(false, |at| at <= Utc::now());
    match value_type {
        TYPE_STRING => {
            let value = Data::from(reader.read_string()?);
            if dead {
                stats.expired += 1;
            } else {
                sink.put_string(key, value, expiry);
                stats.keys += 1;
            }
        }
        TYPE_LIST => {
            let count = reader.read_plain_length()?;
            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                elements.push(Data::from(reader.read_string()?));
            }
            if dead {
                stats.expired += 1;
            } else {
                sink.put_list(key, elements, expiry);
                stats.keys += 1;
            }
        }
        TYPE_LIST_QUICKLIST | TYPE_LIST_QUICKLIST_2 => {
            let elements = read_quicklist(reader, value_type)?;
            if dead {
                stats.expired += 1;
            } else {
                sink.put_list(key, elements, expiry);
                stats.keys += 1;
            }
        }
        other => {
            skip_unsupported(reader, other)?;
            log::warn!(
                "skipping key {:?}: unsupported value type 0x{other:02X}",
                key
            );
            stats.skipped += 1;
        }
    }
    Ok(())
}

/// A quicklist is a length-prefixed run of node blobs. In the older form
/// every node is a ziplist; in the newer form each node carries a container
/// flag (1 = one plain element, 2 = a listpack). A node that fails to parse
/// is abandoned with a warning and the walk continues
fn read_quicklist(reader: &mut RawReader<'_>, value_type: u8) -> Result<Vec<Data>, LoadError> {
    let nodes = reader.read_plain_length()?;
    let mut elements = Vec::new();
    for _ in 0..nodes {
        let container = if value_type == TYPE_LIST_QUICKLIST_2 {
            reader.read_plain_length()?
        } else {
            2 // the older form is always packed
        };
        let blob = reader.read_string()?;
        if value_type == TYPE_LIST_QUICKLIST_2 && container == 1 {
            // a plain node: the blob is one element
            elements.push(Data::from(blob));
            continue;
        }
        let parsed = if value_type == TYPE_LIST_QUICKLIST {
            parse_ziplist(&blob)
        } else {
            parse_listpack(&blob)
        };
        match parsed {
            Ok(node_elements) => elements.extend(node_elements),
            Err(e) => log::warn!("abandoning a corrupt quicklist node: {e}"),
        }
    }
    Ok(elements)
}

/// Walk (and drop) a value kind this server does not model. Anything whose
/// layout cannot be traversed aborts the load
fn skip_unsupported(reader: &mut RawReader<'_>, value_type: u8) -> Result<(), LoadError> {
    match value_type {
        TYPE_ZIPMAP | TYPE_ZIPLIST | TYPE_INTSET | TYPE_ZSET_ZIPLIST | TYPE_HASH_ZIPLIST
        | TYPE_HASH_LISTPACK | TYPE_SET_LISTPACK => {
            // a single embedded blob
            reader.read_string()?;
        }
        TYPE_SET => {
            let count = reader.read_plain_length()?;
            for _ in 0..count {
                reader.read_string()?;
            }
        }
        TYPE_HASH => {
            let count = reader.read_plain_length()?;
            for _ in 0..count * 2 {
                reader.read_string()?;
            }
        }
        TYPE_ZSET => {
            let count = reader.read_plain_length()?;
            for _ in 0..count {
                reader.read_string()?;
                skip_score(reader)?;
            }
        }
        TYPE_ZSET_2 => {
            let count = reader.read_plain_length()?;
            for _ in 0..count {
                reader.read_string()?;
                reader.next_bytes(8)?; // binary double score
            }
        }
        _ => {
            return Err(LoadError::Decode(DecodeError::Unsupported(
                "untraversable value type",
            )));
        }
    }
    Ok(())
}

/// The old sorted-set score: a one-byte length (with infinity/NaN specials)
/// followed by that many characters
fn skip_score(reader: &mut RawReader<'_>) -> Result<(), DecodeError> {
    let len = reader.next_byte()?;
    match len {
        253 | 254 | 255 => Ok(()),
        len => {
            reader.next_bytes(len as usize)?;
            Ok(())
        }
    }
}
