/*
 * Created on Fri Feb 16 2024
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

//! # The stream engine
//!
//! A stream is an append-only log of entries ordered by their composite
//! `(ms, seq)` identifiers. Identifiers are strictly increasing and `0-0` is
//! reserved: it sorts below every identifier a stream can actually hold.

use super::value::{Entry, Value};
use super::{Coretable, Data};
use crate::util::time_now_ms;
use core::fmt;

/// A composite stream entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };
    /// The smallest identifier a stream can hold
    pub const MIN_LIVE: StreamId = StreamId { ms: 0, seq: 1 };

    /// Parse a fully specified `ms-seq` identifier
    pub fn parse(raw: &[u8]) -> Result<StreamId, ()> {
        let raw = core::str::from_utf8(raw).map_err(|_| ())?;
        let (ms, seq) = raw.split_once('-').ok_or(())?;
        Ok(StreamId {
            ms: ms.parse().map_err(|_| ())?,
            seq: seq.parse().map_err(|_| ())?,
        })
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// How the caller of `XADD` asked for the identifier
#[derive(Debug, PartialEq)]
pub enum AddSpec {
    /// `*`: generate both halves
    Auto,
    /// `<ms>-*`: generate the sequence half
    AutoSeq(u64),
    /// A fully specified identifier
    Explicit(StreamId),
}

impl AddSpec {
    pub fn parse(raw: &[u8]) -> Result<AddSpec, ()> {
        if raw == b"*" {
            return Ok(AddSpec::Auto);
        }
        if let Some(ms) = raw.strip_suffix(b"-*") {
            let ms = core::str::from_utf8(ms)
                .map_err(|_| ())?
                .parse()
                .map_err(|_| ())?;
            return Ok(AddSpec::AutoSeq(ms));
        }
        StreamId::parse(raw).map(AddSpec::Explicit)
    }
}

/// Resolve the start bound of an `XRANGE`. `-` means everything; a bare `ms`
/// means `ms-0`
pub fn parse_range_start(raw: &[u8]) -> Result<StreamId, ()> {
    if raw == b"-" {
        return Ok(StreamId::MIN_LIVE);
    }
    if let Ok(id) = StreamId::parse(raw) {
        return Ok(id);
    }
    let ms = core::str::from_utf8(raw)
        .map_err(|_| ())?
        .parse()
        .map_err(|_| ())?;
    Ok(StreamId { ms, seq: 0 })
}

/// Resolve the end bound of an `XRANGE`. `+` means everything; a bare `ms`
/// means `ms-<max>`
pub fn parse_range_end(raw: &[u8]) -> Result<StreamId, ()> {
    if raw == b"+" {
        return Ok(StreamId::MAX);
    }
    if let Ok(id) = StreamId::parse(raw) {
        return Ok(id);
    }
    let ms = core::str::from_utf8(raw)
        .map_err(|_| ())?
        .parse()
        .map_err(|_| ())?;
    Ok(StreamId { ms, seq: u64::MAX })
}

/// One element of a stream: the identifier and the ordered field map
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Data, Data)>,
}

/// The append-only log stored at a stream key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stream {
    pub entries: Vec<StreamEntry>,
    pub last_id: Option<StreamId>,
}

/// Why an `XADD` was refused
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StreamAddError {
    WrongType,
    /// At or below the stream top
    TooSmall,
    /// The reserved `0-0`
    Reserved,
}

impl Stream {
    /// Compute the identifier this append will use, without mutating
    fn next_id(&self, spec: &AddSpec) -> Result<StreamId, StreamAddError> {
        let last = self.last_id;
        let id = match *spec {
            AddSpec::Auto => {
                let now = time_now_ms();
                match last {
                    Some(last) if now <= last.ms => {
                        if now == last.ms {
                            StreamId {
                                ms: last.ms,
                                seq: last.seq + 1,
                            }
                        } else {
                            StreamId {
                                ms: last.ms + 1,
                                seq: 0,
                            }
                        }
                    }
                    _ => StreamId { ms: now, seq: 0 },
                }
            }
            AddSpec::AutoSeq(ms) => match last {
                Some(last) if ms < last.ms => return Err(StreamAddError::TooSmall),
                Some(last) if ms == last.ms => StreamId {
                    ms,
                    seq: last.seq + 1,
                },
                _ => StreamId { ms, seq: 0 },
            },
            AddSpec::Explicit(id) => {
                if id == StreamId::ZERO {
                    return Err(StreamAddError::Reserved);
                }
                if let Some(last) = last {
                    if id <= last {
                        return Err(StreamAddError::TooSmall);
                    }
                }
                id
            }
        };
        Ok(id)
    }
}

impl Coretable {
    /// Append an entry to the stream at `key`, creating the stream on first
    /// write and resetting it if the record expired. The new identifier is
    /// returned; callers are expected to wake stream waiters afterwards
    pub fn stream_add(
        &self,
        key: &Data,
        spec: &AddSpec,
        fields: Vec<(Data, Data)>,
    ) -> Result<StreamId, StreamAddError> {
        let mut map = self.map.write();
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Value::Stream(Stream::default())));
        if entry.is_expired() {
            *entry = Entry::new(Value::Stream(Stream::default()));
        }
        let stream = match &mut entry.value {
            Value::Stream(stream) => stream,
            _ => return Err(StreamAddError::WrongType),
        };
        let id = stream.next_id(spec)?;
        stream.entries.push(StreamEntry { id, fields });
        stream.last_id = Some(id);
        Ok(id)
    }

    fn with_stream<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&Stream) -> T,
        empty: impl FnOnce() -> T,
    ) -> Result<T, ()> {
        let map = self.map.read();
        match map.get(key) {
            Some(entry) if entry.is_expired() => Ok(empty()),
            Some(entry) => match &entry.value {
                Value::Stream(stream) => Ok(f(stream)),
                _ => Err(()),
            },
            None => Ok(empty()),
        }
    }

    /// Entries with `start <= id <= end`, in append order. Absent and expired
    /// streams scan as empty; the error case is a wrong-typed key
    pub fn stream_range(
        &self,
        key: &[u8],
        start: StreamId,
        end: StreamId,
    ) -> Result<Vec<StreamEntry>, ()> {
        self.with_stream(
            key,
            |stream| {
                stream
                    .entries
                    .iter()
                    .filter(|entry| entry.id >= start && entry.id <= end)
                    .cloned()
                    .collect()
            },
            Vec::new,
        )
    }

    /// Entries with `id > after`, truncated to `count` if given
    pub fn stream_read_from(
        &self,
        key: &[u8],
        after: StreamId,
        count: Option<usize>,
    ) -> Result<Vec<StreamEntry>, ()> {
        self.with_stream(
            key,
            |stream| {
                let iter = stream.entries.iter().filter(|entry| entry.id > after);
                match count {
                    Some(count) => iter.take(count).cloned().collect(),
                    None => iter.cloned().collect(),
                }
            },
            Vec::new,
        )
    }

    /// The identifier of the most recently appended entry, or `0-0`. This is
    /// what `$` resolves to at registration time
    pub fn stream_last_id(&self, key: &[u8]) -> StreamId {
        self.with_stream(key, |stream| stream.last_id, || None)
            .ok()
            .flatten()
            .unwrap_or(StreamId::ZERO)
    }
}
