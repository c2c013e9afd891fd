/*
 * Created on Wed Feb 14 2024
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

use super::stream::Stream;
use super::Data;
use chrono::{DateTime, Duration, Utc};

/// The contents of a value record. The tag of a stored value never changes;
/// retyping a key requires removing it first
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(Data),
    List(Vec<Data>),
    Stream(Stream),
}

/// The answer to a `TYPE` query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    None,
    Str,
    List,
    Stream,
}

impl KeyType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            KeyType::None => "none",
            KeyType::Str => "string",
            KeyType::List => "list",
            KeyType::Stream => "stream",
        }
    }
}

/// One record in the keyspace: the tagged value and an optional absolute
/// expiry
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: Value,
    pub expiry: Option<DateTime<Utc>>,
}

impl Entry {
    pub const fn new(value: Value) -> Self {
        Entry {
            value,
            expiry: None,
        }
    }
    pub fn with_expiry(value: Value, expiry: Option<DateTime<Utc>>) -> Self {
        Entry { value, expiry }
    }
    /// Turn a relative TTL in milliseconds into an absolute expiry
    pub fn expiry_in_ms(ttl_ms: u64) -> DateTime<Utc> {
        Utc::now() + Duration::milliseconds(ttl_ms as i64)
    }
    /// Has the expiry passed?
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(at) => Utc::now() > at,
            None => false,
        }
    }
    pub const fn key_type(&self) -> KeyType {
        match self.value {
            Value::Str(_) => KeyType::Str,
            Value::List(_) => KeyType::List,
            Value::Stream(_) => KeyType::Stream,
        }
    }
}
