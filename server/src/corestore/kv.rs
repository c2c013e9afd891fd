/*
 * Created on Thu Feb 15 2024
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

//! String, list and counter operations on the [`Coretable`]
//!
//! Every operation here takes the map lock, does a bounded amount of work and
//! returns before the caller can suspend. Wrong-type outcomes are reported to
//! the caller as values, never by panicking.

use super::value::{Entry, KeyType, Value};
use super::{Coretable, Data};
use chrono::{DateTime, Utc};

/// Why a counter operation failed
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CounterError {
    WrongType,
    NotAnInteger,
    Overflow,
}

impl Coretable {
    /// Run a closure against a live (present and unexpired) entry under the
    /// shared lock. If the entry turns out to be expired, the exclusive lock
    /// is taken instead and the record is removed
    fn with_live_entry<T>(&self, key: &[u8], f: impl FnOnce(&Entry) -> T) -> Option<T> {
        {
            let map = self.map.read();
            match map.get(key) {
                Some(entry) if !entry.is_expired() => return Some(f(entry)),
                Some(_) => (),
                None => return None,
            }
        }
        // lazy expiration path
        let mut map = self.map.write();
        if map.get(key).map_or(false, Entry::is_expired) {
            map.remove(key);
        }
        None
    }

    /// Replace whatever `key` holds with a string value. A `ttl_ms` of `Some`
    /// sets a fresh absolute expiry; `None` clears any previous one
    pub fn set(&self, key: Data, value: Data, ttl_ms: Option<u64>) {
        let expiry = ttl_ms.map(Entry::expiry_in_ms);
        self.map
            .write()
            .insert(key, Entry::with_expiry(Value::Str(value), expiry));
    }

    /// Returns the string at `key`. Absent, expired and wrong-typed keys all
    /// read as "not found"; callers that care about the type ask for it first
    pub fn get(&self, key: &[u8]) -> Option<Data> {
        self.with_live_entry(key, |entry| match &entry.value {
            Value::Str(data) => Some(data.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn delete(&self, key: &[u8]) -> bool {
        let mut map = self.map.write();
        match map.remove(key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        }
    }

    pub fn key_type(&self, key: &[u8]) -> KeyType {
        self.with_live_entry(key, Entry::key_type)
            .unwrap_or(KeyType::None)
    }

    /// Push elements onto the list at `key`, creating it if absent and
    /// resetting it if expired. Head pushes prepend one at a time, so the
    /// final head order is the reverse of the argument order. Returns the new
    /// length
    pub fn list_push(
        &self,
        key: &Data,
        elements: Vec<Data>,
        at_head: bool,
    ) -> Result<usize, ()> {
        let mut map = self.map.write();
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Value::List(Vec::new())));
        if entry.is_expired() {
            *entry = Entry::new(Value::List(Vec::new()));
        }
        let list = match &mut entry.value {
            Value::List(list) => list,
            _ => return Err(()),
        };
        if at_head {
            for element in elements {
                list.insert(0, element);
            }
        } else {
            list.extend(elements);
        }
        Ok(list.len())
    }

    /// Pop up to `n` elements. Tail pops are returned most-recently-appended
    /// first. An absent, expired or empty list pops nothing; the record of an
    /// emptied list is left in place
    pub fn list_pop_n(&self, key: &[u8], n: usize, from_head: bool) -> Result<Vec<Data>, ()> {
        let mut map = self.map.write();
        let entry = match map.get_mut(key) {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };
        if entry.is_expired() {
            map.remove(key);
            return Ok(Vec::new());
        }
        let list = match &mut entry.value {
            Value::List(list) => list,
            _ => return Err(()),
        };
        let n = n.min(list.len());
        let mut popped = Vec::with_capacity(n);
        for _ in 0..n {
            if from_head {
                popped.push(list.remove(0));
            } else {
                // unwrap safe: bounded by the length check above
                popped.push(list.pop().unwrap());
            }
        }
        Ok(popped)
    }

    pub fn list_len(&self, key: &[u8]) -> Result<usize, ()> {
        self.with_live_entry(key, |entry| match &entry.value {
            Value::List(list) => Ok(list.len()),
            _ => Err(()),
        })
        .unwrap_or(Ok(0))
    }

    /// Indexed read with negative-from-the-end semantics
    pub fn list_index(&self, key: &[u8], index: i64) -> Result<Option<Data>, ()> {
        self.with_live_entry(key, |entry| match &entry.value {
            Value::List(list) => {
                let len = list.len() as i64;
                let index = if index < 0 { len + index } else { index };
                if index < 0 || index >= len {
                    Ok(None)
                } else {
                    Ok(Some(list[index as usize].clone()))
                }
            }
            _ => Err(()),
        })
        .unwrap_or(Ok(None))
    }

    /// Inclusive range read, clamped to the list bounds. An absent key reads
    /// as the empty list
    pub fn list_range(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Data>, ()> {
        self.with_live_entry(key, |entry| match &entry.value {
            Value::List(list) => {
                let len = list.len() as i64;
                let mut start = if start < 0 { len + start } else { start };
                let mut stop = if stop < 0 { len + stop } else { stop };
                start = start.max(0);
                stop = stop.min(len - 1);
                if start > stop || len == 0 {
                    Ok(Vec::new())
                } else {
                    Ok(list[start as usize..=stop as usize].to_vec())
                }
            }
            _ => Err(()),
        })
        .unwrap_or(Ok(Vec::new()))
    }

    /// Pop a single element from the first non-empty list among `keys`,
    /// scanning left to right. This is the immediate phase of a blocking pop,
    /// run on behalf of both fresh callers and woken waiters
    pub fn pop_first_of(&self, keys: &[Data], from_head: bool) -> Option<(Data, Data)> {
        let mut map = self.map.write();
        for key in keys {
            let entry = match map.get_mut(key.as_ref() as &[u8]) {
                Some(entry) => entry,
                None => continue,
            };
            if entry.is_expired() {
                map.remove(key.as_ref() as &[u8]);
                continue;
            }
            let list = match &mut entry.value {
                Value::List(list) => list,
                _ => continue,
            };
            if list.is_empty() {
                continue;
            }
            let element = if from_head {
                list.remove(0)
            } else {
                // unwrap safe: non-empty checked above
                list.pop().unwrap()
            };
            return Some((key.clone(), element));
        }
        None
    }

    /// Add `delta` to the integer stored at `key`, treating an absent key as
    /// zero. A zero delta reads (and creates `"0"` on a missing key) without
    /// touching an existing record. Any other successful write replaces the
    /// value with its decimal text and clears the expiry
    pub fn incr_by(&self, key: &Data, delta: i64) -> Result<i64, CounterError> {
        let mut map = self.map.write();
        let current = match map.get(key.as_ref() as &[u8]) {
            Some(entry) if entry.is_expired() => {
                map.remove(key.as_ref() as &[u8]);
                None
            }
            Some(entry) => match &entry.value {
                Value::Str(data) => {
                    let parsed = core::str::from_utf8(data)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok());
                    match parsed {
                        Some(int) => Some(int),
                        None => return Err(CounterError::NotAnInteger),
                    }
                }
                _ => return Err(CounterError::WrongType),
            },
            None => None,
        };
        if delta == 0 {
            return Ok(match current {
                Some(int) => int,
                None => {
                    map.insert(key.clone(), Entry::new(Value::Str(Data::from("0"))));
                    0
                }
            });
        }
        let next = current
            .unwrap_or(0)
            .checked_add(delta)
            .ok_or(CounterError::Overflow)?;
        map.insert(
            key.clone(),
            Entry::new(Value::Str(Data::from_string(next.to_string()))),
        );
        Ok(next)
    }

    // snapshot-load adapters. These bypass wake-ups entirely: nothing can be
    // waiting during a load

    pub fn load_string(&self, key: Data, value: Data, expiry: Option<DateTime<Utc>>) {
        self.map
            .write()
            .insert(key, Entry::with_expiry(Value::Str(value), expiry));
    }

    pub fn load_list(&self, key: Data, elements: Vec<Data>, expiry: Option<DateTime<Utc>>) {
        self.map
            .write()
            .insert(key, Entry::with_expiry(Value::List(elements), expiry));
    }

    pub fn load_empty_list(&self, key: Data, expiry: Option<DateTime<Utc>>) {
        self.load_list(key, Vec::new(), expiry);
    }

    /// Number of live keys (test and INFO helper)
    pub fn len(&self) -> usize {
        self.map.read().len()
    }
}
