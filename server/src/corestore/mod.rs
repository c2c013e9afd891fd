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

//! # The core in-memory store
//!
//! [`Corestore`] is the cheap-clone handle that every session task holds. It
//! wraps the [`Coretable`]: one reader/writer-locked map from keys to typed
//! values, plus the waiter registries of the blocking broker. All value
//! operations are bounded and synchronous; nothing here ever suspends while
//! the map lock is held.

pub mod buffers;
pub mod stream;
mod value;

use crate::blocking::{ListWaiterTable, StreamWaiterTable};
use bytes::Bytes;
use core::borrow::Borrow;
use core::fmt;
use core::ops::Deref;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;


pub use value::{Entry, KeyType, Value};

mod kv;
pub use kv::CounterError;

/// A wrapper for `Bytes`: the key and value blob type used across the store
#[derive(Clone, PartialEq, Hash)]
pub struct Data {
    /// The blob of data
    blob: Bytes,
}

impl Data {
    /// Create a new blob from a string
    pub fn from_string(val: String) -> Self {
        Data {
            blob: Bytes::from(val.into_bytes()),
        }
    }
    pub fn copy_from_slice(slice: &[u8]) -> Self {
        Self {
            blob: Bytes::copy_from_slice(slice),
        }
    }
}

impl Eq for Data {}

impl PartialEq<str> for Data {
    fn eq(&self, oth: &str) -> bool {
        self.blob.eq(oth)
    }
}

impl Deref for Data {
    type Target = [u8];
    fn deref(&self) -> &<Self>::Target {
        &self.blob
    }
}

impl Borrow<[u8]> for Data {
    fn borrow(&self) -> &[u8] {
        self.blob.borrow()
    }
}

impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        &self.blob
    }
}

impl<T> From<T> for Data
where
    T: Into<Bytes>,
{
    fn from(dat: T) -> Self {
        Self { blob: dat.into() }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.blob))
    }
}

/// An atomic reference to the shared in-memory state
#[derive(Clone)]
pub struct Corestore {
    shared: Arc<Coretable>,
}

/// The shared state: the value map and the blocking broker registries
pub struct Coretable {
    /// The keyspace. Reads take the shared lock; every mutation, including a
    /// lazy-expiry removal triggered by a read path, takes the exclusive lock
    pub(crate) map: RwLock<HashMap<Data, Entry>>,
    /// Clients parked in a blocking list pop
    pub(crate) list_waiters: ListWaiterTable,
    /// Clients parked in a blocking stream read
    pub(crate) stream_waiters: StreamWaiterTable,
}

impl Corestore {
    pub fn new() -> Self {
        Corestore {
            shared: Arc::new(Coretable {
                map: RwLock::new(HashMap::new()),
                list_waiters: ListWaiterTable::new(),
                stream_waiters: StreamWaiterTable::new(),
            }),
        }
    }
}

impl Default for Corestore {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Corestore {
    type Target = Coretable;
    fn deref(&self) -> &Coretable {
        &self.shared
    }
}
