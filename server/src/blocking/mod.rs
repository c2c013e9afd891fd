/*
 * Created on Sat Feb 17 2024
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

//! # The blocking broker
//!
//! Two independent waiter registries: one for blocking list pops, one for
//! blocking stream reads. A waiter is parked on a one-shot channel and is
//! registered under every key it watches; write handlers call the notify
//! methods *after* releasing the store lock, and the notify path reacquires
//! the lock to pop or read on behalf of each waiter, in registration order.
//!
//! There is deliberately no hand-off lock between a write and the wake-up it
//! triggers: a racing non-blocking client may take the value first.

use crate::corestore::stream::{StreamEntry, StreamId};
use crate::corestore::{Coretable, Data};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// What a satisfied list waiter receives: the key that fired and the element
pub type ListWake = (Data, Data);
/// What a satisfied stream waiter receives: the stream that fired and the
/// entries read past its registration identifier
pub type StreamWake = (Data, Vec<StreamEntry>);

/// A client parked in `BLPOP`/`BRPOP`
pub struct ListWaiter {
    id: u64,
    pub keys: Vec<Data>,
    pub from_head: bool,
    tx: Mutex<Option<oneshot::Sender<ListWake>>>,
}

/// A client parked in a blocking `XREAD`. `$` identifiers were resolved to
/// the stream's last identifier before this record was created
pub struct StreamWaiter {
    id: u64,
    pub items: Vec<(Data, StreamId)>,
    pub count: Option<usize>,
    tx: Mutex<Option<oneshot::Sender<StreamWake>>>,
}

struct Registry<W> {
    next_id: u64,
    table: HashMap<Data, Vec<Arc<W>>>,
}

impl<W> Registry<W> {
    fn new() -> Self {
        Registry {
            next_id: 0,
            table: HashMap::new(),
        }
    }
    fn insert(&mut self, keys: &[Data], waiter: &Arc<W>) {
        for key in keys {
            self.table
                .entry(key.clone())
                .or_default()
                .push(waiter.clone());
        }
    }
    fn remove(&mut self, keys: &[Data], id: u64, id_of: impl Fn(&W) -> u64) {
        for key in keys {
            if let Some(waiters) = self.table.get_mut(key) {
                waiters.retain(|w| id_of(w) != id);
                if waiters.is_empty() {
                    self.table.remove(key);
                }
            }
        }
    }
    fn snapshot(&self, key: &Data) -> Vec<Arc<W>> {
        self.table.get(key).cloned().unwrap_or_default()
    }
}

pub struct ListWaiterTable {
    inner: Mutex<Registry<ListWaiter>>,
}

pub struct StreamWaiterTable {
    inner: Mutex<Registry<StreamWaiter>>,
}

impl ListWaiterTable {
    pub fn new() -> Self {
        ListWaiterTable {
            inner: Mutex::new(Registry::new()),
        }
    }
}

impl StreamWaiterTable {
    pub fn new() -> Self {
        StreamWaiterTable {
            inner: Mutex::new(Registry::new()),
        }
    }
}

impl Coretable {
    /// Park a list waiter under each of its keys. The caller should first try
    /// an immediate pop; this only records the wait
    pub fn register_list_waiter(
        &self,
        keys: Vec<Data>,
        from_head: bool,
    ) -> (Arc<ListWaiter>, oneshot::Receiver<ListWake>) {
        let (tx, rx) = oneshot::channel();
        let mut registry = self.list_waiters.inner.lock();
        registry.next_id += 1;
        let waiter = Arc::new(ListWaiter {
            id: registry.next_id,
            keys,
            from_head,
            tx: Mutex::new(Some(tx)),
        });
        registry.insert(&waiter.keys, &waiter);
        (waiter, rx)
    }

    /// Remove a waiter from every key it was registered under. Idempotent
    pub fn deregister_list_waiter(&self, waiter: &ListWaiter) {
        let mut registry = self.list_waiters.inner.lock();
        registry.remove(&waiter.keys, waiter.id, |w| w.id);
    }

    /// Called after a list push: walk the waiters parked on `key` in
    /// registration order, popping on behalf of each until a pop comes up
    /// empty
    pub fn notify_list_push(&self, key: &Data) {
        let waiters = self.list_waiters.inner.lock().snapshot(key);
        for waiter in waiters {
            if waiter.tx.lock().is_none() {
                // already satisfied or timed out; registration cleanup races
                // are harmless
                continue;
            }
            let popped = match self.pop_first_of(&waiter.keys, waiter.from_head) {
                Some(popped) => popped,
                None => break,
            };
            if let Some(tx) = waiter.tx.lock().take() {
                let _ = tx.send(popped);
            }
            self.deregister_list_waiter(&waiter);
        }
    }

    pub fn register_stream_waiter(
        &self,
        items: Vec<(Data, StreamId)>,
        count: Option<usize>,
    ) -> (Arc<StreamWaiter>, oneshot::Receiver<StreamWake>) {
        let (tx, rx) = oneshot::channel();
        let mut registry = self.stream_waiters.inner.lock();
        registry.next_id += 1;
        let keys: Vec<Data> = items.iter().map(|(key, _)| key.clone()).collect();
        let waiter = Arc::new(StreamWaiter {
            id: registry.next_id,
            items,
            count,
            tx: Mutex::new(Some(tx)),
        });
        registry.insert(&keys, &waiter);
        (waiter, rx)
    }

    pub fn deregister_stream_waiter(&self, waiter: &StreamWaiter) {
        let keys: Vec<Data> = waiter.items.iter().map(|(key, _)| key.clone()).collect();
        let mut registry = self.stream_waiters.inner.lock();
        registry.remove(&keys, waiter.id, |w| w.id);
    }

    /// Called after a stream append: every waiter parked on `key` whose
    /// read-after identifier now has entries behind it is woken with a
    /// single-stream result set
    pub fn notify_stream_add(&self, key: &Data) {
        let waiters = self.stream_waiters.inner.lock().snapshot(key);
        for waiter in waiters {
            if waiter.tx.lock().is_none() {
                continue;
            }
            let after = match waiter.items.iter().find(|(k, _)| k == key) {
                Some((_, after)) => *after,
                None => continue,
            };
            let entries = match self.stream_read_from(key, after, waiter.count) {
                Ok(entries) if !entries.is_empty() => entries,
                _ => continue,
            };
            if let Some(tx) = waiter.tx.lock().take() {
                let _ = tx.send((key.clone(), entries));
            }
            self.deregister_stream_waiter(&waiter);
        }
    }
}
