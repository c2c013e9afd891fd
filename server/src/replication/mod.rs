/*
 * Created on Fri Feb 23 2024
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

//! # Replication state
//!
//! A primary keeps a registry of follower links and a byte offset counting
//! the cumulative size of every propagated frame. A follower keeps the
//! primary's address and the number of propagated bytes it has applied. The
//! registry and the offset share one reader/writer lock; the per-follower
//! socket has its own async mutex so that propagation holds no shared lock
//! across a write.

pub mod follower;

use crate::corestore::Data;
use crate::resp::writer::encode_array;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

/// How often `WAIT` re-reads follower acknowledgements
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The role this process plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Primary,
    Follower { host: String, port: u16 },
}

/// One attached follower link on the primary side
pub struct FollowerHandle {
    id: u64,
    addr: String,
    sock: AsyncMutex<OwnedWriteHalf>,
    connected: AtomicBool,
    acked: AtomicU64,
    last_ack: Mutex<DateTime<Utc>>,
}

impl FollowerHandle {
    pub fn addr(&self) -> &str {
        &self.addr
    }
    /// Record a `REPLCONF ack` from this follower
    pub fn record_ack(&self, offset: u64) {
        self.acked.store(offset, Ordering::Relaxed);
        *self.last_ack.lock() = Utc::now();
    }
}

/// A row of `INFO` output: one follower's link status
pub struct FollowerInfo {
    pub addr: String,
    pub acked: u64,
    pub lag: i64,
    /// Seconds since the last acknowledgement
    pub idle_s: i64,
}

struct ReplInner {
    offset: u64,
    next_follower_id: u64,
    followers: Vec<Arc<FollowerHandle>>,
}

struct ReplShared {
    role: Role,
    replid: String,
    inner: RwLock<ReplInner>,
    /// Follower side: propagated bytes applied so far
    applied: AtomicU64,
}

/// An atomic reference to the process-wide replication state
#[derive(Clone)]
pub struct ReplicationState {
    shared: Arc<ReplShared>,
}

/// A fresh 40-hex-character replication identifier
fn generate_replid() -> String {
    let mut hex = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    hex.truncate(40);
    hex
}

impl ReplicationState {
    pub fn new(role: Role) -> Self {
        ReplicationState {
            shared: Arc::new(ReplShared {
                role,
                replid: generate_replid(),
                inner: RwLock::new(ReplInner {
                    offset: 0,
                    next_follower_id: 0,
                    followers: Vec::new(),
                }),
                applied: AtomicU64::new(0),
            }),
        }
    }
    pub fn new_primary() -> Self {
        Self::new(Role::Primary)
    }
    pub fn is_primary(&self) -> bool {
        self.shared.role == Role::Primary
    }
    pub fn role_name(&self) -> &'static str {
        match self.shared.role {
            Role::Primary => "master",
            Role::Follower { .. } => "slave",
        }
    }
    pub fn primary_addr(&self) -> Option<(String, u16)> {
        match &self.shared.role {
            Role::Primary => None,
            Role::Follower { host, port } => Some((host.clone(), *port)),
        }
    }
    pub fn replid(&self) -> &str {
        &self.shared.replid
    }
    pub fn offset(&self) -> u64 {
        self.shared.inner.read().offset
    }
    pub fn applied_offset(&self) -> u64 {
        self.shared.applied.load(Ordering::Relaxed)
    }
    pub fn add_applied(&self, bytes: u64) -> u64 {
        self.shared.applied.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    /// Promote a client connection's write half into a follower link
    pub fn register_follower(&self, addr: String, sock: OwnedWriteHalf) -> Arc<FollowerHandle> {
        let mut inner = self.shared.inner.write();
        inner.next_follower_id += 1;
        let handle = Arc::new(FollowerHandle {
            id: inner.next_follower_id,
            addr,
            sock: AsyncMutex::new(sock),
            connected: AtomicBool::new(true),
            acked: AtomicU64::new(0),
            last_ack: Mutex::new(Utc::now()),
        });
        inner.followers.push(handle.clone());
        log::info!("follower {} attached", handle.addr);
        handle
    }

    /// Drop a follower link. Idempotent
    pub fn deregister_follower(&self, handle: &FollowerHandle) {
        handle.connected.store(false, Ordering::Relaxed);
        let mut inner = self.shared.inner.write();
        inner.followers.retain(|f| f.id != handle.id);
    }

    pub fn follower_count(&self) -> usize {
        self.shared.inner.read().followers.len()
    }

    pub fn follower_info(&self) -> Vec<FollowerInfo> {
        let inner = self.shared.inner.read();
        inner
            .followers
            .iter()
            .map(|f| {
                let acked = f.acked.load(Ordering::Relaxed);
                FollowerInfo {
                    addr: f.addr.clone(),
                    acked,
                    lag: inner.offset as i64 - acked as i64,
                    idle_s: (Utc::now() - *f.last_ack.lock()).num_seconds(),
                }
            })
            .collect()
    }

    /// Encode a write command once, advance the offset by the frame size and
    /// append the frame to every attached follower socket. A link that fails
    /// its write is deregistered; the originating client is unaffected
    pub async fn propagate(&self, args: &[Data]) {
        let frame = encode_array(args);
        let followers = {
            let mut inner = self.shared.inner.write();
            inner.offset += frame.len() as u64;
            if inner.followers.is_empty() {
                return;
            }
            inner.followers.clone()
        };
        for follower in followers {
            if !follower.connected.load(Ordering::Relaxed) {
                continue;
            }
            let failed = {
                let mut sock = follower.sock.lock().await;
                sock.write_all(&frame).await.is_err()
            };
            if failed {
                log::warn!("propagation to follower {} failed, dropping it", follower.addr);
                self.deregister_follower(&follower);
            }
        }
    }

    /// `WAIT`: poll until at least `want` followers have acknowledged the
    /// offset observed at entry, or the deadline passes. A zero timeout polls
    /// without a deadline
    pub async fn wait_for_acks(&self, want: usize, timeout_ms: u64) -> usize {
        let target = self.offset();
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let acked = {
                let inner = self.shared.inner.read();
                inner
                    .followers
                    .iter()
                    .filter(|f| f.acked.load(Ordering::Relaxed) >= target)
                    .count()
            };
            if acked >= want {
                return acked;
            }
            if timeout_ms != 0 && Instant::now() >= deadline {
                return acked;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv;

    #[test]
    fn replid_shape() {
        let id = generate_replid();
        assert_eq!(id.len(), 40);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(id, generate_replid());
    }

    #[tokio::test]
    async fn offset_counts_encoded_frame_bytes() {
        let repl = ReplicationState::new_primary();
        let args = argv!["SET", "a", "1"];
        let frame_len = encode_array(&args).len() as u64;
        repl.propagate(&args).await;
        repl.propagate(&args).await;
        assert_eq!(repl.offset(), frame_len * 2);
    }

    #[tokio::test]
    async fn wait_returns_immediately_without_followers() {
        let repl = ReplicationState::new_primary();
        assert_eq!(repl.wait_for_acks(0, 1000).await, 0);
        repl.propagate(&argv!["SET", "a", "1"]).await;
        // zero followers can never ack a non-zero target
        assert_eq!(repl.wait_for_acks(1, 10).await, 0);
    }

    #[tokio::test]
    async fn propagation_reaches_a_registered_follower() {
        use tokio::io::AsyncReadExt;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (outbound, inbound) = tokio::join!(
            tokio::net::TcpStream::connect(addr),
            listener.accept()
        );
        let (mut inbound, _) = inbound.unwrap();
        let (_read, write) = outbound.unwrap().into_split();

        let repl = ReplicationState::new_primary();
        let follower = repl.register_follower("test-follower".to_owned(), write);
        assert_eq!(repl.follower_count(), 1);

        let args = argv!["SET", "a", "1"];
        let frame = encode_array(&args);
        repl.propagate(&args).await;
        let mut got = vec![0u8; frame.len()];
        inbound.read_exact(&mut got).await.unwrap();
        assert_eq!(got, frame);

        // the follower's ack catches it up and WAIT sees that
        follower.record_ack(frame.len() as u64);
        let info = repl.follower_info();
        assert_eq!(info[0].lag, 0);
        assert_eq!(repl.wait_for_acks(1, 1000).await, 1);

        repl.deregister_follower(&follower);
        assert_eq!(repl.follower_count(), 0);
        repl.deregister_follower(&follower); // idempotent
    }

    #[test]
    fn role_queries() {
        let primary = ReplicationState::new_primary();
        assert!(primary.is_primary());
        assert_eq!(primary.role_name(), "master");
        assert_eq!(primary.primary_addr(), None);
        let follower = ReplicationState::new(Role::Follower {
            host: "127.0.0.1".to_owned(),
            port: 7000,
        });
        assert!(!follower.is_primary());
        assert_eq!(follower.role_name(), "slave");
        assert_eq!(
            follower.primary_addr(),
            Some(("127.0.0.1".to_owned(), 7000))
        );
    }
}
