/*
 * Created on Tue Feb 27 2024
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

//! # Database networking
//!
//! The listener, the per-session run loop and the `PSYNC` promotion path.
//! Each accepted socket gets its own task holding a [`ConnectionHandler`];
//! a handler that receives `PSYNC` stops being a request/reply session and
//! becomes a one-way follower link plus an inbound ACK reader.

pub mod connection;
mod tcp;

pub use tcp::Listener;

use self::connection::{Connection, QueryResult};
use crate::actions::ActionError;
use crate::diskstore;
use crate::protocol::{ParseError, Parser};
use crate::queryengine::{self, Services, Session};
use crate::resp::Response;
use bytes::Buf;
use std::io::Result as IoResult;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time;

/// The maximum number of concurrent client connections
pub const MAXIMUM_CONNECTION_LIMIT: usize = 50000;

/// A watcher for the process-wide termination signal
pub struct Terminator {
    terminate: bool,
    signal: broadcast::Receiver<()>,
}

impl Terminator {
    pub fn new(signal: broadcast::Receiver<()>) -> Self {
        Terminator {
            terminate: false,
            signal,
        }
    }
    pub const fn is_termination_signal(&self) -> bool {
        self.terminate
    }
    pub async fn receive_signal(&mut self) {
        let _ = self.signal.recv().await;
        self.terminate = true;
    }
}

/// A backoff implementation that is meant to be used in connection loops
pub(self) struct NetBackoff {
    c: AtomicU8,
}

impl NetBackoff {
    /// The maximum backoff duration
    const MAX_BACKOFF: u8 = 64;
    pub const fn new() -> Self {
        Self {
            c: AtomicU8::new(1),
        }
    }
    /// Wait for the current backoff duration
    pub async fn spin(&self) {
        let c = self.c.load(Ordering::Relaxed);
        time::sleep(Duration::from_secs(c as _)).await;
        self.c.store(c << 1, Ordering::Relaxed);
    }
    /// Should we give up on the stream?
    pub fn should_disconnect(&self) -> bool {
        self.c.load(Ordering::Relaxed) > Self::MAX_BACKOFF
    }
}

/// The base TCP listener
pub struct BaseListener {
    /// The shared service handles
    pub svc: Services,
    /// The incoming connection listener (binding)
    pub listener: TcpListener,
    /// The connection limit
    pub climit: Arc<Semaphore>,
    /// The shutdown broadcaster
    pub signal: broadcast::Sender<()>,
    // when all `Sender`s are dropped the `Receiver` unblocks; every handler
    // task carries a clone of `terminate_tx`
    pub terminate_tx: mpsc::Sender<()>,
    pub terminate_rx: mpsc::Receiver<()>,
}

impl BaseListener {
    pub async fn init(
        svc: &Services,
        host: IpAddr,
        port: u16,
        maxcon: usize,
        signal: broadcast::Sender<()>,
    ) -> IoResult<Self> {
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self {
            svc: svc.clone(),
            listener,
            climit: Arc::new(Semaphore::new(maxcon)),
            signal,
            terminate_tx,
            terminate_rx,
        })
    }
    /// Wait for every live handler to drop its termination sender
    pub async fn release_self(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}

/// Initialize the database networking
pub async fn connect(
    svc: &Services,
    host: IpAddr,
    port: u16,
    maxcon: usize,
    signal: broadcast::Sender<()>,
) -> IoResult<Listener> {
    let base = BaseListener::init(svc, host, port, maxcon, signal).await?;
    log::info!("Server started on {host}:{port}");
    Ok(Listener::new(base))
}

/// A generic connection handler: read a request, dispatch it, render the
/// reply, propagate writes
pub struct ConnectionHandler {
    svc: Services,
    con: Connection,
    session: Session,
    terminator: Terminator,
    _permit: OwnedSemaphorePermit,
    _term_sig_tx: mpsc::Sender<()>,
}

impl ConnectionHandler {
    pub fn new(
        svc: Services,
        con: Connection,
        terminator: Terminator,
        permit: OwnedSemaphorePermit,
        term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            svc,
            con,
            session: Session::new(),
            terminator,
            _permit: permit,
            _term_sig_tx: term_sig_tx,
        }
    }

    pub async fn run(mut self) -> IoResult<()> {
        log::debug!("ConnectionHandler initialized to handle a remote client");
        while !self.terminator.is_termination_signal() {
            let try_query = tokio::select! {
                query = self.con.read_query() => query,
                _ = self.terminator.receive_signal() => {
                    return Ok(());
                }
            };
            match try_query? {
                QueryResult::Q(query) => {
                    if query.args.is_empty() {
                        // an empty inline line; nothing to do
                        continue;
                    }
                    let verb = String::from_utf8_lossy(&query.args[0]).to_uppercase();
                    if verb == "PSYNC" {
                        // the socket stops being a client session here
                        return self.promote_to_follower_link().await;
                    }
                    let queued = self.session.will_queue(&verb);
                    let response =
                        match queryengine::execute(&self.svc, &mut self.session, &query.args)
                            .await
                        {
                            Ok(response) => response,
                            Err(ActionError::ActionError(response)) => response,
                            Err(ActionError::IoError(e)) => return Err(e),
                        };
                    self.con.write_response(&response).await?;
                    self.con.flush().await?;
                    // propagation strictly follows the client's reply
                    if !queued
                        && !response.is_error()
                        && self.svc.repl.is_primary()
                        && queryengine::is_write_action(&verb)
                    {
                        self.svc.repl.propagate(&query.args).await;
                    }
                }
                QueryResult::E(err) => {
                    log::debug!("failed to read query");
                    self.con.write_raw(err).await?;
                    self.con.flush().await?;
                    return Ok(());
                }
                QueryResult::Disconnected => return Ok(()),
            }
        }
        Ok(())
    }

    /// `PSYNC`: reply with a full resync grant and the dataset bulk, then
    /// register the write half as a follower link and keep reading ACKs off
    /// the read half until the peer goes away
    async fn promote_to_follower_link(mut self) -> IoResult<()> {
        let repl = self.svc.repl.clone();
        let grant = Response::SimpleOwned(format!(
            "FULLRESYNC {} {}",
            repl.replid(),
            repl.offset()
        ));
        self.con.write_response(&grant).await?;
        // the snapshot bulk carries no trailing CRLF after its payload
        let header = format!("${}\r\n", diskstore::EMPTY_SNAPSHOT.len());
        self.con.write_raw(header.as_bytes()).await?;
        self.con.write_raw(diskstore::EMPTY_SNAPSHOT).await?;
        self.con.flush().await?;

        let (stream, mut buffer) = self.con.into_parts();
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        let (mut read_half, write_half) = stream.into_split();
        let follower = repl.register_follower(peer, write_half);

        let mut terminator = self.terminator;
        loop {
            match Parser::parse(&buffer) {
                Ok((query, advance)) => {
                    buffer.advance(advance);
                    record_follower_ack(&follower, &query.args);
                    continue;
                }
                Err(ParseError::NotEnough) => (),
                Err(_) => break,
            }
            let read = tokio::select! {
                read = read_half.read_buf(&mut buffer) => read,
                _ = terminator.receive_signal() => break,
            };
            match read {
                Ok(0) | Err(_) => break,
                Ok(_) => (),
            }
        }
        log::info!("follower {} detached", follower.addr());
        repl.deregister_follower(&follower);
        Ok(())
    }
}

/// The only frames a follower sends upstream are `REPLCONF ACK <offset>`
fn record_follower_ack(follower: &crate::replication::FollowerHandle, args: &[crate::corestore::Data]) {
    if args.len() == 3 && args[0].eq_ignore_ascii_case(b"REPLCONF") && args[1].eq_ignore_ascii_case(b"ACK")
    {
        if let Some(offset) = core::str::from_utf8(&args[2]).ok().and_then(|s| s.parse().ok()) {
            follower.record_ack(offset);
        }
    } else {
        log::debug!("unexpected frame on a follower link");
    }
}
