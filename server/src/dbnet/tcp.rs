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

use super::{connection::Connection, BaseListener, ConnectionHandler, NetBackoff, Terminator};
use crate::skip_loop_err;
use std::io::Result as IoResult;
use tokio::net::TcpStream;

/// The plain TCP listener
pub struct Listener {
    pub base: BaseListener,
}

impl Listener {
    pub fn new(base: BaseListener) -> Self {
        Self { base }
    }
    /// Accept an incoming connection
    async fn accept(&mut self) -> IoResult<TcpStream> {
        let backoff = NetBackoff::new();
        loop {
            match self.base.listener.accept().await {
                // we don't need the bind address
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    if backoff.should_disconnect() {
                        // too many retries, goodbye
                        return Err(e);
                    }
                }
            }
            // spin to wait out the backoff duration
            backoff.spin().await;
        }
    }
    /// Run the server
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            // the permit rides along with the handler and frees itself when
            // the handler is dropped
            let permit = self
                .base
                .climit
                .clone()
                .acquire_owned()
                .await
                .expect("the connection-limit semaphore is never closed");
            /*
             Ignore any errors that may arise in the accept loop: applying
             the try operator here would take the whole server down, and
             logging each one would flood the log under a connection storm
            */
            let stream = skip_loop_err!(self.accept().await);
            let chandle = ConnectionHandler::new(
                self.base.svc.clone(),
                Connection::new(stream),
                Terminator::new(self.base.signal.subscribe()),
                permit,
                self.base.terminate_tx.clone(),
            );
            tokio::spawn(async move {
                if let Err(e) = chandle.run().await {
                    log::error!("session error: {}", e);
                }
            });
        }
    }
}
