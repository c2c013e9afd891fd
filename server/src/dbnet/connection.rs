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

//! The client connection: a buffered socket that reads whole requests and
//! writes rendered responses

use crate::protocol::{ParseError, Parser, Query};
use crate::resp::Response;
use bytes::{Buf, BytesMut};
use libcrimson::BUF_CAP;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// Result of [`Connection::read_query`]
pub enum QueryResult {
    /// A complete request, ready to run
    Q(Query),
    /// The peer disconnected cleanly between requests
    Disconnected,
    /// The peer sent bytes the grammar cannot accept; this response is
    /// written and the session is closed
    E(&'static [u8]),
}

pub struct Connection {
    pub stream: BufWriter<TcpStream>,
    pub buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(BUF_CAP),
        }
    }

    /// Asynchronously wait until a full request is buffered, then parse it
    /// off the front of the buffer. Half-closing mid-frame is a reset
    pub async fn read_query(&mut self) -> IoResult<QueryResult> {
        loop {
            match Parser::parse(&self.buffer) {
                Ok((query, advance)) => {
                    self.buffer.advance(advance);
                    return Ok(QueryResult::Q(query));
                }
                Err(ParseError::NotEnough) => (),
                Err(_) => return Ok(QueryResult::E(crate::protocol::responses::groups::PACKET_ERR)),
            }
            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(QueryResult::Disconnected);
                }
                return Err(IoError::from(ErrorKind::ConnectionReset));
            }
        }
    }

    pub async fn write_response(&mut self, response: &Response) -> IoResult<()> {
        self.stream.write_all(&response.into_bytes()).await
    }

    /// Raw writes are for pre-compiled responses and for the snapshot bulk,
    /// which is not CRLF-terminated after its payload
    pub async fn write_raw(&mut self, bytes: &[u8]) -> IoResult<()> {
        self.stream.write_all(bytes).await
    }

    pub async fn flush(&mut self) -> IoResult<()> {
        self.stream.flush().await
    }

    /// Tear the connection apart for promotion into a follower link
    pub fn into_parts(self) -> (TcpStream, BytesMut) {
        (self.stream.into_inner(), self.buffer)
    }
}
