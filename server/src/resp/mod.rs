/*
 * Created on Tue Feb 13 2024
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

//! Utilities for generating responses, which are only used by the `server`
//!
//! Every action produces a [`Response`]: a structured value that is rendered
//! into wire bytes exactly once, either straight onto the client's stream or
//! into the reply buffer of an `EXEC`. This is what lets a transaction capture
//! the first reply of each queued command without a fake socket.

pub mod writer;

use crate::corestore::Data;

#[derive(Debug, PartialEq, Clone)]
/// A structured reply
pub enum Response {
    /// A simple string (`+...`) with a static payload
    Simple(&'static str),
    /// A simple string with a computed payload
    SimpleOwned(String),
    /// An error (`-...`) with a static message
    Error(&'static str),
    /// An error with a computed message
    ErrorOwned(String),
    /// A signed 64-bit integer (`:n`)
    Integer(i64),
    /// A bulk string
    Bulk(Data),
    /// The null bulk string (`$-1`)
    NullBulk,
    /// An array of replies
    Array(Vec<Response>),
    /// The null array (`*-1`)
    NullArray,
    /// Nothing at all. Produced on the follower link and substituted with
    /// `+OK` when captured inside an `EXEC`
    None,
}

impl Response {
    /// An `+OK` reply
    pub const fn okay() -> Self {
        Response::Simple("OK")
    }
    /// Is this an error reply? Write-propagation is skipped for these
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_) | Response::ErrorOwned(_))
    }
    /// Render this response into a fresh byte buffer
    pub fn into_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        writer::write_response(self, &mut buf);
        buf
    }
}

impl From<i64> for Response {
    fn from(v: i64) -> Self {
        Response::Integer(v)
    }
}

impl From<usize> for Response {
    fn from(v: usize) -> Self {
        Response::Integer(v as i64)
    }
}

impl From<Data> for Response {
    fn from(v: Data) -> Self {
        Response::Bulk(v)
    }
}

impl From<Option<Data>> for Response {
    fn from(v: Option<Data>) -> Self {
        match v {
            Some(data) => Response::Bulk(data),
            None => Response::NullBulk,
        }
    }
}
