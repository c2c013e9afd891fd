/*
 * Created on Mon Feb 12 2024
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

//! Pre-compiled responses and error texts, which are only used by the `server`

pub mod groups {
    #![allow(unused)]
    //! # Pre-compiled **complete** responses
    //! These are full frames and should be written to the stream as-is

    /// A `+OK` simple string response
    pub const OKAY: &[u8] = b"+OK\r\n";
    /// A `+PONG` simple string response
    pub const PONG: &[u8] = b"+PONG\r\n";
    /// The acknowledgement for a command queued in a transaction
    pub const QUEUED: &[u8] = b"+QUEUED\r\n";
    /// The null bulk string
    pub const NIL_BULK: &[u8] = b"$-1\r\n";
    /// The null array
    pub const NIL_ARRAY: &[u8] = b"*-1\r\n";
    /// The empty array
    pub const EMPTY_ARRAY: &[u8] = b"*0\r\n";
    /// A complete packet error response
    pub const PACKET_ERR: &[u8] = b"-ERR Protocol error\r\n";
}

pub mod errors {
    #![allow(unused)]
    //! # Error **texts**
    //! These are the message payloads of `-<kind> <message>` error frames;
    //! the leading `-` and the trailing CRLF are added at write time

    /// An operation was applied to a key of the wrong kind
    pub const WRONGTYPE: &str =
        "WRONGTYPE Operation against a key holding the wrong kind of value";
    /// A value failed to parse as a signed 64-bit integer
    pub const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";
    /// Counter arithmetic crossed a 64-bit bound
    pub const OVERFLOW: &str = "ERR increment or decrement would overflow";
    /// `INCRBY` keeps the historical restriction to positive deltas
    pub const INCR_NEGATIVE: &str = "ERR increment amount must be positive";
    /// Invalid `EX` argument to `SET`
    pub const INVALID_EXPIRE: &str = "ERR invalid expire time in 'set' command";
    /// A malformed stream identifier
    pub const BAD_STREAM_ID: &str =
        "ERR Invalid stream ID specified as stream command argument";
    /// A stream identifier at or below the stream top
    pub const STREAM_ID_TOO_SMALL: &str =
        "ERR The ID specified in XADD is equal or smaller than the target stream top item";
    /// The reserved `0-0` stream identifier
    pub const STREAM_ID_RESERVED: &str =
        "ERR The ID specified in XADD must be greater than 0-0";
    /// An out-of-range or non-positive count argument
    pub const BAD_COUNT: &str = "ERR value is out of range, must be positive";
    /// A bad timeout argument to a blocking command
    pub const BAD_TIMEOUT: &str = "ERR timeout is not a float or out of range";
    /// `MULTI` inside a transaction
    pub const MULTI_NESTED: &str = "ERR MULTI calls can not be nested";
    /// `EXEC` with no open transaction
    pub const EXEC_WITHOUT_MULTI: &str = "ERR EXEC without MULTI";
    /// `DISCARD` with no open transaction
    pub const DISCARD_WITHOUT_MULTI: &str = "ERR DISCARD without MULTI";
    /// `UNDO` with no open transaction
    pub const UNDO_WITHOUT_MULTI: &str = "ERR UNDO without MULTI";
    /// `UNDO` asked to drop more commands than are queued
    pub const UNDO_TOO_MANY: &str =
        "ERR UNDO count is greater than the number of queued commands";
    /// `CONFIG SET` is not a thing here
    pub const CONFIG_SET_UNSUPPORTED: &str = "ERR CONFIG SET is not supported";
    /// `WAIT` numreplicas validation
    pub const WAIT_BAD_NUMREPLICAS: &str =
        "ERR invalid first argument. The number of replicas must be >= 0";
    /// `WAIT` timeout validation
    pub const WAIT_BAD_TIMEOUT: &str =
        "ERR invalid second argument. The timeout must be >= 0";
}

/// `-ERR wrong number of arguments for '<verb>' command`
pub fn wrongargs(verb: &str) -> String {
    format!(
        "ERR wrong number of arguments for '{}' command",
        verb.to_lowercase()
    )
}

/// `-ERR unknown command '<verb>'`
pub fn unknown_command(verb: &str) -> String {
    format!("ERR unknown command '{verb}'")
}
