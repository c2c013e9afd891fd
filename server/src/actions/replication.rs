/*
 * Created on Thu Feb 22 2024
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

//! # `REPLCONF` and `WAIT` queries
//!
//! `PSYNC` is deliberately absent: it rebuilds the connection into a
//! follower link, so the connection layer owns it.

use crate::actions::ensure_length;
use crate::protocol::responses::errors;
use crate::queryengine::ActionIter;
use crate::replication::ReplicationState;
use crate::resp::Response;

action!(
    /// Handshake chatter. `listening-port` and `capa` are acknowledged;
    /// an `ack` on an ordinary client session carries no reply
    fn replconf(mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 2, "replconf")?;
        // unwrap safe: length checked above
        let sub = act.next().unwrap();
        if sub.eq_ignore_ascii_case(b"listening-port") || sub.eq_ignore_ascii_case(b"capa") {
            Ok(Response::okay())
        } else if sub.eq_ignore_ascii_case(b"ack") {
            // acks normally arrive on a follower link and are handled there;
            // one that shows up here has nothing to update
            Ok(Response::None)
        } else {
            Ok(Response::ErrorOwned(format!(
                "ERR unknown REPLCONF subcommand '{}'",
                String::from_utf8_lossy(sub)
            )))
        }
    }

    /// `WAIT <numreplicas> <timeout-ms>`: poll follower acknowledgements
    /// against the offset observed right now, until enough catch up or the
    /// deadline passes
    fn wait(repl: &ReplicationState, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 2, "wait")?;
        let numreplicas: i64 = match core::str::from_utf8(act.next().unwrap())
            .ok()
            .and_then(|s| s.parse().ok())
        {
            Some(n) if n >= 0 => n,
            _ => return Ok(Response::Error(errors::WAIT_BAD_NUMREPLICAS)),
        };
        let timeout_ms: i64 = match core::str::from_utf8(act.next().unwrap())
            .ok()
            .and_then(|s| s.parse().ok())
        {
            Some(ms) if ms >= 0 => ms,
            _ => return Ok(Response::Error(errors::WAIT_BAD_TIMEOUT)),
        };
        let acked = repl
            .wait_for_acks(numreplicas as usize, timeout_ms as u64)
            .await;
        Ok(Response::from(acked))
    }
);
