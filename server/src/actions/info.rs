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

//! # `INFO` and `CONFIG` queries

use crate::actions::ensure_length;
use crate::corestore::Data;
use crate::protocol::responses::errors;
use crate::queryengine::{ActionIter, Services};
use crate::resp::Response;
use core::fmt::Write;

action!(
    /// `INFO [section]`: one bulk of `key:value` lines. The section argument
    /// is accepted and ignored; both sections are always reported
    fn info(svc: &Services, act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len < 2, "info")?;
        let mut out = String::new();
        let _ = writeln!(out, "# Server");
        let _ = writeln!(out, "crimson_version:{}", libcrimson::VERSION);
        let _ = writeln!(out, "tcp_port:{}", svc.port);
        let _ = writeln!(out);
        let _ = writeln!(out, "# Replication");
        let _ = writeln!(out, "role:{}", svc.repl.role_name());
        let _ = writeln!(out, "master_replid:{}", svc.repl.replid());
        // a follower reports how much of the primary's stream it has applied
        let offset = if svc.repl.is_primary() {
            svc.repl.offset()
        } else {
            svc.repl.applied_offset()
        };
        let _ = writeln!(out, "master_repl_offset:{offset}");
        let _ = writeln!(out, "connected_slaves:{}", svc.repl.follower_count());
        for (idx, link) in svc.repl.follower_info().iter().enumerate() {
            let _ = writeln!(
                out,
                "slave{idx}:state=online,addr={},offset={},lag={},last_ack_sec={}",
                link.addr, link.acked, link.lag, link.idle_s
            );
        }
        Ok(Response::Bulk(Data::from_string(out)))
    }

    /// `CONFIG GET <name>`: the snapshot location knobs are the only ones a
    /// client can ask for. `CONFIG SET` is rejected outright
    fn config(svc: &Services, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len >= 1, "config")?;
        // unwrap safe: length checked above
        let sub = act.next().unwrap();
        if sub.eq_ignore_ascii_case(b"SET") {
            return Ok(Response::Error(errors::CONFIG_SET_UNSUPPORTED));
        }
        ensure_length(act.len(), |len| len == 1, "config")?;
        if !sub.eq_ignore_ascii_case(b"GET") {
            return Ok(Response::ErrorOwned(format!(
                "ERR unknown CONFIG subcommand '{}'",
                String::from_utf8_lossy(sub)
            )));
        }
        let name = act.next().unwrap();
        let value = if name.eq_ignore_ascii_case(b"dir") {
            Some(svc.snapshot.dir.clone())
        } else if name.eq_ignore_ascii_case(b"dbfilename") {
            Some(svc.snapshot.file.clone())
        } else {
            None
        };
        Ok(match value {
            Some(value) => Response::Array(vec![
                Response::Bulk(name.clone()),
                Response::Bulk(Data::from_string(value)),
            ]),
            None => Response::Array(Vec::new()),
        })
    }
);
