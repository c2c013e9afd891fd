/*
 * Created on Mon Feb 19 2024
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

//! # List queries

pub mod blocking;

use crate::actions::ensure_length;
use crate::corestore::{Corestore, Data};
use crate::protocol::responses::errors;
use crate::queryengine::ActionIter;
use crate::resp::Response;

async fn push(
    handle: &Corestore,
    mut act: ActionIter<'_>,
    at_head: bool,
    verb: &str,
) -> crate::actions::ActionResult<Response> {
    ensure_length(act.len(), |len| len > 1, verb)?;
    // unwrap safe: length checked above
    let key = act.next().unwrap().clone();
    let elements: Vec<Data> = act.map(Data::clone).collect();
    let len = match handle.list_push(&key, elements, at_head) {
        Ok(len) => len,
        Err(()) => return Ok(Response::Error(errors::WRONGTYPE)),
    };
    // wake any parked poppers; the store lock is long gone by now
    handle.notify_list_push(&key);
    Ok(Response::from(len))
}

async fn pop(
    handle: &Corestore,
    mut act: ActionIter<'_>,
    from_head: bool,
    verb: &str,
) -> crate::actions::ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1 || len == 2, verb)?;
    // unwrap safe: length checked above
    let key = act.next().unwrap().clone();
    let count = match act.next() {
        Some(raw) => match core::str::from_utf8(raw).ok().and_then(|s| s.parse().ok()) {
            Some(count) => Some(count),
            None => return Ok(Response::Error(errors::BAD_COUNT)),
        },
        None => None,
    };
    let popped = match handle.list_pop_n(&key, count.unwrap_or(1), from_head) {
        Ok(popped) => popped,
        Err(()) => return Ok(Response::Error(errors::WRONGTYPE)),
    };
    Ok(match count {
        // without a count: one bulk or the null bulk
        None => Response::from(popped.into_iter().next()),
        Some(_) if popped.is_empty() => Response::NullArray,
        Some(_) => Response::Array(popped.into_iter().map(Response::Bulk).collect()),
    })
}

action!(
    /// `LPUSH <key> <element ...>`: the final head order is the reverse of
    /// the argument order
    fn lpush(handle: &Corestore, act: ActionIter<'_>) {
        push(handle, act, true, "lpush").await
    }
    /// `RPUSH <key> <element ...>`: appends in argument order
    fn rpush(handle: &Corestore, act: ActionIter<'_>) {
        push(handle, act, false, "rpush").await
    }
    /// `LPOP <key> [count]`
    fn lpop(handle: &Corestore, act: ActionIter<'_>) {
        pop(handle, act, true, "lpop").await
    }
    /// `RPOP <key> [count]`: multi-pops come back most-recently-appended
    /// first
    fn rpop(handle: &Corestore, act: ActionIter<'_>) {
        pop(handle, act, false, "rpop").await
    }
    fn llen(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 1, "llen")?;
        let key = act.next().unwrap();
        Ok(match handle.list_len(key) {
            Ok(len) => Response::from(len),
            Err(()) => Response::Error(errors::WRONGTYPE),
        })
    }
    fn lindex(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 2, "lindex")?;
        let key = act.next().unwrap();
        let index: i64 = match core::str::from_utf8(act.next().unwrap())
            .ok()
            .and_then(|s| s.parse().ok())
        {
            Some(index) => index,
            None => return Ok(Response::Error(errors::NOT_AN_INTEGER)),
        };
        Ok(match handle.list_index(key, index) {
            Ok(found) => Response::from(found),
            Err(()) => Response::Error(errors::WRONGTYPE),
        })
    }
    fn lrange(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 3, "lrange")?;
        let key = act.next().unwrap();
        let mut bound = || {
            core::str::from_utf8(act.next().unwrap())
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
        };
        let (start, stop) = match (bound(), bound()) {
            (Some(start), Some(stop)) => (start, stop),
            _ => return Ok(Response::Error(errors::NOT_AN_INTEGER)),
        };
        Ok(match handle.list_range(key, start, stop) {
            Ok(range) => Response::Array(range.into_iter().map(Response::Bulk).collect()),
            Err(()) => Response::Error(errors::WRONGTYPE),
        })
    }
);
