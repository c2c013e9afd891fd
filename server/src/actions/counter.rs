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

//! # Counter queries
//!
//! `INCR`/`DECR` are fixed ±1 steps; `INCRBY` keeps its historical
//! restriction to positive deltas while `DECRBY` takes any signed delta.

use crate::actions::ensure_length;
use crate::corestore::{Corestore, CounterError, Data};
use crate::protocol::responses::errors;
use crate::queryengine::ActionIter;
use crate::resp::Response;

fn counter_reply(res: Result<i64, CounterError>) -> Response {
    match res {
        Ok(int) => Response::Integer(int),
        Err(CounterError::WrongType) => Response::Error(errors::WRONGTYPE),
        Err(CounterError::NotAnInteger) => Response::Error(errors::NOT_AN_INTEGER),
        Err(CounterError::Overflow) => Response::Error(errors::OVERFLOW),
    }
}

fn parse_delta(raw: &Data) -> Option<i64> {
    core::str::from_utf8(raw).ok()?.parse().ok()
}

action!(
    fn incr(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 1, "incr")?;
        // unwrap safe: length checked above
        let key = act.next().unwrap();
        Ok(counter_reply(handle.incr_by(key, 1)))
    }
    fn decr(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 1, "decr")?;
        let key = act.next().unwrap();
        Ok(counter_reply(handle.incr_by(key, -1)))
    }
    fn incrby(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 2, "incrby")?;
        let key = act.next().unwrap();
        let delta = match parse_delta(act.next().unwrap()) {
            Some(delta) => delta,
            None => return Ok(Response::Error(errors::NOT_AN_INTEGER)),
        };
        if delta < 0 {
            return Ok(Response::Error(errors::INCR_NEGATIVE));
        }
        Ok(counter_reply(handle.incr_by(key, delta)))
    }
    fn decrby(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 2, "decrby")?;
        let key = act.next().unwrap();
        let delta = match parse_delta(act.next().unwrap()) {
            Some(delta) => delta,
            None => return Ok(Response::Error(errors::NOT_AN_INTEGER)),
        };
        // DECRBY i64::MIN cannot be negated; that step always overflows
        let res = match delta.checked_neg() {
            Some(neg) => handle.incr_by(key, neg),
            None => Err(CounterError::Overflow),
        };
        Ok(counter_reply(res))
    }
);
