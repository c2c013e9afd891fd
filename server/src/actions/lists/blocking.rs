/*
 * Created on Tue Feb 20 2024
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

//! # Blocking list pops
//!
//! `BLPOP`/`BRPOP` first try an immediate pop across their keys, left to
//! right. Only if every key comes up empty is a waiter parked on the broker.
//! A timeout of zero parks forever.

use crate::actions::ensure_length;
use crate::corestore::{Corestore, Data};
use crate::protocol::responses::errors;
use crate::queryengine::ActionIter;
use crate::resp::Response;
use std::time::Duration;

async fn blocking_pop(
    handle: &Corestore,
    act: ActionIter<'_>,
    from_head: bool,
    verb: &str,
) -> crate::actions::ActionResult<Response> {
    ensure_length(act.len(), |len| len >= 2, verb)?;
    let args = act.as_slice();
    let (timeout_raw, keys) = args.split_last().unwrap();
    let timeout_secs: f64 = match core::str::from_utf8(timeout_raw)
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(secs) if secs >= 0.0 => secs,
        _ => return Ok(Response::Error(errors::BAD_TIMEOUT)),
    };
    let keys: Vec<Data> = keys.to_vec();

    if let Some((key, element)) = handle.pop_first_of(&keys, from_head) {
        return Ok(pop_reply(key, element));
    }

    let (waiter, mut rx) = handle.register_list_waiter(keys, from_head);
    let woken = if timeout_secs == 0.0 {
        (&mut rx).await.ok()
    } else {
        tokio::select! {
            woken = &mut rx => woken.ok(),
            _ = tokio::time::sleep(Duration::from_secs_f64(timeout_secs)) => None,
        }
    };
    handle.deregister_list_waiter(&waiter);
    // a wake-up may have squeezed in between the timeout and the
    // deregistration; it must not be dropped on the floor
    let woken = woken.or_else(|| rx.try_recv().ok());
    Ok(match woken {
        Some((key, element)) => pop_reply(key, element),
        None => Response::NullArray,
    })
}

fn pop_reply(key: Data, element: Data) -> Response {
    Response::Array(vec![Response::Bulk(key), Response::Bulk(element)])
}

action!(
    /// `BLPOP <key ...> <timeout>`
    fn blpop(handle: &Corestore, act: ActionIter<'_>) {
        blocking_pop(handle, act, true, "blpop").await
    }
    /// `BRPOP <key ...> <timeout>`
    fn brpop(handle: &Corestore, act: ActionIter<'_>) {
        blocking_pop(handle, act, false, "brpop").await
    }
);
