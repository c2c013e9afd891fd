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

//! # Stream queries

use crate::actions::ensure_length;
use crate::corestore::stream::{
    parse_range_end, parse_range_start, AddSpec, StreamAddError, StreamEntry, StreamId,
};
use crate::corestore::{Corestore, Data};
use crate::protocol::responses::errors;
use crate::queryengine::ActionIter;
use crate::resp::Response;
use std::time::Duration;

/// Render one stream entry as `[id, [field, value, ...]]`
fn entry_reply(entry: StreamEntry) -> Response {
    let mut flat = Vec::with_capacity(entry.fields.len() * 2);
    for (field, value) in entry.fields {
        flat.push(Response::Bulk(field));
        flat.push(Response::Bulk(value));
    }
    Response::Array(vec![
        Response::Bulk(Data::from_string(entry.id.to_string())),
        Response::Array(flat),
    ])
}

fn entries_reply(entries: Vec<StreamEntry>) -> Response {
    Response::Array(entries.into_iter().map(entry_reply).collect())
}

/// Render one `XREAD` result as `[key, [entries...]]`
fn stream_reply(key: Data, entries: Vec<StreamEntry>) -> Response {
    Response::Array(vec![Response::Bulk(key), entries_reply(entries)])
}

action!(
    /// `XADD <key> <id-spec> <field> <value> ...`
    fn xadd(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len >= 4 && len % 2 == 0, "xadd")?;
        // unwrap safe: length checked above
        let key = act.next().unwrap().clone();
        let spec = match AddSpec::parse(act.next().unwrap()) {
            Ok(spec) => spec,
            Err(()) => return Ok(Response::Error(errors::BAD_STREAM_ID)),
        };
        let mut fields = Vec::with_capacity(act.len() / 2);
        while let Some(field) = act.next() {
            // unwrap safe: even length checked above
            fields.push((field.clone(), act.next().unwrap().clone()));
        }
        let id = match handle.stream_add(&key, &spec, fields) {
            Ok(id) => id,
            Err(StreamAddError::WrongType) => return Ok(Response::Error(errors::WRONGTYPE)),
            Err(StreamAddError::Reserved) => {
                return Ok(Response::Error(errors::STREAM_ID_RESERVED))
            }
            Err(StreamAddError::TooSmall) => {
                return Ok(Response::Error(errors::STREAM_ID_TOO_SMALL))
            }
        };
        // wake blocked readers off this task
        let db = handle.clone();
        tokio::spawn(async move { db.notify_stream_add(&key) });
        Ok(Response::Bulk(Data::from_string(id.to_string())))
    }

    /// `XRANGE <key> <start> <end>`
    fn xrange(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 3, "xrange")?;
        let key = act.next().unwrap();
        let start = match parse_range_start(act.next().unwrap()) {
            Ok(start) => start,
            Err(()) => return Ok(Response::Error(errors::BAD_STREAM_ID)),
        };
        let end = match parse_range_end(act.next().unwrap()) {
            Ok(end) => end,
            Err(()) => return Ok(Response::Error(errors::BAD_STREAM_ID)),
        };
        Ok(match handle.stream_range(key, start, end) {
            Ok(entries) => entries_reply(entries),
            Err(()) => Response::Error(errors::WRONGTYPE),
        })
    }

    /// `XREAD [COUNT <n>] [BLOCK <ms>] STREAMS <key ...> <id ...>`
    fn xread(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len >= 3, "xread")?;
        let mut count: Option<usize> = None;
        let mut block_ms: Option<u64> = None;
        // options come before the STREAMS clause
        let streams_at = loop {
            let opt = match act.next() {
                Some(opt) => opt,
                None => return Ok(Response::Error(errors::BAD_STREAM_ID)),
            };
            if opt.eq_ignore_ascii_case(b"COUNT") {
                count = match act.next().and_then(|raw| atoi(raw)) {
                    Some(n) => Some(n as usize),
                    None => return Ok(Response::Error(errors::NOT_AN_INTEGER)),
                };
            } else if opt.eq_ignore_ascii_case(b"BLOCK") {
                block_ms = match act.next().and_then(|raw| atoi(raw)) {
                    Some(ms) => Some(ms),
                    None => return Ok(Response::Error(errors::BAD_TIMEOUT)),
                };
            } else if opt.eq_ignore_ascii_case(b"STREAMS") {
                break act.as_slice();
            } else {
                return Ok(Response::ErrorOwned(format!(
                    "ERR syntax error in XREAD near '{}'",
                    String::from_utf8_lossy(opt)
                )));
            }
        };
        if streams_at.is_empty() || streams_at.len() % 2 != 0 {
            return Ok(Response::Error(errors::BAD_STREAM_ID));
        }
        let (keys, ids) = streams_at.split_at(streams_at.len() / 2);
        // `$` resolves to the stream top *now*, before anything can append
        let mut items = Vec::with_capacity(keys.len());
        for (key, id) in keys.iter().zip(ids) {
            let after = if id.as_ref() == b"$" {
                handle.stream_last_id(key)
            } else {
                match StreamId::parse(id) {
                    Ok(id) => id,
                    Err(()) => return Ok(Response::Error(errors::BAD_STREAM_ID)),
                }
            };
            items.push((key.clone(), after));
        }

        // immediate pass across every stream
        let mut results = Vec::new();
        for (key, after) in &items {
            match handle.stream_read_from(key, *after, count) {
                Ok(entries) if !entries.is_empty() => {
                    results.push(stream_reply(key.clone(), entries))
                }
                Ok(_) => (),
                Err(()) => return Ok(Response::Error(errors::WRONGTYPE)),
            }
        }
        if !results.is_empty() {
            return Ok(Response::Array(results));
        }
        let block_ms = match block_ms {
            Some(block_ms) => block_ms,
            // non-blocking and empty-handed
            None => return Ok(Response::NullArray),
        };

        let (waiter, mut rx) = handle.register_stream_waiter(items, count);
        let woken = if block_ms == 0 {
            (&mut rx).await.ok()
        } else {
            tokio::select! {
                woken = &mut rx => woken.ok(),
                _ = tokio::time::sleep(Duration::from_millis(block_ms)) => None,
            }
        };
        handle.deregister_stream_waiter(&waiter);
        let woken = woken.or_else(|| rx.try_recv().ok());
        Ok(match woken {
            Some((key, entries)) => Response::Array(vec![stream_reply(key, entries)]),
            None => Response::NullArray,
        })
    }
);

fn atoi(raw: &Data) -> Option<u64> {
    core::str::from_utf8(raw).ok()?.parse().ok()
}
