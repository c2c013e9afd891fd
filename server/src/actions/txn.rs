/*
 * Created on Wed Feb 21 2024
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

//! # Transaction control
//!
//! `MULTI` opens a per-session queue, `EXEC` replays it through the ordinary
//! dispatcher and collects each command's reply into one outer array, and
//! `UNDO` trims the tail of the queue before it ever runs.

use crate::actions::{ensure_length, ActionError};
use crate::corestore::Data;
use crate::protocol::responses::errors;
use crate::queryengine::{self, ActionIter, Services, Session};
use crate::resp::Response;
use crate::util::FutureResult;

action!(
    fn multi(session: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 0, "multi")?;
        if session.in_txn {
            return Ok(Response::Error(errors::MULTI_NESTED));
        }
        session.in_txn = true;
        Ok(Response::okay())
    }

    fn discard(session: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 0, "discard")?;
        if !session.in_txn {
            return Ok(Response::Error(errors::DISCARD_WITHOUT_MULTI));
        }
        session.in_txn = false;
        session.queued.clear();
        Ok(Response::okay())
    }

    /// `UNDO [n]`: drop the last `n` queued commands (default 1) and report
    /// what was dropped
    fn undo(session: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len < 2, "undo")?;
        if !session.in_txn {
            return Ok(Response::Error(errors::UNDO_WITHOUT_MULTI));
        }
        let count: usize = match act.next() {
            Some(raw) => match core::str::from_utf8(raw).ok().and_then(|s| s.parse().ok()) {
                Some(count) => count,
                None => return Ok(Response::Error(errors::NOT_AN_INTEGER)),
            },
            None => 1,
        };
        if count > session.queued.len() {
            return Ok(Response::Error(errors::UNDO_TOO_MANY));
        }
        let mut lines = Vec::with_capacity(count + 2);
        lines.push(Response::Bulk(Data::from_string(format!(
            "Removed {count} commands:"
        ))));
        for _ in 0..count {
            // unwrap safe: count bounded by the queue length above
            let removed = session.queued.pop().unwrap();
            let rendered: Vec<String> = removed
                .iter()
                .map(|arg| String::from_utf8_lossy(arg).into_owned())
                .collect();
            lines.push(Response::Bulk(Data::from_string(rendered.join(" "))));
        }
        lines.push(Response::Bulk(Data::from_string(format!(
            "{} commands remaining in queue",
            session.queued.len()
        ))));
        Ok(Response::Array(lines))
    }

);

/// `EXEC`: replay the queue in order on this session, capturing the first
/// reply of each command. A command that replies with nothing is recorded
/// as `+OK`
///
/// Defined with an explicit boxed-future signature (rather than through the
/// `action!` macro's `async fn`) because this function re-enters the
/// dispatcher that calls it; an opaque `async fn` here would make the
/// compiler's `Send` check for the whole dispatch cycle self-referential.
pub fn exec<'a>(
    svc: &'a Services,
    session: &'a mut Session,
    act: ActionIter<'a>,
) -> FutureResult<'a, crate::actions::ActionResult<Response>> {
    Box::pin(async move {
        ensure_length(act.len(), |len| len == 0, "exec")?;
        if !session.in_txn {
            return Ok(Response::Error(errors::EXEC_WITHOUT_MULTI));
        }
        session.in_txn = false;
        let queued = core::mem::take(&mut session.queued);
        let mut replies = Vec::with_capacity(queued.len());
        for args in queued {
            // erase the future type: this re-enters the dispatcher that
            // called us
            let fut: FutureResult<'_, _> =
                Box::pin(queryengine::execute_and_propagate(svc, session, &args));
            let reply = match fut.await {
                Ok(Response::None) => Response::okay(),
                Ok(reply) => reply,
                Err(ActionError::ActionError(reply)) => reply,
                Err(err @ ActionError::IoError(_)) => return Err(err),
            };
            replies.push(reply);
        }
        Ok(Response::Array(replies))
    })
}
