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

//! # The query engine
//!
//! The dispatcher: an uppercased verb table over the action modules, plus the
//! per-session transaction buffer. Writes are classified here so that the
//! propagation path and the follower apply loop agree on the verb set.

use crate::actions::{self, ActionResult};
use crate::config::SnapshotConfig;
use crate::corestore::{Corestore, Data};
use crate::protocol::responses;
use crate::replication::ReplicationState;
use crate::resp::Response;

/// The verbs that mutate the dataset and are pushed to followers
const WRITE_ACTIONS: [&str; 11] = [
    "SET", "DEL", "LPUSH", "RPUSH", "LPOP", "RPOP", "XADD", "INCR", "INCRBY", "DECR", "DECRBY",
];

pub fn is_write_action(verb: &str) -> bool {
    WRITE_ACTIONS.contains(&verb)
}

/// Transaction-control verbs are never queued by an open `MULTI`
fn is_txn_control(verb: &str) -> bool {
    matches!(verb, "MULTI" | "EXEC" | "DISCARD" | "UNDO")
}

/// The service handles every session shares
#[derive(Clone)]
pub struct Services {
    pub db: Corestore,
    pub repl: ReplicationState,
    pub snapshot: SnapshotConfig,
    pub port: u16,
}

/// Per-connection state: the transaction buffer. Owned by the session's own
/// task; no lock required
#[derive(Default)]
pub struct Session {
    pub in_txn: bool,
    pub queued: Vec<Vec<Data>>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }
    /// Would this verb be queued rather than run right now?
    pub fn will_queue(&self, verb: &str) -> bool {
        self.in_txn && !is_txn_control(verb)
    }
}

/// An iterator over the arguments of an action, the verb excluded
pub struct ActionIter<'a> {
    args: &'a [Data],
}

impl<'a> ActionIter<'a> {
    pub const fn new(args: &'a [Data]) -> Self {
        ActionIter { args }
    }
    /// How many arguments are left
    pub const fn len(&self) -> usize {
        self.args.len()
    }
    /// The remaining arguments as a slice
    pub const fn as_slice(&self) -> &'a [Data] {
        self.args
    }
}

impl<'a> Iterator for ActionIter<'a> {
    type Item = &'a Data;
    fn next(&mut self) -> Option<Self::Item> {
        let (first, rest) = self.args.split_first()?;
        self.args = rest;
        Some(first)
    }
}

/// Execute one request. An open transaction swallows everything except its
/// own control verbs into the queue
pub async fn execute(
    svc: &Services,
    session: &mut Session,
    args: &[Data],
) -> ActionResult<Response> {
    let verb = match args.first() {
        Some(verb) => String::from_utf8_lossy(verb).to_uppercase(),
        None => return Ok(Response::None),
    };
    if session.will_queue(&verb) {
        session.queued.push(args.to_vec());
        return Ok(Response::Simple("QUEUED"));
    }
    run_action(svc, session, &verb, args).await
}

/// Execute one request and, on a primary, push a successful write to every
/// attached follower. Queued commands are not propagated (their `EXEC` is)
pub async fn execute_and_propagate(
    svc: &Services,
    session: &mut Session,
    args: &[Data],
) -> ActionResult<Response> {
    let verb = match args.first() {
        Some(verb) => String::from_utf8_lossy(verb).to_uppercase(),
        None => return Ok(Response::None),
    };
    let queued = session.will_queue(&verb);
    let response = execute(svc, session, args).await?;
    if !queued && !response.is_error() && svc.repl.is_primary() && is_write_action(&verb) {
        svc.repl.propagate(args).await;
    }
    Ok(response)
}

/// The verb table proper. `PSYNC` never reaches this point: the connection
/// layer intercepts it because it changes what the socket *is*
pub async fn run_action(
    svc: &Services,
    session: &mut Session,
    verb: &str,
    args: &[Data],
) -> ActionResult<Response> {
    let act = ActionIter::new(&args[1..]);
    let db = &svc.db;
    match verb {
        "PING" => actions::ping::ping(act).await,
        "ECHO" => actions::echo::echo(act).await,
        "GET" => actions::get::get(db, act).await,
        "SET" => actions::set::set(db, act).await,
        "DEL" => actions::del::del(db, act).await,
        "TYPE" => actions::keytype::keytype(db, act).await,
        "INCR" => actions::counter::incr(db, act).await,
        "DECR" => actions::counter::decr(db, act).await,
        "INCRBY" => actions::counter::incrby(db, act).await,
        "DECRBY" => actions::counter::decrby(db, act).await,
        "LPUSH" => actions::lists::lpush(db, act).await,
        "RPUSH" => actions::lists::rpush(db, act).await,
        "LPOP" => actions::lists::lpop(db, act).await,
        "RPOP" => actions::lists::rpop(db, act).await,
        "LLEN" => actions::lists::llen(db, act).await,
        "LINDEX" => actions::lists::lindex(db, act).await,
        "LRANGE" => actions::lists::lrange(db, act).await,
        "BLPOP" => actions::lists::blocking::blpop(db, act).await,
        "BRPOP" => actions::lists::blocking::brpop(db, act).await,
        "XADD" => actions::streams::xadd(db, act).await,
        "XRANGE" => actions::streams::xrange(db, act).await,
        "XREAD" => actions::streams::xread(db, act).await,
        "MULTI" => actions::txn::multi(session, act).await,
        "EXEC" => actions::txn::exec(svc, session, act).await,
        "DISCARD" => actions::txn::discard(session, act).await,
        "UNDO" => actions::txn::undo(session, act).await,
        "INFO" => actions::info::info(svc, act).await,
        "CONFIG" => actions::info::config(svc, act).await,
        "REPLCONF" => actions::replication::replconf(act).await,
        "WAIT" => actions::replication::wait(&svc.repl, act).await,
        _ => Ok(Response::ErrorOwned(responses::unknown_command(
            &String::from_utf8_lossy(&args[0]),
        ))),
    }
}
