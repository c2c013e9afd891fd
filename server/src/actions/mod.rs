/*
 * Created on Sun Feb 18 2024
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

//! # Actions
//!
//! Actions are like shell commands: you provide arguments, they return a
//! reply. This module collects the actions this server supports, one module
//! per verb family

#[macro_use]
mod macros;
pub mod counter;
pub mod del;
pub mod get;
pub mod info;
pub mod keytype;
pub mod lists;
pub mod replication;
pub mod set;
pub mod streams;
pub mod txn;

use crate::protocol::responses;
use crate::resp::Response;
use crate::util;
use std::io::Error as IoError;

/// A generic result for actions
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors that can occur while running actions
#[derive(Debug)]
pub enum ActionError {
    /// A protocol-level failure: this is a reply, not a session teardown
    ActionError(Response),
    /// An I/O failure: the session is torn down
    IoError(IoError),
}

impl From<Response> for ActionError {
    fn from(e: Response) -> Self {
        Self::ActionError(e)
    }
}

impl From<IoError> for ActionError {
    fn from(e: IoError) -> Self {
        Self::IoError(e)
    }
}

/// Bail out with a wrong-number-of-arguments error unless the argument count
/// satisfies the predicate
pub fn ensure_length(len: usize, is_valid: fn(usize) -> bool, verb: &str) -> ActionResult<()> {
    if is_valid(len) {
        Ok(())
    } else {
        util::err(Response::ErrorOwned(responses::wrongargs(verb)))
    }
}

pub mod ping {
    //! Respond to `PING` queries
    use super::*;
    use crate::queryengine::ActionIter;
    action!(
        /// Returns a `+PONG` response
        fn ping(act: ActionIter<'_>) {
            ensure_length(act.len(), |len| len == 0, "ping")?;
            Ok(Response::Simple("PONG"))
        }
    );
}

pub mod echo {
    //! Respond to `ECHO` queries
    use super::*;
    use crate::queryengine::ActionIter;
    action!(
        fn echo(mut act: ActionIter<'_>) {
            ensure_length(act.len(), |len| len == 1, "echo")?;
            // unwrap safe: length checked above
            Ok(Response::Bulk(act.next().unwrap().clone()))
        }
    );
}
