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

//! # `GET` queries

use crate::actions::ensure_length;
use crate::corestore::Corestore;
use crate::queryengine::ActionIter;
use crate::resp::Response;

action!(
    /// Run a `GET` query. A key of the wrong kind reads as absent here
    fn get(handle: &Corestore, mut act: ActionIter<'_>) {
        ensure_length(act.len(), |len| len == 1, "get")?;
        // unwrap safe: length checked above
        let key = act.next().unwrap();
        Ok(Response::from(handle.get(key)))
    }
);
