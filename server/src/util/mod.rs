/*
 * Created on Sun Feb 11 2024
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

pub mod macros;

use core::future::Future;
use core::pin::Pin;
use std::process;

const EXITCODE_ONE: i32 = 0x01;

/// A boxed future with an erased type, used to break dispatch recursion
/// (`EXEC` re-enters the dispatcher)
pub type FutureResult<'s, T> = Pin<Box<dyn Future<Output = T> + Send + 's>>;

/// Exit the process with exit code 1
pub fn exit_error() -> ! {
    process::exit(EXITCODE_ONE)
}

/// Returns a Result with the provided error
#[inline(never)]
#[cold]
pub fn err<T, E>(e: impl Into<E>) -> Result<T, E> {
    Err(e.into())
}

/// Current unix time in milliseconds
pub fn time_now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
