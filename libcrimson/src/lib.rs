/*
 * Created on Sat Feb 10 2024
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

//! The core library for Crimson
//!
//! This contains the small set of helpers that are shared by the `server`
//! crate and any future tooling

use std::error::Error;

/// A generic result
pub type TResult<T> = Result<T, Box<dyn Error>>;
/// The current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// The URL
pub const URL: &str = "https://github.com/crimsondb/crimson";
/// The size of the read buffer in bytes
pub const BUF_CAP: usize = 8 * 1024; // 8 KB per-connection

/// Split an inline request line into its argument words. Words are separated
/// by runs of whitespace; a single or double quote opens a group that keeps
/// its spaces until the matching quote (an unterminated group runs to the end
/// of the line)
pub fn split_into_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut word = String::new();
    let mut open_word = false;
    let mut open_quote = None;
    for ch in line.chars() {
        match open_quote {
            Some(quote) if ch == quote => open_quote = None,
            Some(_) => word.push(ch),
            None if ch == '\'' || ch == '"' => {
                open_quote = Some(ch);
                open_word = true;
            }
            None if ch.is_whitespace() => {
                if open_word {
                    args.push(core::mem::take(&mut word));
                    open_word = false;
                }
            }
            None => {
                word.push(ch);
                open_word = true;
            }
        }
    }
    if open_word {
        args.push(word);
    }
    args
}
