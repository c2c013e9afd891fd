/*
 * Created on Thu Feb 15 2024
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

//! Stack buffers for rendering integers into wire frames without a heap
//! round-trip. Every `:n`, `$len` and `*len` in a response goes through
//! [`Integer64`]

use core::ops::Deref;

/// The longest decimal rendering of a 64-bit integer: 19 digits and a sign
const I64_MAX_DIGITS: usize = 20;

#[derive(Debug)]
/// A 64-bit signed integer rendered to ASCII decimal in a stack buffer
pub struct Integer64 {
    buf: [u8; I64_MAX_DIGITS],
    start: usize,
}

impl Integer64 {
    pub fn init(val: i64) -> Self {
        let mut slf = Integer64 {
            buf: [0u8; I64_MAX_DIGITS],
            start: I64_MAX_DIGITS,
        };
        // digits are produced least-significant first, so fill from the tail.
        // work on the unsigned magnitude: i64::MIN has no i64 negation
        let negative = val < 0;
        let mut val = val.unsigned_abs();
        loop {
            slf.start -= 1;
            slf.buf[slf.start] = b'0' + (val % 10) as u8;
            val /= 10;
            if val == 0 {
                break;
            }
        }
        if negative {
            slf.start -= 1;
            slf.buf[slf.start] = b'-';
        }
        slf
    }
}

impl From<usize> for Integer64 {
    fn from(val: usize) -> Self {
        Integer64::init(val as i64)
    }
}

impl From<i64> for Integer64 {
    fn from(val: i64) -> Self {
        Integer64::init(val)
    }
}

impl Deref for Integer64 {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.buf[self.start..]
    }
}

#[cfg(test)]
mod tests {
    use super::Integer64;

    #[test]
    fn render_small_integers() {
        assert_eq!(&*Integer64::init(0), b"0");
        assert_eq!(&*Integer64::init(7), b"7");
        assert_eq!(&*Integer64::init(42), b"42");
        assert_eq!(&*Integer64::init(-1), b"-1");
    }

    #[test]
    fn render_extremes() {
        assert_eq!(&*Integer64::init(i64::MAX), b"9223372036854775807");
        assert_eq!(&*Integer64::init(i64::MIN), b"-9223372036854775808");
    }

    #[test]
    fn matches_the_std_rendering() {
        for val in [-1_000_000, -999, -10, 0, 1, 99, 12345, 10_000_000_000] {
            assert_eq!(&*Integer64::init(val), val.to_string().as_bytes());
        }
    }
}
