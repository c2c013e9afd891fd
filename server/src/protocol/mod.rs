/*
 * Created on Mon Feb 12 2024
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

//! This module provides deserialization primitives for request frames
//!
//! A request is either an array of bulk strings (`*<n>\r\n$<len>\r\n...`) or
//! an inline command: a plain line of whitespace-separated words. The parser
//! walks the buffer with an explicit cursor and never recurses.

pub mod responses;

use crate::corestore::Data;

/// A fully parsed request: the argument vector, verb included
#[derive(Debug, PartialEq)]
pub struct Query {
    pub args: Vec<Data>,
}

#[derive(Debug, PartialEq)]
/// Outcome of a failed parse attempt
pub enum ParseError {
    /// More data needs to be read before the frame completes
    NotEnough,
    /// The packet contains a byte that the grammar does not permit here
    UnexpectedByte,
    /// The packet is structurally corrupt
    BadPacket,
}

/// A parse result: the query and the number of bytes to discard from the
/// buffer, since they have been read
pub type ParseResult = Result<(Query, usize), ParseError>;

/// The request parser
pub struct Parser<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Parser<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Parser { buf, cursor: 0 }
    }

    /// Parse one request off the front of the buffer
    pub fn parse(buf: &'a [u8]) -> ParseResult {
        if buf.is_empty() {
            return Err(ParseError::NotEnough);
        }
        let mut slf = Parser::new(buf);
        if buf[0] == b'*' {
            slf.parse_array_request()
        } else {
            slf.parse_inline_request()
        }
    }

    /// Read up to (not including) the next LF, stripping a trailing CR.
    /// Advances the cursor past the LF
    fn read_line(&mut self) -> Result<&'a [u8], ParseError> {
        let start = self.cursor;
        while self.cursor < self.buf.len() {
            if self.buf[self.cursor] == b'\n' {
                let mut line = &self.buf[start..self.cursor];
                if let [rest @ .., b'\r'] = line {
                    line = rest;
                }
                self.cursor += 1;
                return Ok(line);
            }
            self.cursor += 1;
        }
        Err(ParseError::NotEnough)
    }

    /// Parse an ASCII decimal off a full line
    fn parse_decimal(line: &[u8]) -> Result<usize, ParseError> {
        if line.is_empty() {
            return Err(ParseError::BadPacket);
        }
        let mut ret = 0usize;
        for dig in line {
            let dig = match dig.checked_sub(48) {
                Some(dig) if dig < 10 => dig as usize,
                _ => return Err(ParseError::BadPacket),
            };
            ret = ret
                .checked_mul(10)
                .and_then(|r| r.checked_add(dig))
                .ok_or(ParseError::BadPacket)?;
        }
        Ok(ret)
    }

    fn parse_array_request(&mut self) -> ParseResult {
        self.cursor += 1; // skip the '*'
        let nargs = Self::parse_decimal(self.read_line()?)?;
        let mut args = Vec::with_capacity(nargs);
        while args.len() < nargs {
            if self.cursor >= self.buf.len() {
                return Err(ParseError::NotEnough);
            }
            if self.buf[self.cursor] != b'$' {
                // requests are arrays of bulk strings, nothing else
                return Err(ParseError::UnexpectedByte);
            }
            self.cursor += 1;
            let len = Self::parse_decimal(self.read_line()?)?;
            let blob = match self.buf.get(self.cursor..self.cursor + len) {
                Some(blob) => blob,
                None => return Err(ParseError::NotEnough),
            };
            self.cursor += len;
            // the payload is terminated by CRLF
            match self.buf.get(self.cursor..self.cursor + 2) {
                Some(b"\r\n") => self.cursor += 2,
                Some(_) => return Err(ParseError::BadPacket),
                None => return Err(ParseError::NotEnough),
            }
            args.push(Data::copy_from_slice(blob));
        }
        Ok((Query { args }, self.cursor))
    }

    /// An inline request: a plain line split on whitespace with quote grouping
    fn parse_inline_request(&mut self) -> ParseResult {
        let line = self.read_line()?;
        let args = libcrimson::split_into_args(&String::from_utf8_lossy(line))
            .into_iter()
            .map(Data::from)
            .collect();
        Ok((Query { args }, self.cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::{ParseError, Parser, Query};
    use crate::corestore::Data;

    fn q(args: &[&str]) -> Query {
        Query {
            args: args.iter().map(|a| Data::copy_from_slice(a.as_bytes())).collect(),
        }
    }

    #[test]
    fn parse_simple_request() {
        let buf = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
        let (query, advance) = Parser::parse(buf).unwrap();
        assert_eq!(query, q(&["SET", "foo", "bar"]));
        assert_eq!(advance, buf.len());
    }

    #[test]
    fn parse_incomplete_returns_not_enough() {
        let full = b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n";
        for cut in 1..full.len() {
            assert_eq!(
                Parser::parse(&full[..cut]).unwrap_err(),
                ParseError::NotEnough,
                "cut at {cut}"
            );
        }
        assert!(Parser::parse(full).is_ok());
    }

    #[test]
    fn parse_rejects_non_bulk_elements() {
        assert_eq!(
            Parser::parse(b"*1\r\n:100\r\n").unwrap_err(),
            ParseError::UnexpectedByte
        );
    }

    #[test]
    fn parse_rejects_bad_lengths() {
        assert_eq!(
            Parser::parse(b"*x\r\n").unwrap_err(),
            ParseError::BadPacket
        );
        assert_eq!(
            Parser::parse(b"*1\r\n$2x\r\nab\r\n").unwrap_err(),
            ParseError::BadPacket
        );
    }

    #[test]
    fn parse_rejects_missing_terminator() {
        assert_eq!(
            Parser::parse(b"*1\r\n$3\r\nfooXY").unwrap_err(),
            ParseError::BadPacket
        );
    }

    #[test]
    fn parse_binary_safe_payload() {
        // a bulk payload may contain CRLF; only the length counts
        let buf = b"*2\r\n$4\r\nECHO\r\n$4\r\na\r\nb\r\n";
        let (query, advance) = Parser::parse(buf).unwrap();
        assert_eq!(query.args[1], Data::copy_from_slice(b"a\r\nb"));
        assert_eq!(advance, buf.len());
    }

    #[test]
    fn parse_empty_bulk() {
        let (query, _) = Parser::parse(b"*2\r\n$3\r\nSET\r\n$0\r\n\r\n").unwrap();
        assert_eq!(query.args[1], Data::copy_from_slice(b""));
    }

    #[test]
    fn parse_inline_request() {
        let buf = b"PING\r\n";
        let (query, advance) = Parser::parse(buf).unwrap();
        assert_eq!(query, q(&["PING"]));
        assert_eq!(advance, buf.len());
    }

    #[test]
    fn parse_inline_request_with_quotes() {
        let (query, _) = Parser::parse(b"set greeting 'hello world'\n").unwrap();
        assert_eq!(query, q(&["set", "greeting", "hello world"]));
    }

    #[test]
    fn parse_two_pipelined_requests() {
        let buf = b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n";
        let (first, advance) = Parser::parse(buf).unwrap();
        assert_eq!(first, q(&["PING"]));
        let (second, advance2) = Parser::parse(&buf[advance..]).unwrap();
        assert_eq!(second, q(&["ECHO", "hi"]));
        assert_eq!(advance + advance2, buf.len());
    }
}
