/*
 * Created on Tue Feb 13 2024
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

use super::Response;
use crate::corestore::buffers::Integer64;

/// Render a [`Response`] into the provided buffer. [`Response::None`] renders
/// to nothing
pub fn write_response(resp: &Response, buf: &mut Vec<u8>) {
    match resp {
        Response::Simple(payload) => write_simple(payload, buf),
        Response::SimpleOwned(payload) => write_simple(payload, buf),
        Response::Error(msg) => write_error(msg, buf),
        Response::ErrorOwned(msg) => write_error(msg, buf),
        Response::Integer(int) => {
            buf.push(b':');
            buf.extend_from_slice(&Integer64::init(*int));
            buf.extend_from_slice(b"\r\n");
        }
        Response::Bulk(blob) => write_bulk(blob, buf),
        Response::NullBulk => buf.extend_from_slice(b"$-1\r\n"),
        Response::Array(items) => {
            buf.push(b'*');
            buf.extend_from_slice(&Integer64::from(items.len()));
            buf.extend_from_slice(b"\r\n");
            for item in items {
                write_response(item, buf);
            }
        }
        Response::NullArray => buf.extend_from_slice(b"*-1\r\n"),
        Response::None => (),
    }
}

fn write_simple(payload: &str, buf: &mut Vec<u8>) {
    buf.push(b'+');
    buf.extend_from_slice(payload.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

fn write_error(msg: &str, buf: &mut Vec<u8>) {
    buf.push(b'-');
    buf.extend_from_slice(msg.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Write one bulk string (`$<len>\r\n<payload>\r\n`)
pub fn write_bulk(blob: &[u8], buf: &mut Vec<u8>) {
    buf.push(b'$');
    buf.extend_from_slice(&Integer64::from(blob.len()));
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(blob);
    buf.extend_from_slice(b"\r\n");
}

/// Encode an argument vector as an array of bulk strings. This is the frame
/// format used for write propagation to followers
pub fn encode_array(args: &[crate::corestore::Data]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 * args.len());
    buf.push(b'*');
    buf.extend_from_slice(&Integer64::from(args.len()));
    buf.extend_from_slice(b"\r\n");
    for arg in args {
        write_bulk(arg, &mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::{encode_array, Response};
    use crate::corestore::Data;

    #[test]
    fn render_scalars() {
        assert_eq!(Response::okay().into_bytes(), b"+OK\r\n");
        assert_eq!(Response::Integer(-42).into_bytes(), b":-42\r\n");
        assert_eq!(
            Response::Bulk(Data::from("bar")).into_bytes(),
            b"$3\r\nbar\r\n"
        );
        assert_eq!(Response::NullBulk.into_bytes(), b"$-1\r\n");
        assert_eq!(Response::NullArray.into_bytes(), b"*-1\r\n");
        assert_eq!(Response::None.into_bytes(), b"");
    }

    #[test]
    fn render_error() {
        assert_eq!(
            Response::Error("ERR oops").into_bytes(),
            b"-ERR oops\r\n"
        );
    }

    #[test]
    fn render_nested_array() {
        let resp = Response::Array(vec![
            Response::Bulk(Data::from("kk")),
            Response::Array(vec![Response::Integer(1)]),
        ]);
        assert_eq!(resp.into_bytes(), b"*2\r\n$2\r\nkk\r\n*1\r\n:1\r\n");
    }

    #[test]
    fn encode_propagation_frame() {
        let args = vec![Data::from("SET"), Data::from("a"), Data::from("1")];
        assert_eq!(
            encode_array(&args),
            b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n"
        );
    }
}
