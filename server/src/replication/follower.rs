/*
 * Created on Sat Feb 24 2024
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

//! # The follower-side primary connection
//!
//! One task that dials the primary, walks the handshake state machine
//! (ping, listening-port, capabilities, sync), swallows the snapshot bulk and
//! then applies the propagated write stream without replying. Any deviation
//! tears the task down; the process does not retry.

use crate::corestore::Data;
use crate::protocol::{ParseError, Parser};
use crate::queryengine::{self, Services, Session};
use crate::resp::writer::encode_array;
use bytes::{Buf, BytesMut};
use libcrimson::BUF_CAP;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Entry point: spawned at startup when the server was told it has a primary
pub async fn run(svc: Services) {
    let (host, port) = match svc.repl.primary_addr() {
        Some(addr) => addr,
        None => return,
    };
    log::info!("starting replication handshake with primary {host}:{port}");
    if let Err(e) = replicate_from(&svc, &host, port).await {
        log::error!("replication link to {host}:{port} failed: {e}");
    }
}

async fn replicate_from(svc: &Services, host: &str, port: u16) -> IoResult<()> {
    let mut stream = TcpStream::connect((host, port)).await?;
    let mut buffer = BytesMut::with_capacity(BUF_CAP);

    // the four-step handshake; every reply is one line
    send_frame(&mut stream, &["PING"]).await?;
    expect_line(&mut stream, &mut buffer, "+PONG").await?;
    let own_port = svc.port.to_string();
    send_frame(
        &mut stream,
        &["REPLCONF", "listening-port", own_port.as_str()],
    )
    .await?;
    expect_line(&mut stream, &mut buffer, "+OK").await?;
    send_frame(&mut stream, &["REPLCONF", "capa", "psync2"]).await?;
    expect_line(&mut stream, &mut buffer, "+OK").await?;
    send_frame(&mut stream, &["PSYNC", "?", "-1"]).await?;
    let line = read_line(&mut stream, &mut buffer).await?;
    if !line.starts_with("+FULLRESYNC") {
        return Err(protocol_err(format!("unexpected PSYNC reply: {line}")));
    }
    log::info!("primary granted a full resync: {}", line.trim_end());

    // the dataset arrives as one bulk with no trailing CRLF after the bytes
    let header = read_line(&mut stream, &mut buffer).await?;
    let size: usize = header
        .strip_prefix('$')
        .and_then(|len| len.trim_end().parse().ok())
        .ok_or_else(|| protocol_err(format!("bad snapshot header: {header}")))?;
    let snapshot = read_exact_buffered(&mut stream, &mut buffer, size).await?;
    validate_snapshot_header(&snapshot)?;
    log::info!("snapshot of {size} bytes received, streaming writes now");

    // STREAMING: apply frames as local writes, reply with nothing but acks
    let mut session = Session::new();
    loop {
        let (query, advance) = match Parser::parse(&buffer) {
            Ok(parsed) => parsed,
            Err(ParseError::NotEnough) => {
                if stream.read_buf(&mut buffer).await? == 0 {
                    log::warn!("primary closed the replication link");
                    return Ok(());
                }
                continue;
            }
            Err(_) => return Err(protocol_err("corrupt frame on the replication link")),
        };
        buffer.advance(advance);
        apply(svc, &mut session, &mut stream, query.args, advance as u64).await?;
    }
}

/// Apply one propagated frame. Writes run through the ordinary dispatcher
/// with the reply discarded; `REPLCONF getack` elicits an ack; anything else
/// is noise on this link
async fn apply(
    svc: &Services,
    session: &mut Session,
    stream: &mut TcpStream,
    args: Vec<Data>,
    frame_len: u64,
) -> IoResult<()> {
    let verb = match args.first() {
        Some(verb) => String::from_utf8_lossy(verb).to_uppercase(),
        None => return Ok(()),
    };
    let applied = svc.repl.add_applied(frame_len).to_string();
    if queryengine::is_write_action(&verb) {
        if let Err(e) = queryengine::run_action(svc, session, &verb, &args).await {
            log::warn!("applying propagated {verb} failed: {e:?}");
        }
        send_frame(stream, &["REPLCONF", "ACK", applied.as_str()]).await?;
    } else if verb == "REPLCONF" && args.get(1).map_or(false, |a| a.eq_ignore_ascii_case(b"GETACK"))
    {
        send_frame(stream, &["REPLCONF", "ACK", applied.as_str()]).await?;
    } else {
        log::debug!("ignoring {verb} on the replication link");
    }
    Ok(())
}

/// Five magic bytes and a four-digit ASCII version
fn validate_snapshot_header(blob: &[u8]) -> IoResult<()> {
    if blob.len() < 9 || &blob[..5] != b"REDIS" {
        return Err(protocol_err("snapshot blob lacks the magic header"));
    }
    if !blob[5..9].iter().all(u8::is_ascii_digit) {
        return Err(protocol_err("snapshot blob carries a malformed version"));
    }
    Ok(())
}

async fn send_frame(stream: &mut TcpStream, args: &[&str]) -> IoResult<()> {
    let args: Vec<Data> = args
        .iter()
        .map(|arg| Data::copy_from_slice(arg.as_bytes()))
        .collect();
    stream.write_all(&encode_array(&args)).await?;
    stream.flush().await
}

/// Read one CRLF (or LF) terminated line through the buffer
async fn read_line(stream: &mut TcpStream, buffer: &mut BytesMut) -> IoResult<String> {
    loop {
        if let Some(at) = buffer.iter().position(|b| *b == b'\n') {
            let line = buffer.split_to(at + 1);
            return Ok(String::from_utf8_lossy(&line).trim_end().to_owned());
        }
        if stream.read_buf(buffer).await? == 0 {
            return Err(IoError::from(ErrorKind::ConnectionReset));
        }
    }
}

async fn expect_line(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    expected: &str,
) -> IoResult<()> {
    let line = read_line(stream, buffer).await?;
    if line == expected {
        Ok(())
    } else {
        Err(protocol_err(format!(
            "expected {expected} from the primary, got {line}"
        )))
    }
}

/// Take exactly `n` bytes, draining the buffer first
async fn read_exact_buffered(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    n: usize,
) -> IoResult<Vec<u8>> {
    while buffer.len() < n {
        if stream.read_buf(buffer).await? == 0 {
            return Err(IoError::from(ErrorKind::UnexpectedEof));
        }
    }
    Ok(buffer.split_to(n).to_vec())
}

fn protocol_err(msg: impl Into<String>) -> IoError {
    IoError::new(ErrorKind::InvalidData, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv;
    use crate::config::SnapshotConfig;
    use crate::corestore::{Corestore, Data};
    use crate::replication::{ReplicationState, Role};
    use tokio::io::AsyncReadExt;

    fn follower_services() -> Services {
        Services {
            db: Corestore::new(),
            repl: ReplicationState::new(Role::Follower {
                host: "127.0.0.1".to_owned(),
                port: 1,
            }),
            snapshot: SnapshotConfig::default(),
            port: 0,
        }
    }

    /// A connected socket pair: the follower's end and the fake primary's end
    async fn link() -> (TcpStream, TcpStream) {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let (follower_end, primary_end) =
            tokio::join!(TcpStream::connect(addr), listener.accept());
        (follower_end.unwrap(), primary_end.unwrap().0)
    }

    async fn expect_ack(primary_end: &mut TcpStream, offset: u64) {
        let mut ack = argv!["REPLCONF", "ACK"];
        ack.push(Data::from_string(offset.to_string()));
        let expected = encode_array(&ack);
        let mut got = vec![0u8; expected.len()];
        primary_end.read_exact(&mut got).await.unwrap();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn applied_writes_advance_the_offset_and_ack() {
        let svc = follower_services();
        let mut session = Session::new();
        let (mut follower_end, mut primary_end) = link().await;
        let set = argv!["SET", "a", "1"];
        let set_len = encode_array(&set).len() as u64;
        apply(&svc, &mut session, &mut follower_end, set, set_len)
            .await
            .unwrap();
        expect_ack(&mut primary_end, set_len).await;
        assert_eq!(svc.db.get(b"a"), Some(Data::from("1")));
        assert_eq!(svc.repl.applied_offset(), set_len);
    }

    #[tokio::test]
    async fn getack_elicits_an_ack_with_the_applied_offset() {
        let svc = follower_services();
        let mut session = Session::new();
        let (mut follower_end, mut primary_end) = link().await;
        // land one write so the acknowledged offset is not trivially zero
        let set = argv!["SET", "x", "9"];
        let set_len = encode_array(&set).len() as u64;
        apply(&svc, &mut session, &mut follower_end, set, set_len)
            .await
            .unwrap();
        expect_ack(&mut primary_end, set_len).await;
        // the probe itself counts toward the applied stream
        let getack = argv!["REPLCONF", "GETACK", "*"];
        let getack_len = encode_array(&getack).len() as u64;
        apply(&svc, &mut session, &mut follower_end, getack, getack_len)
            .await
            .unwrap();
        expect_ack(&mut primary_end, set_len + getack_len).await;
    }

    #[tokio::test]
    async fn non_write_noise_is_swallowed_without_a_reply() {
        let svc = follower_services();
        let mut session = Session::new();
        let (mut follower_end, mut primary_end) = link().await;
        let ping = argv!["PING"];
        let ping_len = encode_array(&ping).len() as u64;
        apply(&svc, &mut session, &mut follower_end, ping, ping_len)
            .await
            .unwrap();
        // the frame still counts as consumed stream, but nothing goes back:
        // the next thing the primary end reads is the ack for a real write
        assert_eq!(svc.repl.applied_offset(), ping_len);
        let set = argv!["SET", "k", "v"];
        let set_len = encode_array(&set).len() as u64;
        apply(&svc, &mut session, &mut follower_end, set, set_len)
            .await
            .unwrap();
        expect_ack(&mut primary_end, ping_len + set_len).await;
    }
}
