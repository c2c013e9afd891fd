/*
 * Created on Fri Mar 01 2024
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

//! End-to-end tests: a real server task on a real socket, driven with raw
//! wire frames

use crate::config::SnapshotConfig;
use crate::corestore::Corestore;
use crate::dbnet;
use crate::queryengine::Services;
use crate::replication::{ReplicationState, Role};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const TIMEOUT: Duration = Duration::from_secs(5);

/// Boot a server on an ephemeral port; returns the service handles and the
/// bound port
async fn start_server(role: Role) -> (Services, u16) {
    let repl = ReplicationState::new(role);
    let svc = Services {
        db: Corestore::new(),
        repl,
        snapshot: SnapshotConfig::default(),
        port: 0,
    };
    let (signal, _) = broadcast::channel(1);
    let mut listener = dbnet::connect(&svc, LOCALHOST, 0, 128, signal)
        .await
        .expect("failed to bind an ephemeral port");
    let port = listener
        .base
        .listener
        .local_addr()
        .expect("the listener has a local address")
        .port();
    let svc_out = Services {
        port,
        ..svc.clone()
    };
    tokio::spawn(async move {
        let _ = listener.run().await;
    });
    // followers learn their own port from the services they carry
    if !svc_out.repl.is_primary() {
        tokio::spawn(crate::replication::follower::run(svc_out.clone()));
    }
    (svc_out, port)
}

struct Client {
    stream: TcpStream,
}

impl Client {
    async fn connect(port: u16) -> Self {
        let stream = timeout(TIMEOUT, TcpStream::connect((LOCALHOST, port)))
            .await
            .expect("connect timed out")
            .expect("connect failed");
        Client { stream }
    }
    async fn send(&mut self, frame: &[u8]) {
        self.stream.write_all(frame).await.expect("send failed");
        self.stream.flush().await.expect("flush failed");
    }
    /// Read exactly as many bytes as the expectation and compare
    async fn expect(&mut self, expected: &[u8]) {
        let mut got = vec![0u8; expected.len()];
        timeout(TIMEOUT, self.stream.read_exact(&mut got))
            .await
            .expect("reply timed out")
            .expect("peer closed early");
        assert_eq!(
            got,
            expected,
            "got {:?}, expected {:?}",
            String::from_utf8_lossy(&got),
            String::from_utf8_lossy(expected)
        );
    }
    async fn roundtrip(&mut self, frame: &[u8], expected: &[u8]) {
        self.send(frame).await;
        self.expect(expected).await;
    }
}

#[tokio::test]
async fn e2e_ping() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n")
        .await;
}

#[tokio::test]
async fn e2e_set_then_get() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n", b"+OK\r\n")
        .await;
    client
        .roundtrip(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n", b"$3\r\nbar\r\n")
        .await;
    client
        .roundtrip(b"*2\r\n$3\r\nGET\r\n$4\r\nnone\r\n", b"$-1\r\n")
        .await;
}

#[tokio::test]
async fn e2e_inline_commands() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client.roundtrip(b"PING\r\n", b"+PONG\r\n").await;
    client.roundtrip(b"set ik iv\r\n", b"+OK\r\n").await;
    client.roundtrip(b"get ik\r\n", b"$2\r\niv\r\n").await;
}

#[tokio::test]
async fn e2e_blocking_pop_is_woken_by_a_push() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut blocked = Client::connect(port).await;
    let mut pusher = Client::connect(port).await;
    blocked
        .send(b"*3\r\n$5\r\nBLPOP\r\n$2\r\nkk\r\n$1\r\n0\r\n")
        .await;
    // give the waiter time to park
    sleep(Duration::from_millis(100)).await;
    pusher
        .roundtrip(b"*3\r\n$5\r\nLPUSH\r\n$2\r\nkk\r\n$3\r\nval\r\n", b":1\r\n")
        .await;
    blocked.expect(b"*2\r\n$2\r\nkk\r\n$3\r\nval\r\n").await;
}

#[tokio::test]
async fn e2e_blocking_pop_times_out_with_a_null_array() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(
            b"*3\r\n$5\r\nBLPOP\r\n$2\r\nzk\r\n$4\r\n0.05\r\n",
            b"*-1\r\n",
        )
        .await;
}

#[tokio::test]
async fn e2e_stream_add_and_range() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(
            b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\nf\r\n$1\r\nv\r\n",
            b"$3\r\n1-1\r\n",
        )
        .await;
    client
        .roundtrip(
            b"*4\r\n$6\r\nXRANGE\r\n$1\r\ns\r\n$1\r\n-\r\n$1\r\n+\r\n",
            b"*1\r\n*2\r\n$3\r\n1-1\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n",
        )
        .await;
    // at or below the top is refused
    client.send(b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\nf\r\n$1\r\nv\r\n").await;
    client
        .expect(b"-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n")
        .await;
}

#[tokio::test]
async fn e2e_transaction() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client.roundtrip(b"*1\r\n$5\r\nMULTI\r\n", b"+OK\r\n").await;
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$1\r\n1\r\n", b"+QUEUED\r\n")
        .await;
    client
        .roundtrip(b"*2\r\n$4\r\nINCR\r\n$1\r\nx\r\n", b"+QUEUED\r\n")
        .await;
    client
        .roundtrip(b"*1\r\n$4\r\nEXEC\r\n", b"*2\r\n+OK\r\n:2\r\n")
        .await;
    client
        .roundtrip(b"*2\r\n$3\r\nGET\r\n$1\r\nx\r\n", b"$1\r\n2\r\n")
        .await;
}

#[tokio::test]
async fn e2e_list_surface() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(
            b"*5\r\n$5\r\nRPUSH\r\n$2\r\nlk\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n",
            b":3\r\n",
        )
        .await;
    client
        .roundtrip(
            b"*4\r\n$6\r\nLRANGE\r\n$2\r\nlk\r\n$1\r\n0\r\n$2\r\n-1\r\n",
            b"*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n",
        )
        .await;
    client
        .roundtrip(b"*2\r\n$4\r\nLLEN\r\n$2\r\nlk\r\n", b":3\r\n")
        .await;
    client
        .roundtrip(b"*3\r\n$6\r\nLINDEX\r\n$2\r\nlk\r\n$2\r\n-1\r\n", b"$1\r\nc\r\n")
        .await;
    // RPOP with a count is ordered most-recently-appended first
    client
        .roundtrip(
            b"*3\r\n$4\r\nRPOP\r\n$2\r\nlk\r\n$1\r\n2\r\n",
            b"*2\r\n$1\r\nc\r\n$1\r\nb\r\n",
        )
        .await;
    // the emptied record keeps its kind
    client
        .roundtrip(b"*3\r\n$4\r\nLPOP\r\n$2\r\nlk\r\n$1\r\n5\r\n", b"*1\r\n$1\r\na\r\n")
        .await;
    client
        .roundtrip(b"*2\r\n$4\r\nTYPE\r\n$2\r\nlk\r\n", b"+list\r\n")
        .await;
    // wrong-type checks on the wire
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$2\r\nsk\r\n$1\r\nv\r\n", b"+OK\r\n")
        .await;
    client
        .roundtrip(
            b"*3\r\n$5\r\nLPUSH\r\n$2\r\nsk\r\n$1\r\nx\r\n",
            b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
        )
        .await;
}

#[tokio::test]
async fn e2e_config_and_del() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(
            b"*3\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$3\r\ndir\r\n",
            b"*2\r\n$3\r\ndir\r\n$1\r\n.\r\n",
        )
        .await;
    client
        .roundtrip(
            b"*3\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$7\r\nnothere\r\n",
            b"*0\r\n",
        )
        .await;
    client
        .roundtrip(
            b"*4\r\n$6\r\nCONFIG\r\n$3\r\nSET\r\n$3\r\ndir\r\n$4\r\n/tmp\r\n",
            b"-ERR CONFIG SET is not supported\r\n",
        )
        .await;
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$2\r\nd1\r\n$1\r\nv\r\n", b"+OK\r\n")
        .await;
    client
        .roundtrip(
            b"*3\r\n$3\r\nDEL\r\n$2\r\nd1\r\n$2\r\nd2\r\n",
            b":1\r\n",
        )
        .await;
    client
        .roundtrip(b"*2\r\n$4\r\nTYPE\r\n$2\r\nd1\r\n", b"+none\r\n")
        .await;
}

#[tokio::test]
async fn e2e_undo_reply_shape() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client.roundtrip(b"*1\r\n$5\r\nMULTI\r\n", b"+OK\r\n").await;
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\n1\r\n", b"+QUEUED\r\n")
        .await;
    client
        .roundtrip(
            b"*2\r\n$4\r\nUNDO\r\n$1\r\n1\r\n",
            b"*3\r\n$19\r\nRemoved 1 commands:\r\n$7\r\nSET k 1\r\n$29\r\n0 commands remaining in queue\r\n",
        )
        .await;
    client
        .roundtrip(b"*1\r\n$4\r\nEXEC\r\n", b"*0\r\n")
        .await;
    client
        .roundtrip(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$-1\r\n")
        .await;
}

#[tokio::test]
async fn e2e_counter_errors_on_the_wire() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$1\r\nn\r\n$3\r\nabc\r\n", b"+OK\r\n")
        .await;
    client
        .roundtrip(
            b"*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n",
            b"-ERR value is not an integer or out of range\r\n",
        )
        .await;
}

#[tokio::test]
async fn e2e_brpop_takes_the_tail() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut blocked = Client::connect(port).await;
    let mut pusher = Client::connect(port).await;
    blocked
        .send(b"*3\r\n$5\r\nBRPOP\r\n$2\r\nbk\r\n$1\r\n0\r\n")
        .await;
    sleep(Duration::from_millis(100)).await;
    pusher
        .roundtrip(
            b"*4\r\n$5\r\nRPUSH\r\n$2\r\nbk\r\n$1\r\na\r\n$1\r\nb\r\n",
            b":2\r\n",
        )
        .await;
    // the immediate wake pops one element off the tail
    blocked.expect(b"*2\r\n$2\r\nbk\r\n$1\r\nb\r\n").await;
    pusher
        .roundtrip(b"*2\r\n$4\r\nLLEN\r\n$2\r\nbk\r\n", b":1\r\n")
        .await;
}

#[tokio::test]
async fn e2e_xread_blocks_until_an_append() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut reader = Client::connect(port).await;
    let mut writer = Client::connect(port).await;
    // $ resolves to the current top; only a later append can wake us
    reader
        .send(b"*6\r\n$5\r\nXREAD\r\n$5\r\nBLOCK\r\n$1\r\n0\r\n$7\r\nSTREAMS\r\n$2\r\nxs\r\n$1\r\n$\r\n")
        .await;
    sleep(Duration::from_millis(100)).await;
    writer
        .roundtrip(
            b"*5\r\n$4\r\nXADD\r\n$2\r\nxs\r\n$3\r\n5-1\r\n$1\r\nf\r\n$1\r\nv\r\n",
            b"$3\r\n5-1\r\n",
        )
        .await;
    reader
        .expect(b"*1\r\n*2\r\n$2\r\nxs\r\n*1\r\n*2\r\n$3\r\n5-1\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n")
        .await;
}

#[tokio::test]
async fn e2e_xread_without_block_returns_null_when_empty() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(
            b"*4\r\n$5\r\nXREAD\r\n$7\r\nSTREAMS\r\n$2\r\nno\r\n$3\r\n0-0\r\n",
            b"*-1\r\n",
        )
        .await;
}

#[tokio::test]
async fn e2e_counter_delta_asymmetry() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client
        .roundtrip(
            b"*3\r\n$6\r\nINCRBY\r\n$1\r\nc\r\n$2\r\n-5\r\n",
            b"-ERR increment amount must be positive\r\n",
        )
        .await;
    client
        .roundtrip(b"*3\r\n$6\r\nDECRBY\r\n$1\r\nc\r\n$2\r\n-5\r\n", b":5\r\n")
        .await;
    client
        .roundtrip(b"*3\r\n$6\r\nINCRBY\r\n$1\r\nc\r\n$1\r\n0\r\n", b":5\r\n")
        .await;
}

#[tokio::test]
async fn e2e_info_reports_the_role() {
    let (_svc, port) = start_server(Role::Primary).await;
    let mut client = Client::connect(port).await;
    client.send(b"*1\r\n$4\r\nINFO\r\n").await;
    // the reply is one bulk; read its header, then the body
    let mut header = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        client.stream.read_exact(&mut byte).await.unwrap();
        header.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    assert_eq!(header[0], b'$');
    let len: usize = String::from_utf8_lossy(&header[1..header.len() - 2])
        .parse()
        .unwrap();
    let mut body = vec![0u8; len + 2];
    client.stream.read_exact(&mut body).await.unwrap();
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("# Replication"));
    assert!(body.contains("role:master"));
    assert!(body.contains("connected_slaves:0"));
}

#[tokio::test]
async fn e2e_replication_propagates_writes() {
    let (primary_svc, primary_port) = start_server(Role::Primary).await;
    let (follower_svc, _follower_port) = start_server(Role::Follower {
        host: "127.0.0.1".to_owned(),
        port: primary_port,
    })
    .await;

    // wait for the handshake to land
    for _ in 0..100 {
        if primary_svc.repl.follower_count() == 1 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(primary_svc.repl.follower_count(), 1, "handshake never completed");

    let mut client = Client::connect(primary_port).await;
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n", b"+OK\r\n")
        .await;
    client
        .roundtrip(b"*3\r\n$3\r\nSET\r\n$1\r\nb\r\n$1\r\n2\r\n", b"+OK\r\n")
        .await;

    // the follower applies without replying to anyone
    for _ in 0..100 {
        if follower_svc.db.get(b"b").is_some() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        follower_svc.db.get(b"a"),
        Some(crate::corestore::Data::from("1"))
    );
    assert_eq!(
        follower_svc.db.get(b"b"),
        Some(crate::corestore::Data::from("2"))
    );

    // and its acks satisfy WAIT at the primary
    client
        .roundtrip(b"*3\r\n$4\r\nWAIT\r\n$1\r\n1\r\n$4\r\n1000\r\n", b":1\r\n")
        .await;
}

#[tokio::test]
async fn e2e_follower_applies_a_counter_run() {
    let (primary_svc, primary_port) = start_server(Role::Primary).await;
    let (follower_svc, _) = start_server(Role::Follower {
        host: "127.0.0.1".to_owned(),
        port: primary_port,
    })
    .await;
    for _ in 0..100 {
        if primary_svc.repl.follower_count() == 1 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    let mut client = Client::connect(primary_port).await;
    for expected in [b":1\r\n", b":2\r\n", b":3\r\n", b":4\r\n", b":5\r\n"] {
        client
            .roundtrip(b"*2\r\n$4\r\nINCR\r\n$1\r\nx\r\n", expected)
            .await;
    }
    for _ in 0..100 {
        if follower_svc.db.get(b"x") == Some(crate::corestore::Data::from("5")) {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        follower_svc.db.get(b"x"),
        Some(crate::corestore::Data::from("5"))
    );
}
