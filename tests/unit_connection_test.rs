// tests/unit_connection_test.rs

use bytes::{Bytes, BytesMut};
use dilo::Connection;
use dilo::core::DiloError;
use dilo::core::protocol::{Command, RespCodec, RespFrame};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Decoder, Encoder};

/// Reads one request frame from the server side of the duplex pipe.
async fn read_request(server: &mut DuplexStream, buf: &mut BytesMut) -> Option<RespFrame> {
    loop {
        if let Some(frame) = RespCodec.decode(buf).unwrap() {
            return Some(frame);
        }
        let n = server.read_buf(buf).await.unwrap();
        if n == 0 {
            return None;
        }
    }
}

async fn write_reply(server: &mut DuplexStream, frame: RespFrame) {
    let mut out = BytesMut::new();
    RespCodec.encode(frame, &mut out).unwrap();
    server.write_all(&out).await.unwrap();
}

#[tokio::test]
async fn test_call_request_and_reply() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut conn = Connection::new(client);

    let server_task = tokio::spawn(async move {
        let mut buf = BytesMut::new();
        let request = read_request(&mut server, &mut buf).await.unwrap();
        assert_eq!(
            request,
            RespFrame::Array(vec![
                RespFrame::BulkString(Bytes::from_static(b"LLEN")),
                RespFrame::BulkString(Bytes::from_static(b"mylist")),
            ])
        );
        write_reply(&mut server, RespFrame::Integer(3)).await;
    });

    let reply = conn
        .call(&Command::new("LLEN").arg("mylist"))
        .await
        .unwrap();
    assert_eq!(reply, Some(RespFrame::Integer(3)));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_call_returns_none_on_clean_close() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut conn = Connection::new(client);

    // Server reads the request, then goes away without answering: a clean
    // close at the frame boundary is a null reply, not an error.
    let server_task = tokio::spawn(async move {
        let mut buf = BytesMut::new();
        read_request(&mut server, &mut buf).await.unwrap();
    });

    let reply = conn.call(&Command::new("PING")).await.unwrap();
    assert_eq!(reply, None);
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_eof_inside_frame_is_protocol_violation() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut conn = Connection::new(client);

    let server_task = tokio::spawn(async move {
        let mut buf = BytesMut::new();
        read_request(&mut server, &mut buf).await.unwrap();
        // Half a bulk string, then hang up.
        server.write_all(b"$5\r\nhel").await.unwrap();
    });

    let err = conn.call(&Command::new("GET").arg("k")).await.unwrap_err();
    assert!(matches!(err, DiloError::ProtocolViolation(_)));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_server_error_reply_keeps_connection_usable() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut conn = Connection::new(client);

    let server_task = tokio::spawn(async move {
        let mut buf = BytesMut::new();
        read_request(&mut server, &mut buf).await.unwrap();
        write_reply(
            &mut server,
            RespFrame::Error("ERR unknown command".to_string()),
        )
        .await;
        read_request(&mut server, &mut buf).await.unwrap();
        write_reply(&mut server, RespFrame::SimpleString(Bytes::from_static(b"PONG"))).await;
    });

    let err = conn.call(&Command::new("BOGUS")).await.unwrap_err();
    assert!(matches!(err, DiloError::ServerError(ref msg) if msg == "ERR unknown command"));

    // The error frame was fully consumed; the next call works.
    let pong = conn.ping().await.unwrap();
    assert_eq!(pong, Bytes::from_static(b"PONG"));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_error_nested_in_array_aborts_whole_reply() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut conn = Connection::new(client);

    let server_task = tokio::spawn(async move {
        let mut buf = BytesMut::new();
        read_request(&mut server, &mut buf).await.unwrap();
        write_reply(
            &mut server,
            RespFrame::Array(vec![
                RespFrame::SimpleString(Bytes::from_static(b"OK")),
                RespFrame::Error("ERR nested".to_string()),
                RespFrame::Integer(1),
            ]),
        )
        .await;
    });

    // The nested error becomes a failure for the whole reply, never one
    // array element.
    let err = conn.call(&Command::new("EXEC")).await.unwrap_err();
    assert!(matches!(err, DiloError::ServerError(ref msg) if msg == "ERR nested"));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_malformed_tag_from_server() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut conn = Connection::new(client);

    let server_task = tokio::spawn(async move {
        let mut buf = BytesMut::new();
        read_request(&mut server, &mut buf).await.unwrap();
        server.write_all(b"X123\r\n").await.unwrap();
    });

    let err = conn.call(&Command::new("PING")).await.unwrap_err();
    assert!(matches!(err, DiloError::ProtocolViolation(_)));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_split_frame_delivery_over_mock_transport() {
    // The reply arrives in two chunks; the decoder must wait for the rest of
    // the frame instead of erroring or truncating.
    let mock = tokio_test::io::Builder::new()
        .write(b"*1\r\n$4\r\nPING\r\n")
        .read(b"+PO")
        .read(b"NG\r\n")
        .build();
    let mut conn = Connection::new(mock);
    assert_eq!(conn.ping().await.unwrap(), Bytes::from_static(b"PONG"));
}

#[tokio::test]
async fn test_clean_close_over_mock_transport() {
    // No read actions scripted: the transport reports EOF right after the
    // request goes out, which is a null reply at the frame boundary.
    let mock = tokio_test::io::Builder::new()
        .write(b"*1\r\n$4\r\nPING\r\n")
        .build();
    let mut conn = Connection::new(mock);
    assert_eq!(conn.call(&Command::new("PING")).await.unwrap(), None);
}

#[tokio::test]
async fn test_truncated_frame_over_mock_transport() {
    // EOF in the middle of a bulk string must surface as a violation, not a
    // silently truncated value.
    let mock = tokio_test::io::Builder::new()
        .write(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
        .read(b"$5\r\nhel")
        .build();
    let mut conn = Connection::new(mock);
    let err = conn.call(&Command::new("GET").arg("k")).await.unwrap_err();
    assert!(matches!(err, DiloError::ProtocolViolation(_)));
}

#[tokio::test]
async fn test_last_used_advances_on_call() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut conn = Connection::new(client);
    let created = conn.created_at();
    let before = conn.last_used_at();

    let server_task = tokio::spawn(async move {
        let mut buf = BytesMut::new();
        read_request(&mut server, &mut buf).await.unwrap();
        write_reply(&mut server, RespFrame::SimpleString(Bytes::from_static(b"PONG"))).await;
    });

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    conn.ping().await.unwrap();

    assert_eq!(conn.created_at(), created);
    assert!(conn.last_used_at() > before);
    server_task.await.unwrap();
}
