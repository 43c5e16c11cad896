// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::*;
use crate::config::Config;
use crate::test_support::{named_widget, snapshot_of, spawn_ui};
use crate::widget::Role;

const TIMEOUT: Duration = Duration::from_secs(5);

struct SocketHarness {
    server: Arc<AcpServer>,
    path: PathBuf,
    _dir: tempfile::TempDir,
}

fn start(extra: &[&str]) -> anyhow::Result<SocketHarness> {
    let initial = snapshot_of(vec![named_widget("layer0:button:0", Role::Button, "Save")]);
    let (bridge, _probe, _ui) = spawn_ui(initial);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("acp.sock");
    let mut argv = vec!["fluffy-acp", "--socket", "unused"];
    argv.extend_from_slice(extra);
    let server = AcpServer::new(&Config::parse_from(argv), bridge);

    let listener = bind(&path)?;
    let accept_server = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = run(accept_server, listener).await;
    });
    Ok(SocketHarness { server, path, _dir: dir })
}

async fn connect(harness: &SocketHarness) -> anyhow::Result<(
    tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
    tokio::net::unix::OwnedWriteHalf,
)> {
    let stream = UnixStream::connect(&harness.path).await?;
    let (reader, writer) = stream.into_split();
    Ok((BufReader::new(reader).lines(), writer))
}

async fn send(writer: &mut tokio::net::unix::OwnedWriteHalf, line: &str) -> anyhow::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

async fn recv(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
) -> anyhow::Result<Value> {
    let line = tokio::time::timeout(TIMEOUT, lines.next_line())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for a line"))??
        .ok_or_else(|| anyhow::anyhow!("connection closed"))?;
    Ok(serde_json::from_str(&line)?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initialize_and_ping_over_socket() -> anyhow::Result<()> {
    let harness = start(&[])?;
    let (mut lines, mut writer) = connect(&harness).await?;

    send(
        &mut writer,
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"t","version":"0"}}}"#,
    )
    .await?;
    let resp = recv(&mut lines).await?;
    assert_eq!(resp["id"], 1);
    assert_eq!(resp["result"]["serverInfo"]["name"], "fluffyui");

    send(
        &mut writer,
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"ping"}}"#,
    )
    .await?;
    let resp = recv(&mut lines).await?;
    assert_eq!(resp["result"]["structuredContent"]["data"]["status"], "ok");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parse_errors_keep_the_connection_alive() -> anyhow::Result<()> {
    let harness = start(&[])?;
    let (mut lines, mut writer) = connect(&harness).await?;

    send(&mut writer, "{this is not json").await?;
    let resp = recv(&mut lines).await?;
    assert_eq!(resp["error"]["code"], -32700);

    // The connection survives the parse error.
    send(&mut writer, r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#).await?;
    let resp = recv(&mut lines).await?;
    assert_eq!(resp["id"], 3);
    assert!(resp["error"].is_null());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn each_connection_owns_a_session() -> anyhow::Result<()> {
    let harness = start(&[])?;
    let (mut lines_a, mut writer_a) = connect(&harness).await?;
    let (mut lines_b, mut writer_b) = connect(&harness).await?;

    send(&mut writer_a, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await?;
    send(&mut writer_b, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await?;
    recv(&mut lines_a).await?;
    recv(&mut lines_b).await?;

    assert_eq!(harness.server.sessions.count().await, 2);

    // Closing one connection tears down only its session.
    drop(writer_a);
    drop(lines_a);
    for _ in 0..100 {
        if harness.server.sessions.count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.server.sessions.count().await, 1);

    send(&mut writer_b, r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).await?;
    let resp = recv(&mut lines_b).await?;
    assert_eq!(resp["id"], 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bind_replaces_a_stale_socket() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("acp.sock");

    let first = bind(&path)?;
    drop(first);
    // A second bind over the leftover file succeeds.
    let _second = bind(&path)?;
    Ok(())
}
