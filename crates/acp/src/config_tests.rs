// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;
use crate::test_support::AnyhowExt;

fn parse(args: &[&str]) -> anyhow::Result<Config> {
    let mut argv = vec!["fluffy-acp"];
    argv.extend_from_slice(args);
    Config::try_parse_from(argv).anyhow()
}

#[test]
fn requires_a_transport() -> anyhow::Result<()> {
    let config = parse(&[])?;
    assert!(config.validate().is_err());

    assert!(parse(&["--pipe"])?.validate().is_ok());
    assert!(parse(&["--socket", "/tmp/fluffy.sock"])?.validate().is_ok());
    assert!(parse(&["--port", "8123"])?.validate().is_ok());
    Ok(())
}

#[test]
fn rejects_unknown_slow_client_policy() -> anyhow::Result<()> {
    let config = parse(&["--pipe", "--slow-client-policy", "drop_everything"])?;
    assert!(config.validate().is_err());

    let config = parse(&["--pipe", "--slow-client-policy", "disconnect"])?;
    config.validate()?;
    assert_eq!(config.slow_policy(), crate::transport::SlowClientPolicy::Disconnect);
    Ok(())
}

#[test]
fn durations_derive_from_raw_fields() -> anyhow::Result<()> {
    let config = parse(&["--pipe", "--request-timeout-ms", "250", "--session-timeout-secs", "7"])?;
    assert_eq!(config.request_timeout(), std::time::Duration::from_millis(250));
    assert_eq!(config.session_timeout(), std::time::Duration::from_secs(7));
    Ok(())
}

#[test]
fn capabilities_default_to_granted() -> anyhow::Result<()> {
    let config = parse(&["--pipe"])?;
    let caps = config.capabilities();
    assert!(caps.text_access);
    assert!(caps.clipboard_access);

    let config = parse(&["--pipe", "--text-access", "false", "--clipboard-access", "false"])?;
    let caps = config.capabilities();
    assert!(!caps.text_access);
    assert!(!caps.clipboard_access);
    Ok(())
}

#[test]
fn zero_timeout_is_rejected() -> anyhow::Result<()> {
    let config = parse(&["--pipe", "--request-timeout-ms", "0"])?;
    assert!(config.validate().is_err());
    Ok(())
}
