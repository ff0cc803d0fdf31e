use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use fieldlink_protocol::HandshakeConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1:15000";

/// How often expired pre-keys and sessions are swept.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// Command-line arguments for the daemon.
#[derive(Debug)]
pub struct Args {
    pub bind: SocketAddr,
    pub users: Option<PathBuf>,
    pub handshake: HandshakeConfig,
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = args.into_iter();
    let mut bind = DEFAULT_BIND.to_string();
    let mut users = None;
    let mut handshake = HandshakeConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => bind = value(&mut args, &arg)?,
            "--users" => users = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--prekey-ttl-secs" => handshake.prekey_ttl = seconds(&mut args, &arg)?,
            "--session-ttl-secs" => handshake.session_ttl = seconds(&mut args, &arg)?,
            "--envelope-ttl-secs" => handshake.envelope.ttl = seconds(&mut args, &arg)?,
            other => tracing::warn!(arg = %other, "ignoring unknown argument"),
        }
    }

    let bind = bind
        .parse()
        .with_context(|| format!("invalid --bind address {bind:?}"))?;

    Ok(Args {
        bind,
        users,
        handshake,
    })
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{flag} requires a value"))
}

fn seconds(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<Duration> {
    let raw = value(args, flag)?;
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("{flag} expects whole seconds, got {raw:?}"))?;
    if secs == 0 {
        anyhow::bail!("{flag} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
