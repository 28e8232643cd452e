use anyhow::{Context, Result, bail};
use prhook_bitbucket::{EventKey, parse_pull_request};
use prhook_core::{config::Config, models::EventRecord};
use typed_path::Utf8NativePathBuf;

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    Ok(Utf8NativePathBuf::from(value))
}

pub fn load_config(path: &Utf8NativePathBuf) -> Result<Config> {
    Config::load(path.with_platform_encoding())
}

/// Read a saved webhook payload as if it had been delivered with `key`.
pub fn read_event(path: &Utf8NativePathBuf, key: &str) -> Result<EventRecord> {
    let key = EventKey::parse(key);
    let Some(status) = key.status() else {
        bail!("Event {} does not trigger builds", key);
    };
    let data = std::fs::read(path.with_platform_encoding())
        .with_context(|| format!("Failed to read {}", path))?;
    parse_pull_request(status, &data).with_context(|| format!("Failed to parse {}", path))
}
