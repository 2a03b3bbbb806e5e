use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_DATA_DIR: &str = "data";

/// How collections are kept between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// One JSON file per collection under the data directory.
    Disk,
    /// Nothing is written; everything is lost on exit.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub storage: StorageMode,
}

impl Config {
    /// Reads `SCHOOL_ADDR`, `SCHOOL_DATA_DIR` and `SCHOOL_STORAGE`
    /// (`disk` or `memory`), honouring a `.env` file if one is present.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("SCHOOL_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr = addr
            .parse::<SocketAddr>()
            .with_context(|| format!("SCHOOL_ADDR `{}` is not a socket address", addr))?;

        let data_dir = lookup("SCHOOL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let storage = match lookup("SCHOOL_STORAGE").as_deref() {
            None | Some("disk") => StorageMode::Disk,
            Some("memory") => StorageMode::Memory,
            Some(other) => anyhow::bail!("SCHOOL_STORAGE must be `disk` or `memory`, got `{}`", other),
        };

        Ok(Self {
            addr,
            data_dir,
            storage,
        })
    }
}
