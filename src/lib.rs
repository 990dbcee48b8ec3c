pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod server;
pub mod stream;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{RelayError, Result};
pub use frame::Frame;
pub use ingest::{BatchReport, IngestionGateway};
pub use pipeline::{BufferStats, Enqueued, FrameBuffer, FrameQueue, FrameStore};
pub use stream::StreamPacer;

/// File read when `FRAMERELAY_CONFIG` is unset. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "framerelay.toml";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub buffer: BufferConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_body_bytes: usize,
}

/// Which buffer sits between ingestion and the viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferMode {
    /// Single slot, newest frame wins, re-read on every tick.
    Latest,
    /// Bounded backlog drained in arrival order.
    Fifo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub mode: BufferMode,
    pub capacity: usize,
    /// Wait for room in a full FIFO before dropping. A batch upload spends
    /// this once for all of its entries, not once per entry.
    pub enqueue_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Tick period. Falls back to the mode default when unset.
    pub interval_ms: Option<u64>,
    pub dequeue_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            mode: BufferMode::Latest,
            capacity: 300,
            enqueue_timeout_ms: 0,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: None,
            dequeue_timeout_ms: 1000,
        }
    }
}

impl BufferMode {
    /// Output rate ceiling when no interval is configured:
    /// ~30 Hz for latest-only, ~14 Hz for the FIFO backlog.
    pub fn default_interval(self) -> Duration {
        match self {
            BufferMode::Latest => Duration::from_millis(30),
            BufferMode::Fifo => Duration::from_millis(71),
        }
    }
}

impl Config {
    /// Load from `FRAMERELAY_CONFIG` (or `framerelay.toml`), then
    /// `FRAMERELAY__SECTION__KEY` variables, then `PORT`.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("FRAMERELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let built = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("FRAMERELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        let config: Config = built.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer.capacity == 0 {
            return Err(RelayError::invalid_config("buffer.capacity must be at least 1"));
        }
        if self.stream.interval_ms == Some(0) {
            return Err(RelayError::invalid_config("stream.interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn tick_interval(&self) -> Duration {
        self.stream
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.buffer.mode.default_interval())
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer.enqueue_timeout_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.stream.dequeue_timeout_ms)
    }

    /// Build the shared buffer selected by `buffer.mode`.
    pub fn build_buffer(&self) -> Result<FrameBuffer> {
        match self.buffer.mode {
            BufferMode::Latest => Ok(FrameBuffer::latest()),
            BufferMode::Fifo => FrameBuffer::fifo(
                self.buffer.capacity,
                self.enqueue_timeout(),
                self.dequeue_timeout(),
            ),
        }
    }
}
