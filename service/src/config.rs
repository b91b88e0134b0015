use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::sync::Arc;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Period in milliseconds between keep-alive heartbeat comments
    #[arg(long, env, default_value_t = sse::config::DEFAULT_HEARTBEAT_INTERVAL_MS)]
    pub heartbeat_interval_ms: u64,

    /// Maximum buffered wire lines before a session forces a flush
    #[arg(long, env, default_value_t = sse::config::DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Minimum spacing in milliseconds between accepted sends (0 disables throttling)
    #[arg(long, env, default_value_t = sse::config::DEFAULT_THROTTLE_MS)]
    pub throttle_ms: u64,

    /// Ceiling on accepted sends per rolling 1-second window
    #[arg(long, env, default_value_t = sse::config::DEFAULT_MAX_REQUESTS_PER_SECOND)]
    pub max_requests_per_second: u32,

    /// Capacity of the per-session acknowledgement table
    #[arg(long, env, default_value_t = sse::config::DEFAULT_MAX_ACKNOWLEDGEMENTS)]
    pub max_acknowledgements: usize,

    /// Client reconnection hint in milliseconds, sent as the Retry header
    #[arg(long, env)]
    pub retry_ms: Option<u64>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// The per-session defaults every new stream is opened with.
    pub fn session_defaults(&self) -> sse::SessionConfig {
        let mut defaults = sse::SessionConfig::default()
            .with_heartbeat_interval_ms(self.heartbeat_interval_ms)
            .with_buffer_size(self.buffer_size)
            .with_throttle_ms(self.throttle_ms)
            .with_max_requests_per_second(self.max_requests_per_second)
            .with_max_acknowledgements(self.max_acknowledgements);
        if let Some(retry_ms) = self.retry_ms {
            defaults = defaults.with_retry(retry_ms);
        }
        defaults
    }

    /// The session manager configured from this process config.
    pub fn session_manager(&self) -> Arc<sse::Manager> {
        Arc::new(sse::Manager::new(self.session_defaults()))
    }
}
