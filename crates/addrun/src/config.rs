//! # Loader Configuration
//!
//! Defaults match a page that waits up to five seconds for its bootstrap
//! script. Every field can be overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `ADDRUN_POLL_ATTEMPTS` | `poll.attempts` |
//! | `ADDRUN_POLL_INTERVAL_MS` | `poll.interval` |
//! | `ADDRUN_IMAGE` | `image` (see [`ImageLocation::parse`]) |

use std::time::Duration;

use crate::image::ImageLocation;

/// Source of the addition definition registered after bootstrap.
pub const ADD_NUMBERS_WAT: &str = include_str!("../images/add_numbers.wat");

pub const ENV_POLL_ATTEMPTS: &str = "ADDRUN_POLL_ATTEMPTS";
pub const ENV_POLL_INTERVAL_MS: &str = "ADDRUN_POLL_INTERVAL_MS";
pub const ENV_IMAGE: &str = "ADDRUN_IMAGE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Invalid { var: &'static str, value: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid { var, value } => write!(f, "Invalid value for {}: '{}'", var, value),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Bounded fixed-interval polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Number of waits before giving up. The registry is checked once more
    /// than this, since the first check happens before any wait.
    pub attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Longest time the loader will wait for an entry point, saturating at
    /// `Duration::MAX`.
    pub fn max_wait(&self) -> Duration {
        self.interval.checked_mul(self.attempts).unwrap_or(Duration::MAX)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 50,
            interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub poll: PollPolicy,
    /// Image the host's entry point should load.
    pub image: ImageLocation,
    /// Wasm source of the definition registered once the runtime is up.
    /// It must export `add_numbers: (f64, f64) -> f64`.
    pub definition: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            image: ImageLocation::default(),
            definition: ADD_NUMBERS_WAT.to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_image(mut self, image: ImageLocation) -> Self {
        self.image = image;
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_POLL_ATTEMPTS) {
            config.poll.attempts = parse_number(ENV_POLL_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            config.poll.interval = Duration::from_millis(parse_number(ENV_POLL_INTERVAL_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_IMAGE) {
            if value.trim().is_empty() {
                return Err(Error::Invalid { var: ENV_IMAGE, value });
            }
            config.image = ImageLocation::parse(&value);
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::Invalid {
        var,
        value: value.to_string(),
    })
}
