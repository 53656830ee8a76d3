//! # Runtime Images
//!
//! Where the runtime image comes from. An image is a Wasm module (binary or
//! text format) that is registered as the runtime before any definition.
//!
//! Fetches are one-shot and best effort: no retries, no checksum.

use std::path::PathBuf;

use tracing::debug;

/// Version of the embedded prelude image.
pub const IMAGE_VERSION: &str = "0.1.0";

/// The embedded prelude image, pinned at [`IMAGE_VERSION`].
pub const PRELUDE_WAT: &str = include_str!("../images/prelude.wat");

#[derive(Debug)]
pub enum Error {
    Io { path: PathBuf, source: std::io::Error },
    Http { url: String, source: reqwest::Error },
    Status { url: String, status: u16 },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Could not read image {}: {}", path.display(), source)
            }
            Self::Http { url, source } => write!(f, "Could not fetch image {}: {}", url, source),
            Self::Status { url, status } => {
                write!(f, "Could not fetch image {}: HTTP status {}", url, status)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Location of a runtime image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ImageLocation {
    /// The prelude compiled into this crate.
    #[default]
    Embedded,
    File(PathBuf),
    Url(String),
}

impl ImageLocation {
    /// Interprets a location string: `embedded`, an `http(s)://` URL, or a path.
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.eq_ignore_ascii_case("embedded") {
            Self::Embedded
        } else if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::File(PathBuf::from(location))
        }
    }

    /// Fetches the image bytes.
    pub async fn fetch(&self) -> Result<Vec<u8>> {
        debug!(location = %self, "fetching runtime image");
        match self {
            Self::Embedded => Ok(PRELUDE_WAT.as_bytes().to_vec()),
            Self::File(path) => tokio::fs::read(path).await.map_err(|source| Error::Io {
                path: path.clone(),
                source,
            }),
            Self::Url(url) => {
                let response = reqwest::get(url).await.map_err(|source| Error::Http {
                    url: url.clone(),
                    source,
                })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Error::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                let bytes = response.bytes().await.map_err(|source| Error::Http {
                    url: url.clone(),
                    source,
                })?;
                Ok(bytes.to_vec())
            }
        }
    }
}

impl std::fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded prelude v{}", IMAGE_VERSION),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}
