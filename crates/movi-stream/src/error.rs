use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("media error: {0}")]
    Media(#[from] movi_media::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no streamer available for url: {0}")]
    UnsupportedUrl(String),

    #[error("server answered {0}")]
    BadStatus(reqwest::StatusCode),
}

pub type Result<T> = std::result::Result<T, Error>;
