use bevy::asset::{io::Reader, AssetLoader, LoadContext};
use serde::{Deserialize, Serialize};
use std::{future::Future, path::PathBuf, pin::Pin};
use thiserror::Error;

use super::font::Font;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FontLoadError {
    /// An [IO](std::io) Error
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The bytes are not a font `owned_ttf_parser` can read
    #[error(transparent)]
    FontInvalid(#[from] owned_ttf_parser::FaceParsingError),
    #[error("no fetcher can load font source {0}")]
    UnsupportedSource(String),
    #[error("font request failed: {0}")]
    Http(String),
    /// A font file handed over from the `AssetServer` failed to load
    #[error("font asset failed to load: {0}")]
    Asset(String),
}

/// Where the bytes of a font come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSource {
    Local(PathBuf),
    Remote(String),
}

impl std::fmt::Display for FontSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontSource::Local(path) => write!(f, "{}", path.display()),
            FontSource::Remote(url) => f.write_str(url),
        }
    }
}

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, FontLoadError>> + Send>>;

/// Produces the raw bytes of a font source. Runs on the IO task pool.
pub trait FontFetcher: Send + Sync + 'static {
    fn fetch(&self, source: &FontSource) -> FetchFuture;
}

/// Reads local files and, with the `remote-fonts` feature, downloads URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFontFetcher;

impl FontFetcher for DefaultFontFetcher {
    fn fetch(&self, source: &FontSource) -> FetchFuture {
        let source = source.clone();
        Box::pin(async move {
            match source {
                FontSource::Local(path) => Ok(std::fs::read(path)?),
                FontSource::Remote(url) => fetch_remote(&url),
            }
        })
    }
}

#[cfg(feature = "remote-fonts")]
fn fetch_remote(url: &str) -> Result<Vec<u8>, FontLoadError> {
    let response = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .map_err(|err| FontLoadError::Http(err.to_string()))?;
    let bytes = response
        .bytes()
        .map_err(|err| FontLoadError::Http(err.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "remote-fonts"))]
fn fetch_remote(url: &str) -> Result<Vec<u8>, FontLoadError> {
    Err(FontLoadError::UnsupportedSource(url.to_string()))
}

#[derive(Default)]
pub struct FontLoader;

impl AssetLoader for FontLoader {
    type Asset = Font;
    type Settings = ();
    type Error = FontLoadError;
    fn load<'a>(
        &'a self,
        reader: &'a mut Reader,
        _settings: &'a (),
        _load_context: &'a mut LoadContext,
    ) -> Pin<Box<dyn Future<Output = Result<Font, Self::Error>> + Send + 'a>> {
        Box::pin(async move {
            let mut bytes = Vec::new();
            bevy::asset::AsyncReadExt::read_to_end(reader, &mut bytes).await?;
            Font::from_bytes(bytes)
        })
    }

    fn extensions(&self) -> &[&str] {
        &["ttf", "otf"]
    }
}
