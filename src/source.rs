//! Acquisition of retailer exports: remote download, manual files, and the
//! parse → map → derive pipeline that turns bytes into a [`Dataset`].

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use chrono::Utc;
use encoding_rs::Encoding;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use thiserror::Error;

use crate::{
    config::Config,
    data::Dataset,
    derive::MetricDeriver,
    io_utils,
    raw::RawTable,
    retailer::Retailer,
    schema::{MapError, SchemaMapper},
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no remote source is configured for {0}")]
    NoSource(Retailer),
    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("reading {path:?} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin} is not a readable table: {message}")]
    Parse { origin: String, message: String },
    #[error(transparent)]
    Shape(#[from] MapError),
}

/// Single short-timeout reachability check. Any HTTP answer counts as
/// online.
pub fn probe(url: &str, timeout: Duration) -> bool {
    let client = match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(err) => {
            warn!("Could not build HTTP client for connectivity probe: {err}");
            return false;
        }
    };
    match client.get(url).send() {
        Ok(response) => {
            debug!("Connectivity probe {url} -> {}", response.status());
            true
        }
        Err(err) => {
            info!("Connectivity probe {url} failed: {err}");
            false
        }
    }
}

pub fn fetch(url: &str, timeout: Duration) -> Result<Vec<u8>, LoadError> {
    let fetch_error = |source| LoadError::Fetch {
        url: url.to_string(),
        source,
    };
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(fetch_error)?;
    let response = client.get(url).send().map_err(fetch_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().map_err(fetch_error)?;
    debug!("Fetched {} byte(s) from {url}", bytes.len());
    Ok(bytes.to_vec())
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalizes retailer exports with the deployment's catalogue data.
pub struct SourceLoader<'a> {
    config: &'a Config,
    encoding: &'static Encoding,
}

impl<'a> SourceLoader<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        let encoding = io_utils::resolve_encoding(config.input_encoding.as_deref())?;
        Ok(Self { config, encoding })
    }

    pub fn load_remote(&self, retailer: Retailer) -> Result<Dataset, LoadError> {
        let url = self
            .config
            .source_url(retailer)
            .ok_or(LoadError::NoSource(retailer))?;
        info!("Downloading {retailer} export from {url}");
        let bytes = fetch(url, self.config.fetch_timeout())?;
        self.normalize(retailer, &bytes, url)
    }

    pub fn load_file(&self, retailer: Retailer, path: &Path) -> Result<Dataset, LoadError> {
        info!("Reading {retailer} export from {path:?}");
        let bytes = read_file(path)?;
        self.normalize(retailer, &bytes, &path.display().to_string())
    }

    /// Parses, maps and derives one export. `origin` names the source in
    /// messages and picks the delimiter for text exports.
    pub fn normalize(
        &self,
        retailer: Retailer,
        bytes: &[u8],
        origin: &str,
    ) -> Result<Dataset, LoadError> {
        let raw = RawTable::parse(bytes, origin, self.encoding).map_err(|err| LoadError::Parse {
            origin: origin.to_string(),
            message: format!("{err:#}"),
        })?;
        let retailer_config = self.config.retailer(retailer);
        let mut records = SchemaMapper::new(retailer)
            .excluding_formats(&retailer_config.excluded_formats)
            .map(&raw)?;
        MetricDeriver::new(&retailer_config.buckets).derive(&mut records);
        info!(
            "Loaded {} {retailer} record(s) from {origin}",
            records.len()
        );
        Ok(Dataset {
            retailer,
            origin: origin.to_string(),
            loaded_at: Utc::now(),
            source_headers: raw.headers,
            records,
        })
    }
}
