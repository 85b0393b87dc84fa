//! Sample datasets
//!
//! Samples are published as zip archives. Only archives already unpacked
//! into a [`SampleCache`] directory are opened here; downloading is left to
//! an [`ArchiveFetcher`] supplied by the host.

use crate::array::{imreads, VirtualArray};
use crate::config::{ReaderConfig, DEFAULT_PATTERN};
use crate::error::{Result, VolpkgError};
use crate::metadata::ArrayMetadata;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Where sample archives are published
pub const SAMPLE_BASE_URL: &str = "http://dl.ash2txt.org/";

const CAMPFIRE_ARCHIVE: &str = "campfire.zip";
const CAMPFIRE_SHA256: &str = "5857d1be412b597ce31605100852ddf6ea2946c6c0f7eb5a7cd14bff94cc5324";
const CC_BY_NC: &str = "CC-BY-NC";
const CC_BY_NC_URL: &str = "https://creativecommons.org/licenses/by-nc/2.0/";

/// A dataset inside a published archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    /// Name used to open the sample; also the member directory in the archive
    pub name: &'static str,
    pub archive: &'static str,
    pub sha256: &'static str,
    pub license: &'static str,
    pub license_url: &'static str,

    /// Suggested volume rendering mode
    pub rendering: &'static str,
}

impl SampleEntry {
    pub fn archive_url(&self) -> String {
        format!("{}{}", SAMPLE_BASE_URL, self.archive)
    }
}

const REGISTRY: &[SampleEntry] = &[
    SampleEntry {
        name: "campfire/rec",
        archive: CAMPFIRE_ARCHIVE,
        sha256: CAMPFIRE_SHA256,
        license: CC_BY_NC,
        license_url: CC_BY_NC_URL,
        rendering: "attenuated_mip",
    },
    SampleEntry {
        name: "campfire/raw",
        archive: CAMPFIRE_ARCHIVE,
        sha256: CAMPFIRE_SHA256,
        license: CC_BY_NC,
        license_url: CC_BY_NC_URL,
        rendering: "minip",
    },
];

/// All known samples
pub fn registry() -> &'static [SampleEntry] {
    REGISTRY
}

pub fn find_sample(name: &str) -> Result<&'static SampleEntry> {
    REGISTRY
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| VolpkgError::NotFound(format!("sample '{}'", name)))
}

/// Directory holding downloaded and unpacked sample archives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCache {
    dir: PathBuf,
}

impl SampleCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &ReaderConfig) -> Result<Self> {
        config
            .sample_cache_dir
            .as_ref()
            .map(|dir| Self::new(dir.clone()))
            .ok_or_else(|| {
                VolpkgError::Configuration("sample_cache_dir is not set".to_string())
            })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the downloaded archive
    pub fn archive_path(&self, entry: &SampleEntry) -> PathBuf {
        self.dir.join(entry.archive)
    }

    /// Location of the unpacked member directory
    pub fn member_path(&self, entry: &SampleEntry) -> PathBuf {
        self.dir.join(entry.name)
    }
}

/// Makes a sample's member directory available in the cache
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Return the unpacked member directory of `entry`
    async fn fetch(&self, entry: &SampleEntry, cache: &SampleCache) -> Result<PathBuf>;
}

/// Fetcher for caches populated ahead of time; never touches the network
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalArchiveFetcher;

#[async_trait]
impl ArchiveFetcher for LocalArchiveFetcher {
    async fn fetch(&self, entry: &SampleEntry, cache: &SampleCache) -> Result<PathBuf> {
        let member = cache.member_path(entry);
        match fs::metadata(&member).await {
            Ok(meta) if meta.is_dir() => Ok(member),
            Ok(_) => Err(VolpkgError::InvalidFormat(format!(
                "{} is not a directory",
                member.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VolpkgError::NotFound(format!(
                    "sample '{}' is not unpacked at {}; download {} (sha256 {}) into {}",
                    entry.name,
                    member.display(),
                    entry.archive_url(),
                    entry.sha256,
                    cache.dir().display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Open a sample from a pre-populated cache
pub async fn open_sample(name: &str, cache: &SampleCache) -> Result<(VirtualArray, ArrayMetadata)> {
    open_sample_with(name, cache, &LocalArchiveFetcher).await
}

/// Open a sample, letting `fetcher` make its files available first
pub async fn open_sample_with(
    name: &str,
    cache: &SampleCache,
    fetcher: &dyn ArchiveFetcher,
) -> Result<(VirtualArray, ArrayMetadata)> {
    let entry = find_sample(name)?;
    let dir = fetcher.fetch(entry, cache).await?;
    tracing::debug!(sample = entry.name, dir = %dir.display(), "opening sample");

    let array = tokio::task::spawn_blocking(move || imreads(&dir, DEFAULT_PATTERN)).await??;

    let mut metadata = array.metadata();
    metadata.add_attribute("name", entry.name);
    metadata.add_attribute("license", entry.license);
    metadata.add_attribute("license-url", entry.license_url);
    metadata.add_attribute("rendering", entry.rendering);
    metadata.add_attribute("source", entry.archive_url());
    Ok((array, metadata))
}
