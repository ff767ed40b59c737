/// Local cache of extracted voice lines.
///
/// The cache is a flat directory. It is *ready* when every file named by the
/// sound packs is present, regardless of content. When it is not ready at
/// startup each pack's archive is fetched and the wanted entries are pulled
/// out in memory. Packs are independent: one failing never stops the others,
/// and nothing is retried within a process.
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::catalog::{manifest, SoundPack};
use crate::error::{NotifierError, Result};

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Source of pack archives.
pub trait ArchiveFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetches archives over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .user_agent(concat!("opencode-starcraft/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(NotifierError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Result of one pack's provisioning. `Ok` carries archive entries that were
/// declared but not found in the archive.
#[derive(Debug)]
pub struct PackReport {
    pub name: String,
    pub result: Result<Vec<String>>,
}

#[derive(Debug)]
pub enum Provision {
    /// Every expected file was already present; nothing was fetched.
    AlreadyReady,
    /// Each pack was attempted. The cache may still be incomplete.
    Attempted(Vec<PackReport>),
    /// The cache directory could not be created.
    Failed(NotifierError),
}

pub struct AssetCache {
    dir: PathBuf,
    packs: Vec<SoundPack>,
    expected: BTreeSet<String>,
}

impl AssetCache {
    pub fn new(dir: impl Into<PathBuf>, packs: Vec<SoundPack>) -> Self {
        let expected = manifest(&packs);
        Self {
            dir: dir.into(),
            packs,
            expected,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Whether `file_name` is currently present. Checked right before every
    /// playback since provisioning may have been partial.
    pub fn contains(&self, file_name: &str) -> bool {
        self.path_for(file_name).is_file()
    }

    /// Expected files that are not in the cache directory.
    pub fn missing(&self) -> Vec<String> {
        let present: HashSet<String> = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => HashSet::new(),
        };
        self.expected
            .iter()
            .filter(|name| !present.contains(*name))
            .cloned()
            .collect()
    }

    /// True iff the directory exists and holds every expected file.
    pub fn is_ready(&self) -> bool {
        self.dir.is_dir() && self.missing().is_empty()
    }

    /// Makes a single provisioning pass if the cache is not ready.
    pub async fn ensure_ready<F: ArchiveFetcher>(&self, fetcher: &F) -> Provision {
        if self.is_ready() {
            return Provision::AlreadyReady;
        }

        tracing::info!("Downloading StarCraft sounds into {}", self.dir.display());
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!("Failed to create sound cache {}: {e}", self.dir.display());
            return Provision::Failed(e.into());
        }

        let mut reports = Vec::with_capacity(self.packs.len());
        for pack in &self.packs {
            tracing::info!("  Fetching {}...", pack.name);
            let result = self.provision_pack(fetcher, pack).await;
            match &result {
                Ok(absent) => {
                    for entry in absent {
                        tracing::warn!("  {entry} not found in {} archive", pack.name);
                    }
                }
                Err(e) => tracing::warn!("  Error processing {}: {e}", pack.name),
            }
            reports.push(PackReport {
                name: pack.name.clone(),
                result,
            });
        }

        if self.is_ready() {
            tracing::info!("StarCraft sounds ready");
        } else {
            tracing::warn!("Sound cache incomplete; missing: {}", self.missing().join(", "));
        }
        Provision::Attempted(reports)
    }

    async fn provision_pack<F: ArchiveFetcher>(
        &self,
        fetcher: &F,
        pack: &SoundPack,
    ) -> Result<Vec<String>> {
        let bytes = fetcher.fetch(&pack.url).await?;
        self.extract(pack, &bytes)
    }

    /// Writes each declared entry of `bytes` under its canonical cache name.
    fn extract(&self, pack: &SoundPack, bytes: &[u8]) -> Result<Vec<String>> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut absent = Vec::new();

        for (entry_path, out_name) in &pack.files {
            let mut entry = match archive.by_name(entry_path) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => {
                    absent.push(entry_path.clone());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            // The declared size comes from the archive header and is not trusted.
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;

            let dest = self.path_for(out_name);
            std::fs::write(&dest, data).map_err(|source| NotifierError::Write {
                path: dest.clone(),
                source,
            })?;
        }
        Ok(absent)
    }
}
