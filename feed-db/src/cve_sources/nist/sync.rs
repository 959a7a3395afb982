//! Content-hash synchronization of the local feed mirror.
//!
//! Local and remote artifacts are compared by SHA-256 fingerprint, never by
//! name, so a feed that moved without changing content is not re-fetched.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use zip::ZipArchive;

use super::{feed_url, FeedFile};
use crate::cve_sources::{run_pool, DEFAULT_POOL_WIDTH};

const HASH_BLOCK_SIZE: usize = 65536;

/// Outcome of probing the remote manifests.
///
/// A failed probe for any year makes the whole index `Unknown`: collapsing it
/// to an empty map would read as "the remote has no files" and plan the
/// deletion of the entire local mirror on a transient network error.
#[derive(Debug)]
pub enum RemoteIndex {
    /// fingerprint -> download address
    Known(HashMap<String, String>),
    Unknown,
}

/// Fingerprints every file in the mirror directory.
pub fn local_fingerprints(dir: &Path) -> Result<HashMap<String, PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("could not read {}", dir.display()))?;

    let mut fingerprints = HashMap::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let digest = file_sha256(&path)?;
        fingerprints.insert(digest, path);
    }

    Ok(fingerprints)
}

fn file_sha256(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut block = [0u8; HASH_BLOCK_SIZE];
    loop {
        let read = file
            .read(&mut block)
            .with_context(|| format!("could not read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }

    let mut digest = String::with_capacity(64);
    for byte in hasher.finalize() {
        digest.push_str(&format!("{byte:02X}"));
    }
    Ok(digest)
}

/// Retrieves the manifest fingerprint of every year's payload, 20 requests
/// in flight at a time, and joins them before returning.
pub fn remote_fingerprints(client: &Client, years: RangeInclusive<u16>) -> RemoteIndex {
    let years: Vec<u16> = years.collect();
    let results = run_pool(DEFAULT_POOL_WIDTH, years, |year| {
        fetch_manifest(client, year).map_err(|err| (year, err))
    });

    let mut fingerprints = HashMap::new();
    let mut unknown = false;
    for result in results {
        match result {
            Ok((digest, address)) => {
                fingerprints.insert(digest, address);
            }
            Err((year, err)) => {
                log::error!("could not retrieve the {} feed manifest: {:#}", year, err);
                unknown = true;
            }
        }
    }

    if unknown {
        RemoteIndex::Unknown
    } else {
        RemoteIndex::Known(fingerprints)
    }
}

fn fetch_manifest(client: &Client, year: u16) -> Result<(String, String)> {
    let url = feed_url(year, FeedFile::Meta);
    let manifest = client
        .get(&url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .with_context(|| format!("error downloading {url}"))?;

    let digest =
        parse_manifest(&manifest).with_context(|| format!("invalid manifest at {url}"))?;

    Ok((digest, feed_url(year, FeedFile::Archive)))
}

/// The payload fingerprint is the manifest's last whitespace-delimited
/// token, after its `:` prefix, as uppercase hex.
pub fn parse_manifest(manifest: &str) -> Result<String> {
    let token = manifest
        .split_whitespace()
        .last()
        .context("empty manifest")?;
    let digest = token.rsplit(':').next().unwrap_or(token);
    Ok(digest.to_uppercase())
}

/// The delete-set/fetch-set pair produced by diffing fingerprints.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub delete: Vec<PathBuf>,
    pub fetch: Vec<String>,
}

impl SyncPlan {
    /// Pure fingerprint diff. An `Unknown` remote yields the empty plan.
    pub fn build(local: &HashMap<String, PathBuf>, remote: &RemoteIndex) -> Self {
        let remote = match remote {
            RemoteIndex::Known(fingerprints) => fingerprints,
            RemoteIndex::Unknown => return Self::default(),
        };

        let delete = local
            .iter()
            .filter(|(digest, _)| !remote.contains_key(*digest))
            .map(|(_, path)| path.clone())
            .collect();

        let fetch = remote
            .iter()
            .filter(|(digest, _)| !local.contains_key(*digest))
            .map(|(_, address)| address.clone())
            .collect();

        Self { delete, fetch }
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.fetch.is_empty()
    }
}

#[derive(Debug)]
pub struct TransferFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub fetched: usize,
    pub deleted: usize,
    pub failures: Vec<TransferFailure>,
    /// The remote manifests could not all be retrieved and the mirror was
    /// left untouched. Distinct from an in-sync mirror with nothing to do.
    pub remote_unknown: bool,
}

/// Brings the mirror directory in line with the remote feeds: stale
/// artifacts are removed, missing ones fetched on a bounded pool. Transfer
/// failures are collected per artifact and never abort sibling transfers.
pub fn synchronize(
    client: &Client,
    mirror_dir: &Path,
    years: RangeInclusive<u16>,
) -> Result<SyncReport> {
    fs::create_dir_all(mirror_dir)
        .with_context(|| format!("could not create {}", mirror_dir.display()))?;

    let remote = remote_fingerprints(client, years);
    if let RemoteIndex::Unknown = remote {
        log::warn!("remote state unknown, leaving the mirror untouched");
        return Ok(SyncReport {
            remote_unknown: true,
            ..SyncReport::default()
        });
    }

    let local = local_fingerprints(mirror_dir)?;
    let plan = SyncPlan::build(&local, &remote);
    if plan.is_empty() {
        log::info!("mirror already up to date");
        return Ok(SyncReport::default());
    }

    let mut report = SyncReport::default();

    for path in &plan.delete {
        log::info!("removing stale artifact {}", path.display());
        fs::remove_file(path)
            .with_context(|| format!("could not remove {}", path.display()))?;
        report.deleted += 1;
    }

    let results = run_pool(DEFAULT_POOL_WIDTH, plan.fetch, |url| {
        fetch_archive(client, &url, mirror_dir).map_err(|err| TransferFailure {
            url,
            error: format!("{err:#}"),
        })
    });

    for result in results {
        match result {
            Ok(()) => report.fetched += 1,
            Err(failure) => {
                log::error!("transfer of {} failed: {}", failure.url, failure.error);
                report.failures.push(failure);
            }
        }
    }

    Ok(report)
}

fn fetch_archive(client: &Client, url: &str, mirror_dir: &Path) -> Result<()> {
    log::info!("downloading {} ...", url);

    let payload = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .with_context(|| format!("error downloading {url}"))?;

    unpack_archive(payload.as_ref(), mirror_dir)
}

/// Validates the payload as a zip archive and materializes its entries into
/// the mirror directory. Entries are extracted into a staging directory on
/// the same filesystem first, then renamed into place, so a failed
/// extraction never leaves a partial artifact behind.
fn unpack_archive(payload: &[u8], mirror_dir: &Path) -> Result<()> {
    let mut archive =
        ZipArchive::new(Cursor::new(payload)).context("payload is not a valid zip archive")?;

    let staging =
        tempfile::tempdir_in(mirror_dir).context("could not create staging directory")?;

    archive
        .extract(staging.path())
        .context("could not extract archive")?;

    for entry in fs::read_dir(staging.path())? {
        let entry = entry?;
        let target = mirror_dir.join(entry.file_name());
        fs::rename(entry.path(), &target)
            .with_context(|| format!("could not materialize {}", target.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    use test_case::test_case;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::{
        file_sha256, local_fingerprints, parse_manifest, unpack_archive, RemoteIndex, SyncPlan,
    };

    fn local(digests: &[&str]) -> HashMap<String, PathBuf> {
        digests
            .iter()
            .map(|digest| (digest.to_string(), PathBuf::from(format!("{digest}.json"))))
            .collect()
    }

    fn remote(digests: &[&str]) -> RemoteIndex {
        RemoteIndex::Known(
            digests
                .iter()
                .map(|digest| (digest.to_string(), format!("https://feeds/{digest}")))
                .collect(),
        )
    }

    #[test]
    fn plan_deletes_stale_and_fetches_missing() {
        let plan = SyncPlan::build(&local(&["A", "B"]), &remote(&["B", "C"]));

        assert_eq!(vec![PathBuf::from("A.json")], plan.delete);
        assert_eq!(vec!["https://feeds/C".to_string()], plan.fetch);
    }

    #[test]
    fn plan_is_empty_when_fingerprints_agree() {
        let plan = SyncPlan::build(&local(&["A", "B"]), &remote(&["B", "A"]));
        assert!(plan.is_empty());
    }

    #[test]
    fn unknown_remote_state_plans_nothing() {
        let plan = SyncPlan::build(&local(&["A", "B"]), &RemoteIndex::Unknown);
        assert!(plan.is_empty());
    }

    #[test_case("sha256:ab12cd34", "AB12CD34")]
    #[test_case(
        "lastModifiedDate:2021-01-05T10:00:00-05:00\r\nsize:1024\r\nsha256:ab12cd34",
        "AB12CD34"
    )]
    #[test_case("AB12CD34", "AB12CD34")]
    fn manifests_yield_the_uppercase_payload_digest(manifest: &str, expected: &str) {
        assert_eq!(expected, parse_manifest(manifest).unwrap());
    }

    #[test]
    fn blank_manifests_are_rejected() {
        assert!(parse_manifest("").is_err());
        assert!(parse_manifest(" \r\n\t ").is_err());
    }

    #[test]
    fn fingerprints_hash_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvdcve-1.0-2021.json");
        std::fs::write(&path, b"abc").unwrap();

        // SHA-256("abc")
        assert_eq!(
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD",
            file_sha256(&path).unwrap()
        );

        let fingerprints = local_fingerprints(dir.path()).unwrap();
        assert_eq!(1, fingerprints.len());
        assert_eq!(
            &path,
            &fingerprints["BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"]
        );
    }

    #[test]
    fn archives_are_materialized_atomically() {
        let mut payload = Vec::new();
        {
            let mut writer = ZipWriter::new(std::io::Cursor::new(&mut payload));
            writer
                .start_file("nvdcve-1.0-2021.json", FileOptions::default())
                .unwrap();
            writer.write_all(br#"{"CVE_Items": []}"#).unwrap();
            writer.finish().unwrap();
        }

        let mirror = tempfile::tempdir().unwrap();
        unpack_archive(&payload, mirror.path()).unwrap();

        let extracted = mirror.path().join("nvdcve-1.0-2021.json");
        assert_eq!(
            r#"{"CVE_Items": []}"#,
            std::fs::read_to_string(extracted).unwrap()
        );

        // the staging directory is gone, only the artifact remains
        assert_eq!(1, std::fs::read_dir(mirror.path()).unwrap().count());
    }

    #[test]
    fn corrupt_payloads_leave_the_mirror_untouched() {
        let mirror = tempfile::tempdir().unwrap();

        assert!(unpack_archive(b"not a zip archive", mirror.path()).is_err());
        assert_eq!(0, std::fs::read_dir(mirror.path()).unwrap().count());
    }
}
