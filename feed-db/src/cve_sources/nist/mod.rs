use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use diesel::pg::PgConnection;
use diesel::Connection;

use crate::db::{resolve, PostgresRepository, ResolveError};

pub mod cve;
pub mod sync;

pub const FEED_VERSION: &str = "1.0";

/// First year the NVD publishes a yearly feed for.
pub const FIRST_FEED_YEAR: u16 = 2002;

/// The two file kinds published per feed year: the fingerprint manifest and
/// the zipped payload.
#[derive(Debug, Clone, Copy)]
pub enum FeedFile {
    Meta,
    Archive,
}

impl FeedFile {
    fn extension(&self) -> &'static str {
        match self {
            FeedFile::Meta => "meta",
            FeedFile::Archive => "json.zip",
        }
    }
}

pub fn feed_url(year: u16, file: FeedFile) -> String {
    format!(
        "https://static.nvd.nist.gov/feeds/json/cve/{FEED_VERSION}/nvdcve-{FEED_VERSION}-{year}.{}",
        file.extension()
    )
}

pub fn feed_years() -> RangeInclusive<u16> {
    FIRST_FEED_YEAR..=Utc::now().year() as u16
}

/// Artifact names encode their feed year as the integer after the last `-`
/// and before the extension, e.g. `nvdcve-1.0-2021.json`.
pub fn year_from_file_name(file_name: &str) -> Option<u16> {
    file_name
        .rsplit('-')
        .next()?
        .split('.')
        .next()?
        .parse()
        .ok()
}

#[derive(Debug, Default)]
pub struct ImportReport {
    /// Records walked through the resolver chain, new or already present.
    pub imported: u32,
    /// Records without a usable severity score.
    pub skipped: u32,
    /// Records aborted by a resolution or normalization failure.
    pub failed: u32,
}

impl ImportReport {
    fn absorb(&mut self, other: ImportReport) {
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(thiserror::Error, Debug)]
enum RecordError {
    #[error("unrecognized timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// Ingests every mirrored feed artifact, oldest year first.
pub fn import_mirror(repository: &PostgresRepository, mirror_dir: &Path) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (year, path) in mirror_artifacts(mirror_dir)? {
        log::info!("importing feed year {} from {}", year, path.display());
        report.absorb(import_file(repository, &path)?);
    }

    Ok(report)
}

/// Ingests the mirrored artifact for a single feed year.
pub fn import_year(
    repository: &PostgresRepository,
    mirror_dir: &Path,
    year: u16,
) -> Result<ImportReport> {
    for (artifact_year, path) in mirror_artifacts(mirror_dir)? {
        if artifact_year == year {
            return import_file(repository, &path);
        }
    }

    bail!(
        "no artifact for feed year {} in {}",
        year,
        mirror_dir.display()
    )
}

fn mirror_artifacts(mirror_dir: &Path) -> Result<Vec<(u16, PathBuf)>> {
    let entries = fs::read_dir(mirror_dir)
        .with_context(|| format!("could not read {}", mirror_dir.display()))?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        match year_from_file_name(name) {
            Some(year) => artifacts.push((year, path)),
            None => log::warn!("ignoring {}: not a feed artifact name", path.display()),
        }
    }

    artifacts.sort();
    Ok(artifacts)
}

pub fn import_file(repository: &PostgresRepository, path: &Path) -> Result<ImportReport> {
    let start = Instant::now();
    let feed = cve::Feed::parse(path)?;
    log::info!(
        "loaded {} CVE records in {:?}",
        feed.items.len(),
        start.elapsed()
    );

    import(repository, &feed)
}

/// Walks every record of the feed and maps it onto the normalized tables.
///
/// Each record runs in its own transaction; a failing record is rolled back,
/// logged and counted without touching the rest of the batch. Only an
/// unreachable store aborts the run.
pub fn import(repository: &PostgresRepository, feed: &cve::Feed) -> Result<ImportReport> {
    let mut pooled = repository.conn().context("cannot reach the database")?;
    let conn = &mut *pooled;

    log::info!("connected to database, importing records ...");

    let mut report = ImportReport::default();

    for item in &feed.items {
        let Some(severity) = item.severity() else {
            log::debug!("skipping {}: no usable severity score", item.id());
            report.skipped += 1;
            continue;
        };

        match conn.transaction(|conn| ingest_record(conn, item, &severity)) {
            Ok(()) => {
                report.imported += 1;
                if report.imported % 500 == 0 {
                    log::info!("imported {} records ...", report.imported);
                }
            }
            Err(e) => {
                log::warn!("could not ingest {}: {}", item.id(), e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Resolver chain for one record. Resolution order follows the dependency
/// graph: each level's id is an input to the next one.
fn ingest_record(
    conn: &mut PgConnection,
    item: &cve::Item,
    severity: &cve::Severity,
) -> Result<(), RecordError> {
    let published = cve::normalize_timestamp(&item.published_date)?;
    let last_modified = cve::normalize_timestamp(&item.last_modified_date)?;

    let severity_id = resolve::severity(conn, severity.base_score, severity.schema_version)?;
    let cve_id = resolve::cve(conn, item.id(), severity_id, &published, &last_modified)?;

    for description in &item.cve.description.description_data {
        resolve::description(conn, cve_id, &description.lang, &description.value)?;
    }

    for reference in &item.cve.references.reference_data {
        resolve::reference(conn, cve_id, &reference.url)?;
    }

    for vendor in &item.cve.affects.vendor.vendor_data {
        let vendor_id = resolve::vendor(conn, &vendor.vendor_name)?;

        for product in &vendor.product.product_data {
            let product_id = resolve::product(conn, vendor_id, &product.product_name)?;
            let product_cve_id = resolve::product_cve(conn, product_id, cve_id)?;

            for version in &product.version.version_data {
                let version_id = resolve::version(conn, product_id, &version.version_value)?;
                resolve::product_cve_version(conn, product_cve_id, version_id)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{feed_url, year_from_file_name, FeedFile};

    #[test]
    fn feed_urls_follow_the_nvd_template() {
        assert_eq!(
            "https://static.nvd.nist.gov/feeds/json/cve/1.0/nvdcve-1.0-2021.meta",
            feed_url(2021, FeedFile::Meta)
        );
        assert_eq!(
            "https://static.nvd.nist.gov/feeds/json/cve/1.0/nvdcve-1.0-2002.json.zip",
            feed_url(2002, FeedFile::Archive)
        );
    }

    #[test_case("nvdcve-1.0-2002.json", Some(2002))]
    #[test_case("nvdcve-1.0-2021.json", Some(2021))]
    #[test_case("nvdcve-1.0-2021.json.zip", Some(2021))]
    #[test_case("notes.txt", None)]
    #[test_case("nvdcve-1.0-recent.json", None)]
    fn years_are_parsed_from_artifact_names(file_name: &str, expected: Option<u16>) {
        assert_eq!(expected, year_from_file_name(file_name));
    }
}
