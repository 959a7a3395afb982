//! Serde model of the NVD 1.0 yearly feed documents.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct Meta {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "ASSIGNER")]
    pub assigner: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct Reference {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct References {
    pub reference_data: Vec<Reference>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DescriptionData {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct Description {
    pub description_data: Vec<DescriptionData>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct VersionData {
    pub version_value: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct VersionList {
    pub version_data: Vec<VersionData>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct ProductData {
    pub product_name: String,
    pub version: VersionList,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct ProductList {
    pub product_data: Vec<ProductData>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct VendorData {
    pub vendor_name: String,
    pub product: ProductList,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct VendorList {
    pub vendor_data: Vec<VendorData>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Affects {
    pub vendor: VendorList,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Info {
    #[serde(rename = "CVE_data_meta")]
    pub meta: Meta,
    pub description: Description,
    pub references: References,
    pub affects: Affects,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CvssV2 {
    pub version: String,
    #[serde(rename = "vectorString")]
    pub vector_string: String,
    #[serde(rename = "baseScore")]
    pub base_score: f64,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CvssV3 {
    pub version: String,
    #[serde(rename = "vectorString")]
    pub vector_string: String,
    #[serde(rename = "baseScore")]
    pub base_score: f64,
    #[serde(rename = "baseSeverity")]
    pub base_severity: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ImpactMetricV2 {
    #[serde(rename = "cvssV2")]
    pub cvss: CvssV2,
    pub severity: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ImpactMetricV3 {
    #[serde(rename = "cvssV3")]
    pub cvss: CvssV3,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Impact {
    #[serde(rename = "baseMetricV2")]
    pub metric_v2: Option<ImpactMetricV2>,
    #[serde(rename = "baseMetricV3")]
    pub metric_v3: Option<ImpactMetricV3>,
}

/// Severity attributes as they are persisted: the CVSS base score together
/// with the schema version it was taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct Severity {
    pub base_score: f64,
    pub schema_version: &'static str,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Item {
    pub cve: Info,
    pub impact: Impact,
    #[serde(rename = "publishedDate")]
    pub published_date: String,
    #[serde(rename = "lastModifiedDate")]
    pub last_modified_date: String,
}

impl Item {
    pub fn id(&self) -> &str {
        &self.cve.meta.id
    }

    /// The usable severity score, preferring the CVSS v3 block over v2.
    /// `None` means the record carries no impact data at all and must not be
    /// ingested.
    pub fn severity(&self) -> Option<Severity> {
        if let Some(metric) = &self.impact.metric_v3 {
            Some(Severity {
                base_score: metric.cvss.base_score,
                schema_version: "3",
            })
        } else {
            self.impact.metric_v2.as_ref().map(|metric| Severity {
                base_score: metric.cvss.base_score,
                schema_version: "2",
            })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Feed {
    #[serde(rename = "CVE_Items")]
    pub items: Vec<Item>,
}

impl Feed {
    pub fn parse(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open file {}", path.display()))?;

        let reader = BufReader::new(file);

        serde_json::from_reader(reader)
            .with_context(|| format!("failed to parse CVE feed from {}", path.display()))
    }
}

const CANONICAL_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Feed timestamps are UTC instants with a trailing `Z` marker and minute or
/// second precision. The canonical stored form is the UTC naive string
/// `YYYY-MM-DD HH:MM:SS`, so every representation of the same instant maps to
/// a single value.
pub fn normalize_timestamp(raw: &str) -> Result<String, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ"))
        .map(|instant| instant.format(CANONICAL_TIMESTAMP).to_string())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{normalize_timestamp, Feed, Item};

    fn item(json: &str) -> Item {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn severity_prefers_the_v3_metric() {
        let item = item(
            r#"{
                "cve": { "CVE_data_meta": { "ID": "CVE-2021-0001" } },
                "impact": {
                    "baseMetricV2": { "cvssV2": { "baseScore": 5.0 }, "severity": "MEDIUM" },
                    "baseMetricV3": { "cvssV3": { "baseScore": 9.8, "baseSeverity": "CRITICAL" } }
                }
            }"#,
        );

        let severity = item.severity().unwrap();
        assert_eq!(9.8, severity.base_score);
        assert_eq!("3", severity.schema_version);
    }

    #[test]
    fn severity_falls_back_to_the_v2_metric() {
        let item = item(
            r#"{
                "cve": { "CVE_data_meta": { "ID": "CVE-2010-0001" } },
                "impact": { "baseMetricV2": { "cvssV2": { "baseScore": 7.5 }, "severity": "HIGH" } }
            }"#,
        );

        let severity = item.severity().unwrap();
        assert_eq!(7.5, severity.base_score);
        assert_eq!("2", severity.schema_version);
    }

    #[test]
    fn record_without_impact_has_no_severity() {
        let item = item(
            r#"{
                "cve": { "CVE_data_meta": { "ID": "CVE-2005-0001" } },
                "impact": {}
            }"#,
        );

        assert!(item.severity().is_none());
    }

    #[test_case("2021-01-05T10:00Z", "2021-01-05 10:00:00")]
    #[test_case("2021-01-05T10:00:42Z", "2021-01-05 10:00:42")]
    #[test_case("2002-12-31T23:59Z", "2002-12-31 23:59:00")]
    fn timestamps_normalize_to_the_canonical_form(raw: &str, expected: &str) {
        assert_eq!(expected, normalize_timestamp(raw).unwrap());
    }

    #[test_case("2021-01-05 10:00:00")]
    #[test_case("2021-01-05T10:00")]
    #[test_case("yesterday")]
    fn unrecognized_timestamps_are_rejected(raw: &str) {
        assert!(normalize_timestamp(raw).is_err());
    }

    #[test]
    fn feed_documents_deserialize_with_the_full_record_tree() {
        let feed: Feed = serde_json::from_str(
            r#"{
                "CVE_Items": [{
                    "cve": {
                        "CVE_data_meta": { "ID": "CVE-2021-0002" },
                        "description": { "description_data": [
                            { "lang": "en", "value": "A heap overflow." }
                        ]},
                        "references": { "reference_data": [
                            { "url": "https://example.com/advisory" }
                        ]},
                        "affects": { "vendor": { "vendor_data": [{
                            "vendor_name": "gibson",
                            "product": { "product_data": [{
                                "product_name": "lespaul",
                                "version": { "version_data": [
                                    { "version_value": "1.0.0" },
                                    { "version_value": "1.0.1" }
                                ]}
                            }]}
                        }]}}
                    },
                    "impact": {
                        "baseMetricV3": { "cvssV3": { "baseScore": 8.1, "baseSeverity": "HIGH" } }
                    },
                    "publishedDate": "2021-01-05T10:00Z",
                    "lastModifiedDate": "2021-02-01T08:30Z"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(1, feed.items.len());

        let item = &feed.items[0];
        assert_eq!("CVE-2021-0002", item.id());

        let vendors = &item.cve.affects.vendor.vendor_data;
        assert_eq!("gibson", vendors[0].vendor_name);
        assert_eq!("lespaul", vendors[0].product.product_data[0].product_name);
        assert_eq!(
            2,
            vendors[0].product.product_data[0].version.version_data.len()
        );
    }
}
