pub mod cve_sources;
pub mod db;
