use diesel::prelude::*;

use super::schema::{
    cve_references, cves, descriptions, product_cve_versions, product_cves, products, severities,
    vendors, versions,
};

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = severities)]
pub struct Severity {
    pub id: i32,
    pub base_score: f64,
    pub schema_version: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = severities)]
pub struct NewSeverity<'a> {
    pub base_score: f64,
    pub schema_version: &'a str,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = cves)]
pub struct Cve {
    pub id: i32,
    pub severity_id: i32,
    pub cve_name: String,
    pub published_date: String,
    pub last_modified_date: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cves)]
pub struct NewCve<'a> {
    pub severity_id: i32,
    pub cve_name: &'a str,
    pub published_date: &'a str,
    pub last_modified_date: &'a str,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = descriptions)]
pub struct Description {
    pub id: i32,
    pub cve_id: i32,
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = descriptions)]
pub struct NewDescription<'a> {
    pub cve_id: i32,
    pub lang: &'a str,
    pub value: &'a str,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = cve_references)]
pub struct CveReference {
    pub id: i32,
    pub cve_id: i32,
    pub url: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cve_references)]
pub struct NewCveReference<'a> {
    pub cve_id: i32,
    pub url: &'a str,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = vendors)]
pub struct Vendor {
    pub id: i32,
    pub vendor_name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = vendors)]
pub struct NewVendor<'a> {
    pub vendor_name: &'a str,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = products)]
pub struct Product {
    pub id: i32,
    pub vendor_id: i32,
    pub product_name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = products)]
pub struct NewProduct<'a> {
    pub vendor_id: i32,
    pub product_name: &'a str,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = product_cves)]
pub struct ProductCve {
    pub id: i32,
    pub product_id: i32,
    pub cve_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = product_cves)]
pub struct NewProductCve {
    pub product_id: i32,
    pub cve_id: i32,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = versions)]
pub struct Version {
    pub id: i32,
    pub product_id: i32,
    pub version_value: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = versions)]
pub struct NewVersion<'a> {
    pub product_id: i32,
    pub version_value: &'a str,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = product_cve_versions)]
pub struct ProductCveVersion {
    pub id: i32,
    pub product_cve_id: i32,
    pub version_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = product_cve_versions)]
pub struct NewProductCveVersion {
    pub product_cve_id: i32,
    pub version_id: i32,
}
