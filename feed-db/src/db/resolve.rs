//! Get-or-create resolution of natural keys to row ids.
//!
//! Every resolver follows the same contract: look the key up, and when it is
//! absent run an `INSERT ... ON CONFLICT DO NOTHING` followed by a fresh
//! lookup. The conditional insert is a single atomic statement, so two
//! concurrent callers racing on the same key end up observing the same row.
//! A resolver never reports success without an id.

use diesel::pg::PgConnection;
use diesel::prelude::*;

use super::models::{
    NewCve, NewCveReference, NewDescription, NewProduct, NewProductCve, NewProductCveVersion,
    NewSeverity, NewVendor, NewVersion,
};
use super::schema;

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("could not resolve a {table} row for key {key}")]
    Conflict { table: &'static str, key: String },
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// Shared skeleton of the resolvers. `insert` must be conditional on the
/// key's uniqueness constraint; when it loses a race the winning row is
/// picked up by the lookups that follow, with one retry before the
/// resolution is declared failed.
fn get_or_create<L, I>(
    conn: &mut PgConnection,
    table: &'static str,
    key: impl Fn() -> String,
    lookup: L,
    insert: I,
) -> Result<i32, ResolveError>
where
    L: Fn(&mut PgConnection) -> QueryResult<Option<i32>>,
    I: FnOnce(&mut PgConnection) -> QueryResult<usize>,
{
    if let Some(id) = lookup(&mut *conn)? {
        return Ok(id);
    }

    insert(&mut *conn)?;

    if let Some(id) = lookup(&mut *conn)? {
        return Ok(id);
    }

    lookup(conn)?.ok_or_else(|| ResolveError::Conflict { table, key: key() })
}

pub fn severity(
    conn: &mut PgConnection,
    base_score: f64,
    schema_version: &str,
) -> Result<i32, ResolveError> {
    use schema::severities::dsl;

    get_or_create(
        conn,
        "severities",
        || format!("({base_score}, v{schema_version})"),
        |conn| {
            dsl::severities
                .filter(dsl::base_score.eq(base_score))
                .filter(dsl::schema_version.eq(schema_version))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::severities)
                .values(NewSeverity {
                    base_score,
                    schema_version,
                })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn cve(
    conn: &mut PgConnection,
    cve_name: &str,
    severity_id: i32,
    published_date: &str,
    last_modified_date: &str,
) -> Result<i32, ResolveError> {
    use schema::cves::dsl;

    get_or_create(
        conn,
        "cves",
        || cve_name.to_string(),
        |conn| {
            dsl::cves
                .filter(dsl::cve_name.eq(cve_name))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::cves)
                .values(NewCve {
                    severity_id,
                    cve_name,
                    published_date,
                    last_modified_date,
                })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn description(
    conn: &mut PgConnection,
    cve_id: i32,
    lang: &str,
    value: &str,
) -> Result<i32, ResolveError> {
    use schema::descriptions::dsl;

    get_or_create(
        conn,
        "descriptions",
        || format!("({cve_id}, {lang})"),
        |conn| {
            dsl::descriptions
                .filter(dsl::cve_id.eq(cve_id))
                .filter(dsl::lang.eq(lang))
                .filter(dsl::value.eq(value))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::descriptions)
                .values(NewDescription { cve_id, lang, value })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn reference(conn: &mut PgConnection, cve_id: i32, url: &str) -> Result<i32, ResolveError> {
    use schema::cve_references::dsl;

    get_or_create(
        conn,
        "cve_references",
        || format!("({cve_id}, {url})"),
        |conn| {
            dsl::cve_references
                .filter(dsl::cve_id.eq(cve_id))
                .filter(dsl::url.eq(url))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::cve_references)
                .values(NewCveReference { cve_id, url })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn vendor(conn: &mut PgConnection, vendor_name: &str) -> Result<i32, ResolveError> {
    use schema::vendors::dsl;

    get_or_create(
        conn,
        "vendors",
        || vendor_name.to_string(),
        |conn| {
            dsl::vendors
                .filter(dsl::vendor_name.eq(vendor_name))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::vendors)
                .values(NewVendor { vendor_name })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn product(
    conn: &mut PgConnection,
    vendor_id: i32,
    product_name: &str,
) -> Result<i32, ResolveError> {
    use schema::products::dsl;

    get_or_create(
        conn,
        "products",
        || format!("({vendor_id}, {product_name})"),
        |conn| {
            dsl::products
                .filter(dsl::vendor_id.eq(vendor_id))
                .filter(dsl::product_name.eq(product_name))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::products)
                .values(NewProduct {
                    vendor_id,
                    product_name,
                })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn product_cve(
    conn: &mut PgConnection,
    product_id: i32,
    cve_id: i32,
) -> Result<i32, ResolveError> {
    use schema::product_cves::dsl;

    get_or_create(
        conn,
        "product_cves",
        || format!("({product_id}, {cve_id})"),
        |conn| {
            dsl::product_cves
                .filter(dsl::product_id.eq(product_id))
                .filter(dsl::cve_id.eq(cve_id))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::product_cves)
                .values(NewProductCve { product_id, cve_id })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn version(
    conn: &mut PgConnection,
    product_id: i32,
    version_value: &str,
) -> Result<i32, ResolveError> {
    use schema::versions::dsl;

    get_or_create(
        conn,
        "versions",
        || format!("({product_id}, {version_value})"),
        |conn| {
            dsl::versions
                .filter(dsl::product_id.eq(product_id))
                .filter(dsl::version_value.eq(version_value))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::versions)
                .values(NewVersion {
                    product_id,
                    version_value,
                })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}

pub fn product_cve_version(
    conn: &mut PgConnection,
    product_cve_id: i32,
    version_id: i32,
) -> Result<i32, ResolveError> {
    use schema::product_cve_versions::dsl;

    get_or_create(
        conn,
        "product_cve_versions",
        || format!("({product_cve_id}, {version_id})"),
        |conn| {
            dsl::product_cve_versions
                .filter(dsl::product_cve_id.eq(product_cve_id))
                .filter(dsl::version_id.eq(version_id))
                .select(dsl::id)
                .first(conn)
                .optional()
        },
        |conn| {
            diesel::insert_into(dsl::product_cve_versions)
                .values(NewProductCveVersion {
                    product_cve_id,
                    version_id,
                })
                .on_conflict_do_nothing()
                .execute(conn)
        },
    )
}
