diesel::table! {
    severities (id) {
        id -> Int4,
        base_score -> Float8,
        schema_version -> Text,
    }
}

diesel::table! {
    cves (id) {
        id -> Int4,
        severity_id -> Int4,
        cve_name -> Text,
        published_date -> Text,
        last_modified_date -> Text,
    }
}

diesel::table! {
    descriptions (id) {
        id -> Int4,
        cve_id -> Int4,
        lang -> Text,
        value -> Text,
    }
}

diesel::table! {
    cve_references (id) {
        id -> Int4,
        cve_id -> Int4,
        url -> Text,
    }
}

diesel::table! {
    vendors (id) {
        id -> Int4,
        vendor_name -> Text,
    }
}

diesel::table! {
    products (id) {
        id -> Int4,
        vendor_id -> Int4,
        product_name -> Text,
    }
}

diesel::table! {
    product_cves (id) {
        id -> Int4,
        product_id -> Int4,
        cve_id -> Int4,
    }
}

diesel::table! {
    versions (id) {
        id -> Int4,
        product_id -> Int4,
        version_value -> Text,
    }
}

diesel::table! {
    product_cve_versions (id) {
        id -> Int4,
        product_cve_id -> Int4,
        version_id -> Int4,
    }
}

diesel::joinable!(cves -> severities (severity_id));
diesel::joinable!(descriptions -> cves (cve_id));
diesel::joinable!(cve_references -> cves (cve_id));
diesel::joinable!(products -> vendors (vendor_id));
diesel::joinable!(product_cves -> products (product_id));
diesel::joinable!(product_cves -> cves (cve_id));
diesel::joinable!(versions -> products (product_id));
diesel::joinable!(product_cve_versions -> product_cves (product_cve_id));
diesel::joinable!(product_cve_versions -> versions (version_id));

diesel::allow_tables_to_appear_in_same_query!(
    severities,
    cves,
    descriptions,
    cve_references,
    vendors,
    products,
    product_cves,
    versions,
    product_cve_versions,
);
