//! Diesel table definitions for the registry schema.
//!
//! These definitions must match the migrations under `registry/migrations`
//! exactly. Regenerate with `diesel print-schema` after changing them.

diesel::table! {
    /// Persisted tenant domains. Built-in domains are never stored here.
    domains (id) {
        /// Primary key: the validated domain id.
        id -> Varchar,
        /// Owning principal.
        owner_uid -> Int8,
        /// Optional display name (max 255 characters).
        name -> Nullable<Varchar>,
        /// Optional gravatar address.
        gravatar -> Nullable<Text>,
        /// Role map as a JSON object of `{role: bitmask}`.
        roles -> Jsonb,
    }
}

diesel::table! {
    /// Per-domain user records, unique on `(domain_id, uid)`.
    ///
    /// There is no foreign key to `domains`: users of built-in domains are
    /// legal.
    domain_users (id) {
        /// Surrogate key used for keyset pagination.
        id -> Int8,
        domain_id -> Varchar,
        uid -> Int8,
        role -> Nullable<Varchar>,
        num_submit -> Nullable<Int8>,
        num_accept -> Nullable<Int8>,
        score -> Nullable<Int8>,
        /// Extension attributes as a JSON object.
        attributes -> Jsonb,
    }
}

diesel::allow_tables_to_appear_in_same_query!(domains, domain_users);
