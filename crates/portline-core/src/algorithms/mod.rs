//! # Algorithms Module
//!
//! Pure protocol logic: bundle schemas, link encoding, intro messages.

pub mod intro;
pub mod link;
pub mod schema;

pub use intro::{build_intro_message, verify_intro_message};
pub use link::{
    bundle_to_fallback_link, fallback_link_to_bundle, parse_link, short_link,
    strip_legacy_prefix, ParsedLink,
};
pub use schema::{
    inspect_tag, validate_contact_port_material_v1, validate_contact_port_v1, validate_direct_v1,
    validate_group_superport_v1, validate_group_v1, validate_superport_v1, verify_published_key,
    BundleValidator, V1,
};
