//! # Bundle Schemas
//!
//! Per-version validators. Every literal (`version`, `org`, `target`) must
//! match exactly and every hex field must have its exact length; a single bad
//! field rejects the whole bundle. Unknown extra fields are ignored.

use crate::domain::{
    Bundle, GroupBundle, PeerBundle, PortError, PortKind, PortResult, LONG_HEX_LEN,
    NAME_LENGTH_LIMIT, ORG_NAME, SHORT_HEX_LEN,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Version literal of the 1.0.0 schemas.
pub const V1: &str = "1.0.0";

/// Validator signature stored in the registry.
pub type BundleValidator = fn(&Value) -> PortResult<Bundle>;

lazy_static! {
    static ref SHORT_HEX: Regex =
        Regex::new(&format!("^[0-9a-f]{{{}}}$", SHORT_HEX_LEN)).expect("static regex");
    static ref LONG_HEX: Regex =
        Regex::new(&format!("^[0-9a-f]{{{}}}$", LONG_HEX_LEN)).expect("static regex");
}

fn object(value: &Value) -> PortResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| PortError::Validation("bundle is not a JSON object".to_string()))
}

fn optional_str<'a>(obj: &'a Map<String, Value>, field: &str) -> PortResult<Option<&'a str>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(PortError::Validation(format!("{} must be a string", field))),
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str) -> PortResult<&'a str> {
    optional_str(obj, field)?.ok_or_else(|| PortError::Validation(format!("{} is missing", field)))
}

fn literal(obj: &Map<String, Value>, field: &str, expected: &str) -> PortResult<String> {
    let value = required_str(obj, field)?;
    if value != expected {
        return Err(PortError::Validation(format!(
            "{} must be {:?}, got {:?}",
            field, expected, value
        )));
    }
    Ok(value.to_string())
}

fn hex(obj: &Map<String, Value>, field: &str, pattern: &Regex) -> PortResult<Option<String>> {
    match optional_str(obj, field)? {
        None => Ok(None),
        Some(value) if pattern.is_match(value) => Ok(Some(value.to_string())),
        Some(_) => Err(PortError::Validation(format!(
            "{} is not lowercase hex of the expected length",
            field
        ))),
    }
}

fn required_hex(obj: &Map<String, Value>, field: &str, pattern: &Regex) -> PortResult<String> {
    hex(obj, field, pattern)?.ok_or_else(|| PortError::Validation(format!("{} is missing", field)))
}

fn name(obj: &Map<String, Value>) -> PortResult<Option<String>> {
    match optional_str(obj, "name")? {
        Some(name) if name.chars().count() > NAME_LENGTH_LIMIT => Err(PortError::Validation(
            format!("name longer than {} characters", NAME_LENGTH_LIMIT),
        )),
        other => Ok(other.map(str::to_string)),
    }
}

fn timestamp(obj: &Map<String, Value>, field: &str) -> PortResult<Option<DateTime<Utc>>> {
    optional_str(obj, field)?
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| PortError::Validation(format!("{} is not a datetime", field)))
        })
        .transpose()
}

fn peer_v1(
    value: &Value,
    kind: PortKind,
    pubkey_required: bool,
    ticket_required: bool,
    with_expiry: bool,
) -> PortResult<PeerBundle> {
    let obj = object(value)?;
    let pubkey = hex(obj, "pubkey", &LONG_HEX)?;
    if pubkey_required && pubkey.is_none() {
        return Err(PortError::Validation("pubkey is missing".to_string()));
    }
    let ticket = hex(obj, "ticket", &SHORT_HEX)?;
    if ticket_required && ticket.is_none() {
        return Err(PortError::Validation("ticket is missing".to_string()));
    }
    Ok(PeerBundle {
        port_id: required_hex(obj, "portId", &SHORT_HEX)?,
        version: literal(obj, "version", V1)?,
        org: literal(obj, "org", ORG_NAME)?,
        target: {
            literal(obj, "target", kind.target())?;
            kind
        },
        name: name(obj)?,
        rad: required_hex(obj, "rad", &SHORT_HEX)?,
        key_hash: required_hex(obj, "keyHash", &LONG_HEX)?,
        pubkey,
        ticket,
        expiry_timestamp: if with_expiry {
            timestamp(obj, "expiryTimestamp")?
        } else {
            None
        },
    })
}

fn group_v1(value: &Value, kind: PortKind, with_expiry: bool) -> PortResult<GroupBundle> {
    let obj = object(value)?;
    Ok(GroupBundle {
        port_id: required_hex(obj, "portId", &SHORT_HEX)?,
        version: literal(obj, "version", V1)?,
        org: literal(obj, "org", ORG_NAME)?,
        target: {
            literal(obj, "target", kind.target())?;
            kind
        },
        name: name(obj)?,
        description: optional_str(obj, "description")?.map(str::to_string),
        expiry_timestamp: if with_expiry {
            timestamp(obj, "expiryTimestamp")?
        } else {
            None
        },
    })
}

/// Direct port bundle, 1.0.0.
pub fn validate_direct_v1(value: &Value) -> PortResult<Bundle> {
    peer_v1(value, PortKind::Direct, false, false, true).map(Bundle::Peer)
}

/// Superport bundle, 1.0.0.
pub fn validate_superport_v1(value: &Value) -> PortResult<Bundle> {
    peer_v1(value, PortKind::Superport, false, false, false).map(Bundle::Peer)
}

/// Contact port bundle as read by a new peer, 1.0.0. Requires pubkey and
/// ticket.
pub fn validate_contact_port_v1(value: &Value) -> PortResult<Bundle> {
    peer_v1(value, PortKind::ContactPort, true, true, false).map(Bundle::Peer)
}

/// Contact port bundle as sent by its owner to a contact, 1.0.0. Requires
/// pubkey; carries no ticket yet.
pub fn validate_contact_port_material_v1(value: &Value) -> PortResult<PeerBundle> {
    peer_v1(value, PortKind::ContactPort, true, false, false)
}

/// Group port bundle, 1.0.0.
pub fn validate_group_v1(value: &Value) -> PortResult<Bundle> {
    group_v1(value, PortKind::Group, true).map(Bundle::Group)
}

/// Group superport bundle, 1.0.0.
pub fn validate_group_superport_v1(value: &Value) -> PortResult<Bundle> {
    group_v1(value, PortKind::GroupSuperport, false).map(Bundle::Group)
}

/// Read the dispatch tag of an untyped bundle: org must match, target must
/// be known. The version is returned as found (it may be absent).
pub fn inspect_tag(value: &Value) -> PortResult<(PortKind, Option<String>)> {
    let obj = object(value)?;
    literal(obj, "org", ORG_NAME)?;
    let target = required_str(obj, "target")?;
    let kind = PortKind::from_target(target)
        .ok_or_else(|| PortError::Validation(format!("unknown target {:?}", target)))?;
    let version = optional_str(obj, "version")?.map(str::to_string);
    Ok((kind, version))
}

/// Check a published public key against the key hash beside it.
///
/// The hash is SHA-256 over the raw key bytes, lowercase hex.
pub fn verify_published_key(pubkey: &str, key_hash: &str) -> PortResult<()> {
    let bytes = ::hex::decode(pubkey)
        .map_err(|_| PortError::Validation("pubkey is not hex".to_string()))?;
    if ::hex::encode(Sha256::digest(&bytes)) != key_hash {
        return Err(PortError::Validation(
            "pubkey does not match keyHash".to_string(),
        ));
    }
    Ok(())
}
