//! Role classification of scene objects.
//!
//! Mesh objects are typed by a name qualifier (`PSO_Room`, `PathO_patrol`).
//! Anchors are typed by the marker fields the editor tooling attaches to them.
//! Both schemes are in use in existing scenes.

use rootcause::Report;
use variantly::Variantly;

use super::{MarkerValue, ObjectKind, SceneObject};
use crate::error::{EscherError, EscherResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Variantly)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Role {
    Unqualified,
    /// Primary space object: the canonical geometry of a space.
    Pso,
    /// Secondary space object: a disposable instanced copy of a space.
    Sso,
    Remote,
    Spawn,
    Path,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Unqualified => "unqualified",
            Role::Pso => "PSO",
            Role::Sso => "SSO",
            Role::Remote => "remote",
            Role::Spawn => "spawn",
            Role::Path => "path",
        })
    }
}

/// Matched in order; the first matching prefix wins.
const QUALIFIERS: &[(&str, Role)] = &[
    ("PSO_", Role::Pso),
    ("SSO_", Role::Sso),
    ("PathO_", Role::Path),
    ("SpawnO_", Role::Spawn),
];

/// Prefix of the mesh datablock backing a space.
pub const MESH_PREFIX: &str = "PSM_";

/// Marker field names and sentinel values written by the editor tooling.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MarkerKeys {
    /// Name of the space a remote links to.
    pub remote_space: String,
    /// Portal slot a remote owns.
    pub portal_slot: String,
    /// Entity type a spawn produces.
    pub spawn_type: String,
    /// `remote_space` value meaning "linked to nothing".
    pub none_sentinel: String,
}

impl Default for MarkerKeys {
    fn default() -> Self {
        Self {
            remote_space: "escher_remote_space".to_string(),
            portal_slot: "escher_portal_slot".to_string(),
            spawn_type: "escher_spawn_type".to_string(),
            none_sentinel: "none".to_string(),
        }
    }
}

pub fn classify(name: &str) -> Role {
    QUALIFIERS
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|&(_, role)| role)
        .unwrap_or(Role::Unqualified)
}

/// Classify a full object: anchors by their markers, everything else by name.
pub fn classify_object(object: &SceneObject, keys: &MarkerKeys) -> EscherResult<Role> {
    if object.kind == ObjectKind::Empty {
        let remote = object.markers.contains_key(&keys.remote_space);
        let spawn = object.markers.contains_key(&keys.spawn_type);
        match (remote, spawn) {
            (true, true) => {
                return Err(EscherError::type_mismatch(
                    &object.name,
                    "either a remote or a spawn anchor",
                    "anchor marked as both",
                ));
            }
            (true, false) => return Ok(Role::Remote),
            (false, true) => return Ok(Role::Spawn),
            (false, false) => {}
        }
    }

    Ok(classify(&object.name))
}

fn prefixes() -> impl Iterator<Item = &'static str> {
    QUALIFIERS
        .iter()
        .map(|(prefix, _)| *prefix)
        .chain(std::iter::once(MESH_PREFIX))
}

/// Strip a recognized qualifier. Unqualified names are returned unchanged.
pub fn unqualify(name: &str) -> &str {
    prefixes()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

pub fn is_qualified(name: &str) -> bool {
    prefixes().any(|prefix| name.starts_with(prefix))
}

fn qualify(prefix: &str, space_name: &str) -> EscherResult<String> {
    if is_qualified(space_name) {
        return Err(Report::new(EscherError::InvalidName {
            name: space_name.to_string(),
            reason: "invalid space name: already qualified".to_string(),
        }));
    }
    Ok(format!("{prefix}{space_name}"))
}

pub fn space_name_to_pso_name(space_name: &str) -> EscherResult<String> {
    qualify("PSO_", space_name)
}

pub fn space_name_to_sso_name(space_name: &str) -> EscherResult<String> {
    qualify("SSO_", space_name)
}

pub fn space_name_to_mesh_name(space_name: &str) -> EscherResult<String> {
    qualify(MESH_PREFIX, space_name)
}

/// Read a marker that must be a string.
pub(crate) fn string_marker<'o>(
    object: &'o SceneObject,
    key: &str,
) -> EscherResult<Option<&'o str>> {
    match object.marker(key) {
        None => Ok(None),
        Some(MarkerValue::Str(value)) => Ok(Some(value)),
        Some(other) => Err(EscherError::type_mismatch(
            format!("{}.{key}", object.name),
            "string",
            other.type_name(),
        )),
    }
}
