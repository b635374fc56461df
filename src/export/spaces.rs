//! Discovery of the spaces in a scene.

use rootcause::Report;
use tracing::debug;

use crate::error::{EscherError, EscherResult};
use crate::index::OrderedIndex;
use crate::scene::classify::{MarkerKeys, Role, classify_object, unqualify};
use crate::scene::{ObjectId, SceneObject, SceneSource};

/// An anchor or path that sits where the encoder will never reach it.
fn misplaced(object: &SceneObject, role: Role, expected: &'static str) -> Report<EscherError> {
    let found = match &object.parent {
        Some(parent) => format!("{role} parented to '{parent}'"),
        None => format!("{role} without a parent"),
    };
    EscherError::type_mismatch(&object.name, expected, found)
}

/// Spaces keyed by unqualified name, numbered in discovery order.
#[derive(Debug, Default)]
pub struct SpaceIndex {
    spaces: OrderedIndex<ObjectId>,
}

impl SpaceIndex {
    /// Single left-to-right pass over every scene object, picking up PSOs.
    ///
    /// Remote and spawn anchors must be direct children of a PSO, and paths
    /// direct children of a spawn. Anything else could never be exported and
    /// fails the scan.
    pub fn collect<S: SceneSource + ?Sized>(source: &S, keys: &MarkerKeys) -> EscherResult<Self> {
        let objects = source.objects();
        let roles = objects
            .iter()
            .map(|object| classify_object(object, keys))
            .collect::<EscherResult<Vec<_>>>()?;

        let mut parents = vec![None; objects.len()];
        for id in 0..objects.len() {
            for &child in source.children(id) {
                parents[child] = Some(id);
            }
        }

        let mut spaces = OrderedIndex::new();
        for (id, object) in objects.iter().enumerate() {
            let parent_role = parents[id].map(|parent| roles[parent]);
            match roles[id] {
                Role::Pso => {
                    if !object.kind.is_mesh() {
                        return Err(EscherError::type_mismatch(
                            &object.name,
                            "mesh object",
                            "empty",
                        ));
                    }
                    let ordinal = spaces.insert(unqualify(&object.name), id)?;
                    debug!("space {ordinal}: '{}'", object.name);
                }
                Role::Sso => debug!("skipping secondary space object '{}'", object.name),
                role @ (Role::Remote | Role::Spawn) if parent_role != Some(Role::Pso) => {
                    return Err(misplaced(object, role, "anchor parented to a space object"));
                }
                Role::Path if parent_role != Some(Role::Spawn) => {
                    return Err(misplaced(object, Role::Path, "path parented to a spawn anchor"));
                }
                _ => {}
            }
        }

        Ok(Self { spaces })
    }

    /// Ordinal of a space by name; qualified names are accepted.
    pub fn resolve(&self, name: &str) -> EscherResult<usize> {
        self.spaces
            .ordinal_of(unqualify(name))
            .ok_or_else(|| EscherError::unresolved("space", name))
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// `(space name, PSO object)` in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ObjectId)> {
        self.spaces.iter().map(|(name, &id)| (name, id))
    }
}
