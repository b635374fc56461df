//! Per-space encoding: geometry, remotes, spawns and their paths.
//!
//! Encoding one space only reads the scene and the two global indices, so
//! spaces can be encoded independently of each other.

use std::collections::{HashMap, HashSet};

use rootcause::Report;
use tracing::{debug, info, warn};

use super::materials::{MaterialCatalog, MaterialRef};
use super::model::{FaceRecord, FaceTarget, LoopRecord, RemoteRecord, SpaceRecord, SpawnRecord};
use super::options::ExportOptions;
use super::spaces::SpaceIndex;
use crate::error::{EscherError, EscherResult};
use crate::scene::classify::{Role, classify_object, string_marker};
use crate::scene::{DerivedMesh, Mesh, ObjectId, ObjectKind, Polygon, SceneObject, SceneSource};

/// Lowest portal slot below `cap` that is not in `used`.
///
/// This is the slot the editor tooling assigns to a newly created remote.
pub fn allocate_portal_slot(used: impl IntoIterator<Item = u32>, cap: u32) -> EscherResult<u32> {
    let used: HashSet<u32> = used.into_iter().collect();
    (0..cap)
        .find(|slot| !used.contains(slot))
        .ok_or_else(|| Report::new(EscherError::PaletteExhausted { cap }))
}

pub struct SpaceEncoder<'a, S: SceneSource + ?Sized> {
    source: &'a S,
    materials: &'a MaterialCatalog,
    spaces: &'a SpaceIndex,
    options: &'a ExportOptions,
}

impl<'a, S: SceneSource + ?Sized> SpaceEncoder<'a, S> {
    pub fn new(
        source: &'a S,
        materials: &'a MaterialCatalog,
        spaces: &'a SpaceIndex,
        options: &'a ExportOptions,
    ) -> Self {
        Self {
            source,
            materials,
            spaces,
            options,
        }
    }

    fn object(&self, id: ObjectId) -> &'a SceneObject {
        &self.source.objects()[id]
    }

    /// Encode the space `name` backed by the PSO `pso`.
    pub fn encode(&self, ordinal: usize, name: &str, pso: ObjectId) -> EscherResult<SpaceRecord> {
        let mut remotes = Vec::new();
        let mut spawns = Vec::new();
        for &child in self.source.children(pso) {
            let object = self.object(child);
            match classify_object(object, &self.options.markers)? {
                Role::Remote => remotes.push(self.encode_remote(object)?),
                Role::Spawn => spawns.push(self.encode_spawn(child)?),
                Role::Unqualified if object.kind.is_mesh() => warn!(
                    "space '{name}': mesh '{}' is not part of the space geometry and is not exported",
                    object.name
                ),
                role => debug!("space '{name}': ignoring child '{}' ({role})", object.name),
            }
        }

        let slot_owners = slot_owners(name, &remotes)?;

        let mesh = DerivedMesh::acquire(self.source, pso)?;
        let slots = self.resolve_slots(&self.object(pso).name, &mesh)?;
        let faces = mesh
            .polygons
            .iter()
            .enumerate()
            .map(|(index, polygon)| {
                let target = self.face_target(name, index, polygon, &slots, &slot_owners)?;
                let loops = encode_loops(name, index, &mesh, polygon)?;
                Ok(FaceRecord { target, loops })
            })
            .collect::<EscherResult<Vec<_>>>()?;
        let vertices = mesh.vertices.iter().map(|v| v.position).collect::<Vec<_>>();
        drop(mesh);

        info!(
            "space {ordinal} '{name}': {} verts, {} faces, {} remotes, {} spawns",
            vertices.len(),
            faces.len(),
            remotes.len(),
            spawns.len()
        );

        Ok(SpaceRecord {
            name: name.to_string(),
            ordinal,
            vertices,
            faces,
            remotes,
            spawns,
        })
    }

    fn encode_remote(&self, object: &SceneObject) -> EscherResult<RemoteRecord> {
        let keys = &self.options.markers;
        let target_name = string_marker(object, &keys.remote_space)?.ok_or_else(|| {
            Report::new(EscherError::MissingField {
                name: object.name.clone(),
                field: keys.remote_space.clone(),
            })
        })?;

        let target = if target_name == keys.none_sentinel {
            None
        } else {
            let ordinal = self.spaces.resolve(target_name).map_err(|_| {
                EscherError::unresolved(
                    "remote target space",
                    format!("{target_name} (from remote '{}')", object.name),
                )
            })?;
            Some(ordinal)
        };

        Ok(RemoteRecord {
            name: object.name.clone(),
            slot: self.portal_slot(object)?,
            target,
            translation: object.transform.translation,
            orientation: object.transform.orientation,
        })
    }

    fn portal_slot(&self, object: &SceneObject) -> EscherResult<u32> {
        let key = &self.options.markers.portal_slot;
        let cap = self.options.max_portal_slots;
        let value = object.marker(key).ok_or_else(|| {
            Report::new(EscherError::MissingField {
                name: object.name.clone(),
                field: key.clone(),
            })
        })?;

        let slot = value.as_int().ok_or_else(|| {
            EscherError::type_mismatch(
                format!("{}.{key}", object.name),
                "integer",
                value.type_name(),
            )
        })?;
        if slot < 0 {
            return Err(EscherError::type_mismatch(
                format!("{}.{key}", object.name),
                "non-negative integer",
                slot.to_string(),
            ));
        }
        if slot >= i64::from(cap) {
            return Err(Report::new(EscherError::SlotOutOfRange {
                name: object.name.clone(),
                slot,
                cap,
            }));
        }

        Ok(slot as u32)
    }

    fn encode_spawn(&self, id: ObjectId) -> EscherResult<SpawnRecord> {
        let object = self.object(id);
        let keys = &self.options.markers;
        if object.kind != ObjectKind::Empty {
            return Err(EscherError::type_mismatch(
                &object.name,
                "spawn anchor",
                "mesh object",
            ));
        }

        let spawn_type = string_marker(object, &keys.spawn_type)?.ok_or_else(|| {
            Report::new(EscherError::MissingField {
                name: object.name.clone(),
                field: keys.spawn_type.clone(),
            })
        })?;
        if spawn_type.is_empty() || spawn_type.chars().any(char::is_whitespace) {
            return Err(Report::new(EscherError::InvalidName {
                name: spawn_type.to_string(),
                reason: format!(
                    "spawn type of '{}' must be a single non-empty word",
                    object.name
                ),
            }));
        }

        let mut paths = Vec::new();
        for &child in self.source.children(id) {
            if classify_object(self.object(child), keys)? == Role::Path {
                paths.push(child);
            }
        }
        let path = match paths.as_slice() {
            [] => None,
            [path] => Some(self.encode_path(*path)?),
            _ => {
                return Err(Report::new(EscherError::MultiplePaths {
                    spawn: object.name.clone(),
                    count: paths.len(),
                }));
            }
        };

        Ok(SpawnRecord {
            name: object.name.clone(),
            spawn_type: spawn_type.to_string(),
            translation: object.transform.translation,
            orientation: object.transform.orientation,
            path,
        })
    }

    /// Flatten a path object's single polygon into world-space corners.
    fn encode_path(&self, id: ObjectId) -> EscherResult<Vec<[f32; 3]>> {
        let name = &self.object(id).name;
        let mesh = DerivedMesh::acquire(self.source, id)?;
        let [polygon] = mesh.polygons.as_slice() else {
            return Err(EscherError::invalid_geometry(
                name,
                format!(
                    "a path must be exactly one polygon, found {}",
                    mesh.polygons.len()
                ),
            ));
        };

        polygon
            .loops
            .iter()
            .map(|corner| {
                mesh.vertices
                    .get(corner.vertex as usize)
                    .map(|v| v.position)
                    .ok_or_else(|| {
                        EscherError::invalid_geometry(
                            name,
                            format!("path corner references missing vertex {}", corner.vertex),
                        )
                    })
            })
            .collect()
    }

    /// Decode every named material slot of `mesh` once.
    fn resolve_slots(&self, object_name: &str, mesh: &Mesh) -> EscherResult<Vec<Option<MaterialRef>>> {
        mesh.materials
            .iter()
            .map(|slot| {
                slot.as_deref()
                    .map(|material| {
                        self.materials.resolve(material).map_err(|_| {
                            EscherError::unresolved(
                                "material",
                                format!("{material} (used by '{object_name}')"),
                            )
                        })
                    })
                    .transpose()
            })
            .collect()
    }

    fn face_target(
        &self,
        space: &str,
        index: usize,
        polygon: &Polygon,
        slots: &[Option<MaterialRef>],
        slot_owners: &HashMap<u32, usize>,
    ) -> EscherResult<FaceTarget> {
        let material = slots
            .get(polygon.material_index)
            .copied()
            .flatten()
            .ok_or_else(|| {
                EscherError::unresolved(
                    "material slot",
                    format!("{space} face {index} slot {}", polygon.material_index),
                )
            })?;

        match material {
            MaterialRef::Plain(ordinal) => Ok(FaceTarget::Material(ordinal)),
            MaterialRef::Portal(slot) => slot_owners
                .get(&slot)
                .map(|&remote| FaceTarget::Remote(remote))
                .ok_or_else(|| {
                    EscherError::unresolved(
                        "portal slot",
                        format!("{space} face {index} slot {slot} (no remote owns it)"),
                    )
                }),
        }
    }
}

/// Map each portal slot to the ordinal of the remote owning it.
fn slot_owners(space: &str, remotes: &[RemoteRecord]) -> EscherResult<HashMap<u32, usize>> {
    let mut owners = HashMap::with_capacity(remotes.len());
    for (ordinal, remote) in remotes.iter().enumerate() {
        if let Some(&first) = owners.get(&remote.slot) {
            let first: &RemoteRecord = &remotes[first];
            return Err(Report::new(EscherError::DuplicateSlot {
                space: space.to_string(),
                slot: remote.slot,
                first: first.name.clone(),
                second: remote.name.clone(),
            }));
        }
        owners.insert(remote.slot, ordinal);
    }
    Ok(owners)
}

fn encode_loops(
    space: &str,
    index: usize,
    mesh: &Mesh,
    polygon: &Polygon,
) -> EscherResult<Vec<LoopRecord>> {
    polygon
        .loops
        .iter()
        .map(|corner| {
            let vertex = mesh.vertices.get(corner.vertex as usize).ok_or_else(|| {
                EscherError::invalid_geometry(
                    space,
                    format!("face {index} references missing vertex {}", corner.vertex),
                )
            })?;
            if corner.uvs.len() != mesh.uv_layers.len() {
                return Err(EscherError::invalid_geometry(
                    space,
                    format!(
                        "face {index} corner has {} UV pairs but the mesh has {} UV layers",
                        corner.uvs.len(),
                        mesh.uv_layers.len()
                    ),
                ));
            }

            Ok(LoopRecord {
                vertex: corner.vertex,
                uvs: corner.uvs.clone(),
                normal: polygon.effective_normal(vertex),
            })
        })
        .collect()
}
