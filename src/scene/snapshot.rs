//! In-memory scene snapshot, the [`SceneSource`] used by the CLI and tests.

use std::borrow::Cow;

use rootcause::Report;
use tracing::debug;

use super::{Material, Mesh, ObjectId, ObjectKind, SceneObject, SceneSource};
use crate::error::{EscherError, EscherResult};
use crate::index::OrderedIndex;

/// A validated snapshot of every material and object in an editor scene.
///
/// Object meshes are expected to already be modifier-evaluated and in world
/// space, so [`SceneSource::acquire_mesh`] simply lends them out.
#[derive(Debug, Clone)]
pub struct Scene {
    materials: Vec<Material>,
    objects: Vec<SceneObject>,
    names: OrderedIndex<ObjectKind>,
    children: Vec<Vec<ObjectId>>,
    roots: Vec<ObjectId>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct SceneFile {
    #[serde(default)]
    materials: Vec<Material>,
    #[serde(default)]
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new(materials: Vec<Material>, objects: Vec<SceneObject>) -> EscherResult<Self> {
        let mut names = OrderedIndex::new();
        for object in &objects {
            match (object.kind, object.mesh.is_some()) {
                (ObjectKind::Mesh, false) => {
                    return Err(EscherError::type_mismatch(
                        &object.name,
                        "mesh object with geometry",
                        "mesh object without geometry",
                    ));
                }
                (ObjectKind::Empty, true) => {
                    return Err(EscherError::type_mismatch(
                        &object.name,
                        "empty",
                        "empty carrying geometry",
                    ));
                }
                _ => {}
            }
            names.insert(object.name.as_str(), object.kind)?;
        }

        let mut children = vec![Vec::new(); objects.len()];
        let mut roots = Vec::new();
        for (id, object) in objects.iter().enumerate() {
            match &object.parent {
                Some(parent) => {
                    let parent_id = names
                        .ordinal_of(parent)
                        .ok_or_else(|| EscherError::unresolved("parent object", parent))?;
                    children[parent_id].push(id);
                }
                None => roots.push(id),
            }
        }

        let scene = Self {
            materials,
            objects,
            names,
            children,
            roots,
        };

        // Anything unreachable from a root hangs off a parent cycle.
        let walked = scene.walk();
        if walked.len() != scene.objects.len() {
            let mut reached = vec![false; scene.objects.len()];
            for (id, _) in walked {
                reached[id] = true;
            }
            let id = reached.iter().position(|r| !r).unwrap_or_default();
            return Err(Report::new(EscherError::CyclicHierarchy {
                name: scene.objects[id].name.clone(),
            }));
        }

        debug!(
            "scene snapshot: {} materials, {} objects",
            scene.materials.len(),
            scene.objects.len()
        );

        Ok(scene)
    }

    #[cfg(feature = "json")]
    pub fn from_json_str(json: &str) -> EscherResult<Self> {
        let file: SceneFile =
            serde_json::from_str(json).map_err(|err| Report::new(EscherError::from(err)))?;
        Self::new(file.materials, file.objects)
    }

    #[cfg(feature = "json")]
    pub fn from_json_reader(reader: impl std::io::Read) -> EscherResult<Self> {
        let file: SceneFile =
            serde_json::from_reader(reader).map_err(|err| Report::new(EscherError::from(err)))?;
        Self::new(file.materials, file.objects)
    }

    pub fn object_id(&self, name: &str) -> Option<ObjectId> {
        self.names.ordinal_of(name)
    }

    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Depth-first pre-order walk of the whole hierarchy as `(id, depth)`.
    ///
    /// Uses an explicit stack; scene graphs can be arbitrarily deep.
    pub fn walk(&self) -> Vec<(ObjectId, usize)> {
        let mut out = Vec::with_capacity(self.objects.len());
        let mut stack: Vec<(ObjectId, usize)> =
            self.roots.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            stack.extend(self.children[id].iter().rev().map(|&child| (child, depth + 1)));
        }
        out
    }
}

impl SceneSource for Scene {
    fn materials(&self) -> &[Material] {
        &self.materials
    }

    fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    fn children(&self, id: ObjectId) -> &[ObjectId] {
        &self.children[id]
    }

    fn acquire_mesh(&self, id: ObjectId) -> Option<Cow<'_, Mesh>> {
        self.objects.get(id)?.mesh.as_ref().map(Cow::Borrowed)
    }
}
