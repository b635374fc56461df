//! Read-only view of an editor scene.
//!
//! The exporter never owns the scene graph. It reads objects, materials and
//! derived geometry through [`SceneSource`], which the editor integration (or
//! the bundled [`Scene`] snapshot) implements.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Deref;

use bon::Builder;
use variantly::Variantly;

use crate::error::{EscherError, EscherResult};

pub mod classify;
pub mod snapshot;

pub use snapshot::Scene;

/// Position of an object within [`SceneSource::objects`].
pub type ObjectId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Variantly)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ObjectKind {
    /// Carries a mesh.
    Mesh,
    /// Anchor without geometry.
    Empty,
}

/// World-space placement. Orientation is XYZ Euler angles in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Transform {
    pub translation: [f32; 3],
    pub orientation: [f32; 3],
}

/// Free-form tag attached to an object by the editor tooling.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MarkerValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl MarkerValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            MarkerValue::Int(_) => "integer",
            MarkerValue::Float(_) => "float",
            MarkerValue::Str(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MarkerValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MarkerValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for MarkerValue {
    fn from(value: &str) -> Self {
        MarkerValue::Str(value.to_string())
    }
}

impl From<i64> for MarkerValue {
    fn from(value: i64) -> Self {
        MarkerValue::Int(value)
    }
}

impl From<f64> for MarkerValue {
    fn from(value: f64) -> Self {
        MarkerValue::Float(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub position: [f32; 3],
    #[cfg_attr(feature = "serde", serde(default))]
    pub normal: [f32; 3],
}

/// One corner of a polygon.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loop {
    pub vertex: u32,
    /// One coordinate pair per UV layer of the owning mesh.
    #[cfg_attr(feature = "serde", serde(default))]
    pub uvs: Vec<[f32; 2]>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Polygon {
    pub material_index: usize,
    pub smooth: bool,
    pub normal: [f32; 3],
    pub loops: Vec<Loop>,
}

impl Polygon {
    /// Normal to emit for a corner at `vertex`: the face normal on flat
    /// polygons, the shared vertex normal on smooth ones.
    pub fn effective_normal(&self, vertex: &Vertex) -> [f32; 3] {
        if self.smooth { vertex.normal } else { self.normal }
    }
}

/// Modifier-evaluated, world-space geometry.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub polygons: Vec<Polygon>,
    pub uv_layers: Vec<String>,
    /// Material slots; a polygon's `material_index` points in here.
    pub materials: Vec<Option<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TextureMap {
    Color,
    Normal,
    /// Mapped to something the engine does not consume.
    Unmapped,
}

impl std::fmt::Display for TextureMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TextureMap::Color => "COLOR",
            TextureMap::Normal => "NORMAL",
            TextureMap::Unmapped => "NONE",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureRef {
    pub map: TextureMap,
    #[cfg_attr(feature = "serde", serde(default))]
    pub image_path: Option<String>,
}

#[derive(Builder, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    #[builder(into)]
    pub name: String,
    #[builder(default = [0.8, 0.8, 0.8])]
    #[cfg_attr(feature = "serde", serde(default))]
    pub diffuse_color: [f32; 3],
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    pub textures: Vec<TextureRef>,
}

#[derive(Builder, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneObject {
    #[builder(into)]
    pub name: String,
    pub kind: ObjectKind,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    pub transform: Transform,
    /// Name of the parent object, if any.
    #[builder(into)]
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<String>,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    pub markers: BTreeMap<String, MarkerValue>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mesh: Option<Mesh>,
}

impl SceneObject {
    pub fn marker(&self, key: &str) -> Option<&MarkerValue> {
        self.markers.get(key)
    }

    pub fn with_marker(mut self, key: impl Into<String>, value: impl Into<MarkerValue>) -> Self {
        self.markers.insert(key.into(), value.into());
        self
    }
}

/// Narrow read-only capability interface over the editor's scene graph.
pub trait SceneSource: Sync {
    fn materials(&self) -> &[Material];

    fn objects(&self) -> &[SceneObject];

    /// Direct children of `id`, in snapshot order.
    fn children(&self, id: ObjectId) -> &[ObjectId];

    /// Produce the world-space, modifier-evaluated mesh of a mesh object.
    ///
    /// Every `Some` returned here is paired with exactly one
    /// [`SceneSource::release_mesh`] call; use [`DerivedMesh`] rather than
    /// calling this directly.
    fn acquire_mesh(&self, id: ObjectId) -> Option<Cow<'_, Mesh>>;

    fn release_mesh(&self, _id: ObjectId) {}
}

/// Scoped handle to a derived mesh. The mesh is handed back to the source
/// when the handle drops, including on early returns.
pub struct DerivedMesh<'s, S: SceneSource + ?Sized> {
    source: &'s S,
    id: ObjectId,
    mesh: Cow<'s, Mesh>,
}

impl<'s, S: SceneSource + ?Sized> DerivedMesh<'s, S> {
    pub fn acquire(source: &'s S, id: ObjectId) -> EscherResult<Self> {
        let object = &source.objects()[id];
        if !object.kind.is_mesh() {
            return Err(EscherError::type_mismatch(
                &object.name,
                "mesh object",
                "empty",
            ));
        }

        let mesh = source.acquire_mesh(id).ok_or_else(|| {
            EscherError::invalid_geometry(&object.name, "editor produced no evaluated mesh")
        })?;

        Ok(Self { source, id, mesh })
    }
}

impl<S: SceneSource + ?Sized> Deref for DerivedMesh<'_, S> {
    type Target = Mesh;

    fn deref(&self) -> &Mesh {
        &self.mesh
    }
}

impl<S: SceneSource + ?Sized> Drop for DerivedMesh<'_, S> {
    fn drop(&mut self) {
        self.source.release_mesh(self.id);
    }
}
