//! Fully resolved map model, produced by the encoder and consumed by the
//! writer. Every cross reference here is already an ordinal; values are still
//! in editor coordinates.

use variantly::Variantly;

use crate::scene::TextureMap;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MaterialRecord {
    pub name: String,
    pub textures: Vec<TextureRecord>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TextureRecord {
    pub map: TextureMap,
    /// Image file name without its directory.
    pub basename: String,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RemoteRecord {
    /// Object the remote was read from, for diagnostics.
    pub name: String,
    pub slot: u32,
    /// Ordinal of the linked space, `None` when the portal leads nowhere.
    pub target: Option<usize>,
    pub translation: [f32; 3],
    pub orientation: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SpawnRecord {
    pub name: String,
    pub spawn_type: String,
    pub translation: [f32; 3],
    pub orientation: [f32; 3],
    /// World-space corners of the path polygon.
    pub path: Option<Vec<[f32; 3]>>,
}

/// What a face is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Variantly)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FaceTarget {
    /// Ordinal into the material catalog.
    Material(usize),
    /// Ordinal of the space's remote whose opening this face is.
    Remote(usize),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoopRecord {
    pub vertex: u32,
    pub uvs: Vec<[f32; 2]>,
    pub normal: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FaceRecord {
    pub target: FaceTarget,
    pub loops: Vec<LoopRecord>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SpaceRecord {
    pub name: String,
    pub ordinal: usize,
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<FaceRecord>,
    pub remotes: Vec<RemoteRecord>,
    pub spawns: Vec<SpawnRecord>,
}

/// Everything needed to write one `.esc` file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MapModel {
    pub materials: Vec<MaterialRecord>,
    pub spaces: Vec<SpaceRecord>,
}

/// Counts reported after an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExportSummary {
    pub materials: usize,
    pub spaces: usize,
    pub vertices: usize,
    pub faces: usize,
    pub remotes: usize,
    pub spawns: usize,
}

impl MapModel {
    pub fn summary(&self) -> ExportSummary {
        self.spaces.iter().fold(
            ExportSummary {
                materials: self.materials.len(),
                spaces: self.spaces.len(),
                ..Default::default()
            },
            |mut summary, space| {
                summary.vertices += space.vertices.len();
                summary.faces += space.faces.len();
                summary.remotes += space.remotes.len();
                summary.spawns += space.spawns.len();
                summary
            },
        )
    }
}
