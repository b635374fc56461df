use bon::Builder;

use super::materials::PORTAL_PALETTE;
use crate::scene::classify::MarkerKeys;

/// Number of distinct portal materials in the editor palette.
pub const PORTAL_PALETTE_SIZE: u32 = PORTAL_PALETTE.len() as u32;

/// How editor coordinates map onto engine coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AxisConvention {
    /// Editor Z-up to engine Y-up: `(x, y, z) -> (x, z, -y)`, `(u, v) -> (u, 1 - v)`.
    #[default]
    EngineYUp,
    /// Write editor values untouched. Useful when diffing against the scene.
    Identity,
}

impl AxisConvention {
    pub fn vector(self, [x, y, z]: [f32; 3]) -> [f32; 3] {
        match self {
            AxisConvention::EngineYUp => [x, z, -y],
            AxisConvention::Identity => [x, y, z],
        }
    }

    pub fn uv(self, [u, v]: [f32; 2]) -> [f32; 2] {
        match self {
            AxisConvention::EngineYUp => [u, 1.0 - v],
            AxisConvention::Identity => [u, v],
        }
    }
}

/// Options controlling map export.
#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExportOptions {
    /// Digits after the decimal point for every float. Default: 6.
    #[builder(default = 6)]
    pub precision: usize,
    #[builder(default)]
    pub axes: AxisConvention,
    /// Remotes may only use portal slots below this. Default: the palette size.
    #[builder(default = PORTAL_PALETTE_SIZE)]
    pub max_portal_slots: u32,
    /// Encode spaces on the rayon pool. Ignored without the `rayon` feature.
    #[builder(default)]
    pub parallel: bool,
    #[builder(default)]
    pub markers: MarkerKeys,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
