//! Scene-wide material catalog and portal material decoding.
//!
//! Portal materials are synthetic: a face carrying `EscherPortal3` is the
//! opening of whichever remote in its space owns portal slot 3. They never
//! reach the catalog.

use rootcause::Report;
use tracing::debug;
use variantly::Variantly;

use super::model::{MaterialRecord, TextureRecord};
use crate::error::{EscherError, EscherResult};
use crate::index::OrderedIndex;
use crate::scene::{Material, TextureRef};

pub const PORTAL_MATERIAL_PREFIX: &str = "EscherPortal";

/// Diffuse colors the editor tooling gives portal materials, cycled by slot.
pub const PORTAL_PALETTE: [[f32; 3]; 8] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 0.5, 0.0],
    [0.5, 0.0, 1.0],
];

pub fn is_portal_material_name(name: &str) -> bool {
    name.starts_with(PORTAL_MATERIAL_PREFIX)
}

/// Decode the slot embedded in a portal material name.
///
/// `EscherPortal` is slot 0, `EscherPortal7` is slot 7.
pub fn portal_material_name_to_slot(name: &str) -> EscherResult<u32> {
    let invalid = |reason: &str| {
        Report::new(EscherError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    let suffix = name
        .strip_prefix(PORTAL_MATERIAL_PREFIX)
        .ok_or_else(|| invalid("not a portal material"))?;
    if suffix.is_empty() {
        return Ok(0);
    }
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("portal slot suffix must be a decimal number"));
    }
    suffix
        .parse()
        .map_err(|_| invalid("portal slot suffix out of range"))
}

pub fn portal_material_name(slot: u32) -> String {
    format!("{PORTAL_MATERIAL_PREFIX}{slot}")
}

pub fn portal_material_color(slot: u32) -> [f32; 3] {
    PORTAL_PALETTE[slot as usize % PORTAL_PALETTE.len()]
}

/// A material slot, decoded once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Variantly)]
pub enum MaterialRef {
    /// Ordinal into the catalog.
    Plain(usize),
    /// Portal slot of a remote.
    Portal(u32),
}

#[derive(Debug, Default)]
pub struct MaterialCatalog {
    materials: OrderedIndex<MaterialRecord>,
}

impl MaterialCatalog {
    /// Scan every scene material once, in order.
    pub fn collect(materials: &[Material]) -> EscherResult<Self> {
        let mut catalog = OrderedIndex::new();
        for material in materials {
            if is_portal_material_name(&material.name) {
                let slot = portal_material_name_to_slot(&material.name)?;
                debug!("portal material '{}' -> slot {slot}", material.name);
                continue;
            }
            if catalog.contains_key(&material.name) {
                continue;
            }

            let record = material_record(material)?;
            let ordinal = catalog.insert(material.name.as_str(), record)?;
            debug!("material {ordinal}: '{}'", material.name);
        }

        Ok(Self {
            materials: catalog,
        })
    }

    pub fn resolve(&self, name: &str) -> EscherResult<MaterialRef> {
        if is_portal_material_name(name) {
            return portal_material_name_to_slot(name).map(MaterialRef::Portal);
        }
        self.materials
            .ordinal_of(name)
            .map(MaterialRef::Plain)
            .ok_or_else(|| EscherError::unresolved("material", name))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn index(&self) -> &OrderedIndex<MaterialRecord> {
        &self.materials
    }

    pub fn records(&self) -> Vec<MaterialRecord> {
        self.materials.values().cloned().collect()
    }
}

fn material_record(material: &Material) -> EscherResult<MaterialRecord> {
    if material.name.is_empty() || material.name.chars().any(|c| c == '"' || c.is_control()) {
        return Err(Report::new(EscherError::InvalidName {
            name: material.name.clone(),
            reason: "material names must be non-empty and free of quotes and control characters"
                .to_string(),
        }));
    }

    let textures = material
        .textures
        .iter()
        .map(|texture| {
            Ok(TextureRecord {
                map: texture.map,
                basename: texture_basename(material, texture)?,
            })
        })
        .collect::<EscherResult<Vec<_>>>()?;

    Ok(MaterialRecord {
        name: material.name.clone(),
        textures,
    })
}

/// File name of a texture's image, with any directory (including Blender's
/// `//` relative prefix) removed.
fn texture_basename(material: &Material, texture: &TextureRef) -> EscherResult<String> {
    let path = texture.image_path.as_deref().ok_or_else(|| {
        Report::new(EscherError::MissingField {
            name: material.name.clone(),
            field: format!("{} texture image", texture.map),
        })
    })?;

    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if basename.is_empty() || basename.chars().any(char::is_whitespace) {
        return Err(Report::new(EscherError::InvalidName {
            name: path.to_string(),
            reason: "texture file names must be non-empty and contain no whitespace".to_string(),
        }));
    }

    Ok(basename.to_string())
}
