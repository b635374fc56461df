//! Line-oriented `.esc` serialization.
//!
//! Layout (version 6):
//!
//! ```text
//! escher version 6
//! nummaterials <M>
//! material <i> "<name>" numtex <T>
//! texture <COLOR|NORMAL|NONE> <basename>
//! numspaces <S>
//! space <i> numverts <V> numfaces <F> numremotes <R> numspawns <P>
//! remote <j> space <target|-1> translation <x> <y> <z> orientation <x> <y> <z>
//! spawn <j> translation <x> <y> <z> orientation <x> <y> <z> params <type>[ path <x> <y> <z> ...]
//! vert <k> <x> <y> <z>
//! face <k> <mat <i>|remote <j>> vdata <L> (<v> [<u> <v>]* <nx> <ny> <nz>)*
//! ```
//!
//! Every count precedes exactly that many records. Axis conversion happens
//! here and nowhere else.

use std::io::Write;

use itertools::Itertools;
use rootcause::Report;

use super::model::{FaceRecord, FaceTarget, MapModel, MaterialRecord, SpaceRecord};
use super::options::{AxisConvention, ExportOptions};
use crate::error::{EscherError, EscherResult};

pub const FORMAT_VERSION: u32 = 6;

pub struct MapWriter<'w, W: Write> {
    out: &'w mut W,
    precision: usize,
    axes: AxisConvention,
    target: String,
}

impl<'w, W: Write> MapWriter<'w, W> {
    pub fn new(out: &'w mut W, options: &ExportOptions) -> Self {
        Self {
            out,
            precision: options.precision,
            axes: options.axes,
            target: "<output stream>".to_string(),
        }
    }

    /// Name used for the destination in I/O errors.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn write_map(&mut self, model: &MapModel) -> EscherResult<()> {
        self.line(format_args!("escher version {FORMAT_VERSION}"))?;

        self.line(format_args!("nummaterials {}", model.materials.len()))?;
        for (ordinal, material) in model.materials.iter().enumerate() {
            self.write_material(ordinal, material)?;
        }

        self.line(format_args!("numspaces {}", model.spaces.len()))?;
        for space in &model.spaces {
            self.write_space(space)?;
        }

        Ok(())
    }

    fn write_material(&mut self, ordinal: usize, material: &MaterialRecord) -> EscherResult<()> {
        self.line(format_args!(
            "material {ordinal} \"{}\" numtex {}",
            material.name,
            material.textures.len()
        ))?;
        for texture in &material.textures {
            self.line(format_args!("texture {} {}", texture.map, texture.basename))?;
        }
        Ok(())
    }

    fn write_space(&mut self, space: &SpaceRecord) -> EscherResult<()> {
        self.line(format_args!(
            "space {} numverts {} numfaces {} numremotes {} numspawns {}",
            space.ordinal,
            space.vertices.len(),
            space.faces.len(),
            space.remotes.len(),
            space.spawns.len()
        ))?;

        for (ordinal, remote) in space.remotes.iter().enumerate() {
            let target = remote.target.map_or(-1, |t| t as i64);
            let line = format!(
                "remote {ordinal} space {target} translation {} orientation {}",
                self.vector(remote.translation),
                self.vector(remote.orientation)
            );
            self.line(format_args!("{line}"))?;
        }

        for (ordinal, spawn) in space.spawns.iter().enumerate() {
            let mut line = format!(
                "spawn {ordinal} translation {} orientation {} params {}",
                self.vector(spawn.translation),
                self.vector(spawn.orientation),
                spawn.spawn_type
            );
            if let Some(path) = &spawn.path {
                line.push_str(" path ");
                line.push_str(&path.iter().map(|&p| self.vector(p)).join(" "));
            }
            self.line(format_args!("{line}"))?;
        }

        for (ordinal, &position) in space.vertices.iter().enumerate() {
            let line = format!("vert {ordinal} {}", self.vector(position));
            self.line(format_args!("{line}"))?;
        }

        for (ordinal, face) in space.faces.iter().enumerate() {
            let line = self.face_line(ordinal, face);
            self.line(format_args!("{line}"))?;
        }

        Ok(())
    }

    fn face_line(&self, ordinal: usize, face: &FaceRecord) -> String {
        let target = match face.target {
            FaceTarget::Material(material) => format!("mat {material}"),
            FaceTarget::Remote(remote) => format!("remote {remote}"),
        };
        let corners = face
            .loops
            .iter()
            .map(|corner| {
                let uvs = corner.uvs.iter().map(|&uv| self.uv(uv));
                std::iter::once(corner.vertex.to_string())
                    .chain(uvs)
                    .chain(std::iter::once(self.vector(corner.normal)))
                    .join(" ")
            })
            .join(" ");

        if corners.is_empty() {
            format!("face {ordinal} {target} vdata 0")
        } else {
            format!(
                "face {ordinal} {target} vdata {} {corners}",
                face.loops.len()
            )
        }
    }

    fn float(&self, value: f32) -> String {
        let text = format!("{:.*}", self.precision, value);
        // Anything that rounds to zero is written unsigned.
        match text.strip_prefix('-') {
            Some(magnitude) if magnitude.bytes().all(|b| b == b'0' || b == b'.') => {
                magnitude.to_string()
            }
            _ => text,
        }
    }

    fn vector(&self, value: [f32; 3]) -> String {
        self.axes.vector(value).iter().map(|&c| self.float(c)).join(" ")
    }

    fn uv(&self, value: [f32; 2]) -> String {
        self.axes.uv(value).iter().map(|&c| self.float(c)).join(" ")
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) -> EscherResult<()> {
        writeln!(self.out, "{args}").map_err(|err| {
            Report::new(EscherError::Io {
                path: self.target.clone(),
                err,
            })
        })
    }
}
