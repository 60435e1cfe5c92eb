//! usdzconvert argument construction.
//!
//! The argument vector is a pure function of the job: the same manifest and
//! options always produce the same arguments, so a logged invocation can be
//! reproduced exactly.

use std::path::Path;

use super::color;
use crate::job::{ConversionJob, FileEntry, TextureSlot};

pub const COPY_TEXTURES_FLAG: &str = "-copytextures";
pub const TEX_COORD_SET_FLAG: &str = "-texCoordSet";
pub const MATERIAL_FLAG: &str = "-m";

/// Output extensions that reference textures instead of embedding them.
const USD_FAMILY_EXTENSIONS: [&str; 3] = ["usd", "usda", "usdc"];

/// Arguments for one converter invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltArguments {
    pub args: Vec<String>,
    /// Ids of texture entries that could not be passed to the converter.
    pub skipped: Vec<String>,
}

/// Default texture coordinate set name for a scene extension (with dot).
pub fn default_uv_set(scene_extension: &str) -> Option<&'static str> {
    match scene_extension.to_ascii_lowercase().as_str() {
        ".abc" => Some("uv"),
        ".gltf" | ".glb" | ".bin" => Some("TEXCOORD_0"),
        ".obj" => Some("UVMap"),
        _ => None,
    }
}

/// Builds the converter arguments for `job`.
///
/// The interpreter and script path are not included; see
/// [`crate::worker::stage`] for the full command line.
pub fn build(job: &ConversionJob) -> BuiltArguments {
    let mut built = BuiltArguments::default();
    let args = &mut built.args;

    args.push(path_arg(job.scene_file()));
    args.push(path_arg(job.out_file()));

    let extra: Vec<&str> = job.extra_args().split_whitespace().collect();

    if is_usd_family(job.out_file())
        && !job.option_args().iter().any(|a| a == COPY_TEXTURES_FLAG)
        && !extra.contains(&COPY_TEXTURES_FLAG)
    {
        args.push(COPY_TEXTURES_FLAG.to_string());
    }

    args.extend(extra.iter().map(|a| a.to_string()));
    args.extend(job.option_args().iter().cloned());

    let mut textures: Vec<(&FileEntry, &TextureSlot)> = Vec::new();
    for (entry, slot) in job.manifest().textures() {
        if slot.map_type.is_none() || entry.path.as_os_str().is_empty() {
            built.skipped.push(entry.id.clone());
        } else {
            textures.push((entry, slot));
        }
    }

    let mut uv_sets: Vec<&str> = textures
        .iter()
        .filter_map(|(_, slot)| slot.uv_set_name())
        .collect();
    uv_sets.sort_unstable();
    uv_sets.dedup();
    let per_material_uv = uv_sets.len() > 1;

    if !per_material_uv {
        if let Some(name) = default_uv_set(&job.scene_extension()) {
            args.push(TEX_COORD_SET_FLAG.to_string());
            args.push(name.to_string());
        }
    }

    // Stable: ties keep manifest order.
    textures.sort_by(|a, b| a.1.material_name().cmp(b.1.material_name()));

    let mut previous_material = "";
    for (entry, slot) in textures {
        let Some(map_type) = slot.map_type else {
            continue;
        };

        let material = slot.material_name();
        if material != previous_material && !material.is_empty() {
            args.push(MATERIAL_FLAG.to_string());
            args.push(material.to_string());
            if per_material_uv {
                if let Some(uv) = slot.uv_set_name() {
                    args.push(TEX_COORD_SET_FLAG.to_string());
                    args.push(uv.to_string());
                }
            }
        }
        previous_material = material;

        args.push(format!("-{}", map_type));
        if let Some(channel) = slot.channel {
            args.push(channel.as_str().to_string());
        }
        args.push(path_arg(&entry.path));
        if let Some(value) = slot
            .fallback_color
            .as_deref()
            .and_then(|rgba| color::color_argument(map_type, rgba))
        {
            args.push(value);
        }
    }

    built
}

fn is_usd_family(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            USD_FAMILY_EXTENSIONS
                .iter()
                .any(|usd| usd.eq_ignore_ascii_case(e))
        })
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
