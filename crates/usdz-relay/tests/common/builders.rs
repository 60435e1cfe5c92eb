//! Builders for test manifests and toolchains.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use usdz_relay::convert::EnvMap;
use usdz_relay::job::{FileEntry, Manifest, MapType, TextureSlot};
use usdz_relay::worker::{PreviewTool, Toolchain};

/// File names of the stand-in tools; the scripted supervisor keys on them.
pub const CONVERTER: &str = "usdzconvert";
pub const POST_PROCESS: &str = "post_process_abc.py";
pub const PREVIEW: &str = "usdrecord";

/// Converter-only toolchain with an empty environment.
pub fn toolchain(tools: &Path) -> Toolchain {
    Toolchain::new(tools.join(CONVERTER)).with_env(EnvMap::new())
}

pub fn post_process_toolchain(tools: &Path) -> Toolchain {
    toolchain(tools).with_post_process(tools.join(POST_PROCESS))
}

pub fn preview_toolchain(tools: &Path) -> Toolchain {
    toolchain(tools).with_preview(PreviewTool {
        program: tools.join(PREVIEW),
        args_before: vec!["--imageWidth".to_string(), "256".to_string()],
        suffix: ".png".to_string(),
    })
}

/// Builder for creating `Manifest` instances.
pub struct ManifestBuilder {
    scene: PathBuf,
    textures: Vec<FileEntry>,
}

impl ManifestBuilder {
    pub fn new(scene: impl Into<PathBuf>) -> Self {
        Self {
            scene: scene.into(),
            textures: Vec::new(),
        }
    }

    /// Adds a texture with the next `texture_map_N` id.
    pub fn texture(mut self, path: impl Into<PathBuf>, slot: TextureSlot) -> Self {
        let id = format!("texture_map_{}", self.textures.len());
        self.textures.push(FileEntry::texture(id, path, slot));
        self
    }

    /// Adds a diffuse texture bound to `material`.
    pub fn diffuse(self, path: impl Into<PathBuf>, material: &str) -> Self {
        self.texture(
            path,
            TextureSlot::new(MapType::DiffuseColor).with_material(material),
        )
    }

    pub fn build(self) -> Manifest {
        self.textures
            .into_iter()
            .fold(Manifest::new(self.scene), |manifest, entry| {
                manifest.with_entry(entry)
            })
    }
}
