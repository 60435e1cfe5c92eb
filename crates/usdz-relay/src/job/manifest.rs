//! File manifest for a single conversion job.
//!
//! A manifest is an insertion-ordered list of file entries keyed by a logical
//! id. Order matters: argument construction iterates entries in manifest
//! order, so the manifest serializes as a JSON array rather than an object.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved id of the input scene file.
pub const SCENE_FILE: &str = "scene_file";
/// Reserved id of the converter output, assigned when the job starts.
pub const OUT_FILE: &str = "out_file";
/// Reserved id of the rendered preview image.
pub const PREVIEW_FILE: &str = "preview_file";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Manifest has no '{SCENE_FILE}' entry")]
    MissingSceneFile,

    #[error("Manifest contains duplicate entry id '{0}'")]
    DuplicateId(String),

    #[error("Unknown texture map type '{0}'")]
    UnknownMapType(String),

    #[error("Unknown texture channel '{0}'")]
    UnknownChannel(String),
}

/// Texture map slots understood by usdzconvert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "String")]
pub enum MapType {
    DiffuseColor,
    Normal,
    EmissiveColor,
    Metallic,
    Roughness,
    Occlusion,
    Opacity,
    Clearcoat,
    ClearcoatRoughness,
}

impl MapType {
    pub const ALL: [MapType; 9] = [
        MapType::DiffuseColor,
        MapType::Normal,
        MapType::EmissiveColor,
        MapType::Metallic,
        MapType::Roughness,
        MapType::Occlusion,
        MapType::Opacity,
        MapType::Clearcoat,
        MapType::ClearcoatRoughness,
    ];

    /// Name as used in the converter flag (`-<name>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::DiffuseColor => "diffuseColor",
            MapType::Normal => "normal",
            MapType::EmissiveColor => "emissiveColor",
            MapType::Metallic => "metallic",
            MapType::Roughness => "roughness",
            MapType::Occlusion => "occlusion",
            MapType::Opacity => "opacity",
            MapType::Clearcoat => "clearcoat",
            MapType::ClearcoatRoughness => "clearcoatRoughness",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapType {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        MapType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ManifestError::UnknownMapType(s.to_string()))
    }
}

/// Image channel a single-channel map reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Channel {
    R,
    G,
    B,
    A,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::R => "r",
            Channel::G => "g",
            Channel::B => "b",
            Channel::A => "a",
        }
    }
}

impl FromStr for Channel {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" => Ok(Channel::R),
            "g" => Ok(Channel::G),
            "b" => Ok(Channel::B),
            "a" => Ok(Channel::A),
            _ => Err(ManifestError::UnknownChannel(s.to_string())),
        }
    }
}

impl TryFrom<String> for MapType {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Channel {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Texture binding carried by a manifest entry.
///
/// Every field is optional because texture slots come from loosely filled
/// upload forms. An entry without a `map_type` cannot be passed to the
/// converter and is skipped during argument construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureSlot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_type: Option<MapType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    /// CSS style `rgba(r, g, b, a)` color used where the texture has no data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_color: Option<String>,
}

impl TextureSlot {
    pub fn new(map_type: MapType) -> Self {
        Self {
            map_type: Some(map_type),
            ..Default::default()
        }
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_uv_set(mut self, uv_set: impl Into<String>) -> Self {
        self.uv_set = Some(uv_set.into());
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_fallback_color(mut self, rgba: impl Into<String>) -> Self {
        self.fallback_color = Some(rgba.into());
        self
    }

    /// Material name, or `""` when unset or blank.
    pub fn material_name(&self) -> &str {
        self.material.as_deref().map(str::trim).unwrap_or("")
    }

    /// UV set name, or `None` when unset or blank.
    pub fn uv_set_name(&self) -> Option<&str> {
        self.uv_set
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureSlot>,
}

impl FileEntry {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            texture: None,
        }
    }

    pub fn texture(id: impl Into<String>, path: impl Into<PathBuf>, slot: TextureSlot) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            texture: Some(slot),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FileEntry>", into = "Vec<FileEntry>")]
pub struct Manifest {
    entries: Vec<FileEntry>,
}

impl Manifest {
    /// Creates a manifest holding only the scene file.
    pub fn new(scene_path: impl Into<PathBuf>) -> Self {
        Self {
            entries: vec![FileEntry::new(SCENE_FILE, scene_path)],
        }
    }

    /// Builds a manifest from entries, rejecting duplicate ids and a missing
    /// scene file.
    pub fn from_entries(entries: Vec<FileEntry>) -> Result<Self, ManifestError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(ManifestError::DuplicateId(entry.id.clone()));
            }
        }
        if !seen.contains(SCENE_FILE) {
            return Err(ManifestError::MissingSceneFile);
        }
        Ok(Self { entries })
    }

    /// Inserts an entry. An existing entry with the same id is replaced in
    /// place and returned, keeping its position.
    pub fn insert(&mut self, entry: FileEntry) -> Option<FileEntry> {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => Some(std::mem::replace(existing, entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn with_entry(mut self, entry: FileEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn get(&self, id: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn path_of(&self, id: &str) -> Option<&Path> {
        self.get(id).map(|e| e.path.as_path())
    }

    pub fn scene_file(&self) -> &Path {
        self.path_of(SCENE_FILE).unwrap_or_else(|| Path::new(""))
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Entries carrying texture metadata, in manifest order.
    pub fn textures(&self) -> impl Iterator<Item = (&FileEntry, &TextureSlot)> {
        self.entries
            .iter()
            .filter_map(|e| e.texture.as_ref().map(|slot| (e, slot)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<FileEntry>> for Manifest {
    type Error = ManifestError;

    fn try_from(entries: Vec<FileEntry>) -> Result<Self, Self::Error> {
        Manifest::from_entries(entries)
    }
}

impl From<Manifest> for Vec<FileEntry> {
    fn from(manifest: Manifest) -> Self {
        manifest.entries
    }
}
