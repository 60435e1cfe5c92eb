use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub converter: ConverterConfig,
    /// Material post-process for Alembic scenes converted to `.usdz`.
    #[serde(default)]
    pub post_process: Option<PostProcessConfig>,
    /// Best-effort preview render after a successful conversion.
    #[serde(default)]
    pub preview: Option<PreviewConfig>,
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    pub publish_directory: PathBuf,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_output_suffix() -> String {
    ".usdz".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Python interpreter that runs the converter script. When absent the
    /// script is executed directly.
    #[serde(default)]
    pub interpreter: Option<PathBuf>,
    /// Path of the `usdzconvert` script.
    pub script: PathBuf,
    /// Root of the USD binary distribution used to extend PATH/PYTHONPATH.
    #[serde(default)]
    pub usd_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessConfig {
    pub script: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub program: PathBuf,
    /// Arguments placed before the input and output paths.
    #[serde(default)]
    pub args_before: Vec<String>,
    #[serde(default = "default_preview_suffix")]
    pub suffix: String,
}

fn default_preview_suffix() -> String {
    ".png".to_string()
}

impl Config {
    /// Resolves every relative path against `base`, usually the directory of
    /// the config file.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        if let Some(interpreter) = self.converter.interpreter.as_mut() {
            resolve(interpreter);
        }
        resolve(&mut self.converter.script);
        if let Some(usd_root) = self.converter.usd_root.as_mut() {
            resolve(usd_root);
        }
        if let Some(post) = self.post_process.as_mut() {
            resolve(&mut post.script);
        }
        if let Some(preview) = self.preview.as_mut() {
            // Bare program names are looked up on PATH.
            if preview.program.components().count() > 1 {
                resolve(&mut preview.program);
            }
        }
        resolve(&mut self.publish_directory);
        if let Some(db) = self.database_path.as_mut() {
            resolve(db);
        }
    }

    /// Configured job store path, or the platform default.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        serde_json::from_str(
            r#"{
                "version": "1.0",
                "converter": { "script": "usdzconvert/usdzconvert" },
                "publish_directory": "static"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.output_suffix, ".usdz");
        assert_eq!(config.log_level, "info");
        assert!(config.post_process.is_none());
        assert!(config.preview.is_none());
        assert!(config.converter.interpreter.is_none());
    }

    #[test]
    fn test_resolve_paths_keeps_absolute() {
        let mut config = minimal();
        config.database_path = Some(PathBuf::from("/var/lib/relay/jobs.db"));
        config.preview = Some(PreviewConfig {
            program: PathBuf::from("usdrecord"),
            args_before: vec![],
            suffix: ".png".into(),
        });
        config.resolve_paths(Path::new("/etc/relay"));

        assert_eq!(
            config.converter.script,
            PathBuf::from("/etc/relay/usdzconvert/usdzconvert")
        );
        assert_eq!(config.publish_directory, PathBuf::from("/etc/relay/static"));
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/relay/jobs.db"))
        );
        assert_eq!(config.preview.unwrap().program, PathBuf::from("usdrecord"));
    }
}
