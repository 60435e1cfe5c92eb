//! Stage planning: which external tool runs for each step of a job and with
//! which command line.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::convert::{self, EnvMap};
use crate::job::ConversionJob;
use crate::supervisor::LaunchSpec;

/// Intermediate format written by the converter when a post-process stage
/// produces the final archive.
pub const INTERMEDIATE_SUFFIX: &str = ".usdc";
/// Final suffix produced by the post-process stage.
pub const POST_PROCESS_SUFFIX: &str = ".usdz";
/// Scene format whose materials need the post-process stage.
pub const POST_PROCESS_SCENE_EXTENSION: &str = ".abc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Convert,
    PostProcess,
    Preview,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Convert => "convert",
            Stage::PostProcess => "post_process",
            Stage::Preview => "preview",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Convert => "Conversion",
            Stage::PostProcess => "Material post-process",
            Stage::Preview => "Preview render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTool {
    pub program: PathBuf,
    pub args_before: Vec<String>,
    pub suffix: String,
}

/// External tools and the environment they run in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub interpreter: Option<PathBuf>,
    pub converter_script: PathBuf,
    pub post_process_script: Option<PathBuf>,
    pub preview: Option<PreviewTool>,
    pub output_suffix: String,
    pub env: EnvMap,
}

impl Toolchain {
    /// Toolchain with only a converter, running in the current environment.
    pub fn new(converter_script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: None,
            converter_script: converter_script.into(),
            post_process_script: None,
            preview: None,
            output_suffix: POST_PROCESS_SUFFIX.to_string(),
            env: convert::environment::inherited(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            interpreter: config.converter.interpreter.clone(),
            converter_script: config.converter.script.clone(),
            post_process_script: config.post_process.as_ref().map(|p| p.script.clone()),
            preview: config.preview.as_ref().map(|p| PreviewTool {
                program: p.program.clone(),
                args_before: p.args_before.clone(),
                suffix: p.suffix.clone(),
            }),
            output_suffix: config.output_suffix.clone(),
            env: convert::converter_environment(config.converter.usd_root.as_deref()),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn with_post_process(mut self, script: impl Into<PathBuf>) -> Self {
        self.post_process_script = Some(script.into());
        self
    }

    pub fn with_preview(mut self, preview: PreviewTool) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    pub fn with_env(mut self, env: EnvMap) -> Self {
        self.env = env;
        self
    }

    /// Alembic scenes lose their material bindings in the converter; a
    /// post-process pass rebinds them when producing a `.usdz`.
    pub fn needs_post_process(&self, job: &ConversionJob) -> bool {
        self.post_process_script.is_some()
            && job.scene_extension() == POST_PROCESS_SCENE_EXTENSION
            && self
                .output_suffix
                .eq_ignore_ascii_case(POST_PROCESS_SUFFIX)
    }

    /// Output path assigned when a job starts.
    ///
    /// - `<stem>.usdc` next to the scene when a post-process follows
    /// - `<stem>_out<suffix>` when the scene already has the output suffix
    /// - `<stem><suffix>` otherwise
    pub fn initial_out_file(&self, job: &ConversionJob) -> PathBuf {
        let scene = job.scene_file();
        let stem = scene
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("job_{}", job.id()));
        let dir = scene.parent().unwrap_or_else(|| Path::new(""));

        let file_name = if self.needs_post_process(job) {
            format!("{}{}", stem, INTERMEDIATE_SUFFIX)
        } else if job.scene_extension() == self.output_suffix.to_ascii_lowercase() {
            format!("{}_out{}", stem, self.output_suffix)
        } else {
            format!("{}{}", stem, self.output_suffix)
        };
        dir.join(file_name)
    }

    /// File the post-process writes for a given intermediate.
    pub fn post_process_product(intermediate: &Path) -> PathBuf {
        intermediate.with_extension(POST_PROCESS_SUFFIX.trim_start_matches('.'))
    }

    /// `[interpreter] converter_script args...`, run from the scene directory.
    pub fn convert_launch(&self, job: &ConversionJob, args: Vec<String>) -> LaunchSpec {
        self.script_launch(&self.converter_script, args)
            .current_dir(working_dir(job.scene_file()))
    }

    /// `[interpreter] post_process_script <intermediate>`.
    pub fn post_process_launch(&self, intermediate: &Path) -> Option<LaunchSpec> {
        let script = self.post_process_script.as_ref()?;
        Some(
            self.script_launch(script, vec![intermediate.to_string_lossy().into_owned()])
                .current_dir(working_dir(intermediate)),
        )
    }

    /// Preview command for a finished job plus the image path it writes.
    ///
    /// The image is rendered next to the scene file and published afterwards.
    pub fn preview_launch(&self, job: &ConversionJob) -> Option<(LaunchSpec, PathBuf)> {
        let preview = self.preview.as_ref()?;
        let out_file = job.out_file();
        if out_file.as_os_str().is_empty() {
            return None;
        }

        let stem = out_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("job_{}", job.id()));
        let scene_dir = working_dir(job.scene_file());
        let image = scene_dir.join(format!("{}_preview{}", stem, preview.suffix));

        let spec = LaunchSpec::new(&preview.program)
            .args(preview.args_before.iter().cloned())
            .arg(out_file.to_string_lossy())
            .arg(image.to_string_lossy())
            .current_dir(scene_dir)
            .env(self.env.clone());
        Some((spec, image))
    }

    fn script_launch(&self, script: &Path, args: Vec<String>) -> LaunchSpec {
        let spec = match &self.interpreter {
            Some(interpreter) => LaunchSpec::new(interpreter).arg(script.to_string_lossy()),
            None => LaunchSpec::new(script),
        };
        spec.args(args).env(self.env.clone())
    }
}

fn working_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
