pub mod conversion;
pub mod manifest;
pub mod request;

pub use conversion::{ConversionJob, JobId, JobState, TransitionError};
pub use manifest::{
    Channel, FileEntry, Manifest, ManifestError, MapType, TextureSlot, OUT_FILE, PREVIEW_FILE,
    SCENE_FILE,
};
pub use request::JobRequest;
