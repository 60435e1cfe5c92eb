pub mod scheduler;
pub mod stage;

pub use scheduler::{JobScheduler, RestoreSummary, SchedulerEvent, SchedulerOptions};
pub use stage::{PreviewTool, Stage, Toolchain};
