pub mod arguments;
pub mod color;
pub mod environment;

pub use arguments::{build as build_arguments, default_uv_set, BuiltArguments};
pub use color::{color_argument, ColorKind, Rgba};
pub use environment::{converter_environment, EnvMap};
