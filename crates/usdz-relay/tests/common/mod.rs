//! Shared test utilities for usdz-relay integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated scheduler runs inside a temp directory
//! - `ScriptedSupervisor` and `RecordingPublisher` test doubles
//! - Builders for manifests and toolchains

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{wait_until, RecordingPublisher, Script, ScriptedSupervisor, TestHarness, WAIT};
