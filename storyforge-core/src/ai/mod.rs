//! Generation Module for StoryForge
//!
//! This module talks to the external text-generation service that turns an
//! approved requirement into an analysis, and tracks the per-requirement
//! progress of those calls.

pub mod client;
pub mod dispatcher;
pub mod prompts;
pub mod responses;

pub use client::{GenerateError, GenerationClient, Generator};
pub use dispatcher::{
    AnalysisBoard, AnalysisDispatcher, AnalysisEvent, AnalysisOutcome, AnalysisState,
};
pub use responses::{ContentFragment, GenerateRequest, GenerateResponse, Message};
