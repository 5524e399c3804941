//! Prompt Templates
//!
//! Builds the prompt sent for each requirement. The layout is part of the
//! contract with the generation service and must stay byte-for-byte stable.

use crate::models::{ProjectData, Requirement};

/// Header preceding the project JSON
pub const PROJECT_HEADER: &str = "PROYECTO:";

/// Header preceding the requirement text
pub const REQUIREMENT_HEADER: &str = "REQUERIMIENTO:";

/// Build the analysis prompt for one requirement.
///
/// The project is rendered as pretty-printed JSON (two-space indent).
pub fn build_analysis_prompt(
    project: &ProjectData,
    req: &Requirement,
) -> Result<String, serde_json::Error> {
    let project_json = serde_json::to_string_pretty(project)?;
    Ok(format!(
        "{}\n{}\n\n{}\n{}",
        PROJECT_HEADER, project_json, REQUIREMENT_HEADER, req.text
    ))
}
