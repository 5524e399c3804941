use crate::ai::{AnalysisBoard, AnalysisState};
use crate::models::{ProjectData, RequirementId, RequirementStatus};
use crate::store::RequirementList;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// One requirement and its analysis as it appears in a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    /// One-based position in the list
    pub ordinal: usize,
    pub id: RequirementId,
    pub text: String,
    pub status: RequirementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from_ordinal: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default)]
    pub failed: bool,
}

/// Snapshot of a wizard run suitable for export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub project: ProjectData,
    pub requirements: Vec<ReportEntry>,
}

impl AnalysisReport {
    /// Build a report from the current session state
    pub fn build(project: &ProjectData, list: &RequirementList, board: &AnalysisBoard) -> Self {
        let requirements = list
            .iter()
            .enumerate()
            .map(|(idx, req)| ReportEntry {
                ordinal: idx + 1,
                id: req.id,
                text: req.text.clone(),
                status: req.status,
                derived_from_ordinal: list.parent_ordinal(req.id),
                analysis: board.result(req.id),
                failed: board.state(req.id) == AnalysisState::Failed,
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            project: project.clone(),
            requirements,
        }
    }

    /// Number of entries with an analysis
    pub fn analyzed_count(&self) -> usize {
        self.requirements
            .iter()
            .filter(|e| e.analysis.is_some())
            .count()
    }

    /// Render the report as Markdown
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        let title = if self.project.name.trim().is_empty() {
            "Historias de Usuario"
        } else {
            self.project.name.as_str()
        };

        let _ = writeln!(output, "# {}\n", title);
        let _ = writeln!(output, "- **Objetivo:** {}", self.project.objective);
        if !self.project.audience.is_empty() {
            let _ = writeln!(output, "- **Audiencia:** {}", self.project.audience);
        }
        if !self.project.context.is_empty() {
            let _ = writeln!(output, "- **Contexto:** {}", self.project.context);
        }
        let _ = writeln!(
            output,
            "- **Generado:** {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        );

        for entry in &self.requirements {
            let _ = writeln!(output, "## #{} {}\n", entry.ordinal, entry.text);
            let _ = writeln!(output, "*Estado:* {}", entry.status.label());
            if let Some(parent) = entry.derived_from_ordinal {
                let _ = writeln!(output, "\n↳ Derivado de #{}", parent);
            }
            output.push('\n');
            match &entry.analysis {
                Some(analysis) => {
                    output.push_str(analysis.trim_end());
                    output.push_str("\n\n");
                }
                None => output.push_str("_(sin análisis)_\n\n"),
            }
        }

        output
    }

    /// Render the report as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize analysis report")
    }
}

/// Export the report to a Markdown file
pub fn export_markdown(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, report.to_markdown())
        .with_context(|| format!("Failed to write report to {:?}", output_path))
}

/// Export the report to a JSON file
pub fn export_json(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, report.to_json()?)
        .with_context(|| format!("Failed to write report to {:?}", output_path))
}
