use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier assigned to a requirement by the store that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementId(pub u64);

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returned when a status string is not one of the four known values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown requirement status: {0}")]
pub struct UnknownStatus(pub String);

/// Represents the review status of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequirementStatus {
    /// Freshly entered, not yet reviewed
    Pending,
    /// Text was modified in place
    Edited,
    /// Ready to be sent for analysis
    Approved,
    /// Created by splitting another requirement
    Derived,
}

impl RequirementStatus {
    /// All statuses in display order
    pub const ALL: [RequirementStatus; 4] = [
        RequirementStatus::Pending,
        RequirementStatus::Edited,
        RequirementStatus::Approved,
        RequirementStatus::Derived,
    ];

    /// Label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            RequirementStatus::Pending => "Pendiente",
            RequirementStatus::Edited => "Editado",
            RequirementStatus::Approved => "Aprobado",
            RequirementStatus::Derived => "Derivado",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, RequirementStatus::Approved)
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementStatus::Pending => write!(f, "pending"),
            RequirementStatus::Edited => write!(f, "edited"),
            RequirementStatus::Approved => write!(f, "approved"),
            RequirementStatus::Derived => write!(f, "derived"),
        }
    }
}

impl FromStr for RequirementStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RequirementStatus::Pending),
            "edited" => Ok(RequirementStatus::Edited),
            "approved" => Ok(RequirementStatus::Approved),
            "derived" => Ok(RequirementStatus::Derived),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A single requirement tracked through the approval workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Unique identifier, never reassigned
    pub id: RequirementId,

    /// Natural-language content
    pub text: String,

    /// Current review status
    pub status: RequirementStatus,

    /// The requirement this one was split from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<RequirementId>,
}

impl Requirement {
    /// Creates a pending requirement
    pub fn new(id: RequirementId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            status: RequirementStatus::Pending,
            derived_from: None,
        }
    }

    /// Creates a requirement derived from `parent`
    pub fn derived(id: RequirementId, text: impl Into<String>, parent: RequirementId) -> Self {
        Self {
            id,
            text: text.into(),
            status: RequirementStatus::Derived,
            derived_from: Some(parent),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status.is_approved()
    }
}

/// Descriptive information about the project being specified.
///
/// Field order matters: it is the key order of the JSON sent to the
/// generation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectData {
    pub name: String,
    pub objective: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub context: String,
}

impl ProjectData {
    pub fn new(name: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objective: objective.into(),
            ..Default::default()
        }
    }

    /// Names of required fields that are still blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.objective.trim().is_empty() {
            missing.push("objective");
        }
        missing
    }

    /// Whether name and objective are both filled in
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "approved".parse::<RequirementStatus>(),
            Ok(RequirementStatus::Approved)
        );
        assert_eq!(
            " Derived ".parse::<RequirementStatus>(),
            Ok(RequirementStatus::Derived)
        );
    }

    #[test]
    fn test_status_rejects_unknown_values() {
        let err = "modified".parse::<RequirementStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("modified".into()));

        let json = r#"{"id": 1, "text": "x", "status": "analyzed"}"#;
        assert!(serde_json::from_str::<Requirement>(json).is_err());
    }

    #[test]
    fn test_status_display_matches_serde() {
        for status in RequirementStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_derived_requirement() {
        let req = Requirement::derived(RequirementId(7), "child", RequirementId(3));
        assert_eq!(req.status, RequirementStatus::Derived);
        assert_eq!(req.derived_from, Some(RequirementId(3)));
        assert!(!req.is_approved());
    }

    #[test]
    fn test_project_missing_fields() {
        let mut project = ProjectData::default();
        assert_eq!(project.missing_fields(), vec!["name", "objective"]);

        project.name = "Inventario".into();
        project.objective = "   ".into();
        assert_eq!(project.missing_fields(), vec!["objective"]);
        assert!(!project.is_complete());

        project.objective = "Controlar stock".into();
        assert!(project.is_complete());
    }

    #[test]
    fn test_project_serializes_in_field_order() {
        let project = ProjectData {
            name: "A".into(),
            objective: "B".into(),
            audience: "C".into(),
            context: "D".into(),
        };
        let json = serde_json::to_string(&project).unwrap();
        assert_eq!(
            json,
            r#"{"name":"A","objective":"B","audience":"C","context":"D"}"#
        );
    }
}
