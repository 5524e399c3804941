pub mod ai;
pub mod config;
pub mod export;
pub mod models;
pub mod store;
pub mod wizard;

// Re-export commonly used types
pub use ai::{
    AnalysisBoard, AnalysisDispatcher, AnalysisEvent, AnalysisOutcome, AnalysisState,
    GenerateError, GenerationClient, Generator,
};
pub use config::{get_config_path, Config, ConfigError};
pub use export::{AnalysisReport, ReportEntry};
pub use models::{ProjectData, Requirement, RequirementId, RequirementStatus, UnknownStatus};
pub use store::{RequirementList, StoreError};
pub use wizard::{WizardError, WizardSession, WizardStep};
