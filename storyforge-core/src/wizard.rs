//! Wizard Session
//!
//! Owns everything a front end needs across the three wizard steps: project
//! data, the requirement list, the analysis board, and the current step.

use crate::ai::{AnalysisBoard, AnalysisDispatcher, AnalysisEvent, AnalysisOutcome, Generator};
use crate::models::{ProjectData, RequirementId};
use crate::store::{RequirementList, StoreError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised when an action is not allowed in the current state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Missing required project fields: {}", .0.join(", "))]
    IncompleteProject(Vec<&'static str>),

    #[error("Add at least one requirement first")]
    NoRequirements,

    #[error("Requirement {0} must be approved before it can be analyzed")]
    NotApproved(RequirementId),

    #[error("There are no approved requirements to analyze")]
    NothingApproved,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    #[error("Already at the last step")]
    AtLastStep,
}

/// The three wizard screens, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    /// Project information and requirement intake
    Project,
    /// Approve, edit, split and delete requirements
    Iteration,
    /// Send approved requirements for analysis
    Analysis,
}

impl WizardStep {
    pub const ALL: [WizardStep; 3] = [
        WizardStep::Project,
        WizardStep::Iteration,
        WizardStep::Analysis,
    ];

    /// Zero-based position
    pub fn index(&self) -> usize {
        match self {
            WizardStep::Project => 0,
            WizardStep::Iteration => 1,
            WizardStep::Analysis => 2,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::Project => "Proyecto y Requerimientos",
            WizardStep::Iteration => "Iteración",
            WizardStep::Analysis => "Análisis",
        }
    }

    pub fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Project => Some(WizardStep::Iteration),
            WizardStep::Iteration => Some(WizardStep::Analysis),
            WizardStep::Analysis => None,
        }
    }

    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Project => None,
            WizardStep::Iteration => Some(WizardStep::Project),
            WizardStep::Analysis => Some(WizardStep::Iteration),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.index() + 1, self.title())
    }
}

/// Application state for one wizard run
#[derive(Clone)]
pub struct WizardSession {
    step: WizardStep,
    project: ProjectData,
    requirements: RequirementList,
    dispatcher: AnalysisDispatcher,
}

impl WizardSession {
    /// Start a session at the first step
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            step: WizardStep::Project,
            project: ProjectData::default(),
            requirements: RequirementList::new(),
            dispatcher: AnalysisDispatcher::new(generator),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn project(&self) -> &ProjectData {
        &self.project
    }

    pub fn set_project(&mut self, project: ProjectData) {
        self.project = project;
    }

    pub fn requirements(&self) -> &RequirementList {
        &self.requirements
    }

    pub fn board(&self) -> &AnalysisBoard {
        self.dispatcher.board()
    }

    pub fn intake(&mut self, raw_text: &str) -> Result<(), WizardError> {
        self.requirements = self.requirements.intake(raw_text)?;
        Ok(())
    }

    pub fn edit(&mut self, id: RequirementId, new_text: &str) -> Result<(), WizardError> {
        self.requirements = self.requirements.edit(id, new_text)?;
        Ok(())
    }

    pub fn split(
        &mut self,
        id: RequirementId,
        edited_base_text: &str,
        derived_lines: &str,
    ) -> Result<(), WizardError> {
        self.requirements = self
            .requirements
            .split(id, edited_base_text, derived_lines)?;
        Ok(())
    }

    pub fn approve(&mut self, id: RequirementId) {
        self.requirements = self.requirements.approve(id);
    }

    /// Remove a requirement together with its analysis state
    pub fn remove(&mut self, id: RequirementId) {
        self.requirements = self.requirements.remove(id);
        self.dispatcher.board().evict(id);
    }

    /// Start over with an empty project, back at the first step.
    ///
    /// Stored analyses are dropped and calls still in flight are discarded.
    pub fn reset(&mut self) {
        debug!("Starting a new project");
        self.step = WizardStep::Project;
        self.project = ProjectData::default();
        self.requirements = RequirementList::new();
        self.dispatcher.board().clear();
    }

    /// Whether the current step's preconditions for moving on hold
    pub fn can_advance(&self) -> Result<(), WizardError> {
        match self.step {
            WizardStep::Project => {
                self.check_project()?;
                if self.requirements.is_empty() {
                    return Err(WizardError::NoRequirements);
                }
                Ok(())
            }
            WizardStep::Iteration => Ok(()),
            WizardStep::Analysis => Err(WizardError::AtLastStep),
        }
    }

    /// Move to the next step if allowed
    pub fn advance(&mut self) -> Result<WizardStep, WizardError> {
        self.can_advance()?;
        if let Some(next) = self.step.next() {
            debug!(from = %self.step, to = %next, "Advancing wizard");
            self.step = next;
        }
        Ok(self.step)
    }

    /// Move to the previous step; stays put on the first step
    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    fn check_project(&self) -> Result<(), WizardError> {
        let missing = self.project.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(WizardError::IncompleteProject(missing))
        }
    }

    /// Analyze one approved requirement
    pub async fn analyze(&self, id: RequirementId) -> Result<AnalysisOutcome, WizardError> {
        self.check_project()?;
        let req = self
            .requirements
            .get(id)
            .ok_or(StoreError::RequirementNotFound(id))?;
        if !req.is_approved() {
            return Err(WizardError::NotApproved(id));
        }
        Ok(self.dispatcher.analyze_one(&self.project, req).await)
    }

    /// Analyze all approved requirements in list order
    pub async fn analyze_all(&self) -> Result<Vec<RequirementId>, WizardError> {
        self.analyze_all_with_progress(|_| {}).await
    }

    pub async fn analyze_all_with_progress<F>(
        &self,
        on_event: F,
    ) -> Result<Vec<RequirementId>, WizardError>
    where
        F: FnMut(&AnalysisEvent),
    {
        self.check_batch()?;
        Ok(self
            .dispatcher
            .analyze_all_with_progress(&self.project, &self.requirements, on_event)
            .await)
    }

    /// Analyze the approved requirements among `ids`
    pub async fn analyze_selected<F>(
        &self,
        ids: &[RequirementId],
        on_event: F,
    ) -> Result<Vec<RequirementId>, WizardError>
    where
        F: FnMut(&AnalysisEvent),
    {
        self.check_batch()?;
        Ok(self
            .dispatcher
            .analyze_selected(&self.project, &self.requirements, ids, on_event)
            .await)
    }

    /// Analyze all approved requirements with up to `limit` calls in flight
    pub async fn analyze_concurrent(
        &self,
        limit: usize,
    ) -> Result<Vec<RequirementId>, WizardError> {
        self.check_batch()?;
        Ok(self
            .dispatcher
            .analyze_concurrent(&self.project, &self.requirements, limit)
            .await)
    }

    fn check_batch(&self) -> Result<(), WizardError> {
        self.check_project()?;
        if self.requirements.approved().next().is_none() {
            return Err(WizardError::NothingApproved);
        }
        if self.board().any_loading() {
            return Err(WizardError::AnalysisInProgress);
        }
        Ok(())
    }
}
