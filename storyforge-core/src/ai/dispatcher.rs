//! Analysis Dispatcher
//!
//! Sends requirements to a [`Generator`] and records, per requirement, whether
//! a call is in flight and what the last call produced. Bulk analysis runs
//! one requirement at a time, in list order.

use crate::ai::client::{GenerateError, Generator};
use crate::ai::prompts;
use crate::models::{ProjectData, Requirement, RequirementId};
use crate::store::RequirementList;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Result of the most recent analysis of a requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Text returned by the generation service
    Succeeded(String),
    /// Error text stored in place of an analysis
    Failed(String),
}

impl AnalysisOutcome {
    /// The text shown for this outcome
    pub fn text(&self) -> &str {
        match self {
            AnalysisOutcome::Succeeded(text) | AnalysisOutcome::Failed(text) => text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Succeeded(_))
    }
}

/// Per-requirement analysis state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

#[derive(Debug, Default)]
struct BoardState {
    results: HashMap<RequirementId, AnalysisOutcome>,
    /// Number of outstanding calls per requirement
    in_flight: HashMap<RequirementId, usize>,
    /// Bumped by `evict`; calls begun under an older epoch are stale
    epochs: HashMap<RequirementId, u64>,
    /// Bumped by `clear`
    generation: u64,
}

impl BoardState {
    fn epoch(&self, id: RequirementId) -> (u64, u64) {
        (self.generation, self.epochs.get(&id).copied().unwrap_or(0))
    }
}

/// Shared results and loading flags, keyed by requirement id.
///
/// Cloning yields another handle to the same board.
#[derive(Debug, Clone, Default)]
pub struct AnalysisBoard {
    inner: Arc<Mutex<BoardState>>,
}

impl AnalysisBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        // A panic while holding the lock cannot leave the maps half-written
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stored result text, if any
    pub fn result(&self, id: RequirementId) -> Option<String> {
        self.lock().results.get(&id).map(|o| o.text().to_string())
    }

    /// Stored outcome, if any
    pub fn outcome(&self, id: RequirementId) -> Option<AnalysisOutcome> {
        self.lock().results.get(&id).cloned()
    }

    pub fn has_result(&self, id: RequirementId) -> bool {
        self.lock().results.contains_key(&id)
    }

    /// True exactly while a call for `id` is outstanding
    pub fn is_loading(&self, id: RequirementId) -> bool {
        self.lock().in_flight.contains_key(&id)
    }

    pub fn any_loading(&self) -> bool {
        !self.lock().in_flight.is_empty()
    }

    pub fn state(&self, id: RequirementId) -> AnalysisState {
        let state = self.lock();
        if state.in_flight.contains_key(&id) {
            return AnalysisState::Loading;
        }
        match state.results.get(&id) {
            Some(AnalysisOutcome::Succeeded(_)) => AnalysisState::Succeeded,
            Some(AnalysisOutcome::Failed(_)) => AnalysisState::Failed,
            None => AnalysisState::Idle,
        }
    }

    /// Number of stored results
    pub fn result_count(&self) -> usize {
        self.lock().results.len()
    }

    /// Drops result and loading entries for a removed requirement.
    ///
    /// A call still in flight for `id` finishes without writing its outcome.
    pub fn evict(&self, id: RequirementId) {
        let mut state = self.lock();
        state.results.remove(&id);
        state.in_flight.remove(&id);
        *state.epochs.entry(id).or_insert(0) += 1;
    }

    /// Drops every entry; outstanding calls finish without writing
    pub fn clear(&self) {
        let mut state = self.lock();
        state.results.clear();
        state.in_flight.clear();
        state.generation += 1;
    }

    #[cfg(test)]
    fn store(&self, id: RequirementId, outcome: AnalysisOutcome) {
        self.lock().results.insert(id, outcome);
    }

    /// Stores `outcome` unless the requirement was evicted after `guard` began
    fn store_current(&self, guard: &LoadingGuard, outcome: AnalysisOutcome) -> bool {
        let mut state = self.lock();
        if state.epoch(guard.id) != guard.epoch {
            return false;
        }
        state.results.insert(guard.id, outcome);
        true
    }

    fn begin(&self, id: RequirementId) -> LoadingGuard {
        let mut state = self.lock();
        *state.in_flight.entry(id).or_insert(0) += 1;
        LoadingGuard {
            board: self.clone(),
            id,
            epoch: state.epoch(id),
        }
    }

    fn finish(&self, id: RequirementId, epoch: (u64, u64)) {
        let mut state = self.lock();
        if state.epoch(id) != epoch {
            return;
        }
        if let Some(count) = state.in_flight.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                state.in_flight.remove(&id);
            }
        }
    }
}

/// Holds the loading flag of one requirement until dropped
struct LoadingGuard {
    board: AnalysisBoard,
    id: RequirementId,
    epoch: (u64, u64),
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.board.finish(self.id, self.epoch);
    }
}

/// Progress notifications emitted during bulk analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    /// Call `index` (zero-based) of `total` is about to start
    Started {
        index: usize,
        total: usize,
        id: RequirementId,
    },
    /// Call `index` of `total` has stored its outcome
    Finished {
        index: usize,
        total: usize,
        id: RequirementId,
        success: bool,
    },
}

/// Issues generation calls and writes their outcomes to an [`AnalysisBoard`]
#[derive(Clone)]
pub struct AnalysisDispatcher {
    generator: Arc<dyn Generator>,
    board: AnalysisBoard,
}

impl AnalysisDispatcher {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self::with_board(generator, AnalysisBoard::new())
    }

    pub fn with_board(generator: Arc<dyn Generator>, board: AnalysisBoard) -> Self {
        Self { generator, board }
    }

    pub fn board(&self) -> &AnalysisBoard {
        &self.board
    }

    /// Analyze a single requirement, overwriting any previous result.
    ///
    /// Failures are stored as `Error: ...` text rather than returned. The
    /// loading flag is released on every exit path, including when the
    /// returned future is dropped before completion.
    pub async fn analyze_one(&self, project: &ProjectData, req: &Requirement) -> AnalysisOutcome {
        let loading = self.board.begin(req.id);

        let result = match prompts::build_analysis_prompt(project, req) {
            Ok(prompt) => self.generator.generate(&prompt).await,
            Err(e) => Err(GenerateError::InvalidRequest(e.to_string())),
        };

        let outcome = match result {
            Ok(text) => AnalysisOutcome::Succeeded(text),
            Err(e) => {
                warn!(id = %req.id, error = %e, "Analysis failed");
                AnalysisOutcome::Failed(format!("Error: {}", e.user_message()))
            }
        };

        if !self.board.store_current(&loading, outcome.clone()) {
            debug!(id = %req.id, "Requirement removed during analysis, outcome discarded");
        }
        outcome
    }

    /// Analyze every approved requirement, one after another.
    ///
    /// Returns the ids that were submitted, in submission order.
    pub async fn analyze_all(
        &self,
        project: &ProjectData,
        requirements: &RequirementList,
    ) -> Vec<RequirementId> {
        self.analyze_all_with_progress(project, requirements, |_| {})
            .await
    }

    /// Like [`analyze_all`](Self::analyze_all), reporting each step to `on_event`
    pub async fn analyze_all_with_progress<F>(
        &self,
        project: &ProjectData,
        requirements: &RequirementList,
        on_event: F,
    ) -> Vec<RequirementId>
    where
        F: FnMut(&AnalysisEvent),
    {
        let batch: Vec<Requirement> = requirements.approved().cloned().collect();
        self.run_sequential(project, batch, on_event).await
    }

    /// Sequentially analyze the approved requirements among `ids`, in list order
    pub async fn analyze_selected<F>(
        &self,
        project: &ProjectData,
        requirements: &RequirementList,
        ids: &[RequirementId],
        on_event: F,
    ) -> Vec<RequirementId>
    where
        F: FnMut(&AnalysisEvent),
    {
        let batch: Vec<Requirement> = requirements
            .approved()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect();
        self.run_sequential(project, batch, on_event).await
    }

    /// Analyze approved requirements with up to `limit` calls in flight.
    ///
    /// Completion order is unspecified; use [`analyze_all`](Self::analyze_all)
    /// when results must land in list order.
    pub async fn analyze_concurrent(
        &self,
        project: &ProjectData,
        requirements: &RequirementList,
        limit: usize,
    ) -> Vec<RequirementId> {
        let batch: Vec<Requirement> = requirements.approved().cloned().collect();
        let ids: Vec<RequirementId> = batch.iter().map(|r| r.id).collect();
        info!(total = batch.len(), limit, "Starting concurrent analysis");

        stream::iter(batch.iter())
            .map(|req| self.analyze_one(project, req))
            .buffer_unordered(limit.max(1))
            .collect::<Vec<_>>()
            .await;

        ids
    }

    async fn run_sequential<F>(
        &self,
        project: &ProjectData,
        batch: Vec<Requirement>,
        mut on_event: F,
    ) -> Vec<RequirementId>
    where
        F: FnMut(&AnalysisEvent),
    {
        let total = batch.len();
        info!(total, "Starting sequential analysis");

        let mut submitted = Vec::with_capacity(total);
        for (index, req) in batch.iter().enumerate() {
            on_event(&AnalysisEvent::Started {
                index,
                total,
                id: req.id,
            });
            let outcome = self.analyze_one(project, req).await;
            submitted.push(req.id);
            on_event(&AnalysisEvent::Finished {
                index,
                total,
                id: req.id,
                success: outcome.is_success(),
            });
        }

        info!(total, "Sequential analysis complete");
        submitted
    }
}
