//! Preview/save state machine for one book

use super::{content_hash, EpubAssembler, StageOutcome, StagedBook};
use crate::error::{Result, StagingError};
use crate::types::Book;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Where the session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Staging,
    StagedReady,
    Saving,
    Aborted,
}

impl SessionPhase {
    /// Whether a background run is still working
    pub fn is_busy(self) -> bool {
        matches!(self, SessionPhase::Staging | SessionPhase::Saving)
    }
}

/// Answer to a preview request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStatus {
    /// A staging run was started
    Started,
    /// The staged folder already matches the book
    AlreadyCurrent,
    /// A run is under way; it will be restarted if the request was forced
    InProgress,
}

/// Answer to a save request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved(PathBuf),
    /// The save runs when the current (or newly started) staging run completes
    Deferred,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    /// Content hash the staged folder was built from
    staged: Option<(String, StagedBook)>,
    pending_save: Option<PathBuf>,
    /// Start over once the current run stops
    restart: bool,
    stage_count: usize,
    last_error: Option<String>,
}

struct Inner {
    book_folder: PathBuf,
    assembler: EpubAssembler,
    /// Serializes requests; never held while staging or saving
    state: Mutex<SessionState>,
    /// Held by the worker for the length of a staging pass
    run_lock: Mutex<()>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut SessionState, phase: SessionPhase) {
        state.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    fn start_run(self: &Arc<Self>, state: &mut SessionState) {
        self.assembler.abort_flag().clear();
        state.restart = false;
        self.set_phase(state, SessionPhase::Staging);
        let worker = Arc::clone(self);
        tokio::task::spawn_blocking(move || worker.run());
    }

    fn stage_once(&self) -> Result<(String, StageOutcome)> {
        let _run = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let hash = content_hash(&self.book_folder, self.assembler.options())?;
        let book = Book::load(&self.book_folder)?;
        let outcome = self.assembler.stage_with_retry(&book)?;
        Ok((hash, outcome))
    }

    /// Worker loop: stage until a pass completes, is aborted for good or fails,
    /// then run any save that was waiting for it
    fn run(self: Arc<Self>) {
        loop {
            {
                // Each pass recreates the staging folder
                let mut state = self.lock_state();
                state.stage_count += 1;
                state.staged = None;
            }
            let result = self.stage_once();

            let mut state = self.lock_state();
            match result {
                Ok((hash, StageOutcome::Staged(staged))) => {
                    state.staged = Some((hash, staged.clone()));
                    if state.restart {
                        state.restart = false;
                        self.assembler.abort_flag().clear();
                        continue;
                    }
                    let Some(destination) = state.pending_save.take() else {
                        self.set_phase(&mut state, SessionPhase::StagedReady);
                        return;
                    };
                    self.set_phase(&mut state, SessionPhase::Saving);
                    drop(state);

                    let saved = self.assembler.save(&staged, &destination);
                    let mut state = self.lock_state();
                    if let Err(e) = saved {
                        tracing::warn!("Saving {} failed: {}", destination.display(), e);
                        state.last_error = Some(e.to_string());
                    }
                    if state.pending_save.is_some() {
                        self.set_phase(&mut state, SessionPhase::Staging);
                        continue;
                    }
                    self.set_phase(&mut state, SessionPhase::Idle);
                    return;
                }
                Ok((_, StageOutcome::Aborted)) => {
                    if state.restart {
                        tracing::info!("Book changed while staging; starting over");
                        state.restart = false;
                        self.assembler.abort_flag().clear();
                        continue;
                    }
                    self.set_phase(&mut state, SessionPhase::Aborted);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Staging failed: {}", e);
                    state.last_error = Some(e.to_string());
                    state.pending_save = None;
                    self.set_phase(&mut state, SessionPhase::Idle);
                    return;
                }
            }
        }
    }
}

/// Long-lived publishing session for one book.
///
/// Previews stage the book in the background; saves zip the staged folder,
/// staging first when the folder is missing or out of date. Staging and saving
/// run on tokio's blocking pool, so request methods must be called from within a
/// tokio runtime.
#[derive(Clone)]
pub struct PublishSession {
    inner: Arc<Inner>,
}

impl PublishSession {
    pub fn new(book_folder: impl Into<PathBuf>, assembler: EpubAssembler) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            inner: Arc::new(Inner {
                book_folder: book_folder.into(),
                assembler,
                state: Mutex::new(SessionState {
                    phase: SessionPhase::Idle,
                    staged: None,
                    pending_save: None,
                    restart: false,
                    stage_count: 0,
                    last_error: None,
                }),
                run_lock: Mutex::new(()),
                phase_tx,
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock_state().phase
    }

    /// Staging passes started so far
    pub fn stage_count(&self) -> usize {
        self.inner.lock_state().stage_count
    }

    /// Message of the most recent failed run or save
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock_state().last_error.clone()
    }

    /// The most recently completed stage
    pub fn staged(&self) -> Option<StagedBook> {
        self.inner
            .lock_state()
            .staged
            .as_ref()
            .map(|(_, staged)| staged.clone())
    }

    async fn current_hash(&self) -> Result<String> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || content_hash(&inner.book_folder, inner.assembler.options()))
            .await
            .map_err(|e| StagingError::Worker(e.to_string()))?
    }

    /// Stage the book unless the staged folder is current. `force` stages anyway,
    /// restarting a run that is under way.
    pub async fn request_preview(&self, force: bool) -> Result<PreviewStatus> {
        let hash = self.current_hash().await?;
        let mut state = self.inner.lock_state();
        if state.phase.is_busy() {
            if force && state.phase == SessionPhase::Staging {
                state.restart = true;
                self.inner.assembler.abort_flag().set();
            }
            return Ok(PreviewStatus::InProgress);
        }
        let current = state.staged.as_ref().is_some_and(|(staged, _)| *staged == hash);
        if current && !force {
            tracing::debug!("Staged copy is already current");
            return Ok(PreviewStatus::AlreadyCurrent);
        }
        self.inner.start_run(&mut state);
        Ok(PreviewStatus::Started)
    }

    /// Save the book to `destination`, staging first when needed. A save requested
    /// while staging is deferred until the run completes.
    pub async fn request_save(&self, destination: impl Into<PathBuf>) -> Result<SaveStatus> {
        let destination = destination.into();
        let hash = self.current_hash().await?;
        let staged = {
            let mut state = self.inner.lock_state();
            if state.phase.is_busy() {
                state.pending_save = Some(destination);
                return Ok(SaveStatus::Deferred);
            }
            match &state.staged {
                Some((staged_hash, staged)) if *staged_hash == hash => {
                    let staged = staged.clone();
                    self.inner.set_phase(&mut state, SessionPhase::Saving);
                    staged
                }
                _ => {
                    state.pending_save = Some(destination);
                    self.inner.start_run(&mut state);
                    return Ok(SaveStatus::Deferred);
                }
            }
        };

        let inner = Arc::clone(&self.inner);
        let target = destination.clone();
        let saved = tokio::task::spawn_blocking(move || inner.assembler.save(&staged, &target)).await;

        let mut state = self.inner.lock_state();
        if state.pending_save.is_some() {
            self.inner.start_run(&mut state);
        } else {
            self.inner.set_phase(&mut state, SessionPhase::Idle);
        }
        match saved {
            Ok(Ok(())) => Ok(SaveStatus::Saved(destination)),
            Ok(Err(e)) => {
                state.last_error = Some(e.to_string());
                Err(e)
            }
            Err(e) => Err(StagingError::Worker(e.to_string()).into()),
        }
    }

    /// The book was edited: drop the staged copy and restart a run under way
    pub fn book_changed(&self) {
        let mut state = self.inner.lock_state();
        state.staged = None;
        if state.phase == SessionPhase::Staging {
            state.restart = true;
            self.inner.assembler.abort_flag().set();
        }
    }

    /// Stop the current run at its next checkpoint. A deferred save stays pending.
    pub fn abort(&self) {
        let mut state = self.inner.lock_state();
        state.restart = false;
        self.inner.assembler.abort_flag().set();
    }

    /// Wait until no run is staging or saving and return the phase it settled in
    pub async fn wait_until_settled(&self) -> SessionPhase {
        let mut rx = self.inner.phase_tx.subscribe();
        let settled = match rx.wait_for(|phase| !phase.is_busy()).await {
            Ok(phase) => *phase,
            Err(_) => self.phase(),
        };
        settled
    }
}
