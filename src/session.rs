//! Session container: the single source of truth the views render from.
//!
//! [`Session`] sequences intake and the two model calls against user actions
//! and keeps:
//!
//! - the persisted [`SessionState`] (saved through the injected
//!   [`SessionStore`] after every mutation),
//! - the [`LoadingState`] (derived from what is currently running),
//! - the current error banner, which expires after a fixed delay,
//! - a registry of in-flight note generations keyed by section id.
//!
//! Every mutation builds a new `SessionState` from a copy of the old one and
//! swaps it in whole, so readers never see a half-applied upload or reset.
//! No lock is held across an `.await`.
//!
//! Each loaded document gets an epoch number. A generation or analysis that
//! started under an older epoch (the user reset or uploaded something else
//! meanwhile) is dropped when it finishes, so notes for one document never
//! land in another document's cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::ai::NotesModel;
use crate::error::NoteError;
use crate::intake;
use crate::models::{LoadingState, MimeType, Section, SessionState, UploadedFile};
use crate::store::{decode_snapshot, encode_snapshot, SessionStore};

/// Default lifetime of an error banner.
pub const DEFAULT_ERROR_TTL: Duration = Duration::from_secs(8);

/// Result of a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The document is now current.
    Loaded { sections: usize },
    /// The session was reset while analyzing; nothing was stored.
    Discarded,
}

/// Result of selecting a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Notes were already cached; no model call was made.
    Cached,
    /// Notes were generated and cached. `superseded` is set when the user had
    /// selected a different section by the time they arrived.
    Generated { superseded: bool },
    /// A generation for this id is already running; no second call was made.
    AlreadyInFlight,
    /// No document is loaded, or the id is not one of its sections.
    NothingToGenerate,
    /// The document changed while generating; the result was dropped.
    Discarded,
}

/// The original bytes of the uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExport {
    pub name: String,
    pub mime_type: MimeType,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct ErrorBanner {
    message: String,
    raised_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    id: u64,
    epoch: u64,
}

type Registry = Arc<Mutex<HashMap<String, Ticket>>>;

/// Owns a section's slot in the in-flight registry. Dropping it frees the
/// slot unless a newer ticket has taken it, so a cancelled generation never
/// leaves the section stuck.
struct TicketGuard {
    registry: Registry,
    id: String,
    ticket: Ticket,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        let mut registry = lock(&self.registry);
        if registry.get(&self.id) == Some(&self.ticket) {
            registry.remove(&self.id);
        }
    }
}

/// Counts one running analysis for as long as it is alive.
struct BusyGuard(Arc<AtomicUsize>);

impl BusyGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An analysis that has been started but not yet run.
struct Analysis {
    file: UploadedFile,
    started_epoch: u64,
    busy: BusyGuard,
}

/// A generation whose ticket is registered but whose model call has not run.
struct Generation {
    guard: TicketGuard,
    file: UploadedFile,
    section: Section,
}

enum Claim {
    Done(SelectOutcome),
    Generate(Generation),
}

struct Inner {
    state: SessionState,
    epoch: u64,
}

pub struct Session {
    model: Arc<dyn NotesModel>,
    store: Arc<dyn SessionStore>,
    inner: RwLock<Inner>,
    error: Mutex<Option<ErrorBanner>>,
    in_flight: Registry,
    analyzing: Arc<AtomicUsize>,
    next_ticket: AtomicU64,
    error_ttl: Duration,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Restore the session from `store`, or start fresh.
    ///
    /// A missing or unreadable snapshot gives an empty session whose theme
    /// is `prefer_dark`.
    pub fn open(
        model: Arc<dyn NotesModel>,
        store: Arc<dyn SessionStore>,
        prefer_dark: bool,
    ) -> Self {
        let state = store
            .load()
            .and_then(|blob| decode_snapshot(&blob))
            .unwrap_or_else(|| SessionState::fresh(prefer_dark));

        tracing::debug!(
            has_file = state.file.is_some(),
            sections = state.sections.len(),
            cached_notes = state.notes.len(),
            "session opened"
        );

        Self {
            model,
            store,
            inner: RwLock::new(Inner { state, epoch: 0 }),
            error: Mutex::new(None),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            analyzing: Arc::new(AtomicUsize::new(0)),
            next_ticket: AtomicU64::new(1),
            error_ttl: DEFAULT_ERROR_TTL,
        }
    }

    /// Override how long an error stays visible.
    pub fn with_error_ttl(mut self, ttl: Duration) -> Self {
        self.error_ttl = ttl;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
            .clone()
    }

    pub fn loading(&self) -> LoadingState {
        if self.analyzing.load(Ordering::SeqCst) > 0 {
            LoadingState::Analyzing
        } else if !lock(&self.in_flight).is_empty() {
            LoadingState::GeneratingNotes
        } else {
            LoadingState::Idle
        }
    }

    // ============ Upload ============

    /// Read `path`, then analyze it. See [`upload`](Self::upload).
    pub async fn upload_path(
        &self,
        path: &Path,
        declared_mime: Option<&str>,
    ) -> Result<UploadOutcome, NoteError> {
        let file = match intake::read_upload(path, declared_mime).await {
            Ok(file) => file,
            Err(e) => {
                self.raise(&e);
                return Err(e);
            }
        };
        self.upload(file).await
    }

    /// Analyze `file` and, on success, make it the current document.
    ///
    /// The file, its sections, an empty selection and an empty notes cache
    /// are swapped in together. On failure nothing changes except the error
    /// banner. Dropping the future before it completes leaves the session
    /// as it was.
    pub async fn upload(&self, file: UploadedFile) -> Result<UploadOutcome, NoteError> {
        let job = self.begin_upload(file);
        self.run_analysis(job).await
    }

    /// Start [`upload`](Self::upload) on a background task.
    ///
    /// The session reports [`LoadingState::Analyzing`] before this returns.
    pub fn upload_in_background(
        self: &Arc<Self>,
        file: UploadedFile,
    ) -> JoinHandle<Result<UploadOutcome, NoteError>> {
        let job = self.begin_upload(file);
        let session = Arc::clone(self);
        tokio::spawn(async move { session.run_analysis(job).await })
    }

    fn begin_upload(&self, file: UploadedFile) -> Analysis {
        self.dismiss_error();
        Analysis {
            file,
            started_epoch: self.epoch(),
            busy: BusyGuard::enter(&self.analyzing),
        }
    }

    async fn run_analysis(&self, job: Analysis) -> Result<UploadOutcome, NoteError> {
        let Analysis {
            file,
            started_epoch,
            busy,
        } = job;

        let sections = match self.model.analyze(&file).await {
            Ok(sections) => sections,
            Err(e) => {
                self.raise(&e);
                return Err(e);
            }
        };

        let count = sections.len();
        let applied = self.apply(|inner| {
            if inner.epoch != started_epoch {
                return false;
            }
            inner.epoch += 1;
            inner.state = SessionState {
                file: Some(file),
                sections,
                selected_section_id: None,
                notes: Default::default(),
                is_dark_mode: inner.state.is_dark_mode,
            };
            lock(&self.in_flight).clear();
            true
        });
        drop(busy);

        if applied {
            tracing::info!(sections = count, "document loaded");
            Ok(UploadOutcome::Loaded { sections: count })
        } else {
            tracing::info!("session was reset during analysis; result dropped");
            Ok(UploadOutcome::Discarded)
        }
    }

    // ============ Selection ============

    /// Select a section and generate its notes if they are not cached.
    ///
    /// The selection is recorded before anything else. At most one model call
    /// per section id runs at a time, and none once notes are cached. A result
    /// that arrives after the user moved on is still cached under its own id.
    /// Dropping the future releases the section so it can be selected again.
    pub async fn select(&self, id: &str) -> Result<SelectOutcome, NoteError> {
        match self.claim(id) {
            Claim::Done(outcome) => Ok(outcome),
            Claim::Generate(job) => self.run_generation(job).await,
        }
    }

    /// Like [`select`](Self::select), with the model call on a background task.
    ///
    /// The selection and the in-flight registration happen before this
    /// returns. Returns `None` when there was nothing to generate.
    pub fn select_in_background(
        self: &Arc<Self>,
        id: &str,
    ) -> Option<JoinHandle<Result<SelectOutcome, NoteError>>> {
        match self.claim(id) {
            Claim::Done(outcome) => {
                tracing::debug!(section = %id, ?outcome, "nothing to generate");
                None
            }
            Claim::Generate(job) => {
                let session = Arc::clone(self);
                Some(tokio::spawn(
                    async move { session.run_generation(job).await },
                ))
            }
        }
    }

    /// Record the selection and, if notes are needed, take the section's
    /// in-flight slot. Runs under the state lock so an upload or reset
    /// cannot interleave.
    fn claim(&self, id: &str) -> Claim {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = inner.state.clone();
        next.selected_section_id = Some(id.to_string());
        inner.state = next;
        self.persist(&inner.state);

        if inner.state.notes.contains_key(id) {
            return Claim::Done(SelectOutcome::Cached);
        }
        let (file, section) = match (&inner.state.file, inner.state.section(id)) {
            (Some(file), Some(section)) => (file.clone(), section.clone()),
            _ => return Claim::Done(SelectOutcome::NothingToGenerate),
        };

        let mut in_flight = lock(&self.in_flight);
        if in_flight.contains_key(id) {
            tracing::debug!(section = %id, "generation already running");
            return Claim::Done(SelectOutcome::AlreadyInFlight);
        }
        let ticket = Ticket {
            id: self.next_ticket.fetch_add(1, Ordering::SeqCst),
            epoch: inner.epoch,
        };
        in_flight.insert(id.to_string(), ticket);
        drop(in_flight);
        drop(inner);

        self.dismiss_error();
        Claim::Generate(Generation {
            guard: TicketGuard {
                registry: Arc::clone(&self.in_flight),
                id: id.to_string(),
                ticket,
            },
            file,
            section,
        })
    }

    async fn run_generation(&self, job: Generation) -> Result<SelectOutcome, NoteError> {
        let Generation {
            guard,
            file,
            section,
        } = job;
        let id = guard.id.as_str();

        let notes = match self.model.generate_notes(&file, &section).await {
            Ok(notes) => notes,
            Err(e) => {
                self.raise(&e);
                return Err(e);
            }
        };

        let mut superseded = false;
        let applied = self.apply(|inner| {
            if inner.epoch != guard.ticket.epoch {
                return false;
            }
            superseded = inner.state.selected_section_id.as_deref() != Some(id);
            inner
                .state
                .notes
                .entry(id.to_string())
                .or_insert(notes);
            true
        });

        if !applied {
            tracing::info!(section = %id, "document changed during generation; notes dropped");
            return Ok(SelectOutcome::Discarded);
        }
        if superseded {
            tracing::debug!(section = %id, "notes arrived after selection moved on");
        }
        Ok(SelectOutcome::Generated { superseded })
    }

    // ============ Other commands ============

    /// Forget the document, sections, selection and notes. The theme stays.
    pub fn reset(&self) {
        self.apply(|inner| {
            inner.epoch += 1;
            inner.state = SessionState::fresh(inner.state.is_dark_mode);
            lock(&self.in_flight).clear();
            true
        });
        self.dismiss_error();
        tracing::info!("session reset");
    }

    /// Flip the theme flag and return the new value.
    pub fn toggle_theme(&self) -> bool {
        let mut dark = false;
        self.apply(|inner| {
            inner.state.is_dark_mode = !inner.state.is_dark_mode;
            dark = inner.state.is_dark_mode;
            true
        });
        dark
    }

    /// The stored document's original bytes, if a document is loaded.
    pub fn download(&self) -> anyhow::Result<Option<FileExport>> {
        let Some(file) = self.snapshot().file else {
            return Ok(None);
        };
        let bytes = file.decoded_bytes()?;
        Ok(Some(FileExport {
            name: file.name,
            mime_type: file.mime_type,
            bytes,
        }))
    }

    // ============ Errors ============

    /// Show `err` in the banner, replacing whatever was there.
    pub fn raise(&self, err: &NoteError) {
        tracing::warn!(error = %err, "surfacing error");
        *lock(&self.error) = Some(ErrorBanner {
            message: err.user_message(),
            raised_at: Instant::now(),
        });
    }

    pub fn dismiss_error(&self) {
        *lock(&self.error) = None;
    }

    /// The banner message, if one was raised within the error lifetime.
    pub fn current_error(&self) -> Option<String> {
        self.current_error_at(Instant::now())
    }

    /// Like [`current_error`](Self::current_error) with an explicit clock.
    pub fn current_error_at(&self, now: Instant) -> Option<String> {
        let mut banner = lock(&self.error);
        let expired = match banner.as_ref() {
            Some(b) => now.saturating_duration_since(b.raised_at) >= self.error_ttl,
            None => return None,
        };
        if expired {
            *banner = None;
            return None;
        }
        banner.as_ref().map(|b| b.message.clone())
    }

    // ============ Internals ============

    fn epoch(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .epoch
    }

    /// Run `f` on a copy of the state and swap it in if `f` returns true.
    /// The swap and the save happen under the same write lock.
    fn apply(&self, f: impl FnOnce(&mut Inner) -> bool) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Inner {
            state: guard.state.clone(),
            epoch: guard.epoch,
        };
        if !f(&mut next) {
            return false;
        }
        *guard = next;
        self.persist(&guard.state);
        true
    }

    fn persist(&self, state: &SessionState) {
        let result = encode_snapshot(state).and_then(|blob| self.store.save(&blob));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to save session");
        }
    }
}
