#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use noteorbit::ai::NotesModel;
use noteorbit::error::NoteError;
use noteorbit::models::{Section, UploadedFile};
use noteorbit::session::Session;
use noteorbit::store::{MemoryStore, SessionStore};

/// A `NotesModel` with canned answers, call counters and optional gates that
/// hold a call open until the test releases it.
pub struct ScriptedModel {
    sections: Mutex<Vec<(String, String)>>,
    analyze_failures: Mutex<VecDeque<NoteError>>,
    notes_failures: Mutex<VecDeque<NoteError>>,
    analyze_calls: AtomicUsize,
    notes_calls: AtomicUsize,
    analyze_gate: Option<Arc<Semaphore>>,
    notes_gate: Option<Arc<Semaphore>>,
}

impl ScriptedModel {
    pub fn new(sections: &[(&str, &str)]) -> Self {
        Self {
            sections: Mutex::new(
                sections
                    .iter()
                    .map(|(t, s)| (t.to_string(), s.to_string()))
                    .collect(),
            ),
            analyze_failures: Mutex::new(VecDeque::new()),
            notes_failures: Mutex::new(VecDeque::new()),
            analyze_calls: AtomicUsize::new(0),
            notes_calls: AtomicUsize::new(0),
            analyze_gate: None,
            notes_gate: None,
        }
    }

    /// The two-section report used across the flow tests.
    pub fn report() -> Self {
        Self::new(&[
            ("Intro", "Why the study was done."),
            ("Methods", "How samples were collected."),
        ])
    }

    pub fn with_notes_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.notes_gate = Some(gate);
        self
    }

    pub fn with_analyze_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.analyze_gate = Some(gate);
        self
    }

    pub fn set_sections(&self, sections: &[(&str, &str)]) {
        *self.sections.lock().unwrap() = sections
            .iter()
            .map(|(t, s)| (t.to_string(), s.to_string()))
            .collect();
    }

    pub fn fail_next_analysis(&self, err: NoteError) {
        self.analyze_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_notes(&self, err: NoteError) {
        self.notes_failures.lock().unwrap().push_back(err);
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn notes_calls(&self) -> usize {
        self.notes_calls.load(Ordering::SeqCst)
    }
}

/// Notes the scripted model writes for a section title.
pub fn notes_for(title: &str) -> String {
    format!("## {}\n- point one", title)
}

#[async_trait]
impl NotesModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn analyze(&self, _file: &UploadedFile) -> Result<Vec<Section>, NoteError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.analyze_gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(err) = self.analyze_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self
            .sections
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, (title, summary))| Section {
                id: Section::id_for_index(i),
                title: title.clone(),
                summary: summary.clone(),
            })
            .collect())
    }

    async fn generate_notes(
        &self,
        _file: &UploadedFile,
        section: &Section,
    ) -> Result<String, NoteError> {
        self.notes_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.notes_gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(err) = self.notes_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(notes_for(&section.title))
    }
}

pub fn pdf(name: &str) -> UploadedFile {
    UploadedFile::from_bytes(name, noteorbit::models::MimeType::Pdf, b"%PDF-1.4 test")
}

pub fn open_session(model: Arc<ScriptedModel>, store: Arc<dyn SessionStore>) -> Arc<Session> {
    Arc::new(Session::open(model, store, false))
}

pub fn memory_session(model: Arc<ScriptedModel>) -> (Arc<Session>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let session = Arc::new(Session::open(model, store.clone(), false));
    (session, store)
}

/// Yield to other tasks until `cond` holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
