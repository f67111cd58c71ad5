//! In-memory form state shared between the form, the auto-save scheduler
//! and the unsaved-changes guard.
//!
//! The dirty flag lives in a `tokio::sync::watch` channel so the guard can
//! follow it without polling. Every edit bumps a revision counter; a save
//! only clears the flag if nothing changed while it was in flight.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::watch;

use pillars_types::assessment::{AssessmentDraft, FormData, RecoveredData};

/// Point-in-time copy of the form, handed to a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSnapshot {
    pub form_data: FormData,
    pub current_step: String,
    /// Edit revision the snapshot was taken at.
    pub revision: u64,
}

impl FormSnapshot {
    fn same_content(&self, form_data: &FormData, current_step: &str) -> bool {
        self.form_data == *form_data && self.current_step == current_step
    }
}

#[derive(Debug, Default)]
struct Buffer {
    form_data: FormData,
    current_step: String,
    revision: u64,
    /// Content of the last successful save.
    saved: Option<FormSnapshot>,
}

/// Cloneable handle to one form's answers and dirty flag.
#[derive(Clone)]
pub struct FormState {
    buffer: Arc<Mutex<Buffer>>,
    dirty: Arc<watch::Sender<bool>>,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormState")
            .field("dirty", &self.has_unsaved_changes())
            .field("revision", &self.lock().revision)
            .finish()
    }
}

impl FormState {
    /// An empty, clean form.
    pub fn new() -> Self {
        let (dirty, _) = watch::channel(false);
        Self {
            buffer: Arc::new(Mutex::new(Buffer::default())),
            dirty: Arc::new(dirty),
        }
    }

    /// A clean form populated from a stored draft.
    pub fn from_draft(draft: &AssessmentDraft) -> Self {
        let form = Self::new();
        form.load_saved(draft);
        form
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().expect("form state lock poisoned")
    }

    fn set_dirty(&self, dirty: bool) {
        self.dirty.send_if_modified(|current| {
            if *current == dirty {
                false
            } else {
                *current = dirty;
                true
            }
        });
    }

    /// Replace the form with a stored draft's content. The form is clean
    /// afterwards and the draft counts as the last saved content.
    pub fn load_saved(&self, draft: &AssessmentDraft) {
        let mut buffer = self.lock();
        buffer.form_data = draft.form_data.clone();
        buffer.current_step = draft.current_step.clone();
        buffer.revision += 1;
        buffer.saved = Some(FormSnapshot {
            form_data: draft.form_data.clone(),
            current_step: draft.current_step.clone(),
            revision: buffer.revision,
        });
        drop(buffer);
        self.set_dirty(false);
    }

    /// Populate the form with recovered answers.
    ///
    /// Nothing is marked dirty: recovered answers are only written once the
    /// user edits the form or saves explicitly.
    pub fn populate_recovered(&self, recovered: &RecoveredData) {
        let mut buffer = self.lock();
        buffer.form_data = recovered.form_data.clone();
        if let Some(step) = &recovered.current_step {
            buffer.current_step = step.clone();
        }
        buffer.revision += 1;
    }

    /// Set (or overwrite) one answer.
    pub fn set_answer(&self, question: impl Into<String>, answer: Value) {
        let mut buffer = self.lock();
        buffer.form_data.insert(question.into(), answer);
        buffer.revision += 1;
        drop(buffer);
        self.set_dirty(true);
    }

    /// Remove one answer. No-op if the question was unanswered.
    pub fn remove_answer(&self, question: &str) {
        let mut buffer = self.lock();
        if buffer.form_data.remove(question).is_none() {
            return;
        }
        buffer.revision += 1;
        drop(buffer);
        self.set_dirty(true);
    }

    /// Move the progress marker.
    pub fn set_step(&self, step: impl Into<String>) {
        let step = step.into();
        let mut buffer = self.lock();
        if buffer.current_step == step {
            return;
        }
        buffer.current_step = step;
        buffer.revision += 1;
        drop(buffer);
        self.set_dirty(true);
    }

    /// Drop all answers (after a "start over"). The form is clean afterwards.
    pub fn reset(&self) {
        let mut buffer = self.lock();
        buffer.form_data.clear();
        buffer.current_step.clear();
        buffer.revision += 1;
        buffer.saved = None;
        drop(buffer);
        self.set_dirty(false);
    }

    pub fn snapshot(&self) -> FormSnapshot {
        let buffer = self.lock();
        FormSnapshot {
            form_data: buffer.form_data.clone(),
            current_step: buffer.current_step.clone(),
            revision: buffer.revision,
        }
    }

    pub fn answers(&self) -> FormData {
        self.lock().form_data.clone()
    }

    pub fn current_step(&self) -> String {
        self.lock().current_step.clone()
    }

    /// Whether the snapshot's content equals the last successful save.
    pub fn matches_saved(&self, snapshot: &FormSnapshot) -> bool {
        self.lock()
            .saved
            .as_ref()
            .is_some_and(|saved| saved.same_content(&snapshot.form_data, &snapshot.current_step))
    }

    /// Record a successful save of `snapshot`.
    ///
    /// The dirty flag is cleared only if no edit happened since the
    /// snapshot was taken.
    pub fn mark_saved(&self, snapshot: &FormSnapshot) {
        let mut buffer = self.lock();
        buffer.saved = Some(snapshot.clone());
        let unchanged = buffer.revision == snapshot.revision;
        drop(buffer);
        if unchanged {
            self.set_dirty(false);
        }
    }

    pub fn has_unsaved_changes(&self) -> bool {
        *self.dirty.borrow()
    }

    /// Receiver following the dirty flag.
    pub fn subscribe_dirty(&self) -> watch::Receiver<bool> {
        self.dirty.subscribe()
    }
}
