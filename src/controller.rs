//! Application state machine.
//!
//! Sequences user intents (submit, microphone toggle, edits, copies, history
//! recall) through the remote client, the lead store and the capture
//! controller. State lives in one container; locks are only ever held between
//! suspension points, never across a remote call.

use crate::clipboard::{copy_with_fallback, ClipboardBackend};
use crate::error::{AppError, GENERIC_ORCHESTRATION_FAILURE};
use crate::gemini::IntelligenceService;
use crate::managers::audio::{AudioCaptureController, CaptureState, MicrophoneSource};
use crate::managers::leads::{record_lead, Lead, LeadStore};
use crate::outreach::{CopyTarget, EditableField, GenerationStatus, OutputTab, OutreachResult};
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub const EMPTY_QUERY_MESSAGE: &str =
    "Please provide a target name, organization, or topic to research.";
pub const MICROPHONE_UNAVAILABLE_MESSAGE: &str =
    "Microphone access denied or not available. Please check permissions.";
pub const TRANSCRIPTION_FAILED_MESSAGE: &str = "Failed to process audio. Please try again.";

/// How long a copy button shows its "Copied!" state.
pub const COPY_FEEDBACK_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyFeedback {
    pub target: CopyTarget,
    pub copied_at: Instant,
}

impl CopyFeedback {
    pub fn is_active(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.copied_at) < COPY_FEEDBACK_DURATION
    }
}

/// Everything the view renders.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub query: String,
    pub status: GenerationStatus,
    /// At most one result; a failed generation leaves the previous one in place.
    pub result: Option<OutreachResult>,
    /// Dismissible banner text.
    pub error: Option<String>,
    pub active_tab: OutputTab,
    pub leads: Vec<Lead>,
    pub copy_feedback: Option<CopyFeedback>,
}

/// Injected collaborators.
pub struct Collaborators {
    pub intelligence: Arc<dyn IntelligenceService>,
    pub leads: Box<dyn LeadStore>,
    pub clipboard: Box<dyn ClipboardBackend>,
    pub fallback_clipboard: Box<dyn ClipboardBackend>,
    pub microphone: Box<dyn MicrophoneSource>,
}

/// Append transcribed speech to the query being typed.
pub fn append_transcript(query: &str, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return query.to_string();
    }
    if query.is_empty() {
        text.to_string()
    } else {
        format!("{} {}", query, text).trim().to_string()
    }
}

pub struct OutreachController {
    state: Mutex<AppState>,
    capture: Mutex<AudioCaptureController>,
    intelligence: Arc<dyn IntelligenceService>,
    lead_store: Box<dyn LeadStore>,
    clipboard: Box<dyn ClipboardBackend>,
    fallback_clipboard: Box<dyn ClipboardBackend>,
    revision: watch::Sender<u64>,
}

impl OutreachController {
    pub fn new(collaborators: Collaborators) -> Self {
        let leads = collaborators.leads.load();
        debug!("Loaded {} past signals", leads.len());

        Self {
            state: Mutex::new(AppState {
                leads,
                ..Default::default()
            }),
            capture: Mutex::new(AudioCaptureController::new(collaborators.microphone)),
            intelligence: collaborators.intelligence,
            lead_store: collaborators.leads,
            clipboard: collaborators.clipboard,
            fallback_clipboard: collaborators.fallback_clipboard,
            revision: watch::channel(0).0,
        }
    }

    /// Bumped whenever something the view shows changes outside of a direct
    /// reply, e.g. the Loading phase of a submit.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn touch(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }

    // Lock order is always state before capture.
    fn state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn capture(&self) -> MutexGuard<'_, AudioCaptureController> {
        self.capture.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> AppState {
        self.state().clone()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture().state()
    }

    pub fn set_query(&self, query: &str) {
        self.state().query = query.to_string();
    }

    pub fn select_tab(&self, tab: OutputTab) {
        self.state().active_tab = tab;
        self.touch();
    }

    pub fn dismiss_error(&self) {
        self.state().error = None;
        self.touch();
    }

    pub fn lead_by_id(&self, id: &str) -> Option<Lead> {
        self.state().leads.iter().find(|l| l.id == id).cloned()
    }

    /// Research `query` and draft the outreach artifacts.
    pub async fn submit(&self, query: &str) -> Result<(), AppError> {
        let capture_idle = self.capture().is_idle();
        let research_target = {
            let mut state = self.state();
            if state.status == GenerationStatus::Loading || !capture_idle {
                debug!("Ignoring submit while busy (status: {:?})", state.status);
                return Err(AppError::Busy);
            }
            state.query = query.to_string();

            let trimmed = query.trim();
            if trimmed.is_empty() {
                state.error = Some(EMPTY_QUERY_MESSAGE.to_string());
                return Err(AppError::Validation(EMPTY_QUERY_MESSAGE.to_string()));
            }

            state.error = None;
            state.status = GenerationStatus::Loading;
            trimmed.to_string()
        };
        self.touch();

        info!("Generating outreach ({} chars)", research_target.len());
        let outcome = self.intelligence.generate_outreach(&research_target).await;

        let mut state = self.state();
        let finished = match outcome {
            Ok(result) => {
                state.result = Some(result);
                state.status = GenerationStatus::Success;
                state.active_tab = OutputTab::Brief;
                state.copy_feedback = None;

                // History keeps the text as typed; only exact repeats collapse.
                let leads = record_lead(&state.leads, query, Utc::now());
                if let Err(e) = self.lead_store.save(&leads) {
                    warn!("Failed to persist signal history: {:#}", e);
                }
                state.leads = leads;
                info!("Outreach generation succeeded");
                Ok(())
            }
            Err(err) => {
                warn!("Outreach generation failed: {}", err);
                state.status = GenerationStatus::Error;
                state.error = Some(
                    err.user_message()
                        .unwrap_or_else(|| GENERIC_ORCHESTRATION_FAILURE.to_string()),
                );
                Err(err)
            }
        };
        drop(state);
        self.touch();
        finished
    }

    /// Start over with a remembered query. Does not re-fetch.
    pub fn load_past_query(&self, lead: &Lead) {
        let mut state = self.state();
        state.query = lead.query.clone();
        state.result = None;
        state.status = GenerationStatus::Idle;
        state.copy_feedback = None;
        drop(state);
        self.touch();
    }

    /// Rewrite one artifact in place. Returns false when there is no editable result.
    pub fn edit(&self, field: EditableField, value: String) -> bool {
        let mut state = self.state();
        if state.status != GenerationStatus::Success {
            return false;
        }
        match state.result.as_mut() {
            Some(result) => {
                result.apply_edit(field, value);
                true
            }
            None => false,
        }
    }

    /// Copy the current text of `target`. Returns false when there is nothing to copy.
    pub fn copy(&self, target: CopyTarget) -> Result<bool, AppError> {
        let text = match self.state().result.as_ref() {
            Some(result) => result.copy_text(target).to_string(),
            None => return Ok(false),
        };
        if text.is_empty() {
            return Ok(false);
        }

        let outcome = copy_with_fallback(
            self.clipboard.as_ref(),
            self.fallback_clipboard.as_ref(),
            &text,
        );

        let mut state = self.state();
        let copied = match outcome {
            Ok(()) => {
                state.copy_feedback = Some(CopyFeedback {
                    target,
                    copied_at: Instant::now(),
                });
                Ok(true)
            }
            Err(err) => {
                state.error = err.user_message();
                Err(err)
            }
        };
        drop(state);
        self.touch();
        copied
    }

    /// Clear the "Copied!" indication once it has run its course. Returns true if it changed.
    pub fn expire_copy_feedback(&self, now: Instant) -> bool {
        let mut state = self.state();
        match state.copy_feedback {
            Some(feedback) if !feedback.is_active(now) => {
                state.copy_feedback = None;
                drop(state);
                self.touch();
                true
            }
            _ => false,
        }
    }

    /// Mic button: start when idle, stop and transcribe when recording.
    pub async fn toggle_microphone(&self) -> Result<(), AppError> {
        let capture_state = self.capture_state();
        match capture_state {
            CaptureState::Idle => self.start_recording().map(|_| ()),
            CaptureState::Recording => self.stop_and_transcribe().await,
            CaptureState::Starting | CaptureState::Processing => {
                debug!("Microphone toggle ignored while {:?}", capture_state);
                Ok(())
            }
        }
    }

    /// Acquire the microphone. The device is opened outside the capture lock,
    /// so view reads see `Starting` instead of waiting on the platform.
    pub fn start_recording(&self) -> Result<bool, AppError> {
        let Some(pending) = self.capture().begin_start() else {
            return Ok(false);
        };
        self.touch();

        let opened = pending.open();
        let started = self.capture().finish_start(opened);
        self.touch();
        match started {
            Ok(started) => {
                if started {
                    self.state().error = None;
                }
                Ok(started)
            }
            Err(err) => {
                warn!("Microphone access failed: {}", err);
                self.state().error = Some(MICROPHONE_UNAVAILABLE_MESSAGE.to_string());
                Err(AppError::DeviceAccess(
                    MICROPHONE_UNAVAILABLE_MESSAGE.to_string(),
                ))
            }
        }
    }

    pub async fn stop_and_transcribe(&self) -> Result<(), AppError> {
        let stopped = self.capture().stop_recording();
        self.touch();
        let audio = match stopped {
            Ok(audio) => audio,
            Err(err) => {
                warn!("Failed to stop recording: {}", err);
                self.state().error = Some(TRANSCRIPTION_FAILED_MESSAGE.to_string());
                return Err(err);
            }
        };

        let outcome = self
            .intelligence
            .transcribe_audio(&audio.bytes, audio.mime_type)
            .await;
        self.capture().finish();

        let transcribed = match outcome {
            Ok(text) => {
                let mut state = self.state();
                state.query = append_transcript(&state.query, &text);
                Ok(())
            }
            Err(err) => {
                warn!("Transcription failed: {}", err);
                self.state().error = Some(TRANSCRIPTION_FAILED_MESSAGE.to_string());
                Err(err)
            }
        };
        self.touch();
        transcribed
    }

    /// Host view is going away.
    pub fn cancel_recording(&self) {
        self.capture().cancel();
        self.touch();
    }
}
