//! The capture session: camera, location, and the submit pipeline.
//!
//! A session owns one camera, the frame most recently captured from it,
//! and the status of the describe-narrate-save pipeline. Status changes
//! are broadcast so observers can render progress without polling.
//!
//! Submission is guarded by status, not by holding a lock across the
//! pipeline: a second submit while one is running is refused up front
//! and the collaborators are never touched.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{DescriptionGenerator, LocationResolver, PositionSource, SpeechSynthesizer};
use crate::domain::{
    EntryDraft, HistoryEntry, PipelineStatus, PreferenceUpdate, UserAccount, UserPreferences,
    Voice,
};
use crate::media::{AudioPlayer, Camera, CameraError, FacingMode, Frame};
use crate::store::{HistoryStore, PreferenceStore};

/// Label stored when no position was acquired before submitting
const LOCATION_UNAVAILABLE: &str = "Location not available";

/// Label stored when position acquisition itself fails
const LOCATION_UNDETERMINED: &str = "Could not determine location";

/// Capacity of the status broadcast channel
const STATUS_CAPACITY: usize = 64;

/// A pipeline failure, tagged with the stage that was active.
#[derive(Debug, Clone, Error)]
#[error("Pipeline failed while {step}: {detail}")]
pub struct PipelineError {
    pub step: PipelineStatus,
    pub detail: String,
}

/// Who the session operates as.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: Option<UserAccount>,
    pub preferences: UserPreferences,
}

impl SessionContext {
    /// A session with nobody signed in. Submissions will be refused.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            preferences: UserPreferences::default(),
        }
    }

    pub fn signed_in(user: UserAccount, preferences: UserPreferences) -> Self {
        Self {
            user: Some(user),
            preferences,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Collaborators the session drives.
pub struct SessionServices {
    pub position: Arc<dyn PositionSource>,
    pub resolver: Arc<dyn LocationResolver>,
    pub describer: Arc<dyn DescriptionGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
    pub history: Arc<dyn HistoryStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

/// Result of a submit call.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The full pipeline ran and the entry was stored.
    Saved(HistoryEntry),

    /// Preconditions were not met; nothing ran and nothing was stored.
    Refused(SubmitRefusal),
}

/// Why a submit did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRefusal {
    NoFrame,
    NotSignedIn,
    Busy,
}

impl std::fmt::Display for SubmitRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitRefusal::NoFrame => write!(f, "no photo has been captured"),
            SubmitRefusal::NotSignedIn => write!(f, "no user is signed in"),
            SubmitRefusal::Busy => write!(f, "a capture cycle is already running"),
        }
    }
}

struct SessionState {
    status: PipelineStatus,
    frame: Option<Frame>,
    location: Option<String>,
    voice: Voice,
    last_error: Option<PipelineError>,
    last_entry: Option<HistoryEntry>,
}

/// One user-facing capture-and-narrate session
pub struct CaptureSession {
    services: SessionServices,
    user: Option<UserAccount>,
    camera: tokio::sync::Mutex<Camera>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<PipelineStatus>,
}

impl CaptureSession {
    pub fn new(services: SessionServices, context: SessionContext, camera: Camera) -> Self {
        let (events, _) = broadcast::channel(STATUS_CAPACITY);

        Self {
            services,
            user: context.user,
            camera: tokio::sync::Mutex::new(camera),
            state: Mutex::new(SessionState {
                status: PipelineStatus::Idle,
                frame: None,
                location: None,
                voice: context.preferences.voice,
                last_error: None,
                last_entry: None,
            }),
            events,
        }
    }

    /// Set the status and broadcast it. Caller holds the state lock.
    fn set_status(&self, state: &mut SessionState, status: PipelineStatus) {
        state.status = status;
        let _ = self.events.send(status);
    }

    /// Record a stage failure: status goes to Error, the error is kept.
    fn fail(&self, step: PipelineStatus, error: anyhow::Error) -> PipelineError {
        let failure = PipelineError {
            step,
            detail: format!("{:#}", error),
        };
        error!(step = %step, "{}", failure.detail);

        let mut state = self.state.lock().unwrap();
        state.last_error = Some(failure.clone());
        self.set_status(&mut state, PipelineStatus::Error);

        failure
    }

    fn busy_refusal(step: PipelineStatus) -> PipelineError {
        PipelineError {
            step,
            detail: "another operation is in progress".to_string(),
        }
    }

    /// Open the camera stream with the given facing.
    pub async fn start_camera(&self, facing: FacingMode) -> Result<(), CameraError> {
        let mut camera = self.camera.lock().await;
        camera.start(facing).await
    }

    /// Release the camera stream. Idempotent.
    pub async fn stop_camera(&self) {
        self.camera.lock().await.stop();
    }

    /// Flip between front and back camera.
    pub async fn toggle_facing(&self) -> Result<FacingMode, CameraError> {
        let mut camera = self.camera.lock().await;
        camera.toggle_facing().await?;
        Ok(camera.facing())
    }

    pub async fn camera_on(&self) -> bool {
        self.camera.lock().await.is_on()
    }

    /// Grab a still from the live camera and hold it for submission.
    ///
    /// A grab failure puts the session into the error state; the held
    /// frame from any earlier capture is kept.
    #[instrument(skip(self))]
    pub async fn capture(&self) -> Result<Frame, PipelineError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.status.is_busy() {
                return Err(Self::busy_refusal(state.status));
            }
            self.set_status(&mut state, PipelineStatus::Capturing);
        }

        let grabbed = {
            let camera = self.camera.lock().await;
            camera.capture_frame().await
        };

        match grabbed {
            Ok(frame) => {
                debug!(fingerprint = %frame.fingerprint(), "Frame captured");
                let mut state = self.state.lock().unwrap();
                state.frame = Some(frame.clone());
                self.set_status(&mut state, PipelineStatus::Idle);
                Ok(frame)
            }
            Err(e) => Err(self.fail(PipelineStatus::Capturing, e.into())),
        }
    }

    /// Acquire the device position and resolve it to a place label.
    ///
    /// Total apart from the busy guard: acquisition failures store a
    /// fallback label rather than failing the cycle, and the resolver
    /// itself never errors.
    #[instrument(skip(self))]
    pub async fn locate(&self) -> Result<String, PipelineError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.status.is_busy() {
                return Err(Self::busy_refusal(state.status));
            }
            self.set_status(&mut state, PipelineStatus::Locating);
        }

        let label = match self.services.position.current_position().await {
            Ok(coords) => self.services.resolver.resolve(coords).await,
            Err(e) => {
                warn!("Position acquisition failed: {}", e);
                LOCATION_UNDETERMINED.to_string()
            }
        };

        info!(%label, "Location resolved");

        let mut state = self.state.lock().unwrap();
        state.location = Some(label.clone());
        self.set_status(&mut state, PipelineStatus::Idle);

        Ok(label)
    }

    /// Run the describe, narrate, save pipeline on the held frame.
    ///
    /// Refused without running anything when no frame is held, no user
    /// is signed in, or a cycle is already in flight. The entry is
    /// written only after synthesis succeeds, so a failure at any stage
    /// leaves no partial record. On success the narration plays once.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> Result<SubmitOutcome, PipelineError> {
        let (photo_uri, location, voice, user_id) = {
            let mut state = self.state.lock().unwrap();

            let Some(frame) = state.frame.as_ref() else {
                debug!("Submit refused: no captured frame");
                return Ok(SubmitOutcome::Refused(SubmitRefusal::NoFrame));
            };
            let Some(user) = self.user.as_ref() else {
                debug!("Submit refused: not signed in");
                return Ok(SubmitOutcome::Refused(SubmitRefusal::NotSignedIn));
            };
            if state.status.is_busy() {
                debug!("Submit refused: pipeline busy");
                return Ok(SubmitOutcome::Refused(SubmitRefusal::Busy));
            }

            let photo_uri = frame.to_data_uri();
            let location = state
                .location
                .clone()
                .unwrap_or_else(|| LOCATION_UNAVAILABLE.to_string());
            let voice = state.voice;
            let user_id = user.uid.clone();

            state.last_error = None;
            self.set_status(&mut state, PipelineStatus::GeneratingDescription);

            (photo_uri, location, voice, user_id)
        };

        info!(user = %user_id, %voice, "Submitting capture");

        let description = self
            .services
            .describer
            .describe(&photo_uri)
            .await
            .map_err(|e| self.fail(PipelineStatus::GeneratingDescription, e))?;

        debug!(chars = description.len(), "Description generated");

        {
            let mut state = self.state.lock().unwrap();
            self.set_status(&mut state, PipelineStatus::GeneratingAudio);
        }

        let clip = self
            .services
            .synthesizer
            .synthesize(&description, voice)
            .await
            .map_err(|e| self.fail(PipelineStatus::GeneratingAudio, e))?;

        {
            let mut state = self.state.lock().unwrap();
            self.set_status(&mut state, PipelineStatus::Saving);
        }

        let draft = EntryDraft {
            image_url: photo_uri,
            description,
            audio_url: clip.audio_url.clone(),
            location,
            voice_used: voice,
        };

        let entry = self
            .services
            .history
            .add_entry(&user_id, draft)
            .await
            .map_err(|e| self.fail(PipelineStatus::Saving, e.into()))?;

        {
            let mut state = self.state.lock().unwrap();
            state.last_entry = Some(entry.clone());
            self.set_status(&mut state, PipelineStatus::Success);
        }

        info!(entry_id = %entry.id, "Capture saved");

        // Narrate once; a playback problem never un-saves the entry
        if let Err(e) = self.services.player.play(&clip).await {
            warn!("Playback failed: {}", e);
        }

        Ok(SubmitOutcome::Saved(entry))
    }

    /// Change the narration voice, persisting it for signed-in users.
    ///
    /// The session adopts the voice immediately; a persistence failure
    /// is reported but does not roll the session back.
    pub async fn set_voice(&self, voice: Voice) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.voice = voice;
        }
        debug!(%voice, "Voice set");

        if let Some(user) = &self.user {
            self.services
                .preferences
                .update_preferences(&user.uid, PreferenceUpdate::voice(voice))
                .await
                .context("Failed to persist voice preference")?;
        }

        Ok(())
    }

    /// Clear the held frame, location, and error, returning to idle.
    ///
    /// Refused (returns false) while a cycle is running.
    pub fn reset(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.status.is_busy() {
            return false;
        }

        state.frame = None;
        state.location = None;
        state.last_error = None;
        self.set_status(&mut state, PipelineStatus::Idle);
        true
    }

    /// Follow preference updates saved elsewhere, adopting voice changes.
    ///
    /// Does nothing for anonymous sessions.
    pub fn follow_preferences(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let user = self.user.as_ref()?;
        let mut rx = self.services.preferences.subscribe(&user.uid);
        let session = Arc::clone(self);

        Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(preferences) => {
                        let mut state = session.state.lock().unwrap();
                        if state.voice != preferences.voice {
                            debug!(voice = %preferences.voice, "Adopting voice change");
                            state.voice = preferences.voice;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    pub fn status(&self) -> PipelineStatus {
        self.state.lock().unwrap().status
    }

    pub fn status_label(&self) -> &'static str {
        self.status().label()
    }

    /// Watch pipeline status transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineStatus> {
        self.events.subscribe()
    }

    pub fn voice(&self) -> Voice {
        self.state.lock().unwrap().voice
    }

    pub fn held_frame(&self) -> Option<Frame> {
        self.state.lock().unwrap().frame.clone()
    }

    pub fn location_label(&self) -> Option<String> {
        self.state.lock().unwrap().location.clone()
    }

    pub fn last_error(&self) -> Option<PipelineError> {
        self.state.lock().unwrap().last_error.clone()
    }

    /// The entry stored by the most recent successful submit.
    pub fn last_entry(&self) -> Option<HistoryEntry> {
        self.state.lock().unwrap().last_entry.clone()
    }

    pub fn user(&self) -> Option<&UserAccount> {
        self.user.as_ref()
    }
}
