//! Capture Pipeline Integration Tests
//!
//! End-to-end runs of the capture-describe-narrate-save pipeline against
//! stub adapters and real JSON stores.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use sightsound::adapters::{
    Coordinates, DescriptionGenerator, LocationResolver, PositionSource, SpeechSynthesizer,
};
use sightsound::core::{
    CaptureSession, SessionContext, SessionServices, SubmitOutcome, SubmitRefusal,
};
use sightsound::domain::{EntryDraft, HistoryEntry, PipelineStatus, PreferenceUpdate, Voice};
use sightsound::media::{
    pcm_to_wav, AudioClip, AudioPlayer, Camera, CameraError, CaptureBackend, FacingMode,
};
use sightsound::store::{
    uid_for_email, HistoryStore, JsonHistoryStore, JsonProfileStore, PreferenceStore, StoreError,
};

/// Backend that serves one canned JPEG frame per grab
struct StillBackend;

#[async_trait]
impl CaptureBackend for StillBackend {
    fn name(&self) -> &str {
        "still"
    }

    async fn open(&self, _device: &str) -> Result<(), CameraError> {
        Ok(())
    }

    async fn grab(&self, _device: &str) -> Result<Vec<u8>, CameraError> {
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0x03, 0x04])
    }
}

/// Position source with a canned fix that can be switched off
struct TestPosition {
    available: bool,
}

#[async_trait]
impl PositionSource for TestPosition {
    async fn current_position(&self) -> anyhow::Result<Coordinates> {
        if self.available {
            Ok(Coordinates {
                latitude: 14.5995,
                longitude: 120.9842,
            })
        } else {
            anyhow::bail!("position backend offline")
        }
    }
}

/// Resolver that always returns the same place label
struct TestResolver;

#[async_trait]
impl LocationResolver for TestResolver {
    fn name(&self) -> &str {
        "test"
    }

    async fn resolve(&self, _coords: Coordinates) -> String {
        "Brgy. Uno, Quezon City, Metro Manila".to_string()
    }
}

/// Vision stub that counts calls and can be told to fail
struct TestDescriber {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl TestDescriber {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DescriptionGenerator for TestDescriber {
    fn name(&self) -> &str {
        "test"
    }

    async fn describe(&self, _photo_data_uri: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("vision model unavailable");
        }
        Ok("A busy street market.".to_string())
    }
}

/// Speech stub with a call counter, a failure switch, and an optional
/// delay for holding the pipeline busy.
struct TestSynthesizer {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Duration,
}

impl TestSynthesizer {
    fn new() -> Self {
        Self::slow(Duration::ZERO)
    }

    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for TestSynthesizer {
    fn name(&self) -> &str {
        "test"
    }

    async fn synthesize(&self, _text: &str, voice: Voice) -> anyhow::Result<AudioClip> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("speech endpoint rejected the request");
        }

        let wav = pcm_to_wav(&[0u8; 64], 24_000)?;
        Ok(AudioClip::from_wav(&wav, voice))
    }
}

/// Player that records how many clips it was asked to play
struct TestPlayer {
    plays: AtomicUsize,
}

impl TestPlayer {
    fn new() -> Self {
        Self {
            plays: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AudioPlayer for TestPlayer {
    fn name(&self) -> &str {
        "test"
    }

    async fn play(&self, _clip: &AudioClip) -> anyhow::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// History store whose writes always fail
struct BrokenHistory;

#[async_trait]
impl HistoryStore for BrokenHistory {
    async fn add_entry(
        &self,
        _user_id: &str,
        _draft: EntryDraft,
    ) -> Result<HistoryEntry, StoreError> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    async fn entries_for_user(&self, _user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(Vec::new())
    }

    async fn entry(&self, id: &str) -> Result<HistoryEntry, StoreError> {
        Err(StoreError::EntryNotFound(id.to_string()))
    }

    async fn update_audio(
        &self,
        id: &str,
        _audio_url: &str,
        _voice: Voice,
    ) -> Result<HistoryEntry, StoreError> {
        Err(StoreError::EntryNotFound(id.to_string()))
    }
}

/// A session wired to stub adapters and JSON stores, with handles to
/// every stub so tests can inspect call counts afterwards.
struct PipelineRig {
    session: Arc<CaptureSession>,
    describer: Arc<TestDescriber>,
    synthesizer: Arc<TestSynthesizer>,
    player: Arc<TestPlayer>,
    history: Arc<JsonHistoryStore>,
    profiles: Arc<JsonProfileStore>,
    uid: String,
}

impl PipelineRig {
    async fn new(home: &TempDir) -> Self {
        Self::build(home, true, true, TestSynthesizer::new()).await
    }

    async fn with_synth(home: &TempDir, synthesizer: TestSynthesizer) -> Self {
        Self::build(home, true, true, synthesizer).await
    }

    async fn anonymous(home: &TempDir) -> Self {
        Self::build(home, false, true, TestSynthesizer::new()).await
    }

    async fn without_position(home: &TempDir) -> Self {
        Self::build(home, true, false, TestSynthesizer::new()).await
    }

    async fn build(
        home: &TempDir,
        signed_in: bool,
        position_available: bool,
        synthesizer: TestSynthesizer,
    ) -> Self {
        let profiles = Arc::new(JsonProfileStore::new(home.path()));
        let history = Arc::new(JsonHistoryStore::new(home.path().join("history")));
        let describer = Arc::new(TestDescriber::new());
        let synthesizer = Arc::new(synthesizer);
        let player = Arc::new(TestPlayer::new());

        let context = if signed_in {
            let profile = profiles
                .create_profile("maria@example.com", "Maria Santos")
                .await
                .unwrap();
            SessionContext::signed_in(profile.account(), profile.preferences)
        } else {
            SessionContext::anonymous()
        };

        let services = SessionServices {
            position: Arc::new(TestPosition {
                available: position_available,
            }),
            resolver: Arc::new(TestResolver),
            describer: describer.clone(),
            synthesizer: synthesizer.clone(),
            player: player.clone(),
            history: history.clone(),
            preferences: profiles.clone(),
        };

        let camera = Camera::new(Arc::new(StillBackend), "cam0", "cam1");
        let session = Arc::new(CaptureSession::new(services, context, camera));

        Self {
            session,
            describer,
            synthesizer,
            player,
            history,
            profiles,
            uid: uid_for_email("maria@example.com"),
        }
    }
}

#[tokio::test]
async fn test_submit_saves_entry_and_plays_once() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();
    rig.session.locate().await.unwrap();

    let outcome = rig.session.submit().await.unwrap();
    let entry = match outcome {
        SubmitOutcome::Saved(entry) => entry,
        other => panic!("expected a saved entry, got {:?}", other),
    };

    assert_eq!(entry.description, "A busy street market.");
    assert_eq!(entry.location, "Brgy. Uno, Quezon City, Metro Manila");
    assert_eq!(entry.voice_used, Voice::Female);
    assert!(entry.image_url.starts_with("data:image/jpeg;base64,"));
    assert!(entry.audio_url.starts_with("data:audio/wav;base64,"));

    // Stored durably, narrated exactly once, session rests at Success
    let stored = rig.history.entries_for_user(&rig.uid).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, entry.id);
    assert_eq!(rig.player.plays.load(Ordering::SeqCst), 1);
    assert_eq!(rig.session.status(), PipelineStatus::Success);
    assert_eq!(rig.session.last_entry().unwrap().id, entry.id);
}

#[tokio::test]
async fn test_submit_broadcasts_stages_in_order() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;
    let mut events = rig.session.subscribe();

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();
    rig.session.locate().await.unwrap();
    rig.session.submit().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(status) = events.try_recv() {
        seen.push(status);
    }

    assert_eq!(
        seen,
        vec![
            PipelineStatus::Capturing,
            PipelineStatus::Idle,
            PipelineStatus::Locating,
            PipelineStatus::Idle,
            PipelineStatus::GeneratingDescription,
            PipelineStatus::GeneratingAudio,
            PipelineStatus::Saving,
            PipelineStatus::Success,
        ]
    );
}

#[tokio::test]
async fn test_submit_refused_without_frame() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;

    let outcome = rig.session.submit().await.unwrap();

    assert!(matches!(
        outcome,
        SubmitOutcome::Refused(SubmitRefusal::NoFrame)
    ));

    // Nothing ran and nothing was stored
    assert_eq!(rig.describer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.session.status(), PipelineStatus::Idle);
    assert!(rig.history.entries_for_user(&rig.uid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_refused_when_signed_out() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::anonymous(&home).await;

    // Capturing works without a user; submitting does not
    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();

    let outcome = rig.session.submit().await.unwrap();

    assert!(matches!(
        outcome,
        SubmitOutcome::Refused(SubmitRefusal::NotSignedIn)
    ));
    assert_eq!(rig.describer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.session.status(), PipelineStatus::Idle);
}

#[tokio::test]
async fn test_concurrent_submits_store_one_entry() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::with_synth(&home, TestSynthesizer::slow(Duration::from_millis(50))).await;

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();
    rig.session.locate().await.unwrap();

    let (first, second) = tokio::join!(rig.session.submit(), async {
        // Land inside the first submit's synthesis stage
        tokio::time::sleep(Duration::from_millis(10)).await;
        rig.session.submit().await
    });

    assert!(matches!(first.unwrap(), SubmitOutcome::Saved(_)));
    assert!(matches!(
        second.unwrap(),
        SubmitOutcome::Refused(SubmitRefusal::Busy)
    ));

    // The refused submit never reached the collaborators or the store
    assert_eq!(rig.describer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(rig.synthesizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(rig.history.entries_for_user(&rig.uid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_busy_pipeline_refuses_capture_locate_and_reset() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::with_synth(&home, TestSynthesizer::slow(Duration::from_millis(50))).await;

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();

    let (submitted, _) = tokio::join!(rig.session.submit(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;

        let capture_err = rig.session.capture().await.unwrap_err();
        assert_eq!(capture_err.step, PipelineStatus::GeneratingAudio);
        assert!(capture_err.detail.contains("in progress"));

        assert!(rig.session.locate().await.is_err());
        assert!(!rig.session.reset());
    });

    // The refusals left the running submit untouched
    assert!(matches!(submitted.unwrap(), SubmitOutcome::Saved(_)));
    assert_eq!(rig.session.status(), PipelineStatus::Success);
}

#[tokio::test]
async fn test_synthesis_failure_saves_nothing() {
    let home = TempDir::new().unwrap();
    let synthesizer = TestSynthesizer::new();
    synthesizer.fail.store(true, Ordering::SeqCst);
    let rig = PipelineRig::with_synth(&home, synthesizer).await;

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();

    let err = rig.session.submit().await.unwrap_err();

    assert_eq!(err.step, PipelineStatus::GeneratingAudio);
    assert_eq!(err.step.label(), "Generating audio...");
    assert_eq!(rig.session.status(), PipelineStatus::Error);
    assert!(rig
        .session
        .last_error()
        .unwrap()
        .detail
        .contains("speech endpoint"));

    // Nothing was stored and nothing played
    assert!(rig.history.entries_for_user(&rig.uid).await.unwrap().is_empty());
    assert_eq!(rig.player.plays.load(Ordering::SeqCst), 0);

    // Reset clears the failure and returns to idle
    assert!(rig.session.reset());
    assert_eq!(rig.session.status(), PipelineStatus::Idle);
    assert!(rig.session.last_error().is_none());
    assert!(rig.session.held_frame().is_none());
}

#[tokio::test]
async fn test_description_failure_stops_before_synthesis() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;
    rig.describer.fail.store(true, Ordering::SeqCst);

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();

    let err = rig.session.submit().await.unwrap_err();

    assert_eq!(err.step, PipelineStatus::GeneratingDescription);
    assert!(err.detail.contains("vision model unavailable"));
    assert_eq!(rig.synthesizer.calls.load(Ordering::SeqCst), 0);
    assert!(rig.history.entries_for_user(&rig.uid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_failure_reports_saving_stage() {
    let home = TempDir::new().unwrap();
    let profiles = Arc::new(JsonProfileStore::new(home.path()));
    let profile = profiles
        .create_profile("maria@example.com", "Maria Santos")
        .await
        .unwrap();

    let synthesizer = Arc::new(TestSynthesizer::new());
    let player = Arc::new(TestPlayer::new());
    let services = SessionServices {
        position: Arc::new(TestPosition { available: true }),
        resolver: Arc::new(TestResolver),
        describer: Arc::new(TestDescriber::new()),
        synthesizer: synthesizer.clone(),
        player: player.clone(),
        history: Arc::new(BrokenHistory),
        preferences: profiles.clone(),
    };
    let camera = Camera::new(Arc::new(StillBackend), "cam0", "cam1");
    let session = CaptureSession::new(
        services,
        SessionContext::signed_in(profile.account(), profile.preferences),
        camera,
    );

    session.start_camera(FacingMode::User).await.unwrap();
    session.capture().await.unwrap();

    let err = session.submit().await.unwrap_err();

    assert_eq!(err.step, PipelineStatus::Saving);
    assert_eq!(err.step.label(), "Saving result...");
    assert!(err.detail.contains("disk full"));

    // Synthesis ran, but the failed save kept the narration silent
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(player.plays.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unlocated_submit_stores_fallback_label() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();

    // Submit without ever locating
    let outcome = rig.session.submit().await.unwrap();
    let entry = match outcome {
        SubmitOutcome::Saved(entry) => entry,
        other => panic!("expected a saved entry, got {:?}", other),
    };

    assert_eq!(entry.location, "Location not available");
}

#[tokio::test]
async fn test_position_failure_stores_undetermined_label() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::without_position(&home).await;

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();

    // Locating succeeds with a fallback label rather than failing
    let label = rig.session.locate().await.unwrap();
    assert_eq!(label, "Could not determine location");
    assert_eq!(rig.session.status(), PipelineStatus::Idle);

    let outcome = rig.session.submit().await.unwrap();
    let entry = match outcome {
        SubmitOutcome::Saved(entry) => entry,
        other => panic!("expected a saved entry, got {:?}", other),
    };

    assert_eq!(entry.location, "Could not determine location");
}

#[tokio::test]
async fn test_capture_without_stream_sets_error_state() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;

    // No start_camera call, so the grab fails
    let err = rig.session.capture().await.unwrap_err();

    assert_eq!(err.step, PipelineStatus::Capturing);
    assert_eq!(rig.session.status(), PipelineStatus::Error);
    assert!(rig.session.held_frame().is_none());
}

#[tokio::test]
async fn test_set_voice_persists_and_flows_into_entries() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;

    rig.session.set_voice(Voice::Male).await.unwrap();
    assert_eq!(rig.session.voice(), Voice::Male);

    // Persisted to the profile store, not just the live session
    let prefs = rig.profiles.preferences(&rig.uid).await.unwrap();
    assert_eq!(prefs.voice, Voice::Male);

    rig.session.start_camera(FacingMode::User).await.unwrap();
    rig.session.capture().await.unwrap();

    let outcome = rig.session.submit().await.unwrap();
    let entry = match outcome {
        SubmitOutcome::Saved(entry) => entry,
        other => panic!("expected a saved entry, got {:?}", other),
    };

    assert_eq!(entry.voice_used, Voice::Male);
}

#[tokio::test]
async fn test_session_follows_preference_updates() {
    let home = TempDir::new().unwrap();
    let rig = PipelineRig::new(&home).await;

    let follower = rig.session.follow_preferences().unwrap();
    assert_eq!(rig.session.voice(), Voice::Female);

    // A preference write from elsewhere reaches the live session
    rig.profiles
        .update_preferences(&rig.uid, PreferenceUpdate::voice(Voice::Male))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(rig.session.voice(), Voice::Male);
    follower.abort();
}
