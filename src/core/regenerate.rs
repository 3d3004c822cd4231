//! Regenerating the narration of a stored entry with a different voice.
//!
//! The displayed voice switches optimistically while synthesis runs;
//! the stored record changes only after synthesis succeeds, and the
//! display reverts if anything fails. An entry can have at most one
//! regeneration in flight.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::adapters::SpeechSynthesizer;
use crate::domain::{HistoryEntry, Voice};
use crate::media::AudioPlayer;
use crate::store::HistoryStore;

/// Result of a regeneration call.
#[derive(Debug)]
pub enum RegenOutcome {
    /// The entry's narration and voice were replaced.
    Updated(HistoryEntry),

    /// Nothing ran and nothing changed.
    Refused(RegenRefusal),
}

/// Why a regeneration did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenRefusal {
    /// The entry already carries the requested voice.
    SameVoice,

    /// A regeneration for this entry is still in flight.
    InFlight,
}

/// What a history listing shows for one entry.
#[derive(Debug, Clone)]
pub struct EntryView {
    pub entry: HistoryEntry,

    /// Voice shown to the user; during regeneration this is the
    /// requested voice, not yet the stored one.
    pub displayed_voice: Voice,

    pub regenerating: bool,
}

/// Re-voices stored history entries
pub struct VoiceRegenerator {
    history: Arc<dyn HistoryStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    in_flight: Mutex<HashSet<String>>,
    displayed: Mutex<HashMap<String, Voice>>,
}

impl VoiceRegenerator {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            history,
            synthesizer,
            player,
            in_flight: Mutex::new(HashSet::new()),
            displayed: Mutex::new(HashMap::new()),
        }
    }

    /// Re-synthesize an entry's narration with a different voice.
    ///
    /// On success the new narration plays once. On failure the stored
    /// entry is untouched and the displayed voice reverts.
    #[instrument(skip(self), fields(entry = %entry_id))]
    pub async fn regenerate(&self, entry_id: &str, voice: Voice) -> Result<RegenOutcome> {
        let entry = self
            .history
            .entry(entry_id)
            .await
            .context("Failed to load entry for regeneration")?;

        if entry.voice_used == voice {
            debug!("Regeneration refused: entry already uses {} voice", voice);
            return Ok(RegenOutcome::Refused(RegenRefusal::SameVoice));
        }

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(entry.id.clone()) {
                debug!("Regeneration refused: already in flight");
                return Ok(RegenOutcome::Refused(RegenRefusal::InFlight));
            }
        }

        // Show the requested voice while synthesis runs
        self.displayed.lock().unwrap().insert(entry.id.clone(), voice);
        info!(from = %entry.voice_used, to = %voice, "Regenerating narration");

        let result = self.synthesize_and_store(&entry, voice).await;

        match result {
            Ok(updated) => {
                // Stored voice now matches; drop the override
                self.displayed.lock().unwrap().remove(&entry.id);
                self.in_flight.lock().unwrap().remove(&entry.id);

                info!(entry_id = %updated.id, "Narration regenerated");
                Ok(RegenOutcome::Updated(updated))
            }
            Err(e) => {
                self.displayed.lock().unwrap().remove(&entry.id);
                self.in_flight.lock().unwrap().remove(&entry.id);
                Err(e)
            }
        }
    }

    async fn synthesize_and_store(
        &self,
        entry: &HistoryEntry,
        voice: Voice,
    ) -> Result<HistoryEntry> {
        let clip = self
            .synthesizer
            .synthesize(&entry.description, voice)
            .await
            .context("Failed to synthesize replacement narration")?;

        let updated = self
            .history
            .update_audio(&entry.id, &clip.audio_url, voice)
            .await
            .context("Failed to store regenerated narration")?;

        if let Err(e) = self.player.play(&clip).await {
            warn!("Playback failed: {}", e);
        }

        Ok(updated)
    }

    /// Voice a listing should show for this entry right now.
    pub fn displayed_voice(&self, entry: &HistoryEntry) -> Voice {
        self.displayed
            .lock()
            .unwrap()
            .get(&entry.id)
            .copied()
            .unwrap_or(entry.voice_used)
    }

    pub fn is_regenerating(&self, entry_id: &str) -> bool {
        self.in_flight.lock().unwrap().contains(entry_id)
    }

    /// Project entries into what a listing shows.
    pub fn views(&self, entries: Vec<HistoryEntry>) -> Vec<EntryView> {
        entries
            .into_iter()
            .map(|entry| {
                let displayed_voice = self.displayed_voice(&entry);
                let regenerating = self.is_regenerating(&entry.id);
                EntryView {
                    entry,
                    displayed_voice,
                    regenerating,
                }
            })
            .collect()
    }
}
