//! CLI commands for browsing and replaying capture history.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;

use crate::adapters::{GeminiSynthesizer, VoiceNames};
use crate::config;
use crate::core::{RegenOutcome, RegenRefusal, VoiceRegenerator};
use crate::domain::{HistoryEntry, UserProfile, Voice};
use crate::media::{AudioClip, AudioPlayer, CommandPlayer};
use crate::store::{HistoryStore, JsonHistoryStore, JsonProfileStore};

use super::VoiceArg;

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List your captures, most recent first
    List {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show details of one capture
    Show {
        /// Entry ID (prefix is enough)
        entry_id: String,

        /// Show the full description and media sizes
        #[arg(short, long)]
        full: bool,
    },

    /// Play a capture's narration
    Play {
        /// Entry ID (prefix is enough)
        entry_id: String,
    },

    /// Re-synthesize a capture's narration with a different voice
    Revoice {
        /// Entry ID (prefix is enough)
        entry_id: String,

        /// Voice to regenerate with
        #[arg(value_enum)]
        voice: VoiceArg,

        /// API key for the AI services
        #[arg(long, env = "SIGHTSOUND_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

/// Load the signed-in profile and the history store.
async fn open_history() -> Result<(UserProfile, JsonHistoryStore)> {
    let cfg = config::config()?;

    let profiles = JsonProfileStore::new(&cfg.home);
    let profile = profiles
        .active()
        .await?
        .context("No user signed in. Run 'sightsound account login --email <email>' first")?;

    Ok((profile, JsonHistoryStore::new(cfg.home.join("history"))))
}

/// Find an entry of this user by ID prefix match
async fn resolve_entry(
    store: &JsonHistoryStore,
    user_id: &str,
    prefix: &str,
) -> Result<HistoryEntry> {
    let entries = store.entries_for_user(user_id).await?;

    entries
        .into_iter()
        .find(|e| e.id.starts_with(prefix))
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {}", prefix))
}

/// Execute the `history list` command
pub async fn execute_list(limit: usize) -> Result<()> {
    let (profile, store) = open_history().await?;
    let entries = store.entries_for_user(&profile.user_id).await?;

    if entries.is_empty() {
        println!("No captures yet. Use 'sightsound snap' to make one.");
        return Ok(());
    }

    let total = entries.len();

    println!("{:<38} {:<12} {:<8} {:<30}", "ID", "WHEN", "VOICE", "LOCATION");
    println!("{}", "-".repeat(90));

    for entry in entries.iter().take(limit) {
        let location_truncated = if entry.location.len() > 27 {
            format!("{}...", &entry.location[..27])
        } else {
            entry.location.clone()
        };
        println!(
            "{:<38} {:<12} {:<8} {:<30}",
            entry.id,
            relative_time(entry.timestamp),
            entry.voice_used.to_string(),
            location_truncated
        );
    }

    println!("\nTotal: {} captures", total);

    Ok(())
}

/// Execute the `history show` command
pub async fn execute_show(entry_id: &str, full: bool) -> Result<()> {
    let (profile, store) = open_history().await?;
    let entry = resolve_entry(&store, &profile.user_id, entry_id).await?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("  ID: {}", entry.id);
    println!("  Captured: {} ({})", entry.timestamp, relative_time(entry.timestamp));
    println!("  Location: {}", entry.location);
    println!("  Voice: {}", entry.voice_used);
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!("{}", entry.description);

    if full {
        println!();
        println!("Photo: {} bytes (data URI)", entry.image_url.len());
        println!("Audio: {} bytes (data URI)", entry.audio_url.len());
    }

    Ok(())
}

/// Execute the `history play` command
pub async fn execute_play(entry_id: &str) -> Result<()> {
    let (profile, store) = open_history().await?;
    let entry = resolve_entry(&store, &profile.user_id, entry_id).await?;

    let clip = AudioClip::new(&entry.audio_url, entry.voice_used);
    let player = CommandPlayer::new();

    eprintln!("🔊 Playing narration ({} voice)...", entry.voice_used);
    player.play(&clip).await?;

    Ok(())
}

/// Execute the `history revoice` command
pub async fn execute_revoice(entry_id: &str, voice: Voice, api_key: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let api_key = super::resolve_api_key(cfg, api_key)?;

    let (profile, store) = open_history().await?;
    let entry = resolve_entry(&store, &profile.user_id, entry_id).await?;

    let synthesizer = Arc::new(GeminiSynthesizer::new(
        &cfg.ai.endpoint,
        &cfg.ai.speech_model,
        &api_key,
        VoiceNames {
            male: cfg.ai.male_voice.clone(),
            female: cfg.ai.female_voice.clone(),
        },
    ));
    let regenerator = VoiceRegenerator::new(
        Arc::new(store),
        synthesizer,
        Arc::new(CommandPlayer::new()),
    );

    eprintln!("🔄 Regenerating narration with the {} voice...", voice);

    match regenerator.regenerate(&entry.id, voice).await? {
        RegenOutcome::Updated(updated) => {
            eprintln!("\n✅ Narration regenerated!");
            eprintln!("   ID: {}", updated.id);
            eprintln!("   Voice: {}", updated.voice_used);
            Ok(())
        }
        RegenOutcome::Refused(RegenRefusal::SameVoice) => {
            eprintln!("\n⚠️ Entry already uses the {} voice", voice);
            Ok(())
        }
        RegenOutcome::Refused(RegenRefusal::InFlight) => {
            eprintln!("\n⚠️ A regeneration for this entry is already running");
            Ok(())
        }
    }
}

/// Compact "how long ago" for listings
fn relative_time(timestamp: DateTime<Utc>) -> String {
    let delta = Utc::now().signed_duration_since(timestamp);

    if delta.num_seconds() < 60 {
        "just now".to_string()
    } else if delta.num_minutes() < 60 {
        format!("{}m ago", delta.num_minutes())
    } else if delta.num_hours() < 24 {
        format!("{}h ago", delta.num_hours())
    } else {
        format!("{}d ago", delta.num_days())
    }
}
