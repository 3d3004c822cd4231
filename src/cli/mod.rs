//! Command-line interface for sightsound.
//!
//! Provides commands for capturing and narrating photos, resolving
//! locations, browsing capture history, and managing accounts and
//! preferences.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast;

use crate::adapters::{
    Coordinates, FixedPosition, GeminiDescriber, GeminiSynthesizer, LocationResolver,
    NominatimClient, VoiceNames,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{CaptureSession, SessionContext, SessionServices, SubmitOutcome};
use crate::domain::{Theme, Voice};
use crate::media::{Camera, CommandBackend, CommandPlayer, FacingMode};
use crate::store::{JsonHistoryStore, JsonProfileStore};

pub mod account;
pub mod history;

/// sightsound - Capture-and-narrate tool for spoken scene descriptions
#[derive(Parser, Debug)]
#[command(name = "sightsound")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture a photo and run the full describe-narrate-save cycle
    Snap {
        /// Which camera to use
        #[arg(long, value_enum, default_value = "user")]
        facing: FacingArg,

        /// Narration voice (persists as your preference)
        #[arg(short, long, value_enum)]
        voice: Option<VoiceArg>,

        /// Latitude for the location label
        #[arg(long)]
        lat: Option<f64>,

        /// Longitude for the location label
        #[arg(long)]
        lon: Option<f64>,

        /// API key for the AI services
        #[arg(long, env = "SIGHTSOUND_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Resolve coordinates to a place label
    Locate {
        /// Latitude
        #[arg(long)]
        lat: Option<f64>,

        /// Longitude
        #[arg(long)]
        lon: Option<f64>,
    },

    /// Browse and replay capture history
    History {
        #[command(subcommand)]
        command: history::HistoryCommands,
    },

    /// Manage user accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        command: account::PrefsCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Camera facing for CLI (maps to FacingMode)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FacingArg {
    /// Front camera
    User,

    /// Back camera
    Environment,
}

impl From<FacingArg> for FacingMode {
    fn from(f: FacingArg) -> Self {
        match f {
            FacingArg::User => FacingMode::User,
            FacingArg::Environment => FacingMode::Environment,
        }
    }
}

/// Narration voice for CLI (maps to Voice)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VoiceArg {
    Male,
    Female,
}

impl From<VoiceArg> for Voice {
    fn from(v: VoiceArg) -> Self {
        match v {
            VoiceArg::Male => Voice::Male,
            VoiceArg::Female => Voice::Female,
        }
    }
}

/// Display theme for CLI (maps to Theme)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
    System,
}

impl From<ThemeArg> for Theme {
    fn from(t: ThemeArg) -> Self {
        match t {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::System => Theme::System,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Snap {
                facing,
                voice,
                lat,
                lon,
                api_key,
            } => snap(facing, voice, coordinates_from(lat, lon), api_key).await,
            Commands::Locate { lat, lon } => locate(coordinates_from(lat, lon)).await,
            Commands::History { command } => execute_history(command).await,
            Commands::Account { command } => execute_account(command).await,
            Commands::Prefs { command } => execute_prefs(command).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Execute history subcommands
async fn execute_history(command: history::HistoryCommands) -> Result<()> {
    match command {
        history::HistoryCommands::List { limit } => history::execute_list(limit).await,
        history::HistoryCommands::Show { entry_id, full } => {
            history::execute_show(&entry_id, full).await
        }
        history::HistoryCommands::Play { entry_id } => history::execute_play(&entry_id).await,
        history::HistoryCommands::Revoice {
            entry_id,
            voice,
            api_key,
        } => history::execute_revoice(&entry_id, voice.into(), api_key).await,
    }
}

/// Execute account subcommands
async fn execute_account(command: account::AccountCommands) -> Result<()> {
    match command {
        account::AccountCommands::Signup { email, name } => {
            account::execute_signup(&email, &name).await
        }
        account::AccountCommands::Login { email } => account::execute_login(&email).await,
        account::AccountCommands::Logout => account::execute_logout().await,
        account::AccountCommands::Whoami => account::execute_whoami().await,
    }
}

/// Execute prefs subcommands
async fn execute_prefs(command: account::PrefsCommands) -> Result<()> {
    match command {
        account::PrefsCommands::Show => account::execute_prefs_show().await,
        account::PrefsCommands::Set { voice, theme } => {
            account::execute_prefs_set(voice.map(Into::into), theme.map(Into::into)).await
        }
    }
}

fn coordinates_from(lat: Option<f64>, lon: Option<f64>) -> Option<Coordinates> {
    match (lat, lon) {
        (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
        _ => None,
    }
}

/// Resolve the API key from flag, environment, or config file.
fn resolve_api_key(cfg: &ResolvedConfig, flag: Option<String>) -> Result<String> {
    flag.or_else(|| cfg.ai.api_key.clone()).context(
        "No API key configured. Set SIGHTSOUND_API_KEY or add ai.api_key to config.yaml",
    )
}

/// Wire up the session collaborators from configuration.
fn build_services(
    cfg: &ResolvedConfig,
    coords: Option<Coordinates>,
    api_key: &str,
    profiles: Arc<JsonProfileStore>,
) -> SessionServices {
    SessionServices {
        position: Arc::new(FixedPosition::new(coords.or(cfg.location.coordinates))),
        resolver: Arc::new(NominatimClient::new(&cfg.location.endpoint)),
        describer: Arc::new(GeminiDescriber::new(
            &cfg.ai.endpoint,
            &cfg.ai.description_model,
            api_key,
        )),
        synthesizer: Arc::new(GeminiSynthesizer::new(
            &cfg.ai.endpoint,
            &cfg.ai.speech_model,
            api_key,
            VoiceNames {
                male: cfg.ai.male_voice.clone(),
                female: cfg.ai.female_voice.clone(),
            },
        )),
        player: Arc::new(CommandPlayer::new()),
        history: Arc::new(JsonHistoryStore::new(cfg.home.join("history"))),
        preferences: profiles,
    }
}

fn build_camera(cfg: &ResolvedConfig) -> Camera {
    let backend = CommandBackend::new().with_binary(&cfg.camera.binary);
    Camera::new(
        Arc::new(backend),
        &cfg.camera.user_device,
        &cfg.camera.environment_device,
    )
}

/// Capture a photo and run the full cycle
async fn snap(
    facing: FacingArg,
    voice: Option<VoiceArg>,
    coords: Option<Coordinates>,
    api_key: Option<String>,
) -> Result<()> {
    let cfg = config::config()?;
    let api_key = resolve_api_key(cfg, api_key)?;

    let profiles = Arc::new(JsonProfileStore::new(&cfg.home));
    let Some(profile) = profiles.active().await? else {
        anyhow::bail!(
            "No user signed in. Run 'sightsound account signup --email <email> --name <name>' first"
        );
    };

    let context = SessionContext::signed_in(profile.account(), profile.preferences);
    let services = build_services(cfg, coords, &api_key, profiles);
    let session = Arc::new(CaptureSession::new(services, context, build_camera(cfg)));

    // Narrate pipeline progress as it happens
    let mut status_rx = session.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(status) => eprintln!("   {}", status.label()),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if let Some(v) = voice {
        if let Err(e) = session.set_voice(v.into()).await {
            eprintln!("⚠️ Voice preference not saved: {:#}", e);
        }
    }

    eprintln!("📸 Capturing from the {} camera...", FacingMode::from(facing));

    session.start_camera(facing.into()).await?;
    let frame = session.capture().await?;
    eprintln!("   Frame: {} bytes ({})", frame.len(), frame.fingerprint());

    let label = session.locate().await?;
    eprintln!("📍 {}", label);

    let outcome = session.submit().await;
    session.stop_camera().await;
    progress.abort();

    match outcome {
        Ok(SubmitOutcome::Saved(entry)) => {
            println!("{}", entry.description);
            eprintln!("\n✅ Capture saved!");
            eprintln!("   ID: {}", entry.id);
            eprintln!("   Location: {}", entry.location);
            eprintln!("   Voice: {}", entry.voice_used);
            Ok(())
        }
        Ok(SubmitOutcome::Refused(reason)) => {
            eprintln!("\n⚠️ Nothing submitted: {}", reason);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("\n❌ {}", e);
            std::process::exit(1);
        }
    }
}

/// Resolve coordinates to a place label
async fn locate(coords: Option<Coordinates>) -> Result<()> {
    let cfg = config::config()?;

    let coords = coords.or(cfg.location.coordinates).context(
        "No coordinates given. Pass --lat and --lon, or set location in config.yaml",
    )?;

    let resolver = NominatimClient::new(&cfg.location.endpoint);
    let label = resolver.resolve(coords).await;

    println!("{}", label);
    Ok(())
}

/// Show the resolved configuration (for debugging)
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("  Sightsound Configuration");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  History: {}", cfg.home.join("history").display());
    println!("  Users:   {}", cfg.home.join("users.json").display());
    println!();
    println!("AI services:");
    println!("  Endpoint:          {}", cfg.ai.endpoint);
    println!("  Description model: {}", cfg.ai.description_model);
    println!("  Speech model:      {}", cfg.ai.speech_model);
    println!("  Voices:            {} / {}", cfg.ai.male_voice, cfg.ai.female_voice);
    println!(
        "  API key:           {}",
        if cfg.ai.api_key.is_some() { "(set)" } else { "(not set)" }
    );
    println!();
    println!("Camera:");
    println!("  Binary:             {}", cfg.camera.binary);
    println!("  User device:        {}", cfg.camera.user_device);
    println!("  Environment device: {}", cfg.camera.environment_device);
    println!();
    println!("Location:");
    println!("  Endpoint: {}", cfg.location.endpoint);
    match cfg.location.coordinates {
        Some(coords) => println!("  Fixed position: {}", coords),
        None => println!("  Fixed position: (none)"),
    }

    Ok(())
}
