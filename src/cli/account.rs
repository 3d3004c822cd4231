//! CLI commands for accounts and preferences.

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config;
use crate::domain::{PreferenceUpdate, Theme, UserProfile, Voice};
use crate::store::{JsonProfileStore, PreferenceStore, StoreError};

use super::{ThemeArg, VoiceArg};

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Create an account and sign in
    Signup {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name, e.g. "Maria Santos"
        #[arg(short, long)]
        name: String,
    },

    /// Sign in to an existing account
    Login {
        /// Email address
        #[arg(short, long)]
        email: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommands {
    /// Show your preferences
    Show,

    /// Change preferences
    Set {
        /// Narration voice
        #[arg(short, long, value_enum)]
        voice: Option<VoiceArg>,

        /// Display theme
        #[arg(short, long, value_enum)]
        theme: Option<ThemeArg>,
    },
}

fn open_profiles() -> Result<JsonProfileStore> {
    let cfg = config::config()?;
    Ok(JsonProfileStore::new(&cfg.home))
}

async fn active_profile(profiles: &JsonProfileStore) -> Result<UserProfile> {
    profiles
        .active()
        .await?
        .context("Not signed in. Run 'sightsound account login --email <email>' first")
}

/// Execute the `account signup` command
pub async fn execute_signup(email: &str, name: &str) -> Result<()> {
    let profiles = open_profiles()?;

    let profile = match profiles.create_profile(email, name).await {
        Ok(profile) => profile,
        Err(StoreError::ProfileExists(_)) => {
            anyhow::bail!(
                "An account for {} already exists. Use 'sightsound account login --email {}'",
                email,
                email
            );
        }
        Err(e) => return Err(e.into()),
    };

    profiles.set_active(&profile.user_id).await?;

    eprintln!("✅ Account created and signed in");
    eprintln!("   Name: {}", profile.display_name());
    eprintln!("   Email: {}", profile.email);
    eprintln!("   User ID: {}", profile.user_id);

    Ok(())
}

/// Execute the `account login` command
pub async fn execute_login(email: &str) -> Result<()> {
    let profiles = open_profiles()?;

    let profile = profiles.find_by_email(email).await?.with_context(|| {
        format!(
            "No account for {}. Run 'sightsound account signup --email {} --name <name>'",
            email, email
        )
    })?;

    profiles.set_active(&profile.user_id).await?;

    eprintln!("✅ Signed in as {}", profile.display_name());

    Ok(())
}

/// Execute the `account logout` command
pub async fn execute_logout() -> Result<()> {
    let profiles = open_profiles()?;
    profiles.clear_active().await?;

    eprintln!("✅ Signed out");

    Ok(())
}

/// Execute the `account whoami` command
pub async fn execute_whoami() -> Result<()> {
    let profiles = open_profiles()?;

    match profiles.active().await? {
        Some(profile) => {
            println!("╔═══════════════════════════════════════════════════════════════╗");
            println!("  Name: {}", profile.display_name());
            println!("  Email: {}", profile.email);
            println!("  User ID: {}", profile.user_id);
            println!("  Member since: {}", profile.created_at.format("%Y-%m-%d"));
            println!("╚═══════════════════════════════════════════════════════════════╝");
        }
        None => println!("Not signed in"),
    }

    Ok(())
}

/// Execute the `prefs show` command
pub async fn execute_prefs_show() -> Result<()> {
    let profiles = open_profiles()?;
    let profile = active_profile(&profiles).await?;

    println!("Preferences for {}:", profile.display_name());
    println!("  Voice: {}", profile.preferences.voice);
    println!("  Theme: {}", profile.preferences.theme);

    Ok(())
}

/// Execute the `prefs set` command
pub async fn execute_prefs_set(voice: Option<Voice>, theme: Option<Theme>) -> Result<()> {
    if voice.is_none() && theme.is_none() {
        anyhow::bail!("Nothing to change. Pass --voice and/or --theme");
    }

    let profiles = open_profiles()?;
    let profile = active_profile(&profiles).await?;

    let update = PreferenceUpdate { theme, voice };
    let preferences = profiles.update_preferences(&profile.user_id, update).await?;

    eprintln!("✅ Preferences updated");
    eprintln!("   Voice: {}", preferences.voice);
    eprintln!("   Theme: {}", preferences.theme);

    Ok(())
}
