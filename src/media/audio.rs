//! Synthesized narration clips and audio playback.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::Voice;

use super::frame::{decode_data_uri, encode_data_uri};

/// A synthesized narration: WAV audio as a data URI plus the voice used.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// `data:audio/wav;base64,...`
    pub audio_url: String,

    /// Voice the clip was synthesized with
    pub voice: Voice,
}

impl AudioClip {
    pub fn new(audio_url: impl Into<String>, voice: Voice) -> Self {
        Self {
            audio_url: audio_url.into(),
            voice,
        }
    }

    /// Build a clip from raw WAV bytes.
    pub fn from_wav(wav: &[u8], voice: Voice) -> Self {
        Self {
            audio_url: encode_data_uri("audio/wav", wav),
            voice,
        }
    }

    /// Decode the data URI back into WAV bytes.
    pub fn wav_bytes(&self) -> Result<Vec<u8>> {
        let (_, bytes) = decode_data_uri(&self.audio_url)?;
        Ok(bytes)
    }
}

/// Wrap raw 16-bit little-endian mono PCM in a WAV container.
///
/// Speech endpoints return bare PCM; players want a proper RIFF header.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for sample in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .context("Failed to write WAV sample")?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}

/// Playback surface for finished narrations.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Human-readable player name
    fn name(&self) -> &str;

    /// Play a clip to completion.
    async fn play(&self, clip: &AudioClip) -> Result<()>;
}

/// Player that shells out to a system audio command.
pub struct CommandPlayer {
    binary: String,
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandPlayer {
    /// Create a player using the first available system binary.
    ///
    /// Tries afplay (macOS), then aplay (ALSA), then ffplay.
    pub fn new() -> Self {
        let binary = ["afplay", "aplay", "ffplay"]
            .iter()
            .find(|bin| {
                std::process::Command::new(bin)
                    .arg("--version")
                    .output()
                    .is_ok()
            })
            .unwrap_or(&"aplay")
            .to_string();

        Self { binary }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn play_args(&self, path: &Path) -> Vec<String> {
        let path = path.display().to_string();
        match self.binary.rsplit('/').next().unwrap_or(&self.binary) {
            "ffplay" => vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                path,
            ],
            "aplay" => vec!["-q".to_string(), path],
            _ => vec![path],
        }
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    fn name(&self) -> &str {
        "command"
    }

    async fn play(&self, clip: &AudioClip) -> Result<()> {
        let wav = clip.wav_bytes()?;

        let temp = tempfile::tempdir().context("Failed to create temp dir for playback")?;
        let path = temp.path().join("narration.wav");
        tokio::fs::write(&path, &wav)
            .await
            .context("Failed to write narration to temp file")?;

        let output = Command::new(&self.binary)
            .args(self.play_args(&path))
            .output()
            .await
            .with_context(|| format!("Failed to spawn audio player '{}'", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Audio player '{}' failed with exit code {}: {}",
                self.binary,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_to_wav_header() {
        // 100 samples of silence at 24 kHz
        let pcm = vec![0u8; 200];
        let wav = pcm_to_wav(&pcm, 24_000).unwrap();

        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header plus the PCM payload
        assert_eq!(wav.len(), 44 + 200);
    }

    #[test]
    fn test_clip_round_trip() {
        let wav = pcm_to_wav(&[0u8; 32], 24_000).unwrap();
        let clip = AudioClip::from_wav(&wav, Voice::Male);

        assert!(clip.audio_url.starts_with("data:audio/wav;base64,"));
        assert_eq!(clip.wav_bytes().unwrap(), wav);
        assert_eq!(clip.voice, Voice::Male);
    }

    #[test]
    fn test_play_args_per_binary() {
        let ffplay = CommandPlayer::with_binary("/usr/bin/ffplay");
        let args = ffplay.play_args(Path::new("/tmp/a.wav"));
        assert_eq!(args[0], "-nodisp");
        assert_eq!(args.last().map(String::as_str), Some("/tmp/a.wav"));

        let aplay = CommandPlayer::with_binary("aplay");
        assert_eq!(aplay.play_args(Path::new("/tmp/a.wav")), vec!["-q", "/tmp/a.wav"]);

        let afplay = CommandPlayer::with_binary("afplay");
        assert_eq!(afplay.play_args(Path::new("/tmp/a.wav")), vec!["/tmp/a.wav"]);
    }
}
