//! Camera stream lifecycle and frame grabbing.
//!
//! The [`Camera`] owns at most one live stream at a time. Frame grabbing is
//! delegated to a [`CaptureBackend`]; the shipped backend shells out to an
//! ffmpeg-style grabber command, reading one JPEG frame per capture.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::frame::Frame;

/// Which physical camera is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front-facing camera
    User,

    /// Rear camera
    Environment,
}

impl FacingMode {
    pub fn flipped(&self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

/// Errors from camera acquisition and capture
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera device not found: {0}")]
    DeviceNotFound(String),

    #[error("No active camera stream")]
    NoStream,

    #[error("Frame grab failed: {0}")]
    Grab(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// OS-facing frame grabber.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Verify the device can be opened for capture.
    async fn open(&self, device: &str) -> Result<(), CameraError>;

    /// Grab one still frame from the device as JPEG bytes.
    async fn grab(&self, device: &str) -> Result<Vec<u8>, CameraError>;
}

/// Handle for a live stream. Dropping it releases the stream.
#[derive(Debug)]
pub struct ActiveStream {
    device: String,
    facing: FacingMode,
}

impl ActiveStream {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        debug!(device = %self.device, "Released camera stream");
    }
}

/// Owns the camera stream lifecycle.
///
/// Guarantee: at most one [`ActiveStream`] exists at any time; starting a new
/// stream always releases the prior one first.
pub struct Camera {
    backend: std::sync::Arc<dyn CaptureBackend>,
    user_device: String,
    environment_device: String,
    facing: FacingMode,
    stream: Option<ActiveStream>,
    permission_denied: bool,
}

impl Camera {
    pub fn new(
        backend: std::sync::Arc<dyn CaptureBackend>,
        user_device: impl Into<String>,
        environment_device: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            user_device: user_device.into(),
            environment_device: environment_device.into(),
            facing: FacingMode::User,
            stream: None,
            permission_denied: false,
        }
    }

    fn device_for(&self, facing: FacingMode) -> &str {
        match facing {
            FacingMode::User => &self.user_device,
            FacingMode::Environment => &self.environment_device,
        }
    }

    /// Request a stream with the given facing preference.
    ///
    /// Any prior stream is released first. Permission denial sets a sticky
    /// flag readable via [`Camera::permission_denied`].
    pub async fn start(&mut self, facing: FacingMode) -> Result<(), CameraError> {
        // Release before re-acquiring; only one stream may be live
        self.stream = None;
        self.facing = facing;

        let device = self.device_for(facing).to_string();
        match self.backend.open(&device).await {
            Ok(()) => {
                debug!(%device, %facing, "Camera stream started");
                self.permission_denied = false;
                self.stream = Some(ActiveStream { device, facing });
                Ok(())
            }
            Err(CameraError::PermissionDenied(detail)) => {
                self.permission_denied = true;
                Err(CameraError::PermissionDenied(detail))
            }
            Err(e) => Err(e),
        }
    }

    /// Release the current stream. Idempotent.
    pub fn stop(&mut self) {
        self.stream = None;
    }

    /// Flip front/back; re-acquires the stream only if one is live.
    pub async fn toggle_facing(&mut self) -> Result<(), CameraError> {
        let next = self.facing.flipped();
        if self.stream.is_some() {
            self.start(next).await
        } else {
            self.facing = next;
            Ok(())
        }
    }

    /// Grab one still frame from the live stream.
    ///
    /// Returns [`CameraError::NoStream`] when no stream is live; callers that
    /// want the silent no-op treat that variant specially.
    pub async fn capture_frame(&self) -> Result<Frame, CameraError> {
        let stream = self.stream.as_ref().ok_or(CameraError::NoStream)?;
        let jpeg = self.backend.grab(stream.device()).await?;
        Ok(Frame::new(jpeg, stream.facing()))
    }

    pub fn is_on(&self) -> bool {
        self.stream.is_some()
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn permission_denied(&self) -> bool {
        self.permission_denied
    }
}

/// Frame grabber backed by an external capture command.
///
/// Invokes `<binary> -f <input_format> -i <device> -frames:v 1` and reads the
/// frame back from a temporary file. Defaults target ffmpeg with v4l2 input;
/// both are configurable for other platforms.
pub struct CommandBackend {
    binary: String,
    input_format: String,
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBackend {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            input_format: "v4l2".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_input_format(mut self, input_format: impl Into<String>) -> Self {
        self.input_format = input_format.into();
        self
    }

    /// Map device-node access failures to typed camera errors.
    fn check_device(&self, device: &str) -> Result<(), CameraError> {
        // Non-path device specs (avfoundation indices etc.) can't be probed
        if !device.starts_with('/') {
            return Ok(());
        }

        match std::fs::metadata(Path::new(device)) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(CameraError::PermissionDenied(device.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CameraError::DeviceNotFound(device.to_string()))
            }
            Err(e) => Err(CameraError::Io(e)),
        }
    }
}

#[async_trait]
impl CaptureBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn open(&self, device: &str) -> Result<(), CameraError> {
        self.check_device(device)
    }

    async fn grab(&self, device: &str) -> Result<Vec<u8>, CameraError> {
        self.check_device(device)?;

        let temp = tempfile::tempdir()?;
        let out_path = temp.path().join("frame.jpg");

        let output = Command::new(&self.binary)
            .args([
                "-loglevel",
                "error",
                "-f",
                &self.input_format,
                "-i",
                device,
                "-frames:v",
                "1",
                "-y",
            ])
            .arg(&out_path)
            .output()
            .await
            .map_err(|e| CameraError::Grab(format!("failed to spawn {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CameraError::Grab(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let jpeg = tokio::fs::read(&out_path).await?;
        if jpeg.is_empty() {
            return Err(CameraError::Grab("capture produced an empty frame".to_string()));
        }

        Ok(jpeg)
    }
}
