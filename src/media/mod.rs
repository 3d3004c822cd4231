//! Media acquisition and playback.
//!
//! Owns the camera stream lifecycle, in-memory frame and audio encodings,
//! and the playback surface for finished narrations.

pub mod audio;
pub mod camera;
pub mod frame;

pub use audio::{pcm_to_wav, AudioClip, AudioPlayer, CommandPlayer};
pub use camera::{ActiveStream, Camera, CameraError, CaptureBackend, CommandBackend, FacingMode};
pub use frame::{decode_data_uri, encode_data_uri, Frame};
