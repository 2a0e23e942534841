// SPDX-License-Identifier: GPL-3.0-only

//! Error types for frame feeds, capture backends and the account store
//!
//! Operational failures inside a running feed (unreadable files, sources that
//! refuse to open) are reported through the handlers' `failed` signal. The
//! types here cover what is returned directly to the caller: contract
//! violations, backend failures and CLI-level errors.

use std::fmt;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error for the command line front-end
#[derive(Debug)]
pub enum AppError {
    /// Handler contract violation
    Handler(HandlerError),
    /// Capture backend errors
    Capture(CaptureError),
    /// Frame decoding or encoding errors
    Frame(FrameError),
    /// Configuration errors
    Config(ConfigError),
    /// Account store errors
    Account(AccountError),
    /// Generic error with message
    Other(String),
}

/// Errors returned directly by `MediaHandler` and `ImageHandler`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The transform to remove was never added
    NotFound,
    /// Frame rate must be a positive integer
    InvalidFrameRate(u32),
    /// No source is open, so there is nothing to describe
    NoSourceOpen,
}

/// Errors raised by capture backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The source could not be opened
    OpenFailed(String),
    /// The backend reported an error after opening
    Backend(String),
    /// No backend able to handle the request was compiled in
    Unsupported(String),
}

/// Errors produced while turning bytes on disk into frames (and back)
#[derive(Debug)]
pub enum FrameError {
    /// The file could not be read
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The bytes are not a decodable image
    Decode(String),
    /// The frame could not be encoded or written
    Encode(String),
    /// Buffer length does not match the declared geometry
    InvalidLayout {
        expected: usize,
        actual: usize,
    },
}

/// Error raised by a transform in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    message: String,
}

/// Configuration file errors
#[derive(Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed
    Io(std::io::Error),
    /// The file is not valid configuration JSON
    Parse(serde_json::Error),
    /// No configuration directory could be determined for this platform
    NoConfigDir,
}

/// Avatar validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarError {
    /// The avatar path does not point at a file
    Missing,
    /// The file exists but is not a readable image
    NotAnImage,
}

/// Account store errors
#[derive(Debug)]
pub enum AccountError {
    /// The username is already registered
    UserExists,
    /// No user with that name
    UserNotFound,
    /// Password shorter than the minimum length
    PasswordTooShort,
    /// Credentials do not match
    WrongPassword,
    /// Avatar file is not usable
    InvalidAvatar(AvatarError),
    /// Underlying SQLite failure
    Database(rusqlite::Error),
}

/// Detector contract errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// The model could not be loaded
    ModelLoad(String),
    /// An operation was called before `load_model`
    ModelNotLoaded,
    /// Pre-processing, inference or post-processing failed
    Inference(String),
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Handler(e) => write!(f, "Handler error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Frame(e) => write!(f, "Frame error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Account(e) => write!(f, "Account error: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::NotFound => write!(f, "Transform not found in chain"),
            HandlerError::InvalidFrameRate(fps) => {
                write!(f, "Invalid frame rate {}: must be a positive integer", fps)
            }
            HandlerError::NoSourceOpen => write!(f, "No media device is opened yet"),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::OpenFailed(msg) => write!(f, "Failed to open source: {}", msg),
            CaptureError::Backend(msg) => write!(f, "Backend error: {}", msg),
            CaptureError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            FrameError::Decode(msg) => write!(f, "Decode failed: {}", msg),
            FrameError::Encode(msg) => write!(f, "Encode failed: {}", msg),
            FrameError::InvalidLayout { expected, actual } => write!(
                f,
                "Invalid frame layout: expected {} bytes, got {}",
                expected, actual
            ),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Invalid configuration: {}", e),
            ConfigError::NoConfigDir => write!(f, "No configuration directory available"),
        }
    }
}

impl fmt::Display for AvatarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvatarError::Missing => write!(f, "Avatar file does not exist"),
            AvatarError::NotAnImage => write!(f, "Avatar file is not a valid image"),
        }
    }
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountError::UserExists => write!(f, "Username already exists"),
            AccountError::UserNotFound => write!(f, "User does not exist"),
            AccountError::PasswordTooShort => write!(f, "Password is too short"),
            AccountError::WrongPassword => write!(f, "Incorrect password"),
            AccountError::InvalidAvatar(e) => write!(f, "Invalid avatar: {}", e),
            AccountError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::ModelLoad(msg) => write!(f, "Failed to load model: {}", msg),
            DetectorError::ModelNotLoaded => write!(f, "Model has not been loaded"),
            DetectorError::Inference(msg) => write!(f, "Inference failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Handler(e) => Some(e),
            AppError::Capture(e) => Some(e),
            AppError::Frame(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Account(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

impl std::error::Error for HandlerError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for TransformError {}
impl std::error::Error for AvatarError {}
impl std::error::Error for DetectorError {}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::NoConfigDir => None,
        }
    }
}

impl std::error::Error for AccountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccountError::InvalidAvatar(e) => Some(e),
            AccountError::Database(e) => Some(e),
            _ => None,
        }
    }
}

// Conversion implementations

impl From<HandlerError> for AppError {
    fn from(e: HandlerError) -> Self {
        AppError::Handler(e)
    }
}

impl From<CaptureError> for AppError {
    fn from(e: CaptureError) -> Self {
        AppError::Capture(e)
    }
}

impl From<FrameError> for AppError {
    fn from(e: FrameError) -> Self {
        AppError::Frame(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        AppError::Account(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<rusqlite::Error> for AccountError {
    fn from(e: rusqlite::Error) -> Self {
        AccountError::Database(e)
    }
}

impl From<AvatarError> for AccountError {
    fn from(e: AvatarError) -> Self {
        AccountError::InvalidAvatar(e)
    }
}

impl From<image::ImageError> for FrameError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Encoding(_) => FrameError::Encode(e.to_string()),
            _ => FrameError::Decode(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_messages() {
        assert_eq!(
            HandlerError::NoSourceOpen.to_string(),
            "No media device is opened yet"
        );
        assert!(HandlerError::InvalidFrameRate(0).to_string().contains('0'));
    }

    #[test]
    fn test_app_error_wraps_source() {
        use std::error::Error;

        let err: AppError = HandlerError::NotFound.into();
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Handler error"));
    }

    #[test]
    fn test_frame_io_error_mentions_path() {
        let err = FrameError::Io {
            path: PathBuf::from("/tmp/missing.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/tmp/missing.png"));
    }
}
