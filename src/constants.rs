// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Feed timing
pub mod timing {
    /// Frame rate used when none is configured
    pub const DEFAULT_FPS: u32 = 30;

    /// Timer intervals are whole milliseconds: `MILLIS_PER_SECOND / fps`
    pub const MILLIS_PER_SECOND: u32 = 1000;
}

/// Capture backend timeouts
pub mod capture {
    use super::Duration;

    /// How long opening a source may take before it counts as a failure
    pub const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

    /// A read that produces nothing within this bound is treated as end of stream
    pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

    /// Bus polling step while waiting for a pipeline to preroll
    pub const BUS_POLL_INTERVAL: Duration = Duration::from_millis(100);
}

/// File format helpers
pub mod file_formats {
    /// Bytes read from the head of a file to sniff its image signature
    pub const SIGNATURE_LEN: usize = 32;

    /// Extensions the CLI writes processed frames with
    pub const OUTPUT_EXTENSION: &str = "png";

    /// Supported video container extensions
    pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov"];

    /// Check if a file extension is a supported video container
    pub fn is_video_extension(ext: &str) -> bool {
        VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Account store rules
pub mod accounts {
    /// Minimum accepted password length in characters
    pub const MIN_PASSWORD_LEN: usize = 6;
}

/// Detector defaults
pub mod detector {
    /// Square input size fed to detection models
    pub const DEFAULT_IMAGE_SIZE: u32 = 640;
}
