//! Shared constants for the Flowpad editor

/// Default backend base URL when FLOWPAD_BACKEND is not set
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "FLOWPAD_BACKEND";

/// Decimal places shown by the numeric editor (stored precision is untouched)
pub const NUMERIC_DISPLAY_PRECISION: usize = 3;

/// Autosave interval in seconds
pub const AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Socket read timeout used to interleave reads and writes on the
/// execution channel thread
pub const CHANNEL_POLL_MILLIS: u64 = 50;

/// Default canvas node size
pub const NODE_WIDTH: f32 = 180.0;
pub const NODE_HEADER_HEIGHT: f32 = 26.0;
pub const NODE_ROW_HEIGHT: f32 = 18.0;

/// Port hit-test radius on the canvas
pub const PORT_RADIUS: f32 = 5.0;
