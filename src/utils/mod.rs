//! Shared utility functions.

pub mod mime;

pub use mime::{detect_media_type, extension_for, is_supported_media_type};
