//! Command-line client for Google's Imagen and Gemini image-generation APIs
//!
//! Sends one generation request, decodes returned base64 images to disk with
//! deterministic names, and persists masked request/response JSON alongside
//! them for debugging.

pub mod ai;
pub mod app;
pub mod artifact;
pub mod error;
pub mod image;
pub mod json_path;
pub mod masking;
pub mod models;
pub mod normalize;
pub mod preferences;

pub use error::{Error, Result};
