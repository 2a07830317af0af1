//! Combat log flavor and the external narrator service

pub mod formatter;
pub mod narrator;

pub use narrator::{fallback_summary, summarize_or_fallback, NarratorClient};
