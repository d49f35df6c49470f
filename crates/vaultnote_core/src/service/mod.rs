//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record-store, codec and gateway calls into use-case APIs.
//! - Keep UI collaborators decoupled from storage and wire details.

pub mod note_service;
pub mod settings_service;
pub mod transfer;
