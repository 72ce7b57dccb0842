//! # Ensemble
//!
//! An in-process outfit bundle assembly engine. Given a user's wardrobe
//! (and optionally a global catalog), an occasion context, and a versioned
//! rule set, the engine assembles a coherent head-to-toe outfit by beam
//! search: hard constraints prune, weighted soft components rank, and
//! every comparator ends in item-id material so results are deterministic
//! under parallelism.
//!
//! The engine is category- and gender-agnostic: garment taxonomy lives in
//! item attributes validated against the [`registry`], never in code. It
//! consumes read models behind the [`index`] and [`providers`] seams and
//! exposes [`engine::Engine::generate`], [`engine::Engine::replace`], and
//! [`engine::Engine::explain`]. Persistence, HTTP routing, and event
//! projection belong to the host.

pub mod assembly;
pub mod color;
pub mod constraints;
pub mod engine;
pub mod errors;
pub mod events;
pub mod index;
pub mod items;
pub mod profile;
pub mod providers;
pub mod registry;
pub mod replace;
pub mod retrieval;
pub mod rules;
pub mod scoring;

pub use assembly::Bundle;
pub use engine::{BundleResult, Engine, EngineConfig, Explanation};
pub use errors::EngineError;
pub use events::EngineEvent;
pub use items::Item;
pub use profile::{Context, Profile};
pub use replace::AlternativesResult;
pub use rules::RuleSet;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
