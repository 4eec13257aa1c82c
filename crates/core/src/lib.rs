//! Configuration resolution engine for layered Earth-system-model
//! simulation setups.
//!
//! Partial YAML trees (machine, model, setup, user) are combined by
//! priority and resolved to a single consistent tree: `choose_` blocks
//! branch on configuration values with dependency ordering and cycle
//! detection, `${...}` variables interpolate chapter-relative, `$((...))`
//! evaluates calendar-aware date arithmetic, `[[list-->X]]` fences fan
//! out over sequences, and `add_`/`remove_` directives patch chapters.
//!
//! [`engine::Resolver`] drives the whole pipeline; the other modules are
//! usable on their own.

pub mod addremove;
pub mod calendar;
pub mod choose;
pub mod dates;
pub mod engine;
pub mod error;
pub mod interpolate;
pub mod loader;
pub mod merge;
pub mod multikey;
pub mod value;
pub mod walker;

pub use engine::{EngineConfig, Resolver};
pub use error::ConfigError;
pub use value::{Map, Value};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
