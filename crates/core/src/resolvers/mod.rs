//! Built-in resolver implementations
//!
//! - [`SettingsResolver`] - Layered settings files ([`SettingsStore`](crate::SettingsStore))
//! - [`EnvResolver`] - Environment variables at a chosen [`EnvScope`]
//! - [`MapResolver`] - In-memory key/value mapping
//!
//! The remote vault adapter is available via the `conflux-vault` crate.

mod env;
mod map;
mod settings;

pub use env::{EnvResolver, EnvScope};
pub use map::MapResolver;
pub use settings::SettingsResolver;
