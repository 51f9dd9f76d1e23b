//! The configuration consumer

use conflux_core::{ConfigResolver, ResolveError};
use std::sync::Arc;

/// Key the greeting is built from
pub const NAME_KEY: &str = "Name";

/// Greets whoever the configuration names
///
/// The greeter only knows the resolver contract, never which source sits
/// behind it.
#[derive(Debug, Clone)]
pub struct Greeter {
    resolver: Arc<dyn ConfigResolver>,
}

impl Greeter {
    /// Create a greeter reading from `resolver`
    #[must_use]
    pub fn new(resolver: Arc<dyn ConfigResolver>) -> Self {
        Self { resolver }
    }

    /// Build `Hello, {Name}!`.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's error unchanged.
    pub async fn greet(&self) -> Result<String, ResolveError> {
        let name = self.resolver.get_async(NAME_KEY).await?;
        Ok(format!("Hello, {name}!"))
    }
}
