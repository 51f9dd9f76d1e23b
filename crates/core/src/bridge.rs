//! Driving asynchronous lookups from synchronous callers
//!
//! Resolvers whose backing source is natively async implement the
//! synchronous [`ConfigResolver::lookup`](crate::ConfigResolver::lookup) by
//! handing their async path to [`block_on`].

use crate::ResolveError;
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

/// Runtime used when a synchronous lookup happens outside any tokio runtime.
///
/// Lives for the whole process so connection pools created on it stay valid
/// between lookups.
static BRIDGE_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Prefix of failures caused by where the lookup was called from rather than
/// by the source itself.
pub const CALLER_CONTEXT: &str = "caller context";

/// Run `future` to completion from synchronous code.
///
/// - Inside a multi-thread runtime the current worker is moved off the
///   scheduler with `block_in_place` while the future runs.
/// - Outside any runtime a shared background runtime drives the future.
/// - Inside a current-thread runtime blocking would deadlock, so this fails.
///
/// # Errors
///
/// Returns [`ResolveError::SourceUnavailable`] for `provider` when called on a
/// current-thread runtime or when the background runtime cannot be started.
pub fn block_on<F: Future>(provider: &'static str, future: F) -> Result<F::Output, ResolveError> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(|| handle.block_on(future)))
            }
            _ => Err(ResolveError::unavailable(
                provider,
                format!(
                    "{CALLER_CONTEXT}: synchronous lookup would block a current-thread runtime; \
                     use the async lookup"
                ),
            )),
        },
        Err(_) => Ok(bridge_runtime(provider)?.block_on(future)),
    }
}

fn bridge_runtime(provider: &'static str) -> Result<&'static Runtime, ResolveError> {
    if let Some(runtime) = BRIDGE_RUNTIME.get() {
        return Ok(runtime);
    }

    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("conflux-bridge")
        .enable_all()
        .build()
        .map_err(|e| {
            ResolveError::unavailable(provider, format!("Failed to start lookup runtime: {e}"))
        })?;
    tracing::trace!("Started background runtime for synchronous lookups");

    Ok(BRIDGE_RUNTIME.get_or_init(|| runtime))
}
