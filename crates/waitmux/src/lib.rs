//! waitmux
//!
//! The kernel caps one call to the multi-object wait at 64 handles, which in
//! turn caps worker pools built on top of it near 60 workers. This crate
//! installs a chunked wait with the same contract over arbitrarily many
//! handles and lifts the pool ceiling accordingly. Call
//! [`install::activate`] once, then wait through [`wait`].

#[cfg(test)]
mod tests;

#[cfg(windows)]
pub mod event;
pub mod install;
pub mod native;
pub mod wait;

/// Crate version as a semver string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
