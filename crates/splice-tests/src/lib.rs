//! Integration test crate for Splice.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives splice-timeline through its public API on top of splice-core.

#[cfg(test)]
mod support;

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod history;

#[cfg(test)]
mod session;

#[cfg(test)]
mod properties;
