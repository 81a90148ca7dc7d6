//! Concurrency utilities for the copy pipeline's streaming stages.
//!
//! Both adapters here own their timers, so cancellation is structural: when a
//! stage is dropped (clean end or abandoned after a fatal error), its timers
//! go with it and nothing keeps ticking in the background.

pub mod rate_limit;
pub mod stream;
