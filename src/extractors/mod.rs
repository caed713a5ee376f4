//! Request extractors.

mod trace;

pub use trace::TraceId;
