//! # Utility Modules
//!
//! Supporting pieces used by both connection flavours.
//!
//! ## Components
//! - **Compression**: the block compressor behind negative-length objects (LZ4, Zstd)
//! - **Trace**: per-connection diagnostic lines and payload sanitising
//! - **Metrics**: per-connection atomic counters
//! - **Logging**: `tracing-subscriber` setup from configuration

pub mod compression;
pub mod logging;
pub mod metrics;
pub mod trace;

pub use compression::{BlockCompressor, CompressionKind};
pub use metrics::{MetricsSnapshot, WireMetrics};
pub use trace::{TraceSink, Tracer, TracingSink};
