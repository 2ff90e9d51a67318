//! 적응형 캐시.

pub mod adaptive;

pub use adaptive::{AdaptiveCache, CacheStats};
