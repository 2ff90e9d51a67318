//! 도메인 타입 정의.

pub mod kind;
pub mod market;
pub mod payload;

pub use kind::DataKind;
pub use market::{board_category, exchange_name, Market};
pub use payload::{BasicInfo, NewsItem, OhlcvBar, Payload, PayloadFormat};
