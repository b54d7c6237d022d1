//! Ports - 抽象化レイヤー
//!
//! Step executor と launcher が依存する狭いインターフェース。
//! 実装は `impls` にある（CSV / ファイル / in-memory）。

pub mod clock;
pub mod id_generator;
pub mod item_sink;
pub mod item_source;
pub mod job_store;
pub mod processor;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::item_sink::ItemSink;
pub use self::item_source::{ItemReader, ItemSource};
pub use self::job_store::JobStore;
pub use self::processor::ItemProcessor;
