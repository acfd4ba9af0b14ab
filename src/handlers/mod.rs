//! Handler implementations for target systems
//!
//! 各ハンドラーは共通の `McpHandler` トレイトを実装し、プラガブルな
//! 設計となっている。現在は WordPress のみ。

pub mod wordpress;

pub use wordpress::*;
