//! 工法カタログ対話検索ツール
//!
//! 検索の中身は `koho_finder_common` にあり、ここは設定・会話状態・表示・CLI の外殻。

pub mod cli;
pub mod config;
pub mod dialog;
pub mod error;
pub mod render;
pub mod session;

pub use koho_finder_common as core;
