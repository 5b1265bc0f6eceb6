//! CineStub - 映画チケット半券ジェネレーター
//!
//! ポスターからの自動入力（Magic Fill）、プレビュー描画、PNG書き出しを提供する

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod interactive;
pub mod logging;
pub mod poster;

pub use cinestub_common as common;
