//! CineStub Common Library
//!
//! CLIと各フロントエンドで共有される票根の型・マージ規則・プレビュー描画

pub mod types;
pub mod template;
pub mod color;
pub mod merge;
pub mod preview;
pub mod error;
pub mod parser;
pub mod prompts;

pub use types::{ExtractionResult, MergeRule, TicketData, TicketField, FALLBACK_TITLE};
pub use template::{default_template, find_template, resolve_template, Template, TEMPLATES};
pub use merge::{changed_fields, merge_extraction, merge_extraction_filtered};
pub use preview::{render_preview, CaptureTarget, TicketComposition};
pub use error::{Error, Result};
pub use parser::{extract_json, parse_extraction_response};
pub use prompts::{build_poster_prompt, extraction_response_schema};
