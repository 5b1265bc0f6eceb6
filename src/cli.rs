use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cinestub")]
#[command(about = "电影票根生成器（海报智能填充・预览・导出）", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// 票根の組み立て入力（render/export 共通）
#[derive(Args, Debug, Clone, Default)]
pub struct TicketInput {
    /// 票根JSONファイル（省略時はデフォルトの票根）
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// テンプレートID
    #[arg(short, long)]
    pub template: Option<String>,

    /// ポスター画像ファイル
    #[arg(short, long)]
    pub poster: Option<PathBuf>,

    /// ポスターを外す
    #[arg(long, conflicts_with = "poster")]
    pub no_poster: bool,

    /// 項目を上書き（key=value、複数指定可）
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// プレビューをSVGで出力
    Render {
        #[command(flatten)]
        input: TicketInput,

        /// 出力SVGファイル（デフォルト: ticket.svg）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 表示倍率
        #[arg(long, default_value = "0.85")]
        scale: f32,
    },

    /// PNG画像を生成
    Export {
        #[command(flatten)]
        input: TicketInput,

        /// 出力PNGファイル（デフォルト: ticket-YYYYMMDD-HHMMSS.png）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 倍率（省略時は設定値）
        #[arg(long)]
        scale: Option<f32>,

        /// 背景色（#rrggbb、省略時は透過）
        #[arg(long)]
        background: Option<String>,

        /// リモート画像を取得しない
        #[arg(long)]
        no_cors: bool,

        /// リモート画像の取得失敗をエラーにする
        #[arg(long)]
        no_taint: bool,
    },

    /// ポスターを解析して票根を自動入力
    Fill {
        /// ポスター画像ファイル
        #[arg(required = true)]
        poster: PathBuf,

        /// ベースにする票根JSONファイル
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// 解析中に項目を編集（key=value、複数指定可）
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// 出力JSONファイル（デフォルト: ticket.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 解析中に編集した項目を残す
        #[arg(long)]
        preserve_edits: bool,
    },

    /// 票根JSONを対話式で編集
    Edit {
        /// 票根JSONファイル（存在しなければデフォルトから作成）
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// テンプレート一覧
    Templates,

    /// 設定を管理
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// `key=value` を分解
pub fn parse_assignment(raw: &str) -> Option<(&str, &str)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("title=流浪地球"), Some(("title", "流浪地球")));
        assert_eq!(parse_assignment("price=¥=55"), Some(("price", "¥=55")));
        assert_eq!(parse_assignment("seat="), Some(("seat", "")));
        assert_eq!(parse_assignment("=x"), None);
        assert_eq!(parse_assignment("title"), None);
    }

    #[test]
    fn test_parse_export_flags() {
        let cli = Cli::parse_from([
            "cinestub", "export", "--template", "gold", "--set", "title=X", "--no-cors", "--scale", "2",
        ]);
        match cli.command {
            Commands::Export { input, scale, no_cors, no_taint, .. } => {
                assert_eq!(input.template.as_deref(), Some("gold"));
                assert_eq!(input.set, vec!["title=X".to_string()]);
                assert_eq!(scale, Some(2.0));
                assert!(no_cors);
                assert!(!no_taint);
            }
            _ => panic!("export が解析されない"),
        }
    }

    #[test]
    fn test_parse_fill_flags() {
        let cli = Cli::parse_from(["cinestub", "-v", "fill", "poster.jpg", "--preserve-edits"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Fill { poster, preserve_edits, .. } => {
                assert_eq!(poster, PathBuf::from("poster.jpg"));
                assert!(preserve_edits);
            }
            _ => panic!("fill が解析されない"),
        }
    }
}
