use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "koho-finder")]
#[command(about = "工法カタログ対話検索ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// データセットCSV（設定・環境変数より優先）
    #[arg(long, global = true)]
    pub dataset: Option<PathBuf>,

    /// 同義語ファイル（JSON/YAML）
    #[arg(long, global = true)]
    pub synonyms: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 自由文から抽出した条件を表示
    Extract {
        /// 検索文
        #[arg(required = true)]
        text: String,
    },

    /// 1回だけ検索して結果を表示
    Search {
        /// 検索文
        #[arg(required = true)]
        text: String,

        /// 確認への回答（複数回指定で順に適用）
        #[arg(short, long)]
        answer: Vec<String>,
    },

    /// 対話モード
    Chat,

    /// 設定管理
    Config {
        /// データセットのパスを設定
        #[arg(long)]
        set_dataset: Option<PathBuf>,

        /// 同義語ファイルのパスを設定
        #[arg(long)]
        set_synonyms: Option<PathBuf>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_answers() {
        let cli = Cli::try_parse_from([
            "koho-finder",
            "--dataset",
            "data.csv",
            "search",
            "エポキシ",
            "--answer",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.dataset, Some(PathBuf::from("data.csv")));
        match cli.command {
            Commands::Search { text, answer } => {
                assert_eq!(text, "エポキシ");
                assert_eq!(answer, vec!["2"]);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_parse_config() {
        let cli = Cli::try_parse_from(["koho-finder", "-v", "config", "--show"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Config { show: true, .. }));
    }
}
