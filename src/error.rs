use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("データセットが見つかりません: {0}。`koho-finder config --set-dataset PATH` で設定してください")]
    DatasetNotFound(String),

    #[error("検索エンジンエラー: {0}")]
    Core(#[from] koho_finder_common::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),
}

pub type Result<T> = std::result::Result<T, FinderError>;
