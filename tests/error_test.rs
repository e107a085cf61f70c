//! エラーケーステスト
//!
//! 読み込み失敗や設定不備でのエラーハンドリングを検証

use koho_finder::config::Config;
use koho_finder::core::{AliasTable, Catalog, Error, Finder, FinderSettings, Vocabulary};
use koho_finder::error::FinderError;
use std::path::Path;
use tempfile::tempdir;

/// 存在しないデータセット
#[test]
fn test_load_nonexistent_dataset() {
    let result = Finder::load(
        Path::new("/nonexistent/path/12345.csv"),
        None,
        FinderSettings::default(),
    );
    let err: FinderError = result.unwrap_err().into();
    assert!(matches!(err, FinderError::Core(Error::Io(_))));
}

/// 必須列が欠けたCSV
#[test]
fn test_missing_columns_is_schema_error() {
    let csv = "作業名,下地の状況,工程数\n表面ハツリ,コンクリート,単一\n";
    match Catalog::from_csv_str(csv) {
        Err(Error::Schema(missing)) => {
            assert!(missing.contains(&"処理する深さ・厚さ".to_string()));
            assert!(missing.contains(&"作業効率評価".to_string()));
            assert!(!missing.contains(&"作業名".to_string()));
        }
        other => panic!("expected schema error, got {:?}", other.map(|c| c.len())),
    }
}

/// 空のCSVも列不足として扱う
#[test]
fn test_empty_csv_is_schema_error() {
    assert!(matches!(Catalog::from_csv_str(""), Err(Error::Schema(_))));
}

/// 壊れた同義語ファイルは組み込み辞書で続行
#[test]
fn test_broken_synonyms_fall_back_to_builtin() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("synonyms.json");
    std::fs::write(&path, "{ broken").unwrap();

    let table = AliasTable::load(Some(&path), &Vocabulary::default());
    assert!(!table.aliases(koho_finder::core::Attribute::TaskName, "雨打たれ処理").is_empty());
}

/// 壊れた設定ファイル
#[test]
fn test_broken_config_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, FinderError::JsonParse(_)));
}

/// FinderErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        FinderError::Config("テスト設定エラー".to_string()),
        FinderError::DatasetNotFound("data.csv".to_string()),
        FinderError::CliExecution("入力エラー".to_string()),
        FinderError::Core(Error::Schema(vec!["作業名".to_string()])),
    ];

    for err in errors {
        let msg = format!("{}", err);
        assert!(!msg.is_empty());
    }

    let err = FinderError::DatasetNotFound("data.csv".to_string());
    assert!(err.to_string().contains("--set-dataset"));
}
