//! 工法カタログ（データセット）モジュール
//!
//! CSVから全行を読み込み、属性ごとの語彙（分割・正規化済みの値一覧）を構築する。
//! 読み込み後は不変で、全会話から共有される。

use crate::error::{Error, Result};
use crate::normalize::{normalize, split_cell};
use crate::types::{Attribute, CatalogRecord, DEPTH_COLUMN, WORK_ID_COLUMN};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// 属性ごとの語彙
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    labels: BTreeMap<Attribute, Vec<String>>,
}

impl Vocabulary {
    pub fn build(records: &[CatalogRecord]) -> Self {
        let mut sets: BTreeMap<Attribute, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            for attribute in Attribute::ALL {
                let set = sets.entry(attribute).or_default();
                set.extend(split_cell(record.get(attribute)));
            }
        }
        Self {
            labels: sets
                .into_iter()
                .map(|(a, set)| (a, set.into_iter().collect()))
                .collect(),
        }
    }

    /// 属性の語彙（ソート済み）
    pub fn labels(&self, attribute: Attribute) -> &[String] {
        self.labels
            .get(&attribute)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    pub fn contains(&self, attribute: Attribute, label: &str) -> bool {
        let label = normalize(label);
        self.labels(attribute).iter().any(|l| *l == label)
    }

    /// 既存ラベルへ寄せる（完全一致 → 包含関係で最長のもの → そのまま）
    pub fn canonicalize(&self, attribute: Attribute, label: &str) -> String {
        let label = normalize(label);
        let labels = self.labels(attribute);
        if labels.contains(&label) {
            return label;
        }
        labels
            .iter()
            .filter(|l| l.contains(label.as_str()) || label.contains(l.as_str()))
            .max_by_key(|l| l.chars().count())
            .cloned()
            .unwrap_or(label)
    }
}

/// データセット全体
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    vocabulary: Vocabulary,
}

impl Catalog {
    /// 必須列
    pub fn required_columns() -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = Attribute::ALL.iter().map(|a| a.column()).collect();
        columns.push(DEPTH_COLUMN);
        columns
    }

    pub fn from_records(records: Vec<CatalogRecord>) -> Self {
        let vocabulary = Vocabulary::build(&records);
        Self { records, vocabulary }
    }

    /// CSVファイルから読み込み
    pub fn from_csv(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_csv_str(&content)?;
        tracing::info!(path = %path.display(), rows = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// CSV文字列から読み込み（1行目はヘッダー）
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let content = content.trim_start_matches('\u{feff}');
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());

        let header: Vec<String> = match lines.next() {
            Some(line) => parse_csv_line(line),
            None => return Err(Error::Schema(to_owned(&Self::required_columns()))),
        };
        let index: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let missing: Vec<String> = Self::required_columns()
            .into_iter()
            .filter(|c| !index.contains_key(c))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Schema(missing));
        }

        let mut records = Vec::new();
        for line in lines {
            let fields = parse_csv_line(line);
            let cell = |column: &str| -> String {
                index
                    .get(column)
                    .and_then(|&i| fields.get(i))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            };

            records.push(CatalogRecord {
                work_id: cell(WORK_ID_COLUMN),
                task_name: cell(Attribute::TaskName.column()),
                substrate: cell(Attribute::Substrate.column()),
                depth: cell(DEPTH_COLUMN),
                stage: cell(Attribute::Stage.column()),
                machine_category: cell(Attribute::MachineCategory.column()),
                device_model: cell(Attribute::DeviceModel.column()),
                cutter_name: cell(Attribute::CutterName.column()),
                efficiency: cell(Attribute::Efficiency.column()),
            });
        }

        Ok(Self::from_records(records))
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn to_owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// CSV行をパース（ダブルクォート対応、`""` はクォート内の `"`）
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());

    fields
}
