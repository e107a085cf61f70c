//! エイリアス解決モジュール
//!
//! 利用者の表記ゆれを属性ごとの正規値に変換する。
//! 組み込みの最小辞書と外部同義語ファイル（JSON/YAML）をマージして使う。
//!
//! 1つのエイリアスが複数属性にヒットした場合は、優先度が最も高い属性だけに割り当てる。
//! 同じ属性内で複数の正規値に対応する場合はすべて採用する。

use crate::catalog::Vocabulary;
use crate::error::{Error, Result};
use crate::normalize::{canon_key, normalize, split_cell, strip_trailing_particle, tokenize};
use crate::types::Attribute;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// 属性の優先順位（全順序）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePriority {
    order: Vec<Attribute>,
}

impl Default for AttributePriority {
    fn default() -> Self {
        Self {
            order: Attribute::ALL.to_vec(),
        }
    }
}

impl AttributePriority {
    /// 順序を指定して作成（漏れた属性は既定順で末尾に足す）
    pub fn new(order: &[Attribute]) -> Self {
        let mut seen = BTreeSet::new();
        let mut full: Vec<Attribute> = order.iter().copied().filter(|a| seen.insert(*a)).collect();
        full.extend(Attribute::ALL.into_iter().filter(|a| !seen.contains(a)));
        Self { order: full }
    }

    /// 小さいほど強い
    pub fn rank(&self, attribute: Attribute) -> usize {
        self.order
            .iter()
            .position(|a| *a == attribute)
            .unwrap_or(usize::MAX)
    }

    /// 候補のうち最も強い属性
    pub fn winner<I>(&self, attributes: I) -> Option<Attribute>
    where
        I: IntoIterator<Item = Attribute>,
    {
        attributes.into_iter().min_by_key(|a| self.rank(*a))
    }
}

/// 語彙による補完モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// 補完しない
    Off,
    /// トークンが語彙と完全一致する場合のみ
    #[default]
    Literal,
    /// 部分一致も許す（広がりが大きい）
    Partial,
}

/// 同義語ファイルの右辺（単一 or リスト）
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SynonymValue {
    One(String),
    Many(Vec<String>),
}

impl SynonymValue {
    fn words(&self) -> Vec<String> {
        match self {
            SynonymValue::One(s) => split_cell(s),
            SynonymValue::Many(list) => list
                .iter()
                .map(|w| normalize(w))
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }
}

/// 外部同義語ソース（列名 → {左辺 → 右辺}）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SynonymSource {
    columns: BTreeMap<String, BTreeMap<String, SynonymValue>>,
}

impl SynonymSource {
    /// 拡張子で JSON / YAML を判別して読み込み
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(Error::Config(format!(
                "同義語ファイルの拡張子に対応していません: {}",
                other.unwrap_or("(なし)")
            ))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let source: Option<Self> = serde_yaml::from_str(yaml)?;
        Ok(source.unwrap_or_default())
    }
}

/// 属性ごとの 正規値 → エイリアス一覧
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: BTreeMap<Attribute, BTreeMap<String, Vec<String>>>,
}

impl AliasTable {
    /// 組み込みの最小辞書
    pub fn builtin() -> Self {
        let mut table = Self::default();

        // 作業名
        table.insert_all(Attribute::TaskName, "雨打たれ処理", &["雨打たれ", "雨うたれ"]);
        table.insert_all(
            Attribute::TaskName,
            "表面目荒らし",
            &["目荒らし", "表面荒らし", "メ荒らし", "メアラシ"],
        );
        table.insert_all(Attribute::TaskName, "表面ハツリ", &["ハツリ", "はつり", "斫り"]);
        table.insert_all(
            Attribute::TaskName,
            "表面研ぎ出し",
            &["研ぎ出し", "研出し", "とぎ出し", "磨き"],
        );

        // 工程数
        table.insert_all(Attribute::Stage, "一次工程", &["一次", "1次"]);
        table.insert_all(Attribute::Stage, "二次工程", &["二次", "2次"]);
        table.insert_all(Attribute::Stage, "単一", &["単一工程"]);

        table
    }

    /// 組み込み辞書に外部ファイルをマージ（読み込み失敗時は組み込みのみ）
    pub fn load(path: Option<&Path>, vocabulary: &Vocabulary) -> Self {
        let mut table = Self::builtin();
        let Some(path) = path else {
            return table;
        };

        match SynonymSource::from_file(path) {
            Ok(source) => {
                table.merge_source(&source, vocabulary);
                tracing::info!(path = %path.display(), "synonyms loaded");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "synonym source unavailable, using built-in table");
            }
        }
        table
    }

    pub fn insert(&mut self, attribute: Attribute, canonical: &str, alias: &str) {
        let canonical = normalize(canonical);
        let alias = normalize(alias);
        if canonical.is_empty() {
            return;
        }
        let aliases = self
            .entries
            .entry(attribute)
            .or_default()
            .entry(canonical)
            .or_default();
        if !alias.is_empty() && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }

    fn insert_all(&mut self, attribute: Attribute, canonical: &str, aliases: &[&str]) {
        for alias in aliases {
            self.insert(attribute, canonical, alias);
        }
    }

    /// 外部ソースをマージ
    ///
    /// 左辺が語彙に存在すれば「正規 → [エイリアス]」、
    /// そうでなければ「エイリアス → [正規]」として解釈する。
    pub fn merge_source(&mut self, source: &SynonymSource, vocabulary: &Vocabulary) {
        for (column, mapping) in &source.columns {
            let Some(attribute) = Attribute::from_column(column) else {
                tracing::warn!(column = %column, "unknown column in synonym source");
                continue;
            };
            for (left, right) in mapping {
                let left = normalize(left);
                if left.is_empty() {
                    continue;
                }
                if vocabulary.contains(attribute, &left) {
                    self.entries
                        .entry(attribute)
                        .or_default()
                        .entry(left.clone())
                        .or_default();
                    for alias in right.words() {
                        self.insert(attribute, &left, &alias);
                    }
                } else {
                    for canonical in right.words() {
                        self.insert(attribute, &canonical, &left);
                    }
                }
            }
        }
    }

    /// 正規値に対するエイリアス
    pub fn aliases(&self, attribute: Attribute, canonical: &str) -> &[String] {
        self.entries
            .get(&attribute)
            .and_then(|m| m.get(&normalize(canonical)))
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    /// 逆引き索引を作成（正規値自身もキーに含める）
    pub fn compile(&self) -> AliasIndex {
        let mut by_key: BTreeMap<String, Vec<(Attribute, String)>> = BTreeMap::new();
        for (attribute, mapping) in &self.entries {
            for (canonical, aliases) in mapping {
                for surface in std::iter::once(canonical).chain(aliases.iter()) {
                    let key = canon_key(surface);
                    if key.is_empty() {
                        continue;
                    }
                    let slot = by_key.entry(key).or_default();
                    let pair = (*attribute, canonical.clone());
                    if !slot.contains(&pair) {
                        slot.push(pair);
                    }
                }
            }
        }
        AliasIndex { by_key }
    }
}

/// 逆引き索引（エイリアスキー → [(属性, 正規値)]）
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    by_key: BTreeMap<String, Vec<(Attribute, String)>>,
}

impl AliasIndex {
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// 文中に現れるエイリアスを最長一致で収集
    ///
    /// 長いキーから順に照合し、一致箇所を塗りつぶすので、
    /// 「床ハツリ機」の中の「ハツリ」のような部分一致は拾わない。
    pub fn gather(&self, text: &str) -> Vec<(String, Vec<(Attribute, String)>)> {
        let mut masked = canon_key(text);
        let mut keys: Vec<&String> = self.by_key.keys().collect();
        keys.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        let mut hits = Vec::new();
        for key in keys {
            if masked.contains(key.as_str()) {
                let mask: String = "\u{0}".repeat(key.chars().count());
                masked = masked.replace(key.as_str(), &mask);
                hits.push((key.clone(), self.by_key[key].clone()));
            }
        }
        hits
    }
}

/// エイリアス解決の結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// 属性ごとの採用値（出現順・重複なし）
    pub values: BTreeMap<Attribute, Vec<String>>,
    /// 使用済みのエイリアスキー
    pub consumed: BTreeSet<String>,
}

impl Resolution {
    fn push(&mut self, attribute: Attribute, value: String) {
        let slot = self.values.entry(attribute).or_default();
        if !slot.contains(&value) {
            slot.push(value);
        }
    }

    pub fn values(&self, attribute: Attribute) -> &[String] {
        self.values
            .get(&attribute)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }
}

/// エイリアス解決器
pub struct AliasResolver<'a> {
    index: &'a AliasIndex,
    vocabulary: &'a Vocabulary,
    priority: AttributePriority,
    mode: CompletionMode,
}

impl<'a> AliasResolver<'a> {
    pub fn new(index: &'a AliasIndex, vocabulary: &'a Vocabulary) -> Self {
        Self {
            index,
            vocabulary,
            priority: AttributePriority::default(),
            mode: CompletionMode::default(),
        }
    }

    pub fn with_priority(mut self, priority: AttributePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_mode(mut self, mode: CompletionMode) -> Self {
        self.mode = mode;
        self
    }

    /// 文から属性ごとの正規値を解決する
    ///
    /// `suppressed` の属性はエイリアスを消費するだけで値を割り当てない
    /// （確認待ちの曖昧語がある属性など）。
    pub fn resolve(&self, text: &str, suppressed: &BTreeSet<Attribute>) -> Resolution {
        let mut resolution = Resolution::default();

        for (alias, candidates) in self.index.gather(text) {
            let Some(winner) = self.priority.winner(candidates.iter().map(|(a, _)| *a)) else {
                continue;
            };
            resolution.consumed.insert(alias.clone());
            if suppressed.contains(&winner) {
                tracing::debug!(alias = %alias, attribute = %winner, "alias consumed by suppressed attribute");
                continue;
            }
            tracing::debug!(alias = %alias, attribute = %winner, "alias resolved");
            for (attribute, canonical) in candidates.iter().filter(|(a, _)| *a == winner) {
                let label = self.vocabulary.canonicalize(*attribute, canonical);
                resolution.push(*attribute, label);
            }
        }

        if self.mode != CompletionMode::Off {
            let tokens = tokenize(text);
            for attribute in Attribute::ALL {
                if suppressed.contains(&attribute) || !resolution.values(attribute).is_empty() {
                    continue;
                }
                for label in self.complete(attribute, text, &tokens, &resolution.consumed) {
                    let label = self.vocabulary.canonicalize(attribute, &label);
                    resolution.push(attribute, label);
                }
            }
        }

        resolution
    }

    /// 語彙による補完
    fn complete(
        &self,
        attribute: Attribute,
        text: &str,
        tokens: &[String],
        consumed: &BTreeSet<String>,
    ) -> Vec<String> {
        let labels = self.vocabulary.labels(attribute);
        if labels.is_empty() {
            return Vec::new();
        }

        match self.mode {
            CompletionMode::Off => Vec::new(),
            CompletionMode::Literal => {
                let token_keys: BTreeSet<String> = tokens
                    .iter()
                    .map(|t| canon_key(&strip_trailing_particle(t)))
                    .collect();
                labels
                    .iter()
                    .filter(|l| token_keys.contains(&canon_key(l)))
                    .cloned()
                    .collect()
            }
            CompletionMode::Partial => {
                let text_key = canon_key(text);
                let mut by_length: Vec<&String> = labels.iter().collect();
                by_length.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));

                let mut hits: Vec<String> = by_length
                    .iter()
                    .filter(|l| {
                        let key = canon_key(l);
                        !key.is_empty() && text_key.contains(key.as_str())
                    })
                    .map(|l| (*l).clone())
                    .collect();

                if hits.is_empty() {
                    for token in tokens {
                        let key = canon_key(&strip_trailing_particle(token));
                        if key.is_empty() || consumed.contains(&key) {
                            continue;
                        }
                        for label in labels {
                            let label_key = canon_key(label);
                            if label_key.starts_with(key.as_str()) || label_key.contains(key.as_str()) {
                                if !hits.contains(label) {
                                    hits.push(label.clone());
                                }
                            }
                        }
                    }
                }
                hits
            }
        }
    }
}
