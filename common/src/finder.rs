//! 検索エンジン本体
//!
//! データセット・エイリアス索引・曖昧語ルールを起動時に1度だけ組み立て、
//! 以降は読み取り専用で全会話から共有する。

use crate::alias::{AliasIndex, AliasResolver, AliasTable, AttributePriority, CompletionMode};
use crate::ambiguity::{AmbiguityRules, Clarification};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::matcher::matching_records;
use crate::outcome::{evaluate, MatchOutcome, OutcomePolicy};
use crate::pairing::{pair_and_order, PresentedRow};
use crate::query::StructuredQuery;
use crate::refine::RefinementSession;
use crate::resolver::QueryResolver;
use crate::types::CatalogRecord;
use std::path::Path;

/// 検索の設定値
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinderSettings {
    pub completion_mode: CompletionMode,
    pub priority: AttributePriority,
    pub policy: OutcomePolicy,
}

#[derive(Debug, Clone)]
pub struct Finder {
    catalog: Catalog,
    aliases: AliasIndex,
    rules: AmbiguityRules,
    settings: FinderSettings,
}

impl Finder {
    pub fn new(catalog: Catalog, table: &AliasTable, settings: FinderSettings) -> Self {
        Self {
            aliases: table.compile(),
            catalog,
            rules: AmbiguityRules::builtin(),
            settings,
        }
    }

    /// データセットと同義語ファイルから組み立てる
    ///
    /// データセットの読み込み失敗は致命的。同義語ファイルは無くても動く。
    pub fn load(dataset: &Path, synonyms: Option<&Path>, settings: FinderSettings) -> Result<Self> {
        let catalog = Catalog::from_csv(dataset)?;
        let table = AliasTable::load(synonyms, catalog.vocabulary());
        let finder = Self::new(catalog, &table, settings);
        tracing::info!(
            rows = finder.catalog.len(),
            aliases = finder.aliases.len(),
            "finder ready"
        );
        Ok(finder)
    }

    pub fn with_rules(mut self, rules: AmbiguityRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &FinderSettings {
        &self.settings
    }

    /// 自由文 → 構造化クエリ（+ 先頭の確認）
    pub fn resolve(
        &self,
        text: &str,
        existing: Option<&StructuredQuery>,
    ) -> (StructuredQuery, Option<Clarification>) {
        let aliases = AliasResolver::new(&self.aliases, self.catalog.vocabulary())
            .with_priority(self.settings.priority.clone())
            .with_mode(self.settings.completion_mode);
        QueryResolver::new(aliases, &self.rules).resolve(text, existing)
    }

    pub fn evaluate(&self, query: &StructuredQuery) -> MatchOutcome {
        evaluate(&self.catalog, query, &self.settings.policy)
    }

    /// ペア補完つきの表示行（母集団は作業名 + 下地の状況だけで検索したもの）
    pub fn present(&self, query: &StructuredQuery, hits: &[CatalogRecord]) -> Vec<PresentedRow> {
        let base = query.base_for_pairing();
        let superset: Vec<CatalogRecord> = if base.has_constraint() {
            matching_records(self.catalog.records(), &base)
                .into_iter()
                .cloned()
                .collect()
        } else {
            self.catalog.records().to_vec()
        };
        pair_and_order(hits, &superset)
    }

    /// 絞り込みセッションを開く
    pub fn open_refinement(&self, query: StructuredQuery, outcome: MatchOutcome) -> RefinementSession {
        let mut session = RefinementSession::new(self.settings.policy);
        session.open(query, outcome);
        session
    }
}
