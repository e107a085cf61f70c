//! 検索結果の判定
//!
//! データセット全体を照合し、5種類の結果のいずれかに分類する。
//!
//! 1. 条件なし → `InvalidConditions`
//! 2. 照合
//! 3. 単値の深さが推奨範囲外 → `RangeOut`（深さを外したヒットと代替値）
//! 4. 0件 → `NoResults`
//! 5. しきい値以上 → `NeedRefine`（絞り込み候補付き）
//! 6. それ以外 → `Ok`（並べ替え済み）

use crate::catalog::Catalog;
use crate::depth::{collect_candidates, supported_range, DepthRange};
use crate::matcher::matching_records;
use crate::normalize::split_cell;
use crate::pairing::order_records;
use crate::query::{DepthConstraint, StructuredQuery};
use crate::types::{Attribute, CatalogRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 絞り込みを促す件数
pub const DEFAULT_REFINE_THRESHOLD: usize = 10;
/// 深さ候補の最大数
pub const DEFAULT_DEPTH_CANDIDATE_LIMIT: usize = 8;

const MSG_INVALID: &str = "検索条件が認識されませんでした。他の入力をお願いします。";
const MSG_NO_RESULTS: &str =
    "該当なしでした。もう一度検索条件を入れなおしてください。終了なら「終了」と入力してください。";
const MSG_RANGE_OUT: &str = "処理する深さ・厚さが推奨する幅を超えているようです。";

/// 判定の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    InvalidConditions,
    NoResults,
    RangeOut,
    NeedRefine,
    Ok,
}

/// 判定の設定値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomePolicy {
    pub refine_threshold: usize,
    pub depth_candidate_limit: usize,
}

impl Default for OutcomePolicy {
    fn default() -> Self {
        Self {
            refine_threshold: DEFAULT_REFINE_THRESHOLD,
            depth_candidate_limit: DEFAULT_DEPTH_CANDIDATE_LIMIT,
        }
    }
}

/// 絞り込み候補（属性 → ヒット中の値）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetTable {
    values: BTreeMap<Attribute, Vec<String>>,
}

impl FacetTable {
    /// クエリで条件が付いている属性は除く
    pub fn build<'a, I>(hits: I, query: &StructuredQuery) -> Self
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let constrained: BTreeSet<Attribute> = query.constrained_attributes().collect();
        let mut sets: BTreeMap<Attribute, BTreeSet<String>> = BTreeMap::new();
        for record in hits {
            for attribute in Attribute::ALL {
                if constrained.contains(&attribute) {
                    continue;
                }
                sets.entry(attribute)
                    .or_default()
                    .extend(split_cell(record.get(attribute)));
            }
        }
        Self {
            values: sets
                .into_iter()
                .filter(|(_, set)| !set.is_empty())
                .map(|(a, set)| (a, set.into_iter().collect()))
                .collect(),
        }
    }

    pub fn values(&self, attribute: Attribute) -> &[String] {
        self.values
            .get(&attribute)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.values.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 判定結果
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub status: OutcomeStatus,
    pub hits: Vec<CatalogRecord>,
    pub message: String,
    /// 範囲外のときの代替値（mm）
    pub suggested_depth: Option<f64>,
    /// 深さ以外の条件で対応できる範囲
    pub supported_range: Option<DepthRange>,
    pub depth_candidates: Vec<String>,
    pub facets: FacetTable,
}

impl MatchOutcome {
    fn new(status: OutcomeStatus, hits: Vec<CatalogRecord>, message: String) -> Self {
        Self {
            status,
            hits,
            message,
            suggested_depth: None,
            supported_range: None,
            depth_candidates: Vec::new(),
            facets: FacetTable::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// クエリを評価する（クエリ自体は変更しない）
pub fn evaluate(catalog: &Catalog, query: &StructuredQuery, policy: &OutcomePolicy) -> MatchOutcome {
    let outcome = classify(catalog, query, policy);
    tracing::debug!(status = ?outcome.status, hits = outcome.hits.len(), "query evaluated");
    outcome
}

fn classify(catalog: &Catalog, query: &StructuredQuery, policy: &OutcomePolicy) -> MatchOutcome {
    if !query.has_constraint() {
        return MatchOutcome::new(OutcomeStatus::InvalidConditions, Vec::new(), MSG_INVALID.to_string());
    }

    let records = catalog.records();
    let hits: Vec<CatalogRecord> = matching_records(records, query).into_iter().cloned().collect();

    if let Some(DepthConstraint::Point(requested)) = query.depth() {
        let without_depth = query.without_depth();
        let others = matching_records(records, &without_depth);
        let allowed = if others.is_empty() {
            supported_range(records)
        } else {
            supported_range(others.iter().copied())
        };

        if let Some(allowed) = allowed.filter(|r| !r.contains(*requested)) {
            let suggested = allowed.clamp(*requested);
            let mut message = MSG_RANGE_OUT.to_string();
            if !others.is_empty() {
                message.push_str(&format!(
                    " 推奨範囲内の例として {:.1}mm があります。再検索してみますか？",
                    suggested
                ));
            }
            let depth_candidates =
                collect_candidates(others.iter().copied(), policy.depth_candidate_limit);
            let hits = others.into_iter().cloned().collect();

            let mut outcome = MatchOutcome::new(OutcomeStatus::RangeOut, hits, message);
            outcome.suggested_depth = Some(suggested);
            outcome.supported_range = Some(allowed);
            outcome.depth_candidates = depth_candidates;
            return outcome;
        }
    }

    if hits.is_empty() {
        return MatchOutcome::new(OutcomeStatus::NoResults, hits, MSG_NO_RESULTS.to_string());
    }

    let depth_candidates = collect_candidates(&hits, policy.depth_candidate_limit);

    if hits.len() >= policy.refine_threshold {
        let message = format!(
            "検索結果数が多いです（{}件）。他条件で絞りますか？それとも評価順の上位件を表示しますか？",
            hits.len()
        );
        let facets = FacetTable::build(&hits, query);
        let mut outcome = MatchOutcome::new(OutcomeStatus::NeedRefine, hits, message);
        outcome.depth_candidates = depth_candidates;
        outcome.facets = facets;
        return outcome;
    }

    let message = format!("{}件見つかりました。", hits.len());
    let mut outcome = MatchOutcome::new(OutcomeStatus::Ok, order_records(&hits), message);
    outcome.depth_candidates = depth_candidates;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(task: &str, depth: &str, machine: &str, efficiency: &str) -> CatalogRecord {
        CatalogRecord {
            task_name: task.into(),
            substrate: "コンクリート".into(),
            depth: depth.into(),
            stage: "単一".into(),
            machine_category: machine.into(),
            device_model: format!("M-{}", machine),
            efficiency: efficiency.into(),
            ..Default::default()
        }
    }

    fn catalog() -> Catalog {
        let mut rows = vec![
            row("雨打たれ処理", "0.5~1.0mm", "床研削機", "○"),
            row("雨打たれ処理", "0.5~1.0mm", "ハンディ研削機", "◎"),
        ];
        for i in 0..12 {
            let machine = if i % 2 == 0 { "床ハツリ機" } else { "ハンディハツリ機" };
            rows.push(row("表面ハツリ", "3-5mm", machine, "△"));
        }
        Catalog::from_records(rows)
    }

    fn policy() -> OutcomePolicy {
        OutcomePolicy::default()
    }

    #[test]
    fn test_invalid_conditions() {
        let outcome = evaluate(&catalog(), &StructuredQuery::new(), &policy());
        assert_eq!(outcome.status, OutcomeStatus::InvalidConditions);
        assert!(outcome.hits.is_empty());
    }

    #[test]
    fn test_no_results_leaves_query_unchanged() {
        let query = StructuredQuery::new().with_value(Attribute::TaskName, "表面研ぎ出し");
        let before = query.clone();
        let outcome = evaluate(&catalog(), &query, &policy());
        assert_eq!(outcome.status, OutcomeStatus::NoResults);
        assert_eq!(query, before);
    }

    #[test]
    fn test_point_inside_range_is_ok() {
        let query = StructuredQuery::new()
            .with_value(Attribute::TaskName, "雨打たれ処理")
            .with_depth(DepthConstraint::Point(0.7));
        let outcome = evaluate(&catalog(), &query, &policy());
        assert_eq!(outcome.status, OutcomeStatus::Ok);
        assert_eq!(outcome.hits.len(), 2);
        // 評価順（◎ が先）
        assert_eq!(outcome.hits[0].efficiency, "◎");
    }

    #[test]
    fn test_range_out_suggests_clamped_value() {
        let query = StructuredQuery::new()
            .with_value(Attribute::TaskName, "雨打たれ処理")
            .with_depth(DepthConstraint::Point(2.0));
        let outcome = evaluate(&catalog(), &query, &policy());
        assert_eq!(outcome.status, OutcomeStatus::RangeOut);
        assert_eq!(outcome.suggested_depth, Some(1.0));
        assert_eq!(outcome.hits.len(), 2);
        assert_eq!(outcome.depth_candidates, vec!["0.5-1.0mm"]);
        assert!(outcome.message.contains("1.0mm"));
    }

    #[test]
    fn test_range_out_falls_back_to_whole_dataset() {
        let query = StructuredQuery::new()
            .with_value(Attribute::TaskName, "表面研ぎ出し")
            .with_depth(DepthConstraint::Point(9.0));
        let outcome = evaluate(&catalog(), &query, &policy());
        assert_eq!(outcome.status, OutcomeStatus::RangeOut);
        assert_eq!(outcome.suggested_depth, Some(5.0));
        assert!(outcome.hits.is_empty());
        assert!(!outcome.message.contains("推奨範囲内の例"));
    }

    #[test]
    fn test_need_refine_with_facets() {
        let query = StructuredQuery::new().with_value(Attribute::TaskName, "表面ハツリ");
        let outcome = evaluate(&catalog(), &query, &policy());
        assert_eq!(outcome.status, OutcomeStatus::NeedRefine);
        assert_eq!(outcome.hits.len(), 12);
        assert!(outcome.facets.values(Attribute::TaskName).is_empty());
        assert_eq!(
            outcome.facets.values(Attribute::MachineCategory),
            ["ハンディハツリ機", "床ハツリ機"]
        );
    }

    #[test]
    fn test_threshold_is_configurable() {
        let query = StructuredQuery::new().with_value(Attribute::TaskName, "表面ハツリ");
        let policy = OutcomePolicy {
            refine_threshold: 20,
            ..OutcomePolicy::default()
        };
        assert_eq!(evaluate(&catalog(), &query, &policy).status, OutcomeStatus::Ok);
    }
}
