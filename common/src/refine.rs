//! 絞り込みセッション
//!
//! 結果が多すぎるときに開き、利用者が選んだ候補を積み上げて再検索する。
//! 1つ戻す（undo）とリセットに対応する。明示的なリセットまで閉じない。

use crate::catalog::Catalog;
use crate::depth::{collect_candidates, parse_cell};
use crate::normalize::{canon_key, normalize};
use crate::outcome::{evaluate, FacetTable, MatchOutcome, OutcomePolicy};
use crate::pairing::order_records;
use crate::query::{DepthConstraint, StructuredQuery};
use crate::types::{Attribute, CatalogRecord};

/// 候補を提示する属性の順
const SUGGESTION_ORDER: [Attribute; 5] = [
    Attribute::MachineCategory,
    Attribute::DeviceModel,
    Attribute::Efficiency,
    Attribute::Stage,
    Attribute::CutterName,
];

/// 絞り込みの軸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKey {
    Attribute(Attribute),
    Depth,
}

impl FacetKey {
    pub fn label(&self) -> &'static str {
        match self {
            FacetKey::Attribute(attribute) => attribute.column(),
            FacetKey::Depth => "処理する深さ・厚さ",
        }
    }
}

/// 適用済みの選択
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetChoice {
    pub key: FacetKey,
    pub value: String,
}

/// 次に提示する候補
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub key: FacetKey,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Accumulating,
}

/// 会話ごとの絞り込み状態
#[derive(Debug, Clone, Default)]
pub struct RefinementSession {
    base: Option<StructuredQuery>,
    applied: Vec<FacetChoice>,
    outcome: Option<MatchOutcome>,
    policy: OutcomePolicy,
}

impl RefinementSession {
    pub fn new(policy: OutcomePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// `NeedRefine` の結果でセッションを開く
    pub fn open(&mut self, base: StructuredQuery, outcome: MatchOutcome) {
        self.base = Some(base);
        self.applied.clear();
        self.outcome = Some(outcome);
    }

    pub fn state(&self) -> SessionState {
        if self.base.is_some() {
            SessionState::Accumulating
        } else {
            SessionState::Empty
        }
    }

    pub fn applied(&self) -> &[FacetChoice] {
        &self.applied
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn hits(&self) -> &[CatalogRecord] {
        self.outcome.as_ref().map(|o| o.hits.as_slice()).unwrap_or_default()
    }

    /// 元のクエリ + 適用済みの選択
    pub fn effective_query(&self) -> Option<StructuredQuery> {
        let mut query = self.base.clone()?;
        for choice in &self.applied {
            match choice.key {
                FacetKey::Attribute(attribute) => {
                    query.add_value(attribute, &choice.value);
                }
                FacetKey::Depth => {
                    let depth = parse_cell(&choice.value)
                        .map(DepthConstraint::Range)
                        .unwrap_or_else(|| DepthConstraint::Literals(vec![choice.value.clone()]));
                    query.set_depth(Some(depth));
                }
            }
        }
        Some(query)
    }

    /// 次に提示する候補（深さ → 未絞り込みで2種類以上ある属性）
    pub fn suggestion(&self) -> Option<Suggestion> {
        let query = self.effective_query()?;
        let hits = self.hits();

        if query.depth().is_none() {
            let labels = collect_candidates(hits, self.policy.depth_candidate_limit);
            if labels.len() >= 2 {
                return Some(Suggestion {
                    key: FacetKey::Depth,
                    options: labels,
                });
            }
        }

        let facets = FacetTable::build(hits, &query);
        SUGGESTION_ORDER
            .into_iter()
            .find(|a| facets.values(*a).len() >= 2)
            .map(|attribute| Suggestion {
                key: FacetKey::Attribute(attribute),
                options: facets.values(attribute).to_vec(),
            })
    }

    /// 番号（1始まり）またはラベルで候補を選んで絞り込む
    ///
    /// 入力は正規化してから読む（全角数字も番号）。数字だけの入力は番号としてのみ扱う。
    /// ラベルは完全一致を優先し、部分一致は1件に絞れるときだけ採用する。
    /// 候補に当たらなければ None（状態は変えない）。
    pub fn choose(&mut self, catalog: &Catalog, input: &str) -> Option<&MatchOutcome> {
        let suggestion = self.suggestion()?;
        let input = normalize(input);
        if input.is_empty() {
            return None;
        }

        let picked = if input.chars().all(|c| c.is_ascii_digit()) {
            input
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| suggestion.options.get(i))
                .cloned()
        } else {
            let key = canon_key(&input);
            match suggestion.options.iter().find(|o| canon_key(o) == key) {
                Some(exact) => Some(exact.clone()),
                None => {
                    let partial: Vec<&String> = suggestion
                        .options
                        .iter()
                        .filter(|o| !key.is_empty() && canon_key(o).contains(key.as_str()))
                        .collect();
                    match partial.as_slice() {
                        [only] => Some((*only).clone()),
                        _ => None,
                    }
                }
            }
        }?;

        Some(self.push(
            catalog,
            FacetChoice {
                key: suggestion.key,
                value: picked,
            },
        ))
    }

    /// 選択を1つ積んで再検索
    pub fn push(&mut self, catalog: &Catalog, choice: FacetChoice) -> &MatchOutcome {
        tracing::debug!(facet = choice.key.label(), value = %choice.value, "facet applied");
        self.applied.push(choice);
        self.recompute(catalog)
    }

    /// 直前の選択を取り消して再検索（取り消すものが無ければ None）
    pub fn pop(&mut self, catalog: &Catalog) -> Option<&MatchOutcome> {
        self.applied.pop()?;
        Some(self.recompute(catalog))
    }

    pub fn reset(&mut self) {
        self.base = None;
        self.applied.clear();
        self.outcome = None;
    }

    /// 現在のヒットをすべて（並べ替え済み）
    pub fn show_all(&self) -> Vec<CatalogRecord> {
        order_records(self.hits())
    }

    /// 評価順の上位 n 件
    pub fn top_n(&self, n: usize) -> Vec<CatalogRecord> {
        let mut records = self.hits().to_vec();
        records.sort_by_key(|r| r.efficiency_rank());
        records.truncate(n);
        records
    }

    fn recompute(&mut self, catalog: &Catalog) -> &MatchOutcome {
        let query = self.effective_query().unwrap_or_default();
        self.outcome.insert(evaluate(catalog, &query, &self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeStatus;

    fn row(machine: &str, model: &str, depth: &str, efficiency: &str) -> CatalogRecord {
        CatalogRecord {
            task_name: "表面ハツリ".into(),
            substrate: "コンクリート".into(),
            depth: depth.into(),
            stage: "単一".into(),
            machine_category: machine.into(),
            device_model: model.into(),
            efficiency: efficiency.into(),
            ..Default::default()
        }
    }

    fn catalog() -> Catalog {
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(row("床ハツリ機", &format!("SB{}", i), "3-5mm", "○"));
            rows.push(row("ハンディハツリ機", &format!("HD{}", i), "0.5-1.0mm", if i == 0 { "◎" } else { "△" }));
        }
        Catalog::from_records(rows)
    }

    fn opened(catalog: &Catalog) -> RefinementSession {
        let query = StructuredQuery::new().with_value(Attribute::TaskName, "表面ハツリ");
        let policy = OutcomePolicy::default();
        let outcome = evaluate(catalog, &query, &policy);
        assert_eq!(outcome.status, OutcomeStatus::NeedRefine);
        let mut session = RefinementSession::new(policy);
        session.open(query, outcome);
        session
    }

    #[test]
    fn test_state_machine() {
        let catalog = catalog();
        let mut session = RefinementSession::default();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.suggestion().is_none());

        session = opened(&catalog);
        assert_eq!(session.state(), SessionState::Accumulating);
        session.reset();
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[test]
    fn test_depth_suggested_first() {
        let catalog = catalog();
        let session = opened(&catalog);
        let suggestion = session.suggestion().unwrap();
        assert_eq!(suggestion.key, FacetKey::Depth);
        assert_eq!(suggestion.options, vec!["0.5-1.0mm", "3-5mm"]);
    }

    #[test]
    fn test_choose_by_number_then_attribute() {
        let catalog = catalog();
        let mut session = opened(&catalog);

        let outcome = session.choose(&catalog, "2").unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Ok);
        assert_eq!(outcome.hits.len(), 6);
        assert!(outcome.hits.iter().all(|r| r.machine_category == "床ハツリ機"));

        // 機械カテゴリーは1種類になったので、次は機種名
        let suggestion = session.suggestion().unwrap();
        assert_eq!(suggestion.key, FacetKey::Attribute(Attribute::DeviceModel));
    }

    #[test]
    fn test_choose_by_label_and_undo() {
        let catalog = catalog();
        let mut session = opened(&catalog);
        session.push(
            &catalog,
            FacetChoice {
                key: FacetKey::Attribute(Attribute::MachineCategory),
                value: "ハンディハツリ機".into(),
            },
        );
        assert_eq!(session.hits().len(), 6);
        assert_eq!(session.applied().len(), 1);

        let outcome = session.pop(&catalog).unwrap();
        assert_eq!(outcome.hits.len(), 12);
        assert!(session.pop(&catalog).is_none());
        assert_eq!(session.state(), SessionState::Accumulating);

        assert!(session.choose(&catalog, "3-5").is_some());
        assert_eq!(session.hits().len(), 6);
    }

    #[test]
    fn test_unknown_choice_keeps_state() {
        let catalog = catalog();
        let mut session = opened(&catalog);
        assert!(session.choose(&catalog, "9").is_none());
        assert!(session.choose(&catalog, "存在しない").is_none());
        assert!(session.applied().is_empty());
        assert_eq!(session.hits().len(), 12);
    }

    #[test]
    fn test_choose_with_full_width_number() {
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(row("床ハツリ機", &format!("SB{}", i), "1-2mm", "○"));
            rows.push(row("ハンディハツリ機", &format!("HD{}", i), "2-3mm", "△"));
        }
        let catalog = Catalog::from_records(rows);
        let mut session = opened(&catalog);
        assert_eq!(session.suggestion().unwrap().options, vec!["1-2mm", "2-3mm"]);

        assert!(session.choose(&catalog, "２").is_some());
        assert_eq!(session.applied()[0].value, "2-3mm");

        session.pop(&catalog);
        assert!(session.choose(&catalog, "2").is_some());
        assert_eq!(session.applied()[0].value, "2-3mm");

        // 部分一致が複数なら選ばない
        session.pop(&catalog);
        assert!(session.choose(&catalog, "mm").is_none());
        assert!(session.applied().is_empty());
    }

    #[test]
    fn test_show_all_and_top_n() {
        let catalog = catalog();
        let session = opened(&catalog);
        assert_eq!(session.show_all().len(), 12);
        let top = session.top_n(3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].efficiency, "◎");
        assert_eq!(top[1].efficiency, "○");
    }
}
