//! 自由文 → 構造化クエリ
//!
//! 深さ抽出 → 曖昧語検出（自動確定 / 確認待ち）→ 曖昧語を除いた文でエイリアス解決、の順。

use crate::alias::AliasResolver;
use crate::ambiguity::{AmbiguityRules, Clarification};
use crate::depth::{extract_numbers, parse_request, DepthRequest};
use crate::normalize::normalize;
use crate::query::{DepthConstraint, StructuredQuery};

/// クエリ解決器
pub struct QueryResolver<'a> {
    aliases: AliasResolver<'a>,
    rules: &'a AmbiguityRules,
}

impl<'a> QueryResolver<'a> {
    pub fn new(aliases: AliasResolver<'a>, rules: &'a AmbiguityRules) -> Self {
        Self { aliases, rules }
    }

    /// 文を解決し、既存クエリに足し込む
    ///
    /// 戻り値の確認は保留中のうち先頭の1件（残りはクエリ内に積まれたまま）。
    pub fn resolve(
        &self,
        text: &str,
        existing: Option<&StructuredQuery>,
    ) -> (StructuredQuery, Option<Clarification>) {
        let mut query = existing.cloned().unwrap_or_default();
        let t = normalize(text);

        if let Some(depth) = extract_depth(&t) {
            tracing::debug!(depth = %depth, "depth extracted");
            query.set_depth(Some(depth));
        }

        let detection = self.rules.detect(&t);
        for candidate in &detection.resolved {
            query.add_value(candidate.attribute, &candidate.value);
        }
        for clarification in detection.clarifications {
            query.push_clarification(clarification);
        }

        let cleaned = self.rules.remove_triggers(&t, &detection.triggers);
        let resolution = self.aliases.resolve(&cleaned, &query.suppressed_attributes());
        for (attribute, values) in &resolution.values {
            for value in values {
                query.add_value(*attribute, value);
            }
        }

        let clarification = query.next_clarification().cloned();
        (query, clarification)
    }
}

/// 文中の深さ指定（単位付き → 単位なし数値の順）
fn extract_depth(text: &str) -> Option<DepthConstraint> {
    match parse_request(text) {
        Some(DepthRequest::Point(value)) => Some(DepthConstraint::Point(value)),
        Some(DepthRequest::Range(range)) => Some(DepthConstraint::Range(range)),
        None => DepthConstraint::literals(extract_numbers(text).into_iter().map(|v| v.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasTable;
    use crate::catalog::Catalog;
    use crate::depth::DepthRange;
    use crate::types::Attribute;

    const CSV: &str = "作業名,下地の状況,処理する深さ・厚さ,工程数,機械カテゴリー,ライナックス機種名,使用カッター名,作業効率評価
雨打たれ処理,コンクリート,0.5~1.0mm,単一,床研削機,Pg600,ダイヤカッター,◎
表面ハツリ,防塵塗料（エポキシ）,3-5mm,一次工程,床ハツリ機,SB500,チップカッター,○
表面ハツリ,厚膜塗料（エポキシ）,3-5mm,二次工程,床研削機,Pg600,ダイヤカッター,○
";

    fn resolve(text: &str, existing: Option<&StructuredQuery>) -> (StructuredQuery, Option<Clarification>) {
        let catalog = Catalog::from_csv_str(CSV).unwrap();
        let index = AliasTable::builtin().compile();
        let rules = AmbiguityRules::builtin();
        let aliases = AliasResolver::new(&index, catalog.vocabulary());
        QueryResolver::new(aliases, &rules).resolve(text, existing)
    }

    #[test]
    fn test_point_depth_and_alias() {
        let (query, clarification) = resolve("雨うたれを3mm削りたい", None);
        assert_eq!(query.depth(), Some(&DepthConstraint::Point(3.0)));
        assert_eq!(query.values(Attribute::TaskName), ["雨打たれ処理"]);
        assert!(clarification.is_none());
    }

    #[test]
    fn test_range_depth() {
        let (query, _) = resolve("3〜5mmで研削", None);
        assert_eq!(
            query.depth(),
            Some(&DepthConstraint::Range(DepthRange::new(3.0, 5.0).unwrap()))
        );
    }

    #[test]
    fn test_unitless_number_becomes_literals() {
        let (query, _) = resolve("深さ 3 で", None);
        assert_eq!(query.depth(), Some(&DepthConstraint::Literals(vec!["3".into()])));
    }

    #[test]
    fn test_ambiguous_term_is_not_guessed() {
        let (query, clarification) = resolve("エポキシの床", None);
        let clarification = clarification.unwrap();
        assert_eq!(clarification.candidates.len(), 3);
        assert!(query.values(Attribute::Substrate).is_empty());
    }

    #[test]
    fn test_answer_then_evaluate_second_candidate() {
        let (mut query, _) = resolve("エポキシの床", None);
        query.answer("2");
        assert_eq!(query.values(Attribute::Substrate), ["厚膜塗料(エポキシ)"]);
    }

    #[test]
    fn test_auto_resolution_applies_value() {
        let (query, clarification) = resolve("床ハツリ機で雨うたれ", None);
        assert!(clarification.is_none());
        assert_eq!(query.values(Attribute::MachineCategory), ["床ハツリ機"]);
        assert_eq!(query.values(Attribute::TaskName), ["雨打たれ処理"]);
    }

    #[test]
    fn test_follow_up_extends_existing_query() {
        let (first, _) = resolve("雨うたれ", None);
        let (second, _) = resolve("Pg600 で", Some(&first));
        assert_eq!(second.values(Attribute::TaskName), ["雨打たれ処理"]);
        assert_eq!(second.values(Attribute::DeviceModel), ["Pg600"]);
    }

    #[test]
    fn test_only_one_clarification_surfaced() {
        let (query, clarification) = resolve("エポキシかウレタン", None);
        assert_eq!(clarification.unwrap().term, "エポキシ");
        assert_eq!(query.pending_len(), 2);
    }
}
