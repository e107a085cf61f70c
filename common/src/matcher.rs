//! 1行とクエリの照合
//!
//! 属性内は OR、属性間は AND。セルは区切り文字で分割してから比較する。

use crate::depth::{parse_cell, to_mm_value};
use crate::normalize::{canon_key, split_cell};
use crate::query::{DepthConstraint, StructuredQuery};
use crate::types::{Attribute, CatalogRecord, EfficiencyRank, StageIndicator};

/// セルが希望値と一致するか（全体一致 or 分割要素の一致）
pub fn value_matches(attribute: Attribute, cell: &str, wanted: &str) -> bool {
    match attribute {
        Attribute::Stage => {
            if let (Some(a), Some(b)) = (StageIndicator::parse(cell), StageIndicator::parse(wanted)) {
                if a == b {
                    return true;
                }
            }
        }
        Attribute::Efficiency => {
            let rank = EfficiencyRank::parse(wanted);
            if rank != EfficiencyRank::Unrated && rank == EfficiencyRank::parse(cell) {
                return true;
            }
        }
        _ => {}
    }

    let key = canon_key(wanted);
    if key.is_empty() {
        return false;
    }
    if canon_key(cell) == key {
        return true;
    }
    split_cell(cell)
        .into_iter()
        .any(|part| canon_key(&part) == key)
}

/// いずれかの希望値と一致するか
pub fn cell_contains_any(attribute: Attribute, cell: &str, wanted: &[String]) -> bool {
    wanted.iter().any(|w| value_matches(attribute, cell, w))
}

/// 深さ条件の判定（条件なしは常に通す。セルが読めなければ落とす）
pub fn depth_matches(cell: &str, constraint: Option<&DepthConstraint>) -> bool {
    let Some(constraint) = constraint else {
        return true;
    };
    let Some(range) = parse_cell(cell) else {
        return false;
    };
    match constraint {
        DepthConstraint::Point(value) => range.contains(*value),
        DepthConstraint::Range(wanted) => range.overlaps(wanted),
        DepthConstraint::Literals(literals) => literals
            .iter()
            .filter_map(|l| to_mm_value(l))
            .any(|v| range.contains(v)),
    }
}

/// 1行がクエリを満たすか
pub fn record_matches(record: &CatalogRecord, query: &StructuredQuery) -> bool {
    for attribute in query.constrained_attributes() {
        if !cell_contains_any(attribute, record.get(attribute), query.values(attribute)) {
            return false;
        }
    }
    depth_matches(&record.depth, query.depth())
}

/// クエリを満たす行（データセット順）
pub fn matching_records<'a>(records: &'a [CatalogRecord], query: &StructuredQuery) -> Vec<&'a CatalogRecord> {
    records.iter().filter(|r| record_matches(r, query)).collect()
}
