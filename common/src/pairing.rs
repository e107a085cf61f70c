//! 一次/二次工程のペア補完と並べ替え
//!
//! 絞り込みで片方の工程だけがヒットした場合、絞り込み前の母集団から
//! 反対側の工程を「ペア」として補う。

use crate::types::{CatalogRecord, EfficiencyRank, GroupKey, StageIndicator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 行の役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowRole {
    /// 検索ヒットした工程
    Hit,
    /// 検索結果とペアになる工程
    Paired,
}

/// 表示用の1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedRow {
    pub record: CatalogRecord,
    pub role: RowRole,
}

fn is_two_stage(stage: Option<StageIndicator>) -> bool {
    matches!(stage, Some(StageIndicator::Primary) | Some(StageIndicator::Secondary))
}

/// 反対側の工程を補ってから並べ替える
pub fn pair_and_order(current: &[CatalogRecord], superset: &[CatalogRecord]) -> Vec<PresentedRow> {
    let mut rows: Vec<PresentedRow> = current
        .iter()
        .map(|r| PresentedRow {
            record: r.clone(),
            role: RowRole::Hit,
        })
        .collect();

    let mut present: HashSet<(GroupKey, StageIndicator)> = current
        .iter()
        .filter_map(|r| r.stage_indicator().map(|s| (r.group_key(), s)))
        .collect();

    for record in current {
        let Some(opposite) = record.stage_indicator().and_then(StageIndicator::opposite) else {
            continue;
        };
        let key = record.group_key();
        if present.contains(&(key.clone(), opposite)) {
            continue;
        }
        let partners: Vec<&CatalogRecord> = superset
            .iter()
            .filter(|r| r.stage_indicator() == Some(opposite) && r.group_key() == key)
            .collect();
        if partners.is_empty() {
            continue;
        }
        tracing::debug!(?key, added = partners.len(), "paired stage added");
        for partner in partners {
            rows.push(PresentedRow {
                record: partner.clone(),
                role: RowRole::Paired,
            });
        }
        present.insert((key, opposite));
    }

    order_rows(rows)
}

/// ヒット行だけを並べ替える
pub fn order_records(records: &[CatalogRecord]) -> Vec<CatalogRecord> {
    let rows = records
        .iter()
        .map(|r| PresentedRow {
            record: r.clone(),
            role: RowRole::Hit,
        })
        .collect();
    order_rows(rows).into_iter().map(|row| row.record).collect()
}

/// 同順位の並び（評価 → 機種名 → カッター名）
fn tie_key(record: &CatalogRecord) -> (EfficiencyRank, String, String) {
    (
        record.efficiency_rank(),
        record.device_model.clone(),
        record.cutter_name.clone(),
    )
}

fn stage_order(record: &CatalogRecord) -> u8 {
    match record.stage_indicator() {
        Some(StageIndicator::Primary) => 0,
        Some(StageIndicator::Secondary) => 1,
        _ => 2,
    }
}

/// 単一工程 → ペアのグループ（初出順、一次 → 二次）。重複は先勝ちで除く
fn order_rows(rows: Vec<PresentedRow>) -> Vec<PresentedRow> {
    let (mut singles, paired): (Vec<PresentedRow>, Vec<PresentedRow>) = rows
        .into_iter()
        .partition(|row| !is_two_stage(row.record.stage_indicator()));
    singles.sort_by_key(|row| tie_key(&row.record));

    let mut groups: Vec<(GroupKey, Vec<PresentedRow>)> = Vec::new();
    for row in paired {
        let key = row.record.group_key();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    let mut ordered = singles;
    for (_, mut members) in groups {
        members.sort_by_key(|row| (stage_order(&row.record), tie_key(&row.record)));
        ordered.extend(members);
    }

    let mut seen: HashSet<CatalogRecord> = HashSet::new();
    ordered.retain(|row| seen.insert(row.record.clone()));
    ordered
}
