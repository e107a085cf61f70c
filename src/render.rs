//! 検索結果のテキスト整形

use koho_finder_common::{
    CatalogRecord, Clarification, MatchOutcome, PresentedRow, RowRole, StageIndicator, Suggestion,
};

const LEGEND: &str = "※ 評価の意味: ◎=非常に適, ○=適, △=一部条件で可";

/// 1行分（`◎ Pg600 + ダイヤカッター | 雨打たれ処理 / コンクリート / 0.5~1.0mm`）
pub fn format_record(record: &CatalogRecord) -> String {
    format!(
        "{} {} + {} | {} / {} / {}",
        record.efficiency,
        record.device_model,
        record.cutter_name,
        record.task_name,
        record.substrate,
        record.depth
    )
}

/// 工程ラベル（単一工程はラベルなし）
fn stage_label(row: &PresentedRow) -> Option<&'static str> {
    match row.record.stage_indicator() {
        Some(StageIndicator::Primary) | Some(StageIndicator::Secondary) => Some(match row.role {
            RowRole::Hit => "検索ヒットした工程",
            RowRole::Paired => "検索結果とペアになる工程",
        }),
        _ => None,
    }
}

/// ペア補完済みの行を一覧表示
pub fn render_rows(rows: &[PresentedRow]) -> String {
    if rows.is_empty() {
        return "結果なし".to_string();
    }

    let hits = rows.iter().filter(|r| r.role == RowRole::Hit).count();
    let paired = rows.len() - hits;
    let mut lines = Vec::with_capacity(rows.len() + 3);
    if paired > 0 {
        lines.push(format!("検索結果: {}件（ペア工程 {}件を含む）", rows.len(), paired));
    } else {
        lines.push(format!("検索結果: {}件", rows.len()));
    }
    lines.push(String::new());

    for row in rows {
        let mut line = format_record(&row.record);
        if !row.record.stage.is_empty() {
            line = format!("[{}] {}", row.record.stage, line);
        }
        if let Some(label) = stage_label(row) {
            line = format!("{}（{}）", line, label);
        }
        lines.push(line);
    }

    lines.push(String::new());
    lines.push(LEGEND.to_string());
    lines.join("\n")
}

/// ヒット行だけの一覧
pub fn render_records(records: &[CatalogRecord]) -> String {
    let rows: Vec<PresentedRow> = records
        .iter()
        .map(|r| PresentedRow {
            record: r.clone(),
            role: RowRole::Hit,
        })
        .collect();
    render_rows(&rows)
}

/// 絞り込み候補の提示
pub fn render_suggestion(suggestion: &Suggestion, top_n: usize) -> String {
    let mut lines = vec![format!("{}で絞り込みますか？", suggestion.key.label())];
    for (i, option) in suggestion.options.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, option));
    }
    lines.push(format!("（番号かラベルで選択 / 戻る / 全部 / 上位{}）", top_n));
    lines.join("\n")
}

pub fn render_clarification(clarification: &Clarification) -> String {
    clarification.prompt()
}

/// 範囲外の案内（深さ候補つき）
pub fn render_range_out(outcome: &MatchOutcome) -> String {
    let mut text = outcome.message.clone();
    if let Some(range) = outcome.supported_range {
        text.push_str(&format!("\n対応範囲: {}〜{}mm", range.lo, range.hi));
    }
    if !outcome.depth_candidates.is_empty() {
        text.push_str(&format!("\n深さの候補: {}", outcome.depth_candidates.join(" / ")));
    }
    text
}
