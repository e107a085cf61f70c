//! 深さ・厚さ（mm）の抽出と範囲判定
//!
//! 自由文とデータセットのセルの2系統を扱う。
//! 優先順は「範囲 a-b」→「上限のみ -b（= 0〜b）」→「単値」。

use crate::normalize::normalize;
use crate::types::CatalogRecord;
use regex::Regex;
use std::collections::BTreeSet;

/// 閉区間 [lo, hi]（mm）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub lo: f64,
    pub hi: f64,
}

impl DepthRange {
    /// 端点の大小は自動で入れ替える。非有限値は拒否。
    pub fn new(a: f64, b: f64) -> Option<Self> {
        if !a.is_finite() || !b.is_finite() {
            return None;
        }
        Some(if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        })
    }

    pub fn point(value: f64) -> Option<Self> {
        Self::new(value, value)
    }

    /// 共有点があるか
    pub fn overlaps(&self, other: &DepthRange) -> bool {
        !(self.hi < other.lo || other.hi < self.lo)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// 値を範囲内に丸め込む
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lo).min(self.hi)
    }
}

/// 自由文から読み取った深さ指定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthRequest {
    Range(DepthRange),
    Point(f64),
}

const NUM: &str = r"(\d+(?:\.\d+)?)";
const UNIT: &str = r"(?:mm|ミリ|ﾐﾘ)";

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 自由文から深さ指定を抽出
///
/// - `a-b`（単位任意）→ 範囲
/// - 先頭または区切りの後の `-b` + 単位 → `[0, b]`
/// - 数値 + 単位 → 単値
pub fn parse_request(text: &str) -> Option<DepthRequest> {
    lazy_static::lazy_static! {
        static ref RANGE_RE: Regex =
            Regex::new(&format!(r"(?i){NUM}\s*-\s*{NUM}(?:\s*{UNIT})?")).unwrap();
        static ref OPEN_RE: Regex =
            Regex::new(&format!(r"(?i)(?:^|[^0-9A-Za-z.])-\s*{NUM}\s*{UNIT}")).unwrap();
        static ref SINGLE_RE: Regex =
            Regex::new(&format!(r"(?i){NUM}\s*{UNIT}")).unwrap();
    }

    let t = normalize(text);

    if let Some(cap) = RANGE_RE.captures(&t) {
        let lo = parse_number(&cap[1])?;
        let hi = parse_number(&cap[2])?;
        return DepthRange::new(lo, hi).map(DepthRequest::Range);
    }
    if let Some(cap) = OPEN_RE.captures(&t) {
        let hi = parse_number(&cap[1])?;
        return DepthRange::new(0.0, hi).map(DepthRequest::Range);
    }
    for cap in SINGLE_RE.captures_iter(&t) {
        // 直後に英数字が続くもの（型番など）は深さとみなさない
        let end = cap.get(0).map_or(t.len(), |m| m.end());
        if t[end..].starts_with(|c: char| c.is_ascii_alphanumeric()) {
            continue;
        }
        if let Some(value) = parse_number(&cap[1]) {
            return Some(DepthRequest::Point(value));
        }
    }
    None
}

/// 単位なしで独立した数値をすべて拾う（後方互換の候補リスト用）
///
/// 前後が文字・数字（かな漢字を含む）に接している数値は語の一部とみなして拾わない。
/// `2次` の `2` や `Pg600` の `600` は対象外。
pub fn extract_numbers(text: &str) -> Vec<f64> {
    lazy_static::lazy_static! {
        static ref NUM_RE: Regex = Regex::new(NUM).unwrap();
    }

    fn is_word_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    let t = normalize(text);
    let mut out: Vec<f64> = Vec::new();
    for m in NUM_RE.find_iter(&t) {
        let before = t[..m.start()].chars().next_back();
        let after = t[m.end()..].chars().next();
        if before.is_some_and(is_word_char) || after.is_some_and(is_word_char) {
            continue;
        }
        if let Some(v) = parse_number(m.as_str()) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

/// 文字列中の最初の数値（mm）
pub fn to_mm_value(text: &str) -> Option<f64> {
    lazy_static::lazy_static! {
        static ref FIRST_NUM_RE: Regex = Regex::new(NUM).unwrap();
    }

    let t = normalize(text);
    FIRST_NUM_RE
        .captures(&t)
        .and_then(|cap| parse_number(&cap[1]))
}

/// セル値を範囲に変換（`0.4-1.0mm` / `~7mm` / `3mm` / `3`）
pub fn parse_cell(cell: &str) -> Option<DepthRange> {
    lazy_static::lazy_static! {
        static ref CELL_RANGE_RE: Regex = Regex::new(&format!(r"{NUM}\s*-\s*{NUM}")).unwrap();
        static ref CELL_OPEN_RE: Regex = Regex::new(&format!(r"^\s*-\s*{NUM}")).unwrap();
        static ref CELL_SINGLE_RE: Regex = Regex::new(NUM).unwrap();
    }

    let t = normalize(cell);
    if t.is_empty() {
        return None;
    }
    if let Some(cap) = CELL_RANGE_RE.captures(&t) {
        return DepthRange::new(parse_number(&cap[1])?, parse_number(&cap[2])?);
    }
    if let Some(cap) = CELL_OPEN_RE.captures(&t) {
        return DepthRange::new(0.0, parse_number(&cap[1])?);
    }
    CELL_SINGLE_RE
        .captures(&t)
        .and_then(|cap| parse_number(&cap[1]))
        .and_then(DepthRange::point)
}

/// 表示用ラベルに正規化（`0.5～1.0㎜` → `0.5-1.0mm`、`3` → `3mm`）
pub fn normalize_label(cell: &str) -> Option<String> {
    lazy_static::lazy_static! {
        static ref PREFIX_RE: Regex =
            Regex::new(r"^(処理する深さ・厚さ|処理深さ|厚さ)\s*[:：]?\s*").unwrap();
        static ref BARE_RE: Regex = Regex::new(r"^\d+(?:\.\d+)?$").unwrap();
        static ref MM_RE: Regex = Regex::new(r"(?i)(\d)\s*mm$").unwrap();
    }

    let s: String = normalize(cell).chars().filter(|c| !c.is_whitespace()).collect();
    let s = PREFIX_RE.replace(&s, "").to_string();
    if s.is_empty() {
        return None;
    }
    if BARE_RE.is_match(&s) {
        return Some(format!("{}mm", s));
    }
    Some(MM_RE.replace(&s, "${1}mm").to_string())
}

/// 下限 → 幅 の順で並べる（数値で始まらないものは末尾）
pub fn sort_labels(labels: &mut [String]) {
    fn sort_key(label: &str) -> (f64, f64) {
        match parse_cell(label) {
            Some(r) if label.starts_with(|c: char| c.is_ascii_digit() || c == '-') => {
                (r.lo, r.hi - r.lo)
            }
            _ => (f64::INFINITY, 0.0),
        }
    }
    labels.sort_by(|a, b| {
        let (ka, kb) = (sort_key(a), sort_key(b));
        ka.partial_cmp(&kb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(b))
    });
}

/// レコード群から深さ候補ラベルを集める
pub fn collect_candidates<'a, I>(records: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a CatalogRecord>,
{
    let unique: BTreeSet<String> = records
        .into_iter()
        .filter_map(|r| normalize_label(&r.depth))
        .collect();
    let mut labels: Vec<String> = unique.into_iter().collect();
    sort_labels(&mut labels);
    labels.truncate(limit);
    labels
}

/// レコード群がカバーする深さの最小〜最大
pub fn supported_range<'a, I>(records: I) -> Option<DepthRange>
where
    I: IntoIterator<Item = &'a CatalogRecord>,
{
    records
        .into_iter()
        .filter_map(|r| parse_cell(&r.depth))
        .fold(None, |acc: Option<DepthRange>, r| match acc {
            None => Some(r),
            Some(a) => Some(DepthRange {
                lo: a.lo.min(r.lo),
                hi: a.hi.max(r.hi),
            }),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(lo: f64, hi: f64) -> DepthRange {
        DepthRange::new(lo, hi).unwrap()
    }

    #[test]
    fn test_parse_request_point() {
        assert_eq!(parse_request("雨うたれを3mm削りたい"), Some(DepthRequest::Point(3.0)));
        assert_eq!(parse_request("厚さ１．５ミリ"), Some(DepthRequest::Point(1.5)));
    }

    #[test]
    fn test_parse_request_range() {
        assert_eq!(parse_request("3〜5mmで"), Some(DepthRequest::Range(range(3.0, 5.0))));
        assert_eq!(parse_request("5-3"), Some(DepthRequest::Range(range(3.0, 5.0))));
        assert_eq!(parse_request("～7㎜まで"), Some(DepthRequest::Range(range(0.0, 7.0))));
    }

    #[test]
    fn test_parse_request_none() {
        assert_eq!(parse_request("目荒らししたい"), None);
        assert_eq!(parse_request("Pg600で"), None);
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("0.5~1.0mm"), Some(range(0.5, 1.0)));
        assert_eq!(parse_cell("０．４－１．０㎜"), Some(range(0.4, 1.0)));
        assert_eq!(parse_cell("~7mm"), Some(range(0.0, 7.0)));
        assert_eq!(parse_cell("3mm"), Some(range(3.0, 3.0)));
        assert_eq!(parse_cell("3"), Some(range(3.0, 3.0)));
        assert_eq!(parse_cell("-"), None);
        assert_eq!(parse_cell(""), None);
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let cases = [
            (range(0.0, 1.0), range(1.0, 2.0)),
            (range(0.0, 1.0), range(1.5, 2.0)),
            (range(0.5, 3.0), range(1.0, 2.0)),
            (range(2.0, 2.0), range(0.0, 5.0)),
        ];
        for (a, b) in cases {
            assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }
        assert!(range(0.0, 1.0).overlaps(&range(1.0, 2.0)));
        assert!(!range(0.0, 1.0).overlaps(&range(1.5, 2.0)));
    }

    #[test]
    fn test_contains_and_clamp() {
        let r = range(0.5, 1.0);
        assert!(r.contains(0.7));
        assert!(r.contains(1.0));
        assert!(!r.contains(2.0));
        assert_eq!(r.clamp(2.0), 1.0);
        assert_eq!(r.clamp(0.1), 0.5);
    }

    #[test]
    fn test_extract_numbers() {
        assert_eq!(extract_numbers("深さ 3 か 5"), vec![3.0, 5.0]);
        assert!(extract_numbers("Pg600").is_empty());
        assert!(extract_numbers("深さ3で").is_empty());
        assert!(extract_numbers("表面ハツリの2次工程").is_empty());
        assert_eq!(extract_numbers("深さは 2.5 くらい、3 でも"), vec![2.5, 3.0]);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("0.5～1.0㎜").as_deref(), Some("0.5-1.0mm"));
        assert_eq!(normalize_label("3").as_deref(), Some("3mm"));
        assert_eq!(normalize_label("厚さ: 2 MM").as_deref(), Some("2mm"));
        assert_eq!(normalize_label("  "), None);
    }

    #[test]
    fn test_sort_labels() {
        let mut labels = vec!["3-5mm".to_string(), "0.5-1.0mm".to_string(), "3mm".to_string()];
        sort_labels(&mut labels);
        assert_eq!(labels, vec!["0.5-1.0mm", "3mm", "3-5mm"]);
    }
}
