//! テキスト正規化
//!
//! - 全角英数字・括弧 → 半角
//! - ダッシュ・波ダッシュ類 → `-`
//! - 単位記号（㎜）→ `mm`
//! - 連続空白 → 半角スペース1つ
//!
//! どの関数も冪等（2回かけても結果は変わらない）。

use regex::Regex;

/// 語末から取り除く格助詞など
const TRAILING_PARTICLES: &[char] = &['を', 'に', 'は', 'が', 'へ', 'と', 'で', 'も', 'や'];

/// 表示・照合用の正規形に変換
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '０'..='９' | 'Ａ'..='Ｚ' | 'ａ'..='ｚ' => {
                out.push(char::from_u32(c as u32 - 0xFEE0).unwrap_or(c));
            }
            '（' => out.push('('),
            '）' => out.push(')'),
            '．' => out.push('.'),
            '，' | '、' => out.push(','),
            '＋' => out.push('+'),
            '％' => out.push('%'),
            '㎜' => out.push_str("mm"),
            '㎝' => out.push_str("cm"),
            '‐' | '‑' | '‒' | '–' | '—' | '―' | '−' | '－' | '〜' | '～' | '~' => out.push('-'),
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 比較キー（正規化 + ハイフン・空白除去 + 小文字化）
///
/// `Pg600` と `Pg-600` を同一視する。
pub fn canon_key(text: &str) -> String {
    normalize(text)
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 語末の助詞を1文字取り除く
pub fn strip_trailing_particle(text: &str) -> String {
    let mut s = normalize(text);
    if let Some(last) = s.chars().last() {
        if TRAILING_PARTICLES.contains(&last) {
            s.pop();
        }
    }
    s
}

/// 照合用に文をトークンへ分割（英数字列 / かな漢字列 / 記号1文字）
pub fn tokenize(text: &str) -> Vec<String> {
    lazy_static::lazy_static! {
        static ref TOKEN_RE: Regex = Regex::new(
            r"[A-Za-z0-9.\-+%]+|[\u{3040}-\u{30FF}\u{4E00}-\u{9FFF}]+|[^\s]"
        ).unwrap();
    }

    let normalized = normalize(text);
    TOKEN_RE
        .find_iter(&normalized)
        .map(|m| m.as_str().to_string())
        .filter(|t| !t.trim().is_empty())
        .collect()
}

/// セル内の複数値（`、` / `,` 区切り）を分割
pub fn split_cell(cell: &str) -> Vec<String> {
    normalize(cell)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
