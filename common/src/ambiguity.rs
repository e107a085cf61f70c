//! 曖昧語の検出と確認
//!
//! 「エポキシ」のように複数の正規値を取り得る語は推測せず、利用者に確認する。
//! より具体的な語が同時に含まれていれば、確認なしで自動確定する。

use crate::normalize::{canon_key, normalize};
use crate::types::Attribute;
use std::collections::BTreeSet;

/// 確認の候補
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 表示ラベル（複数列にまたがる場合は `列=値`）
    pub label: String,
    pub attribute: Attribute,
    pub value: String,
}

impl Candidate {
    fn single(attribute: Attribute, value: &str) -> Self {
        Self {
            label: value.to_string(),
            attribute,
            value: value.to_string(),
        }
    }

    fn cross(attribute: Attribute, value: &str) -> Self {
        Self {
            label: format!("{}={}", attribute.column(), value),
            attribute,
            value: value.to_string(),
        }
    }

    /// 括弧内の修飾語（`防塵塗料（エポキシ塗り重ね）` → `エポキシ塗り重ね`）
    fn qualifier(&self) -> String {
        let value = normalize(&self.value);
        match (value.find('('), value.rfind(')')) {
            (Some(open), Some(close)) if open < close => value[open + 1..close].to_string(),
            _ => value,
        }
    }
}

/// 自動確定ルール（語句を含めば候補 `index` を採用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoRule {
    pub phrase: String,
    pub index: usize,
}

/// 曖昧語1件分のルール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguityRule {
    pub term: String,
    /// 対象属性（複数列にまたがる場合は None）
    pub target: Option<Attribute>,
    pub candidates: Vec<Candidate>,
    pub auto: Vec<AutoRule>,
}

impl AmbiguityRule {
    fn question(&self) -> String {
        format!("「{}」はどれですか？（複数可）", self.term)
    }

    /// 自動確定される候補
    fn auto_candidates(&self, text: &str) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = Vec::new();
        for rule in &self.auto {
            if !text.contains(normalize(&rule.phrase).as_str()) {
                continue;
            }
            if let Some(candidate) = self.candidates.get(rule.index) {
                if !out.contains(candidate) {
                    out.push(candidate.clone());
                }
            }
        }
        out
    }
}

/// 保留中の確認
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clarification {
    pub term: String,
    pub question: String,
    pub target: Option<Attribute>,
    pub candidates: Vec<Candidate>,
}

impl Clarification {
    /// 回答の影響を受ける属性
    pub fn attributes(&self) -> BTreeSet<Attribute> {
        match self.target {
            Some(attribute) => [attribute].into_iter().collect(),
            None => self.candidates.iter().map(|c| c.attribute).collect(),
        }
    }

    /// 番号付きの選択肢一覧
    pub fn prompt(&self) -> String {
        let mut lines = vec![self.question.clone()];
        for (i, candidate) in self.candidates.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, candidate.label));
        }
        lines.push("（全部 / わからない も可）".to_string());
        lines.join("\n")
    }

    /// 回答を候補に解決する
    pub fn resolve(&self, answer: &ClarificationAnswer) -> AnswerResolution {
        match answer {
            ClarificationAnswer::All => AnswerResolution::Applied(self.candidates.clone()),
            ClarificationAnswer::Unknown => AnswerResolution::Skipped,
            ClarificationAnswer::Indices(indices) => {
                let mut chosen: Vec<Candidate> = Vec::new();
                for &index in indices {
                    let Some(candidate) = index.checked_sub(1).and_then(|i| self.candidates.get(i)) else {
                        return AnswerResolution::Unresolved;
                    };
                    if !chosen.contains(candidate) {
                        chosen.push(candidate.clone());
                    }
                }
                if chosen.is_empty() {
                    AnswerResolution::Unresolved
                } else {
                    AnswerResolution::Applied(chosen)
                }
            }
            ClarificationAnswer::Labels(labels) => {
                let mut chosen: Vec<Candidate> = Vec::new();
                for label in labels {
                    let Some(candidate) = self.match_label(label) else {
                        return AnswerResolution::Unresolved;
                    };
                    if !chosen.contains(candidate) {
                        chosen.push(candidate.clone());
                    }
                }
                if chosen.is_empty() {
                    AnswerResolution::Unresolved
                } else {
                    AnswerResolution::Applied(chosen)
                }
            }
        }
    }

    /// ラベル回答を候補に対応付ける（完全一致 → 修飾語スコア → ラベル全体スコア）
    fn match_label(&self, answer: &str) -> Option<&Candidate> {
        let key = canon_key(answer);
        if key.is_empty() {
            return None;
        }
        if let Some(exact) = self
            .candidates
            .iter()
            .find(|c| canon_key(&c.label) == key || canon_key(&c.value) == key)
        {
            return Some(exact);
        }

        let by_qualifier: Vec<usize> = self
            .candidates
            .iter()
            .map(|c| overlap_score(&key, &canon_key(&c.qualifier())))
            .collect();
        if let Some(index) = unique_best(&by_qualifier) {
            return self.candidates.get(index);
        }

        let by_label: Vec<usize> = self
            .candidates
            .iter()
            .map(|c| overlap_score(&key, &canon_key(&c.value)))
            .collect();
        unique_best(&by_label).and_then(|i| self.candidates.get(i))
    }
}

fn overlap_score(answer: &str, target: &str) -> usize {
    if target.is_empty() {
        return 0;
    }
    if answer == target {
        return 100;
    }
    let mut score = answer.chars().filter(|c| target.contains(*c)).count();
    if target.contains(answer) || answer.contains(target) {
        score += 10;
    }
    score
}

/// 最高点が正かつ単独のときだけその位置を返す
fn unique_best(scores: &[usize]) -> Option<usize> {
    let best = *scores.iter().max()?;
    if best == 0 || scores.iter().filter(|s| **s == best).count() > 1 {
        return None;
    }
    scores.iter().position(|s| *s == best)
}

/// 利用者の回答
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationAnswer {
    All,
    Unknown,
    /// 1始まりの番号
    Indices(Vec<usize>),
    Labels(Vec<String>),
}

impl ClarificationAnswer {
    /// 回答文を解釈（空なら None）
    pub fn parse(text: &str) -> Option<Self> {
        let t = normalize(text);
        let t = t.trim();
        if t.is_empty() {
            return None;
        }
        let lower = t.to_lowercase();
        match lower.as_str() {
            "all" | "全部" | "すべて" | "全て" => return Some(ClarificationAnswer::All),
            "unknown" | "わからない" | "分からない" | "不明" => {
                return Some(ClarificationAnswer::Unknown)
            }
            _ => {}
        }

        let parts: Vec<&str> = t
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
            let indices = parts.iter().filter_map(|p| p.parse::<usize>().ok()).collect();
            return Some(ClarificationAnswer::Indices(indices));
        }
        Some(ClarificationAnswer::Labels(
            parts.into_iter().map(str::to_string).collect(),
        ))
    }
}

/// 回答の適用結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerResolution {
    /// 候補を採用（クエリに追記する）
    Applied(Vec<Candidate>),
    /// 「わからない」: 何も追加せず確認を終える
    Skipped,
    /// 解釈できない: 確認は残したまま再質問
    Unresolved,
}

/// 検出結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// 確認が必要なもの
    pub clarifications: Vec<Clarification>,
    /// 自動確定された候補
    pub resolved: Vec<Candidate>,
    /// 文中に見つかった曖昧語
    pub triggers: Vec<String>,
}

/// 曖昧語ルール表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguityRules {
    rules: Vec<AmbiguityRule>,
}

impl Default for AmbiguityRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AmbiguityRules {
    pub fn new(rules: Vec<AmbiguityRule>) -> Self {
        Self { rules }
    }

    /// 組み込みのルール表
    pub fn builtin() -> Self {
        fn substrate(term: &str, values: &[&str], auto: &[(&str, usize)]) -> AmbiguityRule {
            AmbiguityRule {
                term: term.to_string(),
                target: Some(Attribute::Substrate),
                candidates: values
                    .iter()
                    .map(|v| Candidate::single(Attribute::Substrate, v))
                    .collect(),
                auto: auto
                    .iter()
                    .map(|(phrase, index)| AutoRule {
                        phrase: phrase.to_string(),
                        index: *index,
                    })
                    .collect(),
            }
        }

        let rules = vec![
            substrate(
                "アクリル",
                &["防塵塗料（アクリル）", "防塵塗料（アクリル塗り重ね）"],
                &[("アクリル塗り重ね", 1)],
            ),
            substrate(
                "エポキシ",
                &[
                    "防塵塗料（エポキシ）",
                    "厚膜塗料（エポキシ）",
                    "防塵塗料（エポキシ塗り重ね）",
                ],
                &[("エポキシ塗り重ね", 2)],
            ),
            substrate(
                "ウレタン",
                &["厚膜塗料（ウレタン）", "厚膜塗料（水性硬質ウレタン）"],
                &[("水性硬質ウレタン", 1), ("水硬ウレタン", 1)],
            ),
            AmbiguityRule {
                term: "ハツリ".to_string(),
                target: None,
                candidates: vec![
                    Candidate::cross(Attribute::TaskName, "表面ハツリ"),
                    Candidate::cross(Attribute::MachineCategory, "床ハツリ機"),
                    Candidate::cross(Attribute::MachineCategory, "ハンディハツリ機"),
                ],
                auto: vec![
                    AutoRule { phrase: "表面ハツリ".into(), index: 0 },
                    AutoRule { phrase: "床ハツリ".into(), index: 1 },
                    AutoRule { phrase: "ハンディハツリ".into(), index: 2 },
                ],
            },
        ];
        Self { rules }
    }

    pub fn rules(&self) -> &[AmbiguityRule] {
        &self.rules
    }

    /// 曖昧語を検出
    pub fn detect(&self, text: &str) -> Detection {
        let t = normalize(text);
        let mut detection = Detection::default();

        for rule in &self.rules {
            if !t.contains(normalize(&rule.term).as_str()) {
                continue;
            }
            detection.triggers.push(rule.term.clone());

            let auto = rule.auto_candidates(&t);
            if auto.is_empty() {
                tracing::debug!(term = %rule.term, "clarification required");
                detection.clarifications.push(Clarification {
                    term: rule.term.clone(),
                    question: rule.question(),
                    target: rule.target,
                    candidates: rule.candidates.clone(),
                });
            } else {
                tracing::debug!(term = %rule.term, resolved = auto.len(), "ambiguity auto-resolved");
                detection.resolved.extend(auto);
            }
        }
        detection
    }

    /// 曖昧語を文から取り除く
    ///
    /// 自動確定の語句はまるごと取り除く（値は検出時に確定済み）。
    pub fn remove_triggers(&self, text: &str, triggers: &[String]) -> String {
        let mut t = normalize(text);
        for rule in self.rules.iter().filter(|r| triggers.contains(&r.term)) {
            let mut phrases: Vec<String> = rule.auto.iter().map(|a| normalize(&a.phrase)).collect();
            phrases.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
            for phrase in phrases {
                t = t.replace(phrase.as_str(), " ");
            }
            t = t.replace(normalize(&rule.term).as_str(), " ");
        }
        normalize(&t).trim().to_string()
    }
}
