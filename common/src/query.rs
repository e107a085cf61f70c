//! 構造化クエリ
//!
//! 「利用者が何を探しているか」を属性ごとの希望値・深さ条件・保留中の確認で表す。
//! 属性内は OR、属性間は AND。

use crate::ambiguity::{AnswerResolution, Clarification, ClarificationAnswer};
use crate::depth::{to_mm_value, DepthRange};
use crate::normalize::normalize;
use crate::types::Attribute;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// 深さ条件
#[derive(Debug, Clone, PartialEq)]
pub enum DepthConstraint {
    /// 単値（セルの範囲に含まれること）
    Point(f64),
    /// 範囲（セルの範囲と重なること）
    Range(DepthRange),
    /// 単位なしの数値列（いずれかがセルの範囲に含まれること）
    Literals(Vec<String>),
}

impl DepthConstraint {
    /// 数値を取り出せるリテラルだけ残す（空なら None）
    pub fn literals<I, S>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .filter(|v| to_mm_value(v).is_some())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(DepthConstraint::Literals(values))
        }
    }
}

impl fmt::Display for DepthConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthConstraint::Point(v) => write!(f, "single({}mm)", v),
            DepthConstraint::Range(r) => write!(f, "range({}-{}mm)", r.lo, r.hi),
            DepthConstraint::Literals(values) => write!(f, "literals({})", values.join(",")),
        }
    }
}

/// 構造化クエリ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredQuery {
    values: BTreeMap<Attribute, Vec<String>>,
    depth: Option<DepthConstraint>,
    pending: VecDeque<Clarification>,
}

impl StructuredQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// 希望値を追加（正規化・重複なし）。追加されたら true
    pub fn add_value(&mut self, attribute: Attribute, value: &str) -> bool {
        let value = normalize(value);
        if value.is_empty() {
            return false;
        }
        let slot = self.values.entry(attribute).or_default();
        if slot.contains(&value) {
            return false;
        }
        slot.push(value);
        true
    }

    pub fn with_value(mut self, attribute: Attribute, value: &str) -> Self {
        self.add_value(attribute, value);
        self
    }

    pub fn values(&self, attribute: Attribute) -> &[String] {
        self.values
            .get(&attribute)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    /// 条件のある属性（優先度順）
    pub fn constrained_attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(a, _)| *a)
    }

    pub fn depth(&self) -> Option<&DepthConstraint> {
        self.depth.as_ref()
    }

    pub fn set_depth(&mut self, depth: Option<DepthConstraint>) {
        self.depth = depth;
    }

    pub fn with_depth(mut self, depth: DepthConstraint) -> Self {
        self.depth = Some(depth);
        self
    }

    /// 属性または深さの条件が1つでもあるか
    pub fn has_constraint(&self) -> bool {
        self.depth.is_some() || self.constrained_attributes().next().is_some()
    }

    /// 深さ条件を外したコピー
    pub fn without_depth(&self) -> Self {
        Self {
            values: self.values.clone(),
            depth: None,
            pending: self.pending.clone(),
        }
    }

    /// ペア補完用の母集団クエリ（作業名 + 下地の状況のみ）
    pub fn base_for_pairing(&self) -> Self {
        let values = [Attribute::TaskName, Attribute::Substrate]
            .into_iter()
            .filter_map(|a| self.values.get(&a).map(|v| (a, v.clone())))
            .collect();
        Self {
            values,
            depth: None,
            pending: VecDeque::new(),
        }
    }

    /// 他方の条件を足し込んだコピー（深さは other を優先）
    pub fn merged(&self, other: &StructuredQuery) -> Self {
        let mut merged = self.clone();
        for (attribute, values) in &other.values {
            for value in values {
                merged.add_value(*attribute, value);
            }
        }
        if other.depth.is_some() {
            merged.depth = other.depth.clone();
        }
        merged
    }

    /// 保留中の確認を積む（同じ語は重複させない）
    pub fn push_clarification(&mut self, clarification: Clarification) {
        if self.pending.iter().all(|c| c.term != clarification.term) {
            self.pending.push_back(clarification);
        }
    }

    /// 次に尋ねる確認
    pub fn next_clarification(&self) -> Option<&Clarification> {
        self.pending.front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 確認待ちの属性（エイリアス解決で値を割り当てない）
    pub fn suppressed_attributes(&self) -> BTreeSet<Attribute> {
        self.pending.iter().flat_map(|c| c.attributes()).collect()
    }

    /// 先頭の確認に回答する
    ///
    /// 採用された値は対象属性に追記し、確認を取り除く。
    /// 解釈できない回答では何も変えない。
    pub fn answer(&mut self, text: &str) -> AnswerResolution {
        let Some(clarification) = self.pending.front() else {
            return AnswerResolution::Unresolved;
        };
        let Some(answer) = ClarificationAnswer::parse(text) else {
            return AnswerResolution::Unresolved;
        };

        let resolution = clarification.resolve(&answer);
        match &resolution {
            AnswerResolution::Applied(chosen) => {
                for candidate in chosen {
                    self.add_value(candidate.attribute, &candidate.value);
                }
                self.pending.pop_front();
            }
            AnswerResolution::Skipped => {
                self.pending.pop_front();
            }
            AnswerResolution::Unresolved => {}
        }
        resolution
    }

    /// 抽出条件の説明文
    pub fn explain(&self) -> String {
        let mut parts: Vec<String> = self
            .values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(a, v)| format!("{}=[{}]", a.column(), v.join(", ")))
            .collect();
        if let Some(depth) = &self.depth {
            parts.push(format!("深さ={}", depth));
        }
        if parts.is_empty() {
            "抽出条件: （該当なし）".to_string()
        } else {
            format!("抽出条件: {}", parts.join(", "))
        }
    }
}
