//! カタログの型定義
//!
//! - Attribute: 検索対象の列（優先度順の全順序を持つ）
//! - CatalogRecord: データセットの1行
//! - StageIndicator / EfficiencyRank: 工程数・作業効率評価の正規化値

use crate::normalize::canon_key;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 深さ・厚さ列の見出し
pub const DEPTH_COLUMN: &str = "処理する深さ・厚さ";
/// 作業ID列の見出し（任意列）
pub const WORK_ID_COLUMN: &str = "作業ID";

/// 文字列属性
///
/// 宣言順がエイリアス衝突時の優先度（小さいほど強い）になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    TaskName,
    Substrate,
    DeviceModel,
    MachineCategory,
    CutterName,
    Stage,
    Efficiency,
}

impl Attribute {
    /// 優先度順の全属性
    pub const ALL: [Attribute; 7] = [
        Attribute::TaskName,
        Attribute::Substrate,
        Attribute::DeviceModel,
        Attribute::MachineCategory,
        Attribute::CutterName,
        Attribute::Stage,
        Attribute::Efficiency,
    ];

    /// 優先度（0が最強）
    pub fn priority(self) -> u8 {
        self as u8
    }

    /// CSVの列見出し
    pub fn column(self) -> &'static str {
        match self {
            Attribute::TaskName => "作業名",
            Attribute::Substrate => "下地の状況",
            Attribute::DeviceModel => "ライナックス機種名",
            Attribute::MachineCategory => "機械カテゴリー",
            Attribute::CutterName => "使用カッター名",
            Attribute::Stage => "工程数",
            Attribute::Efficiency => "作業効率評価",
        }
    }

    /// 設定ファイル用の英字キー
    pub fn key(self) -> &'static str {
        match self {
            Attribute::TaskName => "task_name",
            Attribute::Substrate => "substrate",
            Attribute::DeviceModel => "device_model",
            Attribute::MachineCategory => "machine_category",
            Attribute::CutterName => "cutter_name",
            Attribute::Stage => "stage",
            Attribute::Efficiency => "efficiency",
        }
    }

    /// 列見出しまたは英字キーから属性を引く
    pub fn from_column(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.column() == name || a.key() == name)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// 工程区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageIndicator {
    Single,
    Primary,
    Secondary,
}

impl StageIndicator {
    /// 工程数の自由表記を正規化（認識できなければ None）
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim().to_uppercase();
        if s.is_empty() {
            return None;
        }
        if s.contains("単一") || s.contains("SINGLE") {
            return Some(StageIndicator::Single);
        }
        if s.starts_with('A') || s.contains("一次") || s.contains("1次") {
            return Some(StageIndicator::Primary);
        }
        if s.starts_with('B') || s.contains("二次") || s.contains("2次") {
            return Some(StageIndicator::Secondary);
        }
        None
    }

    /// 対になる工程
    pub fn opposite(self) -> Option<Self> {
        match self {
            StageIndicator::Primary => Some(StageIndicator::Secondary),
            StageIndicator::Secondary => Some(StageIndicator::Primary),
            StageIndicator::Single => None,
        }
    }
}

impl fmt::Display for StageIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageIndicator::Single => write!(f, "単一"),
            StageIndicator::Primary => write!(f, "一次工程"),
            StageIndicator::Secondary => write!(f, "二次工程"),
        }
    }
}

/// 作業効率評価（◎ < ○/〇 < △ < 未評価 の昇順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EfficiencyRank {
    Excellent,
    Good,
    Fair,
    Unrated,
}

impl EfficiencyRank {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "◎" => EfficiencyRank::Excellent,
            "○" | "〇" => EfficiencyRank::Good,
            "△" => EfficiencyRank::Fair,
            _ => EfficiencyRank::Unrated,
        }
    }
}

/// 工程ペアのグループキー
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    WorkId(String),
    Triple(String, String, String),
}

/// データセットの1行（読み込み後は不変）
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// 作業ID（無い場合は空）
    #[serde(default)]
    pub work_id: String,
    pub task_name: String,        // 作業名
    pub substrate: String,        // 下地の状況
    pub depth: String,            // 処理する深さ・厚さ
    pub stage: String,            // 工程数
    pub machine_category: String, // 機械カテゴリー
    pub device_model: String,     // ライナックス機種名
    pub cutter_name: String,      // 使用カッター名
    pub efficiency: String,       // 作業効率評価
}

impl CatalogRecord {
    /// 属性のセル値
    pub fn get(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::TaskName => &self.task_name,
            Attribute::Substrate => &self.substrate,
            Attribute::DeviceModel => &self.device_model,
            Attribute::MachineCategory => &self.machine_category,
            Attribute::CutterName => &self.cutter_name,
            Attribute::Stage => &self.stage,
            Attribute::Efficiency => &self.efficiency,
        }
    }

    pub fn stage_indicator(&self) -> Option<StageIndicator> {
        StageIndicator::parse(&self.stage)
    }

    pub fn efficiency_rank(&self) -> EfficiencyRank {
        EfficiencyRank::parse(&self.efficiency)
    }

    /// 一次/二次のペアを組むためのキー（作業ID優先）
    pub fn group_key(&self) -> GroupKey {
        let id = self.work_id.trim();
        if !id.is_empty() {
            return GroupKey::WorkId(id.to_string());
        }
        GroupKey::Triple(
            canon_key(&self.task_name),
            canon_key(&self.substrate),
            canon_key(&self.depth),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_priority_order() {
        let mut attrs = vec![Attribute::Efficiency, Attribute::DeviceModel, Attribute::TaskName];
        attrs.sort();
        assert_eq!(attrs, vec![Attribute::TaskName, Attribute::DeviceModel, Attribute::Efficiency]);
        assert!(Attribute::Substrate.priority() < Attribute::MachineCategory.priority());
    }

    #[test]
    fn test_attribute_from_column() {
        assert_eq!(Attribute::from_column("作業名"), Some(Attribute::TaskName));
        assert_eq!(Attribute::from_column("cutter_name"), Some(Attribute::CutterName));
        assert_eq!(Attribute::from_column(DEPTH_COLUMN), None);
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!(StageIndicator::parse("単一"), Some(StageIndicator::Single));
        assert_eq!(StageIndicator::parse("一次工程"), Some(StageIndicator::Primary));
        assert_eq!(StageIndicator::parse("二次工程"), Some(StageIndicator::Secondary));
        assert_eq!(StageIndicator::parse("b"), Some(StageIndicator::Secondary));
        assert_eq!(StageIndicator::parse("その他"), None);
        assert_eq!(StageIndicator::parse(""), None);
    }

    #[test]
    fn test_efficiency_rank_order() {
        assert!(EfficiencyRank::parse("◎") < EfficiencyRank::parse("○"));
        assert_eq!(EfficiencyRank::parse("○"), EfficiencyRank::parse("〇"));
        assert!(EfficiencyRank::parse("△") < EfficiencyRank::parse(""));
    }

    #[test]
    fn test_group_key_prefers_work_id() {
        let mut record = CatalogRecord {
            task_name: "表面ハツリ".into(),
            substrate: "コンクリート".into(),
            depth: "3-5mm".into(),
            ..Default::default()
        };
        assert!(matches!(record.group_key(), GroupKey::Triple(..)));
        record.work_id = "W-01".into();
        assert_eq!(record.group_key(), GroupKey::WorkId("W-01".into()));
    }
}
