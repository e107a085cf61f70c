//! 工法カタログ検索 共通ライブラリ
//!
//! 自由文の要望を構造化クエリに変換し、データセットと照合して
//! 判定・ペア補完・絞り込みまでを行う。端末入出力は持たない。

pub mod alias;
pub mod ambiguity;
pub mod catalog;
pub mod depth;
pub mod error;
pub mod finder;
pub mod matcher;
pub mod normalize;
pub mod outcome;
pub mod pairing;
pub mod query;
pub mod refine;
pub mod resolver;
pub mod types;

pub use alias::{AliasIndex, AliasResolver, AliasTable, AttributePriority, CompletionMode, SynonymSource};
pub use ambiguity::{AmbiguityRules, AnswerResolution, Candidate, Clarification, ClarificationAnswer};
pub use catalog::{Catalog, Vocabulary};
pub use depth::{DepthRange, DepthRequest};
pub use error::{Error, Result};
pub use finder::{Finder, FinderSettings};
pub use normalize::normalize;
pub use outcome::{FacetTable, MatchOutcome, OutcomePolicy, OutcomeStatus};
pub use pairing::{PresentedRow, RowRole};
pub use query::{DepthConstraint, StructuredQuery};
pub use refine::{FacetChoice, FacetKey, RefinementSession, SessionState, Suggestion};
pub use types::{Attribute, CatalogRecord, EfficiencyRank, StageIndicator};
