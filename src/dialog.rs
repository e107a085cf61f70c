//! 会話ドライバ
//!
//! 1メッセージごとに「リセット/終了 → 確認への回答 → 絞り込み操作 → 新規検索」の順で処理する。
//! 状態は `SessionStore` に会話キーで保存する。

use crate::render::{render_clarification, render_range_out, render_records, render_rows, render_suggestion};
use crate::session::{ConversationState, SessionStore};
use koho_finder_common::{
    AnswerResolution, Clarification, Finder, OutcomeStatus, SessionState, StructuredQuery,
};
use regex::Regex;
use serde::Serialize;

pub const WELCOME: &str = "探したい作業内容を入力してください（例: 雨うたれを3mm削りたい）。\n（ヒント: 途中で『やり直す』『終了』と入力できます）";
const MSG_RESET: &str = "条件をリセットしました。探したい作業内容を入力してください。";
const MSG_END: &str = "終了しました。いつでも検索を再開できます。";
const MSG_UNRESOLVED: &str = "回答を読み取れませんでした。番号かラベルで答えてください。";
const MSG_NO_MORE_UNDO: &str = "これ以上戻れません。";
const HINT_UNDO: &str = "（『戻る』で1つ前の条件に戻れます）";

/// 返信
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    /// クイック返信の候補
    pub quick: Vec<String>,
}

impl Reply {
    fn new(text: impl Into<String>, quick: Vec<String>) -> Self {
        Self {
            text: text.into(),
            quick,
        }
    }
}

/// 入力の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Reset,
    End,
    Undo,
    ShowAll,
    Top(Option<usize>),
    Text,
}

fn parse_command(text: &str) -> Command {
    lazy_static::lazy_static! {
        static ref TOP_RE: Regex = Regex::new(r"(?i)^(?:上位|top)\s*(\d+)?\s*件?$").unwrap();
    }

    let t = koho_finder_common::normalize(text);
    let lower = t.to_lowercase();
    match lower.as_str() {
        "やり直す" | "やりなおす" | "reset" | "リセット" => return Command::Reset,
        "終了" | "終わり" | "exit" | "quit" => return Command::End,
        "戻る" | "もどる" | "戻す" | "undo" => return Command::Undo,
        "全部" | "すべて" | "全件" | "all" => return Command::ShowAll,
        _ => {}
    }
    if let Some(cap) = TOP_RE.captures(&lower) {
        return Command::Top(cap.get(1).and_then(|m| m.as_str().parse().ok()));
    }
    Command::Text
}

/// 終了の指示か
pub fn is_end_command(text: &str) -> bool {
    parse_command(text.trim()) == Command::End
}

fn controls() -> Vec<String> {
    vec!["やり直す".to_string(), "終了".to_string()]
}

/// 会話ドライバ
pub struct Dialog<'a, S: SessionStore> {
    finder: &'a Finder,
    store: S,
    top_n: usize,
}

impl<'a, S: SessionStore> Dialog<'a, S> {
    pub fn new(finder: &'a Finder, store: S, top_n: usize) -> Self {
        Self { finder, store, top_n }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 1メッセージを処理して返信を作る
    pub fn handle(&self, key: &str, text: &str) -> Reply {
        let text = text.trim();
        let command = parse_command(text);
        match command {
            Command::Reset => {
                self.store.delete(key);
                return Reply::new(MSG_RESET, vec!["終了".to_string()]);
            }
            Command::End => {
                self.store.delete(key);
                return Reply::new(MSG_END, Vec::new());
            }
            _ => {}
        }

        let mut state = self.store.get(key).unwrap_or_default();
        let reply = self.dispatch(&mut state, command, text);
        self.store.put(key, state);
        reply
    }

    fn dispatch(&self, state: &mut ConversationState, command: Command, text: &str) -> Reply {
        if let Some(mut query) = state.pending.take() {
            return match query.answer(text) {
                AnswerResolution::Unresolved => {
                    let reply = match query.next_clarification() {
                        Some(next) => {
                            let mut reply = self.ask(next);
                            reply.text = format!("{}\n{}", MSG_UNRESOLVED, reply.text);
                            reply
                        }
                        None => Reply::new(MSG_UNRESOLVED, controls()),
                    };
                    state.pending = Some(query);
                    reply
                }
                AnswerResolution::Applied(_) | AnswerResolution::Skipped => {
                    if let Some(next) = query.next_clarification() {
                        let reply = self.ask(next);
                        state.pending = Some(query);
                        reply
                    } else {
                        self.search(state, query)
                    }
                }
            };
        }

        if state.refinement.state() == SessionState::Accumulating {
            if let Some(reply) = self.refine(state, command, text) {
                return reply;
            }
        }

        let (query, clarification) = self.finder.resolve(text, None);
        tracing::debug!(query = %query.explain(), "request resolved");

        // 範囲外の直後に深さだけ来たら、前の条件のまま深さを差し替える
        if let Some(previous) = state.range_out.take() {
            if clarification.is_none() && is_depth_only(&query) {
                let mut retried = previous.without_depth();
                retried.set_depth(query.depth().cloned());
                tracing::debug!(query = %retried.explain(), "depth replaced after range out");
                return self.search(state, retried);
            }
        }

        if let Some(clarification) = clarification {
            let reply = self.ask(&clarification);
            state.pending = Some(query);
            return reply;
        }
        self.search(state, query)
    }

    /// 絞り込み中の操作（該当しなければ None で新規検索へ）
    fn refine(&self, state: &mut ConversationState, command: Command, text: &str) -> Option<Reply> {
        let catalog = self.finder.catalog();
        let session = &mut state.refinement;
        match command {
            Command::Undo => {
                if session.pop(catalog).is_some() {
                    Some(self.refinement_reply(state))
                } else {
                    let mut reply = self.refinement_reply(state);
                    reply.text = format!("{}\n{}", MSG_NO_MORE_UNDO, reply.text);
                    Some(reply)
                }
            }
            Command::ShowAll => {
                let query = session.effective_query().unwrap_or_default();
                let rows = self.finder.present(&query, &session.show_all());
                Some(Reply::new(render_rows(&rows), controls()))
            }
            Command::Top(n) => {
                let records = session.top_n(n.unwrap_or(self.top_n));
                Some(Reply::new(render_records(&records), controls()))
            }
            Command::Text => {
                session.choose(catalog, text)?;
                Some(self.refinement_reply(state))
            }
            Command::Reset | Command::End => None,
        }
    }

    fn refinement_reply(&self, state: &ConversationState) -> Reply {
        let session = &state.refinement;
        let Some(outcome) = session.outcome() else {
            return Reply::new(MSG_RESET, controls());
        };

        match outcome.status {
            OutcomeStatus::NeedRefine => {
                let mut quick = Vec::new();
                let text = match session.suggestion() {
                    Some(suggestion) => {
                        quick.extend(suggestion.options.iter().cloned());
                        format!("{}\n\n{}", outcome.message, render_suggestion(&suggestion, self.top_n))
                    }
                    None => format!(
                        "{}\n絞り込める候補がありません。『全部』か『上位{}』を選んでください。",
                        outcome.message, self.top_n
                    ),
                };
                quick.push("全部".to_string());
                quick.push(format!("上位{}", self.top_n));
                if !session.applied().is_empty() {
                    quick.push("戻る".to_string());
                }
                quick.extend(controls());
                Reply::new(text, quick)
            }
            OutcomeStatus::Ok => {
                let query = session.effective_query().unwrap_or_default();
                let rows = self.finder.present(&query, &outcome.hits);
                Reply::new(format!("{}\n{}", render_rows(&rows), HINT_UNDO), with_undo(controls()))
            }
            OutcomeStatus::RangeOut => Reply::new(
                format!("{}\n{}", render_range_out(outcome), HINT_UNDO),
                with_undo(controls()),
            ),
            OutcomeStatus::NoResults | OutcomeStatus::InvalidConditions => Reply::new(
                format!("{}\n{}", outcome.message, HINT_UNDO),
                with_undo(controls()),
            ),
        }
    }

    fn ask(&self, clarification: &Clarification) -> Reply {
        let mut quick: Vec<String> = (1..=clarification.candidates.len()).map(|i| i.to_string()).collect();
        quick.push("全部".to_string());
        quick.push("わからない".to_string());
        Reply::new(render_clarification(clarification), quick)
    }

    /// 新しいクエリで検索し、結果に応じて絞り込みを開閉する
    fn search(&self, state: &mut ConversationState, query: StructuredQuery) -> Reply {
        let outcome = self.finder.evaluate(&query);
        match outcome.status {
            OutcomeStatus::InvalidConditions | OutcomeStatus::NoResults => {
                state.refinement.reset();
                state.range_out = None;
                Reply::new(outcome.message, controls())
            }
            OutcomeStatus::RangeOut => {
                state.refinement.reset();
                let mut quick = outcome.depth_candidates.clone();
                quick.extend(controls());
                let reply = Reply::new(render_range_out(&outcome), quick);
                state.range_out = Some(query);
                reply
            }
            OutcomeStatus::NeedRefine => {
                state.range_out = None;
                state.refinement = self.finder.open_refinement(query, outcome);
                self.refinement_reply(state)
            }
            OutcomeStatus::Ok => {
                state.refinement.reset();
                state.range_out = None;
                let rows = self.finder.present(&query, &outcome.hits);
                Reply::new(format!("{}\n{}", query.explain(), render_rows(&rows)), controls())
            }
        }
    }
}

/// 深さ条件だけのクエリか
fn is_depth_only(query: &StructuredQuery) -> bool {
    query.depth().is_some() && query.constrained_attributes().next().is_none() && query.pending_len() == 0
}

fn with_undo(mut quick: Vec<String>) -> Vec<String> {
    quick.insert(0, "戻る".to_string());
    quick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("やり直す"), Command::Reset);
        assert_eq!(parse_command("QUIT"), Command::End);
        assert_eq!(parse_command("戻る"), Command::Undo);
        assert_eq!(parse_command("全部"), Command::ShowAll);
        assert_eq!(parse_command("上位3"), Command::Top(Some(3)));
        assert_eq!(parse_command("top"), Command::Top(None));
        assert_eq!(parse_command("上位５件"), Command::Top(Some(5)));
        assert_eq!(parse_command("雨うたれ"), Command::Text);
        assert!(is_end_command(" 終了 "));
    }

    #[test]
    fn test_is_depth_only() {
        use koho_finder_common::{Attribute, DepthConstraint};

        assert!(is_depth_only(&StructuredQuery::new().with_depth(DepthConstraint::Point(1.0))));
        assert!(!is_depth_only(&StructuredQuery::new()));
        assert!(!is_depth_only(
            &StructuredQuery::new()
                .with_value(Attribute::TaskName, "雨打たれ処理")
                .with_depth(DepthConstraint::Point(1.0))
        ));
    }
}
