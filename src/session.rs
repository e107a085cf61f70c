//! 会話ごとの状態保存
//!
//! 会話キーで分離した状態を get / put / delete する。
//! 単一プロセスならメモリ上のストアで足りる。

use koho_finder_common::{RefinementSession, StructuredQuery};
use std::collections::HashMap;
use std::sync::Mutex;

/// 会話の状態
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// 確認待ちのクエリ
    pub pending: Option<StructuredQuery>,
    /// 絞り込み中のセッション
    pub refinement: RefinementSession,
    /// 推奨範囲外だったクエリ（深さだけの再指定で使う）
    pub range_out: Option<StructuredQuery>,
}

/// 会話状態ストア
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<ConversationState>;
    fn put(&self, key: &str, state: ConversationState);
    fn delete(&self, key: &str);
}

/// メモリ上のストア
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: Mutex<HashMap<String, ConversationState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ConversationState>> {
        // poison は無視して中身を使う
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Option<ConversationState> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: &str, state: ConversationState) {
        self.lock().insert(key.to_string(), state);
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koho_finder_common::Attribute;

    #[test]
    fn test_put_get_delete() {
        let store = InMemorySessionStore::new();
        assert!(store.get("u1").is_none());

        let state = ConversationState {
            pending: Some(StructuredQuery::new().with_value(Attribute::TaskName, "表面ハツリ")),
            ..Default::default()
        };
        store.put("u1", state);
        assert_eq!(store.len(), 1);

        let loaded = store.get("u1").unwrap();
        assert_eq!(
            loaded.pending.unwrap().values(Attribute::TaskName),
            ["表面ハツリ"]
        );

        store.delete("u1");
        assert!(store.is_empty());
    }

    #[test]
    fn test_conversations_are_isolated() {
        let store = InMemorySessionStore::new();
        store.put("a", ConversationState::default());
        store.put(
            "b",
            ConversationState {
                pending: Some(StructuredQuery::new()),
                ..Default::default()
            },
        );
        assert!(store.get("a").unwrap().pending.is_none());
        assert!(store.get("b").unwrap().pending.is_some());
    }
}
