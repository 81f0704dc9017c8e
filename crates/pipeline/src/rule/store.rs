//! 공유 규칙 저장소 — id 오름차순 평가와 쓰기 직후 읽기 가시성
//!
//! [`RuleStore`]는 파이프라인과 관리 표면이 공유하는 규칙 맵입니다.
//! `BTreeMap`이 id 오름차순 순회를 보장하므로, 저장 순서와 무관하게
//! "오름차순 id로 평가, 첫 매칭 반환" 계약이 성립합니다.
//!
//! 쓰기는 관리 표면에서 비동기적으로 도착하며, 같은 프로세스 안에서는
//! 다음에 평가되는 메시지부터 즉시 보입니다 (`RwLock` 쓰기 해제 이후).

use std::collections::BTreeMap;
use std::net::IpAddr;

use tokio::sync::RwLock;

use logship_core::types::{ParsedMessage, Rule};

use super::matcher::CompiledRule;

/// 공유 규칙 저장소
///
/// 여러 태스크가 동시에 읽고(`first_match`), 관리 표면이 드물게 씁니다.
#[derive(Debug, Default)]
pub struct RuleStore {
    /// id -> 컴파일된 규칙 (BTreeMap이 오름차순 순회를 보장)
    rules: RwLock<BTreeMap<i64, CompiledRule>>,
}

impl RuleStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙을 추가하거나 교체합니다.
    ///
    /// 술어는 이 시점에 한 번 컴파일됩니다. 같은 id의 기존 규칙은
    /// 교체되며 이전 규칙을 반환합니다.
    pub async fn insert(&self, rule: Rule) -> Option<Rule> {
        let compiled = CompiledRule::compile(rule);
        let mut rules = self.rules.write().await;
        let previous = rules.insert(compiled.id(), compiled);
        metrics::gauge!(logship_core::metrics::RULES_LOADED).set(rules.len() as f64);
        previous.map(|c| c.rule().clone())
    }

    /// 규칙을 제거합니다.
    pub async fn remove(&self, id: i64) -> Option<Rule> {
        let mut rules = self.rules.write().await;
        let removed = rules.remove(&id);
        metrics::gauge!(logship_core::metrics::RULES_LOADED).set(rules.len() as f64);
        removed.map(|c| c.rule().clone())
    }

    /// 저장소 내용을 주어진 규칙들로 통째로 교체합니다.
    pub async fn replace_all(&self, new_rules: Vec<Rule>) {
        let mut compiled = BTreeMap::new();
        for rule in new_rules {
            let rule_id = rule.id;
            if compiled.insert(rule_id, CompiledRule::compile(rule)).is_some() {
                tracing::warn!(rule_id, "duplicate rule id in replace_all, last one wins");
            }
        }
        let mut rules = self.rules.write().await;
        *rules = compiled;
        metrics::gauge!(logship_core::metrics::RULES_LOADED).set(rules.len() as f64);
    }

    /// 현재 저장된 규칙 수를 반환합니다.
    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    /// 저장소가 비어있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }

    /// 저장된 규칙의 스냅샷을 id 오름차순으로 반환합니다.
    pub async fn snapshot(&self) -> Vec<Rule> {
        self.rules
            .read()
            .await
            .values()
            .map(|c| c.rule().clone())
            .collect()
    }

    /// 활성 규칙을 id 오름차순으로 평가하여 첫 매칭 규칙의 id를 반환합니다.
    ///
    /// 비활성 규칙과 fail-closed 규칙은 건너뜁니다. 매칭되는 규칙이 없으면
    /// None을 반환하며, 이후 규칙은 평가하지 않습니다 (첫 매칭 우선).
    pub async fn first_match(
        &self,
        source_ip: IpAddr,
        parsed: &ParsedMessage,
        raw: &str,
    ) -> Option<i64> {
        let rules = self.rules.read().await;
        for compiled in rules.values() {
            if compiled.matches(source_ip, parsed, raw) {
                return Some(compiled.id());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: i64) -> Rule {
        Rule {
            id,
            name: format!("rule-{id}"),
            enabled: true,
            source_cidr: None,
            hostname: None,
            app_name: None,
            facility: None,
            severity: None,
            message_regex: None,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn insert_and_remove() {
        let store = RuleStore::new();
        assert!(store.is_empty().await);

        store.insert(rule(1)).await;
        store.insert(rule(2)).await;
        assert_eq!(store.len().await, 2);

        let removed = store.remove(1).await;
        assert_eq!(removed.map(|r| r.id), Some(1));
        assert_eq!(store.len().await, 1);
        assert!(store.remove(99).await.is_none());
    }

    #[tokio::test]
    async fn insert_replaces_same_id() {
        let store = RuleStore::new();
        store.insert(rule(1)).await;
        let mut updated = rule(1);
        updated.name = "updated".to_owned();
        let previous = store.insert(updated).await;
        assert_eq!(previous.map(|r| r.name), Some("rule-1".to_owned()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn first_match_wins_in_ascending_id_order() {
        let store = RuleStore::new();
        // 삽입 순서와 무관하게 id 오름차순으로 평가됩니다
        store.insert(rule(2)).await;
        store.insert(rule(1)).await;

        let matched = store
            .first_match(ip("10.0.0.5"), &ParsedMessage::default(), "x")
            .await;
        assert_eq!(matched, Some(1));
    }

    #[tokio::test]
    async fn disabled_rules_are_skipped() {
        let store = RuleStore::new();
        let mut disabled = rule(1);
        disabled.enabled = false;
        store.insert(disabled).await;
        store.insert(rule(2)).await;

        let matched = store
            .first_match(ip("10.0.0.5"), &ParsedMessage::default(), "x")
            .await;
        assert_eq!(matched, Some(2));
    }

    #[tokio::test]
    async fn no_match_returns_none() {
        let store = RuleStore::new();
        let mut narrow = rule(1);
        narrow.hostname = Some("other-host".to_owned());
        store.insert(narrow).await;

        let matched = store
            .first_match(ip("10.0.0.5"), &ParsedMessage::default(), "x")
            .await;
        assert_eq!(matched, None);
    }

    #[tokio::test]
    async fn write_visible_to_next_read() {
        let store = RuleStore::new();
        let matched = store
            .first_match(ip("10.0.0.5"), &ParsedMessage::default(), "x")
            .await;
        assert_eq!(matched, None);

        store.insert(rule(7)).await;
        let matched = store
            .first_match(ip("10.0.0.5"), &ParsedMessage::default(), "x")
            .await;
        assert_eq!(matched, Some(7));
    }

    #[tokio::test]
    async fn replace_all_swaps_contents() {
        let store = RuleStore::new();
        store.insert(rule(1)).await;
        store.replace_all(vec![rule(10), rule(11)]).await;

        assert_eq!(store.len().await, 2);
        let snapshot = store.snapshot().await;
        let ids: Vec<i64> = snapshot.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[tokio::test]
    async fn snapshot_is_ascending() {
        let store = RuleStore::new();
        store.insert(rule(5)).await;
        store.insert(rule(3)).await;
        store.insert(rule(9)).await;
        let ids: Vec<i64> = store.snapshot().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
