//! 규칙 매칭 로직 — 술어 컴파일 및 평가
//!
//! [`CompiledRule`]은 규칙의 CIDR/정규식 술어를 등록 시점에 한 번만
//! 컴파일하여 매칭 시 재컴파일 오버헤드를 제거합니다.
//!
//! 잘못된 술어 텍스트(불법 CIDR, 불법 정규식)는 설정 문제이므로 경고
//! 진단을 남기고, 해당 규칙은 영구히 닫힌 상태(fail closed)로 평가됩니다 —
//! 파이프라인은 이후 규칙을 계속 평가합니다.

use std::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;

use logship_core::types::{ParsedMessage, Rule};

/// 컴파일된 술어 상태
///
/// 술어 부재(와일드카드)와 술어 불량(fail closed)을 구분합니다.
#[derive(Debug)]
enum Predicate<T> {
    /// 술어가 설정되지 않음 — 항상 통과
    Absent,
    /// 컴파일된 술어
    Compiled(T),
    /// 술어 텍스트가 불량 — 항상 실패
    Invalid,
}

/// 술어가 미리 컴파일된 규칙
///
/// 평가 순서는 고정되어 있습니다: 출발지 네트워크 → 호스트명 → 앱 이름 →
/// facility → severity → 메시지 정규식. 첫 실패에서 단락 평가합니다.
#[derive(Debug)]
pub struct CompiledRule {
    /// 원본 규칙
    rule: Rule,
    /// 출발지 네트워크 술어
    network: Predicate<IpNet>,
    /// 메시지 정규식 술어
    pattern: Predicate<Regex>,
}

impl CompiledRule {
    /// 규칙의 술어를 컴파일합니다.
    ///
    /// 불량 술어는 warning 진단을 남기고 fail-closed로 표시합니다.
    /// 이 함수는 실패하지 않습니다 — 불량 규칙도 저장소에는 들어가되
    /// 절대 매칭되지 않을 뿐입니다.
    pub fn compile(rule: Rule) -> Self {
        let network = match rule.source_cidr.as_deref() {
            None => Predicate::Absent,
            Some(text) => match parse_network(text) {
                Some(net) => Predicate::Compiled(net),
                None => {
                    tracing::warn!(
                        rule_id = rule.id,
                        source_cidr = text,
                        "invalid source network in rule, rule will never match"
                    );
                    Predicate::Invalid
                }
            },
        };

        let pattern = match rule.message_regex.as_deref() {
            None => Predicate::Absent,
            Some(text) => match Regex::new(text) {
                Ok(regex) => Predicate::Compiled(regex),
                Err(e) => {
                    tracing::warn!(
                        rule_id = rule.id,
                        message_regex = text,
                        error = %e,
                        "invalid regex in rule, rule will never match"
                    );
                    Predicate::Invalid
                }
            },
        };

        Self {
            rule,
            network,
            pattern,
        }
    }

    /// 원본 규칙에 대한 참조를 반환합니다.
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// 규칙 id를 반환합니다.
    pub fn id(&self) -> i64 {
        self.rule.id
    }

    /// 규칙이 메시지에 매칭되는지 평가합니다.
    ///
    /// 비활성 규칙은 절대 매칭되지 않습니다. 설정된 술어는 모두 통과해야
    /// 하며, 부재 술어는 와일드카드로 항상 통과합니다.
    pub fn matches(&self, source_ip: IpAddr, parsed: &ParsedMessage, raw: &str) -> bool {
        if !self.rule.enabled {
            return false;
        }

        match &self.network {
            Predicate::Absent => {}
            Predicate::Compiled(net) => {
                if !net.contains(&source_ip) {
                    return false;
                }
            }
            Predicate::Invalid => return false,
        }

        if let Some(hostname) = self.rule.hostname.as_deref()
            && parsed.hostname.as_deref() != Some(hostname)
        {
            return false;
        }

        if let Some(app_name) = self.rule.app_name.as_deref()
            && parsed.app_name.as_deref() != Some(app_name)
        {
            return false;
        }

        if let Some(facility) = self.rule.facility.as_deref()
            && parsed.facility.as_deref() != Some(facility)
        {
            return false;
        }

        if let Some(severity) = self.rule.severity.as_deref()
            && parsed.severity.as_deref() != Some(severity)
        {
            return false;
        }

        match &self.pattern {
            Predicate::Absent => {}
            Predicate::Compiled(regex) => {
                // 전체 일치가 아니라 검색(search)입니다 — 원문 어디든 매칭되면 통과
                if !regex.is_match(raw) {
                    return false;
                }
            }
            Predicate::Invalid => return false,
        }

        true
    }
}

/// CIDR 또는 단일 IP 텍스트를 네트워크로 해석합니다.
///
/// 단일 IP는 /32 (IPv4) 또는 /128 (IPv6) 네트워크로 취급합니다.
fn parse_network(text: &str) -> Option<IpNet> {
    if let Ok(net) = text.parse::<IpNet>() {
        return Some(net);
    }
    text.parse::<IpAddr>().ok().map(IpNet::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_core::types::ParsedMessage;

    fn base_rule(id: i64) -> Rule {
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

    fn sample_parsed() -> ParsedMessage {
        ParsedMessage {
            hostname: Some("host1".to_owned()),
            app_name: Some("app".to_owned()),
            facility: Some("1".to_owned()),
            severity: Some("6".to_owned()),
            message: "hello".to_owned(),
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn wildcard_rule_matches_everything() {
        let compiled = CompiledRule::compile(base_rule(1));
        assert!(compiled.matches(ip("10.0.0.5"), &sample_parsed(), "anything"));
        assert!(compiled.matches(ip("::1"), &ParsedMessage::default(), ""));
    }

    #[test]
    fn disabled_rule_never_matches() {
        let mut rule = base_rule(1);
        rule.enabled = false;
        let compiled = CompiledRule::compile(rule);
        assert!(!compiled.matches(ip("10.0.0.5"), &sample_parsed(), "anything"));
    }

    #[test]
    fn cidr_predicate_matches_network() {
        let mut rule = base_rule(1);
        rule.source_cidr = Some("10.0.0.0/24".to_owned());
        let compiled = CompiledRule::compile(rule);
        assert!(compiled.matches(ip("10.0.0.5"), &sample_parsed(), "x"));
        assert!(!compiled.matches(ip("10.0.1.5"), &sample_parsed(), "x"));
    }

    #[test]
    fn bare_ip_is_host_network() {
        let mut rule = base_rule(1);
        rule.source_cidr = Some("192.168.1.10".to_owned());
        let compiled = CompiledRule::compile(rule);
        assert!(compiled.matches(ip("192.168.1.10"), &sample_parsed(), "x"));
        assert!(!compiled.matches(ip("192.168.1.11"), &sample_parsed(), "x"));
    }

    #[test]
    fn ipv6_cidr_predicate() {
        let mut rule = base_rule(1);
        rule.source_cidr = Some("fd00::/8".to_owned());
        let compiled = CompiledRule::compile(rule);
        assert!(compiled.matches(ip("fd00::1"), &sample_parsed(), "x"));
        assert!(!compiled.matches(ip("2001:db8::1"), &sample_parsed(), "x"));
    }

    #[test]
    fn malformed_cidr_fails_closed() {
        let mut rule = base_rule(1);
        rule.source_cidr = Some("not-a-network".to_owned());
        let compiled = CompiledRule::compile(rule);
        // 다른 술어가 전부 통과해도 매칭되지 않습니다
        assert!(!compiled.matches(ip("10.0.0.5"), &sample_parsed(), "x"));
    }

    #[test]
    fn hostname_exact_equality() {
        let mut rule = base_rule(1);
        rule.hostname = Some("host1".to_owned());
        let compiled = CompiledRule::compile(rule);
        assert!(compiled.matches(ip("10.0.0.5"), &sample_parsed(), "x"));

        let mut other = sample_parsed();
        other.hostname = Some("host2".to_owned());
        assert!(!compiled.matches(ip("10.0.0.5"), &other, "x"));
    }

    #[test]
    fn hostname_predicate_fails_when_absent_from_message() {
        let mut rule = base_rule(1);
        rule.hostname = Some("host1".to_owned());
        let compiled = CompiledRule::compile(rule);
        assert!(!compiled.matches(ip("10.0.0.5"), &ParsedMessage::default(), "x"));
    }

    #[test]
    fn app_facility_severity_predicates() {
        let mut rule = base_rule(1);
        rule.app_name = Some("app".to_owned());
        rule.facility = Some("1".to_owned());
        rule.severity = Some("6".to_owned());
        let compiled = CompiledRule::compile(rule);
        assert!(compiled.matches(ip("10.0.0.5"), &sample_parsed(), "x"));

        let mut wrong_severity = sample_parsed();
        wrong_severity.severity = Some("3".to_owned());
        assert!(!compiled.matches(ip("10.0.0.5"), &wrong_severity, "x"));
    }

    #[test]
    fn regex_searches_raw_text() {
        let mut rule = base_rule(1);
        rule.message_regex = Some(r"Failed\s+password".to_owned());
        let compiled = CompiledRule::compile(rule);
        // 검색이므로 원문 중간에 있어도 매칭됩니다
        assert!(compiled.matches(
            ip("10.0.0.5"),
            &sample_parsed(),
            "<34>Aug 11 00:00:00 h sshd: Failed  password for root"
        ));
        assert!(!compiled.matches(ip("10.0.0.5"), &sample_parsed(), "session opened"));
    }

    #[test]
    fn invalid_regex_fails_closed() {
        let mut rule = base_rule(1);
        rule.message_regex = Some("[invalid".to_owned());
        let compiled = CompiledRule::compile(rule);
        assert!(!compiled.matches(ip("10.0.0.5"), &sample_parsed(), "anything"));
    }

    #[test]
    fn all_predicates_must_pass() {
        let mut rule = base_rule(1);
        rule.source_cidr = Some("10.0.0.0/24".to_owned());
        rule.hostname = Some("host1".to_owned());
        rule.message_regex = Some("hello".to_owned());
        let compiled = CompiledRule::compile(rule);

        assert!(compiled.matches(ip("10.0.0.5"), &sample_parsed(), "say hello"));
        // CIDR 실패
        assert!(!compiled.matches(ip("172.16.0.1"), &sample_parsed(), "say hello"));
        // 정규식 실패
        assert!(!compiled.matches(ip("10.0.0.5"), &sample_parsed(), "goodbye"));
    }

    #[test]
    fn adding_predicate_only_narrows() {
        // 술어 추가는 매칭 집합을 좁힐 수만 있습니다 (단조성)
        let wide = CompiledRule::compile(base_rule(1));
        let mut narrow_rule = base_rule(1);
        narrow_rule.hostname = Some("host1".to_owned());
        let narrow = CompiledRule::compile(narrow_rule);

        let samples = [
            (ip("10.0.0.5"), sample_parsed(), "hello"),
            (ip("10.0.0.5"), ParsedMessage::default(), ""),
            (ip("::1"), sample_parsed(), "other"),
        ];
        for (src, parsed, raw) in &samples {
            if narrow.matches(*src, parsed, raw) {
                assert!(wide.matches(*src, parsed, raw));
            }
        }
    }

    #[test]
    fn parse_network_accepts_cidr_and_bare_ip() {
        assert!(parse_network("10.0.0.0/24").is_some());
        assert!(parse_network("10.0.0.1").is_some());
        assert!(parse_network("fd00::/8").is_some());
        assert!(parse_network("fd00::1").is_some());
        assert!(parse_network("").is_none());
        assert!(parse_network("10.0.0.0/33").is_none());
        assert!(parse_network("example.com").is_none());
    }
}
