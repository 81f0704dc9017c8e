//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 규칙, 파싱된 메시지, 처분(disposition) 레코드 등 모든 모듈이 공유하는
//! 데이터 구조를 정의합니다.

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 전송 프로토콜
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// UDP — 단발 데이터그램 전송
    #[default]
    Udp,
    /// TCP — 메시지당 단명 연결
    Tcp,
}

impl Protocol {
    /// 문자열에서 프로토콜을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "udp" => Some(Self::Udp),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => write!(f, "udp"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

/// 규칙 미매칭 시 적용되는 기본 동작
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    /// 차단 — 매칭되지 않은 메시지는 전달하지 않음 (기본값)
    #[default]
    Block,
    /// 전달 — 매칭되지 않은 메시지도 목적지로 전달
    Forward,
}

impl DefaultAction {
    /// 문자열에서 기본 동작을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "block" => Some(Self::Block),
            "forward" => Some(Self::Forward),
            _ => None,
        }
    }
}

impl fmt::Display for DefaultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Forward => write!(f, "forward"),
        }
    }
}

/// 전달 목적지
///
/// 설정에서 공급되며 프로세스 수명 동안 불변입니다.
/// 변경은 재시작 이후에 수신되는 메시지부터 적용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// 목적지 호스트 (IP 또는 호스트명)
    pub host: String,
    /// 목적지 포트
    pub port: u16,
    /// 전송 프로토콜
    pub protocol: Protocol,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.protocol)
    }
}

/// 분류 규칙
///
/// 관리 표면(외부)에서 작성되고, 코어는 읽기만 합니다.
/// 모든 술어(predicate)가 비어 있는 규칙은 모든 메시지에 매칭됩니다.
/// 활성 규칙은 id 오름차순으로 평가되며 첫 매칭에서 중단됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 규칙 식별자 — 평가 순서를 결정합니다
    pub id: i64,
    /// 규칙 이름 (표시용)
    pub name: String,
    /// 활성화 여부 — 비활성 규칙은 절대 매칭되지 않음
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 출발지 네트워크 (CIDR 또는 단일 IP)
    #[serde(default)]
    pub source_cidr: Option<String>,
    /// 호스트명 (정확히 일치)
    #[serde(default)]
    pub hostname: Option<String>,
    /// 애플리케이션 이름 (정확히 일치)
    #[serde(default)]
    pub app_name: Option<String>,
    /// Facility (정확히 일치, 10진 문자열)
    #[serde(default)]
    pub facility: Option<String>,
    /// Severity (정확히 일치, 10진 문자열)
    #[serde(default)]
    pub severity: Option<String>,
    /// 원문에 대한 정규식 검색
    #[serde(default)]
    pub message_regex: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// 모든 술어가 비어 있는지 확인합니다 (와일드카드 규칙).
    pub fn is_wildcard(&self) -> bool {
        self.source_cidr.is_none()
            && self.hostname.is_none()
            && self.app_name.is_none()
            && self.facility.is_none()
            && self.severity.is_none()
            && self.message_regex.is_none()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.enabled { "enabled" } else { "disabled" };
        write!(f, "rule#{} '{}' ({})", self.id, self.name, state)
    }
}

/// 파싱된 syslog 메시지
///
/// 파서가 메시지마다 생성하는 일시적 구조입니다. 코어는 이를 저장하지 않습니다.
/// 헤더가 해석되지 않으면 모든 선택 필드는 None이고 원문 전체가 본문이 됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// 호스트명 (헤더에서 추출, 없으면 None)
    pub hostname: Option<String>,
    /// 애플리케이션 이름 (뒤따르는 콜론 제거됨)
    pub app_name: Option<String>,
    /// Facility — priority div 8 (10진 문자열, priority 부재 시 None)
    pub facility: Option<String>,
    /// Severity — priority mod 8 (10진 문자열, priority 부재 시 None)
    pub severity: Option<String>,
    /// 메시지 본문
    pub message: String,
}

/// 메시지별 최종 처분 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// 목적지로 전달됨
    Forward,
    /// 드롭됨 (임계값 도달로 강등된 경우 포함)
    Drop,
    /// 어떤 규칙에도 매칭되지 않음 (기본 동작이 forward가 아닐 때)
    Unmatched,
    /// 전달을 시도했으나 전송 실패
    ForwardFailed,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Drop => write!(f, "drop"),
            Self::Unmatched => write!(f, "unmatched"),
            Self::ForwardFailed => write!(f, "forward_failed"),
        }
    }
}

/// 처분 레코드 — 수신된 메시지 하나당 정확히 하나 생성됩니다.
///
/// 타임스탬프는 메시지에 포함된 시각이 아니라 수신 시각입니다.
/// `rule_id`는 임계값으로 인해 drop으로 강등된 경우에도 유지됩니다 (감사 목적).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disposition {
    /// 수신 시각
    pub timestamp: SystemTime,
    /// 송신자 주소
    pub source_ip: IpAddr,
    /// 원문 (교체 디코딩, CR/LF 제거)
    pub raw: String,
    /// 수신 바이트 수
    pub size_bytes: usize,
    /// 최종 동작
    pub action: Action,
    /// 매칭된 규칙 id (없으면 None)
    pub rule_id: Option<i64>,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule_id {
            Some(id) => write!(
                f,
                "{} from {} ({} bytes, rule#{})",
                self.action, self.source_ip, self.size_bytes, id
            ),
            None => write!(
                f,
                "{} from {} ({} bytes)",
                self.action, self.source_ip, self.size_bytes
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rule() -> Rule {
        Rule {
            id: 1,
            name: "allow-internal".to_owned(),
            enabled: true,
            source_cidr: Some("10.0.0.0/24".to_owned()),
            hostname: None,
            app_name: None,
            facility: None,
            severity: None,
            message_regex: None,
        }
    }

    #[test]
    fn protocol_from_str_loose() {
        assert_eq!(Protocol::from_str_loose("udp"), Some(Protocol::Udp));
        assert_eq!(Protocol::from_str_loose("TCP"), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_str_loose("sctp"), None);
    }

    #[test]
    fn protocol_display() {
        assert_eq!(Protocol::Udp.to_string(), "udp");
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
    }

    #[test]
    fn default_action_from_str_loose() {
        assert_eq!(
            DefaultAction::from_str_loose("BLOCK"),
            Some(DefaultAction::Block)
        );
        assert_eq!(
            DefaultAction::from_str_loose("forward"),
            Some(DefaultAction::Forward)
        );
        assert_eq!(DefaultAction::from_str_loose("allow"), None);
    }

    #[test]
    fn default_action_default_is_block() {
        assert_eq!(DefaultAction::default(), DefaultAction::Block);
    }

    #[test]
    fn destination_display() {
        let dest = Destination {
            host: "127.0.0.1".to_owned(),
            port: 5515,
            protocol: Protocol::Udp,
        };
        assert_eq!(dest.to_string(), "127.0.0.1:5515/udp");
    }

    #[test]
    fn rule_wildcard_detection() {
        let mut rule = sample_rule();
        assert!(!rule.is_wildcard());
        rule.source_cidr = None;
        assert!(rule.is_wildcard());
    }

    #[test]
    fn rule_display() {
        let rule = sample_rule();
        let display = rule.to_string();
        assert!(display.contains("rule#1"));
        assert!(display.contains("allow-internal"));
        assert!(display.contains("enabled"));
    }

    #[test]
    fn rule_enabled_defaults_to_true() {
        let rule: Rule = serde_json::from_str(r#"{"id": 7, "name": "r"}"#).unwrap();
        assert!(rule.enabled);
        assert!(rule.is_wildcard());
    }

    #[test]
    fn action_display() {
        assert_eq!(Action::Forward.to_string(), "forward");
        assert_eq!(Action::Drop.to_string(), "drop");
        assert_eq!(Action::Unmatched.to_string(), "unmatched");
        assert_eq!(Action::ForwardFailed.to_string(), "forward_failed");
    }

    #[test]
    fn action_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Action::ForwardFailed).unwrap(),
            "\"forward_failed\""
        );
    }

    #[test]
    fn parsed_message_default_is_empty() {
        let parsed = ParsedMessage::default();
        assert!(parsed.hostname.is_none());
        assert!(parsed.app_name.is_none());
        assert!(parsed.facility.is_none());
        assert!(parsed.severity.is_none());
        assert!(parsed.message.is_empty());
    }

    #[test]
    fn disposition_display_with_rule() {
        let disposition = Disposition {
            timestamp: SystemTime::now(),
            source_ip: "10.0.0.5".parse().unwrap(),
            raw: "<14>Aug 11 00:00:00 host1 app: hello".to_owned(),
            size_bytes: 37,
            action: Action::Forward,
            rule_id: Some(1),
        };
        let display = disposition.to_string();
        assert!(display.contains("forward"));
        assert!(display.contains("10.0.0.5"));
        assert!(display.contains("rule#1"));
    }

    #[test]
    fn disposition_serialize_roundtrip() {
        let disposition = Disposition {
            timestamp: SystemTime::now(),
            source_ip: "::1".parse().unwrap(),
            raw: "hello".to_owned(),
            size_bytes: 5,
            action: Action::Unmatched,
            rule_id: None,
        };
        let json = serde_json::to_string(&disposition).unwrap();
        let deserialized: Disposition = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.action, Action::Unmatched);
        assert_eq!(deserialized.source_ip, disposition.source_ip);
        assert_eq!(deserialized.rule_id, None);
    }
}
