//! 경량 syslog 헤더 파서
//!
//! 고전 BSD 형식(RFC 3164 유사)의 syslog 헤더를 최선 노력으로 해석합니다.
//!
//! ```text
//! <PRI>MON DD HH:MM:SS HOSTNAME APP: MESSAGE
//! ```
//!
//! 이 파서는 전체 함수(total function)입니다: 어떤 바이트 입력도 실패를
//! 일으키지 않으며, 해석 불가능한 입력은 "모든 필드 부재, 원문 전체가 본문"
//! 으로 강등됩니다. 헤더에 포함된 타임스탬프는 연도가 없어 의도적으로
//! 사용하지 않습니다 — 이벤트 시각은 수신 시각입니다.
//!
//! # 사용 예시
//! ```
//! use logship_pipeline::parser;
//!
//! let text = parser::decode(b"<14>Aug 11 00:00:00 host1 app: hello\r\n");
//! let parsed = parser::parse(&text);
//! assert_eq!(parsed.hostname.as_deref(), Some("host1"));
//! assert_eq!(parsed.app_name.as_deref(), Some("app"));
//! assert_eq!(parsed.facility.as_deref(), Some("1"));
//! assert_eq!(parsed.severity.as_deref(), Some("6"));
//! assert_eq!(parsed.message, "hello");
//! ```

use std::sync::LazyLock;

use regex::Regex;

use logship_core::types::ParsedMessage;

/// PRI 필드: `<N>` (1~3자리 10진수)
static PRI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<(\d{1,3})>").expect("static PRI pattern"));

/// 고전 헤더: `<PRI>MON DD HH:MM:SS HOSTNAME APP: MESSAGE`
/// (월은 3글자 토큰, 일은 공백 패딩 허용, 시각은 HH:MM:SS)
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:<\d{1,3}>)(\w{3}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})\s(\S+)\s(\S+):?\s?(.*)")
        .expect("static header pattern")
});

/// 원시 바이트를 텍스트로 디코딩합니다.
///
/// 잘못된 UTF-8 시퀀스는 교체 문자로 대체되고, 끝의 CR/LF는 제거됩니다.
pub fn decode(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches(['\r', '\n'])
        .to_owned()
}

/// 디코딩된 텍스트에서 [`ParsedMessage`]를 생성합니다.
///
/// priority가 유효하면 facility = pri div 8, severity = pri mod 8을 10진
/// 문자열로 채웁니다. 헤더가 문법에 맞으면 hostname/app_name을 추출하고
/// 나머지를 본문으로 삼습니다. 어느 쪽도 맞지 않으면 해당 필드는 None이며
/// 원문 전체가 본문이 됩니다. 이 함수는 패닉하지 않습니다.
pub fn parse(text: &str) -> ParsedMessage {
    let (facility, severity) = parse_priority(text);

    if let Some(caps) = HEADER_RE.captures(text) {
        // caps[1]은 타임스탬프 — 연도가 없으므로 사용하지 않습니다
        let hostname = caps.get(2).map(|m| m.as_str().to_owned());
        let app_name = caps
            .get(3)
            .map(|m| m.as_str().trim_end_matches(':').to_owned());
        let message = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

        ParsedMessage {
            hostname,
            app_name,
            facility,
            severity,
            message: message.to_owned(),
        }
    } else {
        ParsedMessage {
            hostname: None,
            app_name: None,
            facility,
            severity,
            message: text.to_owned(),
        }
    }
}

/// PRI 필드에서 facility/severity 문자열 쌍을 추출합니다.
///
/// `<N>` 접두사가 없거나 숫자가 아니면 (None, None)을 반환합니다.
/// 값 범위는 검증하지 않습니다 — PRI = facility * 8 + severity 산술만
/// 적용합니다.
fn parse_priority(text: &str) -> (Option<String>, Option<String>) {
    let Some(caps) = PRI_RE.captures(text) else {
        return (None, None);
    };
    let Ok(pri) = caps[1].parse::<u32>() else {
        return (None, None);
    };
    (Some((pri / 8).to_string()), Some((pri % 8).to_string()))
}
