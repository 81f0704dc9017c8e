#![no_main]

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logship_core::types::{ParsedMessage, Rule};
use logship_pipeline::rule::matcher::CompiledRule;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 술어 (임의 텍스트 — 불량 CIDR/정규식 포함)
    source_cidr: Option<String>,
    hostname: Option<String>,
    app_name: Option<String>,
    facility: Option<String>,
    severity: Option<String>,
    message_regex: Option<String>,
    enabled: bool,
    /// 매칭 대상
    source_v4: bool,
    source_bits: u32,
    parsed_hostname: Option<String>,
    parsed_app: Option<String>,
    raw: String,
}

fuzz_target!(|input: FuzzInput| {
    // 불량 정규식은 컴파일 비용이 클 수 있으므로 길이를 제한한다
    let message_regex = input
        .message_regex
        .filter(|p| p.len() <= 256);

    let rule = Rule {
        id: 1,
        name: "fuzz".to_owned(),
        enabled: input.enabled,
        source_cidr: input.source_cidr,
        hostname: input.hostname,
        app_name: input.app_name,
        facility: input.facility,
        severity: input.severity,
        message_regex,
    };

    // 컴파일은 실패하지 않는다 — 불량 술어는 fail-closed로 표시될 뿐이다
    let compiled = CompiledRule::compile(rule);

    let source: IpAddr = if input.source_v4 {
        IpAddr::V4(Ipv4Addr::from(input.source_bits))
    } else {
        IpAddr::V6(Ipv6Addr::from(u128::from(input.source_bits)))
    };

    let parsed = ParsedMessage {
        hostname: input.parsed_hostname,
        app_name: input.parsed_app,
        facility: Some("1".to_owned()),
        severity: Some("6".to_owned()),
        message: input.raw.clone(),
    };

    // 평가도 크래시 없이 bool을 반환해야 한다
    let _ = compiled.matches(source, &parsed, &input.raw);
});
