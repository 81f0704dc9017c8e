//! 규칙 매칭 벤치마크
//!
//! 단일 규칙 매칭과 규칙 수에 따른 첫 매칭 스케일링을 측정합니다.

use std::net::IpAddr;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use logship_core::types::{ParsedMessage, Rule};
use logship_pipeline::rule::matcher::CompiledRule;

fn sample_parsed() -> ParsedMessage {
    ParsedMessage {
        hostname: Some("web-server-01".to_owned()),
        app_name: Some("sshd".to_owned()),
        facility: Some("4".to_owned()),
        severity: Some("2".to_owned()),
        message: "Failed password for root from 192.168.1.100 port 22".to_owned(),
    }
}

fn make_rule(id: i64) -> Rule {
    Rule {
        id,
        name: format!("rule-{id}"),
        enabled: true,
        source_cidr: Some("192.168.0.0/16".to_owned()),
        hostname: None,
        app_name: Some("sshd".to_owned()),
        facility: None,
        severity: None,
        message_regex: Some(r"Failed password for \w+".to_owned()),
    }
}

fn bench_single_rule_match(c: &mut Criterion) {
    let compiled = CompiledRule::compile(make_rule(1));
    let parsed = sample_parsed();
    let source: IpAddr = "192.168.1.100".parse().unwrap();
    let raw = "<34>Aug 11 00:00:00 web-server-01 sshd: Failed password for root";

    c.bench_function("single_rule_match", |b| {
        b.iter(|| compiled.matches(black_box(source), black_box(&parsed), black_box(raw)));
    });
}

fn bench_cidr_only_rule(c: &mut Criterion) {
    let rule = Rule {
        id: 1,
        name: "cidr-only".to_owned(),
        enabled: true,
        source_cidr: Some("10.0.0.0/8".to_owned()),
        hostname: None,
        app_name: None,
        facility: None,
        severity: None,
        message_regex: None,
    };
    let compiled = CompiledRule::compile(rule);
    let parsed = sample_parsed();
    let source: IpAddr = "10.1.2.3".parse().unwrap();

    c.bench_function("cidr_only_rule_match", |b| {
        b.iter(|| compiled.matches(black_box(source), black_box(&parsed), black_box("raw")));
    });
}

fn bench_first_match_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_match_scaling");
    let parsed = sample_parsed();
    let source: IpAddr = "192.168.1.100".parse().unwrap();
    let raw = "<34>Aug 11 00:00:00 web-server-01 sshd: Failed password for root";

    for rule_count in [1usize, 10, 100, 1000] {
        // 마지막 규칙만 매칭되도록 앞 규칙들은 다른 호스트명을 요구합니다
        let mut rules: Vec<CompiledRule> = (0..rule_count as i64 - 1)
            .map(|id| {
                let mut rule = make_rule(id);
                rule.hostname = Some("other-host".to_owned());
                CompiledRule::compile(rule)
            })
            .collect();
        rules.push(CompiledRule::compile(make_rule(rule_count as i64)));

        group.bench_with_input(
            BenchmarkId::from_parameter(rule_count),
            &rules,
            |b, rules| {
                b.iter(|| {
                    rules
                        .iter()
                        .find(|r| r.matches(black_box(source), black_box(&parsed), black_box(raw)))
                        .map(CompiledRule::id)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_rule_match,
    bench_cidr_only_rule,
    bench_first_match_scaling,
);
criterion_main!(benches);
