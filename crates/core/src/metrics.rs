//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logship_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 전송 프로토콜 레이블 키 (udp, tcp)
pub const LABEL_PROTOCOL: &str = "protocol";

/// 처분 동작 레이블 키 (forward, drop, unmatched, forward_failed)
pub const LABEL_ACTION: &str = "action";

// ─── 파이프라인 메트릭 ──────────────────────────────────────────────

/// 수신된 전체 메시지 수 (counter, label: protocol)
pub const MESSAGES_RECEIVED_TOTAL: &str = "logship_messages_received_total";

/// 처분이 완료된 메시지 수 (counter, label: action)
pub const MESSAGES_DISPOSED_TOTAL: &str = "logship_messages_disposed_total";

/// 규칙 매칭 수 (counter)
pub const RULE_MATCHES_TOTAL: &str = "logship_rule_matches_total";

/// 현재 로드된 규칙 수 (gauge)
pub const RULES_LOADED: &str = "logship_rules_loaded";

/// 전달된 바이트 수 (counter, label: protocol)
pub const FORWARDED_BYTES_TOTAL: &str = "logship_forwarded_bytes_total";

/// 전달 실패 수 (counter, label: protocol)
pub const FORWARD_FAILURES_TOTAL: &str = "logship_forward_failures_total";

/// 임계값으로 거부된 메시지 수 (counter)
pub const THRESHOLD_REJECTIONS_TOTAL: &str = "logship_threshold_rejections_total";

/// 임계값 윈도우 롤오버 수 (counter)
pub const THRESHOLD_WINDOW_RESETS_TOTAL: &str = "logship_threshold_window_resets_total";

/// 현재 윈도우에 누적된 전달 바이트 (gauge)
pub const THRESHOLD_WINDOW_BYTES: &str = "logship_threshold_window_bytes";

/// 이벤트 싱크 전달 실패 수 (counter)
pub const SINK_FAILURES_TOTAL: &str = "logship_sink_failures_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// Prometheus recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        MESSAGES_RECEIVED_TOTAL,
        "Raw syslog messages received, by transport protocol"
    );
    describe_counter!(
        MESSAGES_DISPOSED_TOTAL,
        "Messages with a final disposition, by action"
    );
    describe_counter!(RULE_MATCHES_TOTAL, "Messages matched by an enabled rule");
    describe_gauge!(RULES_LOADED, "Rules currently loaded in the rule store");
    describe_counter!(
        FORWARDED_BYTES_TOTAL,
        "Payload bytes successfully forwarded, by transport protocol"
    );
    describe_counter!(
        FORWARD_FAILURES_TOTAL,
        "Forward attempts that failed, by transport protocol"
    );
    describe_counter!(
        THRESHOLD_REJECTIONS_TOTAL,
        "Forwards denied by the byte-volume threshold"
    );
    describe_counter!(
        THRESHOLD_WINDOW_RESETS_TOTAL,
        "Threshold window rollovers (counter resets)"
    );
    describe_gauge!(
        THRESHOLD_WINDOW_BYTES,
        "Bytes accumulated in the current threshold window"
    );
    describe_counter!(
        SINK_FAILURES_TOTAL,
        "Disposition records that could not be delivered to the event sink"
    );
}
