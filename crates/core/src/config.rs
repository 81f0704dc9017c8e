//! 설정 관리 — logship.toml 파싱 및 런타임 설정
//!
//! [`LogshipConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSHIP_DESTINATION_HOST=10.0.0.1` 형식)
//! 3. 설정 파일 (`logship.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logship_core::error::LogshipError> {
//! use logship_core::config::LogshipConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogshipConfig::load("logship.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogshipConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogshipError};
use crate::types::{DefaultAction, Destination, Protocol};

/// Logship 통합 설정
///
/// `logship.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogshipConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수신 리스너 설정
    #[serde(default)]
    pub listen: ListenConfig,
    /// 파이프라인 정책 설정
    #[serde(default)]
    pub pipeline: PipelinePolicyConfig,
    /// 전달 목적지 설정
    #[serde(default)]
    pub destination: DestinationConfig,
    /// 전달량 임계값 설정
    #[serde(default)]
    pub threshold: ThresholdConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogshipConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogshipError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogshipError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogshipError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogshipError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogshipError> {
        toml::from_str(toml_str).map_err(|e| {
            LogshipError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSHIP_{SECTION}_{FIELD}`
    /// 예: `LOGSHIP_DESTINATION_HOST=10.0.0.1`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSHIP_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSHIP_GENERAL_LOG_FORMAT");

        // Listen
        override_string(&mut self.listen.udp_bind, "LOGSHIP_LISTEN_UDP_BIND");
        override_string(&mut self.listen.tcp_bind, "LOGSHIP_LISTEN_TCP_BIND");
        override_usize(
            &mut self.listen.max_message_size,
            "LOGSHIP_LISTEN_MAX_MESSAGE_SIZE",
        );
        override_u64(
            &mut self.listen.tcp_read_timeout_secs,
            "LOGSHIP_LISTEN_TCP_READ_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.listen.max_tcp_connections,
            "LOGSHIP_LISTEN_MAX_TCP_CONNECTIONS",
        );

        // Pipeline
        override_string(
            &mut self.pipeline.default_action,
            "LOGSHIP_PIPELINE_DEFAULT_ACTION",
        );
        override_string(&mut self.pipeline.rule_dir, "LOGSHIP_PIPELINE_RULE_DIR");

        // Destination
        override_string(&mut self.destination.host, "LOGSHIP_DESTINATION_HOST");
        override_u16(&mut self.destination.port, "LOGSHIP_DESTINATION_PORT");
        override_string(
            &mut self.destination.protocol,
            "LOGSHIP_DESTINATION_PROTOCOL",
        );

        // Threshold
        override_bool(&mut self.threshold.enabled, "LOGSHIP_THRESHOLD_ENABLED");
        override_u64(&mut self.threshold.limit_bytes, "LOGSHIP_THRESHOLD_BYTES");
        override_string(&mut self.threshold.window, "LOGSHIP_THRESHOLD_WINDOW");

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGSHIP_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGSHIP_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGSHIP_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogshipError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 바인드 주소 검증
        for (field, value) in [
            ("listen.udp_bind", &self.listen.udp_bind),
            ("listen.tcp_bind", &self.listen.tcp_bind),
        ] {
            if value.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: format!("'{value}' is not a valid socket address"),
                }
                .into());
            }
        }

        if self.listen.max_message_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "listen.max_message_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.listen.max_tcp_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "listen.max_tcp_connections".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        // default_action 검증
        if DefaultAction::from_str_loose(&self.pipeline.default_action).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.default_action".to_owned(),
                reason: "must be one of: block, forward".to_owned(),
            }
            .into());
        }

        // destination 검증
        if self.destination.host.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "destination.host".to_owned(),
                reason: "host must not be empty".to_owned(),
            }
            .into());
        }

        if self.destination.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "destination.port".to_owned(),
                reason: "port must not be 0".to_owned(),
            }
            .into());
        }

        if Protocol::from_str_loose(&self.destination.protocol).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "destination.protocol".to_owned(),
                reason: "must be one of: udp, tcp".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수신 리스너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// UDP syslog 수신 주소
    pub udp_bind: String,
    /// TCP syslog 수신 주소
    pub tcp_bind: String,
    /// 메시지 최대 크기 (바이트) — TCP 단일 읽기 버퍼 크기
    pub max_message_size: usize,
    /// TCP 읽기 타임아웃 (초, 0 = 무제한)
    pub tcp_read_timeout_secs: u64,
    /// 최대 동시 TCP 연결 수
    pub max_tcp_connections: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            udp_bind: "0.0.0.0:514".to_owned(),
            tcp_bind: "0.0.0.0:514".to_owned(),
            max_message_size: 64 * 1024, // 64KB
            tcp_read_timeout_secs: 30,
            max_tcp_connections: 256,
        }
    }
}

/// 파이프라인 정책 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinePolicyConfig {
    /// 규칙 미매칭 시 기본 동작 (block, forward)
    pub default_action: String,
    /// 규칙 파일 디렉토리 (빈 문자열 = 규칙 없이 시작)
    pub rule_dir: String,
}

impl Default for PipelinePolicyConfig {
    fn default() -> Self {
        Self {
            default_action: "block".to_owned(),
            rule_dir: "/etc/logship/rules".to_owned(),
        }
    }
}

/// 전달 목적지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// 목적지 호스트
    pub host: String,
    /// 목적지 포트
    pub port: u16,
    /// 전송 프로토콜 (udp, tcp)
    pub protocol: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 5515,
            protocol: "udp".to_owned(),
        }
    }
}

impl DestinationConfig {
    /// 검증된 [`Destination`] 도메인 타입으로 변환합니다.
    ///
    /// `validate()`를 통과한 설정에서만 호출해야 합니다.
    pub fn to_destination(&self) -> Result<Destination, LogshipError> {
        let protocol = Protocol::from_str_loose(&self.protocol).ok_or_else(|| {
            LogshipError::Config(ConfigError::InvalidValue {
                field: "destination.protocol".to_owned(),
                reason: "must be one of: udp, tcp".to_owned(),
            })
        })?;
        Ok(Destination {
            host: self.host.clone(),
            port: self.port,
            protocol,
        })
    }
}

/// 전달량 임계값 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// 임계값 적용 여부
    pub enabled: bool,
    /// 윈도우당 전달 바이트 한도
    pub limit_bytes: u64,
    /// 윈도우 길이 ("7d", "12h", "P7D", "PT12H" 형식)
    pub window: String,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit_bytes: 0,
            window: "1d".to_owned(),
        }
    }
}

impl ThresholdConfig {
    /// 윈도우 길이를 [`Duration`]으로 해석합니다.
    pub fn window_duration(&self) -> Duration {
        parse_window(&self.window)
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9188,
        }
    }
}

/// 임계값 윈도우 문자열을 [`Duration`]으로 해석합니다.
///
/// 지원 형식: `"7d"`, `"12h"` 축약형과 `"P7D"`, `"PT12H"` ISO 유사 형식.
/// 해석할 수 없는 문자열은 경고를 남기고 1일로 대체됩니다.
pub fn parse_window(s: &str) -> Duration {
    const DAY_SECS: u64 = 24 * 60 * 60;
    const HOUR_SECS: u64 = 60 * 60;

    let normalized = s.trim().to_lowercase();

    if let Some(days) = normalized.strip_suffix('d').and_then(parse_digits) {
        return Duration::from_secs(days.saturating_mul(DAY_SECS));
    }
    if let Some(hours) = normalized.strip_suffix('h').and_then(parse_digits) {
        return Duration::from_secs(hours.saturating_mul(HOUR_SECS));
    }
    // ISO 8601 부분 지원: PnD, PTnH
    if let Some(days) = normalized
        .strip_prefix('p')
        .and_then(|rest| rest.strip_suffix('d'))
        .and_then(parse_digits)
    {
        return Duration::from_secs(days.saturating_mul(DAY_SECS));
    }
    if let Some(hours) = normalized
        .strip_prefix("pt")
        .and_then(|rest| rest.strip_suffix('h'))
        .and_then(parse_digits)
    {
        return Duration::from_secs(hours.saturating_mul(HOUR_SECS));
    }

    warn!(window = s, "unrecognized threshold window, defaulting to 1 day");
    Duration::from_secs(DAY_SECS)
}

/// 순수 숫자 문자열만 u64로 파싱합니다.
fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
