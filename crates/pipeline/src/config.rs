//! 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogshipConfig`](logship_core::config::LogshipConfig)
//! 에서 파이프라인이 쓰는 부분을 파생하고, 윈도우 문자열 해석 같은 변환을
//! 여기서 한 번 수행합니다.
//!
//! # 사용 예시
//! ```
//! use logship_core::config::LogshipConfig;
//! use logship_pipeline::config::PipelineConfig;
//!
//! let core_config = LogshipConfig::default();
//! let config = PipelineConfig::from_core(&core_config).unwrap();
//! assert_eq!(config.udp_bind, "0.0.0.0:514");
//! ```

use std::time::Duration;

use logship_core::config::LogshipConfig;
use logship_core::error::LogshipError;
use logship_core::types::{DefaultAction, Destination};

use crate::error::SyslogPipelineError;

/// 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// UDP 수신 바인드 주소
    pub udp_bind: String,
    /// TCP 수신 바인드 주소
    pub tcp_bind: String,
    /// 메시지 최대 크기 (바이트)
    pub max_message_size: usize,
    /// TCP 읽기 타임아웃 (초, 0 = 무제한)
    pub tcp_read_timeout_secs: u64,
    /// 최대 동시 TCP 연결 수
    pub max_tcp_connections: usize,
    /// 규칙 미매칭 시 기본 동작
    pub default_action: DefaultAction,
    /// 규칙 파일 디렉토리 (None = 규칙 없이 시작)
    pub rule_dir: Option<String>,
    /// 전달 목적지
    pub destination: Destination,
    /// 임계값 적용 여부
    pub threshold_enabled: bool,
    /// 윈도우당 전달 바이트 한도
    pub threshold_limit_bytes: u64,
    /// 임계값 윈도우 길이
    pub threshold_window: Duration,
    /// 임계값 보조 리셋 틱 간격
    pub threshold_tick_interval: Duration,
    /// 원시 메시지 채널 용량
    pub raw_channel_capacity: usize,
    /// 처분 이벤트 채널 용량
    pub event_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            udp_bind: "0.0.0.0:514".to_owned(),
            tcp_bind: "0.0.0.0:514".to_owned(),
            max_message_size: 64 * 1024,
            tcp_read_timeout_secs: 30,
            max_tcp_connections: 256,
            default_action: DefaultAction::Block,
            rule_dir: None,
            destination: Destination {
                host: "127.0.0.1".to_owned(),
                port: 5515,
                protocol: logship_core::types::Protocol::Udp,
            },
            threshold_enabled: false,
            threshold_limit_bytes: 0,
            threshold_window: Duration::from_secs(24 * 60 * 60),
            threshold_tick_interval: Duration::from_secs(5),
            raw_channel_capacity: 1024,
            event_channel_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 파생합니다.
    ///
    /// 윈도우 문자열과 목적지/기본 동작 문자열이 이 시점에 도메인 타입으로
    /// 변환됩니다. `LogshipConfig::validate()`를 통과한 설정이라면 실패하지
    /// 않습니다.
    pub fn from_core(core: &LogshipConfig) -> Result<Self, LogshipError> {
        let destination = core.destination.to_destination()?;
        let default_action = DefaultAction::from_str_loose(&core.pipeline.default_action)
            .ok_or_else(|| {
                LogshipError::Config(logship_core::error::ConfigError::InvalidValue {
                    field: "pipeline.default_action".to_owned(),
                    reason: "must be one of: block, forward".to_owned(),
                })
            })?;

        let rule_dir = if core.pipeline.rule_dir.is_empty() {
            None
        } else {
            Some(core.pipeline.rule_dir.clone())
        };

        Ok(Self {
            udp_bind: core.listen.udp_bind.clone(),
            tcp_bind: core.listen.tcp_bind.clone(),
            max_message_size: core.listen.max_message_size,
            tcp_read_timeout_secs: core.listen.tcp_read_timeout_secs,
            max_tcp_connections: core.listen.max_tcp_connections,
            default_action,
            rule_dir,
            destination,
            threshold_enabled: core.threshold.enabled,
            threshold_limit_bytes: core.threshold.limit_bytes,
            threshold_window: core.threshold.window_duration(),
            ..Self::default()
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SyslogPipelineError> {
        if self.max_message_size == 0 {
            return Err(SyslogPipelineError::Config {
                field: "max_message_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_tcp_connections == 0 {
            return Err(SyslogPipelineError::Config {
                field: "max_tcp_connections".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.raw_channel_capacity == 0 || self.event_channel_capacity == 0 {
            return Err(SyslogPipelineError::Config {
                field: "channel capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.threshold_window.is_zero() {
            return Err(SyslogPipelineError::Config {
                field: "threshold_window".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.threshold_tick_interval.is_zero() {
            return Err(SyslogPipelineError::Config {
                field: "threshold_tick_interval".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
///
/// 테스트와 프로그램적 구성에서 개별 필드를 덮어쓸 때 사용합니다.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// UDP 바인드 주소를 설정합니다.
    pub fn udp_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.udp_bind = bind.into();
        self
    }

    /// TCP 바인드 주소를 설정합니다.
    pub fn tcp_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.tcp_bind = bind.into();
        self
    }

    /// 기본 동작을 설정합니다.
    pub fn default_action(mut self, action: DefaultAction) -> Self {
        self.config.default_action = action;
        self
    }

    /// 규칙 디렉토리를 설정합니다.
    pub fn rule_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.rule_dir = Some(dir.into());
        self
    }

    /// 전달 목적지를 설정합니다.
    pub fn destination(mut self, destination: Destination) -> Self {
        self.config.destination = destination;
        self
    }

    /// 임계값을 설정합니다.
    pub fn threshold(mut self, enabled: bool, limit_bytes: u64, window: Duration) -> Self {
        self.config.threshold_enabled = enabled;
        self.config.threshold_limit_bytes = limit_bytes;
        self.config.threshold_window = window;
        self
    }

    /// 임계값 보조 리셋 틱 간격을 설정합니다.
    pub fn threshold_tick_interval(mut self, interval: Duration) -> Self {
        self.config.threshold_tick_interval = interval;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, SyslogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
