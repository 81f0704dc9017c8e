//! 파이프라인 도메인 에러 타입
//!
//! [`SyslogPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를
//! 표현합니다. `From<SyslogPipelineError> for LogshipError` 변환이 구현되어
//! 있어 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 메시지 단위의 실패(불량 헤더, 전달 실패)는 여기로 오지 않습니다 —
//! 그런 실패는 처분 레코드로 기록되고 해당 메시지의 태스크 안에 갇힙니다.

use logship_core::error::{LogshipError, PipelineError};

/// Syslog 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SyslogPipelineError {
    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 또는 디렉토리 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 수집기 에러 (바인드 실패, 소켓 오류 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (syslog_udp, syslog_tcp)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SyslogPipelineError> for LogshipError {
    fn from(err: SyslogPipelineError) -> Self {
        LogshipError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
