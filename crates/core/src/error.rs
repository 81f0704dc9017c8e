//! 에러 타입 — 도메인별 에러 정의

/// Logship 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogshipError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 전달(포워딩) 에러
    #[error("forward error: {0}")]
    Forward(#[from] ForwardError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중인 파이프라인을 다시 시작하려 함
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지하려 함
    #[error("pipeline not running")]
    NotRunning,
}

/// 전달(포워딩) 에러
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// 목적지 주소 해석 실패
    #[error("failed to resolve destination '{host}:{port}': {reason}")]
    Resolve {
        host: String,
        port: u16,
        reason: String,
    },

    /// 연결 실패 (TCP)
    #[error("failed to connect to {dest}: {reason}")]
    Connect { dest: String, reason: String },

    /// 페이로드 전송 실패
    #[error("failed to send to {dest}: {reason}")]
    Send { dest: String, reason: String },
}
