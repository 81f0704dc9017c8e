#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: UDP/TCP syslog 수신 리스너
//! - [`parser`]: 경량 syslog 헤더 파서 (전체 함수)
//! - [`rule`]: 규칙 컴파일/저장/매칭/로딩
//! - [`threshold`]: 전달량 임계값 관리자 (롤링 윈도우)
//! - [`forwarder`]: UDP/TCP 전달 디스패처
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Collectors -> dispatch -> Parser -> RuleStore -> ThresholdGovernor -> Forwarder
//!     |                       |          |               |                 |
//!  UDP/TCP              총 함수 파싱   첫 매칭 우선    바이트 예약       메시지당 연결
//!                                   -> DispositionEvent -> 이벤트 싱크
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod parser;
pub mod pipeline;
pub mod rule;
pub mod threshold;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{SyslogPipeline, SyslogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::SyslogPipelineError;

// 규칙 엔진
pub use rule::{CompiledRule, RuleLoader, RuleStore};

// 수집기
pub use collector::{RawMessage, SyslogTcpCollector, SyslogUdpCollector};

// 임계값
pub use threshold::ThresholdGovernor;

// 전달
pub use forwarder::Forwarder;
