//! 수신 리스너 모듈 — 네트워크에서 원시 syslog 메시지를 수집합니다.
//!
//! # 수집 소스
//! - [`SyslogUdpCollector`]: UDP 수신 — 데이터그램 하나가 메시지 하나
//! - [`SyslogTcpCollector`]: TCP 수신 — 연결당 단일 읽기가 메시지 하나
//!
//! # 아키텍처
//! 각 수집기는 자체 tokio 태스크에서 실행되며, 수집된 원시 메시지를
//! `tokio::mpsc::Sender<RawMessage>` 채널을 통해 파이프라인으로 전달합니다.
//! 수집기는 메시지의 파이프라인 처리가 끝나기를 기다리지 않습니다.
//!
//! 소켓 바인드는 수집기 생성 시점(`bind()`)에 수행됩니다 — 시작 시
//! 바인드 실패는 해당 전송 계층에 대해 치명적(fatal)이어야 하기 때문입니다.

pub mod syslog_tcp;
pub mod syslog_udp;

pub use syslog_tcp::{SyslogTcpCollector, SyslogTcpConfig};
pub use syslog_udp::{SyslogUdpCollector, SyslogUdpConfig};

use std::net::SocketAddr;
use std::time::SystemTime;

use bytes::Bytes;

use logship_core::types::Protocol;

/// 수집된 원시 메시지
///
/// 수집기가 생성하고 파이프라인이 소비하는 중간 데이터 형식입니다.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// 원시 페이로드 바이트
    pub data: Bytes,
    /// 송신자 주소
    pub peer_addr: SocketAddr,
    /// 수신 시각 — 저장되는 이벤트의 타임스탬프가 됩니다
    pub received_at: SystemTime,
    /// 수신 전송 계층
    pub transport: Protocol,
}

impl RawMessage {
    /// 새 RawMessage를 생성합니다. 수신 시각은 지금으로 기록됩니다.
    pub fn new(data: Bytes, peer_addr: SocketAddr, transport: Protocol) -> Self {
        Self {
            data,
            peer_addr,
            received_at: SystemTime::now(),
            transport,
        }
    }
}
