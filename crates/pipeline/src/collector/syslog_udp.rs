//! UDP Syslog 수집기
//!
//! UDP 소켓으로 syslog 메시지를 수신합니다. 데이터그램 하나를 메시지
//! 하나로 취급합니다 — 재조립도, 데이터그램 간 순서 보장도 없습니다.

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bytes::Bytes;

use logship_core::metrics as metric_names;
use logship_core::types::Protocol;

use super::RawMessage;
use crate::error::SyslogPipelineError;

/// UDP syslog 수집기 설정
#[derive(Debug, Clone)]
pub struct SyslogUdpConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 최대 메시지 크기 (바이트, UDP이므로 일반적으로 65535 이하)
    pub max_message_size: usize,
}

impl Default for SyslogUdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:514".to_owned(),
            max_message_size: 64 * 1024, // 64KB
        }
    }
}

/// UDP Syslog 수집기
///
/// 수신한 각 데이터그램을 송신자 주소와 함께 파이프라인 채널로 전달합니다.
pub struct SyslogUdpCollector {
    /// 수집기 설정
    config: SyslogUdpConfig,
    /// 바인드된 소켓
    socket: UdpSocket,
    /// 수집된 메시지 전송 채널
    tx: mpsc::Sender<RawMessage>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl SyslogUdpCollector {
    /// 소켓을 바인드하고 수집기를 생성합니다.
    ///
    /// 바인드 실패는 에러로 반환됩니다 — 시작 시점의 바인드 실패는
    /// 해당 전송 계층에 대해 치명적입니다.
    pub async fn bind(
        config: SyslogUdpConfig,
        tx: mpsc::Sender<RawMessage>,
        cancel: CancellationToken,
    ) -> Result<Self, SyslogPipelineError> {
        let socket = UdpSocket::bind(&config.bind_addr).await.map_err(|e| {
            SyslogPipelineError::Collector {
                source_type: "syslog_udp".to_owned(),
                reason: format!("failed to bind to {}: {}", config.bind_addr, e),
            }
        })?;

        info!(bind_addr = %config.bind_addr, "UDP syslog collector listening");

        Ok(Self {
            config,
            socket,
            tx,
            cancel,
        })
    }

    /// 실제 바인드된 로컬 주소를 반환합니다 (포트 0 바인드 시 유용).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, SyslogPipelineError> {
        self.socket
            .local_addr()
            .map_err(|e| SyslogPipelineError::Collector {
                source_type: "syslog_udp".to_owned(),
                reason: format!("failed to read local addr: {e}"),
            })
    }

    /// 수신 루프를 실행합니다. 취소될 때까지 반환하지 않습니다.
    pub async fn run(self) -> Result<(), SyslogPipelineError> {
        let mut buf = vec![0u8; self.config.max_message_size];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer_addr)) => {
                            metrics::counter!(metric_names::MESSAGES_RECEIVED_TOTAL,
                                metric_names::LABEL_PROTOCOL => "udp")
                            .increment(1);

                            let raw = RawMessage::new(
                                Bytes::copy_from_slice(&buf[..len]),
                                peer_addr,
                                Protocol::Udp,
                            );

                            if self.tx.send(raw).await.is_err() {
                                // 파이프라인이 닫혔으면 수집을 계속할 이유가 없습니다
                                warn!("pipeline channel closed, stopping UDP collector");
                                return Err(SyslogPipelineError::Channel(
                                    "raw message receiver dropped".to_owned(),
                                ));
                            }
                        }
                        Err(e) => {
                            // 일시적 수신 오류는 리스너를 죽이지 않습니다
                            warn!(error = %e, "UDP recv error, continuing");
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    debug!("UDP syslog collector received shutdown signal");
                    return Ok(());
                }
            }
        }
    }
}
