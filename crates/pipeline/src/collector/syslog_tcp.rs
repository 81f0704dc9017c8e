//! TCP Syslog 수집기
//!
//! TCP 연결당 단일 읽기를 syslog 이벤트 하나로 취급합니다. 64KiB 바운드
//! 버퍼로 가용 바이트를 한 번 읽고 연결을 닫습니다 — 연결 안에서
//! 라인 단위 프레이밍으로 여러 메시지를 나누지 않습니다.
//!
//! 데이터를 보내지 않는 피어가 리스너 태스크 하나를 무한정 붙잡는 것을
//! 막기 위해 읽기 타임아웃을 설정할 수 있습니다 (0 = 무제한).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logship_core::metrics as metric_names;
use logship_core::types::Protocol;

use super::RawMessage;
use crate::error::SyslogPipelineError;

/// TCP syslog 수집기 설정
#[derive(Debug, Clone)]
pub struct SyslogTcpConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 연결당 단일 읽기 버퍼 크기 (바이트)
    pub max_message_size: usize,
    /// 읽기 타임아웃 (초, 0 = 무제한)
    pub read_timeout_secs: u64,
}

impl Default for SyslogTcpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:514".to_owned(),
            max_connections: 256,
            max_message_size: 64 * 1024, // 64KB
            read_timeout_secs: 30,
        }
    }
}

/// TCP Syslog 수집기
///
/// 각 연결은 별도의 tokio 태스크에서 처리됩니다. 연결 수는 세마포어로
/// 제한되며, 초과 연결은 거부(즉시 종료)됩니다.
pub struct SyslogTcpCollector {
    /// 수집기 설정
    config: SyslogTcpConfig,
    /// 바인드된 리스너
    listener: TcpListener,
    /// 수집된 메시지 전송 채널
    tx: mpsc::Sender<RawMessage>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl SyslogTcpCollector {
    /// 소켓을 바인드하고 수집기를 생성합니다.
    ///
    /// 바인드 실패는 에러로 반환됩니다 — 시작 시점의 바인드 실패는
    /// 해당 전송 계층에 대해 치명적입니다.
    pub async fn bind(
        config: SyslogTcpConfig,
        tx: mpsc::Sender<RawMessage>,
        cancel: CancellationToken,
    ) -> Result<Self, SyslogPipelineError> {
        let listener = TcpListener::bind(&config.bind_addr).await.map_err(|e| {
            SyslogPipelineError::Collector {
                source_type: "syslog_tcp".to_owned(),
                reason: format!("failed to bind to {}: {}", config.bind_addr, e),
            }
        })?;

        info!(bind_addr = %config.bind_addr, "TCP syslog collector listening");

        Ok(Self {
            config,
            listener,
            tx,
            cancel,
        })
    }

    /// 실제 바인드된 로컬 주소를 반환합니다 (포트 0 바인드 시 유용).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, SyslogPipelineError> {
        self.listener
            .local_addr()
            .map_err(|e| SyslogPipelineError::Collector {
                source_type: "syslog_tcp".to_owned(),
                reason: format!("failed to read local addr: {e}"),
            })
    }

    /// 연결 수락 루프를 실행합니다. 취소될 때까지 반환하지 않습니다.
    pub async fn run(self) -> Result<(), SyslogPipelineError> {
        let connection_semaphore = Arc::new(Semaphore::new(self.config.max_connections));

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            // 일시적 accept 오류는 리스너를 죽이지 않습니다
                            warn!(error = %e, "TCP accept error, continuing");
                            continue;
                        }
                    };

                    debug!(peer = %peer_addr, "accepted connection");

                    let permit = match connection_semaphore.clone().try_acquire_owned() {
                        Ok(p) => p,
                        Err(_) => {
                            warn!(peer = %peer_addr, "max connections reached, rejecting");
                            continue;
                        }
                    };

                    let tx = self.tx.clone();
                    let config = self.config.clone();

                    // 각 연결을 별도 태스크에서 처리 — 수락 루프는 대기하지 않습니다
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, peer_addr, tx, config).await
                        {
                            debug!(peer = %peer_addr, error = %e, "connection handler error");
                        }
                        drop(permit); // 연결 종료 시 세마포어 반환
                    });
                }
                _ = self.cancel.cancelled() => {
                    debug!("TCP syslog collector received shutdown signal");
                    return Ok(());
                }
            }
        }
    }

    /// 단일 TCP 연결을 처리합니다.
    ///
    /// 바운드 버퍼로 가용 바이트를 한 번 읽어 메시지 하나로 만들고,
    /// 더 올 수 있는 데이터와 무관하게 연결을 닫습니다.
    async fn handle_connection(
        mut stream: TcpStream,
        peer_addr: std::net::SocketAddr,
        tx: mpsc::Sender<RawMessage>,
        config: SyslogTcpConfig,
    ) -> Result<(), SyslogPipelineError> {
        let mut buf = vec![0u8; config.max_message_size];

        let read_result = if config.read_timeout_secs > 0 {
            let deadline = Duration::from_secs(config.read_timeout_secs);
            match timeout(deadline, stream.read(&mut buf)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(peer = %peer_addr, "read timeout, closing connection");
                    return Ok(());
                }
            }
        } else {
            stream.read(&mut buf).await
        };

        let len = read_result.map_err(|e| SyslogPipelineError::Collector {
            source_type: "syslog_tcp".to_owned(),
            reason: format!("read error from {peer_addr}: {e}"),
        })?;

        // 연결은 이 단일 읽기 후 핸들러 반환과 함께 닫힙니다
        if len == 0 {
            debug!(peer = %peer_addr, "connection closed without data");
            return Ok(());
        }

        metrics::counter!(metric_names::MESSAGES_RECEIVED_TOTAL,
            metric_names::LABEL_PROTOCOL => "tcp")
        .increment(1);

        let raw = RawMessage::new(
            Bytes::copy_from_slice(&buf[..len]),
            peer_addr,
            Protocol::Tcp,
        );

        tx.send(raw)
            .await
            .map_err(|e| SyslogPipelineError::Channel(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn test_config() -> SyslogTcpConfig {
        SyslogTcpConfig {
            bind_addr: "127.0.0.1:0".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn default_config() {
        let config = SyslogTcpConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:514");
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.max_message_size, 64 * 1024);
        assert_eq!(config.read_timeout_secs, 30);
    }

    #[tokio::test]
    async fn bind_failure_is_error() {
        // 이미 점유된 포트에 바인드하면 실패해야 합니다
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let config = SyslogTcpConfig {
            bind_addr: occupied.local_addr().unwrap().to_string(),
            ..Default::default()
        };
        let result = SyslogTcpCollector::bind(config, tx, CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn single_read_becomes_one_message() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let collector = SyslogTcpCollector::bind(test_config(), tx, cancel.clone())
            .await
            .unwrap();
        let addr = collector.local_addr().unwrap();
        let task = tokio::spawn(collector.run());

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"<14>one tcp event").await.unwrap();
        client.shutdown().await.unwrap();

        let raw = rx.recv().await.unwrap();
        assert_eq!(raw.data.as_ref(), b"<14>one tcp event");
        assert_eq!(raw.transport, Protocol::Tcp);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn empty_connection_produces_no_message() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let collector = SyslogTcpCollector::bind(test_config(), tx, cancel.clone())
            .await
            .unwrap();
        let addr = collector.local_addr().unwrap();
        let task = tokio::spawn(collector.run());

        // 데이터 없이 연결만 열고 닫습니다
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.shutdown().await.unwrap();
        drop(client);

        // 후속 정상 메시지는 여전히 수신됩니다
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"<14>after empty").await.unwrap();
        client.shutdown().await.unwrap();

        let raw = rx.recv().await.unwrap();
        assert_eq!(raw.data.as_ref(), b"<14>after empty");

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn concurrent_connections_are_independent() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let collector = SyslogTcpCollector::bind(test_config(), tx, cancel.clone())
            .await
            .unwrap();
        let addr = collector.local_addr().unwrap();
        let task = tokio::spawn(collector.run());

        for i in 0..5 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(format!("<14>msg-{i}").as_bytes())
                .await
                .unwrap();
            client.shutdown().await.unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..5 {
            let raw = rx.recv().await.unwrap();
            received.push(String::from_utf8_lossy(&raw.data).to_string());
        }
        received.sort();
        assert_eq!(
            received,
            vec!["<14>msg-0", "<14>msg-1", "<14>msg-2", "<14>msg-3", "<14>msg-4"]
        );

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_accept_loop() {
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let collector = SyslogTcpCollector::bind(test_config(), tx, cancel.clone())
            .await
            .unwrap();
        let task = tokio::spawn(collector.run());

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
