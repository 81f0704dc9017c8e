//! 전달 디스패처 — 페이로드를 목적지로 전송합니다.
//!
//! 호출 단위로 상태가 없습니다: UDP는 단발 데이터그램, TCP는 메시지마다
//! 새 연결을 열고 전체 페이로드를 쓰고 플러시한 뒤 닫습니다. 연결 풀링이나
//! keep-alive는 없습니다. 실패는 보고만 하고 재시도하지 않습니다 —
//! 재시도 정책은 호출자 소관입니다.
//!
//! 누적 전달 바이트의 단일 소유자는
//! [`ThresholdGovernor`](crate::threshold::ThresholdGovernor)입니다.
//! 이 모듈은 성공 시 메트릭 카운터만 증가시킵니다.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket, lookup_host};

use logship_core::error::ForwardError;
use logship_core::metrics as metric_names;
use logship_core::types::{Destination, Protocol};

/// 전달 디스패처
///
/// 목적지는 설정에서 공급되며 프로세스 수명 동안 불변입니다.
#[derive(Debug, Clone)]
pub struct Forwarder {
    destination: Destination,
}

impl Forwarder {
    /// 새 디스패처를 생성합니다.
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    /// 설정된 목적지를 반환합니다.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// 페이로드를 목적지로 전송합니다.
    ///
    /// 성공 시 전달 바이트 메트릭을 증가시킵니다. 실패는 로컬 소켓 에러,
    /// 연결 거부 등 전송 계층 오류만을 의미합니다 — UDP는 전달 확인이
    /// 없습니다.
    pub async fn forward(&self, payload: &[u8]) -> Result<(), ForwardError> {
        let addr = self.resolve().await?;

        let result = match self.destination.protocol {
            Protocol::Udp => self.send_udp(addr, payload).await,
            Protocol::Tcp => self.send_tcp(addr, payload).await,
        };

        let protocol = self.destination.protocol.to_string();
        match &result {
            Ok(()) => {
                metrics::counter!(metric_names::FORWARDED_BYTES_TOTAL,
                    metric_names::LABEL_PROTOCOL => protocol)
                .increment(payload.len() as u64);
            }
            Err(e) => {
                metrics::counter!(metric_names::FORWARD_FAILURES_TOTAL,
                    metric_names::LABEL_PROTOCOL => protocol)
                .increment(1);
                tracing::debug!(dest = %self.destination, error = %e, "forward failed");
            }
        }

        result
    }

    /// 목적지 호스트를 소켓 주소로 해석합니다.
    async fn resolve(&self) -> Result<SocketAddr, ForwardError> {
        let host = self.destination.host.as_str();
        let port = self.destination.port;

        lookup_host((host, port))
            .await
            .map_err(|e| ForwardError::Resolve {
                host: host.to_owned(),
                port,
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ForwardError::Resolve {
                host: host.to_owned(),
                port,
                reason: "no addresses returned".to_owned(),
            })
    }

    /// 단발 UDP 데이터그램을 전송합니다.
    async fn send_udp(&self, addr: SocketAddr, payload: &[u8]) -> Result<(), ForwardError> {
        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ForwardError::Send {
                dest: addr.to_string(),
                reason: format!("failed to bind ephemeral socket: {e}"),
            })?;

        socket
            .send_to(payload, addr)
            .await
            .map_err(|e| ForwardError::Send {
                dest: addr.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    /// 메시지당 단명 TCP 연결로 페이로드를 전송합니다.
    async fn send_tcp(&self, addr: SocketAddr, payload: &[u8]) -> Result<(), ForwardError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ForwardError::Connect {
                dest: addr.to_string(),
                reason: e.to_string(),
            })?;

        stream
            .write_all(payload)
            .await
            .map_err(|e| ForwardError::Send {
                dest: addr.to_string(),
                reason: e.to_string(),
            })?;
        stream.flush().await.map_err(|e| ForwardError::Send {
            dest: addr.to_string(),
            reason: e.to_string(),
        })?;
        stream.shutdown().await.map_err(|e| ForwardError::Send {
            dest: addr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn destination(host: &str, port: u16, protocol: Protocol) -> Destination {
        Destination {
            host: host.to_owned(),
            port,
            protocol,
        }
    }

    #[tokio::test]
    async fn udp_forward_delivers_payload() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let forwarder = Forwarder::new(destination("127.0.0.1", port, Protocol::Udp));
        forwarder.forward(b"<14>test message").await.unwrap();

        let mut buf = [0u8; 1024];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"<14>test message");
    }

    #[tokio::test]
    async fn tcp_forward_delivers_full_payload_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let forwarder = Forwarder::new(destination("127.0.0.1", port, Protocol::Tcp));
        let send = tokio::spawn(async move { forwarder.forward(b"<14>over tcp").await });

        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        // 연결이 닫힐 때까지 읽습니다 — 전달자가 flush 후 닫아야 끝납니다
        stream.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"<14>over tcp");

        send.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn tcp_connect_refused_is_reported() {
        // bind 후 즉시 drop하여 닫힌 포트를 확보합니다
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let forwarder = Forwarder::new(destination("127.0.0.1", port, Protocol::Tcp));
        let err = forwarder.forward(b"payload").await.unwrap_err();
        assert!(matches!(err, ForwardError::Connect { .. }));
    }

    #[tokio::test]
    async fn unresolvable_host_is_reported() {
        let forwarder = Forwarder::new(destination(
            "definitely-not-a-host.invalid",
            514,
            Protocol::Udp,
        ));
        let err = forwarder.forward(b"payload").await.unwrap_err();
        assert!(matches!(err, ForwardError::Resolve { .. }));
    }

    #[tokio::test]
    async fn consecutive_forwards_use_fresh_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let forwarder = Forwarder::new(destination("127.0.0.1", port, Protocol::Tcp));
        let accept_task = tokio::spawn(async move {
            let mut connections = 0;
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).await.unwrap();
                connections += 1;
            }
            connections
        });

        forwarder.forward(b"first").await.unwrap();
        forwarder.forward(b"second").await.unwrap();
        // 메시지마다 독립된 연결이 수립됩니다
        assert_eq!(accept_task.await.unwrap(), 2);
    }
}
