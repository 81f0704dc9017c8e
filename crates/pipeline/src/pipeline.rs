//! 파이프라인 오케스트레이션 — 수신/파싱/매칭/승인/전달의 전체 흐름
//!
//! [`SyslogPipeline`]은 core의 [`Pipeline`](logship_core::pipeline::Pipeline)
//! trait을 구현하여 데몬에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! UDP/TCP Collectors -> mpsc -> dispatch loop -> 메시지당 태스크
//!                                                  parse -> first_match
//!                                                  -> ThresholdGovernor
//!                                                  -> Forwarder
//!                                                  -> DispositionEvent -> mpsc -> sink
//! ```
//!
//! 수신 루프는 메시지 하나의 처리가 끝나기를 기다리지 않습니다 — 메시지마다
//! 경량 태스크를 스폰하고, 종료 시 [`TaskTracker`]로 전부 드레인합니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use logship_core::error::LogshipError;
use logship_core::event::DispositionEvent;
use logship_core::metrics as metric_names;
use logship_core::pipeline::{HealthStatus, Pipeline};
use logship_core::types::{Action, DefaultAction, Disposition};

use crate::collector::{
    RawMessage, SyslogTcpCollector, SyslogTcpConfig, SyslogUdpCollector, SyslogUdpConfig,
};
use crate::config::PipelineConfig;
use crate::error::SyslogPipelineError;
use crate::forwarder::Forwarder;
use crate::parser;
use crate::rule::{RuleLoader, RuleStore};
use crate::threshold::ThresholdGovernor;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 메시지 처리에 필요한 공유 문맥
///
/// 메시지당 태스크들이 `Arc`로 공유합니다. 가변 공유 상태는
/// [`RuleStore`]의 RwLock과 [`ThresholdGovernor`]의 뮤텍스 내부에만
/// 존재합니다.
struct PipelineCore {
    /// 규칙 저장소
    rules: Arc<RuleStore>,
    /// 임계값 관리자
    governor: Arc<ThresholdGovernor>,
    /// 전달 디스패처
    forwarder: Arc<Forwarder>,
    /// 처분 이벤트 채널
    event_tx: mpsc::Sender<DispositionEvent>,
    /// 규칙 미매칭 시 기본 동작
    default_action: DefaultAction,
}

/// Syslog 파이프라인
pub struct SyslogPipeline {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 공유 처리 문맥
    core: Arc<PipelineCore>,
    /// 원시 메시지 채널 송신측 (수집기에 전달)
    raw_tx: mpsc::Sender<RawMessage>,
    /// 원시 메시지 채널 수신측 (start에서 dispatch 루프로 이동)
    raw_rx: Option<mpsc::Receiver<RawMessage>>,
    /// 종료 신호
    cancel: CancellationToken,
    /// 메시지당 태스크 추적 (드레인용)
    tracker: TaskTracker,
    /// 수집기/루프 태스크 핸들
    tasks: Vec<JoinHandle<()>>,
    /// 시작 후 실제 바인드된 UDP 주소
    udp_local_addr: Option<SocketAddr>,
    /// 시작 후 실제 바인드된 TCP 주소
    tcp_local_addr: Option<SocketAddr>,
}

impl SyslogPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 규칙 저장소 핸들을 반환합니다.
    ///
    /// 관리 표면이 이 핸들로 규칙을 쓰면 다음에 평가되는 메시지부터
    /// 보입니다.
    pub fn rules(&self) -> Arc<RuleStore> {
        Arc::clone(&self.core.rules)
    }

    /// 임계값 관리자 핸들을 반환합니다.
    pub fn governor(&self) -> Arc<ThresholdGovernor> {
        Arc::clone(&self.core.governor)
    }

    /// 시작 후 실제 바인드된 UDP 주소를 반환합니다.
    pub fn udp_local_addr(&self) -> Option<SocketAddr> {
        self.udp_local_addr
    }

    /// 시작 후 실제 바인드된 TCP 주소를 반환합니다.
    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.tcp_local_addr
    }

    /// 설정된 규칙 디렉토리에서 규칙을 로드하여 저장소를 채웁니다.
    ///
    /// 디렉토리를 읽을 수 없으면 경고를 남기고 빈 규칙으로 계속합니다 —
    /// 규칙 디렉토리 문제는 설정 문제이지 수신을 막을 이유가 아닙니다.
    async fn load_rules(&self) {
        let Some(dir) = self.config.rule_dir.as_deref() else {
            return;
        };

        match RuleLoader::load_directory(dir).await {
            Ok(rules) => {
                let count = rules.len();
                self.core.rules.replace_all(rules).await;
                tracing::info!(rules = count, dir, "loaded classification rules");
            }
            Err(e) => {
                tracing::warn!(dir, error = %e, "failed to load rules, starting with none");
            }
        }
    }
}

impl Pipeline for SyslogPipeline {
    async fn start(&mut self) -> Result<(), LogshipError> {
        if self.state == PipelineState::Running {
            return Err(logship_core::error::PipelineError::AlreadyRunning.into());
        }

        tracing::info!("starting syslog pipeline");

        // 1. 규칙 로드
        self.load_rules().await;

        // 2. 수집기 바인드 — 실패는 치명적이며 시작을 중단합니다
        let udp_config = SyslogUdpConfig {
            bind_addr: self.config.udp_bind.clone(),
            max_message_size: self.config.max_message_size,
        };
        let udp_collector =
            SyslogUdpCollector::bind(udp_config, self.raw_tx.clone(), self.cancel.clone())
                .await
                .map_err(LogshipError::from)?;
        self.udp_local_addr = udp_collector.local_addr().ok();

        let tcp_config = SyslogTcpConfig {
            bind_addr: self.config.tcp_bind.clone(),
            max_connections: self.config.max_tcp_connections,
            max_message_size: self.config.max_message_size,
            read_timeout_secs: self.config.tcp_read_timeout_secs,
        };
        let tcp_collector =
            SyslogTcpCollector::bind(tcp_config, self.raw_tx.clone(), self.cancel.clone())
                .await
                .map_err(LogshipError::from)?;
        self.tcp_local_addr = tcp_collector.local_addr().ok();

        // 3. 수집기 태스크 스폰
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = udp_collector.run().await {
                tracing::error!(error = %e, "UDP collector terminated");
            }
        }));
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = tcp_collector.run().await {
                tracing::error!(error = %e, "TCP collector terminated");
            }
        }));

        // 4. 디스패치 루프 스폰 — 메시지마다 경량 태스크 하나
        let mut raw_rx = self
            .raw_rx
            .take()
            .ok_or_else(|| logship_core::error::PipelineError::InitFailed(
                "raw message receiver already taken".to_owned(),
            ))?;
        let core = Arc::clone(&self.core);
        let tracker = self.tracker.clone();
        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_raw = raw_rx.recv() => {
                        match maybe_raw {
                            Some(raw) => {
                                let core = Arc::clone(&core);
                                tracker.spawn(process_message(core, raw));
                            }
                            None => break,
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        }));

        // 5. 임계값 보조 리셋 틱 — 조용한 시간대에도 윈도우가 굴러갑니다
        let governor = Arc::clone(&self.core.governor);
        let cancel = self.cancel.clone();
        let tick_interval = self.config.threshold_tick_interval;
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if governor.maybe_reset() {
                            tracing::debug!("threshold window rolled over");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        }));

        self.state = PipelineState::Running;
        tracing::info!(
            udp = ?self.udp_local_addr,
            tcp = ?self.tcp_local_addr,
            "syslog pipeline started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogshipError> {
        if self.state != PipelineState::Running {
            return Err(logship_core::error::PipelineError::NotRunning.into());
        }

        tracing::info!("stopping syslog pipeline");

        // 1. 수신 중단
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "pipeline task panicked during shutdown");
            }
        }

        // 2. 진행 중인 메시지 태스크 드레인 — 전달 도중 중단하지 않습니다
        self.tracker.close();
        self.tracker.wait().await;

        self.state = PipelineState::Stopped;
        tracing::info!("syslog pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.core.governor.is_closed() {
                    HealthStatus::Degraded(
                        "forwarding suspended: byte threshold reached".to_owned(),
                    )
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 메시지 하나의 결정 파이프라인 (§처리 알고리즘)
///
/// 1. 파싱 (전체 함수 — 실패 없음)
/// 2. 활성 규칙을 id 오름차순 평가, 첫 매칭 우선
/// 3. 잠정 forward면 임계값 승인 — 거부 시 drop으로 강등 (규칙 id 유지)
/// 4. forward면 전달 — 실패 시 forward_failed로 기록하고 예약 해제
/// 5. 처분 이벤트를 정확히 하나 방출
///
/// 모든 메시지 단위 실패는 이 태스크 안에 갇힙니다.
async fn process_message(core: Arc<PipelineCore>, raw: RawMessage) {
    let text = parser::decode(&raw.data);
    let parsed = parser::parse(&text);
    let source_ip = raw.peer_addr.ip();
    let size_bytes = raw.data.len();

    let matched_rule = core.rules.first_match(source_ip, &parsed, &text).await;
    if matched_rule.is_some() {
        metrics::counter!(metric_names::RULE_MATCHES_TOTAL).increment(1);
    }

    let mut action = if matched_rule.is_some() {
        Action::Forward
    } else if core.default_action == DefaultAction::Forward {
        Action::Forward
    } else {
        Action::Unmatched
    };

    // 임계값 승인 — 승인 자체가 바이트를 예약합니다
    if action == Action::Forward && !core.governor.admit(size_bytes as u64) {
        tracing::debug!(
            source = %source_ip,
            size_bytes,
            "threshold reached, downgrading to drop"
        );
        action = Action::Drop;
    }

    if action == Action::Forward {
        // 목적지는 원문 바이트를 그대로 받습니다
        if let Err(e) = core.forwarder.forward(&raw.data).await {
            tracing::warn!(source = %source_ip, error = %e, "forward failed");
            core.governor.release(size_bytes as u64);
            action = Action::ForwardFailed;
        }
    }

    metrics::counter!(metric_names::MESSAGES_DISPOSED_TOTAL,
        metric_names::LABEL_ACTION => action.to_string())
    .increment(1);

    let disposition = Disposition {
        timestamp: raw.received_at,
        source_ip,
        raw: text,
        size_bytes,
        action,
        rule_id: matched_rule,
    };

    // 싱크 실패는 기록만 하고 메시지는 처리된 것으로 간주합니다
    if core
        .event_tx
        .send(DispositionEvent::new(disposition))
        .await
        .is_err()
    {
        metrics::counter!(metric_names::SINK_FAILURES_TOTAL).increment(1);
        tracing::error!("event sink channel closed, disposition record lost");
    }
}

/// Syslog 파이프라인 빌더
///
/// 파이프라인을 구성하고 필요한 채널을 생성합니다.
pub struct SyslogPipelineBuilder {
    config: PipelineConfig,
    event_tx: Option<mpsc::Sender<DispositionEvent>>,
}

impl SyslogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            event_tx: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 처분 이벤트 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn event_sender(mut self, tx: mpsc::Sender<DispositionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `SyslogPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<DispositionEvent>>`: 처분 이벤트 수신 채널
    ///   (외부 event_sender를 설정한 경우 None)
    #[allow(clippy::type_complexity)]
    pub fn build(
        self,
    ) -> Result<(SyslogPipeline, Option<mpsc::Receiver<DispositionEvent>>), SyslogPipelineError>
    {
        self.config.validate()?;

        let (raw_tx, raw_rx) = mpsc::channel(self.config.raw_channel_capacity);

        let (event_tx, event_rx) = if let Some(tx) = self.event_tx {
            (tx, None)
        } else {
            let (tx, rx) = mpsc::channel(self.config.event_channel_capacity);
            (tx, Some(rx))
        };

        let governor = Arc::new(ThresholdGovernor::new(
            self.config.threshold_enabled,
            self.config.threshold_limit_bytes,
            self.config.threshold_window,
        ));

        let core = Arc::new(PipelineCore {
            rules: Arc::new(RuleStore::new()),
            governor,
            forwarder: Arc::new(Forwarder::new(self.config.destination.clone())),
            event_tx,
            default_action: self.config.default_action,
        });

        let pipeline = SyslogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            core,
            raw_tx,
            raw_rx: Some(raw_rx),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            tasks: Vec::new(),
            udp_local_addr: None,
            tcp_local_addr: None,
        };

        Ok((pipeline, event_rx))
    }
}

impl Default for SyslogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
