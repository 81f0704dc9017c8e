use anyhow::Result;
use clap::Parser;

use logship_core::config::LogshipConfig;
use logship_core::pipeline::Pipeline;
use logship_pipeline::SyslogPipelineBuilder;
use logship_pipeline::config::PipelineConfig;

use logship_daemon::cli::DaemonCli;
use logship_daemon::{logging, metrics_server, sink};

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonCli::parse();

    // 설정 로드 (파일 + 환경변수) 후 CLI 오버라이드 적용
    let mut config = LogshipConfig::load(&args.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config from {:?}: {}", args.config, e))?;
    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = args.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if args.validate {
        println!("configuration OK: {}", args.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(config = %args.config.display(), "logship-daemon starting");

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    // 파이프라인 빌드 — 처분 이벤트 채널은 싱크 태스크가 소비합니다
    let pipeline_config = PipelineConfig::from_core(&config)
        .map_err(|e| anyhow::anyhow!("failed to derive pipeline config: {}", e))?;
    let (mut pipeline, event_rx) = SyslogPipelineBuilder::new()
        .config(pipeline_config)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build syslog pipeline: {}", e))?;

    let event_rx =
        event_rx.ok_or_else(|| anyhow::anyhow!("pipeline builder returned no event channel"))?;
    let sink_handle = sink::spawn_sink_task(event_rx);

    // 시작 — 리스너 바인드 실패는 치명적입니다
    pipeline
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start syslog pipeline: {}", e))?;

    tracing::info!(
        udp = ?pipeline.udp_local_addr(),
        tcp = ?pipeline.tcp_local_addr(),
        threshold = pipeline.governor().enabled(),
        "logship-daemon running"
    );

    // 종료 시그널 대기
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    // 우아한 종료 — 진행 중인 메시지를 드레인합니다
    if let Err(e) = pipeline.stop().await {
        tracing::error!(error = %e, "failed to stop syslog pipeline");
    }
    drop(pipeline);

    // 파이프라인이 내려가면 이벤트 채널이 닫혀 싱크가 드레인을 마칩니다
    match sink_handle.await {
        Ok(processed) => tracing::info!(processed, "logship-daemon shut down"),
        Err(e) => tracing::error!(error = %e, "sink task failed during shutdown"),
    }

    Ok(())
}
