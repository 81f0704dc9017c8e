//! Disposition event sink.
//!
//! Consumes the pipeline's disposition channel and records one structured
//! log line per ingested message. This is the in-process stand-in for the
//! external event store: a sink write failure is logged and the message is
//! still considered processed — the pipeline never retries sink failures.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use logship_core::event::DispositionEvent;

/// Spawn the sink task.
///
/// Runs until the pipeline side of the channel is dropped, then returns
/// the number of records processed.
pub fn spawn_sink_task(mut rx: mpsc::Receiver<DispositionEvent>) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut processed: u64 = 0;
        while let Some(event) = rx.recv().await {
            let d = &event.disposition;
            tracing::info!(
                target: "logship::events",
                event_id = %event.id,
                trace_id = %event.metadata.trace_id,
                action = %d.action,
                source_ip = %d.source_ip,
                size_bytes = d.size_bytes,
                rule_id = d.rule_id,
                raw = %d.raw,
                "message disposition"
            );
            processed += 1;
        }
        tracing::debug!(processed, "disposition sink drained");
        processed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    use logship_core::types::{Action, Disposition};

    fn sample_event(action: Action) -> DispositionEvent {
        DispositionEvent::new(Disposition {
            timestamp: SystemTime::now(),
            source_ip: "10.0.0.5".parse().unwrap(),
            raw: "<14>test".to_owned(),
            size_bytes: 8,
            action,
            rule_id: None,
        })
    }

    #[tokio::test]
    async fn sink_counts_records_and_drains_on_close() {
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_sink_task(rx);

        tx.send(sample_event(Action::Forward)).await.unwrap();
        tx.send(sample_event(Action::Drop)).await.unwrap();
        tx.send(sample_event(Action::Unmatched)).await.unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 3);
    }
}
