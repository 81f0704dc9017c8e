//! 전달량 임계값 관리자 — 롤링 윈도우 바이트 한도
//!
//! [`ThresholdGovernor`]는 윈도우당 전달 바이트 누적량을 추적하여
//! 전달 허용 여부를 결정합니다. 상태는 둘뿐입니다:
//!
//! - **Open**: 한도 미달 또는 임계값 비활성 — 전달 허용
//! - **Closed**: 현재 윈도우에서 한도 도달 — 규칙 매칭과 무관하게 드롭
//!
//! 카운터와 윈도우 경계는 단일 뮤텍스 뒤의 상태로만 존재합니다 —
//! 읽기-비교-증가가 직렬화되어 동시 전달에서도 한도를 초과해 승인하지
//! 않습니다. 모든 승인 판정은 윈도우 만료를 스스로 재평가하며, 백그라운드
//! 타이머는 조용한 시간대에도 윈도우가 굴러가게 하는 보조 신호일 뿐
//! 리셋의 단일 근원이 아닙니다.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use logship_core::metrics as metric_names;

/// 윈도우 내부 상태 — 뮤텍스로만 접근합니다.
#[derive(Debug)]
struct WindowState {
    /// 현재 윈도우에 누적된 승인 바이트
    forwarded_bytes: u64,
    /// 현재 윈도우의 종료 시각
    window_end: Instant,
    /// 현재 윈도우에서 한도 도달로 거부가 발생했는지 (Closed 상태)
    closed: bool,
}

/// 전달량 임계값 관리자
#[derive(Debug)]
pub struct ThresholdGovernor {
    /// 임계값 적용 여부 — false면 항상 승인 (퇴화된 Open 상태)
    enabled: bool,
    /// 윈도우당 바이트 한도
    limit_bytes: u64,
    /// 윈도우 길이
    window: Duration,
    /// 카운터 + 윈도우 경계 (직렬화된 접근)
    state: Mutex<WindowState>,
}

impl ThresholdGovernor {
    /// 새 관리자를 생성합니다. 첫 윈도우는 지금부터 시작합니다.
    pub fn new(enabled: bool, limit_bytes: u64, window: Duration) -> Self {
        Self {
            enabled,
            limit_bytes,
            window,
            state: Mutex::new(WindowState {
                forwarded_bytes: 0,
                window_end: end_of_window(Instant::now(), window),
                closed: false,
            }),
        }
    }

    /// 후보 바이트의 전달 승인 여부를 판정합니다.
    ///
    /// 승인 시 후보 바이트를 원자적으로 예약(카운터 증가)합니다.
    /// 판정마다 윈도우 만료를 새로 평가합니다 — 경계가 지났으면 카운터를
    /// 리셋하고 새 윈도우를 시작한 뒤 판정합니다.
    pub fn admit(&self, candidate_bytes: u64) -> bool {
        if !self.enabled {
            return true;
        }

        let mut state = self.state.lock().expect("threshold state poisoned");
        Self::roll_if_elapsed(&mut state, self.window);

        if state.forwarded_bytes + candidate_bytes >= self.limit_bytes {
            state.closed = true;
            metrics::counter!(metric_names::THRESHOLD_REJECTIONS_TOTAL).increment(1);
            return false;
        }

        state.forwarded_bytes += candidate_bytes;
        metrics::gauge!(metric_names::THRESHOLD_WINDOW_BYTES).set(state.forwarded_bytes as f64);
        true
    }

    /// 승인했지만 전달에 실패한 바이트의 예약을 해제합니다.
    ///
    /// 최종 카운터가 실제로 전달된 바이트만 반영하게 합니다.
    pub fn release(&self, bytes: u64) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock().expect("threshold state poisoned");
        state.forwarded_bytes = state.forwarded_bytes.saturating_sub(bytes);
        metrics::gauge!(metric_names::THRESHOLD_WINDOW_BYTES).set(state.forwarded_bytes as f64);
    }

    /// 윈도우 만료를 확인하고 필요하면 리셋합니다.
    ///
    /// 백그라운드 틱 태스크가 호출하는 보조 경로입니다 — 메시지가 없는
    /// 시간대에도 윈도우가 굴러가게 합니다. 리셋이 일어났으면 true를
    /// 반환합니다.
    pub fn maybe_reset(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let mut state = self.state.lock().expect("threshold state poisoned");
        Self::roll_if_elapsed(&mut state, self.window)
    }

    /// 현재 Closed 상태인지 확인합니다 (윈도우 만료 재평가 포함).
    ///
    /// Closed는 현재 윈도우에서 한도 도달로 거부가 발생했음을 뜻합니다.
    /// 상태 보고용입니다 — 승인 판정은 [`admit`](Self::admit)이 수행합니다.
    pub fn is_closed(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let mut state = self.state.lock().expect("threshold state poisoned");
        Self::roll_if_elapsed(&mut state, self.window);
        state.closed
    }

    /// 현재 윈도우에 누적된 바이트를 반환합니다.
    pub fn forwarded_bytes(&self) -> u64 {
        self.state
            .lock()
            .expect("threshold state poisoned")
            .forwarded_bytes
    }

    /// 임계값 적용 여부를 반환합니다.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// 경계가 지났으면 카운터를 리셋하고 새 윈도우를 시작합니다.
    fn roll_if_elapsed(state: &mut WindowState, window: Duration) -> bool {
        let now = Instant::now();
        if now < state.window_end {
            return false;
        }
        state.forwarded_bytes = 0;
        state.window_end = end_of_window(now, window);
        state.closed = false;
        metrics::counter!(metric_names::THRESHOLD_WINDOW_RESETS_TOTAL).increment(1);
        metrics::gauge!(metric_names::THRESHOLD_WINDOW_BYTES).set(0.0);
        true
    }
}

/// 윈도우 종료 시각을 계산합니다.
///
/// Instant 표현 범위를 넘는 윈도우는 사실상 무한(30년)으로 취급합니다.
fn end_of_window(now: Instant, window: Duration) -> Instant {
    now.checked_add(window)
        .unwrap_or_else(|| now + Duration::from_secs(30 * 365 * 86_400))
}
