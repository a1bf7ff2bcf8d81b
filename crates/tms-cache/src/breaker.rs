//! 캐시 백엔드용 Circuit Breaker.
//!
//! 백엔드가 연속으로 실패하면 일정 시간 동안 캐시를 우회하여
//! 모든 요청이 타임아웃을 기다리지 않고 곧바로 저장소로 향하게 합니다.
//!
//! # 상태 전이
//!
//! ```text
//! Closed ──[연속 실패 임계치 도달]──> Open
//!    ↑                                  │
//!    │                          [cooldown 경과]
//!    │                                  ↓
//!    └──────[성공]────── HalfOpen ──[실패]──> Open
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Circuit Breaker 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// 정상 상태 - 모든 요청 허용
    Closed,
    /// 장애 상태 - 캐시 우회
    Open,
    /// 복구 확인 상태 - 요청 허용, 실패 시 즉시 Open
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

/// 연속 실패 기반 Circuit Breaker.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    cooldown: Duration,
    state: RwLock<BreakerState>,
    /// Circuit Open 횟수 (메트릭용)
    open_count: AtomicU64,
}

impl CircuitBreaker {
    /// 새 Circuit Breaker 생성.
    ///
    /// `failure_threshold`가 0이면 1로 취급합니다.
    pub fn new(name: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
            }),
            open_count: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> RwLockWriteGuard<'_, BreakerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 현재 상태 반환.
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.maybe_half_open(&mut state);
        state.state
    }

    /// 요청이 허용되는지 확인.
    pub fn is_allowed(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// 성공 기록. HalfOpen이면 Closed로 복구합니다.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen {
            tracing::info!(
                circuit_breaker = %self.name,
                "Circuit breaker recovered: HalfOpen -> Closed"
            );
        }
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.opened_at = None;
    }

    /// 실패 기록. 임계치에 도달하거나 HalfOpen이면 Open으로 전이합니다.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.failure_threshold {
                    self.open(&mut state);
                    tracing::warn!(
                        circuit_breaker = %self.name,
                        failure_count = state.failure_count,
                        cooldown_secs = self.cooldown.as_secs(),
                        "Circuit breaker tripped: Closed -> Open, bypassing cache"
                    );
                }
            }
            CircuitState::HalfOpen => {
                self.open(&mut state);
                tracing::warn!(
                    circuit_breaker = %self.name,
                    "Circuit breaker recovery failed: HalfOpen -> Open"
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Open 전이 누적 횟수.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }

    fn open(&self, state: &mut BreakerState) {
        state.state = CircuitState::Open;
        state.opened_at = Some(Instant::now());
        self.open_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("tms_cache_circuit_open_total", "breaker" => self.name.clone())
            .increment(1);
    }

    fn maybe_half_open(&self, state: &mut BreakerState) {
        if state.state != CircuitState::Open {
            return;
        }
        if let Some(opened_at) = state.opened_at {
            if opened_at.elapsed() >= self.cooldown {
                state.state = CircuitState::HalfOpen;
                tracing::info!(
                    circuit_breaker = %self.name,
                    "Circuit breaker cooldown elapsed: Open -> HalfOpen"
                );
            }
        }
    }
}
