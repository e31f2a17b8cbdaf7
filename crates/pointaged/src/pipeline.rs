//! Frame sampler and recognition pipeline.
//!
//! A periodic tick pulls a frame from the visual source, encodes it, and
//! dispatches one recognition round trip (recognize, decide, optional write,
//! classify). An [`InFlightGate`] with a single permit guarantees frame N+1 is
//! never sampled while round trip N is unresolved; ticks that find the gate
//! taken are skipped, never queued.
//!
//! Only the pipeline's [`Publisher`] writes the overlay snapshot: round-trip
//! completions publish results, and [`Pipeline::shutdown`] closes it with a
//! blank snapshot. Round trips hold a weak reference to the publisher, and a
//! closed publisher drops anything still arriving.

use crate::alerts::AlertSink;
use crate::source::FrameSource;
use parking_lot::Mutex;
use pointage_api::{outcome_of, recognize_or_no_face, AttendanceApi};
use pointage_core::overlay::{AlertLatch, LiveStatus, OverlaySnapshot};
use pointage_core::{AttendanceOutcome, Decision, DecisionEngine, Sound, WriteIntent};
use pointage_hw::frame::{encode_jpeg, FrameSample};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Single-slot admission control for recognition round trips.
#[derive(Clone)]
pub struct InFlightGate {
    permits: Arc<Semaphore>,
}

/// Proof of admission. Dropping it, on any path, reopens the gate.
pub struct InFlightToken {
    _permit: OwnedSemaphorePermit,
}

impl Default for InFlightGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlightGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn try_enter(&self) -> Option<InFlightToken> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| InFlightToken { _permit: permit })
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub period: Duration,
    pub jpeg_quality: u8,
    pub action_threshold: f32,
    /// Camera identifier sent with attendance writes.
    pub camera_id: String,
}

/// Immutable per-pipeline context shared by round trips.
struct Context {
    api: Arc<dyn AttendanceApi>,
    engine: DecisionEngine,
    camera_id: String,
}

/// Single writer of the overlay and the alert channel.
struct Publisher {
    overlay: Arc<watch::Sender<OverlaySnapshot>>,
    /// `None` once closed.
    latch: Mutex<Option<AlertLatch>>,
    alerts: Arc<dyn AlertSink>,
}

impl Publisher {
    fn publish(&self, status: LiveStatus, employee_id: Option<i64>, landmarks: Vec<(f32, f32)>) {
        let blocked_key = match (&status, employee_id) {
            (LiveStatus::Blocked { block, .. }, Some(id)) => Some((id, block.reason)),
            _ => None,
        };
        let mut latch = self.latch.lock();
        let Some(latch) = latch.as_mut() else {
            tracing::debug!("pipeline stopped; result discarded");
            return;
        };
        let fresh_block = latch.observe(blocked_key);

        match &status {
            LiveStatus::Logged { log_type, .. } => self.alerts.play(Sound::for_log(*log_type)),
            LiveStatus::Blocked { block, .. } if fresh_block => {
                if let Some(sound) = block.sound {
                    self.alerts.play(sound);
                }
            }
            _ => {}
        }

        self.overlay.send_replace(OverlaySnapshot {
            status,
            landmarks,
            updated_at: chrono::Utc::now(),
        });
    }

    /// Blank the overlay and refuse any later result.
    fn close(&self) {
        let mut latch = self.latch.lock();
        *latch = None;
        self.overlay.send_replace(OverlaySnapshot::default());
    }
}

/// A running sampler. Dropping it stops the tick task.
pub struct Pipeline {
    tick: JoinHandle<()>,
    publisher: Option<Arc<Publisher>>,
    gate: InFlightGate,
}

impl Pipeline {
    /// Start sampling `source` every `settings.period`.
    pub fn spawn<S>(
        source: S,
        api: Arc<dyn AttendanceApi>,
        alerts: Arc<dyn AlertSink>,
        overlay: Arc<watch::Sender<OverlaySnapshot>>,
        settings: PipelineSettings,
    ) -> Self
    where
        S: FrameSource + 'static,
    {
        let context = Arc::new(Context {
            api,
            engine: DecisionEngine::new(settings.action_threshold),
            camera_id: settings.camera_id.clone(),
        });
        let publisher = Arc::new(Publisher {
            overlay,
            latch: Mutex::new(Some(AlertLatch::default())),
            alerts,
        });
        let gate = InFlightGate::new();

        tracing::info!(
            period_ms = settings.period.as_millis() as u64,
            camera = %settings.camera_id,
            "pipeline started"
        );
        let tick = tokio::spawn(run_sampler(
            source,
            context,
            publisher.clone(),
            gate.clone(),
            settings,
        ));

        Self {
            tick,
            publisher: Some(publisher),
            gate,
        }
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Stop sampling and blank the overlay. An unresolved round trip is left
    /// to finish, but its result is discarded.
    pub async fn shutdown(mut self) {
        self.tick.abort();
        let _ = (&mut self.tick).await;
        if let Some(publisher) = self.publisher.take() {
            publisher.close();
        }
        tracing::info!("pipeline stopped");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.tick.abort();
    }
}

async fn run_sampler<S: FrameSource>(
    mut source: S,
    context: Arc<Context>,
    publisher: Arc<Publisher>,
    gate: InFlightGate,
    settings: PipelineSettings,
) {
    let mut ticker = tokio::time::interval(settings.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(token) = gate.try_enter() else {
            tracing::trace!("round trip in flight; skipping tick");
            continue;
        };

        let frame = match source.grab().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::trace!("source not ready; skipping tick");
                continue;
            }
            Err(err) => {
                tracing::debug!(error = %err, "frame grab failed; skipping tick");
                continue;
            }
        };

        let sample = match encode_jpeg(&frame, settings.jpeg_quality) {
            Ok(sample) => sample,
            Err(err) => {
                tracing::debug!(error = %err, "frame encode failed; skipping tick");
                continue;
            }
        };

        tokio::spawn(round_trip(
            context.clone(),
            Arc::downgrade(&publisher),
            sample,
            token,
        ));
    }
}

async fn round_trip(
    context: Arc<Context>,
    publisher: Weak<Publisher>,
    sample: FrameSample,
    _token: InFlightToken,
) {
    let matched = recognize_or_no_face(context.api.as_ref(), sample.jpeg).await;
    let employee_id = matched.employee_id;

    let status = match context.engine.decide(&matched) {
        Decision::NoFace => LiveStatus::NoFace,
        Decision::Unauthorized { confidence } => LiveStatus::Unauthorized { confidence },
        Decision::LowConfidence { name, confidence } => {
            LiveStatus::LowConfidence { name, confidence }
        }
        Decision::Write(intent) => {
            if publisher.strong_count() == 0 {
                tracing::debug!(
                    employee_id = intent.employee_id,
                    "pipeline stopped; write skipped"
                );
                return;
            }
            let result = context
                .api
                .log_attendance(intent.employee_id, &context.camera_id, intent.confidence)
                .await;
            live_status(intent, outcome_of(result))
        }
    };

    let Some(publisher) = publisher.upgrade() else {
        tracing::debug!("pipeline stopped; result discarded");
        return;
    };
    publisher.publish(status, employee_id, matched.landmarks);
}

fn live_status(intent: WriteIntent, outcome: AttendanceOutcome) -> LiveStatus {
    let WriteIntent {
        employee_id,
        name,
        confidence,
    } = intent;

    match outcome {
        AttendanceOutcome::Logged {
            log_type,
            employee_name,
        } => {
            tracing::info!(
                employee_id,
                confidence,
                log_type = log_type.as_str(),
                "attendance logged"
            );
            LiveStatus::Logged {
                name: employee_name.unwrap_or(name),
                confidence,
                log_type,
            }
        }
        AttendanceOutcome::Blocked(block) => {
            tracing::warn!(
                employee_id,
                reason = ?block.reason,
                message = %block.raw_message,
                "attendance blocked"
            );
            LiveStatus::Blocked {
                name,
                confidence,
                block,
            }
        }
        AttendanceOutcome::TechnicalError { detail } => {
            tracing::debug!(employee_id, %detail, "attendance write not recorded");
            LiveStatus::Recognized { name, confidence }
        }
    }
}
