//! Simulated combustion engine.
//!
//! Emits one batch per tick with an RPM value sweeping between idle and a
//! cruise band, and the matching power figure.

use std::time::Duration;

use tracing::{debug, info};
use vis_core::Update;

use crate::{AdapterError, UpdateSink, VisDataAdapter};

pub const RPM_PATH: &str = "Signal.Drivetrain.InternalCombustionEngine.RPM";
pub const POWER_PATH: &str = "Signal.Drivetrain.InternalCombustionEngine.Power";

const IDLE_RPM: i64 = 800;
const MAX_RPM: i64 = 4000;
const RPM_STEP: i64 = 200;

/// Adapter producing periodic RPM/Power batches.
#[derive(Debug, Clone)]
pub struct DemoEngineAdapter {
    interval: Duration,
    max_ticks: Option<u64>,
}

impl Default for DemoEngineAdapter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl DemoEngineAdapter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
        }
    }

    /// Stop after `ticks` batches.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// The batch emitted on a given tick.
    pub fn batch_for_tick(tick: u64) -> Vec<Update> {
        let span = (MAX_RPM - IDLE_RPM) / RPM_STEP;
        let phase = (tick % (2 * span as u64)) as i64;
        let offset = if phase <= span { phase } else { 2 * span - phase };
        let rpm = IDLE_RPM + offset * RPM_STEP;

        // Rough kW figure for a small petrol engine
        let power = rpm * 30 / 1000;

        vec![Update::new(RPM_PATH, rpm), Update::new(POWER_PATH, power)]
    }
}

impl VisDataAdapter for DemoEngineAdapter {
    fn name(&self) -> &str {
        "demo-engine"
    }

    async fn run(self, sink: UpdateSink) -> Result<(), AdapterError> {
        info!(interval = ?self.interval, "Demo engine adapter started");

        let mut ticker = tokio::time::interval(self.interval);
        let mut tick = 0u64;

        loop {
            if self.max_ticks.is_some_and(|max| tick >= max) {
                info!(ticks = tick, "Demo engine adapter finished");
                return Ok(());
            }

            ticker.tick().await;
            let batch = Self::batch_for_tick(tick);
            debug!(tick, "Sending demo batch");
            sink.send(batch).await.map_err(|_| AdapterError::SinkClosed)?;
            tick += 1;
        }
    }
}
