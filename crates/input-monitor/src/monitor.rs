//! The drain loop: waits for events, reacts to controller hotplug and prints
//! every event to a writer.
//!
//! The loop is blocking by nature (`InputContext::wait_timeout` parks the
//! thread), so the binary runs it inside `tokio::task::spawn_blocking` and
//! flips the shared `running` flag from the Ctrl-C handler.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use input_core::events::DeviceEvent;
use input_core::{CoreError, EventPayload, InputContext, InputEvent, InstanceId};
use thiserror::Error;
use tracing::{info, warn};

use crate::output::{render, OutputFormat};

/// How long one wait may block before the stop conditions are re-checked.
const POLL_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("failed to write event: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why [`Monitor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitEvent,
    Deadline,
    Interrupted,
}

/// Summary of one [`Monitor::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub events: usize,
    pub reason: StopReason,
}

pub struct Monitor {
    ctx: Arc<InputContext>,
    format: OutputFormat,
    auto_open_controllers: bool,
}

impl Monitor {
    pub fn new(ctx: Arc<InputContext>, format: OutputFormat, auto_open_controllers: bool) -> Self {
        Self {
            ctx,
            format,
            auto_open_controllers,
        }
    }

    /// Drains events until a quit event, the deadline or `running` turning false.
    pub fn run<W: Write>(
        &self,
        running: &AtomicBool,
        deadline: Option<Instant>,
        out: &mut W,
    ) -> Result<RunSummary, MonitorError> {
        let mut events = 0;
        loop {
            if !running.load(Ordering::Relaxed) {
                return Ok(RunSummary { events, reason: StopReason::Interrupted });
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(RunSummary { events, reason: StopReason::Deadline });
                    }
                    POLL_SLICE.min(deadline - now)
                }
                None => POLL_SLICE,
            };

            let Some(event) = self.ctx.wait_timeout(slice)? else {
                continue;
            };
            events += 1;
            if !self.handle(&event, out)? {
                return Ok(RunSummary { events, reason: StopReason::QuitEvent });
            }
        }
    }

    /// Prints one event and reacts to it.  Returns `false` for a quit event.
    pub fn handle<W: Write>(&self, event: &InputEvent, out: &mut W) -> Result<bool, MonitorError> {
        writeln!(out, "{}", render(event, self.format)?)?;

        match event.payload {
            EventPayload::Quit => return Ok(false),
            EventPayload::ControllerDeviceAdded(DeviceEvent { which }) if self.auto_open_controllers => {
                self.open_controller(which)?;
            }
            _ => {}
        }
        Ok(true)
    }

    fn open_controller(&self, which: InstanceId) -> Result<(), MonitorError> {
        let index = self
            .ctx
            .joysticks(|j| j.attached_ids().iter().position(|id| *id == which))?;
        let Some(index) = index else {
            warn!(instance = %which, "announced controller already gone");
            return Ok(());
        };
        match self.ctx.open_controller(index) {
            Ok(id) => {
                let name = self.ctx.controllers().name(id).unwrap_or_default();
                info!(instance = %id, %name, "controller opened");
            }
            Err(err) => warn!(instance = %which, error = %err, "controller could not be opened"),
        }
        Ok(())
    }
}
