//! Sensor polling
//! Each bound sensor characteristic gets a periodic job. A job only keeps
//! time: it posts a [`ControllerMessage::PollTick`] to the controller
//! mailbox, and the controller runs the read/notify cycle itself.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc::WeakSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::commands::ControllerMessage;
use crate::core::bluetooth::notification::NotificationArbiter;
use crate::core::bluetooth::transport::GattTransport;
use crate::core::bluetooth::types::{GattCharacteristic, Role};

/// The two polling periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPeriods {
    pub short: Duration,
    pub long: Duration,
}

impl PollPeriods {
    /// Period for `role`. The secondary sensor always uses the long period;
    /// once it is present every sensor does.
    pub fn period_for(&self, role: Role, secondary_present: bool) -> Duration {
        if role == Role::SensorSecondary || secondary_present {
            self.long
        } else {
            self.short
        }
    }
}

/// Handle to a running polling job.
struct PollingJob {
    period: Duration,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the polling jobs of the current session.
pub struct PollingScheduler {
    periods: PollPeriods,
    jobs: HashMap<Role, PollingJob>,
    /// Bumped whenever jobs are cancelled so ticks already queued in the
    /// mailbox can be recognised as stale.
    session: u64,
    parent_token: CancellationToken,
}

impl PollingScheduler {
    /// Create a new scheduler whose jobs are cancelled with `parent_token`.
    pub fn new(periods: PollPeriods, parent_token: CancellationToken) -> Self {
        Self {
            periods,
            jobs: HashMap::new(),
            session: 0,
            parent_token,
        }
    }

    pub fn periods(&self) -> PollPeriods {
        self.periods
    }

    /// Number of jobs currently running.
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// True if a tick for `role` from `session` was issued by a job that is still alive.
    pub fn accepts_tick(&self, session: u64, role: Role) -> bool {
        session == self.session && self.jobs.contains_key(&role)
    }

    /// Starts the periodic job for `role`; the first tick fires after one
    /// `period`. Replaces any job already running for that role.
    pub fn start(&mut self, role: Role, period: Duration, mailbox: WeakSender<ControllerMessage>) {
        if let Some(existing) = self.jobs.remove(&role) {
            existing.cancel_token.cancel();
        }

        let cancel_token = self.parent_token.child_token();
        let task_token = cancel_token.clone();
        let session = self.session;

        let handle = tokio::spawn(async move {
            tick_loop(mailbox, session, role, period, task_token).await;
        });

        self.jobs.insert(
            role,
            PollingJob {
                period,
                cancel_token,
                handle,
            },
        );
        info!("Started polling {:?} every {} ms", role, period.as_millis());
    }

    /// Cancels every job and invalidates their queued ticks.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.jobs.len();
        for (role, job) in self.jobs.drain() {
            job.cancel_token.cancel();
            job.handle.abort();
            debug!("Cancelled {} ms polling for {:?}", job.period.as_millis(), role);
        }
        self.session += 1;
        cancelled
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn tick_loop(
    mailbox: WeakSender<ControllerMessage>,
    session: u64,
    role: Role,
    period: Duration,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = sleep(period) => {}
        }

        let Some(tx) = mailbox.upgrade() else {
            break;
        };
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            sent = tx.send(ControllerMessage::PollTick { session, role }) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Polling loop for {:?} ended", role);
}

/// One read/notify cycle on a sensor characteristic.
///
/// A readable characteristic first has any active notification cleared,
/// then gets a read request. A notifiable characteristic then becomes the
/// notification target.
pub async fn poll_cycle<T>(
    transport: &mut T,
    arbiter: &mut NotificationArbiter,
    characteristic: &GattCharacteristic,
) where
    T: GattTransport + ?Sized,
{
    if characteristic.is_readable() {
        if let Err(e) = arbiter.set_target(transport, None).await {
            warn!("Failed to clear notification target: {}", e);
        }
        if let Err(e) = transport.read_characteristic(characteristic).await {
            warn!("Read request for {} failed: {}", characteristic.uuid, e);
        }
    }

    if characteristic.is_notifiable() {
        if let Err(e) = arbiter.set_target(transport, Some(characteristic)).await {
            warn!("Failed to enable notifications on {}: {}", characteristic.uuid, e);
        }
    }
}
