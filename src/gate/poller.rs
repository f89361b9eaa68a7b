//! Verification poller.
//!
//! One task per mounted verify view. It refreshes the session claims with the
//! cache bypassed and redirects to `/profile` once the email is verified.
//!
//! ```text
//!            mount / foreground / tick
//!   Idle ─────────────────────────────▶ Checking ──verified──▶ Verified
//!    ▲                                     │
//!    ├──────────── not verified ───────────┤
//!    └──────────── Error ◀── failed ───────┘
//!
//!   any ── elapsed > ceiling or attempts spent ──▶ BudgetExhausted
//! ```
//!
//! Rules:
//! - At most one check is in flight; triggers that arrive meanwhile are dropped.
//! - A failed check passes through `Error` back to `Idle` and is only logged.
//! - The cadence timer only runs while the view is visible.
//! - After the budget is spent no automatic check starts, but
//!   [`PollerHandle::force_check`] still works and resets the budget.
//! - Unmounting drops every timer and the in-flight check; nothing fires afterwards.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::foreground::{ForegroundEvent, ForegroundSource, Subscription};
use super::intent::{Intent, IntentStore};
use super::resend::ResendApi;
use super::router::{Navigation, Navigator, Route};
use super::schedule::{Scheduler, TimerHandle};
use super::GateError;
use crate::identity::{BoxError, IdentityClient};

pub const RESEND_SENT_MESSAGE: &str = "Verification email sent. Please check your inbox.";
pub const RESEND_FAILED_MESSAGE: &str = "Could not resend email. Please try again in a minute.";

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

// Upper bound for every policy duration.
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Cadence and budget knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    cadence: Duration,
    max_elapsed: Duration,
    max_attempts: u32,
    redirect_delay: Duration,
    message_ttl: Duration,
}

impl PollPolicy {
    /// 2s cadence, 120s ceiling, 60 automatic attempts, 400ms redirect delay,
    /// status messages cleared after 5s.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cadence: Duration::from_secs(2),
            max_elapsed: Duration::from_secs(120),
            max_attempts: 60,
            redirect_delay: Duration::from_millis(400),
            message_ttl: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    #[must_use]
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = ttl;
        self
    }

    /// Clamp values that would make the poller spin, never run, or overflow a deadline.
    #[must_use]
    pub fn normalize(self) -> Self {
        let cadence = if self.cadence.is_zero() {
            Duration::from_millis(500)
        } else {
            self.cadence.min(MAX_DELAY)
        };
        let message_ttl = if self.message_ttl.is_zero() {
            Duration::from_secs(1)
        } else {
            self.message_ttl.min(MAX_DELAY)
        };
        Self {
            cadence,
            max_elapsed: self.max_elapsed.min(MAX_DELAY),
            max_attempts: self.max_attempts.max(1),
            redirect_delay: self.redirect_delay.min(MAX_DELAY),
            message_ttl,
        }
    }

    #[must_use]
    pub const fn cadence(&self) -> Duration {
        self.cadence
    }

    #[must_use]
    pub const fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn redirect_delay(&self) -> Duration {
        self.redirect_delay
    }

    #[must_use]
    pub const fn message_ttl(&self) -> Duration {
        self.message_ttl
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollStatus {
    Idle,
    Checking,
    Verified,
    BudgetExhausted,
    /// A check just failed. Never reported: the poller settles back to `Idle`.
    Error,
}

impl PollStatus {
    /// No automatic checks happen from these states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::BudgetExhausted)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Verified,
    Unverified,
    Failed,
}

/// Observable state of one poll cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollSnapshot {
    pub status: PollStatus,
    pub elapsed: Duration,
    /// Automatic checks started since the budget was last reset.
    pub attempts: u32,
    pub remaining_attempts: u32,
    /// Countdown to the next cadence tick; `None` while paused or finished.
    pub next_check_in: Option<Duration>,
    pub message: Option<String>,
    pub redirecting: bool,
    pub sending: bool,
    /// Every check started, automatic or forced.
    pub checks_started: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    Mount,
    Foreground,
    Cadence,
    Manual,
}

impl Trigger {
    const fn is_automatic(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

enum Command {
    Foreground(ForegroundEvent),
    Tick(u64),
    Redirect,
    ExpireMessage(u64),
    ForceCheck(oneshot::Sender<CheckOutcome>),
    Resend(oneshot::Sender<Result<(), GateError>>),
    Snapshot(oneshot::Sender<PollSnapshot>),
    Unmount(oneshot::Sender<()>),
}

/// Everything a poll cycle needs; mount it to start polling.
pub struct VerificationPoller<I, R> {
    identity: Arc<I>,
    resend: Arc<R>,
    intents: IntentStore,
    navigator: Arc<dyn Navigator>,
    scheduler: Arc<dyn Scheduler>,
    policy: PollPolicy,
}

impl<I: IdentityClient, R: ResendApi> VerificationPoller<I, R> {
    #[must_use]
    pub fn new(
        identity: Arc<I>,
        resend: Arc<R>,
        intents: IntentStore,
        navigator: Arc<dyn Navigator>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            identity,
            resend,
            intents,
            navigator,
            scheduler,
            policy: PollPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy.normalize();
        self
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<I> {
        &self.identity
    }

    #[must_use]
    pub fn intents(&self) -> &IntentStore {
        &self.intents
    }

    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Subscribe to foreground events and start the cycle on the current runtime.
    #[must_use]
    pub fn mount(self, foreground: &dyn ForegroundSource) -> PollerHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let events = tx.clone();
        let subscription = foreground.subscribe(Arc::new(move |event| {
            let _ = events.send(Command::Foreground(event));
        }));

        let cycle = Cycle {
            now_started: self.scheduler.now(),
            identity: self.identity,
            resend: self.resend,
            intents: self.intents,
            navigator: self.navigator,
            scheduler: self.scheduler,
            policy: self.policy,
            tx: tx.clone(),
            subscription: Some(subscription),
            visible: foreground.is_visible(),
            status: PollStatus::Idle,
            attempts: 0,
            checks_started: 0,
            tick: None,
            tick_generation: 0,
            next_tick_at: None,
            in_flight: None,
            forced: Vec::new(),
            redirect: None,
            redirecting: false,
            redirected: false,
            message: None,
            message_timer: None,
            message_generation: 0,
            sending: None,
        };

        let task = tokio::spawn(cycle.run(rx));
        PollerHandle { tx, task }
    }
}

/// Handle to a mounted poller. Dropping it tears the cycle down.
#[derive(Debug)]
pub struct PollerHandle {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Check right now, outside the cadence, even after the budget ran out.
    ///
    /// # Errors
    /// [`GateError::PollerStopped`] if the cycle is gone.
    pub async fn force_check(&self) -> Result<CheckOutcome, GateError> {
        self.request(Command::ForceCheck).await
    }

    /// Trigger the resend endpoint; the outcome also shows up as a transient message.
    ///
    /// # Errors
    /// The resend failure, [`GateError::ResendInProgress`], or
    /// [`GateError::PollerStopped`].
    pub async fn resend_verification_email(&self) -> Result<(), GateError> {
        self.request(Command::Resend).await?
    }

    /// # Errors
    /// [`GateError::PollerStopped`] if the cycle is gone.
    pub async fn snapshot(&self) -> Result<PollSnapshot, GateError> {
        self.request(Command::Snapshot).await
    }

    /// Stop the cycle and wait until every timer is cleared.
    pub async fn unmount(self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Unmount(reply)).is_ok() {
            let _ = done.await;
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, GateError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| GateError::PollerStopped)?;
        response.await.map_err(|_| GateError::PollerStopped)
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Foreground(_) => "Foreground",
            Self::Tick(_) => "Tick",
            Self::Redirect => "Redirect",
            Self::ExpireMessage(_) => "ExpireMessage",
            Self::ForceCheck(_) => "ForceCheck",
            Self::Resend(_) => "Resend",
            Self::Snapshot(_) => "Snapshot",
            Self::Unmount(_) => "Unmount",
        };
        f.write_str(name)
    }
}

struct Cycle<I, R> {
    identity: Arc<I>,
    resend: Arc<R>,
    intents: IntentStore,
    navigator: Arc<dyn Navigator>,
    scheduler: Arc<dyn Scheduler>,
    policy: PollPolicy,
    tx: mpsc::UnboundedSender<Command>,
    subscription: Option<Subscription>,

    visible: bool,
    status: PollStatus,
    now_started: Instant,
    attempts: u32,
    checks_started: u64,

    tick: Option<TimerHandle>,
    tick_generation: u64,
    next_tick_at: Option<Instant>,

    in_flight: Option<BoxFuture<Result<bool, BoxError>>>,
    forced: Vec<oneshot::Sender<CheckOutcome>>,

    redirect: Option<TimerHandle>,
    redirecting: bool,
    redirected: bool,

    message: Option<String>,
    message_timer: Option<TimerHandle>,
    message_generation: u64,
    sending: Option<(BoxFuture<Result<(), GateError>>, oneshot::Sender<Result<(), GateError>>)>,
}

/// Resolve the future in `slot`, or never when the slot is empty.
async fn settle<T>(slot: &mut Option<BoxFuture<T>>) -> T {
    match slot.as_mut() {
        Some(future) => {
            let output = future.await;
            *slot = None;
            output
        }
        None => std::future::pending().await,
    }
}

async fn settle_resend(
    slot: &mut Option<(BoxFuture<Result<(), GateError>>, oneshot::Sender<Result<(), GateError>>)>,
) -> (Result<(), GateError>, oneshot::Sender<Result<(), GateError>>) {
    match slot.as_mut() {
        Some((future, _)) => {
            let output = future.await;
            match slot.take() {
                Some((_, reply)) => (output, reply),
                None => std::future::pending().await,
            }
        }
        None => std::future::pending().await,
    }
}

impl<I: IdentityClient, R: ResendApi> Cycle<I, R> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!(visible = self.visible, "verification poller mounted");
        self.trigger(Trigger::Mount);
        self.arm_tick();

        loop {
            tokio::select! {
                biased;
                result = settle(&mut self.in_flight) => self.finish_check(result),
                (result, reply) = settle_resend(&mut self.sending) => self.finish_resend(result, reply),
                command = rx.recv() => match command {
                    Some(Command::Unmount(done)) => {
                        self.teardown();
                        let _ = done.send(());
                        return;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        self.teardown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Foreground(event) => self.on_foreground(event),
            Command::Tick(generation) => self.on_tick(generation),
            Command::Redirect => self.on_redirect(),
            Command::ExpireMessage(generation) => {
                if generation == self.message_generation {
                    self.message = None;
                    self.message_timer = None;
                }
            }
            Command::ForceCheck(reply) => self.on_force_check(reply),
            Command::Resend(reply) => self.on_resend(reply),
            Command::Snapshot(reply) => {
                self.settle_budget();
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            Command::Unmount(_) => {}
        }
    }

    fn elapsed(&self) -> Duration {
        self.scheduler
            .now()
            .saturating_duration_since(self.now_started)
    }

    fn budget_spent(&self) -> bool {
        self.elapsed() > self.policy.max_elapsed || self.attempts >= self.policy.max_attempts
    }

    /// Report the budget as spent even when no trigger arrived to notice it,
    /// e.g. while the view sat hidden past the ceiling.
    fn settle_budget(&mut self) {
        if self.status == PollStatus::Idle && self.in_flight.is_none() && self.budget_spent() {
            self.exhaust();
        }
    }

    /// Start a check unless one is already running. Returns whether one started.
    fn trigger(&mut self, trigger: Trigger) -> bool {
        if self.status == PollStatus::Verified {
            return false;
        }
        if trigger.is_automatic() {
            if self.status == PollStatus::BudgetExhausted {
                return false;
            }
            if self.budget_spent() {
                self.exhaust();
                return false;
            }
        }
        if self.in_flight.is_some() {
            debug!(?trigger, "check already in flight; skipping");
            return false;
        }

        if trigger.is_automatic() {
            self.attempts += 1;
        }
        self.checks_started += 1;
        self.status = PollStatus::Checking;
        debug!(?trigger, attempt = self.attempts, "checking verification status");

        let identity = self.identity.clone();
        self.in_flight = Some(Box::pin(async move {
            let claims = identity.fresh_claims(true).await?;
            Ok::<_, BoxError>(claims.is_email_verified())
        }));
        true
    }

    fn arm_tick(&mut self) {
        self.tick = None;
        self.next_tick_at = None;
        if !self.visible || self.status.is_terminal() {
            return;
        }

        self.tick_generation += 1;
        let generation = self.tick_generation;
        let tx = self.tx.clone();
        self.tick = Some(self.scheduler.schedule(
            self.policy.cadence,
            Box::new(move || {
                let _ = tx.send(Command::Tick(generation));
            }),
        ));
        self.next_tick_at = self.scheduler.now().checked_add(self.policy.cadence);
    }

    fn on_tick(&mut self, generation: u64) {
        if generation != self.tick_generation {
            return;
        }
        self.tick = None;
        self.next_tick_at = None;
        if self.status.is_terminal() {
            return;
        }

        self.trigger(Trigger::Cadence);
        self.arm_tick();
    }

    fn on_foreground(&mut self, event: ForegroundEvent) {
        if !event.is_foreground() {
            self.visible = false;
            self.tick = None;
            self.next_tick_at = None;
            debug!("view hidden; cadence paused");
            return;
        }

        self.visible = true;
        if self.status.is_terminal() {
            return;
        }
        self.trigger(Trigger::Foreground);
        self.arm_tick();
    }

    fn exhaust(&mut self) {
        info!(
            attempts = self.attempts,
            elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            "verification polling budget exhausted"
        );
        self.status = PollStatus::BudgetExhausted;
        self.tick = None;
        self.next_tick_at = None;
    }

    fn finish_check(&mut self, result: Result<bool, BoxError>) {
        let outcome = match result {
            Ok(true) => {
                self.on_verified();
                CheckOutcome::Verified
            }
            Ok(false) => {
                if self.status == PollStatus::Checking {
                    self.status = PollStatus::Idle;
                }
                CheckOutcome::Unverified
            }
            Err(err) => {
                if self.status == PollStatus::Checking {
                    self.status = PollStatus::Error;
                }
                debug!(error = %err, status = ?self.status, "verification check failed; retrying on next trigger");
                if self.status == PollStatus::Error {
                    self.status = PollStatus::Idle;
                }
                CheckOutcome::Failed
            }
        };

        if self.forced.is_empty() {
            return;
        }

        // A manual check resets the budget whatever it found.
        self.now_started = self.scheduler.now();
        self.attempts = 0;
        if self.status == PollStatus::BudgetExhausted {
            self.status = PollStatus::Idle;
        }
        if outcome != CheckOutcome::Verified && self.tick.is_none() {
            self.arm_tick();
        }
        for reply in self.forced.drain(..) {
            let _ = reply.send(outcome);
        }
    }

    fn on_verified(&mut self) {
        if self.status == PollStatus::Verified {
            return;
        }
        info!("email verified; redirecting to profile");
        self.status = PollStatus::Verified;
        self.tick = None;
        self.next_tick_at = None;
        self.intents.set_intent(Intent::Profile);
        self.redirecting = true;

        let tx = self.tx.clone();
        self.redirect = Some(self.scheduler.schedule(
            self.policy.redirect_delay,
            Box::new(move || {
                let _ = tx.send(Command::Redirect);
            }),
        ));
    }

    fn on_redirect(&mut self) {
        self.redirect = None;
        if self.redirected {
            return;
        }
        self.redirected = true;
        self.navigator.navigate(Navigation::replace(Route::Profile));
    }

    fn on_force_check(&mut self, reply: oneshot::Sender<CheckOutcome>) {
        if self.status == PollStatus::Verified {
            let _ = reply.send(CheckOutcome::Verified);
            return;
        }
        self.forced.push(reply);
        // Joins a running check rather than starting a second one.
        if self.in_flight.is_none() {
            self.trigger(Trigger::Manual);
        }
    }

    fn on_resend(&mut self, reply: oneshot::Sender<Result<(), GateError>>) {
        if self.sending.is_some() {
            let _ = reply.send(Err(GateError::ResendInProgress));
            return;
        }

        self.message = None;
        self.message_timer = None;
        let identity = self.identity.clone();
        let resend = self.resend.clone();
        let future: BoxFuture<Result<(), GateError>> = Box::pin(async move {
            let token = identity.access_token().await.map_err(GateError::Identity)?;
            resend.resend(&token).await
        });
        self.sending = Some((future, reply));
    }

    fn finish_resend(
        &mut self,
        result: Result<(), GateError>,
        reply: oneshot::Sender<Result<(), GateError>>,
    ) {
        match &result {
            Ok(()) => self.show_message(RESEND_SENT_MESSAGE),
            Err(err) => {
                warn!(error = %err, "failed to resend verification email");
                self.show_message(RESEND_FAILED_MESSAGE);
            }
        }
        let _ = reply.send(result);
    }

    fn show_message(&mut self, message: &str) {
        self.message = Some(message.to_string());
        self.message_generation += 1;
        let generation = self.message_generation;
        let tx = self.tx.clone();
        self.message_timer = Some(self.scheduler.schedule(
            self.policy.message_ttl,
            Box::new(move || {
                let _ = tx.send(Command::ExpireMessage(generation));
            }),
        ));
    }

    fn snapshot(&self) -> PollSnapshot {
        let now = self.scheduler.now();
        PollSnapshot {
            status: self.status,
            elapsed: self.elapsed(),
            attempts: self.attempts,
            remaining_attempts: self.policy.max_attempts.saturating_sub(self.attempts),
            next_check_in: self
                .next_tick_at
                .map(|at| at.saturating_duration_since(now)),
            message: self.message.clone(),
            redirecting: self.redirecting,
            sending: self.sending.is_some(),
            checks_started: self.checks_started,
        }
    }

    fn teardown(&mut self) {
        self.tick = None;
        self.next_tick_at = None;
        self.redirect = None;
        self.message_timer = None;
        self.in_flight = None;
        self.sending = None;
        self.forced.clear();
        self.subscription = None;
        debug!(status = ?self.status, "verification poller unmounted");
    }
}
