//! Client-side verification gate.
//!
//! Decides, across page loads, focus changes, logins and logouts, whether the user
//! belongs on the landing page, the verify page or the profile page, and polls the
//! provider for a fresh verification status without hammering it.
//!
//! Everything here is single-threaded in spirit: timers come from an injected
//! [`Scheduler`], foreground changes from an injected [`ForegroundSource`], and the
//! poller processes one event at a time.

pub mod foreground;
pub mod intent;
pub mod poller;
pub mod profile;
pub mod resend;
pub mod router;
pub mod schedule;
pub mod verify;

pub use foreground::{ForegroundEvent, ForegroundHub, ForegroundSource, Subscription};
pub use intent::{DisabledStorage, FileStorage, Intent, IntentStore, MemoryStorage, Storage};
pub use poller::{CheckOutcome, PollPolicy, PollSnapshot, PollStatus, PollerHandle, VerificationPoller};
pub use profile::ProfileView;
pub use resend::{HttpResendApi, ResendApi};
pub use router::{Gatekeeper, Navigation, Navigator, Route};
pub use schedule::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use verify::VerifyView;

use crate::identity::BoxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("identity client error: {0}")]
    Identity(BoxError),
    #[error("resend endpoint returned HTTP {status}")]
    Resend { status: u16 },
    #[error("resend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("a resend request is already in progress")]
    ResendInProgress,
    #[error("verification poller is no longer running")]
    PollerStopped,
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
