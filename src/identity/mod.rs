//! Identity provider seams.
//!
//! The provider owns authentication, tokens and user records. [`management`] is the
//! server-side client used by the resend endpoint; [`session`] is the client-side
//! view of the signed-in user consumed by the gate.

mod error;
pub mod management;
pub mod session;

pub use error::Error;
pub use management::{ManagementClient, ManagementConfig, UserInfo, VerificationJob};
pub use session::{AppMetadata, AuthSnapshot, BoxError, Claims, IdentityClient};
