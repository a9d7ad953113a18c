//! Clinick incident dashboard
//!
//! Polls the backend for incident reports, raises a single alarm for every
//! unseen report, acknowledges it in the background and exports monthly
//! summaries. Report submission and push token registration live here too so
//! the `clinick` binary can drive every flow.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod ack;
pub mod error;
pub mod export;
pub mod manager;
pub mod push;
pub mod service;
pub mod session;
pub mod siren;
pub mod store;
pub mod submission;

// Re-export commonly used types
pub use ack::{AckQueue, AckStats, AckTask};
pub use error::{DashboardError, Result};
pub use manager::{ActiveAlarm, AlarmManager, AlarmView};
pub use push::register_push_token;
pub use service::{Dashboard, TickOutcome};
pub use session::SessionStore;
pub use siren::{Playback, SilentSiren, Siren, TerminalSiren};
pub use store::{AlarmedIdSet, AlarmedIdStore};
pub use submission::{Confirmation, ReportSubmitter};
