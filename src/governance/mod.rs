//! Election lifecycle management.
//!
//! This module owns the governance core: the ballot-type rule table, the
//! policy gate, the election state machine, the quorum/supermajority tally,
//! the deadline scheduler, and the privilege synchronizer. Everything here is
//! driven by a single engine task; see [`engine::Engine`].

pub mod ballot;
pub mod election;
pub mod engine;
pub mod membership;
pub mod policy;
pub mod scheduler;
pub mod sync;
pub mod tally;

pub use ballot::{BallotKind, BallotPolicy, EffectAction, SelfVote, TargetKind};
pub use election::{Effect, Election, ElectionStatus, Suffrage};
pub use engine::{Engine, EngineConfig, EngineError};
pub use membership::{MemberInfo, MembershipCache};
pub use policy::{Decision, Denial, PolicyContext, RecentFailure, Target};
pub use scheduler::{Scheduler, TimerAction};
pub use tally::{tally, TallyResult, Verdict};

/// Seconds since the Unix epoch. All durable timestamps use this.
pub type UnixTime = i64;

/// Current wall-clock time as a Unix timestamp.
pub fn now_unix() -> UnixTime {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
