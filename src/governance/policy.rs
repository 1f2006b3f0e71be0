//! Policy gate for ballot proposals.
//!
//! `evaluate` is a pure, ordered decision over a snapshot of everything the
//! checks need. The engine assembles the snapshot from the membership cache
//! and the store, so the gate itself never performs IO and is trivially
//! testable.

use super::ballot::{BallotKind, TargetKind};
use super::membership::MemberInfo;
use super::UnixTime;

/// Why a proposal or a vote was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    NotEnfranchised,
    TargetNotFound,
    PreconditionFailed(&'static str),
    /// A passed ballot of this kind is still in effect for this target.
    AlreadyActive { election: i64 },
    /// The same ballot failed its majority recently.
    Cooldown { prior: i64, retry_at: UnixTime },
    InsufficientTenure,
    InsufficientActivity,
    InsufficientLines { have: u64, need: u64 },
    SelfVote,
    DuplicateVote,
    UnknownBallot,
    ElectionNotFound,
    ElectionClosed,
    BadUsage(&'static str),
}

/// The resolved target of a proposal.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Identity {
        name: &'a str,
        info: Option<&'a MemberInfo>,
    },
    Text(&'a str),
}

/// Most recent failed-majority close for the same (kind, target).
#[derive(Debug, Clone, Copy)]
pub struct RecentFailure {
    pub election: i64,
    pub closed_at: UnixTime,
}

/// Snapshot the gate decides over.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    pub now: UnixTime,
    /// The opener's current privilege flags.
    pub opener_flags: &'a str,
    pub target: Target<'a>,
    /// Id of a currently-open election for the same (kind, target).
    pub open_election: Option<i64>,
    /// Originating election id of a live effect for the same (kind, target).
    pub active_effect: Option<i64>,
    pub recent_failure: Option<RecentFailure>,
}

/// Gate verdict for a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// An identical ballot is already open; treat the proposal as a yea vote
    /// on it instead of opening a second one.
    ExistingOpen(i64),
    Deny(Denial),
}

/// Evaluate a proposed ballot. Checks run in order and short-circuit on the
/// first failure.
pub fn evaluate(kind: BallotKind, ctx: &PolicyContext) -> Decision {
    let policy = kind.policy();

    // 1. Opener must hold voting privilege.
    if !(ctx.opener_flags.contains('V') || ctx.opener_flags.contains('O')) {
        return Decision::Deny(Denial::NotEnfranchised);
    }

    // 2. Target must resolve.
    let target_info = match ctx.target {
        Target::Identity { info, .. } => match info {
            Some(info) => Some(info),
            None => return Decision::Deny(Denial::TargetNotFound),
        },
        Target::Text(text) => {
            if text.trim().is_empty() {
                return Decision::Deny(Denial::TargetNotFound);
            }
            None
        }
    };

    // 3. Kind-specific precondition on the target's current flags.
    if let Some(info) = target_info {
        if let Err(reason) = kind.check_target_flags(&info.flags) {
            return Decision::Deny(Denial::PreconditionFailed(reason));
        }
    }

    // 4. An identical open ballot absorbs the proposal as a vote.
    if let Some(id) = ctx.open_election {
        return Decision::ExistingOpen(id);
    }

    // 5. A live effect blocks reproposal until it expires.
    if let Some(election) = ctx.active_effect {
        return Decision::Deny(Denial::AlreadyActive { election });
    }

    // 6. Failed-majority cooldown.
    if policy.cooldown_secs > 0 {
        if let Some(failure) = ctx.recent_failure {
            let retry_at = failure.closed_at + policy.cooldown_secs as i64;
            if retry_at > ctx.now {
                return Decision::Deny(Denial::Cooldown {
                    prior: failure.election,
                    retry_at,
                });
            }
        }
    }

    // 7. Activity eligibility of the target.
    if policy.target == TargetKind::Identity
        && (policy.required_time > 0 || policy.required_lines > 0)
    {
        // target_info is Some for identity targets past check 2
        if let Some(info) = target_info {
            let window_start = ctx.now - policy.required_time as i64;
            if policy.required_time > 0 {
                if info.first_seen > window_start {
                    return Decision::Deny(Denial::InsufficientTenure);
                }
                if info.last_seen < window_start {
                    return Decision::Deny(Denial::InsufficientActivity);
                }
            }
            if info.lines < policy.required_lines {
                return Decision::Deny(Denial::InsufficientLines {
                    have: info.lines,
                    need: policy.required_lines,
                });
            }
        }
    }

    Decision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(first_seen: UnixTime, last_seen: UnixTime, lines: u64, flags: &str) -> MemberInfo {
        MemberInfo {
            first_seen,
            last_seen,
            lines,
            flags: flags.to_string(),
        }
    }

    fn ctx<'a>(opener_flags: &'a str, target: Target<'a>) -> PolicyContext<'a> {
        PolicyContext {
            now: 1_000_000,
            opener_flags,
            target,
            open_election: None,
            active_effect: None,
            recent_failure: None,
        }
    }

    #[test]
    fn unenfranchised_opener_is_denied_first() {
        // Even a nonsense target is not reported before the opener check.
        let ctx = ctx("", Target::Identity { name: "ghost", info: None });
        assert_eq!(
            evaluate(BallotKind::Ban, &ctx),
            Decision::Deny(Denial::NotEnfranchised)
        );
    }

    #[test]
    fn staff_flag_alone_is_sufficient_to_open() {
        let target = member(0, 1_000_000, 10, "");
        let ctx = ctx("O", Target::Identity { name: "bob", info: Some(&target) });
        assert_eq!(evaluate(BallotKind::Ban, &ctx), Decision::Allow);
    }

    #[test]
    fn unknown_identity_target_is_denied() {
        let ctx = ctx("V", Target::Identity { name: "ghost", info: None });
        assert_eq!(
            evaluate(BallotKind::Ban, &ctx),
            Decision::Deny(Denial::TargetNotFound)
        );
    }

    #[test]
    fn empty_text_target_is_denied() {
        let ctx = ctx("V", Target::Text("   "));
        assert_eq!(
            evaluate(BallotKind::Topic, &ctx),
            Decision::Deny(Denial::TargetNotFound)
        );
    }

    #[test]
    fn precondition_failure_names_the_reason() {
        let target = member(0, 1_000_000, 500, "V");
        let ctx = ctx("V", Target::Identity { name: "bob", info: Some(&target) });
        assert_eq!(
            evaluate(BallotKind::Civis, &ctx),
            Decision::Deny(Denial::PreconditionFailed("target is already enfranchised"))
        );
    }

    #[test]
    fn open_ballot_redirects_instead_of_denying() {
        let target = member(0, 1_000_000, 10, "");
        let mut c = ctx("V", Target::Identity { name: "bob", info: Some(&target) });
        c.open_election = Some(7);
        // Redirect wins over the later active-effect and cooldown checks.
        c.active_effect = Some(3);
        c.recent_failure = Some(RecentFailure { election: 2, closed_at: 999_999 });
        assert_eq!(evaluate(BallotKind::Ban, &c), Decision::ExistingOpen(7));
    }

    #[test]
    fn live_effect_blocks_reproposal() {
        let target = member(0, 1_000_000, 10, "");
        let mut c = ctx("V", Target::Identity { name: "bob", info: Some(&target) });
        c.active_effect = Some(3);
        assert_eq!(
            evaluate(BallotKind::Ban, &c),
            Decision::Deny(Denial::AlreadyActive { election: 3 })
        );
    }

    #[test]
    fn cooldown_attaches_prior_election() {
        let target = member(0, 1_000_000, 10, "");
        let mut c = ctx("V", Target::Identity { name: "bob", info: Some(&target) });
        c.recent_failure = Some(RecentFailure { election: 2, closed_at: 999_000 });
        // ban cooldown is 86400s, so 999_000 + 86400 is still in the future
        assert_eq!(
            evaluate(BallotKind::Ban, &c),
            Decision::Deny(Denial::Cooldown { prior: 2, retry_at: 999_000 + 86_400 })
        );
    }

    #[test]
    fn expired_cooldown_allows_reproposal() {
        let target = member(0, 1_000_000, 10, "");
        let mut c = ctx("V", Target::Identity { name: "bob", info: Some(&target) });
        c.recent_failure = Some(RecentFailure { election: 2, closed_at: 100 });
        assert_eq!(evaluate(BallotKind::Ban, &c), Decision::Allow);
    }

    #[test]
    fn civis_eligibility_checks_tenure_recency_lines() {
        let now = 1_000_000;
        // joined an hour ago: tenure too short
        let newcomer = member(now - 3_600, now, 500, "");
        let c = ctx("V", Target::Identity { name: "new", info: Some(&newcomer) });
        assert_eq!(
            evaluate(BallotKind::Civis, &c),
            Decision::Deny(Denial::InsufficientTenure)
        );

        // long gone: last activity outside the window
        let dormant = member(0, now - 300_000, 500, "");
        let c = ctx("V", Target::Identity { name: "old", info: Some(&dormant) });
        assert_eq!(
            evaluate(BallotKind::Civis, &c),
            Decision::Deny(Denial::InsufficientActivity)
        );

        // chatty enough in time, but not enough lines
        let quiet = member(0, now, 50, "");
        let c = ctx("V", Target::Identity { name: "quiet", info: Some(&quiet) });
        assert_eq!(
            evaluate(BallotKind::Civis, &c),
            Decision::Deny(Denial::InsufficientLines { have: 50, need: 250 })
        );

        let eligible = member(0, now, 250, "");
        let c = ctx("V", Target::Identity { name: "ok", info: Some(&eligible) });
        assert_eq!(evaluate(BallotKind::Civis, &c), Decision::Allow);
    }

    #[test]
    fn ban_skips_eligibility_entirely() {
        // A target that would fail every civis eligibility check.
        let now = 1_000_000;
        let newcomer = member(now - 10, now - 10, 1, "");
        let c = ctx("V", Target::Identity { name: "new", info: Some(&newcomer) });
        assert_eq!(evaluate(BallotKind::Ban, &c), Decision::Allow);
    }
}
