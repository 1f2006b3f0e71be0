//! Rendering of governance data into announcement and notice text.
//!
//! The engine decides; this module phrases. Keeping every user-facing string
//! here means the lifecycle logic never concatenates prose, and a future
//! localization layer has exactly one seam to replace.

use crate::governance::election::{Election, Suffrage};
use crate::governance::policy::Denial;
use crate::governance::tally::{TallyResult, Verdict};
use crate::governance::UnixTime;
use std::time::Duration;

/// Human-readable rendering of a second count.
pub fn fmt_secs(secs: u64) -> String {
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

fn fmt_delta(from: UnixTime, to: UnixTime) -> String {
    fmt_secs(to.saturating_sub(from).max(0) as u64)
}

pub fn vote_opened(election: &Election, open_secs: u64, quorum: u32) -> String {
    format!(
        "Vote #{id}: {kind}: {target}. You have {time} to vote; {quorum} votes \
         are required for a quorum. Type or PM: vote y {id} / vote n {id}",
        id = election.id,
        kind = election.kind.name(),
        target = election.target,
        time = fmt_secs(open_secs),
        quorum = quorum,
    )
}

pub fn vote_result(election: &Election, result: &TallyResult) -> String {
    match result.verdict {
        Verdict::FailedQuorum => format!(
            "#{}: failed to reach quorum: {} of {} required votes.",
            election.id,
            result.yeas + result.nays,
            election.kind.policy().quorum,
        ),
        Verdict::FailedMajority => format!(
            "#{}: {}: {}. The nays have it. Yeas: {}. Nays: {}. {}% approval \
             (required at least {}%).",
            election.id,
            election.kind.name(),
            election.target,
            result.yeas,
            result.nays,
            result.percent,
            result.threshold,
        ),
        Verdict::Passed => format!(
            "#{}: {}: {}. The yeas have it. Yeas: {}. Nays: {}. {}% approval \
             (required at least {}%).",
            election.id,
            election.kind.name(),
            election.target,
            result.yeas,
            result.nays,
            result.percent,
            result.threshold,
        ),
    }
}

pub fn vote_vetoed(election: &Election) -> String {
    format!(
        "#{}: {}: {}. Vetoed by staff; no tally will be held.",
        election.id,
        election.kind.name(),
        election.target,
    )
}

pub fn vote_accepted(election_id: i64) -> String {
    format!("Thanks for casting your vote on #{election_id}.")
}

pub fn vote_changed(election_id: i64) -> String {
    format!("You have changed your vote on #{election_id}.")
}

pub fn vote_change_announcement(election_id: i64, voter: &str) -> String {
    format!("#{election_id}: {voter} changed their vote.")
}

pub fn expiry_vetoed(kind: &str, target: &str, reason: &str) -> String {
    format!("The {kind} effect on {target} was not reverted: {reason}.")
}

/// One line of `vote list` output.
pub fn list_line(
    election: &Election,
    yeas: u32,
    nays: u32,
    own: Option<bool>,
    now: UnixTime,
) -> String {
    let own = match own {
        Some(true) => "YEA",
        Some(false) => "NAY",
        None => "---",
    };
    let when = if election.status.is_terminal() {
        format!("closed {} ago", fmt_delta(election.close_at, now))
    } else {
        format!("{} left", fmt_delta(now, election.close_at))
    };
    format!(
        "#{} YEA: {} NAY: {} YOU: {} {} {} {} - {}",
        election.id,
        yeas,
        nays,
        own,
        election.status.label(),
        election.kind.name(),
        election.target,
        when,
    )
}

/// Detailed `vote <id>` output: status, timing, roster, and the margin the
/// ballot would close with right now.
pub fn info_text(
    election: &Election,
    roster: &[Suffrage],
    result: &TallyResult,
    now: UnixTime,
) -> String {
    let yeas: Vec<&str> = roster
        .iter()
        .filter(|s| s.yea)
        .map(|s| s.voter.as_str())
        .collect();
    let nays: Vec<&str> = roster
        .iter()
        .filter(|s| !s.yea)
        .map(|s| s.voter.as_str())
        .collect();
    let timing = if election.status.is_terminal() {
        format!("closed {} ago", fmt_delta(election.close_at, now))
    } else {
        format!("closes in {}", fmt_delta(now, election.close_at))
    };
    let projection = match result.verdict {
        Verdict::FailedQuorum => format!(
            "quorum not met ({} of {} votes)",
            result.yeas + result.nays,
            election.kind.policy().quorum,
        ),
        _ => format!(
            "{}% approval, {}% required: {} as it stands",
            result.percent,
            result.threshold,
            if result.verdict == Verdict::Passed {
                "passing"
            } else {
                "failing"
            },
        ),
    };
    format!(
        "#{} {} {} [{}] {} | yea: {} | nay: {} | {}",
        election.id,
        election.kind.name(),
        election.target,
        election.status.label(),
        timing,
        if yeas.is_empty() { "-".to_string() } else { yeas.join(", ") },
        if nays.is_empty() { "-".to_string() } else { nays.join(", ") },
        projection,
    )
}

/// Private notice wording for each denial.
pub fn denial(denial: &Denial) -> String {
    match denial {
        Denial::NotEnfranchised => "Failed: you are not enfranchised.".to_string(),
        Denial::TargetNotFound => {
            "Failed: target not found or never active in the channel.".to_string()
        }
        Denial::PreconditionFailed(reason) => format!("Can't start vote: {reason}."),
        Denial::AlreadyActive { election } => format!(
            "Failed: an identical ballot already passed and is still in effect (#{election})."
        ),
        Denial::Cooldown { prior, retry_at: _ } => format!(
            "Failed: an identical ballot recently failed (#{prior}); it cannot be \
             reproposed yet."
        ),
        Denial::InsufficientTenure => {
            "Can't start vote: target has not been present long enough for consideration."
                .to_string()
        }
        Denial::InsufficientActivity => {
            "Can't start vote: target has not been active recently.".to_string()
        }
        Denial::InsufficientLines { have, need } => {
            format!("Can't start vote: target has {have} of {need} required lines.")
        }
        Denial::SelfVote => "Failed: you cannot vote on your own ballot.".to_string(),
        Denial::DuplicateVote => "Failed: you have already voted that way.".to_string(),
        Denial::UnknownBallot => "Failed: unknown vote type.".to_string(),
        Denial::ElectionNotFound => "Failed: vote not found.".to_string(),
        Denial::ElectionClosed => "Failed: this vote already ended.".to_string(),
        Denial::BadUsage(usage) => format!("Failed: {usage}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::ballot::BallotKind;
    use crate::governance::election::ElectionStatus;
    use crate::governance::tally::tally;

    fn election() -> Election {
        Election {
            id: 3,
            kind: BallotKind::Ban,
            opened_at: 1_000,
            close_at: 4_600,
            status: ElectionStatus::Open,
            opened_by: "alice".to_string(),
            target: "mallory".to_string(),
        }
    }

    #[test]
    fn opened_announcement_names_ballot_and_rules() {
        let text = vote_opened(&election(), 3_600, 2);
        assert!(text.contains("Vote #3"));
        assert!(text.contains("ban"));
        assert!(text.contains("mallory"));
        assert!(text.contains("1h"));
        assert!(text.contains("2 votes"));
    }

    #[test]
    fn result_announcement_carries_the_margin() {
        let e = election();
        let text = vote_result(&e, &tally(2, 1, 2, false));
        assert!(text.contains("The yeas have it"));
        assert!(text.contains("66%"));
        let text = vote_result(&e, &tally(1, 1, 2, true));
        assert!(text.contains("The nays have it"));
        assert!(text.contains("75%"));
        let text = vote_result(&e, &tally(1, 0, 2, false));
        assert!(text.contains("failed to reach quorum"));
    }

    #[test]
    fn info_lists_roster_and_projection() {
        let e = election();
        let suffrage = |voter: &str, yea| Suffrage {
            election_id: e.id,
            voter: voter.to_string(),
            yea,
        };
        let roster = vec![
            suffrage("alice", true),
            suffrage("bob", true),
            suffrage("carol", false),
        ];
        let text = info_text(&e, &roster, &tally(2, 1, 2, false), 2_000);
        assert!(text.contains("alice, bob"));
        assert!(text.contains("carol"));
        assert!(text.contains("passing"));
        assert!(text.contains("closes in"));
    }

    #[test]
    fn cooldown_denial_names_prior_ballot() {
        let text = denial(&Denial::Cooldown { prior: 9, retry_at: 0 });
        assert!(text.contains("#9"));
    }
}
