//! Quorum and supermajority tally.
//!
//! Pure arithmetic over cast suffrages. Approval is integer floor of
//! `100 * yeas / total`; a ballot passing at exactly the threshold passes.

/// Tally outcome for a closed election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    FailedQuorum,
    FailedMajority,
}

/// Verdict plus the numbers the announcement needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyResult {
    pub verdict: Verdict,
    pub yeas: u32,
    pub nays: u32,
    /// Floor percentage of approval. 0 when the quorum was missed.
    pub percent: u32,
    pub threshold: u32,
}

/// Approval threshold for a ballot.
pub fn threshold(supermajority: bool) -> u32 {
    if supermajority {
        75
    } else {
        51
    }
}

/// Tally an election's suffrages against its quorum and majority rule.
pub fn tally(yeas: u32, nays: u32, quorum: u32, supermajority: bool) -> TallyResult {
    let total = yeas + nays;
    let threshold = threshold(supermajority);
    if total < quorum {
        return TallyResult {
            verdict: Verdict::FailedQuorum,
            yeas,
            nays,
            percent: 0,
            threshold,
        };
    }
    // quorum >= 1 for every configured kind, so total > 0 here
    let percent = (100 * yeas) / total;
    let verdict = if percent < threshold {
        Verdict::FailedMajority
    } else {
        Verdict::Passed
    };
    TallyResult {
        verdict,
        yeas,
        nays,
        percent,
        threshold,
    }
}
