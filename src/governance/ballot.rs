//! Ballot-type rule table.
//!
//! Each ballot kind is a statically configured policy bundle: quorum,
//! majority threshold, how long the ballot stays open, how long its effect
//! lasts, who may be targeted, and what the effect actually does. The set is
//! closed on purpose; adding a kind means adding a row here, not subclassing.

/// One governance action the channel can vote on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BallotKind {
    /// Enfranchise a member (grant the voting flag).
    Civis,
    /// Temporarily strip a member's voting flag.
    Censure,
    /// Appoint a member to staff.
    Staff,
    /// Strip a staff member of both staff and voting flags.
    Arripio,
    /// Ban a member from the channel.
    Ban,
    /// Change the channel topic.
    Topic,
    /// Non-binding expression of channel opinion.
    Opinion,
}

/// Whether the target of a ballot is a channel member or free-form text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Identity,
    FreeText,
}

/// Whether the target of a ballot may vote on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfVote {
    Allowed,
    Forbidden,
}

/// What a passed ballot does, and what expiry undoes.
///
/// Flag strings hold directory-service flag characters; reverting a `Grant`
/// revokes the same characters and vice versa. `SetTopic` has no revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectAction {
    Grant(&'static str),
    Revoke(&'static str),
    SetTopic,
    None,
}

/// Policy constants for one ballot kind. Durations are in seconds.
#[derive(Debug, Clone, Copy)]
pub struct BallotPolicy {
    /// Minimum suffrages before the tally is meaningful.
    pub quorum: u32,
    /// 75% approval required instead of 51%.
    pub supermajority: bool,
    /// How long the ballot accepts votes.
    pub open_secs: u64,
    /// How long a passed effect lasts. 0 means permanent.
    pub effect_secs: u64,
    /// Minimum tenure and recency window for the target. 0 disables.
    pub required_time: u64,
    /// Minimum activity count for the target. 0 disables.
    pub required_lines: u64,
    /// How long after a failed majority before the same ballot may reopen.
    pub cooldown_secs: u64,
    pub target: TargetKind,
    pub self_vote: SelfVote,
    pub effect: EffectAction,
    /// Expiry is vetoed if reverting would leave fewer staff than this.
    pub min_staff: Option<u32>,
}

const CIVIS: BallotPolicy = BallotPolicy {
    quorum: 2,
    supermajority: false,
    open_secs: 86_400,
    effect_secs: 2_419_200, // 28 days
    required_time: 172_800, // 2 days
    required_lines: 250,
    cooldown_secs: 604_800,
    target: TargetKind::Identity,
    self_vote: SelfVote::Forbidden,
    effect: EffectAction::Grant("V"),
    min_staff: None,
};

const CENSURE: BallotPolicy = BallotPolicy {
    quorum: 2,
    supermajority: true,
    open_secs: 86_400,
    effect_secs: 2_419_200,
    required_time: 0,
    required_lines: 0,
    cooldown_secs: 604_800,
    target: TargetKind::Identity,
    self_vote: SelfVote::Forbidden,
    effect: EffectAction::Revoke("V"),
    min_staff: None,
};

const STAFF: BallotPolicy = BallotPolicy {
    quorum: 4,
    supermajority: true,
    open_secs: 172_800,
    effect_secs: 7_776_000, // 90 days
    required_time: 604_800, // 1 week
    required_lines: 500,
    cooldown_secs: 1_209_600,
    target: TargetKind::Identity,
    self_vote: SelfVote::Forbidden,
    effect: EffectAction::Grant("O"),
    min_staff: Some(1),
};

const ARRIPIO: BallotPolicy = BallotPolicy {
    quorum: 5,
    supermajority: true,
    open_secs: 86_400,
    effect_secs: 0, // permanent until a future staff ballot
    required_time: 0,
    required_lines: 0,
    cooldown_secs: 1_209_600,
    target: TargetKind::Identity,
    self_vote: SelfVote::Forbidden,
    effect: EffectAction::Revoke("VO"),
    min_staff: None,
};

const BAN: BallotPolicy = BallotPolicy {
    quorum: 2,
    supermajority: false,
    open_secs: 3_600,
    effect_secs: 259_200, // 3 days
    required_time: 0,
    required_lines: 0,
    cooldown_secs: 86_400,
    target: TargetKind::Identity,
    self_vote: SelfVote::Forbidden,
    effect: EffectAction::Grant("b"),
    min_staff: None,
};

const TOPIC: BallotPolicy = BallotPolicy {
    quorum: 2,
    supermajority: false,
    open_secs: 3_600,
    effect_secs: 0,
    required_time: 0,
    required_lines: 0,
    cooldown_secs: 21_600,
    target: TargetKind::FreeText,
    self_vote: SelfVote::Allowed,
    effect: EffectAction::SetTopic,
    min_staff: None,
};

const OPINION: BallotPolicy = BallotPolicy {
    quorum: 2,
    supermajority: false,
    open_secs: 86_400,
    effect_secs: 0,
    required_time: 0,
    required_lines: 0,
    cooldown_secs: 0,
    target: TargetKind::FreeText,
    self_vote: SelfVote::Allowed,
    effect: EffectAction::None,
    min_staff: None,
};

impl BallotKind {
    pub const ALL: [BallotKind; 7] = [
        BallotKind::Civis,
        BallotKind::Censure,
        BallotKind::Staff,
        BallotKind::Arripio,
        BallotKind::Ban,
        BallotKind::Topic,
        BallotKind::Opinion,
    ];

    /// Command-surface and storage name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            BallotKind::Civis => "civis",
            BallotKind::Censure => "censure",
            BallotKind::Staff => "staff",
            BallotKind::Arripio => "arripio",
            BallotKind::Ban => "ban",
            BallotKind::Topic => "topic",
            BallotKind::Opinion => "opinion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == s)
    }

    pub fn policy(&self) -> &'static BallotPolicy {
        match self {
            BallotKind::Civis => &CIVIS,
            BallotKind::Censure => &CENSURE,
            BallotKind::Staff => &STAFF,
            BallotKind::Arripio => &ARRIPIO,
            BallotKind::Ban => &BAN,
            BallotKind::Topic => &TOPIC,
            BallotKind::Opinion => &OPINION,
        }
    }

    /// Flag precondition the target must satisfy before this ballot opens.
    ///
    /// Returns a short reason suitable for a denial notice.
    pub fn check_target_flags(&self, flags: &str) -> Result<(), &'static str> {
        match self {
            BallotKind::Civis => {
                if flags.contains('V') {
                    Err("target is already enfranchised")
                } else {
                    Ok(())
                }
            }
            BallotKind::Censure => {
                if flags.contains('V') {
                    Ok(())
                } else {
                    Err("target is not enfranchised")
                }
            }
            BallotKind::Staff => {
                if !flags.contains('V') {
                    Err("target is not enfranchised")
                } else if flags.contains('O') {
                    Err("target is already staff")
                } else {
                    Ok(())
                }
            }
            BallotKind::Arripio => {
                if flags.contains('O') {
                    Ok(())
                } else {
                    Err("target is not staff")
                }
            }
            BallotKind::Ban => {
                if flags.contains('b') {
                    Err("target is already banned")
                } else {
                    Ok(())
                }
            }
            BallotKind::Topic | BallotKind::Opinion => Ok(()),
        }
    }
}
