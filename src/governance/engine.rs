//! The governance engine.
//!
//! One engine task owns the membership cache, the timer queue, and the
//! store; every inbound event and timer firing is serialized through it, so
//! no election or effect row ever has two writers. The run loop mirrors the
//! usual daemon discipline: individual failures are logged and answered, the
//! loop itself keeps going.

use super::ballot::{BallotKind, SelfVote, TargetKind};
use super::election::{Election, ElectionStatus};
use super::membership::{ActivityPersist, MembershipCache};
use super::policy::{self, Decision, Denial, PolicyContext, RecentFailure, Target};
use super::scheduler::{Scheduler, TimerAction};
use super::sync::{PrivilegeSynchronizer, RevertOutcome};
use super::tally::{self, Verdict};
use super::{now_unix, UnixTime};
use crate::chat::{command, format, ChatClient, ChatError, ChatEvent, VoteCommand};
use crate::directory::{DirectoryClient, DirectoryError};
use crate::persistence::{CastOutcome, CloseWrite, Store, StoreError};
use tracing::{debug, error, info, warn};

/// Engine errors. Policy denials are not errors; they are answered with a
/// notice and the loop moves on.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Operator-tunable engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Announce channel-wide when a member flips an existing vote.
    pub announce_vote_changes: bool,
    /// Delay before retrying a failed close or expiry write.
    pub retry_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            announce_vote_changes: false,
            retry_secs: 30,
        }
    }
}

pub struct Engine<C: ChatClient, D: DirectoryClient> {
    chat: C,
    store: Store,
    cache: MembershipCache,
    scheduler: Scheduler,
    sync: PrivilegeSynchronizer<C, D>,
    config: EngineConfig,
}

impl<C: ChatClient, D: DirectoryClient> Engine<C, D> {
    /// Build an engine with its cache seeded from the store.
    pub async fn new(
        chat: C,
        directory: D,
        store: Store,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let mut cache = MembershipCache::new();
        cache.seed(store.load_identities().await?);
        Ok(Self {
            sync: PrivilegeSynchronizer::new(chat.clone(), directory),
            chat,
            store,
            cache,
            scheduler: Scheduler::new(),
            config,
        })
    }

    /// Restart recovery. Overdue elections are closed and overdue effects
    /// expired, in creation order, before any new event is processed; timers
    /// are re-armed for everything else. Idempotent: a second pass finds
    /// only terminal rows and does nothing.
    pub async fn recover(&mut self, now: UnixTime) -> Result<(), EngineError> {
        let open = self.store.open_elections().await?;
        let effects = self.store.effects().await?;
        for election in open {
            if election.close_at <= now {
                info!(election = election.id, "closing overdue election");
                self.close_election(election.id, now).await?;
            } else {
                self.scheduler
                    .arm(election.close_at, TimerAction::CloseElection(election.id));
            }
        }
        for effect in effects {
            if effect.expires_at <= now {
                info!(effect = effect.id, "expiring overdue effect");
                self.expire_effect(effect.id, now).await?;
            } else {
                self.scheduler
                    .arm(effect.expires_at, TimerAction::ExpireEffect(effect.id));
            }
        }
        Ok(())
    }

    /// Handle one inbound event.
    pub async fn handle_event(&mut self, event: ChatEvent, now: UnixTime) -> Result<(), EngineError> {
        match event {
            ChatEvent::Message {
                sender,
                in_channel,
                text,
            } => {
                let sender = sender.to_lowercase();
                if in_channel {
                    let persist = self.cache.record_activity(&sender, now);
                    if persist != ActivityPersist::Defer {
                        self.persist_member(&sender).await?;
                    }
                }
                match command::parse(&text) {
                    None => Ok(()),
                    Some(Err(usage)) => self.deny(&sender, &Denial::BadUsage(usage)).await,
                    Some(Ok(cmd)) => self.handle_command(&sender, cmd, now).await,
                }
            }
            ChatEvent::FlagChange {
                member,
                added,
                removed,
            } => {
                let member = member.to_lowercase();
                self.cache.apply_flag_change(&member, &added, &removed, now);
                self.persist_member(&member).await
            }
            ChatEvent::FlagSnapshot { member, flags } => {
                let member = member.to_lowercase();
                self.cache.set_flags(&member, &flags, now);
                self.persist_member(&member).await
            }
        }
    }

    pub async fn handle_command(
        &mut self,
        sender: &str,
        cmd: VoteCommand,
        now: UnixTime,
    ) -> Result<(), EngineError> {
        match cmd {
            VoteCommand::Open { kind, target } => self.open_ballot(sender, &kind, &target, now).await,
            VoteCommand::Cast { election, yea } => self.cast_vote(sender, election, yea, now).await,
            VoteCommand::List { kind } => self.list_votes(sender, kind.as_deref(), now).await,
            VoteCommand::Info { election } => self.vote_info(sender, election, now).await,
        }
    }

    /// Fire one due timer action.
    pub async fn fire(&mut self, action: TimerAction, now: UnixTime) -> Result<(), EngineError> {
        match action {
            TimerAction::CloseElection(id) => self.close_election(id, now).await,
            TimerAction::ExpireEffect(id) => self.expire_effect(id, now).await,
        }
    }

    /// External staff override: Open to Vetoed, without a tally. Returns
    /// false when the election was not open.
    pub async fn veto(&mut self, id: i64) -> Result<bool, EngineError> {
        if !self.store.veto_election(id).await? {
            return Ok(false);
        }
        self.scheduler.cancel(TimerAction::CloseElection(id));
        if let Some(election) = self.store.election(id).await? {
            self.chat.announce(&format::vote_vetoed(&election)).await?;
        }
        Ok(true)
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&mut self) -> Option<UnixTime> {
        self.scheduler.next_deadline()
    }

    /// Write back every cached identity row.
    pub async fn shutdown_flush(&mut self) -> Result<(), EngineError> {
        for (name, info) in self.cache.all() {
            self.store.upsert_identity(name, info).await?;
        }
        Ok(())
    }

    /// Event loop: drain due timers, then wait for the next event batch or
    /// the next deadline. Per-event failures are logged, not fatal.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        loop {
            let now = now_unix();
            while let Some(action) = self.scheduler.pop_due(now) {
                if let Err(e) = self.fire(action, now).await {
                    warn!(error = %e, "timer handling failed");
                }
            }
            let deadline = self.scheduler.next_deadline();
            let chat = self.chat.clone();
            tokio::select! {
                batch = chat.next_events() => match batch {
                    Ok(events) => {
                        for event in events {
                            let now = now_unix();
                            if let Err(e) = self.handle_event(event, now).await {
                                warn!(error = %e, "event handling failed");
                            }
                        }
                    }
                    Err(ChatError::Closed) => {
                        info!("event source closed, flushing identity stats");
                        self.shutdown_flush().await?;
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "receive failed, will retry");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                },
                _ = sleep_until(deadline) => {}
            }
        }
    }

    async fn persist_member(&mut self, member: &str) -> Result<(), EngineError> {
        if let Some(info) = self.cache.get(member) {
            self.store.upsert_identity(member, info).await?;
        }
        Ok(())
    }

    async fn deny(&self, member: &str, denial: &Denial) -> Result<(), EngineError> {
        debug!(member, ?denial, "request denied");
        self.chat.notice(member, &format::denial(denial)).await?;
        Ok(())
    }

    async fn open_ballot(
        &mut self,
        opener: &str,
        kind_raw: &str,
        target_raw: &str,
        now: UnixTime,
    ) -> Result<(), EngineError> {
        let Some(kind) = BallotKind::parse(kind_raw) else {
            return self.deny(opener, &Denial::UnknownBallot).await;
        };
        let policy = kind.policy();
        let target_name = match policy.target {
            TargetKind::Identity => target_raw
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_lowercase(),
            TargetKind::FreeText => target_raw.trim().to_string(),
        };

        let open_election = self.store.find_open(kind, &target_name).await?;
        let active_effect = self
            .store
            .find_effect(kind, &target_name)
            .await?
            .map(|e| e.election_id);
        let recent_failure = self
            .store
            .latest_failed_majority(kind, &target_name)
            .await?
            .map(|(election, closed_at)| RecentFailure {
                election,
                closed_at,
            });

        let decision = {
            let target = match policy.target {
                TargetKind::Identity => Target::Identity {
                    name: &target_name,
                    info: self.cache.get(&target_name),
                },
                TargetKind::FreeText => Target::Text(&target_name),
            };
            let ctx = PolicyContext {
                now,
                opener_flags: self.cache.flags(opener),
                target,
                open_election,
                active_effect,
                recent_failure,
            };
            policy::evaluate(kind, &ctx)
        };

        match decision {
            Decision::Deny(denial) => self.deny(opener, &denial).await,
            // an identical open ballot absorbs the proposal as a yea vote
            Decision::ExistingOpen(id) => self.cast_vote(opener, Some(id), true, now).await,
            Decision::Allow => {
                let close_at = now + policy.open_secs as i64;
                let id = self
                    .store
                    .insert_election(kind, now, close_at, opener, &target_name)
                    .await?;
                // the opener seconds their own proposal, except against
                // themselves
                if !(policy.target == TargetKind::Identity && target_name == opener) {
                    self.store.cast(id, opener, true).await?;
                }
                self.scheduler.arm(close_at, TimerAction::CloseElection(id));
                info!(election = id, kind = kind.name(), target = %target_name, "ballot opened");
                let election = Election {
                    id,
                    kind,
                    opened_at: now,
                    close_at,
                    status: ElectionStatus::Open,
                    opened_by: opener.to_string(),
                    target: target_name,
                };
                self.chat
                    .announce(&format::vote_opened(&election, policy.open_secs, policy.quorum))
                    .await?;
                Ok(())
            }
        }
    }

    async fn cast_vote(
        &mut self,
        voter: &str,
        id: Option<i64>,
        yea: bool,
        _now: UnixTime,
    ) -> Result<(), EngineError> {
        if !self.cache.is_enfranchised(voter) {
            return self.deny(voter, &Denial::NotEnfranchised).await;
        }
        let id = match id {
            Some(id) => id,
            // a bare y/n is unambiguous only with a single open ballot
            None => {
                let open = self.store.open_elections().await?;
                match open.as_slice() {
                    [only] => only.id,
                    _ => {
                        return self
                            .deny(voter, &Denial::BadUsage("usage: vote <y|n> <id>"))
                            .await
                    }
                }
            }
        };
        let Some(election) = self.store.election(id).await? else {
            return self.deny(voter, &Denial::ElectionNotFound).await;
        };
        if election.status.is_terminal() {
            return self.deny(voter, &Denial::ElectionClosed).await;
        }
        let policy = election.kind.policy();
        if policy.self_vote == SelfVote::Forbidden && election.target == voter {
            return self.deny(voter, &Denial::SelfVote).await;
        }
        match self.store.cast(id, voter, yea).await? {
            CastOutcome::Duplicate => self.deny(voter, &Denial::DuplicateVote).await,
            CastOutcome::Accepted => {
                self.chat.notice(voter, &format::vote_accepted(id)).await?;
                Ok(())
            }
            CastOutcome::Changed => {
                self.chat.notice(voter, &format::vote_changed(id)).await?;
                if self.config.announce_vote_changes {
                    self.chat
                        .announce(&format::vote_change_announcement(id, voter))
                        .await?;
                }
                Ok(())
            }
        }
    }

    async fn list_votes(
        &mut self,
        member: &str,
        kind: Option<&str>,
        now: UnixTime,
    ) -> Result<(), EngineError> {
        let elections = match kind {
            None => self.store.list_open(5).await?,
            Some(name) => {
                let Some(kind) = BallotKind::parse(name) else {
                    return self.deny(member, &Denial::UnknownBallot).await;
                };
                self.store.list_by_kind(kind, 10).await?
            }
        };
        if elections.is_empty() {
            self.chat.notice(member, "No matching results.").await?;
            return Ok(());
        }
        for election in &elections {
            let (yeas, nays) = self.store.counts(election.id).await?;
            let own = self.store.voter_position(election.id, member).await?;
            self.chat
                .notice(member, &format::list_line(election, yeas, nays, own, now))
                .await?;
        }
        Ok(())
    }

    async fn vote_info(&mut self, member: &str, id: i64, now: UnixTime) -> Result<(), EngineError> {
        let Some(election) = self.store.election(id).await? else {
            return self.deny(member, &Denial::ElectionNotFound).await;
        };
        let (yeas, nays) = self.store.counts(id).await?;
        let roster = self.store.roster(id).await?;
        let policy = election.kind.policy();
        let result = tally::tally(yeas, nays, policy.quorum, policy.supermajority);
        self.chat
            .notice(member, &format::info_text(&election, &roster, &result, now))
            .await?;
        Ok(())
    }

    /// Close one election: tally, persist the terminal status (plus the
    /// Effect row in the same transaction when passed with a duration), then
    /// apply the outcome. A failed write re-arms the same action; a fired
    /// timer must never leave an election open without a scheduled retry.
    async fn close_election(&mut self, id: i64, now: UnixTime) -> Result<(), EngineError> {
        let Some(election) = self.store.election(id).await? else {
            warn!(election = id, "close timer fired for unknown election");
            return Ok(());
        };
        if election.status.is_terminal() {
            // replay after a restart race or a stale timer
            warn!(election = id, "close timer fired for closed election");
            return Ok(());
        }
        let policy = election.kind.policy();
        let (yeas, nays) = self.store.counts(id).await?;
        let result = tally::tally(yeas, nays, policy.quorum, policy.supermajority);
        let status = match result.verdict {
            Verdict::Passed => ElectionStatus::Passed,
            Verdict::FailedQuorum => ElectionStatus::FailedQuorum,
            Verdict::FailedMajority => ElectionStatus::FailedMajority,
        };
        let expires_at = now + policy.effect_secs as i64;
        let effect_row = (result.verdict == Verdict::Passed && policy.effect_secs > 0)
            .then_some((election.kind, election.target.as_str(), expires_at));

        let write = match self.store.close_election(id, status, effect_row).await {
            Ok(write) => write,
            Err(e) => {
                error!(election = id, error = %e, "close write failed, will retry");
                self.scheduler.arm(
                    now + self.config.retry_secs as i64,
                    TimerAction::CloseElection(id),
                );
                return Ok(());
            }
        };
        let effect_id = match write {
            CloseWrite::AlreadyClosed => {
                warn!(election = id, "election was already closed");
                return Ok(());
            }
            CloseWrite::Closed { effect_id } => effect_id,
        };
        info!(election = id, status = status.label(), percent = result.percent, "election closed");

        if result.verdict == Verdict::Passed {
            if let Err(e) = self.sync.apply(election.kind, &election.target).await {
                // the directory will be retried by a future opposing ballot
                // at worst; the recorded outcome stands
                error!(election = id, error = %e, "effect application failed");
            }
            if let Some(effect_id) = effect_id {
                self.scheduler
                    .arm(expires_at, TimerAction::ExpireEffect(effect_id));
            }
        }
        self.chat
            .announce(&format::vote_result(&election, &result))
            .await?;
        Ok(())
    }

    /// Expire one effect: revert (or veto), then delete the row. Delete
    /// failures re-arm the action; reverting twice is harmless because flag
    /// requests are idempotent.
    async fn expire_effect(&mut self, id: i64, now: UnixTime) -> Result<(), EngineError> {
        let Some(effect) = self.store.effect(id).await? else {
            warn!(effect = id, "expiry timer fired for missing effect");
            return Ok(());
        };
        let outcome = match self.sync.revert(effect.kind, &effect.target, &self.cache).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(effect = id, error = %e, "revert request failed");
                RevertOutcome::Reverted
            }
        };
        match self.store.delete_effect(id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(effect = id, "effect was already expired");
                return Ok(());
            }
            Err(e) => {
                error!(effect = id, error = %e, "expiry write failed, will retry");
                self.scheduler.arm(
                    now + self.config.retry_secs as i64,
                    TimerAction::ExpireEffect(id),
                );
                return Ok(());
            }
        }
        info!(effect = id, kind = effect.kind.name(), target = %effect.target, "effect expired");
        if let RevertOutcome::Vetoed(reason) = outcome {
            self.chat
                .announce(&format::expiry_vetoed(effect.kind.name(), &effect.target, reason))
                .await?;
        }
        Ok(())
    }
}

async fn sleep_until(deadline: Option<UnixTime>) {
    match deadline {
        Some(at) => {
            let wait = at.saturating_sub(now_unix()).max(0) as u64;
            tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
        }
        None => futures::future::pending().await,
    }
}
