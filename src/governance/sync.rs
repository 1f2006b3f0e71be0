//! Privilege synchronizer.
//!
//! Translates election outcomes into directory grant/revoke requests and
//! topic changes. Requests get no synchronous confirmation: the membership
//! cache is updated when the directory's flag-change notification arrives on
//! the event stream, not when the request is issued, so there is a window
//! where the cache lags a freshly applied effect.

use super::ballot::{BallotKind, EffectAction};
use super::engine::EngineError;
use super::membership::MembershipCache;
use crate::chat::ChatClient;
use crate::directory::DirectoryClient;

/// What expiry did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    Reverted,
    /// The ballot type refused its own expiry; the effect row is still
    /// removed, but no flags change. Carries the reason for the notice.
    Vetoed(&'static str),
}

pub struct PrivilegeSynchronizer<C, D> {
    chat: C,
    directory: D,
}

impl<C: ChatClient, D: DirectoryClient> PrivilegeSynchronizer<C, D> {
    pub fn new(chat: C, directory: D) -> Self {
        Self { chat, directory }
    }

    /// Forward action for a passed ballot.
    pub async fn apply(&self, kind: BallotKind, target: &str) -> Result<(), EngineError> {
        match kind.policy().effect {
            EffectAction::Grant(flags) => self.directory.grant(target, flags).await?,
            EffectAction::Revoke(flags) => self.directory.revoke(target, flags).await?,
            EffectAction::SetTopic => self.chat.set_topic(target).await?,
            EffectAction::None => {}
        }
        Ok(())
    }

    /// Inverse action when an effect expires.
    ///
    /// Staff expiry is refused when revoking would leave fewer flagged staff
    /// than the kind's floor; the channel must not govern itself into having
    /// no staff at all.
    pub async fn revert(
        &self,
        kind: BallotKind,
        target: &str,
        cache: &MembershipCache,
    ) -> Result<RevertOutcome, EngineError> {
        let policy = kind.policy();
        match policy.effect {
            EffectAction::Grant(flags) => {
                if let Some(floor) = policy.min_staff {
                    if flags.contains('O')
                        && cache.flags(target).contains('O')
                        && cache.staff_count() <= floor
                    {
                        return Ok(RevertOutcome::Vetoed(
                            "reverting would leave the channel under-staffed",
                        ));
                    }
                }
                self.directory.revoke(target, flags).await?;
            }
            EffectAction::Revoke(flags) => self.directory.grant(target, flags).await?,
            // a replaced topic has nothing to restore
            EffectAction::SetTopic | EffectAction::None => {}
        }
        Ok(RevertOutcome::Reverted)
    }
}
