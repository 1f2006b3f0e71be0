//! Comitia - Channel Governance Engine
//!
//! A deliberative-governance engine for a persistent community channel:
//! enfranchised members open timed ballots that grant or revoke membership
//! privileges, votes are tallied against quorum and majority rules, and
//! temporary effects revert automatically when they expire.
//!
//! Key principles:
//! - One serialized engine task owns all mutable state
//! - The directory service stays authoritative for privilege flags
//! - Election and Effect rows double as the restart schedule

pub mod chat;
pub mod directory;
pub mod governance;
pub mod persistence;
