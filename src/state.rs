// Copyright 2025 - See NOTICE file for copyright holders.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Off-chain state snapshots and the dispute record built from them.

use crate::Error;
use soroban_sdk::{contracttype, BytesN, Vec};

/// One party's signed view of the channel.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SemiChannelBody {
    pub seqno: u64,
    /// Cumulative amount this party attests to having sent to the other.
    pub sent: i128,
    /// Root of the dictionary of conditional payments this party holds.
    pub conditionals_hash: BytesN<32>,
}

/// Transport wrapper around a body, as signed by its author.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SemiChannel {
    pub channel_id: u128,
    pub data: SemiChannelBody,
    /// What the author last saw from the counterparty, if anything.
    pub counterparty_data: Option<SemiChannelBody>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClosureConfig {
    pub quarantine_duration: u64,
    pub close_duration: u64,
    pub fine: i128,
}

/// Pending uncooperative close.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Quarantine {
    pub state_a: SemiChannelBody,
    pub state_b: SemiChannelBody,
    pub started_at: u64,
    pub committed_by_a: bool,
    pub challenged: bool,
    /// Conditional indices already settled against A's dictionary.
    pub settled_a: Vec<u32>,
    /// Conditional indices already settled against B's dictionary.
    pub settled_b: Vec<u32>,
}

/// Dispute slot of the channel.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Dispute {
    Idle,
    Quarantined(Quarantine),
}

impl Dispute {
    pub fn quarantine(&self) -> Option<&Quarantine> {
        match self {
            Dispute::Idle => None,
            Dispute::Quarantined(quarantine) => Some(quarantine),
        }
    }
}

impl SemiChannelBody {
    // exceeds reports whether self claims more than other on either axis.
    pub fn exceeds(&self, other: &SemiChannelBody) -> bool {
        self.seqno > other.seqno || self.sent > other.sent
    }

    // regresses reports whether self is older than other on either axis.
    pub fn regresses(&self, other: &SemiChannelBody) -> bool {
        self.seqno < other.seqno || self.sent < other.sent
    }
}

impl SemiChannel {
    /// Checks this state against the last committed seqno of its author and
    /// the state on record for the counterparty.
    ///
    /// The author's own seqno may equal the committed one: that is the state
    /// both parties last agreed on. Counterparty data is only an echo of
    /// what the author saw and may never claim more than the record, nor
    /// predate the counterparty's committed seqno.
    pub fn check_against(
        &self,
        committed_seqno: u64,
        counterparty: &SemiChannelBody,
        counterparty_committed_seqno: u64,
    ) -> Result<(), Error> {
        if self.data.seqno < committed_seqno {
            return Err(Error::OutdatedState);
        }
        if let Some(seen) = &self.counterparty_data {
            if seen.seqno < counterparty_committed_seqno {
                return Err(Error::OutdatedState);
            }
            if seen.exceeds(counterparty) {
                return Err(Error::OutdatedState);
            }
        }
        Ok(())
    }
}

impl Quarantine {
    pub fn new(
        env: &soroban_sdk::Env,
        state_a: SemiChannelBody,
        state_b: SemiChannelBody,
        started_at: u64,
        committed_by_a: bool,
    ) -> Self {
        Quarantine {
            state_a,
            state_b,
            started_at,
            committed_by_a,
            challenged: false,
            settled_a: Vec::new(env),
            settled_b: Vec::new(env),
        }
    }

    // challenge_deadline is the first instant at which a challenge is refused.
    pub fn challenge_deadline(&self, config: &ClosureConfig) -> u64 {
        self.started_at.saturating_add(config.quarantine_duration)
    }

    // close_deadline is the first instant at which the close may be finalized.
    pub fn close_deadline(&self, config: &ClosureConfig) -> u64 {
        self.challenge_deadline(config)
            .saturating_add(config.close_duration)
    }

    /// Replaces the record of the challenging party with its fresher claim
    /// and charges the fine on top of its sent amount.
    pub fn apply_challenge(
        &mut self,
        challenger_is_a: bool,
        fresher: SemiChannelBody,
        fine: i128,
    ) -> Result<(), Error> {
        let recorded = match challenger_is_a {
            true => &self.state_a,
            false => &self.state_b,
        };
        if fresher.seqno <= recorded.seqno {
            return Err(Error::OutdatedState);
        }
        let sent = fresher
            .sent
            .checked_add(fine)
            .ok_or(Error::AmountOverflow)?;
        let fined = SemiChannelBody { sent, ..fresher };
        match challenger_is_a {
            true => self.state_a = fined,
            false => self.state_b = fined,
        }
        self.challenged = true;
        Ok(())
    }

    /// Adds the evaluated conditional deltas to the sent amount of the side
    /// whose dictionary was settled, remembering the settled indices.
    pub fn apply_settlement(
        &mut self,
        debtor_is_a: bool,
        indices: &Vec<u32>,
        delta: i128,
    ) -> Result<(), Error> {
        let (state, settled) = match debtor_is_a {
            true => (&mut self.state_a, &mut self.settled_a),
            false => (&mut self.state_b, &mut self.settled_b),
        };
        for index in indices.iter() {
            if settled.contains(index) {
                return Err(Error::ConditionalAlreadySettled);
            }
            settled.push_back(index);
        }
        state.sent = state
            .sent
            .checked_add(delta)
            .ok_or(Error::AmountOverflow)?;
        Ok(())
    }
}
