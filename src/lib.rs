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

#![no_std]
extern crate alloc;

pub mod auth;
pub mod balance;
pub mod conditionals;
pub mod sol;
pub mod state;
pub mod transport;

use auth::{authorize, PartyKey};
use balance::{Balance, BalanceSnapshot, Payout};
use conditionals::ConditionalEvaluatorClient;
use sol::{QuarantineMessage, SignedState};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, Address, Bytes, Env,
    Symbol, Vec,
};
use state::{ClosureConfig, Dispute, Quarantine, SemiChannel};
use transport::{PaymentConfig, Transport};

/// Fee kept from every top-up.
pub const DEPOSIT_FEE: i128 = 250_000;
/// Flat fee of a cooperative commit.
pub const COMMIT_FEE: i128 = 300_000;
/// Extra commit fee for every party that receives a withdrawal.
pub const PAYOUT_FEE: i128 = 300_000;
/// The configured storage fee must be strictly above this.
pub const MIN_STORAGE_FEE: i128 = 100_000 + 2 * PAYOUT_FEE;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    ChannelNotFound = 1,
    AlreadyConfigured = 2,
    AlreadyInited = 3,
    WrongState = 4,
    EncodingError = 5,
    WrongTag = 6,
    WrongChannelId = 7,
    NotAuthorized = 8,
    InsufficientFee = 9,
    AmountNotCoversFee = 10,
    NotEnoughMoneyForInitStorage = 11,
    IncorrectInitialBalance = 12,
    SeqnoRegress = 13,
    SeqnoGap = 14,
    WithdrawRegress = 15,
    InsufficientBalance = 16,
    AmountOverflow = 17,
    OutdatedState = 18,
    NoQuarantine = 19,
    UnauthorizedChallenge = 20,
    QuarantineAlreadyChallenged = 21,
    TooLateForQuarantineChallenge = 22,
    TooEarlyToClose = 23,
    QuarantineNotFinished = 24,
    TooLateToSettleConditionals = 25,
    IncorrectConditionalsProof = 26,
    ConditionalAlreadySettled = 27,
    ConditionalEvaluationFailed = 28,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lifecycle {
    Uninited,
    Open,
    /// Settled for good. The channel id is never reused.
    Closed,
}

/// Externally visible state, derived from the lifecycle, the pending
/// quarantine and the current ledger time.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ChannelStatus {
    Uninited = 0,
    Open = 1,
    ClosureStarted = 2,
    SettlingConditionals = 3,
    AwaitingFinalization = 4,
    Closed = 5,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelConfig {
    pub id: u128,
    pub key_a: PartyKey,
    pub key_b: PartyKey,
    pub closure: ClosureConfig,
    pub payment: PaymentConfig,
    /// Contract evaluating conditional payments during settlement.
    pub evaluator: Address,
    /// Escrow accounting the channel starts from. init refuses anything
    /// but an empty balance.
    pub balance: Balance,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Channel {
    pub id: u128,
    pub lifecycle: Lifecycle,
    pub balance: Balance,
    pub key_a: PartyKey,
    pub key_b: PartyKey,
    pub closure: ClosureConfig,
    pub committed_seqno_a: u64,
    pub committed_seqno_b: u64,
    pub dispute: Dispute,
    pub payment: PaymentConfig,
    pub evaluator: Address,
}

#[contracttype]
enum DataKey {
    Channel,
    // Receives what is left in the escrow once the channel is closed.
    ReservePayer,
}

const CHANNEL: Symbol = symbol_short!("channel");

#[contract]
pub struct PaymentChannel;

#[contractimpl]
impl PaymentChannel {
    pub fn configure(env: Env, config: ChannelConfig) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Channel) {
            return Err(Error::AlreadyConfigured);
        }
        if config.closure.fine < 0 || config.payment.storage_fee < 0 {
            return Err(Error::EncodingError);
        }
        let channel = Channel {
            id: config.id,
            lifecycle: Lifecycle::Uninited,
            balance: config.balance,
            key_a: config.key_a,
            key_b: config.key_b,
            closure: config.closure,
            committed_seqno_a: 0,
            committed_seqno_b: 0,
            dispute: Dispute::Idle,
            payment: config.payment,
            evaluator: config.evaluator,
        };
        set_channel(&env, &channel);
        log!(&env, "channel configured", channel.id);
        Ok(())
    }

    // We encode the party as bool: true is party A, false is party B.
    pub fn init(
        env: Env,
        is_a: bool,
        payer: Address,
        reserve: i128,
        signature: Bytes,
    ) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        if channel.lifecycle != Lifecycle::Uninited {
            return Err(Error::AlreadyInited);
        }
        if !channel.balance.is_empty() {
            return Err(Error::IncorrectInitialBalance);
        }
        let storage_fee = channel.payment.storage_fee;
        if storage_fee <= MIN_STORAGE_FEE || reserve < storage_fee {
            log!(&env, "reserve below storage fee", reserve, storage_fee);
            return Err(Error::NotEnoughMoneyForInitStorage);
        }
        let payload = sol::init_payload(&env, channel.id);
        authorize(&env, channel.key(is_a), &payload, &signature)?;
        payer.require_auth();

        // effects
        channel.lifecycle = Lifecycle::Open;
        set_channel(&env, &channel);
        env.storage().instance().set(&DataKey::ReservePayer, &payer);

        // interact
        // Any excess over the storage fee stays in the reserve.
        Transport::new(&env, &channel.payment).receive_deposit(&payer, reserve);
        env.events()
            .publish((CHANNEL, symbol_short!("init")), is_a);
        log!(&env, "channel inited", channel.id, is_a);
        Ok(())
    }

    pub fn top_up(env: Env, is_a: bool, from: Address, amount: i128) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        channel.require_open()?;
        if amount < DEPOSIT_FEE {
            log!(&env, "top up below fee", amount);
            return Err(Error::InsufficientFee);
        }
        from.require_auth();

        // effects
        channel.balance.deposit(is_a, amount - DEPOSIT_FEE)?;
        set_channel(&env, &channel);

        // interact
        Transport::new(&env, &channel.payment).receive_deposit(&from, amount);
        env.events()
            .publish((CHANNEL, symbol_short!("topup")), (is_a, amount - DEPOSIT_FEE));
        Ok(())
    }

    pub fn cooperative_commit(
        env: Env,
        caller: Address,
        max_fee: i128,
        payload: Bytes,
        sig_a: Bytes,
        sig_b: Bytes,
    ) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        channel.require_open()?;
        let commit = sol::decode_cooperative_commit(&payload)?;
        if commit.channel_id != channel.id {
            return Err(Error::WrongChannelId);
        }
        authorize(&env, &channel.key_a, &payload, &sig_a)?;
        authorize(&env, &channel.key_b, &payload, &sig_b)?;
        check_next_seqno(channel.committed_seqno_a, commit.seqno_a)?;
        check_next_seqno(channel.committed_seqno_b, commit.seqno_b)?;

        let payout = channel.balance.apply_commit(
            commit.withdraw_a,
            commit.withdraw_b,
            commit.sent_a,
            commit.sent_b,
        )?;
        let payouts = (payout.a > 0) as i128 + (payout.b > 0) as i128;
        let fee = COMMIT_FEE + PAYOUT_FEE * payouts;
        if max_fee < fee {
            log!(&env, "commit fee not covered", max_fee, fee);
            return Err(Error::AmountNotCoversFee);
        }
        caller.require_auth();

        // effects
        channel.committed_seqno_a = commit.seqno_a;
        channel.committed_seqno_b = commit.seqno_b;
        set_channel(&env, &channel);

        // interact
        let transport = Transport::new(&env, &channel.payment);
        transport.receive_deposit(&caller, fee);
        transport.pay(&payout);
        env.events().publish(
            (CHANNEL, symbol_short!("commit")),
            (commit.seqno_a, commit.seqno_b),
        );
        log!(&env, "cooperative commit", commit.seqno_a, commit.seqno_b);
        Ok(())
    }

    pub fn cooperative_close(
        env: Env,
        payload: Bytes,
        sig_a: Bytes,
        sig_b: Bytes,
    ) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        if channel.lifecycle != Lifecycle::Open {
            return Err(Error::WrongState);
        }
        let close = sol::decode_cooperative_close(&payload)?;
        if close.channel_id != channel.id {
            return Err(Error::WrongChannelId);
        }
        authorize(&env, &channel.key_a, &payload, &sig_a)?;
        authorize(&env, &channel.key_b, &payload, &sig_b)?;
        if close.seqno_a <= channel.committed_seqno_a || close.seqno_b <= channel.committed_seqno_b
        {
            return Err(Error::SeqnoRegress);
        }
        let payout = channel.balance.close_exact(close.sent_a, close.sent_b)?;

        // effects
        channel.finish(close.seqno_a, close.seqno_b);
        set_channel(&env, &channel);

        // interact
        let refund = settle_escrow(&env, &channel.payment, &payout)?;
        env.events()
            .publish((CHANNEL, symbol_short!("closed")), (payout.a, payout.b));
        log!(&env, "cooperative close", payout.a, payout.b, refund);
        Ok(())
    }

    pub fn start_uncooperative_close(
        env: Env,
        is_a: bool,
        payload: Bytes,
        signature: Bytes,
    ) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        channel.require_open()?;
        let msg =
            sol::decode_quarantine_message(&env, &payload, sol::TAG_START_UNCOOPERATIVE_CLOSE)?;
        if msg.channel_id != channel.id {
            return Err(Error::WrongChannelId);
        }
        authorize(&env, channel.key(is_a), &payload, &signature)?;
        let (state_a, state_b) = channel.open_signed_states(&env, &msg)?;
        state_a.check_against(channel.committed_seqno_a, &state_b.data, channel.committed_seqno_b)?;
        state_b.check_against(channel.committed_seqno_b, &state_a.data, channel.committed_seqno_a)?;

        // effects
        let now = env.ledger().timestamp();
        let (seqno_a, seqno_b) = (state_a.data.seqno, state_b.data.seqno);
        channel.dispute =
            Dispute::Quarantined(Quarantine::new(&env, state_a.data, state_b.data, now, is_a));
        set_channel(&env, &channel);

        env.events()
            .publish((CHANNEL, symbol_short!("quarantin")), (is_a, now));
        log!(&env, "uncooperative close started", is_a, seqno_a, seqno_b);
        Ok(())
    }

    pub fn challenge_quarantined_state(
        env: Env,
        is_a: bool,
        payload: Bytes,
        signature: Bytes,
    ) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        let mut quarantine = channel.pending_quarantine()?;
        let msg = sol::decode_quarantine_message(&env, &payload, sol::TAG_CHALLENGE_QUARANTINE)?;
        if msg.channel_id != channel.id {
            return Err(Error::WrongChannelId);
        }
        authorize(&env, channel.key(is_a), &payload, &signature)?;
        if is_a == quarantine.committed_by_a {
            return Err(Error::UnauthorizedChallenge);
        }
        if quarantine.challenged {
            return Err(Error::QuarantineAlreadyChallenged);
        }
        if env.ledger().timestamp() >= quarantine.challenge_deadline(&channel.closure) {
            return Err(Error::TooLateForQuarantineChallenge);
        }
        let (state_a, state_b) = channel.open_signed_states(&env, &msg)?;
        state_a.check_against(channel.committed_seqno_a, &state_b.data, channel.committed_seqno_b)?;
        state_b.check_against(channel.committed_seqno_b, &state_a.data, channel.committed_seqno_a)?;

        // The challenger contests its own record; the other side stays as is.
        let (fresher, other, recorded_other) = match is_a {
            true => (state_a, state_b, &quarantine.state_b),
            false => (state_b, state_a, &quarantine.state_a),
        };
        if other.data.regresses(recorded_other) {
            return Err(Error::OutdatedState);
        }
        quarantine.apply_challenge(is_a, fresher.data, channel.closure.fine)?;

        // effects
        channel.dispute = Dispute::Quarantined(quarantine);
        set_channel(&env, &channel);

        env.events()
            .publish((CHANNEL, symbol_short!("challenge")), is_a);
        log!(&env, "quarantine challenged", is_a);
        Ok(())
    }

    pub fn settle_conditionals(
        env: Env,
        is_a: bool,
        payload: Bytes,
        signature: Bytes,
    ) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        let mut quarantine = channel.pending_quarantine()?;
        let now = env.ledger().timestamp();
        if now < quarantine.challenge_deadline(&channel.closure) {
            return Err(Error::QuarantineNotFinished);
        }
        if now >= quarantine.close_deadline(&channel.closure) {
            return Err(Error::TooLateToSettleConditionals);
        }
        let msg = sol::decode_settle_conditionals(&env, &payload)?;
        if msg.channel_id != channel.id {
            return Err(Error::WrongChannelId);
        }
        authorize(&env, channel.key(is_a), &payload, &signature)?;

        // The caller settles what the counterparty committed to pay.
        let debtor = match is_a {
            true => &quarantine.state_b,
            false => &quarantine.state_a,
        };
        let proven = conditionals::verify_proof(&env, &debtor.conditionals_hash, &msg.proof)?;

        let evaluator = ConditionalEvaluatorClient::new(&env, &channel.evaluator);
        let mut delta: i128 = 0;
        let mut indices = Vec::new(&env);
        for (index, input) in msg.to_settle.iter() {
            let condition = proven
                .get(*index)
                .ok_or(Error::IncorrectConditionalsProof)?;
            let amount = match evaluator.try_evaluate(&condition, input) {
                Ok(Ok(amount)) if amount >= 0 => amount,
                _ => return Err(Error::ConditionalEvaluationFailed),
            };
            delta = delta.checked_add(amount).ok_or(Error::AmountOverflow)?;
            indices.push_back(*index);
        }
        quarantine.apply_settlement(!is_a, &indices, delta)?;

        // effects
        channel.dispute = Dispute::Quarantined(quarantine);
        set_channel(&env, &channel);

        env.events()
            .publish((CHANNEL, symbol_short!("settled")), (is_a, delta));
        log!(&env, "conditionals settled", is_a, delta);
        Ok(())
    }

    // Anyone may finalize once the quarantine and the close window are over.
    pub fn finish_uncooperative_close(env: Env) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env)?;
        let quarantine = channel.pending_quarantine()?;
        if env.ledger().timestamp() < quarantine.close_deadline(&channel.closure) {
            return Err(Error::TooEarlyToClose);
        }
        let payout = channel
            .balance
            .close_capped(quarantine.state_a.sent, quarantine.state_b.sent)?;

        // effects
        channel.finish(
            quarantine.state_a.seqno.saturating_add(1),
            quarantine.state_b.seqno.saturating_add(1),
        );
        set_channel(&env, &channel);

        // interact
        let refund = settle_escrow(&env, &channel.payment, &payout)?;
        env.events()
            .publish((CHANNEL, symbol_short!("closed")), (payout.a, payout.b));
        log!(&env, "uncooperative close finished", payout.a, payout.b, refund);
        Ok(())
    }

    pub fn get_channel(env: Env) -> Result<Channel, Error> {
        get_channel(&env)
    }

    pub fn get_channel_state(env: Env) -> Result<ChannelStatus, Error> {
        Ok(get_channel(&env)?.status(env.ledger().timestamp()))
    }

    pub fn get_balance(env: Env) -> Result<BalanceSnapshot, Error> {
        get_channel(&env)?.balance.snapshot()
    }
}

impl Channel {
    pub fn key(&self, is_a: bool) -> &PartyKey {
        match is_a {
            true => &self.key_a,
            false => &self.key_b,
        }
    }

    // require_open fails unless the channel is inited, not closed and not in dispute.
    fn require_open(&self) -> Result<(), Error> {
        if self.lifecycle != Lifecycle::Open || self.dispute != Dispute::Idle {
            return Err(Error::WrongState);
        }
        Ok(())
    }

    fn pending_quarantine(&self) -> Result<Quarantine, Error> {
        if self.lifecycle != Lifecycle::Open {
            return Err(Error::WrongState);
        }
        self.dispute.quarantine().cloned().ok_or(Error::NoQuarantine)
    }

    fn open_signed_states(
        &self,
        env: &Env,
        msg: &QuarantineMessage,
    ) -> Result<(SemiChannel, SemiChannel), Error> {
        let state_a = open_signed_state(env, &self.key_a, self.id, &msg.state_a)?;
        let state_b = open_signed_state(env, &self.key_b, self.id, &msg.state_b)?;
        Ok((state_a, state_b))
    }

    // finish zeroes the escrow and moves the channel to its terminal state.
    fn finish(&mut self, seqno_a: u64, seqno_b: u64) {
        self.balance.zero_all();
        self.committed_seqno_a = seqno_a;
        self.committed_seqno_b = seqno_b;
        self.dispute = Dispute::Idle;
        self.lifecycle = Lifecycle::Closed;
    }

    pub fn status(&self, now: u64) -> ChannelStatus {
        match (self.lifecycle, self.dispute.quarantine()) {
            (Lifecycle::Uninited, _) => ChannelStatus::Uninited,
            (Lifecycle::Closed, _) => ChannelStatus::Closed,
            (Lifecycle::Open, None) => ChannelStatus::Open,
            (Lifecycle::Open, Some(q)) if now < q.challenge_deadline(&self.closure) => {
                ChannelStatus::ClosureStarted
            }
            (Lifecycle::Open, Some(q)) if now < q.close_deadline(&self.closure) => {
                ChannelStatus::SettlingConditionals
            }
            (Lifecycle::Open, Some(_)) => ChannelStatus::AwaitingFinalization,
        }
    }
}

// open_signed_state verifies the author's signature before decoding the state.
fn open_signed_state(
    env: &Env,
    key: &PartyKey,
    channel_id: u128,
    signed: &SignedState,
) -> Result<SemiChannel, Error> {
    authorize(env, key, &signed.payload, &signed.signature)?;
    let state = sol::decode_semi_channel(env, &signed.payload)?;
    if state.channel_id != channel_id {
        return Err(Error::WrongChannelId);
    }
    Ok(state)
}

// settle_escrow pays out the final split and refunds whatever else the
// escrow holds, reserve and collected fees, to the init payer. Returns the refund.
fn settle_escrow(env: &Env, payment: &PaymentConfig, payout: &Payout) -> Result<i128, Error> {
    let payer: Address = env
        .storage()
        .instance()
        .get(&DataKey::ReservePayer)
        .ok_or(Error::ChannelNotFound)?;
    let transport = Transport::new(env, payment);
    transport.pay(payout);
    Ok(transport.sweep(&payer))
}

// check_next_seqno accepts exactly one step past the committed seqno.
fn check_next_seqno(committed: u64, proposed: u64) -> Result<(), Error> {
    if proposed <= committed {
        return Err(Error::SeqnoRegress);
    }
    if proposed - committed != 1 {
        return Err(Error::SeqnoGap);
    }
    Ok(())
}

// get_channel returns the channel stored in this contract instance or an error if it was never configured.
pub fn get_channel(env: &Env) -> Result<Channel, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Channel)
        .ok_or(Error::ChannelNotFound)
}

// set_channel stores the channel in this contract instance.
pub fn set_channel(env: &Env, channel: &Channel) {
    env.storage().instance().set(&DataKey::Channel, channel);
}

#[cfg(test)]
mod ethsig;
