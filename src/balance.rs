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

//! Escrow accounting. Nothing here moves tokens; callers pay out the
//! amounts returned once the whole transition has been validated.

use crate::Error;
use soroban_sdk::contracttype;

/// Accounting of the escrow. All fields are non-negative.
///
/// `spendable_a + spendable_b + withdraw_a + withdraw_b == deposit_a + deposit_b`
/// holds for every stored value.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Balance {
    pub deposit_a: i128,
    pub deposit_b: i128,
    pub withdraw_a: i128,
    pub withdraw_b: i128,
    pub sent_a: i128,
    pub sent_b: i128,
}

/// Read-only view returned to callers.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BalanceSnapshot {
    pub balance_a: i128,
    pub balance_b: i128,
    pub deposit_a: i128,
    pub deposit_b: i128,
    pub withdraw_a: i128,
    pub withdraw_b: i128,
    pub sent_a: i128,
    pub sent_b: i128,
}

/// Amounts to hand out to A and B.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Payout {
    pub a: i128,
    pub b: i128,
}

fn add(x: i128, y: i128) -> Result<i128, Error> {
    x.checked_add(y).ok_or(Error::AmountOverflow)
}

fn sub(x: i128, y: i128) -> Result<i128, Error> {
    x.checked_sub(y).ok_or(Error::AmountOverflow)
}

// net computes deposit - withdraw - sent + received.
fn net(deposit: i128, withdraw: i128, sent: i128, received: i128) -> Result<i128, Error> {
    add(sub(sub(deposit, withdraw)?, sent)?, received)
}

impl Balance {
    pub fn is_empty(&self) -> bool {
        *self == Balance::default()
    }

    pub fn spendable(&self, is_a: bool) -> Result<i128, Error> {
        match is_a {
            true => net(self.deposit_a, self.withdraw_a, self.sent_a, self.sent_b),
            false => net(self.deposit_b, self.withdraw_b, self.sent_b, self.sent_a),
        }
    }

    pub fn deposit(&mut self, is_a: bool, amount: i128) -> Result<(), Error> {
        if amount < 0 {
            return Err(Error::AmountOverflow);
        }
        match is_a {
            true => self.deposit_a = add(self.deposit_a, amount)?,
            false => self.deposit_b = add(self.deposit_b, amount)?,
        }
        Ok(())
    }

    /// Applies a cooperative commit and returns the newly unlocked
    /// withdrawals. On error self is left untouched.
    pub fn apply_commit(
        &mut self,
        withdraw_a: i128,
        withdraw_b: i128,
        sent_a: i128,
        sent_b: i128,
    ) -> Result<Payout, Error> {
        if withdraw_a < self.withdraw_a || withdraw_b < self.withdraw_b {
            return Err(Error::WithdrawRegress);
        }
        let next = Balance {
            withdraw_a,
            withdraw_b,
            sent_a,
            sent_b,
            ..self.clone()
        };
        if next.spendable(true)? < 0 || next.spendable(false)? < 0 {
            return Err(Error::InsufficientBalance);
        }
        let payout = Payout {
            a: sub(withdraw_a, self.withdraw_a)?,
            b: sub(withdraw_b, self.withdraw_b)?,
        };
        *self = next;
        Ok(payout)
    }

    /// Final split for a cooperative close. Both parties signed the sent
    /// amounts, so a negative share is rejected rather than capped.
    pub fn close_exact(&self, sent_a: i128, sent_b: i128) -> Result<Payout, Error> {
        let a = net(self.deposit_a, self.withdraw_a, sent_a, sent_b)?;
        let b = net(self.deposit_b, self.withdraw_b, sent_b, sent_a)?;
        if a < 0 || b < 0 {
            return Err(Error::InsufficientBalance);
        }
        Ok(Payout { a, b })
    }

    /// Final split for a disputed close. A side whose (fined) sent amount
    /// exceeds what it holds loses its whole share to the other side; the
    /// split never leaves the escrow.
    pub fn close_capped(&self, sent_a: i128, sent_b: i128) -> Result<Payout, Error> {
        let available_a = sub(self.deposit_a, self.withdraw_a)?;
        let available_b = sub(self.deposit_b, self.withdraw_b)?;
        let total = add(available_a, available_b)?;
        // sent amounts are non-negative, so the difference cannot overflow
        let delta = sent_b - sent_a;
        let a = available_a.saturating_add(delta).max(0).min(total);
        Ok(Payout { a, b: total - a })
    }

    pub fn zero_all(&mut self) {
        *self = Balance::default();
    }

    pub fn snapshot(&self) -> Result<BalanceSnapshot, Error> {
        Ok(BalanceSnapshot {
            balance_a: self.spendable(true)?,
            balance_b: self.spendable(false)?,
            deposit_a: self.deposit_a,
            deposit_b: self.deposit_b,
            withdraw_a: self.withdraw_a,
            withdraw_b: self.withdraw_b,
            sent_a: self.sent_a,
            sent_b: self.sent_b,
        })
    }
}
