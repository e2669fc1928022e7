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

use crate::balance::Payout;
use soroban_sdk::{contracttype, token, Address, Env};

/// How funds enter and leave the escrow.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PaymentConfig {
    /// Reserve locked on init and kept for the lifetime of the channel.
    pub storage_fee: i128,
    pub addr_a: Address,
    pub addr_b: Address,
    /// Token contract of the escrowed currency. The native currency is the
    /// Stellar asset contract of XLM.
    pub token: Address,
}

pub struct Transport<'a> {
    env: &'a Env,
    config: &'a PaymentConfig,
}

impl<'a> Transport<'a> {
    pub fn new(env: &'a Env, config: &'a PaymentConfig) -> Self {
        Transport { env, config }
    }

    fn client(&self) -> token::Client<'a> {
        token::Client::new(self.env, &self.config.token)
    }

    // receive_deposit pulls amount from `from` into the escrow. `from` must
    // have authorized the invocation.
    pub fn receive_deposit(&self, from: &Address, amount: i128) {
        if amount == 0 {
            return;
        }
        let contract = self.env.current_contract_address();
        self.client().transfer(from, &contract, &amount);
    }

    // send_payout transfers amount out of the escrow to the party. A failed
    // transfer aborts the whole invocation.
    pub fn send_payout(&self, is_a: bool, amount: i128) {
        if amount == 0 {
            return;
        }
        let to = match is_a {
            true => &self.config.addr_a,
            false => &self.config.addr_b,
        };
        let contract = self.env.current_contract_address();
        self.client().transfer(&contract, to, &amount);
    }

    pub fn pay(&self, payout: &Payout) {
        self.send_payout(true, payout.a);
        self.send_payout(false, payout.b);
    }

    // sweep empties the escrow into `to` and returns the amount moved.
    pub fn sweep(&self, to: &Address) -> i128 {
        let contract = self.env.current_contract_address();
        let client = self.client();
        let rest = client.balance(&contract);
        if rest > 0 {
            client.transfer(&contract, to, &rest);
        }
        rest
    }
}
