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

//! Wire format of every signed channel message.
//!
//! Messages are ABI parameter encodings whose first word is a `uint32` tag.
//! The tag is read before any field is decoded, so a payload of one kind is
//! never interpreted as another kind even when its bytes happen to decode.

use crate::state::{SemiChannel, SemiChannelBody};
use crate::Error;
use alloc::vec;
use alloc::vec::Vec;
use alloy_primitives::{Bytes as PrimBytes, FixedBytes, U256};
use alloy_sol_types::sol;
use alloy_sol_types::SolValue;
use soroban_sdk::{Bytes, BytesN, Env};

pub const TAG_INIT: u32 = 0x696e6974;
pub const TAG_COOPERATIVE_CLOSE: u32 = 0x8243e9a3;
pub const TAG_COOPERATIVE_COMMIT: u32 = 0x4a390cac;
pub const TAG_START_UNCOOPERATIVE_CLOSE: u32 = 0x8c623692;
pub const TAG_CHALLENGE_QUARANTINE: u32 = 0xb8a21379;
pub const TAG_SETTLE_CONDITIONALS: u32 = 0x14588aab;
pub const TAG_STATE: u32 = 0x43685374;

sol! {
    #[derive(Debug)]
    struct InitSol {
        uint32 tag;
        uint128 channelId;
    }

    #[derive(Debug)]
    struct CooperativeCommitSol {
        uint32 tag;
        uint128 channelId;
        uint128 sentA;
        uint128 sentB;
        uint64 seqnoA;
        uint64 seqnoB;
        uint128 withdrawA;
        uint128 withdrawB;
    }

    // Same prefix as the commit; only the tag tells them apart.
    #[derive(Debug)]
    struct CooperativeCloseSol {
        uint32 tag;
        uint128 channelId;
        uint128 sentA;
        uint128 sentB;
        uint64 seqnoA;
        uint64 seqnoB;
    }

    #[derive(Debug)]
    struct SemiChannelBodySol {
        uint64 seqno;
        uint128 sent;
        bytes32 conditionalsHash;
    }

    #[derive(Debug)]
    struct SemiChannelSol {
        uint32 tag;
        uint128 channelId;
        SemiChannelBodySol data;
        bool hasCounterpartyData;
        SemiChannelBodySol counterpartyData;
    }

    #[derive(Debug)]
    struct SignedSemiChannelSol {
        bytes signature;
        bytes state;
    }

    // Shared by the start and the challenge of an uncooperative close.
    #[derive(Debug)]
    struct QuarantineMessageSol {
        uint32 tag;
        uint128 channelId;
        SignedSemiChannelSol signedStateA;
        SignedSemiChannelSol signedStateB;
    }

    #[derive(Debug)]
    struct ConditionalSettlementSol {
        uint32 index;
        uint128 input;
    }

    #[derive(Debug)]
    struct ConditionalProofSol {
        uint32 index;
        bytes condition;
        bytes32[] path;
    }

    #[derive(Debug)]
    struct SettleConditionalsSol {
        uint32 tag;
        uint128 channelId;
        ConditionalSettlementSol[] toSettle;
        ConditionalProofSol[] proof;
    }
}

/// Balance commitment signed by both parties.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CooperativeCommit {
    pub channel_id: u128,
    pub sent_a: i128,
    pub sent_b: i128,
    pub seqno_a: u64,
    pub seqno_b: u64,
    pub withdraw_a: i128,
    pub withdraw_b: i128,
}

/// Final state signed by both parties.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CooperativeClose {
    pub channel_id: u128,
    pub sent_a: i128,
    pub sent_b: i128,
    pub seqno_a: u64,
    pub seqno_b: u64,
}

/// A semi-channel state together with its author's signature and the exact
/// bytes that were signed.
#[derive(Clone, Debug)]
pub struct SignedState {
    pub signature: Bytes,
    pub payload: Bytes,
}

#[derive(Clone, Debug)]
pub struct QuarantineMessage {
    pub channel_id: u128,
    pub state_a: SignedState,
    pub state_b: SignedState,
}

#[derive(Clone, Debug)]
pub struct ConditionalProof {
    pub index: u32,
    pub condition: Bytes,
    pub path: soroban_sdk::Vec<BytesN<32>>,
}

#[derive(Clone, Debug)]
pub struct SettleConditionals {
    pub channel_id: u128,
    /// Index into the counterparty's dictionary and the input to evaluate it with.
    pub to_settle: Vec<(u32, u128)>,
    pub proof: Vec<ConditionalProof>,
}

// payload_bytes copies a host byte buffer into guest memory for decoding.
pub fn payload_bytes(payload: &Bytes) -> Vec<u8> {
    let mut buf = vec![0u8; payload.len() as usize];
    payload.copy_into_slice(&mut buf);
    buf
}

// read_tag returns the tag from the first ABI word without looking at the rest.
pub fn read_tag(buf: &[u8]) -> Result<u32, Error> {
    if buf.len() < 32 {
        return Err(Error::EncodingError);
    }
    let word = U256::from_be_slice(&buf[..32]);
    u32::try_from(word).map_err(|_| Error::WrongTag)
}

pub fn expect_tag(buf: &[u8], tag: u32) -> Result<(), Error> {
    if read_tag(buf)? != tag {
        return Err(Error::WrongTag);
    }
    Ok(())
}

pub fn to_amount(value: u128) -> Result<i128, Error> {
    i128::try_from(value).map_err(|_| Error::AmountOverflow)
}

pub fn init_payload(env: &Env, channel_id: u128) -> Bytes {
    let msg = InitSol {
        tag: TAG_INIT,
        channelId: channel_id,
    };
    Bytes::from_slice(env, &msg.abi_encode_params())
}

pub fn decode_cooperative_commit(payload: &Bytes) -> Result<CooperativeCommit, Error> {
    let buf = payload_bytes(payload);
    expect_tag(&buf, TAG_COOPERATIVE_COMMIT)?;
    let msg = CooperativeCommitSol::abi_decode_params(&buf, true)
        .map_err(|_| Error::EncodingError)?;
    Ok(CooperativeCommit {
        channel_id: msg.channelId,
        sent_a: to_amount(msg.sentA)?,
        sent_b: to_amount(msg.sentB)?,
        seqno_a: msg.seqnoA,
        seqno_b: msg.seqnoB,
        withdraw_a: to_amount(msg.withdrawA)?,
        withdraw_b: to_amount(msg.withdrawB)?,
    })
}

pub fn decode_cooperative_close(payload: &Bytes) -> Result<CooperativeClose, Error> {
    let buf = payload_bytes(payload);
    expect_tag(&buf, TAG_COOPERATIVE_CLOSE)?;
    let msg = CooperativeCloseSol::abi_decode_params(&buf, true)
        .map_err(|_| Error::EncodingError)?;
    Ok(CooperativeClose {
        channel_id: msg.channelId,
        sent_a: to_amount(msg.sentA)?,
        sent_b: to_amount(msg.sentB)?,
        seqno_a: msg.seqnoA,
        seqno_b: msg.seqnoB,
    })
}

fn convert_body(env: &Env, body: &SemiChannelBodySol) -> Result<SemiChannelBody, Error> {
    Ok(SemiChannelBody {
        seqno: body.seqno,
        sent: to_amount(body.sent)?,
        conditionals_hash: BytesN::from_array(env, &body.conditionalsHash.0),
    })
}

pub fn decode_semi_channel(env: &Env, payload: &Bytes) -> Result<SemiChannel, Error> {
    let buf = payload_bytes(payload);
    expect_tag(&buf, TAG_STATE)?;
    let msg = SemiChannelSol::abi_decode_params(&buf, true).map_err(|_| Error::EncodingError)?;
    let counterparty_data = match msg.hasCounterpartyData {
        true => Some(convert_body(env, &msg.counterpartyData)?),
        false => None,
    };
    Ok(SemiChannel {
        channel_id: msg.channelId,
        data: convert_body(env, &msg.data)?,
        counterparty_data,
    })
}

fn convert_signed(env: &Env, signed: &SignedSemiChannelSol) -> SignedState {
    SignedState {
        signature: Bytes::from_slice(env, &signed.signature),
        payload: Bytes::from_slice(env, &signed.state),
    }
}

// decode_quarantine_message decodes a start or a challenge message, depending on tag.
pub fn decode_quarantine_message(
    env: &Env,
    payload: &Bytes,
    tag: u32,
) -> Result<QuarantineMessage, Error> {
    let buf = payload_bytes(payload);
    expect_tag(&buf, tag)?;
    let msg = QuarantineMessageSol::abi_decode_params(&buf, true)
        .map_err(|_| Error::EncodingError)?;
    Ok(QuarantineMessage {
        channel_id: msg.channelId,
        state_a: convert_signed(env, &msg.signedStateA),
        state_b: convert_signed(env, &msg.signedStateB),
    })
}

pub fn decode_settle_conditionals(env: &Env, payload: &Bytes) -> Result<SettleConditionals, Error> {
    let buf = payload_bytes(payload);
    expect_tag(&buf, TAG_SETTLE_CONDITIONALS)?;
    let msg = SettleConditionalsSol::abi_decode_params(&buf, true)
        .map_err(|_| Error::EncodingError)?;

    let to_settle = msg.toSettle.iter().map(|s| (s.index, s.input)).collect();
    let proof = msg
        .proof
        .iter()
        .map(|entry| {
            let mut path = soroban_sdk::Vec::new(env);
            for node in entry.path.iter() {
                path.push_back(BytesN::from_array(env, &node.0));
            }
            ConditionalProof {
                index: entry.index,
                condition: Bytes::from_slice(env, &entry.condition),
                path,
            }
        })
        .collect();

    Ok(SettleConditionals {
        channel_id: msg.channelId,
        to_settle,
        proof,
    })
}

// Encoders below are what an off-chain party runs to produce signable payloads.

pub fn encode_body(body: &SemiChannelBody) -> SemiChannelBodySol {
    SemiChannelBodySol {
        seqno: body.seqno,
        sent: body.sent as u128,
        conditionalsHash: FixedBytes(body.conditionals_hash.to_array()),
    }
}

pub fn encode_semi_channel(env: &Env, state: &SemiChannel) -> Bytes {
    let (has_counterparty, counterparty) = match &state.counterparty_data {
        Some(body) => (true, encode_body(body)),
        None => (
            false,
            SemiChannelBodySol {
                seqno: 0,
                sent: 0,
                conditionalsHash: FixedBytes::ZERO,
            },
        ),
    };
    let msg = SemiChannelSol {
        tag: TAG_STATE,
        channelId: state.channel_id,
        data: encode_body(&state.data),
        hasCounterpartyData: has_counterparty,
        counterpartyData: counterparty,
    };
    Bytes::from_slice(env, &msg.abi_encode_params())
}

pub fn encode_signed_state(signed: &SignedState) -> SignedSemiChannelSol {
    SignedSemiChannelSol {
        signature: PrimBytes::from(payload_bytes(&signed.signature)),
        state: PrimBytes::from(payload_bytes(&signed.payload)),
    }
}

pub fn encode_quarantine_message(env: &Env, tag: u32, msg: &QuarantineMessage) -> Bytes {
    let msg = QuarantineMessageSol {
        tag,
        channelId: msg.channel_id,
        signedStateA: encode_signed_state(&msg.state_a),
        signedStateB: encode_signed_state(&msg.state_b),
    };
    Bytes::from_slice(env, &msg.abi_encode_params())
}

pub fn encode_cooperative_commit(env: &Env, commit: &CooperativeCommit) -> Bytes {
    let msg = CooperativeCommitSol {
        tag: TAG_COOPERATIVE_COMMIT,
        channelId: commit.channel_id,
        sentA: commit.sent_a as u128,
        sentB: commit.sent_b as u128,
        seqnoA: commit.seqno_a,
        seqnoB: commit.seqno_b,
        withdrawA: commit.withdraw_a as u128,
        withdrawB: commit.withdraw_b as u128,
    };
    Bytes::from_slice(env, &msg.abi_encode_params())
}

pub fn encode_cooperative_close(env: &Env, close: &CooperativeClose) -> Bytes {
    let msg = CooperativeCloseSol {
        tag: TAG_COOPERATIVE_CLOSE,
        channelId: close.channel_id,
        sentA: close.sent_a as u128,
        sentB: close.sent_b as u128,
        seqnoA: close.seqno_a,
        seqnoB: close.seqno_b,
    };
    Bytes::from_slice(env, &msg.abi_encode_params())
}

pub fn encode_settle_conditionals(env: &Env, msg: &SettleConditionals) -> Bytes {
    let msg = SettleConditionalsSol {
        tag: TAG_SETTLE_CONDITIONALS,
        channelId: msg.channel_id,
        toSettle: msg
            .to_settle
            .iter()
            .map(|(index, input)| ConditionalSettlementSol {
                index: *index,
                input: *input,
            })
            .collect(),
        proof: msg
            .proof
            .iter()
            .map(|entry| ConditionalProofSol {
                index: entry.index,
                condition: PrimBytes::from(payload_bytes(&entry.condition)),
                path: entry.path.iter().map(|node| FixedBytes(node.to_array())).collect(),
            })
            .collect(),
    };
    Bytes::from_slice(env, &msg.abi_encode_params())
}
