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

use crate::Error;
use alloy_primitives::keccak256;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey as EcdsaKey};
use soroban_sdk::{contracttype, Bytes, BytesN, Env};

const ETH_SIGNED_MSG_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Public key a party signs channel messages with.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PartyKey {
    /// Raw ed25519 public key.
    Ed25519(BytesN<32>),
    /// Uncompressed secp256k1 public key of an Ethereum-style signer.
    Secp256k1(BytesN<65>),
}

impl PartyKey {
    // verify checks signature over the 32-byte message digest. Malformed keys
    // and signatures simply fail verification.
    pub fn verify(&self, digest: &BytesN<32>, signature: &Bytes) -> bool {
        match self {
            PartyKey::Ed25519(pubkey) => verify_ed25519(pubkey, digest, signature),
            PartyKey::Secp256k1(pubkey) => verify_secp256k1(pubkey, digest, signature),
        }
    }
}

fn verify_ed25519(pubkey: &BytesN<32>, digest: &BytesN<32>, signature: &Bytes) -> bool {
    if signature.len() != 64 {
        return false;
    }
    let mut sig_bytes = [0u8; 64];
    signature.copy_into_slice(&mut sig_bytes);
    let key = match ed25519_dalek::VerifyingKey::from_bytes(&pubkey.to_array()) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    key.verify_strict(&digest.to_array(), &sig).is_ok()
}

fn verify_secp256k1(pubkey: &BytesN<65>, digest: &BytesN<32>, signature: &Bytes) -> bool {
    if signature.len() != 65 {
        return false;
    }
    let mut sig_bytes = [0u8; 65];
    signature.copy_into_slice(&mut sig_bytes);

    // Ethereum encodes the recovery id as 27 or 28.
    let v = match sig_bytes[64] {
        v @ 27..=28 => v - 27,
        v => v,
    };
    let recovery_id = match RecoveryId::from_byte(v) {
        Some(id) => id,
        None => return false,
    };
    let sig = match EcdsaSignature::from_slice(&sig_bytes[..64]) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    let mut prefixed = [0u8; 60];
    prefixed[..28].copy_from_slice(ETH_SIGNED_MSG_PREFIX);
    prefixed[28..].copy_from_slice(&digest.to_array());
    let eth_digest = keccak256(prefixed);

    match EcdsaKey::recover_from_prehash(eth_digest.as_slice(), &sig, recovery_id) {
        Ok(recovered) => recovered.to_encoded_point(false).as_bytes() == pubkey.to_array().as_slice(),
        Err(_) => false,
    }
}

// message_digest is the digest every party signs: sha256 over the exact payload.
pub fn message_digest(env: &Env, payload: &Bytes) -> BytesN<32> {
    env.crypto().sha256(payload)
}

// authorize checks that payload was signed by key.
pub fn authorize(env: &Env, key: &PartyKey, payload: &Bytes, signature: &Bytes) -> Result<(), Error> {
    if !key.verify(&message_digest(env, payload), signature) {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}
