// Copyright 2024 - See NOTICE file for copyright holders.
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
#![cfg(test)]

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Ethereum-style signer for channel parties holding a secp256k1 key.
pub struct EthSigner {
    skey: SigningKey,
    pubkey: VerifyingKey,
}

impl EthSigner {
    pub fn random() -> Self {
        let skey = SigningKey::random(&mut rand::thread_rng());
        let pubkey = *skey.verifying_key();
        Self { skey, pubkey }
    }

    /// Uncompressed public key (0x04 || x || y).
    pub fn pubkey(&self) -> [u8; 65] {
        self.pubkey
            .to_encoded_point(false)
            .as_bytes()
            .try_into()
            .unwrap()
    }

    /// Signs the Ethereum signed-message hash of digest and returns r || s || v.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> [u8; 65] {
        let hash = eth_signed_msg_hash(digest);
        // sign_prehash only returns r || s
        let sig: K256Signature = self.skey.sign_prehash(&hash).unwrap();

        let mut sig_bytes = [0u8; 65];
        sig_bytes[..64].copy_from_slice(&sig.to_bytes());
        // Ethereum requires v = rec_id + 27.
        sig_bytes[64] = self.recovery_id(&hash, &sig) + 27;
        sig_bytes
    }

    fn recovery_id(&self, hash: &[u8; 32], sig: &K256Signature) -> u8 {
        let rec_0 = VerifyingKey::recover_from_prehash(hash, sig, RecoveryId::new(false, false));
        let rec_1 = VerifyingKey::recover_from_prehash(hash, sig, RecoveryId::new(true, false));
        match (rec_0, rec_1) {
            (Ok(pubkey), _) if pubkey == self.pubkey => 0,
            (_, Ok(pubkey)) if pubkey == self.pubkey => 1,
            _ => panic!("failed to recover public key"),
        }
    }
}

fn eth_signed_msg_hash(digest: &[u8; 32]) -> [u8; 32] {
    // Packed encoding => We can't use the serializer
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(digest);
    hasher.finalize().into()
}
