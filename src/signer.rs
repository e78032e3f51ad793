// Bitcoin Dev Kit
// Written in 2020 by Alekos Filini <alekos.filini@gmail.com>
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Interface between partially signed transactions and signers
//!
//! This module does not produce signatures. It defines [`SignatureData`], the record a
//! signer works on, projected out of a PSBT input with
//! [`signature_data`](crate::psbt::Input::signature_data) and written back with
//! [`update_from_signature_data`](crate::psbt::Input::update_from_signature_data), and
//! the [`KeyProvider`] contract signers use to look up scripts and keys.

use std::collections::BTreeMap;

use bitcoin::hashes::Hash;
use bitcoin::{PrivateKey, PublicKey, PubkeyHash, Script, ScriptHash};

use crate::psbt::{Input, SigPair};

/// The signing-relevant subset of one transaction input.
///
/// A signer fills this record in place; multiple records for the same input, coming
/// from different signers, can be combined with [`merge`](Self::merge).
#[derive(Debug, Clone, Default)]
pub struct SignatureData {
    /// Whether `script_sig` and `script_witness` are complete
    pub complete: bool,
    /// Whether the input being signed is a witness input
    pub witness: bool,
    /// The script-sig of the input; complete signatures only when `complete` is set
    pub script_sig: Script,
    /// The redeem script, if any, for the input
    pub redeem_script: Script,
    /// The witness script, if any, for the input
    pub witness_script: Script,
    /// The witness stack of the input; complete signatures only when `complete` is set
    pub script_witness: Vec<Vec<u8>>,
    /// Partial signatures keyed by the hash of the signing key
    pub signatures: BTreeMap<PubkeyHash, SigPair>,
    /// Public keys a signer may need that are not bound to a signature yet
    pub misc_pubkeys: BTreeMap<PubkeyHash, PublicKey>,
}

impl SignatureData {
    /// Fold another record for the same input into this one.
    ///
    /// Complete data always wins; otherwise scripts fill gaps and signatures
    /// accumulate.
    pub fn merge(&mut self, other: SignatureData) {
        if self.complete {
            return;
        }
        if other.complete {
            *self = other;
            return;
        }
        if self.redeem_script.is_empty() && !other.redeem_script.is_empty() {
            self.redeem_script = other.redeem_script;
        }
        if self.witness_script.is_empty() && !other.witness_script.is_empty() {
            self.witness_script = other.witness_script;
        }
        self.signatures.extend(other.signatures);
        self.misc_pubkeys.extend(other.misc_pubkeys);
    }
}

impl Input {
    /// Project the signing-relevant fields of this input into a [`SignatureData`].
    ///
    /// A finalized input projects only its final scripts, marked complete; anything
    /// else a signer would need is already baked into them.
    pub fn signature_data(&self) -> SignatureData {
        let mut sigdata = SignatureData::default();

        if let Some(ref script) = self.final_script_sig {
            sigdata.script_sig = script.clone();
            sigdata.complete = true;
        }
        if let Some(ref witness) = self.final_script_witness {
            sigdata.script_witness = witness.clone();
            sigdata.witness = true;
            sigdata.complete = true;
        }
        if sigdata.complete {
            return sigdata;
        }

        for (key_id, sig_pair) in &self.partial_sigs {
            sigdata.signatures.insert(*key_id, sig_pair.clone());
        }
        if let Some(ref script) = self.redeem_script {
            sigdata.redeem_script = script.clone();
        }
        if let Some(ref script) = self.witness_script {
            sigdata.witness_script = script.clone();
        }
        for pubkey in self.hd_keypaths.keys() {
            sigdata
                .misc_pubkeys
                .insert(PubkeyHash::hash(&pubkey.to_bytes()), *pubkey);
        }

        sigdata
    }

    /// Write a [`SignatureData`] produced by a signer back into this input.
    ///
    /// Complete data finalizes the input: the final scripts are stored and the
    /// intermediate signing metadata they supersede is dropped. Otherwise the record's
    /// signatures are folded in and its scripts fill gaps.
    pub fn update_from_signature_data(&mut self, sigdata: &SignatureData) {
        if sigdata.complete {
            self.partial_sigs.clear();
            self.hd_keypaths.clear();
            self.redeem_script = None;
            self.witness_script = None;
            self.sighash_type = 0;

            if !sigdata.script_sig.is_empty() {
                self.final_script_sig = Some(sigdata.script_sig.clone());
            }
            if !sigdata.script_witness.is_empty() {
                self.final_script_witness = Some(sigdata.script_witness.clone());
            }
            return;
        }

        for (key_id, sig_pair) in &sigdata.signatures {
            self.partial_sigs.insert(*key_id, sig_pair.clone());
        }
        if self.redeem_script.is_none() && !sigdata.redeem_script.is_empty() {
            self.redeem_script = Some(sigdata.redeem_script.clone());
        }
        if self.witness_script.is_none() && !sigdata.witness_script.is_empty() {
            self.witness_script = Some(sigdata.witness_script.clone());
        }
    }
}

/// An interface to be implemented by key stores that support signing.
///
/// Accepted by signing collaborators together with a [`SignatureData`]; declared here
/// so the codec and the signers agree on the lookup surface, not implemented by this
/// library beyond the [`DummyKeyProvider`].
pub trait KeyProvider {
    /// Return the script with the given hash, if known
    fn get_script(&self, script_id: &ScriptHash) -> Option<Script>;
    /// Return the public key with the given hash, if known
    fn get_pubkey(&self, key_id: &PubkeyHash) -> Option<PublicKey>;
    /// Return the private key for the given key hash, if known
    fn get_key(&self, key_id: &PubkeyHash) -> Option<PrivateKey>;
}

/// A [`KeyProvider`] that knows no scripts and no keys
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyKeyProvider;

impl KeyProvider for DummyKeyProvider {
    fn get_script(&self, _script_id: &ScriptHash) -> Option<Script> {
        None
    }

    fn get_pubkey(&self, _key_id: &PubkeyHash) -> Option<PublicKey> {
        None
    }

    fn get_key(&self, _key_id: &PubkeyHash) -> Option<PrivateKey> {
        None
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use bitcoin::hashes::Hash;
    use bitcoin::{PublicKey, PubkeyHash, Script};

    use super::*;
    use crate::psbt::Input;

    const PK: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn signed_input() -> (Input, PubkeyHash) {
        let pk = PublicKey::from_str(PK).unwrap();
        let key_id = PubkeyHash::hash(&pk.to_bytes());

        let mut input = Input::default();
        input.partial_sigs.insert(key_id, (pk, vec![0x30, 0x01]));
        input.redeem_script = Some(Script::from(vec![0x51]));
        input.hd_keypaths.insert(pk, vec![0, 1]);
        input.sighash_type = 1;
        (input, key_id)
    }

    #[test]
    fn test_signature_data_projects_partial_state() {
        let (input, key_id) = signed_input();
        let sigdata = input.signature_data();

        assert!(!sigdata.complete);
        assert_eq!(sigdata.signatures.len(), 1);
        assert!(sigdata.signatures.contains_key(&key_id));
        assert_eq!(sigdata.redeem_script, Script::from(vec![0x51]));
        assert!(sigdata.witness_script.is_empty());
        assert!(sigdata.misc_pubkeys.contains_key(&key_id));
    }

    #[test]
    fn test_signature_data_of_final_input_is_complete() {
        let (mut input, _) = signed_input();
        input.final_script_sig = Some(Script::from(vec![0x52]));

        let sigdata = input.signature_data();

        assert!(sigdata.complete);
        assert_eq!(sigdata.script_sig, Script::from(vec![0x52]));
        // Everything a signer would need is baked into the final script
        assert!(sigdata.signatures.is_empty());
        assert!(sigdata.redeem_script.is_empty());
    }

    #[test]
    fn test_update_with_complete_data_finalizes() {
        let (mut input, _) = signed_input();

        let mut sigdata = SignatureData::default();
        sigdata.complete = true;
        sigdata.witness = true;
        sigdata.script_sig = Script::from(vec![0x53]);
        sigdata.script_witness = vec![vec![0x01]];

        input.update_from_signature_data(&sigdata);

        assert_eq!(input.final_script_sig, Some(Script::from(vec![0x53])));
        assert_eq!(input.final_script_witness, Some(vec![vec![0x01]]));
        assert!(input.partial_sigs.is_empty());
        assert!(input.hd_keypaths.is_empty());
        assert!(input.redeem_script.is_none());
        assert_eq!(input.sighash_type, 0);
    }

    #[test]
    fn test_update_with_partial_data_accumulates() {
        let pk = PublicKey::from_str(PK).unwrap();
        let key_id = PubkeyHash::hash(&pk.to_bytes());

        let mut input = Input::default();
        input.witness_script = Some(Script::from(vec![0x54]));

        let mut sigdata = SignatureData::default();
        sigdata.signatures.insert(key_id, (pk, vec![0x30, 0x02]));
        sigdata.witness_script = Script::from(vec![0x55]);
        sigdata.redeem_script = Script::from(vec![0x56]);

        input.update_from_signature_data(&sigdata);

        assert_eq!(input.partial_sigs.len(), 1);
        // Already-present scripts are kept, missing ones are filled
        assert_eq!(input.witness_script, Some(Script::from(vec![0x54])));
        assert_eq!(input.redeem_script, Some(Script::from(vec![0x56])));
    }

    #[test]
    fn test_merge_complete_wins() {
        let (input, _) = signed_input();
        let mut partial = input.signature_data();

        let mut complete = SignatureData::default();
        complete.complete = true;
        complete.script_sig = Script::from(vec![0x57]);

        partial.merge(complete);

        assert!(partial.complete);
        assert_eq!(partial.script_sig, Script::from(vec![0x57]));
    }

    #[test]
    fn test_merge_partial_accumulates() {
        let (input, key_id) = signed_input();
        let mut first = SignatureData::default();
        first.witness_script = Script::from(vec![0x58]);

        first.merge(input.signature_data());

        assert!(!first.complete);
        assert!(first.signatures.contains_key(&key_id));
        // The script already present is not overwritten
        assert_eq!(first.witness_script, Script::from(vec![0x58]));
        assert_eq!(first.redeem_script, Script::from(vec![0x51]));
    }

    #[test]
    fn test_dummy_key_provider_resolves_nothing() {
        let provider = DummyKeyProvider;
        let key_id = PubkeyHash::hash(&[0x00]);

        assert!(provider.get_pubkey(&key_id).is_none());
        assert!(provider.get_key(&key_id).is_none());
        assert!(provider
            .get_script(&bitcoin::ScriptHash::hash(&[0x00]))
            .is_none());
    }
}
