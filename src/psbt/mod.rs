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

//! Partially signed transactions
//!
//! A [`PartiallySignedTransaction`] wraps an unsigned transaction together with the
//! metadata every participant of the signing pipeline needs: referenced UTXOs, scripts,
//! BIP32 derivation hints and partial signatures. The container is created from an
//! unsigned transaction with [`from_unsigned_tx`], mutated by updaters and signers, and
//! moved between them as bytes through [`serialize`] and [`deserialize`].
//!
//! Unrecognized fields survive a round-trip verbatim, so a wallet built against this
//! module can safely relay transactions carrying extensions it does not understand.
//!
//! [`from_unsigned_tx`]: PartiallySignedTransaction::from_unsigned_tx
//! [`serialize`]: PartiallySignedTransaction::serialize
//! [`deserialize`]: PartiallySignedTransaction::deserialize

pub(crate) mod encode;
mod serialize;

use std::collections::BTreeMap;

use indexmap::IndexMap;

use bitcoin::{PublicKey, PubkeyHash, Script, Transaction, TxOut};

use crate::error::Error;

/// A public key with the raw signature bytes it produced
pub type SigPair = (PublicKey, Vec<u8>);

/// Map of public keys to the BIP32 derivation that produced them; the leading index is
/// conventionally the fingerprint of the master key, which this module carries opaquely
pub type HdKeypaths = BTreeMap<PublicKey, Vec<u32>>;

/// A partially signed transaction
#[derive(Debug, Clone)]
pub struct PartiallySignedTransaction {
    /// The transaction being signed; each of its inputs has an empty script-sig and an
    /// empty witness at all times, signatures accumulate in [`inputs`](Self::inputs)
    pub unsigned_tx: Transaction,
    /// One entry per input of `unsigned_tx`
    pub inputs: Vec<Input>,
    /// One entry per output of `unsigned_tx`
    pub outputs: Vec<Output>,
    /// Global key-value pairs this library does not recognize, preserved verbatim and
    /// re-emitted in insertion order
    pub unknown: IndexMap<Vec<u8>, Vec<u8>>,
}

/// The metadata accumulated for one input of a partially signed transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    /// The full transaction paying the UTXO being spent; mutually exclusive with
    /// `witness_utxo` on the wire, preferred over it when both are present in memory
    pub non_witness_utxo: Option<Transaction>,
    /// The single output being spent, sufficient for segwit spends
    pub witness_utxo: Option<TxOut>,
    /// Signatures collected for this input so far, keyed by the hash of the signing key
    pub partial_sigs: BTreeMap<PubkeyHash, SigPair>,
    /// The sighash type to sign with; zero when unset
    pub sighash_type: u32,
    /// The redeem script, for P2SH spends
    pub redeem_script: Option<Script>,
    /// The witness script, for P2WSH spends
    pub witness_script: Option<Script>,
    /// Derivation hints for the keys able to sign this input
    pub hd_keypaths: HdKeypaths,
    /// The fully assembled script-sig; its presence marks the input as finalized
    pub final_script_sig: Option<Script>,
    /// The fully assembled witness stack; its presence marks the input as finalized
    pub final_script_witness: Option<Vec<Vec<u8>>>,
    /// Unrecognized key-value pairs, preserved verbatim in insertion order
    pub unknown: IndexMap<Vec<u8>, Vec<u8>>,
}

/// The metadata accumulated for one output of a partially signed transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    /// The redeem script of this output, when paying to P2SH
    pub redeem_script: Option<Script>,
    /// The witness script of this output, when paying to P2WSH
    pub witness_script: Option<Script>,
    /// Derivation hints for the keys this output pays to
    pub hd_keypaths: HdKeypaths,
    /// Unrecognized key-value pairs, preserved verbatim in insertion order
    pub unknown: IndexMap<Vec<u8>, Vec<u8>>,
}

impl PartiallySignedTransaction {
    /// Create a [`PartiallySignedTransaction`] from an unsigned transaction, the
    /// creator role of the signing pipeline.
    ///
    /// ## Errors
    ///
    /// [`Error::UnsignedTxNotEmpty`] if any input of the transaction already carries a
    /// script-sig or a witness.
    pub fn from_unsigned_tx(tx: Transaction) -> Result<Self, Error> {
        for txin in &tx.input {
            if !txin.script_sig.is_empty() || !txin.witness.is_empty() {
                return Err(Error::UnsignedTxNotEmpty);
            }
        }

        Ok(PartiallySignedTransaction {
            inputs: vec![Input::default(); tx.input.len()],
            outputs: vec![Output::default(); tx.output.len()],
            unknown: IndexMap::new(),
            unsigned_tx: tx,
        })
    }
}

// Two PSBTs are the same PSBT when they describe the same transaction, whatever
// metadata each copy has accumulated
impl PartialEq for PartiallySignedTransaction {
    fn eq(&self, other: &PartiallySignedTransaction) -> bool {
        self.unsigned_tx.txid() == other.unsigned_tx.txid()
    }
}

impl Eq for PartiallySignedTransaction {}

impl Input {
    /// Whether a final script-sig or witness has been produced for this input.
    ///
    /// Finalized inputs serialize only their UTXO reference, their final scripts and
    /// their unrecognized fields; the intermediate signing metadata stays in memory but
    /// is omitted from the encoding.
    pub fn is_final(&self) -> bool {
        self.final_script_sig.is_some() || self.final_script_witness.is_some()
    }
}

#[cfg(test)]
mod test {
    use bitcoin::{OutPoint, Script, Transaction, TxIn, TxOut};

    use super::*;

    fn unsigned_tx() -> Transaction {
        Transaction {
            version: 2,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: Script::new(),
                sequence: 0xFFFF_FFFF,
                witness: vec![],
            }],
            output: vec![
                TxOut {
                    value: 99_000,
                    script_pubkey: Script::new(),
                },
                TxOut {
                    value: 1_000,
                    script_pubkey: Script::new(),
                },
            ],
        }
    }

    #[test]
    fn test_from_unsigned_tx_seeds_parallel_metadata() {
        let psbt = PartiallySignedTransaction::from_unsigned_tx(unsigned_tx()).unwrap();

        assert_eq!(psbt.inputs.len(), 1);
        assert_eq!(psbt.outputs.len(), 2);
        assert_eq!(psbt.inputs[0], Input::default());
    }

    #[test]
    fn test_from_unsigned_tx_rejects_script_sig() {
        let mut tx = unsigned_tx();
        tx.input[0].script_sig = Script::from(vec![0x51]);

        assert!(matches!(
            PartiallySignedTransaction::from_unsigned_tx(tx),
            Err(Error::UnsignedTxNotEmpty)
        ));
    }

    #[test]
    fn test_from_unsigned_tx_rejects_witness() {
        let mut tx = unsigned_tx();
        tx.input[0].witness = vec![vec![0x01]];

        assert!(matches!(
            PartiallySignedTransaction::from_unsigned_tx(tx),
            Err(Error::UnsignedTxNotEmpty)
        ));
    }

    #[test]
    fn test_equality_is_by_txid() {
        let a = PartiallySignedTransaction::from_unsigned_tx(unsigned_tx()).unwrap();
        let mut b = a.clone();
        b.inputs[0].sighash_type = 1;
        b.unknown.insert(vec![0x99], vec![0x01]);

        let mut tx = unsigned_tx();
        tx.output[0].value = 98_000;
        let c = PartiallySignedTransaction::from_unsigned_tx(tx).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_is_final() {
        let mut input = Input::default();
        assert!(!input.is_final());

        input.final_script_sig = Some(Script::from(vec![0x51]));
        assert!(input.is_final());

        let mut input = Input::default();
        input.final_script_witness = Some(vec![vec![0x01]]);
        assert!(input.is_final());
    }
}
