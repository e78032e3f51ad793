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

//! Bit-exact serialization of partially signed transactions.
//!
//! The format is `<magic> <global map> <input map>* <output map>*`, where every map is
//! a sequence of `<key length> <key> <value length> <value>` records closed by a single
//! zero byte, read as a zero-length key. The first byte of a key is the record type;
//! the remaining key bytes are type-specific key material, a serialized public key for
//! the keyed record types.

use bitcoin::consensus::encode::{deserialize_partial, serialize as consensus_serialize, Decodable};
use bitcoin::{PublicKey, PubkeyHash, Script, Transaction, TxOut};

use bitcoin::hashes::Hash;

use indexmap::IndexMap;

use crate::error::Error;
use crate::psbt::encode::{write_compact_size, write_u32, Cursor, MAX_PAYLOAD_SIZE};
use crate::psbt::{Input, Output, PartiallySignedTransaction};

const PSBT_MAGIC: [u8; 4] = [0x70, 0x73, 0x62, 0x74]; // "psbt"
const PSBT_MAGIC_SEPARATOR: u8 = 0xFF;

// Global types
const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;

// Input types
const PSBT_IN_NON_WITNESS_UTXO: u8 = 0x00;
const PSBT_IN_WITNESS_UTXO: u8 = 0x01;
const PSBT_IN_PARTIAL_SIG: u8 = 0x02;
const PSBT_IN_SIGHASH: u8 = 0x03;
const PSBT_IN_REDEEM_SCRIPT: u8 = 0x04;
const PSBT_IN_WITNESS_SCRIPT: u8 = 0x05;
const PSBT_IN_BIP32_DERIVATION: u8 = 0x06;
const PSBT_IN_FINAL_SCRIPT_SIG: u8 = 0x07;
const PSBT_IN_FINAL_SCRIPT_WITNESS: u8 = 0x08;

// Output types
const PSBT_OUT_REDEEM_SCRIPT: u8 = 0x00;
const PSBT_OUT_WITNESS_SCRIPT: u8 = 0x01;
const PSBT_OUT_BIP32_DERIVATION: u8 = 0x02;

// A separator is read as a key of length zero, which real keys can never have
const PSBT_SEPARATOR: u8 = 0x00;

impl PartiallySignedTransaction {
    /// Serialize to the binary interchange format.
    ///
    /// The recognized fields of every map are emitted in type-tag order, keyed maps in
    /// their iteration order and unrecognized fields in insertion order, so encoding
    /// the result of [`deserialize`](Self::deserialize) reproduces the input bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PSBT_MAGIC);
        buf.push(PSBT_MAGIC_SEPARATOR);

        write_record(
            &mut buf,
            PSBT_GLOBAL_UNSIGNED_TX,
            &[],
            &consensus_serialize(&self.unsigned_tx),
        );
        for (key, value) in &self.unknown {
            write_raw_record(&mut buf, key, value);
        }
        buf.push(PSBT_SEPARATOR);

        for input in &self.inputs {
            serialize_input(&mut buf, input);
        }
        for output in &self.outputs {
            serialize_output(&mut buf, output);
        }

        buf
    }

    /// Deserialize from the binary interchange format.
    ///
    /// Any malformed, duplicated or inconsistent record aborts the decode with an
    /// [`Error`]; no partial value is ever returned.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 5 || bytes[0..4] != PSBT_MAGIC[..] || bytes[4] != PSBT_MAGIC_SEPARATOR {
            return Err(Error::InvalidMagic);
        }
        let mut cursor = Cursor::new(&bytes[5..]);

        // Global section
        let mut unsigned_tx: Option<Transaction> = None;
        let mut unknown = IndexMap::new();
        while !cursor.is_empty() {
            let key = match read_key(&mut cursor)? {
                Some(key) => key,
                None => break,
            };

            match key[0] {
                PSBT_GLOBAL_UNSIGNED_TX => {
                    expect_key_len(&key, 1)?;
                    if unsigned_tx.is_some() {
                        return Err(Error::DuplicateKey(key));
                    }
                    let tx: Transaction = decode_value(&read_value(&mut cursor)?)?;
                    for txin in &tx.input {
                        if !txin.script_sig.is_empty() || !txin.witness.is_empty() {
                            return Err(Error::UnsignedTxNotEmpty);
                        }
                    }
                    unsigned_tx = Some(tx);
                }
                _ => {
                    log::trace!("unknown global key {:02x?}", key);
                    if unknown.contains_key(&key) {
                        return Err(Error::DuplicateKey(key));
                    }
                    let value = read_value(&mut cursor)?;
                    unknown.insert(key, value);
                }
            }
        }

        let unsigned_tx = unsigned_tx.ok_or(Error::MissingUnsignedTx)?;

        // One record stream per input of the unsigned transaction
        let mut inputs = Vec::with_capacity(unsigned_tx.input.len());
        while !cursor.is_empty() && inputs.len() < unsigned_tx.input.len() {
            let input = deserialize_input(&mut cursor)?;

            if let Some(ref prev_tx) = input.non_witness_utxo {
                let outpoint = &unsigned_tx.input[inputs.len()].previous_output;
                if prev_tx.txid() != outpoint.txid {
                    return Err(Error::UtxoMismatch);
                }
            }

            inputs.push(input);
        }
        if inputs.len() != unsigned_tx.input.len() {
            return Err(Error::InputOutputCountMismatch);
        }

        // One record stream per output
        let mut outputs = Vec::with_capacity(unsigned_tx.output.len());
        while !cursor.is_empty() && outputs.len() < unsigned_tx.output.len() {
            outputs.push(deserialize_output(&mut cursor)?);
        }
        if outputs.len() != unsigned_tx.output.len() {
            return Err(Error::InputOutputCountMismatch);
        }

        Ok(PartiallySignedTransaction {
            unsigned_tx,
            inputs,
            outputs,
            unknown,
        })
    }
}

fn serialize_input(buf: &mut Vec<u8>, input: &Input) {
    // At most one UTXO record; the full previous transaction wins when both forms are
    // populated in memory
    if let Some(ref prev_tx) = input.non_witness_utxo {
        write_record(
            buf,
            PSBT_IN_NON_WITNESS_UTXO,
            &[],
            &consensus_serialize(prev_tx),
        );
    } else if let Some(ref utxo) = input.witness_utxo {
        write_record(buf, PSBT_IN_WITNESS_UTXO, &[], &consensus_serialize(utxo));
    }

    // A finalized input no longer needs the metadata that produced its final scripts
    if !input.is_final() {
        for (_, (pubkey, sig)) in &input.partial_sigs {
            write_record(buf, PSBT_IN_PARTIAL_SIG, &pubkey.to_bytes(), sig);
        }

        if input.sighash_type > 0 {
            let mut value = Vec::with_capacity(4);
            write_u32(&mut value, input.sighash_type);
            write_record(buf, PSBT_IN_SIGHASH, &[], &value);
        }

        if let Some(ref script) = input.redeem_script {
            write_record(buf, PSBT_IN_REDEEM_SCRIPT, &[], script.as_bytes());
        }
        if let Some(ref script) = input.witness_script {
            write_record(buf, PSBT_IN_WITNESS_SCRIPT, &[], script.as_bytes());
        }

        for (pubkey, path) in &input.hd_keypaths {
            write_record(
                buf,
                PSBT_IN_BIP32_DERIVATION,
                &pubkey.to_bytes(),
                &keypath_value(path),
            );
        }
    }

    if let Some(ref script) = input.final_script_sig {
        write_record(buf, PSBT_IN_FINAL_SCRIPT_SIG, &[], script.as_bytes());
    }
    if let Some(ref witness) = input.final_script_witness {
        write_record(
            buf,
            PSBT_IN_FINAL_SCRIPT_WITNESS,
            &[],
            &consensus_serialize(witness),
        );
    }

    for (key, value) in &input.unknown {
        write_raw_record(buf, key, value);
    }

    buf.push(PSBT_SEPARATOR);
}

fn serialize_output(buf: &mut Vec<u8>, output: &Output) {
    if let Some(ref script) = output.redeem_script {
        write_record(buf, PSBT_OUT_REDEEM_SCRIPT, &[], script.as_bytes());
    }
    if let Some(ref script) = output.witness_script {
        write_record(buf, PSBT_OUT_WITNESS_SCRIPT, &[], script.as_bytes());
    }

    for (pubkey, path) in &output.hd_keypaths {
        write_record(
            buf,
            PSBT_OUT_BIP32_DERIVATION,
            &pubkey.to_bytes(),
            &keypath_value(path),
        );
    }

    for (key, value) in &output.unknown {
        write_raw_record(buf, key, value);
    }

    buf.push(PSBT_SEPARATOR);
}

fn deserialize_input(cursor: &mut Cursor) -> Result<Input, Error> {
    let mut input = Input::default();

    while !cursor.is_empty() {
        let key = match read_key(cursor)? {
            Some(key) => key,
            None => break,
        };

        match key[0] {
            PSBT_IN_NON_WITNESS_UTXO => {
                expect_key_len(&key, 1)?;
                if input.non_witness_utxo.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                input.non_witness_utxo = Some(decode_value(&read_value(cursor)?)?);
            }
            PSBT_IN_WITNESS_UTXO => {
                expect_key_len(&key, 1)?;
                if input.witness_utxo.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                let utxo: TxOut = decode_value(&read_value(cursor)?)?;
                input.witness_utxo = Some(utxo);
            }
            PSBT_IN_PARTIAL_SIG => {
                let pubkey = pubkey_from_key(&key)?;
                let key_id = PubkeyHash::hash(&pubkey.to_bytes());
                if input.partial_sigs.contains_key(&key_id) {
                    return Err(Error::DuplicateKey(key));
                }
                let sig = read_value(cursor)?;
                input.partial_sigs.insert(key_id, (pubkey, sig));
            }
            PSBT_IN_SIGHASH => {
                expect_key_len(&key, 1)?;
                if input.sighash_type > 0 {
                    return Err(Error::DuplicateKey(key));
                }
                let value = read_value(cursor)?;
                if value.len() != 4 {
                    return Err(Error::SizeMismatch);
                }
                input.sighash_type = Cursor::new(&value).read_u32()?;
            }
            PSBT_IN_REDEEM_SCRIPT => {
                expect_key_len(&key, 1)?;
                if input.redeem_script.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                input.redeem_script = Some(Script::from(read_value(cursor)?));
            }
            PSBT_IN_WITNESS_SCRIPT => {
                expect_key_len(&key, 1)?;
                if input.witness_script.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                input.witness_script = Some(Script::from(read_value(cursor)?));
            }
            PSBT_IN_BIP32_DERIVATION => {
                let pubkey = pubkey_from_key(&key)?;
                if input.hd_keypaths.contains_key(&pubkey) {
                    return Err(Error::DuplicateKey(key));
                }
                let path = read_keypath_value(cursor)?;
                input.hd_keypaths.insert(pubkey, path);
            }
            PSBT_IN_FINAL_SCRIPT_SIG => {
                expect_key_len(&key, 1)?;
                if input.final_script_sig.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                input.final_script_sig = Some(Script::from(read_value(cursor)?));
            }
            PSBT_IN_FINAL_SCRIPT_WITNESS => {
                expect_key_len(&key, 1)?;
                if input.final_script_witness.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                let witness: Vec<Vec<u8>> = decode_value(&read_value(cursor)?)?;
                input.final_script_witness = Some(witness);
            }
            _ => {
                if input.unknown.contains_key(&key) {
                    return Err(Error::DuplicateKey(key));
                }
                let value = read_value(cursor)?;
                input.unknown.insert(key, value);
            }
        }
    }

    Ok(input)
}

fn deserialize_output(cursor: &mut Cursor) -> Result<Output, Error> {
    let mut output = Output::default();

    while !cursor.is_empty() {
        let key = match read_key(cursor)? {
            Some(key) => key,
            None => break,
        };

        match key[0] {
            PSBT_OUT_REDEEM_SCRIPT => {
                expect_key_len(&key, 1)?;
                if output.redeem_script.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                output.redeem_script = Some(Script::from(read_value(cursor)?));
            }
            PSBT_OUT_WITNESS_SCRIPT => {
                expect_key_len(&key, 1)?;
                if output.witness_script.is_some() {
                    return Err(Error::DuplicateKey(key));
                }
                output.witness_script = Some(Script::from(read_value(cursor)?));
            }
            PSBT_OUT_BIP32_DERIVATION => {
                let pubkey = pubkey_from_key(&key)?;
                if output.hd_keypaths.contains_key(&pubkey) {
                    return Err(Error::DuplicateKey(key));
                }
                let path = read_keypath_value(cursor)?;
                output.hd_keypaths.insert(pubkey, path);
            }
            _ => {
                if output.unknown.contains_key(&key) {
                    return Err(Error::DuplicateKey(key));
                }
                let value = read_value(cursor)?;
                output.unknown.insert(key, value);
            }
        }
    }

    Ok(output)
}

/// Read the key of the next record, or `None` when the record is a separator
fn read_key(cursor: &mut Cursor) -> Result<Option<Vec<u8>>, Error> {
    let key_len = cursor.read_compact_size(MAX_PAYLOAD_SIZE)?;
    if key_len == 0 {
        return Ok(None);
    }
    Ok(Some(cursor.read_bytes(key_len)?.to_vec()))
}

fn read_value(cursor: &mut Cursor) -> Result<Vec<u8>, Error> {
    let value_len = cursor.read_compact_size(MAX_PAYLOAD_SIZE)?;
    Ok(cursor.read_bytes(value_len)?.to_vec())
}

// Consensus-decode an embedded payload, requiring it to fill its value exactly
fn decode_value<T: Decodable>(bytes: &[u8]) -> Result<T, Error> {
    let (value, consumed) = deserialize_partial::<T>(bytes)?;
    if consumed != bytes.len() {
        return Err(Error::SizeMismatch);
    }
    Ok(value)
}

fn expect_key_len(key: &[u8], len: usize) -> Result<(), Error> {
    if key.len() != len {
        return Err(Error::SizeMismatch);
    }
    Ok(())
}

fn pubkey_from_key(key: &[u8]) -> Result<PublicKey, Error> {
    // Type byte plus either a compressed (33 bytes) or uncompressed (65 bytes) pubkey
    if key.len() != 34 && key.len() != 66 {
        return Err(Error::InvalidPubkey);
    }
    PublicKey::from_slice(&key[1..]).map_err(|_| Error::InvalidPubkey)
}

fn read_keypath_value(cursor: &mut Cursor) -> Result<Vec<u32>, Error> {
    let value = read_value(cursor)?;
    if value.len() % 4 != 0 {
        return Err(Error::MalformedKeypath);
    }

    let mut value_cursor = Cursor::new(&value);
    let mut path = Vec::with_capacity(value.len() / 4);
    while !value_cursor.is_empty() {
        path.push(value_cursor.read_u32()?);
    }
    Ok(path)
}

fn keypath_value(path: &[u32]) -> Vec<u8> {
    let mut value = Vec::with_capacity(path.len() * 4);
    for index in path {
        write_u32(&mut value, *index);
    }
    value
}

fn write_record(buf: &mut Vec<u8>, type_tag: u8, key_data: &[u8], value: &[u8]) {
    write_compact_size(buf, 1 + key_data.len() as u64);
    buf.push(type_tag);
    buf.extend_from_slice(key_data);
    write_compact_size(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

fn write_raw_record(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    write_compact_size(buf, key.len() as u64);
    buf.extend_from_slice(key);
    write_compact_size(buf, value.len() as u64);
    buf.extend_from_slice(value);
}
