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

use std::hash::{Hash, Hasher};

use bitcoin::blockdata::transaction::{OutPoint, TxOut};

use serde::{Deserialize, Serialize};

// Base weight of a TxIn, not counting the weight needed for satisfying it.
// prev_txid (32 bytes) + prev_vout (4 bytes) + sequence (4 bytes) + script_len (1 bytes)
pub(crate) const TXIN_BASE_WEIGHT: usize = (32 + 4 + 4 + 1) * 4;

/// Fee rate
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
// Internally stored as satoshi/vbyte
pub struct FeeRate(f32);

impl FeeRate {
    /// Create a new instance of [`FeeRate`] given a float fee rate in btc/kvbytes
    pub fn from_btc_per_kvb(btc_per_kvb: f32) -> Self {
        FeeRate(btc_per_kvb * 1e5)
    }

    /// Create a new instance of [`FeeRate`] given a float fee rate in satoshi/vbyte
    pub const fn from_sat_per_vb(sat_per_vb: f32) -> Self {
        FeeRate(sat_per_vb)
    }

    /// Create a new [`FeeRate`] with the default min relay fee value
    pub const fn default_min_relay_fee() -> Self {
        FeeRate(1.0)
    }

    /// Return the value as satoshi/vbyte
    pub fn as_sat_vb(&self) -> f32 {
        self.0
    }

    /// Calculate absolute fee in Satoshis using size in virtual bytes.
    pub fn fee_vb(&self, vbytes: usize) -> u64 {
        (self.as_sat_vb() * vbytes as f32).ceil() as u64
    }
}

impl std::default::Default for FeeRate {
    fn default() -> Self {
        FeeRate::default_min_relay_fee()
    }
}

/// A candidate transaction input considered by the coin selection algorithms.
///
/// A coin carries the fee needed to spend it at the current fee rate together
/// with the fee it would cost at the wallet's long-term expected fee rate; the
/// difference between the two is the per-input component of the waste metric
/// minimized by branch-and-bound selection.
///
/// Two coins compare equal when they reference the same outpoint, regardless
/// of the attached fee figures.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Coin {
    /// Reference to the unspent output this coin would spend
    pub outpoint: OutPoint,
    /// The unspent output itself
    pub txout: TxOut,
    /// Fee in satoshi needed to spend this input at the current fee rate
    pub fee: u64,
    /// Fee in satoshi needed to spend this input at the long-term fee rate
    pub long_term_fee: u64,
}

impl Coin {
    /// Create a new [`Coin`] with explicit spending fees
    pub fn new(outpoint: OutPoint, txout: TxOut, fee: u64, long_term_fee: u64) -> Self {
        Coin {
            outpoint,
            txout,
            fee,
            long_term_fee,
        }
    }

    /// Create a new [`Coin`], deriving its spending fees from the weight needed
    /// to satisfy it, as described in `Descriptor::max_satisfaction_weight`
    pub fn from_weight(
        outpoint: OutPoint,
        txout: TxOut,
        satisfaction_weight: usize,
        fee_rate: FeeRate,
        long_term_fee_rate: FeeRate,
    ) -> Self {
        let vbytes = ((TXIN_BASE_WEIGHT + satisfaction_weight) as f32 / 4.0).ceil() as usize;
        Coin {
            outpoint,
            txout,
            fee: fee_rate.fee_vb(vbytes),
            long_term_fee: long_term_fee_rate.fee_vb(vbytes),
        }
    }

    /// The value of this coin minus the fee for spending it.
    ///
    /// Negative when the input costs more to spend than it provides; such
    /// coins must be filtered out before running branch-and-bound selection.
    pub fn effective_value(&self) -> i64 {
        self.txout.value as i64 - self.fee as i64
    }

    // Contribution of this input to the waste metric.
    pub(crate) fn fee_delta(&self) -> i64 {
        self.fee as i64 - self.long_term_fee as i64
    }
}

impl PartialEq for Coin {
    fn eq(&self, other: &Coin) -> bool {
        self.outpoint == other.outpoint
    }
}

impl Eq for Coin {}

impl Hash for Coin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.outpoint.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bitcoin::{OutPoint, Script, TxOut};

    use super::*;

    const P2WPKH_WITNESS_SIZE: usize = 73 + 33 + 2;

    fn testing_outpoint(vout: u32) -> OutPoint {
        let mut outpoint = OutPoint::from_str(
            "ebd9813ecebc57ff8f30797de7c205e3c7498ca950ea4341ee51a685ff2fa30a:0",
        )
        .unwrap();
        outpoint.vout = vout;
        outpoint
    }

    #[test]
    fn can_store_feerate_in_const() {
        const _MY_RATE: FeeRate = FeeRate::from_sat_per_vb(10.0);
        const _MIN_RELAY: FeeRate = FeeRate::default_min_relay_fee();
    }

    #[test]
    fn test_coin_effective_value() {
        let coin = Coin::new(
            testing_outpoint(0),
            TxOut {
                value: 100_000,
                script_pubkey: Script::new(),
            },
            68,
            34,
        );

        assert_eq!(coin.effective_value(), 99_932);
        assert_eq!(coin.fee_delta(), 34);
    }

    #[test]
    fn test_coin_from_weight() {
        let coin = Coin::from_weight(
            testing_outpoint(0),
            TxOut {
                value: 100_000,
                script_pubkey: Script::new(),
            },
            P2WPKH_WITNESS_SIZE,
            FeeRate::from_sat_per_vb(1.0),
            FeeRate::from_sat_per_vb(0.5),
        );

        // (164 + 108) / 4 = 68 vbytes
        assert_eq!(coin.fee, 68);
        assert_eq!(coin.long_term_fee, 34);
    }

    #[test]
    fn test_coin_equality_is_by_outpoint() {
        let a = Coin::new(
            testing_outpoint(0),
            TxOut {
                value: 100_000,
                script_pubkey: Script::new(),
            },
            68,
            34,
        );
        let mut b = a.clone();
        b.fee = 1_000;
        b.txout.value = 50_000;
        let mut c = a.clone();
        c.outpoint.vout = 1;

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
