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

//! A library with the two spending-side building blocks of a Bitcoin wallet:
//! fee-aware coin selection and a [BIP174] partially signed transaction codec.
//!
//! The [`coin_selection`] module picks a subset of unspent outputs covering a
//! payment amount, either exactly (branch and bound, minimizing a waste
//! metric) or approximately (stochastic knapsack). The [`psbt`] module
//! serializes and deserializes partially signed transactions bit-exactly,
//! rejecting malformed or inconsistent streams, so that the result can be
//! passed between wallets, signers and combiners.
//!
//! Transaction construction policy, script interpretation and network access
//! are out of scope: callers hand in candidate [`Coin`]s and unsigned
//! transactions, and get back selections and byte streams.
//!
//! [BIP174]: https://github.com/bitcoin/bips/blob/master/bip-0174.mediawiki

// only enables the `doc_cfg` feature when
// the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]

pub extern crate bitcoin;
extern crate log;
extern crate serde;

pub mod coin_selection;
pub(crate) mod error;
pub mod psbt;
pub mod signer;
pub(crate) mod types;

pub use error::Error;
pub use psbt::PartiallySignedTransaction;
pub use types::*;
