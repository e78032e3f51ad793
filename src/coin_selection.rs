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

//! Coin selection
//!
//! This module provides the trait [`CoinSelectionAlgorithm`] that can be implemented to
//! define custom coin selection algorithms, along with the three algorithms shipped with
//! the library: [`BranchAndBoundCoinSelection`], [`KnapsackCoinSelection`] and
//! [`LargestFirstCoinSelection`].
//!
//! Selections always reference coins by outpoint, so callers stay decoupled from the
//! reordering an algorithm may apply to the pool it receives.
//!
//! ## Example
//!
//! ```
//! use bitcoin::{OutPoint, Script, TxOut};
//! use coinkit::coin_selection::{BranchAndBoundCoinSelection, CoinSelectionAlgorithm};
//! use coinkit::Coin;
//!
//! let pool: Vec<Coin> = (0..3)
//!     .map(|vout| {
//!         let mut outpoint = OutPoint::null();
//!         outpoint.vout = vout;
//!         Coin::new(
//!             outpoint,
//!             TxOut {
//!                 value: 50_000,
//!                 script_pubkey: Script::new(),
//!             },
//!             0,
//!             0,
//!         )
//!     })
//!     .collect();
//!
//! let result = BranchAndBoundCoinSelection::new(0, 0)
//!     .coin_select(pool, 100_000)
//!     .expect("two coins cover the target exactly");
//! assert_eq!(result.selected_amount, 100_000);
//! ```

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::types::Coin;

/// Maximum number of tree nodes the branch-and-bound search will visit before
/// giving up on the current pool
const BNB_TOTAL_TRIES: usize = 100_000;

// Upper bound for the waste of any selection, one satoshi above the money supply.
const MAX_MONEY: i64 = 21_000_000 * 100_000_000;

/// Threshold below which the knapsack algorithm considers a change amount too
/// small to be worth creating, in satoshi
pub const MIN_CHANGE: u64 = 1_000_000;

/// Result of a successful coin selection
#[derive(Debug, Clone)]
pub struct CoinSelectionResult {
    /// List of coins selected for use as inputs
    pub selected: Vec<Coin>,
    /// Sum of the selected coins' nominal value
    pub selected_amount: u64,
}

fn selection_result(selected: Vec<Coin>) -> CoinSelectionResult {
    let selected_amount = selected.iter().map(|coin| coin.txout.value).sum();
    CoinSelectionResult {
        selected,
        selected_amount,
    }
}

/// Trait for generalized coin selection algorithms
///
/// This trait can be implemented to plug a customized coin selection algorithm
/// into transaction building code.
///
/// Algorithms take the pool by value and may reorder it. A return value of
/// `None` means no subset of the pool can satisfy `target_value` under the
/// algorithm's rules; it is not an error condition.
pub trait CoinSelectionAlgorithm: std::fmt::Debug {
    /// Perform the coin selection
    ///
    /// - `utxo_pool`: the candidate coins to draw from
    /// - `target_value`: the amount in satoshi to select
    fn coin_select(&self, utxo_pool: Vec<Coin>, target_value: u64) -> Option<CoinSelectionResult>;
}

/// Simple and dumb coin selection
///
/// This coin selection algorithm sorts the available coins by value and then picks them
/// starting from the largest ones until the required amount is reached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LargestFirstCoinSelection;

impl CoinSelectionAlgorithm for LargestFirstCoinSelection {
    fn coin_select(
        &self,
        mut utxo_pool: Vec<Coin>,
        target_value: u64,
    ) -> Option<CoinSelectionResult> {
        log::debug!(
            "target_value = `{}`, pool size = `{}`",
            target_value,
            utxo_pool.len()
        );

        // Sort smallest to largest, before being reversed with `.rev()`.
        utxo_pool.sort_unstable_by_key(|coin| coin.txout.value);

        // Keep including coins until we've got enough
        let selected = utxo_pool
            .into_iter()
            .rev()
            .scan(0u64, |selected_amount, coin| {
                if *selected_amount < target_value {
                    *selected_amount += coin.txout.value;
                    Some(coin)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        let result = selection_result(selected);
        if result.selected_amount < target_value {
            return None;
        }

        Some(result)
    }
}

/// Branch and bound coin selection
///
/// Looks for a subset of the pool whose effective value lands between the target and the
/// target plus the cost of creating change, preferring the subset that wastes the least:
/// the waste of a selection is the sum of `fee - long_term_fee` over its inputs, plus
/// whatever the selection overshoots the target.
///
/// Code adapted from Bitcoin Core's implementation and from Mark Erhardt Master's Thesis:
/// <http://murch.one/wp-content/uploads/2016/11/erhardt2016coinselection.pdf>
#[derive(Debug, Clone)]
pub struct BranchAndBoundCoinSelection {
    cost_of_change: u64,
    not_input_fees: u64,
}

impl BranchAndBoundCoinSelection {
    /// Create a new instance with the given `cost_of_change`, the marginal cost of
    /// creating and later spending a change output, and `not_input_fees`, the fixed
    /// part of the fee that is not attributable to any specific input
    pub fn new(cost_of_change: u64, not_input_fees: u64) -> Self {
        BranchAndBoundCoinSelection {
            cost_of_change,
            not_input_fees,
        }
    }
}

impl CoinSelectionAlgorithm for BranchAndBoundCoinSelection {
    fn coin_select(&self, utxo_pool: Vec<Coin>, target_value: u64) -> Option<CoinSelectionResult> {
        self.bnb(utxo_pool, target_value).0
    }
}

impl BranchAndBoundCoinSelection {
    // Depth first search over the inclusion/exclusion tree of the sorted pool. Also
    // returns the number of nodes visited, so tests can check that equivalent subtrees
    // are not explored twice.
    //
    // Every coin in the pool must have a positive effective value; the caller is
    // expected to have filtered out the ones that cost more to spend than they provide.
    fn bnb(
        &self,
        mut utxo_pool: Vec<Coin>,
        target_value: u64,
    ) -> (Option<CoinSelectionResult>, usize) {
        if utxo_pool.is_empty() {
            return (None, 0);
        }

        let actual_target = (self.not_input_fees + target_value) as i64;

        debug_assert!(utxo_pool.iter().all(|coin| coin.effective_value() > 0));

        // Sort the pool largest effective value first
        utxo_pool.sort_unstable_by_key(|coin| coin.effective_value());
        utxo_pool.reverse();

        // Total effective value still reachable from the unexplored suffix of the pool
        let mut curr_available_value: i64 = utxo_pool.iter().map(Coin::effective_value).sum();
        if curr_available_value < actual_target {
            return (None, 0);
        }

        // curr_selection[i] tells whether utxo_pool[i] is included on the path from the
        // root to the current node; its length is the current depth
        let mut curr_selection: Vec<bool> = Vec::with_capacity(utxo_pool.len());
        let mut curr_value: i64 = 0;
        let mut curr_waste: i64 = 0;

        let mut best_selection: Vec<bool> = Vec::new();
        let mut best_waste = MAX_MONEY;

        let upper_bound = actual_target + self.cost_of_change as i64;

        let mut tries = 0;
        for _ in 0..BNB_TOTAL_TRIES {
            tries += 1;

            // Conditions for starting a backtrack
            let mut backtrack = false;
            if curr_value + curr_available_value < actual_target
                || curr_value > upper_bound
                || (curr_waste > best_waste && utxo_pool[0].fee_delta() > 0)
            {
                // Cannot possibly reach the target with the amount remaining in the
                // lookahead, the selected value overshot the acceptable range, or the
                // waste of this branch can only keep growing past the best one seen.
                // The waste cut is only sound while fees exceed long-term fees: with a
                // negative fee delta, adding inputs decreases waste.
                backtrack = true;
            } else if curr_value >= actual_target {
                // Selected value is within range; count the excess over the target as
                // wasted and compare with the best solution so far
                curr_waste += curr_value - actual_target;
                if curr_waste <= best_waste {
                    best_selection = curr_selection.clone();
                    best_selection.resize(utxo_pool.len(), false);
                    best_waste = curr_waste;
                }
                curr_waste -= curr_value - actual_target;
                backtrack = true;
            }

            if backtrack {
                // Walk backwards to find the last included coin that still needs to
                // have its omission branch traversed
                while let Some(false) = curr_selection.last() {
                    curr_selection.pop();
                    curr_available_value += utxo_pool[curr_selection.len()].effective_value();
                }

                match curr_selection.last_mut() {
                    None => {
                        // We have walked back past the first coin and no branch is
                        // untraversed, the search is done
                        break;
                    }
                    Some(included) => {
                        // The coin was included on previous iterations, try excluding now
                        *included = false;
                        let utxo = &utxo_pool[curr_selection.len() - 1];
                        curr_value -= utxo.effective_value();
                        curr_waste -= utxo.fee_delta();
                    }
                }
            } else {
                // Moving forwards, continuing down this branch
                let depth = curr_selection.len();
                let utxo = &utxo_pool[depth];

                // Remove this coin from the lookahead
                curr_available_value -= utxo.effective_value();

                // If the previous coin was excluded and this one is its twin in both
                // effective value and fee, the subtree rooted here repeats one that has
                // already been traversed; exclude it without descending into it
                let equivalent_to_excluded = match curr_selection.last() {
                    Some(false) => {
                        let prev = &utxo_pool[depth - 1];
                        utxo.effective_value() == prev.effective_value() && utxo.fee == prev.fee
                    }
                    _ => false,
                };

                if equivalent_to_excluded {
                    curr_selection.push(false);
                } else {
                    // Inclusion branch first (Largest First Exploration)
                    curr_selection.push(true);
                    curr_value += utxo.effective_value();
                    curr_waste += utxo.fee_delta();
                }
            }
        }

        if best_selection.is_empty() {
            return (None, tries);
        }

        let mut selected = Vec::new();
        let mut selected_amount = 0u64;
        for (coin, include) in utxo_pool.into_iter().zip(best_selection) {
            if include {
                selected_amount += coin.txout.value;
                selected.push(coin);
            }
        }

        log::debug!(
            "bnb: selected `{}` coins worth `{}` with waste `{}` in `{}` tries",
            selected.len(),
            selected_amount,
            best_waste,
            tries
        );

        (
            Some(CoinSelectionResult {
                selected,
                selected_amount,
            }),
            tries,
        )
    }
}

/// Stochastic subset-sum coin selection
///
/// Shuffles the pool and approximates the smallest subset reaching the target by random
/// sampling, falling back to the smallest single coin large enough to pay the target and
/// leave at least [`MIN_CHANGE`] of change.
///
/// The randomness is deliberate: repeated calls over the same pool may return different
/// valid selections, which avoids degenerate behavior and gives a mild privacy benefit.
/// Callers that need reproducible selections can pin [`seed`](Self::seed).
#[derive(Debug, Clone)]
pub struct KnapsackCoinSelection {
    /// Seed for the non-cryptographic generator driving the shuffle and the subset
    /// sampling; when `None` a fresh seed is drawn from the OS for every call
    pub seed: Option<u64>,
    /// Number of sampling rounds performed by each approximation pass
    pub iterations: u32,
}

impl Default for KnapsackCoinSelection {
    fn default() -> Self {
        KnapsackCoinSelection {
            seed: None,
            iterations: 1000,
        }
    }
}

impl CoinSelectionAlgorithm for KnapsackCoinSelection {
    fn coin_select(&self, utxo_pool: Vec<Coin>, target_value: u64) -> Option<CoinSelectionResult> {
        let mut rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        self.knapsack(utxo_pool, target_value, &mut rng)
    }
}

impl KnapsackCoinSelection {
    fn knapsack(
        &self,
        mut utxo_pool: Vec<Coin>,
        target_value: u64,
        rng: &mut SmallRng,
    ) -> Option<CoinSelectionResult> {
        utxo_pool.shuffle(rng);

        // Coins worth less than the target plus MIN_CHANGE, and the smallest coin
        // large enough to cover the target while leaving a change worth creating
        let mut lower: Vec<Coin> = Vec::new();
        let mut lower_total: u64 = 0;
        let mut lowest_larger: Option<Coin> = None;

        for coin in utxo_pool {
            if coin.txout.value == target_value {
                return Some(selection_result(vec![coin]));
            } else if coin.txout.value < target_value + MIN_CHANGE {
                lower_total += coin.txout.value;
                lower.push(coin);
            } else if lowest_larger
                .as_ref()
                .map_or(true, |lowest| coin.txout.value < lowest.txout.value)
            {
                lowest_larger = Some(coin);
            }
        }

        if lower_total == target_value {
            return Some(selection_result(lower));
        }

        if lower_total < target_value {
            return lowest_larger.map(|coin| selection_result(vec![coin]));
        }

        // Solve subset sum by stochastic approximation
        lower.sort_unstable_by(|a, b| b.txout.value.cmp(&a.txout.value));

        let (mut best_selection, mut best_total) =
            approximate_best_subset(rng, &lower, lower_total, target_value, self.iterations);
        if best_total != target_value && lower_total >= target_value + MIN_CHANGE {
            let (selection, total) = approximate_best_subset(
                rng,
                &lower,
                lower_total,
                target_value + MIN_CHANGE,
                self.iterations,
            );
            best_selection = selection;
            best_total = total;
        }

        // If we have a bigger coin and either the stochastic approximation didn't find
        // a good solution, or the next bigger coin is closer, return the bigger coin
        if let Some(larger) = lowest_larger {
            if (best_total != target_value && best_total < target_value + MIN_CHANGE)
                || larger.txout.value <= best_total
            {
                return Some(selection_result(vec![larger]));
            }
        }

        let selected = lower
            .into_iter()
            .zip(best_selection)
            .filter_map(|(coin, keep)| if keep { Some(coin) } else { None })
            .collect::<Vec<_>>();

        log::debug!(
            "knapsack: best subset of `{}` coins totals `{}`",
            selected.len(),
            best_total
        );

        Some(selection_result(selected))
    }
}

// The solver here uses a randomized algorithm. The randomness serves no real security
// purpose but is needed to prevent degenerate behavior, and it is important that the
// rng is fast. We do not use a constant random sequence, because there may be some
// privacy improvement by making the selection random.
fn approximate_best_subset<R: Rng>(
    rng: &mut R,
    coins: &[Coin],
    total_lower: u64,
    target_value: u64,
    iterations: u32,
) -> (Vec<bool>, u64) {
    let mut best_selection = vec![true; coins.len()];
    let mut best_total = total_lower;

    for _ in 0..iterations {
        if best_total == target_value {
            break;
        }

        let mut included = vec![false; coins.len()];
        let mut total: u64 = 0;
        let mut reached_target = false;
        for pass in 0..2 {
            if reached_target {
                break;
            }
            for i in 0..coins.len() {
                // On the first pass flip a coin for inclusion; on the second pass
                // consider everything the first pass left out
                let consider = if pass == 0 {
                    rng.gen_bool(0.5)
                } else {
                    !included[i]
                };
                if consider {
                    total += coins[i].txout.value;
                    included[i] = true;
                    if total >= target_value {
                        reached_target = true;
                        if total < best_total {
                            best_total = total;
                            best_selection = included.clone();
                        }
                        // Drop the coin that pushed us over and keep going, looking
                        // for a tighter fit
                        total -= coins[i].txout.value;
                        included[i] = false;
                    }
                }
            }
        }
    }

    (best_selection, best_total)
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use bitcoin::{OutPoint, Script, TxOut};

    use super::*;

    fn testing_coin(vout: u32, value: u64, fee: u64, long_term_fee: u64) -> Coin {
        let mut outpoint = OutPoint::from_str(
            "ebd9813ecebc57ff8f30797de7c205e3c7498ca950ea4341ee51a685ff2fa30a:0",
        )
        .unwrap();
        outpoint.vout = vout;

        Coin::new(
            outpoint,
            TxOut {
                value,
                script_pubkey: Script::new(),
            },
            fee,
            long_term_fee,
        )
    }

    // Coins with no spending cost, so nominal and effective value coincide
    fn free_coins(values: &[u64]) -> Vec<Coin> {
        values
            .iter()
            .enumerate()
            .map(|(vout, &value)| testing_coin(vout as u32, value, 0, 0))
            .collect()
    }

    fn selected_values(result: &CoinSelectionResult) -> Vec<u64> {
        let mut values = result
            .selected
            .iter()
            .map(|coin| coin.txout.value)
            .collect::<Vec<_>>();
        values.sort_unstable();
        values
    }

    #[test]
    fn test_largest_first_coin_selection_success() {
        let result = LargestFirstCoinSelection
            .coin_select(free_coins(&[100_000, 200_000, 50_000]), 250_000)
            .unwrap();

        assert_eq!(result.selected.len(), 2);
        assert_eq!(result.selected_amount, 300_000);
        assert_eq!(selected_values(&result), vec![100_000, 200_000]);
    }

    #[test]
    fn test_largest_first_coin_selection_insufficient_funds() {
        assert!(LargestFirstCoinSelection
            .coin_select(free_coins(&[100_000, 200_000]), 500_000)
            .is_none());
    }

    #[test]
    fn test_bnb_exact_match_skipping_second() {
        let result = BranchAndBoundCoinSelection::new(0, 0)
            .coin_select(free_coins(&[6, 5, 4]), 10)
            .unwrap();

        assert_eq!(selected_values(&result), vec![4, 6]);
        assert_eq!(result.selected_amount, 10);
    }

    #[test]
    fn test_bnb_selects_whole_pool() {
        let result = BranchAndBoundCoinSelection::new(0, 0)
            .coin_select(free_coins(&[3, 2, 1]), 6)
            .unwrap();

        assert_eq!(selected_values(&result), vec![1, 2, 3]);
        assert_eq!(result.selected_amount, 6);
    }

    #[test]
    fn test_bnb_insufficient_funds() {
        assert!(BranchAndBoundCoinSelection::new(0, 0)
            .coin_select(free_coins(&[3, 2, 1]), 10)
            .is_none());
    }

    #[test]
    fn test_bnb_no_match_without_change_window() {
        // The only coin overshoots the target and there is no room for change
        assert!(BranchAndBoundCoinSelection::new(0, 0)
            .coin_select(free_coins(&[5]), 4)
            .is_none());
    }

    #[test]
    fn test_bnb_accepts_solution_within_change_window() {
        let cost_of_change = 10;
        let result = BranchAndBoundCoinSelection::new(cost_of_change, 0)
            .coin_select(free_coins(&[7, 5]), 11)
            .unwrap();

        // 7 + 5 = 12, within [11, 11 + 10]
        assert_eq!(result.selected_amount, 12);
    }

    #[test]
    fn test_bnb_includes_not_input_fees_in_target() {
        let result = BranchAndBoundCoinSelection::new(0, 3)
            .coin_select(free_coins(&[7, 5]), 9)
            .unwrap();

        // actual target is 9 + 3
        assert_eq!(result.selected_amount, 12);
    }

    #[test]
    fn test_bnb_prefers_lower_waste_over_first_hit() {
        // The largest coin alone reaches the target but carries a heavy fee compared
        // to its long-term cost; the pair of cheap coins wastes nothing
        let pool = vec![
            testing_coin(0, 22, 12, 2), // effective value 10, fee delta 10
            testing_coin(1, 6, 0, 0),   // effective value 6
            testing_coin(2, 4, 0, 0),   // effective value 4
        ];

        let result = BranchAndBoundCoinSelection::new(0, 0)
            .coin_select(pool, 10)
            .unwrap();

        assert_eq!(selected_values(&result), vec![4, 6]);
        assert_eq!(result.selected_amount, 10);
    }

    #[test]
    fn test_bnb_returns_nominal_value() {
        // Effective values 90 + 90 reach the target of 180, but the reported amount
        // is the sum of the nominal values
        let pool = vec![testing_coin(0, 100, 10, 10), testing_coin(1, 100, 10, 10)];

        let result = BranchAndBoundCoinSelection::new(0, 0)
            .coin_select(pool, 180)
            .unwrap();

        assert_eq!(result.selected_amount, 200);
    }

    #[test]
    fn test_bnb_effective_value_in_range() {
        // Whatever subset is returned, its effective value must land in
        // [target + not_input_fees, target + not_input_fees + cost_of_change]
        let pool = vec![
            testing_coin(0, 30_000, 500, 400),
            testing_coin(1, 20_000, 300, 300),
            testing_coin(2, 15_000, 200, 250),
            testing_coin(3, 10_000, 100, 100),
            testing_coin(4, 5_000, 50, 50),
        ];
        let target_value = 42_000;
        let cost_of_change = 5_000;
        let not_input_fees = 150;

        let result = BranchAndBoundCoinSelection::new(cost_of_change, not_input_fees)
            .coin_select(pool, target_value)
            .unwrap();

        let effective_total: i64 = result
            .selected
            .iter()
            .map(|coin| coin.effective_value())
            .sum();
        assert!(effective_total >= (target_value + not_input_fees) as i64);
        assert!(effective_total <= (target_value + not_input_fees + cost_of_change) as i64);
    }

    #[test]
    fn test_bnb_equivalent_subtrees_pruned() {
        // A pool of identical coins: without the equivalence rule the tree would blow
        // through the iteration budget, with it the search stays tiny
        let pool: Vec<Coin> = (0..50).map(|vout| testing_coin(vout, 1_000, 10, 10)).collect();
        let target_value = 3 * 990;

        let (result, tries) = BranchAndBoundCoinSelection::new(0, 0).bnb(pool, target_value);

        let result = result.unwrap();
        assert_eq!(result.selected.len(), 3);
        assert_eq!(result.selected_amount, 3_000);
        assert!(tries < 10_000, "search visited {} nodes", tries);
    }

    #[test]
    fn test_bnb_terminates_on_adversarial_pool() {
        // Exponentially spaced values with no subset reaching the target exactly;
        // the search must come back empty-handed within the iteration budget
        let pool: Vec<Coin> = (0..20)
            .map(|vout| testing_coin(vout, 1 << (vout + 5), 0, 0))
            .collect();

        let (result, tries) = BranchAndBoundCoinSelection::new(0, 0).bnb(pool, 31);

        assert!(result.is_none());
        assert!(tries <= BNB_TOTAL_TRIES);
    }

    #[test]
    fn test_knapsack_single_exact_match() {
        let selection = KnapsackCoinSelection {
            seed: Some(1),
            ..Default::default()
        };
        let result = selection
            .coin_select(free_coins(&[100_000, 250_000, 400_000]), 250_000)
            .unwrap();

        assert_eq!(selected_values(&result), vec![250_000]);
    }

    #[test]
    fn test_knapsack_all_lower_equals_target() {
        let selection = KnapsackCoinSelection {
            seed: Some(1),
            ..Default::default()
        };
        let result = selection.coin_select(free_coins(&[2_000, 3_000]), 5_000).unwrap();

        assert_eq!(selected_values(&result), vec![2_000, 3_000]);
        assert_eq!(result.selected_amount, 5_000);
    }

    #[test]
    fn test_knapsack_falls_back_to_lowest_larger() {
        let selection = KnapsackCoinSelection {
            seed: Some(1),
            ..Default::default()
        };
        // The small coin cannot reach the target; the two large ones can, and the
        // smaller of them must be picked
        let result = selection
            .coin_select(free_coins(&[400, 2_500_000, 1_500_000]), 500)
            .unwrap();

        assert_eq!(selected_values(&result), vec![1_500_000]);
    }

    #[test]
    fn test_knapsack_insufficient_funds() {
        let selection = KnapsackCoinSelection {
            seed: Some(1),
            ..Default::default()
        };
        assert!(selection.coin_select(free_coins(&[400]), 500).is_none());
    }

    #[test]
    fn test_knapsack_returns_smallest_reaching_subset() {
        let selection = KnapsackCoinSelection {
            seed: Some(1),
            ..Default::default()
        };
        // Both coins are in the `lower` bucket; every sampling round converges on the
        // single coin of 5, so the result does not depend on the seed
        let result = selection.coin_select(free_coins(&[10, 5]), 3).unwrap();

        assert_eq!(selected_values(&result), vec![5]);
    }

    #[test]
    fn test_knapsack_prefers_larger_coin_over_tiny_change() {
        let selection = KnapsackCoinSelection {
            seed: Some(1),
            ..Default::default()
        };
        // The best subset of the lower coins leaves less than MIN_CHANGE of change,
        // so the single larger coin wins
        let result = selection
            .coin_select(free_coins(&[700_000, 700_000, 1_600_000]), 500_000)
            .unwrap();

        assert_eq!(selected_values(&result), vec![1_600_000]);
    }

    #[test]
    fn test_knapsack_sum_is_at_least_target() {
        for seed in 0..20 {
            let selection = KnapsackCoinSelection {
                seed: Some(seed),
                ..Default::default()
            };
            let result = selection.coin_select(free_coins(&[1, 2, 5, 10]), 3).unwrap();

            assert!(result.selected_amount >= 3);
        }
    }

    #[test]
    fn test_knapsack_same_seed_same_selection() {
        let pool = free_coins(&[1_000, 2_000, 3_000, 5_000, 8_000, 13_000]);
        let selection = KnapsackCoinSelection {
            seed: Some(42),
            ..Default::default()
        };

        let first = selection.coin_select(pool.clone(), 9_500).unwrap();
        let second = selection.coin_select(pool, 9_500).unwrap();

        assert_eq!(selected_values(&first), selected_values(&second));
    }

    #[test]
    fn test_approximate_best_subset_finds_exact_sum() {
        let mut rng = SmallRng::seed_from_u64(7);
        let coins = free_coins(&[12, 7, 5, 3, 1]);
        let total_lower = 28;

        let (selection, total) = approximate_best_subset(&mut rng, &coins, total_lower, 8, 1000);

        assert_eq!(total, 8);
        let picked: u64 = coins
            .iter()
            .zip(&selection)
            .filter_map(|(coin, &keep)| if keep { Some(coin.txout.value) } else { None })
            .sum();
        assert_eq!(picked, 8);
    }
}
