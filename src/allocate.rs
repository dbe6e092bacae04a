//! Tier output allocation.
//!
//! Given the session's coins and the fee schedule from the server greeting,
//! produce one candidate output plan per feasible tier. Output counts and
//! sizes are drawn from a Poisson process with rate `1/tier` so that a
//! participant's split looks like everyone else's at that tier, then the
//! draws are rescaled to spend the available value *exactly*; a plan that
//! cannot hit the target to the unit is rejected rather than rounded.
//!
//! A small random "fuzz fee" is folded into each tier's budget to perturb
//! the output-count/size signature across sessions.
//!
//! The sampler takes the RNG as a parameter: production callers pass
//! `rand::thread_rng()`, tests pass a seeded `StdRng`. Nothing here is
//! committed to or signed, so a non-crypto stream is acceptable.

use crate::params::{
    self, MAX_COMPONENTS, MAX_EXCESS_FEE, MIN_OUTPUT, MIN_TX_COMPONENTS, OUTPUT_COMPONENT_SIZE,
};
use crate::types::Coin;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use std::collections::{BTreeMap, HashSet};

/// Fee schedule and component budget from the server greeting.
#[derive(Clone, Debug)]
pub struct ServerParams {
    pub num_components: u64,
    pub component_feerate: u64,
    pub min_excess_fee: u64,
    pub max_excess_fee: u64,
    pub tiers: Vec<u64>,
}

/// Produce a candidate output plan for every tier that survives the
/// feasibility constraints. An empty map means this coin selection cannot
/// participate.
pub fn allocate_outputs(
    coins: &[Coin],
    server: &ServerParams,
    rng: &mut impl Rng,
) -> BTreeMap<u64, Vec<u64>> {
    let mut plans = BTreeMap::new();
    let num_inputs = coins.len() as u64;

    let max_components = server.num_components.min(MAX_COMPONENTS);
    if max_components <= num_inputs {
        tracing::debug!("too many inputs ({} >= {})", num_inputs, max_components);
        return plans;
    }
    let max_outputs = max_components - num_inputs;

    // Fewer distinct keys leak more, so they demand more decoy outputs.
    let distinct_keys: HashSet<&[u8]> = coins.iter().map(|c| c.pubkey.as_slice()).collect();
    let min_outputs = (MIN_TX_COMPONENTS as i64 - distinct_keys.len() as i64).max(1) as u64;
    if max_outputs < min_outputs {
        tracing::debug!(
            "cannot satisfy output count constraint (>= {}, <= {})",
            min_outputs,
            max_outputs
        );
        return plans;
    }

    let sum_inputs: u64 = coins.iter().map(|c| c.value).sum();
    let input_fees: u64 = coins
        .iter()
        .map(|c| {
            params::component_fee(
                params::input_component_size(c.pubkey.len()),
                server.component_feerate,
            )
        })
        .sum();
    let fee_per_output = params::component_fee(OUTPUT_COMPONENT_SIZE, server.component_feerate);
    let offset_per_output = MIN_OUTPUT + fee_per_output;

    let available = sum_inputs as i64 - input_fees as i64 - server.min_excess_fee as i64;
    if available < offset_per_output as i64 {
        tracing::debug!("selected inputs had too little value");
        return plans;
    }
    let available = available as u64;

    for &tier in &server.tiers {
        let fuzz_fee_max = (tier / 1_000_000) as i64;
        let fuzz_fee_max_reduced = fuzz_fee_max
            .min(MAX_EXCESS_FEE as i64 - server.min_excess_fee as i64)
            .min(server.max_excess_fee as i64 - server.min_excess_fee as i64);
        if fuzz_fee_max_reduced < 0 {
            continue;
        }
        let fuzz_fee = rng.gen_range(0..=fuzz_fee_max_reduced);

        // A tier whose reduced bound disagrees with the draw is skipped, not
        // clamped.
        if fuzz_fee > fuzz_fee_max_reduced && fuzz_fee_max_reduced > fuzz_fee_max {
            continue;
        }

        let reduced_available = available as i64 - fuzz_fee;
        if reduced_available < offset_per_output as i64 {
            continue;
        }

        let Some(mut outputs) = random_outputs_for_tier(
            rng,
            reduced_available as u64,
            tier,
            offset_per_output,
            max_outputs,
        ) else {
            continue;
        };
        if (outputs.len() as u64) < min_outputs {
            continue;
        }
        for output in &mut outputs {
            *output -= fee_per_output;
        }
        if num_inputs + outputs.len() as u64 > MAX_COMPONENTS {
            continue;
        }
        plans.insert(tier, outputs);
    }

    plans
}

/// Draw a random partition of `input_amount` for one tier.
///
/// Returns output amounts *before* the per-output fee is subtracted, or
/// `None` when the draw is infeasible or the integer rescale drifts off the
/// exact target.
pub fn random_outputs_for_tier(
    rng: &mut impl Rng,
    input_amount: u64,
    tier: u64,
    offset: u64,
    max_count: u64,
) -> Option<Vec<u64>> {
    if input_amount < offset || tier == 0 {
        return None;
    }
    let exp = Exp::new(1.0 / tier as f64).ok()?;

    // Consume budget draw by draw until it runs out.
    let mut remaining = input_amount as i64;
    let mut values: Vec<f64> = Vec::new();
    for _ in 0..=max_count {
        let val = exp.sample(rng);
        remaining -= val.ceil() as i64 + offset as i64;
        if remaining < 0 {
            break;
        }
        values.push(val);
    }
    if values.is_empty() || values.len() as u64 > max_count {
        return None;
    }

    let desired_random_sum = input_amount as i64 - values.len() as i64 * offset as i64;
    if desired_random_sum < 0 {
        return None;
    }

    let mut cum_sum = values;
    for i in 1..cum_sum.len() {
        cum_sum[i] += cum_sum[i - 1];
    }
    let sum = cum_sum[cum_sum.len() - 1];

    // Rescale so the final cumulative value lands on the target, then take
    // integer first differences.
    let rescale = desired_random_sum as f64 / sum;
    let normed: Vec<i64> = cum_sum
        .iter()
        .map(|v| (rescale * v).round() as i64)
        .collect();
    if normed[normed.len() - 1] != desired_random_sum {
        return None;
    }

    let mut result = Vec::with_capacity(normed.len());
    let mut prev = 0i64;
    for &v in &normed {
        result.push((offset as i64 + (v - prev)) as u64);
        prev = v;
    }

    // Exactness is mandatory.
    let result_sum: i64 = result.iter().map(|&v| v as i64).sum();
    if result_sum == input_amount as i64 {
        Some(result)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outpoint;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn coin(id: u8, value: u64) -> Coin {
        Coin {
            outpoint: Outpoint {
                txid: [id; 32],
                index: 0,
            },
            value,
            pubkey: vec![id; 32],
        }
    }

    fn server(tiers: &[u64]) -> ServerParams {
        ServerParams {
            num_components: 40,
            component_feerate: 100,
            min_excess_fee: 10,
            max_excess_fee: 5_000,
            tiers: tiers.to_vec(),
        }
    }

    // ── random_outputs_for_tier ─────────────────────────────────────────

    #[test]
    fn tier_outputs_sum_exactly() {
        let mut produced = 0;
        for seed in 0..50u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            if let Some(outputs) = random_outputs_for_tier(&mut rng, 100_000, 10_000, 10_004, 30) {
                produced += 1;
                assert!(!outputs.is_empty());
                assert_eq!(outputs.iter().sum::<u64>(), 100_000);
                for &o in &outputs {
                    assert!(o >= 10_004);
                }
            }
        }
        assert!(produced > 0, "no seed produced a plan");
    }

    #[test]
    fn tier_outputs_rejects_small_amount() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_outputs_for_tier(&mut rng, 9_999, 10_000, 10_004, 30).is_none());
    }

    #[test]
    fn tier_outputs_rejects_zero_tier() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_outputs_for_tier(&mut rng, 100_000, 0, 10_004, 30).is_none());
    }

    #[test]
    fn tier_outputs_respects_max_count() {
        // A huge budget with a tiny tier wants far more than max_count
        // outputs; the draw must be rejected, not truncated.
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert!(random_outputs_for_tier(&mut rng, 10_000_000, 1_000, 10_004, 5).is_none());
        }
    }

    // ── allocate_outputs ────────────────────────────────────────────────

    #[test]
    fn allocation_feasible_tier_is_exact() {
        // Ten distinct keys: min_outputs collapses to 1, and the 100k tier
        // comfortably fits the budget.
        let coins: Vec<Coin> = (0..10).map(|i| coin(i, 200_000)).collect();
        let server = server(&[50_000, 100_000, 200_000]);

        let mut found = false;
        for seed in 0..10u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plans = allocate_outputs(&coins, &server, &mut rng);
            for (&tier, outputs) in &plans {
                found = true;
                let fee_per_output =
                    params::component_fee(OUTPUT_COMPONENT_SIZE, server.component_feerate);
                let sum_in: u64 = coins.iter().map(|c| c.value).sum();
                let input_fees: u64 = coins
                    .iter()
                    .map(|c| {
                        params::component_fee(
                            params::input_component_size(c.pubkey.len()),
                            server.component_feerate,
                        )
                    })
                    .sum();
                let sum_out: u64 = outputs.iter().sum();
                let output_fees = outputs.len() as u64 * fee_per_output;

                // Whatever was not allocated to outputs or fees is excess,
                // bounded by the fuzz range for this tier.
                let excess = sum_in - sum_out - input_fees - output_fees;
                let fuzz_cap = (tier / 1_000_000)
                    .min(MAX_EXCESS_FEE - server.min_excess_fee)
                    .min(server.max_excess_fee - server.min_excess_fee);
                assert!(excess >= server.min_excess_fee);
                assert!(excess <= server.min_excess_fee + fuzz_cap);
                assert!(excess <= MAX_EXCESS_FEE);

                for &o in outputs {
                    assert!(o >= MIN_OUTPUT);
                }
                assert!(coins.len() as u64 + outputs.len() as u64 <= MAX_COMPONENTS);
            }
        }
        assert!(found, "no tier was feasible across seeds");
    }

    #[test]
    fn allocation_rejects_too_many_inputs() {
        let coins: Vec<Coin> = (0..40).map(|i| coin(i, 100_000)).collect();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(allocate_outputs(&coins, &server(&[100_000]), &mut rng).is_empty());
    }

    #[test]
    fn allocation_rejects_single_repeated_key() {
        // One distinct key needs 10 outputs; a small budget cannot carry
        // them, so no tier survives.
        let coins = vec![coin(1, 100_000)];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(allocate_outputs(&coins, &server(&[10_000]), &mut rng).is_empty());
    }

    #[test]
    fn allocation_rejects_dust_input() {
        let coins: Vec<Coin> = (0..10).map(|i| coin(i, 900)).collect();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(allocate_outputs(&coins, &server(&[10_000]), &mut rng).is_empty());
    }

    #[test]
    fn allocation_skips_tier_when_min_excess_exceeds_caps() {
        let coins: Vec<Coin> = (0..10).map(|i| coin(i, 200_000)).collect();
        let mut server = server(&[100_000]);
        // The fuzz bound goes negative once min_excess_fee clears the cap.
        server.min_excess_fee = MAX_EXCESS_FEE + 1;
        let mut rng = StdRng::seed_from_u64(1);
        assert!(allocate_outputs(&coins, &server, &mut rng).is_empty());
    }

    #[test]
    fn allocation_empty_for_no_coins() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(allocate_outputs(&[], &server(&[10_000]), &mut rng).is_empty());
    }
}
