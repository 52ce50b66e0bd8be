// Integer and rational arithmetic for quoting
// This file builds sample-amount ladders and converts between amounts, rates and
// basis-point slippage without ever touching floating point
//
// Numan Thabit 2025 Nov

use num::{BigInt, BigRational, BigUint, Integer, One, Signed, ToPrimitive, Zero};

pub const BPS_DENOMINATOR: u32 = 10_000;

pub fn to_int(value: &BigUint) -> BigInt {
    BigInt::from(value.clone())
}

pub fn to_ratio(value: &BigUint) -> BigRational {
    BigRational::from_integer(to_int(value))
}

/// `numerator / denominator` as an exact rate; zero when the denominator is zero.
pub fn ratio(numerator: &BigUint, denominator: &BigUint) -> BigRational {
    if denominator.is_zero() {
        return BigRational::zero();
    }
    BigRational::new(to_int(numerator), to_int(denominator))
}

/// Signed variant of [`ratio`].
pub fn signed_ratio(numerator: &BigInt, denominator: &BigUint) -> BigRational {
    if denominator.is_zero() {
        return BigRational::zero();
    }
    BigRational::new(numerator.clone(), to_int(denominator))
}

pub fn ceil_to_uint(value: &BigRational) -> BigUint {
    if value.is_negative() {
        return BigUint::zero();
    }
    value.ceil().to_integer().to_biguint().unwrap_or_default()
}

/// `amount * numerator / denominator`, rounded down.
pub fn mul_div_floor(amount: &BigUint, numerator: &BigUint, denominator: &BigUint) -> BigUint {
    if denominator.is_zero() {
        return BigUint::zero();
    }
    (amount * numerator) / denominator
}

/// `amount * numerator / denominator`, rounded up.
pub fn mul_div_ceil(amount: &BigUint, numerator: &BigUint, denominator: &BigUint) -> BigUint {
    if denominator.is_zero() {
        return BigUint::zero();
    }
    let (q, r) = (amount * numerator).div_rem(denominator);
    if r.is_zero() {
        q
    } else {
        q + 1u32
    }
}

/// `amount * (1 - bps / 10_000)`, rounded down.
pub fn reduce_by_bps(amount: &BigUint, bps: u32) -> BigUint {
    let keep = BPS_DENOMINATOR.saturating_sub(bps.min(BPS_DENOMINATOR));
    mul_div_floor(amount, &BigUint::from(keep), &BigUint::from(BPS_DENOMINATOR))
}

/// `amount * (1 + bps / 10_000)`, rounded up.
pub fn increase_by_bps(amount: &BigUint, bps: u32) -> BigUint {
    let grow = BPS_DENOMINATOR as u64 + bps as u64;
    mul_div_ceil(amount, &BigUint::from(grow), &BigUint::from(BPS_DENOMINATOR))
}

pub fn bps_ratio(bps: u32) -> BigRational {
    BigRational::new(BigInt::from(bps), BigInt::from(BPS_DENOMINATOR))
}

/// Input ladder of `num_samples` increasing amounts ending exactly at `max`.
///
/// Step `i` has weight `base^i` where `base = base_bps / 10_000`, so a base
/// above one concentrates samples at the small end of the ladder.
pub fn sample_amounts(max: &BigUint, num_samples: usize, base_bps: u32) -> Vec<BigUint> {
    if num_samples == 0 || max.is_zero() {
        return Vec::new();
    }
    if num_samples == 1 {
        return vec![max.clone()];
    }
    let base = if base_bps == 0 {
        BigRational::one()
    } else {
        bps_ratio(base_bps)
    };

    let mut weights = Vec::with_capacity(num_samples);
    let mut w = BigRational::one();
    for _ in 0..num_samples {
        weights.push(w.clone());
        w *= &base;
    }
    let total: BigRational = weights.iter().cloned().sum();
    let max_ratio = to_ratio(max);

    let mut amounts: Vec<BigUint> = Vec::with_capacity(num_samples);
    let mut cumulative = BigRational::zero();
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        let amount = if i == num_samples - 1 {
            max.clone()
        } else {
            ceil_to_uint(&(&max_ratio * &cumulative / &total))
        };
        if amount.is_zero() || amounts.last() == Some(&amount) {
            continue;
        }
        amounts.push(amount);
    }
    amounts
}

/// Median of the given rates; the mean of the two middle values for even counts.
pub fn median_rate(mut rates: Vec<BigRational>) -> BigRational {
    if rates.is_empty() {
        return BigRational::zero();
    }
    rates.sort();
    let mid = rates.len() / 2;
    if rates.len() % 2 == 1 {
        rates[mid].clone()
    } else {
        (&rates[mid - 1] + &rates[mid]) / BigRational::from_integer(BigInt::from(2))
    }
}

/// Lossy conversion for logging only.
pub fn approx(rate: &BigRational) -> f64 {
    rate.numer()
        .to_f64()
        .zip(rate.denom().to_f64())
        .map(|(n, d)| if d == 0.0 { 0.0 } else { n / d })
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn ladder_is_increasing_and_ends_at_max() {
        let ladder = sample_amounts(&u(1_000_000), 13, 10_500);
        assert_eq!(ladder.len(), 13);
        assert_eq!(ladder.last(), Some(&u(1_000_000)));
        assert!(ladder.windows(2).all(|w| w[0] < w[1]));
        // base > 1 puts the smaller steps first
        let first_step = &ladder[0];
        let last_step = &ladder[12] - &ladder[11];
        assert!(first_step < &last_step);
    }

    #[test]
    fn ladder_collapses_duplicates_for_tiny_amounts() {
        let ladder = sample_amounts(&u(3), 13, 10_500);
        assert_eq!(ladder.last(), Some(&u(3)));
        assert!(ladder.windows(2).all(|w| w[0] < w[1]));
        assert!(ladder.len() <= 3);
        assert!(sample_amounts(&u(0), 13, 10_500).is_empty());
    }

    #[test]
    fn slippage_rounds_against_the_taker() {
        assert_eq!(reduce_by_bps(&u(10_001), 50), u(9_950));
        assert_eq!(increase_by_bps(&u(10_001), 50), u(10_052));
        assert_eq!(reduce_by_bps(&u(100), 20_000), u(0));
    }

    #[test]
    fn median_handles_even_and_empty() {
        let r = |n: i64, d: i64| BigRational::new(BigInt::from(n), BigInt::from(d));
        assert_eq!(median_rate(vec![]), BigRational::zero());
        assert_eq!(median_rate(vec![r(3, 1), r(1, 1), r(2, 1)]), r(2, 1));
        assert_eq!(median_rate(vec![r(4, 1), r(1, 1)]), r(5, 2));
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert!(ratio(&u(5), &u(0)).is_zero());
        assert_eq!(mul_div_ceil(&u(10), &u(1), &u(3)), u(4));
        assert_eq!(mul_div_floor(&u(10), &u(1), &u(3)), u(3));
    }
}
