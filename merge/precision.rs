//! # Consensus p-value combination
//!
//! The consensus p-value of `n` comparisons with smallest p-value `p` is
//! `1 - (1 - p)^n`. In double precision `1 - p` already discards most of the
//! significant bits of a very small `p`, so below the genome-wide significance
//! threshold the value is computed with a directed-rounding big-float backend
//! instead.
//!
//! Both backends implement [`PowerBackend`]; [`consensus_p_value`] is the single
//! switch between them.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

/// Minimum p-values strictly below this use [`DirectedBigFloat`].
pub const GENOME_WIDE_SIGNIFICANCE: f64 = 5e-8;

/// Working precision of the big-float backend, in bits.
pub const HIGH_PRECISION_BITS: u64 = 256;

const F64_MANTISSA_BITS: u64 = 53;
const F64_MIN_SUBNORMAL_EXP: i64 = -1074;

/// Computes `1 - (1 - p)^n` for `p` in `[0, 1]`.
pub trait PowerBackend {
    fn complement_power(&self, p: f64, n: u32) -> f64;
}

/// Plain IEEE double arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleBackend;

impl PowerBackend for DoubleBackend {
    fn complement_power(&self, p: f64, n: u32) -> f64 {
        1.0 - (1.0 - p).powf(f64::from(n))
    }
}

/// Binary big-float arithmetic at a fixed precision, rounding every
/// intermediate and the final conversion toward negative infinity.
#[derive(Debug, Clone, Copy)]
pub struct DirectedBigFloat {
    precision_bits: u64,
}

impl DirectedBigFloat {
    pub fn new(precision_bits: u64) -> Self {
        Self { precision_bits }
    }
}

impl Default for DirectedBigFloat {
    fn default() -> Self {
        Self::new(HIGH_PRECISION_BITS)
    }
}

impl PowerBackend for DirectedBigFloat {
    fn complement_power(&self, p: f64, n: u32) -> f64 {
        if !(0.0..=1.0).contains(&p) {
            return DoubleBackend.complement_power(p, n);
        }
        let bits = self.precision_bits;
        let x = Dyadic::from_f64(p).round_down(bits);
        let y = x.one_minus().round_down(bits);
        let x = y.pow(n).round_down(bits);
        let y = x.one_minus().round_down(bits);
        y.to_f64_round_down()
    }
}

/// Picks the backend for a given minimum p-value.
pub fn backend_for(min_p: f64) -> &'static dyn PowerBackend {
    static DOUBLE: DoubleBackend = DoubleBackend;
    static HIGH: DirectedBigFloat = DirectedBigFloat {
        precision_bits: HIGH_PRECISION_BITS,
    };
    if min_p < GENOME_WIDE_SIGNIFICANCE {
        &HIGH
    } else {
        &DOUBLE
    }
}

/// `1 - (1 - min_p)^n`, switching to the big-float backend when `min_p` is
/// below [`GENOME_WIDE_SIGNIFICANCE`].
pub fn consensus_p_value(min_p: f64, n: u32) -> f64 {
    backend_for(min_p).complement_power(min_p, n)
}

/// A non-negative value `mantissa * 2^exponent`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Dyadic {
    mantissa: BigUint,
    exponent: i64,
}

impl Dyadic {
    fn one() -> Self {
        Self {
            mantissa: BigUint::one(),
            exponent: 0,
        }
    }

    /// Exact conversion of a finite, non-negative double.
    fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let biased = ((bits >> 52) & 0x7ff) as i64;
        let fraction = bits & ((1u64 << 52) - 1);
        let (mantissa, exponent) = if biased == 0 {
            (fraction, F64_MIN_SUBNORMAL_EXP)
        } else {
            (fraction | (1u64 << 52), biased - 1075)
        };
        Self {
            mantissa: BigUint::from(mantissa),
            exponent,
        }
    }

    /// Truncates the mantissa to at most `bits` significant bits. For a
    /// non-negative value this rounds toward negative infinity.
    fn round_down(mut self, bits: u64) -> Self {
        let length = self.mantissa.bits();
        if length > bits {
            let shift = length - bits;
            self.mantissa >>= shift;
            self.exponent += shift as i64;
        }
        self
    }

    /// Exact `1 - self`; requires `self <= 1`.
    fn one_minus(&self) -> Self {
        let exponent = self.exponent.min(0);
        let one = BigUint::one() << ((-exponent) as u64);
        let this = &self.mantissa << ((self.exponent - exponent) as u64);
        Self {
            mantissa: one - this,
            exponent,
        }
    }

    /// Exact `self^n`.
    fn pow(&self, n: u32) -> Self {
        if n == 0 {
            return Self::one();
        }
        Self {
            mantissa: self.mantissa.pow(n),
            exponent: self.exponent * i64::from(n),
        }
    }

    /// Converts to the largest double not above the value.
    fn to_f64_round_down(&self) -> f64 {
        if self.mantissa.is_zero() {
            return 0.0;
        }
        let length = self.mantissa.bits() as i64;
        // Exponent of the lowest bit kept: at most 53 significant bits and no
        // bit below the smallest subnormal.
        let low = (self.exponent + length - F64_MANTISSA_BITS as i64)
            .max(F64_MIN_SUBNORMAL_EXP)
            .max(self.exponent);
        let kept = &self.mantissa >> ((low - self.exponent) as u64);
        let kept = kept.to_u64().unwrap_or(u64::MAX) as f64;
        scale_by_power_of_two(kept, low)
    }
}

/// `value * 2^exponent`, exact whenever the result is representable.
fn scale_by_power_of_two(mut value: f64, mut exponent: i64) -> f64 {
    while exponent > 1023 {
        value *= power_of_two(1023);
        exponent -= 1023;
    }
    while exponent < -1022 {
        value *= power_of_two(-1022);
        exponent += 1022;
    }
    value * power_of_two(exponent)
}

fn power_of_two(exponent: i64) -> f64 {
    debug_assert!((-1022..=1023).contains(&exponent));
    f64::from_bits(((exponent + 1023) as u64) << 52)
}
