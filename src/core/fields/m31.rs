use std::fmt::Display;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use rand::distributions::{Distribution, Standard};

use super::qm31::QM31;
use super::{DomainField, FftEmbedding, FieldExpOps};
use crate::impl_field;

pub const MODULUS_BITS: u32 = 31;
pub const P: u32 = 2147483647; // 2 ** 31 - 1

/// Mersenne prime field element, `p = 2^31 - 1`. The wrapped value is kept in `[0, P)`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct M31(pub u32);
pub type BaseField = M31;

impl_field!(M31);

impl M31 {
    /// Assumes that `val` is in the range [0, 2 * `P`) and returns `val` % `P`.
    pub fn partial_reduce(val: u32) -> Self {
        Self(val.checked_sub(P).unwrap_or(val))
    }

    /// Assumes that `val` is in the range [0, `P`.pow(2)) and returns `val` % `P`.
    pub fn reduce(val: u64) -> Self {
        Self((((((val >> MODULUS_BITS) + val + 1) >> MODULUS_BITS) + val) & (P as u64)) as u32)
    }

    pub const fn from_u32_unchecked(arg: u32) -> Self {
        Self(arg)
    }
}

impl Display for M31 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for M31 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::partial_reduce(self.0 + rhs.0)
    }
}

impl Neg for M31 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::partial_reduce(P - self.0)
    }
}

impl Sub for M31 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::partial_reduce(self.0 + P - rhs.0)
    }
}

impl Mul for M31 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::reduce((self.0 as u64) * (rhs.0 as u64))
    }
}

impl FieldExpOps for M31 {
    fn inverse(&self) -> Self {
        assert!(!self.is_zero(), "0 has no inverse");
        pow2147483645(*self)
    }
}

impl One for M31 {
    fn one() -> Self {
        Self(1)
    }
}

impl Zero for M31 {
    fn zero() -> Self {
        Self(0)
    }

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl From<usize> for M31 {
    fn from(value: usize) -> Self {
        Self((value % P as usize) as u32)
    }
}

impl From<u32> for M31 {
    fn from(value: u32) -> Self {
        M31::reduce(value.into())
    }
}

impl Distribution<M31> for Standard {
    // Not intended for cryptographic use. Should only be used in tests and benchmarks.
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> M31 {
        M31(rng.gen_range(0..P))
    }
}

/// `p - 1 = 2 * 3^2 * 7 * 11 * 31 * 151 * 331`, so only `-1` has two-power order.
/// Both 7 and 16807 generate the full multiplicative group.
impl DomainField for M31 {
    const TWO_ADICITY: u32 = 1;

    fn two_adic_root_of_unity() -> Self {
        Self(P - 1)
    }

    fn geometric_generator() -> Self {
        Self(16807)
    }

    fn arithmetic_generator() -> Self {
        Self(3)
    }

    fn multiplicative_generator() -> Self {
        Self(7)
    }
}

/// Embeds into `QM31`, whose multiplicative group has a subgroup of order `2^33`.
impl FftEmbedding for M31 {
    type Target = QM31;

    fn embed(self) -> QM31 {
        self.into()
    }

    fn project(value: QM31) -> Self {
        value.to_m31_array()[0]
    }
}

#[cfg(test)]
#[macro_export]
macro_rules! m31 {
    ($m:expr) => {
        $crate::core::fields::m31::M31::from_u32_unchecked($m)
    };
}

/// Computes `v^((2^31-1)-2)`.
///
/// Computes the multiplicative inverse of [`M31`] elements with 37 multiplications vs naive 60
/// multiplications. Multiplication tree found with [addchain](https://github.com/mmcloughlin/addchain).
pub fn pow2147483645<T: FieldExpOps>(v: T) -> T {
    let t0 = sqn::<2, T>(v.clone()) * v.clone();
    let t1 = sqn::<1, T>(t0.clone()) * t0.clone();
    let t2 = sqn::<3, T>(t1) * t0.clone();
    let t3 = sqn::<1, T>(t2.clone()) * t0;
    let t4 = sqn::<8, T>(t3.clone()) * t3.clone();
    let t5 = sqn::<8, T>(t4) * t3;
    sqn::<7, T>(t5) * t2
}

/// Computes `v^(2^n)`.
fn sqn<const N: usize, T: FieldExpOps>(mut v: T) -> T {
    for _ in 0..N {
        v = v.square();
    }
    v
}

#[cfg(test)]
mod tests {
    use num_traits::{One, Zero};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::{M31, P};
    use crate::core::fields::m31::{pow2147483645, BaseField};
    use crate::core::fields::{DomainField, FftEmbedding, FieldExpOps};

    fn mul_p(a: u32, b: u32) -> u32 {
        ((a as u64 * b as u64) % P as u64) as u32
    }

    fn add_p(a: u32, b: u32) -> u32 {
        (a + b) % P
    }

    fn neg_p(a: u32) -> u32 {
        if a == 0 {
            0
        } else {
            P - a
        }
    }

    #[test]
    fn test_basic_ops() {
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..10000 {
            let x: u32 = rng.gen::<u32>() % P;
            let y: u32 = rng.gen::<u32>() % P;
            assert_eq!(m31!(add_p(x, y)), m31!(x) + m31!(y));
            assert_eq!(m31!(mul_p(x, y)), m31!(x) * m31!(y));
            assert_eq!(m31!(neg_p(x)), -m31!(x));
        }
    }

    #[test]
    fn pow2147483645_works() {
        let v = BaseField::from(19u32);

        assert_eq!(pow2147483645(v), v.pow(2147483645));
    }

    #[test]
    fn test_from_unsigned() {
        assert_eq!(M31::from(P as usize + 3), m31!(3));
        assert_eq!(M31::from(P + 5), m31!(5));
    }

    #[test]
    fn embedding_preserves_products() {
        let mut rng = SmallRng::seed_from_u64(1);
        let x: M31 = rng.gen();
        let y: M31 = rng.gen();

        assert_eq!(M31::project(x.embed() * y.embed() + y.embed()), x * y + y);
    }

    #[test]
    fn test_two_adic_root() {
        let root = M31::two_adic_root_of_unity();

        assert_eq!(root.square(), M31::one());
        assert_ne!(root, M31::one());
    }

    #[test]
    fn test_generators_have_full_order() {
        // Prime factors of p - 1.
        let factors = [2u128, 3, 7, 11, 31, 151, 331];
        for g in [M31::geometric_generator(), M31::multiplicative_generator()] {
            assert!(!g.is_zero());
            for f in factors {
                assert_ne!(g.pow((P as u128 - 1) / f), M31::one());
            }
        }
    }
}
