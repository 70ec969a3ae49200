use std::fmt::{Debug, Display};
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use super::{DomainField, FftEmbedding, FieldExpOps};
use crate::core::fields::cm31::CM31;
use crate::core::fields::m31::M31;
use crate::{impl_extension_field, impl_field};

pub const R: CM31 = CM31::from_u32_unchecked(2, 1);

/// Extension field of CM31.
/// Equivalent to CM31\[x\] over (x^2 - 2 - i) as the irreducible polynomial.
/// Represented as ((a, b), (c, d)) of (a + bi) + (c + di)u.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QM31(pub CM31, pub CM31);
pub type SecureField = QM31;

impl_field!(QM31);
impl_extension_field!(QM31, CM31);

/// `u^((p^4 - 1) >> 33)`, a primitive `2^33`-th root of unity.
const TWO_ADIC_ROOT: QM31 = QM31::from_u32_unchecked(0, 0, 184040358, 61346786);

impl QM31 {
    pub const fn from_u32_unchecked(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self(
            CM31::from_u32_unchecked(a, b),
            CM31::from_u32_unchecked(c, d),
        )
    }

    pub fn to_m31_array(self) -> [M31; 4] {
        [self.0 .0, self.0 .1, self.1 .0, self.1 .1]
    }
}

impl Display for QM31 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) + ({})u", self.0, self.1)
    }
}

impl Debug for QM31 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) + ({})u", self.0, self.1)
    }
}

impl Mul for QM31 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        // (a + bu) * (c + du) = (ac + rbd) + (ad + bc)u.
        Self(
            self.0 * rhs.0 + R * self.1 * rhs.1,
            self.0 * rhs.1 + self.1 * rhs.0,
        )
    }
}

impl FieldExpOps for QM31 {
    fn inverse(&self) -> Self {
        assert!(!self.is_zero(), "0 has no inverse");
        // (a + bu)^-1 = (a - bu) / (a^2 - (2+i)b^2).
        let b2 = self.1.square();
        let ib2 = CM31(-b2.1, b2.0);
        let denom = self.0.square() - (b2 + b2 + ib2);
        let denom_inverse = denom.inverse();
        Self(self.0 * denom_inverse, -self.1 * denom_inverse)
    }
}

/// `|QM31*| = p^4 - 1 = 2^33 * odd`, so radix-2 domains up to size `2^33` exist here.
impl DomainField for QM31 {
    const TWO_ADICITY: u32 = 33;

    fn two_adic_root_of_unity() -> Self {
        TWO_ADIC_ROOT
    }

    fn geometric_generator() -> Self {
        M31::geometric_generator().into()
    }

    fn arithmetic_generator() -> Self {
        M31::arithmetic_generator().into()
    }

    fn multiplicative_generator() -> Self {
        M31::multiplicative_generator().into()
    }
}

impl FftEmbedding for QM31 {
    type Target = QM31;

    fn embed(self) -> QM31 {
        self
    }

    fn project(value: QM31) -> Self {
        value
    }
}

#[cfg(test)]
#[macro_export]
macro_rules! qm31 {
    ($m0:expr, $m1:expr, $m2:expr, $m3:expr) => {{
        use $crate::core::fields::qm31::QM31;
        QM31::from_u32_unchecked($m0, $m1, $m2, $m3)
    }};
}
