//! Evaluation domains: ordered sets of `m` field elements with fast transforms between the
//! coefficients of a polynomial of degree `< m` and its evaluations on the domain.
use std::sync::Arc;

use num_traits::Zero;
use thiserror::Error;
use tracing::{debug, span, Level};

use super::fields::{batch_inverse, DomainField, ExtensionOf, FftEmbedding, Field};
use super::parallel::{in_place_parallel_transform, parallel_binary_transform, parallel_foreach};
use super::poly::UnivariatePoly;
use super::thread_pool::{wait_for_all, PoolError, ThreadPool};

pub mod arithmetic;
pub mod extended_radix2;
pub mod geometric;
pub mod radix2;
pub mod step_radix2;

pub use arithmetic::ArithmeticSequenceDomain;
pub use extended_radix2::ExtendedRadix2Domain;
pub use geometric::GeometricSequenceDomain;
pub use radix2::BasicRadix2Domain;
pub use step_radix2::StepRadix2Domain;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("buffer of length {actual} does not fit a domain of size {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("no evaluation domain of size {0}")]
    InvalidDomainSize(usize),
    #[error("index {index} out of bounds for a domain of size {size}")]
    IndexOutOfBounds { index: usize, size: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Operations shared by every domain variant.
///
/// Buffers and evaluation points may live in any extension `E` of the domain field `F`.
pub trait EvaluationDomain<F: DomainField> {
    /// Number of domain elements `m`.
    fn size(&self) -> usize;

    /// The pool the domain's parallel loops run on.
    fn pool(&self) -> &ThreadPool;

    /// All domain elements, in order. Triggers lazy precomputation.
    fn elements(&self) -> Result<&[F], DomainError>;

    /// Barycentric weights `w_i = 1 / prod_{j != i} (x_i - x_j)`.
    fn barycentric_weights(&self) -> Result<&[F], DomainError>;

    /// Replaces the coefficients in `buffer` with the evaluations on the domain.
    fn fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding;

    /// Inverse of [`Self::fft`].
    fn inverse_fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding;

    fn get_domain_element(&self, idx: usize) -> Result<F, DomainError> {
        let size = self.size();
        self.elements()?
            .get(idx)
            .copied()
            .ok_or(DomainError::IndexOutOfBounds { index: idx, size })
    }

    /// `Z(t) = prod_i (t - x_i)`.
    fn compute_vanishing_polynomial<E: ExtensionOf<F>>(&self, t: E) -> Result<E, DomainError> {
        Ok(self.elements()?.iter().map(|&x| t - x).product())
    }

    /// `Z` in coefficient form.
    fn get_vanishing_polynomial(&self) -> Result<UnivariatePoly<F>, DomainError> {
        let _span = span!(Level::DEBUG, "Vanishing polynomial", size = self.size()).entered();
        Ok(self
            .elements()?
            .iter()
            .fold(UnivariatePoly::from(F::one()), |acc, &x| {
                acc * UnivariatePoly::linear(x)
            }))
    }

    /// Evaluations `L_i(t)` of every Lagrange basis polynomial of the domain.
    fn evaluate_all_lagrange_polynomials<E: ExtensionOf<F>>(
        &self,
        t: E,
    ) -> Result<Vec<E>, DomainError> {
        let vanishing = self.compute_vanishing_polynomial(t)?;
        lagrange_from_weights(
            self.pool(),
            self.elements()?,
            self.barycentric_weights()?,
            t,
            vanishing,
        )
    }

    /// Same as [`Self::evaluate_all_lagrange_polynomials`], given `t_powers[j] = t^j` instead of
    /// `t`. At least `m` powers are required.
    fn evaluate_all_lagrange_polynomials_from_powers<E: ExtensionOf<F>>(
        &self,
        t_powers: &[E],
    ) -> Result<Vec<E>, DomainError> {
        let m = self.size();
        if t_powers.len() < m {
            return Err(DomainError::InvalidArgument(
                "fewer powers than domain elements",
            ));
        }
        let z = self.get_vanishing_polynomial()?;
        lagrange_from_powers(
            self.pool(),
            self.elements()?,
            self.barycentric_weights()?,
            &z,
            t_powers,
        )
    }

    /// Adds `coeff * Z` to the `m + 1` coefficients in `h`.
    fn add_poly_z(&self, coeff: F, h: &mut [F]) -> Result<(), DomainError> {
        let m = self.size();
        if h.len() != m + 1 {
            return Err(DomainError::SizeMismatch {
                expected: m + 1,
                actual: h.len(),
            });
        }
        let z = self.get_vanishing_polynomial()?;
        for (dst, &zi) in h.iter_mut().zip(z.iter()) {
            *dst += coeff * zi;
        }
        Ok(())
    }

    /// Divides every evaluation by `Z(c)`, `c` being the field's multiplicative generator.
    ///
    /// `buffer` may be shorter than the domain, but not longer.
    fn divide_by_z_on_coset<E: ExtensionOf<F>>(&self, buffer: &mut [E]) -> Result<(), DomainError> {
        ensure_fits(buffer.len(), self.size())?;
        let z = self.compute_vanishing_polynomial(F::multiplicative_generator())?;
        if z.is_zero() {
            return Err(DomainError::DivisionByZero);
        }
        let z_inv = z.inverse();
        parallel_foreach(self.pool(), buffer, |v| *v *= z_inv)?;
        Ok(())
    }
}

fn ensure_fits(len: usize, m: usize) -> Result<(), DomainError> {
    if len > m {
        return Err(DomainError::SizeMismatch {
            expected: m,
            actual: len,
        });
    }
    Ok(())
}

/// Zero-pads `buffer` to `m` elements, failing if it is already longer.
pub(crate) fn resize_buffer<E: Zero + Clone>(
    buffer: &mut Vec<E>,
    m: usize,
) -> Result<(), DomainError> {
    ensure_fits(buffer.len(), m)?;
    buffer.resize(m, E::zero());
    Ok(())
}

/// `n` as a field element, for `n` a power of two.
pub(crate) fn power_of_two<F: Field>(n: usize) -> F {
    (0..n.ilog2()).fold(F::one(), |acc, _| acc.double())
}

/// Divides the evaluation at `x_i` by `Z(c * x_i)`, `c` being the field's multiplicative
/// generator. Used by the domains whose vanishing polynomial is not constant on that coset.
pub(crate) fn divide_by_z_on_coset_points<F, E, D>(
    domain: &D,
    buffer: &mut [E],
) -> Result<(), DomainError>
where
    F: DomainField,
    E: ExtensionOf<F>,
    D: EvaluationDomain<F>,
{
    ensure_fits(buffer.len(), domain.size())?;
    let coset = F::multiplicative_generator();
    let z = domain.elements()?[..buffer.len()]
        .iter()
        .map(|&x| domain.compute_vanishing_polynomial(coset * x))
        .collect::<Result<Vec<F>, _>>()?;
    if z.iter().any(F::is_zero) {
        return Err(DomainError::DivisionByZero);
    }
    let z_inv = batch_inverse(&z);
    in_place_parallel_transform(domain.pool(), buffer, &z_inv, |v, &zi| *v *= zi)?;
    Ok(())
}

/// `L_i(t) = Z(t) * w_i / (t - x_i)`, or the unit vector `e_i` when `t = x_i`.
pub(crate) fn lagrange_from_weights<F, E>(
    pool: &ThreadPool,
    elements: &[F],
    weights: &[F],
    t: E,
    vanishing: E,
) -> Result<Vec<E>, DomainError>
where
    F: DomainField,
    E: ExtensionOf<F>,
{
    let m = elements.len();
    if let Some(i) = elements.iter().position(|&x| t == E::from(x)) {
        let mut res = vec![E::zero(); m];
        res[i] = E::one();
        return Ok(res);
    }
    let diffs = elements.iter().map(|&x| t - x).collect::<Vec<E>>();
    let inv_diffs = E::batch_inverse(&diffs);
    let mut res = vec![E::zero(); m];
    parallel_binary_transform(pool, &inv_diffs, weights, &mut res, |&d, &w| {
        d * w * vanishing
    })?;
    Ok(res)
}

/// Streaming Lagrange evaluation: `L_i = w_i * <Z / (x - x_i), t_powers>`.
pub(crate) fn lagrange_from_powers<F, E>(
    pool: &ThreadPool,
    elements: &[F],
    weights: &[F],
    z: &UnivariatePoly<F>,
    t_powers: &[E],
) -> Result<Vec<E>, DomainError>
where
    F: DomainField,
    E: ExtensionOf<F>,
{
    let m = elements.len();
    debug_assert_eq!(z.len(), m + 1);
    let mut res = vec![E::zero(); m];
    let handles = pool.block_execution_mut(&mut res, |offset, chunk| {
        for (i, dst) in (offset..).zip(chunk.iter_mut()) {
            let x = elements[i];
            if t_powers[0] * x == t_powers[1] {
                // t coincides with x_i.
                *dst = t_powers[0];
                continue;
            }
            // Synthetic division of Z by (x - x_i), dotted with the powers on the fly.
            let mut acc = F::zero();
            let mut sum = E::zero();
            for k in (1..=m).rev() {
                acc = acc * x + z[k];
                sum += t_powers[k - 1] * acc;
            }
            *dst = sum * weights[i];
        }
    })?;
    wait_for_all(handles)?;
    Ok(res)
}

/// Primitive `n`-th root of unity, for `n` a power of two not exceeding `2^TWO_ADICITY`.
pub fn unity_root<F: DomainField>(n: usize) -> Result<F, DomainError> {
    if !n.is_power_of_two() {
        return Err(DomainError::InvalidArgument("order must be a power of two"));
    }
    F::two_adic_root(n.ilog2()).ok_or(DomainError::InvalidArgument(
        "order exceeds the two-adicity of the field",
    ))
}

/// A domain of any supported kind.
#[derive(Debug)]
pub enum Domain<F: DomainField> {
    Radix2(BasicRadix2Domain<F>),
    ExtendedRadix2(ExtendedRadix2Domain<F>),
    StepRadix2(StepRadix2Domain<F>),
    GeometricSequence(GeometricSequenceDomain<F>),
    ArithmeticSequence(ArithmeticSequenceDomain<F>),
}

macro_rules! dispatch {
    ($self:ident, $domain:ident => $body:expr) => {
        match $self {
            Domain::Radix2($domain) => $body,
            Domain::ExtendedRadix2($domain) => $body,
            Domain::StepRadix2($domain) => $body,
            Domain::GeometricSequence($domain) => $body,
            Domain::ArithmeticSequence($domain) => $body,
        }
    };
}

impl<F: DomainField> EvaluationDomain<F> for Domain<F> {
    fn size(&self) -> usize {
        dispatch!(self, d => d.size())
    }

    fn pool(&self) -> &ThreadPool {
        dispatch!(self, d => d.pool())
    }

    fn elements(&self) -> Result<&[F], DomainError> {
        dispatch!(self, d => d.elements())
    }

    fn barycentric_weights(&self) -> Result<&[F], DomainError> {
        dispatch!(self, d => d.barycentric_weights())
    }

    fn fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        dispatch!(self, d => d.fft(buffer))
    }

    fn inverse_fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        dispatch!(self, d => d.inverse_fft(buffer))
    }

    fn compute_vanishing_polynomial<E: ExtensionOf<F>>(&self, t: E) -> Result<E, DomainError> {
        dispatch!(self, d => d.compute_vanishing_polynomial(t))
    }

    fn get_vanishing_polynomial(&self) -> Result<UnivariatePoly<F>, DomainError> {
        dispatch!(self, d => d.get_vanishing_polynomial())
    }

    fn evaluate_all_lagrange_polynomials<E: ExtensionOf<F>>(
        &self,
        t: E,
    ) -> Result<Vec<E>, DomainError> {
        dispatch!(self, d => d.evaluate_all_lagrange_polynomials(t))
    }

    fn divide_by_z_on_coset<E: ExtensionOf<F>>(&self, buffer: &mut [E]) -> Result<(), DomainError> {
        dispatch!(self, d => d.divide_by_z_on_coset(buffer))
    }
}

/// Picks a domain with at least `m` elements.
///
/// The roots-of-unity variants (basic, extended, step) are tried for `m`, then for `m` rounded up
/// to `big + 2^ceil(log2(m - big))`, `big` being the largest power of two below `m`. Only then
/// does it fall back to a geometric and finally an arithmetic sequence of exactly `m` elements.
/// The returned domain may therefore be larger than `m`; see [`EvaluationDomain::size`].
pub fn make_evaluation_domain<F: DomainField>(
    m: usize,
    pool: Arc<ThreadPool>,
) -> Result<Domain<F>, DomainError> {
    if m <= 1 {
        return Err(DomainError::InvalidDomainSize(m));
    }
    let big = m.next_power_of_two() / 2;
    let rounded = big + (m - big).next_power_of_two();
    let sizes = if rounded == m { vec![m] } else { vec![m, rounded] };
    for size in sizes {
        if let Some(domain) = make_roots_of_unity_domain(size, &pool) {
            debug!(m, size, "picked a roots-of-unity domain");
            return Ok(domain);
        }
    }
    let geometric = GeometricSequenceDomain::new(m, Arc::clone(&pool))?;
    match geometric.elements() {
        Ok(_) => return Ok(Domain::GeometricSequence(geometric)),
        Err(DomainError::InvalidArgument(_)) => {}
        Err(err) => return Err(err),
    }
    let arithmetic = ArithmeticSequenceDomain::new(m, pool)?;
    arithmetic.elements()?;
    Ok(Domain::ArithmeticSequence(arithmetic))
}

fn make_roots_of_unity_domain<F: DomainField>(
    size: usize,
    pool: &Arc<ThreadPool>,
) -> Option<Domain<F>> {
    BasicRadix2Domain::new(size, Arc::clone(pool))
        .map(Domain::Radix2)
        .or_else(|_| {
            ExtendedRadix2Domain::new(size, Arc::clone(pool)).map(Domain::ExtendedRadix2)
        })
        .or_else(|_| StepRadix2Domain::new(size, Arc::clone(pool)).map(Domain::StepRadix2))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use num_traits::{One, Zero};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::{make_evaluation_domain, unity_root, Domain, DomainError, EvaluationDomain};
    use crate::core::fields::m31::BaseField;
    use crate::core::fields::qm31::SecureField;
    use crate::core::fields::{DomainField, FieldExpOps};
    use crate::core::poly::univariate::{horner_eval, powers};
    use crate::core::thread_pool::{PoolLevel, ThreadPool};

    fn pool() -> Arc<ThreadPool> {
        Arc::new(ThreadPool::new(PoolLevel::Low, 4, 4).unwrap())
    }

    #[test]
    fn unity_root_has_exact_order() {
        for log_n in [0, 1, 5, 20, SecureField::TWO_ADICITY] {
            let n = 1usize << log_n;
            let root = unity_root::<SecureField>(n).unwrap();

            assert_eq!(root.pow(n as u128), SecureField::one());
            if n > 1 {
                assert_ne!(root.pow(n as u128 / 2), SecureField::one());
            }
        }
    }

    #[test]
    fn unity_root_rejects_unsupported_orders() {
        assert!(matches!(
            unity_root::<SecureField>(12),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            unity_root::<BaseField>(4),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn make_evaluation_domain_picks_variant() {
        let pool = pool();
        let pick = |m, base: bool| {
            let pool = Arc::clone(&pool);
            if base {
                make_evaluation_domain::<BaseField>(m, pool).map(|d| (kind(&d), d.size()))
            } else {
                make_evaluation_domain::<SecureField>(m, pool).map(|d| (kind(&d), d.size()))
            }
        };

        assert_eq!(pick(8, false).unwrap(), ("radix2", 8));
        assert_eq!(pick(6, false).unwrap(), ("step", 6));
        assert_eq!(pick(5, false).unwrap(), ("step", 5));
        assert_eq!(pick(3, false).unwrap(), ("step", 3));
        // 7 rounds up to 4 + 4.
        assert_eq!(pick(7, false).unwrap(), ("radix2", 8));
        assert_eq!(pick(2, true).unwrap(), ("radix2", 2));
        assert_eq!(pick(4, true).unwrap(), ("extended", 4));
        assert_eq!(pick(3, true).unwrap(), ("geometric", 3));
        assert_eq!(pick(8, true).unwrap(), ("geometric", 8));
        assert!(matches!(pick(1, true), Err(DomainError::InvalidDomainSize(1))));
    }

    fn kind<F: DomainField>(domain: &Domain<F>) -> &'static str {
        match domain {
            Domain::Radix2(_) => "radix2",
            Domain::ExtendedRadix2(_) => "extended",
            Domain::StepRadix2(_) => "step",
            Domain::GeometricSequence(_) => "geometric",
            Domain::ArithmeticSequence(_) => "arithmetic",
        }
    }

    #[test]
    fn base_field_radix2_of_size_two() {
        let domain = make_evaluation_domain::<BaseField>(2, pool()).unwrap();

        assert!(matches!(domain, Domain::Radix2(_)));
        assert_eq!(domain.get_domain_element(1).unwrap(), -BaseField::one());
    }

    #[test_log::test]
    fn every_variant_satisfies_the_domain_contract() {
        let pool = pool();
        let mut rng = SmallRng::seed_from_u64(0);
        for m in [2, 3, 4, 6, 7, 16] {
            let domain = make_evaluation_domain::<SecureField>(m, Arc::clone(&pool)).unwrap();
            let n = domain.size();
            let coeffs = (0..n).map(|_| rng.gen()).collect::<Vec<SecureField>>();
            let t: SecureField = rng.gen();

            let mut evals = coeffs.clone();
            domain.fft(&mut evals).unwrap();
            let lagrange = domain.evaluate_all_lagrange_polynomials(t).unwrap();
            let from_powers = domain
                .evaluate_all_lagrange_polynomials_from_powers(&powers(t, n))
                .unwrap();
            let interpolated = evals
                .iter()
                .zip(&lagrange)
                .map(|(&v, &l)| v * l)
                .sum::<SecureField>();
            let mut roundtrip = evals.clone();
            domain.inverse_fft(&mut roundtrip).unwrap();

            for (i, &eval) in evals.iter().enumerate() {
                let x = domain.get_domain_element(i).unwrap();
                assert_eq!(eval, horner_eval(&coeffs, SecureField::from(x)));
                assert!(domain.compute_vanishing_polynomial(x).unwrap().is_zero());
            }
            assert_eq!(interpolated, horner_eval(&coeffs, t));
            assert_eq!(lagrange, from_powers);
            assert_eq!(roundtrip, coeffs);
        }
    }

    #[test]
    fn lagrange_at_domain_point_is_unit_vector() {
        let pool = pool();
        for m in [4, 5] {
            let domain = make_evaluation_domain::<SecureField>(m, Arc::clone(&pool)).unwrap();
            for i in 0..m {
                let x = SecureField::from(domain.get_domain_element(i).unwrap());

                let lagrange = domain.evaluate_all_lagrange_polynomials(x).unwrap();
                let from_powers = domain
                    .evaluate_all_lagrange_polynomials_from_powers(&powers(x, m + 2))
                    .unwrap();

                for j in 0..m {
                    let expected = if i == j {
                        SecureField::one()
                    } else {
                        SecureField::zero()
                    };
                    assert_eq!(lagrange[j], expected);
                    assert_eq!(from_powers[j], expected);
                }
            }
        }
    }

    #[test]
    fn lagrange_from_powers_requires_enough_powers() {
        let domain = make_evaluation_domain::<SecureField>(5, pool()).unwrap();

        let result = domain.evaluate_all_lagrange_polynomials_from_powers(&[SecureField::one(); 4]);

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn vanishing_polynomial_matches_pointwise_evaluation() {
        let pool = pool();
        let mut rng = SmallRng::seed_from_u64(1);
        for m in [4, 6] {
            let domain = make_evaluation_domain::<SecureField>(m, Arc::clone(&pool)).unwrap();
            let t: SecureField = rng.gen();

            let z = domain.get_vanishing_polynomial().unwrap();

            assert_eq!(z.len(), m + 1);
            assert_eq!(z.eval_at_point(t), domain.compute_vanishing_polynomial(t).unwrap());
        }
    }

    #[test]
    fn add_poly_z_accumulates_scaled_vanishing_polynomial() {
        let pool = pool();
        let mut rng = SmallRng::seed_from_u64(2);
        for m in [4, 5] {
            let domain = make_evaluation_domain::<BaseField>(m, Arc::clone(&pool)).unwrap();
            let coeff: BaseField = rng.gen();
            let original = (0..=m).map(|_| rng.gen()).collect::<Vec<BaseField>>();
            let mut h = original.clone();

            domain.add_poly_z(coeff, &mut h).unwrap();

            let z = domain.get_vanishing_polynomial().unwrap();
            for i in 0..=m {
                assert_eq!(h[i], original[i] + coeff * z[i]);
            }
            assert!(matches!(
                domain.add_poly_z(coeff, &mut h[..m]),
                Err(DomainError::SizeMismatch { expected, actual }) if expected == m + 1 && actual == m
            ));
        }
    }

    #[test]
    fn divide_by_z_on_coset_scales_by_inverse() {
        let pool = pool();
        let mut rng = SmallRng::seed_from_u64(3);
        let radix2 = make_evaluation_domain::<SecureField>(4, Arc::clone(&pool)).unwrap();
        let geometric = make_evaluation_domain::<BaseField>(8, Arc::clone(&pool)).unwrap();
        let values = (0..8).map(|_| rng.gen()).collect::<Vec<SecureField>>();

        let mut divided = values[..4].to_vec();
        radix2.divide_by_z_on_coset(&mut divided).unwrap();
        let z = radix2
            .compute_vanishing_polynomial(SecureField::multiplicative_generator())
            .unwrap();
        for (d, v) in divided.iter().zip(&values) {
            assert_eq!(*d * z, *v);
        }

        let mut divided = values.clone();
        geometric.divide_by_z_on_coset(&mut divided).unwrap();
        let z = geometric
            .compute_vanishing_polynomial(SecureField::from(BaseField::multiplicative_generator()))
            .unwrap();
        for (d, v) in divided.iter().zip(&values) {
            assert_eq!(*d * z, *v);
        }
    }

    #[test]
    fn divide_by_z_on_coset_per_point_for_step_domain() {
        let domain = make_evaluation_domain::<SecureField>(6, pool()).unwrap();
        let c = SecureField::multiplicative_generator();
        let mut values = vec![SecureField::one(); 6];

        domain.divide_by_z_on_coset(&mut values).unwrap();

        assert!(matches!(domain, Domain::StepRadix2(_)));
        for (i, v) in values.iter().enumerate() {
            let x = domain.get_domain_element(i).unwrap();
            let z = domain.compute_vanishing_polynomial(c * x).unwrap();
            assert_eq!(*v * z, SecureField::one());
        }
    }

    #[test]
    fn divide_by_z_on_coset_rejects_oversized_buffer() {
        let pool = pool();
        let geometric = make_evaluation_domain::<BaseField>(8, Arc::clone(&pool)).unwrap();
        let radix2 = make_evaluation_domain::<SecureField>(4, pool).unwrap();
        let mut short = vec![BaseField::one(); 3];

        geometric.divide_by_z_on_coset(&mut short).unwrap();

        assert!(matches!(
            geometric.divide_by_z_on_coset(&mut [BaseField::one(); 9]),
            Err(DomainError::SizeMismatch {
                expected: 8,
                actual: 9
            })
        ));
        assert!(matches!(
            radix2.divide_by_z_on_coset(&mut [SecureField::one(); 5]),
            Err(DomainError::SizeMismatch {
                expected: 4,
                actual: 5
            })
        ));
    }

    #[test]
    fn fft_rejects_oversized_buffer() {
        let pool = pool();
        for m in [4, 5] {
            let domain = make_evaluation_domain::<SecureField>(m, Arc::clone(&pool)).unwrap();
            let mut buffer = vec![SecureField::one(); m + 1];

            assert!(matches!(
                domain.fft(&mut buffer),
                Err(DomainError::SizeMismatch { expected, actual }) if expected == m && actual == m + 1
            ));
            assert!(matches!(
                domain.inverse_fft(&mut buffer),
                Err(DomainError::SizeMismatch { .. })
            ));
        }
    }

    #[test]
    fn fft_pads_short_buffer() {
        let domain = make_evaluation_domain::<SecureField>(6, pool()).unwrap();
        let mut buffer = vec![SecureField::one(), SecureField::one()];

        domain.fft(&mut buffer).unwrap();

        assert_eq!(buffer.len(), 6);
        for (i, eval) in buffer.iter().enumerate() {
            let x = domain.get_domain_element(i).unwrap();
            assert_eq!(*eval, SecureField::from(x + BaseField::one()));
        }
    }

    #[test]
    fn domain_element_out_of_bounds() {
        let domain = make_evaluation_domain::<SecureField>(4, pool()).unwrap();

        assert!(matches!(
            domain.get_domain_element(4),
            Err(DomainError::IndexOutOfBounds { index: 4, size: 4 })
        ));
    }
}
