use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{span, Level};

use super::{resize_buffer, DomainError, EvaluationDomain};
use crate::core::fields::{batch_inverse, DomainField, ExtensionOf, FftEmbedding, Field};
use crate::core::parallel::{in_place_parallel_transform, parallel_binary_transform};
use crate::core::poly::basis_change::{
    monomial_to_newton_basis_geometric, newton_to_monomial_basis_geometric, triangular_powers,
    GeometricBasisTables,
};
use crate::core::poly::univariate::powers;
use crate::core::poly::utils::multiply_truncated;
use crate::core::thread_pool::ThreadPool;

/// Domain `{1, g, g^2, ..., g^(m-1)}` for a generator `g` of order at least `m`.
///
/// Transforms go through the Newton basis on the domain points, which turns both directions
/// into truncated polynomial products.
#[derive(Debug)]
pub struct GeometricSequenceDomain<F: DomainField> {
    size: usize,
    generator: F,
    pool: Arc<ThreadPool>,
    precomputed: OnceCell<Precomputed<F>>,
}

#[derive(Debug)]
struct Precomputed<F: Field> {
    /// `g^i`.
    powers: Vec<F>,
    /// `g^(i(i-1)/2)`.
    triangular: Vec<F>,
    inv_triangular: Vec<F>,
    basis: GeometricBasisTables<F>,
    /// `prod_{1 <= l <= i} (g^l - 1)`.
    diff_products: Vec<F>,
    inv_diff_products: Vec<F>,
    /// `(-1)^i g^(i(i-1)/2) / prod_{1 <= l <= i} (g^l - 1)`.
    inverse_kernel: Vec<F>,
    weights: Vec<F>,
}

impl<F: Field> Precomputed<F> {
    fn new(generator: F, m: usize) -> Result<Self, DomainError> {
        let _span = span!(Level::DEBUG, "Geometric domain precompute", size = m).entered();

        let powers = powers(generator, m);
        let triangular = triangular_powers(&powers);
        let basis = GeometricBasisTables::new(&powers, &triangular).ok_or(
            DomainError::InvalidArgument("generator order does not exceed the domain size"),
        )?;
        let inv_triangular = batch_inverse(&triangular);

        let mut diff_products = Vec::with_capacity(m);
        let mut acc = F::one();
        for (i, &power) in powers.iter().enumerate() {
            if i > 0 {
                acc *= power - F::one();
            }
            diff_products.push(acc);
        }
        let inv_diff_products = batch_inverse(&diff_products);
        let inverse_kernel = triangular
            .iter()
            .zip(&inv_diff_products)
            .enumerate()
            .map(|(i, (&tri, &inv))| if i % 2 == 1 { -(tri * inv) } else { tri * inv })
            .collect();

        let weights = lagrange_weights(&powers);

        Ok(Self {
            powers,
            triangular,
            inv_triangular,
            basis,
            diff_products,
            inv_diff_products,
            inverse_kernel,
            weights,
        })
    }
}

/// `w_i = 1 / prod_{j != i} (g^i - g^j)`, built incrementally from `w_0` without a
/// product per index.
fn lagrange_weights<F: Field>(powers: &[F]) -> Vec<F> {
    let m = powers.len();
    // gs[i - 1] = 1 - g^i.
    let gs = powers[1..]
        .iter()
        .map(|&power| F::one() - power)
        .collect::<Vec<_>>();
    let inv_gs = batch_inverse(&gs);
    let r = powers[m - 1].inverse();

    let mut weights = Vec::with_capacity(m);
    let mut gi = gs.iter().copied().product::<F>().inverse();
    let mut r_pow = F::one();
    weights.push(gi);
    for i in 1..m {
        gi = gi * gs[m - i - 1] * -inv_gs[i - 1] * powers[i];
        r_pow *= r;
        weights.push(r_pow * gi);
    }
    weights
}

impl<F: DomainField> GeometricSequenceDomain<F> {
    /// Domain of size `m` generated by the field's geometric generator.
    pub fn new(m: usize, pool: Arc<ThreadPool>) -> Result<Self, DomainError> {
        Self::with_generator(m, F::geometric_generator(), pool)
    }

    pub fn with_generator(
        m: usize,
        generator: F,
        pool: Arc<ThreadPool>,
    ) -> Result<Self, DomainError> {
        if m <= 1 {
            return Err(DomainError::InvalidArgument(
                "domain size must be greater than one",
            ));
        }
        if generator.is_zero() {
            return Err(DomainError::InvalidArgument("generator must be non-zero"));
        }
        Ok(Self {
            size: m,
            generator,
            pool,
            precomputed: OnceCell::new(),
        })
    }

    pub fn generator(&self) -> F {
        self.generator
    }

    fn precomputed(&self) -> Result<&Precomputed<F>, DomainError> {
        self.precomputed
            .get_or_try_init(|| Precomputed::new(self.generator, self.size))
    }
}

impl<F: DomainField> EvaluationDomain<F> for GeometricSequenceDomain<F> {
    fn size(&self) -> usize {
        self.size
    }

    fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    fn elements(&self) -> Result<&[F], DomainError> {
        Ok(&self.precomputed()?.powers)
    }

    fn barycentric_weights(&self) -> Result<&[F], DomainError> {
        Ok(&self.precomputed()?.weights)
    }

    fn fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        let m = self.size;
        let pre = self.precomputed()?;
        resize_buffer(buffer, m)?;
        let _span = span!(Level::INFO, "Geometric FFT", size = m).entered();

        let mut newton = monomial_to_newton_basis_geometric(&self.pool, buffer, &pre.basis)?;
        in_place_parallel_transform(&self.pool, &mut newton, &pre.triangular, |c, &tri| {
            *c *= tri
        })?;
        let conv = multiply_truncated(&self.pool, &newton, &pre.inv_diff_products, m)?;
        parallel_binary_transform(&self.pool, &conv, &pre.diff_products, buffer, |&v, &d| {
            v * d
        })?;
        Ok(())
    }

    fn inverse_fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        let m = self.size;
        let pre = self.precomputed()?;
        resize_buffer(buffer, m)?;
        let _span = span!(Level::INFO, "Geometric inverse FFT", size = m).entered();

        in_place_parallel_transform(&self.pool, buffer, &pre.inv_diff_products, |v, &inv| {
            *v *= inv
        })?;
        let mut newton = multiply_truncated(&self.pool, buffer, &pre.inverse_kernel, m)?;
        in_place_parallel_transform(&self.pool, &mut newton, &pre.inv_triangular, |c, &inv| {
            *c *= inv
        })?;
        *buffer = newton_to_monomial_basis_geometric(&self.pool, &newton, &pre.basis)?;
        Ok(())
    }

    fn evaluate_all_lagrange_polynomials<E: ExtensionOf<F>>(
        &self,
        t: E,
    ) -> Result<Vec<E>, DomainError> {
        let pre = self.precomputed()?;
        let vanishing = pre.powers.iter().map(|&x| t - x).product();
        super::lagrange_from_weights(&self.pool, &pre.powers, &pre.weights, t, vanishing)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use num_traits::{One, Zero};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::GeometricSequenceDomain;
    use crate::core::domain::{DomainError, EvaluationDomain};
    use crate::core::fields::m31::BaseField;
    use crate::core::fields::qm31::SecureField;
    use crate::core::fields::{DomainField, FieldExpOps};
    use crate::core::poly::univariate::horner_eval;
    use crate::core::thread_pool::{PoolLevel, ThreadPool};

    fn pool() -> Arc<ThreadPool> {
        Arc::new(ThreadPool::new(PoolLevel::Low, 4, 8).unwrap())
    }

    #[test_log::test]
    fn fft_evaluates_on_powers_of_generator() {
        let domain = GeometricSequenceDomain::<BaseField>::new(13, pool()).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        let coeffs = (0..13).map(|_| rng.gen()).collect::<Vec<BaseField>>();
        let mut evals = coeffs.clone();

        domain.fft(&mut evals).unwrap();

        let g = BaseField::geometric_generator();
        for (i, eval) in evals.iter().enumerate() {
            assert_eq!(*eval, horner_eval(&coeffs, g.pow(i as u128)));
        }
    }

    #[test]
    fn round_trip_over_extension_buffers() {
        let domain = GeometricSequenceDomain::<BaseField>::new(37, pool()).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let coeffs = (0..37).map(|_| rng.gen()).collect::<Vec<SecureField>>();
        let mut buffer = coeffs.clone();

        domain.fft(&mut buffer).unwrap();
        domain.inverse_fft(&mut buffer).unwrap();

        assert_eq!(buffer, coeffs);
    }

    #[test_log::test]
    fn large_domain_round_trip() {
        let domain = GeometricSequenceDomain::<BaseField>::new(300, pool()).unwrap();
        let mut rng = SmallRng::seed_from_u64(4);
        let coeffs = (0..300).map(|_| rng.gen()).collect::<Vec<BaseField>>();
        let mut buffer = coeffs.clone();

        domain.fft(&mut buffer).unwrap();
        let evals = buffer.clone();
        domain.inverse_fft(&mut buffer).unwrap();

        for i in [0, 1, 150, 299] {
            let x = domain.get_domain_element(i).unwrap();
            assert_eq!(evals[i], horner_eval(&coeffs, x));
        }
        assert_eq!(buffer, coeffs);
    }

    #[test]
    fn inverse_fft_interpolates() {
        let domain = GeometricSequenceDomain::<SecureField>::new(9, pool()).unwrap();
        let mut rng = SmallRng::seed_from_u64(2);
        let values = (0..9).map(|_| rng.gen()).collect::<Vec<SecureField>>();
        let mut coeffs = values.clone();

        domain.inverse_fft(&mut coeffs).unwrap();

        for (i, value) in values.iter().enumerate() {
            let x = domain.get_domain_element(i).unwrap();
            assert_eq!(horner_eval(&coeffs, x), *value);
        }
    }

    #[test]
    fn vanishing_polynomial_has_domain_roots() {
        let domain = GeometricSequenceDomain::<BaseField>::new(11, pool()).unwrap();

        for i in 0..11 {
            let x = domain.get_domain_element(i).unwrap();
            assert!(domain.compute_vanishing_polynomial(x).unwrap().is_zero());
        }
        assert!(!domain
            .compute_vanishing_polynomial(BaseField::from(2u32))
            .unwrap()
            .is_zero());
    }

    #[test]
    fn lagrange_interpolation_identity() {
        let domain = GeometricSequenceDomain::<BaseField>::new(10, pool()).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let values = (0..10).map(|_| rng.gen()).collect::<Vec<SecureField>>();
        let mut coeffs = values.clone();
        domain.inverse_fft(&mut coeffs).unwrap();
        let t: SecureField = rng.gen();

        let lagrange = domain.evaluate_all_lagrange_polynomials(t).unwrap();

        let interpolated = values
            .iter()
            .zip(&lagrange)
            .map(|(&v, &l)| v * l)
            .sum::<SecureField>();
        assert_eq!(interpolated, horner_eval(&coeffs, t));
    }

    #[test]
    fn lagrange_exact_hit_is_unit_vector() {
        let domain = GeometricSequenceDomain::<BaseField>::new(6, pool()).unwrap();

        for i in 0..6 {
            let x = domain.get_domain_element(i).unwrap();
            let lagrange = domain.evaluate_all_lagrange_polynomials(x).unwrap();

            for (j, l) in lagrange.iter().enumerate() {
                assert_eq!(*l, if i == j { BaseField::one() } else { BaseField::zero() });
            }
        }
    }

    #[test]
    fn construction_errors() {
        assert!(matches!(
            GeometricSequenceDomain::<BaseField>::new(1, pool()),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            GeometricSequenceDomain::<BaseField>::new(0, pool()),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            GeometricSequenceDomain::with_generator(4, BaseField::zero(), pool()),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn generator_of_small_order_is_rejected_lazily() {
        let domain =
            GeometricSequenceDomain::with_generator(4, -BaseField::one(), pool()).unwrap();

        assert!(matches!(
            domain.get_domain_element(0),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            domain.fft(&mut vec![BaseField::one(); 4]),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let domain = GeometricSequenceDomain::<BaseField>::new(5, pool()).unwrap();
        let mut buffer = vec![BaseField::one(); 6];

        assert!(matches!(
            domain.fft(&mut buffer),
            Err(DomainError::SizeMismatch {
                expected: 5,
                actual: 6
            })
        ));
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn add_poly_z_requires_m_plus_one_coefficients() {
        let domain = GeometricSequenceDomain::<BaseField>::new(5, pool()).unwrap();
        let mut h = vec![BaseField::zero(); 5];

        assert!(matches!(
            domain.add_poly_z(BaseField::one(), &mut h),
            Err(DomainError::SizeMismatch {
                expected: 6,
                actual: 5
            })
        ));

        let mut h = vec![BaseField::zero(); 6];
        domain.add_poly_z(BaseField::one(), &mut h).unwrap();
        for i in 0..5 {
            let x = domain.get_domain_element(i).unwrap();
            assert!(horner_eval(&h, x).is_zero());
        }
        assert_eq!(h[5], BaseField::one());
    }
}
