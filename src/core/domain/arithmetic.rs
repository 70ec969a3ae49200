use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{span, Level};

use super::{resize_buffer, DomainError, EvaluationDomain};
use crate::core::fields::{batch_inverse, DomainField, ExtensionOf, FftEmbedding, Field};
use crate::core::parallel::{in_place_parallel_transform, parallel_binary_transform};
use crate::core::poly::basis_change::{monomial_to_newton_basis, newton_to_monomial_basis};
use crate::core::poly::univariate::powers;
use crate::core::poly::utils::multiply_truncated;
use crate::core::thread_pool::ThreadPool;

/// Domain `{0, h, 2h, ..., (m-1)h}`.
///
/// Needs `i!` to be invertible for every `i < m`, i.e. a field characteristic larger than `m`.
#[derive(Debug)]
pub struct ArithmeticSequenceDomain<F: DomainField> {
    size: usize,
    step: F,
    pool: Arc<ThreadPool>,
    precomputed: OnceCell<Precomputed<F>>,
}

#[derive(Debug)]
struct Precomputed<F: Field> {
    elements: Vec<F>,
    factorials: Vec<F>,
    inv_factorials: Vec<F>,
    /// `(-1)^i / i!`.
    inverse_kernel: Vec<F>,
    step_powers: Vec<F>,
    inv_step_powers: Vec<F>,
    weights: Vec<F>,
}

impl<F: Field> Precomputed<F> {
    fn new(step: F, m: usize) -> Result<Self, DomainError> {
        let _span = span!(Level::DEBUG, "Arithmetic domain precompute", size = m).entered();

        let mut elements = Vec::with_capacity(m);
        let mut factorials = Vec::with_capacity(m);
        let mut x = F::zero();
        let mut i = F::zero();
        let mut factorial = F::one();
        for k in 0..m {
            if k > 0 {
                x += step;
                i += F::one();
                factorial *= i;
            }
            elements.push(x);
            factorials.push(factorial);
        }
        if factorial.is_zero() {
            return Err(DomainError::InvalidArgument(
                "field characteristic does not exceed the domain size",
            ));
        }
        let inv_factorials = batch_inverse(&factorials);
        let inverse_kernel = inv_factorials
            .iter()
            .enumerate()
            .map(|(i, &inv)| if i % 2 == 1 { -inv } else { inv })
            .collect();
        let step_powers = powers(step, m);
        let inv_step_powers = batch_inverse(&step_powers);

        // w_0 = 1 / prod_{j >= 1} (0 - x_j), then w_i = w_{i-1} (x_{i-1} - x_{m-1}) / x_i.
        let mut weights = Vec::with_capacity(m);
        let inv_elements = batch_inverse(&elements[1..]);
        let mut w = elements[1..]
            .iter()
            .map(|&x| -x)
            .product::<F>()
            .inverse();
        weights.push(w);
        for i in 1..m {
            w *= (elements[i - 1] - elements[m - 1]) * inv_elements[i - 1];
            weights.push(w);
        }

        Ok(Self {
            elements,
            factorials,
            inv_factorials,
            inverse_kernel,
            step_powers,
            inv_step_powers,
            weights,
        })
    }
}

impl<F: DomainField> ArithmeticSequenceDomain<F> {
    /// Domain of size `m` with the field's arithmetic generator as step.
    pub fn new(m: usize, pool: Arc<ThreadPool>) -> Result<Self, DomainError> {
        Self::with_step(m, F::arithmetic_generator(), pool)
    }

    pub fn with_step(m: usize, step: F, pool: Arc<ThreadPool>) -> Result<Self, DomainError> {
        if m <= 1 {
            return Err(DomainError::InvalidArgument(
                "domain size must be greater than one",
            ));
        }
        if step.is_zero() {
            return Err(DomainError::InvalidArgument("step must be non-zero"));
        }
        Ok(Self {
            size: m,
            step,
            pool,
            precomputed: OnceCell::new(),
        })
    }

    pub fn step(&self) -> F {
        self.step
    }

    fn precomputed(&self) -> Result<&Precomputed<F>, DomainError> {
        self.precomputed
            .get_or_try_init(|| Precomputed::new(self.step, self.size))
    }
}

impl<F: DomainField> EvaluationDomain<F> for ArithmeticSequenceDomain<F> {
    fn size(&self) -> usize {
        self.size
    }

    fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    fn elements(&self) -> Result<&[F], DomainError> {
        Ok(&self.precomputed()?.elements)
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
        let _span = span!(Level::INFO, "Arithmetic FFT", size = m).entered();

        // Newton coefficients c_k, scaled by h^k, against the series of 1/n!.
        let mut newton = monomial_to_newton_basis(buffer, &pre.elements);
        in_place_parallel_transform(&self.pool, &mut newton, &pre.step_powers, |c, &hk| {
            *c *= hk
        })?;
        let conv = multiply_truncated(&self.pool, &newton, &pre.inv_factorials, m)?;
        parallel_binary_transform(&self.pool, &conv, &pre.factorials, buffer, |&v, &f| v * f)?;
        Ok(())
    }

    fn inverse_fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        let m = self.size;
        let pre = self.precomputed()?;
        resize_buffer(buffer, m)?;
        let _span = span!(Level::INFO, "Arithmetic inverse FFT", size = m).entered();

        in_place_parallel_transform(&self.pool, buffer, &pre.inv_factorials, |v, &inv| {
            *v *= inv
        })?;
        let mut newton = multiply_truncated(&self.pool, buffer, &pre.inverse_kernel, m)?;
        in_place_parallel_transform(&self.pool, &mut newton, &pre.inv_step_powers, |c, &inv| {
            *c *= inv
        })?;
        *buffer = newton_to_monomial_basis(&newton, &pre.elements);
        Ok(())
    }
}
