use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{span, Level};

use super::{power_of_two, resize_buffer, unity_root, DomainError, EvaluationDomain};
use crate::core::fft::radix2_fft;
use crate::core::fields::{DomainField, ExtensionOf, FftEmbedding, Field};
use crate::core::parallel::parallel_foreach;
use crate::core::poly::univariate::{powers, UnivariatePoly};
use crate::core::thread_pool::ThreadPool;

/// Domain `{1, w, ..., w^(m-1)}` of `m`-th roots of unity, `m` a power of two.
#[derive(Debug)]
pub struct BasicRadix2Domain<F: DomainField> {
    size: usize,
    log_size: u32,
    omega: F,
    pool: Arc<ThreadPool>,
    precomputed: OnceCell<Precomputed<F>>,
}

#[derive(Debug)]
struct Precomputed<F: Field> {
    /// `w^i`.
    elements: Vec<F>,
    /// `w^i / m`.
    weights: Vec<F>,
    size_inv: F,
}

impl<F: DomainField> BasicRadix2Domain<F> {
    pub fn new(m: usize, pool: Arc<ThreadPool>) -> Result<Self, DomainError> {
        if m <= 1 {
            return Err(DomainError::InvalidArgument(
                "domain size must be greater than one",
            ));
        }
        let omega = unity_root(m).map_err(|_| DomainError::InvalidDomainSize(m))?;
        Ok(Self {
            size: m,
            log_size: m.ilog2(),
            omega,
            pool,
            precomputed: OnceCell::new(),
        })
    }

    pub fn log_size(&self) -> u32 {
        self.log_size
    }

    fn precomputed(&self) -> Result<&Precomputed<F>, DomainError> {
        Ok(self.precomputed.get_or_init(|| {
            let _span =
                span!(Level::DEBUG, "Radix-2 domain precompute", size = self.size).entered();
            let elements = powers(self.omega, self.size);
            let size_inv = power_of_two::<F>(self.size).inverse();
            let weights = elements.iter().map(|&x| x * size_inv).collect();
            Precomputed {
                elements,
                weights,
                size_inv,
            }
        }))
    }
}

impl<F: DomainField> EvaluationDomain<F> for BasicRadix2Domain<F> {
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
        resize_buffer(buffer, self.size)?;
        let pre = self.precomputed()?;
        let _span = span!(Level::INFO, "Radix-2 FFT", size = self.size).entered();
        radix2_fft(&self.pool, buffer, &pre.elements, false)?;
        Ok(())
    }

    fn inverse_fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        resize_buffer(buffer, self.size)?;
        let pre = self.precomputed()?;
        let _span = span!(Level::INFO, "Radix-2 inverse FFT", size = self.size).entered();
        radix2_fft(&self.pool, buffer, &pre.elements, true)?;
        let size_inv = pre.size_inv;
        parallel_foreach(&self.pool, buffer, |v| *v *= size_inv)?;
        Ok(())
    }

    /// `Z(t) = t^m - 1`.
    fn compute_vanishing_polynomial<E: ExtensionOf<F>>(&self, t: E) -> Result<E, DomainError> {
        Ok(t.pow(self.size as u128) - E::one())
    }

    fn get_vanishing_polynomial(&self) -> Result<UnivariatePoly<F>, DomainError> {
        let mut coeffs = vec![F::zero(); self.size + 1];
        coeffs[0] = -F::one();
        coeffs[self.size] = F::one();
        Ok(UnivariatePoly::new(coeffs))
    }
}
