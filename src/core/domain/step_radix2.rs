use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{span, Level};

use super::{
    divide_by_z_on_coset_points, power_of_two, resize_buffer, unity_root, DomainError,
    EvaluationDomain,
};
use crate::core::fft::radix2_fft;
use crate::core::fields::{batch_inverse, DomainField, ExtensionOf, FftEmbedding, Field};
use crate::core::parallel::{in_place_parallel_transform, parallel_foreach};
use crate::core::poly::univariate::{powers, UnivariatePoly};
use crate::core::thread_pool::{wait_for_all, ThreadPool};

/// Domain of size `m = big + small`, where `big` is the largest power of two below `m` and
/// `small` is a power of two.
///
/// With `w` a primitive `2 * big`-th root of unity, the elements are the `big`-th roots of unity
/// `w^(2i)`, followed by the coset `w * w_small^j` of the `small`-th roots of unity.
#[derive(Debug)]
pub struct StepRadix2Domain<F: DomainField> {
    size: usize,
    big_size: usize,
    small_size: usize,
    omega: F,
    /// `w^small`.
    omega_to_small: F,
    pool: Arc<ThreadPool>,
    precomputed: OnceCell<Precomputed<F>>,
}

#[derive(Debug)]
struct Precomputed<F: Field> {
    /// `w^k` for `k < 2 * big`. Both halves transform with strided reads from this table.
    twiddles: Vec<F>,
    elements: Vec<F>,
    weights: Vec<F>,
    big_inv: F,
    small_inv: F,
}

impl<F: Field> Precomputed<F> {
    fn new(omega: F, big: usize, small: usize) -> Self {
        let _span = span!(Level::DEBUG, "Step radix-2 precompute", big, small).entered();
        let twiddles = powers(omega, 2 * big);
        let compression = 2 * big / small;
        let elements = (0..big)
            .map(|i| twiddles[2 * i])
            .chain((0..small).map(|j| twiddles[1 + j * compression]))
            .collect::<Vec<_>>();

        // 1 / Z'(x): x / (big (x^small - w^small)) on the first part and
        // x / (small w^small (w^big - 1)) on the coset.
        let big_f = power_of_two::<F>(big);
        let small_f = power_of_two::<F>(small);
        let omega_to_small = twiddles[small];
        let coset_denominator = small_f * omega_to_small * (twiddles[big] - F::one());
        let denominators = (0..big)
            .map(|i| big_f * (twiddles[(2 * i * small) % (2 * big)] - omega_to_small))
            .chain(std::iter::repeat(coset_denominator).take(small))
            .collect::<Vec<_>>();
        let weights = elements
            .iter()
            .zip(batch_inverse(&denominators))
            .map(|(&x, inv)| x * inv)
            .collect();

        Self {
            twiddles,
            elements,
            weights,
            big_inv: big_f.inverse(),
            small_inv: small_f.inverse(),
        }
    }
}

impl<F: DomainField> StepRadix2Domain<F> {
    pub fn new(m: usize, pool: Arc<ThreadPool>) -> Result<Self, DomainError> {
        if m <= 1 {
            return Err(DomainError::InvalidArgument(
                "domain size must be greater than one",
            ));
        }
        let big_size = m.next_power_of_two() / 2;
        let small_size = m - big_size;
        if !small_size.is_power_of_two() {
            return Err(DomainError::InvalidDomainSize(m));
        }
        let omega =
            unity_root::<F>(2 * big_size).map_err(|_| DomainError::InvalidDomainSize(m))?;
        Ok(Self {
            size: m,
            big_size,
            small_size,
            omega,
            omega_to_small: omega.pow(small_size as u128),
            pool,
            precomputed: OnceCell::new(),
        })
    }

    pub fn big_size(&self) -> usize {
        self.big_size
    }

    pub fn small_size(&self) -> usize {
        self.small_size
    }

    fn precomputed(&self) -> Result<&Precomputed<F>, DomainError> {
        Ok(self
            .precomputed
            .get_or_init(|| Precomputed::new(self.omega, self.big_size, self.small_size)))
    }
}

impl<F: DomainField> EvaluationDomain<F> for StepRadix2Domain<F> {
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

    /// Evaluates `p mod (x^big - 1)` on the first part and `p mod (x^big + 1)`, twisted by `w`, on
    /// the coset.
    fn fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        resize_buffer(buffer, self.size)?;
        let pre = self.precomputed()?;
        let (big, small) = (self.big_size, self.small_size);
        let _span = span!(Level::INFO, "Step radix-2 FFT", size = self.size).entered();

        let (lo, hi) = buffer.split_at_mut(big);
        let mut twisted = lo.to_vec();
        in_place_parallel_transform(&self.pool, &mut lo[..small], hi, |v, &h| *v += h)?;
        in_place_parallel_transform(&self.pool, &mut twisted[..small], hi, |v, &h| *v -= h)?;
        in_place_parallel_transform(&self.pool, &mut twisted, &pre.twiddles[..big], |v, &w| {
            *v *= w
        })?;
        // w_small has order `small`, so the twisted polynomial folds modulo `y^small - 1`.
        hi.copy_from_slice(&twisted[..small]);
        for block in twisted[small..].chunks_exact(small) {
            in_place_parallel_transform(&self.pool, hi, block, |v, &t| *v += t)?;
        }

        radix2_fft(&self.pool, lo, &pre.twiddles, false)?;
        radix2_fft(&self.pool, hi, &pre.twiddles, false)?;
        Ok(())
    }

    fn inverse_fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        resize_buffer(buffer, self.size)?;
        let pre = self.precomputed()?;
        let (big, small) = (self.big_size, self.small_size);
        let _span = span!(Level::INFO, "Step radix-2 inverse FFT", size = self.size).entered();

        let (lo, hi) = buffer.split_at_mut(big);
        radix2_fft(&self.pool, lo, &pre.twiddles, true)?;
        radix2_fft(&self.pool, hi, &pre.twiddles, true)?;
        let (big_inv, small_inv) = (pre.big_inv, pre.small_inv);
        parallel_foreach(&self.pool, lo, |v| *v *= big_inv)?;

        // `lo[small..]` are final coefficients. Subtract their twisted copies from the fold and
        // untwist, leaving `a_r - a_(r+big)` in `hi`.
        let two_big = 2 * big;
        let twiddles = &pre.twiddles;
        let folded = &*lo;
        let handles = self.pool.block_execution_mut(hi, |offset, chunk| {
            for (r, v) in (offset..).zip(chunk.iter_mut()) {
                *v *= small_inv;
                for k in (r + small..big).step_by(small) {
                    *v -= folded[k] * twiddles[k];
                }
                *v *= twiddles[(two_big - r) % two_big];
            }
        })?;
        wait_for_all(handles)?;

        let two_inv = F::one().double().inverse();
        in_place_parallel_transform(&self.pool, &mut lo[..small], hi, |c, &d| {
            *c = (*c + d) * two_inv
        })?;
        in_place_parallel_transform(&self.pool, hi, &lo[..small], |d, &a| *d = a - *d)?;
        Ok(())
    }

    /// `Z(t) = (t^big - 1)(t^small - w^small)`.
    fn compute_vanishing_polynomial<E: ExtensionOf<F>>(&self, t: E) -> Result<E, DomainError> {
        Ok((t.pow(self.big_size as u128) - E::one())
            * (t.pow(self.small_size as u128) - self.omega_to_small))
    }

    fn get_vanishing_polynomial(&self) -> Result<UnivariatePoly<F>, DomainError> {
        let mut coeffs = vec![F::zero(); self.size + 1];
        coeffs[self.size] += F::one();
        coeffs[self.big_size] -= self.omega_to_small;
        coeffs[self.small_size] -= F::one();
        coeffs[0] += self.omega_to_small;
        Ok(UnivariatePoly::new(coeffs))
    }

    /// Divides the evaluation at `x_i` by `Z(c * x_i)`.
    fn divide_by_z_on_coset<E: ExtensionOf<F>>(&self, buffer: &mut [E]) -> Result<(), DomainError> {
        divide_by_z_on_coset_points(self, buffer)
    }
}
