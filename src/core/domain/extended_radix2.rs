use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{span, Level};

use super::{
    divide_by_z_on_coset_points, power_of_two, resize_buffer, unity_root, DomainError,
    EvaluationDomain,
};
use crate::core::fft::radix2_fft;
use crate::core::fields::{batch_inverse, DomainField, ExtensionOf, FftEmbedding, Field};
use crate::core::parallel::{
    in_place_parallel_transform, parallel_binary_transform, parallel_foreach,
};
use crate::core::poly::univariate::{powers, UnivariatePoly};
use crate::core::thread_pool::ThreadPool;

/// Domain of size `m = 2s` for fields whose largest power-of-two subgroup has order `s`: the
/// `s`-th roots of unity `w^i`, followed by their coset `h * w^j`, where `h` is the square of the
/// field's multiplicative generator.
#[derive(Debug)]
pub struct ExtendedRadix2Domain<F: DomainField> {
    size: usize,
    small_size: usize,
    omega: F,
    shift: F,
    /// `h^s`.
    shift_to_small: F,
    pool: Arc<ThreadPool>,
    precomputed: OnceCell<Precomputed<F>>,
}

#[derive(Debug)]
struct Precomputed<F: Field> {
    /// `w^k` for `k < s`.
    twiddles: Vec<F>,
    elements: Vec<F>,
    weights: Vec<F>,
    /// `h^i` for `i < s`.
    shift_powers: Vec<F>,
    inv_shift_powers: Vec<F>,
    /// `1 / (s (1 - h^s))`.
    inverse_scale: F,
}

impl<F: Field> Precomputed<F> {
    fn new(omega: F, shift: F, shift_to_small: F, small: usize) -> Self {
        let _span = span!(Level::DEBUG, "Extended radix-2 precompute", size = 2 * small).entered();
        let twiddles = powers(omega, small);
        let elements = twiddles
            .iter()
            .copied()
            .chain(twiddles.iter().map(|&w| shift * w))
            .collect::<Vec<_>>();
        let shift_powers = powers(shift, small);
        let inv_shift_powers = batch_inverse(&shift_powers);

        // 1 / Z'(x): x / (s (1 - h^s)) on the roots of unity, x / (s h^s (h^s - 1)) on the coset.
        let small_f = power_of_two::<F>(small);
        let inverse_scale = (small_f * (F::one() - shift_to_small)).inverse();
        let coset_scale = (small_f * shift_to_small * (shift_to_small - F::one())).inverse();
        let weights = elements
            .iter()
            .enumerate()
            .map(|(i, &x)| if i < small { x * inverse_scale } else { x * coset_scale })
            .collect();

        Self {
            twiddles,
            elements,
            weights,
            shift_powers,
            inv_shift_powers,
            inverse_scale,
        }
    }
}

impl<F: DomainField> ExtendedRadix2Domain<F> {
    /// Only `m = 2^(TWO_ADICITY + 1)` is supported.
    pub fn new(m: usize, pool: Arc<ThreadPool>) -> Result<Self, DomainError> {
        if m <= 1 {
            return Err(DomainError::InvalidArgument(
                "domain size must be greater than one",
            ));
        }
        if !m.is_power_of_two() || m.ilog2() != F::TWO_ADICITY + 1 {
            return Err(DomainError::InvalidDomainSize(m));
        }
        let small_size = m / 2;
        let omega = unity_root::<F>(small_size)?;
        let shift = F::multiplicative_generator().square();
        let shift_to_small = shift.pow(small_size as u128);
        if shift_to_small == F::one() {
            return Err(DomainError::InvalidDomainSize(m));
        }
        Ok(Self {
            size: m,
            small_size,
            omega,
            shift,
            shift_to_small,
            pool,
            precomputed: OnceCell::new(),
        })
    }

    pub fn shift(&self) -> F {
        self.shift
    }

    fn precomputed(&self) -> Result<&Precomputed<F>, DomainError> {
        Ok(self.precomputed.get_or_init(|| {
            Precomputed::new(
                self.omega,
                self.shift,
                self.shift_to_small,
                self.small_size,
            )
        }))
    }
}

impl<F: DomainField> EvaluationDomain<F> for ExtendedRadix2Domain<F> {
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

    /// Reduces `p` modulo `x^s - 1` and `x^s - h^s`, then transforms both residues on `<w>`.
    fn fft<E>(&self, buffer: &mut Vec<E>) -> Result<(), DomainError>
    where
        E: ExtensionOf<F> + FftEmbedding,
    {
        resize_buffer(buffer, self.size)?;
        let pre = self.precomputed()?;
        let _span = span!(Level::INFO, "Extended radix-2 FFT", size = self.size).entered();
        let shift_to_small = self.shift_to_small;

        let (lo, hi) = buffer.split_at_mut(self.small_size);
        let mut coset = vec![E::zero(); self.small_size];
        parallel_binary_transform(&self.pool, lo, hi, &mut coset, |&l, &h| {
            l + h * shift_to_small
        })?;
        in_place_parallel_transform(&self.pool, lo, hi, |l, &h| *l += h)?;
        parallel_binary_transform(&self.pool, &coset, &pre.shift_powers, hi, |&v, &p| v * p)?;

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
        let _span = span!(Level::INFO, "Extended radix-2 inverse FFT", size = self.size).entered();
        let scale = pre.inverse_scale;
        let one_minus_shift_to_small = F::one() - self.shift_to_small;

        let (lo, hi) = buffer.split_at_mut(self.small_size);
        radix2_fft(&self.pool, lo, &pre.twiddles, true)?;
        radix2_fft(&self.pool, hi, &pre.twiddles, true)?;
        // With H = h^s, lo holds (a0 + a1) / (1 - H) and hi holds (a0 + H a1) / (1 - H).
        parallel_foreach(&self.pool, lo, |v| *v *= scale)?;
        in_place_parallel_transform(&self.pool, hi, &pre.inv_shift_powers, |v, &p| {
            *v *= p * scale
        })?;
        // hi <- a1, then lo <- a0.
        in_place_parallel_transform(&self.pool, hi, lo, |v, &l| *v = l - *v)?;
        in_place_parallel_transform(&self.pool, lo, hi, |l, &upper| {
            *l = *l * one_minus_shift_to_small - upper
        })?;
        Ok(())
    }

    /// `Z(t) = (t^s - 1)(t^s - h^s)`.
    fn compute_vanishing_polynomial<E: ExtensionOf<F>>(&self, t: E) -> Result<E, DomainError> {
        let t_to_small = t.pow(self.small_size as u128);
        Ok((t_to_small - E::one()) * (t_to_small - self.shift_to_small))
    }

    fn get_vanishing_polynomial(&self) -> Result<UnivariatePoly<F>, DomainError> {
        let mut coeffs = vec![F::zero(); self.size + 1];
        coeffs[self.size] = F::one();
        coeffs[self.small_size] = -(self.shift_to_small + F::one());
        coeffs[0] = self.shift_to_small;
        Ok(UnivariatePoly::new(coeffs))
    }

    /// Divides the evaluation at `x_i` by `Z(c * x_i)`, which takes one value on each half.
    fn divide_by_z_on_coset<E: ExtensionOf<F>>(&self, buffer: &mut [E]) -> Result<(), DomainError> {
        divide_by_z_on_coset_points(self, buffer)
    }
}
