use num_traits::{One, Zero};
use tracing::{span, Level};

use crate::core::fft::radix2_fft;
use crate::core::fields::{DomainField, ExtensionOf, FftEmbedding, Field, FieldExpOps};
use crate::core::parallel::{in_place_parallel_transform, parallel_transform};
use crate::core::poly::univariate::powers;
use crate::core::thread_pool::{wait_for_all, PoolError, ThreadPool};

/// Products whose shorter operand has at most this many coefficients are computed directly.
const NAIVE_PRODUCT_MAX_LEN: usize = 32;

/// Returns the first `len` coefficients of the product `a * b`.
///
/// Large products go through a radix-2 FFT over [`FftEmbedding::Target`]; small ones, and ones
/// whose padded size exceeds the two-adicity of the target, are computed coefficient by
/// coefficient over disjoint chunks of the result.
pub fn multiply_truncated<F, E>(
    pool: &ThreadPool,
    a: &[E],
    b: &[F],
    len: usize,
) -> Result<Vec<E>, PoolError>
where
    F: Field,
    E: ExtensionOf<F> + FftEmbedding,
{
    let a = &a[..a.len().min(len)];
    let b = &b[..b.len().min(len)];
    if a.is_empty() || b.is_empty() {
        return Ok(vec![E::zero(); len]);
    }
    let log_size = (a.len() + b.len() - 1).next_power_of_two().ilog2();
    match E::Target::two_adic_root(log_size) {
        Some(root) if a.len().min(b.len()) > NAIVE_PRODUCT_MAX_LEN => {
            multiply_fft(pool, a, b, len, root, log_size)
        }
        _ => multiply_naive(pool, a, b, len),
    }
}

fn multiply_naive<F, E>(
    pool: &ThreadPool,
    a: &[E],
    b: &[F],
    len: usize,
) -> Result<Vec<E>, PoolError>
where
    F: Field,
    E: ExtensionOf<F>,
{
    let mut res = vec![E::zero(); len];
    let handles = pool.block_execution_mut(&mut res, |offset, chunk| {
        for (i, dst) in (offset..).zip(chunk.iter_mut()) {
            let lo = i.saturating_sub(b.len() - 1);
            let hi = i.min(a.len() - 1);
            *dst = (lo..=hi).map(|k| a[k] * b[i - k]).sum();
        }
    })?;
    wait_for_all(handles)?;
    Ok(res)
}

fn multiply_fft<F, E>(
    pool: &ThreadPool,
    a: &[E],
    b: &[F],
    len: usize,
    root: E::Target,
    log_size: u32,
) -> Result<Vec<E>, PoolError>
where
    F: Field,
    E: ExtensionOf<F> + FftEmbedding,
{
    let n = 1 << log_size;
    let _span = span!(Level::DEBUG, "FFT product", size = n).entered();
    let twiddles = powers(root, n);
    let mut lhs = vec![E::Target::zero(); n];
    let mut rhs = vec![E::Target::zero(); n];
    parallel_transform(pool, a, &mut lhs[..a.len()], |&v| v.embed())?;
    parallel_transform(pool, b, &mut rhs[..b.len()], |&v| E::from(v).embed())?;
    radix2_fft(pool, &mut lhs, &twiddles, false)?;
    radix2_fft(pool, &mut rhs, &twiddles, false)?;
    in_place_parallel_transform(pool, &mut lhs, &rhs, |l, &r| *l *= r)?;
    radix2_fft(pool, &mut lhs, &twiddles, true)?;

    let n_inv = (0..log_size)
        .fold(E::Target::one(), |acc, _| acc.double())
        .inverse();
    let mut res = vec![E::zero(); len];
    let kept = len.min(n);
    parallel_transform(pool, &lhs[..kept], &mut res[..kept], |&v| {
        E::project(v * n_inv)
    })?;
    Ok(res)
}
