//! Radix-2 Cooley-Tukey transform shared by the roots-of-unity domains and the fast polynomial
//! product.
use super::fields::{ExtensionOf, Field};
use super::thread_pool::{chunk_ranges, wait_for_all, PoolError, ThreadPool};
use super::utils::bit_reverse;

pub fn butterfly<F, E>(v0: &mut E, v1: &mut E, twid: F)
where
    F: Field,
    E: ExtensionOf<F>,
{
    let tmp = *v1 * twid;
    *v1 = *v0 - tmp;
    *v0 += tmp;
}

/// Transforms `values` in place from coefficients to evaluations on `{w^0, ..., w^(n-1)}`, or back
/// when `inverse` is set.
///
/// `twiddles[k]` must hold `r^k` for a primitive `N`-th root of unity `r`, where `n` divides `N`;
/// then `w = r^(N/n)`. The inverse leaves the result scaled by `n`.
///
/// Each layer is split into at most as many parts as the pool would use for `n` elements, so the
/// `Low` pool chunk floor applies to element counts regardless of the block length.
///
/// # Panics
///
/// Panics if `n` is not a power of two or does not divide `twiddles.len()`.
pub fn radix2_fft<F, E>(
    pool: &ThreadPool,
    values: &mut [E],
    twiddles: &[F],
    inverse: bool,
) -> Result<(), PoolError>
where
    F: Field,
    E: ExtensionOf<F>,
{
    let n = values.len();
    let root_order = twiddles.len();
    assert!(n.is_power_of_two() && root_order % n == 0);
    if n == 1 {
        return Ok(());
    }
    bit_reverse(values);
    let twiddle = |k: usize| {
        if inverse && k != 0 {
            twiddles[root_order - k]
        } else {
            twiddles[k]
        }
    };
    let n_parts = pool.chunk_ranges(n).len();
    let mut half = 1;
    while half < n {
        let stride = root_order / (2 * half);
        let parts = layer_parts(values, half, n_parts);
        let handles = pool.execute_parts(parts, |part| match part {
            LayerPart::Blocks(blocks) => {
                for block in blocks.chunks_exact_mut(2 * half) {
                    let (lo, hi) = block.split_at_mut(half);
                    butterflies(lo, hi, 0, |j| twiddle(j * stride));
                }
            }
            LayerPart::Span { offset, lo, hi } => {
                butterflies(lo, hi, offset, |j| twiddle(j * stride))
            }
        })?;
        wait_for_all(handles)?;
        half *= 2;
    }
    Ok(())
}

fn butterflies<F, E>(lo: &mut [E], hi: &mut [E], offset: usize, twiddle: impl Fn(usize) -> F)
where
    F: Field,
    E: ExtensionOf<F>,
{
    for (j, (v0, v1)) in (offset..).zip(lo.iter_mut().zip(hi.iter_mut())) {
        butterfly(v0, v1, twiddle(j));
    }
}

/// A disjoint piece of one butterfly layer.
#[derive(Debug)]
enum LayerPart<'a, E> {
    /// Whole blocks of length `2 * half`.
    Blocks(&'a mut [E]),
    /// Butterflies `offset..offset + lo.len()` of a single block.
    Span {
        offset: usize,
        lo: &'a mut [E],
        hi: &'a mut [E],
    },
}

/// Splits a layer with blocks of length `2 * half` into about `n_parts` pieces of equal element
/// count. Wide layers are split across blocks, narrow ones inside each block.
fn layer_parts<E>(values: &mut [E], half: usize, n_parts: usize) -> Vec<LayerPart<'_, E>> {
    let len = 2 * half;
    let n_blocks = values.len() / len;
    if n_blocks >= n_parts {
        let mut rest = values;
        return chunk_ranges(n_blocks, n_parts, 1)
            .into_iter()
            .map(|range| {
                let (blocks, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * len);
                rest = tail;
                LayerPart::Blocks(blocks)
            })
            .collect();
    }
    let spans_per_block = n_parts / n_blocks;
    let mut parts = Vec::with_capacity(n_blocks * spans_per_block);
    for block in values.chunks_exact_mut(len) {
        let (mut lo, mut hi) = block.split_at_mut(half);
        for range in chunk_ranges(half, spans_per_block, 1) {
            let (lo_span, lo_tail) = std::mem::take(&mut lo).split_at_mut(range.len());
            let (hi_span, hi_tail) = std::mem::take(&mut hi).split_at_mut(range.len());
            lo = lo_tail;
            hi = hi_tail;
            parts.push(LayerPart::Span {
                offset: range.start,
                lo: lo_span,
                hi: hi_span,
            });
        }
    }
    parts
}
