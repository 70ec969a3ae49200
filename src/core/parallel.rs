//! Fork-join loops over index ranges and slices.
//!
//! Every function splits its work with [`ThreadPool::block_execution`] (or the `_mut` variant),
//! waits on every chunk and returns the first chunk failure, if any. Callers normally pass the
//! `Low` pool; passing the `High` pool is allowed.
use std::ops::Range;

use itertools::{izip, Itertools};

use super::thread_pool::{wait_for_all, PoolError, ThreadPool};

/// Calls `f(i)` once for every `i` in `range`. Order across chunks is unspecified.
pub fn parallel_for<F>(pool: &ThreadPool, range: Range<usize>, f: F) -> Result<(), PoolError>
where
    F: Fn(usize) + Sync,
{
    let start = range.start;
    let handles = pool.block_execution(range.len(), |begin, end| {
        (start + begin..start + end).for_each(&f)
    })?;
    wait_for_all(handles).map(|_| ())
}

/// Writes `op(&input[i])` to `output[i]`.
///
/// # Panics
///
/// Panics if `input` and `output` differ in length.
pub fn parallel_transform<A, B, F>(
    pool: &ThreadPool,
    input: &[A],
    output: &mut [B],
    op: F,
) -> Result<(), PoolError>
where
    A: Sync,
    B: Send,
    F: Fn(&A) -> B + Sync,
{
    assert_eq!(input.len(), output.len());
    let handles = pool.block_execution_mut(output, |offset, chunk| {
        let input = &input[offset..offset + chunk.len()];
        for (dst, src) in chunk.iter_mut().zip_eq(input) {
            *dst = op(src);
        }
    })?;
    wait_for_all(handles).map(|_| ())
}

/// Writes `op(&lhs[i], &rhs[i])` to `output[i]`.
///
/// # Panics
///
/// Panics if the three slices differ in length.
pub fn parallel_binary_transform<A, B, C, F>(
    pool: &ThreadPool,
    lhs: &[A],
    rhs: &[B],
    output: &mut [C],
    op: F,
) -> Result<(), PoolError>
where
    A: Sync,
    B: Sync,
    C: Send,
    F: Fn(&A, &B) -> C + Sync,
{
    assert_eq!(lhs.len(), output.len());
    assert_eq!(rhs.len(), output.len());
    let handles = pool.block_execution_mut(output, |offset, chunk| {
        let end = offset + chunk.len();
        for (dst, a, b) in izip!(chunk.iter_mut(), &lhs[offset..end], &rhs[offset..end]) {
            *dst = op(a, b);
        }
    })?;
    wait_for_all(handles).map(|_| ())
}

/// Applies `op(&mut data[i], &other[i])` for every `i`.
///
/// # Panics
///
/// Panics if `data` and `other` differ in length.
pub fn in_place_parallel_transform<A, B, F>(
    pool: &ThreadPool,
    data: &mut [A],
    other: &[B],
    op: F,
) -> Result<(), PoolError>
where
    A: Send,
    B: Sync,
    F: Fn(&mut A, &B) + Sync,
{
    assert_eq!(data.len(), other.len());
    let handles = pool.block_execution_mut(data, |offset, chunk| {
        let other = &other[offset..offset + chunk.len()];
        chunk.iter_mut().zip_eq(other).for_each(|(a, b)| op(a, b));
    })?;
    wait_for_all(handles).map(|_| ())
}

/// Applies `op` to every element of `data`.
pub fn parallel_foreach<A, F>(pool: &ThreadPool, data: &mut [A], op: F) -> Result<(), PoolError>
where
    A: Send,
    F: Fn(&mut A) + Sync,
{
    let handles = pool.block_execution_mut(data, |_, chunk| chunk.iter_mut().for_each(&op))?;
    wait_for_all(handles).map(|_| ())
}
