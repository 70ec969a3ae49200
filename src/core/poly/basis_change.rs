//! Conversions between the monomial basis and the Newton basis.
//!
//! For nodes `x_0, ..., x_{m-1}` the Newton basis is `N_0 = 1`, `N_k = (x - x_0)...(x - x_{k-1})`.
//! On geometric nodes `x_i = q^i` both directions reduce to one truncated product each, using
//! q-Pochhammer symbols `(q; q)_n = (1 - q)(1 - q^2)...(1 - q^n)`.
use crate::core::fields::{batch_inverse, ExtensionOf, FftEmbedding, Field};
use crate::core::poly::utils::multiply_truncated;
use crate::core::thread_pool::{PoolError, ThreadPool};

/// Tables for the nodes `1, q, ..., q^(m-1)`.
#[derive(Debug, Clone)]
pub struct GeometricBasisTables<F: Field> {
    /// `(q; q)_n`.
    pub pochhammer: Vec<F>,
    /// `1 / (q; q)_n`.
    pub inv_pochhammer: Vec<F>,
    /// `(-1)^n q^(n(n-1)/2) / (q; q)_n`.
    pub newton_kernel: Vec<F>,
}

impl<F: Field> GeometricBasisTables<F> {
    /// Builds the tables from `powers[i] = q^i` and `triangular[i] = q^(i(i-1)/2)`.
    ///
    /// Returns `None` if `q^i = 1` for some `0 < i < m`.
    pub fn new(powers: &[F], triangular: &[F]) -> Option<Self> {
        debug_assert_eq!(powers.len(), triangular.len());
        let mut pochhammer = Vec::with_capacity(powers.len());
        let mut acc = F::one();
        for (i, &power) in powers.iter().enumerate() {
            if i > 0 {
                acc *= F::one() - power;
            }
            pochhammer.push(acc);
        }
        if pochhammer.last().map_or(false, F::is_zero) {
            return None;
        }
        let inv_pochhammer = batch_inverse(&pochhammer);
        let newton_kernel = inv_pochhammer
            .iter()
            .zip(triangular)
            .enumerate()
            .map(|(n, (&inv, &tri))| if n % 2 == 0 { tri * inv } else { -(tri * inv) })
            .collect();
        Some(Self {
            pochhammer,
            inv_pochhammer,
            newton_kernel,
        })
    }

    pub fn len(&self) -> usize {
        self.pochhammer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pochhammer.is_empty()
    }

    /// `t -> coeffs[m-1-t] * (q; q)_{m-1-t}`.
    fn reversed_scaled<E: ExtensionOf<F>>(&self, coeffs: &[E]) -> Vec<E> {
        coeffs
            .iter()
            .zip(&self.pochhammer)
            .rev()
            .map(|(&c, &poch)| c * poch)
            .collect()
    }

    /// `k -> conv[m-1-k] / (q; q)_k`.
    fn unreversed_unscaled<E: ExtensionOf<F>>(&self, conv: Vec<E>) -> Vec<E> {
        conv.into_iter()
            .rev()
            .zip(&self.inv_pochhammer)
            .map(|(c, &inv)| c * inv)
            .collect()
    }
}

/// Converts monomial coefficients to Newton coefficients on geometric nodes.
pub fn monomial_to_newton_basis_geometric<F, E>(
    pool: &ThreadPool,
    coeffs: &[E],
    tables: &GeometricBasisTables<F>,
) -> Result<Vec<E>, PoolError>
where
    F: Field,
    E: ExtensionOf<F> + FftEmbedding,
{
    let m = tables.len();
    debug_assert_eq!(coeffs.len(), m);
    let scaled = tables.reversed_scaled(coeffs);
    let conv = multiply_truncated(pool, &scaled, &tables.inv_pochhammer, m)?;
    Ok(tables.unreversed_unscaled(conv))
}

/// Converts Newton coefficients on geometric nodes back to monomial coefficients.
pub fn newton_to_monomial_basis_geometric<F, E>(
    pool: &ThreadPool,
    coeffs: &[E],
    tables: &GeometricBasisTables<F>,
) -> Result<Vec<E>, PoolError>
where
    F: Field,
    E: ExtensionOf<F> + FftEmbedding,
{
    let m = tables.len();
    debug_assert_eq!(coeffs.len(), m);
    let scaled = tables.reversed_scaled(coeffs);
    let conv = multiply_truncated(pool, &scaled, &tables.newton_kernel, m)?;
    Ok(tables.unreversed_unscaled(conv))
}

/// Converts monomial coefficients to Newton coefficients on arbitrary `nodes`, by repeated
/// synthetic division. Quadratic in the number of coefficients.
pub fn monomial_to_newton_basis<F, E>(coeffs: &[E], nodes: &[F]) -> Vec<E>
where
    F: Field,
    E: ExtensionOf<F>,
{
    let n = coeffs.len();
    assert!(nodes.len() >= n);
    let mut work = coeffs.to_vec();
    let mut res = Vec::with_capacity(n);
    for (k, &node) in nodes.iter().take(n).enumerate() {
        // Divide the remaining polynomial by `x - node`; the remainder is the k-th coefficient.
        let mut acc = E::zero();
        for coeff in work[..n - k].iter_mut().rev() {
            let prev = *coeff;
            *coeff = acc;
            acc = prev + acc * node;
        }
        res.push(acc);
    }
    res
}

/// Inverse of [`monomial_to_newton_basis`], by nested Horner evaluation.
pub fn newton_to_monomial_basis<F, E>(coeffs: &[E], nodes: &[F]) -> Vec<E>
where
    F: Field,
    E: ExtensionOf<F>,
{
    let n = coeffs.len();
    assert!(nodes.len() >= n);
    let Some(&last) = coeffs.last() else {
        return Vec::new();
    };
    let mut poly = vec![E::zero(); n];
    poly[0] = last;
    for k in (0..n - 1).rev() {
        // poly <- coeffs[k] + (x - nodes[k]) * poly.
        let node = nodes[k];
        for j in (1..n - k).rev() {
            poly[j] = poly[j - 1] - poly[j] * node;
        }
        poly[0] = coeffs[k] - poly[0] * node;
    }
    poly
}

/// Evaluates a polynomial given in the Newton basis at `x`.
pub fn eval_newton<F, E>(coeffs: &[E], nodes: &[F], x: E) -> E
where
    F: Field,
    E: ExtensionOf<F>,
{
    coeffs
        .iter()
        .zip(nodes)
        .rev()
        .fold(E::zero(), |acc, (&c, &node)| acc * (x - node) + c)
}

/// `q^(i(i-1)/2)` for `i < powers.len()`, given `powers[i] = q^i`.
pub fn triangular_powers<F: Field>(powers: &[F]) -> Vec<F> {
    let mut acc = F::one();
    let mut res = Vec::with_capacity(powers.len());
    for power in powers {
        res.push(acc);
        acc *= *power;
    }
    res
}
