//! Product reduction and the geometric mean
//!
//! The combine operation of the collective reduce is plain `f64`
//! multiplication. In exact arithmetic it is associative and commutative, in
//! floating point it is not quite: the order in which a transport combines the
//! partial products can change the low-order bits of the result. That is an
//! accepted approximation.
//!
//! The geometric mean is derived on the root only, once the global product is
//! known: `mean = product^(1/V)`. No domain check is made. A zero product
//! (a zero draw) gives `0.0`, a negative product gives NaN, an overflowed
//! product gives infinity.

/// Combine two partial products
#[inline]
pub fn combine(acc: f64, partial: f64) -> f64 {
    acc * partial
}

/// Combine a slice of partial products in slice order
///
/// The empty slice yields the multiplicative identity.
pub fn product_of(partials: &[f64]) -> f64 {
    partials.iter().copied().fold(1.0, combine)
}

/// The `count`-th root of `product`
pub fn geometric_mean(product: f64, count: u64) -> f64 {
    product.powf(1.0 / count as f64)
}
