pub mod basis_change;
pub mod univariate;
pub mod utils;

pub use univariate::UnivariatePoly;
