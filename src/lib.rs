//! Evaluation domains over the Mersenne-31 field tower and the thread pools that run their
//! transforms in parallel.
pub mod core;

pub use crate::core::domain::{
    make_evaluation_domain, ArithmeticSequenceDomain, BasicRadix2Domain, Domain, DomainError,
    EvaluationDomain, ExtendedRadix2Domain, GeometricSequenceDomain, StepRadix2Domain,
};
pub use crate::core::thread_pool::{
    PoolError, PoolLevel, ThreadPool, ThreadPoolConfig, ThreadPools,
};
