pub mod domain;
pub mod fft;
pub mod fields;
pub mod parallel;
pub mod poly;
pub mod thread_pool;
pub mod utils;
