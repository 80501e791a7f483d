// src/math/mod.rs

pub mod error;
pub mod integrator;
pub mod matrix;
pub mod random;

pub use error::{MathError, MathResult};
pub use integrator::{rk2_step, rk4_step};
pub use matrix::Matrix;
pub use random::NoiseSource;
