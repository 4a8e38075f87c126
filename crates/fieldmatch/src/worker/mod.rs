pub mod pool;

pub use pool::{TransformJob, TransformPool, TransformResult};
