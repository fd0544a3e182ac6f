mod health;
mod metrics;
mod topology;

pub use health::health;
pub use metrics::metrics;
pub use topology::topology;
