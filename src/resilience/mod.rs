mod circuit_breaker;
mod retry;

pub use circuit_breaker::{Admission, BreakerOpen, CircuitBreaker, CircuitState};
pub use retry::RetryPolicy;
