//! Rate limiting logic and state management.

mod clock;
mod key;
mod limiter;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::OperationKey;
pub use limiter::{Admission, RateLimited, RateLimiter};
pub use window::{Decision, TimeUnit, WindowSpec, WindowState};
