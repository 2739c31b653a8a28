pub mod report;
pub mod result;
pub mod spec;
pub mod status;

pub use report::{Clock, FixedClock, Meta, Report, SystemClock};
pub use result::{Summary, TestResult};
pub use spec::{NativeBody, TestBody, TestSpec, WireSpec};
pub use status::TestStatus;
