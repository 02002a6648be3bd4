pub mod clock;
pub mod process;
pub mod telemetry;

pub use clock::*;
pub use process::*;
pub use telemetry::*;
