pub mod driver;
pub mod prompts;
pub mod rate_limit;
pub mod refiner;
pub mod session;
pub mod synthesizer;
#[doc(hidden)]
pub mod testing;
pub mod types;

#[cfg(feature = "gemini")]
pub mod client;

pub use driver::*;
pub use prompts::*;
pub use rate_limit::*;
pub use refiner::*;
pub use session::*;
pub use synthesizer::*;
pub use types::*;

#[cfg(feature = "gemini")]
pub use client::*;
