pub mod allocate;
pub mod component;
pub mod covert;
pub mod crypto;
pub mod error;
pub mod message;
pub mod params;
pub mod session;
pub mod transport;
pub mod tx;
pub mod types;
pub mod wallet;
pub mod wire;

pub use error::FusionError;
pub use session::{ClientConfig, FusionClient, FusionOutcome, SessionHandle, SkipPolicy};
pub use types::*;
