//! Ptsmap-Common: shared vocabulary for the PTS correspondence service.
//!
//! - **Stream classes**: which elementary stream a table serves, including the
//!   hardware-assisted video alias
//! - **Table status**: the lifecycle states a correspondence table moves through
//! - **Units**: 90 kHz tick / microsecond conversions and the [`Timestamp`] pair
//! - **Error Handling**: the unified error type and result alias
//!
//! # Examples
//!
//! ```
//! use ptsmap_common::{StreamClass, Timestamp};
//!
//! let class: StreamClass = "audio".parse().unwrap();
//! assert_eq!(class, StreamClass::Audio);
//!
//! let ts = Timestamp::from_ticks(90_000);
//! assert_eq!(ts.micros, 1_000_000);
//! ```

pub mod error;
pub mod types;
pub mod units;

pub use error::{Error, Result};
pub use types::*;
pub use units::Timestamp;
