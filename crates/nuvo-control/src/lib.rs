//! Nuvo Zone Controller
//!
//! This crate drives a Nuvo multi-zone amplifier over a serial link. A
//! [`ZoneController`] owns the [`Transport`](nuvo_protocol::Transport) and
//! runs one request/response cycle at a time:
//!
//! 1. drain frames the amplifier sent on its own
//! 2. send the encoded command
//! 3. wait for the next terminated reply, bounded by a response deadline
//! 4. parse it
//!
//! Status queries repeat the cycle until a matching status frame arrives or
//! the retry budget is spent, then return `None`. Commands that change state
//! are sent once and their reply is read and discarded.
//!
//! # Example
//!
//! ```rust,no_run
//! use nuvo_control::{ControllerConfig, SerialSettings, ZoneController};
//!
//! let settings = SerialSettings::new("/dev/ttyUSB0");
//! let nuvo = ZoneController::open(&settings, ControllerConfig::default()).unwrap();
//!
//! if let Some(status) = nuvo.zone_status(1) {
//!     nuvo.set_power(1, true);
//!     nuvo.set_volume(1, -45.0);
//!     nuvo.restore_zone(&status);
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod serial;

pub use config::ControllerConfig;
pub use controller::ZoneController;
pub use error::{ControlError, ExchangeError};
pub use serial::{SerialSettings, SerialTransport};
