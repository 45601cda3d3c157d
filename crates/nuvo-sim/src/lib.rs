//! Nuvo Amplifier Simulation Library
//!
//! This crate provides a simulated Nuvo amplifier for exercising the zone
//! driver without hardware. [`VirtualAmplifier`] implements
//! [`nuvo_protocol::Transport`], decodes the commands written to it, keeps
//! per-zone state and answers with Concerto or Simplese status frames.
//!
//! # Example
//!
//! ```rust
//! use nuvo_protocol::{EncodeCommand, Model, NuvoCommand, Transport};
//! use nuvo_sim::VirtualAmplifier;
//!
//! let mut amp = VirtualAmplifier::new("Living room", Model::Concerto, 6);
//! amp.write(&NuvoCommand::power(1, true).encode()).unwrap();
//!
//! assert!(amp.zone(1).unwrap().power);
//! assert_eq!(amp.status_frame(1).unwrap(), "#Z01PWRON,SRC1,VOL-40");
//! ```

pub mod amplifier;

pub use amplifier::{Fault, VirtualAmplifier, VirtualAmplifierConfig, ZoneState};
