//! Deterministic simulation harness for the Embermesh engine.
//!
//! Everything nondeterministic in production — the clock, the RNG, the
//! radio, storage, battery telemetry — is replaced with seeded or scripted
//! doubles, so a scenario replays identically on every run. The central
//! piece is [`TestNode`]: a complete engine wired to a virtual radio, with
//! helpers to inject frames and march time forward millisecond by
//! millisecond.
//!
//! The harness also simulates the radio's transmit timing: a frame handed
//! to the virtual radio completes (and fires the engine's TX-done callback)
//! after its computed LoRa airtime, so half-duplex behavior is exercised for
//! real.

pub mod env;
pub mod node;
pub mod radio;
pub mod storage;
pub mod telemetry;

pub use env::{SimClock, SimEnv};
pub use node::TestNode;
pub use radio::{SimRadio, TransmittedFrame};
pub use storage::MemStorage;
pub use telemetry::SimTelemetry;
