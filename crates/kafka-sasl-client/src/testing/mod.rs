//! Test support: an in-process broker that speaks the SASL/SCRAM server
//! side.
//!
//! Lives in the library (not behind `cfg(test)`) so integration tests and
//! embedding clients can drive full authentication flows without a real
//! Kafka cluster.

pub mod simulator;

pub use simulator::{Fault, ScramBrokerSimulator};
