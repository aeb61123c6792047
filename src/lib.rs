//! Concurrent ticket-reservation simulator.
//!
//! A fixed pool of workers issues random availability checks, bookings and
//! cancellations against a handful of events. Three shared resources keep the
//! run consistent, each behind its own lock:
//!
//! - [`engine::AdmissionGate`] bounds how many workers execute queries at once,
//! - [`engine::ActiveQueryRegistry`] keeps two mutating queries off the same event,
//! - [`engine::ReservationLedger`] holds the reserved-seat counters.
//!
//! [`supervisor::Supervisor`] starts the pool, stops it cooperatively and
//! returns a [`report::ReservationReport`].

pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod query;
pub mod report;
pub mod supervisor;
pub mod worker;
