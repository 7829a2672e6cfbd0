//! The upstream side: a CRM record service that is slow, rate limited and
//! can be switched off by an operator.
//!
//! Every request, whether it arrives over HTTP ([`server`]) or from an
//! in-process caller, passes the same [`AdmissionController`] before the
//! [`RecordService`] does any work.

pub mod admission;
pub mod config;
pub mod seed;
pub mod server;
pub mod service;

pub use admission::{AdmissionController, AdmissionError, AdmissionPolicy, AdmissionStatus};
pub use config::UpstreamConfig;
pub use seed::{seed_demo_data, SeedOptions, SeedSummary};
pub use service::{Latency, RecordService, ServiceError};
