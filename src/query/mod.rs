//! Query execution for market-dash.
//!
//! Splits a query run into its three parts: the execution poller, the
//! result decoder, and the client that drives both against a service.

pub mod client;
pub mod decoder;
pub mod poller;

pub use client::{QueryClient, RunOutcome, RunPhase};
pub use decoder::{
    parse_leading_int, CoercionSchema, ColumnType, DecodeAnomaly, DecodeOutcome, Record,
    ResultDecoder, Value,
};
pub use poller::{ExecutionPoller, PollSummary};
