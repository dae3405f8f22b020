//! # Gasboard
//!
//! Library for aggregating native-transfer gas fees across EVM chains.
//!
//! Each configured chain is queried through its own [`transport::RpcClient`], turned into a
//! normalized [`estimation::FeeEstimate`] by the chain's [`chains::FeeStrategy`], cached by the
//! [`cache::FeeCache`] and finally assembled into ordered rows by the
//! [`aggregator::FeeAggregator`].

pub mod aggregator;
pub mod cache;
pub mod chains;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod estimation;
pub mod metrics;
pub mod price;
pub mod rpc;
pub mod serde;
pub mod spawn;
pub mod transport;
pub mod types;
