//! # Remote Source
//!
//! Everything between the network and typed records: the [`Fetcher`] seam and
//! its HTTP implementation, the streaming response pre-processor, payload
//! decoding by resource name, and the endpoint builder.

pub mod client;
pub mod fetcher;
pub mod payload;
pub mod preprocessor;

pub use client::ZendeskSource;
pub use fetcher::{FetchError, FetchRequest, Fetcher, HttpFetcher};
pub use payload::Payload;
pub use preprocessor::{pre_process, RequestDescriptor, Resource};
