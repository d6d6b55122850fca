//! These models represent the objects the dashboard manipulates
//!
//! There are a few different formats we interact with:
//! - the dashboard's JSON (camelCase), sent to and from the browser
//! - the discovery payloads of each local runtime, normalized into `ModelDescriptor`
//! - the relay's update envelopes, which live in `relay` since nothing else needs them
//!
//! Everything here is plain data: mutation happens in `store`, behaviour in
//! `generator`, `probe` and `relay`.
pub mod agent;
pub mod model;
pub mod room;
