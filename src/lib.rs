//! Main crate for the `simply-dns-webhook` application, an ExternalDNS webhook provider for Simply.com.
//!
//! ExternalDNS hands us record sets and change sets, we translate them into calls against the
//! Simply.com API. The interesting parts are:
//! - [`fqdn`] maps fully qualified names onto the managed domain and host they belong to
//! - [`plan`] computes the difference between the current and desired record sets
//! - [`executor`] turns a plan into provider calls and applies them in order
//! - [`provider`]s such as Simply.com store the actual DNS records
//! - [`webhook`] is the HTTP surface ExternalDNS talks to

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod endpoint;
pub mod executor;
pub mod fqdn;
pub mod plan;
pub mod provider;
pub mod webhook;
