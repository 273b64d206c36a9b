//! Provider-facing descriptors.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the HTTPS-only
//! authorization, token, and API endpoints the proxy talks to. Production code uses
//! [`ProviderDescriptor::meetup`]; tests point the same structure at a mock server.

pub mod descriptor;

pub use descriptor::*;
