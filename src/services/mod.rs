//! Clients for the two external services.
//!
//! Each service sits behind a small object-safe trait ([`model::TextModel`],
//! [`photos::PhotoSearch`]) so the pipeline can be driven by fakes in
//! tests and by custom middleware (caching, recording) in applications.
//! The shipped implementations are thin reqwest clients over the public
//! REST APIs; neither holds state beyond the HTTP connection pool.

pub mod model;
pub mod photos;
