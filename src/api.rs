//! Client stubs and messages for the `openstorage.api` gRPC contract.
//!
//! Generated at build time from `proto/openstorage/api.proto`.

#![expect(
    missing_docs,
    reason = "message and client types are generated by tonic-build"
)]
#![allow(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::restriction,
    reason = "generated code is not held to the crate lint table"
)]

tonic::include_proto!("openstorage.api");
