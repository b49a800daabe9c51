//! Core of the Chatway live-chat bridge.
//!
//! Everything here is invoked by the hosting framework with explicit inputs:
//! the [`store::Store`] holds the handful of persisted credential/config
//! values, [`api::ApiClient`] is the single point of contact with the remote
//! Chatway service, and [`verification`] runs the visitor verification flow.
//! Cookie and session signals are passed in as parameters and returned as
//! directives; nothing reads ambient request state.

pub mod api;
pub mod config;
pub mod credentials;
pub mod store;
pub mod unread;
pub mod verification;
