//! Typed APIs layered over a [`GatewayClient`](crate::GatewayClient).

mod auth;

pub use auth::AuthApi;
