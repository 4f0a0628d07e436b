//! Principal and permission model consumed by the session engine (C6).
//!
//! Authenticating the bearer credential itself is out of scope (§1); this
//! crate only defines the [`Authenticator`] callback contract and the
//! [`Principal`]/[`ChannelGrant`] shapes the core consumes afterwards.

mod authenticator;
mod principal;

pub use authenticator::{Authenticator, StaticTokenAuthenticator};
pub use principal::{ChannelGrant, PermissionMap, Principal};
