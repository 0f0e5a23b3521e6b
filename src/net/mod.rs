//! Network identity and endpoint subsystem.
//!
//! # Data Flow
//! ```text
//! config.identity → identity.rs (decode key, derive PeerId)
//! config.provider_server.listen_multiaddr → multiaddr.rs (parse)
//!     → endpoint.rs (bind, serve latest signed announcement)
//! ```
//!
//! # Design Decisions
//! - Identity is the ed25519 key pair; the peer id is its public key
//! - Announcements are signed so peers can verify the head came from us

pub mod endpoint;
pub mod identity;
pub mod multiaddr;

pub use endpoint::{Announcer, EndpointError, HeadResponse, NetworkEndpoint, SignedAnnouncement};
pub use identity::{Identity, IdentityError, PeerId};
pub use multiaddr::{Multiaddr, MultiaddrError};
