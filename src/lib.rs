//! Core Rust implementation of the OpChan forum engine.
//!
//! This crate provides the delegated-signing trust model, message ingress pipeline,
//! local replica, relevance scorer, and forum actions that a host application (web
//! UI, CLI, bot) embeds to run a decentralized, local-first forum over a
//! caller-supplied transport.
//!
//! # Overview
//!
//! A wallet key authorizes an ephemeral Ed25519 device key once; the device key then
//! signs every forum message (posts, comments, votes, moderation, profile updates)
//! until the authorization expires. Every message a host sees — whether composed
//! locally or received from the network — passes through [`replica::Replica::apply_message`],
//! which validates, verifies, deduplicates, indexes, and durably persists it before any
//! reader can observe it.
//!
//! # Roles
//!
//! - **Host application**: embeds this crate via [`client::Client`], supplying a
//!   [`transport::Transport`] implementation, a [`delegation::manager::WalletSigner`]
//!   for wallet-backed delegation, and an [`identity::NameLookup`] for ENS resolution.
//! - **Transport implementor**: builds the pub/sub or relay layer behind
//!   [`transport::Transport`]; the core never assumes a specific network.
//!
//! # Modules
//!
//! - [`ids`] — Address, author, and device-key identifier types.
//! - [`crypto`] — EIP-191 wallet-signature verification and Ed25519 device signing.
//! - [`timestamp`] — Millisecond Unix timestamp type and the injected [`timestamp::Clock`].
//! - [`message`] — Envelope, kind-specific payloads, canonical encoding, and structural validation.
//! - [`delegation`] — The delegation store (C2) and delegation manager (C3).
//! - [`store`] — The durable, per-collection key-value store backing the replica and delegation store.
//! - [`replica`] — The local replica (C5): in-memory indexes over accepted messages.
//! - [`identity`] — The identity resolver (C6): wallet-address-to-display-identity resolution.
//! - [`actions`] — Forum actions (C7): the pre-send permission matrix and message pipeline.
//! - [`scoring`] — The relevance scorer (C8): a deterministic function of post/votes/comments/moderation/now.
//! - [`transport`] — The transport adapter trait (C9): interface only.
//! - [`client`] — The client facade (C10) wiring every component above behind one `open`/`close` lifecycle.
//! - [`config`] — Engine configuration (durable-store location, delegation durations, scoring constants).
//! - [`telemetry`] — Structured logging setup.
//! - [`error`] — The layered error taxonomy.

pub mod actions;
pub mod client;
pub mod config;
pub mod crypto;
pub mod delegation;
pub mod error;
pub mod identity;
pub mod ids;
pub mod message;
pub mod replica;
pub mod scoring;
pub mod store;
pub mod telemetry;
pub mod timestamp;
pub mod transport;
