//! Turnkey client for the Portier passwordless login protocol—cached broker discovery,
//! single-use nonce tracking, and signed id_token verification in one crate.
//!
//! The primary interface is [`flows::Client`], built from a [`flows::Config`]. A login runs in
//! two phases: [`Client::start_auth`](flows::Client::start_auth) issues a single-use nonce for
//! an email address and returns the broker authorization URL to redirect the user agent to;
//! [`Client::verify`](flows::Client::verify) validates the signed id_token the broker delivers
//! to the redirect URI, consumes the nonce, and returns the verified address.
//!
//! Tracking login sessions and caching broker documents needs storage. The [`store::Store`]
//! trait covers both, and by default an in-memory store is used. That works fine for simple
//! single-process applications; deployments with multiple workers must supply a store backed
//! by shared infrastructure instead. Applications serving several domains should create one
//! short-lived [`Client`](flows::Client) per domain and share a single store between them.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod discovery;
pub mod error;
pub mod flows;
pub mod http;
pub mod nonce;
pub mod obs;
pub mod store;

mod token;

mod _prelude {
	pub use std::{
		any::{Any, TypeId},
		collections::{HashMap, HashSet},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {httpmock as _, tokio as _};
