//! Error taxonomy shared across configuration, document fetching, token verification, and
//! stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fatal at construction, never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Document fetch failure; memoized briefly by caching stores so a broken endpoint is not
	/// hammered.
	#[error(transparent)]
	Fetch(#[from] FetchError),
	/// The id_token failed verification or lacks a required claim.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Storage-layer failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		crate::store::StoreError,
	),

	/// The login session is unknown, already used, or bound to another address.
	///
	/// Raised by [`Client::verify`](crate::flows::Client::verify) in place of
	/// [`StoreError::InvalidNonce`](crate::store::StoreError::InvalidNonce); deliberately not
	/// distinguishing the cases so no session state leaks to an attacker.
	#[error("Invalid session.")]
	InvalidSession,
}

/// Configuration and validation failures raised when constructing a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Broker URL cannot be parsed.
	#[error("Broker URL is invalid.")]
	InvalidBroker {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Broker URL carries more than a bare scheme + host.
	#[error("Broker URL must be a bare HTTP(S) origin.")]
	BrokerNotOrigin,
	/// Redirect URI cannot be parsed or is not absolute.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Response mode string names neither `form_post` nor `fragment`.
	#[error("Unrecognized response mode `{value}`.")]
	UnsupportedResponseMode {
		/// The rejected input.
		value: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No store was supplied and the default in-memory store is compiled out.
	#[error("A store implementation is required without the `reqwest` feature.")]
	MissingStore,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures produced while fetching a broker document.
///
/// Values are cloneable because caching stores memoize them for a short backoff window and
/// hand the same failure to every caller arriving within it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum FetchError {
	/// Network failure while performing the GET.
	#[error("Network error occurred while fetching `{url}`: {message}.")]
	Transport {
		/// Document URL.
		url: String,
		/// Transport-specific failure description.
		message: String,
	},
	/// Endpoint answered with a non-success status.
	#[error("Unexpected HTTP status {status} while fetching `{url}`.")]
	Status {
		/// Document URL.
		url: String,
		/// HTTP status code returned by the endpoint.
		status: u16,
	},
	/// Body is not valid JSON for the expected document shape.
	#[error("Malformed document at `{url}`: {message}.")]
	Decode {
		/// Document URL.
		url: String,
		/// Structured parsing failure, including the JSON path.
		message: String,
	},
	/// A fetched document carries a URL field that does not parse.
	#[error("Discovery document field `{field}` is not a valid URL: {message}.")]
	InvalidEndpoint {
		/// Name of the offending document field.
		field: &'static str,
		/// Underlying parsing failure description.
		message: String,
	},
}

/// Failures produced while verifying an id_token.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// Signature or standard-claim validation failed.
	///
	/// One opaque class covering bad signatures, unknown keys, disallowed algorithms, wrong
	/// issuer or audience, and expiry outside the configured leeway; a token failing any check
	/// is granted no partial trust.
	#[error("Identity token failed validation: {message}.")]
	Validation {
		/// Description of the failed check.
		message: String,
	},
	/// A required claim is absent or empty.
	#[error("Identity token is missing the `{claim}` claim.")]
	MissingClaim {
		/// Name of the missing claim.
		claim: &'static str,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;
	use std::error::Error as StdError;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "table unreachable".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Store(_)));
		assert!(client_error.to_string().contains("table unreachable"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn fetch_errors_keep_their_kind_through_conversion() {
		let fetch_error =
			FetchError::Status { url: "https://idp.example/keys".into(), status: 503 };
		let client_error: Error = fetch_error.clone().into();

		assert!(matches!(
			client_error,
			Error::Fetch(FetchError::Status { status: 503, .. })
		));
		assert_eq!(client_error.to_string(), fetch_error.to_string());
	}

	#[test]
	fn invalid_session_does_not_name_a_cause() {
		let message = Error::InvalidSession.to_string();

		assert_eq!(message, "Invalid session.");
		assert!(!message.to_lowercase().contains("nonce"));
	}
}
