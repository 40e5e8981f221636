//! Broker discovery document handling.

// self
use crate::_prelude::*;

/// Well-known path of the broker discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Subset of the broker's OpenID discovery document used by this crate.
///
/// Immutable once fetched; caching stores replace it wholesale on refresh, never partially.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoveryDocument {
	/// Location of the broker's published key set.
	pub jwks_uri: String,
	/// Endpoint that authentication requests are redirected to.
	pub authorization_endpoint: String,
}

/// Returns the discovery document URL for a broker origin.
pub fn discovery_url(broker: &Url) -> Result<Url, url::ParseError> {
	broker.join(DISCOVERY_PATH)
}
