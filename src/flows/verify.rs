//! Login completion: token verification + nonce consumption.

// crates.io
use jsonwebtoken::jwk::JwkSet;
// self
use crate::{
	_prelude::*,
	error::{FetchError, TokenError},
	flows::Client,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::StoreError,
	token::verify_id_token,
};

impl Client {
	/// Verifies an id_token and returns the authenticated email address.
	///
	/// The token is delivered to the redirect URI directly by the user agent, either via an
	/// HTTP POST with a form body or in the URL fragment, depending on the configured
	/// [`ResponseMode`](crate::flows::ResponseMode). Its signature is checked against the
	/// broker's published key set, its claims against the broker origin, the client
	/// identifier, and the configured leeway; the embedded nonce is then consumed so the
	/// token cannot be replayed.
	pub async fn verify(&self, token: &str) -> Result<String> {
		const KIND: FlowKind = FlowKind::Verify;

		let span = FlowSpan::new(KIND, "verify");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let discovery = self.fetch_discovery().await?;
				let jwks_url = Url::parse(&discovery.jwks_uri).map_err(|e| {
					FetchError::InvalidEndpoint { field: "jwks_uri", message: e.to_string() }
				})?;
				let keys = self.store.fetch_json::<JwkSet>(jwks_url).await?;
				let claims =
					verify_id_token(token, &keys, &self.issuer, &self.client_id, self.leeway)?;
				let nonce = required_claim(claims.nonce, "nonce")?;
				let email = required_claim(claims.email, "email")?;
				// The broker may rewrite the address for token issuance; the nonce pair stays
				// bound to the originally requested one.
				let session_email = claims
					.email_original
					.filter(|value| !value.is_empty())
					.unwrap_or_else(|| email.clone());

				match self.store.consume_nonce(&nonce, &session_email).await {
					Ok(()) => Ok(email),
					Err(Error::Store(StoreError::InvalidNonce)) => Err(Error::InvalidSession),
					Err(e) => Err(e),
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

fn required_claim(value: Option<String>, claim: &'static str) -> Result<String> {
	value
		.filter(|value| !value.is_empty())
		.ok_or_else(|| TokenError::MissingClaim { claim }.into())
}
