//! Login initiation: nonce issuance + authorization URL construction.

// self
use crate::{
	_prelude::*,
	error::FetchError,
	flows::Client,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl Client {
	/// Creates a login session for the given email and returns the URL to redirect the user
	/// agent (browser) to so authentication can continue.
	///
	/// If performing the redirect in the HTTP response, the recommended method is a 303 status
	/// with the `Location` header set to the URL; fetching the URL from client-side JavaScript
	/// works as well. Besides the (cached) discovery lookup, no network request is made.
	pub async fn start_auth(&self, email: &str) -> Result<Url> {
		const KIND: FlowKind = FlowKind::StartAuth;

		let span = FlowSpan::new(KIND, "start_auth");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let discovery = self.fetch_discovery().await?;
				let mut authorize_url = Url::parse(&discovery.authorization_endpoint).map_err(
					|e| FetchError::InvalidEndpoint {
						field: "authorization_endpoint",
						message: e.to_string(),
					},
				)?;
				let nonce = self.store.new_nonce(email).await?;

				{
					let mut pairs = authorize_url.query_pairs_mut();

					pairs.append_pair("login_hint", email);
					pairs.append_pair("scope", "openid email");
					pairs.append_pair("nonce", &nonce);
					pairs.append_pair("response_type", "id_token");
					pairs.append_pair("response_mode", self.response_mode.as_str());
					pairs.append_pair("client_id", &self.client_id);
					pairs.append_pair("redirect_uri", self.redirect_uri.as_str());
				}

				Ok(authorize_url)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
