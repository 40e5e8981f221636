//! id_token verification against the broker's published key set.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, Validation, decode, decode_header,
	jwk::{Jwk, JwkSet},
};
// self
use crate::{_prelude::*, error::TokenError};

/// Asymmetric signature algorithms accepted from brokers. Symmetric algorithms and `none`
/// are never accepted.
const ALLOWED_ALGORITHMS: &[Algorithm] = &[
	Algorithm::RS256,
	Algorithm::RS384,
	Algorithm::RS512,
	Algorithm::ES256,
	Algorithm::ES384,
	Algorithm::EdDSA,
];

/// Claims extracted from a verified id_token. Presence of the protocol claims is enforced by
/// the verify flow, after signature and standard-claim validation.
#[derive(Debug, Deserialize)]
pub(crate) struct IdTokenClaims {
	pub(crate) nonce: Option<String>,
	pub(crate) email: Option<String>,
	pub(crate) email_original: Option<String>,
	iat: Option<i64>,
}

/// Validates `token` against the broker key set and returns its claims.
///
/// The signature must verify under a key from `keys`, selected by the header's `kid` (or the
/// set's sole key when the header names none). Issuer, audience, and expiry are validated
/// with the configured leeway; a token issued more than `leeway` in the future is rejected as
/// well.
pub(crate) fn verify_id_token(
	token: &str,
	keys: &JwkSet,
	issuer: &str,
	audience: &str,
	leeway: Duration,
) -> Result<IdTokenClaims, TokenError> {
	let header = decode_header(token).map_err(validation_error)?;

	if !ALLOWED_ALGORITHMS.contains(&header.alg) {
		return Err(TokenError::Validation {
			message: format!("signature algorithm {:?} is not accepted", header.alg),
		});
	}

	let key = select_key(keys, header.kid.as_deref())?;
	let key = DecodingKey::from_jwk(key).map_err(validation_error)?;
	let mut validation = Validation::new(header.alg);

	validation.leeway = u64::try_from(leeway.whole_seconds()).unwrap_or(0);
	validation.set_issuer(&[issuer]);
	validation.set_audience(&[audience]);

	let claims = decode::<IdTokenClaims>(token, &key, &validation).map_err(validation_error)?.claims;

	// `exp` is covered above; future-dated issuance is not.
	if let Some(iat) = claims.iat {
		let now = OffsetDateTime::now_utc().unix_timestamp();

		if iat > now.saturating_add(leeway.whole_seconds()) {
			return Err(TokenError::Validation { message: "token issued in the future".into() });
		}
	}

	Ok(claims)
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, TokenError> {
	match kid {
		Some(kid) => keys.find(kid).ok_or_else(|| TokenError::Validation {
			message: format!("no key in the broker key set matches kid `{kid}`"),
		}),
		None => match keys.keys.as_slice() {
			[key] => Ok(key),
			_ => Err(TokenError::Validation {
				message: "token names no key and the broker key set is ambiguous".into(),
			}),
		},
	}
}

fn validation_error(e: jsonwebtoken::errors::Error) -> TokenError {
	TokenError::Validation { message: e.to_string() }
}
