use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use sketchdesk_domain::auth::Role;
use sketchdesk_domain::identity::ActorIdentity;
use thiserror::Error;

/// Claims issued by the identity provider. `center_id` is only present for
/// drafting center operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_id: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token subject is empty")]
    MissingSubject,
    #[error("token missing or invalid role")]
    InvalidRole,
}

#[derive(Clone)]
pub struct JwtIdentityDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityDecoder {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn decode(&self, token: &str) -> Result<ActorIdentity, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        identity_from_claims(data.claims)
    }
}

fn identity_from_claims(claims: Claims) -> Result<ActorIdentity, TokenError> {
    let user_id = claims.sub.trim().to_string();
    if user_id.is_empty() {
        return Err(TokenError::MissingSubject);
    }
    let role = claims
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or(TokenError::InvalidRole)?;
    let identity = ActorIdentity::new(user_id, role);
    Ok(match claims.center_id.filter(|id| !id.trim().is_empty()) {
        Some(center_id) => identity.with_center(center_id.trim()),
        None => identity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        4_102_444_800
    }

    #[test]
    fn decodes_operator_with_center() {
        let decoder = JwtIdentityDecoder::new("secret");
        let claims = Claims {
            sub: "op-1".into(),
            role: Some("draft_center_operator".into()),
            center_id: Some(" dc-1 ".into()),
            exp: far_future(),
        };
        let actor = decoder.decode(&token(&claims, "secret")).unwrap();
        assert_eq!(actor.role, Role::DraftCenterOperator);
        assert_eq!(actor.center_id.as_deref(), Some("dc-1"));
    }

    #[test]
    fn rejects_wrong_secret_and_unknown_role() {
        let decoder = JwtIdentityDecoder::new("secret");
        let claims = Claims {
            sub: "u-1".into(),
            role: Some("admin".into()),
            center_id: None,
            exp: far_future(),
        };
        assert!(matches!(
            decoder.decode(&token(&claims, "other")),
            Err(TokenError::Invalid(_))
        ));

        let claims = Claims {
            role: Some("janitor".into()),
            ..claims
        };
        assert!(matches!(
            decoder.decode(&token(&claims, "secret")),
            Err(TokenError::InvalidRole)
        ));
    }
}
