//! Organization invitation links.
//!
//! An invite URL carries `?token=<base64 JSON>` naming the organization the
//! new user joins. The sign-up form decodes it to pre-fill and lock the email
//! and to attach the organization to the registration metadata.
//!
//! TRADE-OFFS
//! ==========
//! Tokens are not signed. Decoding only shapes the sign-up request; the
//! backend decides whether the membership is honoured.

#[cfg(test)]
#[path = "invite_test.rs"]
mod tests;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize};

use crate::session::SignUpFields;
use crate::validation::normalize_email;

/// Role assigned to users who join through an invitation.
pub const INVITED_ROLE_ID: i64 = 1001;

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("invite token is not valid base64")]
    Encoding,
    #[error("invite token payload is malformed: {0}")]
    Payload(String),
    #[error("invite token has an invalid email address")]
    InvalidEmail,
    #[error("invite token has an invalid organization id")]
    InvalidOrganization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteToken {
    #[serde(deserialize_with = "lenient_i64")]
    pub organization_id: i64,
    #[serde(default)]
    pub organization_name: String,
    pub email: String,
    /// Issue time in Unix milliseconds.
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub timestamp: Option<i64>,
}

impl InviteToken {
    /// Decode a token from a query parameter. Standard and URL-safe alphabets
    /// are accepted, padded or not.
    pub fn decode(raw: &str) -> Result<Self, InviteError> {
        let raw = raw.trim();
        let bytes = [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(raw).ok())
            .ok_or(InviteError::Encoding)?;
        let mut token: Self = serde_json::from_slice(&bytes).map_err(|e| InviteError::Payload(e.to_string()))?;
        token.email = normalize_email(&token.email).map_err(|_| InviteError::InvalidEmail)?;
        if token.organization_id <= 0 {
            return Err(InviteError::InvalidOrganization);
        }
        token.organization_name = token.organization_name.trim().to_owned();
        Ok(token)
    }

    /// URL-safe encoding, as the invitation sender produces it.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Attach the invitation to validated sign-up fields. The email always
    /// comes from the token.
    #[must_use]
    pub fn apply(&self, mut fields: SignUpFields) -> SignUpFields {
        fields.email.clone_from(&self.email);
        fields.organization_id = Some(self.organization_id);
        fields.organization_name = Some(self.organization_name.clone()).filter(|n| !n.is_empty());
        fields.role_id = Some(INVITED_ROLE_ID);
        fields
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    match IntOrString::deserialize(de)? {
        IntOrString::Int(n) => Ok(n),
        IntOrString::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    match Option::<IntOrString>::deserialize(de)? {
        None => Ok(None),
        Some(IntOrString::Int(n)) => Ok(Some(n)),
        Some(IntOrString::Str(s)) => Ok(s.trim().parse().ok()),
    }
}
