//! JWT access token signing and verification.
//!
//! Access tokens are compact JWTs carrying `iss`, `me`, `scope`, `exp`,
//! `iat` and `jti`. They are signed with one of the server's private keys
//! (picked at random from the [`SigningKeySet`]) and verified against a
//! [`JwksSource`] located by the `kid` header.
//!
//! ## Supported Algorithms
//!
//! - **RS256**: RSA with SHA-256
//! - **RS384**: RSA with SHA-384
//! - **ES384**: ECDSA with P-384 curve (smaller keys)
//!
//! ## Example
//!
//! ```ignore
//! use indieauth_core::token::jwt::{self, SigningKeyPair, SigningKeySet};
//!
//! let keys = SigningKeySet::single(SigningKeyPair::generate_ec()?);
//! let signed = jwt::sign(
//!     &jwt::SignOptions::new("https://auth.example.com/", "https://example.com/", "create", expires_in),
//!     &keys,
//! )?;
//!
//! let claims = jwt::verify(&signed.token, "https://auth.example.com/", &keys).await?;
//! ```

use std::fmt;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::jwk::{JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use p384::SecretKey as EcSecretKey;
use p384::ecdsa::SigningKey as EcSigningKey;
use p384::pkcs8::{DecodePrivateKey, EncodePrivateKey as EcEncodePrivateKey};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rsa::pkcs8::{DecodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jwks::{JwksError, JwksSource, find_key};
use crate::error::AuthError;
use crate::types::unix_now;

/// Decoded JWT payload.
pub type Claims = serde_json::Map<String, Value>;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid (wrong issuer, ...).
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// No key in the set matches the token's `kid`.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was not found.
        kid: String,
    },

    /// Failed to generate a cryptographic key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// The signing key set is empty.
    #[error("No signing keys available")]
    NoSigningKeys,

    /// The verification key set could not be obtained.
    #[error("Key set unavailable: {0}")]
    KeySource(#[from] JwksError),
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if the token itself failed verification (as opposed to
    /// the server being unable to verify it).
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::DecodingError { .. }
                | Self::Expired
                | Self::InvalidSignature
                | Self::InvalidClaims { .. }
                | Self::KeyNotFound { .. }
                | Self::InvalidKey { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer | ErrorKind::MissingRequiredClaim(_) => {
                Self::invalid_claims(err.to_string())
            }
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                Self::invalid_key(err.to_string())
            }
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        if err.is_token_error() {
            AuthError::invalid_token(err.to_string())
        } else {
            AuthError::server_error(err.to_string())
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms for access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384 curve.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Maps a `jsonwebtoken` algorithm back, if it is one we accept.
    #[must_use]
    pub fn from_jwt_algorithm(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::RS256 => Some(Self::RS256),
            Algorithm::RS384 => Some(Self::RS384),
            Algorithm::ES384 => Some(Self::ES384),
            _ => None,
        }
    }

    /// Returns the algorithm name as used in JWK/JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// Issuer (this server).
    pub iss: String,

    /// Profile URL of the user the token acts for.
    pub me: String,

    /// Space-separated scopes.
    pub scope: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// JWT ID, unique per issuance.
    pub jti: String,
}

/// Parameters for [`sign`].
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub issuer: String,
    pub me: String,
    pub scope: String,
    /// Lifetime of the token from now.
    pub expires_in: Duration,
}

impl SignOptions {
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        me: impl Into<String>,
        scope: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            me: me.into(),
            scope: scope.into(),
            expires_in,
        }
    }
}

/// A signed access token.
#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    /// Compact JWT.
    pub token: String,
    /// Key ID of the key that signed it.
    pub kid: String,
    /// The claims that were signed.
    pub claims: AccessTokenClaims,
}

// ============================================================================
// JWKS Types
// ============================================================================

/// Publishable JSON Web Key Set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Converts into the `jsonwebtoken` representation used for verification.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidKey` if a key cannot be represented.
    pub fn to_jwk_set(&self) -> Result<JwkSet, JwtError> {
        serde_json::to_value(self)
            .and_then(serde_json::from_value)
            .map_err(|e| JwtError::invalid_key(e.to_string()))
    }
}

/// Publishable JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig" for signing).
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

// ============================================================================
// Signing Keys
// ============================================================================

/// A private signing key with its public half.
pub struct SigningKeyPair {
    /// Key ID.
    pub kid: String,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    encoding_key: EncodingKey,

    public_key_data: PublicKeyData,
}

enum PublicKeyData {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { x: Vec<u8>, y: Vec<u8> },
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Encodes any serializable payload as a compact JWT signed with this
    /// key, with `kid` in the header.
    ///
    /// # Errors
    /// Returns `JwtError::EncodingError` if serialization or signing fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(self.algorithm.to_jwt_algorithm());
        header.kid = Some(self.kid.clone());

        jsonwebtoken::encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Generates a new 2048-bit RSA key pair.
    ///
    /// # Errors
    /// Returns an error if key generation fails or algorithm is not RSA-based.
    pub fn generate_rsa(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        if !algorithm.is_rsa() {
            return Err(JwtError::invalid_key(format!(
                "Algorithm {algorithm} is not RSA-based"
            )));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let public_key = private_key.to_public_key();

        let private_pem = rsa::pkcs8::EncodePrivateKey::to_pkcs8_pem(&private_key, LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Ok(Self {
            kid: uuid::Uuid::new_v4().to_string(),
            algorithm,
            encoding_key,
            public_key_data: PublicKeyData::Rsa {
                n: public_key.n().to_bytes_be(),
                e: public_key.e().to_bytes_be(),
            },
        })
    }

    /// Generates a new EC key pair on the P-384 curve.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate_ec() -> Result<Self, JwtError> {
        Self::from_ec_secret(
            uuid::Uuid::new_v4().to_string(),
            EcSecretKey::random(&mut OsRng),
        )
        .map_err(|e| JwtError::key_generation_error(e.to_string()))
    }

    /// Generates a key pair for `algorithm`.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        if algorithm.is_rsa() {
            Self::generate_rsa(algorithm)
        } else {
            Self::generate_ec()
        }
    }

    /// Loads a key pair from a PKCS#8 PEM private key.
    ///
    /// For RSA keys the matching SPKI public key PEM is required.
    ///
    /// # Errors
    /// Returns an error if the PEM data is invalid.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
        public_pem: Option<&str>,
    ) -> Result<Self, JwtError> {
        let kid = kid.into();
        if !algorithm.is_rsa() {
            let secret_key = EcSecretKey::from_pkcs8_pem(private_pem)
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            return Self::from_ec_secret(kid, secret_key);
        }

        let public_pem =
            public_pem.ok_or_else(|| JwtError::invalid_key("RSA keys need a public key PEM"))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid,
            algorithm,
            encoding_key,
            public_key_data: PublicKeyData::Rsa {
                n: public_key.n().to_bytes_be(),
                e: public_key.e().to_bytes_be(),
            },
        })
    }

    fn from_ec_secret(kid: String, secret_key: EcSecretKey) -> Result<Self, JwtError> {
        let signing_key = EcSigningKey::from(&secret_key);
        let point = signing_key.verifying_key().to_encoded_point(false);
        let x = point
            .x()
            .ok_or_else(|| JwtError::invalid_key("Missing x coordinate"))?;
        let y = point
            .y()
            .ok_or_else(|| JwtError::invalid_key("Missing y coordinate"))?;

        // jsonwebtoken only reads EC private keys as PKCS#8 PEM
        let private_pem = secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid,
            algorithm: SigningAlgorithm::ES384,
            encoding_key,
            public_key_data: PublicKeyData::Ec {
                x: x.to_vec(),
                y: y.to_vec(),
            },
        })
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        let (kty, n, e, crv, x, y) = match &self.public_key_data {
            PublicKeyData::Rsa { n, e } => (
                "RSA",
                Some(URL_SAFE_NO_PAD.encode(n)),
                Some(URL_SAFE_NO_PAD.encode(e)),
                None,
                None,
                None,
            ),
            PublicKeyData::Ec { x, y } => (
                "EC",
                None,
                None,
                Some("P-384".to_string()),
                Some(URL_SAFE_NO_PAD.encode(x)),
                Some(URL_SAFE_NO_PAD.encode(y)),
            ),
        };

        Jwk {
            kty: kty.to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: self.algorithm.as_str().to_string(),
            n,
            e,
            crv,
            x,
            y,
        }
    }
}

/// The server's private signing keys.
#[derive(Debug)]
pub struct SigningKeySet {
    keys: Vec<SigningKeyPair>,
}

impl SigningKeySet {
    /// Creates a key set.
    ///
    /// # Errors
    /// Returns `JwtError::NoSigningKeys` if `keys` is empty.
    pub fn new(keys: Vec<SigningKeyPair>) -> Result<Self, JwtError> {
        if keys.is_empty() {
            return Err(JwtError::NoSigningKeys);
        }
        Ok(Self { keys })
    }

    /// Creates a key set holding one key.
    #[must_use]
    pub fn single(key: SigningKeyPair) -> Self {
        Self { keys: vec![key] }
    }

    /// Picks a signing key at random.
    #[must_use]
    pub fn choose(&self) -> Option<&SigningKeyPair> {
        self.keys.choose(&mut rand::thread_rng())
    }

    /// Returns the public keys.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: self.keys.iter().map(SigningKeyPair::to_jwk).collect(),
        }
    }
}

#[async_trait::async_trait]
impl JwksSource for SigningKeySet {
    async fn key_set(&self) -> Result<JwkSet, JwksError> {
        self.jwks()
            .to_jwk_set()
            .map_err(|e| JwksError::ParseError(e.to_string()))
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Signs an access token for `options` with a randomly chosen key.
///
/// Sets `iat` to now, `exp` to now + `expires_in` and `jti` to a fresh
/// UUID.
///
/// # Errors
/// Returns an error if the key set is empty or encoding fails.
pub fn sign(options: &SignOptions, keys: &SigningKeySet) -> Result<SignedAccessToken, JwtError> {
    let iat = unix_now();
    let expires_in = i64::try_from(options.expires_in.as_secs())
        .map_err(|_| JwtError::encoding_error("expiration out of range"))?;

    let claims = AccessTokenClaims {
        iss: options.issuer.clone(),
        me: options.me.clone(),
        scope: options.scope.clone(),
        exp: iat + expires_in,
        iat,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    sign_claims(claims, keys)
}

/// Signs prepared claims with a randomly chosen key.
///
/// # Errors
/// Returns an error if the key set is empty or encoding fails.
pub fn sign_claims(
    claims: AccessTokenClaims,
    keys: &SigningKeySet,
) -> Result<SignedAccessToken, JwtError> {
    let key = keys.choose().ok_or(JwtError::NoSigningKeys)?;
    let token = key.encode(&claims)?;

    Ok(SignedAccessToken {
        token,
        kid: key.kid.clone(),
        claims,
    })
}

/// Verifies signature, `iss` and `exp` of `token` against the key set
/// provided by `source`.
///
/// An unknown `kid` triggers one refresh of the source before giving up.
///
/// # Errors
/// - `JwtError::Expired` for a validly signed but expired token
/// - `JwtError::KeySource` if the key set cannot be fetched
/// - other variants for malformed or forged tokens
pub async fn verify(
    token: &str,
    issuer: &str,
    source: &dyn JwksSource,
) -> Result<Claims, JwtError> {
    let header = jsonwebtoken::decode_header(token)?;

    let mut set = source.key_set().await?;
    if header.kid.is_some() && find_key(&set, header.kid.as_deref()).is_none() {
        tracing::debug!(kid = ?header.kid, "Unknown kid, refreshing key set");
        set = source.refresh().await?;
    }

    verify_with_key_set(token, issuer, &set)
}

/// Synchronous variant of [`verify`] for an already obtained key set.
///
/// # Errors
/// See [`verify`].
pub fn verify_with_key_set(token: &str, issuer: &str, set: &JwkSet) -> Result<Claims, JwtError> {
    let header = jsonwebtoken::decode_header(token)?;
    let algorithm = SigningAlgorithm::from_jwt_algorithm(header.alg)
        .ok_or_else(|| JwtError::decoding_error(format!("algorithm {:?} not accepted", header.alg)))?;

    let jwk = find_key(set, header.kid.as_deref())
        .ok_or_else(|| JwtError::key_not_found(header.kid.clone().unwrap_or_default()))?;

    if let Some(key_algorithm) = jwk.common.key_algorithm
        && key_algorithm_name(key_algorithm) != Some(algorithm)
    {
        return Err(JwtError::invalid_key(format!(
            "key is not usable with {algorithm}"
        )));
    }

    let key = DecodingKey::from_jwk(jwk)?;

    let mut validation = Validation::new(algorithm.to_jwt_algorithm());
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["iss"]);
    validation.validate_exp = true;
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)?;
    Ok(data.claims)
}

/// Decodes the payload without checking the signature.
///
/// Only for reporting on tokens that already failed [`verify`] as expired;
/// never use the result to authorize anything.
///
/// # Errors
/// Returns `JwtError::DecodingError` if the token is not a JWT with a JSON
/// object payload.
pub fn decode(token: &str) -> Result<Claims, JwtError> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(JwtError::decoding_error("expected three segments"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| JwtError::decoding_error(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| JwtError::decoding_error(e.to_string()))
}

fn key_algorithm_name(algorithm: KeyAlgorithm) -> Option<SigningAlgorithm> {
    match algorithm {
        KeyAlgorithm::RS256 => Some(SigningAlgorithm::RS256),
        KeyAlgorithm::RS384 => Some(SigningAlgorithm::RS384),
        KeyAlgorithm::ES384 => Some(SigningAlgorithm::ES384),
        _ => None,
    }
}

/// Returns a string claim.
#[must_use]
pub fn claim_str<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(Value::as_str)
}

/// Returns an integer claim.
#[must_use]
pub fn claim_i64(claims: &Claims, name: &str) -> Option<i64> {
    claims.get(name).and_then(Value::as_i64)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::jwks::StaticJwks;

    const ISSUER: &str = "https://auth.example.com/";
    const ME: &str = "https://example.com/";

    fn ec_keys() -> SigningKeySet {
        SigningKeySet::single(SigningKeyPair::generate_ec().unwrap())
    }

    fn options(expires_in: u64) -> SignOptions {
        SignOptions::new(ISSUER, ME, "create update", Duration::from_secs(expires_in))
    }

    fn expired_claims() -> AccessTokenClaims {
        let now = unix_now();
        AccessTokenClaims {
            iss: ISSUER.to_string(),
            me: ME.to_string(),
            scope: "create".to_string(),
            exp: now - 3600,
            iat: now - 7200,
            jti: "expired-jti".to_string(),
        }
    }

    #[tokio::test]
    async fn test_es384_sign_verify() {
        let keys = ec_keys();
        let signed = sign(&options(900), &keys).unwrap();

        let claims = verify(&signed.token, ISSUER, &keys).await.unwrap();
        assert_eq!(claim_str(&claims, "me"), Some(ME));
        assert_eq!(claim_str(&claims, "scope"), Some("create update"));
        assert_eq!(claim_str(&claims, "jti"), Some(signed.claims.jti.as_str()));
        assert_eq!(
            claim_i64(&claims, "exp").unwrap() - claim_i64(&claims, "iat").unwrap(),
            900
        );
    }

    #[tokio::test]
    async fn test_rs256_sign_verify() {
        let keys =
            SigningKeySet::single(SigningKeyPair::generate_rsa(SigningAlgorithm::RS256).unwrap());
        let signed = sign(&options(60), &keys).unwrap();

        let claims = verify(&signed.token, ISSUER, &keys).await.unwrap();
        assert_eq!(claim_str(&claims, "iss"), Some(ISSUER));
    }

    #[test]
    fn test_header_carries_kid() {
        let keys = ec_keys();
        let signed = sign(&options(60), &keys).unwrap();
        let header = jsonwebtoken::decode_header(&signed.token).unwrap();
        assert_eq!(header.kid.as_deref(), Some(signed.kid.as_str()));
        assert_eq!(header.alg, Algorithm::ES384);
    }

    #[test]
    fn test_jti_unique_per_signature() {
        let keys = ec_keys();
        let a = sign(&options(60), &keys).unwrap();
        let b = sign(&options(60), &keys).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
        assert!(a.claims.exp > a.claims.iat);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let keys = ec_keys();
        let signed = sign_claims(expired_claims(), &keys).unwrap();

        let err = verify(&signed.token, ISSUER, &keys).await.unwrap_err();
        assert!(matches!(err, JwtError::Expired));
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let keys = ec_keys();
        let signed = sign(&options(60), &keys).unwrap();

        let err = verify(&signed.token, "https://evil.example.com/", &keys)
            .await
            .unwrap_err();
        assert!(matches!(err, JwtError::InvalidClaims { .. }));
    }

    #[tokio::test]
    async fn test_foreign_key_rejected() {
        let signer = ec_keys();
        let signed = sign(&options(60), &signer).unwrap();

        // Same kid, different key material
        let mut impostor = SigningKeyPair::generate_ec().unwrap();
        impostor.kid = signed.kid.clone();
        let verifier = StaticJwks::new(
            SigningKeySet::single(impostor)
                .jwks()
                .to_jwk_set()
                .unwrap(),
        );

        let err = verify(&signed.token, ISSUER, &verifier).await.unwrap_err();
        assert!(matches!(err, JwtError::InvalidSignature));
        assert!(err.is_token_error());
    }

    #[tokio::test]
    async fn test_unknown_kid_rejected() {
        let signed = sign(&options(60), &ec_keys()).unwrap();
        let err = verify(&signed.token, ISSUER, &ec_keys()).await.unwrap_err();
        assert!(matches!(err, JwtError::KeyNotFound { .. }));
    }

    #[tokio::test]
    async fn test_garbage_rejected() {
        let err = verify("not-a-jwt", ISSUER, &ec_keys()).await.unwrap_err();
        assert!(err.is_token_error());
        assert!(matches!(AuthError::from(err), AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_decode_recovers_claims_of_expired_token() {
        let signed = sign_claims(expired_claims(), &ec_keys()).unwrap();
        let claims = decode(&signed.token).unwrap();
        assert_eq!(claim_str(&claims, "jti"), Some("expired-jti"));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("only.two").is_err());
        assert!(decode("a.b.c.d").is_err());
        assert!(decode("a.!!!.c").is_err());
        assert!(decode(&format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]"))).is_err());
    }

    #[test]
    fn test_from_pem_ec_matches_public_key() {
        let secret = EcSecretKey::random(&mut OsRng);
        let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();

        let key = SigningKeyPair::from_pem("pem-key", SigningAlgorithm::ES384, &pem, None).unwrap();
        let jwk = key.to_jwk();
        assert_eq!(jwk.kid, "pem-key");
        assert_eq!(jwk.crv.as_deref(), Some("P-384"));
    }

    #[test]
    fn test_from_pem_rsa_requires_public_key() {
        let err = SigningKeyPair::from_pem("k", SigningAlgorithm::RS256, "irrelevant", None)
            .unwrap_err();
        assert!(matches!(err, JwtError::InvalidKey { .. }));
    }

    #[test]
    fn test_jwks_export() {
        let keys = SigningKeySet::new(vec![
            SigningKeyPair::generate_ec().unwrap(),
            SigningKeyPair::generate_ec().unwrap(),
        ])
        .unwrap();
        let jwks = keys.jwks();
        assert_eq!(jwks.keys.len(), 2);
        assert!(jwks.keys.iter().all(|k| k.kty == "EC" && k.use_ == "sig"));

        let json = serde_json::to_string(&jwks).unwrap();
        assert!(json.contains("\"use\":\"sig\""));
        assert!(!json.contains("\"n\""));

        let set = jwks.to_jwk_set().unwrap();
        assert_eq!(set.keys.len(), 2);
    }

    #[test]
    fn test_empty_key_set_rejected() {
        assert!(matches!(
            SigningKeySet::new(Vec::new()),
            Err(JwtError::NoSigningKeys)
        ));
    }

    #[test]
    fn test_key_source_error_is_server_error() {
        let err: AuthError = JwtError::from(JwksError::HttpError(503)).into();
        assert!(err.is_server_error());
    }
}
