//! DPoP proofs for the Mercari API.
//!
//! Each client owns an ephemeral P-256 key. Every request carries a fresh
//! ES256 JWT bound to the request method and URL, with the public key
//! embedded in the header as a JWK.

use crate::error::{MarketplaceError, MarketplaceResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::{
    AlgorithmParameters, CommonParameters, EllipticCurve, EllipticCurveKeyParameters,
    EllipticCurveKeyType, Jwk,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use p256::SecretKey;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

const PROOF_TYPE: &str = "dpop+jwt";

/// Claims of a single proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DpopClaims {
    pub iat: u64,
    pub jti: String,
    pub htu: String,
    pub htm: String,
    pub uuid: String,
}

/// Signs per-request proofs with a key generated at construction
#[derive(Clone)]
pub struct DpopSigner {
    key: EncodingKey,
    header: Header,
    device_id: String,
}

impl DpopSigner {
    /// Generate a fresh key pair
    pub fn generate() -> MarketplaceResult<Self> {
        let secret = SecretKey::random(&mut OsRng);

        let der = secret
            .to_pkcs8_der()
            .map_err(|e| MarketplaceError::Signing(format!("failed to encode key: {}", e)))?;
        let key = EncodingKey::from_ec_der(der.as_bytes());

        let point = secret.public_key().to_encoded_point(false);
        let (x, y) = match (point.x(), point.y()) {
            (Some(x), Some(y)) => (URL_SAFE_NO_PAD.encode(x), URL_SAFE_NO_PAD.encode(y)),
            _ => {
                return Err(MarketplaceError::Signing(
                    "public key has no affine coordinates".to_string(),
                ))
            }
        };

        let mut header = Header::new(Algorithm::ES256);
        header.typ = Some(PROOF_TYPE.to_string());
        header.jwk = Some(Jwk {
            common: CommonParameters::default(),
            algorithm: AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
                key_type: EllipticCurveKeyType::EC,
                curve: EllipticCurve::P256,
                x,
                y,
            }),
        });

        Ok(Self {
            key,
            header,
            device_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Sign a proof for one request
    pub fn proof(&self, method: &str, url: &Url) -> MarketplaceResult<String> {
        let claims = DpopClaims {
            iat: jsonwebtoken::get_current_timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            htu: url.to_string(),
            htm: method.to_string(),
            uuid: self.device_id.clone(),
        };

        jsonwebtoken::encode(&self.header, &claims, &self.key)
            .map_err(|e| MarketplaceError::Signing(e.to_string()))
    }
}

impl fmt::Debug for DpopSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DpopSigner")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    /// Verify a proof against the key embedded in its own header
    pub(crate) fn verify_proof(token: &str) -> (Header, DpopClaims) {
        let header = jsonwebtoken::decode_header(token).unwrap();
        let jwk = header.jwk.clone().expect("proof header carries a jwk");
        let key = DecodingKey::from_jwk(&jwk).unwrap();

        let mut validation = Validation::new(Algorithm::ES256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<DpopClaims>(token, &key, &validation).unwrap();
        (header, data.claims)
    }

    #[test]
    fn test_proof_is_bound_to_request() {
        let signer = DpopSigner::generate().unwrap();
        let url = Url::parse("https://api.mercari.jp/v2/entities:search").unwrap();

        let token = signer.proof("POST", &url).unwrap();
        let (header, claims) = verify_proof(&token);

        assert_eq!(header.alg, Algorithm::ES256);
        assert_eq!(header.typ.as_deref(), Some("dpop+jwt"));
        assert_eq!(claims.htm, "POST");
        assert_eq!(claims.htu, "https://api.mercari.jp/v2/entities:search");
        assert_eq!(claims.uuid, signer.device_id);
        assert!(claims.iat > 0);
    }

    #[test]
    fn test_each_proof_is_unique() {
        let signer = DpopSigner::generate().unwrap();
        let url = Url::parse("https://api.mercari.jp/v2/entities:search").unwrap();

        let (_, first) = verify_proof(&signer.proof("POST", &url).unwrap());
        let (_, second) = verify_proof(&signer.proof("POST", &url).unwrap());

        assert_ne!(first.jti, second.jti);
        assert_eq!(first.uuid, second.uuid);
    }

    #[test]
    fn test_signers_use_distinct_keys() {
        let url = Url::parse("https://api.mercari.jp/v2/entities:search").unwrap();
        let a = DpopSigner::generate().unwrap();
        let b = DpopSigner::generate().unwrap();

        let (ha, _) = verify_proof(&a.proof("POST", &url).unwrap());
        let (hb, _) = verify_proof(&b.proof("POST", &url).unwrap());

        assert_ne!(
            serde_json::to_value(&ha.jwk).unwrap(),
            serde_json::to_value(&hb.jwk).unwrap()
        );
    }
}
