//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs that sign tokens and describe
//! themselves as JWKs. The same seed always produces the same keypair.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};

/// Ed25519 keypair for signing test tokens.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::new(1, "key-01");
/// let token = keypair.sign(&TestTokenBuilder::new(ISSUER, AUDIENCE).build());
/// let jwks = serde_json::json!({ "keys": [keypair.jwk_json()] });
/// ```
pub struct TestKeypair {
    kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Create a keypair from `seed`, published under key ID `kid`.
    pub fn new(seed: u8, kid: &str) -> Self {
        // Create deterministic 32-byte seed from input
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign `claims` as an EdDSA JWT carrying this keypair's `kid`.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        self.sign_with_kid(claims, Some(&self.kid))
    }

    /// Sign `claims` with an arbitrary `kid` header (or none).
    pub fn sign_with_kid(&self, claims: &serde_json::Value, kid: Option<&str>) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = kid.map(ToString::to_string);

        encode(&header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// Public key as an OKP JWK.
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// Build PKCS#8 v1 document from Ed25519 seed.
///
/// `jsonwebtoken` wants the private key as PKCS#8 DER, which ring does not
/// expose for seeded keypairs.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE { version INTEGER 0, AlgorithmIdentifier { OID 1.3.101.112 },
    //            OCTET STRING { OCTET STRING seed } }
    let mut pkcs8 = vec![
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER 0
        0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, // Ed25519 OID
        0x04, 0x22, 0x04, 0x20, // OCTET STRING wrapping the 32-byte seed
    ];
    pkcs8.extend_from_slice(seed);
    pkcs8
}
