//! Alternate short-Weierstrass curve signing
//!
//! App keys can sign on a curve other than secp256k1. The curve is described at
//! runtime by [`CurveParams`] (hex strings, spaces allowed) and validated into a
//! [`Curve`] before any arithmetic happens. Signatures use a deterministic nonce
//! drawn from an HMAC-DRBG seeded with the private key and the truncated message,
//! so the same key and message always produce the same `(r, s)`.

use std::fmt;

use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize, Serializer};
use sha2::Sha256;

use crate::error::{Error, Result};

/// Upper bound on nonce candidates before giving up
const MAX_NONCE_ATTEMPTS: usize = 1024;

/// Hash function driving the nonce generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurveHash {
    #[default]
    Sha256,
}

/// Caller-facing curve description: `y^2 = x^3 + a*x + b` over `F_p`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveParams {
    /// Field prime
    pub p: String,
    pub a: String,
    pub b: String,
    /// Order of the generator
    pub n: String,
    /// Generator `(x, y)`
    pub g: (String, String),
    #[serde(default)]
    pub hash: CurveHash,
}

impl CurveParams {
    /// The STARK-friendly curve used by default for app-key signing
    pub fn stark() -> Self {
        Self {
            p: "08000000 00000011 00000000 00000000 00000000 00000000 00000000 00000001".to_string(),
            a: "00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000001".to_string(),
            b: "06f21413 efbe40de 150e596d 72f7a8c5 609ad26c 15c915c1 f4cdfcb9 9cee9e89".to_string(),
            n: "08000000 00000010 ffffffff ffffffff b781126d cae7b232 1e66a241 adc64d2f".to_string(),
            g: (
                "01ef15c1 8599971b 7beced41 5a40f0c7 deacfd9b 0d1819e0 3d723d8b c943cfca".to_string(),
                "00566806 0aa49730 b7be4801 df46ec62 de53ecd1 1abe43a3 2873000c 36e8dc1f".to_string(),
            ),
            hash: CurveHash::Sha256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Point {
    x: BigUint,
    y: BigUint,
}

/// A validated curve ready for arithmetic
#[derive(Debug, Clone)]
pub struct Curve {
    p: BigUint,
    a: BigUint,
    b: BigUint,
    n: BigUint,
    g: Point,
    hash: CurveHash,
}

/// An `(r, s)` signature with the parity/overflow recovery hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveSignature {
    r: BigUint,
    s: BigUint,
    recovery_param: u8,
}

impl CurveSignature {
    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    pub fn recovery_param(&self) -> u8 {
        self.recovery_param
    }

    pub fn r_hex(&self) -> String {
        self.r.to_str_radix(16)
    }

    pub fn s_hex(&self) -> String {
        self.s.to_str_radix(16)
    }
}

impl Serialize for CurveSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire {
            r: String,
            s: String,
            recovery_param: u8,
        }

        Wire { r: self.r_hex(), s: self.s_hex(), recovery_param: self.recovery_param }.serialize(serializer)
    }
}

impl fmt::Display for CurveSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r={} s={}", self.r_hex(), self.s_hex())
    }
}

fn parse_param(name: &str, value: &str) -> Result<BigUint> {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);

    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::UnsupportedCurveParameters(format!("{} is not a hex number", name)))
}

fn byte_length(value: &BigUint) -> u64 {
    (value.bits() + 7) / 8
}

/// Big-endian bytes left-padded to `len`
fn to_fixed_be(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes);
    out
}

impl Curve {
    /// Validate caller-supplied parameters
    pub fn from_params(params: &CurveParams) -> Result<Self> {
        let p = parse_param("p", &params.p)?;
        let a = parse_param("a", &params.a)?;
        let b = parse_param("b", &params.b)?;
        let n = parse_param("n", &params.n)?;
        let g = Point {
            x: parse_param("g.x", &params.g.0)?,
            y: parse_param("g.y", &params.g.1)?,
        };

        if p <= BigUint::from(3u32) {
            return Err(Error::UnsupportedCurveParameters("field prime is too small".to_string()));
        }
        if n <= BigUint::one() {
            return Err(Error::UnsupportedCurveParameters("group order is too small".to_string()));
        }
        if a >= p || b >= p || g.x >= p || g.y >= p {
            return Err(Error::UnsupportedCurveParameters("coefficients must be reduced modulo p".to_string()));
        }

        let curve = Self { p, a, b, n, g, hash: params.hash };

        // 4a^3 + 27b^2 != 0 (mod p)
        let discriminant = (BigUint::from(4u32) * curve.a.modpow(&BigUint::from(3u32), &curve.p)
            + BigUint::from(27u32) * (&curve.b * &curve.b))
            % &curve.p;
        if discriminant.is_zero() {
            return Err(Error::UnsupportedCurveParameters("curve is singular".to_string()));
        }
        if !curve.is_on_curve(&curve.g) {
            return Err(Error::UnsupportedCurveParameters("generator is not on the curve".to_string()));
        }

        Ok(curve)
    }

    /// The default STARK curve
    pub fn stark() -> Result<Self> {
        Self::from_params(&CurveParams::stark())
    }

    pub fn order(&self) -> &BigUint {
        &self.n
    }

    fn is_on_curve(&self, point: &Point) -> bool {
        let lhs = (&point.y * &point.y) % &self.p;
        let rhs = (point.x.modpow(&BigUint::from(3u32), &self.p) + &self.a * &point.x + &self.b) % &self.p;
        lhs == rhs
    }

    fn sub_mod(&self, lhs: &BigUint, rhs: &BigUint) -> BigUint {
        ((lhs % &self.p) + &self.p - (rhs % &self.p)) % &self.p
    }

    // Field and group moduli are prime, so Fermat inversion applies
    fn inverse(value: &BigUint, modulus: &BigUint) -> BigUint {
        value.modpow(&(modulus - BigUint::from(2u32)), modulus)
    }

    fn add(&self, lhs: Option<&Point>, rhs: Option<&Point>) -> Option<Point> {
        let (l, r) = match (lhs, rhs) {
            (None, None) => return None,
            (None, Some(r)) => return Some(r.clone()),
            (Some(l), None) => return Some(l.clone()),
            (Some(l), Some(r)) => (l, r),
        };

        let lambda = if l.x == r.x {
            if ((&l.y + &r.y) % &self.p).is_zero() {
                return None;
            }
            let numerator = (BigUint::from(3u32) * &l.x * &l.x + &self.a) % &self.p;
            let denominator = (BigUint::from(2u32) * &l.y) % &self.p;
            numerator * Self::inverse(&denominator, &self.p) % &self.p
        } else {
            let numerator = self.sub_mod(&r.y, &l.y);
            let denominator = self.sub_mod(&r.x, &l.x);
            numerator * Self::inverse(&denominator, &self.p) % &self.p
        };

        let x = self.sub_mod(&self.sub_mod(&(&lambda * &lambda), &l.x), &r.x);
        let y = self.sub_mod(&(lambda * self.sub_mod(&l.x, &x)), &l.y);
        Some(Point { x, y })
    }

    fn multiply(&self, scalar: &BigUint, point: &Point) -> Option<Point> {
        let mut acc: Option<Point> = None;
        for i in (0..scalar.bits()).rev() {
            acc = self.add(acc.as_ref(), acc.as_ref());
            if scalar.bit(i) {
                acc = self.add(acc.as_ref(), Some(point));
            }
        }
        acc
    }

    fn truncate_to_n(&self, message: BigUint, truncate_only: bool) -> BigUint {
        let excess = (byte_length(&message) * 8).saturating_sub(self.n.bits());
        let message = if excess > 0 { message >> excess } else { message };
        if !truncate_only && message >= self.n {
            message - &self.n
        } else {
            message
        }
    }

    fn private_scalar(&self, private_key: &[u8]) -> Result<BigUint> {
        let scalar = BigUint::from_bytes_be(private_key) % &self.n;
        if scalar.is_zero() {
            return Err(Error::SigningFailed("private key reduces to zero on this curve".to_string()));
        }
        Ok(scalar)
    }

    /// Public point `(x, y)` for a private key
    pub fn public_key(&self, private_key: &[u8]) -> Result<(BigUint, BigUint)> {
        let scalar = self.private_scalar(private_key)?;
        self.multiply(&scalar, &self.g)
            .map(|point| (point.x, point.y))
            .ok_or_else(|| Error::SigningFailed("public key is the point at infinity".to_string()))
    }

    /// Sign a hex-encoded message with a raw private key
    pub fn sign(&self, private_key: &[u8], message_hex: &str) -> Result<CurveSignature> {
        let digits = message_hex.strip_prefix("0x").unwrap_or(message_hex);
        let message = BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| Error::SigningFailed(format!("message is not hex: {}", message_hex)))?;

        let secret = self.private_scalar(private_key)?;
        let message = self.truncate_to_n(message, false);

        let width = byte_length(&self.n) as usize;
        let mut drbg = HmacDrbg::new(self.hash, &to_fixed_be(&secret, width), &to_fixed_be(&message, width))?;
        let upper = &self.n - BigUint::one();

        for _ in 0..MAX_NONCE_ATTEMPTS {
            let k = self.truncate_to_n(BigUint::from_bytes_be(&drbg.generate(width)?), true);
            if k <= BigUint::one() || k >= upper {
                continue;
            }

            let Some(kp) = self.multiply(&k, &self.g) else { continue };
            let r = &kp.x % &self.n;
            if r.is_zero() {
                continue;
            }

            let s = Self::inverse(&k, &self.n) * ((&r * &secret + &message) % &self.n) % &self.n;
            if s.is_zero() {
                continue;
            }

            let recovery_param = u8::from(kp.y.bit(0)) | if kp.x != r { 2 } else { 0 };
            return Ok(CurveSignature { r, s, recovery_param });
        }

        Err(Error::SigningFailed("no valid nonce found".to_string()))
    }

    /// Verify a signature against a public point
    pub fn verify(&self, public_key: &(BigUint, BigUint), message_hex: &str, signature: &CurveSignature) -> Result<bool> {
        let digits = message_hex.strip_prefix("0x").unwrap_or(message_hex);
        let message = BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| Error::SigningFailed(format!("message is not hex: {}", message_hex)))?;
        let message = self.truncate_to_n(message, false);

        let (r, s) = (&signature.r, &signature.s);
        if r.is_zero() || s.is_zero() || *r >= self.n || *s >= self.n {
            return Ok(false);
        }

        let q = Point { x: public_key.0.clone(), y: public_key.1.clone() };
        if !self.is_on_curve(&q) {
            return Ok(false);
        }

        let w = Self::inverse(s, &self.n);
        let u1 = &message * &w % &self.n;
        let u2 = r * &w % &self.n;
        let point = self.add(self.multiply(&u1, &self.g).as_ref(), self.multiply(&u2, &q).as_ref());

        Ok(point.map(|p| p.x % &self.n == *r).unwrap_or(false))
    }
}

/// HMAC-DRBG nonce generator
struct HmacDrbg {
    k: Vec<u8>,
    v: Vec<u8>,
}

impl HmacDrbg {
    fn new(hash: CurveHash, entropy: &[u8], nonce: &[u8]) -> Result<Self> {
        let output_len = match hash {
            CurveHash::Sha256 => 32,
        };
        let mut drbg = Self { k: vec![0u8; output_len], v: vec![1u8; output_len] };

        let mut seed = entropy.to_vec();
        seed.extend_from_slice(nonce);
        drbg.update(&seed)?;
        Ok(drbg)
    }

    fn mac(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key)
            .map_err(|_| Error::SigningFailed("HMAC error".to_string()))?;
        for part in parts {
            mac.update(part);
        }
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn update(&mut self, seed: &[u8]) -> Result<()> {
        self.k = Self::mac(&self.k, &[&self.v, &[0x00], seed])?;
        self.v = Self::mac(&self.k, &[&self.v])?;
        if seed.is_empty() {
            return Ok(());
        }
        self.k = Self::mac(&self.k, &[&self.v, &[0x01], seed])?;
        self.v = Self::mac(&self.k, &[&self.v])?;
        Ok(())
    }

    fn generate(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len + 32);
        while out.len() < len {
            self.v = Self::mac(&self.k, &[&self.v])?;
            out.extend_from_slice(&self.v);
        }
        out.truncate(len);
        self.update(&[])?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARK_KEY: &str = "03c1e9550e66958296d11b60f8e8e7a7ad990d07fa65d5f7652c4a6c87d4e3cc";
    const STARK_MESSAGE: &str = "1e542e2da71b3f5d7b4e9d329b4d30ac0b5d6f266ebef7364bf61c39aac35d00";

    #[test]
    fn test_stark_known_vector() {
        let curve = Curve::stark().unwrap();
        let key = hex::decode(STARK_KEY).unwrap();

        let signature = curve.sign(&key, STARK_MESSAGE).unwrap();
        assert_eq!(signature.r_hex(), "1408ea79096199916cbf2c7a5162aa8973704dbd325cdb4e7d9dcef4dc686f7");
        assert_eq!(signature.s_hex(), "5635c32072ffbb750006652e6185bd1d2fcbd71306ec500d103530d687139d3");
        assert_eq!(signature.recovery_param(), 0);
    }

    #[test]
    fn test_sign_then_verify() {
        let curve = Curve::stark().unwrap();
        let key = hex::decode(STARK_KEY).unwrap();
        let public_key = curve.public_key(&key).unwrap();

        let signature = curve.sign(&key, "0xabcdef").unwrap();
        assert!(curve.verify(&public_key, "abcdef", &signature).unwrap());
        assert!(!curve.verify(&public_key, "abcdee", &signature).unwrap());
    }

    #[test]
    fn test_generator_off_curve_rejected() {
        let mut params = CurveParams::stark();
        params.g.1 = "01".to_string();
        assert!(matches!(Curve::from_params(&params), Err(Error::UnsupportedCurveParameters(_))));
    }

    #[test]
    fn test_malformed_params_rejected() {
        let mut params = CurveParams::stark();
        params.p = "not hex".to_string();
        assert!(matches!(Curve::from_params(&params), Err(Error::UnsupportedCurveParameters(_))));

        let mut params = CurveParams::stark();
        params.n = "1".to_string();
        assert!(matches!(Curve::from_params(&params), Err(Error::UnsupportedCurveParameters(_))));

        let mut params = CurveParams::stark();
        params.a = params.p.clone();
        assert!(matches!(Curve::from_params(&params), Err(Error::UnsupportedCurveParameters(_))));
    }

    #[test]
    fn test_non_hex_message_fails() {
        let curve = Curve::stark().unwrap();
        let key = hex::decode(STARK_KEY).unwrap();
        assert!(matches!(curve.sign(&key, "xyz"), Err(Error::SigningFailed(_))));
    }

    #[test]
    fn test_params_json_shape() {
        let json = serde_json::to_value(CurveParams::stark()).unwrap();
        assert_eq!(json["hash"], "sha256");
        let back: CurveParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, CurveParams::stark());
    }
}
