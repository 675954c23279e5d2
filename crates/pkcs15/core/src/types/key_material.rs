//! Private and public key material read off the card

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// RSA private key components, big-endian
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RsaPrivate {
    /// Modulus `n`
    pub modulus: Vec<u8>,
    /// Public exponent `e`
    pub public_exponent: Vec<u8>,
    /// Private exponent `d`
    pub private_exponent: Vec<u8>,
    /// First prime `p`
    pub p: Vec<u8>,
    /// Second prime `q`
    pub q: Vec<u8>,
}

impl fmt::Debug for RsaPrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivate")
            .field("modulus_bits", &(self.modulus.len() * 8))
            .finish_non_exhaustive()
    }
}

/// DSA private key: private scalar `x` plus the public parameters
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DsaPrivate {
    /// Private scalar `x`
    pub private_scalar: Vec<u8>,
    /// Public scalar `y`
    pub public_scalar: Vec<u8>,
    /// Prime modulus `p`
    pub p: Vec<u8>,
    /// Subgroup order `q`
    pub q: Vec<u8>,
    /// Generator `g`
    pub g: Vec<u8>,
}

impl fmt::Debug for DsaPrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsaPrivate")
            .field("p_bits", &(self.p.len() * 8))
            .finish_non_exhaustive()
    }
}

/// DSA public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsaPublic {
    /// Public scalar `y`
    pub public_scalar: Vec<u8>,
    /// Prime modulus `p`
    pub p: Vec<u8>,
    /// Subgroup order `q`
    pub q: Vec<u8>,
    /// Generator `g`
    pub g: Vec<u8>,
}

/// Decoded content of a private key file, as read from the card
///
/// A DSA key file carries only the private scalar; the domain parameters and public scalar come
/// from the public key object with the same id.
#[derive(Debug, Clone)]
pub enum ExtractedKey {
    /// Complete RSA key
    Rsa(RsaPrivate),
    /// DSA private scalar `x`
    Dsa(Zeroizing<Vec<u8>>),
}

/// Public key material read from a public key object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    /// RSA public key
    Rsa {
        /// Modulus `n`
        modulus: Vec<u8>,
        /// Public exponent `e`
        public_exponent: Vec<u8>,
    },
    /// DSA public key
    Dsa(DsaPublic),
}

/// Complete private key material usable for software operations
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// RSA private key
    RsaPrivate(RsaPrivate),
    /// DSA private key
    DsaPrivate(DsaPrivate),
}

impl DsaPrivate {
    /// Combine a private scalar with the public parameters of the matching public key
    pub fn from_parts(private_scalar: Vec<u8>, public: DsaPublic) -> Self {
        Self {
            private_scalar,
            public_scalar: public.public_scalar,
            p: public.p,
            q: public.q,
            g: public.g,
        }
    }
}
