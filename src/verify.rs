//! Hash and signature checks over byte sources.
//!
//! A [`Check`] compares something computed from one source against bytes
//! stored in another. A mismatch is an ordinary `Ok(false)` verdict; only a
//! failing read is an error. Verdicts are computed on first use and cached.
//!
//! * [`Check::sha256`] - SHA-256 of the data source against a stored
//!   32-byte digest.
//! * [`Check::rsa`] - RSA-2048 PKCS#1 v1.5 SHA-256 signature of the data
//!   source, with the public modulus read from a third source (exponent
//!   65537). An empty or malformed modulus always yields `false`.

use std::cell::OnceCell;

use log::{debug, warn};
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::Result;
use crate::source::SourceRef;

const CHUNK: u64 = 0x10000;
const PUBLIC_EXPONENT: u32 = 65537;

#[derive(Debug)]
enum Method {
    Sha256 {
        data: SourceRef,
        expected: SourceRef,
    },
    Rsa {
        data: SourceRef,
        signature: SourceRef,
        modulus: SourceRef,
    },
}

/// A lazily evaluated verification verdict.
#[derive(Debug)]
pub struct Check {
    method: Method,
    verdict: OnceCell<bool>,
}

impl Check {
    pub fn sha256(data: SourceRef, expected: SourceRef) -> Self {
        Self::with(Method::Sha256 { data, expected })
    }

    pub fn rsa(data: SourceRef, signature: SourceRef, modulus: SourceRef) -> Self {
        Self::with(Method::Rsa {
            data,
            signature,
            modulus,
        })
    }

    fn with(method: Method) -> Self {
        Self {
            method,
            verdict: OnceCell::new(),
        }
    }

    /// Whether the stored digest or signature matches the data.
    pub fn verify(&self) -> Result<bool> {
        if let Some(v) = self.verdict.get() {
            return Ok(*v);
        }
        let v = match &self.method {
            Method::Sha256 { data, expected } => {
                let ok = digest(data)?.as_slice() == expected.read_all()?.as_slice();
                if !ok {
                    warn!("sha-256 mismatch over {:#x} bytes", data.len());
                }
                ok
            }
            Method::Rsa {
                data,
                signature,
                modulus,
            } => verify_rsa(data, signature, modulus)?,
        };
        Ok(*self.verdict.get_or_init(|| v))
    }
}

/// SHA-256 of a whole source, read in chunks.
pub fn digest(data: &SourceRef) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK.min(data.len()) as usize];
    let mut offset = 0;
    while offset < data.len() {
        let n = CHUNK.min(data.len() - offset) as usize;
        data.read_into(offset, &mut buf[..n])?;
        hasher.update(&buf[..n]);
        offset += n as u64;
    }
    Ok(hasher.finalize().into())
}

fn verify_rsa(data: &SourceRef, signature: &SourceRef, modulus: &SourceRef) -> Result<bool> {
    let modulus = modulus.read_all()?;
    if modulus.is_empty() {
        debug!("no public key; signature treated as invalid");
        return Ok(false);
    }
    let key = match RsaPublicKey::new(
        BigUint::from_bytes_be(&modulus),
        BigUint::from(PUBLIC_EXPONENT),
    ) {
        Ok(key) => key,
        Err(e) => {
            warn!("unusable public key: {e}");
            return Ok(false);
        }
    };

    let hashed = digest(data)?;
    let signature = signature.read_all()?;
    match key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &signature) {
        Ok(()) => Ok(true),
        Err(e) => {
            warn!("signature mismatch: {e}");
            Ok(false)
        }
    }
}
