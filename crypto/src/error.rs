use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("child derivation overflow at index {0}")]
    DerivationOverflow(u32),

    #[error("cipher error: {0}")]
    Cipher(String),
}
