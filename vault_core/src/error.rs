use thiserror::Error;

use vault_crypto::CryptoError;
use vault_script::ScriptError;
use vault_store::StoreError;
use vault_types::TxHash;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("keychain not found: {0}")]
    KeychainNotFound(String),

    #[error("keychain already exists: {0}")]
    KeychainAlreadyExists(String),

    #[error("keychain is not private: {0}")]
    KeychainIsNotPrivate(String),

    #[error("chain code unlock failed for keychain {0}")]
    KeychainChainCodeUnlockFailed(String),

    #[error("private key unlock failed for keychain {0}")]
    KeychainPrivateKeyUnlockFailed(String),

    #[error("invalid private key for keychain {0}")]
    KeychainInvalidPrivateKey(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("account bin not found: {account}/{bin}")]
    AccountBinNotFound { account: String, bin: String },

    #[error("account bin already exists: {account}/{bin}")]
    AccountBinAlreadyExists { account: String, bin: String },

    #[error("invalid account bin name: {0:?}")]
    AccountBinInvalidName(String),

    #[error("account bin out of scripts: {account}/{bin}")]
    AccountBinOutOfScripts { account: String, bin: String },

    #[error("cannot issue a script from the change bin of account {0}")]
    AccountCannotIssueChangeScript(String),

    #[error("chain codes locked for account {account}: {failing_keychains:?}")]
    AccountChainCodeLocked {
        account: String,
        failing_keychains: Vec<String>,
    },

    #[error("insufficient funds in account {0}")]
    AccountInsufficientFunds(String),

    #[error("transaction not found: {0}")]
    TxNotFound(TxHash),

    #[error("store inconsistency: {0}")]
    Inconsistency(String),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("portable file format error: {0}")]
    FileFormat(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}
