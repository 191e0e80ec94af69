//! Funding identity: the key that pays fees, receives released tokens and
//! signs every input of a vault transaction.

use crate::error::{VaultError, VaultResult};
use crate::transaction::sighash::SIGHASH_ALL_FORKID;
use bitcoin::{
    secp256k1::{All, Message, Secp256k1},
    PrivateKey, PublicKey, ScriptBuf,
};
use serde::Deserialize;
use std::{fmt, fs, path::Path};

/// Signing capability plus receive locking bytecode
pub trait Identity {
    /// P2PKH locking bytecode funds and released tokens are held at
    fn locking_bytecode(&self) -> ScriptBuf;

    fn public_key(&self) -> PublicKey;

    /// Sign a signature hash; returns the signature with the hash type byte appended
    fn sign(&self, digest: [u8; 32]) -> VaultResult<Vec<u8>>;
}

#[derive(Deserialize)]
struct WalletFile {
    #[serde(rename = "privateKey", alias = "PrivateKey")]
    private_key: String,
}

/// WIF-backed identity
pub struct WalletKey {
    private_key: PrivateKey,
    public_key: PublicKey,
    secp: Secp256k1<All>,
}

impl WalletKey {
    pub fn new(private_key: PrivateKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = private_key.public_key(&secp);
        Self {
            private_key,
            public_key,
            secp,
        }
    }

    pub fn from_wif(wif: &str) -> VaultResult<Self> {
        let private_key = PrivateKey::from_wif(wif.trim())
            .map_err(|e| VaultError::crypto(format!("invalid WIF private key: {}", e)))?;
        if !private_key.compressed {
            return Err(VaultError::crypto("only compressed private keys are supported"));
        }
        Ok(Self::new(private_key))
    }

    /// Load `{"privateKey": "<WIF>"}` from a wallet file
    pub fn load_from_file(path: &Path) -> VaultResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            VaultError::config(format!("cannot read wallet file {}: {}", path.display(), e))
        })?;
        let wallet: WalletFile = serde_json::from_str(&json)?;
        Self::from_wif(&wallet.private_key)
    }
}

impl Identity for WalletKey {
    fn locking_bytecode(&self) -> ScriptBuf {
        ScriptBuf::new_p2pkh(&self.public_key.pubkey_hash())
    }

    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn sign(&self, digest: [u8; 32]) -> VaultResult<Vec<u8>> {
        let message = Message::from_digest(digest);
        let signature = self.secp.sign_ecdsa(&message, &self.private_key.inner);
        let mut bytes = signature.serialize_der().to_vec();
        bytes.push(SIGHASH_ALL_FORKID as u8);
        Ok(bytes)
    }
}

impl fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKey")
            .field("public_key", &self.public_key.to_string())
            .finish_non_exhaustive()
    }
}
