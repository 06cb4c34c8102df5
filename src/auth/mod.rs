pub mod password;
pub mod signer;

pub use password::{BcryptHasher, CredentialHasher};
pub use signer::{Claims, SignatureError, TokenSigner};
