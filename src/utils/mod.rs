pub mod command;
pub mod crypto;
pub mod error;

pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use crypto::{generate_x25519_keypair, KeyPair};
pub use error::{InstallError, Result};
