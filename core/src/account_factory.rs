//! Account Factory

use log::debug;

use shroud_account::Account;
use shroud_keypair::{KeyError, Keypair};

/// Generate a fresh account from OS entropy. Nothing is stored.
pub fn generate_account() -> Result<Account, KeyError> {
    let keypair = Keypair::generate()?;
    let account = keypair.to_account();
    debug!("Generated account {}", account.address);
    Ok(account)
}
