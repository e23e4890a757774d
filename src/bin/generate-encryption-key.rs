//! Print a fresh key for `ENCRYPTION_KEY`

use ideas_api::agent::CredentialCipher;

fn main() -> anyhow::Result<()> {
    let key = CredentialCipher::generate_key()?;
    println!("ENCRYPTION_KEY={}", key);
    eprintln!("Store this key in your secrets manager; losing it makes stored agent credentials unreadable.");
    Ok(())
}
