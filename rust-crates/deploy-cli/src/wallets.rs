use alloy::signers::local::PrivateKeySigner;
use anyhow::{
    Context,
    Result,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::path::{
    Path,
    PathBuf,
};

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => Ok(PathBuf::from(shellexpand::tilde(raw).into_owned())),
        None => default_wallet_dir(),
    }
}

/// `cast wallet import` stores keystores without an extension; geth adds `.json`.
pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    [dir.join(name), dir.join(format!("{name}.json"))]
        .into_iter()
        .find(|path| path.is_file())
        .map(|path| WalletDescriptor {
            name: name.to_string(),
            path,
        })
        .ok_or_else(|| anyhow::anyhow!("Wallet '{name}' not found in {}", dir.display()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).context("Failed to read wallet password")?;
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| anyhow::anyhow!("Invalid password for wallet '{}'", descriptor.name))?;
    PrivateKeySigner::from_slice(&secret).map_err(|_| {
        anyhow::anyhow!(
            "Wallet '{}' contained unsupported key material",
            descriptor.name
        )
    })
}
