use alloy::signers::local::PrivateKeySigner;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

/// Foundry's `cast wallet import` location.
pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

/// Every regular file in `dir` is treated as a keystore named by its file name.
/// Geth-style `.json` files are listed under their stem.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => path.file_stem(),
            _ => path.file_name(),
        }
        .and_then(|name| name.to_str())
        .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
        .to_owned();
        if name.starts_with('.') {
            continue;
        }
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    decrypt_wallet(descriptor, &password)
}

pub fn decrypt_wallet(
    descriptor: &WalletDescriptor,
    password: &str,
) -> Result<PrivateKeySigner> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;
    PrivateKeySigner::from_slice(&secret).map_err(|_| {
        eyre!(
            "Wallet '{}' contained unsupported key material",
            descriptor.name
        )
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("skylines-wallets-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn list_wallets__missing_dir__is_empty() {
        let dir = std::env::temp_dir().join("skylines-wallets-does-not-exist");
        assert!(list_wallets(&dir).unwrap().is_empty());
    }

    #[test]
    fn list_wallets__names_keystores_sorted() {
        // given
        let dir = scratch_dir("list");
        fs::write(dir.join("deployer"), "{}").unwrap();
        fs::write(dir.join("alice.json"), "{}").unwrap();
        fs::write(dir.join(".DS_Store"), "").unwrap();
        fs::create_dir_all(dir.join("nested")).unwrap();

        // when
        let names: Vec<_> = list_wallets(&dir)
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();

        // then
        assert_eq!(names, vec!["alice", "deployer"]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn find_wallet__unknown_name__errors() {
        let dir = scratch_dir("find");
        let err = find_wallet(&dir, "bob").unwrap_err();
        assert!(err.to_string().contains("Wallet 'bob' not found"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn resolve_wallet_dir__expands_explicit_path() {
        let dir = resolve_wallet_dir(Some("/tmp/keys")).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/keys"));
    }
}
