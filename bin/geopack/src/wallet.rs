use alloy_core::primitives::Address;
use anyhow::Result;
use geopack_deploy::{LocalWallet, RpcWallet, Wallet};

/// The signer selected on the command line.
///
/// Transactions are always sent from the wallet's address through the
/// configured RPC, which must manage that account.
#[derive(Debug, Clone)]
pub enum CliWallet {
    Local(LocalWallet),
    Rpc(RpcWallet),
}

impl CliWallet {
    pub fn from_args(
        private_key: Option<&str>,
        from: Option<Address>,
        rpc_url: &str,
    ) -> Result<Self> {
        match (private_key, from) {
            (Some(key), from) => {
                let wallet = LocalWallet::from_private_key(key)?;
                if let Some(from) = from.filter(|from| *from != wallet.address()) {
                    anyhow::bail!(
                        "--from {} does not match the private key's address {}",
                        from,
                        wallet.address()
                    );
                }
                Ok(CliWallet::Local(wallet))
            }
            (None, Some(from)) => Ok(CliWallet::Rpc(RpcWallet::new(rpc_url, from)?)),
            (None, None) => {
                anyhow::bail!("A wallet is required: pass --private-key or --from")
            }
        }
    }
}

impl Wallet for CliWallet {
    fn address(&self) -> Address {
        match self {
            CliWallet::Local(wallet) => wallet.address(),
            CliWallet::Rpc(wallet) => wallet.address(),
        }
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        match self {
            CliWallet::Local(wallet) => wallet.sign_message(message).await,
            CliWallet::Rpc(wallet) => wallet.sign_message(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_selection() {
        let local = CliWallet::from_args(Some(ANVIL_KEY), None, "http://localhost:8545").unwrap();
        assert!(matches!(local, CliWallet::Local(_)));

        let from = Address::repeat_byte(0x42);
        let rpc = CliWallet::from_args(None, Some(from), "http://localhost:8545").unwrap();
        assert_eq!(rpc.address(), from);

        assert!(CliWallet::from_args(None, None, "http://localhost:8545").is_err());
        assert!(CliWallet::from_args(Some(ANVIL_KEY), Some(from), "http://localhost:8545").is_err());
    }
}
