use {
    crate::{config::PrivateKey, domain::SignedTransaction, traits::Signer},
    alloy::{
        eips::eip2718::Encodable2718,
        network::{Ethereum, EthereumWallet, TransactionBuilder},
        primitives::Address,
        rpc::types::TransactionRequest,
        signers::local::PrivateKeySigner,
    },
    std::fmt::{self, Debug, Formatter},
};

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    // The parsing error is dropped on purpose: it may quote the key.
    #[error("the configured private key is not a valid secp256k1 key")]
    InvalidCredential,
    #[error("failed to sign transaction")]
    Failed(#[source] anyhow::Error),
}

/// Signs transactions with a local private key.
#[derive(Clone)]
pub struct Wallet {
    address: Address,
    wallet: EthereumWallet,
}

impl Wallet {
    pub fn from_private_key(key: &PrivateKey) -> Result<Self, SigningError> {
        let signer: PrivateKeySigner = key
            .expose()
            .trim()
            .parse()
            .map_err(|_| SigningError::InvalidCredential)?;
        Ok(Self {
            address: signer.address(),
            wallet: EthereumWallet::new(signer),
        })
    }
}

impl Debug for Wallet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Signer for Wallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, tx: TransactionRequest) -> Result<SignedTransaction, SigningError> {
        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &self.wallet)
            .await
            .map_err(|err| SigningError::Failed(err.into()))?;
        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::{
            consensus::TxEnvelope,
            eips::eip2718::Decodable2718,
            primitives::{Bytes, address},
        },
    };

    // First account of the well known `test test ... junk` development
    // mnemonic.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn derives_address() {
        let wallet = Wallet::from_private_key(&PrivateKey::new(DEV_KEY)).unwrap();
        assert_eq!(
            wallet.address(),
            address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
        assert!(!format!("{wallet:?}").contains("ac0974"));
    }

    #[test]
    fn rejects_malformed_key() {
        for key in ["", "0x", "not hex", "0x1234"] {
            assert!(matches!(
                Wallet::from_private_key(&PrivateKey::new(key)),
                Err(SigningError::InvalidCredential)
            ));
        }
    }

    #[tokio::test]
    async fn signs_deployment() {
        let wallet = Wallet::from_private_key(&PrivateKey::new(DEV_KEY)).unwrap();
        let tx = TransactionRequest::default()
            .with_from(wallet.address())
            .with_deploy_code(Bytes::from_static(&[0x60, 0x00]))
            .with_chain_id(80002)
            .with_nonce(7)
            .with_gas_limit(100_000)
            .with_max_fee_per_gas(30_000_000_000)
            .with_max_priority_fee_per_gas(1_000_000_000);

        let signed = wallet.sign(tx).await.unwrap();

        let decoded = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();
        assert_eq!(*decoded.tx_hash(), signed.hash);
        assert!(decoded.is_eip1559());
    }

    #[tokio::test]
    async fn incomplete_transaction_fails_to_sign() {
        let wallet = Wallet::from_private_key(&PrivateKey::new(DEV_KEY)).unwrap();
        let tx = TransactionRequest::default()
            .with_from(wallet.address())
            .with_deploy_code(Bytes::from_static(&[0x60, 0x00]));

        assert!(matches!(wallet.sign(tx).await, Err(SigningError::Failed(_))));
    }
}
