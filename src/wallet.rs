//! Wallet collaborator interface and a file-backed implementation.
//!
//! The protocol engine needs exactly four things from a wallet: spendable
//! coins with their keys, fresh change scripts, a Schnorr signing operation
//! over settlement inputs, and the network parameter table. [`WalletBackend`]
//! is that seam; [`FileWallet`] is a plain serde_json store behind it for
//! the CLI and tests. Key custody hardening lives outside this crate.

use crate::crypto::schnorr::Keypair;
use crate::params::{self, NetworkParameters};
use crate::tx::Transaction;
use crate::types::{sha256, Coin, Outpoint};
use anyhow::{bail, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub trait WalletBackend: Send {
    /// Candidate spendable outputs. Keys stay inside the wallet; only
    /// public keys travel with the coins.
    fn spendable_coins(&self) -> Vec<Coin>;

    /// A fresh change script, never handed out twice.
    fn fresh_change_script(&mut self) -> Vec<u8>;

    /// Schnorr-sign one settlement input. Returns `None` when the input's
    /// key is not ours.
    fn sign_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        pubkey: &[u8],
        script_pubkey: &[u8],
        amount: u64,
        sighash_flags: u32,
    ) -> Option<[u8; 64]>;

    fn params(&self) -> &NetworkParameters;
}

/// Standard pay-to-pubkey-hash script for a key.
pub fn p2pkh_script(pubkey: &[u8]) -> Vec<u8> {
    let hash = sha256(pubkey);
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[0x76, 0xa9, 0x14]);
    script.extend_from_slice(&hash[..20]);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletKey {
    pub seed: [u8; 32],
    pub pubkey: [u8; 32],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletCoin {
    pub txid: [u8; 32],
    pub index: u32,
    pub value: u64,
    pub seed: [u8; 32],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletData {
    pub network: String,
    #[serde(default)]
    pub keys: Vec<WalletKey>,
    #[serde(default)]
    pub coins: Vec<WalletCoin>,
}

pub struct FileWallet {
    path: PathBuf,
    network: NetworkParameters,
    pub data: WalletData,
}

impl FileWallet {
    pub fn create(path: &Path, network: &str) -> Result<Self> {
        if path.exists() {
            bail!("wallet file already exists: {}", path.display());
        }
        let Some(params) = params::by_name(network) else {
            bail!("unknown network: {}", network);
        };
        let wallet = Self {
            path: path.to_path_buf(),
            network: params,
            data: WalletData {
                network: network.to_string(),
                keys: Vec::new(),
                coins: Vec::new(),
            },
        };
        wallet.save()?;
        Ok(wallet)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("wallet file not found: {}", path.display());
        }
        let data: WalletData = serde_json::from_slice(&std::fs::read(path)?)?;
        let Some(network) = params::by_name(&data.network) else {
            bail!("wallet references unknown network: {}", data.network);
        };
        Ok(Self {
            path: path.to_path_buf(),
            network,
            data,
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&self.data)?)?;
        Ok(())
    }

    /// Generate a fresh receiving key. Returns the public key.
    pub fn generate_key(&mut self) -> Result<[u8; 32]> {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        let pubkey = Keypair::from_seed(&seed).public_bytes();
        self.data.keys.push(WalletKey { seed, pubkey });
        self.save()?;
        Ok(pubkey)
    }

    /// Import a spendable coin by outpoint, value, and key seed.
    pub fn import_coin(&mut self, txid: [u8; 32], index: u32, value: u64, seed: [u8; 32]) -> Result<()> {
        if self
            .data
            .coins
            .iter()
            .any(|c| c.txid == txid && c.index == index)
        {
            bail!("coin already in wallet");
        }
        self.data.coins.push(WalletCoin {
            txid,
            index,
            value,
            seed,
        });
        self.save()?;
        Ok(())
    }

    pub fn total_value(&self) -> u64 {
        self.data.coins.iter().map(|c| c.value).sum()
    }

    fn keypair_for(&self, pubkey: &[u8]) -> Option<Keypair> {
        for coin in &self.data.coins {
            let kp = Keypair::from_seed(&coin.seed);
            if kp.public_bytes() == pubkey {
                return Some(kp);
            }
        }
        for key in &self.data.keys {
            if key.pubkey == pubkey {
                return Some(Keypair::from_seed(&key.seed));
            }
        }
        None
    }
}

impl WalletBackend for FileWallet {
    fn spendable_coins(&self) -> Vec<Coin> {
        self.data
            .coins
            .iter()
            .map(|c| Coin {
                outpoint: Outpoint {
                    txid: c.txid,
                    index: c.index,
                },
                value: c.value,
                pubkey: Keypair::from_seed(&c.seed).public_bytes().to_vec(),
            })
            .collect()
    }

    fn fresh_change_script(&mut self) -> Vec<u8> {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        let pubkey = Keypair::from_seed(&seed).public_bytes();
        self.data.keys.push(WalletKey { seed, pubkey });
        if let Err(e) = self.save() {
            tracing::warn!("failed to persist change key: {}", e);
        }
        p2pkh_script(&pubkey)
    }

    fn sign_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        pubkey: &[u8],
        script_pubkey: &[u8],
        amount: u64,
        sighash_flags: u32,
    ) -> Option<[u8; 64]> {
        let keypair = self.keypair_for(pubkey)?;
        let digest = tx.sighash(input_index, script_pubkey, amount, sighash_flags);
        Some(keypair.sign(&digest))
    }

    fn params(&self) -> &NetworkParameters {
        &self.network
    }
}
