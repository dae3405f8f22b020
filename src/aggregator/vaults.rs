//! Withdraw cost of yield vaults.
//!
//! A vault row prices the vault's withdraw gas at the gas price of its chain's regular estimate.
//! Rows are derived from the cached chain estimate on every request, so they never trigger upstream
//! calls of their own and are exactly as fresh or stale as that estimate.

use super::FeeAggregator;
use crate::{
    cache::unix_now,
    chains::Chain,
    config::VaultConfig,
    types::{ChainInfo, GasPrice, NativeFee, VaultInfo, VaultReference, VaultRow, join_notes},
};
use futures_util::future::join_all;
use tracing::instrument;

impl FeeAggregator {
    /// Withdraw cost of every configured vault, in configuration order.
    #[instrument(skip(self))]
    pub async fn get_vault_fees(&self) -> Vec<VaultRow> {
        join_all(self.inner.vaults.iter().map(|vault| self.vault_row(vault))).await
    }

    async fn vault_row(&self, vault: &VaultConfig) -> VaultRow {
        let Some(chain) = self.inner.registry.get(&vault.chain_key) else {
            return unknown_chain_row(vault);
        };

        match self.priced_vault_row(vault, chain).await {
            Ok(row) => row,
            Err(err) => failed_row(vault, chain, err),
        }
    }

    /// Prices the vault's withdraw at the chain's current (non-precise) gas price.
    async fn priced_vault_row(&self, vault: &VaultConfig, chain: &Chain) -> Result<VaultRow, String> {
        let lookup = self.estimate(chain, false).await?;
        let estimate = lookup.value;

        let native_fee = estimate
            .gas_price
            .checked_mul(u128::from(vault.withdraw_gas_limit))
            .ok_or_else(|| "withdraw fee overflows u128".to_string())?;

        Ok(VaultRow {
            vault: vault_info(vault),
            chain: chain.info(),
            gas_limit: vault.withdraw_gas_limit,
            gas_price: Some(GasPrice::from_wei(estimate.gas_price)),
            native_fee: Some(NativeFee::from_wei(native_fee)),
            mode: Some(estimate.mode),
            notes: join_notes([
                vault.notes.as_deref(),
                estimate.notes.as_deref(),
                lookup.note.as_deref(),
            ]),
            error: None,
            stale: lookup.stale,
            fetched_at: lookup.fetched_at,
            reference: reference(vault),
            price_symbol: Some(chain.price_symbol()),
        })
    }
}

/// Row of a vault whose chain could not be priced.
fn failed_row(vault: &VaultConfig, chain: &Chain, error: String) -> VaultRow {
    VaultRow {
        vault: vault_info(vault),
        chain: chain.info(),
        gas_limit: vault.withdraw_gas_limit,
        gas_price: None,
        native_fee: None,
        mode: None,
        notes: vault.notes.clone(),
        error: Some(error),
        stale: false,
        fetched_at: unix_now(),
        reference: reference(vault),
        price_symbol: Some(chain.price_symbol()),
    }
}

/// Row of a vault on a chain that is not tracked.
fn unknown_chain_row(vault: &VaultConfig) -> VaultRow {
    VaultRow {
        vault: vault_info(vault),
        chain: ChainInfo {
            key: vault.chain_key.clone(),
            display_name: vault.chain_key.clone(),
            symbol: String::new(),
            chain_id: 0,
        },
        gas_limit: vault.withdraw_gas_limit,
        gas_price: None,
        native_fee: None,
        mode: None,
        notes: vault.notes.clone(),
        error: Some(format!("chain '{}' is not configured", vault.chain_key)),
        stale: false,
        fetched_at: unix_now(),
        reference: reference(vault),
        price_symbol: None,
    }
}

fn vault_info(vault: &VaultConfig) -> VaultInfo {
    VaultInfo {
        key: vault.key.clone(),
        display_name: vault.display_name.clone(),
        platform: vault.platform.clone(),
        token_pair: vault.token_pair.clone(),
        strategy: vault.strategy.clone(),
    }
}

fn reference(vault: &VaultConfig) -> VaultReference {
    VaultReference {
        gas_used: vault.withdraw_gas_limit,
        tx_hash: vault.reference_tx.clone(),
        observed_at: vault.reference_observed_at.clone(),
    }
}
