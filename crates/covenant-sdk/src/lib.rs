//! Covenant SDK - Deployment and wiring
//!
//! A deployment is one token ledger plus one agreement registry, both
//! owned by the deployer. Wiring performs the two privileged calls that
//! let the registry settle resolutions:
//!
//! 1. Registry `set_token_provider(ledger)`
//! 2. Ledger `set_authorized_minter(registry)`
//!
//! # Quick Start
//!
//! ```ignore
//! use covenant_sdk::Deployment;
//! use covenant_types::{AccountId, TokenAmount};
//!
//! let owner = AccountId::new();
//! let deployment = Deployment::deploy(owner).await?;
//!
//! let (alice, bob) = (AccountId::new(), AccountId::new());
//! let id = deployment
//!     .registry()
//!     .create_agreement(&owner, alice, bob, TokenAmount::new(13031))
//!     .await?;
//! deployment.registry().resolve_agreement(&owner, id, false, true).await?;
//!
//! assert_eq!(deployment.ledger().balance_of(&alice).await, TokenAmount::new(13031));
//! ```

use std::sync::Arc;

pub use covenant_agreements::{AgreementRegistry, RegistrySnapshot};
pub use covenant_ledger::{LedgerSnapshot, TokenLedger};
pub use covenant_types::*;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Combined view of both components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub deployer: AccountId,
    pub wired: bool,
    pub ledger: LedgerSnapshot,
    pub registry: RegistrySnapshot,
}

/// A ledger and a registry deployed by the same account
#[derive(Clone)]
pub struct Deployment {
    deployer: AccountId,
    ledger: TokenLedger,
    registry: AgreementRegistry,
}

impl Deployment {
    /// Instantiate both components without wiring them together
    pub fn deploy_unwired(deployer: AccountId) -> Self {
        let ledger = TokenLedger::new(deployer);
        info!("Token ledger deployed at {}", ledger.address());
        let registry = AgreementRegistry::new(deployer);
        info!("Agreement registry deployed at {}", registry.address());

        Self {
            deployer,
            ledger,
            registry,
        }
    }

    /// Instantiate and wire both components
    pub async fn deploy(deployer: AccountId) -> Result<Self> {
        let deployment = Self::deploy_unwired(deployer);
        deployment.wire().await?;
        Ok(deployment)
    }

    /// Point the registry at the ledger and authorize it to mint
    pub async fn wire(&self) -> Result<()> {
        self.registry
            .set_token_provider(&self.deployer, Arc::new(self.ledger.clone()))
            .await?;
        self.ledger
            .set_authorized_minter(&self.deployer, self.registry.address())
            .await?;
        info!(
            "Registry {} wired to ledger {}",
            self.registry.address(),
            self.ledger.address()
        );
        Ok(())
    }

    /// Both wiring steps are in place
    pub async fn is_wired(&self) -> bool {
        self.registry.token_provider_configured().await
            && self.ledger.authorized_minter().await == Some(self.registry.address())
    }

    pub fn deployer(&self) -> AccountId {
        self.deployer
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &AgreementRegistry {
        &self.registry
    }

    /// Events from both components ordered by emission time, then sequence
    pub async fn event_log(&self) -> Vec<EventRecord> {
        let mut records = self.ledger.events().await;
        records.extend(self.registry.events().await);
        records.sort_by_key(|r| (r.emitted_at, r.sequence));
        records
    }

    pub async fn report(&self) -> DeploymentReport {
        DeploymentReport {
            deployer: self.deployer,
            wired: self.is_wired().await,
            ledger: self.ledger.snapshot().await,
            registry: self.registry.snapshot().await,
        }
    }
}
