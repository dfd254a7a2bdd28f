//! Covenant Agreements - Two-party agreement registry
//!
//! The registry allocates sequential agreement ids, enforces the status
//! machine, and settles resolved agreements through a token provider:
//! - Creating agreements (owner only)
//! - Resolving agreements (owner only, CROSSES INTO THE LEDGER)
//! - Canceling agreements (owner only, no tokens move)
//!
//! # Key Principle
//!
//! A status change is committed only after its settlement succeeds. The
//! ledger checks the registry's identity against its own authorized minter;
//! the registry holds no privilege of its own.

use std::sync::Arc;

use covenant_types::{
    ensure_owner, AccountId, Agreement, AgreementId, AgreementStatus, CovenantError,
    CovenantEvent, EventLog, EventRecord, Result, TokenAmount, TokenProvider,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Point-in-time view of the agreement table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub registry: AccountId,
    pub owner: AccountId,
    pub token_provider: Option<AccountId>,
    pub agreements: Vec<Agreement>,
}

struct RegistryState {
    owner: AccountId,
    token_provider: Option<Arc<dyn TokenProvider>>,
    /// Indexed by `id - 1`; records are never removed
    agreements: Vec<Agreement>,
    events: EventLog,
}

impl RegistryState {
    fn index_of(&self, id: AgreementId) -> Result<usize> {
        let id = id.value();
        if id == 0 || id > self.agreements.len() as u64 {
            return Err(CovenantError::InvalidAgreementId { id });
        }
        Ok((id - 1) as usize)
    }

    fn open_index(&self, id: AgreementId) -> Result<usize> {
        let index = self.index_of(id)?;
        let agreement = &self.agreements[index];
        if !agreement.is_open() {
            return Err(CovenantError::AgreementNotOpen {
                id: id.value(),
                status: agreement.status,
            });
        }
        Ok(index)
    }
}

/// The Covenant agreement registry
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct AgreementRegistry {
    address: AccountId,
    state: Arc<RwLock<RegistryState>>,
}

impl AgreementRegistry {
    /// Deploy a new registry owned by `owner`, with no agreements and no
    /// token provider
    pub fn new(owner: AccountId) -> Self {
        let address = AccountId::new();
        Self {
            address,
            state: Arc::new(RwLock::new(RegistryState {
                owner,
                token_provider: None,
                agreements: Vec::new(),
                events: EventLog::new(address),
            })),
        }
    }

    /// Account id the registry presents when it calls the ledger
    pub fn address(&self) -> AccountId {
        self.address
    }

    pub async fn owner(&self) -> AccountId {
        self.state.read().await.owner
    }

    /// Store the handle used to settle resolutions
    pub async fn set_token_provider(
        &self,
        caller: &AccountId,
        provider: Arc<dyn TokenProvider>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        guard_owner(caller, &state.owner, "set_token_provider")?;

        let provider_id = provider.provider_id();
        state.token_provider = Some(provider);
        state.events.emit(CovenantEvent::TokenProviderSet {
            provider: provider_id,
        });
        info!("Registry {} token provider set to {}", self.address, provider_id);
        Ok(())
    }

    pub async fn token_provider_configured(&self) -> bool {
        self.state.read().await.token_provider.is_some()
    }

    /// Register a new open agreement and return its id
    pub async fn create_agreement(
        &self,
        caller: &AccountId,
        participant1: AccountId,
        participant2: AccountId,
        punishment: TokenAmount,
    ) -> Result<AgreementId> {
        let mut state = self.state.write().await;
        guard_owner(caller, &state.owner, "create_agreement")?;

        if participant1 == participant2 {
            warn!("Rejected agreement with {} on both sides", participant1);
            return Err(CovenantError::InvalidParticipants {
                participant: participant1.to_string(),
            });
        }

        let id = AgreementId::new(state.agreements.len() as u64 + 1);
        state
            .agreements
            .push(Agreement::new(id, participant1, participant2, punishment));
        state.events.emit(CovenantEvent::AgreementCreated {
            id,
            participant1,
            participant2,
            punishment,
        });
        info!(
            "Agreement {} created between {} and {} (punishment {})",
            id, participant1, participant2, punishment
        );
        Ok(id)
    }

    /// Read an agreement by id
    pub async fn get_agreement(&self, id: AgreementId) -> Result<Agreement> {
        let state = self.state.read().await;
        let index = state.index_of(id)?;
        debug!("Read agreement {}", id);
        Ok(state.agreements[index].clone())
    }

    /// Number of ids allocated so far; also the highest valid id
    pub async fn agreement_count(&self) -> u64 {
        self.state.read().await.agreements.len() as u64
    }

    /// Record the outcome of an open agreement and settle it.
    ///
    /// Failing participants are credited the punishment through the token
    /// provider. If settlement fails the agreement stays `Open`. A resolution
    /// that needs to credit tokens before `set_token_provider` was called
    /// fails with `TokenProviderNotSet`.
    pub async fn resolve_agreement(
        &self,
        caller: &AccountId,
        id: AgreementId,
        first_fulfilled: bool,
        second_fulfilled: bool,
    ) -> Result<AgreementStatus> {
        let mut state = self.state.write().await;
        guard_owner(caller, &state.owner, "resolve_agreement")?;

        let index = state.open_index(id).inspect_err(|err| {
            warn!("Rejected resolution of {}: {}", id, err);
        })?;
        let status = AgreementStatus::from_fulfillment(first_fulfilled, second_fulfilled);
        let credits = state.agreements[index].settlement_credits(status);

        if !credits.is_empty() {
            let provider = match state.token_provider.clone() {
                Some(provider) => provider,
                None => {
                    warn!("Resolution of {} needs settlement but no provider is set", id);
                    return Err(CovenantError::TokenProviderNotSet);
                }
            };
            if let Err(err) = provider.mint_all(&self.address, &credits).await {
                warn!("Settlement of {} failed, agreement stays open: {}", id, err);
                return Err(err);
            }
        }

        let agreement = &mut state.agreements[index];
        agreement.status = status;
        let event = CovenantEvent::AgreementClosed {
            id,
            participant1: agreement.participant1,
            participant2: agreement.participant2,
            status,
        };
        state.events.emit(event);
        info!(
            "Agreement {} resolved as {} ({} credits)",
            id,
            status,
            credits.len()
        );
        Ok(status)
    }

    /// Cancel an open agreement without moving any tokens
    pub async fn cancel_agreement(&self, caller: &AccountId, id: AgreementId) -> Result<()> {
        let mut state = self.state.write().await;
        guard_owner(caller, &state.owner, "cancel_agreement")?;

        let index = state.open_index(id).inspect_err(|err| {
            warn!("Rejected cancellation of {}: {}", id, err);
        })?;

        let agreement = &mut state.agreements[index];
        agreement.status = AgreementStatus::Canceled;
        let event = CovenantEvent::AgreementCanceled {
            id,
            participant1: agreement.participant1,
            participant2: agreement.participant2,
        };
        state.events.emit(event);
        info!("Agreement {} canceled", id);
        Ok(())
    }

    /// All committed registry events, oldest first
    pub async fn events(&self) -> Vec<EventRecord> {
        self.state.read().await.events.records().to_vec()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.state.read().await.events.subscribe()
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read().await;
        RegistrySnapshot {
            registry: self.address,
            owner: state.owner,
            token_provider: state.token_provider.as_ref().map(|p| p.provider_id()),
            agreements: state.agreements.clone(),
        }
    }
}

fn guard_owner(caller: &AccountId, owner: &AccountId, operation: &str) -> Result<()> {
    ensure_owner(caller, owner).inspect_err(|_| {
        warn!("Rejected {} from {}", operation, caller);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_types::Credit;
    use std::sync::Mutex;

    /// Provider that records credits and optionally refuses them
    struct RecordingProvider {
        id: AccountId,
        fail_with: Option<CovenantError>,
        credits: Mutex<Vec<(AccountId, Credit)>>,
    }

    impl RecordingProvider {
        fn new(fail_with: Option<CovenantError>) -> Arc<Self> {
            Arc::new(Self {
                id: AccountId::new(),
                fail_with,
                credits: Mutex::new(Vec::new()),
            })
        }

        fn credits(&self) -> Vec<(AccountId, Credit)> {
            self.credits.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl TokenProvider for RecordingProvider {
        fn provider_id(&self) -> AccountId {
            self.id
        }

        async fn mint_all(&self, caller: &AccountId, credits: &[Credit]) -> Result<()> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            let mut recorded = self.credits.lock().unwrap();
            recorded.extend(credits.iter().map(|c| (*caller, *c)));
            Ok(())
        }
    }

    fn setup() -> (AgreementRegistry, AccountId, AccountId, AccountId) {
        let owner = AccountId::new();
        (
            AgreementRegistry::new(owner),
            owner,
            AccountId::new(),
            AccountId::new(),
        )
    }

    #[tokio::test]
    async fn test_owner_is_deployer() {
        let (registry, owner, _, _) = setup();
        assert_eq!(registry.owner().await, owner);
        assert_eq!(registry.agreement_count().await, 0);
        assert!(!registry.token_provider_configured().await);
    }

    #[tokio::test]
    async fn test_create_agreement() {
        let (registry, owner, addr1, addr2) = setup();
        let id = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(1000))
            .await
            .unwrap();
        assert_eq!(id, AgreementId::new(1));

        let agreement = registry.get_agreement(id).await.unwrap();
        assert_eq!(
            agreement,
            Agreement {
                id: AgreementId::new(1),
                participant1: addr1,
                participant2: addr2,
                punishment: TokenAmount::new(1000),
                status: AgreementStatus::Open,
            }
        );
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let (registry, owner, addr1, addr2) = setup();
        for expected in 1..=4u64 {
            let id = registry
                .create_agreement(&owner, addr1, addr2, TokenAmount::new(expected as u128))
                .await
                .unwrap();
            assert_eq!(id.value(), expected);
        }
        assert_eq!(registry.agreement_count().await, 4);
    }

    #[tokio::test]
    async fn test_create_emits_event() {
        let (registry, owner, addr1, addr2) = setup();
        registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(1))
            .await
            .unwrap();
        registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(1500))
            .await
            .unwrap();

        let events = registry.events().await;
        assert_eq!(
            events[1].event,
            CovenantEvent::AgreementCreated {
                id: AgreementId::new(2),
                participant1: addr1,
                participant2: addr2,
                punishment: TokenAmount::new(1500),
            }
        );
    }

    #[tokio::test]
    async fn test_create_by_stranger_rejected() {
        let (registry, _, addr1, addr2) = setup();
        let result = registry
            .create_agreement(&addr1, addr1, addr2, TokenAmount::new(1))
            .await;
        assert!(matches!(
            result,
            Err(CovenantError::UnauthorizedCaller { .. })
        ));
        assert_eq!(registry.agreement_count().await, 0);
        assert!(registry.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_identical_participants_rejected() {
        let (registry, owner, addr1, addr2) = setup();
        let result = registry
            .create_agreement(&owner, addr1, addr1, TokenAmount::new(1))
            .await;
        assert!(matches!(
            result,
            Err(CovenantError::InvalidParticipants { .. })
        ));

        // No id was consumed by the failed attempt.
        let id = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(1))
            .await
            .unwrap();
        assert_eq!(id, AgreementId::new(1));
    }

    #[tokio::test]
    async fn test_get_agreement_by_id() {
        let (registry, owner, addr1, addr2) = setup();
        let (addr3, addr4, addr5, addr6) = (
            AccountId::new(),
            AccountId::new(),
            AccountId::new(),
            AccountId::new(),
        );
        registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(1000))
            .await
            .unwrap();
        registry
            .create_agreement(&owner, addr3, addr4, TokenAmount::new(1))
            .await
            .unwrap();
        registry
            .create_agreement(&owner, addr6, addr5, TokenAmount::new(14))
            .await
            .unwrap();

        let agreement = registry.get_agreement(AgreementId::new(2)).await.unwrap();
        assert_eq!(agreement.participant1, addr3);
        assert_eq!(agreement.participant2, addr4);
        assert_eq!(agreement.punishment, TokenAmount::new(1));
        assert_eq!(agreement.status, AgreementStatus::Open);
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected_everywhere() {
        let (registry, owner, addr1, addr2) = setup();
        registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(1))
            .await
            .unwrap();

        for raw in [0u64, 2, u64::MAX] {
            let id = AgreementId::new(raw);
            assert!(matches!(
                registry.get_agreement(id).await,
                Err(CovenantError::InvalidAgreementId { .. })
            ));
            assert!(matches!(
                registry.resolve_agreement(&owner, id, true, true).await,
                Err(CovenantError::InvalidAgreementId { .. })
            ));
            assert!(matches!(
                registry.cancel_agreement(&owner, id).await,
                Err(CovenantError::InvalidAgreementId { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_resolution_table() {
        let cases = [
            (true, true, AgreementStatus::BothFulfilled, false, false),
            (false, true, AgreementStatus::FirstFailed, true, false),
            (true, false, AgreementStatus::SecondFailed, false, true),
            (false, false, AgreementStatus::BothFailed, true, true),
        ];

        for (first, second, expected, credit1, credit2) in cases {
            let (registry, owner, addr1, addr2) = setup();
            let provider = RecordingProvider::new(None);
            registry
                .set_token_provider(&owner, provider.clone())
                .await
                .unwrap();
            let id = registry
                .create_agreement(&owner, addr1, addr2, TokenAmount::new(77))
                .await
                .unwrap();

            let status = registry
                .resolve_agreement(&owner, id, first, second)
                .await
                .unwrap();
            assert_eq!(status, expected);
            assert_eq!(registry.get_agreement(id).await.unwrap().status, expected);

            let credited: Vec<AccountId> =
                provider.credits().iter().map(|(_, c)| c.account).collect();
            assert_eq!(credited.contains(&addr1), credit1);
            assert_eq!(credited.contains(&addr2), credit2);
            for (caller, credit) in provider.credits() {
                assert_eq!(caller, registry.address());
                assert_eq!(credit.amount, TokenAmount::new(77));
            }
        }
    }

    #[tokio::test]
    async fn test_failed_settlement_keeps_agreement_open() {
        let (registry, owner, addr1, addr2) = setup();
        let provider = RecordingProvider::new(Some(CovenantError::UnauthorizedCaller {
            caller: "registry".to_string(),
        }));
        registry.set_token_provider(&owner, provider).await.unwrap();
        let id = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(5))
            .await
            .unwrap();
        let events_before = registry.events().await.len();

        let result = registry.resolve_agreement(&owner, id, false, false).await;
        assert!(matches!(
            result,
            Err(CovenantError::UnauthorizedCaller { .. })
        ));
        assert_eq!(
            registry.get_agreement(id).await.unwrap().status,
            AgreementStatus::Open
        );
        assert_eq!(registry.events().await.len(), events_before);

        // Nothing needs to be credited, so no provider call is made.
        assert_eq!(
            registry.resolve_agreement(&owner, id, true, true).await,
            Ok(AgreementStatus::BothFulfilled)
        );
    }

    #[tokio::test]
    async fn test_resolution_without_provider() {
        let (registry, owner, addr1, addr2) = setup();
        let id = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(5))
            .await
            .unwrap();

        assert_eq!(
            registry.resolve_agreement(&owner, id, false, true).await,
            Err(CovenantError::TokenProviderNotSet)
        );
        assert!(registry.get_agreement(id).await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_terminal_agreements_reject_every_transition() {
        let (registry, owner, addr1, addr2) = setup();
        registry
            .set_token_provider(&owner, RecordingProvider::new(None))
            .await
            .unwrap();
        let resolved = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(3))
            .await
            .unwrap();
        let canceled = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(3))
            .await
            .unwrap();
        registry
            .resolve_agreement(&owner, resolved, true, true)
            .await
            .unwrap();
        registry.cancel_agreement(&owner, canceled).await.unwrap();

        for _ in 0..3 {
            for id in [resolved, canceled] {
                assert!(matches!(
                    registry.resolve_agreement(&owner, id, false, false).await,
                    Err(CovenantError::AgreementNotOpen { .. })
                ));
                assert!(matches!(
                    registry.cancel_agreement(&owner, id).await,
                    Err(CovenantError::AgreementNotOpen { .. })
                ));
            }
        }
        assert_eq!(
            registry.get_agreement(resolved).await.unwrap().status,
            AgreementStatus::BothFulfilled
        );
        assert_eq!(
            registry.get_agreement(canceled).await.unwrap().status,
            AgreementStatus::Canceled
        );
    }

    #[tokio::test]
    async fn test_cancel_moves_no_tokens() {
        let (registry, owner, addr1, addr2) = setup();
        let provider = RecordingProvider::new(None);
        registry
            .set_token_provider(&owner, provider.clone())
            .await
            .unwrap();
        let id = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(9))
            .await
            .unwrap();

        registry.cancel_agreement(&owner, id).await.unwrap();
        assert!(provider.credits().is_empty());
        assert_eq!(
            registry.events().await.last().map(|r| r.event.clone()),
            Some(CovenantEvent::AgreementCanceled {
                id,
                participant1: addr1,
                participant2: addr2,
            })
        );
    }

    #[tokio::test]
    async fn test_owner_gated_operations_reject_strangers() {
        let (registry, owner, addr1, addr2) = setup();
        let id = registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(9))
            .await
            .unwrap();
        let before = registry.snapshot().await;

        assert!(matches!(
            registry
                .set_token_provider(&addr1, RecordingProvider::new(None))
                .await,
            Err(CovenantError::UnauthorizedCaller { .. })
        ));
        assert!(matches!(
            registry.resolve_agreement(&addr1, id, false, false).await,
            Err(CovenantError::UnauthorizedCaller { .. })
        ));
        assert!(matches!(
            registry.cancel_agreement(&addr2, id).await,
            Err(CovenantError::UnauthorizedCaller { .. })
        ));
        assert_eq!(registry.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let (registry, owner, addr1, addr2) = setup();
        registry
            .create_agreement(&owner, addr1, addr2, TokenAmount::new(9))
            .await
            .unwrap();
        let snapshot = registry.snapshot().await;
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["agreements"][0]["status"], "Open");
        assert_eq!(json["agreements"][0]["id"], 1);
    }
}
