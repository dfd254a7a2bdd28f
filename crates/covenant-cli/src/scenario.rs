//! Scripted scenarios
//!
//! A scenario is a JSON document listing steps. Each step names the
//! calling account by alias and one operation against the deployment:
//!
//! ```json
//! {
//!   "name": "first participant fails",
//!   "steps": [
//!     { "caller": "owner", "op": "create", "participant1": "alice", "participant2": "bob", "punishment": 13031 },
//!     { "caller": "owner", "op": "resolve", "id": 1, "first_fulfilled": false, "second_fulfilled": true },
//!     { "caller": "owner", "op": "balance", "account": "alice" }
//!   ]
//! }
//! ```
//!
//! `owner`, `registry` and `ledger` resolve to the deployer and the two
//! component addresses. Any other alias gets a fresh account on first use.

use std::collections::BTreeMap;
use std::sync::Arc;

use covenant_sdk::{
    AccountId, AgreementId, CovenantError, Deployment, LedgerSnapshot, Result, TokenAmount,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const OWNER_ALIAS: &str = "owner";
pub const REGISTRY_ALIAS: &str = "registry";
pub const LEDGER_ALIAS: &str = "ledger";

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default = "default_caller")]
    pub caller: String,
    #[serde(flatten)]
    pub action: Action,
}

fn default_caller() -> String {
    OWNER_ALIAS.to_string()
}

/// One call against the deployment
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Create {
        participant1: String,
        participant2: String,
        punishment: AmountInput,
    },
    Resolve {
        id: u64,
        first_fulfilled: bool,
        second_fulfilled: bool,
    },
    Cancel {
        id: u64,
    },
    Get {
        id: u64,
    },
    Mint {
        account: String,
        amount: AmountInput,
    },
    Transfer {
        to: String,
        amount: AmountInput,
    },
    SetMinter {
        account: String,
    },
    SetProvider,
    Balance {
        account: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Resolve { .. } => "resolve",
            Action::Cancel { .. } => "cancel",
            Action::Get { .. } => "get",
            Action::Mint { .. } => "mint",
            Action::Transfer { .. } => "transfer",
            Action::SetMinter { .. } => "set_minter",
            Action::SetProvider => "set_provider",
            Action::Balance { .. } => "balance",
        }
    }
}

/// Token amount as a JSON number, a decimal string, or `"max"`.
///
/// JSON numbers above `u64::MAX` are not portable, so large amounts are
/// written as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(u64),
    Text(String),
}

impl AmountInput {
    pub fn to_amount(&self) -> anyhow::Result<TokenAmount> {
        match self {
            AmountInput::Number(n) => Ok(TokenAmount::from(*n)),
            AmountInput::Text(s) if s.eq_ignore_ascii_case("max") => Ok(TokenAmount::MAX),
            AmountInput::Text(s) => s
                .parse::<u128>()
                .map(TokenAmount::new)
                .map_err(|e| anyhow::anyhow!("invalid amount {s:?}: {e}")),
        }
    }
}

/// Maps scenario aliases to accounts
#[derive(Debug, Clone)]
pub struct Aliases {
    accounts: BTreeMap<String, AccountId>,
}

impl Aliases {
    pub fn new(deployment: &Deployment) -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(OWNER_ALIAS.to_string(), deployment.deployer());
        accounts.insert(REGISTRY_ALIAS.to_string(), deployment.registry().address());
        accounts.insert(LEDGER_ALIAS.to_string(), deployment.ledger().address());
        Self { accounts }
    }

    pub fn resolve(&mut self, alias: &str) -> AccountId {
        *self
            .accounts
            .entry(alias.to_string())
            .or_insert_with(AccountId::new)
    }

    pub fn name_of(&self, account: &AccountId) -> Option<&str> {
        self.accounts
            .iter()
            .find(|(_, id)| *id == account)
            .map(|(name, _)| name.as_str())
    }

    pub fn accounts(&self) -> &BTreeMap<String, AccountId> {
        &self.accounts
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Ok { detail: String },
    Failed { error: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub caller: String,
    pub op: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl StepReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok { .. })
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: Option<String>,
    pub steps: Vec<StepReport>,
    /// Steps not executed because an earlier one failed under fail-fast
    pub skipped: usize,
    pub accounts: BTreeMap<String, AccountId>,
    pub balances: BTreeMap<String, TokenAmount>,
    pub ledger: LedgerSnapshot,
}

impl ScenarioReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_ok()).count()
    }
}

/// Runs scenarios against one deployment
pub struct ScenarioRunner {
    deployment: Deployment,
    aliases: Aliases,
}

impl ScenarioRunner {
    pub fn new(deployment: Deployment) -> Self {
        let aliases = Aliases::new(&deployment);
        Self {
            deployment,
            aliases,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Execute every step in order.
    ///
    /// A failing step is recorded and the run continues, unless
    /// `fail_fast` is set.
    pub async fn run(&mut self, scenario: &Scenario, fail_fast: bool) -> ScenarioReport {
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let caller = self.aliases.resolve(&step.caller);
            let outcome = match self.execute(&caller, &step.action).await {
                Ok(detail) => Outcome::Ok { detail },
                Err(e) => {
                    warn!(step = index + 1, op = step.action.name(), "Step failed: {e:#}");
                    Outcome::Failed {
                        error: error_kind(&e).to_string(),
                        message: e.to_string(),
                    }
                }
            };

            let report = StepReport {
                index: index + 1,
                caller: step.caller.clone(),
                op: step.action.name(),
                outcome,
            };
            let failed = !report.is_ok();
            steps.push(report);

            if failed && fail_fast {
                break;
            }
        }

        let skipped = scenario.steps.len() - steps.len();
        let ledger = self.deployment.ledger().snapshot().await;
        let balances = self
            .aliases
            .accounts()
            .iter()
            .filter_map(|(name, id)| ledger.balances.get(id).map(|b| (name.clone(), *b)))
            .collect();

        ScenarioReport {
            name: scenario.name.clone(),
            steps,
            skipped,
            accounts: self.aliases.accounts().clone(),
            balances,
            ledger,
        }
    }

    async fn execute(&mut self, caller: &AccountId, action: &Action) -> anyhow::Result<String> {
        debug!(op = action.name(), %caller, "Executing step");
        let registry = self.deployment.registry();
        let ledger = self.deployment.ledger();

        let detail = match action {
            Action::Create {
                participant1,
                participant2,
                punishment,
            } => {
                let p1 = self.aliases.resolve(participant1);
                let p2 = self.aliases.resolve(participant2);
                let id = registry
                    .create_agreement(caller, p1, p2, punishment.to_amount()?)
                    .await?;
                format!("agreement {id} created")
            }
            Action::Resolve {
                id,
                first_fulfilled,
                second_fulfilled,
            } => {
                let status = registry
                    .resolve_agreement(
                        caller,
                        AgreementId::new(*id),
                        *first_fulfilled,
                        *second_fulfilled,
                    )
                    .await?;
                format!("agreement #{id} closed as {status}")
            }
            Action::Cancel { id } => {
                registry.cancel_agreement(caller, AgreementId::new(*id)).await?;
                format!("agreement #{id} canceled")
            }
            Action::Get { id } => {
                let agreement = registry.get_agreement(AgreementId::new(*id)).await?;
                format!(
                    "agreement {}: {} / {} punishment {} status {}",
                    agreement.id,
                    self.label(&agreement.participant1),
                    self.label(&agreement.participant2),
                    agreement.punishment,
                    agreement.status
                )
            }
            Action::Mint { account, amount } => {
                let target = self.aliases.resolve(account);
                let balance = ledger.mint(caller, &target, amount.to_amount()?).await?;
                format!("{account} balance now {balance}")
            }
            Action::Transfer { to, amount } => {
                let target = self.aliases.resolve(to);
                let amount = amount.to_amount()?;
                ledger.transfer(caller, &target, amount).await?;
                format!("{amount} transferred to {to}")
            }
            Action::SetMinter { account } => {
                let minter = self.aliases.resolve(account);
                ledger.set_authorized_minter(caller, minter).await?;
                format!("authorized minter set to {account}")
            }
            Action::SetProvider => {
                registry
                    .set_token_provider(caller, Arc::new(ledger.clone()))
                    .await?;
                "token provider set to ledger".to_string()
            }
            Action::Balance { account } => {
                let target = self.aliases.resolve(account);
                format!("{account} holds {}", ledger.balance_of(&target).await)
            }
        };

        Ok(detail)
    }

    fn label(&self, account: &AccountId) -> String {
        self.aliases
            .name_of(account)
            .map(str::to_string)
            .unwrap_or_else(|| account.to_string())
    }
}

fn error_kind(error: &anyhow::Error) -> &'static str {
    error
        .downcast_ref::<CovenantError>()
        .map(CovenantError::kind)
        .unwrap_or("InvalidStep")
}

/// The scenario run by `covenant demo`
pub fn reference_scenario() -> Scenario {
    let step = |action| Step {
        caller: OWNER_ALIAS.to_string(),
        action,
    };
    Scenario {
        name: Some("reference settlement".to_string()),
        steps: vec![
            step(Action::Create {
                participant1: "addr1".to_string(),
                participant2: "addr2".to_string(),
                punishment: AmountInput::Number(13031),
            }),
            step(Action::Resolve {
                id: 1,
                first_fulfilled: false,
                second_fulfilled: true,
            }),
            step(Action::Get { id: 1 }),
            step(Action::Balance {
                account: "addr1".to_string(),
            }),
            step(Action::Balance {
                account: "addr2".to_string(),
            }),
        ],
    }
}

pub fn parse(json: &str) -> anyhow::Result<Scenario> {
    Ok(serde_json::from_str(json)?)
}

/// Deploy a fresh ledger and registry, wiring them when asked
pub async fn deploy(deployer: AccountId, wire: bool) -> Result<Deployment> {
    if wire {
        Deployment::deploy(deployer).await
    } else {
        Ok(Deployment::deploy_unwired(deployer))
    }
}
