//! Phase-aware routing of tool calls to upstream, mirror or both.
//!
//! The dispatcher starts in [`Phase::UpstreamOnly`]. Creating the mirror or
//! attempting a sync moves it to [`Phase::Transitioning`]; the first sync
//! that finishes without errors moves it to [`Phase::MirrorPrimary`], where
//! it stays. Phases never move backwards.
//!
//! | phase | lists | creates |
//! |---|---|---|
//! | A `UpstreamOnly` | upstream | upstream |
//! | B `Transitioning` | upstream | upstream, copied into the mirror |
//! | C `MirrorPrimary` | mirror | validated locally, upstream, mirror always |
//!
//! In phase C a create that upstream cannot take right now is kept in the
//! mirror under a negative id and queued in the pending write ledger.

mod outcome;
mod tool;

pub use self::outcome::{DispatchError, Dispatched, MirrorReport, Outcome, Placement, Source};
pub use self::tool::Tool;

use std::fmt;
use std::slice;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use shadowcrm_model::{Contact, ContactDraft, ContactFilter, Deal, DealDraft, DealFilter};
use shadowcrm_storage::{EntityKind, MirrorState, PendingWrite, ShadowStore, StorageError};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::client::CrmClient;
use crate::on_mirror;
use crate::orchestrator::{SyncMetadata, SyncOrchestrator};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    UpstreamOnly,
    Transitioning,
    MirrorPrimary,
}

impl Phase {
    /// Short label: A, B or C.
    pub fn label(&self) -> char {
        match self {
            Phase::UpstreamOnly => 'A',
            Phase::Transitioning => 'B',
            Phase::MirrorPrimary => 'C',
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::UpstreamOnly => "upstream only",
            Phase::Transitioning => "transitioning",
            Phase::MirrorPrimary => "mirror primary",
        };
        write!(f, "{} ({})", self.label(), name)
    }
}

pub struct Dispatcher {
    client: Arc<dyn CrmClient>,
    shadow: Arc<ShadowStore>,
    sync: SyncOrchestrator,
    phase: RwLock<Phase>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn CrmClient>, shadow: Arc<ShadowStore>, retry: RetryPolicy) -> Self {
        Dispatcher {
            sync: SyncOrchestrator::new(client.clone(), shadow.clone(), retry),
            client,
            shadow,
            phase: RwLock::new(Phase::UpstreamOnly),
        }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    pub fn shadow(&self) -> &Arc<ShadowStore> {
        &self.shadow
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.sync
    }

    /// Move forward to `to`; never backwards.
    async fn advance(&self, to: Phase) {
        let mut phase = self.phase.write().await;
        if *phase < to {
            let from = *phase;
            tracing::info!(from = %from, to = %to, "phase transition");
            *phase = to;
        }
    }

    /// Run the tool called `name` with JSON `args`, timing it.
    pub async fn dispatch(&self, name: &str, args: Value) -> Dispatched {
        let start = Instant::now();
        let outcome = match name.parse::<Tool>() {
            Ok(tool) => self.run(tool, args).await,
            Err(err) => Err(err),
        };
        let dispatched = Dispatched {
            tool: name.to_string(),
            outcome,
            elapsed: start.elapsed(),
        };
        match &dispatched.outcome {
            Ok(_) => tracing::info!(
                tool = name,
                elapsed = dispatched.elapsed_seconds(),
                "tool call finished"
            ),
            Err(err) if err.is_fatal() => tracing::error!(
                tool = name,
                error = %err,
                "tool call aborted: mirror storage unavailable"
            ),
            Err(err) => tracing::warn!(
                tool = name,
                elapsed = dispatched.elapsed_seconds(),
                error = %err,
                "tool call failed"
            ),
        }
        dispatched
    }

    async fn run(&self, requested: Tool, args: Value) -> Result<Outcome, DispatchError> {
        match requested {
            Tool::ListContacts => self.list_contacts(&tool::filters(&args)?).await,
            Tool::CreateContact => {
                self.create_contact(ContactDraft::from_json(tool::payload(args))?)
                    .await
            }
            Tool::ListDeals => self.list_deals(&tool::filters(&args)?).await,
            Tool::CreateDeal => {
                self.create_deal(DealDraft::from_json(tool::payload(args))?)
                    .await
            }
            Tool::CreateLocalDb => self.create_local_db().await,
            Tool::LocalDbQuery => self.local_db_query(&tool::sql(&args)?).await,
            Tool::LocalDbInsert => {
                let (table, data) = tool::insert_args(&args)?;
                self.local_db_insert(&table, &data).await
            }
            Tool::SyncCrmToLocal => Ok(Outcome::Synced(self.sync_crm_to_local().await)),
        }
    }

    pub async fn list_contacts(&self, filter: &ContactFilter) -> Result<Outcome, DispatchError> {
        if self.phase().await == Phase::MirrorPrimary {
            let filter = filter.clone();
            let contacts = on_mirror(&self.shadow, move |m| m.list_contacts(&filter)).await?;
            return Ok(Outcome::Contacts {
                contacts,
                source: Source::Mirror,
            });
        }
        let contacts = self.client.list_contacts(filter).await?;
        Ok(Outcome::Contacts {
            contacts,
            source: Source::Upstream,
        })
    }

    pub async fn list_deals(&self, filter: &DealFilter) -> Result<Outcome, DispatchError> {
        if self.phase().await == Phase::MirrorPrimary {
            let filter = filter.clone();
            let deals = on_mirror(&self.shadow, move |m| m.list_deals(&filter)).await?;
            return Ok(Outcome::Deals {
                deals,
                source: Source::Mirror,
            });
        }
        let deals = self.client.list_deals(filter).await?;
        Ok(Outcome::Deals {
            deals,
            source: Source::Upstream,
        })
    }

    pub async fn create_contact(&self, draft: ContactDraft) -> Result<Outcome, DispatchError> {
        let phase = self.phase().await;
        if phase != Phase::MirrorPrimary {
            let contact = self.client.create_contact(&draft).await?;
            let placement = if phase == Phase::Transitioning
                && self.copy_to_mirror(self.mirror_contact(&contact).await)
            {
                Placement::Mirrored
            } else {
                Placement::Upstream
            };
            return Ok(Outcome::ContactCreated { contact, placement });
        }

        let local = draft.clone().validate()?;
        match self.client.create_contact(&draft).await {
            Ok(contact) => {
                self.mirror_contact(&contact).await?;
                Ok(Outcome::ContactCreated {
                    contact,
                    placement: Placement::Mirrored,
                })
            }
            Err(err) if err.is_validation() => Err(err.into()),
            Err(err) => {
                let (contact, pending) =
                    on_mirror(&self.shadow, move |m| m.accept_local_contact(&local)).await?;
                Ok(Outcome::ContactCreated {
                    contact,
                    placement: Placement::Queued {
                        pending,
                        reason: err.to_string(),
                    },
                })
            }
        }
    }

    pub async fn create_deal(&self, draft: DealDraft) -> Result<Outcome, DispatchError> {
        let phase = self.phase().await;
        if phase != Phase::MirrorPrimary {
            let deal = self.client.create_deal(&draft).await?;
            let placement = if phase == Phase::Transitioning
                && self.copy_to_mirror(self.mirror_deal(&deal).await)
            {
                Placement::Mirrored
            } else {
                Placement::Upstream
            };
            return Ok(Outcome::DealCreated { deal, placement });
        }

        let local = draft.clone().validate()?;
        match self.client.create_deal(&draft).await {
            Ok(deal) => {
                self.mirror_deal(&deal).await?;
                Ok(Outcome::DealCreated {
                    deal,
                    placement: Placement::Mirrored,
                })
            }
            Err(err) if err.is_validation() => Err(err.into()),
            Err(err) => {
                let (deal, pending) =
                    on_mirror(&self.shadow, move |m| m.accept_local_deal(&local)).await?;
                Ok(Outcome::DealCreated {
                    deal,
                    placement: Placement::Queued {
                        pending,
                        reason: err.to_string(),
                    },
                })
            }
        }
    }

    async fn mirror_contact(&self, contact: &Contact) -> Result<usize, StorageError> {
        let contact = contact.clone();
        on_mirror(&self.shadow, move |m| m.upsert_contacts(slice::from_ref(&contact))).await
    }

    async fn mirror_deal(&self, deal: &Deal) -> Result<usize, StorageError> {
        let deal = deal.clone();
        on_mirror(&self.shadow, move |m| m.upsert_deals(slice::from_ref(&deal))).await
    }

    /// A failed best-effort mirror copy is logged, not surfaced: upstream
    /// already holds the record and the next sync brings it over.
    fn copy_to_mirror(&self, result: Result<usize, StorageError>) -> bool {
        match result {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "could not copy created record into the mirror");
                false
            }
        }
    }

    pub async fn create_local_db(&self) -> Result<Outcome, DispatchError> {
        on_mirror(&self.shadow, |m| m.create_if_absent()).await?;
        self.advance(Phase::Transitioning).await;
        Ok(Outcome::MirrorCreated {
            path: self.shadow.path().to_path_buf(),
        })
    }

    pub async fn local_db_query(&self, sql: &str) -> Result<Outcome, DispatchError> {
        let sql = sql.to_string();
        let rows = on_mirror(&self.shadow, move |m| m.query(&sql)).await?;
        Ok(Outcome::Rows(rows))
    }

    pub async fn local_db_insert(
        &self,
        table: &str,
        data: &Map<String, Value>,
    ) -> Result<Outcome, DispatchError> {
        let (name, fields) = (table.to_string(), data.clone());
        on_mirror(&self.shadow, move |m| m.upsert(&name, &fields)).await?;
        Ok(Outcome::Inserted {
            table: table.trim().to_string(),
        })
    }

    /// Sync the mirror. Entering from phase A moves to B before the sync;
    /// a clean sync moves to C.
    pub async fn sync_crm_to_local(&self) -> SyncMetadata {
        self.advance(Phase::Transitioning).await;
        let meta = self.sync.sync_all().await;
        if meta.is_clean() {
            self.advance(Phase::MirrorPrimary).await;
        }
        meta
    }

    pub async fn report(&self) -> Result<MirrorReport, DispatchError> {
        let (mirror, contacts, deals, pending_writes) = on_mirror(&self.shadow, |m| {
            let mirror = m.lifecycle()?;
            if mirror == MirrorState::Absent {
                return Ok((mirror, 0, 0, 0));
            }
            Ok((
                mirror,
                m.count(EntityKind::Contacts)?,
                m.count(EntityKind::Deals)?,
                m.pending_writes()?.len(),
            ))
        })
        .await?;
        Ok(MirrorReport {
            phase: self.phase().await,
            mirror,
            path: self.shadow.path().to_path_buf(),
            contacts,
            deals,
            pending_writes,
            last_sync: self.sync.last_sync().await,
        })
    }

    pub fn pending_writes(&self) -> Result<Vec<PendingWrite>, DispatchError> {
        Ok(self.shadow.pending_writes()?)
    }
}
