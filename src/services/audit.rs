//! Batched, append-only audit trail.
//!
//! Entries are buffered in memory and written to `audit_log_entries` when the
//! buffer reaches the batch size, when the flush timer fires, or on shutdown.
//! Entries still buffered when the process dies are lost.

use crate::{
    db::DbPool,
    entities::{
        audit_log::{self, Entity as AuditLog},
        types::{AuditOutcome, Region},
    },
    errors::ServiceError,
    tracing::current_request_id,
};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// A single audit record before it is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub region: Option<Region>,
    pub outcome: AuditOutcome,
    pub ip_address: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            region: None,
            outcome: AuditOutcome::Success,
            ip_address: None,
            details: None,
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn failure(mut self) -> Self {
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn into_active_model(self, request_id: Option<String>) -> audit_log::ActiveModel {
        audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor_id: Set(self.actor_id),
            action: Set(self.action),
            resource_type: Set(self.resource_type),
            resource_id: Set(self.resource_id),
            region: Set(self.region.map(|r| r.as_str().to_string())),
            outcome: Set(self.outcome.as_str().to_string()),
            ip_address: Set(self.ip_address),
            request_id: Set(request_id),
            details: Set(self.details.map(|d| d.to_string())),
            created_at: Set(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

pub struct AuditLogger {
    db_pool: Arc<DbPool>,
    buffer: Mutex<Vec<audit_log::ActiveModel>>,
    batch_size: usize,
    flush_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl AuditLogger {
    pub fn new(db_pool: Arc<DbPool>, batch_size: usize, flush_interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            db_pool,
            buffer: Mutex::new(Vec::with_capacity(batch_size)),
            batch_size: batch_size.max(1),
            flush_interval,
            shutdown_tx,
        }
    }

    /// Buffer an entry, flushing when the batch is full. Write failures are
    /// logged and never surface to the caller.
    pub async fn log(&self, entry: AuditEntry) {
        let model = entry.into_active_model(current_request_id().map(|id| id.to_string()));
        let batch = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(model);
            gauge!("flexvolt_audit.buffered", buffer.len() as f64);
            if buffer.len() >= self.batch_size {
                std::mem::take(&mut *buffer)
            } else {
                return;
            }
        };

        if let Err(e) = self.write_batch(batch).await {
            error!(error = %e, "audit batch write failed");
        }
    }

    /// Write everything currently buffered. Returns the number of entries written.
    pub async fn flush(&self) -> Result<usize, ServiceError> {
        let batch = std::mem::take(&mut *self.buffer.lock().await);
        self.write_batch(batch).await
    }

    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }

    async fn write_batch(&self, batch: Vec<audit_log::ActiveModel>) -> Result<usize, ServiceError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let count = batch.len();
        AuditLog::insert_many(batch)
            .exec(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        counter!("flexvolt_audit.entries_written", count as u64);
        gauge!("flexvolt_audit.buffered", 0.0);
        debug!(count, "audit batch flushed");
        Ok(count)
    }

    /// Spawn the timer loop. It flushes on every tick and once more when
    /// [`AuditLogger::shutdown`] is called.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let logger = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(logger.flush_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = logger.flush().await {
                            error!(error = %e, "periodic audit flush failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            match logger.flush().await {
                Ok(count) => info!(count, "audit logger stopped"),
                Err(e) => error!(error = %e, "final audit flush failed"),
            }
        })
    }

    /// Signal the flush loop to stop and write what is left.
    pub async fn shutdown(&self) -> Result<usize, ServiceError> {
        let _ = self.shutdown_tx.send(true);
        self.flush().await
    }

    #[instrument(skip(self))]
    pub async fn query(&self, filter: AuditQuery) -> Result<Vec<audit_log::Model>, ServiceError> {
        let mut query = AuditLog::find();
        if let Some(actor_id) = filter.actor_id {
            query = query.filter(audit_log::Column::ActorId.eq(actor_id));
        }
        if let Some(action) = filter.action {
            query = query.filter(audit_log::Column::Action.eq(action));
        }
        if let Some(resource_type) = filter.resource_type {
            query = query.filter(audit_log::Column::ResourceType.eq(resource_type));
        }
        if let Some(resource_id) = filter.resource_id {
            query = query.filter(audit_log::Column::ResourceId.eq(resource_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(audit_log::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(audit_log::Column::CreatedAt.lte(to));
        }

        query
            .order_by_desc(audit_log::Column::CreatedAt)
            .limit(filter.limit.unwrap_or(100).min(1000))
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        AuditLog::find()
            .count(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection, run_migrations};

    async fn logger(batch_size: usize, interval: Duration) -> Arc<AuditLogger> {
        let pool = establish_connection("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(AuditLogger::new(Arc::new(pool), batch_size, interval))
    }

    #[tokio::test]
    async fn flushes_when_batch_is_full() {
        let logger = logger(3, Duration::from_secs(3600)).await;
        logger.log(AuditEntry::new("inventory.update", "inventory")).await;
        logger.log(AuditEntry::new("inventory.update", "inventory")).await;
        assert_eq!(logger.count().await.unwrap(), 0);
        assert_eq!(logger.pending().await, 2);

        logger
            .log(AuditEntry::new("order.create", "order").failure())
            .await;
        assert_eq!(logger.count().await.unwrap(), 3);
        assert_eq!(logger.pending().await, 0);
    }

    #[tokio::test]
    async fn shutdown_writes_remaining_entries() {
        let logger = logger(50, Duration::from_secs(3600)).await;
        let handle = logger.start();
        let actor = Uuid::new_v4();
        logger
            .log(
                AuditEntry::new("auth.login", "supplier")
                    .actor(actor)
                    .region(Region::Japan)
                    .details(serde_json::json!({"mfa": false})),
            )
            .await;

        assert_eq!(logger.shutdown().await.unwrap(), 1);
        handle.await.unwrap();

        let rows = logger
            .query(AuditQuery {
                actor_id: Some(actor),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region.as_deref(), Some("JAPAN"));
        assert_eq!(rows[0].outcome, "SUCCESS");
    }

    #[tokio::test]
    async fn entries_carry_the_request_id_in_scope() {
        use crate::tracing::{scope_request_id, RequestId};

        let logger = logger(50, Duration::from_secs(3600)).await;
        scope_request_id(RequestId::new("req-42"), async {
            logger.log(AuditEntry::new("order.create", "order")).await;
        })
        .await;
        logger.log(AuditEntry::new("order.update", "order")).await;
        logger.flush().await.unwrap();

        let rows = logger
            .query(AuditQuery {
                resource_type: Some("order".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let scoped = rows.iter().find(|r| r.action == "order.create").unwrap();
        assert_eq!(scoped.request_id.as_deref(), Some("req-42"));
        let unscoped = rows.iter().find(|r| r.action == "order.update").unwrap();
        assert_eq!(unscoped.request_id, None);
    }

    #[tokio::test]
    async fn timer_flushes_partial_batch() {
        let logger = logger(50, Duration::from_millis(50)).await;
        let handle = logger.start();
        logger.log(AuditEntry::new("warehouse.create", "warehouse")).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(logger.count().await.unwrap(), 1);

        logger.shutdown().await.unwrap();
        handle.await.unwrap();
    }
}
