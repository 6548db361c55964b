//! Integration Dispatch Queue
//!
//! Approved articles are queued per destination system. Every item carries
//! the preflight warnings computed when it was enqueued, moves through
//! `Queued -> InProgress -> Completed | Failed`, and is archived once
//! terminal. Re-sending an article means enqueueing it again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::article::{Article, ArticleId, FileRef};
use crate::error::{WorkflowError, WorkflowResult};
use crate::fields::FieldId;

pub const SENT_MESSAGE: &str = "Sent to integration bus";
pub const CONFIRMED_MESSAGE: &str = "Confirmed by external system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Destination {
    #[serde(rename = "PIM")]
    Pim,
    #[serde(rename = "ERP")]
    Erp,
    #[serde(rename = "E-commerce")]
    ECommerce,
    #[serde(rename = "POS")]
    Pos,
}

impl Destination {
    pub fn label(self) -> &'static str {
        match self {
            Destination::Pim => "PIM",
            Destination::Erp => "ERP",
            Destination::ECommerce => "E-commerce",
            Destination::Pos => "POS",
        }
    }

    /// Fields the destination system refuses to import without.
    pub fn required_fields(self) -> &'static [FieldId] {
        use FieldId::*;
        match self {
            Destination::Pim => &[Ean, Title, Brand, ProductSpecs, Photos],
            Destination::Erp => &[Ean, Title, Brand, ShelfLife, SupplyDate, SupplyVolume],
            Destination::ECommerce => &[
                Ean,
                Title,
                Brand,
                ProductSpecs,
                PackageSizeMaterial,
                Photos,
            ],
            Destination::Pos => &[Ean, Title, Brand],
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Missing fields for one destination, as `"<DEST>: <field>"`.
pub fn preflight(article: &Article, destination: Destination) -> Vec<String> {
    destination
        .required_fields()
        .iter()
        .filter(|field| !article.is_filled(**field))
        .map(|field| format!("{}: {}", destination.label(), field))
        .collect()
}

/// Preflight across several destinations, in the order given.
pub fn preflight_all(article: &Article, destinations: &[Destination]) -> Vec<String> {
    destinations
        .iter()
        .flat_map(|destination| preflight(article, *destination))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueItemId(pub String);

impl QueueItemId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Queued => write!(f, "Queued"),
            QueueStatus::InProgress => write!(f, "In progress"),
            QueueStatus::Completed => write!(f, "Completed"),
            QueueStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub article_id: ArticleId,
    pub destinations: Vec<Destination>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message: Option<String>,
    /// Preflight gaps found at enqueue time
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBlock {
    pub size_material: String,
    pub specs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageBlock {
    pub size_material: String,
    pub specs: String,
    pub rts: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsBlock {
    pub first_supply_date: String,
    pub weekly_volume: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentNames {
    pub certificates: Vec<String>,
    pub photos: Vec<String>,
}

/// Article body sent to each destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePayload {
    pub ean: String,
    pub title: String,
    pub description: String,
    pub brand: String,
    pub shelf_life: String,
    pub product: ProductBlock,
    pub package: PackageBlock,
    pub logistics: LogisticsBlock,
    pub attachments: AttachmentNames,
}

impl From<&Article> for ArticlePayload {
    fn from(article: &Article) -> Self {
        let names = |files: &[FileRef]| -> Vec<String> {
            files.iter().map(|f| f.name.clone()).collect()
        };
        Self {
            ean: article.ean.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            brand: article.brand.clone(),
            shelf_life: article.shelf_life.clone(),
            product: ProductBlock {
                size_material: article.product_size_material.clone(),
                specs: article.product_specs.clone(),
            },
            package: PackageBlock {
                size_material: article.package_size_material.clone(),
                specs: article.package_specs.clone(),
                rts: article.rts_package_specs.clone(),
            },
            logistics: LogisticsBlock {
                first_supply_date: article.supply_date.clone(),
                weekly_volume: article.supply_volume.clone(),
            },
            attachments: AttachmentNames {
                certificates: names(&article.certificates),
                photos: names(&article.photos),
            },
        }
    }
}

/// What an integration sink receives for one queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPayload {
    pub article_id: ArticleId,
    pub destinations: Vec<Destination>,
    pub data: BTreeMap<Destination, ArticlePayload>,
}

impl IntegrationPayload {
    pub fn build(article: &Article, destinations: &[Destination]) -> Self {
        let body = ArticlePayload::from(article);
        Self {
            article_id: article.id.clone(),
            destinations: destinations.to_vec(),
            data: destinations
                .iter()
                .map(|destination| (*destination, body.clone()))
                .collect(),
        }
    }

    pub fn to_json(&self) -> WorkflowResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| WorkflowError::validation(format!("payload is not serialisable: {e}")))
    }
}

/// Downstream integration bus.
///
/// Implementations report failures as [`WorkflowError::Delivery`]; the
/// returned string on success is the confirmation stored on the item.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait::async_trait]
pub trait IntegrationSink: Send + Sync {
    async fn deliver(&self, payload: &IntegrationPayload) -> WorkflowResult<String>;
}

/// Active items plus the archive of terminal ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchQueue {
    active: Vec<QueueItem>,
    archive: Vec<QueueItem>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one item per article.
    ///
    /// Approval is checked by the caller. With `block_on_missing` set, any
    /// preflight gap rejects the whole batch.
    pub fn enqueue(
        &mut self,
        articles: &[&Article],
        destinations: &[Destination],
        block_on_missing: bool,
        at: DateTime<Utc>,
    ) -> WorkflowResult<Vec<QueueItem>> {
        if articles.is_empty() {
            return Err(WorkflowError::validation("no articles selected for integration"));
        }
        if destinations.is_empty() {
            return Err(WorkflowError::validation("no destinations selected"));
        }

        let mut unique: Vec<Destination> = Vec::with_capacity(destinations.len());
        for destination in destinations {
            if !unique.contains(destination) {
                unique.push(*destination);
            }
        }
        let destinations = unique;

        let items: Vec<QueueItem> = articles
            .iter()
            .map(|article| QueueItem {
                id: QueueItemId::generate(),
                article_id: article.id.clone(),
                destinations: destinations.clone(),
                status: QueueStatus::Queued,
                created_at: at,
                updated_at: at,
                message: None,
                warnings: preflight_all(article, &destinations),
            })
            .collect();

        if block_on_missing {
            if let Some(item) = items.iter().find(|item| !item.warnings.is_empty()) {
                return Err(WorkflowError::validation(format!(
                    "article {} is missing {}",
                    item.article_id,
                    item.warnings.join(", ")
                )));
            }
        }

        for item in &items {
            if !item.warnings.is_empty() {
                warn!(
                    queue_item_id = %item.id,
                    article_id = %item.article_id,
                    warnings = ?item.warnings,
                    "Enqueued with preflight gaps"
                );
            }
            info!(
                queue_item_id = %item.id,
                article_id = %item.article_id,
                "Article queued for integration"
            );
        }
        self.active.extend(items.iter().cloned());
        Ok(items)
    }

    pub fn get(&self, id: &QueueItemId) -> Option<&QueueItem> {
        self.active
            .iter()
            .chain(self.archive.iter())
            .find(|item| &item.id == id)
    }

    pub fn active(&self) -> &[QueueItem] {
        &self.active
    }

    pub fn archived(&self) -> &[QueueItem] {
        &self.archive
    }

    /// Step one status forward with the canonical message.
    pub fn advance(&mut self, id: &QueueItemId, at: DateTime<Utc>) -> WorkflowResult<QueueItem> {
        let index = self.active_index(id)?;
        let (status, message) = match self.active[index].status {
            QueueStatus::Queued => (QueueStatus::InProgress, SENT_MESSAGE),
            QueueStatus::InProgress => (QueueStatus::Completed, CONFIRMED_MESSAGE),
            // Terminal items never stay active.
            terminal => {
                return Err(WorkflowError::invalid_transition(
                    terminal,
                    "advance",
                    "item is terminal",
                ))
            }
        };
        Ok(self.set_status(index, status, message.to_string(), at))
    }

    pub fn fail(
        &mut self,
        id: &QueueItemId,
        message: &str,
        at: DateTime<Utc>,
    ) -> WorkflowResult<QueueItem> {
        let index = self.active_index(id)?;
        Ok(self.set_status(index, QueueStatus::Failed, message.to_string(), at))
    }

    /// Hand the payload to `sink`, bounded by `timeout`.
    ///
    /// A queued item is moved to in-progress first. The item ends
    /// `Completed` with the sink's confirmation or `Failed` with the error
    /// message; both outcomes are returned as `Ok`.
    pub async fn deliver(
        &mut self,
        id: &QueueItemId,
        payload: &IntegrationPayload,
        sink: &dyn IntegrationSink,
        timeout: Duration,
    ) -> WorkflowResult<QueueItem> {
        let index = self.active_index(id)?;
        if self.active[index].status == QueueStatus::Queued {
            self.set_status(index, QueueStatus::InProgress, SENT_MESSAGE.to_string(), Utc::now());
        }

        let outcome = match tokio::time::timeout(timeout, sink.deliver(payload)).await {
            Ok(Ok(confirmation)) => Ok(confirmation),
            Ok(Err(WorkflowError::Delivery { message, .. })) => Err(message),
            Ok(Err(other)) => Err(other.to_string()),
            Err(_) => Err(format!("Delivery timed out after {}s", timeout.as_secs())),
        };

        let (status, message) = match outcome {
            Ok(confirmation) => (QueueStatus::Completed, confirmation),
            Err(message) => {
                warn!(queue_item_id = %id, error = %message, "Integration delivery failed");
                (QueueStatus::Failed, message)
            }
        };
        Ok(self.set_status(index, status, message, Utc::now()))
    }

    /// Remove every item that refers to one of `article_ids`.
    pub fn purge_articles(&mut self, article_ids: &[ArticleId]) -> usize {
        let before = self.active.len() + self.archive.len();
        self.active.retain(|item| !article_ids.contains(&item.article_id));
        self.archive.retain(|item| !article_ids.contains(&item.article_id));
        before - self.active.len() - self.archive.len()
    }

    fn active_index(&self, id: &QueueItemId) -> WorkflowResult<usize> {
        if let Some(index) = self.active.iter().position(|item| &item.id == id) {
            return Ok(index);
        }
        match self.archive.iter().find(|item| &item.id == id) {
            Some(item) => Err(WorkflowError::invalid_transition(
                item.status,
                "update queue item",
                "item is terminal and archived",
            )),
            None => Err(WorkflowError::UnknownQueueItem(id.to_string())),
        }
    }

    fn set_status(
        &mut self,
        index: usize,
        status: QueueStatus,
        message: String,
        at: DateTime<Utc>,
    ) -> QueueItem {
        let item = &mut self.active[index];
        let from = item.status;
        item.status = status;
        item.message = Some(message);
        item.updated_at = at;
        info!(queue_item_id = %item.id, from = %from, to = %status, "Queue item updated");

        let snapshot = item.clone();
        if status.is_terminal() {
            let done = self.active.remove(index);
            self.archive.push(done);
        }
        snapshot
    }
}
