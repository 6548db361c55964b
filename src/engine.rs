//! Workflow engine facade.
//!
//! Owns every packet, the rulebook and the dispatch queue. Packet-mutating
//! calls work on a clone of the packet and commit it only when the whole
//! operation succeeds; the packet version is bumped on each commit and can
//! be checked by callers for optimistic concurrency. Committed changes are
//! recorded as [`WorkflowEvent`]s in an outbox for notification delivery.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::article::{
    Article, ArticleId, ArticlePatch, CategoryAssignment, Issue, IssueId, Owner, Severity,
};
use crate::config::OnboardingConfig;
use crate::dispatch::{
    self, Destination, DispatchQueue, IntegrationPayload, IntegrationSink, QueueItem, QueueItemId,
    QueueStatus,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::evaluator::Evaluation;
use crate::fields::FieldId;
use crate::observability::WorkflowMetrics;
use crate::packet::{
    PacketAction, PacketComment, PacketId, PacketStatus, PacketSummary, RequestPacket,
    TransitionContext,
};
use crate::rulebook::{CategoryRulebook, RequirementRule};
use crate::telemetry::{create_packet_span, generate_correlation_id};
use crate::time_operation;

/// Committed change, queued for notification delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    PacketCreated {
        packet_id: PacketId,
        supplier_id: String,
    },
    PacketTransitioned {
        packet_id: PacketId,
        from: PacketStatus,
        to: PacketStatus,
        action: PacketAction,
        comment: Option<String>,
    },
    FeedbackAdded {
        packet_id: PacketId,
        department: String,
    },
    IssuesChanged {
        packet_id: PacketId,
        article_id: ArticleId,
        open: usize,
    },
    ArticlesQueued {
        queue_item_ids: Vec<QueueItemId>,
    },
    QueueItemUpdated {
        queue_item_id: QueueItemId,
        status: QueueStatus,
        message: Option<String>,
    },
    PacketDeleted {
        packet_id: PacketId,
    },
}

/// Search over packets; empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketFilter {
    /// Case-insensitive substring of packet id, supplier, article title or EAN
    pub query: Option<String>,
    pub status: Option<PacketStatus>,
}

impl PacketFilter {
    pub fn matches(&self, packet: &RequestPacket) -> bool {
        if let Some(status) = self.status {
            if packet.status != status {
                return false;
            }
        }
        let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let needle = query.to_lowercase();
        let hit = |value: &str| value.to_lowercase().contains(&needle);

        hit(packet.id.as_str())
            || hit(&packet.supplier_id)
            || packet
                .articles
                .iter()
                .any(|article| hit(&article.title) || hit(&article.ean))
    }
}

pub struct WorkflowEngine {
    config: OnboardingConfig,
    rulebook: CategoryRulebook,
    packets: BTreeMap<PacketId, RequestPacket>,
    article_index: HashMap<ArticleId, PacketId>,
    queue: DispatchQueue,
    outbox: Vec<WorkflowEvent>,
    metrics: Arc<WorkflowMetrics>,
    next_sequence: u32,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(OnboardingConfig::default())
    }
}

impl WorkflowEngine {
    pub fn new(config: OnboardingConfig) -> Self {
        let rulebook = config.rules.build_rulebook();
        Self {
            config,
            rulebook,
            packets: BTreeMap::new(),
            article_index: HashMap::new(),
            queue: DispatchQueue::new(),
            outbox: Vec::new(),
            metrics: Arc::new(WorkflowMetrics::new()),
            next_sequence: 1,
        }
    }

    pub fn with_rulebook(mut self, rulebook: CategoryRulebook) -> Self {
        self.rulebook = rulebook;
        self
    }

    /// Share counters with another owner, e.g. a metrics exporter
    pub fn with_metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    pub fn rulebook(&self) -> &CategoryRulebook {
        &self.rulebook
    }

    pub fn metrics(&self) -> Arc<WorkflowMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Take every event committed since the last drain.
    pub fn drain_events(&mut self) -> Vec<WorkflowEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ---- packets ------------------------------------------------------

    pub fn create_packet(
        &mut self,
        supplier_id: &str,
        manager: Option<&str>,
        articles: Vec<Article>,
    ) -> WorkflowResult<PacketId> {
        time_operation!("create_packet");

        let supplier_id = supplier_id.trim();
        if supplier_id.is_empty() {
            let err = WorkflowError::validation("supplier id must not be blank");
            return Err(self.reject(None, "create_packet", err));
        }
        if articles.is_empty() {
            let err = WorkflowError::validation("a packet needs at least one article");
            return Err(self.reject(None, "create_packet", err));
        }

        let mut seen = BTreeSet::new();
        for article in &articles {
            if article.id.as_str().trim().is_empty() {
                let err = WorkflowError::validation("article id must not be blank");
                return Err(self.reject(None, "create_packet", err));
            }
            if !seen.insert(article.id.clone()) || self.article_index.contains_key(&article.id) {
                let err = WorkflowError::validation(format!("duplicate article id {}", article.id));
                return Err(self.reject(None, "create_packet", err));
            }
            let gaps = article.submission_gaps();
            if !gaps.is_empty() {
                let names: Vec<&str> = gaps.iter().map(|field| field.as_str()).collect();
                let err = WorkflowError::validation(format!(
                    "article {} is missing {}",
                    article.id,
                    names.join(", ")
                ));
                return Err(self.reject(None, "create_packet", err));
            }
        }

        let now = Utc::now();
        let packet_id = PacketId(format!(
            "{}-{}-{:04}",
            self.config.rules.packet_id_prefix,
            now.year(),
            self.next_sequence
        ));
        self.next_sequence += 1;

        for article in &articles {
            self.article_index.insert(article.id.clone(), packet_id.clone());
        }
        let packet = RequestPacket::new(
            packet_id.clone(),
            supplier_id,
            manager.map(str::to_string),
            articles,
            now,
        );
        info!(
            packet_id = %packet_id,
            supplier_id = %supplier_id,
            articles = packet.articles.len(),
            "Packet created"
        );
        self.packets.insert(packet_id.clone(), packet);
        self.metrics.record_packet_created();
        self.outbox.push(WorkflowEvent::PacketCreated {
            packet_id: packet_id.clone(),
            supplier_id: supplier_id.to_string(),
        });
        Ok(packet_id)
    }

    pub fn packet(&self, packet_id: &PacketId) -> Option<&RequestPacket> {
        self.packets.get(packet_id)
    }

    pub fn packets(&self) -> impl Iterator<Item = &RequestPacket> {
        self.packets.values()
    }

    pub fn search_packets(&self, filter: &PacketFilter) -> Vec<&RequestPacket> {
        self.packets
            .values()
            .filter(|packet| filter.matches(packet))
            .collect()
    }

    /// Remove a packet with its articles, their issues and any queue items
    /// that refer to them.
    pub fn delete_packet(&mut self, packet_id: &PacketId) -> WorkflowResult<RequestPacket> {
        let packet = self
            .packets
            .remove(packet_id)
            .ok_or_else(|| WorkflowError::UnknownPacket(packet_id.to_string()))?;

        let article_ids: Vec<ArticleId> = packet.articles.iter().map(|a| a.id.clone()).collect();
        for article_id in &article_ids {
            self.article_index.remove(article_id);
        }
        let purged = self.queue.purge_articles(&article_ids);

        info!(packet_id = %packet_id, purged_queue_items = purged, "Packet deleted");
        self.outbox.push(WorkflowEvent::PacketDeleted {
            packet_id: packet_id.clone(),
        });
        Ok(packet)
    }

    pub fn transition_packet(
        &mut self,
        packet_id: &PacketId,
        action: PacketAction,
        comment: Option<&str>,
        expected_version: Option<u64>,
    ) -> WorkflowResult<RequestPacket> {
        let correlation_id = generate_correlation_id();
        let _span =
            create_packet_span("transition_packet", Some(packet_id.as_str()), &correlation_id)
                .entered();
        time_operation!("transition_packet");

        let gate = self.config.rules.gate_policy;
        let lookup = self.config.rules.lookup_policy();
        let record = self.mutate_packet(
            packet_id,
            expected_version,
            "transition_packet",
            |packet, rulebook| {
                let ctx = TransitionContext {
                    gate,
                    rulebook,
                    lookup,
                };
                packet.transition(action, comment, &ctx, Utc::now())
            },
        )?;

        self.metrics.record_transition();
        if record.action == PacketAction::SupplierComplete {
            self.push_issue_events(packet_id);
        }
        self.outbox.push(WorkflowEvent::PacketTransitioned {
            packet_id: packet_id.clone(),
            from: record.from,
            to: record.to,
            action: record.action,
            comment: record.comment,
        });
        self.packet_snapshot(packet_id)
    }

    /// Approver's overview: ready count and per-article completeness.
    pub fn packet_summary(&self, packet_id: &PacketId) -> WorkflowResult<PacketSummary> {
        self.packets
            .get(packet_id)
            .map(RequestPacket::summary)
            .ok_or_else(|| WorkflowError::UnknownPacket(packet_id.to_string()))
    }

    pub fn add_feedback(
        &mut self,
        packet_id: &PacketId,
        department: &str,
        body: &str,
        expected_version: Option<u64>,
    ) -> WorkflowResult<PacketComment> {
        let department = department.trim();
        if department.is_empty() {
            let err = WorkflowError::validation("department must not be blank");
            return Err(self.reject(Some(packet_id), "add_feedback", err));
        }
        let comment = self.mutate_packet(packet_id, expected_version, "add_feedback", |packet, _| {
            packet
                .add_comment(department, body, None, Utc::now())
                .map(Clone::clone)
        })?;
        self.outbox.push(WorkflowEvent::FeedbackAdded {
            packet_id: packet_id.clone(),
            department: department.to_string(),
        });
        Ok(comment)
    }

    // ---- articles -----------------------------------------------------

    pub fn article(&self, article_id: &ArticleId) -> WorkflowResult<&Article> {
        let packet = self.packet_of(article_id)?;
        packet
            .article(article_id)
            .ok_or_else(|| WorkflowError::UnknownArticle(article_id.to_string()))
    }

    pub fn patch_article(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        patch: ArticlePatch,
        expected_version: Option<u64>,
    ) -> WorkflowResult<Article> {
        if patch.is_empty() {
            let err = WorkflowError::validation("patch has no fields");
            return Err(self.reject(Some(packet_id), "patch_article", err));
        }
        let touched = patch.touched_fields();
        let article = self.mutate_packet(packet_id, expected_version, "patch_article", |packet, _| {
            packet.ensure_editable("patchArticle")?;
            let article = packet.article_mut(article_id)?;
            article.apply_patch(patch);
            Ok(article.clone())
        })?;
        info!(
            packet_id = %packet_id,
            article_id = %article_id,
            fields = ?touched,
            "Article patched"
        );
        Ok(article)
    }

    /// Replace the manager's extra requirements for an article.
    ///
    /// `extras` may name checklist presets (`msds`, `photos_multi`, ...) or
    /// field ids.
    pub fn set_requirement_extras<S: AsRef<str>>(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        extras: &[S],
        expected_version: Option<u64>,
    ) -> WorkflowResult<RequirementRule> {
        let fields = match FieldId::parse_extras(extras) {
            Ok(fields) => fields,
            Err(err) => return Err(self.reject(Some(packet_id), "set_requirement_extras", err)),
        };
        let lookup = self.config.rules.lookup_policy();
        let rule = self.mutate_packet(
            packet_id,
            expected_version,
            "set_requirement_extras",
            |packet, rulebook| {
                packet.ensure_editable("setRequirementExtras")?;
                let article = packet.article_mut(article_id)?;
                article.requirement_extras = fields.into_iter().collect();
                article.enriched_by_manager = true;
                rulebook.rule_for(&article.category, &article.requirement_extras, lookup)
            },
        )?;
        info!(
            packet_id = %packet_id,
            article_id = %article_id,
            extras = ?rule.extra,
            "Requirement extras updated"
        );
        Ok(rule)
    }

    pub fn assign_category(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        assignment: CategoryAssignment,
        expected_version: Option<u64>,
    ) -> WorkflowResult<RequirementRule> {
        let lookup = self.config.rules.lookup_policy();
        let rule = self.mutate_packet(
            packet_id,
            expected_version,
            "assign_category",
            |packet, rulebook| {
                packet.ensure_editable("assignCategory")?;
                rulebook.validate_assignment(&assignment)?;
                let article = packet.article_mut(article_id)?;
                article.category = assignment;
                article.enriched_by_manager = true;
                rulebook.rule_for(&article.category, &article.requirement_extras, lookup)
            },
        )?;
        info!(packet_id = %packet_id, article_id = %article_id, "Category assigned");
        Ok(rule)
    }

    /// Effective rule set of an article: category base plus extras.
    pub fn requirements_for(&self, article_id: &ArticleId) -> WorkflowResult<RequirementRule> {
        let article = self.article(article_id)?;
        self.rulebook.rule_for(
            &article.category,
            &article.requirement_extras,
            self.config.rules.lookup_policy(),
        )
    }

    // ---- issues -------------------------------------------------------

    pub fn list_issues(&self, article_id: &ArticleId) -> WorkflowResult<Vec<Issue>> {
        Ok(self.article(article_id)?.issues.clone())
    }

    pub fn recompute_issues(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        expected_version: Option<u64>,
    ) -> WorkflowResult<Evaluation> {
        let lookup = self.config.rules.lookup_policy();
        let evaluation = self.mutate_packet(
            packet_id,
            expected_version,
            "recompute_issues",
            |packet, rulebook| {
                packet.ensure_editable("recomputeIssues")?;
                let article = packet.article_mut(article_id)?;
                let rule =
                    rulebook.rule_for(&article.category, &article.requirement_extras, lookup)?;
                Ok(article.recompute_issues(&rule))
            },
        )?;
        self.push_issues_changed(packet_id, article_id);
        Ok(evaluation)
    }

    pub fn resolve_issue(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        issue_id: &IssueId,
        expected_version: Option<u64>,
    ) -> WorkflowResult<Issue> {
        let issue = self.mutate_packet(packet_id, expected_version, "resolve_issue", |packet, _| {
            packet.ensure_editable("resolveIssue")?;
            packet.article_mut(article_id)?.resolve_issue(issue_id)
        })?;
        info!(
            packet_id = %packet_id,
            article_id = %article_id,
            issue_id = %issue_id,
            field = %issue.field,
            "Issue resolved"
        );
        self.push_issues_changed(packet_id, article_id);
        Ok(issue)
    }

    pub fn reassign_issue(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        issue_id: &IssueId,
        owner: Owner,
        expected_version: Option<u64>,
    ) -> WorkflowResult<Issue> {
        let issue = self.mutate_packet(packet_id, expected_version, "reassign_issue", |packet, _| {
            packet.ensure_editable("reassignIssue")?;
            packet
                .article_mut(article_id)?
                .reassign_issue(issue_id, owner)
                .map(Clone::clone)
        })?;
        info!(packet_id = %packet_id, issue_id = %issue_id, owner = %owner, "Issue reassigned");
        self.push_issues_changed(packet_id, article_id);
        Ok(issue)
    }

    pub fn set_issue_severity(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        issue_id: &IssueId,
        severity: Severity,
        expected_version: Option<u64>,
    ) -> WorkflowResult<Issue> {
        let issue = self.mutate_packet(
            packet_id,
            expected_version,
            "set_issue_severity",
            |packet, _| {
                packet.ensure_editable("setIssueSeverity")?;
                packet
                    .article_mut(article_id)?
                    .set_issue_severity(issue_id, severity)
                    .map(Clone::clone)
            },
        )?;
        info!(
            packet_id = %packet_id,
            issue_id = %issue_id,
            severity = %severity,
            "Issue severity changed"
        );
        self.push_issues_changed(packet_id, article_id);
        Ok(issue)
    }

    /// Reviewer-raised issue; its field becomes an extra requirement.
    #[allow(clippy::too_many_arguments)]
    pub fn raise_issue(
        &mut self,
        packet_id: &PacketId,
        article_id: &ArticleId,
        field: FieldId,
        label: &str,
        severity: Severity,
        owner: Owner,
        expected_version: Option<u64>,
    ) -> WorkflowResult<Issue> {
        let label = label.trim();
        let label = if label.is_empty() { field.label() } else { label };
        let issue = self.mutate_packet(packet_id, expected_version, "raise_issue", |packet, _| {
            packet.ensure_editable("raiseIssue")?;
            let article = packet.article_mut(article_id)?;
            article.enriched_by_manager = true;
            Ok(article.raise_issue(field, label, severity, owner).clone())
        })?;
        info!(
            packet_id = %packet_id,
            article_id = %article_id,
            field = %field,
            severity = %severity,
            owner = %owner,
            "Issue raised"
        );
        self.push_issues_changed(packet_id, article_id);
        Ok(issue)
    }

    // ---- dispatch -----------------------------------------------------

    pub fn preflight(
        &self,
        article_id: &ArticleId,
        destinations: &[Destination],
    ) -> WorkflowResult<Vec<String>> {
        Ok(dispatch::preflight_all(self.article(article_id)?, destinations))
    }

    /// Queue approved articles for delivery. Either every article is
    /// queued or none is.
    pub fn enqueue_for_integration(
        &mut self,
        article_ids: &[ArticleId],
        destinations: &[Destination],
    ) -> WorkflowResult<Vec<QueueItem>> {
        time_operation!("enqueue_for_integration");

        let mut articles = Vec::with_capacity(article_ids.len());
        let mut seen = BTreeSet::new();
        for article_id in article_ids {
            if !seen.insert(article_id) {
                let err = WorkflowError::validation(format!("article {article_id} selected twice"));
                return Err(self.reject(None, "enqueue_for_integration", err));
            }
            let packet = match self.packet_of(article_id) {
                Ok(packet) => packet,
                Err(err) => return Err(self.reject(None, "enqueue_for_integration", err)),
            };
            if !packet.is_approved() {
                let err = WorkflowError::NotApproved {
                    article_id: article_id.to_string(),
                    status: packet.status.to_string(),
                };
                return Err(self.reject(Some(&packet.id.clone()), "enqueue_for_integration", err));
            }
            match packet.article(article_id) {
                Some(article) => articles.push(article.clone()),
                None => return Err(WorkflowError::UnknownArticle(article_id.to_string())),
            }
        }

        let block = self.config.dispatch.block_on_missing_fields;
        let selected: Vec<&Article> = articles.iter().collect();
        let items = self.queue.enqueue(&selected, destinations, block, Utc::now());
        let items = match items {
            Ok(items) => items,
            Err(err) => return Err(self.reject(None, "enqueue_for_integration", err)),
        };

        self.metrics.record_enqueued(items.len());
        self.outbox.push(WorkflowEvent::ArticlesQueued {
            queue_item_ids: items.iter().map(|item| item.id.clone()).collect(),
        });
        Ok(items)
    }

    pub fn advance_queue_item(
        &mut self,
        queue_item_id: &QueueItemId,
    ) -> WorkflowResult<QueueItem> {
        let result = self.queue.advance(queue_item_id, Utc::now());
        self.finish_queue_update(result)
    }

    pub fn fail_queue_item(
        &mut self,
        queue_item_id: &QueueItemId,
        message: &str,
    ) -> WorkflowResult<QueueItem> {
        let message = message.trim();
        if message.is_empty() {
            let err = WorkflowError::validation("failure message must not be blank");
            return Err(self.reject(None, "fail_queue_item", err));
        }
        let result = self.queue.fail(queue_item_id, message, Utc::now());
        self.finish_queue_update(result)
    }

    /// Send a queue item's payload to `sink`, bounded by the configured
    /// delivery timeout.
    pub async fn deliver_queue_item(
        &mut self,
        queue_item_id: &QueueItemId,
        sink: &dyn IntegrationSink,
    ) -> WorkflowResult<QueueItem> {
        let item = self
            .queue
            .get(queue_item_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownQueueItem(queue_item_id.to_string()))?;
        let payload =
            IntegrationPayload::build(self.article(&item.article_id)?, &item.destinations);
        let timeout = self.config.dispatch.delivery_timeout();

        let result = self.queue.deliver(queue_item_id, &payload, sink, timeout).await;
        self.finish_queue_update(result)
    }

    // ---- internals ----------------------------------------------------

    /// Run `operation` against a clone of the packet and commit on success.
    fn mutate_packet<T>(
        &mut self,
        packet_id: &PacketId,
        expected_version: Option<u64>,
        operation: &'static str,
        apply: impl FnOnce(&mut RequestPacket, &CategoryRulebook) -> WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        let mut draft = match self.packets.get(packet_id) {
            Some(packet) => packet.clone(),
            None => {
                let err = WorkflowError::UnknownPacket(packet_id.to_string());
                return Err(self.reject(None, operation, err));
            }
        };

        if let Some(expected) = expected_version {
            if expected != draft.version {
                let err = WorkflowError::StaleWrite {
                    packet_id: packet_id.to_string(),
                    expected,
                    actual: draft.version,
                };
                return Err(self.reject(Some(packet_id), operation, err));
            }
        }

        match apply(&mut draft, &self.rulebook) {
            Ok(value) => {
                draft.version += 1;
                self.packets.insert(packet_id.clone(), draft);
                Ok(value)
            }
            Err(err) => Err(self.reject(Some(packet_id), operation, err)),
        }
    }

    fn reject(
        &self,
        packet_id: Option<&PacketId>,
        operation: &str,
        err: WorkflowError,
    ) -> WorkflowError {
        self.metrics.record_rejection();
        warn!(
            packet_id = packet_id.map(|id| id.as_str()),
            operation = operation,
            error_kind = err.kind(),
            error = %err,
            "Operation rejected"
        );
        err
    }

    fn packet_of(&self, article_id: &ArticleId) -> WorkflowResult<&RequestPacket> {
        self.article_index
            .get(article_id)
            .and_then(|packet_id| self.packets.get(packet_id))
            .ok_or_else(|| WorkflowError::UnknownArticle(article_id.to_string()))
    }

    fn packet_snapshot(&self, packet_id: &PacketId) -> WorkflowResult<RequestPacket> {
        self.packets
            .get(packet_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownPacket(packet_id.to_string()))
    }

    fn push_issues_changed(&mut self, packet_id: &PacketId, article_id: &ArticleId) {
        let open = self
            .packets
            .get(packet_id)
            .and_then(|packet| packet.article(article_id))
            .map_or(0, |article| article.issues.len());
        self.outbox.push(WorkflowEvent::IssuesChanged {
            packet_id: packet_id.clone(),
            article_id: article_id.clone(),
            open,
        });
    }

    fn push_issue_events(&mut self, packet_id: &PacketId) {
        let article_ids: Vec<ArticleId> = match self.packets.get(packet_id) {
            Some(packet) => packet.articles.iter().map(|a| a.id.clone()).collect(),
            None => return,
        };
        for article_id in &article_ids {
            self.push_issues_changed(packet_id, article_id);
        }
    }

    fn finish_queue_update(
        &mut self,
        result: WorkflowResult<QueueItem>,
    ) -> WorkflowResult<QueueItem> {
        let item = match result {
            Ok(item) => item,
            Err(err) => return Err(self.reject(None, "update_queue_item", err)),
        };
        match item.status {
            QueueStatus::Completed => self.metrics.record_completed(),
            QueueStatus::Failed => self.metrics.record_failed(),
            QueueStatus::Queued | QueueStatus::InProgress => {}
        }
        self.outbox.push(WorkflowEvent::QueueItemUpdated {
            queue_item_id: item.id.clone(),
            status: item.status,
            message: item.message.clone(),
        });
        Ok(item)
    }
}
