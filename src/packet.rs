// Request Packet State Machine
//
// A packet moves through manager review, supplier rework and cross-department
// approval as a unit. Every transition is validated against the full
// snapshot of its articles before anything is written, so a rejected action
// never leaves partial state behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::article::{Article, ArticleId, Completeness};
use crate::error::{WorkflowError, WorkflowResult};
use crate::rulebook::{CategoryRulebook, LookupPolicy, RequirementRule};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketId(pub String);

impl PacketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PacketId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketStatus {
    Submitted,
    UnderManagerReview,
    AwaitingSupplierInput,
    PendingCrossDeptApproval,
    Approved,
    ReturnedForRework,
}

impl PacketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PacketStatus::Approved)
    }
}

impl fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PacketStatus::Submitted => "Submitted",
            PacketStatus::UnderManagerReview => "UnderManagerReview",
            PacketStatus::AwaitingSupplierInput => "AwaitingSupplierInput",
            PacketStatus::PendingCrossDeptApproval => "PendingCrossDeptApproval",
            PacketStatus::Approved => "Approved",
            PacketStatus::ReturnedForRework => "ReturnedForRework",
        };
        write!(f, "{label}")
    }
}

/// Actions that drive the packet through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PacketAction {
    /// Manager picks up a freshly submitted packet
    StartReview,
    /// Manager sends the requirement checklist back to the supplier
    RequestSupplierInput,
    /// Supplier marks their additions complete
    SupplierComplete,
    SubmitForApproval,
    Approve,
    ReturnForRework,
    /// Manager re-submits after rework
    Resubmit,
}

impl PacketAction {
    pub const ALL: [PacketAction; 7] = [
        PacketAction::StartReview,
        PacketAction::RequestSupplierInput,
        PacketAction::SupplierComplete,
        PacketAction::SubmitForApproval,
        PacketAction::Approve,
        PacketAction::ReturnForRework,
        PacketAction::Resubmit,
    ];

    /// Party that performs the action; used to label transition comments.
    pub fn actor(self) -> &'static str {
        match self {
            PacketAction::SupplierComplete => "supplier",
            PacketAction::Approve | PacketAction::ReturnForRework => "cross-department",
            PacketAction::StartReview
            | PacketAction::RequestSupplierInput
            | PacketAction::SubmitForApproval
            | PacketAction::Resubmit => "manager",
        }
    }
}

impl fmt::Display for PacketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PacketAction::StartReview => "startReview",
            PacketAction::RequestSupplierInput => "requestSupplierInput",
            PacketAction::SupplierComplete => "supplierComplete",
            PacketAction::SubmitForApproval => "submitForApproval",
            PacketAction::Approve => "approve",
            PacketAction::ReturnForRework => "returnForRework",
            PacketAction::Resubmit => "resubmit",
        };
        write!(f, "{label}")
    }
}

/// Which open issues stop a packet from going to cross-department review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Only `block` issues owned by the manager
    #[default]
    ManagerBlocking,
    /// Any `block` issue, whoever owns it
    AnyBlocking,
}

impl GatePolicy {
    pub fn blocks(self, article: &Article) -> usize {
        article
            .issues
            .iter()
            .filter(|issue| match self {
                GatePolicy::ManagerBlocking => issue.blocks_manager(),
                GatePolicy::AnyBlocking => issue.is_blocking(),
            })
            .count()
    }
}

/// Department feedback or a comment attached to a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketComment {
    pub department: String,
    pub body: String,
    pub action: Option<PacketAction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PacketStatus,
    pub to: PacketStatus,
    pub action: PacketAction,
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

/// Everything a transition guard needs besides the packet itself
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub gate: GatePolicy,
    pub rulebook: &'a CategoryRulebook,
    pub lookup: LookupPolicy,
}

/// One line of the approver's overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCheck {
    pub article_id: ArticleId,
    pub title: String,
    pub ean: String,
    pub open_issues: usize,
    pub completeness: Completeness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketSummary {
    pub packet_id: PacketId,
    pub status: PacketStatus,
    /// Articles without open issues
    pub ready: usize,
    pub total: usize,
    pub articles: Vec<ArticleCheck>,
}

/// The unit of workflow: one supplier submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPacket {
    pub id: PacketId,
    pub supplier_id: String,
    pub manager: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: PacketStatus,
    /// Bumped on every committed mutation; used for optimistic concurrency
    pub version: u64,
    pub articles: Vec<Article>,
    pub comments: Vec<PacketComment>,
    pub history: Vec<TransitionRecord>,
}

/// Transition table. Guards are checked separately.
pub fn next_status(from: PacketStatus, action: PacketAction) -> Option<PacketStatus> {
    use PacketAction as A;
    use PacketStatus as S;

    match (from, action) {
        (S::Submitted, A::StartReview) => Some(S::UnderManagerReview),
        (S::UnderManagerReview, A::RequestSupplierInput) => Some(S::AwaitingSupplierInput),
        (S::AwaitingSupplierInput, A::SupplierComplete) => Some(S::UnderManagerReview),
        (S::UnderManagerReview, A::SubmitForApproval) => Some(S::PendingCrossDeptApproval),
        (S::PendingCrossDeptApproval, A::Approve) => Some(S::Approved),
        (S::PendingCrossDeptApproval, A::ReturnForRework) => Some(S::ReturnedForRework),
        (S::ReturnedForRework, A::Resubmit) => Some(S::UnderManagerReview),
        _ => None,
    }
}

fn non_blank(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .map(str::to_string)
}

impl RequestPacket {
    pub fn new(
        id: PacketId,
        supplier_id: impl Into<String>,
        manager: Option<String>,
        articles: Vec<Article>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            supplier_id: supplier_id.into(),
            manager,
            created_at,
            status: PacketStatus::Submitted,
            version: 0,
            articles,
            comments: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn article(&self, article_id: &ArticleId) -> Option<&Article> {
        self.articles.iter().find(|article| &article.id == article_id)
    }

    pub fn article_mut(&mut self, article_id: &ArticleId) -> WorkflowResult<&mut Article> {
        self.articles
            .iter_mut()
            .find(|article| &article.id == article_id)
            .ok_or_else(|| WorkflowError::UnknownArticle(article_id.to_string()))
    }

    pub fn is_approved(&self) -> bool {
        self.status == PacketStatus::Approved
    }

    /// Articles of an approved packet are frozen.
    pub fn ensure_editable(&self, operation: &str) -> WorkflowResult<()> {
        if self.status.is_terminal() {
            return Err(WorkflowError::invalid_transition(
                self.status,
                operation,
                "packet is approved and its articles are frozen",
            ));
        }
        Ok(())
    }

    /// Number of open issues that stop the packet under `policy`
    pub fn blocking_issues(&self, policy: GatePolicy) -> usize {
        self.articles.iter().map(|article| policy.blocks(article)).sum()
    }

    /// Articles with no open issues
    pub fn ready_count(&self) -> usize {
        self.articles
            .iter()
            .filter(|article| article.issues.is_empty())
            .count()
    }

    pub fn summary(&self) -> PacketSummary {
        PacketSummary {
            packet_id: self.id.clone(),
            status: self.status,
            ready: self.ready_count(),
            total: self.articles.len(),
            articles: self
                .articles
                .iter()
                .map(|article| ArticleCheck {
                    article_id: article.id.clone(),
                    title: article.title.clone(),
                    ean: article.ean.clone(),
                    open_issues: article.issues.len(),
                    completeness: article.completeness(),
                })
                .collect(),
        }
    }

    pub fn add_comment(
        &mut self,
        department: &str,
        body: &str,
        action: Option<PacketAction>,
        at: DateTime<Utc>,
    ) -> WorkflowResult<&PacketComment> {
        let body = non_blank(Some(body))
            .ok_or_else(|| WorkflowError::validation("comment must not be blank"))?;
        self.comments.push(PacketComment {
            department: department.to_string(),
            body,
            action,
            created_at: at,
        });
        Ok(&self.comments[self.comments.len() - 1])
    }

    /// Apply a workflow action.
    ///
    /// On any error the packet is left untouched.
    pub fn transition(
        &mut self,
        action: PacketAction,
        comment: Option<&str>,
        ctx: &TransitionContext<'_>,
        at: DateTime<Utc>,
    ) -> WorkflowResult<TransitionRecord> {
        let from = self.status;
        let to = next_status(from, action).ok_or_else(|| {
            WorkflowError::invalid_transition(from, action, "not permitted by the workflow")
        })?;
        let comment = non_blank(comment);

        match action {
            PacketAction::SubmitForApproval | PacketAction::Approve => {
                // Approve checks the gate again: issues may have been raised
                // after submission. Every policy covers manager-owned blocks.
                let blocking = self.blocking_issues(ctx.gate);
                if blocking > 0 {
                    return Err(WorkflowError::invalid_transition(
                        from,
                        action,
                        format!("{blocking} blocking issue(s) still open"),
                    ));
                }
            }
            PacketAction::ReturnForRework if comment.is_none() => {
                return Err(WorkflowError::validation(
                    "returning a packet for rework requires a comment",
                ));
            }
            _ => {}
        }

        if action == PacketAction::SupplierComplete {
            // Resolve every rule before touching any article.
            let rules = self
                .articles
                .iter()
                .map(|article| {
                    ctx.rulebook
                        .rule_for(&article.category, &article.requirement_extras, ctx.lookup)
                })
                .collect::<WorkflowResult<Vec<RequirementRule>>>()?;
            for (article, rule) in self.articles.iter_mut().zip(rules.iter()) {
                article.recompute_issues(rule);
            }
        }

        if let Some(body) = comment.as_deref() {
            self.comments.push(PacketComment {
                department: action.actor().to_string(),
                body: body.to_string(),
                action: Some(action),
                created_at: at,
            });
        }

        let record = TransitionRecord {
            from,
            to,
            action,
            comment,
            at,
        };
        self.status = to;
        self.history.push(record.clone());

        info!(
            packet_id = %self.id,
            from = %from,
            to = %to,
            action = %action,
            "Packet transitioned"
        );
        Ok(record)
    }
}
