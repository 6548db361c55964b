// Product Onboarding Library - supplier request workflow engine
// This exposes the core components for testing and integration

pub mod article;
pub mod comparison;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod fields;
pub mod observability;
pub mod packet;
pub mod rulebook;
pub mod telemetry;

// Re-export key types for easy access
pub use article::{
    Article, ArticleId, ArticlePatch, CategoryAssignment, Completeness, FileRef, Issue, IssueId,
    Owner, Severity,
};
pub use comparison::{
    rank, ComparisonRow, CompetitorOffer, CurrentOffer, SortDirection, SortKey, SortState,
};
pub use crate::config::{config, init_config, OnboardingConfig};
pub use dispatch::{
    preflight, Destination, DispatchQueue, IntegrationPayload, IntegrationSink, QueueItem,
    QueueItemId, QueueStatus,
};
pub use engine::{PacketFilter, WorkflowEngine, WorkflowEvent};
pub use error::{WorkflowError, WorkflowResult};
pub use evaluator::{evaluate, Evaluation};
pub use fields::{DocumentKind, ExtraPreset, FieldId};
pub use observability::{OperationTimer, WorkflowMetrics, WorkflowStats};
pub use packet::{
    ArticleCheck, GatePolicy, PacketAction, PacketId, PacketStatus, PacketSummary, RequestPacket,
};
pub use rulebook::{CategoryRulebook, LookupPolicy, RequirementRule};
pub use telemetry::{generate_correlation_id, init_telemetry};

#[cfg(any(test, feature = "testing"))]
pub use dispatch::MockIntegrationSink;
