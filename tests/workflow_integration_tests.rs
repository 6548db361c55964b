//! Integration tests for the packet workflow
//!
//! These drive the engine end to end: creation, manager enrichment, the
//! supplier loop, cross-department review, and integration dispatch.

use std::sync::Mutex;
use std::time::Duration;

use product_onboarding::config::{DispatchConfig, RulesConfig};
use product_onboarding::{
    Article, ArticleId, ArticlePatch, CategoryAssignment, Completeness, Destination, FieldId,
    FileRef, GatePolicy, IntegrationPayload, IntegrationSink, OnboardingConfig, Owner,
    PacketAction, PacketId, PacketStatus, QueueStatus, Severity, WorkflowEngine, WorkflowError,
    WorkflowEvent, WorkflowResult,
};

fn strict_config() -> OnboardingConfig {
    OnboardingConfig {
        rules: RulesConfig {
            strict_categories: true,
            ..RulesConfig::default()
        },
        ..OnboardingConfig::default()
    }
}

fn oat_cookies() -> Article {
    let mut article = Article::new("a1", "4820000123456", "Oat cookies 90 g")
        .with_description("Crunchy oat cookies with raisins")
        .with_supplier_category("Cookies");
    article.brand = "Sweeto".to_string();
    article.shelf_life = "9 months".to_string();
    article.product_size_material = "90 g, flow-pack".to_string();
    article
}

fn milk_chocolate() -> Article {
    let mut article = Article::new("a2", "4820000765432", "Milk chocolate 85 g")
        .with_description("Milk chocolate bar, 30% cocoa")
        .with_supplier_category("Confectionery");
    article.brand = "Lemur".to_string();
    article.product_size_material = "85g".to_string();
    article
}

fn new_packet(engine: &mut WorkflowEngine) -> PacketId {
    engine
        .create_packet("Supplier LTD", Some("O. Koval"), vec![oat_cookies(), milk_chocolate()])
        .unwrap()
}

fn act(
    engine: &mut WorkflowEngine,
    packet_id: &PacketId,
    action: PacketAction,
) -> WorkflowResult<PacketStatus> {
    engine
        .transition_packet(packet_id, action, None, None)
        .map(|packet| packet.status)
}

fn issue_fields(engine: &WorkflowEngine, article_id: &ArticleId) -> Vec<FieldId> {
    engine
        .list_issues(article_id)
        .unwrap()
        .iter()
        .map(|issue| issue.field)
        .collect()
}

/// Sink that records payloads and answers with a fixed confirmation
struct RecordingSink {
    delivered: Mutex<Vec<IntegrationPayload>>,
}

#[async_trait::async_trait]
impl IntegrationSink for RecordingSink {
    async fn deliver(&self, payload: &IntegrationPayload) -> WorkflowResult<String> {
        self.delivered.lock().unwrap().push(payload.clone());
        Ok("Accepted by bus".to_string())
    }
}

struct HangingSink;

#[async_trait::async_trait]
impl IntegrationSink for HangingSink {
    async fn deliver(&self, _payload: &IntegrationPayload) -> WorkflowResult<String> {
        tokio::time::sleep(Duration::from_secs(86_400)).await;
        Ok("never".to_string())
    }
}

#[test]
fn test_full_onboarding_flow() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    let cookies = ArticleId::from("a1");
    let chocolate = ArticleId::from("a2");

    assert_eq!(
        act(&mut engine, &packet_id, PacketAction::StartReview),
        Ok(PacketStatus::UnderManagerReview)
    );

    // Manager enrichment
    engine
        .assign_category(&packet_id, &cookies, CategoryAssignment::new("bakery", "cookies"), None)
        .unwrap();
    engine
        .assign_category(
            &packet_id,
            &chocolate,
            CategoryAssignment::new("confection", "chocolate"),
            None,
        )
        .unwrap();
    engine
        .set_requirement_extras(&packet_id, &chocolate, &["photos"], None)
        .unwrap();

    assert_eq!(
        act(&mut engine, &packet_id, PacketAction::RequestSupplierInput),
        Ok(PacketStatus::AwaitingSupplierInput)
    );
    assert_eq!(
        act(&mut engine, &packet_id, PacketAction::SupplierComplete),
        Ok(PacketStatus::UnderManagerReview)
    );

    let cookie_issues = issue_fields(&engine, &cookies);
    assert_eq!(cookie_issues, vec![FieldId::PackageSizeMaterial, FieldId::Certificates]);
    let chocolate_issues = issue_fields(&engine, &chocolate);
    assert_eq!(
        chocolate_issues,
        vec![FieldId::ShelfLife, FieldId::PackageSizeMaterial, FieldId::Photos]
    );

    // Supplier fills the gaps during a second round
    act(&mut engine, &packet_id, PacketAction::RequestSupplierInput).unwrap();
    engine
        .patch_article(
            &packet_id,
            &cookies,
            ArticlePatch {
                package_size_material: Some("Cardboard box 20x10x5".to_string()),
                certificates: Some(vec![FileRef::new("c1", "haccp.pdf")]),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    engine
        .patch_article(
            &packet_id,
            &chocolate,
            ArticlePatch {
                shelf_life: Some("12 months".to_string()),
                package_size_material: Some("Foil + cardboard".to_string()),
                photos: Some(vec![FileRef::new("p1", "front.jpg")]),
                product_specs: Some("Cocoa 30%".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    act(&mut engine, &packet_id, PacketAction::SupplierComplete).unwrap();
    assert!(engine.list_issues(&cookies).unwrap().is_empty());
    assert!(engine.list_issues(&chocolate).unwrap().is_empty());

    // Cross-department review with one rework round
    act(&mut engine, &packet_id, PacketAction::SubmitForApproval).unwrap();
    engine
        .transition_packet(
            &packet_id,
            PacketAction::ReturnForRework,
            Some("Specify RTS corrugation"),
            None,
        )
        .unwrap();
    act(&mut engine, &packet_id, PacketAction::Resubmit).unwrap();
    act(&mut engine, &packet_id, PacketAction::SubmitForApproval).unwrap();
    let approved = engine
        .transition_packet(&packet_id, PacketAction::Approve, Some("Logistics OK"), None)
        .unwrap();
    assert_eq!(approved.status, PacketStatus::Approved);
    assert_eq!(approved.history.len(), 10);
    assert_eq!(approved.comments.len(), 2);

    // Dispatch
    let items = engine
        .enqueue_for_integration(&[chocolate.clone()], &[Destination::Pim, Destination::Erp])
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].warnings, vec!["ERP: supplyDate", "ERP: supplyVolume"]);

    let item = engine.advance_queue_item(&items[0].id).unwrap();
    assert_eq!(item.status, QueueStatus::InProgress);
    let item = engine.advance_queue_item(&items[0].id).unwrap();
    assert_eq!(item.status, QueueStatus::Completed);
    assert_eq!(engine.queue().archived().len(), 1);

    let stats = engine.metrics().get_stats();
    assert_eq!(stats.transitions, 10);
    assert_eq!(stats.items_enqueued, 1);
    assert_eq!(stats.items_completed, 1);
}

#[test]
fn test_manager_blocking_issue_holds_the_gate() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    let chocolate = ArticleId::from("a2");
    act(&mut engine, &packet_id, PacketAction::StartReview).unwrap();

    let issue = engine
        .raise_issue(
            &packet_id,
            &chocolate,
            FieldId::RtsPackageSpecs,
            "Describe the RTS package",
            Severity::Block,
            Owner::Manager,
            None,
        )
        .unwrap();

    let err = act(&mut engine, &packet_id, PacketAction::SubmitForApproval).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

    // Handing the issue to the supplier releases the default gate.
    engine
        .reassign_issue(&packet_id, &chocolate, &issue.id, Owner::Supplier, None)
        .unwrap();
    assert_eq!(
        act(&mut engine, &packet_id, PacketAction::SubmitForApproval),
        Ok(PacketStatus::PendingCrossDeptApproval)
    );
}

#[test]
fn test_any_blocking_gate_policy() {
    let mut config = strict_config();
    config.rules.gate_policy = GatePolicy::AnyBlocking;
    let mut engine = WorkflowEngine::new(config);
    let packet_id = new_packet(&mut engine);
    let cookies = ArticleId::from("a1");
    act(&mut engine, &packet_id, PacketAction::StartReview).unwrap();

    let issue = engine
        .raise_issue(
            &packet_id,
            &cookies,
            FieldId::Photos,
            "",
            Severity::Block,
            Owner::Supplier,
            None,
        )
        .unwrap();
    assert_eq!(issue.label, FieldId::Photos.label());
    assert!(act(&mut engine, &packet_id, PacketAction::SubmitForApproval).is_err());

    engine
        .set_issue_severity(&packet_id, &cookies, &issue.id, Severity::Warn, None)
        .unwrap();
    assert!(act(&mut engine, &packet_id, PacketAction::SubmitForApproval).is_ok());
}

#[test]
fn test_approve_rechecks_gate() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    act(&mut engine, &packet_id, PacketAction::StartReview).unwrap();
    act(&mut engine, &packet_id, PacketAction::SubmitForApproval).unwrap();

    // An issue raised while the packet waits for approval blocks it.
    engine
        .raise_issue(
            &packet_id,
            &ArticleId::from("a1"),
            FieldId::CountryOfOrigin,
            "Country of origin missing on label",
            Severity::Block,
            Owner::Manager,
            None,
        )
        .unwrap();
    assert!(act(&mut engine, &packet_id, PacketAction::Approve).is_err());
    assert_eq!(
        engine.packet(&packet_id).unwrap().status,
        PacketStatus::PendingCrossDeptApproval
    );
}

#[test]
fn test_approve_rechecks_any_blocking_gate() {
    let mut config = strict_config();
    config.rules.gate_policy = GatePolicy::AnyBlocking;
    let mut engine = WorkflowEngine::new(config);
    let packet_id = new_packet(&mut engine);
    act(&mut engine, &packet_id, PacketAction::StartReview).unwrap();
    act(&mut engine, &packet_id, PacketAction::SubmitForApproval).unwrap();

    // A supplier-owned block passes the default gate but not this one.
    let issue = engine
        .raise_issue(
            &packet_id,
            &ArticleId::from("a2"),
            FieldId::Photos,
            "Front photo is blurred",
            Severity::Block,
            Owner::Supplier,
            None,
        )
        .unwrap();
    let err = act(&mut engine, &packet_id, PacketAction::Approve).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    assert_eq!(
        engine.packet(&packet_id).unwrap().status,
        PacketStatus::PendingCrossDeptApproval
    );

    engine
        .set_issue_severity(&packet_id, &ArticleId::from("a2"), &issue.id, Severity::Warn, None)
        .unwrap();
    assert_eq!(
        act(&mut engine, &packet_id, PacketAction::Approve),
        Ok(PacketStatus::Approved)
    );
}

#[test]
fn test_resolved_issue_stays_resolved_through_supplier_round() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    let chocolate = ArticleId::from("a2");
    act(&mut engine, &packet_id, PacketAction::StartReview).unwrap();
    engine
        .assign_category(
            &packet_id,
            &chocolate,
            CategoryAssignment::new("confection", "chocolate"),
            None,
        )
        .unwrap();
    engine.recompute_issues(&packet_id, &chocolate, None).unwrap();

    let shelf_life = engine
        .list_issues(&chocolate)
        .unwrap()
        .into_iter()
        .find(|issue| issue.field == FieldId::ShelfLife)
        .unwrap();
    engine
        .resolve_issue(&packet_id, &chocolate, &shelf_life.id, None)
        .unwrap();

    act(&mut engine, &packet_id, PacketAction::RequestSupplierInput).unwrap();
    act(&mut engine, &packet_id, PacketAction::SupplierComplete).unwrap();
    engine.recompute_issues(&packet_id, &chocolate, None).unwrap();

    assert!(!issue_fields(&engine, &chocolate).contains(&FieldId::ShelfLife));
    assert!(engine
        .article(&chocolate)
        .unwrap()
        .waived
        .contains(&FieldId::ShelfLife));

    // Raising the field again by hand lifts the waiver.
    engine
        .raise_issue(
            &packet_id,
            &chocolate,
            FieldId::ShelfLife,
            "Shelf life is required for export",
            Severity::Warn,
            Owner::Supplier,
            None,
        )
        .unwrap();
    assert!(engine.article(&chocolate).unwrap().waived.is_empty());
    assert!(issue_fields(&engine, &chocolate).contains(&FieldId::ShelfLife));
}

#[test]
fn test_packet_summary_reports_completeness() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    let cookies = ArticleId::from("a1");
    act(&mut engine, &packet_id, PacketAction::StartReview).unwrap();
    engine
        .assign_category(&packet_id, &cookies, CategoryAssignment::new("bakery", "cookies"), None)
        .unwrap();
    engine.recompute_issues(&packet_id, &cookies, None).unwrap();

    let summary = engine.packet_summary(&packet_id).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.ready, 1);
    assert_eq!(summary.articles[0].completeness, Completeness::Warn);
    assert_eq!(summary.articles[1].completeness, Completeness::Ok);

    engine
        .raise_issue(
            &packet_id,
            &ArticleId::from("a2"),
            FieldId::Photos,
            "",
            Severity::Block,
            Owner::Manager,
            None,
        )
        .unwrap();
    let summary = engine.packet_summary(&packet_id).unwrap();
    assert_eq!(summary.ready, 0);
    assert_eq!(summary.articles[1].completeness, Completeness::Fail);
    assert_eq!(
        engine.article(&cookies).unwrap().completeness(),
        Completeness::Warn
    );
}

#[test]
fn test_submission_requires_core_fields() {
    let mut engine = WorkflowEngine::new(strict_config());
    let err = engine
        .create_packet(
            "Supplier LTD",
            None,
            vec![oat_cookies(), Article::new("a3", "4820000111111", "Wafers 40 g")],
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation { .. }));
    assert!(engine.packets().next().is_none());
    assert_eq!(engine.metrics().get_stats().rejections, 1);
}

#[test]
fn test_approved_packet_is_frozen() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    for action in [
        PacketAction::StartReview,
        PacketAction::SubmitForApproval,
        PacketAction::Approve,
    ] {
        act(&mut engine, &packet_id, action).unwrap();
    }
    let version = engine.packet(&packet_id).unwrap().version;

    let patch = ArticlePatch {
        brand: Some("Other".to_string()),
        ..Default::default()
    };
    let err = engine
        .patch_article(&packet_id, &ArticleId::from("a1"), patch, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    assert!(engine
        .set_requirement_extras(&packet_id, &ArticleId::from("a1"), &["photos"], None)
        .is_err());
    assert!(act(&mut engine, &packet_id, PacketAction::Resubmit).is_err());
    assert_eq!(engine.packet(&packet_id).unwrap().version, version);
}

#[test]
fn test_enqueue_is_all_or_nothing() {
    let mut engine = WorkflowEngine::new(strict_config());
    let approved = new_packet(&mut engine);
    for action in [
        PacketAction::StartReview,
        PacketAction::SubmitForApproval,
        PacketAction::Approve,
    ] {
        act(&mut engine, &approved, action).unwrap();
    }
    engine
        .create_packet(
            "Best Foods UA",
            None,
            vec![Article::new("b1", "4820000999999", "Granola bar")
                .with_description("Granola bar with honey")
                .with_supplier_category("Snacks")],
        )
        .unwrap();

    let err = engine
        .enqueue_for_integration(
            &[ArticleId::from("a1"), ArticleId::from("b1")],
            &[Destination::Pos],
        )
        .unwrap_err();
    assert_eq!(
        err,
        WorkflowError::NotApproved {
            article_id: "b1".to_string(),
            status: "Submitted".to_string(),
        }
    );
    assert!(engine.queue().active().is_empty());

    let err = engine
        .enqueue_for_integration(&[ArticleId::from("zz")], &[Destination::Pos])
        .unwrap_err();
    assert_eq!(err, WorkflowError::UnknownArticle("zz".to_string()));
}

#[test]
fn test_block_on_missing_fields() {
    let mut engine = WorkflowEngine::new(OnboardingConfig {
        dispatch: DispatchConfig {
            block_on_missing_fields: true,
            ..DispatchConfig::default()
        },
        ..strict_config()
    });
    let packet_id = new_packet(&mut engine);
    for action in [
        PacketAction::StartReview,
        PacketAction::SubmitForApproval,
        PacketAction::Approve,
    ] {
        act(&mut engine, &packet_id, action).unwrap();
    }

    let err = engine
        .enqueue_for_integration(&[ArticleId::from("a1")], &[Destination::Pim])
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation { .. }));

    assert!(engine
        .enqueue_for_integration(&[ArticleId::from("a1")], &[Destination::Pos])
        .is_ok());
}

#[test]
fn test_outbox_records_committed_changes() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    act(&mut engine, &packet_id, PacketAction::StartReview).unwrap();
    act(&mut engine, &packet_id, PacketAction::RequestSupplierInput).unwrap();
    act(&mut engine, &packet_id, PacketAction::SupplierComplete).unwrap();
    engine.add_feedback(&packet_id, "QA", "Need HACCP certificate", None).unwrap();

    let events = engine.drain_events();
    let transitions = events
        .iter()
        .filter(|e| matches!(e, WorkflowEvent::PacketTransitioned { .. }))
        .count();
    let issue_updates = events
        .iter()
        .filter(|e| matches!(e, WorkflowEvent::IssuesChanged { .. }))
        .count();
    assert_eq!(transitions, 3);
    assert_eq!(issue_updates, 2);
    assert!(matches!(
        events.last(),
        Some(WorkflowEvent::FeedbackAdded { department, .. }) if department == "QA"
    ));
}

#[tokio::test]
async fn test_deliver_through_sink() {
    let mut engine = WorkflowEngine::new(strict_config());
    let packet_id = new_packet(&mut engine);
    for action in [
        PacketAction::StartReview,
        PacketAction::SubmitForApproval,
        PacketAction::Approve,
    ] {
        act(&mut engine, &packet_id, action).unwrap();
    }
    let items = engine
        .enqueue_for_integration(
            &[ArticleId::from("a1")],
            &[Destination::Pos, Destination::Pim],
        )
        .unwrap();

    let sink = RecordingSink {
        delivered: Mutex::new(Vec::new()),
    };
    let item = engine.deliver_queue_item(&items[0].id, &sink).await.unwrap();
    assert_eq!(item.status, QueueStatus::Completed);
    assert_eq!(item.message.as_deref(), Some("Accepted by bus"));

    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].destinations, vec![Destination::Pos, Destination::Pim]);
    assert_eq!(delivered[0].data[&Destination::Pim].brand, "Sweeto");
}

#[tokio::test(start_paused = true)]
async fn test_delivery_timeout_fails_item() {
    let mut engine = WorkflowEngine::new(OnboardingConfig {
        dispatch: DispatchConfig {
            delivery_timeout_seconds: 5,
            ..DispatchConfig::default()
        },
        ..strict_config()
    });
    let packet_id = new_packet(&mut engine);
    for action in [
        PacketAction::StartReview,
        PacketAction::SubmitForApproval,
        PacketAction::Approve,
    ] {
        act(&mut engine, &packet_id, action).unwrap();
    }
    let items = engine
        .enqueue_for_integration(&[ArticleId::from("a2")], &[Destination::Erp])
        .unwrap();

    let item = engine.deliver_queue_item(&items[0].id, &HangingSink).await.unwrap();
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.message.as_deref(), Some("Delivery timed out after 5s"));
    assert_eq!(engine.metrics().get_stats().items_failed, 1);

    // Terminal items cannot be touched again.
    assert!(engine.advance_queue_item(&items[0].id).is_err());
}
