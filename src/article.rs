// Article aggregate: one product under review plus its open issues

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::error::{WorkflowError, WorkflowResult};
use crate::evaluator::{self, Evaluation};
use crate::fields::{DocumentKind, FieldId, FieldKind};
use crate::rulebook::RequirementRule;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArticleId(pub String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueId(pub String);

impl IssueId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to an attachment held by the external object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    /// Certificate type, when the uploader tagged one
    #[serde(default)]
    pub kind: Option<DocumentKind>,
}

impl FileRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: None,
        }
    }

    pub fn certificate(id: impl Into<String>, name: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::new(id, name)
        }
    }
}

/// Final taxonomy decision made by the manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    /// Colour / taste variant
    pub variant_id: Option<String>,
    /// Barcode family, e.g. `ean13`
    pub ean_category: Option<String>,
}

impl CategoryAssignment {
    pub fn new(category: &str, subcategory: &str) -> Self {
        Self {
            category_id: Some(category.to_string()),
            subcategory_id: Some(subcategory.to_string()),
            variant_id: None,
            ean_category: None,
        }
    }

    pub fn with_variant(mut self, variant: &str) -> Self {
        self.variant_id = Some(variant.to_string());
        self
    }

    pub fn with_ean_category(mut self, ean_category: &str) -> Self {
        self.ean_category = Some(ean_category.to_string());
        self
    }

    /// The id whose rules apply: the subcategory when chosen, else the category.
    pub fn rule_key(&self) -> Option<&str> {
        self.subcategory_id
            .as_deref()
            .or(self.category_id.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    Supplier,
    Manager,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => write!(f, "warn"),
            Severity::Block => write!(f, "block"),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Supplier => write!(f, "supplier"),
            Owner::Manager => write!(f, "manager"),
        }
    }
}

/// One outstanding requirement gap on an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub label: String,
    pub field: FieldId,
    pub severity: Severity,
    pub owner: Owner,
}

impl Issue {
    /// Issue created by a recompute pass: `warn`, owned by the supplier.
    pub fn for_missing(field: FieldId) -> Self {
        Self {
            id: IssueId::generate(),
            label: field.label().to_string(),
            field,
            severity: Severity::Warn,
            owner: Owner::Supplier,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Block
    }

    pub fn blocks_manager(&self) -> bool {
        self.is_blocking() && self.owner == Owner::Manager
    }
}

/// Reviewer's traffic light for one article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// No open issues
    Ok,
    /// Open issues, none blocking
    Warn,
    /// At least one blocking issue
    Fail,
}

/// Fields a supplier must fill before a packet can be submitted
pub const SUBMISSION_FIELDS: [FieldId; 4] = [
    FieldId::Ean,
    FieldId::Title,
    FieldId::Description,
    FieldId::SupplierCategory,
];

/// One product/SKU under review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub ean: String,
    pub title: String,
    pub description: String,
    /// Category picked by the supplier at submission
    pub supplier_category: String,
    pub brand: String,
    pub category: CategoryAssignment,
    pub shelf_life: String,
    pub product_specs: String,
    pub package_specs: String,
    pub rts_package_specs: String,
    pub product_size_material: String,
    pub package_size_material: String,
    pub supply_date: String,
    pub supply_volume: String,
    pub country_of_origin: String,
    pub sales_forecast: String,
    pub proposed_price: Option<f64>,
    pub retail_centers: Vec<String>,
    pub photos: Vec<FileRef>,
    pub certificates: Vec<FileRef>,
    /// Manager-owned requirements layered over the category rules
    pub requirement_extras: BTreeSet<FieldId>,
    pub manager_comment: Option<String>,
    pub enriched_by_manager: bool,
    pub issues: Vec<Issue>,
    /// Fields whose issue a reviewer resolved without the value being supplied
    pub waived: BTreeSet<FieldId>,
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticlePatch {
    pub ean: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub supplier_category: Option<String>,
    pub brand: Option<String>,
    pub shelf_life: Option<String>,
    pub product_specs: Option<String>,
    pub package_specs: Option<String>,
    pub rts_package_specs: Option<String>,
    pub product_size_material: Option<String>,
    pub package_size_material: Option<String>,
    pub supply_date: Option<String>,
    pub supply_volume: Option<String>,
    pub country_of_origin: Option<String>,
    pub sales_forecast: Option<String>,
    pub proposed_price: Option<f64>,
    pub retail_centers: Option<Vec<String>>,
    pub photos: Option<Vec<FileRef>>,
    pub certificates: Option<Vec<FileRef>>,
    pub manager_comment: Option<String>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        *self == ArticlePatch::default()
    }

    /// Fields this patch touches, for logging.
    pub fn touched_fields(&self) -> Vec<FieldId> {
        let mut touched = Vec::new();
        let mut mark = |present: bool, field: FieldId| {
            if present {
                touched.push(field);
            }
        };
        mark(self.ean.is_some(), FieldId::Ean);
        mark(self.title.is_some(), FieldId::Title);
        mark(self.description.is_some(), FieldId::Description);
        mark(self.supplier_category.is_some(), FieldId::SupplierCategory);
        mark(self.brand.is_some(), FieldId::Brand);
        mark(self.shelf_life.is_some(), FieldId::ShelfLife);
        mark(self.product_specs.is_some(), FieldId::ProductSpecs);
        mark(self.package_specs.is_some(), FieldId::PackageSpecs);
        mark(self.rts_package_specs.is_some(), FieldId::RtsPackageSpecs);
        mark(self.product_size_material.is_some(), FieldId::ProductSizeMaterial);
        mark(self.package_size_material.is_some(), FieldId::PackageSizeMaterial);
        mark(self.supply_date.is_some(), FieldId::SupplyDate);
        mark(self.supply_volume.is_some(), FieldId::SupplyVolume);
        mark(self.country_of_origin.is_some(), FieldId::CountryOfOrigin);
        mark(self.sales_forecast.is_some(), FieldId::SalesForecast);
        mark(self.proposed_price.is_some(), FieldId::ProposedPrice);
        mark(self.retail_centers.is_some(), FieldId::RetailCenters);
        mark(self.photos.is_some(), FieldId::Photos);
        mark(self.certificates.is_some(), FieldId::Certificates);
        touched
    }
}

fn assign<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl Article {
    pub fn new(id: impl Into<String>, ean: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: ArticleId(id.into()),
            ean: ean.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_supplier_category(mut self, category: impl Into<String>) -> Self {
        self.supplier_category = category.into();
        self
    }

    /// Merge the present fields of `patch`; everything else is left untouched.
    pub fn apply_patch(&mut self, patch: ArticlePatch) {
        let ArticlePatch {
            ean,
            title,
            description,
            supplier_category,
            brand,
            shelf_life,
            product_specs,
            package_specs,
            rts_package_specs,
            product_size_material,
            package_size_material,
            supply_date,
            supply_volume,
            country_of_origin,
            sales_forecast,
            proposed_price,
            retail_centers,
            photos,
            certificates,
            manager_comment,
        } = patch;

        assign(&mut self.ean, ean);
        assign(&mut self.title, title);
        assign(&mut self.description, description);
        assign(&mut self.supplier_category, supplier_category);
        assign(&mut self.brand, brand);
        assign(&mut self.shelf_life, shelf_life);
        assign(&mut self.product_specs, product_specs);
        assign(&mut self.package_specs, package_specs);
        assign(&mut self.rts_package_specs, rts_package_specs);
        assign(&mut self.product_size_material, product_size_material);
        assign(&mut self.package_size_material, package_size_material);
        assign(&mut self.supply_date, supply_date);
        assign(&mut self.supply_volume, supply_volume);
        assign(&mut self.country_of_origin, country_of_origin);
        assign(&mut self.sales_forecast, sales_forecast);
        assign(&mut self.retail_centers, retail_centers);
        assign(&mut self.photos, photos);
        assign(&mut self.certificates, certificates);
        if proposed_price.is_some() {
            self.proposed_price = proposed_price;
        }
        if manager_comment.is_some() {
            self.manager_comment = manager_comment;
        }
    }

    /// Text value of a scalar field; `None` for collection and numeric fields.
    pub fn text(&self, field: FieldId) -> Option<&str> {
        let value = match field {
            FieldId::Ean => &self.ean,
            FieldId::Title => &self.title,
            FieldId::Description => &self.description,
            FieldId::SupplierCategory => &self.supplier_category,
            FieldId::Brand => &self.brand,
            FieldId::ShelfLife => &self.shelf_life,
            FieldId::ProductSpecs => &self.product_specs,
            FieldId::PackageSpecs => &self.package_specs,
            FieldId::RtsPackageSpecs => &self.rts_package_specs,
            FieldId::ProductSizeMaterial => &self.product_size_material,
            FieldId::PackageSizeMaterial => &self.package_size_material,
            FieldId::SupplyDate => &self.supply_date,
            FieldId::SupplyVolume => &self.supply_volume,
            FieldId::CountryOfOrigin => &self.country_of_origin,
            FieldId::SalesForecast => &self.sales_forecast,
            FieldId::ProposedPrice
            | FieldId::RetailCenters
            | FieldId::Photos
            | FieldId::Certificates
            | FieldId::MultiAnglePhotos
            | FieldId::EcoCertificate
            | FieldId::QualityCertificate
            | FieldId::SafetyDataSheet => return None,
        };
        Some(value.as_str())
    }

    fn item_count(&self, field: FieldId) -> usize {
        match field {
            FieldId::Photos => self.photos.len(),
            FieldId::Certificates => self.certificates.len(),
            FieldId::RetailCenters => self.retail_centers.len(),
            _ => 0,
        }
    }

    /// Presence check used by both requirement evaluation and destination preflight.
    pub fn is_filled(&self, field: FieldId) -> bool {
        match field.kind() {
            FieldKind::Scalar => self
                .text(field)
                .map(|value| !value.trim().is_empty())
                .unwrap_or(false),
            FieldKind::Collection => self.item_count(field) > 0,
            FieldKind::Numeric => self.proposed_price.is_some(),
            FieldKind::PhotoCount(min) => self.photos.len() >= min,
            FieldKind::Document(kind) => self
                .certificates
                .iter()
                .any(|certificate| certificate.kind == Some(kind)),
        }
    }

    /// Submission fields still blank, in declaration order.
    pub fn submission_gaps(&self) -> Vec<FieldId> {
        SUBMISSION_FIELDS
            .into_iter()
            .filter(|field| !self.is_filled(*field))
            .collect()
    }

    pub fn completeness(&self) -> Completeness {
        if self.issues.is_empty() {
            Completeness::Ok
        } else if self.has_blocking_issue() {
            Completeness::Fail
        } else {
            Completeness::Warn
        }
    }

    /// Re-run evaluation and reconcile the issue list.
    ///
    /// Issues whose field is satisfied, or no longer required, are dropped;
    /// each missing field without an issue or a waiver gains one (`warn`,
    /// `supplier`). Existing issues keep their id, severity and owner.
    /// A waiver lapses once its field is satisfied or leaves the rule set.
    pub fn recompute_issues(&mut self, rule: &RequirementRule) -> Evaluation {
        let evaluation = evaluator::evaluate(self, rule);

        self.waived.retain(|field| evaluation.missing.contains(field));
        let before = self.issues.len();
        self.issues
            .retain(|issue| evaluation.missing.contains(&issue.field));
        let removed = before - self.issues.len();

        let tracked: BTreeSet<FieldId> = self.issues.iter().map(|issue| issue.field).collect();
        let mut added = 0;
        for field in &evaluation.missing {
            if !tracked.contains(field) && !self.waived.contains(field) {
                self.issues.push(Issue::for_missing(*field));
                added += 1;
            }
        }

        debug!(
            article_id = %self.id,
            removed,
            added,
            open = self.issues.len(),
            waived = self.waived.len(),
            "Recomputed article issues"
        );
        evaluation
    }

    /// Drop an issue without re-checking its field (reviewer waiver).
    ///
    /// The field stays waived until it is satisfied or an issue is raised
    /// for it again.
    pub fn resolve_issue(&mut self, issue_id: &IssueId) -> WorkflowResult<Issue> {
        let index = self.issue_index(issue_id)?;
        let issue = self.issues.remove(index);
        if !self.is_filled(issue.field) {
            self.waived.insert(issue.field);
        }
        Ok(issue)
    }

    pub fn reassign_issue(&mut self, issue_id: &IssueId, owner: Owner) -> WorkflowResult<&Issue> {
        let index = self.issue_index(issue_id)?;
        self.issues[index].owner = owner;
        Ok(&self.issues[index])
    }

    pub fn set_issue_severity(
        &mut self,
        issue_id: &IssueId,
        severity: Severity,
    ) -> WorkflowResult<&Issue> {
        let index = self.issue_index(issue_id)?;
        self.issues[index].severity = severity;
        Ok(&self.issues[index])
    }

    /// Attach a reviewer-raised issue and make its field an extra requirement.
    ///
    /// An issue already tracked for the same field is replaced, and a
    /// waiver on the field is lifted.
    pub fn raise_issue(
        &mut self,
        field: FieldId,
        label: &str,
        severity: Severity,
        owner: Owner,
    ) -> &Issue {
        self.requirement_extras.insert(field);
        self.waived.remove(&field);
        self.issues.retain(|issue| issue.field != field);
        self.issues.push(Issue {
            id: IssueId::generate(),
            label: label.to_string(),
            field,
            severity,
            owner,
        });
        &self.issues[self.issues.len() - 1]
    }

    pub fn issue(&self, issue_id: &IssueId) -> Option<&Issue> {
        self.issues.iter().find(|issue| &issue.id == issue_id)
    }

    pub fn has_manager_blocking_issue(&self) -> bool {
        self.issues.iter().any(Issue::blocks_manager)
    }

    pub fn has_blocking_issue(&self) -> bool {
        self.issues.iter().any(Issue::is_blocking)
    }

    fn issue_index(&self, issue_id: &IssueId) -> WorkflowResult<usize> {
        self.issues
            .iter()
            .position(|issue| &issue.id == issue_id)
            .ok_or_else(|| WorkflowError::UnknownIssue {
                article_id: self.id.to_string(),
                issue_id: issue_id.to_string(),
            })
    }
}
