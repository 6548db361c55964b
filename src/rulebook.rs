//! Category Rulebook
//!
//! Static mapping from the product taxonomy to the fields every article in a
//! category must provide. Managers layer per-article extras on top; the
//! combination is a [`RequirementRule`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::article::CategoryAssignment;
use crate::error::{WorkflowError, WorkflowResult};
use crate::fields::FieldId;

/// Base requirements from the rulebook plus the manager's extras
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRule {
    pub base: BTreeSet<FieldId>,
    pub extra: BTreeSet<FieldId>,
}

impl RequirementRule {
    pub fn new(
        base: impl IntoIterator<Item = FieldId>,
        extra: impl IntoIterator<Item = FieldId>,
    ) -> Self {
        Self {
            base: base.into_iter().collect(),
            extra: extra.into_iter().collect(),
        }
    }

    pub fn base_only(base: impl IntoIterator<Item = FieldId>) -> Self {
        Self {
            base: base.into_iter().collect(),
            extra: BTreeSet::new(),
        }
    }

    /// `base ∪ extra`
    pub fn all(&self) -> BTreeSet<FieldId> {
        self.base.union(&self.extra).copied().collect()
    }
}

/// One node of the product taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    pub required: BTreeSet<FieldId>,
}

/// How lookups of unregistered categories behave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupPolicy {
    /// Propagate `UnknownCategory`
    Strict,
    /// Log a warning and fall back to an empty rule set
    #[default]
    Lenient,
}

const NO_FIELDS: [FieldId; 0] = [];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRulebook {
    categories: BTreeMap<String, CategoryNode>,
}

impl Default for CategoryRulebook {
    fn default() -> Self {
        use FieldId::*;

        let mut rulebook = Self::empty();
        rulebook.register("bakery", "Bakery", None, NO_FIELDS);
        rulebook.register("confection", "Confectionery", None, NO_FIELDS);
        rulebook.register(
            "cookies",
            "Cookies",
            Some("bakery"),
            [Brand, ShelfLife, ProductSizeMaterial, PackageSizeMaterial, Certificates],
        );
        rulebook.register("crackers", "Crackers", Some("bakery"), [Brand, ShelfLife]);
        rulebook.register(
            "chocolate",
            "Chocolate",
            Some("confection"),
            [Brand, ShelfLife, ProductSizeMaterial, PackageSizeMaterial],
        );
        rulebook.register(
            "bars",
            "Bars",
            Some("confection"),
            [Brand, ShelfLife, PackageSizeMaterial],
        );
        rulebook
    }
}

impl CategoryRulebook {
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Register or replace a category.
    pub fn register(
        &mut self,
        id: &str,
        name: &str,
        parent: Option<&str>,
        required: impl IntoIterator<Item = FieldId>,
    ) {
        self.categories.insert(
            id.to_string(),
            CategoryNode {
                id: id.to_string(),
                name: name.to_string(),
                parent: parent.map(str::to_string),
                required: required.into_iter().collect(),
            },
        );
    }

    /// Replace the rule list of a category, registering it as a top-level
    /// category when unknown.
    pub fn set_requirements(&mut self, id: &str, required: impl IntoIterator<Item = FieldId>) {
        let required: BTreeSet<FieldId> = required.into_iter().collect();
        match self.categories.get_mut(id) {
            Some(node) => node.required = required,
            None => self.register(id, id, None, required),
        }
    }

    pub fn category(&self, id: &str) -> Option<&CategoryNode> {
        self.categories.get(id)
    }

    pub fn children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a CategoryNode> + 'a {
        self.categories
            .values()
            .filter(move |node| node.parent.as_deref() == Some(parent))
    }

    pub fn base_requirements(&self, category_id: &str) -> WorkflowResult<BTreeSet<FieldId>> {
        self.categories
            .get(category_id)
            .map(|node| node.required.clone())
            .ok_or_else(|| WorkflowError::UnknownCategory(category_id.to_string()))
    }

    /// Base requirements under a lookup policy.
    pub fn lookup(
        &self,
        category_id: &str,
        policy: LookupPolicy,
    ) -> WorkflowResult<BTreeSet<FieldId>> {
        match self.base_requirements(category_id) {
            Err(WorkflowError::UnknownCategory(id)) if policy == LookupPolicy::Lenient => {
                warn!(
                    category_id = %id,
                    "Unknown category, treating base requirements as empty"
                );
                Ok(BTreeSet::new())
            }
            result => result,
        }
    }

    /// Check that a manager's category decision names registered ids and
    /// that the subcategory sits under the chosen category.
    pub fn validate_assignment(&self, assignment: &CategoryAssignment) -> WorkflowResult<()> {
        if let Some(category_id) = assignment.category_id.as_deref() {
            self.base_requirements(category_id)?;
        }
        if let Some(subcategory_id) = assignment.subcategory_id.as_deref() {
            let node = self
                .category(subcategory_id)
                .ok_or_else(|| WorkflowError::UnknownCategory(subcategory_id.to_string()))?;
            if let Some(category_id) = assignment.category_id.as_deref() {
                if node.parent.as_deref() != Some(category_id) {
                    return Err(WorkflowError::validation(format!(
                        "subcategory {subcategory_id} does not belong to category {category_id}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Full rule set for an article: category base plus extras.
    pub fn rule_for(
        &self,
        assignment: &CategoryAssignment,
        extras: &BTreeSet<FieldId>,
        policy: LookupPolicy,
    ) -> WorkflowResult<RequirementRule> {
        let base = match assignment.rule_key() {
            Some(key) => self.lookup(key, policy)?,
            None => BTreeSet::new(),
        };
        Ok(RequirementRule {
            base,
            extra: extras.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chocolate_rules() {
        let rulebook = CategoryRulebook::default();
        let base = rulebook.base_requirements("chocolate").unwrap();
        assert_eq!(
            base,
            BTreeSet::from([
                FieldId::Brand,
                FieldId::ShelfLife,
                FieldId::ProductSizeMaterial,
                FieldId::PackageSizeMaterial,
            ])
        );
    }

    #[test]
    fn test_unknown_category_fails_loudly() {
        let rulebook = CategoryRulebook::default();
        assert_eq!(
            rulebook.base_requirements("frozen"),
            Err(WorkflowError::UnknownCategory("frozen".to_string()))
        );
        assert!(rulebook.lookup("frozen", LookupPolicy::Strict).is_err());
    }

    #[test]
    fn test_lenient_lookup_is_empty() {
        let rulebook = CategoryRulebook::default();
        assert!(rulebook
            .lookup("frozen", LookupPolicy::Lenient)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parent_categories_have_no_rules() {
        let rulebook = CategoryRulebook::default();
        assert!(rulebook.base_requirements("bakery").unwrap().is_empty());
        let children: Vec<&str> = rulebook.children("bakery").map(|c| c.id.as_str()).collect();
        assert_eq!(children, vec!["cookies", "crackers"]);
    }

    #[test]
    fn test_set_requirements_overrides() {
        let mut rulebook = CategoryRulebook::default();
        rulebook.set_requirements("crackers", [FieldId::Brand]);
        rulebook.set_requirements("frozen", [FieldId::ShelfLife]);
        assert_eq!(
            rulebook.base_requirements("crackers").unwrap(),
            BTreeSet::from([FieldId::Brand])
        );
        assert_eq!(
            rulebook.base_requirements("frozen").unwrap(),
            BTreeSet::from([FieldId::ShelfLife])
        );
    }

    #[test]
    fn test_assignment_validation() {
        let rulebook = CategoryRulebook::default();
        assert!(rulebook
            .validate_assignment(&CategoryAssignment::new("confection", "chocolate"))
            .is_ok());
        assert!(matches!(
            rulebook.validate_assignment(&CategoryAssignment::new("bakery", "chocolate")),
            Err(WorkflowError::Validation { .. })
        ));
        assert!(matches!(
            rulebook.validate_assignment(&CategoryAssignment::new("bakery", "bagels")),
            Err(WorkflowError::UnknownCategory(id)) if id == "bagels"
        ));
    }

    #[test]
    fn test_rule_for_combines_extras() {
        let rulebook = CategoryRulebook::default();
        let extras = BTreeSet::from([FieldId::Photos, FieldId::Brand]);
        let rule = rulebook
            .rule_for(
                &CategoryAssignment::new("bakery", "crackers"),
                &extras,
                LookupPolicy::Strict,
            )
            .unwrap();
        assert_eq!(
            rule.all(),
            BTreeSet::from([FieldId::Brand, FieldId::ShelfLife, FieldId::Photos])
        );
    }

    #[test]
    fn test_rule_without_category_is_extras_only() {
        let rulebook = CategoryRulebook::default();
        let extras = BTreeSet::from([FieldId::Certificates]);
        let rule = rulebook
            .rule_for(&CategoryAssignment::default(), &extras, LookupPolicy::Strict)
            .unwrap();
        assert!(rule.base.is_empty());
        assert_eq!(rule.extra, extras);
    }
}
