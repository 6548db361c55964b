// Requirement Evaluator: pure split of a rule set into satisfied and missing fields

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::article::Article;
use crate::fields::FieldId;
use crate::rulebook::RequirementRule;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub satisfied: BTreeSet<FieldId>,
    pub missing: BTreeSet<FieldId>,
}

impl Evaluation {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Evaluate every field of `base ∪ extra` against the article.
///
/// The two output sets partition the rule set. Calling this twice on the
/// same input yields the same output.
pub fn evaluate(article: &Article, rule: &RequirementRule) -> Evaluation {
    let (satisfied, missing): (BTreeSet<FieldId>, BTreeSet<FieldId>) = rule
        .all()
        .into_iter()
        .partition(|field| article.is_filled(*field));
    Evaluation { satisfied, missing }
}
