// Comparison/Ranking Service: competitor offers against the current supplier

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The offer under review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentOffer {
    pub article_no: u64,
    pub title: String,
    pub supplier: String,
    pub brand: String,
    pub category_path: String,
    pub price: Option<f64>,
    pub sales_forecast: String,
    pub supply_forecast: String,
    pub rts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorOffer {
    pub supplier: String,
    pub article_no: u64,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub sales_forecast: String,
    pub supply_forecast: String,
    pub rts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub offer: CompetitorOffer,
    /// Signed percentage, `None` when either price is missing
    pub price_diff: Option<f64>,
    pub price_diff_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Supplier,
    ArticleNo,
    PriceDiff,
    Price,
    SalesForecast,
    SupplyForecast,
    Rts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Column header state: clicking the active key flips direction, clicking a
/// new key sorts ascending by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::PriceDiff,
            direction: SortDirection::Ascending,
        }
    }
}

impl SortState {
    pub fn toggle(self, key: SortKey) -> Self {
        if key == self.key {
            Self {
                key,
                direction: self.direction.flipped(),
            }
        } else {
            Self {
                key,
                direction: SortDirection::Ascending,
            }
        }
    }
}

pub const MISSING_LABEL: &str = "—";

/// `(competitor - current) / current * 100`
pub fn price_diff(competitor: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (competitor, current) {
        (Some(competitor), Some(current)) if current != 0.0 => {
            let diff = (competitor - current) / current * 100.0;
            diff.is_finite().then_some(diff)
        }
        _ => None,
    }
}

/// Render a difference with one decimal, truncated toward zero.
///
/// Positive values carry a `+`; zero renders as `0.0%`.
pub fn format_price_diff(diff: Option<f64>) -> String {
    let Some(diff) = diff else {
        return MISSING_LABEL.to_string();
    };
    // Nudge away from zero so values like 6.9999999 land on 7.0.
    let tenths = (diff * 10.0 + diff.signum() * 1e-6).trunc();
    if tenths == 0.0 {
        return "0.0%".to_string();
    }
    let sign = if tenths > 0.0 { "+" } else { "" };
    format!("{sign}{:.1}%", tenths / 10.0)
}

enum SortValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl SortValue<'_> {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        }
    }
}

fn text(value: &str) -> Option<SortValue<'_>> {
    let value = value.trim();
    (!value.is_empty()).then_some(SortValue::Text(value))
}

fn sort_value(row: &ComparisonRow, key: SortKey) -> Option<SortValue<'_>> {
    match key {
        SortKey::Supplier => text(&row.offer.supplier),
        SortKey::ArticleNo => Some(SortValue::Number(row.offer.article_no as f64)),
        SortKey::PriceDiff => row.price_diff.map(SortValue::Number),
        SortKey::Price => row.offer.price.map(SortValue::Number),
        SortKey::SalesForecast => text(&row.offer.sales_forecast),
        SortKey::SupplyForecast => text(&row.offer.supply_forecast),
        SortKey::Rts => text(&row.offer.rts),
    }
}

/// Compute price differences and sort the competitor rows.
///
/// The sort is stable and rows without a value for `key` come last in
/// either direction.
pub fn rank(
    current: &CurrentOffer,
    competitors: &[CompetitorOffer],
    key: SortKey,
    direction: SortDirection,
) -> Vec<ComparisonRow> {
    let mut rows: Vec<ComparisonRow> = competitors
        .iter()
        .map(|offer| {
            let diff = price_diff(offer.price, current.price);
            ComparisonRow {
                offer: offer.clone(),
                price_diff: diff,
                price_diff_label: format_price_diff(diff),
            }
        })
        .collect();

    rows.sort_by(|a, b| match (sort_value(a, key), sort_value(b, key)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match direction {
            SortDirection::Ascending => a.compare(&b),
            SortDirection::Descending => b.compare(&a),
        },
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> CurrentOffer {
        CurrentOffer {
            article_no: 295709,
            title: "Porous chocolate 90 g".to_string(),
            supplier: "Supplier LTD".to_string(),
            brand: "Lemur".to_string(),
            category_path: "Confectionery / Chocolate".to_string(),
            price: Some(74.50),
            sales_forecast: "900/week".to_string(),
            supply_forecast: "stable".to_string(),
            rts: "B+".to_string(),
        }
    }

    fn offer(supplier: &str, article_no: u64, price: Option<f64>, rts: &str) -> CompetitorOffer {
        CompetitorOffer {
            supplier: supplier.to_string(),
            article_no,
            brand: None,
            price,
            sales_forecast: String::new(),
            supply_forecast: "stable".to_string(),
            rts: rts.to_string(),
        }
    }

    fn competitors() -> Vec<CompetitorOffer> {
        vec![
            offer("TOB Supplier", 295703, Some(72.30), "B+"),
            offer("Postachalnyk LLC", 295702, Some(75.00), "A"),
            offer("Best Foods UA", 295704, Some(74.50), "A-"),
            offer("No Price Co", 295705, None, ""),
        ]
    }

    #[test]
    fn test_price_diff_label() {
        let diff = price_diff(Some(72.30), Some(74.50));
        assert_eq!(format_price_diff(diff), "-2.9%");
        assert_eq!(format_price_diff(price_diff(Some(75.00), Some(74.50))), "+0.6%");
        assert_eq!(format_price_diff(price_diff(Some(74.50), Some(74.50))), "0.0%");
        assert_eq!(format_price_diff(price_diff(None, Some(74.50))), "—");
        assert_eq!(format_price_diff(price_diff(Some(10.0), Some(0.0))), "—");
    }

    #[test]
    fn test_rank_by_price_diff_ascending() {
        let rows = rank(&current(), &competitors(), SortKey::PriceDiff, SortDirection::Ascending);
        let order: Vec<u64> = rows.iter().map(|r| r.offer.article_no).collect();
        assert_eq!(order, vec![295703, 295704, 295702, 295705]);
        assert_eq!(rows[3].price_diff_label, "—");
    }

    #[test]
    fn test_missing_values_last_when_descending() {
        let rows = rank(&current(), &competitors(), SortKey::PriceDiff, SortDirection::Descending);
        let order: Vec<u64> = rows.iter().map(|r| r.offer.article_no).collect();
        assert_eq!(order, vec![295702, 295704, 295703, 295705]);

        let rows = rank(&current(), &competitors(), SortKey::Rts, SortDirection::Descending);
        assert_eq!(rows.last().unwrap().offer.article_no, 295705);
    }

    #[test]
    fn test_sort_is_stable() {
        // All sales forecasts are blank, so the input order is kept.
        let rows = rank(
            &current(),
            &competitors(),
            SortKey::SalesForecast,
            SortDirection::Descending,
        );
        let order: Vec<u64> = rows.iter().map(|r| r.offer.article_no).collect();
        assert_eq!(order, vec![295703, 295702, 295704, 295705]);
    }

    #[test]
    fn test_rank_by_supplier() {
        let rows = rank(&current(), &competitors(), SortKey::Supplier, SortDirection::Ascending);
        assert_eq!(rows[0].offer.supplier, "Best Foods UA");
    }

    #[test]
    fn test_sort_state_toggle() {
        let state = SortState::default();
        let flipped = state.toggle(SortKey::PriceDiff);
        assert_eq!(flipped.direction, SortDirection::Descending);

        let other = flipped.toggle(SortKey::Rts);
        assert_eq!(other.key, SortKey::Rts);
        assert_eq!(other.direction, SortDirection::Ascending);
    }
}
