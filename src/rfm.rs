//! RFM aggregation and quantile scoring

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::data::{clean_transactions, RawTable, Transaction};
use crate::error::{Result, RfmError};
use crate::schema::resolve_columns;
use crate::segment::{classify, Segment};

/// Number of quantile groups used for each score dimension.
pub const SCORE_GROUPS: usize = 5;

/// Per-customer metrics relative to the upload's reference date.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: String,
    pub customer_name: Option<String>,
    /// Whole days between the reference date and the last purchase.
    pub recency: i64,
    pub frequency: u64,
    pub monetary: f64,
}

/// A customer with quantile scores and an assigned segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCustomer {
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub recency: i64,
    pub frequency: u64,
    pub monetary: f64,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
    pub rfm_score: String,
    pub rfm_score_numeric: u8,
    pub segment: Segment,
}

/// The analysis result of one upload, held until the next replaces it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub customers: Vec<ScoredCustomer>,
    pub reference_date: NaiveDateTime,
    /// Whether the upload carried a customer name column.
    pub has_names: bool,
}

/// Label order for quantile score assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// Lowest values get label 1 (frequency, monetary).
    Ascending,
    /// Lowest values get the highest label (recency).
    Descending,
}

/// Run the full pipeline on a parsed upload: schema resolution, cleaning,
/// aggregation, scoring, and segmentation.
pub fn build_snapshot(table: &RawTable) -> Result<Snapshot> {
    let columns = resolve_columns(&table.columns)?;
    let transactions = clean_transactions(table, &columns);
    let (metrics, reference_date) = aggregate(&transactions)?;
    let customers = score_customers(metrics);
    Ok(Snapshot {
        customers,
        reference_date,
        has_names: columns.customer_name.is_some(),
    })
}

struct CustomerAccumulator {
    name: Option<String>,
    last_purchase: NaiveDateTime,
    frequency: u64,
    monetary: f64,
}

/// Group cleaned transactions into per-customer metrics.
///
/// The reference date is the dataset's latest invoice date plus one day,
/// fixed for the whole run, so recency is at least 1 for every customer.
/// Names keep the first value seen in original row order. Output is sorted
/// by customer id.
pub fn aggregate(transactions: &[Transaction]) -> Result<(Vec<CustomerMetrics>, NaiveDateTime)> {
    let max_date = transactions
        .iter()
        .map(|t| t.invoice_date)
        .max()
        .ok_or(RfmError::EmptyDataset)?;
    let reference_date = max_date + Duration::days(1);

    let mut groups: HashMap<String, CustomerAccumulator> = HashMap::new();
    for transaction in transactions {
        let entry = groups
            .entry(transaction.customer_id.clone())
            .or_insert_with(|| CustomerAccumulator {
                name: None,
                last_purchase: transaction.invoice_date,
                frequency: 0,
                monetary: 0.0,
            });
        if entry.name.is_none() {
            entry.name = transaction.customer_name.clone();
        }
        if transaction.invoice_date > entry.last_purchase {
            entry.last_purchase = transaction.invoice_date;
        }
        entry.frequency += 1;
        entry.monetary += transaction.amount;
    }

    let mut metrics: Vec<CustomerMetrics> = groups
        .into_iter()
        .map(|(customer_id, acc)| CustomerMetrics {
            customer_id,
            customer_name: acc.name,
            recency: (reference_date - acc.last_purchase).num_days(),
            frequency: acc.frequency,
            monetary: acc.monetary,
        })
        .collect();
    metrics.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

    Ok((metrics, reference_date))
}

/// Assign quantile scores and segments to the full customer population.
///
/// Recency is binned on raw values with inverted labels; frequency and
/// monetary are ranked first so every customer occupies a distinct position
/// before binning.
pub fn score_customers(metrics: Vec<CustomerMetrics>) -> Vec<ScoredCustomer> {
    let recency: Vec<f64> = metrics.iter().map(|m| m.recency as f64).collect();
    let frequency: Vec<f64> = metrics.iter().map(|m| m.frequency as f64).collect();
    let monetary: Vec<f64> = metrics.iter().map(|m| m.monetary).collect();

    let r_scores = quantile_scores(&recency, SCORE_GROUPS, ScoreOrder::Descending);
    let f_scores = quantile_scores(&rank_first(&frequency), SCORE_GROUPS, ScoreOrder::Ascending);
    let m_scores = quantile_scores(&rank_first(&monetary), SCORE_GROUPS, ScoreOrder::Ascending);

    metrics
        .into_iter()
        .zip(r_scores.into_iter().zip(f_scores).zip(m_scores))
        .map(|(metric, ((r, f), m))| ScoredCustomer {
            rfm_score: format!("{r}{f}{m}"),
            rfm_score_numeric: r + f + m,
            segment: classify(r, f, m),
            r_score: r,
            f_score: f,
            m_score: m,
            customer_id: metric.customer_id,
            customer_name: metric.customer_name,
            recency: metric.recency,
            frequency: metric.frequency,
            monetary: metric.monetary,
        })
        .collect()
}

/// Rank values 1..=n with ties broken by original position.
///
/// The result is a strict total order, so binning ranks can never produce
/// ties across a bucket boundary.
pub fn rank_first(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut ranks = vec![0.0; values.len()];
    for (position, &index) in order.iter().enumerate() {
        ranks[index] = (position + 1) as f64;
    }
    ranks
}

/// Bin values into quantile groups and return a 1-based label per value.
///
/// Bucket edges are interpolated quantiles of the sorted values; intervals
/// are right-closed. Duplicate edges collapse, so low-cardinality inputs
/// yield fewer buckets instead of an error. Labels run 1..=buckets in
/// ascending order, or buckets..=1 when descending.
pub fn quantile_scores(values: &[f64], groups: usize, order: ScoreOrder) -> Vec<u8> {
    if values.is_empty() || groups == 0 {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut edges: Vec<f64> = (0..=groups)
        .map(|i| interpolated_quantile(&sorted, i as f64 / groups as f64))
        .collect();
    edges.dedup();
    let interior: &[f64] = if edges.len() >= 2 {
        &edges[1..edges.len() - 1]
    } else {
        &[]
    };
    let buckets = interior.len() + 1;

    values
        .iter()
        .map(|value| {
            let bucket = interior.iter().filter(|&&edge| *value > edge).count();
            match order {
                ScoreOrder::Ascending => (bucket + 1) as u8,
                ScoreOrder::Descending => (buckets - bucket) as u8,
            }
        })
        .collect()
}

fn interpolated_quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = p * (n - 1) as f64;
    let low = h.floor() as usize;
    let high = (low + 1).min(n - 1);
    let fraction = h - low as f64;
    sorted[low] + fraction * (sorted[high] - sorted[low])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::USD_TO_INR_RATE;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn transaction(id: &str, day: u32, quantity: f64, price: f64) -> Transaction {
        Transaction {
            customer_id: id.to_string(),
            customer_name: None,
            invoice_date: date(2024, 3, day),
            quantity,
            unit_price: price,
            amount: quantity * price * USD_TO_INR_RATE,
        }
    }

    #[test]
    fn aggregates_the_worked_example() {
        let transactions = vec![transaction("C1", 1, 2.0, 10.0), transaction("C1", 5, 1.0, 5.0)];
        let (metrics, reference_date) = aggregate(&transactions).unwrap();

        assert_eq!(reference_date, date(2024, 3, 6));
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].frequency, 2);
        assert_eq!(metrics[0].monetary, (2.0 * 10.0 + 1.0 * 5.0) * USD_TO_INR_RATE);
        assert_eq!(metrics[0].recency, 1);
    }

    #[test]
    fn aggregate_on_empty_input_is_an_error() {
        assert!(matches!(aggregate(&[]), Err(RfmError::EmptyDataset)));
    }

    #[test]
    fn output_ids_are_distinct_and_sorted() {
        let transactions = vec![
            transaction("B", 1, 1.0, 1.0),
            transaction("A", 2, 1.0, 1.0),
            transaction("B", 3, 1.0, 1.0),
            transaction("C", 4, 1.0, 1.0),
        ];
        let (metrics, _) = aggregate(&transactions).unwrap();
        let ids: Vec<&str> = metrics.iter().map(|m| m.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn first_seen_name_wins_per_customer() {
        let mut unnamed = transaction("C1", 1, 1.0, 1.0);
        unnamed.customer_name = None;
        let mut named = transaction("C1", 2, 1.0, 1.0);
        named.customer_name = Some("Asha".to_string());
        let mut renamed = transaction("C1", 3, 1.0, 1.0);
        renamed.customer_name = Some("Other".to_string());

        let (metrics, _) = aggregate(&[unnamed, named, renamed]).unwrap();
        assert_eq!(metrics[0].customer_name.as_deref(), Some("Asha"));
    }

    #[test]
    fn rank_first_breaks_ties_by_position() {
        assert_eq!(rank_first(&[2.0, 1.0, 2.0]), vec![2.0, 1.0, 3.0]);
        assert_eq!(rank_first(&[3.0, 1.0, 2.0, 5.0, 4.0]), vec![3.0, 1.0, 2.0, 5.0, 4.0]);
    }

    #[test]
    fn descending_scores_invert_recency() {
        let recency: Vec<f64> = (1..=10).map(f64::from).collect();
        let scores = quantile_scores(&recency, 5, ScoreOrder::Descending);
        assert_eq!(scores, vec![5, 5, 4, 4, 3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn ascending_scores_on_ranks_cover_all_groups() {
        let ranks = rank_first(&[3.0, 1.0, 2.0, 5.0, 4.0]);
        let scores = quantile_scores(&ranks, 5, ScoreOrder::Ascending);
        assert_eq!(scores, vec![3, 1, 2, 5, 4]);
    }

    #[test]
    fn duplicate_edges_collapse_buckets() {
        let scores = quantile_scores(&[5.0, 5.0, 5.0, 5.0, 10.0], 5, ScoreOrder::Descending);
        assert_eq!(scores, vec![2, 2, 2, 2, 1]);
    }

    #[test]
    fn constant_values_collapse_to_one_bucket() {
        assert_eq!(
            quantile_scores(&[7.0, 7.0, 7.0], 5, ScoreOrder::Descending),
            vec![1, 1, 1]
        );
        assert_eq!(
            quantile_scores(&[7.0, 7.0, 7.0], 5, ScoreOrder::Ascending),
            vec![1, 1, 1]
        );
    }

    #[test]
    fn single_customer_scores_without_panic() {
        let customers = score_customers(vec![CustomerMetrics {
            customer_id: "only".to_string(),
            customer_name: None,
            recency: 3,
            frequency: 4,
            monetary: 100.0,
        }]);
        assert_eq!(customers.len(), 1);
        let c = &customers[0];
        assert!((1..=5).contains(&c.r_score));
        assert!((1..=5).contains(&c.f_score));
        assert!((1..=5).contains(&c.m_score));
        assert_eq!(c.rfm_score_numeric, c.r_score + c.f_score + c.m_score);
    }

    #[test]
    fn composite_scores_are_consistent() {
        let metrics: Vec<CustomerMetrics> = (0..20)
            .map(|i| CustomerMetrics {
                customer_id: format!("c{i:02}"),
                customer_name: None,
                recency: 1 + i as i64,
                frequency: 1 + (i % 7) as u64,
                monetary: 50.0 * (i + 1) as f64,
            })
            .collect();
        let customers = score_customers(metrics);

        for c in &customers {
            assert!((1..=5).contains(&c.r_score));
            assert!((1..=5).contains(&c.f_score));
            assert!((1..=5).contains(&c.m_score));
            assert_eq!(c.rfm_score, format!("{}{}{}", c.r_score, c.f_score, c.m_score));
            assert_eq!(c.rfm_score_numeric, c.r_score + c.f_score + c.m_score);
            assert!((3..=15).contains(&c.rfm_score_numeric));
        }
        // Lowest recency must land in the best group.
        assert_eq!(customers[0].r_score, 5);
        assert_eq!(customers.last().unwrap().r_score, 1);
    }
}
