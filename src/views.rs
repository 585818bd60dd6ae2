//! Read-only query views over the active analysis snapshot

use std::collections::{BTreeMap, HashMap};

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::error::{Result, RfmError};
use crate::rfm::{ScoredCustomer, Snapshot};
use crate::segment::Segment;

/// Maximum number of points returned by the scatter view.
pub const SCATTER_SAMPLE_LIMIT: usize = 1000;

/// Number of customers returned by the top-customers list.
pub const TOP_CUSTOMER_LIMIT: usize = 10;

/// Segments surfaced in the insights view, in display order.
pub const INSIGHT_SEGMENTS: [Segment; 5] = [
    Segment::Champions,
    Segment::AtRisk,
    Segment::Hibernating,
    Segment::Promising,
    Segment::Loyal,
];

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub total_customers: usize,
    pub total_revenue: f64,
    pub total_segments: usize,
    pub top_segment: String,
    pub top_segment_count: usize,
    pub avg_recency: f64,
    pub avg_frequency: f64,
    pub avg_monetary: f64,
    pub segment_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct SegmentShare {
    pub segment: Segment,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct SegmentRevenue {
    pub segment: Segment,
    pub revenue: f64,
}

#[derive(Debug, Serialize)]
pub struct ScoreBucket {
    pub score: u8,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DistributionView {
    pub segment_distribution: Vec<SegmentShare>,
    pub revenue_by_segment: Vec<SegmentRevenue>,
    pub score_distribution: Vec<ScoreBucket>,
}

#[derive(Debug, Serialize)]
pub struct SegmentInsight {
    pub segment: Segment,
    pub count: usize,
    pub revenue: f64,
    pub percentage: f64,
    pub recommendation: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TopCustomer {
    pub customerid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customername: Option<String>,
    pub monetary: f64,
    pub frequency: u64,
    pub recency: i64,
    pub segment: Segment,
}

#[derive(Debug, Serialize)]
pub struct InsightsView {
    pub insights: Vec<SegmentInsight>,
    pub top_customers: Vec<TopCustomer>,
}

#[derive(Debug, Serialize)]
pub struct ScatterPoint {
    pub recency: i64,
    pub frequency: u64,
    pub monetary: f64,
    pub segment: Segment,
}

#[derive(Debug, Serialize)]
pub struct ScatterView {
    pub data: Vec<ScatterPoint>,
    pub total_points: usize,
    pub displayed_points: usize,
}

fn segment_counts(customers: &[ScoredCustomer]) -> HashMap<Segment, usize> {
    let mut counts = HashMap::new();
    for customer in customers {
        *counts.entry(customer.segment).or_insert(0) += 1;
    }
    counts
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Headline statistics for the whole snapshot.
pub fn summary(snapshot: &Snapshot) -> SummaryView {
    let customers = &snapshot.customers;
    let total = customers.len();
    let total_revenue: f64 = customers.iter().map(|c| c.monetary).sum();
    let counts = segment_counts(customers);

    // Ties on the top segment break toward the lexicographically first label.
    let (top_segment, top_segment_count) = counts
        .iter()
        .max_by(|(label_a, count_a), (label_b, count_b)| {
            count_a
                .cmp(count_b)
                .then_with(|| label_b.label().cmp(label_a.label()))
        })
        .map(|(segment, count)| (segment.label().to_string(), *count))
        .unwrap_or_default();

    SummaryView {
        total_customers: total,
        total_revenue,
        total_segments: counts.len(),
        top_segment,
        top_segment_count,
        avg_recency: customers.iter().map(|c| c.recency as f64).sum::<f64>() / total as f64,
        avg_frequency: customers.iter().map(|c| c.frequency as f64).sum::<f64>() / total as f64,
        avg_monetary: total_revenue / total as f64,
        segment_counts: counts
            .iter()
            .map(|(segment, count)| (segment.label().to_string(), *count))
            .collect(),
    }
}

/// Chart-oriented distributions: cohort sizes, revenue, and score spread.
pub fn distribution(snapshot: &Snapshot) -> DistributionView {
    let customers = &snapshot.customers;
    let total = customers.len();
    let counts = segment_counts(customers);

    let mut segment_distribution: Vec<SegmentShare> = counts
        .iter()
        .map(|(segment, count)| SegmentShare {
            segment: *segment,
            count: *count,
            percentage: round2(*count as f64 / total as f64 * 100.0),
        })
        .collect();
    segment_distribution.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.segment.label().cmp(b.segment.label()))
    });

    let mut revenue: HashMap<Segment, f64> = HashMap::new();
    for customer in customers {
        *revenue.entry(customer.segment).or_insert(0.0) += customer.monetary;
    }
    let mut revenue_by_segment: Vec<SegmentRevenue> = revenue
        .into_iter()
        .map(|(segment, revenue)| SegmentRevenue { segment, revenue })
        .collect();
    revenue_by_segment.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.segment.label().cmp(b.segment.label()))
    });

    let mut score_counts: BTreeMap<u8, usize> = BTreeMap::new();
    for customer in customers {
        *score_counts.entry(customer.rfm_score_numeric).or_insert(0) += 1;
    }
    let score_distribution = score_counts
        .into_iter()
        .map(|(score, count)| ScoreBucket { score, count })
        .collect();

    DistributionView {
        segment_distribution,
        revenue_by_segment,
        score_distribution,
    }
}

/// Recommendations for the fixed insight segments plus the top spenders.
///
/// Segments with zero members are omitted entirely rather than reported
/// with empty numbers.
pub fn insights(snapshot: &Snapshot) -> InsightsView {
    let customers = &snapshot.customers;
    let total = customers.len();

    let insights = INSIGHT_SEGMENTS
        .iter()
        .filter_map(|&segment| {
            let members: Vec<&ScoredCustomer> =
                customers.iter().filter(|c| c.segment == segment).collect();
            if members.is_empty() {
                return None;
            }
            Some(SegmentInsight {
                segment,
                count: members.len(),
                revenue: members.iter().map(|c| c.monetary).sum(),
                percentage: members.len() as f64 / total as f64 * 100.0,
                recommendation: segment.recommendation().unwrap_or_default(),
                icon: segment.icon().unwrap_or_default(),
            })
        })
        .collect();

    InsightsView {
        insights,
        top_customers: top_customers(snapshot),
    }
}

/// The highest-monetary customers, descending, capped at ten.
pub fn top_customers(snapshot: &Snapshot) -> Vec<TopCustomer> {
    let mut ranked: Vec<&ScoredCustomer> = snapshot.customers.iter().collect();
    ranked.sort_by(|a, b| {
        b.monetary
            .partial_cmp(&a.monetary)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(TOP_CUSTOMER_LIMIT)
        .map(|c| TopCustomer {
            customerid: c.customer_id.clone(),
            customername: if snapshot.has_names {
                c.customer_name.clone()
            } else {
                None
            },
            monetary: c.monetary,
            frequency: c.frequency,
            recency: c.recency,
            segment: c.segment,
        })
        .collect()
}

/// Raw RFM points for scatter plots, sampled down for large datasets.
pub fn scatter(snapshot: &Snapshot) -> ScatterView {
    let customers = &snapshot.customers;
    let total = customers.len();

    let point = |c: &ScoredCustomer| ScatterPoint {
        recency: c.recency,
        frequency: c.frequency,
        monetary: c.monetary,
        segment: c.segment,
    };
    let data: Vec<ScatterPoint> = if total > SCATTER_SAMPLE_LIMIT {
        customers
            .choose_multiple(&mut rand::thread_rng(), SCATTER_SAMPLE_LIMIT)
            .map(point)
            .collect()
    } else {
        customers.iter().map(point).collect()
    };

    ScatterView {
        displayed_points: data.len(),
        total_points: total,
        data,
    }
}

/// Serialize the scored snapshot as CSV with a fixed column order.
pub fn export_csv(snapshot: &Snapshot) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = vec!["customerid", "recency", "frequency", "monetary"];
    if snapshot.has_names {
        header.push("customername");
    }
    header.extend([
        "r_score",
        "f_score",
        "m_score",
        "rfm_score",
        "rfm_score_numeric",
        "segment",
    ]);
    writer
        .write_record(&header)
        .map_err(|e| RfmError::Internal(e.to_string()))?;

    for c in &snapshot.customers {
        let mut record: Vec<String> = vec![
            c.customer_id.clone(),
            c.recency.to_string(),
            c.frequency.to_string(),
            c.monetary.to_string(),
        ];
        if snapshot.has_names {
            record.push(c.customer_name.clone().unwrap_or_default());
        }
        record.extend([
            c.r_score.to_string(),
            c.f_score.to_string(),
            c.m_score.to_string(),
            c.rfm_score.clone(),
            c.rfm_score_numeric.to_string(),
            c.segment.label().to_string(),
        ]);
        writer
            .write_record(&record)
            .map_err(|e| RfmError::Internal(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| RfmError::Internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RfmError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn customer(id: &str, recency: i64, frequency: u64, monetary: f64, segment: Segment) -> ScoredCustomer {
        ScoredCustomer {
            customer_id: id.to_string(),
            customer_name: Some(format!("name-{id}")),
            recency,
            frequency,
            monetary,
            r_score: 3,
            f_score: 3,
            m_score: 3,
            rfm_score: "333".to_string(),
            rfm_score_numeric: 9,
            segment,
        }
    }

    fn snapshot(customers: Vec<ScoredCustomer>, has_names: bool) -> Snapshot {
        Snapshot {
            customers,
            reference_date: NaiveDate::from_ymd_opt(2024, 3, 6)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            has_names,
        }
    }

    fn mixed_snapshot() -> Snapshot {
        snapshot(
            vec![
                customer("a", 2, 5, 1000.0, Segment::Champions),
                customer("b", 3, 4, 800.0, Segment::Champions),
                customer("c", 10, 2, 300.0, Segment::Hibernating),
                customer("d", 30, 1, 50.0, Segment::Others),
            ],
            true,
        )
    }

    #[test]
    fn summary_reports_totals_and_top_segment() {
        let view = summary(&mixed_snapshot());
        assert_eq!(view.total_customers, 4);
        assert_eq!(view.total_revenue, 2150.0);
        assert_eq!(view.total_segments, 3);
        assert_eq!(view.top_segment, "Champions");
        assert_eq!(view.top_segment_count, 2);
        assert_eq!(view.avg_monetary, 2150.0 / 4.0);
        assert_eq!(view.segment_counts["Champions"], 2);
        assert_eq!(view.segment_counts["Hibernating"], 1);
    }

    #[test]
    fn distribution_revenue_sums_to_total() {
        let snap = mixed_snapshot();
        let view = distribution(&snap);
        let revenue_total: f64 = view.revenue_by_segment.iter().map(|r| r.revenue).sum();
        let monetary_total: f64 = snap.customers.iter().map(|c| c.monetary).sum();
        assert!((revenue_total - monetary_total).abs() < 1e-9);

        // Sorted descending by revenue, counts carry rounded percentages.
        assert_eq!(view.revenue_by_segment[0].segment, Segment::Champions);
        assert_eq!(view.segment_distribution[0].count, 2);
        assert_eq!(view.segment_distribution[0].percentage, 50.0);
    }

    #[test]
    fn score_distribution_is_ascending() {
        let mut customers = mixed_snapshot().customers;
        customers[0].rfm_score_numeric = 15;
        customers[1].rfm_score_numeric = 3;
        customers[2].rfm_score_numeric = 9;
        customers[3].rfm_score_numeric = 3;
        let view = distribution(&snapshot(customers, true));
        let scores: Vec<u8> = view.score_distribution.iter().map(|b| b.score).collect();
        assert_eq!(scores, vec![3, 9, 15]);
        assert_eq!(view.score_distribution[0].count, 2);
    }

    #[test]
    fn insights_skip_empty_segments_and_keep_order() {
        let view = insights(&mixed_snapshot());
        let segments: Vec<Segment> = view.insights.iter().map(|i| i.segment).collect();
        // Only Champions and Hibernating are populated, in insight order.
        assert_eq!(segments, vec![Segment::Champions, Segment::Hibernating]);
        assert_eq!(view.insights[0].count, 2);
        assert_eq!(view.insights[0].revenue, 1800.0);
        assert_eq!(view.insights[0].icon, "trophy");
        assert!(view.insights[0].percentage > 0.0);
    }

    #[test]
    fn top_customers_are_sorted_by_monetary_desc() {
        let view = top_customers(&mixed_snapshot());
        let ids: Vec<&str> = view.iter().map(|c| c.customerid.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(view[0].customername.as_deref(), Some("name-a"));
    }

    #[test]
    fn top_customers_drop_names_when_schema_had_none() {
        let snap = snapshot(mixed_snapshot().customers, false);
        let view = top_customers(&snap);
        assert!(view.iter().all(|c| c.customername.is_none()));
    }

    #[test]
    fn scatter_returns_everything_under_the_limit() {
        let view = scatter(&mixed_snapshot());
        assert_eq!(view.total_points, 4);
        assert_eq!(view.displayed_points, 4);
        assert_eq!(view.data.len(), 4);
    }

    #[test]
    fn scatter_samples_down_large_snapshots() {
        let customers: Vec<ScoredCustomer> = (0..1200)
            .map(|i| customer(&format!("c{i}"), i64::from(i % 50), 1, 10.0, Segment::Others))
            .collect();
        let view = scatter(&snapshot(customers, false));
        assert_eq!(view.total_points, 1200);
        assert_eq!(view.displayed_points, SCATTER_SAMPLE_LIMIT);
        assert_eq!(view.data.len(), SCATTER_SAMPLE_LIMIT);
    }

    #[test]
    fn export_uses_the_fixed_column_order() {
        let csv = export_csv(&mixed_snapshot()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "customerid,recency,frequency,monetary,customername,\
             r_score,f_score,m_score,rfm_score,rfm_score_numeric,segment"
        );
        assert_eq!(csv.lines().count(), 5);
        let first = lines.next().unwrap();
        assert!(first.starts_with("a,2,5,1000,name-a,"));
    }

    #[test]
    fn export_without_names_omits_the_column() {
        let snap = snapshot(mixed_snapshot().customers, false);
        let csv = export_csv(&snap).unwrap();
        assert!(!csv.lines().next().unwrap().contains("customername"));
    }
}
