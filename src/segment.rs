//! Rule-based customer segmentation over RFM scores

use serde::Serialize;
use std::fmt;

/// Marketing cohort assigned from the three quantile scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Segment {
    Champions,
    Loyal,
    Promising,
    #[serde(rename = "At Risk")]
    AtRisk,
    Hibernating,
    #[serde(rename = "Cannot Lose")]
    CannotLose,
    #[serde(rename = "New Customers")]
    NewCustomers,
    #[serde(rename = "Need Attention")]
    NeedAttention,
    Others,
}

type Rule = (fn(u8, u8, u8) -> bool, Segment);

/// The decision list, evaluated top to bottom with first match winning.
///
/// Rule order is load-bearing: the predicates overlap, and reordering them
/// changes which label overlapping score triples receive. The Cannot Lose
/// branch is retained in its historical position even though the Loyal rule
/// above it already captures every triple it would match.
const RULES: [Rule; 8] = [
    (|r, f, m| r >= 4 && f >= 4 && m >= 4, Segment::Champions),
    (|_, f, m| f >= 4 && m >= 3, Segment::Loyal),
    (|r, f, _| r >= 4 && (2..=3).contains(&f), Segment::Promising),
    (|r, f, m| r <= 2 && f >= 3 && m >= 3, Segment::AtRisk),
    (|r, f, _| r <= 2 && f <= 2, Segment::Hibernating),
    (|r, f, m| r <= 2 && f >= 4 && m >= 4, Segment::CannotLose),
    (|r, f, _| r >= 4 && f <= 2, Segment::NewCustomers),
    (|r, f, m| r >= 3 && f >= 2 && m >= 2, Segment::NeedAttention),
];

/// Assign a segment from a score triple; pure and deterministic.
pub fn classify(r_score: u8, f_score: u8, m_score: u8) -> Segment {
    RULES
        .iter()
        .find(|(predicate, _)| predicate(r_score, f_score, m_score))
        .map(|(_, segment)| *segment)
        .unwrap_or(Segment::Others)
}

impl Segment {
    /// Human-readable label, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::Loyal => "Loyal",
            Segment::Promising => "Promising",
            Segment::AtRisk => "At Risk",
            Segment::Hibernating => "Hibernating",
            Segment::CannotLose => "Cannot Lose",
            Segment::NewCustomers => "New Customers",
            Segment::NeedAttention => "Need Attention",
            Segment::Others => "Others",
        }
    }

    /// Marketing recommendation shown in the insights view, where defined.
    pub fn recommendation(&self) -> Option<&'static str> {
        match self {
            Segment::Champions => Some(
                "Reward these customers with exclusive offers and early access to new products. \
                 They are your best advocates.",
            ),
            Segment::AtRisk => Some(
                "Send personalized win-back campaigns. Offer special discounts to re-engage them.",
            ),
            Segment::Hibernating => Some(
                "Consider re-engagement campaigns or remove from active marketing to reduce costs.",
            ),
            Segment::Promising => Some(
                "Nurture these customers with loyalty programs to increase their frequency and value.",
            ),
            Segment::Loyal => Some(
                "Maintain engagement with regular communication and appreciation rewards.",
            ),
            _ => None,
        }
    }

    /// Display icon tag paired with the recommendation.
    pub fn icon(&self) -> Option<&'static str> {
        match self {
            Segment::Champions => Some("trophy"),
            Segment::AtRisk => Some("alert-triangle"),
            Segment::Hibernating => Some("moon"),
            Segment::Promising => Some("trending-up"),
            Segment::Loyal => Some("heart"),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
