use std::collections::HashMap;

use crate::schema::Transaction;

pub const NO_ANOMALIES_MESSAGE: &str = "Great job! No unusual spending detected this month.";

/// One-sentence summary of the anomalous subset.
///
/// Template based so that an upload never costs a second service call.
pub fn generate_insight(anomalies: &[Transaction]) -> String {
    let Some(category) = dominant_category(anomalies) else {
        return NO_ANOMALIES_MESSAGE.to_string();
    };

    let total: f64 = anomalies.iter().map(|t| t.amount.abs()).sum();

    format!(
        "You had {} unusual transactions totaling ${:.2}, mostly on {}. \
         Consider if these were planned purchases or impulse buys. \
         A quick pause before buying can help!",
        anomalies.len(),
        total,
        category
    )
}

/// Most frequent category; the earliest seen wins a tie.
fn dominant_category(transactions: &[Transaction]) -> Option<&str> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, txn) in transactions.iter().enumerate() {
        counts
            .entry(txn.category.as_str())
            .or_insert((0, position))
            .0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(category, _)| category)
}
