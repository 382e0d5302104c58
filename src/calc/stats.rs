use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub mean: f64,
    /// Population standard deviation (divides by N).
    pub std_dev: f64,
}

/// Mean and population standard deviation of one subject's class scores.
/// An empty series yields zeros.
pub fn compute_class_statistics(scores: &[f64]) -> ClassStatistics {
    if scores.is_empty() {
        return ClassStatistics::default();
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    ClassStatistics {
        mean,
        std_dev: variance.max(0.0).sqrt(),
    }
}
