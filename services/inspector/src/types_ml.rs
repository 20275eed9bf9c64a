use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainingResult {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub training_chart_data: TrainingChartData,
    pub confusion_matrix: ConfusionMatrix,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub border_color: String,
    pub background_color: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfusionMatrix {
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

/// One streamed prediction from the simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationResult {
    pub timestamp: String,
    pub sample_id: String,
    pub prediction: String,
    pub confidence: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationStats {
    pub total_predictions: u64,
    pub pass_count: u64,
    pub fail_count: u64,
    pub average_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_result_tolerates_missing_fields() {
        let r: TrainingResult = serde_json::from_str(
            r#"{"accuracy":0.9,"f1Score":0.8,"confusionMatrix":{"truePositives":3}}"#,
        )
        .unwrap();
        assert_eq!(r.accuracy, 0.9);
        assert_eq!(r.f1_score, 0.8);
        assert_eq!(r.confusion_matrix.true_positives, 3);
        assert!(r.training_chart_data.labels.is_empty());
    }

    #[test]
    fn simulation_result_reads_camel_case() {
        let r: SimulationResult = serde_json::from_str(
            r#"{"timestamp":"2024-01-01T00:00:00","sampleId":"SAMPLE_0001","prediction":"Pass","confidence":0.97}"#,
        )
        .unwrap();
        assert_eq!(r.sample_id, "SAMPLE_0001");
        assert_eq!(r.prediction, "Pass");
    }
}
