use super::performance::{BiasCategory, PerformanceReport};

const MIN_FEEDBACK_SAMPLES: i64 = 10;

/// Converts the performance report into plain-language guidance the
/// narrative layer prepends to its prompts. Sparse history yields an empty
/// string so weak signals never steer generation.
pub fn build_adaptive_context(report: &PerformanceReport) -> String {
    if !report.has_data || report.total_samples < MIN_FEEDBACK_SAMPLES {
        return String::new();
    }

    let mut lines = vec![];

    if report.overall_mae > 2.5 {
        lines.push(format!(
            "Overall forecast error is elevated (MAE {:.1} ft over the last {} days); be conservative with size calls.",
            report.overall_mae, report.window_days
        ));
    }

    for shore in &report.shores {
        let name = capitalize(&shore.shore);
        if shore.avg_bias > 0.5 {
            lines.push(format!(
                "{} shore has recently been overpredicting by {:.1} ft; bias size estimates down.",
                name, shore.avg_bias
            ));
        } else if shore.avg_bias < -0.5 {
            lines.push(format!(
                "{} shore has recently been underpredicting by {:.1} ft; bias size estimates up.",
                name,
                shore.avg_bias.abs()
            ));
        } else if shore.avg_bias.abs() <= 0.3 && shore.mae < 1.5 {
            lines.push(format!(
                "{} shore predictions are well-calibrated; maintain the current approach.",
                name
            ));
        }
    }

    if report.overall_categorical_accuracy < 0.70 {
        lines.push(
            "Categorical accuracy is low; reassess the size category thresholds.".to_string(),
        );
    }

    // surface systematic alerts even when the per-shore bias rules above
    // were inconclusive
    for alert in &report.bias_alerts {
        if alert.category != BiasCategory::Balanced
            && !lines.iter().any(|l| l.starts_with(&capitalize(&alert.shore)))
        {
            let verb = match alert.category {
                BiasCategory::Overpredicting => "overpredicting",
                BiasCategory::Underpredicting => "underpredicting",
                BiasCategory::Balanced => continue,
            };
            lines.push(format!(
                "{} shore shows a systematic {} pattern across {} recent validations.",
                capitalize(&alert.shore),
                verb,
                alert.sample_size
            ));
        }
    }

    lines.join("\n")
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::performance::{BiasAlert, ShorePerformance};

    fn report() -> PerformanceReport {
        PerformanceReport {
            has_data: true,
            window_days: 7,
            total_samples: 15,
            overall_mae: 1.0,
            overall_rmse: 1.3,
            overall_bias: 0.2,
            overall_categorical_accuracy: 0.85,
            shores: vec![],
            bias_alerts: vec![],
        }
    }

    #[test]
    fn test_no_data_yields_empty_context() {
        let mut r = report();
        r.has_data = false;
        assert_eq!(build_adaptive_context(&r), "");

        let mut r = report();
        r.total_samples = 5;
        assert_eq!(build_adaptive_context(&r), "");
    }

    #[test]
    fn test_overprediction_guidance() {
        let mut r = report();
        r.shores = vec![ShorePerformance {
            shore: "north".into(),
            sample_count: 15,
            mae: 1.4,
            rmse: 1.6,
            avg_bias: 1.2,
            categorical_accuracy: 0.8,
        }];
        r.bias_alerts = vec![BiasAlert {
            shore: "north".into(),
            category: BiasCategory::Overpredicting,
            avg_bias: 1.2,
            sample_size: 15,
        }];

        let context = build_adaptive_context(&r);
        assert!(context.contains("North shore has recently been overpredicting by 1.2 ft"));
        assert!(context.contains("bias size estimates down"));
    }

    #[test]
    fn test_well_calibrated_guidance() {
        let mut r = report();
        r.shores = vec![ShorePerformance {
            shore: "south".into(),
            sample_count: 12,
            mae: 1.0,
            rmse: 1.2,
            avg_bias: 0.1,
            categorical_accuracy: 0.9,
        }];

        let context = build_adaptive_context(&r);
        assert!(context.contains("South shore predictions are well-calibrated"));
    }

    #[test]
    fn test_elevated_mae_and_categorical_rules() {
        let mut r = report();
        r.overall_mae = 3.1;
        r.overall_categorical_accuracy = 0.6;

        let context = build_adaptive_context(&r);
        assert!(context.contains("be conservative"));
        assert!(context.contains("reassess the size category thresholds"));
    }

    #[test]
    fn test_underprediction_guidance() {
        let mut r = report();
        r.shores = vec![ShorePerformance {
            shore: "west".into(),
            sample_count: 11,
            mae: 1.8,
            rmse: 2.0,
            avg_bias: -0.8,
            categorical_accuracy: 0.75,
        }];

        let context = build_adaptive_context(&r);
        assert!(context.contains("West shore has recently been underpredicting"));
        assert!(context.contains("bias size estimates up"));
    }
}
