use async_trait::async_trait;

use super::{download_to_file, CollectionAgent, CollectionContext, CollectionResult};
use crate::fetch::FetchOptions;
use crate::tools::date::{latest_00z_analysis, yymmdd};

/// SPC upper-air analysis charts. Only the 00Z analysis is archived, and
/// it posts with delay, so the `{date}` template resolves to the most
/// recent complete analysis rather than the calendar date.
pub struct UpperAirAgent {
    url_templates: Vec<(String, String)>,
}

impl UpperAirAgent {
    pub fn new(url_templates: Vec<(String, String)>) -> UpperAirAgent {
        UpperAirAgent { url_templates }
    }
}

impl Default for UpperAirAgent {
    fn default() -> Self {
        UpperAirAgent::new(vec![
            (
                "250mb_analysis.gif".into(),
                "https://www.spc.noaa.gov/obswx/maps/250_{date}_00.gif".into(),
            ),
            (
                "500mb_analysis.gif".into(),
                "https://www.spc.noaa.gov/obswx/maps/500_{date}_00.gif".into(),
            ),
        ])
    }
}

#[async_trait]
impl CollectionAgent for UpperAirAgent {
    fn name(&self) -> &'static str {
        "upper_air"
    }

    async fn collect(&self, ctx: &CollectionContext<'_>) -> CollectionResult {
        let mut result = CollectionResult::new(self.name());
        let date_token = yymmdd(&latest_00z_analysis(ctx.now));
        let options = FetchOptions::default();

        for (file_name, template) in &self.url_templates {
            let url = template.replace("{date}", &date_token);
            let mut record = download_to_file(
                ctx,
                &url,
                file_name,
                "SPC 00Z upper-air analysis",
                "spc",
                "gif",
                &options,
            )
            .await;
            record
                .extra
                .insert("analysis_date".into(), serde_json::Value::from(date_token.clone()));
            result.push(record);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_date_template_resolution() {
        let late_morning = Utc.with_ymd_and_hms(2024, 11, 14, 10, 0, 0).single().unwrap();
        let token = yymmdd(&latest_00z_analysis(late_morning));
        assert_eq!(
            "https://www.spc.noaa.gov/obswx/maps/250_{date}_00.gif".replace("{date}", &token),
            "https://www.spc.noaa.gov/obswx/maps/250_241114_00.gif"
        );

        // before 02Z the previous day's analysis is the latest posted
        let just_past_midnight = Utc.with_ymd_and_hms(2024, 11, 14, 1, 0, 0).single().unwrap();
        let token = yymmdd(&latest_00z_analysis(just_past_midnight));
        assert_eq!(token, "241113");
    }
}
