use chrono::{DateTime, Duration, Timelike, Utc};

/// Creates a datetime for the most recent complete 00Z upper-air analysis.
/// The 00Z charts post with a delay, so before 02:00 UTC the previous day's
/// analysis is the latest one actually available.
pub fn latest_00z_analysis(datetime: DateTime<Utc>) -> DateTime<Utc> {
    let adjusted = if datetime.hour() < 2 {
        datetime - Duration::days(1)
    } else {
        datetime
    };

    adjusted
        .with_hour(0)
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(adjusted)
}

/// Formats a datetime as the YYMMDD token used in SPC archive URLs.
pub fn yymmdd(datetime: &DateTime<Utc>) -> String {
    datetime.format("%y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_latest_00z_after_posting_window() {
        let now = Utc.with_ymd_and_hms(2024, 11, 14, 9, 30, 0).single().unwrap();
        let analysis = latest_00z_analysis(now);
        assert_eq!(yymmdd(&analysis), "241114");
        assert_eq!(analysis.hour(), 0);
    }

    #[test]
    fn test_latest_00z_before_posting_window() {
        let now = Utc.with_ymd_and_hms(2024, 11, 14, 1, 15, 0).single().unwrap();
        let analysis = latest_00z_analysis(now);
        assert_eq!(yymmdd(&analysis), "241113");
    }

    #[test]
    fn test_latest_00z_rolls_over_month() {
        let now = Utc.with_ymd_and_hms(2024, 11, 1, 0, 30, 0).single().unwrap();
        let analysis = latest_00z_analysis(now);
        assert_eq!(yymmdd(&analysis), "241031");
    }
}
