use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::{download_to_file, CollectionAgent, CollectionContext, CollectionResult};
use crate::fetch::FetchOptions;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Endpoint {
    pub file_name: String,
    pub url: String,
    pub description: String,
    pub file_type: String,
}

/// Expands the URL template placeholders shared by the simple agents:
/// `{date}` (YYYYMMDD, UTC today) and `{hour}` (current synoptic hour).
pub fn expand_placeholders(template: &str, now: DateTime<Utc>) -> String {
    let synoptic_hour = format!("{:02}", now.hour() / 6 * 6);
    template
        .replace("{date}", &now.format("%Y%m%d").to_string())
        .replace("{hour}", &synoptic_hour)
}

/// Agent for providers that are just a fixed set of documents per run:
/// weather text products, tide predictions, tropical outlooks, surface
/// charts, satellite imagery, climatology references. Each instance is one
/// provider with its own endpoint set; they all share the collection
/// contract and differ only in data.
pub struct StaticEndpointAgent {
    name: &'static str,
    source: String,
    endpoints: Vec<Endpoint>,
}

impl StaticEndpointAgent {
    pub fn new(name: &'static str, source: &str, endpoints: Vec<Endpoint>) -> StaticEndpointAgent {
        StaticEndpointAgent {
            name,
            source: source.into(),
            endpoints,
        }
    }

    pub fn weather() -> StaticEndpointAgent {
        StaticEndpointAgent::new(
            "weather",
            "nws",
            vec![
                Endpoint {
                    file_name: "hfo_forecast.json".into(),
                    url: "https://api.weather.gov/gridpoints/HFO/155,84/forecast".into(),
                    description: "NWS Honolulu zone forecast".into(),
                    file_type: "json".into(),
                },
                Endpoint {
                    file_name: "marine_forecast.json".into(),
                    url: "https://marine-api.open-meteo.com/v1/marine?latitude=21.3&longitude=-158.1&hourly=wave_height,wave_direction,wave_period,swell_wave_height,swell_wave_direction,swell_wave_period".into(),
                    description: "hourly marine forecast, south shore point".into(),
                    file_type: "json".into(),
                },
            ],
        )
    }

    pub fn tides() -> StaticEndpointAgent {
        StaticEndpointAgent::new(
            "tides",
            "noaa_tides",
            vec![Endpoint {
                file_name: "honolulu_tides.json".into(),
                url: "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter?station=1612340&product=predictions&datum=MLLW&time_zone=gmt&units=metric&format=json&date=today".into(),
                description: "Honolulu harbor tide predictions".into(),
                file_type: "json".into(),
            }],
        )
    }

    pub fn tropical() -> StaticEndpointAgent {
        StaticEndpointAgent::new(
            "tropical",
            "nhc",
            vec![Endpoint {
                file_name: "cpac_outlook.xml".into(),
                url: "https://www.nhc.noaa.gov/xml/TWOCP.xml".into(),
                description: "central Pacific tropical weather outlook".into(),
                file_type: "xml".into(),
            }],
        )
    }

    pub fn charts() -> StaticEndpointAgent {
        StaticEndpointAgent::new(
            "charts",
            "opc",
            vec![
                Endpoint {
                    file_name: "pacific_surface.gif".into(),
                    url: "https://ocean.weather.gov/P_sfc_full_ocean_color.png".into(),
                    description: "OPC Pacific surface analysis".into(),
                    file_type: "image".into(),
                },
                Endpoint {
                    file_name: "pacific_24h.gif".into(),
                    url: "https://ocean.weather.gov/P_24hrsfc.gif".into(),
                    description: "OPC 24 h surface forecast".into(),
                    file_type: "image".into(),
                },
            ],
        )
    }

    pub fn satellite() -> StaticEndpointAgent {
        StaticEndpointAgent::new(
            "satellite",
            "noaa_goes",
            vec![Endpoint {
                file_name: "goes_pacific.jpg".into(),
                url: "https://cdn.star.nesdis.noaa.gov/GOES18/ABI/SECTOR/hi/GEOCOLOR/latest.jpg".into(),
                description: "GOES-West Hawaii sector geocolor".into(),
                file_type: "image".into(),
            }],
        )
    }

    pub fn climatology() -> StaticEndpointAgent {
        StaticEndpointAgent::new(
            "climatology",
            "noaa_cpc",
            vec![Endpoint {
                file_name: "enso_advisory.xml".into(),
                url: "https://www.cpc.ncep.noaa.gov/products/analysis_monitoring/enso_advisory/index.xml".into(),
                description: "ENSO state advisory".into(),
                file_type: "xml".into(),
            }],
        )
    }
}

#[async_trait]
impl CollectionAgent for StaticEndpointAgent {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn collect(&self, ctx: &CollectionContext<'_>) -> CollectionResult {
        let mut result = CollectionResult::new(self.name);
        let options = FetchOptions::default();

        for endpoint in &self.endpoints {
            let url = expand_placeholders(&endpoint.url, ctx.now);
            let record = download_to_file(
                ctx,
                &url,
                &endpoint.file_name,
                &endpoint.description,
                &self.source,
                &endpoint.file_type,
                &options,
            )
            .await;
            result.push(record);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_placeholder_expansion() {
        let now = Utc.with_ymd_and_hms(2024, 11, 14, 14, 30, 0).single().unwrap();
        let url = expand_placeholders("https://example.org/{date}/chart_{hour}.gif", now);
        assert_eq!(url, "https://example.org/20241114/chart_12.gif");
    }

    #[test]
    fn test_static_agents_have_endpoints() {
        for agent in [
            StaticEndpointAgent::weather(),
            StaticEndpointAgent::tides(),
            StaticEndpointAgent::tropical(),
            StaticEndpointAgent::charts(),
            StaticEndpointAgent::satellite(),
            StaticEndpointAgent::climatology(),
        ] {
            assert!(!agent.endpoints.is_empty(), "{} has no endpoints", agent.name);
        }
    }
}
