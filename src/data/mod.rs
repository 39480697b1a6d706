pub mod erddap_wave_data_record;
pub mod marine_forecast_data_record;
pub mod meteorological_data_record;
pub mod parseable_data_record;
pub mod station;
pub mod wave_data_record;
