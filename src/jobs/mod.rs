//! Built-in jobs.

pub mod exporter;
pub mod geocoding;
pub mod sms;

pub use exporter::OperationFileExporterJob;
pub use geocoding::{Geocoder, GeocodingJob, LookupTableGeocoder};
pub use sms::{LogSmsGateway, SmsGateway, SmsJob};
