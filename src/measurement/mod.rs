mod buffer;
mod export;

pub use buffer::{AngleSample, MeasurementBuffer, MeasurementRecord};
pub use export::{render_csv, write_csv, CSV_HEADER};
