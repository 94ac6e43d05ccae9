//! One-page A4 rendering of a health report.

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use thiserror::Error;

use domain::models::HealthReport;

use crate::config::ReportsConfig;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 8.0;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF rendering failed: {0}")]
    Render(String),
}

impl From<printpdf::Error> for PdfError {
    fn from(err: printpdf::Error) -> Self {
        PdfError::Render(err.to_string())
    }
}

/// Renders reports using the configured title and file-name prefix.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    title: String,
    filename_prefix: String,
}

impl PdfRenderer {
    pub fn new(config: &ReportsConfig) -> Self {
        Self {
            title: config.pdf_title.clone(),
            filename_prefix: config.pdf_filename_prefix.clone(),
        }
    }

    /// PDF bytes for `report`.
    pub fn render(&self, report: &HealthReport) -> Result<Vec<u8>, PdfError> {
        let (doc, page, layer) = PdfDocument::new(
            self.title.as_str(),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Layer 1",
        );
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);

        let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
        layer.use_text(
            format!("Health Report for Device: {}", report.device_id),
            18.0,
            Mm(MARGIN_MM),
            Mm(y),
            &bold,
        );
        y -= LINE_HEIGHT_MM * 2.0;

        for line in report_lines(report) {
            write_line(&layer, &regular, &line, y);
            y -= LINE_HEIGHT_MM;
        }

        layer.use_text("1 / 1", 10.0, Mm(PAGE_WIDTH_MM / 2.0 - 4.0), Mm(MARGIN_MM / 2.0), &regular);

        Ok(doc.save_to_bytes()?)
    }

    /// `{prefix}_{deviceId}_{yyyyMMdd}.pdf`, safe for a Content-Disposition header.
    pub fn filename(&self, device_id: &str, now: DateTime<Utc>) -> String {
        let device: String = device_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "{}_{}_{}.pdf",
            self.filename_prefix,
            device,
            now.format("%Y%m%d")
        )
    }
}

fn write_line(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, y: f32) {
    layer.use_text(text, 12.0, Mm(MARGIN_MM), Mm(y), font);
}

fn report_lines(report: &HealthReport) -> Vec<String> {
    let mut lines = vec![
        format!("Report Date: {}", report.report_date.format("%Y-%m-%d")),
        format!("Reporting Period: {}", report.report_period),
    ];
    if let Some(user_id) = &report.user_id {
        lines.push(format!("User: {}", user_id));
    }
    lines.extend([
        format!("Total Steps: {}", report.total_steps),
        format!("Average Daily Steps: {}", report.avg_daily_steps),
        format!(
            "Average Ambient Temperature: {:.1} C",
            report.avg_ambient_temp
        ),
        format!("Average Humidity: {}%", report.avg_humidity),
        format!(
            "Average Air Quality Index (AQI): {} (min {}, max {})",
            report.avg_air_quality_index, report.min_aqi, report.max_aqi
        ),
        format!(
            "Average Blood Pressure: {}/{}",
            report.avg_blood_pressure_systolic, report.avg_blood_pressure_diastolic
        ),
        format!("Average Heart Rate: {}", report.avg_heart_rate),
        format!("Average Oxygen Saturation: {}%", report.avg_oxygen_saturation),
        format!("Falls Detected: {}", report.fall_count),
        format!("Health Status: {}", report.status),
        format!("Total Data Points: {}", report.data_point_count),
    ]);
    if let Some(last_update) = report.last_update {
        lines.push(format!(
            "Last Device Update: {}",
            last_update.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report() -> HealthReport {
        HealthReport {
            device_id: "dev-1".to_string(),
            user_id: Some("u1".to_string()),
            report_date: Utc.with_ymd_and_hms(2025, 9, 21, 12, 0, 0).unwrap(),
            report_period: "7-Day Average".to_string(),
            total_steps: 120,
            avg_daily_steps: 160,
            avg_ambient_temp: 21.5,
            avg_humidity: 40.0,
            avg_air_quality_index: 50,
            min_aqi: 40,
            max_aqi: 60,
            avg_co2: 410.0,
            avg_voc: 0.3,
            avg_pm25: 8.0,
            avg_pm10: 12.0,
            avg_pressure: 1013.0,
            avg_blood_pressure_systolic: 120.0,
            avg_blood_pressure_diastolic: 80.0,
            avg_body_temperature: 36.6,
            avg_heart_rate: 72.0,
            avg_oxygen_saturation: 98,
            fall_count: 0,
            data_point_count: 2,
            status: "Normal".to_string(),
            last_update: None,
        }
    }

    #[test]
    fn test_render_produces_pdf() {
        let renderer = PdfRenderer::new(&ReportsConfig::default());
        let bytes = renderer.render(&report()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_report_lines() {
        let lines = report_lines(&report());
        assert!(lines.contains(&"Total Steps: 120".to_string()));
        assert!(lines.contains(&"Health Status: Normal".to_string()));
        assert!(lines.contains(&"Average Ambient Temperature: 21.5 C".to_string()));
    }

    #[test]
    fn test_filename() {
        let renderer = PdfRenderer::new(&ReportsConfig::default());
        let now = Utc.with_ymd_and_hms(2025, 9, 21, 0, 0, 0).unwrap();
        assert_eq!(
            renderer.filename("dev-1", now),
            "HealthReport_dev-1_20250921.pdf"
        );
        assert_eq!(
            renderer.filename("a\"b/c", now),
            "HealthReport_a_b_c_20250921.pdf"
        );
    }
}
