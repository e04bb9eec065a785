use std::path::{Path, PathBuf};

use plotters::chart::ChartContext;
use plotters::coord::CoordTranslate;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use thiserror::Error;

use crate::config::AppConfig;
use crate::loader::YearlyMean;
use crate::scale::Keyboard;

/// Chart bitmap size in pixels.
const CHART_SIZE: (u32, u32) = (1500, 1000);

/// Horizontal calibration guides on the frequency charts: octaves of A,
/// as (frequency, stroke width). A440 itself is drawn heaviest.
const A_OCTAVE_GUIDES: [(f64, u32); 5] = [
    (110.0, 2),
    (220.0, 2),
    (440.0, 3),
    (880.0, 2),
    (1760.0, 2),
];

const ORANGE: RGBColor = RGBColor(255, 165, 0);

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("chart rendering failed: {0}")]
    Draw(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Draw(e.to_string())
    }
}

/// Render all diagnostic charts for a quantized series and return the
/// paths written.
///
/// Chart output is independent of the MIDI path: a failure here leaves
/// the note sequence untouched and vice versa.
pub fn render_all(
    series: &[YearlyMean],
    indices: &[usize],
    keyboard: &Keyboard,
    config: &AppConfig,
) -> Result<Vec<PathBuf>, ChartError> {
    std::fs::create_dir_all(&config.output_dir)?;

    let title = config
        .input_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "anomaly series".to_string());

    let mapped: Vec<f64> = indices.iter().map(|&i| keyboard.position(i)).collect();
    let freqs: Vec<f64> = indices.iter().map(|&i| keyboard.frequency(i)).collect();

    let out =
        |name: &str| config.output_dir.join(format!("{}{}", config.output_prefix, name));
    let mut written = Vec::with_capacity(4);

    let path = out("data_discretisation.png");
    render_discretisation(series, &mapped, keyboard, &title, &path)?;
    written.push(path);

    let path = out("data_discretisation_histogram.png");
    render_histogram(series, &mapped, keyboard, &title, &path)?;
    written.push(path);

    let path = out("data_note_frequencies-ylinear.png");
    render_note_frequencies(series, &freqs, &title, &path, false)?;
    written.push(path);

    let path = out("data_note_frequencies-ylog.png");
    render_note_frequencies(series, &freqs, &title, &path, true)?;
    written.push(path);

    for p in &written {
        log::debug!("Wrote {}", p.display());
    }
    Ok(written)
}

/// Raw vs quantized yearly values as step traces, for eyeballing the
/// quantization error.
fn render_discretisation(
    series: &[YearlyMean],
    mapped: &[f64],
    keyboard: &Keyboard,
    title: &str,
    out_path: &Path,
) -> Result<(), ChartError> {
    let root = BitMapBackend::new(out_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(
            year_range(series),
            keyboard.min_position()..keyboard.max_position(),
        )?;

    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc("Yearly anomaly")
        .draw()?;

    let raw: Vec<(f64, f64)> = series.iter().map(|p| (p.year as f64, p.anomaly)).collect();
    let quantized: Vec<(f64, f64)> = series
        .iter()
        .zip(mapped)
        .map(|(p, &v)| (p.year as f64, v))
        .collect();

    chart
        .draw_series(LineSeries::new(step_points(&raw), &RED))?
        .label("raw data")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .draw_series(LineSeries::new(step_points(&quantized), &BLUE))?
        .label(format!("{} bin alignment", keyboard.key_count()))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Distribution of raw vs quantized values over the scale range, one bin
/// per key.
fn render_histogram(
    series: &[YearlyMean],
    mapped: &[f64],
    keyboard: &Keyboard,
    title: &str,
    out_path: &Path,
) -> Result<(), ChartError> {
    let (lo, hi) = (keyboard.min_position(), keyboard.max_position());
    let bins = keyboard.key_count();
    let bin_width = (hi - lo) / bins as f64;

    let raw_values: Vec<f64> = series.iter().map(|p| p.anomaly).collect();
    let raw_counts = histogram_counts(&raw_values, lo, hi, bins);
    let mapped_counts = histogram_counts(mapped, lo, hi, bins);

    let y_max = raw_counts
        .iter()
        .chain(&mapped_counts)
        .map(|&(_, c)| c as f64)
        .fold(0.0f64, f64::max)
        .max(1.0);

    let root = BitMapBackend::new(out_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0.0f64..(y_max * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Yearly anomaly")
        .y_desc("Count")
        .draw()?;

    chart
        .draw_series(raw_counts.iter().map(|&(x0, c)| {
            Rectangle::new([(x0, 0.0), (x0 + bin_width, c as f64)], RED.mix(0.5).filled())
        }))?
        .label("raw data")
        .legend(|(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], RED.mix(0.5).filled()));

    chart
        .draw_series(mapped_counts.iter().map(|&(x0, c)| {
            Rectangle::new([(x0, 0.0), (x0 + bin_width, c as f64)], BLUE.mix(0.5).filled())
        }))?
        .label(format!("{} bin alignment", bins))
        .legend(|(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], BLUE.mix(0.5).filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Quantized values rendered as note frequencies against year, with the
/// A-octave guides for calibration. `y_log` switches the y axis to a
/// logarithmic scale.
fn render_note_frequencies(
    series: &[YearlyMean],
    freqs: &[f64],
    title: &str,
    out_path: &Path,
    y_log: bool,
) -> Result<(), ChartError> {
    let points: Vec<(f64, f64)> = series
        .iter()
        .zip(freqs)
        .map(|(p, &f)| (p.year as f64, f))
        .collect();
    let steps = step_points(&points);

    // Span the data and every guide line, log-safe (always positive).
    let y_lo = freqs.iter().copied().fold(f64::INFINITY, f64::min).min(110.0) * 0.9;
    let y_hi = freqs
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
        .max(1760.0)
        * 1.1;

    let x_range = year_range(series);
    let (x_lo, x_hi) = (x_range.start, x_range.end);

    let root = BitMapBackend::new(out_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60);

    if y_log {
        let mut chart = builder.build_cartesian_2d(x_range, (y_lo..y_hi).log_scale())?;
        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc("Frequency, Hz")
            .draw()?;
        draw_frequency_layers(&mut chart, &steps, x_lo, x_hi)?;
    } else {
        let mut chart = builder.build_cartesian_2d(x_range, y_lo..y_hi)?;
        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc("Frequency, Hz")
            .draw()?;
        draw_frequency_layers(&mut chart, &steps, x_lo, x_hi)?;
    }

    root.present()?;
    Ok(())
}

/// Shared drawing for both frequency chart variants: the note step trace,
/// the A-octave guides, and the legend.
fn draw_frequency_layers<'a, DB, CT>(
    chart: &mut ChartContext<'a, DB, CT>,
    steps: &[(f64, f64)],
    x_lo: f64,
    x_hi: f64,
) -> Result<(), ChartError>
where
    DB: DrawingBackend + 'a,
    CT: CoordTranslate<From = (f64, f64)>,
{
    chart
        .draw_series(LineSeries::new(steps.iter().copied(), &BLUE))?
        .label("values as notes")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    for &(hz, width) in A_OCTAVE_GUIDES.iter().rev() {
        // Outer octaves orange, inner octaves red.
        let color = if hz == 110.0 || hz == 1760.0 { ORANGE } else { RED };
        let style = color.stroke_width(width);
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x_lo, hz), (x_hi, hz)],
                style,
            )))?
            .label(format!("A{}", hz as u32))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

/// X axis range over the series years, with a fallback for empty input.
fn year_range(series: &[YearlyMean]) -> std::ops::Range<f64> {
    let lo = series.first().map(|p| p.year as f64).unwrap_or(0.0);
    let hi = series.last().map(|p| p.year as f64).unwrap_or(1.0);
    if hi > lo { lo..hi } else { lo..(lo + 1.0) }
}

/// Expand samples into the vertex list of a step trace: each value holds
/// until the next sample's x position.
fn step_points(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for (i, &(x, y)) in points.iter().enumerate() {
        if i > 0 {
            out.push((x, points[i - 1].1));
        }
        out.push((x, y));
    }
    out
}

/// Count values into `bins` equal-width bins over [min, max]. Values
/// outside the range are ignored; the top edge lands in the last bin.
fn histogram_counts(values: &[f64], min: f64, max: f64, bins: usize) -> Vec<(f64, usize)> {
    let bin_width = (max - min) / bins as f64;
    if bin_width <= 0.0 || bins == 0 {
        return Vec::new();
    }
    let mut counts = vec![0usize; bins];
    for &value in values {
        if value < min || value > max {
            continue;
        }
        let idx = (((value - min) / bin_width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    (0..bins)
        .map(|i| (min + i as f64 * bin_width, counts[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_points_holds_previous_value() {
        let steps = step_points(&[(0.0, 1.0), (1.0, 3.0), (2.0, 2.0)]);
        assert_eq!(
            steps,
            vec![(0.0, 1.0), (1.0, 1.0), (1.0, 3.0), (2.0, 3.0), (2.0, 2.0)]
        );
    }

    #[test]
    fn test_step_points_empty_and_single() {
        assert!(step_points(&[]).is_empty());
        assert_eq!(step_points(&[(5.0, 1.0)]), vec![(5.0, 1.0)]);
    }

    #[test]
    fn test_histogram_counts_basic() {
        let counts = histogram_counts(&[0.1, 0.1, 0.9, 2.5], 0.0, 1.0, 2);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0], (0.0, 2));
        // 0.9 in the upper bin; 2.5 out of range and ignored.
        assert_eq!(counts[1], (0.5, 1));
    }

    #[test]
    fn test_histogram_top_edge_in_last_bin() {
        let counts = histogram_counts(&[1.0], 0.0, 1.0, 4);
        assert_eq!(counts[3].1, 1);
    }

    #[test]
    fn test_year_range_fallbacks() {
        assert_eq!(year_range(&[]), 0.0..1.0);
        let one = vec![YearlyMean {
            year: 1850,
            anomaly: 0.0,
        }];
        assert_eq!(year_range(&one), 1850.0..1851.0);
    }
}
