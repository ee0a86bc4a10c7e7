use std::io::Cursor;
use std::ops::Range;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use crate::bode::BodeSummary;
use crate::drivers::error::SweepError;
use crate::types::SamplePoint;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub gain_color: RGBColor,
    pub phase_color: RGBColor,
    pub marker_color: RGBColor,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            background: RGBColor(10, 10, 10),
            gain_color: CYAN,
            phase_color: MAGENTA,
            marker_color: YELLOW,
        }
    }
}
/// Gain and phase against log frequency, stacked, as PNG bytes.
pub fn render_bode_png(
    points: &[SamplePoint],
    summary: Option<&BodeSummary>,
    style: PlotStyle,
) -> Result<Vec<u8>, SweepError> {
    let points: Vec<&SamplePoint> = points
        .iter()
        .filter(|p| {
            p.set_point_hz > 0.0
                && p.set_point_hz.is_finite()
                && p.gain_db.is_finite()
                && p.phase_deg.is_finite()
        })
        .collect();
    if points.is_empty() {
        return Err(SweepError::Plot("sweep has no plottable points".into()));
    }
    let freq_range = frequency_bounds(points.iter().map(|p| p.set_point_hz));
    let gain_range = value_bounds(points.iter().map(|p| p.gain_db));
    let mut phase_range = value_bounds(points.iter().map(|p| p.phase_deg));
    if let Some(summary) = summary {
        // keep the -PM guide line on screen
        let guide = -summary.phase_margin_deg;
        if guide.is_finite() {
            phase_range = phase_range.start.min(guide - 5.0)..phase_range.end.max(guide + 5.0);
        }
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let panels = root.split_evenly((2, 1));
        let unity = summary.map(|s| {
            (s.unity_gain_hz, s.gain_at_unity_db, s.phase_margin_deg - 180.0)
        });
        draw_panel(
            &panels[0],
            "Gain",
            "Gain (dB)",
            &freq_range,
            &gain_range,
            points.iter().map(|p| (p.set_point_hz, p.gain_db)),
            style.gain_color,
            &style,
            unity.map(|(f, g, _)| (f, g)),
            None,
        )?;
        draw_panel(
            &panels[1],
            "Phase",
            "Phase (deg)",
            &freq_range,
            &phase_range,
            points.iter().map(|p| (p.set_point_hz, p.phase_deg)),
            style.phase_color,
            &style,
            unity.map(|(f, _, ph)| (f, ph)),
            summary.map(|s| -s.phase_margin_deg),
        )?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
#[allow(clippy::too_many_arguments)]
fn draw_panel(
    area: &DrawingArea<BitMapBackend, Shift>,
    title: &str,
    y_desc: &str,
    freq_range: &Range<f64>,
    y_range: &Range<f64>,
    series: impl Iterator<Item = (f64, f64)>,
    color: RGBColor,
    style: &PlotStyle,
    unity: Option<(f64, f64)>,
    guide_y: Option<f64>,
) -> Result<(), SweepError> {
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(title, ("sans-serif", 20).into_font().color(&WHITE))
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(
            (freq_range.start..freq_range.end).log_scale(),
            y_range.start..y_range.end,
        )?;
    chart
        .configure_mesh()
        .x_desc("Frequency (Hz)")
        .y_desc(y_desc)
        .x_label_formatter(&|x| format!("{x:.0}"))
        .label_style(("sans-serif", 14).into_font().color(&WHITE))
        .axis_style(WHITE.mix(0.6))
        .light_line_style(WHITE.mix(0.1))
        .bold_line_style(WHITE.mix(0.2))
        .draw()?;
    chart
        .draw_series(LineSeries::new(series, color.stroke_width(2)))?
        .label(title)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    if let Some((unity_hz, value)) = unity {
        let marker = style.marker_color;
        chart
            .draw_series(LineSeries::new(
                vec![(unity_hz, y_range.start), (unity_hz, y_range.end)],
                marker.mix(0.6),
            ))?
            .label(format!("unity gain {unity_hz:.1} Hz"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], marker));
        chart.draw_series(std::iter::once(Circle::new(
            (unity_hz, value),
            5,
            marker.filled(),
        )))?;
    }
    if let Some(guide) = guide_y {
        chart
            .draw_series(LineSeries::new(
                vec![(freq_range.start, guide), (freq_range.end, guide)],
                RED.mix(0.7),
            ))?
            .label(format!("-phase margin {guide:.1} deg"))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft)
        .label_font(("sans-serif", 14).into_font().color(&WHITE))
        .border_style(WHITE.mix(0.2))
        .background_style(style.background)
        .draw()?;
    Ok(())
}
/// Positive frequency span; a single frequency is widened by a decade.
fn frequency_bounds(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if hi <= lo {
        return lo / 10f64.sqrt()..lo * 10f64.sqrt();
    }
    lo..hi
}
fn value_bounds(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = ((hi - lo) * 0.05).max(1.0);
    lo - pad..hi + pad
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SweepError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| SweepError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
