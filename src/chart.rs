use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw per-course category codes as received from the dataset layer.
///
/// Keyed by course label so iteration order is deterministic; the value is
/// the ordered sequence of raw codes (grades, ethnicity codes, gender codes)
/// for every class entry in that course.
pub type CourseSeries = BTreeMap<String, Vec<String>>;

/// Categorical axis along which student records are bucketed.
///
/// This is a closed enumeration: every chart request names one of these and
/// the handlers match on it exhaustively, so a new dimension cannot be added
/// without the compiler pointing at every place that must handle it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Grade,
    RaceEthnicity,
    Gender,
}

/// Fixed bucket order for grades.
const GRADE_CATEGORIES: [&str; 14] = [
    "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D+", "D", "D-", "W", "F", "P",
];

/// Fixed bucket order for race/ethnicity.
const RACE_ETHNICITY_CATEGORIES: [&str; 6] = [
    "White",
    "Black/African American",
    "Hispanic/Latino",
    "Asian",
    "American Indian/Alaska Native",
    "Native Hawaiian/Other",
];

/// Fixed bucket order for gender.
const GENDER_CATEGORIES: [&str; 2] = ["Female", "Male"];

impl Dimension {
    /// The fixed, ordered category labels for this dimension.
    ///
    /// Bucket counts are always emitted in this order, regardless of the
    /// order codes appear in the input.
    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            Dimension::Grade => &GRADE_CATEGORIES,
            Dimension::RaceEthnicity => &RACE_ETHNICITY_CATEGORIES,
            Dimension::Gender => &GENDER_CATEGORIES,
        }
    }

    /// Resolve a raw code to a bucket index for this dimension.
    ///
    /// Grades match their label exactly. Race/ethnicity accepts both the
    /// registrar's short codes and the full label; gender accepts `F`/`M`
    /// and the full label. Unrecognized codes return `None` and are dropped
    /// by the bucketizer without an error.
    pub fn match_code(&self, code: &str) -> Option<usize> {
        match self {
            Dimension::Grade => GRADE_CATEGORIES.iter().position(|g| *g == code),
            Dimension::RaceEthnicity => match code {
                "WH" | "White" => Some(0),
                "BL" | "Black/African American" => Some(1),
                "HI" | "Hispanic/Latino" => Some(2),
                "AS" | "Asian" => Some(3),
                "AI" | "American Indian/Alaska Native" => Some(4),
                "NH" | "Native Hawaiian/Other" => Some(5),
                _ => None,
            },
            Dimension::Gender => match code {
                "F" | "Female" => Some(0),
                "M" | "Male" => Some(1),
                _ => None,
            },
        }
    }

    /// Axis label used when rendering.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Grade => "Grade",
            Dimension::RaceEthnicity => "Race/Ethnicity",
            Dimension::Gender => "Gender",
        }
    }
}

/// Buckets each course's raw codes into per-category counts.
///
/// For every course in `series` the result holds one count per category of
/// `dimension`, aligned positionally to [`Dimension::categories`]. Codes
/// that match no category are ignored; an empty code sequence yields
/// all-zero buckets. The function is pure and its output is deterministic
/// for identical input.
///
/// # Examples
/// ```
/// use stemdash::chart::{Dimension, bucketize};
/// use std::collections::BTreeMap;
///
/// let mut series = BTreeMap::new();
/// series.insert(
///     "CS101".to_string(),
///     vec!["M".to_string(), "F".to_string(), "M".to_string(), "X".to_string()],
/// );
///
/// let counts = bucketize(Dimension::Gender, &series);
/// // Female = 1, Male = 2; the unknown code "X" is dropped.
/// assert_eq!(counts["CS101"], vec![1, 2]);
/// ```
pub fn bucketize(dimension: Dimension, series: &CourseSeries) -> BTreeMap<String, Vec<u32>> {
    let categories = dimension.categories();
    let mut out = BTreeMap::new();

    for (course, codes) in series {
        let mut counts = vec![0u32; categories.len()];
        for code in codes {
            if let Some(idx) = dimension.match_code(code) {
                counts[idx] += 1;
            }
        }
        out.insert(course.clone(), counts);
    }

    out
}

/// One rendered series: a course and its per-category counts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CourseCounts {
    /// Course label shown in the legend
    pub name: String,

    /// Counts aligned to the chart's category labels
    pub values: Vec<u32>,
}

/// Bucketed data in the shape the chart renderers consume: category labels
/// as the shared x axis and one count series per course.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChartData {
    pub dimension: Dimension,
    pub categories: Vec<String>,
    pub series: Vec<CourseCounts>,
}

impl ChartData {
    /// Runs the bucketizer and shapes its output for rendering.
    pub fn build(dimension: Dimension, series: &CourseSeries) -> ChartData {
        let counts = bucketize(dimension, series);
        ChartData {
            dimension,
            categories: dimension
                .categories()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            series: counts
                .into_iter()
                .map(|(name, values)| CourseCounts { name, values })
                .collect(),
        }
    }

    /// Largest single bucket count across all series.
    fn max_count(&self) -> u32 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Largest per-category total across all series (stacked height).
    fn max_stacked(&self) -> u32 {
        (0..self.categories.len())
            .map(|i| self.series.iter().map(|s| s.values[i]).sum::<u32>())
            .max()
            .unwrap_or(0)
    }
}

/// Available chart types for the visualizations page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    /// Bar chart of combined counts per category across the selected courses
    Bar,

    /// Scatter plot of each course's count at every category position
    Scatter,

    /// Stacked bar chart with one segment per course in every category
    StackedBar,
}

/// Rendering options shared by all chart types.
#[derive(Clone, Debug)]
pub struct ChartOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub chart_type: ChartType,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            width: 800,
            height: 600,
            chart_type: ChartType::Bar,
        }
    }
}

#[cfg(feature = "web")]
mod render {
    use super::*;
    use plotters::prelude::*;

    /// Renders bucketed chart data to a PNG image.
    ///
    /// Dispatches on the chart type and returns the encoded image bytes.
    /// The drawing happens against a temporary file-backed bitmap which is
    /// read back and removed before returning.
    ///
    /// # Arguments
    /// * `data` - Bucketed counts from [`ChartData::build`]
    /// * `options` - Title, dimensions and chart type
    ///
    /// # Returns
    /// * PNG image data as bytes, or an error if drawing fails
    pub fn render_png(
        data: &ChartData,
        options: &ChartOptions,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
        let path = tmp.path().to_path_buf();

        match options.chart_type {
            ChartType::Bar => draw_bar(data, options, &path)?,
            ChartType::Scatter => draw_scatter(data, options, &path)?,
            ChartType::StackedBar => draw_stacked_bar(data, options, &path)?,
        }

        let png_data = std::fs::read(&path)?;
        Ok(png_data)
    }

    fn draw_bar(
        data: &ChartData,
        options: &ChartOptions,
        path: &std::path::Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
        root.fill(&WHITE)?;

        // Combined count per category across every selected course.
        let totals: Vec<u32> = (0..data.categories.len())
            .map(|i| data.series.iter().map(|s| s.values[i]).sum())
            .collect();
        let max_y = totals.iter().copied().max().unwrap_or(0).max(1);

        let categories = data.categories.clone();
        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0f64..categories.len() as f64, 0f64..(max_y + 1) as f64)?;

        chart
            .configure_mesh()
            .x_desc(data.dimension.label())
            .y_desc("Students")
            .x_labels(categories.len())
            .x_label_formatter(&|x| {
                categories
                    .get(*x as usize)
                    .cloned()
                    .unwrap_or_default()
            })
            .draw()?;

        chart.draw_series(totals.iter().enumerate().map(|(i, total)| {
            Rectangle::new(
                [(i as f64 + 0.15, 0.0), (i as f64 + 0.85, *total as f64)],
                BLUE.filled(),
            )
        }))?;

        root.present()?;
        Ok(())
    }

    fn draw_scatter(
        data: &ChartData,
        options: &ChartOptions,
        path: &std::path::Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let max_y = data.max_count().max(1);
        let categories = data.categories.clone();

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(-0.5f64..categories.len() as f64 - 0.5, 0f64..(max_y + 1) as f64)?;

        chart
            .configure_mesh()
            .x_desc(data.dimension.label())
            .y_desc("Students")
            .x_labels(categories.len())
            .x_label_formatter(&|x| {
                let idx = x.round() as isize;
                if idx >= 0 {
                    categories.get(idx as usize).cloned().unwrap_or_default()
                } else {
                    String::new()
                }
            })
            .draw()?;

        for (s_idx, series) in data.series.iter().enumerate() {
            let color = Palette99::pick(s_idx).mix(0.9);
            chart
                .draw_series(series.values.iter().enumerate().map(|(i, count)| {
                    Circle::new((i as f64, *count as f64), 5, color.filled())
                }))?
                .label(series.name.clone())
                .legend(move |(x, y)| Circle::new((x + 10, y), 5, color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    fn draw_stacked_bar(
        data: &ChartData,
        options: &ChartOptions,
        path: &std::path::Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let max_y = data.max_stacked().max(1);
        let categories = data.categories.clone();

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0f64..categories.len() as f64, 0f64..(max_y + 1) as f64)?;

        chart
            .configure_mesh()
            .x_desc(data.dimension.label())
            .y_desc("Students")
            .x_labels(categories.len())
            .x_label_formatter(&|x| {
                categories
                    .get(*x as usize)
                    .cloned()
                    .unwrap_or_default()
            })
            .draw()?;

        // One segment per course, stacked bottom-up in series order.
        let mut base = vec![0u32; categories.len()];
        for (s_idx, series) in data.series.iter().enumerate() {
            let color = Palette99::pick(s_idx).mix(0.9);
            let segments: Vec<(usize, u32, u32)> = series
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| (i, base[i], base[i] + v))
                .collect();

            chart
                .draw_series(segments.iter().map(|&(i, lo, hi)| {
                    Rectangle::new(
                        [(i as f64 + 0.15, lo as f64), (i as f64 + 0.85, hi as f64)],
                        color.filled(),
                    )
                }))?
                .label(series.name.clone())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });

            for (i, v) in series.values.iter().enumerate() {
                base[i] += v;
            }
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    /// Renders one chart of each type from a small sample series and saves
    /// them under `chart_output`, returning (type, path) pairs.
    pub fn create_example_charts() -> Vec<(String, String)> {
        let output_dir = "chart_output";
        std::fs::create_dir_all(output_dir).unwrap_or_else(|_| {
            eprintln!("Output directory already exists or couldn't be created");
        });

        let mut series = CourseSeries::new();
        series.insert(
            "CS1101".to_string(),
            vec!["A", "A-", "B+", "B", "F", "W", "A", "C"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        series.insert(
            "MA2203".to_string(),
            vec!["B", "B-", "C+", "D", "F", "A-", "B"]
                .into_iter()
                .map(String::from)
                .collect(),
        );

        let data = ChartData::build(Dimension::Grade, &series);
        let mut result = Vec::new();

        for (name, chart_type) in [
            ("bar", ChartType::Bar),
            ("scatter", ChartType::Scatter),
            ("stacked_bar", ChartType::StackedBar),
        ] {
            let options = ChartOptions {
                title: format!("Example {} chart", name),
                width: 600,
                height: 400,
                chart_type,
            };
            let path = format!("{}/{}.png", output_dir, name);
            match render_png(&data, &options) {
                Ok(bytes) => {
                    if std::fs::write(&path, bytes).is_ok() {
                        result.push((name.to_string(), path));
                    }
                }
                Err(e) => eprintln!("Failed to render {} chart: {}", name, e),
            }
        }

        result
    }
}

#[cfg(feature = "web")]
pub use render::{create_example_charts, render_png};
