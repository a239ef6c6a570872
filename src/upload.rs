#![cfg(not(tarpaulin_include))]

use calamine::{Data, Range, Reader, Xlsx};
use chrono::Datelike;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::io::Cursor;

use crate::chart::Dimension;
use crate::dataset::Dataset;
use crate::models::{ClassData, ClassYear, Course, Semester, Student};

const GPA_MIN: f64 = 0.0;
const GPA_MAX: f64 = 4.0;
const SAT_MATH_MIN: i32 = 200;
const SAT_MATH_MAX: i32 = 800;
const SAT_TOTAL_MIN: i32 = 400;
const SAT_TOTAL_MAX: i32 = 1600;

lazy_static! {
    static ref SUBPROGRAM_RE: Regex = Regex::new(r"^\d+$").unwrap();
    static ref COURSE_NUM_RE: Regex = Regex::new(r"^[A-Z]{2,4}\d{4}(-\d{2})?$").unwrap();
}

/// One validation failure, tied to the worksheet row it occurred on.
///
/// Row numbers are 1-based and include the header row, so they match what
/// the uploader sees in their spreadsheet application.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadError {
    pub message: String,
    pub row: usize,
}

impl UploadError {
    fn new(message: impl Into<String>, row: usize) -> UploadError {
        UploadError {
            message: message.into(),
            row,
        }
    }
}

/// Parses an uploaded Excel workbook and merges it into the dataset.
///
/// The workbook must contain a `students` worksheet and a `class_data`
/// worksheet. Rows are validated cell by cell; rows that fail validation
/// are skipped and reported, rows that pass are inserted. Student IDs are
/// replaced with randomized identifiers so the institutional IDs never
/// reach the dataset; class rows referencing a student that failed
/// validation are reported as missing.
///
/// # Arguments
/// * `data` - Raw bytes of the uploaded .xlsx file
/// * `dataset` - Dataset the parsed rows are merged into
///
/// # Returns
/// * `Ok(errors)` - The (possibly empty) list of row-level validation errors
/// * `Err(_)` - Only when the workbook itself cannot be read
pub fn ingest_workbook(
    data: &[u8],
    dataset: &mut Dataset,
) -> Result<Vec<UploadError>, Box<dyn Error>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data))?;

    let students = workbook.worksheet_range("students")?;
    let class_data = workbook.worksheet_range("class_data")?;

    let mut errors = Vec::new();
    let id_mapping = insert_students(&students, dataset, &mut errors);
    insert_class_data(&class_data, dataset, &id_mapping, &mut errors);

    Ok(errors)
}

/// Column lookup for a worksheet: header label to column index.
fn header_map(range: &Range<Data>) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    if let Some(header_row) = range.rows().next() {
        for (idx, cell) in header_row.iter().enumerate() {
            if let Data::String(s) = cell {
                map.insert(s.trim().to_string(), idx);
            }
        }
    }
    map
}

fn get_string(row: &[Data], headers: &HashMap<String, usize>, name: &str) -> Option<String> {
    let idx = *headers.get(name)?;
    match row.get(idx)? {
        Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

fn get_f64(row: &[Data], headers: &HashMap<String, usize>, name: &str) -> Option<f64> {
    let idx = *headers.get(name)?;
    match row.get(idx)? {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_i32(row: &[Data], headers: &HashMap<String, usize>, name: &str) -> Option<i32> {
    get_f64(row, headers, name).map(|f| f as i32)
}

/// Generates a randomized student identifier not yet present in the dataset.
fn gen_random_id(dataset: &Dataset) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id = format!("S{:08}", rng.gen_range(0..100_000_000u32));
        if !dataset.students.contains_key(&id) {
            return id;
        }
    }
}

/// Inserts all students from the `students` worksheet.
///
/// Returns the mapping from the workbook's student IDs to the randomized
/// IDs actually stored, which the class-data pass uses to resolve rows.
fn insert_students(
    range: &Range<Data>,
    dataset: &mut Dataset,
    errors: &mut Vec<UploadError>,
) -> HashMap<String, String> {
    let headers = header_map(range);
    let mut id_mapping = HashMap::new();

    for (idx, row) in range.rows().enumerate().skip(1) {
        let row_num = idx + 1;
        let mut found_error = false;

        let source_id = get_string(row, &headers, "ID");
        if source_id.is_none() {
            errors.push(UploadError::new("Missing ID", row_num));
            found_error = true;
        }

        let admit_year = get_i32(row, &headers, "Admit Year");
        if admit_year.is_none() {
            errors.push(UploadError::new("Missing Admit Year", row_num));
            found_error = true;
        }

        let admit_term = get_string(row, &headers, "Admit Term");
        if admit_term.is_none() {
            errors.push(UploadError::new("Missing Admit Term", row_num));
            found_error = true;
        }

        let admit_type = get_string(row, &headers, "Admit Type");
        if admit_type.is_none() {
            errors.push(UploadError::new("Missing Admit Type", row_num));
            found_error = true;
        }

        let major = get_string(row, &headers, "Major Code");
        if major.is_none() {
            errors.push(UploadError::new(
                "Missing major code. Must have at least 1 major.",
                row_num,
            ));
            found_error = true;
        }
        let major_desc = get_string(row, &headers, "Major Description");
        if major_desc.is_none() {
            errors.push(UploadError::new("Missing Major Description", row_num));
            found_error = true;
        }

        let class_year = match get_string(row, &headers, "Class") {
            Some(code) => match ClassYear::parse(&code) {
                Some(year) => Some(year),
                None => {
                    errors.push(UploadError::new(
                        "Invalid Class (Must be FR, SO, JR or SR)",
                        row_num,
                    ));
                    found_error = true;
                    None
                }
            },
            None => {
                errors.push(UploadError::new("Missing Class", row_num));
                found_error = true;
                None
            }
        };

        let ethnicity = match get_string(row, &headers, "Ethnicity") {
            Some(value) => {
                if Dimension::RaceEthnicity.match_code(&value).is_none() {
                    errors.push(UploadError::new("Invalid Ethnicity", row_num));
                    found_error = true;
                }
                Some(value)
            }
            None => {
                errors.push(UploadError::new("Ethnicity missing", row_num));
                found_error = true;
                None
            }
        };

        let gender = get_string(row, &headers, "Gender");
        if gender.is_none() {
            errors.push(UploadError::new("Gender missing", row_num));
            found_error = true;
        }

        let postal_code = get_string(row, &headers, "Postal Code");
        if postal_code.is_none() {
            errors.push(UploadError::new("Postal Code missing", row_num));
            found_error = true;
        }

        let gpa_cumulative = get_f64(row, &headers, "Overall College GPA");
        if let Some(gpa) = gpa_cumulative {
            if !(GPA_MIN..=GPA_MAX).contains(&gpa) {
                errors.push(UploadError::new("Invalid Overall College GPA", row_num));
                found_error = true;
            }
        }

        let high_school_gpa = get_f64(row, &headers, "High School GPA");
        if let Some(gpa) = high_school_gpa {
            if !(GPA_MIN..=GPA_MAX).contains(&gpa) {
                errors.push(UploadError::new("Invalid High School GPA", row_num));
                found_error = true;
            }
        }

        let sat_math = get_i32(row, &headers, "SAT Math");
        if let Some(score) = sat_math {
            if !(SAT_MATH_MIN..=SAT_MATH_MAX).contains(&score) {
                errors.push(UploadError::new("Invalid SAT Math Score", row_num));
                found_error = true;
            }
        }

        let sat_total = get_i32(row, &headers, "SAT Total");
        if let Some(score) = sat_total {
            if !(SAT_TOTAL_MIN..=SAT_TOTAL_MAX).contains(&score) {
                errors.push(UploadError::new("Invalid SAT Total Score", row_num));
                found_error = true;
            }
        }

        if found_error {
            continue;
        }

        let random_id = gen_random_id(dataset);
        id_mapping.insert(source_id.clone().unwrap_or_default(), random_id.clone());

        let student = Student {
            id: random_id.clone(),
            admit_year: admit_year.unwrap_or_default(),
            admit_term: admit_term.unwrap_or_default(),
            admit_type: admit_type.unwrap_or_default(),
            major: major.unwrap_or_default(),
            major_desc: major_desc.unwrap_or_default(),
            concentration_desc: get_string(row, &headers, "Concentration Description"),
            class_year: class_year.unwrap_or(ClassYear::Freshman),
            city: get_string(row, &headers, "City"),
            state: get_string(row, &headers, "State"),
            country: get_string(row, &headers, "Country"),
            postal_code,
            race_ethnicity: ethnicity.unwrap_or_default(),
            gender: gender.unwrap_or_default(),
            gpa_cumulative,
            math_placement_score: get_i32(row, &headers, "Math Placement Score"),
            high_school_gpa,
            high_school_name: get_string(row, &headers, "High School Name"),
            high_school_city: get_string(row, &headers, "High School City"),
            high_school_state: get_string(row, &headers, "High School State"),
            high_school_ceeb: get_i32(row, &headers, "High School CEEB"),
            sat_math,
            sat_total,
        };

        dataset.students.insert(random_id, student);
    }

    id_mapping
}

/// Inserts all class-data rows, resolving student IDs through the mapping
/// produced by the student pass.
fn insert_class_data(
    range: &Range<Data>,
    dataset: &mut Dataset,
    id_mapping: &HashMap<String, String>,
    errors: &mut Vec<UploadError>,
) {
    let headers = header_map(range);
    let current_year = chrono::Utc::now().year();

    for (idx, row) in range.rows().enumerate().skip(1) {
        let row_num = idx + 1;
        let mut found_error = false;

        let random_id = match get_string(row, &headers, "Student ID") {
            Some(source_id) => match id_mapping.get(&source_id) {
                Some(random_id) => Some(random_id.clone()),
                None => {
                    errors.push(UploadError::new(
                        "Matching student not found for Class Data Entry",
                        row_num,
                    ));
                    found_error = true;
                    None
                }
            },
            None => {
                errors.push(UploadError::new("Missing Student ID", row_num));
                found_error = true;
                None
            }
        };

        let program_level = match get_string(row, &headers, "Program Level") {
            Some(level) => {
                if level != "UNDG" && level != "GRAD" {
                    errors.push(UploadError::new(
                        "Invalid Program Level (Must be either UNDG or GRAD)",
                        row_num,
                    ));
                    found_error = true;
                }
                level
            }
            None => {
                errors.push(UploadError::new("Missing Program Level", row_num));
                found_error = true;
                String::new()
            }
        };

        let subprogram_code = match get_string(row, &headers, "Subprogram Code") {
            Some(code) => {
                if !SUBPROGRAM_RE.is_match(&code) {
                    errors.push(UploadError::new("Invalid Subprogram Code", row_num));
                    found_error = true;
                }
                code
            }
            None => {
                errors.push(UploadError::new("Missing Subprogram Code", row_num));
                found_error = true;
                String::new()
            }
        };

        let course_num = match get_string(row, &headers, "Course Number") {
            Some(num) => {
                if !COURSE_NUM_RE.is_match(&num) {
                    errors.push(UploadError::new("Invalid Course Number", row_num));
                    found_error = true;
                }
                num
            }
            None => {
                errors.push(UploadError::new("Missing Course Number", row_num));
                found_error = true;
                String::new()
            }
        };

        let course_title = match get_string(row, &headers, "Course Title") {
            Some(title) => title,
            None => {
                errors.push(UploadError::new("Missing Course Title", row_num));
                found_error = true;
                String::new()
            }
        };

        let grade = match get_string(row, &headers, "Final Grade") {
            Some(grade) => {
                if Dimension::Grade.match_code(&grade).is_none() {
                    errors.push(UploadError::new("Invalid Final Course Grade", row_num));
                    found_error = true;
                }
                grade
            }
            None => {
                errors.push(UploadError::new("Missing Final Course Grade", row_num));
                found_error = true;
                String::new()
            }
        };

        let semester = match get_string(row, &headers, "Semester") {
            Some(code) => match Semester::parse(&code) {
                Some(semester) => Some(semester),
                None => {
                    errors.push(UploadError::new("Invalid Semester", row_num));
                    found_error = true;
                    None
                }
            },
            None => {
                errors.push(UploadError::new("Missing Semester", row_num));
                found_error = true;
                None
            }
        };

        let course_year = match get_i32(row, &headers, "Course Year") {
            Some(year) => {
                if year > current_year {
                    errors.push(UploadError::new("Invalid Course Year", row_num));
                    found_error = true;
                }
                year
            }
            None => {
                errors.push(UploadError::new("Missing Course Year", row_num));
                found_error = true;
                0
            }
        };

        if found_error {
            continue;
        }

        let course_idx = dataset.find_or_insert_course(Course {
            course_num,
            title: course_title,
            semester: semester.unwrap_or(Semester::Fall),
            year: course_year,
        });

        dataset.class_data.push(ClassData {
            student_id: random_id.unwrap_or_default(),
            course: course_idx,
            program_level,
            subprogram_code,
            grade,
        });
    }
}

/// Parses a CSV rendition of the class-data sheet and merges it into the
/// dataset. Student IDs must reference students already in the dataset.
///
/// The parser handles quoted fields with embedded commas, quotes and the
/// usual `""` escape.
pub fn ingest_class_data_csv(
    text: &str,
    dataset: &mut Dataset,
) -> Result<Vec<UploadError>, Box<dyn Error>> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return Err("CSV file is empty".into());
    }

    let header_fields = parse_csv_row(lines[0])?;
    let headers: HashMap<String, usize> = header_fields
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect();

    // Reuse the worksheet pass by shaping the rows as calamine cells.
    let mut cells: Vec<Vec<Data>> = Vec::with_capacity(lines.len());
    cells.push(
        header_fields
            .iter()
            .map(|f| Data::String(f.clone()))
            .collect(),
    );
    for line in &lines[1..] {
        let fields = parse_csv_row(line)?;
        cells.push(fields.into_iter().map(Data::String).collect());
    }

    // The students are already present, so the mapping is the identity over
    // the ids the dataset knows about.
    let id_mapping: HashMap<String, String> = dataset
        .students
        .keys()
        .map(|id| (id.clone(), id.clone()))
        .collect();

    let mut errors = Vec::new();
    let width = headers.len();
    let mut range: Range<Data> = Range::new((0, 0), (cells.len() as u32 - 1, width as u32 - 1));
    for (r, row) in cells.iter().enumerate() {
        for (c, cell) in row.iter().enumerate().take(width) {
            range.set_value((r as u32, c as u32), cell.clone());
        }
    }

    insert_class_data(&range, dataset, &id_mapping, &mut errors);
    Ok(errors)
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' && in_quotes {
                        // Double quote inside quoted field - add a single quote
                        current_field.push('"');
                        chars.next();
                    } else {
                        in_quotes = !in_quotes;
                    }
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(current_field);
                current_field = String::new();
            }
            _ => {
                current_field.push(c);
            }
        }
    }

    result.push(current_field);

    Ok(result)
}
