#![cfg(not(tarpaulin_include))]

use crate::dataset::Dataset;
use std::error::Error;

/// Convert the dataset's class rows to CSV format
///
/// This function exports the flattened class-data table to CSV
/// (Comma-Separated Values) format. It creates a string where:
/// - The first row holds the column headers
/// - Values are comma-separated
/// - Special characters (commas, quotes, newlines) are properly escaped
///
/// # Arguments
/// * `dataset` - Reference to the dataset to convert
///
/// # Returns
/// * `Result<String, Box<dyn Error>>` - CSV content as a string or an error
pub fn to_csv(dataset: &Dataset) -> Result<String, Box<dyn Error>> {
    let mut csv_content = String::new();

    csv_content.push_str(
        "Student ID,Course Number,Program Level,Subprogram Code,Semester,Course Year,Final Grade\n",
    );

    for record in dataset.records(None)? {
        let fields = [
            record.student_id,
            record.course_code,
            record.program_level,
            record.subprogram_code,
            record.semester,
            record.year.to_string(),
            record.grade,
        ];
        for (i, value) in fields.iter().enumerate() {
            if i > 0 {
                csv_content.push(',');
            }
            if value.contains(',') || value.contains('"') || value.contains('\n') {
                let escaped = value.replace("\"", "\"\"");
                csv_content.push_str(&format!("\"{}\"", escaped));
            } else {
                csv_content.push_str(value);
            }
        }
        csv_content.push('\n');
    }

    Ok(csv_content)
}

/// Convert the dataset's class rows to XLSX format
///
/// Exports the flattened class-data table to XLSX (Excel) format using the
/// rust_xlsxwriter library, in a layout Microsoft Excel and other
/// spreadsheet applications can open.
///
/// # Arguments
/// * `dataset` - Reference to the dataset to convert
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(dataset: &Dataset) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("class_data")?;

    let headers = [
        "Student ID",
        "Course Number",
        "Program Level",
        "Subprogram Code",
        "Semester",
        "Course Year",
        "Final Grade",
    ];
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (row, record) in dataset.records(None)?.into_iter().enumerate() {
        let row = (row + 1) as u32;
        worksheet.write_string(row, 0, &record.student_id)?;
        worksheet.write_string(row, 1, &record.course_code)?;
        worksheet.write_string(row, 2, &record.program_level)?;
        worksheet.write_string(row, 3, &record.subprogram_code)?;
        worksheet.write_string(row, 4, &record.semester)?;
        worksheet.write_number(row, 5, record.year as f64)?;
        worksheet.write_string(row, 6, &record.grade)?;
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}
