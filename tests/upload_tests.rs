#![cfg(feature = "web")]

use rust_xlsxwriter::{Workbook, Worksheet};
use stemdash::dataset::Dataset;
use stemdash::models::{ClassYear, Semester};
use stemdash::upload::{ingest_class_data_csv, ingest_workbook};

const STUDENT_HEADERS: [&str; 12] = [
    "ID",
    "Admit Year",
    "Admit Term",
    "Admit Type",
    "Major Code",
    "Major Description",
    "Class",
    "Ethnicity",
    "Gender",
    "Postal Code",
    "Overall College GPA",
    "High School GPA",
];

const CLASS_HEADERS: [&str; 8] = [
    "Student ID",
    "Program Level",
    "Subprogram Code",
    "Course Number",
    "Course Title",
    "Final Grade",
    "Semester",
    "Course Year",
];

fn write_row(sheet: &mut Worksheet, row: u32, values: &[&str]) {
    for (col, value) in values.iter().enumerate() {
        sheet.write_string(row, col as u16, *value).unwrap();
    }
}

fn workbook_bytes(students: &[Vec<&str>], class_rows: &[Vec<&str>]) -> Vec<u8> {
    let mut workbook = Workbook::new();

    let mut sheet = Worksheet::new();
    sheet.set_name("students").unwrap();
    write_row(&mut sheet, 0, &STUDENT_HEADERS);
    for (i, row) in students.iter().enumerate() {
        write_row(&mut sheet, (i + 1) as u32, row);
    }
    workbook.push_worksheet(sheet);

    let mut sheet = Worksheet::new();
    sheet.set_name("class_data").unwrap();
    write_row(&mut sheet, 0, &CLASS_HEADERS);
    for (i, row) in class_rows.iter().enumerate() {
        write_row(&mut sheet, (i + 1) as u32, row);
    }
    workbook.push_worksheet(sheet);

    workbook.save_to_buffer().unwrap()
}

fn valid_student(id: &str) -> Vec<&str> {
    vec![
        id, "2021", "FA", "FY", "CS", "Computer Science", "SO", "WH", "F", "14623", "3.1", "3.5",
    ]
}

#[test]
fn valid_workbook_ingests_cleanly() {
    let bytes = workbook_bytes(
        &[valid_student("1001"), valid_student("1002")],
        &[
            vec!["1001", "UNDG", "101", "CS1101", "Intro to Programming", "A", "FA", "2021"],
            vec!["1002", "UNDG", "101", "CS1101", "Intro to Programming", "F", "FA", "2021"],
        ],
    );

    let mut dataset = Dataset::new();
    let errors = ingest_workbook(&bytes, &mut dataset).unwrap();

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(dataset.total_students(), 2);
    assert_eq!(dataset.total_rows(), 2);
    assert_eq!(dataset.courses.len(), 1);
    assert_eq!(dataset.courses[0].semester, Semester::Fall);

    // Institutional IDs are replaced during ingestion
    assert!(!dataset.students.contains_key("1001"));
    for student in dataset.students.values() {
        assert!(student.id.starts_with('S'));
        assert_eq!(student.class_year, ClassYear::Sophomore);
    }
}

#[test]
fn invalid_rows_are_reported_with_row_numbers() {
    let mut bad_student = valid_student("1001");
    bad_student[6] = "XX"; // invalid class year

    let bytes = workbook_bytes(
        &[bad_student, valid_student("1002")],
        &[
            // References the student that failed validation
            vec!["1001", "UNDG", "101", "CS1101", "Intro to Programming", "A", "FA", "2021"],
            // Bad grade
            vec!["1002", "UNDG", "101", "CS1101", "Intro to Programming", "ZZ", "FA", "2021"],
        ],
    );

    let mut dataset = Dataset::new();
    let errors = ingest_workbook(&bytes, &mut dataset).unwrap();

    assert_eq!(dataset.total_students(), 1);
    assert_eq!(dataset.total_rows(), 0);

    // Row numbers are 1-based and include the header row
    assert!(errors.iter().any(|e| {
        e.row == 2 && e.message.contains("Invalid Class")
    }));
    assert!(errors.iter().any(|e| {
        e.row == 2 && e.message.contains("Matching student not found")
    }));
    assert!(errors.iter().any(|e| {
        e.row == 3 && e.message.contains("Invalid Final Course Grade")
    }));
}

#[test]
fn bounds_violations_are_flagged() {
    let mut bad_gpa = valid_student("1001");
    bad_gpa[10] = "4.7";
    let mut bad_hs_gpa = valid_student("1002");
    bad_hs_gpa[11] = "5.0";

    let bytes = workbook_bytes(&[bad_gpa, bad_hs_gpa], &[]);

    let mut dataset = Dataset::new();
    let errors = ingest_workbook(&bytes, &mut dataset).unwrap();

    assert_eq!(dataset.total_students(), 0);
    assert!(errors.iter().any(|e| e.message == "Invalid Overall College GPA"));
    assert!(errors.iter().any(|e| e.message == "Invalid High School GPA"));
}

#[test]
fn class_data_csv_appends_to_existing_students() {
    // Start from a workbook upload so the dataset has students
    let bytes = workbook_bytes(&[valid_student("1001")], &[]);
    let mut dataset = Dataset::new();
    assert!(ingest_workbook(&bytes, &mut dataset).unwrap().is_empty());

    let student_id = dataset.students.keys().next().unwrap().clone();
    let csv = format!(
        "Student ID,Program Level,Subprogram Code,Course Number,Course Title,Final Grade,Semester,Course Year\n\
         {},UNDG,101,MA2203,\"Calculus, Part II\",B+,SP,2022\n",
        student_id
    );

    let errors = ingest_class_data_csv(&csv, &mut dataset).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(dataset.total_rows(), 1);
    assert_eq!(dataset.courses[0].title, "Calculus, Part II");
    assert_eq!(dataset.class_data[0].grade, "B+");
}

#[test]
fn future_course_year_is_rejected() {
    let bytes = workbook_bytes(
        &[valid_student("1001")],
        &[vec!["1001", "UNDG", "101", "CS1101", "Intro", "A", "FA", "2999"]],
    );

    let mut dataset = Dataset::new();
    let errors = ingest_workbook(&bytes, &mut dataset).unwrap();

    assert_eq!(dataset.total_rows(), 0);
    assert!(errors.iter().any(|e| e.message == "Invalid Course Year"));
}
