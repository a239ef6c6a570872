use stemdash::chart::Dimension;
use stemdash::dataset::{CourseSelection, Dataset};
use stemdash::models::{ClassData, ClassYear, Course, Semester, Student};

fn student(id: &str, gpa: Option<f64>, race: &str, gender: &str) -> Student {
    Student {
        id: id.to_string(),
        admit_year: 2021,
        admit_term: "FA".to_string(),
        admit_type: "FY".to_string(),
        major: "CS".to_string(),
        major_desc: "Computer Science".to_string(),
        concentration_desc: None,
        class_year: ClassYear::Sophomore,
        city: Some("Rochester".to_string()),
        state: Some("NY".to_string()),
        country: Some("USA".to_string()),
        postal_code: Some("14623".to_string()),
        race_ethnicity: race.to_string(),
        gender: gender.to_string(),
        gpa_cumulative: gpa,
        math_placement_score: Some(25),
        high_school_gpa: Some(3.5),
        high_school_name: Some("Central High".to_string()),
        high_school_city: Some("Rochester".to_string()),
        high_school_state: Some("NY".to_string()),
        high_school_ceeb: Some(331234),
        sat_math: Some(650),
        sat_total: Some(1280),
    }
}

fn sample_dataset() -> Dataset {
    let mut dataset = Dataset::new();

    dataset
        .students
        .insert("S1".to_string(), student("S1", Some(3.0), "WH", "F"));
    dataset
        .students
        .insert("S2".to_string(), student("S2", Some(4.0), "AS", "M"));
    dataset
        .students
        .insert("S3".to_string(), student("S3", None, "HI", "F"));

    let cs = dataset.find_or_insert_course(Course {
        course_num: "CS1101".to_string(),
        title: "Intro to Programming".to_string(),
        semester: Semester::Fall,
        year: 2021,
    });
    let ma = dataset.find_or_insert_course(Course {
        course_num: "MA2203".to_string(),
        title: "Calculus II".to_string(),
        semester: Semester::Spring,
        year: 2022,
    });

    for (student_id, course, grade) in [
        ("S1", cs, "A"),
        ("S2", cs, "F"),
        ("S3", cs, "W"),
        ("S1", ma, "B+"),
        ("S2", ma, "A-"),
    ] {
        dataset.class_data.push(ClassData {
            student_id: student_id.to_string(),
            course,
            program_level: "UNDG".to_string(),
            subprogram_code: "101".to_string(),
            grade: grade.to_string(),
        });
    }

    dataset
}

fn test_aggregates() {
    println!("\n====== Testing aggregates ======");
    let dataset = sample_dataset();

    assert_eq!(dataset.total_students(), 3);
    assert_eq!(dataset.total_rows(), 5);
    println!("✓ Counts: 3 students, 5 class rows");

    // (3.0 + 4.0) / 3 students; the missing GPA still counts in the denominator
    assert!((dataset.avg_gpa() - 7.0 / 3.0).abs() < 1e-9);
    println!("✓ Average GPA uses all students as the denominator");

    // 2 DWF grades (F, W) out of 5 rows
    assert!((dataset.avg_dwf() - 40.0).abs() < 1e-9);
    println!("✓ Average DWF rate is 40%");
}

fn test_dwf_tables() {
    println!("\n====== Testing DWF tables ======");
    let dataset = sample_dataset();

    let rows = dataset.dwf_by_course();
    assert_eq!(rows.len(), 2);
    println!("✓ One DWF row per course offering");

    let highest = dataset.dwf_extremes("highest");
    assert_eq!(highest[0].course_num, "CS1101");
    assert!((highest[0].avg_dwf - 200.0 / 3.0).abs() < 1e-9);
    println!("✓ CS1101 tops the highest-DWF table at 66.7%");

    let lowest = dataset.dwf_extremes("lowest");
    assert_eq!(lowest[0].course_num, "MA2203");
    assert_eq!(lowest[0].avg_dwf, 0.0);
    println!("✓ MA2203 tops the lowest-DWF table at 0%");
}

fn test_records_and_limits() {
    println!("\n====== Testing record flattening ======");
    let dataset = sample_dataset();

    let all = dataset.records(None).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].course_code, "CS1101");
    assert_eq!(all[0].academic_info.class_year, "Sophomore");
    assert_eq!(all[0].demographics.home_location, "Rochester, NY, USA");
    println!("✓ Records join student, course and class row");

    let limited = dataset.records(Some(2)).unwrap();
    assert_eq!(limited.len(), 2);
    println!("✓ Limit truncates the record list");

    let err = dataset.records(Some(6)).unwrap_err();
    assert_eq!(err, "Limit out of bounds.");
    println!("✓ Out-of-range limit is rejected");
}

fn test_course_mapping_and_series() {
    println!("\n====== Testing course mapping and series ======");
    let dataset = sample_dataset();

    let mapping = dataset.course_semester_mapping();
    assert_eq!(mapping["CS1101"], vec!["FA 2021".to_string()]);
    assert_eq!(mapping["MA2203"], vec!["SP 2022".to_string()]);
    println!("✓ Course to term mapping built");

    let series = dataset.course_series(
        Dimension::Grade,
        &[CourseSelection {
            course: "CS1101".to_string(),
            semester: Some("FA 2021".to_string()),
        }],
    );
    assert_eq!(series["CS1101 (FA 2021)"], vec!["A", "F", "W"]);
    println!("✓ Grade series pulled for a specific offering");

    let series = dataset.course_series(
        Dimension::Gender,
        &[CourseSelection {
            course: "MA2203".to_string(),
            semester: None,
        }],
    );
    assert_eq!(series["MA2203"], vec!["F", "M"]);
    println!("✓ Gender series pulled across all offerings");
}

fn main() {
    println!("=== Dataset Test Suite ===");

    test_aggregates();
    test_dwf_tables();
    test_records_and_limits();
    test_course_mapping_and_series();

    println!("\nAll dataset tests passed!");
}
