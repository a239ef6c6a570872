use stemdash::dataset::Dataset;
use stemdash::models::{ClassData, ClassYear, Course, Semester, Student};
use stemdash::saving::{load_dataset, save_dataset};

fn sample_dataset() -> Dataset {
    let mut dataset = Dataset::new();

    dataset.students.insert(
        "S1".to_string(),
        Student {
            id: "S1".to_string(),
            admit_year: 2020,
            admit_term: "FA".to_string(),
            admit_type: "TR".to_string(),
            major: "MA".to_string(),
            major_desc: "Mathematics".to_string(),
            concentration_desc: Some("Statistics".to_string()),
            class_year: ClassYear::Senior,
            city: None,
            state: None,
            country: None,
            postal_code: None,
            race_ethnicity: "AS".to_string(),
            gender: "M".to_string(),
            gpa_cumulative: Some(3.9),
            math_placement_score: Some(30),
            high_school_gpa: None,
            high_school_name: None,
            high_school_city: None,
            high_school_state: None,
            high_school_ceeb: None,
            sat_math: Some(780),
            sat_total: Some(1500),
        },
    );

    let idx = dataset.find_or_insert_course(Course {
        course_num: "MA3101".to_string(),
        title: "Linear Algebra".to_string(),
        semester: Semester::Winter,
        year: 2023,
    });
    dataset.class_data.push(ClassData {
        student_id: "S1".to_string(),
        course: idx,
        program_level: "UNDG".to_string(),
        subprogram_code: "202".to_string(),
        grade: "A-".to_string(),
    });

    dataset
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.bin.gz");
    let path = path.to_str().unwrap();

    let dataset = sample_dataset();
    save_dataset(&dataset, path).unwrap();

    let loaded = load_dataset(path).unwrap();
    assert_eq!(loaded.total_students(), 1);
    assert_eq!(loaded.total_rows(), 1);
    assert_eq!(loaded.courses[0].course_num, "MA3101");
    assert_eq!(loaded.courses[0].semester, Semester::Winter);
    assert_eq!(loaded.class_data[0].grade, "A-");
    assert_eq!(loaded.students["S1"].sat_math, Some(780));
}

#[test]
fn save_replaces_an_existing_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.bin.gz");
    let path = path.to_str().unwrap();

    let mut dataset = sample_dataset();
    save_dataset(&dataset, path).unwrap();

    dataset.class_data.clear();
    save_dataset(&dataset, path).unwrap();

    let loaded = load_dataset(path).unwrap();
    assert_eq!(loaded.total_students(), 1);
    assert_eq!(loaded.total_rows(), 0);
}

#[test]
fn snapshot_with_unknown_version_is_rejected() {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::File;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.bin.gz");

    // A snapshot written by a hypothetical newer layout
    let file = File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    bincode::serialize_into(&mut encoder, &(99u16, sample_dataset())).unwrap();
    encoder.finish().unwrap();

    let err = load_dataset(path.to_str().unwrap()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn load_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.bin.gz");

    assert!(load_dataset(path.to_str().unwrap()).is_err());
}
