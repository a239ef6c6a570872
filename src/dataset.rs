use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chart::{CourseSeries, Dimension};
use crate::models::{
    AcademicInfo, ClassData, Course, Demographics, HighSchoolInfo, Student, TableRecord,
};

/// Grades counted toward the DWF rate.
const DWF_GRADES: [&str; 5] = ["D+", "D", "D-", "F", "W"];

/// The complete uploaded dataset: students keyed by their anonymized id,
/// the course table, and one class-data row per enrollment outcome.
///
/// Students are kept in a `BTreeMap` so every walk over the dataset is
/// deterministic; class rows keep their upload order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub students: BTreeMap<String, Student>,
    pub courses: Vec<Course>,
    pub class_data: Vec<ClassData>,
}

/// One row of the highest/lowest DWF table on the dashboard page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DwfRow {
    pub course_num: String,
    pub semester: String,
    pub year: i32,
    pub avg_dwf: f64,
}

/// A course/term pair selected in the visualizations dropdowns.
#[derive(Clone, Debug, Deserialize)]
pub struct CourseSelection {
    pub course: String,

    /// Term label (`FA 2021`); `None` selects every offering of the course
    #[serde(default)]
    pub semester: Option<String>,
}

impl Dataset {
    pub fn new() -> Dataset {
        Dataset::default()
    }

    /// Returns the index of a matching course, inserting it first if the
    /// dataset has not seen this offering yet.
    pub fn find_or_insert_course(&mut self, course: Course) -> usize {
        if let Some(idx) = self.courses.iter().position(|c| *c == course) {
            idx
        } else {
            self.courses.push(course);
            self.courses.len() - 1
        }
    }

    pub fn total_students(&self) -> usize {
        self.students.len()
    }

    pub fn total_rows(&self) -> usize {
        self.class_data.len()
    }

    /// Average cumulative college GPA across all students. Students with no
    /// recorded GPA contribute nothing to the sum but still count toward
    /// the denominator, matching the dashboard's historical numbers.
    pub fn avg_gpa(&self) -> f64 {
        if self.students.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .students
            .values()
            .filter_map(|s| s.gpa_cumulative)
            .sum();
        sum / self.students.len() as f64
    }

    /// Average high school GPA, same denominator rules as [`avg_gpa`].
    ///
    /// [`avg_gpa`]: Dataset::avg_gpa
    pub fn avg_high_school_gpa(&self) -> f64 {
        if self.students.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .students
            .values()
            .filter_map(|s| s.high_school_gpa)
            .sum();
        sum / self.students.len() as f64
    }

    /// Average DWF rate over the whole dataset, as a percentage.
    pub fn avg_dwf(&self) -> f64 {
        if self.class_data.is_empty() {
            return 0.0;
        }
        let dwf = self
            .class_data
            .iter()
            .filter(|cd| DWF_GRADES.contains(&cd.grade.as_str()))
            .count();
        (dwf as f64 / self.class_data.len() as f64) * 100.0
    }

    /// Per-course DWF rates, one row per course offering with at least one
    /// class entry.
    pub fn dwf_by_course(&self) -> Vec<DwfRow> {
        let mut rows = Vec::new();

        for (idx, course) in self.courses.iter().enumerate() {
            let mut total = 0usize;
            let mut dwf = 0usize;
            for cd in self.class_data.iter().filter(|cd| cd.course == idx) {
                total += 1;
                if DWF_GRADES.contains(&cd.grade.as_str()) {
                    dwf += 1;
                }
            }
            if total > 0 {
                rows.push(DwfRow {
                    course_num: course.course_num.clone(),
                    semester: course.semester.code().to_string(),
                    year: course.year,
                    avg_dwf: (dwf as f64 / total as f64) * 100.0,
                });
            }
        }

        rows
    }

    /// The five course offerings with the highest (`part = "highest"`) or
    /// lowest DWF rates. Unknown parts fall back to highest.
    pub fn dwf_extremes(&self, part: &str) -> Vec<DwfRow> {
        let mut rows = self.dwf_by_course();
        if part == "lowest" {
            rows.sort_by(|a, b| a.avg_dwf.total_cmp(&b.avg_dwf));
        } else {
            rows.sort_by(|a, b| b.avg_dwf.total_cmp(&a.avg_dwf));
        }
        rows.truncate(5);
        rows
    }

    /// Course number → terms the course was offered in, for the cascading
    /// dropdowns on the visualizations page.
    pub fn course_semester_mapping(&self) -> BTreeMap<String, Vec<String>> {
        let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for course in &self.courses {
            let terms = mapping.entry(course.course_num.clone()).or_default();
            let label = course.term_label();
            if !terms.contains(&label) {
                terms.push(label);
            }
        }
        mapping
    }

    /// Flattened table records for the data page.
    ///
    /// # Arguments
    /// * `limit` - Maximum number of records to return; `None` returns all
    ///
    /// # Errors
    /// * Returns an error when the limit exceeds the number of rows
    pub fn records(&self, limit: Option<usize>) -> Result<Vec<TableRecord>, String> {
        let count = match limit {
            Some(n) if n > self.class_data.len() => {
                return Err("Limit out of bounds.".to_string());
            }
            Some(n) => n,
            None => self.class_data.len(),
        };

        let mut records = Vec::with_capacity(count);
        for cd in self.class_data.iter().take(count) {
            let student = match self.students.get(&cd.student_id) {
                Some(student) => student,
                None => continue,
            };
            let course = match self.courses.get(cd.course) {
                Some(course) => course,
                None => continue,
            };

            records.push(TableRecord {
                student_id: cd.student_id.clone(),
                course_code: course.course_num.clone(),
                program_level: cd.program_level.clone(),
                subprogram_code: cd.subprogram_code.clone(),
                semester: course.semester.code().to_string(),
                year: course.year,
                grade: cd.grade.clone(),
                demographics: Demographics {
                    race_ethnicity: student.race_ethnicity.clone(),
                    gender: student.gender.clone(),
                    home_location: student.home_location(),
                    home_zip_code: student.postal_code.clone().unwrap_or_default(),
                },
                academic_info: AcademicInfo {
                    major: student.major_desc.clone(),
                    concentration: student.concentration_desc.clone().unwrap_or_default(),
                    class_year: student.class_year.label().to_string(),
                    college_gpa: student.gpa_cumulative,
                    math_placement_score: student.math_placement_score,
                    sat_math: student.sat_math,
                    sat_total: student.sat_total,
                    admit_term_year: format!("{} {}", student.admit_term, student.admit_year),
                    admit_type: student.admit_type.clone(),
                },
                high_school_info: HighSchoolInfo {
                    gpa: student.high_school_gpa,
                    name: student.high_school_name.clone().unwrap_or_default(),
                    location: student.high_school_location(),
                    ceeb: student.high_school_ceeb,
                },
            });
        }

        Ok(records)
    }

    /// Collects the raw category codes for the selected course offerings,
    /// ready for the bucketizer.
    ///
    /// The series key is the course number plus, when a term was selected,
    /// its term label. Class rows whose student is missing are skipped for
    /// the demographic dimensions since they carry no code to count.
    pub fn course_series(
        &self,
        dimension: Dimension,
        selections: &[CourseSelection],
    ) -> CourseSeries {
        let mut series = CourseSeries::new();

        for selection in selections {
            let key = match &selection.semester {
                Some(term) => format!("{} ({})", selection.course, term),
                None => selection.course.clone(),
            };
            // A selection repeated in the UI must not double-count students.
            if series.contains_key(&key) {
                continue;
            }
            let codes = series.entry(key).or_default();

            for (idx, course) in self.courses.iter().enumerate() {
                if course.course_num != selection.course {
                    continue;
                }
                if let Some(term) = &selection.semester {
                    if course.term_label() != *term {
                        continue;
                    }
                }

                for cd in self.class_data.iter().filter(|cd| cd.course == idx) {
                    match dimension {
                        Dimension::Grade => codes.push(cd.grade.clone()),
                        Dimension::RaceEthnicity => {
                            if let Some(student) = self.students.get(&cd.student_id) {
                                codes.push(student.race_ethnicity.clone());
                            }
                        }
                        Dimension::Gender => {
                            if let Some(student) = self.students.get(&cd.student_id) {
                                codes.push(student.gender.clone());
                            }
                        }
                    }
                }
            }
        }

        series
    }
}
