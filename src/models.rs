use serde::{Deserialize, Serialize};

/// Class standing of a student, parsed from the registrar's two-letter codes.
///
/// This is a closed enumeration; unknown codes are rejected at parse time
/// rather than carried through the dataset as free-form strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassYear {
    Freshman,
    Sophomore,
    Junior,
    Senior,
}

impl ClassYear {
    /// Parse a registrar class code (`FR`, `SO`, `JR`, `SR`).
    ///
    /// # Returns
    /// * `Option<ClassYear>` - The parsed class year, or `None` for an
    ///   unrecognized code
    pub fn parse(code: &str) -> Option<ClassYear> {
        match code {
            "FR" => Some(ClassYear::Freshman),
            "SO" => Some(ClassYear::Sophomore),
            "JR" => Some(ClassYear::Junior),
            "SR" => Some(ClassYear::Senior),
            _ => None,
        }
    }

    /// Human-readable label used on the data page.
    pub fn label(&self) -> &'static str {
        match self {
            ClassYear::Freshman => "Freshman",
            ClassYear::Sophomore => "Sophomore",
            ClassYear::Junior => "Junior",
            ClassYear::Senior => "Senior",
        }
    }
}

/// Academic term a course was offered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Semester {
    Fall,
    Spring,
    Winter,
    Summer,
}

impl Semester {
    /// Parse a term code (`FA`, `SP`, `WI`, `SU`).
    pub fn parse(code: &str) -> Option<Semester> {
        match code {
            "FA" => Some(Semester::Fall),
            "SP" => Some(Semester::Spring),
            "WI" => Some(Semester::Winter),
            "SU" => Some(Semester::Summer),
            _ => None,
        }
    }

    /// Term code as it appears in uploads and tables.
    pub fn code(&self) -> &'static str {
        match self {
            Semester::Fall => "FA",
            Semester::Spring => "SP",
            Semester::Winter => "WI",
            Semester::Summer => "SU",
        }
    }
}

/// Authentication provider for a user account.
///
/// Accounts created through the registration form are `Local`; accounts
/// provisioned through Google sign-in carry no local password hash and
/// cannot log in or reset a password locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    Local,
    Google,
}

/// An anonymized student record.
///
/// Student identifiers are randomized at upload time so the original
/// institutional IDs never reach the dataset. Optional fields were allowed
/// to be blank in the source workbook.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Student {
    /// Randomized identifier assigned during ingestion
    pub id: String,

    pub admit_year: i32,
    pub admit_term: String,
    pub admit_type: String,

    pub major: String,
    pub major_desc: String,
    pub concentration_desc: Option<String>,
    pub class_year: ClassYear,

    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,

    pub race_ethnicity: String,
    pub gender: String,

    /// Cumulative college GPA, 0.0 - 4.0
    pub gpa_cumulative: Option<f64>,
    pub math_placement_score: Option<i32>,

    /// High school GPA, 0.0 - 4.0
    pub high_school_gpa: Option<f64>,
    pub high_school_name: Option<String>,
    pub high_school_city: Option<String>,
    pub high_school_state: Option<String>,
    pub high_school_ceeb: Option<i32>,

    pub sat_math: Option<i32>,
    pub sat_total: Option<i32>,
}

impl Student {
    /// Formats the student's home location from whichever of city, state
    /// and country are present, matching the data page's display rules.
    pub fn home_location(&self) -> String {
        match (&self.city, &self.state, &self.country) {
            (Some(city), Some(state), Some(country)) => {
                format!("{}, {}, {}", city, state, country)
            }
            (Some(city), Some(state), None) => format!("{}, {}", city, state),
            (Some(city), None, Some(country)) => format!("{}, {}", city, country),
            (None, Some(state), Some(country)) => format!("{}, {}", state, country),
            _ => String::new(),
        }
    }

    /// High school location for the data page. `N/A` when neither city nor
    /// state is known.
    pub fn high_school_location(&self) -> String {
        match (&self.high_school_city, &self.high_school_state) {
            (Some(city), Some(state)) => format!("{}, {}", city, state),
            (Some(city), None) => city.clone(),
            (None, Some(state)) => state.clone(),
            (None, None) => "N/A".to_string(),
        }
    }
}

/// A course offering (one course number in one term of one year).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_num: String,
    pub title: String,
    pub semester: Semester,
    pub year: i32,
}

impl Course {
    /// Term plus year, e.g. `FA 2021`, used in dropdowns and tables.
    pub fn term_label(&self) -> String {
        format!("{} {}", self.semester.code(), self.year)
    }
}

/// One student's enrollment outcome in one course offering.
///
/// `course` indexes into the dataset's course table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassData {
    pub student_id: String,
    pub course: usize,
    pub program_level: String,
    pub subprogram_code: String,
    pub grade: String,
}

/// Demographic block of a flattened table record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Demographics {
    pub race_ethnicity: String,
    pub gender: String,
    pub home_location: String,
    pub home_zip_code: String,
}

/// Academic block of a flattened table record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcademicInfo {
    pub major: String,
    pub concentration: String,
    pub class_year: String,
    pub college_gpa: Option<f64>,
    pub math_placement_score: Option<i32>,
    pub sat_math: Option<i32>,
    pub sat_total: Option<i32>,
    pub admit_term_year: String,
    pub admit_type: String,
}

/// High school block of a flattened table record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HighSchoolInfo {
    pub gpa: Option<f64>,
    pub name: String,
    pub location: String,
    pub ceeb: Option<i32>,
}

/// A fully flattened row for the data page: the class entry joined with the
/// student it belongs to and the course it was taken in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableRecord {
    pub student_id: String,
    pub course_code: String,
    pub program_level: String,
    pub subprogram_code: String,
    pub semester: String,
    pub year: i32,
    pub grade: String,
    pub demographics: Demographics,
    pub academic_info: AcademicInfo,
    pub high_school_info: HighSchoolInfo,
}
