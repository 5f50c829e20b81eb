//! Student record - the domain payload moved through the queue.
//!
//! The server never looks inside a record; it only stores the encoded
//! bytes. Producers build records (see [`generate`]) and encode them with
//! a [`RecordCodec`](crate::codec::RecordCodec), consumers decode them and
//! print the report produced by the `Display` impl.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use bufferd::record::{Outcome, Record};
//!
//! let mut courses = BTreeMap::new();
//! courses.insert("Databases".to_string(), 70);
//! courses.insert("Networking".to_string(), 40);
//!
//! let record = Record::new("Alice Smith", 12345678, "Data Science", courses);
//! assert_eq!(record.average(), 55.0);
//! assert_eq!(record.outcome(), Outcome::Pass);
//! ```

mod generator;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use generator::{generate, COURSES, FIRST_NAMES, LAST_NAMES, PROGRAMMES};

/// Average mark at or above which a student passes.
pub const PASS_MARK: f64 = 50.0;

/// One student record.
///
/// Course names are unique (map keys). Average and outcome are derived on
/// demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Full name.
    pub name: String,
    /// Numeric student identifier.
    pub student_id: i64,
    /// Programme of study.
    pub programme: String,
    /// Course name to mark (0-100 by convention, not enforced).
    pub courses: BTreeMap<String, i32>,
}

/// Pass/fail status derived from the average mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => f.write_str("Pass"),
            Outcome::Fail => f.write_str("Fail"),
        }
    }
}

impl Record {
    /// Create a new record.
    pub fn new(
        name: impl Into<String>,
        student_id: i64,
        programme: impl Into<String>,
        courses: BTreeMap<String, i32>,
    ) -> Self {
        Self {
            name: name.into(),
            student_id,
            programme: programme.into(),
            courses,
        }
    }

    /// Mean of all course marks, 0.0 when there are no courses.
    pub fn average(&self) -> f64 {
        if self.courses.is_empty() {
            return 0.0;
        }
        let total: i64 = self.courses.values().map(|&m| i64::from(m)).sum();
        total as f64 / self.courses.len() as f64
    }

    /// Pass when the average reaches [`PASS_MARK`].
    pub fn outcome(&self) -> Outcome {
        if self.average() >= PASS_MARK {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let courses = self
            .courses
            .iter()
            .map(|(course, mark)| format!("{}: {}", course, mark))
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(f, "--- Student Information ---")?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "ID: {}", self.student_id)?;
        writeln!(f, "Programme: {}", self.programme)?;
        writeln!(f, "Courses: {}", courses)?;
        writeln!(f, "Average: {:.2}", self.average())?;
        writeln!(f, "Status: {}", self.outcome())?;
        write!(f, "---------------------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(marks: &[(&str, i32)]) -> Record {
        let courses = marks
            .iter()
            .map(|(name, mark)| (name.to_string(), *mark))
            .collect();
        Record::new("Bob Jones", 87654321, "Cybersecurity", courses)
    }

    #[test]
    fn test_average_of_no_courses_is_zero() {
        let record = record_with(&[]);
        assert_eq!(record.average(), 0.0);
        assert_eq!(record.outcome(), Outcome::Fail);
    }

    #[test]
    fn test_average_and_outcome() {
        let record = record_with(&[("Databases", 80), ("Networking", 61), ("AI", 30)]);
        assert!((record.average() - 57.0).abs() < f64::EPSILON);
        assert_eq!(record.outcome(), Outcome::Pass);

        let record = record_with(&[("Databases", 49), ("Networking", 50)]);
        assert_eq!(record.outcome(), Outcome::Fail);
    }

    #[test]
    fn test_pass_boundary_is_inclusive() {
        let record = record_with(&[("Databases", 50)]);
        assert_eq!(record.outcome(), Outcome::Pass);
    }

    #[test]
    fn test_display_report() {
        let record = record_with(&[("Databases", 75), ("Networking", 60)]);
        let report = record.to_string();

        assert!(report.contains("Name: Bob Jones"));
        assert!(report.contains("ID: 87654321"));
        assert!(report.contains("Programme: Cybersecurity"));
        assert!(report.contains("Courses: Databases: 75, Networking: 60"));
        assert!(report.contains("Average: 67.50"));
        assert!(report.contains("Status: Pass"));
    }
}
