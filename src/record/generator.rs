//! Random record generation for producer clients.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use super::Record;

pub const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Charlie", "David", "Emily", "Fiona", "George", "Hannah", "Ian", "Julia",
];

pub const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez",
];

pub const PROGRAMMES: &[&str] = &[
    "Computer Science",
    "Information Technology",
    "Data Science",
    "Cybersecurity",
    "Software Engineering",
];

pub const COURSES: &[&str] = &[
    "Programming 101",
    "Databases",
    "Networking",
    "Web Development",
    "AI and Machine Learning",
    "Operating Systems",
    "Data Structures",
];

/// Generate a random record: 8-digit ID, 3 to 5 distinct courses with
/// marks in 30..=100.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Record {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Alice");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Smith");
    let programme = PROGRAMMES.choose(rng).copied().unwrap_or("Data Science");
    let student_id = rng.gen_range(10_000_000..=99_999_999);

    let count = rng.gen_range(3..=5);
    let courses: BTreeMap<String, i32> = COURSES
        .choose_multiple(rng, count)
        .map(|course| (course.to_string(), rng.gen_range(30..=100)))
        .collect();

    Record::new(format!("{} {}", first, last), student_id, programme, courses)
}
