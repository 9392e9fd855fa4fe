//! Summary statistics over widget rows.

use std::collections::HashMap;

use common::models::Row;

/// Largest `h` such that `h` publications have at least `h` citations each.
pub fn h_index(citations: &[i64]) -> usize {
    let mut sorted: Vec<i64> = citations.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted
        .iter()
        .enumerate()
        .take_while(|(i, c)| **c >= (*i as i64) + 1)
        .count()
}

/// Most frequent non-empty text value of a column. Ties go to the value seen
/// first.
pub fn mode<'a>(rows: &'a [Row], column: &str) -> Option<&'a str> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, text) in rows
        .iter()
        .filter_map(|row| row.get(column).and_then(|v| v.as_str()))
        .filter(|text| !text.trim().is_empty())
        .enumerate()
    {
        counts.entry(text).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(text, _)| text)
}

/// First non-empty text value of a column.
pub fn first_text<'a>(rows: &'a [Row], column: &str) -> Option<&'a str> {
    rows.iter()
        .filter_map(|row| row.get(column).and_then(|v| v.as_str()))
        .find(|text| !text.trim().is_empty())
}

fn ints(rows: &[Row], column: &str) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get(column).and_then(|v| v.as_i64()))
        .collect()
}

/// Aggregate view of one faculty member's publication list.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationSummary {
    pub total_publications: usize,
    pub total_citations: i64,
    pub average_citations: f64,
    pub h_index: usize,
    pub first_year: Option<i64>,
    pub last_year: Option<i64>,
    pub top_venue: Option<String>,
    pub university: Option<String>,
    pub department: Option<String>,
}

impl PublicationSummary {
    /// Rows follow the `faculty_publications` column schema.
    pub fn from_rows(rows: &[Row]) -> Self {
        let citations = ints(rows, "citations");
        let years = ints(rows, "year");
        let total_citations: i64 = citations.iter().sum();
        let average_citations = if rows.is_empty() {
            0.0
        } else {
            total_citations as f64 / rows.len() as f64
        };

        Self {
            total_publications: rows.len(),
            total_citations,
            average_citations,
            h_index: h_index(&citations),
            first_year: years.iter().min().copied(),
            last_year: years.iter().max().copied(),
            top_venue: mode(rows, "venue").map(str::to_string),
            university: first_text(rows, "university").map(str::to_string),
            department: first_text(rows, "department").map(str::to_string),
        }
    }

    pub fn years_active(&self) -> String {
        match (self.first_year, self.last_year) {
            (Some(first), Some(last)) if first == last => first.to_string(),
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            _ => "unknown".to_string(),
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} publications, {} citations (avg {:.1}), h-index {}, active {}, top venue {}, {} / {}",
            self.total_publications,
            self.total_citations,
            self.average_citations,
            self.h_index,
            self.years_active(),
            self.top_venue.as_deref().unwrap_or("n/a"),
            self.university.as_deref().unwrap_or("n/a"),
            self.department.as_deref().unwrap_or("n/a"),
        )
    }
}
