//! crates/reading_groups_core/src/content.rs
//!
//! Locates the text of a part. Tanya and Mishnah parts are PDFs addressed by
//! part number; Psalms chapters are pages addressed by Hebrew numeral.

use crate::domain::{BookType, PartNumber};

pub const DEFAULT_PDF_BASE_URL: &str = "https://s3.amazonaws.com/DvarMalchus/tanya/socialTanya";
pub const DEFAULT_PSALMS_BASE_URL: &str = "https://nerlazadik.co.il/תהילים";

const UNITS: [&str; 9] = ["א", "ב", "ג", "ד", "ה", "ו", "ז", "ח", "ט"];
const TENS: [&str; 9] = ["י", "כ", "ל", "מ", "נ", "ס", "ע", "פ", "צ"];

/// Hebrew numeral for a chapter number, as used in the Psalms page paths.
///
/// 15 and 16 are written טו / טז. Above 100 the hundreds letter is prefixed
/// to the plain tens and units letters (so 115 is קיה). Numbers above 150
/// are returned in decimal.
pub fn hebrew_numeral(number: PartNumber) -> String {
    match number {
        0 => String::new(),
        15 => "טו".to_string(),
        16 => "טז".to_string(),
        1..=99 => tens_and_units(number),
        100..=150 => format!("ק{}", tens_and_units(number - 100)),
        _ => number.to_string(),
    }
}

fn tens_and_units(number: PartNumber) -> String {
    let tens = (number / 10) as usize;
    let units = (number % 10) as usize;
    let mut out = String::new();
    if tens > 0 {
        out.push_str(TENS[tens - 1]);
    }
    if units > 0 {
        out.push_str(UNITS[units - 1]);
    }
    out
}

/// Builds content URLs from configurable base locations.
#[derive(Debug, Clone)]
pub struct ContentLocator {
    pdf_base_url: String,
    psalms_base_url: String,
}

impl Default for ContentLocator {
    fn default() -> Self {
        Self::new(DEFAULT_PDF_BASE_URL, DEFAULT_PSALMS_BASE_URL)
    }
}

impl ContentLocator {
    pub fn new(pdf_base_url: &str, psalms_base_url: &str) -> Self {
        Self {
            pdf_base_url: pdf_base_url.trim_end_matches('/').to_string(),
            psalms_base_url: psalms_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, book_type: BookType, part: PartNumber) -> String {
        match book_type {
            BookType::Tanya | BookType::Mishnah => format!("{}/{}.pdf", self.pdf_base_url, part),
            BookType::Psalms => format!(
                "{}/תהילים-פרק-{}/",
                self.psalms_base_url,
                hebrew_numeral(part)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerals_match_the_published_paths() {
        let cases = [
            (1, "א"),
            (9, "ט"),
            (10, "י"),
            (11, "יא"),
            (15, "טו"),
            (16, "טז"),
            (20, "כ"),
            (23, "כג"),
            (99, "צט"),
            (100, "ק"),
            (101, "קא"),
            (110, "קי"),
            (115, "קיה"),
            (119, "קיט"),
            (150, "קנ"),
        ];
        for (n, expected) in cases {
            assert_eq!(hebrew_numeral(n), expected, "numeral for {}", n);
        }
        assert_eq!(hebrew_numeral(0), "");
        assert_eq!(hebrew_numeral(151), "151");
    }

    #[test]
    fn urls_per_book_type() {
        let locator = ContentLocator::default();
        assert_eq!(
            locator.url_for(BookType::Tanya, 12),
            "https://s3.amazonaws.com/DvarMalchus/tanya/socialTanya/12.pdf"
        );
        assert_eq!(
            locator.url_for(BookType::Mishnah, 500),
            "https://s3.amazonaws.com/DvarMalchus/tanya/socialTanya/500.pdf"
        );
        assert_eq!(
            locator.url_for(BookType::Psalms, 23),
            "https://nerlazadik.co.il/תהילים/תהילים-פרק-כג/"
        );
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let locator = ContentLocator::new("https://cdn.example/pdf/", "https://psalms.example/");
        assert_eq!(locator.url_for(BookType::Tanya, 1), "https://cdn.example/pdf/1.pdf");
        assert_eq!(
            locator.url_for(BookType::Psalms, 1),
            "https://psalms.example/תהילים-פרק-א/"
        );
    }
}
