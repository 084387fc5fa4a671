//! CDT category buckets and the fine-grained code to bucket mapping.
//!
//! The mapping is a prefix rule on the digit after the `D`, with two
//! sub-range splits: D5 divides at 5900 (removable prosthodontics vs
//! maxillofacial prosthetics) and D6 divides at 6200 (implant services vs
//! fixed prosthodontics).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Broad classification bucket, one registered expert handler each.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Diagnostic,
    Preventive,
    Restorative,
    Endodontics,
    Periodontics,
    RemovableProsthodontics,
    MaxillofacialProsthetics,
    ImplantServices,
    FixedProsthodontics,
    OralSurgery,
    Orthodontics,
    AdjunctiveServices,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Diagnostic,
        Category::Preventive,
        Category::Restorative,
        Category::Endodontics,
        Category::Periodontics,
        Category::RemovableProsthodontics,
        Category::MaxillofacialProsthetics,
        Category::ImplantServices,
        Category::FixedProsthodontics,
        Category::OralSurgery,
        Category::Orthodontics,
        Category::AdjunctiveServices,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Diagnostic => "Diagnostic",
            Category::Preventive => "Preventive",
            Category::Restorative => "Restorative",
            Category::Endodontics => "Endodontics",
            Category::Periodontics => "Periodontics",
            Category::RemovableProsthodontics => "Removable Prosthodontics",
            Category::MaxillofacialProsthetics => "Maxillofacial Prosthetics",
            Category::ImplantServices => "Implant Services",
            Category::FixedProsthodontics => "Fixed Prosthodontics",
            Category::OralSurgery => "Oral and Maxillofacial Surgery",
            Category::Orthodontics => "Orthodontics",
            Category::AdjunctiveServices => "Adjunctive General Services",
        }
    }

    /// The code range this bucket covers, as printed in prompts.
    pub fn range(&self) -> &'static str {
        match self {
            Category::Diagnostic => "D0100-D0999",
            Category::Preventive => "D1000-D1999",
            Category::Restorative => "D2000-D2999",
            Category::Endodontics => "D3000-D3999",
            Category::Periodontics => "D4000-D4999",
            Category::RemovableProsthodontics => "D5000-D5899",
            Category::MaxillofacialProsthetics => "D5900-D5999",
            Category::ImplantServices => "D6000-D6199",
            Category::FixedProsthodontics => "D6200-D6999",
            Category::OralSurgery => "D7000-D7999",
            Category::Orthodontics => "D8000-D8999",
            Category::AdjunctiveServices => "D9000-D9999",
        }
    }

    /// Map a fine-grained code identifier (`D0274`, `d1110`, or the start
    /// of a range like `D5900-D5999`) to its broad bucket.
    ///
    /// Deterministic and total: anything that does not look like a CDT
    /// identifier maps to `None`, never an error.
    pub fn from_code(code: &str) -> Option<Category> {
        let code = code.trim();
        let rest = code
            .strip_prefix('D')
            .or_else(|| code.strip_prefix('d'))?;
        // Take the leading digits only, so range identifiers like
        // "D5900-D5999" resolve by their start.
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() != 4 {
            return None;
        }
        let number: u32 = digits.parse().ok()?;
        let bucket = match number / 1000 {
            0 => Category::Diagnostic,
            1 => Category::Preventive,
            2 => Category::Restorative,
            3 => Category::Endodontics,
            4 => Category::Periodontics,
            5 if number >= 5900 => Category::MaxillofacialProsthetics,
            5 => Category::RemovableProsthodontics,
            6 if number < 6200 => Category::ImplantServices,
            6 => Category::FixedProsthodontics,
            7 => Category::OralSurgery,
            8 => Category::Orthodontics,
            9 => Category::AdjunctiveServices,
            _ => return None,
        };
        Some(bucket)
    }
}

/// Per-scenario record of which buckets already fired.
///
/// Once a bucket has been activated, further fine-grained identifiers
/// mapping to the same bucket are skipped: each expert handler fires at
/// most once per scenario.
#[derive(Debug, Default)]
pub struct ActivationTracker {
    seen: HashSet<Category>,
}

impl ActivationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a fine-grained identifier to its bucket, unless that bucket
    /// was already claimed for this scenario.
    pub fn claim(&mut self, code: &str) -> Option<Category> {
        let category = Category::from_code(code)?;
        if self.seen.insert(category) {
            Some(category)
        } else {
            None
        }
    }

    pub fn claimed(&self) -> &HashSet<Category> {
        &self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_mapping() {
        assert_eq!(Category::from_code("D0274"), Some(Category::Diagnostic));
        assert_eq!(Category::from_code("D1110"), Some(Category::Preventive));
        assert_eq!(Category::from_code("D2391"), Some(Category::Restorative));
        assert_eq!(Category::from_code("D7140"), Some(Category::OralSurgery));
        assert_eq!(
            Category::from_code("D9110"),
            Some(Category::AdjunctiveServices)
        );
    }

    #[test]
    fn test_subrange_splits() {
        assert_eq!(
            Category::from_code("D5110"),
            Some(Category::RemovableProsthodontics)
        );
        assert_eq!(
            Category::from_code("D5899"),
            Some(Category::RemovableProsthodontics)
        );
        assert_eq!(
            Category::from_code("D5900"),
            Some(Category::MaxillofacialProsthetics)
        );
        assert_eq!(
            Category::from_code("D6010"),
            Some(Category::ImplantServices)
        );
        assert_eq!(
            Category::from_code("D6199"),
            Some(Category::ImplantServices)
        );
        assert_eq!(
            Category::from_code("D6240"),
            Some(Category::FixedProsthodontics)
        );
    }

    #[test]
    fn test_range_identifiers_resolve_by_start() {
        assert_eq!(
            Category::from_code("D5900-D5999"),
            Some(Category::MaxillofacialProsthetics)
        );
        assert_eq!(
            Category::from_code("D0100-D0999"),
            Some(Category::Diagnostic)
        );
    }

    #[test]
    fn test_non_codes_map_to_none() {
        assert_eq!(Category::from_code(""), None);
        assert_eq!(Category::from_code("1110"), None);
        assert_eq!(Category::from_code("Dxyz"), None);
        assert_eq!(Category::from_code("D12"), None);
        assert_eq!(Category::from_code("prophylaxis"), None);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        assert_eq!(Category::from_code("D0274"), Category::from_code("D0274"));
    }

    #[test]
    fn test_tracker_claims_each_bucket_once() {
        let mut tracker = ActivationTracker::new();
        assert_eq!(tracker.claim("D0274"), Some(Category::Diagnostic));
        // Second diagnostic identifier: same bucket, no second activation.
        assert_eq!(tracker.claim("D0120"), None);
        assert_eq!(tracker.claim("D1110"), Some(Category::Preventive));
        assert_eq!(tracker.claimed().len(), 2);
    }
}
