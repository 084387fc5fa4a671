//! Prompt templates for the expert fan-out.
//!
//! These are compact stand-ins for the coding rulebook text; the pipeline
//! mechanism does not depend on their wording, only on the response
//! protocol they instruct.

use crate::categories::Category;

/// Response protocol every expert is instructed to follow. The parser in
/// `protocol` accepts this format and degrades gracefully when a model
/// drifts from it.
const PROTOCOL_INSTRUCTIONS: &str = "\
Report every billable procedure you find as its own block, blocks separated by a line containing only ###.
Each block uses exactly these section markers, one per line:
CODE:
EXPLANATION:
DOUBT:
Put the CDT code on the line after CODE:. If a procedure was performed multiple times, emit one block per billable unit.
Write none under CODE: when no procedure in your range applies, and none under DOUBT: when you have no reservations.";

pub fn topic_prompt(scenario: &str) -> String {
    format!(
        "You are a dental billing triage assistant. List the CDT code ranges relevant to the \
narrative below, comma separated (for example: D0100-D0999, D1000-D1999). Answer none if no \
range applies.\n\nNARRATIVE:\n{}",
        scenario
    )
}

fn category_guidance(category: Category) -> &'static str {
    match category {
        Category::Diagnostic => {
            "Covers evaluations, radiographic images, and diagnostic tests. Radiographs are billed per image unless a multi-image code explicitly applies."
        }
        Category::Preventive => {
            "Covers prophylaxis, fluoride treatments, sealants, and preventive counseling. Prophylaxis is billed once per visit."
        }
        Category::Restorative => {
            "Covers direct and indirect restorations. Choose the code matching surface count and material; alternative materials for the same restoration are mutually exclusive."
        }
        Category::Endodontics => {
            "Covers pulpal therapy and root canal treatment, coded per tooth by canal anatomy."
        }
        Category::Periodontics => {
            "Covers surgical and non-surgical periodontal therapy, typically coded per quadrant."
        }
        Category::RemovableProsthodontics => {
            "Covers complete and partial dentures, relines, and repairs."
        }
        Category::MaxillofacialProsthetics => {
            "Covers prostheses replacing facial or oral structures lost to surgery or trauma."
        }
        Category::ImplantServices => {
            "Covers implant placement, maintenance, and implant-supported restorations."
        }
        Category::FixedProsthodontics => {
            "Covers crowns, fixed bridges, and their retainers; one unit per abutment or pontic."
        }
        Category::OralSurgery => {
            "Covers extractions and surgical procedures, coded per tooth; note whether an extraction was simple or surgical."
        }
        Category::Orthodontics => {
            "Covers appliance placement, periodic visits, and retention."
        }
        Category::AdjunctiveServices => {
            "Covers anesthesia, palliative treatment, and miscellaneous services."
        }
    }
}

pub fn expert_prompt(category: Category, scenario: &str) -> String {
    format!(
        "You are a dental coding expert for the {} category ({}). {}\n\n{}\n\nNARRATIVE:\n{}",
        category.name(),
        category.range(),
        category_guidance(category),
        PROTOCOL_INSTRUCTIONS,
        scenario
    )
}
