//! Contraindication screening of intake answers.
//!
//! Keyword lookup over free-text intake entries. Matching is case-insensitive
//! substring matching, so "Accutane 20mg" still triggers the isotretinoin rule.

use crate::models::{Contraindication, IntakeProfile, Severity};

/// Which intake list a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Allergies,
    Medications,
    SkinConditions,
}

struct Rule {
    field: Field,
    keywords: &'static [&'static str],
    severity: Severity,
    note: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        field: Field::Medications,
        keywords: &["isotretinoin", "accutane", "roaccutane"],
        severity: Severity::Defer,
        note: "wait at least six months after the last isotretinoin dose",
    },
    Rule {
        field: Field::Medications,
        keywords: &["warfarin", "heparin", "apixaban", "rivaroxaban", "clopidogrel"],
        severity: Severity::Defer,
        note: "anticoagulants need written clearance from the prescriber",
    },
    Rule {
        field: Field::Medications,
        keywords: &["aspirin", "ibuprofen", "fish oil", "omega-3", "vitamin e"],
        severity: Severity::Caution,
        note: "blood-thinning effect; ask the client to pause 48 hours before",
    },
    Rule {
        field: Field::Medications,
        keywords: &["chemotherapy", "chemo"],
        severity: Severity::Defer,
        note: "active chemotherapy requires oncologist clearance",
    },
    Rule {
        field: Field::Medications,
        keywords: &["retinol", "retin-a", "tretinoin"],
        severity: Severity::Caution,
        note: "stop topical retinoids on the treatment area two weeks before",
    },
    Rule {
        field: Field::SkinConditions,
        keywords: &["keloid"],
        severity: Severity::Defer,
        note: "keloid history: patch test and medical advice before booking",
    },
    Rule {
        field: Field::SkinConditions,
        keywords: &["herpes", "cold sore", "fever blister"],
        severity: Severity::Caution,
        note: "lip work can trigger an outbreak; antiviral prophylaxis advised",
    },
    Rule {
        field: Field::SkinConditions,
        keywords: &["psoriasis", "eczema", "dermatitis"],
        severity: Severity::Caution,
        note: "do not work over active lesions",
    },
    Rule {
        field: Field::SkinConditions,
        keywords: &["pregnan", "breastfeeding", "nursing"],
        severity: Severity::Defer,
        note: "postpone until after pregnancy and breastfeeding",
    },
    Rule {
        field: Field::SkinConditions,
        keywords: &["diabetes", "diabetic"],
        severity: Severity::Caution,
        note: "slower healing; confirm condition is well controlled",
    },
    Rule {
        field: Field::Allergies,
        keywords: &["lidocaine", "tetracaine", "benzocaine", "prilocaine", "anesthetic", "anaesthetic"],
        severity: Severity::Caution,
        note: "use a numbing agent the client is not allergic to, or none",
    },
    Rule {
        field: Field::Allergies,
        keywords: &["pigment", "tattoo ink", "iron oxide"],
        severity: Severity::Defer,
        note: "previous pigment reaction: patch test required",
    },
    Rule {
        field: Field::Allergies,
        keywords: &["nickel", "metal"],
        severity: Severity::Caution,
        note: "some iron-oxide pigments carry trace nickel; patch test advised",
    },
    Rule {
        field: Field::Allergies,
        keywords: &["latex"],
        severity: Severity::Caution,
        note: "use nitrile gloves",
    },
];

fn entries(intake: &IntakeProfile, field: Field) -> &[String] {
    match field {
        Field::Allergies => &intake.allergies,
        Field::Medications => &intake.medications,
        Field::SkinConditions => &intake.skin_conditions,
    }
}

/// Screen intake answers. Each intake entry is flagged at most once per rule;
/// results are ordered with deferrals first.
pub fn screen(intake: &IntakeProfile) -> Vec<Contraindication> {
    let mut flags = Vec::new();

    for rule in RULES {
        for entry in entries(intake, rule.field) {
            let lower = entry.to_lowercase();
            if rule.keywords.iter().any(|k| lower.contains(k)) {
                flags.push(Contraindication {
                    trigger: entry.trim().to_string(),
                    severity: rule.severity,
                    note: rule.note.to_string(),
                });
            }
        }
    }

    // Stable sort keeps rule order within a severity
    flags.sort_by(|a, b| b.severity.cmp(&a.severity));
    flags
}
