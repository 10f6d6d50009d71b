//! Pigment family lookup by phototype, undertone and procedure.

use crate::models::{FitzpatrickType, PigmentRecommendation, Procedure, Undertone};

/// Light (I-II), medium (III-IV) or deep (V-VI) skin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Light,
    Medium,
    Deep,
}

impl From<FitzpatrickType> for Depth {
    fn from(t: FitzpatrickType) -> Self {
        match t {
            FitzpatrickType::I | FitzpatrickType::II => Depth::Light,
            FitzpatrickType::III | FitzpatrickType::IV => Depth::Medium,
            FitzpatrickType::V | FitzpatrickType::VI => Depth::Deep,
        }
    }
}

fn base_family(procedure: Procedure, depth: Depth, undertone: Undertone) -> &'static str {
    match (procedure, depth) {
        (Procedure::Brows, Depth::Light) => "taupe",
        (Procedure::Brows, Depth::Medium) => "medium brown",
        (Procedure::Brows, Depth::Deep) => "dark brown",
        (Procedure::Lips, Depth::Light) if undertone == Undertone::Cool => "soft pink rose",
        (Procedure::Lips, Depth::Light) => "soft nude rose",
        (Procedure::Lips, Depth::Medium) if undertone == Undertone::Cool => "rose",
        (Procedure::Lips, Depth::Medium) => "coral rose",
        (Procedure::Lips, Depth::Deep) => "deep berry",
        (Procedure::Eyeliner, _) => "carbon black",
        (Procedure::Areola, Depth::Light) => "light rose beige",
        (Procedure::Areola, Depth::Medium) => "caramel",
        (Procedure::Areola, Depth::Deep) => "deep cocoa",
    }
}

/// Corrective modifier that keeps the healed colour true to the base family.
fn modifier(procedure: Procedure, undertone: Undertone) -> Option<(&'static str, &'static str)> {
    match (procedure, undertone) {
        (Procedure::Brows, Undertone::Cool) => Some((
            "warm orange",
            "cool undertones pull brow pigment towards grey or blue as it heals",
        )),
        (Procedure::Brows, Undertone::Olive) => Some((
            "warm orange",
            "olive undertones cast green through ash browns",
        )),
        (Procedure::Areola, Undertone::Olive) => Some((
            "warm red",
            "olive undertones flatten rosy areola shades",
        )),
        _ => None,
    }
}

/// Recommend pigments for a procedure.
///
/// The list is ordered by application: a neutralizer step, when needed,
/// comes before the colour.
pub fn recommend(
    fitzpatrick: FitzpatrickType,
    undertone: Undertone,
    procedure: Procedure,
) -> Vec<PigmentRecommendation> {
    let depth = Depth::from(fitzpatrick);
    let mut recommendations = Vec::new();

    if procedure == Procedure::Lips && depth == Depth::Deep {
        recommendations.push(PigmentRecommendation {
            family: "lip neutralizer".into(),
            modifier: Some("warm orange".into()),
            rationale: "neutralize natural lip darkness before colour".into(),
        });
    }

    let family = base_family(procedure, depth, undertone);
    let (modifier, modifier_reason) = match modifier(procedure, undertone) {
        Some((m, reason)) => (Some(m.to_string()), Some(reason)),
        None => (None, None),
    };

    let mut rationale = format!(
        "type {} skin with {} undertone",
        fitzpatrick.number(),
        undertone.as_str()
    );
    if let Some(reason) = modifier_reason {
        rationale.push_str("; ");
        rationale.push_str(reason);
    }
    if fitzpatrick.is_high_melanin() && procedure != Procedure::Eyeliner {
        rationale.push_str("; expect healed colour about a shade darker");
    }

    recommendations.push(PigmentRecommendation {
        family: family.into(),
        modifier,
        rationale,
    });

    recommendations
}
