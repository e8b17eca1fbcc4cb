//! Membership application of the livestock producers' association.

use crate::collection::CollectionKey;
use crate::geo::GeoLevels;
use crate::predicate::Predicate;
use crate::schema::{FieldDefinition, FieldKind, FormSchema, StepDefinition};

use super::{applicant_fields, identity_lookup, APPLICANT_FIELDS};

pub const PRODUCTION_TYPES: &[&str] = &["dairy", "beef", "dual_purpose"];

pub fn membership() -> FormSchema {
    let mut fields = applicant_fields();
    fields.extend([
        FieldDefinition::new("farm_name", "Farm name", FieldKind::Text)
            .required()
            .max_length(100),
        FieldDefinition::new("region", "Region", FieldKind::GeoArea).required(),
        FieldDefinition::new("subregion", "Subregion", FieldKind::GeoArea).required(),
        FieldDefinition::new("district", "District", FieldKind::GeoArea).required(),
        FieldDefinition::new(
            "lives_on_property",
            "Lives on the property",
            FieldKind::Flag { must_accept: false },
        )
        .required()
        .default_value(true),
        FieldDefinition::new(
            "distance_to_property_km",
            "Distance to the property (km)",
            FieldKind::PositiveDecimal,
        )
        .required_when(Predicate::IsFalse("lives_on_property")),
        FieldDefinition::new("is_owner", "Owns the property", FieldKind::Flag { must_accept: false })
            .required()
            .default_value(true),
        FieldDefinition::new("owner_name", "Owner name", FieldKind::Text)
            .required_when(Predicate::IsFalse("is_owner"))
            .max_length(100),
        FieldDefinition::new("owner_phone", "Owner phone", FieldKind::Phone)
            .required_when(Predicate::IsFalse("is_owner")),
        FieldDefinition::new(
            "production_type",
            "Production type",
            FieldKind::Choice(PRODUCTION_TYPES),
        )
        .required(),
        FieldDefinition::new(
            "accepts_terms",
            "I accept the association's terms",
            FieldKind::Flag { must_accept: true },
        )
        .required(),
    ]);

    FormSchema {
        name: "membership",
        title: "Membership application",
        fields,
        steps: vec![
            StepDefinition::new(1, "Applicant", APPLICANT_FIELDS.to_vec()),
            StepDefinition::new(
                2,
                "Property",
                vec![
                    "farm_name",
                    "region",
                    "subregion",
                    "district",
                    "lives_on_property",
                    "distance_to_property_km",
                    "is_owner",
                    "owner_name",
                    "owner_phone",
                ],
            ),
            StepDefinition::new(3, "Production", vec!["production_type"])
                .collection(CollectionKey::Animals, true)
                .collection(CollectionKey::Forage, false)
                .collection(CollectionKey::WaterSources, true),
            StepDefinition::new(4, "Confirmation", vec!["accepts_terms"]),
        ],
        lookup: Some(identity_lookup()),
        geo: Some(GeoLevels {
            region: "region",
            subregion: "subregion",
            district: "district",
        }),
        attachment_slots: vec!["id_document", "property_deed"],
    }
}
