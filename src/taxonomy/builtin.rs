//! Built-in forensic lane table.
//!
//! Lane ids are stable identifiers referenced by stored records; add new lanes
//! or paths rather than renumbering existing ones.

use super::{ExtractionSchema, FieldSpec, Lane, LanePath, ScalarType};

fn string() -> FieldSpec {
    FieldSpec::scalar(ScalarType::String)
}

fn number() -> FieldSpec {
    FieldSpec::scalar(ScalarType::Number)
}

fn date() -> FieldSpec {
    FieldSpec::scalar(ScalarType::Date)
}

fn currency() -> FieldSpec {
    FieldSpec::scalar(ScalarType::Currency)
}

fn percentage() -> FieldSpec {
    FieldSpec::scalar(ScalarType::Percentage)
}

fn boolean() -> FieldSpec {
    FieldSpec::scalar(ScalarType::Boolean)
}

fn path(id: &str, name: &str, description: &str, fields: Vec<(&str, FieldSpec)>) -> LanePath {
    LanePath {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        extraction_schema: ExtractionSchema::new(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ),
    }
}

fn lane(id: &str, name: &str, group: &str, paths: Vec<LanePath>) -> Lane {
    Lane {
        id: id.to_string(),
        name: name.to_string(),
        group: group.to_string(),
        paths,
    }
}

pub(super) fn forensic_lanes() -> Vec<Lane> {
    vec![
        // Core assets
        lane(
            "01",
            "Property & Real Estate",
            "Core Assets",
            vec![
                path(
                    "deeds",
                    "Deeds",
                    "Ownership deeds for 320-acre properties",
                    vec![
                        ("document_type", string()),
                        (
                            "recording_info",
                            FieldSpec::object([("liber", string()), ("record_date", date())]),
                        ),
                        (
                            "parties",
                            FieldSpec::object([("grantor", string()), ("grantee", string())]),
                        ),
                        (
                            "property_identifiers",
                            FieldSpec::object([("parcel_id", string()), ("legal_desc", string())]),
                        ),
                        (
                            "consideration_amount",
                            currency().with_description("Was it sold for $1?"),
                        ),
                        (
                            "transfer_tax",
                            currency().with_description("Implies true value"),
                        ),
                    ],
                ),
                path(
                    "tax_assessments",
                    "Property Tax",
                    "Tax bills for woodlands",
                    vec![
                        ("tax_year", string()),
                        ("taxable_value", currency()),
                        ("state_equalized_value", currency()),
                        ("millage_rate", number()),
                        ("total_tax_due", currency()),
                    ],
                ),
            ],
        ),
        // Land & conservancy
        lane(
            "09",
            "Timber & Resources",
            "Land & Conservancy",
            vec![
                path(
                    "timber_contracts",
                    "Timber Harvesting Contracts",
                    "Stumpage, thinning, and logging agreements",
                    vec![
                        ("logger_name", string()),
                        ("contract_date", date()),
                        ("species_harvested", string()),
                        ("volume_mbf", number()),
                        ("stumpage_rate", currency()),
                        ("total_payment", currency()),
                        (
                            "payment_dest_account",
                            string().with_description("Did this go to Joint or Separate?"),
                        ),
                    ],
                ),
                path(
                    "mineral_rights",
                    "Mineral/Oil/Gas Leases",
                    "Subsurface rights revenue",
                    vec![
                        ("lessee", string()),
                        ("lease_term", string()),
                        ("royalty_percent", percentage()),
                        ("signing_bonus", currency()),
                        ("monthly_royalties", currency()),
                    ],
                ),
            ],
        ),
        lane(
            "10",
            "Government Programs",
            "Land & Conservancy",
            vec![
                path(
                    "usda_contracts",
                    "USDA/NRCS Contracts",
                    "CRP, EQIP, WHIP programs",
                    vec![
                        ("program_name", string()),
                        ("contract_number", string()),
                        ("practice_code", string()),
                        ("cost_share_amount", currency()),
                        ("obligated_completion_date", date()),
                    ],
                ),
                path(
                    "dnr_permits",
                    "DNR Management Plans",
                    "Forest stewardship and wildlife mgmt",
                    vec![
                        ("plan_type", string()),
                        ("enrolled_acres", number()),
                        ("tax_abatement", boolean()),
                        ("mandatory_actions", FieldSpec::array()),
                    ],
                ),
            ],
        ),
        lane(
            "11",
            "Land Improvements (Hobby Spend)",
            "Land & Conservancy",
            vec![
                path(
                    "heavy_equipment",
                    "Heavy Equipment",
                    "Tractors, Skidders, Dozers",
                    vec![
                        ("equipment_type", string()),
                        ("purchase_price", currency()),
                        ("funding_source", string()),
                        ("business_justification", string()),
                        ("usage_evidence", string()),
                    ],
                ),
                path(
                    "conservation_inputs",
                    "Conservation Inputs",
                    "Seed, Fertilizer, Lime for food plots",
                    vec![
                        ("product_type", string()),
                        ("quantity", number()),
                        ("cost", currency()),
                        ("location_applied", string()),
                    ],
                ),
            ],
        ),
        // Lifestyle
        lane(
            "13",
            "Subsidy & Third-Party",
            "Lifestyle",
            vec![path(
                "gifts",
                "Non-Obligatory Gifts",
                "Discretionary giving",
                vec![
                    ("recipient", string()),
                    ("date", date()),
                    ("value", currency()),
                ],
            )],
        ),
        lane(
            "17",
            "Sporting & Recreation",
            "Lifestyle",
            vec![path(
                "ammo",
                "Ammunition & Gear",
                "Consumable supplies",
                vec![
                    ("retailer", string()),
                    ("caliber", string()),
                    ("price", currency()),
                ],
            )],
        ),
    ]
}
