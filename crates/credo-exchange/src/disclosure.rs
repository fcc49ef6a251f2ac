//! # Disclosure Templates and Presentation Definitions
//!
//! A disclosure is a stored request template describing what a holder
//! should present. The presentation definition derived from it follows
//! the DIF Presentation Exchange wire shape: one input descriptor and one
//! submission-requirement group per requested credential type.

use serde::{Deserialize, Serialize};

use credo_core::{DisclosureId, Timestamp};

/// A stored request template backing `DISCLOSURE`-type exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disclosure {
    /// Unique disclosure identifier.
    pub id: DisclosureId,
    /// Why the presentation is requested, shown to the holder.
    pub purpose: String,
    /// Credential types the holder should present.
    pub credential_types: Vec<String>,
    /// Subject attributes the verifier wants matched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identity_matchers: Vec<String>,
    /// How long the request stays valid, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// When the template was created.
    pub created_at: Timestamp,
}

/// A presentation definition handed to the holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationDefinition {
    /// Definition identifier (the disclosure id).
    pub id: String,
    /// One descriptor per requested credential type.
    pub input_descriptors: Vec<InputDescriptor>,
    /// One requirement per descriptor group.
    pub submission_requirements: Vec<SubmissionRequirement>,
}

/// Describes one credential the holder should supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    /// Descriptor identifier (the credential type).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Why this credential is requested.
    pub purpose: String,
    /// Groups this descriptor belongs to.
    pub group: Vec<String>,
    /// Field constraints the supplied credential must satisfy.
    pub constraints: Constraints,
}

/// Field constraints of an input descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Field-level path constraints.
    pub fields: Vec<FieldConstraint>,
}

/// A single field constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraint {
    /// JSONPath expressions selecting the constrained field.
    pub path: Vec<String>,
    /// JSON-Schema-style filter applied to the selected value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
}

/// A submission requirement over one descriptor group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequirement {
    /// Display name of the requirement.
    pub name: String,
    /// Selection rule; always `"all"` here.
    pub rule: String,
    /// The descriptor group the rule applies to.
    pub from: String,
}

/// Build the presentation definition for a disclosure: one input
/// descriptor and one submission-requirement group per credential type.
pub fn presentation_definition(disclosure: &Disclosure) -> PresentationDefinition {
    let mut input_descriptors = Vec::with_capacity(disclosure.credential_types.len());
    let mut submission_requirements = Vec::with_capacity(disclosure.credential_types.len());

    for credential_type in &disclosure.credential_types {
        let group = format!("{credential_type}_group");
        input_descriptors.push(InputDescriptor {
            id: credential_type.clone(),
            name: credential_type.clone(),
            purpose: disclosure.purpose.clone(),
            group: vec![group.clone()],
            constraints: Constraints {
                fields: vec![FieldConstraint {
                    path: vec!["$.type".to_string()],
                    filter: Some(serde_json::json!({
                        "type": "array",
                        "contains": { "const": credential_type }
                    })),
                }],
            },
        });
        submission_requirements.push(SubmissionRequirement {
            name: credential_type.clone(),
            rule: "all".to_string(),
            from: group,
        });
    }

    PresentationDefinition {
        id: disclosure.id.to_string(),
        input_descriptors,
        submission_requirements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disclosure(types: &[&str]) -> Disclosure {
        Disclosure {
            id: DisclosureId::new(),
            purpose: "Employment verification".to_string(),
            credential_types: types.iter().map(|s| s.to_string()).collect(),
            identity_matchers: Vec::new(),
            duration: Some(3600),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn one_descriptor_and_group_per_type() {
        let d = disclosure(&["VerifiedEmployee", "ProofOfResidence"]);
        let def = presentation_definition(&d);
        assert_eq!(def.input_descriptors.len(), 2);
        assert_eq!(def.submission_requirements.len(), 2);
        assert_eq!(def.input_descriptors[0].group, vec!["VerifiedEmployee_group"]);
        assert_eq!(def.submission_requirements[0].from, "VerifiedEmployee_group");
        assert_eq!(def.submission_requirements[0].rule, "all");
    }

    #[test]
    fn descriptor_constrains_type_field() {
        let d = disclosure(&["VerifiedEmployee"]);
        let def = presentation_definition(&d);
        let field = &def.input_descriptors[0].constraints.fields[0];
        assert_eq!(field.path, vec!["$.type"]);
        let filter = field.filter.as_ref().unwrap();
        assert_eq!(filter["contains"]["const"], "VerifiedEmployee");
    }

    #[test]
    fn empty_types_produce_empty_definition() {
        let d = disclosure(&[]);
        let def = presentation_definition(&d);
        assert!(def.input_descriptors.is_empty());
        assert!(def.submission_requirements.is_empty());
    }

    #[test]
    fn definition_wire_shape() {
        let d = disclosure(&["VerifiedEmployee"]);
        let json = serde_json::to_value(presentation_definition(&d)).unwrap();
        assert!(json.get("inputDescriptors").is_some());
        assert!(json.get("submissionRequirements").is_some());
    }
}
