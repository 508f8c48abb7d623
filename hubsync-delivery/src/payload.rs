//! Wire payloads.
//!
//! ```text
//! {"disease": d, "forecasts": [{"team", "model", "changes"}, …]}   forecast
//! {"disease": d, "targets":   [{"target", "changes"}, …]}          truth
//! {"disease": d, "changes":   ["path", …]}                         metadata, evaluation
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hubsync_core::{ChangeDescriptor, Channel, OwnerKey};

use crate::error::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub team: String,
    pub model: String,
    pub changes: Vec<ChangeDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub target: String,
    pub changes: Vec<ChangeDescriptor>,
}

/// Channel-specific part of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadBody {
    Forecasts(Vec<ForecastRecord>),
    Targets(Vec<TargetRecord>),
    Changes(Vec<ChangeDescriptor>),
}

impl PayloadBody {
    /// Group `entries` into the record shape `channel` expects.
    ///
    /// Records are ordered by owner; descriptors keep their input order.
    pub fn for_channel(
        channel: Channel,
        entries: &[(OwnerKey, ChangeDescriptor)],
    ) -> Result<Self, DeliveryError> {
        let mismatch = |owner: &OwnerKey| DeliveryError::ChannelMismatch {
            channel,
            owner: owner.clone(),
        };

        match channel {
            Channel::Forecast => {
                let mut grouped: BTreeMap<(&str, &str), Vec<ChangeDescriptor>> = BTreeMap::new();
                for (owner, d) in entries {
                    let OwnerKey::TeamModel { team, model } = owner else {
                        return Err(mismatch(owner));
                    };
                    grouped.entry((team.as_str(), model.as_str())).or_default().push(d.clone());
                }
                Ok(PayloadBody::Forecasts(
                    grouped
                        .into_iter()
                        .map(|((team, model), changes)| ForecastRecord {
                            team: team.to_owned(),
                            model: model.to_owned(),
                            changes,
                        })
                        .collect(),
                ))
            }
            Channel::Target => {
                let mut grouped: BTreeMap<&str, Vec<ChangeDescriptor>> = BTreeMap::new();
                for (owner, d) in entries {
                    let OwnerKey::Target { name } = owner else {
                        return Err(mismatch(owner));
                    };
                    grouped.entry(name.as_str()).or_default().push(d.clone());
                }
                Ok(PayloadBody::Targets(
                    grouped
                        .into_iter()
                        .map(|(target, changes)| TargetRecord {
                            target: target.to_owned(),
                            changes,
                        })
                        .collect(),
                ))
            }
            Channel::Metadata | Channel::Evaluation => {
                let mut changes = Vec::with_capacity(entries.len());
                for (owner, d) in entries {
                    if *owner != OwnerKey::Flat {
                        return Err(mismatch(owner));
                    }
                    changes.push(d.clone());
                }
                Ok(PayloadBody::Changes(changes))
            }
        }
    }
}

/// Complete request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub disease: String,
    #[serde(flatten)]
    pub body: PayloadBody,
}

impl Payload {
    pub fn new(disease: impl Into<String>, body: PayloadBody) -> Self {
        Self {
            disease: disease.into(),
            body,
        }
    }

    /// Compact JSON bytes; these exact bytes are signed and sent.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeliveryError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> ChangeDescriptor {
        ChangeDescriptor::from(s)
    }

    #[test]
    fn forecast_payload_groups_by_team_and_model() {
        let entries = vec![
            (OwnerKey::team_model("teamA", "modelB"), d("model-output/teamA-modelB/1.csv")),
            (OwnerKey::team_model("teamA", "modelB"), d("model-output/teamA-modelB/2.csv")),
            (OwnerKey::team_model("teamA", "modelC"), d("model-output/teamA-modelC/1.csv")),
        ];
        let body = PayloadBody::for_channel(Channel::Forecast, &entries).unwrap();
        let bytes = Payload::new("flu", body).to_bytes().unwrap();

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"disease":"flu","forecasts":[{"team":"teamA","model":"modelB","changes":["model-output/teamA-modelB/1.csv","model-output/teamA-modelB/2.csv"]},{"team":"teamA","model":"modelC","changes":["model-output/teamA-modelC/1.csv"]}]}"#
        );
    }

    #[test]
    fn target_payload_uses_target_name() {
        let entries = vec![(
            OwnerKey::target("hospital admissions"),
            d("target-data/ERVISS/2024-01-05-hospital_admissions.csv"),
        )];
        let body = PayloadBody::for_channel(Channel::Target, &entries).unwrap();
        let value = serde_json::to_value(Payload::new("covid", body)).unwrap();
        assert_eq!(value["targets"][0]["target"], "hospital admissions");
        assert_eq!(value["disease"], "covid");
    }

    #[test]
    fn flat_payload_lists_changes() {
        let entries = vec![(OwnerKey::Flat, d("model-metadata/teamA-modelB.yml"))];
        let body = PayloadBody::for_channel(Channel::Metadata, &entries).unwrap();
        let bytes = Payload::new("flu", body).to_bytes().unwrap();
        assert_eq!(
            bytes,
            br#"{"disease":"flu","changes":["model-metadata/teamA-modelB.yml"]}"#
        );
    }

    #[test]
    fn owner_of_wrong_kind_is_rejected() {
        let entries = vec![(OwnerKey::Flat, d("x"))];
        let err = PayloadBody::for_channel(Channel::Forecast, &entries).unwrap_err();
        assert!(matches!(err, DeliveryError::ChannelMismatch { .. }), "got: {err}");
    }

    #[test]
    fn payload_parses_back_from_wire() {
        let parsed: Payload =
            serde_json::from_str(r#"{"disease":"flu","changes":["a.csv"]}"#).unwrap();
        assert_eq!(parsed.body, PayloadBody::Changes(vec![d("a.csv")]));
    }
}
