//! Registration Record - the data a registrant fills in

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationRecord {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub unit: String,
    pub locality: String,
    pub area: String,
    pub city: String,
    pub state: String,
}

/// Partial update; `None` leaves the current value in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub unit: Option<String>,
    pub locality: Option<String>,
    pub area: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl RegistrationRecord {
    pub fn merge(&mut self, patch: RecordPatch) {
        let RecordPatch { name, phone, email, gender, unit, locality, area, city, state } = patch;
        let slots = [
            (&mut self.name, name),
            (&mut self.phone, phone),
            (&mut self.email, email),
            (&mut self.gender, gender),
            (&mut self.unit, unit),
            (&mut self.locality, locality),
            (&mut self.area, area),
            (&mut self.city, city),
            (&mut self.state, state),
        ];
        for (slot, value) in slots {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }

    /// Field name/value pairs in form order.
    pub fn fields(&self) -> [(&'static str, &str); 9] {
        [
            ("name", self.name.as_str()),
            ("phone", self.phone.as_str()),
            ("email", self.email.as_str()),
            ("gender", self.gender.as_str()),
            ("unit", self.unit.as_str()),
            ("locality", self.locality.as_str()),
            ("area", self.area.as_str()),
            ("city", self.city.as_str()),
            ("state", self.state.as_str()),
        ]
    }
}

impl From<RegistrationRecord> for RecordPatch {
    fn from(r: RegistrationRecord) -> Self {
        Self {
            name: Some(r.name),
            phone: Some(r.phone),
            email: Some(r.email),
            gender: Some(r.gender),
            unit: Some(r.unit),
            locality: Some(r.locality),
            area: Some(r.area),
            city: Some(r.city),
            state: Some(r.state),
        }
    }
}

/// What the remote store receives: the record plus badge metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    #[serde(flatten)]
    pub record: RegistrationRecord,
    pub badge_template: String,
    pub photo_uploaded: bool,
}

impl SubmissionPayload {
    pub fn new(record: RegistrationRecord, badge_template: impl Into<String>, photo_uploaded: bool) -> Self {
        Self {
            record,
            badge_template: badge_template.into(),
            photo_uploaded,
        }
    }
}
