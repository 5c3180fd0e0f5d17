use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::contacts::repo::Contact;

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub mobile: String,
    pub email: String,
    pub address: String,
    pub registration_number: String,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub mobile: String,
    pub email: String,
    pub address: String,
    pub registration_number: String,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            mobile: contact.mobile,
            email: contact.email,
            address: contact.address,
            registration_number: contact.registration_number,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub registration_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivityItem {
    pub details: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_contacts: i64,
    pub recent_added: i64,
    pub recent_activities: Vec<ActivityItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_response_serialization() {
        let response = ContactResponse {
            mobile: "555".into(),
            email: "ann@x.com".into(),
            address: "1 Rd".into(),
            registration_number: "R1".into(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("R1"));
        assert!(json.contains("1 Rd"));
    }

    #[test]
    fn stats_response_serialization() {
        let stats = StatsResponse {
            total_contacts: 12,
            recent_added: 3,
            recent_activities: vec![ActivityItem {
                details: "Added contact R1".into(),
                timestamp: OffsetDateTime::now_utc(),
            }],
        };

        let json: serde_json::Value = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_contacts"], 12);
        assert_eq!(json["recent_added"], 3);
        assert_eq!(json["recent_activities"][0]["details"], "Added contact R1");
    }
}
