// RDAP (RFC 9083) domain responses, the JSON successor to port-43 WHOIS

use crate::error::{Result, ScanError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_RDAP_BASE: &str = "https://rdap.org";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapDomain {
    #[serde(default)]
    pub ldh_name: Option<String>,
    #[serde(default)]
    pub events: Vec<RdapEvent>,
    #[serde(default)]
    pub entities: Vec<RdapEntity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEvent {
    pub event_action: String,
    #[serde(default)]
    pub event_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEntity {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub vcard_array: Option<Value>,
    #[serde(default)]
    pub entities: Vec<RdapEntity>,
}

/// The registration fields the dataset keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationData {
    pub registrar: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
}

/// `{base}/domain/{domain}`
pub fn domain_url(base: &str, domain: &str) -> String {
    format!("{}/domain/{}", base.trim_end_matches('/'), domain)
}

pub fn parse_domain(body: &str) -> Result<RdapDomain> {
    let domain: RdapDomain = serde_json::from_str(body)?;
    Ok(domain)
}

impl RdapDomain {
    /// Dates come from the first event of each kind. A first event with a
    /// missing or unparseable date yields `None`; later events are not consulted.
    pub fn registration_data(&self) -> RegistrationData {
        RegistrationData {
            registrar: self.registrar(),
            creation_date: self.first_event_date("registration"),
            expiration_date: self.first_event_date("expiration"),
        }
    }

    fn first_event_date(&self, action: &str) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .find(|event| event.event_action.eq_ignore_ascii_case(action))
            .and_then(|event| event.event_date.as_deref())
            .and_then(parse_event_date)
    }

    fn registrar(&self) -> Option<String> {
        find_registrar(&self.entities)
    }
}

fn find_registrar(entities: &[RdapEntity]) -> Option<String> {
    for entity in entities {
        if entity
            .roles
            .iter()
            .any(|role| role.eq_ignore_ascii_case("registrar"))
            && let Some(name) = entity.vcard_array.as_ref().and_then(vcard_full_name)
        {
            return Some(name);
        }
        if let Some(name) = find_registrar(&entity.entities) {
            return Some(name);
        }
    }
    None
}

/// `["vcard", [["version", {}, "text", "4.0"], ["fn", {}, "text", "Name"]]]`
fn vcard_full_name(vcard: &Value) -> Option<String> {
    vcard
        .get(1)?
        .as_array()?
        .iter()
        .find(|property| property.get(0).and_then(Value::as_str) == Some("fn"))
        .and_then(|property| property.get(3))
        .and_then(Value::as_str)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(date.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

/// Decodes a full RDAP response body straight into [`RegistrationData`].
pub fn registration_data_from_body(body: &str) -> Result<RegistrationData> {
    let domain = parse_domain(body)?;
    if domain.ldh_name.is_none() && domain.events.is_empty() && domain.entities.is_empty() {
        return Err(ScanError::ParseError(
            "RDAP response carries no domain data".to_string(),
        ));
    }
    Ok(domain.registration_data())
}
