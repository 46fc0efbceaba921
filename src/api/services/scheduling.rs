//! Scheduling adapter: availability and appointment booking

use super::extract;
use crate::api::dispatcher::Dispatcher;
use crate::api::error::GatewayResult;
use crate::api::models::Service;
use crate::api::request::RequestDescriptor;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

const SERVICE: Service = Service::Scheduling;
const DATE_FORMAT: &str = "%d-%b-%Y";
const DATE_TIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

impl Customer {
    fn to_json(&self) -> Value {
        let mut details = Map::new();
        details.insert("name".to_string(), Value::from(self.name.as_str()));
        details.insert("email".to_string(), Value::from(self.email.as_str()));
        if let Some(phone) = &self.phone_number {
            details.insert("phone_number".to_string(), Value::from(phone.as_str()));
        }
        Value::Object(details)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentRequest {
    pub service_id: String,
    pub staff_id: Option<String>,
    pub from_time: NaiveDateTime,
    /// IANA zone name; the workspace zone applies when absent
    pub timezone: Option<String>,
    pub customer: Customer,
    pub notes: Option<String>,
    pub additional_fields: Option<Value>,
}

impl AppointmentRequest {
    /// Form fields; structured values travel as JSON strings
    fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("service_id".to_string(), self.service_id.clone()),
            ("from_time".to_string(), self.from_time.format(DATE_TIME_FORMAT).to_string()),
            ("customer_details".to_string(), self.customer.to_json().to_string()),
        ];
        if let Some(staff_id) = &self.staff_id {
            form.push(("staff_id".to_string(), staff_id.clone()));
        }
        if let Some(timezone) = &self.timezone {
            form.push(("time_zone".to_string(), timezone.clone()));
        }
        if let Some(notes) = &self.notes {
            form.push(("notes".to_string(), notes.clone()));
        }
        if let Some(fields) = &self.additional_fields {
            form.push(("additional_fields".to_string(), fields.to_string()));
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookingConfirmation {
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulingAdapter<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> SchedulingAdapter<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Free start times (`HH:MM`) for a service and staff member on a date
    pub async fn available_slots(&self, service_id: &str, staff_id: &str, date: NaiveDate) -> GatewayResult<Vec<String>> {
        let descriptor = RequestDescriptor::get(SERVICE, "availableslots")
            .query("service_id", service_id)
            .query("staff_id", staff_id)
            .query("selected_date", date.format(DATE_FORMAT).to_string());

        let response = self.dispatcher.dispatch(descriptor).await?;
        let data: Value = extract(self.dispatcher, SERVICE, &response, "/response/returnvalue/data")?;

        // A day without slots carries a message string instead of a list
        Ok(match data {
            Value::Array(slots) => slots
                .into_iter()
                .filter_map(|slot| slot.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        })
    }

    pub async fn book_appointment(&self, appointment: &AppointmentRequest) -> GatewayResult<BookingConfirmation> {
        let response = self
            .dispatcher
            .dispatch(RequestDescriptor::post(SERVICE, "appointment").form(appointment.to_form()))
            .await?;
        extract(self.dispatcher, SERVICE, &response, "/response/returnvalue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment() -> AppointmentRequest {
        AppointmentRequest {
            service_id: "svc-1".to_string(),
            staff_id: Some("staff-9".to_string()),
            from_time: NaiveDate::from_ymd_opt(2026, 3, 5)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            timezone: None,
            customer: Customer {
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                phone_number: None,
            },
            notes: Some("first visit".to_string()),
            additional_fields: None,
        }
    }

    #[test]
    fn test_appointment_form() {
        let form = appointment().to_form();
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("from_time"), Some("05-Mar-2026 14:30:00"));
        assert_eq!(get("staff_id"), Some("staff-9"));
        let customer: Value = serde_json::from_str(get("customer_details").unwrap()).unwrap();
        assert_eq!(
            customer,
            serde_json::json!({"name": "Ada Lovelace", "email": "ada@example.com"})
        );
        assert_eq!(get("time_zone"), None);
    }

    #[test]
    fn test_date_format() {
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        assert_eq!(date.format(DATE_FORMAT).to_string(), "02-Nov-2026");
    }
}
