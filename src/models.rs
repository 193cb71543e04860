use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::text;

/// Club chapter label, stored upper-cased and without diacritics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Community(String);

impl Community {
    pub fn new(raw: &str) -> Self {
        Self(text::fold_diacritics(raw.trim()).to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Community {
    fn from(value: String) -> Self {
        Community::new(&value)
    }
}

impl From<Community> for String {
    fn from(value: Community) -> Self {
        value.0
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Attended,
    Absent,
    Pending,
}

/// One attendee row of one platform export, after normalization.
#[derive(Debug, Clone)]
pub struct RawAttendanceRecord {
    pub attendee: String,
    pub paid: bool,
    pub status: AttendanceStatus,
    /// Resolved attendance; for `Pending` this is the imputed value.
    pub attended: bool,
    pub price: f64,
    pub source_file: String,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub community: Community,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "pago")]
    Paid,
    #[serde(rename = "gratuito")]
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    #[serde(rename = "invierno")]
    Winter,
    #[serde(rename = "primavera")]
    Spring,
    #[serde(rename = "verano")]
    Summer,
    #[serde(rename = "otoño")]
    Autumn,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Paid => "pago",
            EventType::Free => "gratuito",
        }
    }
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "invierno",
            Season::Spring => "primavera",
            Season::Summer => "verano",
            Season::Autumn => "otoño",
        }
    }

    pub fn from_month(month: u32) -> Self {
        match (month % 12) / 3 {
            0 => Season::Winter,
            1 => Season::Spring,
            2 => Season::Summer,
            _ => Season::Autumn,
        }
    }
}

pub const DEFAULT_ACTIVITY: &str = "otro";

/// Canonical per-event row. Field order is the column order of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "NOMBRE_EVENTO")]
    pub name: String,
    #[serde(rename = "FECHA_EVENTO")]
    pub date: NaiveDate,
    #[serde(rename = "COMUNIDAD")]
    pub community: Community,
    #[serde(rename = "NUM_INSCRITAS")]
    pub registered: u32,
    #[serde(rename = "NUM_PAGOS")]
    pub paid: u32,
    #[serde(rename = "NUM_ASISTENCIAS")]
    pub attended: u32,
    #[serde(rename = "NUM_PENDIENTES", default)]
    pub pending: u32,
    #[serde(rename = "TOTAL_RECAUDADO", serialize_with = "money::serialize")]
    pub revenue: f64,
    #[serde(rename = "PRECIO_MEDIO", serialize_with = "money::serialize")]
    pub average_price: f64,
    #[serde(rename = "TIPO_EVENTO")]
    pub event_type: EventType,
    #[serde(rename = "DIA_MES")]
    pub day_of_month: u32,
    #[serde(rename = "DIA_SEMANA")]
    pub weekday: String,
    #[serde(rename = "DIA_SEMANA_NUM")]
    pub weekday_num: u32,
    #[serde(rename = "SEMANA_MES_AÑO")]
    pub iso_week: u32,
    #[serde(rename = "SEMANA_DENTRO_DEL_MES")]
    pub week_of_month: u32,
    #[serde(rename = "MES")]
    pub month: u32,
    #[serde(rename = "AÑO")]
    pub year: i32,
    #[serde(rename = "TEMPORADA")]
    pub season: Season,
    #[serde(rename = "COSTE_UNITARIO", serialize_with = "money::serialize")]
    pub unit_cost: f64,
    #[serde(
        rename = "COSTE_UNITARIO_VALIDADO",
        serialize_with = "flag::serialize",
        deserialize_with = "flag::deserialize"
    )]
    pub cost_validated: bool,
    #[serde(
        rename = "COLABORACION",
        serialize_with = "flag::serialize",
        deserialize_with = "flag::deserialize"
    )]
    pub collaboration: bool,
    #[serde(rename = "TIPO_ACTIVIDAD")]
    pub activity: String,
    #[serde(rename = "COSTE_ESTIMADO", serialize_with = "money::serialize")]
    pub estimated_cost: f64,
    #[serde(rename = "BENEFICIO_ESTIMADO", serialize_with = "money::serialize")]
    pub estimated_profit: f64,
}

impl EventRecord {
    pub fn key(&self) -> String {
        crate::filename::event_key(&self.name, self.date)
    }

    /// Recomputes the cost-derived columns from the current unit cost.
    /// The unit cost is held in cents, as written to the dataset.
    pub fn refresh_estimates(&mut self) {
        self.unit_cost = money::round_cents(self.unit_cost);
        self.estimated_cost = self.unit_cost * self.registered as f64;
        self.estimated_profit = self.revenue - self.estimated_cost;
    }

    pub fn is_paid(&self) -> bool {
        self.event_type == EventType::Paid
    }

    pub fn is_categorized(&self) -> bool {
        let activity = self.activity.trim();
        !activity.is_empty() && activity != DEFAULT_ACTIVITY
    }
}

/// Operator-entered attributes for one event, keyed by name and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualAnnotation {
    #[serde(rename = "NOMBRE_EVENTO")]
    pub name: String,
    #[serde(rename = "FECHA_EVENTO")]
    pub date: NaiveDate,
    #[serde(rename = "COSTE_UNITARIO", default)]
    pub unit_cost: Option<f64>,
    #[serde(
        rename = "COSTE_UNITARIO_VALIDADO",
        default,
        serialize_with = "flag::serialize",
        deserialize_with = "flag::deserialize"
    )]
    pub validated: bool,
    /// Blank leaves the stored value untouched.
    #[serde(
        rename = "COLABORACION",
        default,
        serialize_with = "flag::serialize_opt",
        deserialize_with = "flag::deserialize_opt"
    )]
    pub collaboration: Option<bool>,
    #[serde(rename = "TIPO_ACTIVIDAD", default)]
    pub activity: Option<String>,
}

impl ManualAnnotation {
    pub fn key(&self) -> String {
        crate::filename::event_key(&self.name, self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    #[serde(rename = "EVENTO")]
    pub event: String,
    #[serde(rename = "TIPO_ACTIVIDAD")]
    pub activity: String,
}

mod money {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        // adding 0.0 turns -0.0 into 0.0
        serializer.serialize_str(&format!("{:.2}", value + 0.0))
    }

    pub fn round_cents(value: f64) -> f64 {
        (value * 100.0).round() / 100.0
    }
}

mod flag {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn serialize_opt<S: Serializer>(
        value: &Option<bool>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(parse(&raw)?.unwrap_or(false))
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<bool>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw),
            None => Ok(None),
        }
    }

    fn parse<E: de::Error>(raw: &str) -> Result<Option<bool>, E> {
        match raw.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "0" | "0.0" | "false" | "no" => Ok(Some(false)),
            "1" | "1.0" | "true" | "si" | "yes" => Ok(Some(true)),
            other => Err(E::custom(format!("not a boolean flag: {other}"))),
        }
    }
}
