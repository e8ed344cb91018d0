//! Wire format of the per-round results endpoint.
//!
//! The source answers with a flat JSON object:
//!
//! ```json
//! { "returnValue": "success", "drwNo": 1100, "drwNoDate": "2023-12-30",
//!   "drwtNo1": 17, ..., "drwtNo6": 45, "bnusNo": 7 }
//! ```
//!
//! Unknown rounds come back as `{"returnValue": "fail"}`. Some relays wrap
//! the body as a JSON string under an envelope field, which needs a second
//! decode.

use serde::Deserialize;

use crate::types::Draw;

const SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
pub struct RoundPayload {
    #[serde(rename = "returnValue", default)]
    pub return_value: Option<String>,
    #[serde(rename = "drwNoDate", default)]
    pub date: Option<String>,
    #[serde(rename = "drwtNo1", default)]
    pub no1: Option<i64>,
    #[serde(rename = "drwtNo2", default)]
    pub no2: Option<i64>,
    #[serde(rename = "drwtNo3", default)]
    pub no3: Option<i64>,
    #[serde(rename = "drwtNo4", default)]
    pub no4: Option<i64>,
    #[serde(rename = "drwtNo5", default)]
    pub no5: Option<i64>,
    #[serde(rename = "drwtNo6", default)]
    pub no6: Option<i64>,
    #[serde(rename = "bnusNo", default)]
    pub bonus: Option<i64>,
}

/// Why a decoded body did not yield a draw.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("body is not valid JSON: {0}")]
    Decode(String),

    #[error("envelope field `{0}` missing or not a string")]
    Envelope(String),

    #[error("source reported returnValue={0:?}")]
    NotSuccess(Option<String>),

    #[error("winning number field drwtNo{0} missing")]
    MissingNumber(usize),

    #[error("bonus field missing")]
    MissingBonus,

    #[error("invalid draw: {0}")]
    Invalid(String),
}

/// Decode a response body, unwrapping the envelope when there is one.
pub fn decode_body(body: &str, envelope: Option<&str>) -> Result<RoundPayload, PayloadError> {
    match envelope {
        None => serde_json::from_str(body).map_err(|e| PayloadError::Decode(e.to_string())),
        Some(field) => {
            let outer: serde_json::Value =
                serde_json::from_str(body).map_err(|e| PayloadError::Decode(e.to_string()))?;
            let inner = outer
                .get(field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| PayloadError::Envelope(field.to_string()))?;
            serde_json::from_str(inner).map_err(|e| PayloadError::Decode(e.to_string()))
        }
    }
}

fn ticket_number(value: i64) -> Result<u8, PayloadError> {
    u8::try_from(value).map_err(|_| PayloadError::Invalid(format!("number {value} outside 1..=45")))
}

impl RoundPayload {
    /// Validate and convert into a draw for `round`.
    ///
    /// The round comes from the request, not the body.
    pub fn into_draw(self, round: u32) -> Result<Draw, PayloadError> {
        if self.return_value.as_deref() != Some(SUCCESS) {
            return Err(PayloadError::NotSuccess(self.return_value));
        }

        let fields = [self.no1, self.no2, self.no3, self.no4, self.no5, self.no6];
        let mut numbers = [0u8; 6];
        for (i, field) in fields.into_iter().enumerate() {
            let value = field.ok_or(PayloadError::MissingNumber(i + 1))?;
            numbers[i] = ticket_number(value)?;
        }
        let bonus = ticket_number(self.bonus.ok_or(PayloadError::MissingBonus)?)?;

        Draw::new(round, self.date.unwrap_or_default(), numbers, bonus)
            .map_err(|e| PayloadError::Invalid(e.to_string()))
    }
}
