use serde::{Deserialize, Serialize};

/// Clients send the code either as a JSON number or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OtpValue {
    Number(i64),
    Text(String),
}

impl OtpValue {
    pub fn as_code(&self) -> Option<i32> {
        match self {
            OtpValue::Number(n) => i32::try_from(*n).ok(),
            OtpValue::Text(s) => s.trim().parse::<i32>().ok(),
        }
    }
}

/// Request body for `/check-otp`.
#[derive(Debug, Deserialize)]
pub struct CheckOtpRequest {
    #[serde(default)]
    pub email: String,
    pub otp: Option<OtpValue>,
}

/// Request body for `/send-otp`.
#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub message: String,
    pub otp: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_accepts_number_or_string() {
        let req: CheckOtpRequest =
            serde_json::from_str(r#"{"email":"a@x.com","otp":123456}"#).unwrap();
        assert_eq!(req.otp.unwrap().as_code(), Some(123_456));

        let req: CheckOtpRequest =
            serde_json::from_str(r#"{"email":"a@x.com","otp":" 654321 "}"#).unwrap();
        assert_eq!(req.otp.unwrap().as_code(), Some(654_321));
    }

    #[test]
    fn otp_garbage_has_no_code() {
        assert_eq!(OtpValue::Text("12ab56".into()).as_code(), None);
        assert_eq!(OtpValue::Number(i64::MAX).as_code(), None);
    }

    #[test]
    fn missing_fields_default() {
        let req: CheckOtpRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_empty());
        assert!(req.otp.is_none());
    }
}
