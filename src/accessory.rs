use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ON_CHARACTERISTIC: &str = "On";
pub const OUTLET_HUMAN_TYPE: &str = "outlet";
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

// ---------------------------------------------------------------------------
// Wire records: GET /api/accessories
//
// One entry per HAP service. Only the fields this crate reads are typed;
// everything else the bridge sends (serviceCharacteristics, instance, type,
// ...) is kept in `extra` untouched.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryRecord {
    /// Service category, e.g. `"Outlet"`, `"Lightbulb"`, `"Switch"`.
    pub human_type: Option<String>,

    /// Stable bridge-assigned id; used in `PUT /api/accessories/{uniqueId}`.
    pub unique_id: Option<String>,

    /// HAP accessory id.
    pub aid: Option<i64>,

    /// HAP instance id of the service.
    pub iid: Option<i64>,

    /// Display name configured on the bridge.
    pub service_name: Option<String>,

    pub accessory_information: Option<AccessoryInformation>,

    /// Current characteristic values keyed by characteristic name.
    #[serde(default)]
    pub values: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessoryRecord {
    pub fn is_outlet(&self) -> bool {
        self.human_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(OUTLET_HUMAN_TYPE))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessoryInformation {
    #[serde(rename = "Manufacturer")]
    pub manufacturer: Option<String>,

    #[serde(rename = "Model")]
    pub model: Option<String>,

    /// Homebridge spells this `"Serial Number"`. Older plugins send
    /// `"SerialNumber"`, which stays in `extra`; see [`Self::serial`].
    #[serde(rename = "Serial Number")]
    pub serial_number: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessoryInformation {
    /// Serial number under either spelling, `"Serial Number"` first.
    pub fn serial(&self) -> Option<&str> {
        self.serial_number
            .as_deref()
            .or_else(|| self.extra.get("SerialNumber").and_then(Value::as_str))
    }
}

// ---------------------------------------------------------------------------
// Accessory: typed read-only view over one record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Accessory {
    pub unique_id: Option<String>,
    pub aid: Option<i64>,
    pub iid: Option<i64>,
    /// Falls back to `"Unknown Device"` when the record has no service name.
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub values: Map<String, Value>,
    /// Truthiness of `values.On`; false when absent.
    pub is_on: bool,
}

impl Accessory {
    /// Payload that flips the power state captured in this snapshot.
    ///
    /// The snapshot is never updated by a toggle, so repeated calls return
    /// the same request until the accessory list is refreshed.
    pub fn toggle_payload(&self) -> TogglePayload {
        TogglePayload::power(!self.is_on)
    }

    pub fn value(&self, characteristic: &str) -> Option<&Value> {
        self.values.get(characteristic)
    }
}

impl From<&AccessoryRecord> for Accessory {
    fn from(record: &AccessoryRecord) -> Self {
        let info = record.accessory_information.clone().unwrap_or_default();
        let serial_number = info.serial().map(str::to_owned);
        let is_on = record
            .values
            .get(ON_CHARACTERISTIC)
            .is_some_and(is_truthy);

        Self {
            unique_id: record.unique_id.clone(),
            aid: record.aid,
            iid: record.iid,
            name: record
                .service_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_owned()),
            manufacturer: info.manufacturer,
            model: info.model,
            serial_number,
            values: record.values.clone(),
            is_on,
        }
    }
}

impl From<AccessoryRecord> for Accessory {
    fn from(record: AccessoryRecord) -> Self {
        Self::from(&record)
    }
}

/// JSON truthiness as the bridge's plugins report characteristic values:
/// `null`, `false`, `0`, `""`, `[]` and `{}` are off; everything else is on.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Characteristic write: PUT /api/accessories/{uniqueId}
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePayload {
    /// Always `"On"` for outlets.
    pub characteristic_type: String,
    pub value: bool,
}

impl TogglePayload {
    /// Request an explicit power state.
    pub fn power(on: bool) -> Self {
        Self {
            characteristic_type: ON_CHARACTERISTIC.to_owned(),
            value: on,
        }
    }
}

// ---------------------------------------------------------------------------
// Login: POST /api/auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    /// The bridge requires the field even when 2FA is off.
    pub otp: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: Option<String>,
    /// Validity period in seconds.
    pub expires_in: Option<i64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn outlet_record() -> AccessoryRecord {
        serde_json::from_value(json!({
            "aid": 7,
            "iid": 10,
            "uuid": "00000047-0000-1000-8000-0026BB765291",
            "type": "Outlet",
            "humanType": "Outlet",
            "serviceName": "Office Plug",
            "serviceCharacteristics": [],
            "accessoryInformation": {
                "Manufacturer": "Meross",
                "Model": "MSS110",
                "Serial Number": "ABC123",
                "Firmware Revision": "1.2.0"
            },
            "values": { "On": true, "OutletInUse": true },
            "instance": { "name": "Homebridge", "port": 51826 },
            "uniqueId": "6f5e4d3c2b1a"
        }))
        .unwrap()
    }

    #[test]
    fn record_keeps_unknown_fields() {
        let r = outlet_record();
        assert_eq!(r.extra["uuid"], "00000047-0000-1000-8000-0026BB765291");
        assert!(r.extra.contains_key("serviceCharacteristics"));
        let info = r.accessory_information.as_ref().unwrap();
        assert_eq!(info.serial_number.as_deref(), Some("ABC123"));
        assert_eq!(info.extra["Firmware Revision"], "1.2.0");
    }

    #[test]
    fn serial_number_accepts_either_spelling() {
        let both: AccessoryInformation = serde_json::from_value(json!({
            "Serial Number": "NEW",
            "SerialNumber": "OLD"
        }))
        .unwrap();
        assert_eq!(both.serial(), Some("NEW"));

        let legacy: AccessoryInformation =
            serde_json::from_value(json!({ "SerialNumber": "OLD" })).unwrap();
        assert_eq!(legacy.serial_number, None);
        assert_eq!(legacy.serial(), Some("OLD"));

        let mut r = outlet_record();
        r.accessory_information = Some(legacy);
        assert_eq!(Accessory::from(&r).serial_number.as_deref(), Some("OLD"));
    }

    #[test]
    fn outlet_match_ignores_case() {
        let mut r = outlet_record();
        assert!(r.is_outlet());
        r.human_type = Some("OUTLET".into());
        assert!(r.is_outlet());
        r.human_type = Some("Lightbulb".into());
        assert!(!r.is_outlet());
        r.human_type = None;
        assert!(!r.is_outlet());
    }

    #[test]
    fn accessory_from_full_record() {
        let a = Accessory::from(&outlet_record());
        assert_eq!(a.unique_id.as_deref(), Some("6f5e4d3c2b1a"));
        assert_eq!(a.aid, Some(7));
        assert_eq!(a.iid, Some(10));
        assert_eq!(a.name, "Office Plug");
        assert_eq!(a.manufacturer.as_deref(), Some("Meross"));
        assert_eq!(a.model.as_deref(), Some("MSS110"));
        assert_eq!(a.value("OutletInUse"), Some(&json!(true)));
        assert!(a.is_on);
    }

    #[test]
    fn accessory_from_sparse_record_uses_defaults() {
        let r: AccessoryRecord = serde_json::from_value(json!({ "humanType": "Outlet" })).unwrap();
        let a = Accessory::from(r);
        assert_eq!(a.name, UNKNOWN_DEVICE_NAME);
        assert_eq!(a.unique_id, None);
        assert_eq!(a.manufacturer, None);
        assert!(a.values.is_empty());
        assert!(!a.is_on);
    }

    #[test]
    fn on_true_requests_off() {
        let a = Accessory::from(&outlet_record());
        let payload = serde_json::to_value(a.toggle_payload()).unwrap();
        assert_eq!(payload, json!({ "characteristicType": "On", "value": false }));
    }

    #[test]
    fn on_absent_requests_on() {
        let mut r = outlet_record();
        r.values.remove(ON_CHARACTERISTIC);
        let a = Accessory::from(&r);
        assert!(!a.is_on);
        assert_eq!(
            serde_json::to_value(a.toggle_payload()).unwrap(),
            json!({ "characteristicType": "On", "value": true })
        );
    }

    #[test]
    fn numeric_and_null_on_values() {
        let mut r = outlet_record();
        for (raw, expected) in [
            (json!(1), true),
            (json!(0), false),
            (json!(null), false),
            (json!("1"), true),
            (json!(""), false),
        ] {
            r.values.insert(ON_CHARACTERISTIC.into(), raw.clone());
            assert_eq!(Accessory::from(&r).is_on, expected, "On = {raw}");
        }
    }

    #[test]
    fn toggle_payload_is_fixed_until_rebuilt() {
        let mut r = outlet_record();
        r.values.insert(ON_CHARACTERISTIC.into(), json!(false));
        let a = Accessory::from(&r);

        // Same snapshot, same request.
        assert_eq!(a.toggle_payload(), TogglePayload::power(true));
        assert_eq!(a.toggle_payload(), TogglePayload::power(true));

        // Apply the toggle to the record and rebuild: the request flips.
        let applied = a.toggle_payload();
        r.values.insert(ON_CHARACTERISTIC.into(), json!(applied.value));
        assert_eq!(Accessory::from(&r).toggle_payload(), TogglePayload::power(false));
    }

    #[test]
    fn login_response_tolerates_missing_fields() {
        let resp: LoginResponse = serde_json::from_str(r#"{"token_type":"Bearer"}"#).unwrap();
        assert!(resp.access_token.is_none());
        assert!(resp.expires_in.is_none());

        let resp: LoginResponse =
            serde_json::from_str(r#"{"access_token":"T","token_type":"Bearer","expires_in":28800}"#)
                .unwrap();
        assert_eq!(resp.access_token.as_deref(), Some("T"));
        assert_eq!(resp.expires_in, Some(28800));
    }
}
