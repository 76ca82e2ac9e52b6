/// Extraction of samples from the history service response envelope
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::models::RawSample;

// contextResponses[0].contextElement.attributes[0].values
const VALUES_POINTER: &str = "/contextResponses/0/contextElement/attributes/0/values";

/// Pull the values array out of a response body
///
/// Returns None when the body does not have the expected shape. Entries
/// without a usable `attrValue`/`recvTime` pair are skipped.
pub fn extract_values(body: &Value) -> Option<Vec<RawSample>> {
    let values = body.pointer(VALUES_POINTER)?.as_array()?;

    let samples = values
        .iter()
        .filter_map(|entry| match RawSample::deserialize(entry) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Skipping malformed history entry {}: {}", entry, e);
                None
            }
        })
        .collect();

    Some(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttrValue;
    use serde_json::json;

    #[test]
    fn values_are_read_from_first_attribute() {
        let body = json!({
            "contextResponses": [{
                "contextElement": {
                    "attributes": [{
                        "name": "temperature",
                        "values": [
                            {"_id": "1", "attrType": "Text", "attrValue": "23.5°C", "recvTime": "2024-01-01T12:00:00.000Z"},
                            {"_id": "2", "attrType": "Number", "attrValue": 24, "recvTime": "2024-01-01T12:00:10Z"}
                        ]
                    }],
                    "id": "urn:ngsi-ld:Lamp:EDGE4",
                    "isPattern": false,
                    "type": "Lamp"
                },
                "statusCode": {"code": "200", "reasonPhrase": "OK"}
            }]
        });

        let samples = extract_values(&body).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].attr_value, AttrValue::Text("23.5°C".into()));
        assert_eq!(samples[1].attr_value, AttrValue::Number(24.0));
        assert_eq!(samples[1].recv_time, "2024-01-01T12:00:10Z");
    }

    #[test]
    fn missing_path_yields_none() {
        assert!(extract_values(&json!({})).is_none());
        assert!(extract_values(&json!({"contextResponses": []})).is_none());
        assert!(extract_values(&json!({
            "contextResponses": [{"contextElement": {"attributes": []}}]
        }))
        .is_none());
        assert!(extract_values(&json!({
            "contextResponses": [{"contextElement": {"attributes": [{"values": "none"}]}}]
        }))
        .is_none());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let body = json!({
            "contextResponses": [{"contextElement": {"attributes": [{"values": [
                {"attrValue": "61%"},
                {"attrValue": null, "recvTime": "2024-01-01T12:00:00Z"},
                {"attrValue": "62%", "recvTime": "2024-01-01T12:00:10Z"}
            ]}]}}]
        });

        let samples = extract_values(&body).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].attr_value, AttrValue::Text("62%".into()));
    }

    #[test]
    fn empty_values_array_is_not_missing() {
        let body = json!({
            "contextResponses": [{"contextElement": {"attributes": [{"values": []}]}}]
        });
        assert_eq!(extract_values(&body), Some(vec![]));
    }
}
