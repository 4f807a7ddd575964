//! Form decoding for HTTP calls.

use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use serde_json::Value;
use url::form_urlencoded;

use courier_core::ApiData;

const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Collects the call arguments carried by a request.
///
/// Body fields are read only for `application/x-www-form-urlencoded`
/// requests and take precedence over query fields. A key given more than
/// once keeps its first value. Every value is a string; the method's
/// argument specification coerces it.
pub(crate) fn form_values(headers: &HeaderMap, body: &[u8], query: Option<&str>) -> ApiData {
    let body_fields = is_form(headers)
        .then_some(body)
        .into_iter()
        .flat_map(form_urlencoded::parse);
    let query_fields = query
        .into_iter()
        .flat_map(|query| form_urlencoded::parse(query.as_bytes()));

    let mut values = ApiData::new();
    for (key, value) in body_fields.chain(query_fields) {
        values
            .entry(key.into_owned())
            .or_insert_with(|| Value::String(value.into_owned()));
    }
    values
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(FORM_MEDIA_TYPE))
}
