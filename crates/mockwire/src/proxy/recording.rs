//! Mapping synthesis from proxied exchanges.

use super::forwarding::UpstreamResponse;
use super::headers::is_excluded_outbound;
use crate::config::ProxyAndRecordSettings;
use crate::error::ConfigError;
use crate::mapping::{HeaderValues, MappingModel, NamedCondition, ResponseModel};
use crate::matchers::MatcherDefinition;
use crate::request::{RequestBuilder, RequestMessage};
use base64::Engine;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusRule {
    Any,
    Exact(u16),
    /// `2xx` stored as 2
    Class(u16),
    Range(u16, u16),
}

/// Filter on upstream status codes deciding which exchanges get recorded.
///
/// Grammar: `*`, `200`, `2xx`, `200-299`, or a comma-separated list of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodePattern {
    rules: Vec<StatusRule>,
}

impl StatusCodePattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = || {
            ConfigError::InvalidSettings(format!("invalid status code pattern '{pattern}'"))
        };
        let rules = pattern
            .split(',')
            .map(str::trim)
            .map(|part| {
                let lower = part.to_ascii_lowercase();
                if lower == "*" {
                    Ok(StatusRule::Any)
                } else if let Some(class) = lower.strip_suffix("xx") {
                    match class.parse::<u16>() {
                        Ok(c) if (1..=5).contains(&c) && class.len() == 1 => {
                            Ok(StatusRule::Class(c))
                        }
                        _ => Err(invalid()),
                    }
                } else if let Some((from, to)) = lower.split_once('-') {
                    let from = from.trim().parse::<u16>().map_err(|_| invalid())?;
                    let to = to.trim().parse::<u16>().map_err(|_| invalid())?;
                    if from > to {
                        return Err(invalid());
                    }
                    Ok(StatusRule::Range(from, to))
                } else {
                    lower.parse::<u16>().map(StatusRule::Exact).map_err(|_| invalid())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn matches(&self, status: u16) -> bool {
        self.rules.iter().any(|rule| match *rule {
            StatusRule::Any => true,
            StatusRule::Exact(code) => status == code,
            StatusRule::Class(class) => status / 100 == class,
            StatusRule::Range(from, to) => (from..=to).contains(&status),
        })
    }
}

/// Build a mapping that replays `upstream` for requests identical to `request`.
pub fn synthesize_mapping(
    request: &RequestMessage,
    upstream: &UpstreamResponse,
    settings: &ProxyAndRecordSettings,
) -> MappingModel {
    let mut predicate = RequestBuilder::new()
        .with_path_matcher(MatcherDefinition::exact(request.path.clone()))
        .using_method(&request.method);
    for (name, values) in &request.query {
        for value in values {
            predicate = predicate.with_param(name, value.clone());
        }
    }
    if let Some(text) = request.body_text().filter(|t| !t.is_empty()) {
        predicate = predicate.with_body_matcher(MatcherDefinition::exact(text));
    }
    let mut predicate = predicate.build();

    let excluded = |name: &str, list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(name));
    for (name, values) in &request.headers {
        if is_excluded_outbound(name)
            || name == "cookie"
            || excluded(name, &settings.excluded_headers)
        {
            continue;
        }
        predicate.headers.push(NamedCondition::new(
            name.clone(),
            values.iter().map(|v| MatcherDefinition::exact(v.clone())).collect(),
        ));
    }
    for (name, value) in &request.cookies {
        if excluded(name, &settings.excluded_cookies) {
            continue;
        }
        predicate.cookies.push(NamedCondition::new(
            name.clone(),
            vec![MatcherDefinition::exact(value.clone())],
        ));
    }

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &upstream.headers {
        headers.entry(name.clone()).or_default().push(value.clone());
    }
    let mut response = ResponseModel {
        status_code: Some(upstream.status),
        headers: headers
            .into_iter()
            .map(|(name, values)| (name, HeaderValues::from(values)))
            .collect(),
        ..Default::default()
    };
    if !upstream.body.is_empty() {
        match std::str::from_utf8(&upstream.body) {
            Ok(text) => response.body = Some(text.to_string()),
            Err(_) => {
                response.body_as_bytes =
                    Some(base64::engine::general_purpose::STANDARD.encode(&upstream.body))
            }
        }
    }

    MappingModel {
        guid: Some(Uuid::new_v4()),
        title: Some(format!("Proxy Mapping for {} {}", request.method, request.path)),
        request: predicate,
        response,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::RequestMatcher;
    use bytes::Bytes;
    use std::time::Duration;

    #[test]
    fn test_status_code_pattern() {
        let any = StatusCodePattern::parse("*").unwrap();
        assert!(any.matches(200) && any.matches(503));

        let success = StatusCodePattern::parse("2xx").unwrap();
        assert!(success.matches(204));
        assert!(!success.matches(404));

        let list = StatusCodePattern::parse("200-299, 404").unwrap();
        assert!(list.matches(250));
        assert!(list.matches(404));
        assert!(!list.matches(500));

        assert!(StatusCodePattern::parse("2xz").is_err());
        assert!(StatusCodePattern::parse("299-200").is_err());
        assert!(StatusCodePattern::parse("22xx").is_err());
    }

    fn upstream(body: &'static [u8]) -> UpstreamResponse {
        UpstreamResponse {
            status: 201,
            headers: vec![
                ("content-type".to_string(), "text/plain".to_string()),
                ("set-cookie".to_string(), "a=1".to_string()),
                ("set-cookie".to_string(), "b=2".to_string()),
            ],
            body: Bytes::from_static(body),
            latency: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_synthesized_mapping_replays_identical_request() {
        let request = RequestMessage::new("POST", "http://localhost:1/orders?id=7")
            .with_header("Host", "localhost:1")
            .with_header("X-Trace", "t1")
            .with_header("X-Skip", "s")
            .with_header("Cookie", "session=abc; theme=dark")
            .with_body("payload");
        let mut settings = ProxyAndRecordSettings::new("http://upstream");
        settings.excluded_headers = vec!["x-skip".to_string()];
        settings.excluded_cookies = vec!["theme".to_string()];

        let mapping = synthesize_mapping(&request, &upstream(b"created"), &settings);
        assert!(mapping.guid.is_some());
        assert_eq!(mapping.request.methods, vec!["POST"]);
        assert!(mapping.request.headers.iter().all(|h| h.name != "x-skip" && h.name != "host"));
        assert_eq!(mapping.request.cookies.len(), 1);
        assert_eq!(mapping.response.status_code, Some(201));
        assert_eq!(mapping.response.body.as_deref(), Some("created"));
        assert_eq!(
            mapping.response.headers["set-cookie"].values(),
            vec!["a=1", "b=2"]
        );

        let matcher = RequestMatcher::compile(&mapping.request).unwrap();
        assert!(matcher.evaluate(&request).perfect);
        let other = RequestMessage::new("POST", "/orders?id=8")
            .with_header("X-Trace", "t1")
            .with_header("Cookie", "session=abc")
            .with_body("payload");
        assert!(!matcher.evaluate(&other).perfect);
    }

    #[test]
    fn test_binary_body_recorded_as_bytes() {
        let request = RequestMessage::new("GET", "/bin");
        let mapping = synthesize_mapping(
            &request,
            &upstream(&[0xff, 0x00]),
            &ProxyAndRecordSettings::new("http://upstream"),
        );
        assert_eq!(mapping.response.body, None);
        assert_eq!(mapping.response.body_as_bytes.as_deref(), Some("/wA="));
        assert!(mapping.validate().is_ok());
    }
}
