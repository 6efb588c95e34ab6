use crate::mapping::{BodyCondition, NamedCondition, RequestModel, ValueCondition};
use crate::matchers::MatcherDefinition;
use serde_json::Value;

/// Fluent builder for a mapping's request predicate.
///
/// Conditions on different attributes combine with AND. Calling a path, url or
/// body setter again replaces the previous condition; header, param and cookie
/// setters accumulate.
///
/// ```
/// use mockwire::request::RequestBuilder;
///
/// let request = RequestBuilder::new()
///     .with_path("/api/*")
///     .using_post()
///     .with_header("X-Token", "abc*")
///     .build();
/// assert_eq!(request.methods, vec!["POST".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    model: RequestModel,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the path with a wildcard pattern.
    pub fn with_path(self, pattern: impl Into<String>) -> Self {
        self.with_path_matcher(MatcherDefinition::wildcard(pattern))
    }

    pub fn with_path_matcher(mut self, matcher: MatcherDefinition) -> Self {
        self.model.path = Some(matcher.into());
        self
    }

    /// Match the absolute URL with a wildcard pattern.
    pub fn with_url(mut self, pattern: impl Into<String>) -> Self {
        self.model.url = Some(MatcherDefinition::wildcard(pattern).into());
        self
    }

    pub fn with_url_matcher(mut self, matcher: MatcherDefinition) -> Self {
        self.model.url = Some(matcher.into());
        self
    }

    pub fn using_method(mut self, method: &str) -> Self {
        let method = method.to_uppercase();
        if !self.model.methods.contains(&method) {
            self.model.methods.push(method);
        }
        self
    }

    pub fn using_get(self) -> Self {
        self.using_method("GET")
    }

    pub fn using_post(self) -> Self {
        self.using_method("POST")
    }

    pub fn using_put(self) -> Self {
        self.using_method("PUT")
    }

    pub fn using_delete(self) -> Self {
        self.using_method("DELETE")
    }

    pub fn using_patch(self) -> Self {
        self.using_method("PATCH")
    }

    pub fn using_head(self) -> Self {
        self.using_method("HEAD")
    }

    pub fn using_options(self) -> Self {
        self.using_method("OPTIONS")
    }

    /// Accept any method (clears earlier method conditions).
    pub fn using_any_method(mut self) -> Self {
        self.model.methods.clear();
        self
    }

    /// Query parameter equal to `value`.
    pub fn with_param(self, name: &str, value: impl Into<String>) -> Self {
        self.with_param_matcher(name, MatcherDefinition::exact(value))
    }

    pub fn with_param_matcher(mut self, name: &str, matcher: MatcherDefinition) -> Self {
        self.model
            .params
            .push(NamedCondition::new(name, vec![matcher]));
        self
    }

    /// Header matching a wildcard pattern.
    pub fn with_header(self, name: &str, pattern: impl Into<String>) -> Self {
        self.with_header_matcher(name, MatcherDefinition::wildcard(pattern))
    }

    pub fn with_header_matcher(mut self, name: &str, matcher: MatcherDefinition) -> Self {
        self.model
            .headers
            .push(NamedCondition::new(name, vec![matcher]));
        self
    }

    /// Cookie matching a wildcard pattern.
    pub fn with_cookie(self, name: &str, pattern: impl Into<String>) -> Self {
        self.with_cookie_matcher(name, MatcherDefinition::wildcard(pattern))
    }

    pub fn with_cookie_matcher(mut self, name: &str, matcher: MatcherDefinition) -> Self {
        self.model
            .cookies
            .push(NamedCondition::new(name, vec![matcher]));
        self
    }

    /// Body matching a wildcard pattern.
    pub fn with_body(self, pattern: impl Into<String>) -> Self {
        self.with_body_matcher(MatcherDefinition::wildcard(pattern))
    }

    pub fn with_body_matcher(mut self, matcher: MatcherDefinition) -> Self {
        self.model.body = Some(BodyCondition {
            matcher: Some(matcher),
            matchers: Vec::new(),
        });
        self
    }

    /// Body structurally equal to `expected`.
    pub fn with_body_json(self, expected: Value) -> Self {
        self.with_body_matcher(MatcherDefinition::json(expected))
    }

    pub fn with_client_ip(mut self, pattern: impl Into<String>) -> Self {
        self.model.client_ip = Some(ValueCondition::Pattern(pattern.into()));
        self
    }

    pub fn build(self) -> RequestModel {
        self.model
    }
}

impl From<RequestBuilder> for RequestModel {
    fn from(builder: RequestBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::MatcherKind;
    use serde_json::json;

    #[test]
    fn test_builder_is_a_value() {
        let base = RequestBuilder::new().with_path("/a");
        let get = base.clone().using_get().build();
        let post = base.using_post().build();
        assert_eq!(get.methods, vec!["GET"]);
        assert_eq!(post.methods, vec!["POST"]);
    }

    #[test]
    fn test_methods_deduplicate_and_reset() {
        let model = RequestBuilder::new()
            .using_get()
            .using_method("get")
            .using_post()
            .build();
        assert_eq!(model.methods, vec!["GET", "POST"]);
        assert!(RequestBuilder::new()
            .using_get()
            .using_any_method()
            .build()
            .methods
            .is_empty());
    }

    #[test]
    fn test_named_conditions_accumulate() {
        let model = RequestBuilder::new()
            .with_param("page", "1")
            .with_header("X-A", "a*")
            .with_header("X-B", "b")
            .with_cookie("session", "*")
            .build();
        assert_eq!(model.params[0].matchers[0].name, MatcherKind::ExactMatcher);
        assert_eq!(model.headers.len(), 2);
        assert_eq!(model.cookies[0].name, "session");
    }

    #[test]
    fn test_body_json() {
        let model = RequestBuilder::new().with_body_json(json!({"a": 1})).build();
        let body = model.body.unwrap();
        assert_eq!(body.matcher.unwrap().name, MatcherKind::JsonMatcher);
    }
}
