use super::model::{MappingModel, RequestModel, ResponseModel};
use uuid::Uuid;

/// Fluent builder pairing a request predicate with a response.
///
/// ```
/// use mockwire::mapping::MappingBuilder;
/// use mockwire::request::RequestBuilder;
/// use mockwire::response::ResponseBuilder;
///
/// let mapping = MappingBuilder::given(RequestBuilder::new().with_path("/todo").using_post())
///     .in_scenario("todo")
///     .when_state_is("Started")
///     .will_set_state_to("Added")
///     .respond_with(ResponseBuilder::new().with_status_code(201));
/// assert_eq!(mapping.set_state_to.as_deref(), Some("Added"));
/// ```
#[derive(Debug, Clone)]
pub struct MappingBuilder {
    model: MappingModel,
}

impl MappingBuilder {
    pub fn given(request: impl Into<RequestModel>) -> Self {
        Self {
            model: MappingModel {
                request: request.into(),
                ..Default::default()
            },
        }
    }

    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.model.guid = Some(guid);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.model.title = Some(title.into());
        self
    }

    /// Lower numbers take precedence.
    pub fn at_priority(mut self, priority: i32) -> Self {
        self.model.priority = Some(priority);
        self
    }

    pub fn in_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.model.scenario = Some(scenario.into());
        self
    }

    pub fn when_state_is(mut self, state: impl Into<String>) -> Self {
        self.model.when_state_is = Some(state.into());
        self
    }

    pub fn will_set_state_to(mut self, state: impl Into<String>) -> Self {
        self.model.set_state_to = Some(state.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.model.weight = Some(weight);
        self
    }

    pub fn respond_with(mut self, response: impl Into<ResponseModel>) -> MappingModel {
        self.model.response = response.into();
        self.model
    }
}
