//! Engine configuration shared by every context of an engine

use crate::config::ContextConfig;
use crate::error::ContextResult;
use crate::expression_objects::ExpressionObjectFactory;
use crate::messages::{MessageResolver, StandardMessageResolver};
use std::sync::Arc;

/// Immutable engine-wide settings and collaborators
#[derive(Debug, Clone)]
pub struct EngineConfiguration {
    context: ContextConfig,
    message_resolvers: Vec<Arc<dyn MessageResolver>>,
    expression_object_factories: Vec<Arc<dyn ExpressionObjectFactory>>,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            message_resolvers: vec![Arc::new(StandardMessageResolver::new())],
            expression_object_factories: Vec::new(),
        }
    }
}

impl EngineConfiguration {
    pub fn builder() -> EngineConfigurationBuilder {
        EngineConfigurationBuilder::default()
    }

    /// Settings for the scope maps of each context
    pub fn context_config(&self) -> &ContextConfig {
        &self.context
    }

    /// Message resolvers, in the order they are consulted
    pub fn message_resolvers(&self) -> &[Arc<dyn MessageResolver>] {
        &self.message_resolvers
    }

    pub fn expression_object_factories(&self) -> &[Arc<dyn ExpressionObjectFactory>] {
        &self.expression_object_factories
    }
}

/// Builder for [`EngineConfiguration`]
#[derive(Debug, Default)]
pub struct EngineConfigurationBuilder {
    context: Option<ContextConfig>,
    message_resolvers: Vec<Arc<dyn MessageResolver>>,
    expression_object_factories: Vec<Arc<dyn ExpressionObjectFactory>>,
}

impl EngineConfigurationBuilder {
    pub fn context_config(mut self, config: ContextConfig) -> Self {
        self.context = Some(config);
        self
    }

    /// Add a message resolver. Without any, a [`StandardMessageResolver`] is used.
    pub fn message_resolver(mut self, resolver: impl MessageResolver + 'static) -> Self {
        self.message_resolvers.push(Arc::new(resolver));
        self
    }

    pub fn expression_object_factory(
        mut self,
        factory: impl ExpressionObjectFactory + 'static,
    ) -> Self {
        self.expression_object_factories.push(Arc::new(factory));
        self
    }

    /// Validate the settings and build the configuration
    pub fn build(self) -> ContextResult<EngineConfiguration> {
        let context = self.context.unwrap_or_default();
        context.validate()?;

        let mut message_resolvers = self.message_resolvers;
        if message_resolvers.is_empty() {
            message_resolvers.push(Arc::new(StandardMessageResolver::new()));
        }
        // stable: equal orders keep registration order
        message_resolvers.sort_by_key(|resolver| resolver.order());

        Ok(EngineConfiguration {
            context,
            message_resolvers,
            expression_object_factories: self.expression_object_factories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;

    #[test]
    fn test_default_has_standard_resolver() {
        let config = EngineConfiguration::default();
        assert_eq!(config.message_resolvers().len(), 1);
        assert_eq!(config.message_resolvers()[0].name(), "StandardMessageResolver");
        assert!(config.expression_object_factories().is_empty());
    }

    #[test]
    fn test_resolvers_sorted_by_order() {
        let config = EngineConfiguration::builder()
            .message_resolver(StandardMessageResolver::new().with_name("late").with_order(10))
            .message_resolver(StandardMessageResolver::new().with_name("early").with_order(-1))
            .message_resolver(StandardMessageResolver::new().with_name("middle"))
            .build()
            .unwrap();
        let names: Vec<_> = config.message_resolvers().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_invalid_context_config_rejected() {
        let result = EngineConfiguration::builder()
            .context_config(ContextConfig::new(0, 1, 1))
            .build();
        assert!(matches!(result, Err(ContextError::InvalidConfiguration { .. })));
    }
}
