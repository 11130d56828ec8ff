use crate::domain::payment::PaymentMethod;
use crate::domain::ports::ProcessorAdapterArc;
use std::collections::HashMap;

/// Routes each payment method to the adapter that authorizes it.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    adapters: HashMap<PaymentMethod, ProcessorAdapterArc>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` for `method`, replacing any previous one.
    pub fn register(&mut self, method: PaymentMethod, adapter: ProcessorAdapterArc) {
        self.adapters.insert(method, adapter);
    }

    pub fn deregister(&mut self, method: PaymentMethod) -> Option<ProcessorAdapterArc> {
        self.adapters.remove(&method)
    }

    pub fn route(&self, method: PaymentMethod) -> Option<&ProcessorAdapterArc> {
        self.adapters.get(&method)
    }

    /// Methods with an adapter, in declaration order.
    pub fn supported_methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|method| self.adapters.contains_key(method))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{AuthorizationRequest, ProcessorAdapter, ProcessorFailure, ProcessorResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Named(&'static str);

    #[async_trait]
    impl ProcessorAdapter for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn authorize(&self, _: &AuthorizationRequest) -> Result<ProcessorResult, ProcessorFailure> {
            Err(ProcessorFailure::new("UNUSED", "not called"))
        }
    }

    #[test]
    fn test_register_route_deregister() {
        let mut registry = ProcessorRegistry::new();
        registry.register(PaymentMethod::Upi, Arc::new(Named("first")));
        registry.register(PaymentMethod::Upi, Arc::new(Named("second")));
        registry.register(PaymentMethod::Card, Arc::new(Named("cards")));

        assert_eq!(registry.route(PaymentMethod::Upi).map(|a| a.name()), Some("second"));
        assert!(registry.route(PaymentMethod::Crypto).is_none());
        assert_eq!(
            registry.supported_methods(),
            vec![PaymentMethod::Card, PaymentMethod::Upi]
        );

        assert!(registry.deregister(PaymentMethod::Card).is_some());
        assert_eq!(registry.supported_methods(), vec![PaymentMethod::Upi]);
    }
}
