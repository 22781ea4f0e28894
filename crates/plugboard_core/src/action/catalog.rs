//! Named action catalog: the shipped adapter implementation.
//!
//! # Responsibility
//! - Let the host register named action constructors once at startup.
//! - Resolve payload heads against those names during parsing.
//!
//! # Invariants
//! - Registration is explicit; payload text is never interpreted as
//!   code.
//! - Names are unique; a duplicate registration is rejected.

use super::{Action, ActionAdapter, ActionPayload, AdaptError, AdaptResult};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Constructor building one invocable from payload argument lines.
pub type ActionFactory = Box<dyn Fn(&[String]) -> AdaptResult<Box<dyn Action>>>;

/// Catalog registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    InvalidName(String),
    DuplicateAction(String),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "action name is invalid: `{name}`"),
            Self::DuplicateAction(name) => write!(f, "action already registered: {name}"),
        }
    }
}

impl Error for CatalogError {}

/// Registry of host-provided named actions.
#[derive(Default)]
pub struct ActionCatalog {
    factories: BTreeMap<String, ActionFactory>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one constructor under a unique name.
    ///
    /// Names must be non-empty and free of whitespace so they stay
    /// addressable as a payload head line.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), CatalogError>
    where
        F: Fn(&[String]) -> AdaptResult<Box<dyn Action>> + 'static,
    {
        let normalized = name.trim();
        if normalized.is_empty() || normalized.contains(char::is_whitespace) {
            return Err(CatalogError::InvalidName(name.to_string()));
        }
        if self.factories.contains_key(normalized) {
            return Err(CatalogError::DuplicateAction(normalized.to_string()));
        }

        self.factories
            .insert(normalized.to_string(), Box::new(factory));
        Ok(())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl ActionAdapter for ActionCatalog {
    fn adapt(&self, payload: &ActionPayload) -> AdaptResult<Box<dyn Action>> {
        let head = payload.head().ok_or(AdaptError::EmptyPayload)?;
        let factory = self
            .factories
            .get(head)
            .ok_or_else(|| AdaptError::UnknownAction(head.to_string()))?;
        factory(payload.args())
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionCatalog, CatalogError};
    use crate::action::{
        Action, ActionAdapter, ActionCx, ActionPayload, ActionResult, AdaptError,
    };

    struct NoopAction;

    impl Action for NoopAction {
        fn invoke(&self, _cx: &mut ActionCx<'_>) -> ActionResult<()> {
            Ok(())
        }
    }

    fn catalog_with_noop() -> ActionCatalog {
        let mut catalog = ActionCatalog::new();
        catalog
            .register("noop", |_args| Ok(Box::new(NoopAction)))
            .expect("noop registration");
        catalog
    }

    #[test]
    fn adapts_registered_payload_head() {
        let catalog = catalog_with_noop();
        let payload = ActionPayload::new(vec!["noop".to_string()]);
        assert!(catalog.adapt(&payload).is_ok());
    }

    #[test]
    fn rejects_unknown_action_names() {
        let catalog = catalog_with_noop();
        let payload = ActionPayload::new(vec!["launch_missiles".to_string()]);
        let err = catalog.adapt(&payload).expect_err("unknown head must fail");
        assert_eq!(err, AdaptError::UnknownAction("launch_missiles".to_string()));
    }

    #[test]
    fn rejects_empty_payloads() {
        let catalog = catalog_with_noop();
        let err = catalog
            .adapt(&ActionPayload::default())
            .expect_err("empty payload must fail");
        assert_eq!(err, AdaptError::EmptyPayload);
    }

    #[test]
    fn rejects_duplicate_and_invalid_names() {
        let mut catalog = catalog_with_noop();
        let err = catalog
            .register("noop", |_args| Ok(Box::new(NoopAction)))
            .expect_err("duplicate registration must fail");
        assert_eq!(err, CatalogError::DuplicateAction("noop".to_string()));

        let err = catalog
            .register("two words", |_args| Ok(Box::new(NoopAction)))
            .expect_err("whitespace name must fail");
        assert!(matches!(err, CatalogError::InvalidName(_)));
    }

    #[test]
    fn factory_sees_argument_lines() {
        let mut catalog = ActionCatalog::new();
        catalog
            .register("want_args", |args| {
                if args.is_empty() {
                    return Err(AdaptError::InvalidArguments {
                        action: "want_args".to_string(),
                        reason: "at least one argument line required".to_string(),
                    });
                }
                Ok(Box::new(NoopAction) as Box<dyn Action>)
            })
            .expect("registration");

        let ok = ActionPayload::new(vec!["want_args".to_string(), "x=1".to_string()]);
        assert!(catalog.adapt(&ok).is_ok());

        let bare = ActionPayload::new(vec!["want_args".to_string()]);
        assert!(matches!(
            catalog.adapt(&bare),
            Err(AdaptError::InvalidArguments { .. })
        ));
    }
}
