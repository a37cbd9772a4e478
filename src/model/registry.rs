//! Named model registry.

use crate::model::{BenchModel, ModelSpec, PrimaryAction};

struct RegisteredModel {
    name: String,
    model: Box<dyn BenchModel>,
}

/// Models keyed by name, kept in registration order.
///
/// Overwriting a name replaces its hooks but keeps its original position, so
/// chart markers stay stable across re-registration.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<RegisteredModel>,
}

impl ModelRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite `name`.
    ///
    /// Returns `false`, leaving the registry untouched, when the name is empty or
    /// the hooks do not form a valid model (see [`ModelSpec`]).
    pub fn set_model<T1, T2>(&mut self, name: &str, spec: ModelSpec<T1, T2>) -> bool
    where
        T1: PartialEq + 'static,
        T2: 'static,
    {
        if name.is_empty() {
            return false;
        }
        let Some(entry) = spec.validate() else {
            tracing::debug!(model = name, "rejected incomplete model registration");
            return false;
        };
        let model: Box<dyn BenchModel> = Box::new(entry);

        match self.models.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.model = model,
            None => self.models.push(RegisteredModel {
                name: name.to_string(),
                model,
            }),
        }
        true
    }

    /// The hook performing `name`'s main compression action, or `None` if unknown.
    #[must_use]
    pub fn get_model(&self, name: &str) -> Option<PrimaryAction> {
        self.find(name).map(|m| m.primary_action())
    }

    /// Whether `name` has a separate encoder hook, or `None` if unknown.
    #[must_use]
    pub fn has_explicit_encoder(&self, name: &str) -> Option<bool> {
        self.get_model(name).map(|a| a == PrimaryAction::Encoder)
    }

    /// Remove `name`. Returns whether it was registered.
    pub fn del_model(&mut self, name: &str) -> bool {
        let before = self.models.len();
        self.models.retain(|m| m.name != name);
        self.models.len() != before
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &dyn BenchModel)> {
        self.models.iter().map(|m| (m.name.as_str(), m.model.as_ref()))
    }

    fn find(&self, name: &str) -> Option<&dyn BenchModel> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.model.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RawImage;

    fn auto_saving() -> ModelSpec<RawImage> {
        ModelSpec::new()
            .identity_preprocess()
            .auto_save(|img: &RawImage, slot| slot.write(&img.to_le_bytes()))
            .restore(|slot| RawImage::from_u8(1, 1, 1, slot.read()?))
    }

    fn with_encoder() -> ModelSpec<RawImage, Vec<u8>> {
        ModelSpec::new()
            .identity_preprocess()
            .encoder(|img: &RawImage| Ok(img.to_le_bytes()))
            .persist_encoded(|bytes: &Vec<u8>, slot| slot.write(bytes))
            .restore(|slot| RawImage::from_u8(1, 1, 1, slot.read()?))
    }

    #[test]
    fn test_set_then_get() {
        let mut registry = ModelRegistry::new();
        assert!(registry.set_model("auto", auto_saving()));
        assert!(registry.set_model("enc", with_encoder()));

        assert_eq!(registry.get_model("auto"), Some(PrimaryAction::Persist));
        assert_eq!(registry.get_model("enc"), Some(PrimaryAction::Encoder));
        assert_eq!(registry.has_explicit_encoder("auto"), Some(false));
        assert_eq!(registry.has_explicit_encoder("enc"), Some(true));
        assert_eq!(registry.get_model("missing"), None);
    }

    #[test]
    fn test_rejects_missing_required_hooks() {
        let mut registry = ModelRegistry::new();
        assert!(!registry.set_model("", auto_saving()));

        let mut no_persist = with_encoder();
        no_persist.persist = None;
        assert!(!registry.set_model("a", no_persist));

        let mut no_restore = with_encoder();
        no_restore.restore = None;
        assert!(!registry.set_model("b", no_restore));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_del_model() {
        let mut registry = ModelRegistry::new();
        registry.set_model("auto", auto_saving());

        assert!(registry.del_model("auto"));
        assert_eq!(registry.get_model("auto"), None);
        assert!(!registry.del_model("auto"));
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut registry = ModelRegistry::new();
        registry.set_model("a", auto_saving());
        registry.set_model("b", auto_saving());
        assert!(registry.set_model("a", with_encoder()));

        assert_eq!(registry.names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(registry.get_model("a"), Some(PrimaryAction::Encoder));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rejected_overwrite_keeps_old_entry() {
        let mut registry = ModelRegistry::new();
        registry.set_model("a", with_encoder());

        let mut broken = auto_saving();
        broken.restore = None;
        assert!(!registry.set_model("a", broken));
        assert_eq!(registry.get_model("a"), Some(PrimaryAction::Encoder));
    }
}
