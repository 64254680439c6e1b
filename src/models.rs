use serde::{Deserialize, Serialize};

use crate::error::ConversationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provider {
    #[serde(rename = "remote-server")]
    Remote,
    #[serde(rename = "local-gpu")]
    Local,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote-server",
            Self::Local => "local-gpu",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local-gpu" | "local" | "ollama" => Some(Self::Local),
            "remote-server" | "remote" | "server" => Some(Self::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub provider: Provider,
}

impl Model {
    pub fn new(id: impl Into<String>, provider: Provider) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider,
        }
    }
}

/// One entry of a model listing as servers send it: either a bare id or an
/// object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModelEntry {
    Id(String),
    Detailed {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        provider: Option<String>,
    },
}

impl ModelEntry {
    pub fn into_model(self, default_provider: Provider) -> Option<Model> {
        let (id, name, provider) = match self {
            Self::Id(id) => (id, None, None),
            Self::Detailed { id, name, provider } => {
                (id.or_else(|| name.clone())?, name, provider)
            }
        };
        let id = id.trim().to_string();
        if id.is_empty() {
            return None;
        }
        Some(Model {
            name: name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| id.clone()),
            provider: provider
                .as_deref()
                .and_then(Provider::parse)
                .unwrap_or(default_provider),
            id,
        })
    }
}

/// Concatenates listings in order, keeping the first model seen for each id.
pub fn merge_listings(listings: impl IntoIterator<Item = Vec<Model>>) -> Vec<Model> {
    let mut merged: Vec<Model> = Vec::new();
    for model in listings.into_iter().flatten() {
        if !merged.iter().any(|existing| existing.id == model.id) {
            merged.push(model);
        }
    }
    merged
}

#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<Model>,
    current: Option<String>,
}

impl ModelCatalog {
    pub fn with_selection(selection: Option<String>) -> Self {
        let mut catalog = Self::default();
        if let Some(id) = selection {
            catalog.select(&id);
        }
        catalog
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.iter().any(|model| model.id == id)
    }

    /// Installs a fresh listing. A selection missing from a non-empty
    /// listing falls back to the first model.
    pub fn replace(&mut self, models: Vec<Model>) {
        self.models = merge_listings([models]);
        let keep = self
            .current
            .as_deref()
            .is_some_and(|id| self.models.is_empty() || self.contains(id));
        if !keep {
            self.current = self.models.first().map(|model| model.id.clone());
        }
    }

    /// `default` and blank ids clear the selection.
    pub fn select(&mut self, id: &str) {
        let id = id.trim();
        self.current = (!id.is_empty() && id != "default").then(|| id.to_string());
    }

    /// The model a turn should use. With no listing loaded an explicit
    /// selection is trusted as-is.
    pub fn resolve(&self) -> Result<String, ConversationError> {
        match self.current.as_deref() {
            Some(id) if self.models.is_empty() || self.contains(id) => Ok(id.to_string()),
            Some(id) => Err(ConversationError::ModelUnavailable(id.to_string())),
            None => self
                .models
                .first()
                .map(|model| model.id.clone())
                .ok_or(ConversationError::NoModelSelected),
        }
    }
}
