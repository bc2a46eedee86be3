//! Contract document model
//!
//! A contract is the ordered set of interactions one consumer version
//! expects from one provider. This module defines the wire format,
//! structural validation, and the canonical content hash used to detect
//! identical republishes.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "consumer": { "name": "web" },
//!   "provider": { "name": "orders" },
//!   "interactions": [{
//!     "description": "get order 1",
//!     "providerState": { "name": "order 1 exists" },
//!     "request": { "method": "GET", "path": "/orders/1" },
//!     "response": {
//!       "status": 200,
//!       "headers": { "Content-Type": "application/json" },
//!       "body": { "match": "like", "value": { "id": 1 } }
//!     }
//!   }],
//!   "metadata": { "specVersion": "accord/1" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::{AccordError, Result};
use crate::names::ParticipantName;

/// Document format version written when a document does not carry one
pub const DEFAULT_SPEC_VERSION: &str = "accord/1";

// ============================================================================
// HTTP method
// ============================================================================

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// Canonical upper-case spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let method = match value.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            _ => return Err(format!("unsupported HTTP method '{}'", value)),
        };
        Ok(method)
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Body matchers
// ============================================================================

fn default_min() -> usize {
    1
}

/// Expectation on a JSON body
///
/// Matchers are either literal values (`equals`) or shape constraints
/// that accept any value of the right type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "camelCase")]
pub enum BodyMatcher {
    /// Exact JSON equality
    Equals {
        /// Expected value
        value: serde_json::Value,
    },
    /// Same JSON type as the example, recursively
    Like {
        /// Example value
        value: serde_json::Value,
    },
    /// Array whose every element matches the template
    EachLike {
        /// Matcher applied to each element
        template: Box<BodyMatcher>,
        /// Minimum number of elements
        #[serde(default = "default_min")]
        min: usize,
    },
    /// Object with required fields; extra fields are allowed
    Object {
        /// Matcher per required field
        fields: BTreeMap<String, BodyMatcher>,
    },
    /// Any integral number
    Integer,
    /// Any number with a fractional representation
    Decimal,
    /// Any boolean
    Boolean,
    /// Any string
    String,
    /// A string containing the given text
    Include {
        /// Required substring
        value: String,
    },
    /// JSON null
    Null,
}

impl BodyMatcher {
    /// Literal matcher shorthand
    pub fn equals(value: serde_json::Value) -> Self {
        BodyMatcher::Equals { value }
    }

    /// Type matcher shorthand
    pub fn like(value: serde_json::Value) -> Self {
        BodyMatcher::Like { value }
    }

    /// Array matcher shorthand with a minimum of one element
    pub fn each_like(template: BodyMatcher) -> Self {
        BodyMatcher::EachLike {
            template: Box::new(template),
            min: 1,
        }
    }
}

// ============================================================================
// Interaction
// ============================================================================

/// Named precondition the provider establishes before an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderState {
    /// State name, e.g. "order 1 exists"
    pub name: String,
    /// Free-form parameters for the state handler
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl ProviderState {
    /// State without parameters
    pub fn named(name: impl Into<String>) -> Self {
        ProviderState {
            name: name.into(),
            params: serde_json::Value::Null,
        }
    }
}

/// Expected request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMatcher {
    /// HTTP method
    pub method: HttpMethod,
    /// Request path, starting with `/`
    pub path: String,
    /// Query parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    /// Required headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Body shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyMatcher>,
}

impl RequestMatcher {
    /// Request with no headers, query or body
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        RequestMatcher {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// Expected response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatcher {
    /// Status code
    pub status: u16,
    /// Required headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Body shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyMatcher>,
}

impl ResponseMatcher {
    /// Response with only a status
    pub fn status(status: u16) -> Self {
        ResponseMatcher {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a required header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body matcher
    pub fn with_body(mut self, body: BodyMatcher) -> Self {
        self.body = Some(body);
        self
    }
}

/// One request/response expectation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Human-readable description, unique per provider state
    pub description: String,
    /// Precondition, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<ProviderState>,
    /// Expected request
    pub request: RequestMatcher,
    /// Expected response
    pub response: ResponseMatcher,
}

impl Interaction {
    /// Build an interaction without a provider state
    pub fn new(
        description: impl Into<String>,
        request: RequestMatcher,
        response: ResponseMatcher,
    ) -> Self {
        Interaction {
            description: description.into(),
            provider_state: None,
            request,
            response,
        }
    }

    /// Attach a provider state
    pub fn given(mut self, state: ProviderState) -> Self {
        self.provider_state = Some(state);
        self
    }

    /// Identity within a contract
    ///
    /// `<provider state>::<description>`, or the bare description when the
    /// interaction has no provider state. Unique per validated document.
    pub fn key(&self) -> String {
        match &self.provider_state {
            Some(state) => format!("{}::{}", state.name, self.description),
            None => self.description.clone(),
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// Reference to a participant inside a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    /// Participant name
    pub name: ParticipantName,
}

/// Document metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Format version of the document
    pub spec_version: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            spec_version: DEFAULT_SPEC_VERSION.to_string(),
        }
    }
}

/// A complete contract document as exchanged with publishers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDocument {
    /// Consumer side
    pub consumer: PartyRef,
    /// Provider side
    pub provider: PartyRef,
    /// Ordered interactions
    pub interactions: Vec<Interaction>,
    /// Metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl ContractDocument {
    /// Assemble a document with default metadata
    pub fn new(
        consumer: ParticipantName,
        provider: ParticipantName,
        interactions: Vec<Interaction>,
    ) -> Self {
        ContractDocument {
            consumer: PartyRef { name: consumer },
            provider: PartyRef { name: provider },
            interactions,
            metadata: Metadata::default(),
        }
    }

    /// Parse and validate a JSON document
    ///
    /// Missing request or response sections, unknown methods and invalid
    /// names are reported as `InvalidContract`.
    pub fn from_json(input: &str) -> Result<Self> {
        let doc: ContractDocument = serde_json::from_str(input)
            .map_err(|e| AccordError::invalid_contract(e.to_string()))?;
        validate_interactions(&doc.interactions)?;
        Ok(doc)
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Structural checks applied before anything is stored
pub fn validate_interactions(interactions: &[Interaction]) -> Result<()> {
    if interactions.is_empty() {
        return Err(AccordError::invalid_contract(
            "contract must contain at least one interaction",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, interaction) in interactions.iter().enumerate() {
        if interaction.description.trim().is_empty() {
            return Err(AccordError::invalid_contract(format!(
                "interaction {} has an empty description",
                idx
            )));
        }
        let state = interaction
            .provider_state
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("");
        if !seen.insert((interaction.description.as_str(), state)) {
            return Err(AccordError::invalid_contract(format!(
                "duplicate interaction '{}' for provider state '{}'",
                interaction.description, state
            )));
        }
        if !interaction.request.path.starts_with('/') {
            return Err(AccordError::invalid_contract(format!(
                "interaction '{}': path '{}' must start with '/'",
                interaction.description, interaction.request.path
            )));
        }
        if !(100..=599).contains(&interaction.response.status) {
            return Err(AccordError::invalid_contract(format!(
                "interaction '{}': status {} is not a valid HTTP status",
                interaction.description, interaction.response.status
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Content hash
// ============================================================================

/// SHA-256 of the canonical JSON encoding of an interaction list
///
/// Struct fields serialize in declaration order and all maps are ordered,
/// so equal interaction lists always hash equally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash an interaction list
    pub fn of(interactions: &[Interaction]) -> Result<Self> {
        let canonical = serde_json::to_vec(interactions)?;
        let digest = Sha256::digest(&canonical);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            hex.push_str(&format!("{:02x}", byte));
        }
        Ok(ContentHash(hex))
    }

    /// Full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex characters, for display
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
