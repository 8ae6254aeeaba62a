//! Record model shared by every stage of a pass
//!
//! An [`Endpoint`] is what the planning engine and the backend exchange: one
//! name, one type, any number of targets. An [`AtomicChange`] is the unit of
//! work after diffing and always carries exactly one target.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Canonical name record
    Cname,
    /// Text record
    Txt,
    /// Pointer (reverse) record
    Ptr,
    /// Mail exchanger record
    Mx,
    /// Name server record
    Ns,
    /// Service locator record
    Srv,
}

impl RecordType {
    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Ptr => "PTR",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "CNAME" => Ok(RecordType::Cname),
            "TXT" => Ok(RecordType::Txt),
            "PTR" => Ok(RecordType::Ptr),
            "MX" => Ok(RecordType::Mx),
            "NS" => Ok(RecordType::Ns),
            "SRV" => Ok(RecordType::Srv),
            other => Err(Error::unknown_record_type(other)),
        }
    }
}

/// A DNS record set as seen by the planning engine or the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Fully qualified record name
    #[serde(rename = "dnsName")]
    pub dns_name: String,

    /// Record type
    #[serde(rename = "recordType")]
    pub record_type: RecordType,

    /// Record targets, in the order the producer supplied them
    pub targets: Vec<String>,

    /// Time-to-live; `None` inherits the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    /// Free-form annotations, ordered and unique by key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Whether a companion PTR record exists (or is wanted) for this A record
    #[serde(default, rename = "ptrRecordExists")]
    pub ptr_record_exists: bool,
}

impl Endpoint {
    /// Create an endpoint with the given targets and no TTL
    pub fn new<I, S>(dns_name: impl Into<String>, record_type: RecordType, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dns_name: dns_name.into(),
            record_type,
            targets: targets.into_iter().map(Into::into).collect(),
            ttl: None,
            annotations: BTreeMap::new(),
            ptr_record_exists: false,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Add an annotation, replacing any previous value for the key
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Set the PTR marker
    pub fn with_ptr_record_exists(mut self, exists: bool) -> Self {
        self.ptr_record_exists = exists;
        self
    }

    /// Composite key used to pair old and new versions of a record
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            dns_name: self.dns_name.clone(),
            record_type: self.record_type,
        }
    }

    /// Copy of this endpoint narrowed to a single target
    pub fn with_single_target(&self, target: impl Into<String>) -> Self {
        Self {
            targets: vec![target.into()],
            ..self.clone()
        }
    }

    /// Combine the PTR marker with another view of the same record.
    ///
    /// The marker only ever moves from `false` to `true` within a pass.
    pub fn merge_ptr_marker(&mut self, other: &Endpoint) {
        self.ptr_record_exists |= other.ptr_record_exists;
    }

    /// Whether non-target attributes differ from `other`
    pub fn attributes_differ(&self, other: &Endpoint) -> bool {
        self.ttl != other.ttl || self.annotations != other.annotations
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.dns_name, self.record_type, self.targets.join(", "))
    }
}

/// `(name, type)` pair identifying a record set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    /// Record name
    pub dns_name: String,
    /// Record type
    pub record_type: RecordType,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dns_name, self.record_type)
    }
}

/// Batches produced by the planning engine for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBatches {
    /// Records to create
    #[serde(default)]
    pub create: Vec<Endpoint>,
    /// Current state of records being updated
    #[serde(default)]
    pub update_old: Vec<Endpoint>,
    /// Desired state of records being updated
    #[serde(default)]
    pub update_new: Vec<Endpoint>,
    /// Records to delete
    #[serde(default)]
    pub delete: Vec<Endpoint>,
}

impl ChangeBatches {
    /// Whether every batch is empty
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}

/// Kind of mutation an atomic change performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Create a record
    Create,
    /// Update a record in place
    Update,
    /// Delete a record
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        })
    }
}

/// One mutation against exactly one record/target pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicChange {
    action: Action,
    endpoint: Endpoint,
}

impl AtomicChange {
    /// Build a change for `target` of `endpoint`
    pub fn new(action: Action, endpoint: &Endpoint, target: impl Into<String>) -> Self {
        Self {
            action,
            endpoint: endpoint.with_single_target(target),
        }
    }

    /// Build a create change
    pub fn create(endpoint: &Endpoint, target: impl Into<String>) -> Self {
        Self::new(Action::Create, endpoint, target)
    }

    /// Build an update change
    pub fn update(endpoint: &Endpoint, target: impl Into<String>) -> Self {
        Self::new(Action::Update, endpoint, target)
    }

    /// Build a delete change
    pub fn delete(endpoint: &Endpoint, target: impl Into<String>) -> Self {
        Self::new(Action::Delete, endpoint, target)
    }

    /// The mutation kind
    pub fn action(&self) -> Action {
        self.action
    }

    /// The single-target endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The only target of this change
    pub fn target(&self) -> &str {
        &self.endpoint.targets[0]
    }

    /// Record name
    pub fn dns_name(&self) -> &str {
        &self.endpoint.dns_name
    }

    /// Record type
    pub fn record_type(&self) -> RecordType {
        self.endpoint.record_type
    }
}

impl fmt::Display for AtomicChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {}",
            self.action,
            self.endpoint.record_type,
            self.endpoint.dns_name,
            self.target()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_change_has_one_target() {
        let ep = Endpoint::new("a.example.com", RecordType::A, ["1.1.1.1", "2.2.2.2"]).with_ttl(60);
        let change = AtomicChange::delete(&ep, "2.2.2.2");

        assert_eq!(change.endpoint().targets, vec!["2.2.2.2".to_string()]);
        assert_eq!(change.target(), "2.2.2.2");
        assert_eq!(change.endpoint().ttl, Some(60));
        assert_eq!(change.to_string(), "DELETE A a.example.com -> 2.2.2.2");
    }

    #[test]
    fn test_record_type_parsing() {
        assert_eq!("cname".parse::<RecordType>().unwrap(), RecordType::Cname);
        assert_eq!("AAAA".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert!(matches!(
            "HINFO".parse::<RecordType>(),
            Err(Error::UnknownRecordType(_))
        ));
    }

    #[test]
    fn test_ptr_marker_merge_is_or() {
        let mut desired = Endpoint::new("a.example.com", RecordType::A, ["1.1.1.1"]);
        let observed = desired.clone().with_ptr_record_exists(true);

        desired.merge_ptr_marker(&observed);
        assert!(desired.ptr_record_exists);

        desired.merge_ptr_marker(&Endpoint::new("a.example.com", RecordType::A, ["1.1.1.1"]));
        assert!(desired.ptr_record_exists, "merge never clears the marker");
    }

    #[test]
    fn test_batches_json_shape() {
        let json = r#"{
            "updateOld": [{"dnsName": "a.example.com", "recordType": "A", "targets": ["1.1.1.1"]}],
            "updateNew": [{"dnsName": "a.example.com", "recordType": "A", "targets": ["2.2.2.2"], "ttl": 120}]
        }"#;

        let batches: ChangeBatches = serde_json::from_str(json).unwrap();
        assert!(batches.create.is_empty());
        assert_eq!(batches.update_new[0].ttl, Some(120));
        assert!(!batches.update_old[0].ptr_record_exists);
        assert!(!batches.is_empty());
    }
}
