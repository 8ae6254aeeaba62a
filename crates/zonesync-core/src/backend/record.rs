// # Backend Records
//
// Typed, backend-neutral form of the records a DNS backend stores.
//
// Only four record types have a backend mapping: A, TXT, CNAME and PTR.
// Every other type is rejected with `Error::UnknownRecordType` when a record
// is built, so the caller can skip that one change and carry on.
//
// ## PTR records
//
// A PTR endpoint is named after the address it reverses
// (`10.1.2.3 PTR -> host.example.com`). The backend record carries both the
// address and the `in-addr.arpa` / `ip6.arpa` owner name derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::config::SyncConfig;
use crate::endpoint::{Endpoint, RecordType};
use crate::error::{Error, Result};

/// The typed payload of a backend record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RecordKind {
    /// IPv4 address record
    A {
        /// Owner name
        name: String,
        /// Address the name resolves to
        address: Ipv4Addr,
    },
    /// Text record
    Txt {
        /// Owner name
        name: String,
        /// Record text, without enclosing quotes when it has no whitespace
        text: String,
    },
    /// Alias record
    Cname {
        /// Owner name
        name: String,
        /// Canonical name the alias points at
        canonical: String,
    },
    /// Reverse pointer record
    Ptr {
        /// Reverse owner name (`3.2.1.10.in-addr.arpa`)
        name: String,
        /// Host name the address points back to
        ptrdname: String,
        /// The address being reversed
        address: IpAddr,
    },
}

impl RecordKind {
    /// Map a single-target endpoint onto a backend record kind
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownRecordType`] for types without a backend mapping
    /// - [`Error::MalformedInput`] when the endpoint has no target
    /// - [`Error::InvalidRecord`] when an address does not parse
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self> {
        let target = endpoint
            .targets
            .first()
            .ok_or_else(|| Error::malformed(format!("{} has no targets", endpoint.key())))?;

        match endpoint.record_type {
            RecordType::A => {
                let address = target.parse::<Ipv4Addr>().map_err(|e| {
                    Error::invalid_record(format!(
                        "A record {} has invalid address '{}': {}",
                        endpoint.dns_name, target, e
                    ))
                })?;
                Ok(RecordKind::A {
                    name: endpoint.dns_name.clone(),
                    address,
                })
            }
            RecordType::Txt => Ok(RecordKind::Txt {
                name: endpoint.dns_name.clone(),
                text: unquote_txt(target),
            }),
            RecordType::Cname => Ok(RecordKind::Cname {
                name: endpoint.dns_name.clone(),
                canonical: target.clone(),
            }),
            RecordType::Ptr => {
                let address = endpoint.dns_name.parse::<IpAddr>().map_err(|e| {
                    Error::invalid_record(format!(
                        "PTR record name '{}' is not an address: {}",
                        endpoint.dns_name, e
                    ))
                })?;
                Ok(RecordKind::Ptr {
                    name: reverse_name(address),
                    ptrdname: target.clone(),
                    address,
                })
            }
            RecordType::Aaaa | RecordType::Mx | RecordType::Ns | RecordType::Srv => Err(
                Error::unknown_record_type(format!(
                    "{} ({})",
                    endpoint.record_type, endpoint.dns_name
                )),
            ),
        }
    }

    /// Owner name as the backend stores it
    pub fn name(&self) -> &str {
        match self {
            RecordKind::A { name, .. }
            | RecordKind::Txt { name, .. }
            | RecordKind::Cname { name, .. }
            | RecordKind::Ptr { name, .. } => name,
        }
    }

    /// Record type
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordKind::A { .. } => RecordType::A,
            RecordKind::Txt { .. } => RecordType::Txt,
            RecordKind::Cname { .. } => RecordType::Cname,
            RecordKind::Ptr { .. } => RecordType::Ptr,
        }
    }

    /// The single value this record holds
    pub fn target(&self) -> String {
        match self {
            RecordKind::A { address, .. } => address.to_string(),
            RecordKind::Txt { text, .. } => text.clone(),
            RecordKind::Cname { canonical, .. } => canonical.clone(),
            RecordKind::Ptr { ptrdname, .. } => ptrdname.clone(),
        }
    }

    /// Object type used in backend references (`record:a`)
    pub fn object_type(&self) -> &'static str {
        match self {
            RecordKind::A { .. } => "record:a",
            RecordKind::Txt { .. } => "record:txt",
            RecordKind::Cname { .. } => "record:cname",
            RecordKind::Ptr { .. } => "record:ptr",
        }
    }

    /// Whether `other` denotes the same backend object.
    ///
    /// A CNAME is identified by its name alone; the other kinds also compare
    /// their value. Names compare case-insensitively.
    pub fn identifies(&self, other: &RecordKind) -> bool {
        match (self, other) {
            (RecordKind::A { name: a, address: x }, RecordKind::A { name: b, address: y }) => {
                a.eq_ignore_ascii_case(b) && x == y
            }
            (RecordKind::Txt { name: a, text: x }, RecordKind::Txt { name: b, text: y }) => {
                a.eq_ignore_ascii_case(b) && x == y
            }
            (RecordKind::Cname { name: a, .. }, RecordKind::Cname { name: b, .. }) => {
                a.eq_ignore_ascii_case(b)
            }
            (
                RecordKind::Ptr {
                    name: a, ptrdname: x, ..
                },
                RecordKind::Ptr {
                    name: b, ptrdname: y, ..
                },
            ) => a.eq_ignore_ascii_case(b) && x.eq_ignore_ascii_case(y),
            _ => false,
        }
    }

    /// Endpoint view of this record, as returned by record listings
    pub fn to_endpoint(&self, ttl: u32) -> Endpoint {
        let endpoint = match self {
            RecordKind::Ptr {
                ptrdname, address, ..
            } => Endpoint::new(address.to_string(), RecordType::Ptr, [ptrdname.as_str()]),
            other => Endpoint::new(other.name(), other.record_type(), [other.target()]),
        };
        endpoint.with_ttl(ttl)
    }
}

/// A record ready to be submitted to, or looked up in, a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRecord {
    /// Typed payload
    #[serde(flatten)]
    pub kind: RecordKind,

    /// Time-to-live in seconds
    pub ttl: u32,

    /// View the record is created in.
    ///
    /// Only set on records built for creation; backends reject the field on
    /// lookups, updates and deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    /// Extensible attributes attached to the record
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensible_attributes: serde_json::Map<String, serde_json::Value>,
}

impl BackendRecord {
    /// Create a record with no view and no extensible attributes
    pub fn new(kind: RecordKind, ttl: u32) -> Self {
        Self {
            kind,
            ttl,
            view: None,
            extensible_attributes: serde_json::Map::new(),
        }
    }

    /// Endpoint view of this record
    pub fn to_endpoint(&self) -> Endpoint {
        self.kind.to_endpoint(self.ttl)
    }
}

impl fmt::Display for BackendRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} (ttl {})",
            self.kind.object_type(),
            self.kind.name(),
            self.kind.target(),
            self.ttl
        )
    }
}

/// Build the backend record for a single-target endpoint.
///
/// `for_read` selects the lookup shape used for updates and deletes; records
/// built for creation carry the configured view. The endpoint's TTL wins over
/// the configured default.
pub fn build_backend_record(
    endpoint: &Endpoint,
    for_read: bool,
    config: &SyncConfig,
) -> Result<BackendRecord> {
    let kind = RecordKind::from_endpoint(endpoint)?;

    Ok(BackendRecord {
        kind,
        ttl: endpoint.ttl.unwrap_or(config.default_ttl),
        view: (!for_read).then(|| config.view.clone()),
        extensible_attributes: config.extensible_attributes(),
    })
}

/// Reverse lookup name for an address (`3.2.1.10.in-addr.arpa`)
pub fn reverse_name(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a)
        }
        IpAddr::V6(v6) => {
            let mut labels: Vec<String> = v6
                .octets()
                .iter()
                .flat_map(|b| [b >> 4, b & 0x0f])
                .rev()
                .map(|n| format!("{:x}", n))
                .collect();
            labels.push("ip6.arpa".to_string());
            labels.join(".")
        }
    }
}

/// Strip enclosing double quotes from a TXT value without whitespace.
///
/// Backends store such values unquoted, so a quoted desired value would never
/// match what is read back.
fn unquote_txt(target: &str) -> String {
    if target.len() < 2 || target.contains(char::is_whitespace) {
        return target.to_string();
    }

    let Some(inner) = target
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return target.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return target.to_string(),
            },
            '"' => return target.to_string(),
            other => out.push(other),
        }
    }
    out
}
