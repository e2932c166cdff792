use core::fmt;
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Runtime value produced by evaluating an expression.
///
/// Absence is not a value: evaluators return `Option<Value>`, where `None`
/// means "no value" and an `EvalError` means an actual failure. `Network` and
/// `Pattern` are the artifacts of parameter transforms (a parsed CIDR range,
/// a compiled regex) so constant folding can cache them on the AST.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Network(IpNetwork),
    Pattern(Pattern),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Long(n) => write!(f, "{}", n),
            Value::Double(d) => write!(f, "{}", d),
            Value::Network(n) => write!(f, "{}", n),
            Value::Pattern(p) => write!(f, "{}", p.as_str()),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Network(_) => ValueType::Network,
            Value::Pattern(_) => ValueType::Pattern,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Long(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Static type tag used by parameter descriptors and error reporting.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum ValueType {
    Boolean,
    Long,
    Double,
    String,
    List,
    Map,
    Network,
    Pattern,
    /// Functions with no meaningful return value.
    Void,
    /// Accepts any value; no coercion is implied.
    Any,
}

/// A compiled regular expression that still compares and serializes by its
/// source text, so folded AST nodes stay `PartialEq`.
#[derive(Clone, Debug)]
pub struct Pattern(Arc<Regex>);

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, regex::Error> {
        Ok(Self(Arc::new(Regex::new(source)?)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::compile(&source).map_err(D::Error::custom)
    }
}

/// An IP network in CIDR notation. A bare address parses as a host network
/// (/32 or /128).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, NetworkParseError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(NetworkParseError::PrefixOutOfRange { prefix, max });
        }
        Ok(Self { addr, prefix })
    }

    pub fn host(addr: IpAddr) -> Self {
        let prefix = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        Self { addr, prefix }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Membership test. Mixed v4/v6 comparisons are always false.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.addr, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix.min(32)))
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix.min(128)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkParseError {
    #[error("invalid network address: {0}")]
    InvalidAddress(String),
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
    #[error("prefix length {prefix} exceeds maximum {max}")]
    PrefixOutOfRange { prefix: u8, max: u8 },
}

impl FromStr for IpNetwork {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((addr, prefix)) => {
                let addr: IpAddr = addr
                    .parse()
                    .map_err(|_| NetworkParseError::InvalidAddress(addr.to_string()))?;
                let prefix: u8 = prefix
                    .parse()
                    .map_err(|_| NetworkParseError::InvalidPrefix(prefix.to_string()))?;
                IpNetwork::new(addr, prefix)
            }
            None => {
                let addr: IpAddr = s
                    .parse()
                    .map_err(|_| NetworkParseError::InvalidAddress(s.to_string()))?;
                Ok(IpNetwork::host(addr))
            }
        }
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        let net: IpNetwork = "10.0.0.0/8".parse().unwrap();
        assert_eq!(net.prefix(), 8);
        assert!(net.contains("10.1.2.3".parse().unwrap()));
        assert!(!net.contains("11.0.0.1".parse().unwrap()));

        // bare address becomes a host network
        let host: IpNetwork = "192.168.1.1".parse().unwrap();
        assert_eq!(host.prefix(), 32);
        assert!(host.contains("192.168.1.1".parse().unwrap()));
        assert!(!host.contains("192.168.1.2".parse().unwrap()));
    }

    #[test]
    fn test_network_parse_errors() {
        assert!("not-an-ip/8".parse::<IpNetwork>().is_err());
        assert!("10.0.0.0/zz".parse::<IpNetwork>().is_err());
        assert!(matches!(
            "10.0.0.0/33".parse::<IpNetwork>(),
            Err(NetworkParseError::PrefixOutOfRange { prefix: 33, max: 32 })
        ));
    }

    #[test]
    fn test_network_zero_prefix_matches_everything() {
        let net: IpNetwork = "0.0.0.0/0".parse().unwrap();
        assert!(net.contains("255.255.255.255".parse().unwrap()));
        assert!(net.contains("1.2.3.4".parse().unwrap()));
        // but never across families
        assert!(!net.contains("::1".parse().unwrap()));
    }

    #[test]
    fn test_v6_network() {
        let net: IpNetwork = "2001:db8::/32".parse().unwrap();
        assert!(net.contains("2001:db8::1".parse().unwrap()));
        assert!(!net.contains("2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn test_pattern_equality_by_source() {
        let a = Pattern::compile("^foo").unwrap();
        let b = Pattern::compile("^foo").unwrap();
        let c = Pattern::compile("^bar").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Long(1).value_type(), ValueType::Long);
        assert_eq!(Value::from("x").value_type(), ValueType::String);
        assert_eq!(Value::Boolean(true).value_type(), ValueType::Boolean);
        assert_eq!(ValueType::Network.to_string(), "network");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("hello").to_string(), "hello");
        assert_eq!(Value::Long(42).to_string(), "42");
        assert_eq!(Value::Boolean(false).to_string(), "false");
    }

    #[test]
    fn test_double_coercion() {
        assert_eq!(Value::Long(2).as_double(), Some(2.0));
        assert_eq!(Value::Double(2.5).as_double(), Some(2.5));
        assert_eq!(Value::from("2.5").as_double(), None);
    }
}
