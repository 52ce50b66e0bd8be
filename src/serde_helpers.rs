// Serde helpers for arbitrary-precision amounts
// Amounts travel as base-10 strings and rates as "numerator/denominator" strings
// so that no precision is lost at the API boundary
//
// Numan Thabit 2025 Nov

use num::{BigInt, BigRational, BigUint};
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

fn parse_amount<E: serde::de::Error>(raw: &str) -> Result<BigUint, E> {
    BigUint::from_str(raw.trim()).map_err(|_| E::custom(format!("invalid amount: {raw}")))
}

/// `BigUint` as a decimal string.
pub mod amount {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw)
    }
}

/// `Vec<BigUint>` as decimal strings.
pub mod amount_vec {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(values: &[BigUint], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&v.to_str_radix(10))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigUint>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|raw| parse_amount(raw))
            .collect()
    }
}

/// `BigInt` as a decimal string (may be negative).
pub mod signed_amount {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BigInt::from_str(raw.trim())
            .map_err(|_| serde::de::Error::custom(format!("invalid signed amount: {raw}")))
    }
}

/// `BigRational` as "numer/denom".
pub mod rate {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigRational, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}/{}", value.numer(), value.denom()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BigRational, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let (numer, denom) = raw.split_once('/').unwrap_or((raw.as_str(), "1"));
        let numer = BigInt::from_str(numer.trim())
            .map_err(|_| serde::de::Error::custom(format!("invalid rate: {raw}")))?;
        let denom = BigInt::from_str(denom.trim())
            .map_err(|_| serde::de::Error::custom(format!("invalid rate: {raw}")))?;
        if denom == BigInt::from(0) {
            return Err(serde::de::Error::custom(format!("zero denominator in rate: {raw}")));
        }
        Ok(BigRational::new(numer, denom))
    }
}

/// `BTreeMap<K, BigUint>` with decimal-string values.
pub mod amount_map {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    pub fn serialize<S, K>(map: &BTreeMap<K, BigUint>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize + Ord,
    {
        let as_strings: BTreeMap<&K, String> =
            map.iter().map(|(k, v)| (k, v.to_str_radix(10))).collect();
        as_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D, K>(deserializer: D) -> Result<BTreeMap<K, BigUint>, D::Error>
    where
        D: Deserializer<'de>,
        K: Deserialize<'de> + Ord,
    {
        BTreeMap::<K, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, raw)| parse_amount(&raw).map(|v| (k, v)))
            .collect()
    }
}
