//! String-backed enums shared by several tables.
//!
//! Each enum is stored as a lowercase name so the database stays readable
//! from the `sqlite3` shell and snapshot files stay stable across versions.

use crate::errors::{Error, Result};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Stock increases
    #[sea_orm(string_value = "in")]
    In,
    /// Stock decreases
    #[sea_orm(string_value = "out")]
    Out,
}

impl MovementKind {
    /// The opposite direction, used when compensating a movement.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }
}

/// Which kind of counter a movement touches.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Raw material, measured in grams
    #[sea_orm(string_value = "material")]
    Material,
    /// Finished goods, measured in packages
    #[sea_orm(string_value = "product")]
    Product,
}

/// Business cause of a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    /// Sale (or its cancellation)
    #[sea_orm(string_value = "order")]
    Order,
    /// Material inbound
    #[sea_orm(string_value = "purchase")]
    Purchase,
    /// Batch production of finished goods
    #[sea_orm(string_value = "produce")]
    Produce,
    /// Manual correction or compensation
    #[sea_orm(string_value = "adjust")]
    Adjust,
}

/// Kind of sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Internal consumption; `"self"` on the wire
    #[sea_orm(string_value = "self_use")]
    #[serde(rename = "self")]
    SelfUse,
    /// Member customer
    #[sea_orm(string_value = "vip")]
    Vip,
    /// Distributor
    #[sea_orm(string_value = "distrib")]
    Distrib,
    /// Walk-in customer
    #[default]
    #[sea_orm(string_value = "retail")]
    Retail,
    /// Temporary promotion
    #[sea_orm(string_value = "temp")]
    Temp,
    /// Event sale
    #[sea_orm(string_value = "event")]
    Event,
    /// Test order
    #[sea_orm(string_value = "test")]
    Test,
    /// Gift, free unless a pricing group says otherwise
    #[sea_orm(string_value = "gift")]
    Gift,
}

impl FromStr for OrderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "self" => Ok(Self::SelfUse),
            "vip" => Ok(Self::Vip),
            "distrib" => Ok(Self::Distrib),
            "retail" => Ok(Self::Retail),
            "temp" => Ok(Self::Temp),
            "event" => Ok(Self::Event),
            "test" => Ok(Self::Test),
            "gift" => Ok(Self::Gift),
            other => Err(Error::validation(format!("unknown order type: {other}"))),
        }
    }
}

/// Payment channel recorded on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Payment {
    /// Cash
    #[sea_orm(string_value = "cash")]
    Cash,
    /// WeChat Pay
    #[sea_orm(string_value = "wechat")]
    Wechat,
    /// Alipay
    #[sea_orm(string_value = "alipay")]
    Alipay,
    /// Anything else
    #[sea_orm(string_value = "other")]
    Other,
}

impl FromStr for Payment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cash" => Ok(Self::Cash),
            "wechat" => Ok(Self::Wechat),
            "alipay" => Ok(Self::Alipay),
            "other" => Ok(Self::Other),
            other => Err(Error::validation(format!("unknown payment: {other}"))),
        }
    }
}

/// Discount group a pricing plan belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PricingGroup {
    /// Internal consumption; `"self"` on the wire
    #[sea_orm(string_value = "self_use")]
    #[serde(rename = "self")]
    SelfUse,
    /// Member pricing
    #[sea_orm(string_value = "vip")]
    Vip,
    /// Temporary promotion
    #[sea_orm(string_value = "temp")]
    Temp,
}

impl PricingGroup {
    /// Group implied by an order type when the caller did not pick one.
    #[must_use]
    pub const fn for_order_type(order_type: OrderType) -> Option<Self> {
        match order_type {
            OrderType::SelfUse => Some(Self::SelfUse),
            OrderType::Vip => Some(Self::Vip),
            OrderType::Temp => Some(Self::Temp),
            _ => None,
        }
    }
}

impl FromStr for PricingGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "self" => Ok(Self::SelfUse),
            "vip" => Ok(Self::Vip),
            "temp" => Ok(Self::Temp),
            other => Err(Error::validation(format!("unknown pricing group: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_type_parsing() {
        assert_eq!("self".parse::<OrderType>().ok(), Some(OrderType::SelfUse));
        assert_eq!("gift".parse::<OrderType>().ok(), Some(OrderType::Gift));
        assert!(matches!(
            "wholesale".parse::<OrderType>(),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_pricing_group_serde_uses_self() {
        let json = serde_json::to_string(&PricingGroup::SelfUse).unwrap_or_default();
        assert_eq!(json, "\"self\"");
    }

    #[test]
    fn test_self_use_is_stored_as_self_use() {
        assert_eq!(OrderType::SelfUse.to_value(), "self_use");
        assert_eq!(
            PricingGroup::try_from_value(&"self_use".to_string()).ok(),
            Some(PricingGroup::SelfUse)
        );
        let json = serde_json::to_string(&OrderType::SelfUse).unwrap_or_default();
        assert_eq!(json, "\"self\"");
    }

    #[test]
    fn test_implied_group() {
        assert_eq!(
            PricingGroup::for_order_type(OrderType::Vip),
            Some(PricingGroup::Vip)
        );
        assert_eq!(PricingGroup::for_order_type(OrderType::Retail), None);
    }

    #[test]
    fn test_opposite_kind() {
        assert_eq!(MovementKind::In.opposite(), MovementKind::Out);
        assert_eq!(MovementKind::Out.opposite(), MovementKind::In);
    }
}
