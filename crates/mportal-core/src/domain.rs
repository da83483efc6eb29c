//! String-backed domain enums. Each one round-trips through the lowercase
//! text stored in Postgres and carried over the API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(CoreError::UnknownVariant {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

string_enum!(Role, "role", {
    Admin => "admin",
    Manager => "manager",
    Staff => "staff",
});

impl Role {
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Catalog, inventory, order and sync writes.
    #[must_use]
    pub fn can_manage_catalog(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Shopify,
    #[serde(rename = "bestbuy")]
    BestBuy,
    Amazon,
    Manual,
}

string_enum!(ChannelKind, "channel kind", {
    Shopify => "shopify",
    BestBuy => "bestbuy",
    Amazon => "amazon",
    Manual => "manual",
});

impl ChannelKind {
    /// Default ISO 4217 currency for listings on this kind of channel.
    #[must_use]
    pub fn default_currency(self) -> &'static str {
        match self {
            ChannelKind::BestBuy => "CAD",
            ChannelKind::Shopify | ChannelKind::Amazon | ChannelKind::Manual => "USD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Draft,
    Archived,
}

string_enum!(ProductStatus, "product status", {
    Active => "active",
    Draft => "draft",
    Archived => "archived",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl OrderStatus {
    /// Cancelled and refunded orders are excluded from revenue rollups.
    #[must_use]
    pub fn counts_as_revenue(self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Adjustment,
    Sale,
    Return,
    Restock,
    Sync,
    Reserve,
    Release,
}

string_enum!(MovementType, "movement type", {
    Adjustment => "adjustment",
    Sale => "sale",
    Return => "return",
    Restock => "restock",
    Sync => "sync",
    Reserve => "reserve",
    Release => "release",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" manager ".parse::<Role>().unwrap(), Role::Manager);
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Admin.can_manage_catalog());
        assert!(Role::Manager.can_manage_catalog());
        assert!(!Role::Staff.can_manage_catalog());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Manager.is_admin());
    }

    #[test]
    fn unknown_channel_kind_is_rejected() {
        let err = "ebay".parse::<ChannelKind>().unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownVariant {
                kind: "channel kind",
                value: "ebay".to_string()
            }
        );
    }

    #[test]
    fn bestbuy_serializes_without_separator() {
        let json = serde_json::to_string(&ChannelKind::BestBuy).unwrap();
        assert_eq!(json, "\"bestbuy\"");
        assert_eq!(ChannelKind::BestBuy.to_string(), "bestbuy");
    }

    #[test]
    fn channel_currency_defaults() {
        assert_eq!(ChannelKind::BestBuy.default_currency(), "CAD");
        assert_eq!(ChannelKind::Shopify.default_currency(), "USD");
    }

    #[test]
    fn revenue_excludes_cancelled_and_refunded() {
        assert!(OrderStatus::Shipped.counts_as_revenue());
        assert!(!OrderStatus::Cancelled.counts_as_revenue());
        assert!(!OrderStatus::Refunded.counts_as_revenue());
    }

    #[test]
    fn movement_type_display_matches_storage_text() {
        assert_eq!(MovementType::Sync.to_string(), "sync");
        assert_eq!(
            "restock".parse::<MovementType>().unwrap(),
            MovementType::Restock
        );
    }
}
