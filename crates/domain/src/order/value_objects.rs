//! Value objects for the order domain.

use std::str::FromStr;

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How the customer declared they will pay.
///
/// Recorded only; no payment is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    BankTransfer,
    EWallet,
    CreditCard,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cod,
        PaymentMethod::BankTransfer,
        PaymentMethod::EWallet,
        PaymentMethod::CreditCard,
    ];

    /// Returns the wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::BankTransfer => "bank-transfer",
            PaymentMethod::EWallet => "e-wallet",
            PaymentMethod::CreditCard => "credit-card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidPaymentMethod(s.to_string()))
    }
}

/// Payment status recorded on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidPaymentStatus(s.to_string()))
    }
}

/// Unvalidated shipping address as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "address")]
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub postal_code: Option<String>,
}

/// Validated shipping address.
///
/// Every field is trimmed. The required fields are never blank, and blank
/// optional fields are stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ShippingAddressInput")]
pub struct ShippingAddress {
    full_name: String,
    phone: String,
    address_line: String,
    city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ward: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    postal_code: Option<String>,
}

impl ShippingAddress {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn address_line(&self) -> &str {
        &self.address_line
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }

    pub fn ward(&self) -> Option<&str> {
        self.ward.as_deref()
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }
}

impl TryFrom<ShippingAddressInput> for ShippingAddress {
    type Error = ValidationError;

    fn try_from(input: ShippingAddressInput) -> Result<Self, Self::Error> {
        Ok(Self {
            full_name: required(input.full_name, "fullName")?,
            phone: required(input.phone, "phone")?,
            address_line: required(input.address_line, "addressLine")?,
            city: required(input.city, "city")?,
            district: optional(input.district),
            ward: optional(input.ward),
            postal_code: optional(input.postal_code),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    optional(value).ok_or(ValidationError::MissingField { field })
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Immutable snapshot of a purchased product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(default)]
    pub image: Option<String>,
}

impl OrderLine {
    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ShippingAddressInput {
        ShippingAddressInput {
            full_name: Some("  Jane Doe ".to_string()),
            phone: Some("0900000000".to_string()),
            address_line: Some("1 Main St".to_string()),
            city: Some("Hanoi".to_string()),
            district: Some("   ".to_string()),
            ward: None,
            postal_code: Some(" 10000 ".to_string()),
        }
    }

    #[test]
    fn test_address_is_trimmed() {
        let address = ShippingAddress::try_from(input()).unwrap();
        assert_eq!(address.full_name(), "Jane Doe");
        assert_eq!(address.district(), None);
        assert_eq!(address.postal_code(), Some("10000"));
    }

    #[test]
    fn test_blank_required_field_is_rejected() {
        let mut raw = input();
        raw.city = Some("  ".to_string());
        assert_eq!(
            ShippingAddress::try_from(raw),
            Err(ValidationError::MissingField { field: "city" })
        );

        let mut raw = input();
        raw.phone = None;
        assert_eq!(
            ShippingAddress::try_from(raw),
            Err(ValidationError::MissingField { field: "phone" })
        );
    }

    #[test]
    fn test_address_deserializes_through_validation() {
        let json = r#"{"fullName":"A","phone":"1","address":"Street","city":"C"}"#;
        let address: ShippingAddress = serde_json::from_str(json).unwrap();
        assert_eq!(address.address_line(), "Street");

        let bad = r#"{"fullName":"A","phone":"1","city":"C"}"#;
        assert!(serde_json::from_str::<ShippingAddress>(bad).is_err());
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!("bank-transfer".parse(), Ok(PaymentMethod::BankTransfer));
        assert_eq!("e-wallet".parse(), Ok(PaymentMethod::EWallet));
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CreditCard).unwrap(),
            "\"credit-card\""
        );
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_status_parse() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse(), Ok(status));
        }
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_order_line_total() {
        let line = OrderLine {
            product_id: "P1".into(),
            name: "Widget".to_string(),
            quantity: 3,
            unit_price: Money::new(1_500),
            image: None,
        };
        assert_eq!(line.line_total(), Money::new(4_500));
    }
}
