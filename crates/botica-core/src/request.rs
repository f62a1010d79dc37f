//! Input payloads accepted by the facade.
//!
//! Every payload has a `validate` method that checks shape only (required
//! fields, signs, formats). Uniqueness and existence are the store's job.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::PaymentMethod;
use crate::validation::{
    validate_email, validate_non_negative, validate_positive, validate_required, ValidationResult,
};

// =============================================================================
// Master data
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSeller {
    pub name: String,
    pub last_name: String,
    pub national_id: String,
    pub email: String,
    pub password: String,
}

impl NewSeller {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name)?;
        validate_required("lastName", &self.last_name)?;
        validate_required("nationalId", &self.national_id)?;
        validate_email(&self.email)?;
        validate_required("password", &self.password)?;
        Ok(())
    }
}

/// Admin-side seller edit. Credentials are not touched.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SellerUpdate {
    pub name: String,
    pub last_name: String,
    pub national_id: String,
    pub email: String,
}

impl SellerUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name)?;
        validate_required("lastName", &self.last_name)?;
        validate_required("nationalId", &self.national_id)?;
        validate_email(&self.email)
    }
}

/// Self-service profile edit.
///
/// A password change needs both `current_password` and `new_password`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileUpdate {
    #[serde(flatten)]
    pub fields: SellerUpdate,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        self.fields.validate()?;
        if let Some(new_password) = &self.new_password {
            validate_required("newPassword", new_password)?;
            match &self.current_password {
                Some(current) if !current.is_empty() => {}
                _ => {
                    return Err(ValidationError::Required {
                        field: "currentPassword".to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClientData {
    pub name: String,
    pub last_name: String,
    pub id_type: String,
    pub id_number: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
}

impl ClientData {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name)?;
        validate_required("lastName", &self.last_name)?;
        validate_required("idType", &self.id_type)?;
        validate_required("idNumber", &self.id_number)?;
        if !self.email.trim().is_empty() {
            validate_email(&self.email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SupplierData {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl SupplierData {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name)?;
        if !self.email.trim().is_empty() {
            validate_email(&self.email)?;
        }
        Ok(())
    }
}

/// Product registration or edit.
///
/// `stock` is the desired stock: on registration it becomes an INITIAL
/// ledger entry, on edit an ADJUST entry for the difference.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductData {
    pub name: String,
    pub code: String,
    pub sale_price_cents: i64,
    pub stock: i64,
}

impl ProductData {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name)?;
        validate_required("code", &self.code)?;
        validate_non_negative("salePriceCents", self.sale_price_cents)?;
        validate_non_negative("stock", self.stock)?;
        Ok(())
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLineRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A sale as submitted by the till.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleRequest {
    pub client_id: i64,
    pub seller_id: i64,
    pub payment_method: PaymentMethod,
    pub lines: Vec<SaleLineRequest>,
}

impl SaleRequest {
    /// ## Rules
    /// - at least one line
    /// - every quantity > 0
    /// - every unit price >= 0
    pub fn validate(&self) -> ValidationResult<()> {
        if self.lines.is_empty() {
            return Err(ValidationError::Empty {
                field: "lines".to_string(),
            });
        }
        for line in &self.lines {
            validate_positive("quantity", line.quantity)?;
            validate_non_negative("unitPriceCents", line.unit_price_cents)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseLineRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseRequest {
    pub supplier_id: i64,
    pub supplier_invoice_number: String,
    pub lines: Vec<PurchaseLineRequest>,
}

impl PurchaseRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("supplierInvoiceNumber", &self.supplier_invoice_number)?;
        if self.lines.is_empty() {
            return Err(ValidationError::Empty {
                field: "lines".to_string(),
            });
        }
        for line in &self.lines {
            validate_positive("quantity", line.quantity)?;
            validate_non_negative("unitCostCents", line.unit_cost_cents)?;
        }
        Ok(())
    }
}

/// One entry of a bulk stock correction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockAdjustment {
    pub product_id: i64,
    pub new_stock: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(lines: Vec<SaleLineRequest>) -> SaleRequest {
        SaleRequest {
            client_id: 1,
            seller_id: 1,
            payment_method: PaymentMethod::Cash,
            lines,
        }
    }

    #[test]
    fn test_sale_request_rules() {
        assert!(matches!(sale(vec![]).validate(), Err(ValidationError::Empty { .. })));

        let zero_qty = sale(vec![SaleLineRequest {
            product_id: 1,
            quantity: 0,
            unit_price_cents: 100,
        }]);
        assert!(matches!(zero_qty.validate(), Err(ValidationError::MustBePositive { .. })));

        let negative_price = sale(vec![SaleLineRequest {
            product_id: 1,
            quantity: 1,
            unit_price_cents: -1,
        }]);
        assert!(negative_price.validate().is_err());

        let ok = sale(vec![SaleLineRequest {
            product_id: 1,
            quantity: 2,
            unit_price_cents: 0,
        }]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_password_change_needs_current_password() {
        let update = ProfileUpdate {
            fields: SellerUpdate {
                name: "Ana".into(),
                last_name: "Ruiz".into(),
                national_id: "123".into(),
                email: "ana@botica.test".into(),
            },
            current_password: None,
            new_password: Some("nueva".into()),
        };
        assert_eq!(update.validate().unwrap_err().field(), "currentPassword");
    }

    #[test]
    fn test_client_email_optional_but_checked() {
        let mut client = ClientData {
            name: "Luis".into(),
            last_name: "Mora".into(),
            id_type: "CC".into(),
            id_number: "800".into(),
            ..Default::default()
        };
        assert!(client.validate().is_ok());
        client.email = "not-an-email".into();
        assert!(client.validate().is_err());
    }
}
