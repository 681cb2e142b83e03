use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spec_core::ast::Value;
use spec_core::Field;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
}

impl Employee {
    pub const ID: Field<Employee, Uuid> = Field::new("id");
    pub const NAME: Field<Employee, String> = Field::new("name");
    pub const EMAIL: Field<Employee, String> = Field::new("email");
    pub const DEPARTMENT: Field<Employee, String> = Field::new("department");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Scheduled,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl VisitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::CheckedIn => "checkedin",
            VisitStatus::CheckedOut => "checkedout",
            VisitStatus::Cancelled => "cancelled",
        }
    }
}

impl From<VisitStatus> for Value {
    fn from(s: VisitStatus) -> Self {
        Value::String(s.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    /// Filled from the owning visitor when a dataset is loaded.
    #[serde(default)]
    pub visitor_id: Uuid,
    pub status: VisitStatus,
    pub purpose: String,
    pub check_in_at: DateTime<Utc>,
    #[serde(default)]
    pub check_out_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub host: Option<Employee>,
}

impl Visit {
    pub const ID: Field<Visit, Uuid> = Field::new("id");
    pub const VISITOR_ID: Field<Visit, Uuid> = Field::new("visitor_id");
    pub const STATUS: Field<Visit, VisitStatus> = Field::new("status");
    pub const PURPOSE: Field<Visit, String> = Field::new("purpose");
    pub const CHECK_IN_AT: Field<Visit, DateTime<Utc>> = Field::new("check_in_at");
    pub const CHECK_OUT_AT: Field<Visit, Option<DateTime<Utc>>> = Field::new("check_out_at");
    pub const HOST: Field<Visit, Employee> = Field::new("host");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visitor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Visitor {
    pub const ID: Field<Visitor, Uuid> = Field::new("id");
    pub const NAME: Field<Visitor, String> = Field::new("name");
    pub const EMAIL: Field<Visitor, String> = Field::new("email");
    pub const COMPANY: Field<Visitor, String> = Field::new("company");
    pub const VISITS: Field<Visitor, Vec<Visit>> = Field::new("visits");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PaymentReceived,
    PaymentFailed,
    Shipped,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PaymentReceived => "payment_received",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Shipped => "shipped",
        }
    }
}

impl From<OrderStatus> for Value {
    fn from(s: OrderStatus) -> Self {
        Value::String(s.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub const PRODUCT_NAME: Field<OrderItem, String> = Field::new("product_name");
    pub const QUANTITY: Field<OrderItem, u32> = Field::new("quantity");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub payment_intent_id: String,
    pub buyer_email: String,
    pub status: OrderStatus,
    pub ordered_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub const ID: Field<Order, Uuid> = Field::new("id");
    pub const PAYMENT_INTENT_ID: Field<Order, String> = Field::new("payment_intent_id");
    pub const BUYER_EMAIL: Field<Order, String> = Field::new("buyer_email");
    pub const STATUS: Field<Order, OrderStatus> = Field::new("status");
    pub const ORDERED_AT: Field<Order, DateTime<Utc>> = Field::new("ordered_at");
    pub const ITEMS: Field<Order, Vec<OrderItem>> = Field::new("items");

    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum()
    }
}
