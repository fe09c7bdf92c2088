//! Column names of the transaction dataset, raw and derived.

pub const INVOICE_NO: &str = "invoice_no";
pub const CUSTOMER_ID: &str = "customer_id";
pub const GENDER: &str = "gender";
pub const AGE: &str = "age";
pub const CATEGORY: &str = "category";
pub const QUANTITY: &str = "quantity";
pub const PRICE: &str = "price";
pub const PAYMENT_METHOD: &str = "payment_method";
pub const INVOICE_DATE: &str = "invoice_date";
pub const SHOPPING_MALL: &str = "shopping_mall";

/// Columns that must be present in the input file, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    INVOICE_NO,
    CUSTOMER_ID,
    GENDER,
    AGE,
    CATEGORY,
    QUANTITY,
    PRICE,
    PAYMENT_METHOD,
    INVOICE_DATE,
    SHOPPING_MALL,
];

// Derived at clean time.
pub const TOTAL_AMOUNT: &str = "total_amount";
pub const AGE_GROUP: &str = "age_group";
pub const SPENDING_BAND: &str = "spending_band";
pub const YEAR: &str = "year";
pub const MONTH: &str = "month";
pub const QUARTER: &str = "quarter";
pub const DAY_OF_WEEK: &str = "day_of_week";

/// Input date format: `DD/MM/YYYY`. Dates are normalized to `YYYY-MM-DD`
/// strings in the cleaned table so lexicographic order is chronological.
pub const INPUT_DATE_FORMAT: &str = "%d/%m/%Y";
pub const CLEAN_DATE_FORMAT: &str = "%Y-%m-%d";
