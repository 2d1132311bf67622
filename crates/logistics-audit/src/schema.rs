//! Canonical column names for the three datasets.
//!
//! The source files use Spanish headers; [`canonical_name`] maps those onto
//! the names used everywhere else in the crate.

use crate::types::DatasetKind;

pub mod inventory {
    pub const SKU_ID: &str = "SKU_ID";
    pub const CATEGORY: &str = "Category";
    pub const WAREHOUSE: &str = "Warehouse";
    pub const LEAD_TIME_DAYS: &str = "LeadTimeDays";
    pub const CURRENT_STOCK: &str = "CurrentStock";
    pub const UNIT_COST_USD: &str = "UnitCostUSD";
    pub const COST_OUTLIER_FLAG: &str = "CostOutlierFlag";
    pub const LAST_REVIEW_DATE: &str = "LastReviewDate";
}

pub mod transactions {
    pub const TRANSACTION_ID: &str = "TransactionID";
    pub const SKU_ID: &str = "SKU_ID";
    pub const SALE_DATE: &str = "SaleDate";
    pub const DESTINATION_CITY: &str = "DestinationCity";
    pub const QUANTITY_SOLD: &str = "QuantitySold";
    pub const ACTUAL_DELIVERY_DAYS: &str = "ActualDeliveryDays";
    pub const SHIPPING_COST: &str = "ShippingCost";
    pub const SHIPPING_STATUS: &str = "ShippingStatus";
    pub const FINAL_SALE_PRICE: &str = "FinalSalePrice";
    pub const NO_CATALOG_FLAG: &str = "NoCatalogFlag";
    pub const DISCOUNT_USD: &str = "DiscountUSD";
}

pub mod feedback {
    pub const TRANSACTION_ID: &str = "TransactionID";
    pub const PRODUCT_RATING: &str = "ProductRating";
    pub const LOGISTICS_RATING: &str = "LogisticsRating";
    pub const CUSTOMER_AGE: &str = "CustomerAge";
    pub const RECOMMENDS_BRAND: &str = "RecommendsBrand";
    pub const SUPPORT_TICKET_OPEN: &str = "SupportTicketOpen";
    pub const NPS: &str = "NPS";
}

/// Source header → canonical name.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("Categoria", inventory::CATEGORY),
    ("Bodega_Origen", inventory::WAREHOUSE),
    ("Lead_Time_Dias", inventory::LEAD_TIME_DAYS),
    ("Stock_Actual", inventory::CURRENT_STOCK),
    ("Costo_Unitario_USD", inventory::UNIT_COST_USD),
    ("Costo_Atipico", inventory::COST_OUTLIER_FLAG),
    ("Ultima_Revision", inventory::LAST_REVIEW_DATE),
    ("Transaccion_ID", transactions::TRANSACTION_ID),
    ("Fecha_Venta", transactions::SALE_DATE),
    ("Ciudad_Destino", transactions::DESTINATION_CITY),
    ("Cantidad_Vendida", transactions::QUANTITY_SOLD),
    ("Tiempo_Entrega_Real", transactions::ACTUAL_DELIVERY_DAYS),
    ("Costo_Envio", transactions::SHIPPING_COST),
    ("Estado_Envio", transactions::SHIPPING_STATUS),
    ("Precio_Venta_Final", transactions::FINAL_SALE_PRICE),
    ("Sin_Catalogo", transactions::NO_CATALOG_FLAG),
    ("Descuento_Aplicado_USD", transactions::DISCOUNT_USD),
    ("Rating_Producto", feedback::PRODUCT_RATING),
    ("Rating_Logistica", feedback::LOGISTICS_RATING),
    ("Edad_Cliente", feedback::CUSTOMER_AGE),
    ("Recomienda_Marca", feedback::RECOMMENDS_BRAND),
    ("Ticket_Soporte_Abierto", feedback::SUPPORT_TICKET_OPEN),
    ("Satisfaccion_NPS", feedback::NPS),
];

/// Map a source header to its canonical column name.
///
/// Canonical names and unknown headers are returned unchanged.
pub fn canonical_name(header: &str) -> &str {
    let trimmed = header.trim();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(trimmed)
}

/// Columns each dataset's cleaner reads.
///
/// Flag columns are produced by the cleaners and are not required on input.
pub fn required_columns(dataset: DatasetKind) -> &'static [&'static str] {
    match dataset {
        DatasetKind::Inventory => &[
            inventory::SKU_ID,
            inventory::CATEGORY,
            inventory::WAREHOUSE,
            inventory::LEAD_TIME_DAYS,
            inventory::CURRENT_STOCK,
            inventory::UNIT_COST_USD,
            inventory::LAST_REVIEW_DATE,
        ],
        DatasetKind::Transactions => &[
            transactions::TRANSACTION_ID,
            transactions::SKU_ID,
            transactions::SALE_DATE,
            transactions::DESTINATION_CITY,
            transactions::QUANTITY_SOLD,
            transactions::ACTUAL_DELIVERY_DAYS,
            transactions::SHIPPING_COST,
            transactions::SHIPPING_STATUS,
            transactions::FINAL_SALE_PRICE,
            transactions::DISCOUNT_USD,
        ],
        DatasetKind::Feedback => &[
            feedback::TRANSACTION_ID,
            feedback::PRODUCT_RATING,
            feedback::LOGISTICS_RATING,
            feedback::CUSTOMER_AGE,
            feedback::RECOMMENDS_BRAND,
            feedback::SUPPORT_TICKET_OPEN,
            feedback::NPS,
        ],
    }
}

/// Required columns absent from `columns`.
pub fn missing_columns<'a, I>(dataset: DatasetKind, columns: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = columns.into_iter().collect();
    required_columns(dataset)
        .iter()
        .filter(|required| !present.contains(required))
        .map(|required| required.to_string())
        .collect()
}
