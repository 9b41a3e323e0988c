//! Field names and status values of the record-store base

pub mod orders {
    pub const ORDER_NUMBER: &str = "Order ID";
    pub const SKU: &str = "SKU";
    pub const SIZE: &str = "Size";

    pub const CONFIRMED_PRICE: &str = "Confirmed Price";
    pub const CONFIRMED_SELLER: &str = "Confirmed Seller";
    pub const CONFIRMED_INVENTORY: &str = "Confirmed Inventory";
    pub const CONFIRMED_VAT_TYPE: &str = "Confirmed VAT Type";
    pub const OFFER_STATUS: &str = "Offer Status";
    pub const DEAL_STATUS: &str = "Deal Status";

    pub const FINAL_PRICE: &str = "Final Price";
    pub const BUYER: &str = "Buyer";
    pub const SHIPPING_LABEL: &str = "Shipping Label";
    pub const SELLING_VAT_TYPE: &str = "Selling VAT Type";
    pub const MIN_PRICE_EXCEPTION: &str = "Min Price Exception Approved";
    pub const FEEDBACK: &str = "Deal Feedback";
}

pub mod inventory {
    pub const SELLER: &str = "Seller";
    pub const SKU: &str = "SKU";
    pub const SIZE: &str = "Size";
    pub const QUANTITY: &str = "Quantity";
}

pub mod sellers {
    pub const NAME: &str = "Name";
}

pub mod buyers {
    pub const COUNTRY: &str = "Country";
    pub const VAT_ID: &str = "VAT ID";
}

pub mod skus {
    pub const MIN_PRICE_MARGIN: &str = "Min Price Margin";
    pub const MIN_PRICE_VAT21: &str = "Min Price VAT21";
    pub const MIN_PRICE_VAT0: &str = "Min Price VAT0";
}

pub mod offer_messages {
    pub const ORDER: &str = "Order Record ID";
    pub const SELLER: &str = "Seller ID";
    pub const INVENTORY: &str = "Inventory ID";
    pub const CHANNEL: &str = "Channel ID";
    pub const MESSAGE: &str = "Message ID";
    pub const PRICE: &str = "Offer Price";
}

pub mod sales {
    pub const ORDER: &str = "Order";
    pub const ORDER_NUMBER: &str = "Order Number";
    pub const BUYER: &str = "Buyer";
    pub const SELLER: &str = "Seller";
    pub const SKU: &str = "SKU";
    pub const INVENTORY: &str = "Inventory";
    pub const SIZE: &str = "Size";
    pub const SALE_PRICE: &str = "Sale Price";
    pub const PURCHASE_PRICE: &str = "Purchase Price";
    pub const VAT_TYPE: &str = "VAT Type";
}

pub mod affiliate_sales {
    pub const SALE: &str = "Sale";
    pub const ORDER: &str = "Order";
    pub const SELLER: &str = "Seller";
    pub const PAYOUT: &str = "Payout";
    pub const VAT_TYPE: &str = "VAT Type";
}

pub mod status {
    pub const OFFER_CONFIRMED: &str = "Confirmed";
    pub const DEAL_CLOSING: &str = "Closing";
    pub const DEAL_PROCESSED: &str = "Deal Processed";
}
