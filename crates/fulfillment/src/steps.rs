//! Fulfillment saga constants.

/// The saga type identifier for shipment fulfillment.
pub const SAGA_TYPE: &str = "ShipmentFulfillment";

/// Step name: Validate addresses before anything is purchased.
pub const STEP_VALIDATE: &str = "validate";

/// Step name: Verify the destination with the postage provider (advisory).
pub const STEP_VERIFY_ADDRESS: &str = "verify_address";

/// Step name: Buy postage for the parcel.
pub const STEP_PURCHASE_POSTAGE: &str = "purchase_postage";

/// Step name: Register the shipment with the fulfillment server.
pub const STEP_REGISTER_SHIPMENT: &str = "register_shipment";

/// Step name: Fetch, compose and print the label.
pub const STEP_PRINT_LABEL: &str = "print_label";

/// Compensation step name: Refund purchased postage.
pub const STEP_REFUND_POSTAGE: &str = "refund_postage";

/// Carrier family postage is bought from.
pub const CARRIER_USPS: &str = "USPS";
