//! Built-in entity schemas for the fleet console editors.
//!
//! Slot wire names are fixed by the backend and must not be changed without
//! a matching server release.

use crate::models::{CollectionSpec, EntitySchema, FieldRule, FieldSpec, SlotSpec};

const PDF_AND_IMAGES: &[&str] = &["application/pdf", "image/jpeg", "image/png", "image/webp"];

/// Vendor invoice with additional charges and trip legs.
pub fn invoice_schema() -> EntitySchema {
    EntitySchema::new("invoices", "invoice")
        .field(FieldSpec::new("invoiceNumber").label("Invoice number").required())
        .field(FieldSpec::new("vendorName").label("Vendor").required())
        .field(
            FieldSpec::new("invoiceDate")
                .label("Invoice date")
                .required()
                .rule(FieldRule::Date),
        )
        .field(
            FieldSpec::new("dueDate")
                .label("Due date")
                .rule(FieldRule::Date)
                .rule(FieldRule::not_before("invoiceDate")),
        )
        .field(
            FieldSpec::new("totalAmount")
                .label("Total amount")
                .required()
                .rule(FieldRule::range(Some(0.0), None)),
        )
        .collection(
            CollectionSpec::new("charges", "additionalCharges")
                .label("Additional charges")
                .row_field(FieldSpec::new("description").label("Description").required())
                .row_field(
                    FieldSpec::new("amount")
                        .label("Amount")
                        .required()
                        .rule(FieldRule::range(Some(0.0), None)),
                ),
        )
        .collection(
            CollectionSpec::new("tripLegs", "tripLegs")
                .label("Trip legs")
                .row_field(FieldSpec::new("tripId").label("Trip").required()),
        )
        .slot(
            SlotSpec::single("invoiceFile", "INVOICE_FILE")
                .label("Invoice file")
                .mandatory()
                .allowed_content_types(PDF_AND_IMAGES),
        )
        .slot(SlotSpec::multiple("supportingDocs", "SUPPORTING_DOCS").label("Supporting documents"))
}

/// Driver record with license and identity documents.
pub fn driver_schema() -> EntitySchema {
    EntitySchema::new("drivers", "driver")
        .field(FieldSpec::new("fullName").label("Full name").required())
        .field(
            FieldSpec::new("phone")
                .label("Phone")
                .required()
                .rule(FieldRule::MinLength(10))
                .rule(FieldRule::MaxLength(15)),
        )
        .field(FieldSpec::new("email").label("Email").rule(FieldRule::Email))
        .field(FieldSpec::new("licenseNumber").label("License number").required())
        .field(
            FieldSpec::new("licenseExpiry")
                .label("License expiry")
                .required()
                .rule(FieldRule::NotBeforeToday),
        )
        .collection(
            CollectionSpec::new("emergencyContacts", "emergencyContacts")
                .label("Emergency contacts")
                .row_field(FieldSpec::new("name").label("Name").required())
                .row_field(FieldSpec::new("phone").label("Phone").required()),
        )
        .slot(
            SlotSpec::single("license", "DL")
                .label("Driving license")
                .mandatory()
                .allowed_content_types(PDF_AND_IMAGES),
        )
        .slot(SlotSpec::single("aadhaar", "AADHAAR").label("Identity proof"))
        .slot(SlotSpec::single("photo", "PHOTO").label("Photo").allowed_content_types(&["image/*"]))
}

/// Vehicle record with registration, insurance and permit documents.
pub fn vehicle_schema() -> EntitySchema {
    EntitySchema::new("vehicles", "vehicle")
        .field(FieldSpec::new("registrationNumber").label("Registration number").required())
        .field(FieldSpec::new("make").label("Make").required())
        .field(FieldSpec::new("model").label("Model"))
        .field(
            FieldSpec::new("year")
                .label("Year")
                .rule(FieldRule::range(Some(1980.0), Some(2100.0))),
        )
        .field(
            FieldSpec::new("insuranceExpiry")
                .label("Insurance expiry")
                .required()
                .rule(FieldRule::NotBeforeToday),
        )
        .collection(
            CollectionSpec::new("maintenance", "maintenanceRecords")
                .label("Maintenance records")
                .row_field(
                    FieldSpec::new("serviceDate")
                        .label("Service date")
                        .required()
                        .rule(FieldRule::Date),
                )
                .row_field(
                    FieldSpec::new("cost")
                        .label("Cost")
                        .rule(FieldRule::range(Some(0.0), None)),
                ),
        )
        .collection(
            CollectionSpec::new("tyres", "tyres")
                .label("Tyres")
                .row_field(FieldSpec::new("position").label("Position").required())
                .row_field(FieldSpec::new("serialNumber").label("Serial number").required()),
        )
        .slot(
            SlotSpec::single("registration", "RC")
                .label("Registration certificate")
                .mandatory(),
        )
        .slot(
            SlotSpec::single("insurance", "INSURANCE")
                .label("Insurance certificate")
                .mandatory(),
        )
        .slot(SlotSpec::multiple("permits", "PERMIT").label("Permits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas_are_consistent() {
        for schema in [invoice_schema(), driver_schema(), vehicle_schema()] {
            assert!(schema.check().is_ok(), "schema {} failed check", schema.entity);
        }
    }

    #[test]
    fn test_slot_wire_mappings() {
        assert_eq!(driver_schema().slot_spec("license").unwrap().wire_field, "DL");
        assert_eq!(
            vehicle_schema().slot_spec("insurance").unwrap().wire_field,
            "INSURANCE"
        );
        assert_eq!(
            invoice_schema().slot_spec("invoiceFile").unwrap().wire_field,
            "INVOICE_FILE"
        );
    }
}
