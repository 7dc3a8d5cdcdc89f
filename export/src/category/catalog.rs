//! Static catalog of the dependent tables exported per entity.
//!
//! Every table belongs to exactly one [`Category`]. Second-level tables carry an `entityId`
//! column; third-level tables are reached through their parent's primary key.

use serde::{Serialize, Serializer};
use std::fmt;

/// Name of the root table.
pub const ENTITY_TABLE: &str = "Entity";

/// Name of the independently keyed address table.
pub const ADDRESS_TABLE: &str = "Address";

/// How the rows of a table are scoped to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableScope {
    /// The table has its own `entityId` column.
    Direct,
    /// The table is joined through `parent` on `join_column`, which is the parent's primary key.
    ViaParent {
        parent: &'static str,
        join_column: &'static str,
    },
}

/// A table exported as part of a category payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Source table name.
    pub name: &'static str,
    /// Key of the table's row array in the category payload.
    pub key: &'static str,
    pub scope: TableScope,
}

impl TableSpec {
    const fn direct(name: &'static str, key: &'static str) -> Self {
        Self {
            name,
            key,
            scope: TableScope::Direct,
        }
    }

    const fn via(
        name: &'static str,
        key: &'static str,
        parent: &'static str,
        join_column: &'static str,
    ) -> Self {
        Self {
            name,
            key,
            scope: TableScope::ViaParent {
                parent,
                join_column,
            },
        }
    }

    /// Returns `true` for tables with a direct `entityId` column.
    pub fn is_second_level(&self) -> bool {
        matches!(self.scope, TableScope::Direct)
    }
}

pub const ENTITY_HISTORY: TableSpec = TableSpec::direct("EntityHistory", "history");
pub const ENTITY_INFORMATION: TableSpec = TableSpec::direct("EntityInformation", "information");
pub const ENTITY_ROLE: TableSpec = TableSpec::direct("EntityRole", "roles");
pub const ENTITY_NOTE: TableSpec = TableSpec::direct("EntityNote", "notes");
pub const ENTITY_FEE: TableSpec = TableSpec::direct("EntityFee", "fees");
pub const ENTITY_ADDRESS: TableSpec = TableSpec::direct("EntityAddress", "addresses");
pub const ENTITY_COMPONENT: TableSpec = TableSpec::direct("EntityComponent", "components");
pub const ENTITY_DEPARTMENT: TableSpec = TableSpec::direct("EntityDepartment", "departments");
pub const ENTITY_PART: TableSpec = TableSpec::direct("EntityPart", "parts");
pub const ENTITY_EMPLOYEE: TableSpec = TableSpec::direct("EntityEmployee", "employees");
pub const ENTITY_LOCATION: TableSpec = TableSpec::direct("EntityLocation", "locations");
pub const ENTITY_INVOICE: TableSpec = TableSpec::direct("EntityInvoice", "invoices");

/// The twelve tables with a direct `entityId` column, in preload order.
pub static SECOND_LEVEL_TABLES: [TableSpec; 12] = [
    ENTITY_HISTORY,
    ENTITY_INFORMATION,
    ENTITY_ROLE,
    ENTITY_NOTE,
    ENTITY_FEE,
    ENTITY_ADDRESS,
    ENTITY_COMPONENT,
    ENTITY_DEPARTMENT,
    ENTITY_PART,
    ENTITY_EMPLOYEE,
    ENTITY_LOCATION,
    ENTITY_INVOICE,
];

static CORE_BUSINESS_TABLES: [TableSpec; 18] = [
    ENTITY_HISTORY,
    ENTITY_INFORMATION,
    ENTITY_ROLE,
    ENTITY_NOTE,
    ENTITY_FEE,
    TableSpec::via("EntityHistoryDetail", "historyDetail", "EntityHistory", "entityHistoryId"),
    TableSpec::via(
        "EntityHistoryAttachment",
        "historyAttachment",
        "EntityHistory",
        "entityHistoryId",
    ),
    TableSpec::via(
        "EntityInformationContact",
        "informationContact",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via(
        "EntityInformationLicense",
        "informationLicense",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via(
        "EntityInformationCertification",
        "informationCertification",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via(
        "EntityInformationSocialMedia",
        "informationSocialMedia",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via(
        "EntityInformationWebsite",
        "informationWebsite",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via(
        "EntityInformationHours",
        "informationHours",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via("EntityNoteAttachment", "noteAttachment", "EntityNote", "entityNoteId"),
    TableSpec::via("EntityNoteComment", "noteComment", "EntityNote", "entityNoteId"),
    TableSpec::via("EntityNoteTag", "noteTag", "EntityNote", "entityNoteId"),
    TableSpec::via("EntityRolePermission", "rolePermission", "EntityRole", "entityRoleId"),
    TableSpec::via("EntityRoleAssignment", "roleAssignment", "EntityRole", "entityRoleId"),
];

static EMPLOYEE_MANAGEMENT_TABLES: [TableSpec; 20] = [
    ENTITY_EMPLOYEE,
    TableSpec::via(
        "EntityEmployeeAchievementHistory",
        "employeeAchievementHistory",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeCertification",
        "employeeCertification",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via("EntityEmployeeSkill", "employeeSkill", "EntityEmployee", "entityEmployeeId"),
    TableSpec::via(
        "EntityEmployeeSchedule",
        "employeeSchedule",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeTimeClock",
        "employeeTimeClock",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeePayRate",
        "employeePayRate",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeCommission",
        "employeeCommission",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via("EntityEmployeeReview", "employeeReview", "EntityEmployee", "entityEmployeeId"),
    TableSpec::via(
        "EntityEmployeeTraining",
        "employeeTraining",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeDocument",
        "employeeDocument",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeEmergencyContact",
        "employeeEmergencyContact",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeLocation",
        "employeeLocation",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeDepartment",
        "employeeDepartment",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeePermission",
        "employeePermission",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeePreference",
        "employeePreference",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via(
        "EntityEmployeeNotification",
        "employeeNotification",
        "EntityEmployee",
        "entityEmployeeId",
    ),
    TableSpec::via("EntityEmployeeLogin", "employeeLogin", "EntityEmployee", "entityEmployeeId"),
    TableSpec::via("EntityEmployeeGoal", "employeeGoal", "EntityEmployee", "entityEmployeeId"),
    TableSpec::via(
        "EntityEmployeeTimeOff",
        "employeeTimeOff",
        "EntityEmployee",
        "entityEmployeeId",
    ),
];

static LOCATION_MANAGEMENT_TABLES: [TableSpec; 18] = [
    ENTITY_LOCATION,
    ENTITY_ADDRESS,
    ENTITY_DEPARTMENT,
    TableSpec::via("EntityLocationHours", "locationHours", "EntityLocation", "entityLocationId"),
    TableSpec::via(
        "EntityLocationHoliday",
        "locationHoliday",
        "EntityLocation",
        "entityLocationId",
    ),
    TableSpec::via("EntityLocationBay", "locationBay", "EntityLocation", "entityLocationId"),
    TableSpec::via(
        "EntityLocationEquipment",
        "locationEquipment",
        "EntityLocation",
        "entityLocationId",
    ),
    TableSpec::via(
        "EntityLocationTaxRate",
        "locationTaxRate",
        "EntityLocation",
        "entityLocationId",
    ),
    TableSpec::via(
        "EntityLocationSetting",
        "locationSetting",
        "EntityLocation",
        "entityLocationId",
    ),
    TableSpec::via("EntityLocationPhone", "locationPhone", "EntityLocation", "entityLocationId"),
    TableSpec::via(
        "EntityLocationPaymentTerminal",
        "locationPaymentTerminal",
        "EntityLocation",
        "entityLocationId",
    ),
    TableSpec::via(
        "EntityLocationServiceArea",
        "locationServiceArea",
        "EntityLocation",
        "entityLocationId",
    ),
    TableSpec::via("EntityLocationPhoto", "locationPhoto", "EntityLocation", "entityLocationId"),
    TableSpec::via(
        "EntityAddressVerification",
        "addressVerification",
        "EntityAddress",
        "entityAddressId",
    ),
    TableSpec::via(
        "EntityDepartmentManager",
        "departmentManager",
        "EntityDepartment",
        "entityDepartmentId",
    ),
    TableSpec::via(
        "EntityDepartmentBudget",
        "departmentBudget",
        "EntityDepartment",
        "entityDepartmentId",
    ),
    TableSpec::via(
        "EntityDepartmentGoal",
        "departmentGoal",
        "EntityDepartment",
        "entityDepartmentId",
    ),
    TableSpec::via(
        "EntityDepartmentSchedule",
        "departmentSchedule",
        "EntityDepartment",
        "entityDepartmentId",
    ),
];

static PARTS_INVENTORY_TABLES: [TableSpec; 20] = [
    ENTITY_PART,
    TableSpec::via("EntityPartInventory", "partInventory", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartPricing", "partPricing", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartVendor", "partVendor", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartCategory", "partCategory", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartBrand", "partBrand", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartWarranty", "partWarranty", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartCore", "partCore", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartOrder", "partOrder", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartOrderLine", "partOrderLine", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartReturn", "partReturn", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartTransfer", "partTransfer", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartAdjustment", "partAdjustment", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartCount", "partCount", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartBin", "partBin", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartKit", "partKit", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartKitItem", "partKitItem", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartSupersession", "partSupersession", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartPhoto", "partPhoto", "EntityPart", "entityPartId"),
    TableSpec::via("EntityPartNote", "partNote", "EntityPart", "entityPartId"),
];

static FINANCIAL_BILLING_TABLES: [TableSpec; 18] = [
    ENTITY_INVOICE,
    TableSpec::via("EntityInvoiceLine", "invoiceLine", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via("EntityInvoicePayment", "invoicePayment", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via("EntityInvoiceRefund", "invoiceRefund", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via("EntityInvoiceTax", "invoiceTax", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via("EntityInvoiceDiscount", "invoiceDiscount", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via("EntityInvoiceNote", "invoiceNote", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via(
        "EntityInvoiceAttachment",
        "invoiceAttachment",
        "EntityInvoice",
        "entityInvoiceId",
    ),
    TableSpec::via(
        "EntityInvoiceAdjustment",
        "invoiceAdjustment",
        "EntityInvoice",
        "entityInvoiceId",
    ),
    TableSpec::via("EntityInvoiceBatch", "invoiceBatch", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via(
        "EntityInvoiceStatement",
        "invoiceStatement",
        "EntityInvoice",
        "entityInvoiceId",
    ),
    TableSpec::via("EntityInvoiceDeposit", "invoiceDeposit", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via("EntityInvoiceTerm", "invoiceTerm", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via("EntityInvoiceReminder", "invoiceReminder", "EntityInvoice", "entityInvoiceId"),
    TableSpec::via(
        "EntityInvoiceCreditMemo",
        "invoiceCreditMemo",
        "EntityInvoice",
        "entityInvoiceId",
    ),
    TableSpec::via("EntityFeeSchedule", "feeSchedule", "EntityFee", "entityFeeId"),
    TableSpec::via("EntityFeeExemption", "feeExemption", "EntityFee", "entityFeeId"),
    TableSpec::via("EntityFeeHistory", "feeHistory", "EntityFee", "entityFeeId"),
];

static SERVICE_COMPONENT_TABLES: [TableSpec; 16] = [
    ENTITY_COMPONENT,
    TableSpec::via(
        "EntityComponentLabor",
        "componentLabor",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via("EntityComponentPart", "componentPart", "EntityComponent", "entityComponentId"),
    TableSpec::via(
        "EntityComponentPricing",
        "componentPricing",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentCategory",
        "componentCategory",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentPackage",
        "componentPackage",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentPackageItem",
        "componentPackageItem",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentInspection",
        "componentInspection",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentInspectionItem",
        "componentInspectionItem",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentWarranty",
        "componentWarranty",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentInterval",
        "componentInterval",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via("EntityComponentNote", "componentNote", "EntityComponent", "entityComponentId"),
    TableSpec::via(
        "EntityComponentPhoto",
        "componentPhoto",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentVehicleType",
        "componentVehicleType",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentRecommendation",
        "componentRecommendation",
        "EntityComponent",
        "entityComponentId",
    ),
    TableSpec::via(
        "EntityComponentCannedJob",
        "componentCannedJob",
        "EntityComponent",
        "entityComponentId",
    ),
];

static CONFIGURATION_SETTINGS_TABLES: [TableSpec; 16] = [
    TableSpec::via("EntitySetting", "setting", "EntityInformation", "entityInformationId"),
    TableSpec::via("EntityPreference", "preference", "EntityInformation", "entityInformationId"),
    TableSpec::via(
        "EntityNotificationSetting",
        "notificationSetting",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via("EntityIntegration", "integration", "EntityInformation", "entityInformationId"),
    TableSpec::via(
        "EntityIntegrationCredential",
        "integrationCredential",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via(
        "EntityEmailTemplate",
        "emailTemplate",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via("EntitySmsTemplate", "smsTemplate", "EntityInformation", "entityInformationId"),
    TableSpec::via(
        "EntityPrintTemplate",
        "printTemplate",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via("EntityLaborRate", "laborRate", "EntityInformation", "entityInformationId"),
    TableSpec::via("EntityTaxSetting", "taxSetting", "EntityInformation", "entityInformationId"),
    TableSpec::via(
        "EntityPaymentSetting",
        "paymentSetting",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via("EntityWorkflow", "workflow", "EntityInformation", "entityInformationId"),
    TableSpec::via(
        "EntityWorkflowStep",
        "workflowStep",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via("EntityCustomField", "customField", "EntityInformation", "entityInformationId"),
    TableSpec::via(
        "EntityCustomFieldValue",
        "customFieldValue",
        "EntityInformation",
        "entityInformationId",
    ),
    TableSpec::via("EntityFeatureFlag", "featureFlag", "EntityInformation", "entityInformationId"),
];

/// One of the seven logical groupings of an entity's dependent tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    CoreBusiness,
    EmployeeManagement,
    LocationManagement,
    PartsInventory,
    FinancialBilling,
    ServiceComponent,
    ConfigurationSettings,
}

impl Category {
    /// All categories in output order.
    pub const ALL: [Category; 7] = [
        Category::CoreBusiness,
        Category::EmployeeManagement,
        Category::LocationManagement,
        Category::PartsInventory,
        Category::FinancialBilling,
        Category::ServiceComponent,
        Category::ConfigurationSettings,
    ];

    /// Human readable name, also stored in the payload metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Category::CoreBusiness => "Core Business",
            Category::EmployeeManagement => "Employee Management",
            Category::LocationManagement => "Location Management",
            Category::PartsInventory => "Parts & Inventory",
            Category::FinancialBilling => "Financial & Billing",
            Category::ServiceComponent => "Service & Component",
            Category::ConfigurationSettings => "Configuration & Settings",
        }
    }

    /// File name stem of the category's JSON file.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Category::CoreBusiness => "core_business",
            Category::EmployeeManagement => "employee_management",
            Category::LocationManagement => "location_management",
            Category::PartsInventory => "parts_inventory",
            Category::FinancialBilling => "financial_billing",
            Category::ServiceComponent => "service_component",
            Category::ConfigurationSettings => "configuration_settings",
        }
    }

    /// Member tables in payload order.
    pub fn tables(&self) -> &'static [TableSpec] {
        match self {
            Category::CoreBusiness => &CORE_BUSINESS_TABLES,
            Category::EmployeeManagement => &EMPLOYEE_MANAGEMENT_TABLES,
            Category::LocationManagement => &LOCATION_MANAGEMENT_TABLES,
            Category::PartsInventory => &PARTS_INVENTORY_TABLES,
            Category::FinancialBilling => &FINANCIAL_BILLING_TABLES,
            Category::ServiceComponent => &SERVICE_COMPONENT_TABLES,
            Category::ConfigurationSettings => &CONFIGURATION_SETTINGS_TABLES,
        }
    }

    /// Number of member tables, identical for full and empty payloads.
    pub fn table_count(&self) -> usize {
        self.tables().len()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Iterates over every catalogued table across all categories.
pub fn all_tables() -> impl Iterator<Item = &'static TableSpec> {
    Category::ALL.into_iter().flat_map(|category| category.tables())
}

/// Looks up a catalogued table by its source name.
pub fn find_table(name: &str) -> Option<&'static TableSpec> {
    all_tables().find(|table| table.name == name)
}
