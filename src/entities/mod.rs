// Entity records - plain rows with their own create/list/get operations
//
// Each entity module owns its table: struct, type enums, suggestion lists and
// the SQL that reads and writes it.

pub mod user;
pub mod vehicle;
pub mod contractor;

pub use user::{User, UserRole};
pub use vehicle::{NewVehicle, Vehicle, VehicleForm, VehicleStatus};
pub use contractor::{Contractor, ContractorForm, NewContractor, CONTRACTOR_TYPES};
