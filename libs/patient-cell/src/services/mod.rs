pub mod memory;
pub mod patient;

pub use memory::InMemoryPatientStore;
pub use patient::{PatientStore, SupabasePatientStore};
