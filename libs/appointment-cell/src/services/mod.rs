pub mod admission;
pub mod conflict;
pub mod lifecycle;
pub mod memory;
pub mod rules;
pub mod store;

pub use admission::AdmissionService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::{AppointmentLifecycleService, TransitionContext, allowed_actions, can_transition, transition_target};
pub use memory::InMemoryAppointmentStore;
pub use rules::{BusinessRuleEvaluator, evaluate};
pub use store::{AppointmentStore, SupabaseAppointmentStore};
