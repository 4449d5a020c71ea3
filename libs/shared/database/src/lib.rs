pub mod error;
pub mod supabase;

pub use error::StoreError;
pub use supabase::{SupabaseClient, SupabaseError, is_transient, is_constraint_violation, return_representation};
