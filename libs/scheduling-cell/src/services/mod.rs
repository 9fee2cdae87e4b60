pub mod directory;
pub mod slots;

pub use directory::ClinicDirectory;
pub use slots::{generate_slots, slot_availability};
