pub mod inspect;
pub mod launch;
