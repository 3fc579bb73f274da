pub mod rank;
pub mod semantic;
pub mod text;
