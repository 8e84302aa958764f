pub mod checkpoint;
pub mod trajectory;
