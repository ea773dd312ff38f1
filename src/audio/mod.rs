pub mod annot;
pub mod wav;
