pub mod commit;
pub mod outcome;
pub mod similarity;
