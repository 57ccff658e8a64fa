pub mod last_insert;
